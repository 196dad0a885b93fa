use std::sync::Arc;

use chrono::Utc;
use serenity::all::{ChannelId, GuildId, RoleId, UserId};
use tracing::{debug, info, warn};

use crate::bot::error::Error;
use crate::constants::moderation::{INFRACTION_LOG_PROPERTY, MUTE_ROLE_PROPERTY};
use crate::db::models::{Infraction, InfractionKind, MuteRecord};
use crate::services::moderation::authorization::{may_act, Decision, DenyReason};
use crate::services::moderation::gateway::{InfractionNotice, ModerationGateway};
use crate::services::moderation::infraction_id;
use crate::services::moderation::scheduler::MuteScheduler;
use crate::services::moderation::store::{ModerationStore, StoreError};
use crate::utils::formatting::parse_user_ref;

/// Who is taking the action.
#[derive(Debug, Clone, Copy)]
pub enum Actor {
    Moderator(UserId),
    /// The automated system actor; acts with system authority and is
    /// attributed as the bot itself.
    System,
}

/// Result of a recorded action.
#[derive(Debug)]
pub struct ActionOutcome {
    pub infraction_id: String,
    pub subject_id: UserId,
    pub reason: String,
    pub dm_delivered: bool,
}

struct Recorded {
    id: String,
    subject_id: UserId,
    is_member: bool,
    reason: String,
    dm_delivered: bool,
}

/// Orchestrates one moderation action: resolve the target, authorize, persist
/// the infraction, apply the platform effect, and (for timed mutes) hand off
/// to the scheduler. The insert is the durability point: an infraction stays
/// on record even when enforcement fails afterwards.
pub struct ActionEngine {
    store: Arc<dyn ModerationStore>,
    gateway: Arc<dyn ModerationGateway>,
    scheduler: Arc<MuteScheduler>,
    bot_user_id: UserId,
}

impl ActionEngine {
    pub fn new(
        store: Arc<dyn ModerationStore>,
        gateway: Arc<dyn ModerationGateway>,
        scheduler: Arc<MuteScheduler>,
        bot_user_id: UserId,
    ) -> Self {
        Self {
            store,
            gateway,
            scheduler,
            bot_user_id,
        }
    }

    pub async fn warn(
        &self,
        guild_id: GuildId,
        actor: Actor,
        target_ref: &str,
        reason: Option<&str>,
    ) -> Result<ActionOutcome, Error> {
        let rec = self
            .record(guild_id, actor, target_ref, InfractionKind::Warn, reason)
            .await?;

        Ok(rec.into_outcome())
    }

    pub async fn kick(
        &self,
        guild_id: GuildId,
        actor: Actor,
        target_ref: &str,
        reason: Option<&str>,
    ) -> Result<ActionOutcome, Error> {
        let rec = self
            .record(guild_id, actor, target_ref, InfractionKind::Kick, reason)
            .await?;

        if !rec.is_member {
            return Err(Error::TargetAbsent);
        }

        self.gateway
            .kick(guild_id, rec.subject_id, &rec.reason)
            .await
            .map_err(|source| Error::EnforcementAfterRecord {
                id: rec.id.clone(),
                source,
            })?;

        Ok(rec.into_outcome())
    }

    pub async fn ban(
        &self,
        guild_id: GuildId,
        actor: Actor,
        target_ref: &str,
        reason: Option<&str>,
    ) -> Result<ActionOutcome, Error> {
        let rec = self
            .record(guild_id, actor, target_ref, InfractionKind::Ban, reason)
            .await?;

        self.gateway
            .ban(guild_id, rec.subject_id, &rec.reason)
            .await
            .map_err(|source| Error::EnforcementAfterRecord {
                id: rec.id.clone(),
                source,
            })?;

        Ok(rec.into_outcome())
    }

    /// Mute the target. `duration_secs` of 0 means permanent: no MuteRecord
    /// and no scheduled expiry are registered at all.
    pub async fn mute(
        &self,
        guild_id: GuildId,
        actor: Actor,
        target_ref: &str,
        duration_secs: u64,
        reason: Option<&str>,
    ) -> Result<ActionOutcome, Error> {
        let rec = self
            .record(guild_id, actor, target_ref, InfractionKind::Mute, reason)
            .await?;

        if !rec.is_member {
            return Err(Error::TargetAbsent);
        }

        let role_id = self.mute_role(guild_id).await?;

        self.gateway
            .add_mute_role(guild_id, rec.subject_id, role_id)
            .await
            .map_err(|source| Error::EnforcementAfterRecord {
                id: rec.id.clone(),
                source,
            })?;

        // A new mute supersedes any previous active one for the subject:
        // deactivate it and discard its pending timer rather than letting a
        // stale expiry unmute the fresh sentence.
        let superseded = self
            .store
            .deactivate_mutes_for_subject(guild_id.get() as i64, &rec.subject_id.to_string())
            .await?;
        for id in &superseded {
            self.scheduler.discard_timer(id);
            debug!("Mute {} superseded by {}", id, rec.id);
        }

        if duration_secs > 0 {
            let mute_rec = MuteRecord {
                infraction_id: rec.id.clone(),
                guild_id: guild_id.get() as i64,
                subject_id: rec.subject_id.to_string(),
                expires_at: Utc::now().timestamp() + duration_secs as i64,
                active: true,
            };
            self.store.upsert_mute(&mute_rec).await?;
            self.scheduler.schedule(&mute_rec);
        }

        Ok(rec.into_outcome())
    }

    /// Explicit unmute. Deactivates the subject's active mutes, discards
    /// their timers, and removes the mute role. No infraction is recorded.
    pub async fn unmute(&self, guild_id: GuildId, target_ref: &str) -> Result<UserId, Error> {
        let subject_id = parse_user_ref(target_ref)
            .ok_or_else(|| Error::TargetInvalid(target_ref.to_string()))?;

        let profile = self
            .gateway
            .resolve(guild_id, subject_id)
            .await
            .ok_or(Error::TargetAbsent)?;
        if !profile.is_member {
            return Err(Error::TargetAbsent);
        }

        let role_id = self.mute_role(guild_id).await?;

        let deactivated = self
            .store
            .deactivate_mutes_for_subject(guild_id.get() as i64, &subject_id.to_string())
            .await?;
        for id in &deactivated {
            self.scheduler.discard_timer(id);
            info!("Mute {} lifted early for user {}", id, subject_id);
        }

        self.gateway
            .remove_mute_role(guild_id, subject_id, role_id)
            .await
            .map_err(Error::Enforcement)?;

        Ok(subject_id)
    }

    /// Lift a platform ban. No infraction is recorded for an unban.
    pub async fn unban(&self, guild_id: GuildId, target_ref: &str) -> Result<UserId, Error> {
        let subject_id = parse_user_ref(target_ref)
            .ok_or_else(|| Error::TargetInvalid(target_ref.to_string()))?;

        if self.gateway.resolve(guild_id, subject_id).await.is_none() {
            return Err(Error::TargetAbsent);
        }

        self.gateway
            .unban(guild_id, subject_id)
            .await
            .map_err(Error::Enforcement)?;

        Ok(subject_id)
    }

    /// Steps shared by every action: resolve and validate the target, run the
    /// authorization sweep, persist the infraction (retrying id collisions
    /// internally), and send the best-effort notifications.
    async fn record(
        &self,
        guild_id: GuildId,
        actor: Actor,
        target_ref: &str,
        kind: InfractionKind,
        reason: Option<&str>,
    ) -> Result<Recorded, Error> {
        let subject_id = parse_user_ref(target_ref)
            .ok_or_else(|| Error::TargetInvalid(target_ref.to_string()))?;

        let actor_id = match actor {
            Actor::Moderator(id) => id,
            Actor::System => self.bot_user_id,
        };

        // The system actor is never a valid target; disciplining it would
        // have the system enforcing against itself.
        if subject_id == actor_id || subject_id == self.bot_user_id {
            return Err(Error::Unauthorized(DenyReason::SelfTarget));
        }

        let profile = self
            .gateway
            .resolve(guild_id, subject_id)
            .await
            .ok_or(Error::TargetAbsent)?;

        let actor_rank = match actor {
            Actor::Moderator(id) => self.gateway.highest_rank(guild_id, id).await,
            Actor::System => i64::MAX,
        };

        match may_act(
            actor_rank,
            actor_id.get(),
            profile.rank,
            subject_id.get(),
            profile.is_member,
        ) {
            Decision::Allow => {}
            Decision::Deny(deny) => return Err(Error::Unauthorized(deny)),
        }

        let infraction = self
            .insert_with_fresh_id(guild_id, subject_id, actor_id, kind, reason)
            .await?;

        info!(
            "Recorded {} {} for user {} by {} in guild {}",
            kind, infraction.id, subject_id, actor_id, guild_id
        );

        let dm_delivered = self.notify(guild_id, &infraction, subject_id, actor_id).await;

        Ok(Recorded {
            id: infraction.id,
            subject_id,
            is_member: profile.is_member,
            reason: infraction.reason,
            dm_delivered,
        })
    }

    /// Allocate an id and insert. The store's atomic check-then-insert is the
    /// collision guard; a `Conflict` simply means regenerate and try again,
    /// invisible to the caller.
    async fn insert_with_fresh_id(
        &self,
        guild_id: GuildId,
        subject_id: UserId,
        actor_id: UserId,
        kind: InfractionKind,
        reason: Option<&str>,
    ) -> Result<Infraction, Error> {
        loop {
            let rec = Infraction::new(
                infraction_id::generate(),
                guild_id.get() as i64,
                subject_id.to_string(),
                actor_id.to_string(),
                kind,
                reason,
                Utc::now().timestamp(),
            );

            match self.store.insert_infraction(&rec).await {
                Ok(()) => return Ok(rec),
                Err(StoreError::Conflict) => {
                    warn!("Infraction id collision on {}, regenerating", rec.id);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Best-effort notifications: the guild's infraction log channel and a DM
    /// to the subject. Neither can fail the action.
    async fn notify(
        &self,
        guild_id: GuildId,
        infraction: &Infraction,
        subject_id: UserId,
        actor_id: UserId,
    ) -> bool {
        let notice = InfractionNotice {
            infraction_id: infraction.id.clone(),
            kind: infraction.kind,
            subject_id,
            actor_id,
            reason: infraction.reason.clone(),
        };

        match self
            .store
            .get_config(guild_id.get() as i64, INFRACTION_LOG_PROPERTY)
            .await
        {
            Ok(Some(value)) => match value.parse::<u64>() {
                Ok(id) if id != 0 => {
                    if !self.gateway.post_log(ChannelId::new(id), &notice).await {
                        warn!("Could not post infraction {} to the log channel", notice.infraction_id);
                    }
                }
                _ => warn!(
                    "Guild {} has a malformed infraction-log channel {:?}",
                    guild_id, value
                ),
            },
            Ok(None) => {}
            Err(e) => warn!("Could not read infraction-log config: {}", e),
        }

        let delivered = self.gateway.notify_subject(subject_id, &notice).await;
        if !delivered {
            debug!("Could not DM user {} about infraction {}", subject_id, notice.infraction_id);
        }
        delivered
    }

    async fn mute_role(&self, guild_id: GuildId) -> Result<RoleId, Error> {
        match self
            .store
            .get_config(guild_id.get() as i64, MUTE_ROLE_PROPERTY)
            .await?
        {
            Some(value) => match value.parse::<u64>() {
                Ok(id) if id != 0 => Ok(RoleId::new(id)),
                _ => Err(Error::ConfigMissing(MUTE_ROLE_PROPERTY)),
            },
            None => Err(Error::ConfigMissing(MUTE_ROLE_PROPERTY)),
        }
    }
}

impl Recorded {
    fn into_outcome(self) -> ActionOutcome {
        ActionOutcome {
            infraction_id: self.id,
            subject_id: self.subject_id,
            reason: self.reason,
            dm_delivered: self.dm_delivered,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::constants::moderation::DEFAULT_REASON;
    use crate::services::moderation::gateway::EnforcementError;
    use crate::services::moderation::testing::{MemStore, MockGateway};

    const GUILD: u64 = 1;
    const MOD: u64 = 100;
    const USER: u64 = 200;
    const BOT: u64 = 999;

    fn engine_with(
        store: Arc<MemStore>,
        gateway: Arc<MockGateway>,
    ) -> (ActionEngine, Arc<MuteScheduler>) {
        let scheduler = Arc::new(MuteScheduler::new(store.clone(), gateway.clone()));
        let engine = ActionEngine::new(
            store,
            gateway,
            scheduler.clone(),
            UserId::new(BOT),
        );
        (engine, scheduler)
    }

    fn default_setup() -> (Arc<MemStore>, Arc<MockGateway>, ActionEngine) {
        let store = Arc::new(MemStore::new());
        store.set_config(GUILD as i64, MUTE_ROLE_PROPERTY, "555");
        let gateway = Arc::new(
            MockGateway::new()
                .with_member(MOD, 3)
                .with_member(USER, 2),
        );
        let (engine, _) = engine_with(store.clone(), gateway.clone());
        (store, gateway, engine)
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_warn_records_infraction_and_notifies() {
        let (store, gateway, engine) = default_setup();

        let outcome = engine
            .warn(
                GuildId::new(GUILD),
                Actor::Moderator(UserId::new(MOD)),
                &USER.to_string(),
                Some("spam"),
            )
            .await
            .unwrap();

        let stored = store.infraction(&outcome.infraction_id).unwrap();
        assert_eq!(stored.kind, InfractionKind::Warn);
        assert_eq!(stored.subject_id, USER.to_string());
        assert_eq!(stored.actor_id, MOD.to_string());
        assert_eq!(stored.reason, "spam");
        assert!(outcome.dm_delivered);
        assert_eq!(gateway.dms.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_reason_gets_default() {
        let (store, _, engine) = default_setup();

        let outcome = engine
            .warn(
                GuildId::new(GUILD),
                Actor::Moderator(UserId::new(MOD)),
                &USER.to_string(),
                None,
            )
            .await
            .unwrap();

        assert_eq!(store.infraction(&outcome.infraction_id).unwrap().reason, DEFAULT_REASON);
    }

    #[tokio::test]
    async fn test_garbage_target_ref_is_invalid() {
        let (_, _, engine) = default_setup();

        let err = engine
            .warn(
                GuildId::new(GUILD),
                Actor::Moderator(UserId::new(MOD)),
                "not-a-user",
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::TargetInvalid(_)));
    }

    #[tokio::test]
    async fn test_unknown_target_is_absent() {
        let (_, _, engine) = default_setup();

        let err = engine
            .warn(
                GuildId::new(GUILD),
                Actor::Moderator(UserId::new(MOD)),
                "123456789",
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::TargetAbsent));
    }

    #[tokio::test]
    async fn test_self_target_is_denied() {
        let (store, _, engine) = default_setup();

        let err = engine
            .warn(
                GuildId::new(GUILD),
                Actor::Moderator(UserId::new(MOD)),
                &MOD.to_string(),
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Unauthorized(DenyReason::SelfTarget)));
        assert!(store.list_infractions(GUILD as i64).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_equal_rank_is_denied() {
        let store = Arc::new(MemStore::new());
        let gateway = Arc::new(
            MockGateway::new()
                .with_member(MOD, 3)
                .with_member(USER, 3),
        );
        let (engine, _) = engine_with(store.clone(), gateway);

        let err = engine
            .warn(
                GuildId::new(GUILD),
                Actor::Moderator(UserId::new(MOD)),
                &USER.to_string(),
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Unauthorized(DenyReason::InsufficientRank)));
        assert!(store.list_infractions(GUILD as i64).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_system_actor_bypasses_rank_sweep() {
        let store = Arc::new(MemStore::new());
        let gateway = Arc::new(MockGateway::new().with_member(USER, 1_000_000));
        let (engine, _) = engine_with(store.clone(), gateway);

        let outcome = engine
            .warn(GuildId::new(GUILD), Actor::System, &USER.to_string(), Some("automod"))
            .await
            .unwrap();

        assert_eq!(
            store.infraction(&outcome.infraction_id).unwrap().actor_id,
            BOT.to_string()
        );
    }

    #[tokio::test]
    async fn test_kick_failure_keeps_infraction_recorded() {
        let (store, gateway, engine) = default_setup();
        gateway.fail_enforcement_with(EnforcementError::Forbidden);

        let err = engine
            .kick(
                GuildId::new(GUILD),
                Actor::Moderator(UserId::new(MOD)),
                &USER.to_string(),
                Some("bye"),
            )
            .await
            .unwrap_err();

        // Recorded but not enforced: the audit trail survives
        match err {
            Error::EnforcementAfterRecord { id, source } => {
                assert_eq!(source, EnforcementError::Forbidden);
                assert!(store.infraction(&id).is_some());
            }
            other => panic!("expected EnforcementAfterRecord, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_kick_requires_membership() {
        let store = Arc::new(MemStore::new());
        let gateway = Arc::new(
            MockGateway::new()
                .with_member(MOD, 3)
                .with_non_member(USER),
        );
        let (engine, _) = engine_with(store.clone(), gateway.clone());

        let err = engine
            .kick(
                GuildId::new(GUILD),
                Actor::Moderator(UserId::new(MOD)),
                &USER.to_string(),
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::TargetAbsent));
        // Audit-first: the infraction was still recorded
        assert_eq!(store.list_infractions(GUILD as i64).await.unwrap().len(), 1);
        assert_eq!(gateway.kicks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_mute_without_role_configured() {
        let store = Arc::new(MemStore::new());
        let gateway = Arc::new(
            MockGateway::new()
                .with_member(MOD, 3)
                .with_member(USER, 2),
        );
        let (engine, _) = engine_with(store.clone(), gateway);

        let err = engine
            .mute(
                GuildId::new(GUILD),
                Actor::Moderator(UserId::new(MOD)),
                &USER.to_string(),
                60,
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ConfigMissing(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_mute_expires_once() {
        let (store, gateway, engine) = default_setup();

        let outcome = engine
            .mute(
                GuildId::new(GUILD),
                Actor::Moderator(UserId::new(MOD)),
                &USER.to_string(),
                5,
                Some("spam"),
            )
            .await
            .unwrap();

        assert_eq!(gateway.role_adds.load(Ordering::SeqCst), 1);
        let active = store
            .get_active_mute(GUILD as i64, &USER.to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.infraction_id, outcome.infraction_id);

        tokio::time::sleep(Duration::from_secs(6)).await;
        settle().await;

        assert!(!store.mute(&outcome.infraction_id).unwrap().active);
        assert!(store
            .get_active_mute(GUILD as i64, &USER.to_string())
            .await
            .unwrap()
            .is_none());
        assert_eq!(gateway.role_removals.load(Ordering::SeqCst), 1);

        // Nothing left to fire twice
        tokio::time::sleep(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(gateway.role_removals.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_permanent_mute_registers_no_record() {
        let (store, gateway, engine) = default_setup();

        let outcome = engine
            .mute(
                GuildId::new(GUILD),
                Actor::Moderator(UserId::new(MOD)),
                &USER.to_string(),
                0,
                None,
            )
            .await
            .unwrap();

        assert_eq!(gateway.role_adds.load(Ordering::SeqCst), 1);
        assert!(store.mute(&outcome.infraction_id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_mute_supersedes_active_one() {
        let (store, gateway, engine) = default_setup();

        let first = engine
            .mute(
                GuildId::new(GUILD),
                Actor::Moderator(UserId::new(MOD)),
                &USER.to_string(),
                600,
                None,
            )
            .await
            .unwrap();

        let second = engine
            .mute(
                GuildId::new(GUILD),
                Actor::Moderator(UserId::new(MOD)),
                &USER.to_string(),
                5,
                None,
            )
            .await
            .unwrap();

        assert!(!store.mute(&first.infraction_id).unwrap().active);
        assert!(store.mute(&second.infraction_id).unwrap().active);

        tokio::time::sleep(Duration::from_secs(700)).await;
        settle().await;

        // Only the superseding mute's expiry removed the role
        assert_eq!(gateway.role_removals.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmute_cancels_scheduled_expiry() {
        let (store, gateway, engine) = default_setup();

        let outcome = engine
            .mute(
                GuildId::new(GUILD),
                Actor::Moderator(UserId::new(MOD)),
                &USER.to_string(),
                60,
                None,
            )
            .await
            .unwrap();

        engine
            .unmute(GuildId::new(GUILD), &USER.to_string())
            .await
            .unwrap();

        assert!(!store.mute(&outcome.infraction_id).unwrap().active);
        assert_eq!(gateway.role_removals.load(Ordering::SeqCst), 1);

        // The discarded timer must not remove the role a second time
        tokio::time::sleep(Duration::from_secs(120)).await;
        settle().await;
        assert_eq!(gateway.role_removals.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unban_of_unbanned_user_reports_not_found() {
        let (_, gateway, engine) = default_setup();
        gateway.fail_enforcement_with(EnforcementError::NotFound);

        let err = engine
            .unban(GuildId::new(GUILD), &USER.to_string())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Enforcement(EnforcementError::NotFound)));
    }
}
