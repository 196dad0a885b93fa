use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use serenity::all::{GuildId, RoleId, UserId};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::constants::moderation::MUTE_ROLE_PROPERTY;
use crate::db::models::MuteRecord;
use crate::services::moderation::gateway::ModerationGateway;
use crate::services::moderation::store::{ModerationStore, StoreError};

/// Attempts to flip the stored `active` flag when a timer fires. If the store
/// stays unavailable the record is left active and is picked up again by
/// startup recovery.
const FIRE_RETRY_ATTEMPTS: u32 = 3;
const FIRE_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Owns the live timers for active timed mutes. The timer set is a derived
/// cache: the store's active MuteRecords are authoritative, and `restore`
/// rebuilds every timer from them after a process restart.
pub struct MuteScheduler {
    store: Arc<dyn ModerationStore>,
    gateway: Arc<dyn ModerationGateway>,
    timers: DashMap<String, JoinHandle<()>>,
}

impl MuteScheduler {
    pub fn new(store: Arc<dyn ModerationStore>, gateway: Arc<dyn ModerationGateway>) -> Self {
        Self {
            store,
            gateway,
            timers: DashMap::new(),
        }
    }

    /// Rebuild timers from the store's active mutes. Deadlines already in the
    /// past fire immediately; a mute outlives the process that created it.
    pub async fn restore(self: &Arc<Self>) -> Result<usize, StoreError> {
        let active = self.store.list_active_mutes().await?;
        let count = active.len();

        for rec in active {
            self.schedule(&rec);
        }

        Ok(count)
    }

    /// Register a timer for one mute. Scheduling again for the same
    /// infraction id replaces the pending timer rather than duplicating it.
    pub fn schedule(self: &Arc<Self>, rec: &MuteRecord) {
        let delay = rec.expires_at.saturating_sub(Utc::now().timestamp()).max(0) as u64;

        if let Some((_, old)) = self.timers.remove(&rec.infraction_id) {
            old.abort();
            debug!("Replaced pending timer for mute {}", rec.infraction_id);
        }

        let scheduler = Arc::clone(self);
        let rec = rec.clone();
        let key = rec.infraction_id.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(delay)).await;
            scheduler.fire(rec).await;
        });

        self.timers.insert(key, handle);
    }

    /// Explicit early unmute. Idempotent: cancelling twice, or cancelling a
    /// mute that already fired, is a no-op. Returns whether this call
    /// performed the deactivation.
    pub async fn cancel_early(&self, infraction_id: &str) -> Result<bool, StoreError> {
        let deactivated = self.store.deactivate_mute(infraction_id).await?;

        self.discard_timer(infraction_id);

        if deactivated {
            info!("Mute {} cancelled early", infraction_id);
        }

        Ok(deactivated)
    }

    /// Drop a pending timer without touching the store. Used when the record
    /// was already deactivated through another path.
    pub fn discard_timer(&self, infraction_id: &str) {
        if let Some((_, handle)) = self.timers.remove(infraction_id) {
            handle.abort();
        }
    }

    /// Timer expiry. The stored `active` flag is the single-writer gate: the
    /// first of a concurrent fire/cancel pair to flip it wins, the loser
    /// observes `false` and does nothing.
    async fn fire(&self, rec: MuteRecord) {
        let won = match self.deactivate_with_retry(&rec.infraction_id).await {
            Some(won) => won,
            None => {
                error!(
                    "Could not deactivate mute {} at expiry; leaving it for startup recovery",
                    rec.infraction_id
                );
                self.timers.remove(&rec.infraction_id);
                return;
            }
        };

        if !won {
            debug!("Mute {} already deactivated, expiry is a no-op", rec.infraction_id);
            self.timers.remove(&rec.infraction_id);
            return;
        }

        info!(
            "Mute {} expired for user {} in guild {}",
            rec.infraction_id, rec.subject_id, rec.guild_id
        );

        self.lift_mute_role(&rec).await;
        self.timers.remove(&rec.infraction_id);
    }

    async fn deactivate_with_retry(&self, infraction_id: &str) -> Option<bool> {
        for attempt in 1..=FIRE_RETRY_ATTEMPTS {
            match self.store.deactivate_mute(infraction_id).await {
                Ok(won) => return Some(won),
                Err(e) => {
                    warn!(
                        "Deactivating mute {} failed (attempt {}/{}): {}",
                        infraction_id, attempt, FIRE_RETRY_ATTEMPTS, e
                    );
                    if attempt < FIRE_RETRY_ATTEMPTS {
                        tokio::time::sleep(FIRE_RETRY_DELAY).await;
                    }
                }
            }
        }
        None
    }

    /// Remove the mute role at expiry. Best-effort: the mute is over once the
    /// record is deactivated, so failures here are surfaced as warnings
    /// rather than resurrecting the mute.
    async fn lift_mute_role(&self, rec: &MuteRecord) {
        let role_id = match self.store.get_config(rec.guild_id, MUTE_ROLE_PROPERTY).await {
            Ok(Some(value)) => match value.parse::<u64>() {
                Ok(id) if id != 0 => RoleId::new(id),
                _ => {
                    warn!(
                        "Mute {} expired but the configured mute role {:?} is not a role id",
                        rec.infraction_id, value
                    );
                    return;
                }
            },
            Ok(None) => {
                warn!(
                    "Mute {} expired but guild {} has no mute role configured",
                    rec.infraction_id, rec.guild_id
                );
                return;
            }
            Err(e) => {
                warn!(
                    "Mute {} expired but the mute role could not be read: {}",
                    rec.infraction_id, e
                );
                return;
            }
        };

        let subject = match rec.subject_id.parse::<u64>() {
            Ok(id) if id != 0 => UserId::new(id),
            _ => {
                warn!(
                    "Mute {} has a malformed subject id {:?}",
                    rec.infraction_id, rec.subject_id
                );
                return;
            }
        };

        let guild = GuildId::new(rec.guild_id as u64);
        if let Err(e) = self.gateway.remove_mute_role(guild, subject, role_id).await {
            warn!(
                "Could not remove mute role from user {} after mute {} expired: {}",
                subject, rec.infraction_id, e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::services::moderation::testing::{MemStore, MockGateway};

    fn mute(infraction_id: &str, subject: &str, expires_at: i64) -> MuteRecord {
        MuteRecord {
            infraction_id: infraction_id.to_string(),
            guild_id: 1,
            subject_id: subject.to_string(),
            expires_at,
            active: true,
        }
    }

    fn scheduler_with(
        store: Arc<MemStore>,
        gateway: Arc<MockGateway>,
    ) -> Arc<MuteScheduler> {
        store.set_config(1, MUTE_ROLE_PROPERTY, "555");
        Arc::new(MuteScheduler::new(store, gateway))
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_mute_fires_once() {
        let store = Arc::new(MemStore::new());
        let gateway = Arc::new(MockGateway::new());
        let scheduler = scheduler_with(store.clone(), gateway.clone());

        let rec = mute("AB12CD34", "42", Utc::now().timestamp() + 5);
        store.upsert_mute(&rec).await.unwrap();
        scheduler.schedule(&rec);

        tokio::time::sleep(Duration::from_secs(6)).await;
        settle().await;

        assert!(!store.mute("AB12CD34").unwrap().active);
        assert_eq!(gateway.role_removals.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_early_is_idempotent() {
        let store = Arc::new(MemStore::new());
        let gateway = Arc::new(MockGateway::new());
        let scheduler = scheduler_with(store.clone(), gateway.clone());

        let rec = mute("AB12CD34", "42", Utc::now().timestamp() + 60);
        store.upsert_mute(&rec).await.unwrap();
        scheduler.schedule(&rec);

        assert!(scheduler.cancel_early("AB12CD34").await.unwrap());
        assert!(!scheduler.cancel_early("AB12CD34").await.unwrap());
        assert!(!store.mute("AB12CD34").unwrap().active);

        // The aborted timer must not fire later
        tokio::time::sleep(Duration::from_secs(120)).await;
        settle().await;
        assert_eq!(gateway.role_removals.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fire_after_cancel_is_noop() {
        let store = Arc::new(MemStore::new());
        let gateway = Arc::new(MockGateway::new());
        let scheduler = scheduler_with(store.clone(), gateway.clone());

        let rec = mute("AB12CD34", "42", Utc::now().timestamp() + 5);
        store.upsert_mute(&rec).await.unwrap();

        // Deactivated through another path before the timer fires
        assert!(store.deactivate_mute("AB12CD34").await.unwrap());

        scheduler.fire(rec).await;
        assert_eq!(gateway.role_removals.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_fires_overdue_mutes_immediately() {
        let store = Arc::new(MemStore::new());
        let gateway = Arc::new(MockGateway::new());

        // A mute that expired 10 seconds before "restart"
        store.seed_mute(mute("AB12CD34", "42", Utc::now().timestamp() - 10));

        let scheduler = scheduler_with(store.clone(), gateway.clone());
        let restored = scheduler.restore().await.unwrap();
        assert_eq!(restored, 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        settle().await;

        assert!(!store.mute("AB12CD34").unwrap().active);
        assert_eq!(gateway.role_removals.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_replaces_pending_timer() {
        let store = Arc::new(MemStore::new());
        let gateway = Arc::new(MockGateway::new());
        let scheduler = scheduler_with(store.clone(), gateway.clone());

        let long = mute("AB12CD34", "42", Utc::now().timestamp() + 600);
        store.upsert_mute(&long).await.unwrap();
        scheduler.schedule(&long);

        let short = mute("AB12CD34", "42", Utc::now().timestamp() + 5);
        store.upsert_mute(&short).await.unwrap();
        scheduler.schedule(&short);

        tokio::time::sleep(Duration::from_secs(700)).await;
        settle().await;

        // One live timer per infraction id: exactly one fire
        assert_eq!(gateway.role_removals.load(Ordering::SeqCst), 1);
        assert!(!store.mute("AB12CD34").unwrap().active);
    }
}
