//! In-memory store and mock platform gateway for exercising the moderation
//! core without Postgres or Discord.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serenity::all::{ChannelId, GuildId, RoleId, UserId};

use crate::db::models::{Infraction, MuteRecord};
use crate::services::moderation::gateway::{
    EnforcementError, InfractionNotice, ModerationGateway, TargetProfile,
};
use crate::services::moderation::store::{ModerationStore, StoreError};

#[derive(Default)]
pub struct MemStore {
    infractions: Mutex<HashMap<String, Infraction>>,
    mutes: Mutex<HashMap<String, MuteRecord>>,
    config: Mutex<HashMap<(i64, String), String>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_config(&self, guild_id: i64, property: &str, value: &str) {
        self.config
            .lock()
            .unwrap()
            .insert((guild_id, property.to_string()), value.to_string());
    }

    pub fn seed_infraction(&self, rec: Infraction) {
        self.infractions.lock().unwrap().insert(rec.id.clone(), rec);
    }

    pub fn seed_mute(&self, rec: MuteRecord) {
        self.mutes.lock().unwrap().insert(rec.infraction_id.clone(), rec);
    }

    pub fn infraction(&self, id: &str) -> Option<Infraction> {
        self.infractions.lock().unwrap().get(id).cloned()
    }

    pub fn mute(&self, infraction_id: &str) -> Option<MuteRecord> {
        self.mutes.lock().unwrap().get(infraction_id).cloned()
    }
}

#[async_trait]
impl ModerationStore for MemStore {
    async fn insert_infraction(&self, rec: &Infraction) -> Result<(), StoreError> {
        let mut map = self.infractions.lock().unwrap();
        if map.contains_key(&rec.id) {
            return Err(StoreError::Conflict);
        }
        map.insert(rec.id.clone(), rec.clone());
        Ok(())
    }

    async fn get_infraction(
        &self,
        guild_id: i64,
        id: &str,
    ) -> Result<Option<Infraction>, StoreError> {
        Ok(self
            .infractions
            .lock()
            .unwrap()
            .get(id)
            .filter(|rec| rec.guild_id == guild_id)
            .cloned())
    }

    async fn delete_infraction(&self, guild_id: i64, id: &str) -> Result<bool, StoreError> {
        let mut map = self.infractions.lock().unwrap();
        match map.get(id) {
            Some(rec) if rec.guild_id == guild_id => {
                map.remove(id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_infractions(&self, guild_id: i64) -> Result<Vec<Infraction>, StoreError> {
        Ok(self
            .infractions
            .lock()
            .unwrap()
            .values()
            .filter(|rec| rec.guild_id == guild_id)
            .cloned()
            .collect())
    }

    async fn upsert_mute(&self, rec: &MuteRecord) -> Result<(), StoreError> {
        self.mutes
            .lock()
            .unwrap()
            .insert(rec.infraction_id.clone(), rec.clone());
        Ok(())
    }

    async fn get_active_mute(
        &self,
        guild_id: i64,
        subject_id: &str,
    ) -> Result<Option<MuteRecord>, StoreError> {
        Ok(self
            .mutes
            .lock()
            .unwrap()
            .values()
            .filter(|rec| rec.guild_id == guild_id && rec.subject_id == subject_id && rec.active)
            .max_by_key(|rec| rec.expires_at)
            .cloned())
    }

    async fn deactivate_mute(&self, infraction_id: &str) -> Result<bool, StoreError> {
        let mut map = self.mutes.lock().unwrap();
        match map.get_mut(infraction_id) {
            Some(rec) if rec.active => {
                rec.active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn deactivate_mutes_for_subject(
        &self,
        guild_id: i64,
        subject_id: &str,
    ) -> Result<Vec<String>, StoreError> {
        let mut map = self.mutes.lock().unwrap();
        let mut deactivated = Vec::new();
        for rec in map.values_mut() {
            if rec.guild_id == guild_id && rec.subject_id == subject_id && rec.active {
                rec.active = false;
                deactivated.push(rec.infraction_id.clone());
            }
        }
        Ok(deactivated)
    }

    async fn list_active_mutes(&self) -> Result<Vec<MuteRecord>, StoreError> {
        Ok(self
            .mutes
            .lock()
            .unwrap()
            .values()
            .filter(|rec| rec.active)
            .cloned()
            .collect())
    }

    async fn get_config(
        &self,
        guild_id: i64,
        property: &str,
    ) -> Result<Option<String>, StoreError> {
        Ok(self
            .config
            .lock()
            .unwrap()
            .get(&(guild_id, property.to_string()))
            .cloned())
    }
}

#[derive(Default)]
pub struct MockGateway {
    profiles: Mutex<HashMap<u64, TargetProfile>>,
    fail_enforcement: Mutex<Option<EnforcementError>>,
    pub kicks: AtomicUsize,
    pub bans: AtomicUsize,
    pub unbans: AtomicUsize,
    pub role_adds: AtomicUsize,
    pub role_removals: AtomicUsize,
    pub dms: AtomicUsize,
    pub log_posts: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_member(self, user_id: u64, rank: i64) -> Self {
        self.profiles
            .lock()
            .unwrap()
            .insert(user_id, TargetProfile { is_member: true, rank });
        self
    }

    pub fn with_non_member(self, user_id: u64) -> Self {
        self.profiles
            .lock()
            .unwrap()
            .insert(user_id, TargetProfile { is_member: false, rank: 0 });
        self
    }

    /// Make every subsequent enforcement effect fail with `e`.
    pub fn fail_enforcement_with(&self, e: EnforcementError) {
        *self.fail_enforcement.lock().unwrap() = Some(e);
    }

    fn enforce(&self, counter: &AtomicUsize) -> Result<(), EnforcementError> {
        if let Some(e) = *self.fail_enforcement.lock().unwrap() {
            return Err(e);
        }
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl ModerationGateway for MockGateway {
    async fn resolve(&self, _guild_id: GuildId, user_id: UserId) -> Option<TargetProfile> {
        self.profiles.lock().unwrap().get(&user_id.get()).copied()
    }

    async fn highest_rank(&self, _guild_id: GuildId, user_id: UserId) -> i64 {
        self.profiles
            .lock()
            .unwrap()
            .get(&user_id.get())
            .map(|p| p.rank)
            .unwrap_or(0)
    }

    async fn kick(
        &self,
        _guild_id: GuildId,
        _user_id: UserId,
        _reason: &str,
    ) -> Result<(), EnforcementError> {
        self.enforce(&self.kicks)
    }

    async fn ban(
        &self,
        _guild_id: GuildId,
        _user_id: UserId,
        _reason: &str,
    ) -> Result<(), EnforcementError> {
        self.enforce(&self.bans)
    }

    async fn unban(&self, _guild_id: GuildId, _user_id: UserId) -> Result<(), EnforcementError> {
        self.enforce(&self.unbans)
    }

    async fn add_mute_role(
        &self,
        _guild_id: GuildId,
        _user_id: UserId,
        _role_id: RoleId,
    ) -> Result<(), EnforcementError> {
        self.enforce(&self.role_adds)
    }

    async fn remove_mute_role(
        &self,
        _guild_id: GuildId,
        _user_id: UserId,
        _role_id: RoleId,
    ) -> Result<(), EnforcementError> {
        self.enforce(&self.role_removals)
    }

    async fn notify_subject(&self, _user_id: UserId, _notice: &InfractionNotice) -> bool {
        self.dms.fetch_add(1, Ordering::SeqCst);
        true
    }

    async fn post_log(&self, _channel_id: ChannelId, _notice: &InfractionNotice) -> bool {
        self.log_posts.fetch_add(1, Ordering::SeqCst);
        true
    }
}
