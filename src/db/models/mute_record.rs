/// Mutable mute state keyed by infraction id. `active` flips to false exactly
/// once, either when the scheduler fires expiry or when an explicit unmute
/// runs early; deactivated rows are retained for audit.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MuteRecord {
    pub infraction_id: String,
    pub guild_id: i64,
    pub subject_id: String,
    /// Absolute epoch second at which the mute must end.
    pub expires_at: i64,
    pub active: bool,
}

impl MuteRecord {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}
