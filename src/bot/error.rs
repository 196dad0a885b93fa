use thiserror::Error;

use crate::services::moderation::authorization::DenyReason;
use crate::services::moderation::gateway::EnforcementError;
use crate::services::moderation::store::StoreError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid user: {0}")]
    TargetInvalid(String),

    #[error("User does not exist")]
    TargetAbsent,

    #[error("Not allowed: {0}")]
    Unauthorized(DenyReason),

    #[error("Infraction ID does not exist: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Enforcement failed with no infraction on record (unban/unmute paths).
    #[error("Enforcement failed: {0}")]
    Enforcement(EnforcementError),

    /// The infraction was durably recorded before enforcement failed; callers
    /// can tell "recorded but not enforced" apart from "nothing happened".
    #[error("Infraction {id} was recorded, but enforcement failed: {source}")]
    EnforcementAfterRecord {
        id: String,
        #[source]
        source: EnforcementError,
    },

    #[error("ERROR: no {0} set for this guild")]
    ConfigMissing(&'static str),

    #[error("Discord API error: {0}")]
    Serenity(#[from] serenity::Error),

    #[error("{0}")]
    Custom(String),
}

impl Error {
    pub fn custom<S: Into<String>>(msg: S) -> Self {
        Error::Custom(msg.into())
    }
}
