use crate::constants::moderation::{DEFAULT_REASON, REASON_MAX_CHARS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfractionKind {
    Warn,
    Kick,
    Ban,
    Mute,
}

impl InfractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InfractionKind::Warn => "warn",
            InfractionKind::Kick => "kick",
            InfractionKind::Ban => "ban",
            InfractionKind::Mute => "mute",
        }
    }
}

impl std::fmt::Display for InfractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<String> for InfractionKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "warn" => Ok(InfractionKind::Warn),
            "kick" => Ok(InfractionKind::Kick),
            "ban" => Ok(InfractionKind::Ban),
            "mute" => Ok(InfractionKind::Mute),
            other => Err(format!("unknown infraction kind: {}", other)),
        }
    }
}

/// A durable audit record of one disciplinary action. Immutable after
/// creation; removed only by an explicit administrator delete.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Infraction {
    pub id: String,
    pub guild_id: i64,
    pub subject_id: String,
    pub actor_id: String,
    #[sqlx(try_from = "String")]
    pub kind: InfractionKind,
    pub reason: String,
    /// Seconds since epoch.
    pub created_at: i64,
}

impl Infraction {
    /// Build a new record, applying the reason default and length cap.
    pub fn new(
        id: String,
        guild_id: i64,
        subject_id: String,
        actor_id: String,
        kind: InfractionKind,
        reason: Option<&str>,
        created_at: i64,
    ) -> Self {
        let reason = match reason {
            Some(r) if !r.trim().is_empty() => r.chars().take(REASON_MAX_CHARS).collect(),
            _ => DEFAULT_REASON.to_string(),
        };

        Self {
            id,
            guild_id,
            subject_id,
            actor_id,
            kind,
            reason,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_defaults_when_missing() {
        let rec = Infraction::new(
            "AB12CD34".into(),
            1,
            "2".into(),
            "3".into(),
            InfractionKind::Warn,
            None,
            1000,
        );
        assert_eq!(rec.reason, DEFAULT_REASON);

        let rec = Infraction::new(
            "AB12CD34".into(),
            1,
            "2".into(),
            "3".into(),
            InfractionKind::Warn,
            Some("   "),
            1000,
        );
        assert_eq!(rec.reason, DEFAULT_REASON);
    }

    #[test]
    fn test_reason_truncated_to_cap() {
        let long = "x".repeat(REASON_MAX_CHARS + 100);
        let rec = Infraction::new(
            "AB12CD34".into(),
            1,
            "2".into(),
            "3".into(),
            InfractionKind::Ban,
            Some(&long),
            1000,
        );
        assert_eq!(rec.reason.chars().count(), REASON_MAX_CHARS);
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            InfractionKind::Warn,
            InfractionKind::Kick,
            InfractionKind::Ban,
            InfractionKind::Mute,
        ] {
            assert_eq!(InfractionKind::try_from(kind.as_str().to_string()), Ok(kind));
        }
        assert!(InfractionKind::try_from("yeet".to_string()).is_err());
    }
}
