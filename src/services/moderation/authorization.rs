use std::fmt;

/// Why an action was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    SelfTarget,
    InsufficientRank,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::SelfTarget => write!(f, "you cannot act on yourself"),
            DenyReason::InsufficientRank => {
                write!(f, "cannot act on a user with the same or higher role as yourself")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

/// Decide whether an actor may act on a target. Ranks are each party's
/// highest role rank; equal rank is denied, so peers cannot act on each
/// other. Non-members carry no rank and are not subject to the rank sweep.
pub fn may_act(
    actor_rank: i64,
    actor_id: u64,
    target_rank: i64,
    target_id: u64,
    target_is_member: bool,
) -> Decision {
    if actor_id == target_id {
        return Decision::Deny(DenyReason::SelfTarget);
    }

    if target_is_member && actor_rank <= target_rank {
        return Decision::Deny(DenyReason::InsufficientRank);
    }

    Decision::Allow
}
