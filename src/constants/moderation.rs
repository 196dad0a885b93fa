/// Maximum stored length of an infraction reason, in characters.
pub const REASON_MAX_CHARS: usize = 1024;

/// Reason recorded when a moderator supplies none.
pub const DEFAULT_REASON: &str = "No Reason Specified";

/// Rendered-size budget for one page of search output. Discord caps messages
/// at 2000 characters; this leaves headroom for the page header and fences.
pub const SEARCH_PAGE_BUDGET: usize = 1900;

/// Alphabet for infraction ids. Uppercase alphanumerics with the confusable
/// glyphs (I, O, 0, 1) removed, so ids survive being read aloud or retyped.
pub const INFRACTION_ID_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Infraction id length. 32^8 candidate ids keeps the per-allocation
/// collision odds around 1e-9 at realistic infraction volumes.
pub const INFRACTION_ID_LEN: usize = 8;

/// Timed mutes at or above this many seconds are treated as permanent.
pub const MAX_TIMED_MUTE_SECS: u64 = 256 * 60 * 60;

/// Guild config property naming the role applied to muted members.
pub const MUTE_ROLE_PROPERTY: &str = "mute-role";

/// Guild config property naming the infraction log channel.
pub const INFRACTION_LOG_PROPERTY: &str = "infraction-log";
