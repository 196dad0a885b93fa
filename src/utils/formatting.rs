use serenity::all::UserId;

/// Format a user mention
pub fn mention_user(user_id: UserId) -> String {
    format!("<@{}>", user_id)
}

/// Parse a raw user reference: a bare id or a `<@...>` / `<@!...>` mention.
pub fn parse_user_ref(raw: &str) -> Option<UserId> {
    let stripped = raw
        .trim()
        .trim_start_matches(['<', '@', '!'])
        .trim_end_matches('>');

    stripped
        .parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .map(UserId::new)
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}
