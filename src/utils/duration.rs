use crate::constants::moderation::MAX_TIMED_MUTE_SECS;

/// Parse a mute duration argument: a bare integer is seconds, and the
/// suffixes `s`, `m`, `h` scale accordingly. Returns 0 (permanent) for
/// anything unparsable, and clamps absurd durations to permanent as well.
pub fn parse_mute_duration(arg: &str) -> u64 {
    let arg = arg.trim();

    let secs = match arg.chars().last() {
        Some(unit @ ('s' | 'm' | 'h')) => {
            let factor = match unit {
                's' => 1,
                'm' => 60,
                _ => 3600,
            };
            arg[..arg.len() - 1].parse::<u64>().map(|n| n * factor)
        }
        _ => arg.parse::<u64>(),
    }
    .unwrap_or(0);

    if secs >= MAX_TIMED_MUTE_SECS {
        0
    } else {
        secs
    }
}

/// Format a duration in seconds for display
pub fn format_duration(total_secs: u64) -> String {
    if total_secs < 60 {
        format!("{} second{}", total_secs, if total_secs == 1 { "" } else { "s" })
    } else if total_secs < 3600 {
        let mins = total_secs / 60;
        format!("{} minute{}", mins, if mins == 1 { "" } else { "s" })
    } else if total_secs < 86400 {
        let hours = total_secs / 3600;
        format!("{} hour{}", hours, if hours == 1 { "" } else { "s" })
    } else {
        let days = total_secs / 86400;
        format!("{} day{}", days, if days == 1 { "" } else { "s" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_integer_is_seconds() {
        assert_eq!(parse_mute_duration("90"), 90);
        assert_eq!(parse_mute_duration(" 5 "), 5);
    }

    #[test]
    fn test_suffixes() {
        assert_eq!(parse_mute_duration("30s"), 30);
        assert_eq!(parse_mute_duration("5m"), 300);
        assert_eq!(parse_mute_duration("2h"), 7200);
    }

    #[test]
    fn test_unparsable_means_permanent() {
        assert_eq!(parse_mute_duration("forever"), 0);
        assert_eq!(parse_mute_duration(""), 0);
        assert_eq!(parse_mute_duration("-5"), 0);
        assert_eq!(parse_mute_duration("5d"), 0);
    }

    #[test]
    fn test_absurd_durations_clamp_to_permanent() {
        assert_eq!(parse_mute_duration("256h"), 0);
        assert_eq!(parse_mute_duration("999999999"), 0);
        // Just under the cap is still a timed mute
        assert_eq!(parse_mute_duration("255h"), 255 * 3600);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(45), "45 seconds");
        assert_eq!(format_duration(60), "1 minute");
        assert_eq!(format_duration(7200), "2 hours");
        assert_eq!(format_duration(86400), "1 day");
    }
}
