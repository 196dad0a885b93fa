use crate::db::models::{Infraction, InfractionKind};

/// Conjunctive filters over a guild's infraction history.
#[derive(Debug, Default, Clone)]
pub struct SearchFilters {
    pub subject_id: Option<String>,
    pub actor_id: Option<String>,
    pub kind: Option<InfractionKind>,
    /// Actor id of the automated system; set to drop its infractions.
    pub exclude_actor: Option<String>,
}

#[derive(Debug)]
pub struct SearchResult {
    /// 1-based page actually returned (out-of-range requests fall back to 1).
    pub page: usize,
    pub total_pages: usize,
    pub total_matches: usize,
    pub lines: Vec<String>,
}

/// One rendered history line: "id, kind, reason".
pub fn format_line(rec: &Infraction) -> String {
    format!("{}, {}, {}", rec.id, rec.kind, rec.reason)
}

/// Filter, sort newest-first, and paginate a guild's infractions. Pages are
/// packed greedily against a rendered-size budget: a line that would push the
/// current page past the budget starts a new page, but a page always holds at
/// least one line, so nothing is ever split or dropped.
pub fn search(
    mut infractions: Vec<Infraction>,
    filters: &SearchFilters,
    page: usize,
    budget: usize,
) -> SearchResult {
    infractions.retain(|rec| {
        if let Some(subject) = &filters.subject_id {
            if &rec.subject_id != subject {
                return false;
            }
        }
        if let Some(actor) = &filters.actor_id {
            if &rec.actor_id != actor {
                return false;
            }
        }
        if let Some(kind) = filters.kind {
            if rec.kind != kind {
                return false;
            }
        }
        if let Some(automated) = &filters.exclude_actor {
            if &rec.actor_id == automated || rec.reason.contains("[AUTOMOD]") {
                return false;
            }
        }
        true
    });

    infractions.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let total_matches = infractions.len();
    let pages = paginate(infractions.iter().map(format_line), budget);
    let total_pages = pages.len();

    // 1-based page selection; anything out of range falls back to page 1
    let selected = if page >= 1 && page <= total_pages { page } else { 1 };
    let lines = pages.into_iter().nth(selected - 1).unwrap_or_default();

    SearchResult {
        page: selected,
        total_pages,
        total_matches,
        lines,
    }
}

fn paginate(lines: impl Iterator<Item = String>, budget: usize) -> Vec<Vec<String>> {
    let mut pages: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_size = 0;

    for line in lines {
        let rendered = line.len() + 1; // trailing newline
        if !current.is_empty() && current_size + rendered > budget {
            pages.push(std::mem::take(&mut current));
            current_size = 0;
        }
        current_size += rendered;
        current.push(line);
    }

    if !current.is_empty() {
        pages.push(current);
    }

    pages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infraction(id: &str, subject: &str, actor: &str, kind: InfractionKind, ts: i64) -> Infraction {
        Infraction::new(
            id.to_string(),
            1,
            subject.to_string(),
            actor.to_string(),
            kind,
            Some("spam"),
            ts,
        )
    }

    fn sample() -> Vec<Infraction> {
        vec![
            infraction("AAAA2222", "U1", "M1", InfractionKind::Warn, 100),
            infraction("BBBB3333", "U1", "M2", InfractionKind::Mute, 300),
            infraction("CCCC4444", "U2", "M1", InfractionKind::Ban, 200),
            infraction("DDDD5555", "U1", "BOT", InfractionKind::Warn, 400),
        ]
    }

    #[test]
    fn test_filters_are_conjunctive() {
        let filters = SearchFilters {
            subject_id: Some("U1".into()),
            actor_id: Some("M1".into()),
            ..Default::default()
        };
        let result = search(sample(), &filters, 1, 1900);
        assert_eq!(result.total_matches, 1);
        assert!(result.lines[0].starts_with("AAAA2222"));
    }

    #[test]
    fn test_results_are_newest_first() {
        let filters = SearchFilters {
            subject_id: Some("U1".into()),
            ..Default::default()
        };
        let result = search(sample(), &filters, 1, 1900);
        let ids: Vec<&str> = result
            .lines
            .iter()
            .map(|l| l.split(',').next().unwrap())
            .collect();
        assert_eq!(ids, vec!["DDDD5555", "BBBB3333", "AAAA2222"]);
    }

    #[test]
    fn test_automated_actor_excluded() {
        let filters = SearchFilters {
            subject_id: Some("U1".into()),
            exclude_actor: Some("BOT".into()),
            ..Default::default()
        };
        let result = search(sample(), &filters, 1, 1900);
        assert_eq!(result.total_matches, 2);
        assert!(result.lines.iter().all(|l| !l.starts_with("DDDD5555")));
    }

    #[test]
    fn test_pagination_splits_and_keeps_every_line() {
        // Budget small enough that the four lines cannot share one page
        let filters = SearchFilters::default();
        let all = search(sample(), &filters, 1, 40);
        assert!(all.total_pages >= 2);

        let mut seen = Vec::new();
        for page in 1..=all.total_pages {
            let result = search(sample(), &filters, page, 40);
            assert!(!result.lines.is_empty());
            seen.extend(result.lines);
        }
        assert_eq!(seen.len(), 4);
        for id in ["AAAA2222", "BBBB3333", "CCCC4444", "DDDD5555"] {
            assert_eq!(seen.iter().filter(|l| l.starts_with(id)).count(), 1);
        }
    }

    #[test]
    fn test_oversized_line_still_gets_a_page() {
        let mut rec = infraction("AAAA2222", "U1", "M1", InfractionKind::Warn, 100);
        rec.reason = "x".repeat(500);
        let result = search(vec![rec], &SearchFilters::default(), 1, 40);
        assert_eq!(result.total_pages, 1);
        assert_eq!(result.lines.len(), 1);
    }

    #[test]
    fn test_out_of_range_page_falls_back_to_first() {
        let filters = SearchFilters::default();
        let result = search(sample(), &filters, 99, 1900);
        assert_eq!(result.page, 1);
        assert!(!result.lines.is_empty());
    }

    #[test]
    fn test_no_matches() {
        let filters = SearchFilters {
            subject_id: Some("nobody".into()),
            ..Default::default()
        };
        let result = search(sample(), &filters, 1, 1900);
        assert_eq!(result.total_matches, 0);
        assert_eq!(result.total_pages, 0);
        assert!(result.lines.is_empty());
    }
}
