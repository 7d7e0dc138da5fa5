//! Pure merge helpers for folding enrichment and AI extraction results into a
//! `Company` record (spec §4.7 step 6). Each is deterministic and idempotent:
//! feeding the same candidates twice never changes the result, which is what
//! the round-trip law in spec §8 requires of the Company Processor as a
//! whole.

const THIRD_PARTY_DOMAINS: &[&str] = &[
    "linkedin.com",
    "indeed.com",
    "glassdoor.com",
    "google.com",
    "bing.com",
    "duckduckgo.com",
    "greenhouse.io",
    "lever.co",
    "myworkdayjobs.com",
    "ziprecruiter.com",
    "monster.com",
];

/// Longest non-empty value wins, current value included in the comparison so
/// a field already populated is never shortened by a weaker source.
pub fn keep_longer(current: Option<&str>, candidates: &[Option<&str>]) -> Option<String> {
    let mut best: Option<&str> = current.filter(|s| !s.trim().is_empty());
    for candidate in candidates {
        if let Some(text) = candidate {
            if text.trim().is_empty() {
                continue;
            }
            if best.map(|b| text.len() > b.len()).unwrap_or(true) {
                best = Some(text);
            }
        }
    }
    best.map(str::to_string)
}

/// Whether `url`'s host is a known job board, search engine, or ATS rather
/// than a company's own site. Unparseable or hostless URLs are treated as
/// third-party, since we can't confirm they're first-party either.
pub fn is_third_party_domain(url: &str) -> bool {
    let Ok(parsed) = url::Url::parse(url) else {
        return true;
    };
    let Some(host) = parsed.host_str() else {
        return true;
    };
    THIRD_PARTY_DOMAINS
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
}

/// Prefers a first-party website over a job-board/search-engine URL. The
/// current value is only replaced when it is itself third-party and a
/// candidate offers a first-party alternative; otherwise falls back to
/// `fill_empty` semantics.
pub fn pick_best_website(current: Option<&str>, candidates: &[Option<&str>]) -> Option<String> {
    if let Some(url) = current {
        if !url.trim().is_empty() && !is_third_party_domain(url) {
            return Some(url.to_string());
        }
    }
    let mut first_party = None;
    let mut any = current.filter(|s| !s.trim().is_empty());
    for candidate in candidates {
        let Some(url) = candidate else { continue };
        if url.trim().is_empty() {
            continue;
        }
        if any.is_none() {
            any = Some(*url);
        }
        if first_party.is_none() && !is_third_party_domain(url) {
            first_party = Some(*url);
        }
    }
    first_party.or(any).map(str::to_string)
}

/// First non-`None` candidate wins; the current value, if present, always
/// takes priority so a confirmed field is never overwritten by a guess.
pub fn fill_empty<T: Clone>(current: Option<T>, candidates: Vec<Option<T>>) -> Option<T> {
    if current.is_some() {
        return current;
    }
    candidates.into_iter().flatten().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_longer_prefers_length_over_source_order() {
        let result = keep_longer(Some("short"), &[Some("a much longer description here")]);
        assert_eq!(result.as_deref(), Some("a much longer description here"));
    }

    #[test]
    fn keep_longer_ignores_blank_candidates() {
        let result = keep_longer(None, &[Some(""), Some("real text")]);
        assert_eq!(result.as_deref(), Some("real text"));
    }

    #[test]
    fn pick_best_website_prefers_first_party_over_linkedin() {
        let result = pick_best_website(
            Some("https://www.linkedin.com/company/acme"),
            &[Some("https://acme.com")],
        );
        assert_eq!(result.as_deref(), Some("https://acme.com"));
    }

    #[test]
    fn pick_best_website_keeps_current_first_party_value() {
        let result = pick_best_website(Some("https://acme.com"), &[Some("https://www.glassdoor.com/acme")]);
        assert_eq!(result.as_deref(), Some("https://acme.com"));
    }

    #[test]
    fn fill_empty_first_non_none_candidate_wins() {
        let result = fill_empty(None, vec![None, Some(42u64), Some(7u64)]);
        assert_eq!(result, Some(42));
    }

    #[test]
    fn fill_empty_never_overwrites_current() {
        let result = fill_empty(Some(1u64), vec![Some(99u64)]);
        assert_eq!(result, Some(1));
    }

    #[test]
    fn merge_is_idempotent_when_rerun_with_same_inputs() {
        let first = keep_longer(None, &[Some("about text")]);
        let second = keep_longer(first.as_deref(), &[Some("about text")]);
        assert_eq!(first, second);
    }
}
