//! URL and company-name normalization, used throughout spawn safety, URL
//! uniqueness (spec §3, §8 property 3), and company canonicalization
//! (supplement #4).
//!
//! Grounded on `listing_evaluator.rs`'s `calculate_fingerprint`, which
//! lowercases and trims org/title strings before comparing them.

use sha2::{Digest, Sha256};
use url::Url;

/// Normalize a URL for dedup/uniqueness comparisons: lowercase scheme/host,
/// drop a trailing slash, drop the fragment, and strip common tracking query
/// parameters. Unparseable input is returned trimmed and lowercased as a
/// best-effort fallback rather than erroring, since this function feeds
/// comparisons, not validation.
pub fn normalize_url(raw: &str) -> String {
    const TRACKING_PARAMS: &[&str] = &[
        "utm_source",
        "utm_medium",
        "utm_campaign",
        "utm_term",
        "utm_content",
        "gh_src",
        "ref",
        "source",
    ];

    let Ok(mut url) = Url::parse(raw.trim()) else {
        return raw.trim().to_lowercase();
    };

    url.set_fragment(None);

    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.to_lowercase().as_str()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if retained.is_empty() {
        url.set_query(None);
    } else {
        let query = retained
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        url.set_query(Some(&query));
    }

    let mut path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        path.pop();
        url.set_path(&path);
    }

    let mut normalized = url.to_string().to_lowercase();
    if normalized.ends_with('/') && url.path() == "/" {
        normalized.pop();
    }
    normalized
}

/// Lowercase, trim, and collapse internal whitespace, matching
/// `calculate_fingerprint`'s string normalization for org/title comparisons.
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// SHA256 fingerprint of normalized fields, for dedup beyond plain URL
/// comparison (spec §9 open question: URL-alone vs. `(title, company)`
/// tuple). We fingerprint both the URL and the `(title, company)` tuple so
/// either detector can be swapped in by the caller without re-deriving it.
pub fn fingerprint(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(b"\u{1}");
        }
        hasher.update(normalize_text(part).as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Strip common legal suffixes before comparing company names, so "Acme
/// Inc." and "Acme" canonicalize to the same key.
pub fn normalize_company_name(raw: &str) -> String {
    const SUFFIXES: &[&str] = &[
        "inc.", "inc", "llc", "llc.", "ltd", "ltd.", "corp", "corp.", "corporation", "co.", "company",
        "plc", "gmbh", "ag", "sa", "pty ltd",
    ];
    let lower = normalize_text(raw);
    let mut stripped = lower.clone();
    for suffix in SUFFIXES {
        if let Some(prefix) = stripped.strip_suffix(suffix) {
            let trimmed = prefix.trim_end_matches([',', ' ']);
            if !trimmed.is_empty() {
                stripped = trimmed.to_string();
                break;
            }
        }
    }
    stripped
}

/// Built-in job-board-to-canonical-name map (spec §4.7 step 2, supplement
/// #4). Job-board vendor subdomains carry a short or internal name (`mdlz`)
/// that needs mapping to the real company name before search/enrichment.
/// Keyed by the lowercase vendor subdomain token found in the hint URL.
pub fn canonical_name_for_hint_url(hint_url: &str, fallback_name: &str) -> String {
    let lower = hint_url.to_lowercase();
    for (needle, canonical) in KNOWN_JOB_BOARD_ALIASES {
        if lower.contains(needle) {
            return canonical.to_string();
        }
    }
    fallback_name.to_string()
}

const KNOWN_JOB_BOARD_ALIASES: &[(&str, &str)] = &[
    ("mdlz.wd1.myworkdayjobs.com", "Mondelez International"),
    ("ge.wd5.myworkdayjobs.com", "General Electric"),
    ("jpmc.wd5.myworkdayjobs.com", "JPMorgan Chase"),
    ("ibm.wd5.myworkdayjobs.com", "IBM"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_tracking_params_and_trailing_slash() {
        let a = normalize_url("https://Example.com/jobs/123/?utm_source=linkedin&utm_medium=x");
        let b = normalize_url("https://example.com/jobs/123");
        assert_eq!(a, b);
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize_url("https://example.com/jobs/123?ref=abc");
        let twice = normalize_url(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn normalize_retains_non_tracking_query_params() {
        let normalized = normalize_url("https://example.com/jobs?page=2");
        assert!(normalized.contains("page=2"));
    }

    #[test]
    fn company_name_strips_legal_suffix() {
        assert_eq!(normalize_company_name("Acme Inc."), "acme");
        assert_eq!(normalize_company_name("Acme, LLC"), "acme");
        assert_eq!(normalize_company_name("Acme"), "acme");
    }

    #[test]
    fn fingerprint_is_deterministic_and_case_insensitive() {
        let a = fingerprint(&["Senior Engineer", "Acme Inc."]);
        let b = fingerprint(&["senior engineer", "acme inc."]);
        assert_eq!(a, b);
    }

    #[test]
    fn known_job_board_alias_resolves() {
        let name = canonical_name_for_hint_url("https://mdlz.wd1.myworkdayjobs.com/en-US/mdlz", "mdlz");
        assert_eq!(name, "Mondelez International");
    }

    #[test]
    fn unknown_hint_url_falls_back() {
        let name = canonical_name_for_hint_url("https://careers.example.com", "Example Co");
        assert_eq!(name, "Example Co");
    }
}
