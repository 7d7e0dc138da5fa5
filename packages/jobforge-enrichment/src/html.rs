//! HTML fetch and bounded sampling (spec §4.4).
//!
//! Grounded on `simple_scraper.rs`'s user-agent spoofing and content-area
//! selector list, and on `firecrawl_client.rs`'s direct-reqwest approach
//! (no wrapper SDK crate).

use scraper::{Html, Selector};
use tracing::instrument;

use crate::error::{EnrichmentError, Result};

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Selectors tried in order when hunting for the main content area of a
/// page, same list and order as `simple_scraper.rs::extract_main_content`.
const CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[role=main]",
    "#content",
    "#main",
    ".content",
    ".main",
    ".post-content",
    ".entry-content",
];

#[derive(Debug, Clone)]
pub struct HtmlSample {
    pub status: u16,
    pub final_url: String,
    pub body: String,
    pub truncated: bool,
}

pub struct HtmlFetchConfig {
    pub timeout_seconds: u64,
    pub user_agent: String,
    pub max_redirects: usize,
    pub max_sample_length: usize,
}

impl Default for HtmlFetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 15,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_redirects: 5,
            max_sample_length: 20_000,
        }
    }
}

pub struct HtmlFetchClient {
    http: reqwest::Client,
    config: HtmlFetchConfig,
}

impl HtmlFetchClient {
    pub fn new(config: HtmlFetchConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;
        Ok(Self { http, config })
    }

    /// Fetch `url`, return status + body capped at `max_html_sample_length`
    /// (spec §4.4 "HTML fetch"). Off-host redirects beyond `max_redirects`
    /// are refused by the client's redirect policy, surfacing as a network
    /// error rather than silently following further.
    #[instrument(skip(self), fields(url))]
    pub async fn fetch(&self, url: &str) -> Result<HtmlSample> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status().as_u16();
        let final_url = resp.url().to_string();
        let body = resp.text().await?;

        let truncated = body.len() > self.config.max_sample_length;
        let body = if truncated {
            truncate_to_char_boundary(&body, self.config.max_sample_length)
        } else {
            body
        };

        Ok(HtmlSample {
            status,
            final_url,
            body,
            truncated,
        })
    }
}

fn truncate_to_char_boundary(s: &str, max_len: usize) -> String {
    let mut end = max_len.min(s.len());
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// Best-effort extraction of the page title, independent of content-area
/// selection below.
pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Try each content-area selector in order, return the first non-empty
/// match's text content; falls back to the whole document's text if none
/// match (spec §4.7 step 5, "sample the candidate website").
pub fn extract_main_content(html: &str) -> String {
    let document = Html::parse_document(html);

    for raw_selector in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(raw_selector) else {
            continue;
        };
        if let Some(el) = document.select(&selector).next() {
            let text: String = el.text().collect::<Vec<_>>().join(" ");
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if !text.is_empty() {
                return text;
            }
        }
    }

    let body_selector = Selector::parse("body").expect("static selector");
    document
        .select(&body_selector)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}

/// Convert a sampled page to markdown for feeding an AI extraction prompt,
/// same library choice as the teacher (`htmd`).
pub fn to_markdown(html: &str) -> Result<String> {
    htmd::convert(html).map_err(|e| EnrichmentError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_title() {
        let html = "<html><head><title>Acme Careers</title></head><body></body></html>";
        assert_eq!(extract_title(html).as_deref(), Some("Acme Careers"));
    }

    #[test]
    fn prefers_main_selector_over_body_text() {
        let html = "<html><body><nav>Home About</nav><main>We build widgets.</main></body></html>";
        let content = extract_main_content(html);
        assert_eq!(content, "We build widgets.");
    }

    #[test]
    fn falls_back_to_body_when_no_known_selector_present() {
        let html = "<html><body><div>Just some text.</div></body></html>";
        let content = extract_main_content(html);
        assert_eq!(content, "Just some text.");
    }

    #[test]
    fn truncate_to_char_boundary_never_panics_on_multibyte() {
        let s = "a".repeat(10) + "€€€€€";
        let truncated = truncate_to_char_boundary(&s, 11);
        assert!(s.is_char_boundary(truncated.len()));
    }
}
