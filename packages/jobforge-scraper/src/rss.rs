//! `rss` source type: fetch and parse an RSS/Atom feed, re-shape each entry
//! as JSON so it goes through the same [`extract_from_json`] field
//! extraction as `api` sources (spec §4.6, §9 shared field-extraction
//! helper).

use jobforge_core::source::SourceConfig;
use serde_json::{json, Value};
use tracing::{instrument, warn};

use crate::auth;
use crate::error::{Result, ScrapeError};
use crate::fields::extract_from_json;
use crate::normalized::NormalizedJob;

#[instrument(skip(http, config), fields(url = %config.url))]
pub async fn scrape(http: &reqwest::Client, config: &SourceConfig) -> Result<Vec<NormalizedJob>> {
    let builder = auth::apply(http.get(&config.url), config)?;
    let response = builder.send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ScrapeError::Upstream {
            status: status.as_u16(),
            body,
        });
    }

    let bytes = response.bytes().await?;
    let feed = feed_rs::parser::parse(&bytes[..]).map_err(|e| ScrapeError::Parse(e.to_string()))?;

    let mut jobs = Vec::with_capacity(feed.entries.len());
    for entry in &feed.entries {
        let item = entry_to_json(entry);
        match extract_from_json(&item, config) {
            Some(job) => jobs.push(job),
            None => warn!("skipping feed entry missing required fields (title/url)"),
        }
    }
    Ok(jobs)
}

/// Maps a parsed feed entry onto the same flat-key shape `fields` paths
/// address for `api` sources (`title`, `link`, `summary`, `published`,
/// `author`), so one dotted-path config works for both.
fn entry_to_json(entry: &feed_rs::model::Entry) -> Value {
    let title = entry.title.as_ref().map(|t| t.content.clone());
    let summary = entry
        .summary
        .as_ref()
        .map(|s| s.content.clone())
        .or_else(|| entry.content.as_ref().and_then(|c| c.body.clone()));
    let link = entry.links.first().map(|l| l.href.clone());
    let published = entry
        .published
        .or(entry.updated)
        .map(|dt| dt.to_rfc3339());
    let author = entry.authors.first().map(|a| a.name.clone());

    json!({
        "title": title,
        "link": link,
        "summary": summary,
        "published": published,
        "author": author,
        "id": entry.id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_rss_feed() {
        let xml = r#"<?xml version="1.0"?>
        <rss version="2.0"><channel>
            <title>Example Jobs</title>
            <item>
                <title>Senior Rust Engineer</title>
                <link>https://example.com/jobs/1</link>
                <description>Build backend systems.</description>
                <pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate>
            </item>
        </channel></rss>"#;
        let feed = feed_rs::parser::parse(xml.as_bytes()).unwrap();
        assert_eq!(feed.entries.len(), 1);
        let item = entry_to_json(&feed.entries[0]);
        assert_eq!(item["title"], "Senior Rust Engineer");
        assert_eq!(item["link"], "https://example.com/jobs/1");
    }
}
