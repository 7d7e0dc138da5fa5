//! `html` source type: fetch a page and extract job cards via CSS selectors
//! (spec §4.6, §6). `job_selector` finds each card; each `fields` entry is a
//! CSS selector with an optional `@attr` suffix (e.g. `a@href`) selecting an
//! attribute instead of text content.

use jobforge_core::source::SourceConfig;
use scraper::{ElementRef, Html, Selector};
use tracing::{instrument, warn};

use crate::auth;
use crate::error::{Result, ScrapeError};
use crate::normalized::{coerce_date, NormalizedJob};

#[instrument(skip(http, config), fields(url = %config.url))]
pub async fn scrape(http: &reqwest::Client, config: &SourceConfig) -> Result<Vec<NormalizedJob>> {
    let job_selector_str = config
        .job_selector
        .as_deref()
        .ok_or_else(|| ScrapeError::Config("job_selector required for html sources".into()))?;

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

    let body = response.text().await?;
    let document = Html::parse_document(&body);

    let job_selector =
        Selector::parse(job_selector_str).map_err(|e| ScrapeError::Config(format!("invalid job_selector: {e:?}")))?;

    let mut jobs = Vec::new();
    for card in document.select(&job_selector) {
        match extract_one(card, config) {
            Some(job) => jobs.push(job),
            None => warn!("skipping job card missing required fields (title/url)"),
        }
    }
    Ok(jobs)
}

/// One field selector, optionally suffixed with `@attr` to pull an attribute
/// instead of the element's text content (e.g. `a.title@href`).
struct FieldSelector<'a> {
    selector: &'a str,
    attr: Option<&'a str>,
}

fn parse_field_selector(raw: &str) -> FieldSelector<'_> {
    match raw.split_once('@') {
        Some((selector, attr)) => FieldSelector { selector, attr: Some(attr) },
        None => FieldSelector { selector: raw, attr: None },
    }
}

fn select_field(card: ElementRef, raw_selector: &str) -> Option<String> {
    let field = parse_field_selector(raw_selector);
    let selector = Selector::parse(field.selector).ok()?;
    let element = card.select(&selector).next()?;
    match field.attr {
        Some(attr) => element.value().attr(attr).map(str::to_string),
        None => {
            let text = element.text().collect::<Vec<_>>().join(" ");
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            (!text.is_empty()).then_some(text)
        }
    }
}

fn extract_one(card: ElementRef, config: &SourceConfig) -> Option<NormalizedJob> {
    let field = |name: &str| -> Option<String> { config.fields.get(name).and_then(|sel| select_field(card, sel)) };

    let title = field("title")?;
    let url = field("url")?;
    let description = field("description").unwrap_or_default();
    let company = field("company").or_else(|| config.company_name.clone());
    let location = field("location");
    let posted_date = field("posted_date").and_then(|raw| coerce_date(&serde_json::Value::String(raw)));
    let salary_min = field("salary_min").and_then(|s| s.trim().parse().ok());
    let salary_max = field("salary_max").and_then(|s| s.trim().parse().ok());

    Some(NormalizedJob {
        title,
        company,
        location,
        description,
        url,
        posted_date,
        salary_min,
        salary_max,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config() -> SourceConfig {
        let mut fields = HashMap::new();
        fields.insert("title".into(), ".title".into());
        fields.insert("url".into(), "a.link@href".into());
        SourceConfig {
            source_type: jobforge_core::source::SourceType::Html,
            url: "https://example.com/careers".into(),
            response_path: None,
            job_selector: Some(".job-card".into()),
            fields,
            headers: HashMap::new(),
            company_name: Some("Acme".into()),
            auth_type: None,
            auth_param: None,
            api_key: None,
            salary_min_field: None,
            salary_max_field: None,
        }
    }

    #[test]
    fn extracts_title_and_href_attribute() {
        let html = r#"<html><body>
            <div class="job-card">
                <span class="title">Senior Rust Engineer</span>
                <a class="link" href="https://example.com/jobs/1">Apply</a>
            </div>
        </body></html>"#;
        let document = Html::parse_document(html);
        let selector = Selector::parse(".job-card").unwrap();
        let card = document.select(&selector).next().unwrap();
        let job = extract_one(card, &config()).unwrap();
        assert_eq!(job.title, "Senior Rust Engineer");
        assert_eq!(job.url, "https://example.com/jobs/1");
        assert_eq!(job.company.as_deref(), Some("Acme"));
    }

    #[test]
    fn missing_required_field_yields_none() {
        let html = r#"<html><body><div class="job-card"><span class="title">Only Title</span></div></body></html>"#;
        let document = Html::parse_document(html);
        let selector = Selector::parse(".job-card").unwrap();
        let card = document.select(&selector).next().unwrap();
        assert!(extract_one(card, &config()).is_none());
    }
}
