//! Shared field-extraction helper (spec §9: "the only polymorphism needed is
//! over fetch mode, which maps cleanly to three branch functions sharing a
//! field-extraction helper"). `api.rs` and `rss.rs` both normalize their
//! native item shape into a `serde_json::Value` first, then extract through
//! this one function so the `fields` map is interpreted identically
//! regardless of source type.

use jobforge_core::source::SourceConfig;
use serde_json::Value;

use crate::jsonpath::navigate;
use crate::normalized::{coerce_date, value_to_i64, value_to_string, NormalizedJob};

/// Extract one [`NormalizedJob`] from a JSON-shaped item using `config.fields`
/// as dotted paths. Returns `None` when `title` or `url` can't be resolved —
/// callers skip such items rather than erroring the whole scrape (spec §4.6).
pub fn extract_from_json(item: &Value, config: &SourceConfig) -> Option<NormalizedJob> {
    let field = |name: &str| -> Option<Value> { config.fields.get(name).and_then(|path| navigate(item, path)) };

    let title = field("title").as_ref().and_then(value_to_string)?;
    let url = field("url").as_ref().and_then(value_to_string)?;
    let description = field("description").as_ref().and_then(value_to_string).unwrap_or_default();
    let company = field("company").as_ref().and_then(value_to_string).or_else(|| config.company_name.clone());
    let location = field("location").as_ref().and_then(value_to_string);
    let posted_date = field("posted_date").as_ref().and_then(coerce_date);

    let salary_min = config
        .salary_min_field
        .as_ref()
        .and_then(|path| navigate(item, path))
        .as_ref()
        .and_then(value_to_i64)
        .or_else(|| field("salary_min").as_ref().and_then(value_to_i64));
    let salary_max = config
        .salary_max_field
        .as_ref()
        .and_then(|path| navigate(item, path))
        .as_ref()
        .and_then(value_to_i64)
        .or_else(|| field("salary_max").as_ref().and_then(value_to_i64));

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

    fn config_with_fields(pairs: &[(&str, &str)]) -> SourceConfig {
        let mut fields = HashMap::new();
        for (k, v) in pairs {
            fields.insert(k.to_string(), v.to_string());
        }
        SourceConfig {
            source_type: jobforge_core::source::SourceType::Api,
            url: "https://example.com".into(),
            response_path: None,
            job_selector: None,
            fields,
            headers: HashMap::new(),
            company_name: None,
            auth_type: None,
            auth_param: None,
            api_key: None,
            salary_min_field: None,
            salary_max_field: None,
        }
    }

    #[test]
    fn missing_title_or_url_yields_none() {
        let config = config_with_fields(&[("title", "title")]);
        let item = serde_json::json!({"title": "Engineer"});
        assert!(extract_from_json(&item, &config).is_none());
    }

    #[test]
    fn extracts_present_fields() {
        let config = config_with_fields(&[("title", "title"), ("url", "link"), ("description", "summary")]);
        let item = serde_json::json!({"title": "Engineer", "link": "https://x.com/1", "summary": "Build things"});
        let job = extract_from_json(&item, &config).unwrap();
        assert_eq!(job.title, "Engineer");
        assert_eq!(job.url, "https://x.com/1");
        assert_eq!(job.description, "Build things");
    }
}
