//! Applies `auth_type` to an outgoing request (spec §4.6, §6).

use jobforge_core::source::{AuthType, SourceConfig};
use reqwest::RequestBuilder;

use crate::error::{Result, ScrapeError};

pub fn apply(mut builder: RequestBuilder, config: &SourceConfig) -> Result<RequestBuilder> {
    for (key, value) in &config.headers {
        builder = builder.header(key, value);
    }

    match config.auth_type {
        None => Ok(builder),
        Some(AuthType::Header) => {
            let param = config
                .auth_param
                .as_deref()
                .ok_or_else(|| ScrapeError::Config("auth_param required for header auth".into()))?;
            let key = config
                .api_key
                .as_deref()
                .ok_or_else(|| ScrapeError::Config("api_key required for header auth".into()))?;
            Ok(builder.header(param, key))
        }
        Some(AuthType::Query) => {
            let param = config
                .auth_param
                .as_deref()
                .ok_or_else(|| ScrapeError::Config("auth_param required for query auth".into()))?;
            let key = config
                .api_key
                .as_deref()
                .ok_or_else(|| ScrapeError::Config("api_key required for query auth".into()))?;
            Ok(builder.query(&[(param, key)]))
        }
        Some(AuthType::Bearer) => {
            let key = config
                .api_key
                .as_deref()
                .ok_or_else(|| ScrapeError::Config("api_key required for bearer auth".into()))?;
            Ok(builder.bearer_auth(key))
        }
    }
}
