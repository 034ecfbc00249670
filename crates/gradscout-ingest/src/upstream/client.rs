//! HTTP client for the upstream API

use super::{endpoints, DetailSource, ListingSource};
use crate::config::UpstreamConfig;
use crate::error::{IngestError, Result};
use crate::types::{DetailRecord, Item, Subject};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

/// Upstream client carrying the static bearer credential
pub struct UpstreamClient {
    client: Client,
    config: UpstreamConfig,
}

impl UpstreamClient {
    /// Create a new client; the timeout is only set when configured
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        let mut builder = Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if config.http_timeout_secs > 0 {
            builder = builder.timeout(std::time::Duration::from_secs(config.http_timeout_secs));
        }
        let client = builder
            .build()
            .map_err(|e| IngestError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// GET a JSON body; `authorized` attaches the bearer token when one is set
    async fn get_json(&self, url: Url, authorized: bool) -> Result<Value> {
        debug!(url = %url, authorized, "GET");

        let mut request = self.client.get(url.clone());
        if let Some(token) = self.config.api_token.as_ref().filter(|_| authorized) {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(IngestError::from_reqwest)?;
        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::from_status(status, url.as_str()));
        }

        let body = response.bytes().await.map_err(IngestError::from_reqwest)?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// One page of the university directory (`data.filter_results.result`)
    pub async fn fetch_directory_page(&self, page: u32, page_size: u32) -> Result<Vec<Item>> {
        let url = endpoints::directory_url(&self.config.directory_url, page, page_size)?;
        let body = self.get_json(url, true).await?;

        let result = body
            .pointer("/data/filter_results/result")
            .ok_or_else(|| IngestError::malformed("directory response has no data.filter_results.result"))?;
        objects(result, "data.filter_results.result")
    }

    /// One page of the public rankings search (`data.items`)
    pub async fn fetch_rankings_page(&self, page: u32) -> Result<Vec<Item>> {
        let url = endpoints::rankings_url(&self.config.rankings_url, page)?;
        let body = self.get_json(url, false).await?;

        let items = body
            .pointer("/data/items")
            .ok_or_else(|| IngestError::malformed("rankings response has no data.items"))?;
        objects(items, "data.items")
    }
}

/// Extract the `data` object of an envelope; absent means empty
fn data_object(body: &Value) -> Result<Map<String, Value>> {
    let Value::Object(envelope) = body else {
        return Err(IngestError::malformed("response body is not a JSON object"));
    };
    match envelope.get("data") {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(data)) => Ok(data.clone()),
        Some(_) => Err(IngestError::malformed("response field 'data' is not an object")),
    }
}

fn objects(value: &Value, field: &str) -> Result<Vec<Item>> {
    let Value::Array(values) = value else {
        return Err(IngestError::malformed(format!("response field '{}' is not a list", field)));
    };
    values
        .iter()
        .map(|v| {
            v.as_object()
                .cloned()
                .ok_or_else(|| IngestError::malformed(format!("entry in '{}' is not an object", field)))
        })
        .collect()
}

#[async_trait]
impl ListingSource for UpstreamClient {
    async fn fetch_page(&self, subject: &Subject, page: u32, page_size: u32) -> Result<Vec<Item>> {
        let url = endpoints::listing_url(
            &self.config.listing_url,
            subject.id,
            page,
            page_size,
            &self.config.listing_filters,
        )?;
        let body = self.get_json(url, true).await?;

        match data_object(&body)?.get("results") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(results) => objects(results, "data.results"),
        }
    }
}

#[async_trait]
impl DetailSource for UpstreamClient {
    async fn fetch_detail(&self, key: &str) -> Result<DetailRecord> {
        let url = endpoints::profile_url(&self.config.profile_url_template, key)?;
        let body = self.get_json(url, true).await?;
        data_object(&body)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_data_object_missing_is_empty() {
        assert!(data_object(&json!({"success": true})).unwrap().is_empty());
        assert!(data_object(&json!({"data": null})).unwrap().is_empty());
    }

    #[test]
    fn test_data_object_rejects_wrong_shapes() {
        assert!(matches!(
            data_object(&json!([1, 2])),
            Err(IngestError::Malformed(_))
        ));
        assert!(matches!(
            data_object(&json!({"data": "nope"})),
            Err(IngestError::Malformed(_))
        ));
    }

    #[test]
    fn test_objects_requires_list_of_objects() {
        assert_eq!(objects(&json!([{"a": 1}, {"b": 2}]), "x").unwrap().len(), 2);
        assert!(objects(&json!({"a": 1}), "x").is_err());
        assert!(objects(&json!([1]), "x").is_err());
    }
}
