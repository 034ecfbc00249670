//! Plain HTTP search lookup

use super::Lookup;
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

/// Issues `GET {url}?q={query}` and returns the body as text
pub struct HttpLookup {
    client: Client,
    url: String,
}

impl HttpLookup {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Lookup for HttpLookup {
    async fn lookup(&self, query: &str) -> Result<String> {
        debug!(url = %self.url, query = %query, "Running context lookup");

        let response = self
            .client
            .get(&self.url)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(IngestError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::from_status(status, &self.url));
        }

        let body = response.text().await.map_err(IngestError::from_reqwest)?;
        Ok(body.trim().to_string())
    }
}
