use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::{ExtractionResponse, LinkExtractor};
use crate::config::ApiConfig;
use crate::{RelayError, StageResult};

/// Extraction client for the RapidAPI "social download" endpoint
pub struct RapidApiExtractor {
    client: Client,
    base_url: String,
    api_key: String,
    api_host: String,
    link_index: usize,
}

impl RapidApiExtractor {
    pub fn new(config: &ApiConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.key.clone(),
            api_host: config.host.clone(),
            link_index: config.link_index,
        })
    }
}

#[async_trait]
impl LinkExtractor for RapidApiExtractor {
    async fn extract(&self, source_url: &str) -> StageResult<String> {
        tracing::debug!("Requesting download link for: {}", source_url);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("url", source_url)])
            .header("x-rapidapi-key", &self.api_key)
            .header("x-rapidapi-host", &self.api_host)
            .send()
            .await
            .map_err(|e| RelayError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RelayError::Upstream(format!(
                "extraction API returned HTTP {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RelayError::Upstream(e.to_string()))?;
        let parsed: ExtractionResponse = serde_json::from_str(&body)
            .map_err(|e| RelayError::Upstream(format!("malformed response body: {}", e)))?;

        let download_url = parsed.select_download_url(self.link_index)?;
        tracing::debug!(
            "Extraction API offered {} links, using #{}",
            parsed.links.len(),
            self.link_index
        );

        Ok(download_url)
    }

    fn provider_name(&self) -> &'static str {
        "RapidAPI"
    }
}
