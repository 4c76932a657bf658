use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

pub mod rapidapi;

pub use rapidapi::RapidApiExtractor;

use crate::{RelayError, StageResult};

/// Body returned by the extraction API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionResponse {
    /// Candidate media links, in the order the API ranks them
    #[serde(default)]
    pub links: Vec<ExtractedLink>,
}

/// One candidate media link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedLink {
    /// Direct download URL
    pub link: Option<String>,

    /// Quality label reported by the API (e.g. "hd", "sd")
    #[serde(default)]
    pub quality: Option<String>,
}

impl ExtractionResponse {
    /// Pick the download URL at `index`, checking the response shape on the way.
    ///
    /// Every violation (missing list, short list, missing or non-HTTP link) is an upstream
    /// failure rather than a panic on a bad index.
    pub fn select_download_url(&self, index: usize) -> StageResult<String> {
        if self.links.is_empty() {
            return Err(RelayError::Upstream(
                "response contains no links".to_string(),
            ));
        }

        let candidate = self.links.get(index).ok_or_else(|| {
            RelayError::Upstream(format!(
                "expected a link at position {}, response has {}",
                index,
                self.links.len()
            ))
        })?;

        let link = candidate
            .link
            .as_deref()
            .map(str::trim)
            .filter(|link| !link.is_empty())
            .ok_or_else(|| {
                RelayError::Upstream(format!("link entry {} has no URL", index))
            })?;

        let parsed = Url::parse(link)
            .map_err(|e| RelayError::Upstream(format!("invalid download URL: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RelayError::Upstream(format!(
                "download URL uses unsupported scheme: {}",
                parsed.scheme()
            )));
        }

        Ok(link.to_string())
    }
}

/// Resolves a social-media page URL into a direct media download URL
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LinkExtractor: Send + Sync {
    /// Make a single attempt at resolving `source_url`
    async fn extract(&self, source_url: &str) -> StageResult<String>;

    /// Name of the upstream service, for logs
    fn provider_name(&self) -> &'static str;
}
