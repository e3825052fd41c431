//! oEmbed fallback for single-video lookups
//!
//! When every Invidious instance is down, the oEmbed endpoint can still
//! resolve a title and thumbnail for one video. It carries no duration and
//! no search, so it is strictly a last resort.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::error::ProviderError;
use super::VideoDetails;

pub struct OEmbedClient {
    client: Client,
    endpoint: Url,
}

impl OEmbedClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let endpoint =
            Url::parse(endpoint).map_err(|_| ProviderError::InvalidBaseUrl(endpoint.to_string()))?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }

    pub async fn video(&self, external_id: &str) -> Result<VideoDetails, ProviderError> {
        let watch_url = format!("https://www.youtube.com/watch?v={external_id}");

        debug!(endpoint = %self.endpoint, external_id, "Falling back to oEmbed lookup");
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("url", watch_url.as_str()), ("format", "json")])
            .send()
            .await?;

        match response.status() {
            // The endpoint answers 401 for unlisted/deleted media.
            StatusCode::NOT_FOUND | StatusCode::UNAUTHORIZED => Err(ProviderError::NotFound),
            status if status.is_success() => {
                let raw: RawOEmbed = response.json().await?;
                Ok(VideoDetails {
                    external_id: external_id.to_string(),
                    title: raw.title,
                    thumbnail: raw.thumbnail_url.unwrap_or_default(),
                    channel_title: raw.author_name.unwrap_or_default(),
                    duration_seconds: None,
                })
            }
            status => Err(ProviderError::Parse(format!("unexpected status {status}"))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawOEmbed {
    title: String,
    author_name: Option<String>,
    thumbnail_url: Option<String>,
}
