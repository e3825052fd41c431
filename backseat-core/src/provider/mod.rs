//! Upstream media metadata lookups
//!
//! The core only knows opaque video records; everything here exists to turn
//! a search query or an external id into `(external-id, title, thumbnail)`
//! triples via whatever Invidious-compatible instances are configured, with
//! an oEmbed fallback for single videos.

pub mod error;
mod invidious;
mod oembed;

use std::time::Duration;

use serde::Serialize;

use crate::config::ProvidersConfig;

pub use error::ProviderError;
pub use invidious::{InvidiousClient, PLAYLIST_MAX_ENTRIES, PLAYLIST_MAX_PAGES, SEARCH_MAX_RESULTS};
pub use oembed::OEmbedClient;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub external_id: String,
    pub title: String,
    pub thumbnail: String,
    pub channel_title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetails {
    pub external_id: String,
    pub title: String,
    pub thumbnail: String,
    pub channel_title: String,
    pub duration_seconds: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItem {
    pub external_id: String,
    pub title: String,
    pub thumbnail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistDetails {
    pub playlist_id: String,
    pub title: String,
    pub video_count: i64,
    pub videos: Vec<PlaylistItem>,
}

/// Facade over the configured providers, in fallback order.
pub struct MediaService {
    invidious: InvidiousClient,
    oembed: OEmbedClient,
}

impl MediaService {
    pub fn from_config(config: &ProvidersConfig) -> Result<Self, ProviderError> {
        let timeout = Duration::from_secs(config.request_timeout_seconds);
        Ok(Self {
            invidious: InvidiousClient::new(&config.invidious_base_urls, timeout)?,
            oembed: OEmbedClient::new(&config.oembed_endpoint, timeout)?,
        })
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ProviderError> {
        self.invidious.search(query).await
    }

    /// Single-video lookup with oEmbed as the last resort when every
    /// Invidious instance is unreachable. A 404 is final either way.
    pub async fn video(&self, external_id: &str) -> Result<VideoDetails, ProviderError> {
        match self.invidious.video(external_id).await {
            Ok(details) => Ok(details),
            Err(ProviderError::NotFound) => Err(ProviderError::NotFound),
            Err(_) => self.oembed.video(external_id).await,
        }
    }

    pub async fn playlist(&self, playlist_id: &str) -> Result<PlaylistDetails, ProviderError> {
        self.invidious.playlist(playlist_id).await
    }
}
