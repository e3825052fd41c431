//! Invidious-compatible metadata client
//!
//! Talks to any instance exposing the Invidious v1 API. Instances are tried
//! in configuration order; the first one that answers wins. A 404 from an
//! instance is authoritative (the media does not exist) and short-circuits
//! the chain.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::error::ProviderError;
use super::{PlaylistDetails, PlaylistItem, SearchResult, VideoDetails};

pub const SEARCH_MAX_RESULTS: usize = 10;
pub const PLAYLIST_MAX_PAGES: u32 = 10;
pub const PLAYLIST_MAX_ENTRIES: usize = 1000;

pub struct InvidiousClient {
    client: Client,
    base_urls: Vec<Url>,
}

impl InvidiousClient {
    pub fn new(base_urls: &[String], timeout: Duration) -> Result<Self, ProviderError> {
        let parsed = base_urls
            .iter()
            .map(|raw| Url::parse(raw).map_err(|_| ProviderError::InvalidBaseUrl(raw.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_urls: parsed,
        })
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ProviderError> {
        let items: Vec<RawSearchItem> = self
            .get_json("api/v1/search", &[("q", query), ("type", "video")])
            .await?;

        Ok(items
            .into_iter()
            .filter_map(RawSearchItem::into_result)
            .take(SEARCH_MAX_RESULTS)
            .collect())
    }

    pub async fn video(&self, external_id: &str) -> Result<VideoDetails, ProviderError> {
        let raw: RawVideo = self
            .get_json(&format!("api/v1/videos/{external_id}"), &[])
            .await?;
        Ok(raw.into_details())
    }

    /// Fetch a playlist, concatenating upstream pages. Pagination stops at an
    /// empty page, [`PLAYLIST_MAX_PAGES`] pages or [`PLAYLIST_MAX_ENTRIES`]
    /// entries, whichever comes first.
    pub async fn playlist(&self, playlist_id: &str) -> Result<PlaylistDetails, ProviderError> {
        let mut last_error = "no providers configured".to_string();

        for base in &self.base_urls {
            match self.playlist_from(base, playlist_id).await {
                Ok(details) => return Ok(details),
                Err(ProviderError::NotFound) => return Err(ProviderError::NotFound),
                Err(err) => {
                    warn!(base = %base, error = %err, "Playlist fetch failed, trying next provider");
                    last_error = err.to_string();
                }
            }
        }

        Err(ProviderError::AllProvidersFailed { last: last_error })
    }

    async fn playlist_from(
        &self,
        base: &Url,
        playlist_id: &str,
    ) -> Result<PlaylistDetails, ProviderError> {
        let path = format!("api/v1/playlists/{playlist_id}");
        let mut videos: Vec<PlaylistItem> = Vec::new();
        let mut title = String::new();
        let mut video_count: i64 = 0;

        for page in 1..=PLAYLIST_MAX_PAGES {
            let page_param = page.to_string();
            let raw: RawPlaylist = self
                .get_json_from(base, &path, &[("page", page_param.as_str())])
                .await?;

            if page == 1 {
                title = raw.title.unwrap_or_default();
                video_count = raw.video_count.unwrap_or(0);
            }
            if raw.videos.is_empty() {
                break;
            }

            videos.extend(raw.videos.into_iter().filter_map(RawPlaylistVideo::into_item));
            if videos.len() >= PLAYLIST_MAX_ENTRIES {
                videos.truncate(PLAYLIST_MAX_ENTRIES);
                break;
            }
        }

        Ok(PlaylistDetails {
            playlist_id: playlist_id.to_string(),
            title,
            video_count,
            videos,
        })
    }

    /// Try every configured instance in order. Any 2xx wins; a 404 is final.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let mut last_error = "no providers configured".to_string();

        for base in &self.base_urls {
            match self.get_json_from(base, path, query).await {
                Ok(value) => return Ok(value),
                Err(ProviderError::NotFound) => return Err(ProviderError::NotFound),
                Err(err) => {
                    warn!(base = %base, error = %err, "Provider request failed, trying next");
                    last_error = err.to_string();
                }
            }
        }

        Err(ProviderError::AllProvidersFailed { last: last_error })
    }

    async fn get_json_from<T: DeserializeOwned>(
        &self,
        base: &Url,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let url = base
            .join(path)
            .map_err(|_| ProviderError::InvalidBaseUrl(base.to_string()))?;

        debug!(url = %url, "Fetching from metadata provider");
        let response = self.client.get(url).query(query).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ProviderError::NotFound),
            status if status.is_success() => Ok(response.json::<T>().await?),
            status => Err(ProviderError::Parse(format!("unexpected status {status}"))),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawThumbnail {
    #[serde(default)]
    quality: String,
    url: String,
}

fn pick_thumbnail(thumbnails: Vec<RawThumbnail>) -> String {
    thumbnails
        .iter()
        .find(|t| t.quality == "medium")
        .or_else(|| thumbnails.first())
        .map(|t| t.url.clone())
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSearchItem {
    video_id: Option<String>,
    title: Option<String>,
    author: Option<String>,
    #[serde(default)]
    video_thumbnails: Vec<RawThumbnail>,
}

impl RawSearchItem {
    /// Non-video results (channels, playlists mixed into search) are dropped.
    fn into_result(self) -> Option<SearchResult> {
        Some(SearchResult {
            external_id: self.video_id?,
            title: self.title.unwrap_or_default(),
            thumbnail: pick_thumbnail(self.video_thumbnails),
            channel_title: self.author.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVideo {
    video_id: String,
    title: String,
    author: Option<String>,
    length_seconds: Option<f64>,
    #[serde(default)]
    video_thumbnails: Vec<RawThumbnail>,
}

impl RawVideo {
    fn into_details(self) -> VideoDetails {
        VideoDetails {
            external_id: self.video_id,
            title: self.title,
            thumbnail: pick_thumbnail(self.video_thumbnails),
            channel_title: self.author.unwrap_or_default(),
            duration_seconds: self.length_seconds,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlaylist {
    title: Option<String>,
    video_count: Option<i64>,
    #[serde(default)]
    videos: Vec<RawPlaylistVideo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlaylistVideo {
    video_id: Option<String>,
    title: Option<String>,
    #[serde(default)]
    video_thumbnails: Vec<RawThumbnail>,
}

impl RawPlaylistVideo {
    fn into_item(self) -> Option<PlaylistItem> {
        Some(PlaylistItem {
            external_id: self.video_id?,
            title: self.title.unwrap_or_default(),
            thumbnail: pick_thumbnail(self.video_thumbnails),
        })
    }
}
