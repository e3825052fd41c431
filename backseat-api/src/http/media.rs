// Media metadata lookup handlers. Thin shims over the provider facade.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use backseat_core::provider::{PlaylistDetails, SearchResult, VideoDetails};

use super::{AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Serialize)]
pub struct VideoResponse {
    pub result: VideoDetails,
}

pub async fn search(
    Query(query): Query<SearchQuery>,
    State(state): State<AppState>,
) -> AppResult<Json<SearchResponse>> {
    let results = state
        .media
        .search(&query.q)
        .await
        .map_err(backseat_core::Error::from)?;
    Ok(Json(SearchResponse { results }))
}

pub async fn video(
    Query(query): Query<IdQuery>,
    State(state): State<AppState>,
) -> AppResult<Json<VideoResponse>> {
    let result = state
        .media
        .video(&query.id)
        .await
        .map_err(backseat_core::Error::from)?;
    Ok(Json(VideoResponse { result }))
}

pub async fn playlist(
    Query(query): Query<IdQuery>,
    State(state): State<AppState>,
) -> AppResult<Json<PlaylistDetails>> {
    let details = state
        .media
        .playlist(&query.id)
        .await
        .map_err(backseat_core::Error::from)?;
    Ok(Json(details))
}
