use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use serde::de::DeserializeOwned;

use crate::http::dto::{ChunkQuery, ChunkRequest, ChunkResponse, SearchRequest};
use crate::http::{ApiError, AppState};

fn decode<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))
}

pub async fn create_chunk(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<ChunkResponse>), ApiError> {
    let request: ChunkRequest = decode(&body)?;
    let chunk = request.into_chunk(state.dimension)?;

    let stored = state.repo.insert_chunk(chunk)?;
    tracing::info!(id = stored.id, doc_id = stored.doc_id, "chunk added");

    Ok((
        StatusCode::CREATED,
        Json(ChunkResponse::from_chunk(stored, false)),
    ))
}

pub async fn get_chunk(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    Query(query): Query<ChunkQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let id: i64 = raw_id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid chunk id '{raw_id}'")))?;

    let chunk = state.repo.chunk_by_id(id)?;
    tracing::debug!(id, "chunk found");

    Ok((
        [(header::LOCATION, format!("/chunks/{id}"))],
        Json(ChunkResponse::from_chunk(chunk, query.with_embedding())),
    ))
}

pub async fn search_chunks(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Vec<ChunkResponse>>, ApiError> {
    let request: SearchRequest = decode(&body)?;
    if request.embedding.len() != state.dimension {
        return Err(ApiError::BadRequest(format!(
            "invalid embedding length: expected {}, got {}",
            state.dimension,
            request.embedding.len()
        )));
    }

    let limit = request.effective_limit();
    let found = state
        .repo
        .search(&request.embedding, limit, request.cluster_id)?;
    tracing::debug!(limit, found = found.len(), "search served");

    Ok(Json(
        found
            .into_iter()
            .map(|chunk| ChunkResponse::from_chunk(chunk, request.include_embedding))
            .collect(),
    ))
}

pub async fn health() -> &'static str {
    "OK"
}
