//! End-to-end tests of the HTTP API against an in-memory store.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Request, StatusCode, header};
use embed_store::ChunkStore;
use embed_store::http::{AppState, ChunkResponse, router};
use serde_json::{Value, json};
use tower::ServiceExt;

const DIM: usize = 3;

fn app() -> Router {
    router(AppState::new(Arc::new(ChunkStore::new(DIM)), DIM))
}

fn chunk_body(doc_id: i64, chunk_no: i32, embedding: [f32; DIM]) -> Value {
    json!({
        "doc_id": doc_id,
        "title": "Show HN",
        "text": "chunk text",
        "time": "2023-07-01T12:30:00Z",
        "type": "story",
        "score": 12,
        "deleted": false,
        "dead": false,
        "embedding": embedding,
        "chunk_no": chunk_no,
        "chunk_start": 0,
        "chunk_end": 10
    })
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body.to_vec())
}

fn post(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_create_and_fetch_chunk() {
    let app = app();

    let (status, _, body) = send(&app, post("/chunks", &chunk_body(5, 0, [1.0, 2.0, 3.0]))).await;
    assert_eq!(status, StatusCode::CREATED);
    let created: ChunkResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(created.id, 1);
    assert_eq!(created.doc_id, 5);
    assert_eq!(created.embedding, None);
    assert_eq!(created.time, "2023-07-01T12:30:00Z");

    let (status, headers, body) = send(&app, get("/chunks/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::LOCATION], "/chunks/1");
    let fetched: ChunkResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(fetched, created);

    let (_, _, body) = send(&app, get("/chunks/1?embed=1")).await;
    let with_embedding: ChunkResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(with_embedding.embedding, Some(vec![1.0, 2.0, 3.0]));
}

#[tokio::test]
async fn test_create_rejects_bad_input() {
    let app = app();

    let mut unknown = chunk_body(1, 0, [0.0; DIM]);
    unknown["color"] = json!("red");
    let (status, headers, _) = send(&app, post("/chunks", &unknown)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        headers[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );

    let mut poll = chunk_body(1, 0, [0.0; DIM]);
    poll["type"] = json!("poll");
    let (status, _, _) = send(&app, post("/chunks", &poll)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut short = chunk_body(1, 0, [0.0; DIM]);
    short["embedding"] = json!([1.0]);
    let (status, _, body) = send(&app, post("/chunks", &short)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(String::from_utf8(body).unwrap().starts_with("bad request"));

    // 1e39 overflows f32 to infinity
    let mut overflow = chunk_body(1, 0, [0.0; DIM]);
    overflow["embedding"] = json!([0.0, 1e39, 0.0]);
    let (status, _, body) = send(&app, post("/chunks", &overflow)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(String::from_utf8(body).unwrap().contains("not finite"));

    let request = Request::builder()
        .method("POST")
        .uri("/chunks")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_duplicate_key_conflicts() {
    let app = app();

    let (status, _, _) = send(&app, post("/chunks", &chunk_body(9, 2, [0.0; DIM]))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _, body) = send(&app, post("/chunks", &chunk_body(9, 2, [1.0; DIM]))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(String::from_utf8(body).unwrap().contains("already exists"));
}

#[tokio::test]
async fn test_get_errors() {
    let app = app();

    let (status, _, _) = send(&app, get("/chunks/abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, body) = send(&app, get("/chunks/42")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(String::from_utf8(body).unwrap(), "not found: Chunk 42 not found");
}

#[tokio::test]
async fn test_search_orders_and_limits() {
    let app = app();
    for i in 0..6 {
        let embedding = [i as f32, 0.0, 0.0];
        let (status, _, _) = send(&app, post("/chunks", &chunk_body(i, 0, embedding))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, _, body) = send(
        &app,
        post("/chunks/search", &json!({"embedding": [4.2, 0.0, 0.0]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let found: Vec<ChunkResponse> = serde_json::from_slice(&body).unwrap();
    let doc_ids: Vec<i64> = found.iter().map(|c| c.doc_id).collect();
    assert_eq!(doc_ids, vec![4, 5, 3, 2]);
    assert!(found.iter().all(|c| c.embedding.is_none()));

    let (_, _, body) = send(
        &app,
        post(
            "/chunks/search",
            &json!({"embedding": [0.0, 0.0, 0.0], "limit": 2, "include_embedding": true}),
        ),
    )
    .await;
    let found: Vec<ChunkResponse> = serde_json::from_slice(&body).unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].embedding, Some(vec![0.0, 0.0, 0.0]));

    let (status, _, _) = send(&app, post("/chunks/search", &json!({"embedding": [1.0]}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health() {
    let (status, _, body) = send(&app(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
}
