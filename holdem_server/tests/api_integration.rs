//! HTTP endpoints against an in-memory table manager.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use holdem_engine::{
    db::InMemoryTableRepository,
    security::ActionRateLimiter,
    table::{TableConfig, TableManager},
};
use holdem_server::api::{AppState, create_router};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn manager() -> Arc<TableManager> {
    Arc::new(TableManager::new(
        Arc::new(InMemoryTableRepository::new()),
        Arc::new(ActionRateLimiter::default()),
    ))
}

async fn get_json(manager: &Arc<TableManager>, uri: &str) -> (StatusCode, Value) {
    let app = create_router(AppState {
        table_manager: manager.clone(),
    });
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health_check_without_tables() {
    let manager = manager();
    let (status, body) = get_json(&manager, "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
}

#[tokio::test]
async fn test_health_check_with_tables() {
    let manager = manager();
    manager.create_table(TableConfig::default()).await.unwrap();

    let (status, body) = get_json(&manager, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["tables"]["active_count"], 1);
    manager.shutdown().await;
}

#[tokio::test]
async fn test_list_tables() {
    let manager = manager();
    let first = manager
        .create_table(TableConfig {
            name: "High Stakes".to_string(),
            small_blind: 50,
            big_blind: 100,
            min_buy_in: 1_000,
            max_buy_in: 10_000,
            ..TableConfig::default()
        })
        .await
        .unwrap();
    manager.add_player(first, 1, "alice", 2, 5_000).await.unwrap();
    manager.create_table(TableConfig::default()).await.unwrap();

    let (status, body) = get_json(&manager, "/tables").await;
    assert_eq!(status, StatusCode::OK);
    let tables = body.as_array().unwrap();
    assert_eq!(tables.len(), 2);
    assert_eq!(tables[0]["id"], first);
    assert_eq!(tables[0]["name"], "High Stakes");
    assert_eq!(tables[0]["players"], 1);
    assert_eq!(tables[0]["big_blind"], 100);
    assert_eq!(tables[1]["players"], 0);
    manager.shutdown().await;
}
