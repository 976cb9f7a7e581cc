//! HTTP/WebSocket API for the hold'em server.
//!
//! A thin transport over [`TableManager`]: every request becomes a call
//! to one of its operations, and every table change reaches connected
//! clients as a masked view.
//!
//! # Endpoints
//!
//! ```text
//! GET /health               - Health check
//! GET /tables               - Table summaries
//! GET /ws/{table_id}        - WebSocket, user from `x-user-id` or `?user_id=`
//! ```

pub mod websocket;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
};
use holdem_engine::{
    game::{Chips, TableId, TableStatus},
    table::TableManager,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// Application state shared across all HTTP handlers and WebSocket connections.
#[derive(Clone)]
pub struct AppState {
    pub table_manager: Arc<TableManager>,
}

/// Builds the router with every endpoint.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/tables", get(list_tables))
        .route("/ws/{table_id}", get(websocket::websocket_handler))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct TableSummary {
    pub id: TableId,
    pub name: String,
    pub status: TableStatus,
    pub players: usize,
    pub small_blind: Chips,
    pub big_blind: Chips,
}

async fn list_tables(State(state): State<AppState>) -> impl IntoResponse {
    let manager = &state.table_manager;
    let mut tables = Vec::new();
    for table_id in manager.table_ids().await {
        match manager.get_state(table_id, None).await {
            Ok(view) => tables.push(TableSummary {
                id: view.table_id,
                name: view.name,
                status: view.status,
                players: view.players.len(),
                small_blind: view.small_blind,
                big_blind: view.big_blind,
            }),
            Err(e) => log::warn!("Skipping table {table_id} in listing: {e}"),
        }
    }
    Json(tables)
}

/// Returns `200 OK` while at least one table is being served, otherwise
/// `503 Service Unavailable`.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let table_count = state.table_manager.active_table_count().await;
    let healthy = table_count > 0;

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "tables": {
            "active_count": table_count
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
