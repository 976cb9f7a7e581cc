//! WebSocket handler for real-time table updates.
//!
//! # Connection Flow
//!
//! 1. Client connects via `GET /ws/{table_id}` with an `x-user-id` header
//!    (or a `user_id` query parameter for browsers)
//! 2. The connection subscribes to the table; the table actor pushes the
//!    user's masked view after every change
//! 3. Client commands are forwarded to the table manager and answered
//!    with `ok` or `error`
//! 4. On disconnect the subscription is dropped. The seat is kept, so a
//!    player who drops mid-hand is timed out rather than removed.
//!
//! # Example
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:6969/ws/1?user_id=42');
//! ws.send(JSON.stringify({ type: "join", name: "alice", seat: 0, buy_in: 500 }));
//! ws.send(JSON.stringify({ type: "action", action: { type: "raise", amount: 40 } }));
//! ```

use axum::{
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use holdem_engine::{
    game::{Action, Chips, SeatIndex, TableId, TableView, UserId},
    table::{TableError, TableManager},
};
use log::{error, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::AppState;
use crate::{logging, metrics};

pub const USER_HEADER: &str = "x-user-id";

/// Views buffered per connection before updates are dropped.
const VIEW_BUFFER: usize = 32;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    user_id: Option<UserId>,
}

/// Client messages received via WebSocket
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Sit down at `seat` with `buy_in` chips
    Join {
        name: String,
        seat: SeatIndex,
        buy_in: Chips,
    },
    /// Stand up, now or once the current hand settles
    Leave,
    /// Deal a hand
    Start,
    Action {
        action: ActionData,
    },
    SitOut,
    SitIn,
}

impl ClientMessage {
    fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Join { .. } => "join",
            ClientMessage::Leave => "leave",
            ClientMessage::Start => "start",
            ClientMessage::Action { .. } => "action",
            ClientMessage::SitOut => "sit_out",
            ClientMessage::SitIn => "sit_in",
        }
    }
}

/// Action data from client. `Raise` amounts are the new total bet.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionData {
    Fold,
    Check,
    Call,
    Raise { amount: Chips },
    AllIn,
}

impl From<ActionData> for Action {
    fn from(data: ActionData) -> Self {
        match data {
            ActionData::Fold => Action::Fold,
            ActionData::Check => Action::Check,
            ActionData::Call => Action::Call,
            ActionData::Raise { amount } => Action::Raise(amount),
            ActionData::AllIn => Action::AllIn,
        }
    }
}

/// Messages sent to client
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    View { view: Box<TableView> },
    Ok { message: String },
    Error { message: String },
}

fn user_from_request(headers: &HeaderMap, query: &WsQuery) -> Option<UserId> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .or(query.user_id)
}

/// Upgrade HTTP connection to WebSocket for real-time table communication.
///
/// Returns `401 Unauthorized` without a user id and `404 Not Found` for an
/// unknown table.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(table_id): Path<TableId>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let Some(user_id) = user_from_request(&headers, &query) else {
        return (StatusCode::UNAUTHORIZED, "Missing user id").into_response();
    };
    if state.table_manager.get_table(table_id).await.is_none() {
        return (StatusCode::NOT_FOUND, "Table not found").into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, table_id, user_id, state))
}

async fn handle_socket(socket: WebSocket, table_id: TableId, user_id: UserId, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let manager = state.table_manager;

    logging::log_connection("connected", table_id, user_id);
    metrics::websocket_connected();

    let (view_tx, mut view_rx) = mpsc::channel::<TableView>(VIEW_BUFFER);
    let (response_tx, mut response_rx) = mpsc::channel::<ServerMessage>(VIEW_BUFFER);

    if let Err(e) = manager.subscribe(table_id, user_id, view_tx).await {
        error!("Failed to subscribe user {user_id} to table {table_id}: {e}");
        metrics::websocket_disconnected();
        return;
    }

    // Views and command responses share the socket's write half.
    let send_task = tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                Some(view) = view_rx.recv() => ServerMessage::View { view: Box::new(view) },
                Some(response) = response_rx.recv() => response,
                else => break,
            };
            let json = match serde_json::to_string(&message) {
                Ok(j) => j,
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
            metrics::websocket_messages_sent();
        }
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                metrics::websocket_messages_received();
                let response = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => handle_client_message(client_msg, table_id, user_id, &manager).await,
                    Err(e) => {
                        warn!("Failed to parse client message from {user_id}: {}", e);
                        ServerMessage::Error {
                            message: "Invalid message format".to_string(),
                        }
                    }
                };
                if response_tx.send(response).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                warn!("WebSocket error for user {user_id} at table {table_id}: {}", e);
                break;
            }
            _ => {}
        }
    }

    send_task.abort();
    let _ = manager.unsubscribe(table_id, user_id).await;
    metrics::websocket_disconnected();
    logging::log_connection("disconnected", table_id, user_id);
}

/// Forwards one client command to the table and turns the outcome into a
/// response for that client only.
pub async fn handle_client_message(
    msg: ClientMessage,
    table_id: TableId,
    user_id: UserId,
    manager: &TableManager,
) -> ServerMessage {
    let kind = msg.kind();
    let result = match msg {
        ClientMessage::Join { name, seat, buy_in } => manager
            .add_player(table_id, user_id, &name, seat, buy_in)
            .await
            .map(|()| format!("Seated at seat {seat}")),
        ClientMessage::Leave => manager
            .remove_player(table_id, user_id)
            .await
            .map(|cashed_out| match cashed_out {
                Some(chips) => format!("Left the table with {chips} chips"),
                None => "Leaving once this hand is over".to_string(),
            }),
        ClientMessage::Start => manager
            .start_game(table_id)
            .await
            .map(|()| "Hand started".to_string()),
        ClientMessage::Action { action } => manager
            .submit_action(table_id, user_id, action.into())
            .await
            .map(|()| "Action accepted".to_string()),
        ClientMessage::SitOut => manager
            .set_sitting_out(table_id, user_id, true)
            .await
            .map(|()| "Sitting out from the next hand".to_string()),
        ClientMessage::SitIn => manager
            .set_sitting_out(table_id, user_id, false)
            .await
            .map(|()| "Sitting in".to_string()),
    };

    metrics::client_commands_total(kind, result.is_ok());
    match result {
        Ok(message) => ServerMessage::Ok { message },
        Err(e) => {
            if let TableError::RateLimited(user) = &e {
                metrics::rate_limit_hits_total();
                logging::log_security_event("rate_limited", Some(*user), Some(table_id), "Action rate limit exceeded");
            } else if !e.is_user_error() {
                error!("Table {table_id}: {kind} from {user_id} failed: {e}");
            }
            ServerMessage::Error { message: e.to_string() }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use holdem_engine::{
        db::InMemoryTableRepository, security::ActionRateLimiter, table::TableConfig,
    };
    use std::sync::Arc;

    async fn manager() -> (TableManager, TableId) {
        let manager = TableManager::new(
            Arc::new(InMemoryTableRepository::new()),
            Arc::new(ActionRateLimiter::default()),
        );
        let table_id = manager.create_table(TableConfig::default()).await.unwrap();
        (manager, table_id)
    }

    fn parse(json: &str) -> ClientMessage {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_client_message_format() {
        assert!(matches!(
            parse(r#"{"type":"join","name":"alice","seat":3,"buy_in":500}"#),
            ClientMessage::Join { seat: 3, buy_in: 500, .. }
        ));
        assert!(matches!(parse(r#"{"type":"sit_out"}"#), ClientMessage::SitOut));
        let ClientMessage::Action { action } = parse(r#"{"type":"action","action":{"type":"raise","amount":40}}"#)
        else {
            panic!("expected an action");
        };
        assert_eq!(Action::from(action), Action::Raise(40));
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"raise"}"#).is_err());
    }

    #[test]
    fn test_server_message_format() {
        let json = serde_json::to_value(ServerMessage::Error {
            message: "nope".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["message"], "nope");
    }

    #[test]
    fn test_user_from_header_or_query() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_HEADER, "42".parse().unwrap());
        assert_eq!(user_from_request(&headers, &WsQuery { user_id: Some(7) }), Some(42));
        assert_eq!(user_from_request(&HeaderMap::new(), &WsQuery { user_id: Some(7) }), Some(7));
        assert_eq!(user_from_request(&HeaderMap::new(), &WsQuery { user_id: None }), None);
    }

    #[tokio::test]
    async fn test_join_start_and_act() {
        let (manager, table_id) = manager().await;
        let join = |name: &str, seat| ClientMessage::Join {
            name: name.to_string(),
            seat,
            buy_in: 500,
        };
        assert!(matches!(
            handle_client_message(join("alice", 0), table_id, 1, &manager).await,
            ServerMessage::Ok { .. }
        ));
        assert!(matches!(
            handle_client_message(join("bob", 1), table_id, 2, &manager).await,
            ServerMessage::Ok { .. }
        ));
        assert!(matches!(
            handle_client_message(ClientMessage::Start, table_id, 1, &manager).await,
            ServerMessage::Ok { .. }
        ));

        // Bob isn't first to act heads-up.
        let response = handle_client_message(
            ClientMessage::Action { action: ActionData::Check },
            table_id,
            2,
            &manager,
        )
        .await;
        assert!(matches!(response, ServerMessage::Error { .. }));

        let response = handle_client_message(
            ClientMessage::Action { action: ActionData::Call },
            table_id,
            1,
            &manager,
        )
        .await;
        assert!(matches!(response, ServerMessage::Ok { .. }));
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_seat_taken_is_reported() {
        let (manager, table_id) = manager().await;
        let join = ClientMessage::Join {
            name: "alice".to_string(),
            seat: 0,
            buy_in: 500,
        };
        handle_client_message(join, table_id, 1, &manager).await;
        let join = ClientMessage::Join {
            name: "bob".to_string(),
            seat: 0,
            buy_in: 500,
        };
        let ServerMessage::Error { message } = handle_client_message(join, table_id, 2, &manager).await else {
            panic!("expected an error");
        };
        assert!(message.contains('0'));
        manager.shutdown().await;
    }
}
