//! Table actor message types.

use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use crate::game::{
    betting::TurnKey,
    entities::{Action, Chips, SeatIndex, UserId},
    errors::GameError,
    view::TableView,
};

/// Reply channel for requests that can be rejected by the engine.
pub type Reply<T> = oneshot::Sender<Result<T, GameError>>;

/// Messages that can be sent to a TableActor. The actor handles them one
/// at a time in arrival order.
#[derive(Debug)]
pub enum TableMessage {
    /// Seat a player with the chips they bring to the table
    AddPlayer {
        user_id: UserId,
        name: String,
        seat: SeatIndex,
        chips: Chips,
        response: Reply<()>,
    },

    /// Leave the table. Replies with the chips cashed out, or `None` when
    /// the player is still in a hand and will leave once it's settled.
    RemovePlayer {
        user_id: UserId,
        response: Reply<Option<Chips>>,
    },

    /// Sit out from, or back in to, the next hand
    SitOut {
        user_id: UserId,
        sitting_out: bool,
        response: Reply<()>,
    },

    /// Deal a hand now
    StartGame { response: Reply<()> },

    /// Player action (fold, check, call, raise, all-in)
    TakeAction {
        user_id: UserId,
        action: Action,
        response: Reply<()>,
    },

    /// Snapshot as seen by `viewer`
    GetState {
        viewer: Option<UserId>,
        response: oneshot::Sender<TableView>,
    },

    /// Push a fresh view to `sender` after every change
    Subscribe {
        user_id: UserId,
        sender: mpsc::Sender<TableView>,
    },

    Unsubscribe { user_id: UserId },

    /// Internal: the decision identified by `turn` ran out of time
    ActionTimeout { turn: TurnKey },

    /// Start the next hand after `delay`, replacing any earlier schedule
    ScheduleStart { delay: Duration },

    /// Internal: a scheduled start came due
    AutoStart,

    /// Stop the actor. Replies once the inbox is no longer read.
    Close { response: oneshot::Sender<()> },
}
