//! Action timeout scheduler.
//!
//! At most one countdown is pending per table. It belongs to a specific
//! [`TurnKey`], so a timeout that fires after the player already acted
//! carries a stale key and the table ignores it.

use std::time::Duration;
use tokio::{
    sync::mpsc::WeakSender,
    task::JoinHandle,
    time::{Instant, sleep_until},
};

use super::messages::TableMessage;
use crate::game::betting::TurnKey;

#[derive(Debug)]
struct Pending {
    turn: TurnKey,
    deadline: Instant,
    task: JoinHandle<()>,
}

#[derive(Debug)]
pub struct ActionTimer {
    inbox: WeakSender<TableMessage>,
    pending: Option<Pending>,
}

impl ActionTimer {
    /// Timer delivering timeouts to the actor behind `inbox`. The weak
    /// sender doesn't keep the actor alive on its own.
    pub fn new(inbox: WeakSender<TableMessage>) -> Self {
        Self {
            inbox,
            pending: None,
        }
    }

    /// Points the countdown at `turn`. Keeps the running countdown when
    /// the decision hasn't changed, cancels it when there's no decision
    /// pending.
    pub fn arm(&mut self, turn: Option<TurnKey>, timeout: Duration) {
        if let (Some(turn), Some(pending)) = (turn, &self.pending)
            && pending.turn == turn
        {
            return;
        }
        self.cancel();

        let Some(turn) = turn else {
            return;
        };
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            log::warn!("Action timeout of {timeout:?} is out of range, not armed");
            return;
        };
        let inbox = self.inbox.clone();
        let task = tokio::spawn(async move {
            sleep_until(deadline).await;
            if let Some(inbox) = inbox.upgrade() {
                let _ = inbox.send(TableMessage::ActionTimeout { turn }).await;
            }
        });
        self.pending = Some(Pending {
            turn,
            deadline,
            task,
        });
    }

    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.task.abort();
        }
    }

    /// Decision currently being timed, with its deadline.
    pub fn pending(&self) -> Option<(TurnKey, Instant)> {
        self.pending.as_ref().map(|p| (p.turn, p.deadline))
    }
}

impl Drop for ActionTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
