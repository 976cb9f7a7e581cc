//! Table actor: the single writer for one table.
//!
//! Every mutation of a table, timeouts included, arrives through the
//! actor's inbox and is applied one message at a time. After each change
//! the actor records new hands, settles finished ones, re-arms the action
//! timer and pushes fresh views to subscribers.

use chrono::Utc;
use std::{collections::HashMap, fmt, sync::Arc, time::Duration};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval},
};
use uuid::Uuid;

use super::{messages::TableMessage, timer::ActionTimer};
use crate::{
    db::{
        errors::PersistenceError,
        models::{HandStart, SettleOutcome, Settlement, TableRecord},
        repository::TableRepository,
    },
    game::{
        entities::{Action, TableId, UserId},
        errors::GameError,
        showdown::SeatStack,
        table::Table,
        view::TableView,
    },
};

const INBOX_CAPACITY: usize = 256;
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Table actor handle for sending messages
#[derive(Clone, Debug)]
pub struct TableHandle {
    sender: mpsc::Sender<TableMessage>,
    table_id: TableId,
}

impl TableHandle {
    pub fn new(sender: mpsc::Sender<TableMessage>, table_id: TableId) -> Self {
        Self { sender, table_id }
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    /// Send a message to the table
    pub async fn send(&self, message: TableMessage) -> Result<(), String> {
        self.sender
            .send(message)
            .await
            .map_err(|_| "Table is closed".to_string())
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// How hard the actor tries to persist a finished hand before it waits for
/// the next retry window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementPolicy {
    /// Attempts per settlement round
    pub max_attempts: u32,

    /// Backoff after the first failed attempt, doubled after each one
    pub base_backoff: Duration,

    /// Upper bound on a single backoff
    pub max_backoff: Duration,

    /// Wait before a new round once every attempt failed
    pub retry_interval: Duration,
}

impl Default for SettlementPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
            retry_interval: Duration::from_secs(5),
        }
    }
}

impl SettlementPolicy {
    /// Backoff after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

/// Table actor managing a single poker table
pub struct TableActor {
    table: Table,

    inbox: mpsc::Receiver<TableMessage>,

    /// Lets the actor post to itself without keeping its inbox open
    self_sender: mpsc::WeakSender<TableMessage>,

    repository: Arc<dyn TableRepository>,

    settlement_policy: SettlementPolicy,

    timer: ActionTimer,

    /// Views are masked per subscriber
    subscribers: HashMap<UserId, mpsc::Sender<TableView>>,

    /// Hand whose start has been written to the repository
    recorded_hand: Option<Uuid>,

    scheduled_start: Option<JoinHandle<()>>,

    /// Set while a settlement is waiting for its next retry window
    next_settlement_retry: Option<Instant>,

    is_closed: bool,
}

impl TableActor {
    /// Create a new table actor
    ///
    /// # Returns
    ///
    /// * `(TableActor, TableHandle)` - Actor and handle for sending messages
    pub fn new(
        table: Table,
        repository: Arc<dyn TableRepository>,
        settlement_policy: SettlementPolicy,
    ) -> (Self, TableHandle) {
        let (sender, inbox) = mpsc::channel(INBOX_CAPACITY);
        let self_sender = sender.downgrade();
        let handle = TableHandle::new(sender, table.id());

        let actor = Self {
            table,
            inbox,
            timer: ActionTimer::new(self_sender.clone()),
            self_sender,
            repository,
            settlement_policy,
            subscribers: HashMap::new(),
            recorded_hand: None,
            scheduled_start: None,
            next_settlement_retry: None,
            is_closed: false,
        };

        (actor, handle)
    }

    /// Run the table actor event loop until it's closed or every handle is
    /// dropped.
    pub async fn run(mut self) {
        log::info!("Table {} '{}' starting", self.table.id(), self.table.config().name);

        let mut tick_interval = interval(TICK_INTERVAL);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                message = self.inbox.recv() => {
                    let Some(message) = message else {
                        break;
                    };
                    self.handle_message(message).await;
                    if self.is_closed {
                        break;
                    }
                }

                _ = tick_interval.tick() => {
                    self.tick().await;
                }
            }
        }

        self.timer.cancel();
        if let Some(task) = self.scheduled_start.take() {
            task.abort();
        }
        log::info!("Table {} '{}' closed", self.table.id(), self.table.config().name);
    }

    async fn handle_message(&mut self, message: TableMessage) {
        match message {
            TableMessage::AddPlayer {
                user_id,
                name,
                seat,
                chips,
                response,
            } => {
                let result = self.table.add_player(user_id, &name, seat, chips);
                if result.is_ok() {
                    log::info!("Table {}: {user_id} sat down in seat {seat} with {chips}", self.table.id());
                    self.save_snapshot().await;
                }
                let _ = response.send(result);
            }

            TableMessage::RemovePlayer { user_id, response } => {
                let result = self.table.remove_player(user_id);
                match &result {
                    Ok(Some(chips)) => {
                        log::info!("Table {}: {user_id} left with {chips}", self.table.id());
                        self.save_snapshot().await;
                    }
                    Ok(None) => {
                        log::info!("Table {}: {user_id} leaving after this hand", self.table.id());
                    }
                    Err(e) if e.is_fatal() => self.abort_hand(e).await,
                    Err(_) => {}
                }
                let _ = response.send(result);
            }

            TableMessage::SitOut {
                user_id,
                sitting_out,
                response,
            } => {
                let result = self.table.set_sitting_out(user_id, sitting_out);
                if result.is_ok() {
                    self.save_snapshot().await;
                }
                let _ = response.send(result);
            }

            TableMessage::StartGame { response } => {
                let result = self.start_hand().await;
                let _ = response.send(result);
            }

            TableMessage::TakeAction {
                user_id,
                action,
                response,
            } => {
                let result = self.take_action(user_id, action).await;
                let _ = response.send(result);
            }

            TableMessage::GetState { viewer, response } => {
                let _ = response.send(self.table.get_state(viewer));
                return;
            }

            TableMessage::Subscribe { user_id, sender } => {
                let _ = sender.try_send(self.table.get_state(Some(user_id)));
                self.subscribers.insert(user_id, sender);
                log::debug!("User {user_id} subscribed to table {}", self.table.id());
                return;
            }

            TableMessage::Unsubscribe { user_id } => {
                self.subscribers.remove(&user_id);
                log::debug!("User {user_id} unsubscribed from table {}", self.table.id());
                return;
            }

            TableMessage::ActionTimeout { turn } => match self.table.apply_timeout(turn) {
                Ok(Some(action)) => {
                    log::info!("Table {}: seat {} timed out, {action}", self.table.id(), turn.seat);
                }
                Ok(None) => {
                    log::debug!("Table {}: ignoring stale timeout {turn:?}", self.table.id());
                    return;
                }
                Err(e) if e.is_fatal() => self.abort_hand(&e).await,
                Err(e) => {
                    log::warn!("Table {}: timeout for seat {} failed: {e}", self.table.id(), turn.seat);
                }
            },

            TableMessage::ScheduleStart { delay } => {
                self.schedule_start(delay);
                return;
            }

            TableMessage::AutoStart => {
                self.scheduled_start = None;
                if self.table.is_hand_live() || self.table.pending_settlement().is_some() {
                    return;
                }
                if self.table.eligible_player_count() < self.table.config().min_players {
                    log::debug!("Table {}: not enough players to continue", self.table.id());
                    return;
                }
                if let Err(e) = self.start_hand().await {
                    log::debug!("Table {}: automatic start failed: {e}", self.table.id());
                }
            }

            TableMessage::Close { response } => {
                self.is_closed = true;
                let _ = response.send(());
                return;
            }
        }

        self.after_change().await;
    }

    async fn start_hand(&mut self) -> Result<(), GameError> {
        match self.table.start_hand() {
            Ok(()) => {
                if let Some(task) = self.scheduled_start.take() {
                    task.abort();
                }
                Ok(())
            }
            Err(e) if e.is_fatal() => {
                self.abort_hand(&e).await;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn take_action(&mut self, user_id: UserId, action: Action) -> Result<(), GameError> {
        match self.table.apply_action(user_id, action) {
            Ok(()) => {
                log::debug!("Table {}: {user_id} {action}", self.table.id());
                Ok(())
            }
            Err(e) if e.is_fatal() => {
                self.abort_hand(&e).await;
                Err(e)
            }
            Err(e) => {
                log::debug!("Table {}: rejected {action} from {user_id}: {e}", self.table.id());
                Err(e)
            }
        }
    }

    /// Refunds the hand in play after an invariant violation and marks it
    /// cancelled.
    async fn abort_hand(&mut self, cause: impl fmt::Display) {
        log::error!("Table {}: {cause}, aborting hand", self.table.id());
        let Some(hand_id) = self.table.abort_hand() else {
            return;
        };
        if let Err(e) = self.repository.cancel_hand(hand_id).await {
            log::error!("Table {}: failed to cancel hand {hand_id}: {e}", self.table.id());
        }
        self.recorded_hand = None;
        self.next_settlement_retry = None;
        self.save_snapshot().await;
    }

    /// Everything that follows a change to the table, in order.
    async fn after_change(&mut self) {
        self.record_hand_start().await;
        self.settle_pending().await;
        self.timer
            .arm(self.table.turn_key(), self.table.config().action_timeout());
        self.notify_state_change();
    }

    async fn record_hand_start(&mut self) {
        let Some(hand) = self.table.hand() else {
            return;
        };
        if self.recorded_hand == Some(hand.hand_id) {
            return;
        }
        let start = HandStart {
            hand_id: hand.hand_id,
            table_id: self.table.id(),
            hand_number: hand.hand_number,
            started_at: Utc::now(),
            stacks: self
                .table
                .players()
                .filter(|p| !p.hole_cards.is_empty())
                .map(|p| SeatStack {
                    user_id: p.user_id,
                    seat: p.seat,
                    chips: p.chips + p.total_invested,
                })
                .collect(),
        };
        // Settlement creates the hand row itself if this write is lost.
        if let Err(e) = self.repository.begin_hand(&start).await {
            log::warn!("Table {}: failed to record start of hand #{}: {e}", start.table_id, start.hand_number);
        }
        self.recorded_hand = Some(start.hand_id);
        self.save_snapshot().await;
    }

    /// Persists a finished hand and only then credits the pot.
    async fn settle_pending(&mut self) {
        let Some(pending) = self.table.pending_settlement() else {
            self.next_settlement_retry = None;
            return;
        };
        if self
            .next_settlement_retry
            .is_some_and(|at| Instant::now() < at)
        {
            return;
        }

        let settlement = Settlement::from_hand(self.table.id(), pending);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.repository.settle_hand(&settlement).await {
                Ok(outcome) => {
                    if outcome == SettleOutcome::AlreadyApplied {
                        log::info!(
                            "Table {}: hand #{} was already settled",
                            settlement.table_id,
                            settlement.hand_number
                        );
                    }
                    self.next_settlement_retry = None;
                    self.complete_settlement(settlement.hand_id).await;
                    return;
                }
                Err(PersistenceError::HandCancelled(hand_id)) => {
                    self.next_settlement_retry = None;
                    self.abort_hand(format!("hand {hand_id} was cancelled before it settled"))
                        .await;
                    return;
                }
                Err(e) if attempt < self.settlement_policy.max_attempts => {
                    let backoff = self.settlement_policy.backoff(attempt);
                    log::warn!(
                        "Table {}: settling hand #{} failed (attempt {attempt}), retrying in {backoff:?}: {e}",
                        settlement.table_id,
                        settlement.hand_number
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    let retry_in = self.settlement_policy.retry_interval;
                    log::error!(
                        "Table {}: settling hand #{} failed {attempt} times, next try in {retry_in:?}: {e}",
                        settlement.table_id,
                        settlement.hand_number
                    );
                    self.next_settlement_retry = Some(Instant::now() + retry_in);
                    return;
                }
            }
        }
    }

    async fn complete_settlement(&mut self, hand_id: Uuid) {
        if let Err(e) = self.table.confirm_settlement(hand_id) {
            log::error!("Table {}: could not confirm hand {hand_id}: {e}", self.table.id());
            return;
        }
        self.recorded_hand = None;
        self.save_snapshot().await;

        if self.table.eligible_player_count() >= self.table.config().min_players {
            self.schedule_start(self.table.config().hand_interval());
        }
    }

    async fn save_snapshot(&self) {
        let record = TableRecord::from_table(&self.table);
        if let Err(e) = self.repository.save_table(&record).await {
            log::warn!("Table {}: failed to save snapshot: {e}", self.table.id());
        }
    }

    /// Posts `AutoStart` to this actor after `delay`, replacing any start
    /// already scheduled.
    fn schedule_start(&mut self, delay: Duration) {
        if let Some(task) = self.scheduled_start.take() {
            task.abort();
        }
        let inbox = self.self_sender.clone();
        self.scheduled_start = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inbox) = inbox.upgrade() {
                let _ = inbox.send(TableMessage::AutoStart).await;
            }
        }));
        log::debug!("Table {}: next hand in {delay:?}", self.table.id());
    }

    /// Retries a settlement whose retry window has come around.
    async fn tick(&mut self) {
        if self.table.pending_settlement().is_some()
            && self
                .next_settlement_retry
                .is_some_and(|at| Instant::now() >= at)
        {
            self.after_change().await;
        }
    }

    /// Broadcast a masked view to every subscriber
    fn notify_state_change(&mut self) {
        let table = &self.table;
        self.subscribers.retain(|user_id, sender| {
            match sender.try_send(table.get_state(Some(*user_id))) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    log::warn!("Subscriber {user_id} channel full, dropping update");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    log::debug!("Subscriber {user_id} disconnected, removing");
                    false
                }
            }
        });
    }
}
