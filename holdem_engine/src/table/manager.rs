//! Registry of running tables.
//!
//! The manager owns one [`TableHandle`] per table and is the only way the
//! rest of the server reaches a table. Requests become messages in the
//! table actor's inbox; nothing here touches table state directly.

use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{
    sync::{Mutex, RwLock, mpsc, oneshot},
    task::JoinHandle,
};

use super::{
    actor::{SettlementPolicy, TableActor, TableHandle},
    config::TableConfig,
    errors::TableError,
    messages::TableMessage,
};
use crate::{
    db::{models::TableRecord, repository::TableRepository},
    game::{
        entities::{Action, Chips, SeatIndex, TableId, UserId},
        table::Table,
        view::TableView,
    },
    security::rate_limiter::ActionRateLimiter,
};

/// Table manager for managing multiple table instances
pub struct TableManager {
    repository: Arc<dyn TableRepository>,

    rate_limiter: Arc<ActionRateLimiter>,

    settlement_policy: SettlementPolicy,

    /// Active table handles
    tables: Arc<RwLock<HashMap<TableId, TableHandle>>>,

    /// Actor tasks, awaited on shutdown
    tasks: Mutex<Vec<JoinHandle<()>>>,

    next_table_id: Arc<RwLock<TableId>>,
}

impl TableManager {
    pub fn new(repository: Arc<dyn TableRepository>, rate_limiter: Arc<ActionRateLimiter>) -> Self {
        Self::with_settlement_policy(repository, rate_limiter, SettlementPolicy::default())
    }

    pub fn with_settlement_policy(
        repository: Arc<dyn TableRepository>,
        rate_limiter: Arc<ActionRateLimiter>,
        settlement_policy: SettlementPolicy,
    ) -> Self {
        Self {
            repository,
            rate_limiter,
            settlement_policy,
            tables: Arc::new(RwLock::new(HashMap::new())),
            tasks: Mutex::new(Vec::new()),
            next_table_id: Arc::new(RwLock::new(1)),
        }
    }

    pub fn repository(&self) -> Arc<dyn TableRepository> {
        self.repository.clone()
    }

    pub fn rate_limiter(&self) -> &ActionRateLimiter {
        &self.rate_limiter
    }

    /// Create, persist and spawn a new table
    pub async fn create_table(&self, config: TableConfig) -> Result<TableId, TableError> {
        config.validate().map_err(TableError::InvalidConfig)?;

        let mut next_id = self.next_table_id.write().await;
        let table_id = *next_id;
        *next_id += 1;
        drop(next_id);

        let table = Table::new(table_id, config);
        self.repository
            .save_table(&TableRecord::from_table(&table))
            .await?;
        self.register_table(table).await;

        log::info!("Created table {table_id}");
        Ok(table_id)
    }

    /// Spawns an actor for an already built table, e.g. one rebuilt by
    /// recovery. Later ids handed out by `create_table` won't collide with
    /// it.
    pub async fn register_table(&self, table: Table) -> TableHandle {
        let table_id = table.id();
        let (actor, handle) = TableActor::new(table, self.repository.clone(), self.settlement_policy.clone());

        let mut next_id = self.next_table_id.write().await;
        *next_id = (*next_id).max(table_id + 1);
        drop(next_id);

        let previous = self.tables.write().await.insert(table_id, handle.clone());
        if previous.is_some() {
            log::warn!("Table {table_id} registered twice, replacing the old actor");
        }

        let task = tokio::spawn(async move {
            actor.run().await;
        });
        self.tasks.lock().await.push(task);

        handle
    }

    pub async fn get_table(&self, table_id: TableId) -> Option<TableHandle> {
        self.tables.read().await.get(&table_id).cloned()
    }

    pub async fn table_ids(&self) -> Vec<TableId> {
        let mut ids: Vec<TableId> = self.tables.read().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Get active table count
    pub async fn active_table_count(&self) -> usize {
        self.tables.read().await.len()
    }

    async fn send(&self, table_id: TableId, message: TableMessage) -> Result<(), TableError> {
        let handle = self
            .get_table(table_id)
            .await
            .ok_or(TableError::TableNotFound(table_id))?;
        handle
            .send(message)
            .await
            .map_err(|_| TableError::TableClosed(table_id))
    }

    async fn request<T>(
        &self,
        table_id: TableId,
        message: impl FnOnce(oneshot::Sender<T>) -> TableMessage,
    ) -> Result<T, TableError> {
        let (tx, rx) = oneshot::channel();
        self.send(table_id, message(tx)).await?;
        rx.await.map_err(|_| TableError::TableClosed(table_id))
    }

    pub async fn add_player(
        &self,
        table_id: TableId,
        user_id: UserId,
        name: &str,
        seat: SeatIndex,
        chips: Chips,
    ) -> Result<(), TableError> {
        let name = name.to_string();
        Ok(self
            .request(table_id, |response| TableMessage::AddPlayer {
                user_id,
                name,
                seat,
                chips,
                response,
            })
            .await??)
    }

    /// Returns the chips cashed out, or `None` if the player leaves once
    /// the current hand settles.
    pub async fn remove_player(&self, table_id: TableId, user_id: UserId) -> Result<Option<Chips>, TableError> {
        Ok(self
            .request(table_id, |response| TableMessage::RemovePlayer { user_id, response })
            .await??)
    }

    pub async fn set_sitting_out(
        &self,
        table_id: TableId,
        user_id: UserId,
        sitting_out: bool,
    ) -> Result<(), TableError> {
        Ok(self
            .request(table_id, |response| TableMessage::SitOut {
                user_id,
                sitting_out,
                response,
            })
            .await??)
    }

    pub async fn start_game(&self, table_id: TableId) -> Result<(), TableError> {
        Ok(self
            .request(table_id, |response| TableMessage::StartGame { response })
            .await??)
    }

    /// Start a hand on `table_id` once `delay` has passed.
    pub async fn schedule_start(&self, table_id: TableId, delay: Duration) -> Result<(), TableError> {
        self.send(table_id, TableMessage::ScheduleStart { delay }).await
    }

    /// Queues a player's action behind the rate limiter. Rejected actions
    /// never reach the table.
    pub async fn submit_action(&self, table_id: TableId, user_id: UserId, action: Action) -> Result<(), TableError> {
        if !self.rate_limiter.allow(user_id) {
            log::debug!("Rate limited {action} from {user_id} at table {table_id}");
            return Err(TableError::RateLimited(user_id));
        }
        Ok(self
            .request(table_id, |response| TableMessage::TakeAction {
                user_id,
                action,
                response,
            })
            .await??)
    }

    pub async fn get_state(&self, table_id: TableId, viewer: Option<UserId>) -> Result<TableView, TableError> {
        self.request(table_id, |response| TableMessage::GetState { viewer, response })
            .await
    }

    /// Streams `user_id`'s view of the table into `sender` after every
    /// change, starting with the current one.
    pub async fn subscribe(
        &self,
        table_id: TableId,
        user_id: UserId,
        sender: mpsc::Sender<TableView>,
    ) -> Result<(), TableError> {
        self.send(table_id, TableMessage::Subscribe { user_id, sender }).await
    }

    pub async fn unsubscribe(&self, table_id: TableId, user_id: UserId) -> Result<(), TableError> {
        self.send(table_id, TableMessage::Unsubscribe { user_id }).await
    }

    /// Closes every table and waits for the actors to stop.
    pub async fn shutdown(&self) {
        let handles: Vec<TableHandle> = self.tables.write().await.drain().map(|(_, h)| h).collect();
        for handle in handles {
            let (tx, rx) = oneshot::channel();
            if handle.send(TableMessage::Close { response: tx }).await.is_ok() {
                let _ = rx.await;
            }
        }

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                log::error!("Table actor ended abnormally: {e}");
            }
        }
        log::info!("All tables closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::InMemoryTableRepository;
    use crate::game::errors::GameError;
    use crate::security::rate_limiter::RateLimitConfig;

    fn manager() -> TableManager {
        TableManager::new(
            Arc::new(InMemoryTableRepository::new()),
            Arc::new(ActionRateLimiter::default()),
        )
    }

    #[tokio::test]
    async fn test_create_table_assigns_ids() {
        let manager = manager();
        let first = manager.create_table(TableConfig::default()).await.unwrap();
        let second = manager.create_table(TableConfig::default()).await.unwrap();
        assert_eq!((first, second), (1, 2));
        assert_eq!(manager.table_ids().await, vec![1, 2]);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_create_table_rejects_invalid_config() {
        let manager = manager();
        let config = TableConfig {
            big_blind: 0,
            ..TableConfig::default()
        };
        assert!(matches!(
            manager.create_table(config).await,
            Err(TableError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_register_table_bumps_next_id() {
        let manager = manager();
        manager.register_table(Table::new(7, TableConfig::default())).await;
        assert_eq!(manager.create_table(TableConfig::default()).await.unwrap(), 8);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_table() {
        let manager = manager();
        assert!(matches!(
            manager.start_game(42).await,
            Err(TableError::TableNotFound(42))
        ));
    }

    #[tokio::test]
    async fn test_game_errors_pass_through() {
        let manager = manager();
        let id = manager.create_table(TableConfig::default()).await.unwrap();
        manager.add_player(id, 1, "alice", 0, 500).await.unwrap();
        assert!(matches!(
            manager.add_player(id, 2, "bob", 0, 500).await,
            Err(TableError::Game(GameError::SeatTaken(0)))
        ));
        assert!(matches!(
            manager.start_game(id).await,
            Err(TableError::Game(GameError::NotEnoughPlayers))
        ));
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_rate_limited_action_never_reaches_table() {
        let manager = TableManager::new(
            Arc::new(InMemoryTableRepository::new()),
            Arc::new(ActionRateLimiter::new(RateLimitConfig {
                actions_per_sec: 0.001,
                burst: 1,
            })),
        );
        let id = manager.create_table(TableConfig::default()).await.unwrap();

        // The first action spends the only token and is rejected by the game.
        assert!(matches!(
            manager.submit_action(id, 1, Action::Fold).await,
            Err(TableError::Game(GameError::UserNotSeated))
        ));
        assert!(matches!(
            manager.submit_action(id, 1, Action::Fold).await,
            Err(TableError::RateLimited(1))
        ));
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_closed_after_shutdown() {
        let manager = manager();
        let id = manager.create_table(TableConfig::default()).await.unwrap();
        let handle = manager.get_table(id).await.unwrap();
        manager.shutdown().await;
        assert_eq!(manager.active_table_count().await, 0);
        assert!(handle.is_closed());
    }
}
