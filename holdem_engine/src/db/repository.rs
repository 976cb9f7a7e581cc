//! Repository trait for table persistence, with the PostgreSQL
//! implementation.
//!
//! The trait keeps the table runtime and recovery independent of the
//! storage backend; tests run against [`super::memory`].

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use super::{
    errors::{PersistenceError, PersistenceResult},
    models::{HandStart, HandStatus, SeatRecord, SettleOutcome, Settlement, TableRecord},
    timeouts::{with_default_timeout, with_transaction_timeout},
};
use crate::game::entities::{Chips, SeatIndex, TableId};

/// Storage for table snapshots, hand lifecycle records and the chip
/// ledger.
#[async_trait]
pub trait TableRepository: Send + Sync {
    /// Ids of every active table.
    async fn table_ids(&self) -> PersistenceResult<Vec<TableId>>;

    /// One table's config, seats and any unfinished hand.
    async fn load_table(&self, table_id: TableId) -> PersistenceResult<TableRecord>;

    /// Every active table. A table that fails to load is returned as an
    /// error next to its id instead of failing the whole batch.
    async fn load_tables(
        &self,
    ) -> PersistenceResult<Vec<(TableId, PersistenceResult<TableRecord>)>> {
        let mut tables = Vec::new();
        for table_id in self.table_ids().await? {
            let record = self.load_table(table_id).await;
            tables.push((table_id, record));
        }
        Ok(tables)
    }

    /// Upserts the table row and replaces its seats.
    async fn save_table(&self, record: &TableRecord) -> PersistenceResult<()>;

    /// Records that a hand was dealt.
    async fn begin_hand(&self, start: &HandStart) -> PersistenceResult<()>;

    /// Writes the ledger entries, the completion record and post-hand
    /// stacks in one transaction. Settling a hand that's already completed
    /// writes nothing and returns [`SettleOutcome::AlreadyApplied`].
    async fn settle_hand(&self, settlement: &Settlement) -> PersistenceResult<SettleOutcome>;

    /// Marks an unfinished hand as cancelled. A no-op for hands that
    /// already finished.
    async fn cancel_hand(&self, hand_id: Uuid) -> PersistenceResult<()>;
}

/// Default PostgreSQL implementation of `TableRepository`
pub struct PgTableRepository {
    pool: PgPool,
}

impl PgTableRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the bundled schema migrations.
    pub async fn migrate(&self) -> PersistenceResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| PersistenceError::Database(e.into()))
    }
}

fn to_db_chips(chips: Chips) -> i64 {
    i64::from(chips)
}

fn from_db_chips(table_id: TableId, raw: i64) -> PersistenceResult<Chips> {
    Chips::try_from(raw)
        .map_err(|_| PersistenceError::Corrupt(format!("table {table_id}: chip count {raw} out of range")))
}

fn to_db_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

async fn replace_seats(
    tx: &mut Transaction<'_, Postgres>,
    record: &TableRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM table_seats WHERE table_id = $1")
        .bind(record.table_id)
        .execute(&mut **tx)
        .await?;
    for seat in &record.seats {
        sqlx::query(
            r#"
            INSERT INTO table_seats (table_id, seat_index, user_id, display_name, chips, sitting_out)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.table_id)
        .bind(seat.seat as i32)
        .bind(seat.user_id)
        .bind(&seat.name)
        .bind(to_db_chips(seat.chips))
        .bind(seat.sitting_out)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl TableRepository for PgTableRepository {
    async fn table_ids(&self) -> PersistenceResult<Vec<TableId>> {
        let rows = with_default_timeout(
            sqlx::query("SELECT id FROM tables WHERE is_active = true ORDER BY id ASC")
                .fetch_all(&self.pool),
        )
        .await?;
        Ok(rows.iter().map(|row| row.get("id")).collect())
    }

    async fn load_table(&self, table_id: TableId) -> PersistenceResult<TableRecord> {
        let row = with_default_timeout(
            sqlx::query("SELECT id, config, hands_played FROM tables WHERE id = $1")
                .bind(table_id)
                .fetch_optional(&self.pool),
        )
        .await?
        .ok_or(PersistenceError::TableNotFound(table_id))?;

        let config = serde_json::from_value(row.get::<serde_json::Value, _>("config"))?;
        let hands_played = u64::try_from(row.get::<i64, _>("hands_played")).map_err(|_| {
            PersistenceError::Corrupt(format!("table {table_id}: negative hand count"))
        })?;

        let seat_rows = with_default_timeout(
            sqlx::query(
                r#"
                SELECT seat_index, user_id, display_name, chips, sitting_out
                FROM table_seats
                WHERE table_id = $1
                ORDER BY seat_index ASC
                "#,
            )
            .bind(table_id)
            .fetch_all(&self.pool),
        )
        .await?;

        let mut seats = Vec::with_capacity(seat_rows.len());
        for row in seat_rows {
            let seat = SeatIndex::try_from(row.get::<i32, _>("seat_index")).map_err(|_| {
                PersistenceError::Corrupt(format!("table {table_id}: negative seat index"))
            })?;
            seats.push(SeatRecord {
                user_id: row.get("user_id"),
                name: row.get("display_name"),
                seat,
                chips: from_db_chips(table_id, row.get("chips"))?,
                sitting_out: row.get("sitting_out"),
            });
        }

        let unfinished_hand = with_default_timeout(
            sqlx::query(
                r#"
                SELECT hand_id FROM hands
                WHERE table_id = $1 AND status = $2
                ORDER BY started_at DESC
                LIMIT 1
                "#,
            )
            .bind(table_id)
            .bind(HandStatus::InProgress.as_str())
            .fetch_optional(&self.pool),
        )
        .await?
        .map(|row| row.get::<Uuid, _>("hand_id"));

        Ok(TableRecord {
            table_id,
            config,
            seats,
            hands_played,
            unfinished_hand,
        })
    }

    async fn save_table(&self, record: &TableRecord) -> PersistenceResult<()> {
        let config = serde_json::to_value(&record.config)?;
        with_transaction_timeout(
            async {
                let mut tx = self.pool.begin().await?;
                sqlx::query(
                    r#"
                    INSERT INTO tables (id, name, config, hands_played)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (id) DO UPDATE
                    SET name = EXCLUDED.name,
                        config = EXCLUDED.config,
                        hands_played = GREATEST(tables.hands_played, EXCLUDED.hands_played),
                        updated_at = NOW()
                    "#,
                )
                .bind(record.table_id)
                .bind(&record.config.name)
                .bind(&config)
                .bind(to_db_count(record.hands_played))
                .execute(&mut *tx)
                .await?;
                replace_seats(&mut tx, record).await?;
                tx.commit().await?;
                Ok::<_, PersistenceError>(())
            },
            PersistenceError::Timeout,
        )
        .await
    }

    async fn begin_hand(&self, start: &HandStart) -> PersistenceResult<()> {
        let stacks = serde_json::to_value(&start.stacks)?;
        with_default_timeout(
            sqlx::query(
                r#"
                INSERT INTO hands (hand_id, table_id, hand_number, status, started_at, starting_stacks)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (hand_id) DO NOTHING
                "#,
            )
            .bind(start.hand_id)
            .bind(start.table_id)
            .bind(to_db_count(start.hand_number))
            .bind(HandStatus::InProgress.as_str())
            .bind(start.started_at)
            .bind(&stacks)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn settle_hand(&self, settlement: &Settlement) -> PersistenceResult<SettleOutcome> {
        let result = serde_json::to_value(settlement)?;
        with_transaction_timeout(
            async {
                let mut tx = self.pool.begin().await?;

                // The hand row may be missing if recording the start failed.
                sqlx::query(
                    r#"
                    INSERT INTO hands (hand_id, table_id, hand_number, status, started_at)
                    VALUES ($1, $2, $3, $4, NOW())
                    ON CONFLICT (hand_id) DO NOTHING
                    "#,
                )
                .bind(settlement.hand_id)
                .bind(settlement.table_id)
                .bind(to_db_count(settlement.hand_number))
                .bind(HandStatus::InProgress.as_str())
                .execute(&mut *tx)
                .await?;

                let status: String = sqlx::query("SELECT status FROM hands WHERE hand_id = $1 FOR UPDATE")
                    .bind(settlement.hand_id)
                    .fetch_one(&mut *tx)
                    .await?
                    .get("status");
                match status.parse::<HandStatus>().map_err(PersistenceError::Corrupt)? {
                    HandStatus::Completed => return Ok(SettleOutcome::AlreadyApplied),
                    HandStatus::Cancelled => return Err(PersistenceError::HandCancelled(settlement.hand_id)),
                    HandStatus::InProgress => {}
                }

                for entry in settlement.ledger_entries() {
                    sqlx::query(
                        r#"
                        INSERT INTO ledger_entries (hand_id, table_id, user_id, kind, amount, idempotency_key)
                        VALUES ($1, $2, $3, $4, $5, $6)
                        ON CONFLICT (idempotency_key) DO NOTHING
                        "#,
                    )
                    .bind(entry.hand_id)
                    .bind(entry.table_id)
                    .bind(entry.user_id)
                    .bind(entry.kind.as_str())
                    .bind(entry.signed_amount())
                    .bind(&entry.idempotency_key)
                    .execute(&mut *tx)
                    .await?;
                }

                for stack in &settlement.seats_after {
                    sqlx::query(
                        "UPDATE table_seats SET chips = $1, updated_at = NOW() WHERE table_id = $2 AND user_id = $3",
                    )
                    .bind(to_db_chips(stack.chips))
                    .bind(settlement.table_id)
                    .bind(stack.user_id)
                    .execute(&mut *tx)
                    .await?;
                }

                sqlx::query(
                    "UPDATE hands SET status = $1, finished_at = NOW(), result = $2 WHERE hand_id = $3",
                )
                .bind(HandStatus::Completed.as_str())
                .bind(&result)
                .bind(settlement.hand_id)
                .execute(&mut *tx)
                .await?;

                sqlx::query(
                    "UPDATE tables SET hands_played = GREATEST(hands_played, $1), updated_at = NOW() WHERE id = $2",
                )
                .bind(to_db_count(settlement.hand_number))
                .bind(settlement.table_id)
                .execute(&mut *tx)
                .await?;

                tx.commit().await?;
                Ok::<_, PersistenceError>(SettleOutcome::Applied)
            },
            PersistenceError::Timeout,
        )
        .await
    }

    async fn cancel_hand(&self, hand_id: Uuid) -> PersistenceResult<()> {
        with_default_timeout(
            sqlx::query(
                "UPDATE hands SET status = $1, finished_at = NOW() WHERE hand_id = $2 AND status = $3",
            )
            .bind(HandStatus::Cancelled.as_str())
            .bind(hand_id)
            .bind(HandStatus::InProgress.as_str())
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }
}
