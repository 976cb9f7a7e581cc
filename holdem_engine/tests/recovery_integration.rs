//! Restart scenarios: tables are rebuilt from the repository, unfinished
//! hands are cancelled and refunded, and only healthy tables resume dealing.

use holdem_engine::{
    db::{HandStatus, InMemoryTableRepository, SeatRecord, TableRecord, TableRepository},
    game::{Action, TableStatus},
    recovery::{RecoveryConfig, RecoveryError, recover_tables},
    security::ActionRateLimiter,
    table::{TableConfig, TableManager},
};
use std::{sync::Arc, time::Duration};
use tokio::time::sleep;

fn config(name: &str) -> TableConfig {
    TableConfig {
        name: name.to_string(),
        hand_interval_ms: 600_000,
        ..TableConfig::default()
    }
}

fn seat(user_id: i64, seat: usize, chips: u32) -> SeatRecord {
    SeatRecord {
        user_id,
        name: format!("player{user_id}"),
        seat,
        chips,
        sitting_out: false,
    }
}

fn record(table_id: i64, seats: Vec<SeatRecord>) -> TableRecord {
    TableRecord {
        table_id,
        config: config(&format!("Table {table_id}")),
        seats,
        hands_played: 4,
        unfinished_hand: None,
    }
}

fn manager(repo: &Arc<InMemoryTableRepository>) -> TableManager {
    TableManager::new(repo.clone(), Arc::new(ActionRateLimiter::default()))
}

#[tokio::test(start_paused = true)]
async fn test_restart_mid_hand_refunds_bets() {
    let repo = Arc::new(InMemoryTableRepository::new());
    let before = manager(&repo);
    let table_id = before.create_table(config("Crash")).await.unwrap();
    before.add_player(table_id, 1, "alice", 0, 500).await.unwrap();
    before.add_player(table_id, 2, "bob", 1, 500).await.unwrap();
    before.add_player(table_id, 3, "carol", 2, 500).await.unwrap();
    before.start_game(table_id).await.unwrap();

    let view = before.get_state(table_id, None).await.unwrap();
    let seat = view.current_turn.unwrap();
    let user = view.players.iter().find(|p| p.seat == seat).unwrap().user_id;
    before.submit_action(table_id, user, Action::Raise(60)).await.unwrap();
    before.shutdown().await;

    // The process "crashes" here with money in the pot.
    let after = manager(&repo);
    let report = recover_tables(repo.as_ref(), &after, &RecoveryConfig::default())
        .await
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(report.recovered, vec![table_id]);
    assert_eq!(report.cancelled_hands.len(), 1);
    assert!(report.scheduled_starts.is_empty());
    assert_eq!(
        repo.hand_status(report.cancelled_hands[0]).await,
        Some(HandStatus::Cancelled)
    );

    let view = after.get_state(table_id, None).await.unwrap();
    assert_eq!(view.status, TableStatus::Waiting);
    assert_eq!(view.players.len(), 3);
    assert!(view.players.iter().all(|p| p.chips == 500));

    // Nobody is dealt in until someone asks.
    sleep(Duration::from_secs(60)).await;
    let view = after.get_state(table_id, None).await.unwrap();
    assert_eq!(view.hand_number, None);

    after.start_game(table_id).await.unwrap();
    let view = after.get_state(table_id, None).await.unwrap();
    assert_eq!(view.hand_number, Some(2));
    after.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_settled_hands_survive_restart() {
    let repo = Arc::new(InMemoryTableRepository::new());
    let before = manager(&repo);
    let table_id = before.create_table(config("Settled")).await.unwrap();
    before.add_player(table_id, 1, "alice", 0, 500).await.unwrap();
    before.add_player(table_id, 2, "bob", 1, 500).await.unwrap();
    before.start_game(table_id).await.unwrap();
    before.submit_action(table_id, 1, Action::Fold).await.unwrap();
    before.shutdown().await;

    let after = manager(&repo);
    let report = recover_tables(repo.as_ref(), &after, &RecoveryConfig::default())
        .await
        .unwrap();
    assert!(report.cancelled_hands.is_empty());
    assert_eq!(report.scheduled_starts, vec![table_id]);

    let view = after.get_state(table_id, Some(1)).await.unwrap();
    let chips = |id| view.players.iter().find(|p| p.user_id == id).unwrap().chips;
    assert_eq!(chips(1), 495);
    assert_eq!(chips(2), 505);
    after.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_corrupt_table_does_not_block_others() {
    let repo = Arc::new(InMemoryTableRepository::new());
    for table_id in 1..=3 {
        repo.save_table(&record(table_id, vec![seat(table_id * 10, 0, 300), seat(table_id * 10 + 1, 3, 250)]))
            .await
            .unwrap();
    }
    repo.mark_corrupt(2).await;

    let manager = manager(&repo);
    let report = recover_tables(repo.as_ref(), &manager, &RecoveryConfig::default())
        .await
        .unwrap();
    assert!(!report.is_complete());
    assert_eq!(report.recovered, vec![1, 3]);
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(
        report.failures[0],
        RecoveryError::PartialFailure { table_id: 2, .. }
    ));
    assert!(manager.get_table(2).await.is_none());

    // New tables never reuse a recovered id.
    let created = manager.create_table(config("Fresh")).await.unwrap();
    assert_eq!(created, 4);
    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_grace_period_before_dealing() {
    let repo = Arc::new(InMemoryTableRepository::new());
    repo.save_table(&record(7, vec![seat(1, 0, 300), seat(2, 5, 300)]))
        .await
        .unwrap();
    repo.save_table(&record(8, vec![seat(3, 0, 300), seat(4, 1, 0)]))
        .await
        .unwrap();

    let manager = manager(&repo);
    let config = RecoveryConfig {
        grace_period: Duration::from_secs(10),
    };
    let report = recover_tables(repo.as_ref(), &manager, &config).await.unwrap();
    assert_eq!(report.recovered, vec![7, 8]);
    assert_eq!(report.scheduled_starts, vec![7]);

    let view = manager.get_state(7, None).await.unwrap();
    assert_eq!(view.hand_number, None);

    sleep(Duration::from_secs(11)).await;
    let view = manager.get_state(7, None).await.unwrap();
    assert_eq!(view.status, TableStatus::Playing);
    assert_eq!(view.hand_number, Some(5));

    // One funded player can't start a hand.
    let view = manager.get_state(8, None).await.unwrap();
    assert_eq!(view.hand_number, None);
    assert_eq!(view.players.len(), 2);
    manager.shutdown().await;
}

#[tokio::test]
async fn test_empty_repository_recovers_nothing() {
    let repo = Arc::new(InMemoryTableRepository::new());
    let manager = manager(&repo);
    let report = recover_tables(repo.as_ref(), &manager, &RecoveryConfig::default())
        .await
        .unwrap();
    assert!(report.is_complete());
    assert!(report.recovered.is_empty());
    assert_eq!(manager.active_table_count().await, 0);
}
