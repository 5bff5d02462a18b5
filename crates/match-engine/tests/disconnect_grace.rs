//! Disconnect handling: the grace window, forfeits and eviction of finished
//! matches.
//!
//! Runs on paused time; timers are moved forward with `advance` before any
//! wait that depends on them.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use engine_test_utils::TestEngine;
use match_engine::actors::{ActionOutcome, InboundAction, OutboundEvent};
use match_engine::errors::EngineError;
use match_engine::game::{EndReason, Mark, MatchStatus};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::advance;

const GRACE: Duration = Duration::from_secs(60);
const EVICTION: Duration = Duration::from_secs(30);

async fn past(duration: Duration) {
    advance(duration + Duration::from_secs(1)).await;
    engine_test_utils::settle().await;
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_past_grace_forfeits() {
    let engine = TestEngine::start();
    let (mut alice, bob) = engine.paired_clients("alice", "bob").await;
    alice.play(4).await.unwrap();
    alice.drain();

    assert_eq!(bob.disconnect().await.unwrap(), ActionOutcome::Disconnected);
    past(GRACE).await;

    let events = engine.sink.wait_for(1).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].reason, EndReason::DisconnectTimeout);
    assert_eq!(events[0].winner_id.as_ref(), Some(&alice.player_id));
    assert_eq!(events[0].loser_id.as_ref(), Some(&bob.player_id));
    assert_eq!(events[0].moves, 1);

    let OutboundEvent::MatchEnded { result, .. } = alice.expect_match_ended().await else {
        unreachable!();
    };
    assert_eq!(result.winner_mark, Some(Mark::X));
    assert_eq!(result.reason, EndReason::DisconnectTimeout);
}

#[tokio::test(start_paused = true)]
async fn test_no_forfeit_before_grace_elapses() {
    let engine = TestEngine::start();
    let (alice, bob) = engine.paired_clients("alice", "bob").await;
    bob.disconnect().await.unwrap();

    advance(GRACE - Duration::from_secs(1)).await;
    engine_test_utils::settle().await;

    assert!(engine.sink.is_empty());
    // X can still move while O is away.
    assert!(alice.play(0).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_within_grace_resumes_match() {
    let engine = TestEngine::start();
    let (alice, mut bob) = engine.paired_clients("alice", "bob").await;
    alice.play(0).await.unwrap();

    bob.disconnect().await.unwrap();
    advance(Duration::from_secs(30)).await;

    let ActionOutcome::Reconnected { match_id } = bob.reconnect().await.unwrap() else {
        unreachable!("expected Reconnected");
    };
    let Some(OutboundEvent::StateUpdate {
        match_id: state_match,
        move_count,
        turn,
        ..
    }) = bob.next_event().await
    else {
        unreachable!("expected StateUpdate after reconnect");
    };
    assert_eq!(state_match, match_id);
    assert_eq!(move_count, 1);
    assert_eq!(turn, Some(Mark::O));

    // The original deadline passes without a forfeit.
    past(GRACE).await;
    assert!(engine.sink.is_empty());
    assert!(bob.play(4).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_connect_acts_as_reconnect_for_seated_player() {
    let engine = TestEngine::start();
    let (_alice, bob) = engine.paired_clients("alice", "bob").await;
    bob.disconnect().await.unwrap();
    drop(bob);

    let mut bob = engine.client("bob").await;
    let Some(OutboundEvent::StateUpdate { status, .. }) = bob.next_event().await else {
        unreachable!("expected StateUpdate on connect");
    };
    assert_eq!(status, MatchStatus::InProgress);

    past(GRACE).await;
    assert!(engine.sink.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_after_finish_replays_result() {
    let engine = TestEngine::start();
    let (alice, mut bob) = engine.paired_clients("alice", "bob").await;
    bob.disconnect().await.unwrap();
    past(GRACE).await;
    engine.sink.wait_for(1).await;

    // Seat lingers until eviction; reconnecting shows the final result.
    assert!(matches!(
        bob.reconnect().await.unwrap(),
        ActionOutcome::Reconnected { .. }
    ));
    let OutboundEvent::MatchEnded { result, .. } = bob.expect_match_ended().await else {
        unreachable!();
    };
    assert_eq!(result.reason, EndReason::DisconnectTimeout);
    assert_eq!(result.winner_mark, Some(Mark::X));

    assert!(matches!(
        alice.play(0).await,
        Err(EngineError::UnknownOrClosedMatch)
    ));
    assert_eq!(engine.sink.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_finished_match_evicted_once_both_leave() {
    let engine = TestEngine::start();
    let alice = engine.client("alice").await;
    let bob = engine.client("bob").await;
    alice.join().await.unwrap();
    let ActionOutcome::Paired { match_id } = bob.join().await.unwrap() else {
        unreachable!();
    };

    assert_eq!(engine.metrics.connected_count(), 2);

    bob.resign().await.unwrap();
    alice.disconnect().await.unwrap();
    bob.disconnect().await.unwrap();
    assert_eq!(engine.metrics.connected_count(), 0);

    // Still queryable while lingering.
    let state = engine.coordinator.get_match_state(match_id).await.unwrap();
    assert!(state.result.is_some());

    past(EVICTION).await;

    assert!(matches!(
        engine.coordinator.get_match_state(match_id).await,
        Err(EngineError::UnknownOrClosedMatch)
    ));
    let status = engine.coordinator.get_status().await.unwrap();
    assert_eq!(status.match_count, 0);
    assert_eq!(status.connected_players, 0);
    assert_eq!(engine.sink.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_cancels_pending_eviction() {
    let engine = TestEngine::start();
    let (alice, mut bob) = engine.paired_clients("alice", "bob").await;
    alice.resign().await.unwrap();
    alice.disconnect().await.unwrap();
    bob.disconnect().await.unwrap();

    advance(EVICTION / 2).await;
    let ActionOutcome::Reconnected { match_id } = bob.reconnect().await.unwrap() else {
        unreachable!();
    };

    past(EVICTION).await;
    let state = engine.coordinator.get_match_state(match_id).await.unwrap();
    assert_eq!(state.result.map(|r| r.winner_mark), Some(Some(Mark::O)));
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_during_move_flood_still_forfeits() {
    let engine = TestEngine::start();
    let (mut alice, bob) = engine.paired_clients("alice", "bob").await;

    // Enough out-of-turn moves to overrun the match mailbox.
    let mut flood = JoinSet::new();
    for _ in 0..100 {
        let coordinator = engine.coordinator.clone();
        let player_id = bob.player_id.clone();
        flood.spawn(async move {
            coordinator
                .submit(player_id, InboundAction::Move { cell_index: 0 })
                .await
        });
    }
    let coordinator = engine.coordinator.clone();
    let player_id = bob.player_id.clone();
    let disconnect =
        tokio::spawn(async move { coordinator.submit(player_id, InboundAction::Disconnect).await });

    assert_eq!(
        disconnect.await.unwrap().unwrap(),
        ActionOutcome::Disconnected
    );
    while let Some(result) = flood.join_next().await {
        // Refused or rejected, never applied.
        assert!(result.unwrap().is_err());
    }

    past(GRACE).await;
    let events = engine.sink.wait_for(1).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].reason, EndReason::DisconnectTimeout);
    assert_eq!(events[0].winner_id.as_ref(), Some(&alice.player_id));

    alice.drain();
    assert_eq!(alice.join().await.unwrap(), ActionOutcome::Waiting);
}
