//! Integration tests for complete matches driven through the coordinator.
//!
//! Covers board-decided wins and draws, refused moves, resignation, and the
//! "one outcome per match" guarantee.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use engine_test_utils::{TestClient, TestEngine};
use match_engine::actors::{ActionOutcome, OutboundEvent};
use match_engine::errors::{EngineError, MoveError, RejectReason};
use match_engine::game::{Cell, EndReason, Mark, MatchStatus, Outcome};

/// Play `cells` alternately starting with `x`, asserting each is accepted.
async fn play_sequence(x: &TestClient, o: &TestClient, cells: &[usize]) -> Vec<ActionOutcome> {
    let mut outcomes = Vec::new();
    for (i, cell) in cells.iter().enumerate() {
        let player = if i % 2 == 0 { x } else { o };
        outcomes.push(player.play(*cell).await.unwrap());
    }
    outcomes
}

#[tokio::test]
async fn test_diagonal_win_for_x() {
    let engine = TestEngine::start();
    let (mut alice, mut bob) = engine.paired_clients("alice", "bob").await;

    let outcomes = play_sequence(&alice, &bob, &[0, 1, 4, 2, 8]).await;
    assert_eq!(
        outcomes.last(),
        Some(&ActionOutcome::MoveAccepted {
            outcome: Some(Outcome::WinFor(Mark::X))
        })
    );

    for client in [&mut alice, &mut bob] {
        let OutboundEvent::MatchEnded { result, .. } = client.expect_match_ended().await else {
            unreachable!();
        };
        assert_eq!(result.winner_mark, Some(Mark::X));
        assert_eq!(result.reason, EndReason::Board);
    }

    let events = engine.sink.wait_for(1).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].winner_id.as_ref(), Some(&alice.player_id));
    assert_eq!(events[0].loser_id.as_ref(), Some(&bob.player_id));
    assert!(!events[0].draw);
    assert_eq!(events[0].moves, 5);
}

#[tokio::test]
async fn test_full_board_draw() {
    let engine = TestEngine::start();
    let (alice, bob) = engine.paired_clients("alice", "bob").await;

    let outcomes = play_sequence(&alice, &bob, &[0, 1, 2, 4, 6, 8, 3, 5, 7]).await;
    assert_eq!(
        outcomes.last(),
        Some(&ActionOutcome::MoveAccepted {
            outcome: Some(Outcome::Draw)
        })
    );

    let events = engine.sink.wait_for(1).await;
    assert!(events[0].draw);
    assert_eq!(events[0].winner_id, None);
    assert_eq!(events[0].loser_id, None);
    assert_eq!(events[0].moves, 9);
}

#[tokio::test]
async fn test_state_updates_reach_both_players() {
    let engine = TestEngine::start();
    let (mut alice, mut bob) = engine.paired_clients("alice", "bob").await;

    alice.play(4).await.unwrap();

    for client in [&mut alice, &mut bob] {
        let Some(OutboundEvent::StateUpdate {
            board,
            turn,
            status,
            move_count,
            ..
        }) = client.next_event().await
        else {
            unreachable!("expected StateUpdate");
        };
        assert_eq!(board.cell(4), Some(Cell::X));
        assert_eq!(turn, Some(Mark::O));
        assert_eq!(status, MatchStatus::InProgress);
        assert_eq!(move_count, 1);
    }
}

#[tokio::test]
async fn test_out_of_range_cell_only_notifies_submitter() {
    let engine = TestEngine::start();
    let (mut alice, mut bob) = engine.paired_clients("alice", "bob").await;

    let err = alice.play(9).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidMove(MoveError::OutOfRange(9))
    ));

    assert!(matches!(
        alice.next_event().await,
        Some(OutboundEvent::Rejected { code: 1, .. })
    ));
    assert!(bob.drain().is_empty());

    // Board and turn unchanged: X may still move.
    assert!(alice.play(0).await.is_ok());
}

#[tokio::test]
async fn test_out_of_turn_and_occupied_moves_rejected() {
    let engine = TestEngine::start();
    let (alice, mut bob) = engine.paired_clients("alice", "bob").await;

    assert!(matches!(
        bob.play(0).await,
        Err(EngineError::RejectedMove(RejectReason::NotYourTurn))
    ));
    assert!(matches!(
        bob.next_event().await,
        Some(OutboundEvent::Rejected { code: 2, .. })
    ));

    alice.play(0).await.unwrap();
    bob.drain();
    assert!(matches!(
        bob.play(0).await,
        Err(EngineError::InvalidMove(MoveError::Occupied(0)))
    ));
}

#[tokio::test]
async fn test_moves_after_finish_are_closed() {
    let engine = TestEngine::start();
    let (alice, bob) = engine.paired_clients("alice", "bob").await;
    play_sequence(&alice, &bob, &[0, 3, 1, 4, 2]).await;

    assert!(matches!(
        bob.play(5).await,
        Err(EngineError::UnknownOrClosedMatch)
    ));
    assert!(matches!(
        bob.resign().await,
        Err(EngineError::UnknownOrClosedMatch)
    ));

    // Still exactly one outcome.
    engine.sink.wait_for(1).await;
    assert_eq!(engine.sink.len(), 1);
}

#[tokio::test]
async fn test_resignation_awards_opponent() {
    let engine = TestEngine::start();
    let (mut alice, bob) = engine.paired_clients("alice", "bob").await;
    alice.play(4).await.unwrap();

    assert_eq!(alice.resign().await.unwrap(), ActionOutcome::Resigned);

    let events = engine.sink.wait_for(1).await;
    assert_eq!(events[0].winner_id.as_ref(), Some(&bob.player_id));
    assert_eq!(events[0].winner_mark, Some(Mark::O));
    assert_eq!(events[0].reason, EndReason::Resignation);

    let OutboundEvent::MatchEnded { result, .. } = alice.expect_match_ended().await else {
        unreachable!();
    };
    assert_eq!(result.reason, EndReason::Resignation);
}

#[tokio::test]
async fn test_players_can_queue_again_after_finish() {
    let engine = TestEngine::start();
    let (alice, bob) = engine.paired_clients("alice", "bob").await;

    assert!(matches!(
        alice.join().await,
        Err(EngineError::AlreadyQueuedOrPlaying)
    ));

    bob.resign().await.unwrap();

    // The match reports `MatchFinished` before it answers the resignation,
    // so the coordinator has freed both players by the time this join lands.
    assert_eq!(alice.join().await.unwrap(), ActionOutcome::Waiting);
    assert!(matches!(
        bob.join().await.unwrap(),
        ActionOutcome::Paired { .. }
    ));
}

#[tokio::test]
async fn test_match_state_query() {
    let engine = TestEngine::start();
    let alice = engine.client("alice").await;
    let bob = engine.client("bob").await;
    alice.join().await.unwrap();
    let ActionOutcome::Paired { match_id } = bob.join().await.unwrap() else {
        unreachable!();
    };

    let state = engine.coordinator.get_match_state(match_id).await.unwrap();
    assert_eq!(state.snapshot.match_id, match_id);
    assert_eq!(state.seats.len(), 2);
    assert_eq!(state.seats[0].player_id, alice.player_id);
    assert_eq!(state.seats[0].mark, Mark::X);
    assert!(state.result.is_none());
}
