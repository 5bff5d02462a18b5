//! Outcome reporting for the stats/leaderboard sink.
//!
//! The engine emits exactly one [`MatchOutcomeRecorded`] per terminated
//! match. How the sink persists or aggregates it is outside the engine.

use crate::game::{EndReason, Mark, MatchResult};

use chrono::{DateTime, Utc};
use common::types::{MatchId, PlayerId};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Terminal outcome of one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOutcomeRecorded {
    pub match_id: MatchId,
    pub winner_id: Option<PlayerId>,
    pub loser_id: Option<PlayerId>,
    pub winner_mark: Option<Mark>,
    pub draw: bool,
    pub reason: EndReason,
    /// Moves accepted before the match ended.
    pub moves: usize,
    pub finished_at: DateTime<Utc>,
}

impl MatchOutcomeRecorded {
    /// Build the event from a match's terminal result.
    #[must_use]
    pub fn from_result(
        match_id: MatchId,
        result: MatchResult,
        moves: usize,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self {
            match_id,
            winner_id: result.winner_id,
            loser_id: result.loser_id,
            winner_mark: result.winner_mark,
            draw: result.draw,
            reason: result.reason,
            moves,
            finished_at,
        }
    }
}

/// Receiver of match outcomes (enables swapping the stats backend).
#[async_trait::async_trait]
pub trait OutcomeSink: Send + Sync {
    /// Record one finished match.
    async fn record(&self, event: MatchOutcomeRecorded);
}

/// Sink that writes each outcome as a structured log record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingOutcomeSink;

#[async_trait::async_trait]
impl OutcomeSink for TracingOutcomeSink {
    async fn record(&self, event: MatchOutcomeRecorded) {
        info!(
            target: "engine.outcome",
            match_id = %event.match_id,
            winner_id = ?event.winner_id.as_ref().map(PlayerId::as_str),
            loser_id = ?event.loser_id.as_ref().map(PlayerId::as_str),
            winner_mark = ?event.winner_mark,
            draw = event.draw,
            reason = event.reason.as_str(),
            moves = event.moves,
            finished_at = %event.finished_at,
            "Match outcome recorded"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_result_copies_fields() {
        let id = MatchId::new();
        let now = Utc::now();
        let event = MatchOutcomeRecorded::from_result(
            id,
            MatchResult {
                winner_id: Some(PlayerId::new("alice")),
                winner_mark: Some(Mark::X),
                loser_id: Some(PlayerId::new("bob")),
                draw: false,
                reason: EndReason::Resignation,
            },
            3,
            now,
        );

        assert_eq!(event.match_id, id);
        assert_eq!(event.winner_id, Some(PlayerId::new("alice")));
        assert_eq!(event.reason, EndReason::Resignation);
        assert_eq!(event.moves, 3);
        assert_eq!(event.finished_at, now);
    }

    #[test]
    fn test_event_serializes_reason_in_snake_case() {
        let event = MatchOutcomeRecorded::from_result(
            MatchId::new(),
            MatchResult {
                winner_id: None,
                winner_mark: None,
                loser_id: None,
                draw: true,
                reason: EndReason::Board,
            },
            9,
            Utc::now(),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["reason"], "board");
        assert_eq!(json["draw"], true);
        assert!(json["winner_id"].is_null());
    }

    #[tokio::test]
    async fn test_tracing_sink_accepts_events() {
        let sink = TracingOutcomeSink;
        sink.record(MatchOutcomeRecorded::from_result(
            MatchId::new(),
            MatchResult {
                winner_id: None,
                winner_mark: None,
                loser_id: None,
                draw: false,
                reason: EndReason::InternalFault,
            },
            0,
            Utc::now(),
        ))
        .await;
    }
}
