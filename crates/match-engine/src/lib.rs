//! Noughts Arena Match Engine Library
//!
//! Authoritative engine for two-player tic-tac-toe over persistent
//! connections:
//!
//! - Matchmaking: FIFO pairing of waiting players
//! - Per-match state machine with strict turn order and win/draw detection
//! - Fan-out of authoritative state to both players
//! - Disconnect grace window with forfeit on expiry
//! - Exactly one outcome event per finished match
//!
//! # Architecture
//!
//! ```text
//! transport ──InboundAction──> MatchCoordinatorHandle
//!                                  │
//!                     MatchCoordinatorActor (routing, matchmaking)
//!                                  │ forwards, never waits
//!                           MatchActor per match (single writer)
//!                              │                 │
//!                  ConnectionRegistry       OutcomeSink
//!                  (OutboundEvent per player)  (MatchOutcomeRecorded)
//! ```
//!
//! Transports (WebSocket or otherwise) live outside this crate. They
//! authenticate the player, register an outbound channel through
//! `InboundAction::Connect`, and relay the player's actions.
//!
//! # Modules
//!
//! - [`actors`] - Coordinator and match actors
//! - [`game`] - Board and match state machine (no I/O)
//! - [`matchmaker`] - Waiting queue and pairing
//! - [`registry`] - Player to outbound channel map
//! - [`outcome`] - Outcome events and the sink seam
//! - [`config`] - Configuration from environment
//! - [`errors`] - Error types with stable client codes
//! - [`observability`] - Metrics and health endpoints

pub mod actors;
pub mod config;
pub mod errors;
pub mod game;
pub mod matchmaker;
pub mod observability;
pub mod outcome;
pub mod registry;
