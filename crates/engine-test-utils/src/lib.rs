//! # Engine Test Utilities
//!
//! Shared test utilities for the match engine.
//!
//! ## Modules
//!
//! - `recording_sink` - `OutcomeSink` that keeps every event for assertions
//! - `test_client` - A player driving the coordinator through its own
//!   outbound channel
//! - `fixtures` - Engine setup with short timers and player ids
//!
//! ## Usage
//!
//! ```rust,ignore
//! use engine_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let engine = TestEngine::start();
//!     let (mut alice, mut bob) = engine.paired_clients("alice", "bob").await;
//!
//!     alice.play(4).await.unwrap();
//!     assert!(bob.next_state().await.is_some());
//! }
//! ```

pub mod fixtures;
pub mod recording_sink;
pub mod test_client;

// Re-export commonly used items
pub use fixtures::*;
pub use recording_sink::RecordingSink;
pub use test_client::TestClient;
