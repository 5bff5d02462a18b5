//! Actor hierarchy.
//!
//! ```text
//! MatchCoordinatorActor (singleton per engine instance)
//! ├── owns Matchmaker + player -> match routing
//! └── supervises N MatchActors
//!     └── MatchActor (one per live or lingering match)
//!         ├── owns the Match state machine
//!         └── grace / eviction timers (child tokens, weak mailbox senders)
//! ```

pub mod coordinator;
pub mod match_actor;
pub mod messages;
pub mod metrics;

pub use coordinator::MatchCoordinatorHandle;
pub use match_actor::{MatchActor, MatchActorContext, MatchActorHandle};
pub use messages::{
    ActionOutcome, CoordinatorStatus, InboundAction, MatchState, OutboundEvent, OutboundSender,
    SeatInfo,
};
pub use metrics::{ActorMetrics, ActorType, MailboxLevel, MailboxMonitor};
