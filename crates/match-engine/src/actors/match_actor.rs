//! `MatchActor` - per-match actor that owns one [`Match`].
//!
//! Each `MatchActor`:
//! - Is the single writer for its match; moves, resignations, disconnects,
//!   reconnects and timer expiries are all consumed one at a time from the
//!   same mailbox
//! - Fans state out to both players through the shared `ConnectionRegistry`
//! - Reports the outcome to the `OutcomeSink` exactly once
//!
//! # Disconnect Handling
//!
//! When a player drops during play:
//! 1. The seat is marked disconnected (the opponent is not told)
//! 2. A grace timer starts; it injects `GraceExpired` into this mailbox
//! 3. A reconnect cancels the timer and bumps the seat epoch, so an expiry
//!    already in flight is ignored
//! 4. If the timer wins, the absent player forfeits
//!
//! # Eviction
//!
//! A terminal match lingers so a returning player can still see the final
//! board. Once both seats are released the eviction timer runs; when it
//! fires the actor reports `MatchEvicted` to the coordinator and exits.
//! Anything still queued at that point is answered with
//! `UnknownOrClosedMatch`.
//!
//! # Mailboxes
//!
//! Player actions arrive on a bounded mailbox and are refused when it is
//! full. Seat lifecycle messages (`Disconnect`, `Reconnect`, `Release`) use a
//! separate unbounded control channel, drained first and never refused
//! while the actor runs.

use crate::config::EngineSettings;
use crate::errors::EngineError;
use crate::game::{Mark, Match, MatchStatus};
use crate::observability::metrics;
use crate::outcome::OutcomeSink;
use crate::registry::ConnectionRegistry;

use super::messages::{
    ActionOutcome, ActionReply, CoordinatorMessage, MatchMessage, MatchState, OutboundEvent,
    SeatInfo,
};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};

use common::types::{MatchId, PlayerId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Channel buffer size for a match mailbox.
const MATCH_CHANNEL_BUFFER: usize = 64;

/// Collaborators every match actor needs.
#[derive(Clone)]
pub struct MatchActorContext {
    pub registry: Arc<ConnectionRegistry>,
    pub sink: Arc<dyn OutcomeSink>,
    /// Weak so that match actors never keep the coordinator alive.
    pub coordinator: mpsc::WeakSender<CoordinatorMessage>,
    pub metrics: Arc<ActorMetrics>,
    pub settings: EngineSettings,
}

/// Handle to a `MatchActor`.
#[derive(Clone)]
pub struct MatchActorHandle {
    sender: mpsc::Sender<MatchMessage>,
    control: mpsc::UnboundedSender<MatchMessage>,
    cancel_token: CancellationToken,
    match_id: MatchId,
    mailbox: Arc<MailboxMonitor>,
}

impl MatchActorHandle {
    #[must_use]
    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    /// Queue `message` without waiting for mailbox capacity.
    ///
    /// A full mailbox is counted as a drop. The message is handed back in the
    /// error so the caller can answer its reply channel.
    ///
    /// # Errors
    ///
    /// Returns the `TrySendError` when the mailbox is full or closed.
    pub fn try_send(&self, message: MatchMessage) -> Result<(), TrySendError<MatchMessage>> {
        self.sender.try_send(message).inspect_err(|e| {
            if matches!(e, TrySendError::Full(_)) {
                self.mailbox.record_drop();
            }
        })
    }

    /// Queue a seat lifecycle message on the control channel.
    ///
    /// Never refused for backpressure; a closed match hands the message back
    /// so the caller can answer its reply channel.
    ///
    /// # Errors
    ///
    /// Returns the message if the actor has exited.
    pub fn send_control(&self, message: MatchMessage) -> Result<(), MatchMessage> {
        self.control.send(message).map_err(|e| e.0)
    }

    /// Tell the match that `player_id` has moved on to a new match.
    pub fn release(&self, player_id: PlayerId) {
        if self
            .send_control(MatchMessage::Release {
                player_id: player_id.clone(),
            })
            .is_err()
        {
            debug!(
                target: "engine.actor.match",
                match_id = %self.match_id,
                player_id = %player_id,
                "Release for a match that already exited"
            );
        }
    }

    /// Get current match state.
    pub async fn get_state(&self) -> Result<MatchState, EngineError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(MatchMessage::GetState { respond_to: tx })
            .await
            .map_err(|e| EngineError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| EngineError::Internal(format!("response receive failed: {e}")))
    }

    /// Cancel the actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// One player's seat.
#[derive(Debug)]
struct Seat {
    player_id: PlayerId,
    mark: Mark,
    connected: bool,
    /// The player no longer holds the match open (disconnected after the
    /// end, or seated in a newer match).
    released: bool,
    /// Running grace timer, if any.
    grace: Option<CancellationToken>,
    /// Bumped whenever a grace timer is started or invalidated.
    epoch: u64,
}

impl Seat {
    fn new(player_id: PlayerId, mark: Mark) -> Self {
        Self {
            player_id,
            mark,
            connected: true,
            released: false,
            grace: None,
            epoch: 0,
        }
    }

    fn invalidate_grace(&mut self) {
        if let Some(token) = self.grace.take() {
            token.cancel();
        }
        self.epoch += 1;
    }
}

/// The `MatchActor` implementation.
pub struct MatchActor {
    match_id: MatchId,
    state: Match,
    seats: [Seat; 2],
    receiver: mpsc::Receiver<MatchMessage>,
    control: mpsc::UnboundedReceiver<MatchMessage>,
    /// Used by timer tasks to feed expiries back into this mailbox.
    self_sender: mpsc::WeakSender<MatchMessage>,
    /// Cancellation token (child of the coordinator's token).
    cancel_token: CancellationToken,
    eviction: Option<CancellationToken>,
    eviction_epoch: u64,
    evicted: bool,
    ctx: MatchActorContext,
    mailbox: Arc<MailboxMonitor>,
}

impl MatchActor {
    /// Spawn a new match actor for a freshly paired match.
    ///
    /// The actor starts the match and notifies both players before handling
    /// its first message.
    pub fn spawn(
        state: Match,
        cancel_token: CancellationToken,
        ctx: MatchActorContext,
    ) -> (MatchActorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(MATCH_CHANNEL_BUFFER);
        let (control_sender, control) = mpsc::unbounded_channel();
        let match_id = state.id();
        let mailbox = Arc::new(MailboxMonitor::new(ActorType::Match, match_id.to_string()));

        let seats = [
            Seat::new(state.player(Mark::X).id.clone(), Mark::X),
            Seat::new(state.player(Mark::O).id.clone(), Mark::O),
        ];

        let actor = Self {
            match_id,
            state,
            seats,
            receiver,
            control,
            self_sender: sender.downgrade(),
            cancel_token: cancel_token.clone(),
            eviction: None,
            eviction_epoch: 0,
            evicted: false,
            ctx,
            mailbox: Arc::clone(&mailbox),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = MatchActorHandle {
            sender,
            control: control_sender,
            cancel_token,
            match_id,
            mailbox,
        };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "engine.actor.match", fields(match_id = %self.match_id))]
    async fn run(mut self) {
        info!(
            target: "engine.actor.match",
            match_id = %self.match_id,
            "MatchActor started"
        );

        self.begin().await;

        loop {
            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "engine.actor.match",
                        match_id = %self.match_id,
                        "MatchActor received cancellation signal"
                    );
                    self.shutdown_timers();
                    self.close_mailboxes(&EngineError::Draining);
                    break;
                }

                Some(message) = self.control.recv() => {
                    self.process(message).await;
                    if self.evicted {
                        self.close_mailboxes(&EngineError::UnknownOrClosedMatch);
                        break;
                    }
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.process(message).await;
                            if self.evicted {
                                self.close_mailboxes(&EngineError::UnknownOrClosedMatch);
                                break;
                            }
                        }
                        None => {
                            info!(
                                target: "engine.actor.match",
                                match_id = %self.match_id,
                                "MatchActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "engine.actor.match",
            match_id = %self.match_id,
            status = ?self.state.status(),
            moves = self.state.move_count(),
            messages_processed = self.mailbox.messages_processed(),
            "MatchActor stopped"
        );
    }

    async fn process(&mut self, message: MatchMessage) {
        self.mailbox
            .observe_depth(self.receiver.len() + self.control.len() + 1);
        self.handle_message(message).await;
        self.mailbox.record_processed();
        self.ctx.metrics.record_message_processed();
    }

    /// Refuse further messages and answer everything still queued.
    fn close_mailboxes(&mut self, error: &EngineError) {
        self.control.close();
        self.receiver.close();

        let mut refused = 0usize;
        while let Ok(message) = self.control.try_recv() {
            message.fail(error.clone());
            refused += 1;
        }
        while let Ok(message) = self.receiver.try_recv() {
            message.fail(error.clone());
            refused += 1;
        }

        if refused > 0 {
            debug!(
                target: "engine.actor.match",
                match_id = %self.match_id,
                refused = refused,
                "Answered messages queued behind shutdown"
            );
        }
    }

    /// Start play and tell both players who they face.
    async fn begin(&mut self) {
        if let Err(e) = self.state.start() {
            error!(
                target: "engine.actor.match",
                match_id = %self.match_id,
                error = %e,
                "Match could not be started"
            );
            return;
        }

        for mark in [Mark::X, Mark::O] {
            let me = self.state.player(mark).id.clone();
            let opponent = self.state.player(mark.opponent());
            let event = OutboundEvent::Paired {
                match_id: self.match_id,
                opponent_id: opponent.id.clone(),
                opponent_name: opponent.display_name.clone(),
                assigned_mark: mark,
            };
            self.deliver(&me, event).await;
        }
        self.broadcast(OutboundEvent::from(self.state.snapshot()))
            .await;

        // A player whose connection vanished between pairing and now starts
        // out on the grace clock.
        for mark in [Mark::X, Mark::O] {
            let player_id = self.state.player(mark).id.clone();
            if !self.ctx.registry.is_live(&player_id).await {
                self.mark_disconnected(&player_id);
            }
        }
    }

    /// Handle a single message.
    async fn handle_message(&mut self, message: MatchMessage) {
        match message {
            MatchMessage::Move {
                player_id,
                cell_index,
                respond_to,
            } => {
                let result = self.handle_move(&player_id, cell_index).await;
                reply(respond_to, result);
            }

            MatchMessage::Resign {
                player_id,
                respond_to,
            } => {
                let result = self.handle_resign(&player_id).await;
                reply(respond_to, result);
            }

            MatchMessage::Disconnect {
                player_id,
                respond_to,
            } => {
                let result = self.handle_disconnect(&player_id);
                reply(respond_to, result);
            }

            MatchMessage::Reconnect {
                player_id,
                respond_to,
            } => {
                let result = self.handle_reconnect(&player_id).await;
                reply(respond_to, result);
            }

            MatchMessage::Release { player_id } => {
                if let Some(seat) = self.seat_mut(&player_id) {
                    seat.released = true;
                }
                self.maybe_schedule_eviction();
            }

            MatchMessage::GraceExpired { player_id, epoch } => {
                self.handle_grace_expired(&player_id, epoch).await;
            }

            MatchMessage::EvictionDue { epoch } => {
                self.handle_eviction_due(epoch).await;
            }

            MatchMessage::GetState { respond_to } => {
                let _ = respond_to.send(self.get_state());
            }
        }
    }

    async fn handle_move(
        &mut self,
        player_id: &PlayerId,
        cell_index: usize,
    ) -> Result<ActionOutcome, EngineError> {
        match self.state.submit_move(player_id, cell_index) {
            Ok(outcome) => {
                metrics::record_move("accepted");
                debug!(
                    target: "engine.actor.match",
                    match_id = %self.match_id,
                    player_id = %player_id,
                    cell_index = cell_index,
                    board = %self.state.board(),
                    "Move applied"
                );
                self.broadcast(OutboundEvent::from(self.state.snapshot()))
                    .await;
                if outcome.is_some() {
                    self.finish().await;
                }
                Ok(ActionOutcome::MoveAccepted { outcome })
            }
            Err(EngineError::BoardCorrupted(detail)) => {
                metrics::record_move("corrupted");
                error!(
                    target: "engine.actor.match",
                    match_id = %self.match_id,
                    player_id = %player_id,
                    cell_index = cell_index,
                    detail = %detail,
                    "Board invariant violated, abandoning match"
                );
                if self.state.abandon_fault().is_some() {
                    self.broadcast(OutboundEvent::from(self.state.snapshot()))
                        .await;
                    self.finish().await;
                }
                Err(EngineError::BoardCorrupted(detail))
            }
            Err(err) => {
                let label = match &err {
                    EngineError::InvalidMove(_) => "invalid",
                    EngineError::RejectedMove(_) => "rejected",
                    _ => "closed",
                };
                metrics::record_move(label);
                debug!(
                    target: "engine.actor.match",
                    match_id = %self.match_id,
                    player_id = %player_id,
                    cell_index = cell_index,
                    error = %err,
                    "Move refused"
                );
                if matches!(
                    err,
                    EngineError::InvalidMove(_) | EngineError::RejectedMove(_)
                ) {
                    let event = OutboundEvent::Rejected {
                        match_id: self.match_id,
                        code: err.error_code(),
                        reason: err.client_message(),
                    };
                    self.deliver(player_id, event).await;
                }
                Err(err)
            }
        }
    }

    async fn handle_resign(&mut self, player_id: &PlayerId) -> Result<ActionOutcome, EngineError> {
        self.state.resign(player_id)?;
        info!(
            target: "engine.actor.match",
            match_id = %self.match_id,
            player_id = %player_id,
            "Player resigned"
        );
        self.broadcast(OutboundEvent::from(self.state.snapshot()))
            .await;
        self.finish().await;
        Ok(ActionOutcome::Resigned)
    }

    fn handle_disconnect(&mut self, player_id: &PlayerId) -> Result<ActionOutcome, EngineError> {
        if self.state.mark_of(player_id).is_none() {
            return Err(EngineError::UnknownOrClosedMatch);
        }
        self.mark_disconnected(player_id);
        Ok(ActionOutcome::Disconnected)
    }

    async fn handle_reconnect(
        &mut self,
        player_id: &PlayerId,
    ) -> Result<ActionOutcome, EngineError> {
        let Some(seat) = self.seat_mut(player_id) else {
            return Err(EngineError::UnknownOrClosedMatch);
        };
        let was_connected = seat.connected;
        seat.connected = true;
        seat.released = false;
        seat.invalidate_grace();
        self.cancel_eviction();

        debug!(
            target: "engine.actor.match",
            match_id = %self.match_id,
            player_id = %player_id,
            was_connected = was_connected,
            "Player reconnected"
        );

        self.deliver(player_id, OutboundEvent::from(self.state.snapshot()))
            .await;
        if let Some(result) = self.state.result() {
            let event = OutboundEvent::MatchEnded {
                match_id: self.match_id,
                result,
            };
            self.deliver(player_id, event).await;
        }

        Ok(ActionOutcome::Reconnected {
            match_id: self.match_id,
        })
    }

    async fn handle_grace_expired(&mut self, player_id: &PlayerId, epoch: u64) {
        let terminal = self.state.is_terminal();
        let Some(seat) = self.seat_mut(player_id) else {
            return;
        };
        if seat.epoch != epoch || seat.connected || terminal {
            debug!(
                target: "engine.actor.match",
                player_id = %player_id,
                epoch = epoch,
                "Ignoring stale grace expiry"
            );
            return;
        }
        seat.grace = None;

        match self.state.forfeit(player_id) {
            Ok(_) => {
                info!(
                    target: "engine.actor.match",
                    match_id = %self.match_id,
                    player_id = %player_id,
                    "Disconnect grace period expired, player forfeits"
                );
                self.broadcast(OutboundEvent::from(self.state.snapshot()))
                    .await;
                self.finish().await;
            }
            Err(e) => {
                warn!(
                    target: "engine.actor.match",
                    match_id = %self.match_id,
                    player_id = %player_id,
                    error = %e,
                    "Forfeit refused"
                );
            }
        }
    }

    async fn handle_eviction_due(&mut self, epoch: u64) {
        if epoch != self.eviction_epoch
            || !self.state.is_terminal()
            || !self.seats.iter().all(|seat| seat.released)
        {
            return;
        }

        info!(
            target: "engine.actor.match",
            match_id = %self.match_id,
            "Evicting terminal match"
        );
        self.notify_coordinator(CoordinatorMessage::MatchEvicted {
            match_id: self.match_id,
        })
        .await;
        self.evicted = true;
    }

    /// Terminal bookkeeping: notify players, report the outcome once, free
    /// the players for matchmaking and start lingering.
    async fn finish(&mut self) {
        if let Some(result) = self.state.result() {
            info!(
                target: "engine.actor.match",
                match_id = %self.match_id,
                reason = result.reason.as_str(),
                draw = result.draw,
                winner_mark = ?result.winner_mark,
                moves = self.state.move_count(),
                "Match ended"
            );
            self.broadcast(OutboundEvent::MatchEnded {
                match_id: self.match_id,
                result,
            })
            .await;
        }

        for seat in &mut self.seats {
            if let Some(token) = seat.grace.take() {
                token.cancel();
            }
        }

        if let Some(event) = self.state.take_outcome_report() {
            metrics::record_match_outcome(event.reason.as_str());
            self.ctx.sink.record(event).await;
        }

        self.notify_coordinator(CoordinatorMessage::MatchFinished {
            match_id: self.match_id,
        })
        .await;

        for seat in &mut self.seats {
            if !seat.connected {
                seat.released = true;
            }
        }
        self.maybe_schedule_eviction();
    }

    fn mark_disconnected(&mut self, player_id: &PlayerId) {
        let status = self.state.status();
        let Some(seat) = self.seat_mut(player_id) else {
            return;
        };
        seat.connected = false;

        match status {
            MatchStatus::InProgress => self.start_grace_timer(player_id),
            MatchStatus::Finished(_) | MatchStatus::Abandoned(_) => {
                seat.released = true;
                self.maybe_schedule_eviction();
            }
            MatchStatus::WaitingForSecondPlayer => {}
        }
    }

    fn start_grace_timer(&mut self, player_id: &PlayerId) {
        let token = self.cancel_token.child_token();
        let weak = self.self_sender.clone();
        let grace = self.ctx.settings.disconnect_grace;

        let Some(seat) = self.seat_mut(player_id) else {
            return;
        };
        seat.invalidate_grace();
        seat.grace = Some(token.clone());
        let epoch = seat.epoch;

        debug!(
            target: "engine.actor.match",
            player_id = %player_id,
            epoch = epoch,
            grace_secs = grace.as_secs(),
            "Player disconnected, grace timer started"
        );

        let message = MatchMessage::GraceExpired {
            player_id: player_id.clone(),
            epoch,
        };
        spawn_timer(token, grace, weak, message);
    }

    fn maybe_schedule_eviction(&mut self) {
        if self.eviction.is_some()
            || !self.state.is_terminal()
            || !self.seats.iter().all(|seat| seat.released)
        {
            return;
        }

        self.eviction_epoch += 1;
        let token = self.cancel_token.child_token();
        self.eviction = Some(token.clone());

        debug!(
            target: "engine.actor.match",
            match_id = %self.match_id,
            epoch = self.eviction_epoch,
            "Both seats released, eviction scheduled"
        );

        let message = MatchMessage::EvictionDue {
            epoch: self.eviction_epoch,
        };
        spawn_timer(
            token,
            self.ctx.settings.eviction_grace,
            self.self_sender.clone(),
            message,
        );
    }

    fn cancel_eviction(&mut self) {
        if let Some(token) = self.eviction.take() {
            token.cancel();
            self.eviction_epoch += 1;
        }
    }

    fn shutdown_timers(&mut self) {
        for seat in &mut self.seats {
            seat.invalidate_grace();
        }
        self.cancel_eviction();
    }

    fn get_state(&self) -> MatchState {
        MatchState {
            snapshot: self.state.snapshot(),
            seats: self
                .seats
                .iter()
                .map(|seat| SeatInfo {
                    player_id: seat.player_id.clone(),
                    mark: seat.mark,
                    connected: seat.connected,
                })
                .collect(),
            result: self.state.result(),
            mailbox_depth: self.mailbox.current_depth(),
        }
    }

    fn seat_mut(&mut self, player_id: &PlayerId) -> Option<&mut Seat> {
        self.seats
            .iter_mut()
            .find(|seat| &seat.player_id == player_id)
    }

    async fn broadcast(&self, event: OutboundEvent) {
        for seat in &self.seats {
            self.deliver(&seat.player_id, event.clone()).await;
        }
    }

    async fn deliver(&self, player_id: &PlayerId, event: OutboundEvent) {
        if let Err(e) = self.ctx.registry.send(player_id, event).await {
            debug!(
                target: "engine.actor.match",
                match_id = %self.match_id,
                player_id = %player_id,
                error = %e,
                "Outbound event not delivered"
            );
        }
    }

    async fn notify_coordinator(&self, message: CoordinatorMessage) {
        let Some(coordinator) = self.ctx.coordinator.upgrade() else {
            return;
        };
        if coordinator.send(message).await.is_err() {
            debug!(
                target: "engine.actor.match",
                match_id = %self.match_id,
                "Coordinator gone, notification dropped"
            );
        }
    }
}

fn reply(respond_to: ActionReply, result: Result<ActionOutcome, EngineError>) {
    let _ = respond_to.send(result);
}

/// Sleep for `after`, then feed `message` into the match mailbox unless the
/// token was cancelled first.
fn spawn_timer(
    token: CancellationToken,
    after: Duration,
    mailbox: mpsc::WeakSender<MatchMessage>,
    message: MatchMessage,
) {
    let deadline = tokio::time::Instant::now() + after;
    tokio::spawn(async move {
        tokio::select! {
            () = token.cancelled() => {}
            () = tokio::time::sleep_until(deadline) => {
                if let Some(sender) = mailbox.upgrade() {
                    let _ = sender.send(message).await;
                }
            }
        }
    });
}
