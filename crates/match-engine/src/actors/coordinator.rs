//! `MatchCoordinatorActor` - singleton supervisor for match actors.
//!
//! The `MatchCoordinatorActor` is the top-level actor of the engine:
//!
//! - Singleton per engine instance
//! - Owns the `Matchmaker`, the live-match table and the player to match
//!   routing index
//! - Spawns one `MatchActor` per pairing and forwards player actions to it
//!   without waiting for the match to process them
//! - Owns the root `CancellationToken` for graceful shutdown
//! - Monitors child actor health (panic detection via `JoinHandle`)
//!
//! # Graceful Shutdown
//!
//! On shutdown, the coordinator:
//! 1. Sets `accepting_new = false` (joins fail with `Draining`)
//! 2. Cancels the root `CancellationToken` (propagates to all matches)
//! 3. Waits, bounded by the shutdown timeout, for match actors to exit

use crate::config::EngineSettings;
use crate::errors::EngineError;
use crate::matchmaker::{Matchmaker, Pairing};
use crate::observability::metrics;
use crate::outcome::OutcomeSink;
use crate::registry::ConnectionRegistry;

use super::match_actor::{MatchActor, MatchActorContext, MatchActorHandle};
use super::messages::{
    ActionOutcome, ActionReply, CoordinatorMessage, CoordinatorStatus, InboundAction,
    MatchMessage, MatchState,
};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};

use common::types::{MatchId, PlayerId, PlayerIdentity};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Default channel buffer size for the coordinator mailbox.
const COORDINATOR_CHANNEL_BUFFER: usize = 1000;

/// Handle to the `MatchCoordinatorActor`.
///
/// This is the public interface transports drive. All methods are async and
/// return results via oneshot channels.
#[derive(Clone)]
pub struct MatchCoordinatorHandle {
    sender: mpsc::Sender<CoordinatorMessage>,
    cancel_token: CancellationToken,
}

impl MatchCoordinatorHandle {
    /// Create a new `MatchCoordinatorActor` and return a handle to it.
    ///
    /// This spawns the actor task and returns immediately.
    #[must_use]
    pub fn new(
        settings: EngineSettings,
        registry: Arc<ConnectionRegistry>,
        sink: Arc<dyn OutcomeSink>,
        metrics: Arc<ActorMetrics>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(COORDINATOR_CHANNEL_BUFFER);
        let cancel_token = CancellationToken::new();

        let ctx = MatchActorContext {
            registry,
            sink,
            coordinator: sender.downgrade(),
            metrics,
            settings,
        };
        let actor = MatchCoordinatorActor::new(receiver, cancel_token.clone(), ctx);

        tokio::spawn(actor.run());

        Self {
            sender,
            cancel_token,
        }
    }

    /// Submit a player action and wait for its outcome.
    ///
    /// # Errors
    ///
    /// Returns the player-facing `EngineError` for a refused action, or
    /// `EngineError::Internal` if the coordinator is gone.
    pub async fn submit(
        &self,
        player_id: PlayerId,
        action: InboundAction,
    ) -> Result<ActionOutcome, EngineError> {
        let label = action.label();
        let started = Instant::now();

        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(CoordinatorMessage::Submit {
                player_id,
                action,
                respond_to: tx,
            })
            .await
            .map_err(|e| EngineError::Internal(format!("channel send failed: {e}")))?;

        let result = rx
            .await
            .map_err(|e| EngineError::Internal(format!("response receive failed: {e}")))?;

        metrics::record_action_latency(label, started.elapsed());
        result
    }

    /// Get the state of a live or lingering match.
    pub async fn get_match_state(&self, match_id: MatchId) -> Result<MatchState, EngineError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(CoordinatorMessage::GetMatchState {
                match_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| EngineError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| EngineError::Internal(format!("response receive failed: {e}")))?
    }

    /// Get the current coordinator status.
    pub async fn get_status(&self) -> Result<CoordinatorStatus, EngineError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(CoordinatorMessage::GetStatus { respond_to: tx })
            .await
            .map_err(|e| EngineError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| EngineError::Internal(format!("response receive failed: {e}")))
    }

    /// Drain: refuse new joins, stop every match actor and wait for them.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(CoordinatorMessage::Shutdown { respond_to: tx })
            .await
            .map_err(|e| EngineError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| EngineError::Internal(format!("response receive failed: {e}")))?
    }

    /// Cancel the actor (for immediate shutdown).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// Internal state for a managed match.
struct ManagedMatch {
    /// Handle to the match actor.
    handle: MatchActorHandle,
    /// Join handle for monitoring the actor task.
    task_handle: JoinHandle<()>,
    /// X then O.
    players: [PlayerId; 2],
}

/// The `MatchCoordinatorActor` implementation.
pub struct MatchCoordinatorActor {
    /// Engine instance ID.
    engine_id: String,
    receiver: mpsc::Receiver<CoordinatorMessage>,
    /// Cancellation token (root).
    cancel_token: CancellationToken,
    matchmaker: Matchmaker,
    /// Match actors by ID, live or lingering.
    matches: HashMap<MatchId, ManagedMatch>,
    /// Each player's most recent match, while its actor runs.
    routes: HashMap<PlayerId, MatchId>,
    display_names: HashMap<PlayerId, String>,
    /// Whether the coordinator is accepting new joins.
    accepting_new: bool,
    /// Set once a `Shutdown` request has been served.
    stopped: bool,
    /// Shared with every match actor spawned.
    ctx: MatchActorContext,
    mailbox: MailboxMonitor,
}

impl MatchCoordinatorActor {
    fn new(
        receiver: mpsc::Receiver<CoordinatorMessage>,
        cancel_token: CancellationToken,
        ctx: MatchActorContext,
    ) -> Self {
        let engine_id = ctx.settings.engine_id.clone();
        let mailbox = MailboxMonitor::new(ActorType::Coordinator, &engine_id);

        Self {
            engine_id,
            receiver,
            cancel_token,
            matchmaker: Matchmaker::new(),
            matches: HashMap::new(),
            routes: HashMap::new(),
            display_names: HashMap::new(),
            accepting_new: true,
            stopped: false,
            ctx,
            mailbox,
        }
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "engine.actor.coordinator", fields(engine_id = %self.engine_id))]
    async fn run(mut self) {
        info!(
            target: "engine.actor.coordinator",
            engine_id = %self.engine_id,
            "MatchCoordinatorActor started"
        );

        loop {
            // Check for terminated match actors
            self.check_match_health().await;

            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "engine.actor.coordinator",
                        engine_id = %self.engine_id,
                        "MatchCoordinatorActor received cancellation signal"
                    );
                    self.graceful_shutdown().await;
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.observe_depth(self.receiver.len() + 1);
                            self.handle_message(message).await;
                            self.mailbox.record_processed();
                            self.ctx.metrics.record_message_processed();
                            if self.stopped {
                                break;
                            }
                        }
                        None => {
                            info!(
                                target: "engine.actor.coordinator",
                                engine_id = %self.engine_id,
                                "MatchCoordinatorActor channel closed, exiting"
                            );
                            self.graceful_shutdown().await;
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "engine.actor.coordinator",
            engine_id = %self.engine_id,
            matches_remaining = self.matches.len(),
            messages_processed = self.mailbox.messages_processed(),
            "MatchCoordinatorActor stopped"
        );
    }

    /// Handle a single message.
    async fn handle_message(&mut self, message: CoordinatorMessage) {
        match message {
            CoordinatorMessage::Submit {
                player_id,
                action,
                respond_to,
            } => {
                self.handle_action(player_id, action, respond_to).await;
            }

            CoordinatorMessage::MatchFinished { match_id } => {
                if let Some(managed) = self.matches.get(&match_id) {
                    for player_id in &managed.players {
                        self.matchmaker.release(player_id);
                    }
                    debug!(
                        target: "engine.actor.coordinator",
                        match_id = %match_id,
                        "Match finished, players may queue again"
                    );
                }
            }

            CoordinatorMessage::MatchEvicted { match_id } => {
                if let Some(managed) = self.remove_match(match_id).await {
                    // The actor exits right after reporting; reap it off the loop.
                    tokio::spawn(reap(match_id, managed.task_handle));
                }
            }

            CoordinatorMessage::GetMatchState {
                match_id,
                respond_to,
            } => match self.matches.get(&match_id) {
                Some(managed) => {
                    // Asked off the loop so a busy match never stalls routing.
                    let handle = managed.handle.clone();
                    tokio::spawn(async move {
                        let _ = respond_to.send(handle.get_state().await);
                    });
                }
                None => {
                    let _ = respond_to.send(Err(EngineError::UnknownOrClosedMatch));
                }
            },

            CoordinatorMessage::GetStatus { respond_to } => {
                let status = self.get_status().await;
                let _ = respond_to.send(status);
            }

            CoordinatorMessage::Shutdown { respond_to } => {
                self.cancel_token.cancel();
                self.graceful_shutdown().await;
                self.stopped = true;
                let _ = respond_to.send(Ok(()));
            }
        }
    }

    /// Route one player action.
    async fn handle_action(
        &mut self,
        player_id: PlayerId,
        action: InboundAction,
        respond_to: ActionReply,
    ) {
        let changes_liveness = matches!(
            action,
            InboundAction::Connect { .. } | InboundAction::Reconnect { .. } | InboundAction::Disconnect
        );

        match action {
            InboundAction::Connect {
                display_name,
                channel,
            } => {
                self.display_names.insert(player_id.clone(), display_name);
                self.ctx.registry.register(&player_id, channel).await;
                self.route_reconnect(player_id, respond_to);
            }

            InboundAction::Reconnect { channel } => {
                self.ctx.registry.register(&player_id, channel).await;
                self.route_reconnect(player_id, respond_to);
            }

            InboundAction::Join => {
                let result = self.handle_join(&player_id).await;
                let _ = respond_to.send(result);
            }

            InboundAction::Move { cell_index } => {
                self.forward(
                    &player_id,
                    MatchMessage::Move {
                        player_id: player_id.clone(),
                        cell_index,
                        respond_to,
                    },
                );
            }

            InboundAction::Resign => {
                self.forward(
                    &player_id,
                    MatchMessage::Resign {
                        player_id: player_id.clone(),
                        respond_to,
                    },
                );
            }

            InboundAction::Disconnect => {
                self.handle_disconnect(player_id, respond_to).await;
            }
        }

        if changes_liveness {
            self.refresh_connected_players().await;
        }
    }

    async fn refresh_connected_players(&self) {
        let live = self.ctx.registry.live_count().await;
        self.ctx.metrics.set_connected_players(live);
    }

    /// Hand a (re)connected player to their match, if they still have one.
    fn route_reconnect(&self, player_id: PlayerId, respond_to: ActionReply) {
        if self.routes.contains_key(&player_id) {
            self.forward_control(
                &player_id.clone(),
                MatchMessage::Reconnect {
                    player_id,
                    respond_to,
                },
            );
        } else {
            let _ = respond_to.send(Ok(ActionOutcome::Connected));
        }
    }

    async fn handle_join(&mut self, player_id: &PlayerId) -> Result<ActionOutcome, EngineError> {
        if !self.accepting_new {
            return Err(EngineError::Draining);
        }

        let display_name = self
            .display_names
            .get(player_id)
            .cloned()
            .unwrap_or_else(|| player_id.to_string());
        let identity = PlayerIdentity {
            id: player_id.clone(),
            display_name,
        };

        match self.matchmaker.request_match(identity)? {
            Pairing::Waiting => {
                debug!(
                    target: "engine.actor.coordinator",
                    player_id = %player_id,
                    queued = self.matchmaker.queued(),
                    "Player waiting for an opponent"
                );
                Ok(ActionOutcome::Waiting)
            }
            Pairing::Paired(new_match) => {
                let match_id = new_match.id();
                let [x, o] = new_match.participants();
                let players = [x.clone(), o.clone()];

                // Seats in older lingering matches no longer hold them open.
                for player in &players {
                    if let Some(previous) = self.routes.get(player) {
                        if let Some(managed) = self.matches.get(previous) {
                            managed.handle.release(player.clone());
                        }
                    }
                }

                let (handle, task_handle) = MatchActor::spawn(
                    *new_match,
                    self.cancel_token.child_token(),
                    self.ctx.clone(),
                );
                for player in &players {
                    self.routes.insert(player.clone(), match_id);
                }
                self.matches.insert(
                    match_id,
                    ManagedMatch {
                        handle,
                        task_handle,
                        players,
                    },
                );
                self.ctx.metrics.match_created();

                info!(
                    target: "engine.actor.coordinator",
                    engine_id = %self.engine_id,
                    match_id = %match_id,
                    total_matches = self.matches.len(),
                    "Match actor created"
                );

                Ok(ActionOutcome::Paired { match_id })
            }
        }
    }

    async fn handle_disconnect(&mut self, player_id: PlayerId, respond_to: ActionReply) {
        if self.matchmaker.cancel(&player_id) {
            debug!(
                target: "engine.actor.coordinator",
                player_id = %player_id,
                "Queued player disconnected, request cancelled"
            );
        }

        if self.routes.contains_key(&player_id) {
            self.ctx.registry.deregister(&player_id).await;
            self.forward_control(
                &player_id.clone(),
                MatchMessage::Disconnect {
                    player_id,
                    respond_to,
                },
            );
        } else {
            self.ctx.registry.remove(&player_id).await;
            self.display_names.remove(&player_id);
            let _ = respond_to.send(Ok(ActionOutcome::Disconnected));
        }
    }

    /// Queue `message` on the match routed for `player_id`.
    ///
    /// Never waits on the match mailbox; the match actor answers the reply
    /// channel carried inside `message`.
    fn forward(&self, player_id: &PlayerId, message: MatchMessage) {
        let Some(managed) = self
            .routes
            .get(player_id)
            .and_then(|match_id| self.matches.get(match_id))
        else {
            message.fail(EngineError::UnknownOrClosedMatch);
            return;
        };

        match managed.handle.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(message)) => {
                message.fail(EngineError::Internal("match mailbox busy".to_string()));
            }
            Err(TrySendError::Closed(message)) => {
                message.fail(EngineError::UnknownOrClosedMatch);
            }
        }
    }

    /// Queue a seat lifecycle message on the match routed for `player_id`.
    ///
    /// Unlike `forward`, a busy match never refuses it; only a match that
    /// has already exited does.
    fn forward_control(&self, player_id: &PlayerId, message: MatchMessage) {
        let Some(managed) = self
            .routes
            .get(player_id)
            .and_then(|match_id| self.matches.get(match_id))
        else {
            message.fail(EngineError::UnknownOrClosedMatch);
            return;
        };

        if let Err(message) = managed.handle.send_control(message) {
            message.fail(EngineError::UnknownOrClosedMatch);
        }
    }

    /// Drop a match from the table and the routing index.
    ///
    /// Players still routed to it are freed for matchmaking; the ones without
    /// a live connection are forgotten entirely.
    async fn remove_match(&mut self, match_id: MatchId) -> Option<ManagedMatch> {
        let managed = self.matches.remove(&match_id)?;

        for player_id in &managed.players {
            if self.routes.get(player_id) != Some(&match_id) {
                continue;
            }
            self.routes.remove(player_id);
            self.matchmaker.release(player_id);
            if !self.ctx.registry.is_live(player_id).await {
                self.ctx.registry.remove(player_id).await;
                self.display_names.remove(player_id);
            }
        }

        self.ctx.metrics.match_removed();
        self.refresh_connected_players().await;
        info!(
            target: "engine.actor.coordinator",
            engine_id = %self.engine_id,
            match_id = %match_id,
            total_matches = self.matches.len(),
            "Match actor removed"
        );

        Some(managed)
    }

    async fn get_status(&self) -> CoordinatorStatus {
        CoordinatorStatus {
            match_count: self.matches.len(),
            queued_players: self.matchmaker.queued(),
            connected_players: self.ctx.registry.live_count().await,
            is_draining: !self.accepting_new,
            mailbox_depth: self.mailbox.current_depth(),
        }
    }

    /// Perform graceful shutdown.
    async fn graceful_shutdown(&mut self) {
        info!(
            target: "engine.actor.coordinator",
            engine_id = %self.engine_id,
            match_count = self.matches.len(),
            "Performing graceful shutdown"
        );

        self.accepting_new = false;

        // Already done via the parent token, but be explicit.
        for managed in self.matches.values() {
            managed.handle.cancel();
        }

        let deadline = tokio::time::Instant::now() + self.ctx.settings.shutdown_timeout;
        let matches: Vec<_> = self.matches.drain().collect();
        for (match_id, managed) in matches {
            match tokio::time::timeout_at(deadline, managed.task_handle).await {
                Ok(Ok(())) => {
                    debug!(
                        target: "engine.actor.coordinator",
                        match_id = %match_id,
                        "Match actor completed cleanly"
                    );
                }
                Ok(Err(e)) => {
                    warn!(
                        target: "engine.actor.coordinator",
                        match_id = %match_id,
                        error = ?e,
                        "Match actor task panicked during shutdown"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "engine.actor.coordinator",
                        match_id = %match_id,
                        "Match actor shutdown timed out"
                    );
                }
            }
            self.ctx.metrics.match_removed();
        }
        self.routes.clear();

        info!(
            target: "engine.actor.coordinator",
            engine_id = %self.engine_id,
            "Graceful shutdown complete"
        );
    }

    /// Check health of managed match actors.
    async fn check_match_health(&mut self) {
        let finished: Vec<MatchId> = self
            .matches
            .iter()
            .filter(|(_, managed)| managed.task_handle.is_finished())
            .map(|(match_id, _)| *match_id)
            .collect();

        for match_id in finished {
            let Some(managed) = self.remove_match(match_id).await else {
                continue;
            };
            match managed.task_handle.await {
                Ok(()) => {
                    info!(
                        target: "engine.actor.coordinator",
                        match_id = %match_id,
                        "Match actor exited"
                    );
                }
                Err(join_error) => {
                    if join_error.is_panic() {
                        error!(
                            target: "engine.actor.coordinator",
                            match_id = %match_id,
                            error = ?join_error,
                            "Match actor panicked - match state lost"
                        );
                        self.ctx.metrics.record_panic(ActorType::Match);
                    }
                }
            }
        }
    }
}

/// Wait for an evicted match actor to finish, logging anything unusual.
async fn reap(match_id: MatchId, task_handle: JoinHandle<()>) {
    match tokio::time::timeout(Duration::from_secs(5), task_handle).await {
        Ok(Ok(())) => {
            debug!(
                target: "engine.actor.coordinator",
                match_id = %match_id,
                "Match actor task completed cleanly"
            );
        }
        Ok(Err(e)) => {
            warn!(
                target: "engine.actor.coordinator",
                match_id = %match_id,
                error = ?e,
                "Match actor task panicked during eviction"
            );
        }
        Err(_) => {
            warn!(
                target: "engine.actor.coordinator",
                match_id = %match_id,
                "Match actor task cleanup timed out"
            );
        }
    }
}
