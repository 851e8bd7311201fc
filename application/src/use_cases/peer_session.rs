//! Peer session state machine
//!
//! One [`PeerSession`] exists per active peer. It owns the peer's timeline,
//! its [`Phase`] and the cancellation token of the single outstanding
//! operation.
//!
//! ```text
//! Idle --start---> AwaitingLifecycleAck --ack | error--> Idle
//! Idle --end-----> AwaitingLifecycleAck --ack | error--> Idle
//! Idle --message-> Streaming --completed | cancelled | error--> Idle
//! Streaming --end--> (cancel stream) --> AwaitingLifecycleAck --> Idle
//! AwaitingLifecycleAck --end--> (queued) --ack | error--> AwaitingLifecycleAck
//! ```
//!
//! An end that arrives while a lifecycle call is in flight is queued and runs
//! once that call settles; at most one end waits at a time.
//!
//! Every transition runs inside the session's own lock, so transitions for
//! one peer are atomic with respect to each other and never contend with
//! other peers. Stream updates check under that same lock that their
//! operation is still the current one, which is what guarantees that no
//! fragment lands after a cancellation.

use crate::config::ControllerConfig;
use crate::ports::conversation_logger::{
    ConversationEvent, ConversationLogger, NoConversationLogger,
};
use crate::ports::peer_transport::PeerTransport;
use crate::ports::session_event::SessionEvent;
use crate::use_cases::stream_reducer::{StreamOutcome, StreamReducer};
use chorus_domain::{
    ConversationId, Message, MessageId, PeerId, Phase, SessionMode, Timeline, notice,
};
use serde_json::json;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// State shared by every session of one controller.
#[derive(Clone)]
pub(crate) struct SessionContext {
    pub(crate) config: ControllerConfig,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
    logger: Arc<dyn ConversationLogger>,
}

impl SessionContext {
    pub(crate) fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            events: None,
            logger: Arc::new(NoConversationLogger),
        }
    }

    pub(crate) fn with_events(mut self, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub(crate) fn with_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.events {
            // Observer may have gone away; the controller keeps working
            let _ = tx.send(event);
        }
    }

    pub(crate) fn log(&self, event_type: &'static str, payload: serde_json::Value) {
        self.logger.log(ConversationEvent::new(event_type, payload));
    }
}

/// Point-in-time copy of one peer's state, safe to hold and render.
#[derive(Debug, Clone)]
pub struct PeerView {
    pub peer: PeerId,
    pub phase: Phase,
    pub timeline: Timeline,
}

/// The single outstanding operation of a peer.
#[derive(Debug, Clone)]
pub(crate) struct Operation {
    id: u64,
    token: CancellationToken,
    /// Fired once the operation is no longer the active one.
    done: CancellationToken,
    /// For a queued operation: `done` of the operation it waits behind.
    after: Option<CancellationToken>,
    /// In-progress reply message, for streaming operations.
    reply: Option<MessageId>,
}

impl Operation {
    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

struct PeerState {
    timeline: Timeline,
    phase: Phase,
    active: Option<Operation>,
    /// End command waiting for the active lifecycle call.
    queued: Option<Operation>,
    /// Every fragment received for the active reply, published or not.
    streamed: String,
    next_operation: u64,
}

impl PeerState {
    fn is_current(&self, op: &Operation) -> bool {
        self.active.as_ref().is_some_and(|active| active.id == op.id)
    }
}

/// Conversation state machine of one peer.
pub struct PeerSession {
    peer: PeerId,
    conversation: ConversationId,
    context: Arc<SessionContext>,
    state: Mutex<PeerState>,
}

impl PeerSession {
    /// New idle session seeded with the welcome message.
    pub(crate) fn new(peer: PeerId, context: Arc<SessionContext>) -> Self {
        let conversation = ConversationId::derive(&context.config.session_root, &peer);
        Self {
            peer,
            conversation,
            context,
            state: Mutex::new(PeerState {
                timeline: Timeline::seeded(Message::system(notice::WELCOME)),
                phase: Phase::Idle,
                active: None,
                queued: None,
                streamed: String::new(),
                next_operation: 0,
            }),
        }
    }

    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    pub fn conversation(&self) -> &ConversationId {
        &self.conversation
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    pub fn view(&self) -> PeerView {
        let state = self.lock();
        PeerView {
            peer: self.peer.clone(),
            phase: state.phase,
            timeline: state.timeline.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PeerState> {
        // A panic while holding the lock leaves whole snapshots behind, never
        // a torn message, so the state is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ==================== Transitions (under lock) ====================

    fn set_phase(&self, state: &mut PeerState, phase: Phase) {
        if state.phase != phase {
            debug!(peer = %self.peer, from = %state.phase, to = %phase, "phase change");
            state.phase = phase;
            self.context.emit(SessionEvent::PhaseChanged {
                peer: self.peer.clone(),
                phase,
            });
        }
    }

    fn append(&self, state: &mut PeerState, message: Message) -> Option<MessageId> {
        match state.timeline.push(message) {
            Ok(message) => {
                let id = message.id();
                self.context.emit(SessionEvent::MessageAppended {
                    peer: self.peer.clone(),
                    message,
                });
                Some(id)
            }
            Err(e) => {
                warn!(peer = %self.peer, error = %e, "message rejected by timeline");
                None
            }
        }
    }

    fn operation(
        state: &mut PeerState,
        reply: Option<MessageId>,
        after: Option<CancellationToken>,
    ) -> Operation {
        state.next_operation += 1;
        Operation {
            id: state.next_operation,
            token: CancellationToken::new(),
            done: CancellationToken::new(),
            after,
            reply,
        }
    }

    fn begin(&self, state: &mut PeerState, phase: Phase, reply: Option<MessageId>) -> Operation {
        let op = Self::operation(state, reply, None);
        state.streamed.clear();
        state.active = Some(op.clone());
        self.set_phase(state, phase);
        op
    }

    /// Retire the active operation. A queued end takes over; otherwise the
    /// peer goes idle.
    fn release(&self, state: &mut PeerState) {
        let finished = state.active.take();
        match state.queued.take() {
            Some(next) => {
                debug!(peer = %self.peer, "queued end takes over");
                state.active = Some(next);
            }
            None => self.set_phase(state, Phase::Idle),
        }
        if let Some(op) = finished {
            op.done.cancel();
        }
    }

    fn cancel_locked(&self, state: &mut PeerState) -> bool {
        let Some(op) = state.active.take() else {
            return false;
        };
        op.token.cancel();
        op.done.cancel();
        if let Some(queued) = state.queued.take() {
            debug!(peer = %self.peer, "queued end dropped");
            queued.token.cancel();
            queued.done.cancel();
        }

        if let Some(reply) = op.reply {
            // Fragments not yet published belong to the partial reply too
            match state.timeline.settle(reply, &state.streamed) {
                Ok(message) => {
                    self.context.log(
                        "stream_cancelled",
                        json!({
                            "peer": self.peer.as_str(),
                            "message_id": message.id().value(),
                            "partial_bytes": message.body().len(),
                        }),
                    );
                    self.context.emit(SessionEvent::MessageUpdated {
                        peer: self.peer.clone(),
                        message,
                    });
                }
                Err(e) => warn!(peer = %self.peer, error = %e, "cancelled reply already settled"),
            }
            if self.context.config.cancel_notice {
                self.append(state, Message::system(notice::CANCELLED));
            }
        }

        info!(peer = %self.peer, phase = %state.phase, "operation cancelled");
        self.set_phase(state, Phase::Idle);
        true
    }

    /// Cancel the outstanding operation, if any.
    ///
    /// A streaming reply keeps every fragment received so far. Returns `false`
    /// when the peer was already idle.
    pub fn cancel(&self) -> bool {
        let mut state = self.lock();
        self.cancel_locked(&mut state)
    }

    /// Accept a start command. Rejected unless idle; a running stream is not
    /// interrupted by a start.
    pub(crate) fn begin_start(&self) -> Result<Operation, Phase> {
        let mut state = self.lock();
        if !state.phase.is_idle() {
            return Err(state.phase);
        }
        Ok(self.begin(&mut state, Phase::AwaitingLifecycleAck, None))
    }

    /// Accept an end command. A running stream is cancelled first; an
    /// in-flight lifecycle call gets the end queued behind it, unless another
    /// end is already waiting.
    pub(crate) fn begin_end(&self) -> Result<Operation, Phase> {
        let mut state = self.lock();
        let phase = state.phase;
        match phase {
            Phase::AwaitingLifecycleAck => {
                if state.queued.is_some() {
                    return Err(phase);
                }
                let Some(after) = state.active.as_ref().map(|op| op.done.clone()) else {
                    return Err(phase);
                };
                let op = Self::operation(&mut state, None, Some(after));
                debug!(peer = %self.peer, "end queued behind lifecycle call");
                state.queued = Some(op.clone());
                return Ok(op);
            }
            Phase::Streaming => {
                self.cancel_locked(&mut state);
            }
            Phase::Idle => {}
        }
        Ok(self.begin(&mut state, Phase::AwaitingLifecycleAck, None))
    }

    /// Accept a message. Appends the user message and the empty in-progress
    /// reply before anything goes over the network.
    pub(crate) fn begin_message(&self, text: &str) -> Result<Operation, Phase> {
        let mut state = self.lock();
        if !state.phase.is_idle() {
            return Err(state.phase);
        }
        self.append(&mut state, Message::user(text));
        let reply = self.append(&mut state, Message::placeholder());
        Ok(self.begin(&mut state, Phase::Streaming, reply))
    }

    fn finish_lifecycle(&self, op: &Operation, message: Message) -> bool {
        let mut state = self.lock();
        if !state.is_current(op) {
            return false;
        }
        self.append(&mut state, message);
        self.release(&mut state);
        true
    }

    // ==================== Stream hooks ====================

    /// Add a fragment to the reply body without publishing it.
    ///
    /// Returns `false` once the operation is no longer current; the caller
    /// must stop consuming.
    pub(crate) fn absorb(&self, op: &Operation, fragment: &str) -> bool {
        let mut state = self.lock();
        if !state.is_current(op) || op.token.is_cancelled() {
            return false;
        }
        state.streamed.push_str(fragment);
        true
    }

    /// Publish everything absorbed so far as the next reply snapshot.
    pub(crate) fn publish(&self, op: &Operation) -> bool {
        let mut state = self.lock();
        if !state.is_current(op) || op.token.is_cancelled() {
            return false;
        }
        let Some(reply) = op.reply else {
            return false;
        };
        let state = &mut *state;
        match state.timeline.publish(reply, &state.streamed) {
            Ok(message) => {
                self.context.emit(SessionEvent::MessageUpdated {
                    peer: self.peer.clone(),
                    message,
                });
                true
            }
            Err(e) => {
                warn!(peer = %self.peer, error = %e, "stream update rejected");
                false
            }
        }
    }

    /// Finish the streaming reply with everything absorbed and return to
    /// idle.
    pub(crate) fn complete(&self, op: &Operation) -> bool {
        self.settle(op, None, "message_finalized")
    }

    /// Finish the streaming reply with an error body that keeps the partial
    /// reply.
    pub(crate) fn fail(&self, op: &Operation, error: &str) -> bool {
        self.settle(op, Some(error), "stream_failed")
    }

    fn settle(&self, op: &Operation, error: Option<&str>, event_type: &'static str) -> bool {
        let mut state = self.lock();
        if !state.is_current(op) || op.token.is_cancelled() {
            return false;
        }
        let Some(reply) = op.reply else {
            return false;
        };
        let (body, extra) = match error {
            Some(error) => (
                notice::stream_failed(&state.streamed, error),
                json!({ "error": error, "partial_bytes": state.streamed.len() }),
            ),
            None => (state.streamed.clone(), json!({})),
        };
        match state.timeline.settle(reply, &body) {
            Ok(message) => {
                let mut payload = json!({
                    "peer": self.peer.as_str(),
                    "message_id": message.id().value(),
                    "body": message.body(),
                });
                if let (Some(map), serde_json::Value::Object(extra)) =
                    (payload.as_object_mut(), extra)
                {
                    map.extend(extra);
                }
                self.context.log(event_type, payload);
                self.context.emit(SessionEvent::MessageUpdated {
                    peer: self.peer.clone(),
                    message,
                });
            }
            Err(e) => warn!(peer = %self.peer, error = %e, "reply already settled"),
        }
        self.release(&mut state);
        true
    }

    // ==================== Drivers (async) ====================

    /// Run an accepted start command to completion.
    pub(crate) async fn run_start<T: PeerTransport + ?Sized>(
        &self,
        transport: &T,
        mode: SessionMode,
        op: Operation,
    ) {
        let result = tokio::select! {
            biased;
            _ = op.token.cancelled() => {
                debug!(peer = %self.peer, "session start abandoned");
                return;
            }
            result = transport.start_session(&self.conversation, &self.peer, mode) => result,
        };

        let message = match result {
            Ok(_) => {
                info!(peer = %self.peer, %mode, "session started");
                self.context.log(
                    "session_started",
                    json!({
                        "peer": self.peer.as_str(),
                        "conversation": self.conversation.as_str(),
                        "mode": mode,
                    }),
                );
                Message::system(notice::session_started(mode))
            }
            Err(e) => {
                warn!(peer = %self.peer, error = %e, "session start failed");
                Message::system(notice::START_FAILED)
            }
        };
        self.finish_lifecycle(&op, message);
    }

    /// Run an accepted end command to completion. Always returns to idle.
    pub(crate) async fn run_end<T: PeerTransport + ?Sized>(
        &self,
        transport: &T,
        raw: &str,
        op: Operation,
    ) {
        if let Some(after) = &op.after {
            tokio::select! {
                biased;
                _ = op.token.cancelled() => {
                    debug!(peer = %self.peer, "queued session end abandoned");
                    return;
                }
                _ = after.cancelled() => {}
            }
        }

        let result = tokio::select! {
            biased;
            _ = op.token.cancelled() => {
                debug!(peer = %self.peer, "session end abandoned");
                return;
            }
            result = transport.end_session(&self.conversation) => result,
        };

        let message = match result {
            Ok(_) => {
                info!(peer = %self.peer, "session ended");
                self.context.log(
                    "session_ended",
                    json!({
                        "peer": self.peer.as_str(),
                        "conversation": self.conversation.as_str(),
                        "command": raw,
                    }),
                );
                Message::system(notice::session_ended(raw))
            }
            Err(e) => {
                warn!(peer = %self.peer, error = %e, "session end failed");
                Message::system(notice::END_FAILED)
            }
        };
        self.finish_lifecycle(&op, message);
    }

    /// Run an accepted message: send it and fold the reply into the timeline.
    pub(crate) async fn run_message<T: PeerTransport + ?Sized>(
        &self,
        transport: &T,
        text: &str,
        op: Operation,
    ) -> StreamOutcome {
        let reply = tokio::select! {
            biased;
            _ = op.token.cancelled() => return StreamOutcome::Cancelled,
            reply = transport.send_message(&self.conversation, text) => reply,
        };

        match reply {
            Ok(reply) => {
                StreamReducer::new(self, op, self.context.config.publish_interval)
                    .run(reply.into_stream())
                    .await
            }
            Err(e) => {
                warn!(peer = %self.peer, error = %e, "send failed");
                let error = e.to_string();
                if self.fail(&op, &error) {
                    StreamOutcome::Failed(error)
                } else {
                    StreamOutcome::Cancelled
                }
            }
        }
    }
}
