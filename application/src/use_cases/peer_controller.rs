//! Peer controller use case
//!
//! Entry point of the application layer. Routes raw user input to the right
//! peer session, owns peer selection, and exposes the read side
//! ([`snapshot`](PeerController::snapshot), [`SessionEvent`]s) to
//! presenters.
//!
//! Command acceptance is synchronous: by the time
//! [`issue_command`](PeerController::issue_command) returns, the user
//! message and the in-progress reply are already in the timeline. The
//! transport call runs on a spawned task, one per accepted command.

use crate::config::ControllerConfig;
use crate::ports::conversation_logger::ConversationLogger;
use crate::ports::peer_transport::PeerTransport;
use crate::ports::session_event::SessionEvent;
use crate::use_cases::lifecycle::{self, TeardownHandle};
use crate::use_cases::peer_session::{PeerSession, PeerView, SessionContext};
use crate::use_cases::session_registry::SessionRegistry;
use chorus_domain::{Command, PeerId, Phase, SessionMode};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Why a command was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Nothing to send.
    Blank,
    /// The peer already has an outstanding operation.
    Busy(Phase),
}

/// Result of issuing one command to one peer.
#[derive(Debug)]
pub enum Dispatch {
    /// The command was applied; the handle resolves when its transport call
    /// and any resulting stream have settled.
    Accepted(JoinHandle<()>),
    /// The command was silently dropped; the timeline is unchanged.
    Dropped(DropReason),
}

impl Dispatch {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Dispatch::Accepted(_))
    }

    /// Wait until an accepted command has settled. No-op for a dropped one.
    pub async fn finished(self) {
        if let Dispatch::Accepted(handle) = self
            && let Err(e) = handle.await
        {
            warn!(error = %e, "command task aborted");
        }
    }
}

/// Outcome of [`PeerController::toggle_peer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Added,
    Removed,
    /// The peer is the only one left and stays selected.
    KeptLast,
}

/// Transport call to run for an accepted command.
enum Job {
    Start(SessionMode),
    End(String),
    Message(String),
}

/// Multi-peer session controller
pub struct PeerController<T: PeerTransport + 'static> {
    transport: Arc<T>,
    context: Arc<SessionContext>,
    registry: SessionRegistry,
}

impl<T: PeerTransport + 'static> PeerController<T> {
    pub fn new(transport: Arc<T>, config: ControllerConfig) -> Self {
        Self::with_context(transport, SessionContext::new(config))
    }

    fn with_context(transport: Arc<T>, context: SessionContext) -> Self {
        let context = Arc::new(context);
        Self {
            transport,
            registry: SessionRegistry::new(Arc::clone(&context)),
            context,
        }
    }

    fn rebuild(self, update: impl FnOnce(SessionContext) -> SessionContext) -> Self {
        let context = update((*self.context).clone());
        let peers = self.registry.peers();
        let controller = Self::with_context(self.transport, context);
        for peer in &peers {
            controller.registry.ensure(peer);
        }
        controller
    }

    /// Publish [`SessionEvent`]s to `tx`. Configure before issuing commands;
    /// existing peers are recreated from scratch.
    pub fn with_event_sender(self, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        self.rebuild(|context| context.with_events(tx))
    }

    /// Record transcript events to `logger`. Configure before issuing
    /// commands; existing peers are recreated from scratch.
    pub fn with_conversation_logger(self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.rebuild(|context| context.with_logger(logger))
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.context.config
    }

    // ==================== Peer selection ====================

    /// Currently selected peers, sorted.
    pub fn peers(&self) -> Vec<PeerId> {
        self.registry.peers()
    }

    /// Add `peer` if it is not selected yet. Returns `true` if it was added.
    pub fn add_peer(&self, peer: &PeerId) -> bool {
        if self.registry.contains(peer) {
            return false;
        }
        self.registry.ensure(peer);
        true
    }

    /// Remove `peer` and its history, cancelling its outstanding operation.
    pub fn remove_peer(&self, peer: &PeerId) -> bool {
        self.registry.remove(peer)
    }

    /// Make `peers` the selection: new ones are created, missing ones
    /// removed, retained ones keep their history.
    pub fn select(&self, peers: &[PeerId]) {
        for stale in self.registry.peers() {
            if !peers.contains(&stale) {
                self.registry.remove(&stale);
            }
        }
        for peer in peers {
            self.registry.ensure(peer);
        }
    }

    /// Add or remove one peer, never leaving the selection empty.
    pub fn toggle_peer(&self, peer: &PeerId) -> Toggle {
        if !self.registry.contains(peer) {
            self.registry.ensure(peer);
            return Toggle::Added;
        }
        if self.registry.len() <= 1 {
            debug!(%peer, "refusing to deselect the last peer");
            return Toggle::KeptLast;
        }
        self.registry.remove(peer);
        Toggle::Removed
    }

    // ==================== Commands ====================

    /// Classify `raw` and apply it to `peer`, selecting the peer if needed.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn issue_command(&self, peer: &PeerId, raw: &str) -> Dispatch {
        let session = self.registry.ensure(peer);
        let command = Command::classify(raw);

        if let Command::Message { text } = &command
            && text.trim().is_empty()
        {
            return Dispatch::Dropped(DropReason::Blank);
        }

        let kind = command.kind();
        let begun = match command {
            Command::Start { mode } => session.begin_start().map(|op| (op, Job::Start(mode))),
            Command::End { raw } => session.begin_end().map(|op| (op, Job::End(raw))),
            Command::Message { text } => {
                session.begin_message(&text).map(|op| (op, Job::Message(text)))
            }
        };
        let (op, job) = match begun {
            Ok(begun) => begun,
            Err(phase) => {
                debug!(%peer, %phase, "command dropped, peer busy");
                return Dispatch::Dropped(DropReason::Busy(phase));
            }
        };

        info!(%peer, kind, "command accepted");
        self.context.log(
            "command_accepted",
            json!({
                "peer": peer.as_str(),
                "conversation": session.conversation().as_str(),
                "command": raw,
            }),
        );

        let transport = Arc::clone(&self.transport);
        Dispatch::Accepted(tokio::spawn(async move {
            match job {
                Job::Start(mode) => session.run_start(transport.as_ref(), mode, op).await,
                Job::End(raw) => session.run_end(transport.as_ref(), &raw, op).await,
                Job::Message(text) => {
                    let outcome = session.run_message(transport.as_ref(), &text, op).await;
                    debug!(peer = %session.peer(), ?outcome, "reply settled");
                }
            }
        }))
    }

    /// Apply `raw` to every selected peer independently.
    pub fn broadcast(&self, raw: &str) -> Vec<(PeerId, Dispatch)> {
        self.registry
            .peers()
            .into_iter()
            .map(|peer| {
                let dispatch = self.issue_command(&peer, raw);
                (peer, dispatch)
            })
            .collect()
    }

    // ==================== Cancellation ====================

    /// Cancel one peer's outstanding operation. `false` if there was none.
    pub fn cancel(&self, peer: &PeerId) -> bool {
        self.registry
            .get(peer)
            .is_some_and(|session| session.cancel())
    }

    /// Cancel every outstanding operation; returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        self.registry
            .sessions()
            .iter()
            .filter(|session| session.cancel())
            .count()
    }

    /// Cancel everything and ask the backend to end every conversation.
    ///
    /// Timelines are left as they are. Must be called from within a Tokio
    /// runtime.
    pub fn teardown(&self) -> TeardownHandle {
        lifecycle::teardown(&self.registry, &self.transport)
    }

    // ==================== Read side ====================

    pub fn snapshot(&self) -> BTreeMap<PeerId, PeerView> {
        self.registry.snapshot()
    }

    pub fn view(&self, peer: &PeerId) -> Option<PeerView> {
        self.registry.get(peer).map(|session| session.view())
    }

    pub fn phase(&self, peer: &PeerId) -> Option<Phase> {
        self.registry.get(peer).map(|session| session.phase())
    }

    #[cfg(test)]
    pub(crate) fn session(&self, peer: &PeerId) -> Option<Arc<PeerSession>> {
        self.registry.get(peer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::conversation_logger::ConversationEvent;
    use crate::ports::peer_transport::{
        FragmentStream, LifecycleError, Reply, SessionAck, TransportError,
    };
    use async_trait::async_trait;
    use chorus_domain::{ConversationId, Role, StreamEvent, notice};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::{Notify, oneshot};

    // ==================== Mock transport ====================

    /// Scripted reply for one conversation.
    enum Script {
        /// Complete reply.
        Text(String),
        /// Hand the fragment sender to the test.
        Channel(oneshot::Sender<mpsc::Sender<StreamEvent>>),
        Fail(TransportError),
    }

    #[derive(Default)]
    struct MockTransport {
        scripts: Mutex<HashMap<String, Vec<Script>>>,
        failing_lifecycle: Mutex<Vec<String>>,
        /// When set, lifecycle calls wait for a notification.
        gate: Option<Arc<Notify>>,
        calls: Mutex<Vec<String>>,
    }

    impl MockTransport {
        fn gated(gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Default::default()
            }
        }

        fn script(&self, conversation: &str, script: Script) {
            self.scripts
                .lock()
                .unwrap()
                .entry(conversation.to_string())
                .or_default()
                .push(script);
        }

        fn fail_lifecycle(&self, conversation: &str) {
            self.failing_lifecycle
                .lock()
                .unwrap()
                .push(conversation.to_string());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        async fn lifecycle(
            &self,
            verb: &'static str,
            conversation: &ConversationId,
        ) -> Result<SessionAck, LifecycleError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{verb}:{conversation}"));
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self
                .failing_lifecycle
                .lock()
                .unwrap()
                .contains(&conversation.to_string())
            {
                return Err(TransportError::HttpStatus(500).into());
            }
            Ok(SessionAck {
                thread_id: Some(conversation.to_string()),
            })
        }
    }

    #[async_trait]
    impl PeerTransport for MockTransport {
        async fn start_session(
            &self,
            conversation: &ConversationId,
            _peer: &PeerId,
            _mode: SessionMode,
        ) -> Result<SessionAck, LifecycleError> {
            self.lifecycle("start", conversation).await
        }

        async fn send_message(
            &self,
            conversation: &ConversationId,
            text: &str,
        ) -> Result<Reply, TransportError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("message:{conversation}:{text}"));
            let script = {
                let mut scripts = self.scripts.lock().unwrap();
                let queue = scripts.entry(conversation.to_string()).or_default();
                if queue.is_empty() {
                    None
                } else {
                    Some(queue.remove(0))
                }
            };
            match script {
                None => Ok(Reply::Complete(format!("echo: {text}"))),
                Some(Script::Text(text)) => Ok(Reply::Complete(text)),
                Some(Script::Fail(e)) => Err(e),
                Some(Script::Channel(handoff)) => {
                    let (tx, stream) = FragmentStream::channel(16);
                    let _ = handoff.send(tx);
                    Ok(Reply::Streamed(stream))
                }
            }
        }

        async fn end_session(
            &self,
            conversation: &ConversationId,
        ) -> Result<SessionAck, LifecycleError> {
            self.lifecycle("end", conversation).await
        }
    }

    #[derive(Default)]
    struct RecordingLogger {
        events: Mutex<Vec<&'static str>>,
    }

    impl ConversationLogger for RecordingLogger {
        fn log(&self, event: ConversationEvent) {
            self.events.lock().unwrap().push(event.event_type);
        }
    }

    fn peer(name: &str) -> PeerId {
        PeerId::new(name).unwrap()
    }

    fn controller(transport: MockTransport) -> (PeerController<MockTransport>, Arc<MockTransport>) {
        let transport = Arc::new(transport);
        (
            PeerController::new(Arc::clone(&transport), ControllerConfig::default()),
            transport,
        )
    }

    fn bodies(controller: &PeerController<MockTransport>, peer: &PeerId) -> Vec<String> {
        controller
            .view(peer)
            .unwrap()
            .timeline
            .messages()
            .iter()
            .map(|m| m.body().to_string())
            .collect()
    }

    async fn stream_for(
        controller: &PeerController<MockTransport>,
        transport: &MockTransport,
        peer: &PeerId,
        text: &str,
    ) -> (Dispatch, mpsc::Sender<StreamEvent>) {
        let (handoff_tx, handoff_rx) = oneshot::channel();
        transport.script(&format!("1_{peer}"), Script::Channel(handoff_tx));
        let dispatch = controller.issue_command(peer, text);
        assert!(dispatch.is_accepted());
        (dispatch, handoff_rx.await.unwrap())
    }

    // ==================== Lifecycle ====================

    #[tokio::test]
    async fn test_start_then_end_adds_two_notices() {
        let (controller, transport) = controller(MockTransport::default());
        let a = peer("a");

        controller.issue_command(&a, "Start").finished().await;
        controller.issue_command(&a, " exit ").finished().await;

        assert_eq!(
            bodies(&controller, &a),
            vec![
                notice::WELCOME.to_string(),
                "Session started. Mode: Default.".to_string(),
                "Session ended by user command: ' exit '".to_string(),
            ]
        );
        assert_eq!(controller.phase(&a), Some(Phase::Idle));
        assert_eq!(transport.calls(), vec!["start:1_a", "end:1_a"]);
    }

    #[tokio::test]
    async fn test_lifecycle_failures_append_error_and_return_to_idle() {
        let (controller, transport) = controller(MockTransport::default());
        transport.fail_lifecycle("1_a");
        let a = peer("a");

        controller
            .issue_command(&a, "agent assistant")
            .finished()
            .await;
        controller.issue_command(&a, "quit").finished().await;

        let bodies = bodies(&controller, &a);
        assert_eq!(bodies[1], notice::START_FAILED);
        assert_eq!(bodies[2], notice::END_FAILED);
        assert_eq!(controller.phase(&a), Some(Phase::Idle));
    }

    #[tokio::test]
    async fn test_start_while_awaiting_ack_is_dropped() {
        let gate = Arc::new(Notify::new());
        let (controller, transport) = controller(MockTransport::gated(Arc::clone(&gate)));
        let a = peer("a");

        let first = controller.issue_command(&a, "start");
        assert_eq!(controller.phase(&a), Some(Phase::AwaitingLifecycleAck));
        assert!(matches!(
            controller.issue_command(&a, "start"),
            Dispatch::Dropped(DropReason::Busy(Phase::AwaitingLifecycleAck))
        ));
        assert!(matches!(
            controller.issue_command(&a, "hello"),
            Dispatch::Dropped(DropReason::Busy(_))
        ));

        gate.notify_one();
        first.finished().await;
        assert_eq!(bodies(&controller, &a).len(), 2);
        assert_eq!(transport.calls(), vec!["start:1_a"]);
    }

    #[tokio::test]
    async fn test_end_right_after_start_runs_both() {
        let (controller, transport) = controller(MockTransport::default());
        let a = peer("a");

        let start = controller.issue_command(&a, "start");
        let end = controller.issue_command(&a, "end");
        assert!(start.is_accepted());
        assert!(end.is_accepted());
        end.finished().await;
        start.finished().await;

        assert_eq!(
            bodies(&controller, &a),
            vec![
                notice::WELCOME.to_string(),
                "Session started. Mode: Default.".to_string(),
                "Session ended by user command: 'end'".to_string(),
            ]
        );
        assert_eq!(controller.phase(&a), Some(Phase::Idle));
        assert_eq!(transport.calls(), vec!["start:1_a", "end:1_a"]);
    }

    #[tokio::test]
    async fn test_end_waits_for_pending_start_ack() {
        let gate = Arc::new(Notify::new());
        let (controller, transport) = controller(MockTransport::gated(Arc::clone(&gate)));
        let a = peer("a");

        let start = controller.issue_command(&a, "start");
        let end = controller.issue_command(&a, "quit");
        assert!(end.is_accepted());
        assert!(matches!(
            controller.issue_command(&a, "exit"),
            Dispatch::Dropped(DropReason::Busy(Phase::AwaitingLifecycleAck))
        ));
        tokio::task::yield_now().await;
        assert_eq!(transport.calls(), vec!["start:1_a"]);

        gate.notify_one();
        start.finished().await;
        assert_eq!(controller.phase(&a), Some(Phase::AwaitingLifecycleAck));
        assert_eq!(bodies(&controller, &a).len(), 2);

        gate.notify_one();
        end.finished().await;
        assert_eq!(transport.calls(), vec!["start:1_a", "end:1_a"]);
        assert_eq!(
            bodies(&controller, &a)[2],
            "Session ended by user command: 'quit'"
        );
        assert_eq!(controller.phase(&a), Some(Phase::Idle));
    }

    #[tokio::test]
    async fn test_cancel_abandons_start_and_queued_end() {
        let gate = Arc::new(Notify::new());
        let (controller, transport) = controller(MockTransport::gated(Arc::clone(&gate)));
        let a = peer("a");

        let start = controller.issue_command(&a, "start");
        let end = controller.issue_command(&a, "end");
        assert!(controller.cancel(&a));
        start.finished().await;
        end.finished().await;

        assert_eq!(controller.phase(&a), Some(Phase::Idle));
        assert_eq!(bodies(&controller, &a).len(), 1);
        assert!(!transport.calls().contains(&"end:1_a".to_string()));
    }

    // ==================== Streaming ====================

    #[tokio::test]
    async fn test_streamed_reply_concatenates_fragments() {
        let (controller, transport) = controller(MockTransport::default());
        let a = peer("a");

        let (dispatch, tx) = stream_for(&controller, &transport, &a, "hi").await;
        for part in ["He", "llo", " there"] {
            tx.send(StreamEvent::Delta(part.to_string())).await.unwrap();
        }
        tx.send(StreamEvent::Completed).await.unwrap();
        dispatch.finished().await;

        let view = controller.view(&a).unwrap();
        let messages = view.timeline.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role(), Role::User);
        assert_eq!(messages[2].role(), Role::Peer);
        assert_eq!(messages[2].body(), "Hello there");
        assert!(!messages[2].is_in_progress());
        assert_eq!(view.phase, Phase::Idle);
    }

    #[tokio::test]
    async fn test_message_while_streaming_is_dropped() {
        let (controller, transport) = controller(MockTransport::default());
        let a = peer("a");

        let (dispatch, tx) = stream_for(&controller, &transport, &a, "first").await;
        let before = bodies(&controller, &a);

        let second = controller.issue_command(&a, "second");
        assert!(matches!(
            second,
            Dispatch::Dropped(DropReason::Busy(Phase::Streaming))
        ));
        assert_eq!(bodies(&controller, &a), before);

        // Start does not interrupt the stream either
        assert!(!controller.issue_command(&a, "start").is_accepted());
        assert_eq!(controller.phase(&a), Some(Phase::Streaming));

        tx.send(StreamEvent::Completed).await.unwrap();
        dispatch.finished().await;
        assert_eq!(controller.phase(&a), Some(Phase::Idle));
    }

    #[tokio::test]
    async fn test_blank_input_is_dropped() {
        let (controller, transport) = controller(MockTransport::default());
        let a = peer("a");
        assert!(matches!(
            controller.issue_command(&a, "   "),
            Dispatch::Dropped(DropReason::Blank)
        ));
        assert_eq!(bodies(&controller, &a).len(), 1);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_keeps_prefix() {
        let (controller, transport) = controller(MockTransport::default());
        let a = peer("a");

        let (dispatch, tx) = stream_for(&controller, &transport, &a, "hi").await;
        tx.send(StreamEvent::Delta("He".to_string())).await.unwrap();
        while bodies(&controller, &a)[2] != "He" {
            tokio::task::yield_now().await;
        }

        assert!(controller.cancel(&a));
        let _ = tx.send(StreamEvent::Delta("llo".to_string())).await;
        dispatch.finished().await;

        let view = controller.view(&a).unwrap();
        let reply = view.timeline.last().unwrap();
        assert_eq!(reply.body(), "He");
        assert!(!reply.is_in_progress());
        assert_eq!(view.phase, Phase::Idle);
        assert!(view.timeline.in_progress().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_cancel_keeps_every_received_fragment() {
        let transport = Arc::new(MockTransport::default());
        let controller = PeerController::new(
            Arc::clone(&transport),
            ControllerConfig::default().with_publish_interval_ms(50),
        );
        let a = peer("a");

        let (dispatch, tx) = stream_for(&controller, &transport, &a, "hi").await;
        tx.send(StreamEvent::Delta("He".to_string())).await.unwrap();
        tx.send(StreamEvent::Delta("llo".to_string())).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(bodies(&controller, &a)[2], "He");

        assert!(controller.cancel(&a));
        dispatch.finished().await;

        let view = controller.view(&a).unwrap();
        let reply = view.timeline.last().unwrap();
        assert_eq!(reply.body(), "Hello");
        assert!(!reply.is_in_progress());
        assert_eq!(view.phase, Phase::Idle);
    }

    #[tokio::test]
    async fn test_end_while_streaming_cancels_then_ends() {
        let (controller, transport) = controller(MockTransport::default());
        let a = peer("a");

        let (dispatch, tx) = stream_for(&controller, &transport, &a, "hi").await;
        tx.send(StreamEvent::Delta("par".to_string())).await.unwrap();
        while bodies(&controller, &a)[2] != "par" {
            tokio::task::yield_now().await;
        }

        controller.issue_command(&a, "end").finished().await;
        dispatch.finished().await;

        assert_eq!(
            bodies(&controller, &a)[2..].to_vec(),
            vec![
                "par".to_string(),
                "Session ended by user command: 'end'".to_string()
            ]
        );
        assert_eq!(controller.phase(&a), Some(Phase::Idle));
    }

    #[tokio::test]
    async fn test_send_failure_produces_error_reply() {
        let (controller, transport) = controller(MockTransport::default());
        let a = peer("a");
        transport.script("1_a", Script::Fail(TransportError::HttpStatus(503)));

        controller.issue_command(&a, "hi").finished().await;

        let view = controller.view(&a).unwrap();
        let reply = view.timeline.last().unwrap();
        assert!(reply.body().contains("HTTP error! status: 503"));
        assert!(!reply.is_in_progress());
        assert_eq!(view.phase, Phase::Idle);
    }

    // ==================== Isolation ====================

    #[tokio::test]
    async fn test_failing_peer_does_not_affect_others() {
        let (controller, transport) = controller(MockTransport::default());
        let (a, b) = (peer("a"), peer("b"));
        controller.select(&[a.clone(), b.clone()]);

        let (dispatch_a, tx_a) = stream_for(&controller, &transport, &a, "hi").await;
        transport.script("1_b", Script::Text("fine".to_string()));
        let dispatch_b = controller.issue_command(&b, "hi");

        tx_a.send(StreamEvent::Delta("part".to_string()))
            .await
            .unwrap();
        tx_a.send(StreamEvent::Error("boom".to_string()))
            .await
            .unwrap();
        dispatch_a.finished().await;
        dispatch_b.finished().await;

        assert!(bodies(&controller, &a)[2].contains("boom"));
        assert_eq!(bodies(&controller, &b)[2], "fine");
        assert_eq!(controller.phase(&b), Some(Phase::Idle));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_peer() {
        let (controller, _transport) = controller(MockTransport::default());
        let (a, b) = (peer("a"), peer("b"));
        controller.select(&[a.clone(), b.clone()]);

        let dispatches = controller.broadcast("ping");
        assert_eq!(dispatches.len(), 2);
        for (_, dispatch) in dispatches {
            dispatch.finished().await;
        }

        assert_eq!(bodies(&controller, &a)[2], "echo: ping");
        assert_eq!(bodies(&controller, &b)[2], "echo: ping");
    }

    #[tokio::test]
    async fn test_at_most_one_message_in_progress() {
        let (controller, transport) = controller(MockTransport::default());
        let a = peer("a");

        let (dispatch, tx) = stream_for(&controller, &transport, &a, "one").await;
        controller.issue_command(&a, "two");
        let in_progress = controller
            .view(&a)
            .unwrap()
            .timeline
            .messages()
            .iter()
            .filter(|m| m.is_in_progress())
            .count();
        assert_eq!(in_progress, 1);

        drop(tx);
        dispatch.finished().await;
        assert!(controller.view(&a).unwrap().timeline.in_progress().is_none());
    }

    // ==================== Selection ====================

    #[tokio::test]
    async fn test_select_keeps_history_of_retained_peers() {
        let (controller, _transport) = controller(MockTransport::default());
        let (a, b, c) = (peer("a"), peer("b"), peer("c"));
        controller.select(&[a.clone(), b.clone()]);
        controller.issue_command(&a, "hi").finished().await;

        controller.select(&[a.clone(), c.clone()]);

        assert_eq!(controller.peers(), vec![a.clone(), c.clone()]);
        assert_eq!(bodies(&controller, &a).len(), 3);
        assert_eq!(bodies(&controller, &c).len(), 1);
        assert!(controller.view(&b).is_none());
    }

    #[tokio::test]
    async fn test_toggle_never_removes_last_peer() {
        let (controller, _transport) = controller(MockTransport::default());
        let (a, b) = (peer("a"), peer("b"));
        controller.select(&[a.clone()]);

        assert_eq!(controller.toggle_peer(&b), Toggle::Added);
        assert_eq!(controller.toggle_peer(&a), Toggle::Removed);
        assert_eq!(controller.toggle_peer(&b), Toggle::KeptLast);
        assert_eq!(controller.peers(), vec![b]);
    }

    #[tokio::test]
    async fn test_removing_streaming_peer_cancels_it() {
        let (controller, transport) = controller(MockTransport::default());
        let a = peer("a");
        let (dispatch, _tx) = stream_for(&controller, &transport, &a, "hi").await;
        let session = controller.session(&a).unwrap();

        assert!(controller.remove_peer(&a));
        dispatch.finished().await;

        assert_eq!(session.phase(), Phase::Idle);
        assert!(controller.peers().is_empty());
        assert!(!controller.remove_peer(&a));
    }

    // ==================== Teardown ====================

    #[tokio::test]
    async fn test_teardown_cancels_and_ends_every_peer() {
        let (controller, transport) = controller(MockTransport::default());
        let (a, b) = (peer("a"), peer("b"));
        controller.select(&[a.clone(), b.clone()]);
        let (dispatch, _tx) = stream_for(&controller, &transport, &a, "hi").await;

        let handle = controller.teardown();
        assert_eq!(handle.len(), 2);
        assert!(handle.wait().await.is_empty());
        dispatch.finished().await;

        assert_eq!(controller.phase(&a), Some(Phase::Idle));
        let mut calls = transport.calls();
        calls.retain(|call| call.starts_with("end:"));
        calls.sort();
        assert_eq!(calls, vec!["end:1_a", "end:1_b"]);
        // Teardown does not write to timelines
        assert_eq!(bodies(&controller, &b).len(), 1);
    }

    #[tokio::test]
    async fn test_teardown_tolerates_failed_end() {
        let (controller, transport) = controller(MockTransport::default());
        let (a, b) = (peer("a"), peer("b"));
        controller.select(&[a.clone(), b.clone()]);
        transport.fail_lifecycle("1_b");

        let failures = controller.teardown().wait().await;

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, b);
        assert_eq!(
            failures[0].1,
            LifecycleError::Transport(TransportError::HttpStatus(500))
        );
        let mut calls = transport.calls();
        calls.sort();
        assert_eq!(calls, vec!["end:1_a", "end:1_b"]);
        assert_eq!(controller.phase(&a), Some(Phase::Idle));
        assert_eq!(controller.phase(&b), Some(Phase::Idle));
    }

    #[tokio::test]
    async fn test_cancel_all_with_nothing_active_is_noop() {
        let (controller, _transport) = controller(MockTransport::default());
        assert_eq!(controller.cancel_all(), 0);
        controller.select(&[peer("a")]);
        assert_eq!(controller.cancel_all(), 0);
        assert!(controller.teardown().wait().await.is_empty());
    }

    // ==================== Observers ====================

    #[tokio::test]
    async fn test_events_and_transcript_are_recorded() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let logger = Arc::new(RecordingLogger::default());
        let (controller, _transport) = controller(MockTransport::default());
        let controller = controller
            .with_event_sender(tx)
            .with_conversation_logger(logger.clone());
        let a = peer("a");

        controller.issue_command(&a, "start").finished().await;
        controller.issue_command(&a, "hello").finished().await;

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(matches!(events[0], SessionEvent::PeerAdded { .. }));
        assert!(events.iter().all(|event| event.peer() == &a));
        assert!(matches!(
            events.last(),
            Some(SessionEvent::PhaseChanged {
                phase: Phase::Idle,
                ..
            })
        ));

        assert_eq!(
            *logger.events.lock().unwrap(),
            vec![
                "command_accepted",
                "session_started",
                "command_accepted",
                "message_finalized"
            ]
        );
    }
}
