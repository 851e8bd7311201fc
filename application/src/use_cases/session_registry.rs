//! Registry of active peer sessions.
//!
//! The map lock is held only to look up, insert or remove an entry; per-peer
//! work happens on the session's own lock, so a slow peer never blocks
//! another.

use crate::ports::session_event::SessionEvent;
use crate::use_cases::peer_session::{PeerSession, PeerView, SessionContext};
use chorus_domain::PeerId;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

pub(crate) struct SessionRegistry {
    sessions: RwLock<HashMap<PeerId, Arc<PeerSession>>>,
    context: Arc<SessionContext>,
}

impl SessionRegistry {
    pub(crate) fn new(context: Arc<SessionContext>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            context,
        }
    }

    /// Session for `peer`, created (with its welcome message) on first use.
    pub(crate) fn ensure(&self, peer: &PeerId) -> Arc<PeerSession> {
        if let Some(session) = self.get(peer) {
            return session;
        }

        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        // Re-check: another caller may have inserted between the two locks
        if let Some(session) = sessions.get(peer) {
            return Arc::clone(session);
        }

        let session = Arc::new(PeerSession::new(peer.clone(), Arc::clone(&self.context)));
        sessions.insert(peer.clone(), Arc::clone(&session));
        info!(%peer, conversation = %session.conversation(), "peer added");
        self.context
            .emit(SessionEvent::PeerAdded { peer: peer.clone() });
        session
    }

    pub(crate) fn get(&self, peer: &PeerId) -> Option<Arc<PeerSession>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(peer)
            .cloned()
    }

    pub(crate) fn contains(&self, peer: &PeerId) -> bool {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(peer)
    }

    /// Drop the session for `peer`, cancelling its outstanding operation.
    ///
    /// Returns `false` for an unknown peer.
    pub(crate) fn remove(&self, peer: &PeerId) -> bool {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(peer);

        let Some(session) = removed else {
            return false;
        };
        session.cancel();
        info!(%peer, "peer removed");
        self.context
            .emit(SessionEvent::PeerRemoved { peer: peer.clone() });
        true
    }

    /// Active peers in a stable (sorted) order.
    pub(crate) fn peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        peers.sort();
        peers
    }

    pub(crate) fn sessions(&self) -> Vec<Arc<PeerSession>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub(crate) fn snapshot(&self) -> BTreeMap<PeerId, PeerView> {
        self.sessions()
            .into_iter()
            .map(|session| (session.peer().clone(), session.view()))
            .collect()
    }
}
