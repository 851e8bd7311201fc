//! Controller teardown.
//!
//! Teardown cancels every outstanding operation and then asks the backend to
//! end each active conversation. The end calls run as detached tasks: they
//! never touch a timeline and nobody has to wait for them. The returned
//! [`TeardownHandle`] lets a caller (the CLI on exit) wait a bounded time.

use crate::ports::peer_transport::{LifecycleError, PeerTransport};
use crate::use_cases::session_registry::SessionRegistry;
use chorus_domain::PeerId;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// End-session calls started by a teardown.
///
/// Dropping the handle detaches the calls; they still run to completion.
#[derive(Debug, Default)]
pub struct TeardownHandle {
    tasks: Vec<(PeerId, JoinHandle<Result<(), LifecycleError>>)>,
}

impl TeardownHandle {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every end call; returns the peers whose call failed.
    pub async fn wait(self) -> Vec<(PeerId, LifecycleError)> {
        let mut failures = Vec::new();
        for (peer, task) in self.tasks {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => failures.push((peer, e)),
                Err(e) => warn!(%peer, error = %e, "end-session task aborted"),
            }
        }
        failures
    }

    /// Like [`wait`](Self::wait) but gives up after `limit`, leaving the
    /// remaining calls detached. `None` means the limit was hit.
    pub async fn wait_timeout(self, limit: Duration) -> Option<Vec<(PeerId, LifecycleError)>> {
        tokio::time::timeout(limit, self.wait()).await.ok()
    }
}

/// Cancel everything in `registry`, then end every conversation.
pub(crate) fn teardown<T>(registry: &SessionRegistry, transport: &Arc<T>) -> TeardownHandle
where
    T: PeerTransport + ?Sized + 'static,
{
    let sessions = registry.sessions();
    let cancelled = sessions.iter().filter(|session| session.cancel()).count();
    info!(peers = sessions.len(), cancelled, "tearing down");

    let tasks = sessions
        .into_iter()
        .map(|session| {
            let transport = Arc::clone(transport);
            let peer = session.peer().clone();
            let conversation = session.conversation().clone();
            let task = tokio::spawn(async move {
                match transport.end_session(&conversation).await {
                    Ok(_) => {
                        debug!(%conversation, "conversation ended on teardown");
                        Ok(())
                    }
                    Err(e) => {
                        warn!(%conversation, error = %e, "end-session on teardown failed");
                        Err(e)
                    }
                }
            });
            (peer, task)
        })
        .collect();

    TeardownHandle { tasks }
}
