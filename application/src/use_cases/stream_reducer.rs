//! Folds a fragment stream into the in-progress reply of one peer.
//!
//! Fragments are concatenated in arrival order. The accumulated body lives in
//! the peer session, so a cancellation settles the reply with every fragment
//! received so far, published or not. Each publish replaces the reply with a
//! fresh snapshot holding the whole body, so a reader never observes a
//! half-applied fragment. With a non-zero publish interval, fragments
//! arriving faster than the interval are batched and the batch is flushed
//! when the interval elapses or the stream ends.

use crate::ports::peer_transport::FragmentStream;
use crate::use_cases::peer_session::{Operation, PeerSession};
use chorus_domain::StreamEvent;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, trace};

/// How a streamed reply ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// End of stream; the reply holds the full body.
    Completed,
    /// The operation was cancelled; the reply keeps what was received.
    Cancelled,
    /// The stream failed; the reply holds the partial body and the error.
    Failed(String),
}

pub(crate) struct StreamReducer<'a> {
    session: &'a PeerSession,
    op: Operation,
    interval: Duration,
}

impl<'a> StreamReducer<'a> {
    pub(crate) fn new(session: &'a PeerSession, op: Operation, interval: Duration) -> Self {
        Self {
            session,
            op,
            interval,
        }
    }

    /// Consume `stream` until it ends or the operation is cancelled.
    ///
    /// Dropping the stream on return closes the channel, which stops the
    /// producer.
    pub(crate) async fn run(self, mut stream: FragmentStream) -> StreamOutcome {
        let token = self.op.token().clone();
        let mut fragments = 0usize;
        let mut last_publish: Option<Instant> = None;
        let mut flush_at: Option<Instant> = None;

        loop {
            let flush = async move {
                match flush_at {
                    Some(at) => sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    debug!(peer = %self.session.peer(), fragments, "stream cancelled");
                    return StreamOutcome::Cancelled;
                }

                event = stream.next() => match event {
                    Some(StreamEvent::Delta(fragment)) => {
                        fragments += 1;
                        trace!(peer = %self.session.peer(), len = fragment.len(), "fragment");
                        if !self.session.absorb(&self.op, &fragment) {
                            return StreamOutcome::Cancelled;
                        }

                        let now = Instant::now();
                        let due = last_publish.is_none_or(|at| now >= at + self.interval);
                        if due {
                            if !self.session.publish(&self.op) {
                                return StreamOutcome::Cancelled;
                            }
                            last_publish = Some(now);
                            flush_at = None;
                        } else if flush_at.is_none() {
                            flush_at = last_publish.map(|at| at + self.interval);
                        }
                    }
                    Some(StreamEvent::Completed) | None => {
                        debug!(peer = %self.session.peer(), fragments, "stream completed");
                        return if self.session.complete(&self.op) {
                            StreamOutcome::Completed
                        } else {
                            StreamOutcome::Cancelled
                        };
                    }
                    Some(StreamEvent::Error(error)) => {
                        debug!(peer = %self.session.peer(), fragments, %error, "stream failed");
                        return if self.session.fail(&self.op, &error) {
                            StreamOutcome::Failed(error)
                        } else {
                            StreamOutcome::Cancelled
                        };
                    }
                },

                _ = flush => {
                    if !self.session.publish(&self.op) {
                        return StreamOutcome::Cancelled;
                    }
                    last_publish = Some(Instant::now());
                    flush_at = None;
                }
            }
        }
    }
}
