//! HTTP implementation of the [`PeerTransport`] port.
//!
//! Streamed replies are read on a background task that forwards decoded
//! chunks into a bounded [`FragmentStream`]. When the controller drops the
//! stream (completion or cancellation) the task notices the closed channel
//! and drops the response body, which closes the connection.

use super::decoder::Utf8Decoder;
use super::error::{HttpTransportError, Result};
use super::protocol::{
    AckBody, EndRequest, MessageRequest, ReplyBody, StartRequest, is_event_stream,
};
use async_trait::async_trait;
use chorus_application::{
    FragmentStream, LifecycleError, PeerTransport, Reply, SessionAck, TransportError,
};
use chorus_domain::{ConversationId, PeerId, SessionMode, StreamEvent};
use futures::StreamExt;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Default capacity of the fragment channel.
pub const DEFAULT_EVENT_BUFFER: usize = 64;

/// Backend client speaking the `/api/start`, `/api/message`, `/api/end`
/// protocol.
#[derive(Debug, Clone)]
pub struct HttpPeerTransport {
    client: reqwest::Client,
    base_url: String,
    event_buffer: usize,
}

impl HttpPeerTransport {
    /// Create a transport for `base_url` with its own connection pool.
    pub fn new(base_url: impl Into<String>, connect_timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| HttpTransportError::ClientBuild(e.to_string()))?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a transport sharing an existing client.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }

    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, verb: &str) -> String {
        format!("{}/api/{}", self.base_url, verb)
    }

    async fn post<B: Serialize + ?Sized>(&self, verb: &str, body: &B) -> Result<reqwest::Response> {
        let url = self.endpoint(verb);
        debug!(%url, "POST");
        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "backend returned an error status");
            return Err(HttpTransportError::Status(status.as_u16()));
        }
        Ok(response)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let raw = response.text().await?;
        serde_json::from_str(&raw).map_err(|e| HttpTransportError::ParseError {
            error: e.to_string(),
            raw,
        })
    }

    async fn lifecycle<B: Serialize>(
        &self,
        verb: &'static str,
        body: &B,
    ) -> std::result::Result<SessionAck, LifecycleError> {
        let ack = self.acknowledge(verb, body).await.map_err(|e| match e {
            HttpTransportError::Status(_) => LifecycleError::Rejected {
                verb,
                reason: e.to_string(),
            },
            other => LifecycleError::Transport(other.into()),
        })?;

        Ok(SessionAck {
            thread_id: ack.thread_id,
        })
    }

    async fn acknowledge<B: Serialize>(&self, verb: &'static str, body: &B) -> Result<AckBody> {
        let response = self.post(verb, body).await?;
        Self::read_json(response).await
    }

    fn spawn_reader(&self, response: reqwest::Response) -> FragmentStream {
        let (tx, stream) = FragmentStream::channel(self.event_buffer);
        tokio::spawn(forward_body(response, tx));
        stream
    }
}

/// Pump a streamed body into `tx` until it ends, fails, or the reader goes
/// away.
async fn forward_body(response: reqwest::Response, tx: mpsc::Sender<StreamEvent>) {
    let mut body = response.bytes_stream();
    let mut decoder = Utf8Decoder::new();
    let mut chunks = 0usize;

    loop {
        let chunk = tokio::select! {
            biased;
            _ = tx.closed() => {
                debug!(chunks, "reply abandoned by reader");
                return;
            }
            chunk = body.next() => chunk,
        };

        let event = match chunk {
            Some(Ok(bytes)) => {
                chunks += 1;
                let text = decoder.decode(&bytes);
                trace!(chunks, bytes = bytes.len(), "body chunk");
                if text.is_empty() {
                    continue;
                }
                StreamEvent::Delta(text)
            }
            Some(Err(e)) => {
                warn!(chunks, error = %e, "reply body failed");
                let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                return;
            }
            None => {
                let tail = decoder.finish();
                if !tail.is_empty() && tx.send(StreamEvent::Delta(tail)).await.is_err() {
                    return;
                }
                debug!(chunks, "reply body complete");
                let _ = tx.send(StreamEvent::Completed).await;
                return;
            }
        };

        if tx.send(event).await.is_err() {
            return;
        }
    }
}

#[async_trait]
impl PeerTransport for HttpPeerTransport {
    async fn start_session(
        &self,
        conversation: &ConversationId,
        peer: &PeerId,
        mode: SessionMode,
    ) -> std::result::Result<SessionAck, LifecycleError> {
        self.lifecycle(
            "start",
            &StartRequest::new(conversation.as_str(), peer.as_str(), mode),
        )
        .await
    }

    async fn send_message(
        &self,
        conversation: &ConversationId,
        text: &str,
    ) -> std::result::Result<Reply, TransportError> {
        let response = self
            .post(
                "message",
                &MessageRequest {
                    message: text,
                    thread_id: conversation.as_str(),
                },
            )
            .await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok());

        if is_event_stream(content_type) {
            debug!(%conversation, "streamed reply");
            return Ok(Reply::Streamed(self.spawn_reader(response)));
        }

        let body: ReplyBody = Self::read_json(response).await?;
        Ok(Reply::Complete(body.into_text()))
    }

    async fn end_session(
        &self,
        conversation: &ConversationId,
    ) -> std::result::Result<SessionAck, LifecycleError> {
        self.lifecycle(
            "end",
            &EndRequest {
                thread_id: conversation.as_str(),
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Accept one connection, capture the request body, answer with
    /// `head` followed by each of `parts` written separately.
    async fn serve_once(
        head: &'static str,
        parts: Vec<&'static [u8]>,
    ) -> (String, oneshot::Receiver<(String, serde_json::Value)>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buffer = Vec::new();
            let mut chunk = [0u8; 1024];
            let (path, body) = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    return;
                }
                buffer.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buffer).to_string();
                let Some(split) = text.find("\r\n\r\n") else {
                    continue;
                };
                let headers = text[..split].to_ascii_lowercase();
                let length = headers
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|value| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                let body = &text[split + 4..];
                if body.len() >= length {
                    let path = text.split_whitespace().nth(1).unwrap_or("").to_string();
                    break (path, body.to_string());
                }
            };
            let _ = tx.send((path, serde_json::from_str(&body).unwrap_or_default()));

            socket.write_all(head.as_bytes()).await.unwrap();
            for part in parts {
                socket.write_all(part).await.unwrap();
                socket.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            let _ = socket.shutdown().await;
        });

        (base_url, rx)
    }

    fn conversation() -> ConversationId {
        ConversationId::derive("1", &PeerId::new("gpt-4o").unwrap())
    }

    #[tokio::test]
    async fn test_start_posts_protocol_body() {
        let (base_url, request) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 25\r\nConnection: close\r\n\r\n",
            vec![&b"{\"thread_id\": \"1_gpt-4o\"}"[..]],
        )
        .await;
        let transport = HttpPeerTransport::new(base_url, None).unwrap();

        let ack = transport
            .start_session(
                &conversation(),
                &PeerId::new("gpt-4o").unwrap(),
                SessionMode::PromptAssistant,
            )
            .await
            .unwrap();

        assert_eq!(ack.thread_id.as_deref(), Some("1_gpt-4o"));
        let (path, body) = request.await.unwrap();
        assert_eq!(path, "/api/start");
        assert_eq!(body["thread_id"], "1_gpt-4o");
        assert_eq!(body["is_first_turn"], true);
        assert_eq!(body["llm_name"], "gpt-4o");
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let (base_url, _request) = serve_once(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            vec![],
        )
        .await;
        let transport = HttpPeerTransport::new(base_url, None).unwrap();

        let error = transport.end_session(&conversation()).await.unwrap_err();
        assert!(matches!(error, LifecycleError::Rejected { verb: "end", .. }));
        assert_eq!(error.to_string(), "Backend rejected end: HTTP error! status: 500");
    }

    #[tokio::test]
    async fn test_json_reply_is_complete() {
        let (base_url, request) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 21\r\nConnection: close\r\n\r\n",
            vec![&b"{\"response\": \"hello\"}"[..]],
        )
        .await;
        let transport = HttpPeerTransport::new(base_url, None).unwrap();

        let reply = transport.send_message(&conversation(), "hi").await.unwrap();
        assert!(matches!(&reply, Reply::Complete(text) if text == "hello"));
        let (path, body) = request.await.unwrap();
        assert_eq!(path, "/api/message");
        assert_eq!(body["message"], "hi");
        assert_eq!(body["thread_id"], "1_gpt-4o");
    }

    #[tokio::test]
    async fn test_event_stream_reply_is_decoded_across_chunks() {
        let check = "✓".as_bytes();
        let (base_url, _request) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n",
            vec![&b"He"[..], &b"llo "[..], &check[..1], &check[1..]],
        )
        .await;
        let transport = HttpPeerTransport::new(base_url, None).unwrap();

        let reply = transport.send_message(&conversation(), "hi").await.unwrap();
        let Reply::Streamed(mut stream) = reply else {
            panic!("expected a streamed reply");
        };
        let mut text = String::new();
        while let Some(event) = stream.next().await {
            match event {
                StreamEvent::Delta(chunk) => text.push_str(&chunk),
                StreamEvent::Completed => break,
                StreamEvent::Error(e) => panic!("stream failed: {e}"),
            }
        }
        assert_eq!(text, "Hello ✓");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_a_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        let transport = HttpPeerTransport::new(base_url, Some(Duration::from_secs(2))).unwrap();

        let error = transport.send_message(&conversation(), "hi").await.unwrap_err();
        assert!(matches!(error, TransportError::ConnectionError(_)));
    }
}
