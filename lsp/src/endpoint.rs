//! JSON-RPC endpoint: request/response correlation over a framed stream.
//!
//! One background task reads every inbound frame and classifies it:
//! responses complete the matching pending request, server-initiated
//! requests and notifications are routed through an immutable handler map
//! built before the endpoint starts. A second background task owns the
//! write half and serializes all outbound frames through a channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, mpsc, oneshot};

use crate::codec::{MessageReader, MessageWriter};
use crate::protocol::{Notification, Request};

const OUTBOUND_CHANNEL_CAPACITY: usize = 64;

type PendingTable = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;

/// Handler invoked for a server-to-client request; its return value is
/// sent back as the response `result`.
type RequestHandler = Box<dyn Fn(Option<Value>) -> Value + Send + Sync>;

/// Handler invoked for a server-to-client notification.
type NotificationHandler = Box<dyn Fn(Option<Value>) + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// The connection went away before the response arrived. Requests
    /// pending at teardown end here: abandoned, never completed.
    #[error("connection closed before the request completed")]
    ConnectionClosed,

    /// The response carried a JSON-RPC error object.
    #[error("server returned error {code}: {message}")]
    ErrorResponse { code: i64, message: String },

    /// An outgoing envelope failed to serialize.
    #[error("failed to encode outgoing frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Dispatch table for server-initiated traffic, fixed at construction.
///
/// Methods with no entry are ignored: a formatting-only client does not
/// implement optional capabilities, and silence is the correct reply.
#[derive(Default)]
pub struct Handlers {
    requests: HashMap<&'static str, RequestHandler>,
    notifications: HashMap<&'static str, NotificationHandler>,
}

impl Handlers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_request(
        mut self,
        method: &'static str,
        handler: impl Fn(Option<Value>) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.requests.insert(method, Box::new(handler));
        self
    }

    #[must_use]
    pub fn on_notification(
        mut self,
        method: &'static str,
        handler: impl Fn(Option<Value>) + Send + Sync + 'static,
    ) -> Self {
        self.notifications.insert(method, Box::new(handler));
        self
    }
}

enum Inbound {
    Response { id: u64, frame: Value },
    Request { id: Value, method: String, params: Option<Value> },
    Notification { method: String, params: Option<Value> },
}

fn classify(frame: &Value) -> Option<Inbound> {
    let id = frame.get("id");
    let method = frame.get("method").and_then(Value::as_str);
    let is_reply = frame.get("result").is_some() || frame.get("error").is_some();

    match (id, method, is_reply) {
        (Some(id), None, true) => Some(Inbound::Response {
            id: id.as_u64()?,
            frame: frame.clone(),
        }),
        (Some(id), Some(method), _) => Some(Inbound::Request {
            id: id.clone(),
            method: method.to_owned(),
            params: frame.get("params").cloned(),
        }),
        (None, Some(method), _) => Some(Inbound::Notification {
            method: method.to_owned(),
            params: frame.get("params").cloned(),
        }),
        _ => None,
    }
}

/// One side of a JSON-RPC 2.0 connection.
///
/// `call` suspends the caller until its specific response arrives; there
/// is deliberately no timeout — the peer is a child process the session
/// owner can always kill.
pub struct RpcEndpoint {
    outbound_tx: mpsc::Sender<Value>,
    pending: PendingTable,
    next_id: AtomicU64,
    reader_task: tokio::task::JoinHandle<()>,
    writer_task: tokio::task::JoinHandle<()>,
}

impl RpcEndpoint {
    /// Start the endpoint over a read/write stream pair. `handlers` is
    /// consumed and never mutated again.
    pub fn new<R, W>(read_half: R, write_half: W, handlers: Handlers) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let pending: PendingTable = Arc::new(Mutex::new(HashMap::new()));

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Value>(OUTBOUND_CHANNEL_CAPACITY);
        let writer_task = tokio::spawn(async move {
            let mut writer = MessageWriter::new(write_half);
            while let Some(frame) = outbound_rx.recv().await {
                if let Err(e) = writer.send(&frame).await {
                    tracing::warn!("outbound frame dropped: {e:#}");
                    break;
                }
            }
        });

        let reader_pending = pending.clone();
        let reader_outbound_tx = outbound_tx.clone();
        let reader_task = tokio::spawn(async move {
            let mut reader = MessageReader::new(read_half);
            loop {
                match reader.recv().await {
                    Ok(Some(frame)) => {
                        Self::dispatch(&frame, &reader_pending, &reader_outbound_tx, &handlers)
                            .await;
                    }
                    Ok(None) => {
                        tracing::debug!("server closed its output stream");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("inbound stream error: {e:#}");
                        break;
                    }
                }
            }
            // Waiters still registered will never resolve; dropping their
            // senders surfaces ConnectionClosed at each call site.
            reader_pending.lock().await.clear();
        });

        Self {
            outbound_tx,
            pending,
            next_id: AtomicU64::new(1),
            reader_task,
            writer_task,
        }
    }

    async fn dispatch(
        frame: &Value,
        pending: &Mutex<HashMap<u64, oneshot::Sender<Value>>>,
        outbound_tx: &mpsc::Sender<Value>,
        handlers: &Handlers,
    ) {
        let Some(inbound) = classify(frame) else {
            tracing::trace!("ignoring malformed JSON-RPC frame");
            return;
        };

        match inbound {
            Inbound::Response { id, frame } => {
                let waiter = pending.lock().await.remove(&id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(frame);
                    }
                    None => tracing::trace!("response for unknown request id {id}"),
                }
            }
            Inbound::Request { id, method, params } => {
                let Some(handler) = handlers.requests.get(method.as_str()) else {
                    tracing::trace!("ignoring unhandled server request: {method}");
                    return;
                };
                let result = handler(params);
                let reply = serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": result
                });
                let _ = outbound_tx.send(reply).await;
            }
            Inbound::Notification { method, params } => {
                match handlers.notifications.get(method.as_str()) {
                    Some(handler) => handler(params),
                    None => tracing::trace!("ignoring unhandled notification: {method}"),
                }
            }
        }
    }

    /// Send a request and wait for its response. Returns the response's
    /// `result` value, or [`RpcError::ErrorResponse`] if the server
    /// answered with an error object.
    pub async fn call(
        &self,
        method: &'static str,
        params: Option<Value>,
    ) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = serde_json::to_value(Request::new(id, method, params))?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        if self.outbound_tx.send(frame).await.is_err() {
            // Never leak the pending entry when the send itself fails.
            self.pending.lock().await.remove(&id);
            return Err(RpcError::ConnectionClosed);
        }

        let frame = rx.await.map_err(|_| RpcError::ConnectionClosed)?;

        if let Some(error) = frame.get("error") {
            return Err(RpcError::ErrorResponse {
                code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_owned(),
            });
        }
        Ok(frame.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Send a notification; returns as soon as the frame is queued.
    pub async fn notify(
        &self,
        method: &'static str,
        params: Option<Value>,
    ) -> Result<(), RpcError> {
        let frame = serde_json::to_value(Notification::new(method, params))?;
        self.outbound_tx
            .send(frame)
            .await
            .map_err(|_| RpcError::ConnectionClosed)
    }
}

impl Drop for RpcEndpoint {
    fn drop(&mut self) {
        self.reader_task.abort();
        self.writer_task.abort();
    }
}
