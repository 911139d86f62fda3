use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use serde::Serialize;
use serde_json::json;
use tokio::io::split as split_io;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;

use crate::config::WebSocketConfig;
use crate::connection::ConnectionEvent;
use crate::error::Error;
use crate::frame::Role;
use crate::outstream::OutStream;
use crate::read::ReadLoop;
use crate::stream::SocketFlowStream;
use crate::write::Writer;

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// The inbound half of a connection, yielded once per message
/// (spec.md §4.3: `Text`, `Binary`, `Pong`, `Close`).
pub struct WSReader {
    events: ReceiverStream<ConnectionEvent>,
}

impl Stream for WSReader {
    type Item = ConnectionEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().events).poll_next(cx)
    }
}

/// The outbound half of a connection. Cheap to clone (an `Arc<Mutex<_>>`
/// handle), so it can be handed to multiple tasks that all want to push
/// data on the same connection; `Writer` itself serializes them.
#[derive(Clone)]
pub struct WSWriter {
    inner: Arc<Mutex<Writer>>,
}

impl WSWriter {
    pub async fn send_text(&self, text: &str) -> Result<(), Error> {
        self.inner.lock().await.send_text(text).await
    }

    pub async fn send_binary(&self, data: &[u8]) -> Result<(), Error> {
        self.inner.lock().await.send_binary(data).await
    }

    /// Opens a streamed binary send; push chunks into the returned
    /// handle and call `finish()` when done. Only one send (streamed or
    /// whole-message) may be in flight at a time per connection.
    pub async fn begin_binary(&self) -> Result<OutStream, Error> {
        OutStream::begin(self.inner.clone()).await
    }

    pub async fn send_ping(&self, data: &[u8]) -> Result<(), Error> {
        self.inner.lock().await.send_ping(data).await
    }

    pub async fn close(&self, code: u16, reason: &str) -> Result<(), Error> {
        self.inner.lock().await.close(code, reason).await
    }

    pub async fn ready_state(&self) -> crate::connection::ReadyState {
        self.inner.lock().await.ready_state()
    }

    /// Sends a sign-dispatcher envelope `{"sign": tag, "data": data}`
    /// (spec.md §4.5). `data` may be any serializable value, including
    /// `()`/`serde_json::Value::Null` for a tag with no payload.
    pub async fn send_sign<T: Serialize>(&self, tag: &str, data: T) -> Result<(), Error> {
        let envelope = json!({ "sign": tag, "data": data });
        let text = serde_json::to_string(&envelope)?;
        self.send_text(&text).await
    }
}

/// Wraps a handshaken transport into the reader/writer pair the rest of
/// the crate's public API works with, and spawns the task that drives
/// the read side for the lifetime of the connection.
pub(crate) fn split(
    stream: SocketFlowStream,
    role: Role,
    config: WebSocketConfig,
) -> (WSReader, WSWriter) {
    let (read_half, write_half) = split_io(stream);
    let writer = Arc::new(Mutex::new(Writer::new(write_half, role, config.clone())));
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

    let read_loop = ReadLoop::new(read_half, role, config, writer.clone(), tx);
    tokio::spawn(read_loop.run());

    (
        WSReader {
            events: ReceiverStream::new(rx),
        },
        WSWriter { inner: writer },
    )
}
