use tokio::io::{AsyncWriteExt, WriteHalf};

use crate::config::WebSocketConfig;
use crate::connection::ReadyState;
use crate::error::Error;
use crate::frame::{
    create_binary_frame, create_close_frame, create_ping_frame, create_pong_frame,
    create_text_frame, Role,
};
use crate::stream::SocketFlowStream;

/// Owns the write half of the socket plus the one piece of mutable
/// state every send needs to check: `ready_state`. Every public method
/// on `Writer` takes `&mut self`, so callers serialize through the
/// `Arc<Mutex<Writer>>` that `split()` hands out, satisfying the rule
/// that no operation on a connection is re-entrant.
pub struct Writer {
    write_half: WriteHalf<SocketFlowStream>,
    role: Role,
    ready_state: ReadyState,
    out_stream_active: bool,
    config: WebSocketConfig,
}

impl Writer {
    pub(crate) fn new(
        write_half: WriteHalf<SocketFlowStream>,
        role: Role,
        config: WebSocketConfig,
    ) -> Self {
        Self {
            write_half,
            role,
            ready_state: ReadyState::Open,
            out_stream_active: false,
            config,
        }
    }

    fn masked(&self) -> bool {
        self.role == Role::Client
    }

    pub fn ready_state(&self) -> ReadyState {
        self.ready_state
    }

    pub(crate) fn set_ready_state(&mut self, state: ReadyState) {
        self.ready_state = state;
    }

    fn require_open(&self) -> Result<(), Error> {
        if self.ready_state != ReadyState::Open {
            return Err(Error::NotOpen);
        }
        Ok(())
    }

    async fn write_raw(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.write_half.write_all(bytes).await?;
        self.write_half.flush().await?;
        Ok(())
    }

    pub async fn send_text(&mut self, text: &str) -> Result<(), Error> {
        self.require_open()?;
        if self.out_stream_active {
            return Err(Error::SendInProgress);
        }
        let frame = create_text_frame(text, self.masked());
        self.write_raw(&frame).await
    }

    /// Sends a whole binary message as a single, atomic frame,
    /// regardless of payload size. For an incremental, fragmented write
    /// that flushes every `binary_fragmentation` bytes, use
    /// [`begin_out_stream`](Writer::begin_out_stream) through an
    /// [`OutStream`](crate::outstream::OutStream) instead.
    pub async fn send_binary(&mut self, data: &[u8]) -> Result<(), Error> {
        self.require_open()?;
        if self.out_stream_active {
            return Err(Error::SendInProgress);
        }
        let frame = create_binary_frame(data, self.masked(), true, true);
        self.write_raw(&frame).await
    }

    pub async fn send_ping(&mut self, data: &[u8]) -> Result<(), Error> {
        self.require_open()?;
        let frame = create_ping_frame(data, self.masked());
        self.write_raw(&frame).await
    }

    pub(crate) async fn send_pong(&mut self, data: &[u8]) -> Result<(), Error> {
        let frame = create_pong_frame(data, self.masked());
        self.write_raw(&frame).await
    }

    /// Sends a close frame and moves `ready_state` to `Closing`. The
    /// reader task moves it to `Closed` once the peer's close frame (or
    /// EOF) is observed.
    pub async fn close(&mut self, code: u16, reason: &str) -> Result<(), Error> {
        if self.ready_state == ReadyState::Closed || self.ready_state == ReadyState::Closing {
            return Ok(());
        }
        let frame = create_close_frame(Some(code), reason, self.masked());
        self.ready_state = ReadyState::Closing;
        self.write_raw(&frame).await
    }

    pub(crate) fn begin_out_stream(&mut self) -> Result<(), Error> {
        self.require_open()?;
        if self.out_stream_active {
            return Err(Error::SendInProgress);
        }
        self.out_stream_active = true;
        Ok(())
    }

    pub(crate) fn end_out_stream(&mut self) {
        self.out_stream_active = false;
    }

    /// Writes one fragment of a streamed binary send. Per spec.md §4.3,
    /// bytes are dropped silently (not an error) once the connection has
    /// left `Open` — writing a data frame after a close frame would be a
    /// protocol violation.
    pub(crate) async fn write_binary_fragment(
        &mut self,
        data: &[u8],
        first: bool,
        fin: bool,
    ) -> Result<(), Error> {
        if self.ready_state != ReadyState::Open {
            return Ok(());
        }
        let frame = create_binary_frame(data, self.masked(), first, fin);
        self.write_raw(&frame).await
    }

    pub(crate) fn binary_fragmentation(&self) -> usize {
        self.config.binary_fragmentation
    }
}
