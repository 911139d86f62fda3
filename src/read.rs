use std::sync::Arc;

use log::{debug, warn};
use tokio::io::{AsyncReadExt, ReadHalf};
use tokio::sync::mpsc::{self, Sender};
use tokio::sync::Mutex;

use crate::config::WebSocketConfig;
use crate::connection::{Assembly, ConnectionEvent, ReadyState};
use crate::error::Error;
use crate::frame::{decode_frame, DecodeOutcome, Frame, OpCode, Role};
use crate::instream::InStream;
use crate::stream::SocketFlowStream;
use crate::write::Writer;

const READ_CHUNK: usize = 8 * 1024;

/// Drives the read side of a connection: pulls bytes off the socket,
/// feeds them through [`decode_frame`] one frame at a time, and turns
/// the resulting frames into [`ConnectionEvent`]s for the caller while
/// handling control frames (ping/pong/close) itself. Runs as its own
/// `tokio::spawn`ed task so the socket's read half is only ever touched
/// from one place, mirroring the write side's single-owner `Writer`.
pub(crate) struct ReadLoop {
    read_half: ReadHalf<SocketFlowStream>,
    role: Role,
    config: WebSocketConfig,
    writer: Arc<Mutex<Writer>>,
    events: Sender<ConnectionEvent>,
    buffer: Vec<u8>,
    assembly: Assembly,
}

impl ReadLoop {
    pub(crate) fn new(
        read_half: ReadHalf<SocketFlowStream>,
        role: Role,
        config: WebSocketConfig,
        writer: Arc<Mutex<Writer>>,
        events: Sender<ConnectionEvent>,
    ) -> Self {
        Self {
            read_half,
            role,
            config,
            writer,
            events,
            buffer: Vec::with_capacity(READ_CHUNK),
            assembly: Assembly::None,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            match self.next_frame().await {
                Ok(Some(frame)) => match self.handle_frame(frame).await {
                    Ok(()) => {}
                    Err(Error::CommunicationError) => {
                        // handle_close already ran the close handshake
                        // and emitted the event; nothing more to do.
                        return;
                    }
                    Err(err) => {
                        self.fail(err).await;
                        return;
                    }
                },
                Ok(None) => {
                    // Peer closed the TCP connection without a close
                    // frame. Never send anything back on the wire here.
                    self.emit_close(1006, String::new()).await;
                    return;
                }
                Err(err) => {
                    self.fail(err).await;
                    return;
                }
            }
        }
    }

    async fn next_frame(&mut self) -> Result<Option<Frame>, Error> {
        loop {
            match decode_frame(&self.buffer, self.role, self.config.max_buffer_length)? {
                DecodeOutcome::Frame { frame, consumed } => {
                    self.buffer.drain(..consumed);
                    return Ok(Some(frame));
                }
                DecodeOutcome::NeedMoreData => {
                    let mut chunk = [0u8; READ_CHUNK];
                    let n = self.read_half.read(&mut chunk).await?;
                    if n == 0 {
                        return Ok(None);
                    }
                    self.buffer.extend_from_slice(&chunk[..n]);
                }
            }
        }
    }

    async fn handle_frame(&mut self, frame: Frame) -> Result<(), Error> {
        match frame.opcode {
            OpCode::Text if !frame.final_fragment => {
                if !self.assembly.is_none() {
                    return Err(Error::InvalidFrameFragmentation);
                }
                self.assembly = Assembly::Text(frame.payload);
                Ok(())
            }
            OpCode::Binary if !frame.final_fragment => {
                if !self.assembly.is_none() {
                    return Err(Error::InvalidFrameFragmentation);
                }
                let (tx, rx) = mpsc::channel(16);
                let _ = tx.send(frame.payload).await;
                self.assembly = Assembly::Binary(tx);
                let in_stream = InStream::new(tokio_stream::wrappers::ReceiverStream::new(rx));
                self.send_event(ConnectionEvent::Binary(in_stream)).await
            }
            OpCode::Continue => self.handle_continuation(frame).await,
            OpCode::Text => {
                if !self.assembly.is_none() {
                    return Err(Error::InvalidFrameFragmentation);
                }
                let text = String::from_utf8(frame.payload)?;
                self.send_event(ConnectionEvent::Text(text)).await
            }
            OpCode::Binary => {
                if !self.assembly.is_none() {
                    return Err(Error::InvalidFrameFragmentation);
                }
                let (tx, rx) = mpsc::channel(1);
                let _ = tx.send(frame.payload).await;
                drop(tx);
                let in_stream = InStream::new(tokio_stream::wrappers::ReceiverStream::new(rx));
                self.send_event(ConnectionEvent::Binary(in_stream)).await
            }
            OpCode::Ping => {
                let mut writer = self.writer.lock().await;
                writer.send_pong(&frame.payload).await
            }
            OpCode::Pong => self.send_event(ConnectionEvent::Pong(frame.payload)).await,
            OpCode::Close => self.handle_close(frame).await,
        }
    }

    async fn handle_continuation(&mut self, frame: Frame) -> Result<(), Error> {
        match std::mem::replace(&mut self.assembly, Assembly::None) {
            Assembly::None => Err(Error::InvalidContinuationFrame),
            Assembly::Text(mut buf) => {
                buf.extend_from_slice(&frame.payload);
                if frame.final_fragment {
                    let text = String::from_utf8(buf)?;
                    self.send_event(ConnectionEvent::Text(text)).await
                } else {
                    self.assembly = Assembly::Text(buf);
                    Ok(())
                }
            }
            Assembly::Binary(tx) => {
                let _ = tx.send(frame.payload).await;
                if !frame.final_fragment {
                    self.assembly = Assembly::Binary(tx);
                }
                // Dropping `tx` on the final fragment ends the InStream.
                Ok(())
            }
        }
    }

    async fn handle_close(&mut self, frame: Frame) -> Result<(), Error> {
        let (code, reason) = parse_close_payload(&frame.payload);

        let already_closing = {
            let writer = self.writer.lock().await;
            writer.ready_state() == ReadyState::Closing
        };

        if !already_closing {
            let mut writer = self.writer.lock().await;
            let _ = writer.close(code, &reason).await;
        }

        {
            let mut writer = self.writer.lock().await;
            writer.set_ready_state(ReadyState::Closed);
        }

        self.emit_close(code, reason).await;
        Err(Error::CommunicationError)
    }

    async fn emit_close(&mut self, code: u16, reason: String) {
        {
            let mut writer = self.writer.lock().await;
            writer.set_ready_state(ReadyState::Closed);
        }
        let _ = self.events.send(ConnectionEvent::Close(code, reason)).await;
    }

    async fn send_event(&mut self, event: ConnectionEvent) -> Result<(), Error> {
        self.events
            .send(event)
            .await
            .map_err(|_| Error::CommunicationError)
    }

    async fn fail(&mut self, err: Error) {
        let code = close_code_for(&err);
        warn!("connection protocol error, closing with code {code}: {err}");
        {
            let mut writer = self.writer.lock().await;
            let _ = writer.close(code, "").await;
        }
        self.emit_close(code, err.to_string()).await;
    }
}

fn parse_close_payload(payload: &[u8]) -> (u16, String) {
    if payload.len() < 2 {
        return (1005, String::new());
    }
    let code = u16::from_be_bytes([payload[0], payload[1]]);
    let reason = String::from_utf8_lossy(&payload[2..]).into_owned();
    (code, reason)
}

fn close_code_for(err: &Error) -> u16 {
    match err {
        Error::PayloadTooLarge | Error::CustomFragmentSizeExceeded(_, _) => 1009,
        _ => 1002,
    }
}

#[allow(dead_code)]
fn trace_frame(frame: &Frame) {
    debug!("received frame opcode={:?} len={}", frame.opcode, frame.payload.len());
}
