use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::Error;
use crate::write::Writer;

/// The outbound half of a streamed binary message (spec.md §4.3).
/// Accumulates pushed chunks and flushes a non-final fragment frame
/// each time `binary_fragmentation` bytes have built up; `finish`
/// flushes whatever remains as the final fragment and releases the
/// connection's exclusive out-stream slot (I3).
pub struct OutStream {
    writer: Arc<Mutex<Writer>>,
    buffer: Vec<u8>,
    threshold: usize,
    sent_first: bool,
    finished: bool,
}

impl OutStream {
    pub(crate) async fn begin(writer: Arc<Mutex<Writer>>) -> Result<Self, Error> {
        let threshold = {
            let mut guard = writer.lock().await;
            guard.begin_out_stream()?;
            guard.binary_fragmentation()
        };
        Ok(Self {
            writer,
            buffer: Vec::with_capacity(threshold),
            threshold,
            sent_first: false,
            finished: false,
        })
    }

    /// Appends `data` to the pending fragment, flushing complete
    /// `threshold`-sized fragments as they fill up.
    pub async fn push(&mut self, data: &[u8]) -> Result<(), Error> {
        self.buffer.extend_from_slice(data);
        while self.buffer.len() >= self.threshold {
            let chunk: Vec<u8> = self.buffer.drain(..self.threshold).collect();
            self.flush_fragment(&chunk, false).await?;
        }
        Ok(())
    }

    /// Flushes any buffered bytes as the final fragment and ends the
    /// message. After this call the connection can start a new send.
    pub async fn finish(mut self) -> Result<(), Error> {
        let remainder = std::mem::take(&mut self.buffer);
        self.flush_fragment(&remainder, true).await?;
        self.finished = true;
        let mut guard = self.writer.lock().await;
        guard.end_out_stream();
        Ok(())
    }

    async fn flush_fragment(&mut self, data: &[u8], fin: bool) -> Result<(), Error> {
        let mut guard = self.writer.lock().await;
        let first = !self.sent_first;
        guard.write_binary_fragment(data, first, fin).await?;
        self.sent_first = true;
        Ok(())
    }
}

impl Drop for OutStream {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // The caller abandoned the stream without calling `finish`.
        // Release the exclusive slot so the connection doesn't wedge;
        // any partially-sent fragment is left unterminated on the wire,
        // which the peer's max_buffer_length cap will eventually reject.
        let writer = self.writer.clone();
        tokio::spawn(async move {
            writer.lock().await.end_out_stream();
        });
    }
}
