use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio_stream::wrappers::ReceiverStream;

/// The inbound half of a fragmented binary message (spec.md §4.3). Each
/// item is one fragment's payload, in arrival order; the stream ends
/// when the reader task that feeds it drops the paired `Sender`, which
/// happens on the frame carrying `final_fragment = true`.
pub struct InStream {
    inner: ReceiverStream<Vec<u8>>,
}

impl InStream {
    pub(crate) fn new(inner: ReceiverStream<Vec<u8>>) -> Self {
        Self { inner }
    }
}

impl Stream for InStream {
    type Item = Vec<u8>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().inner).poll_next(cx)
    }
}

impl std::fmt::Debug for InStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InStream").finish_non_exhaustive()
    }
}
