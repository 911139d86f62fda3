use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsStream;

/// Transport-agnostic handle used by the rest of the crate so the
/// connection state machine never needs to know whether it's talking
/// over plain TCP or TLS (spec.md §1 — TLS is an external collaborator,
/// assumed to deliver an ordered, reliable, bidirectional byte stream).
pub enum SocketFlowStream {
    Plain(TcpStream),
    Secure(TlsStream<TcpStream>),
}

impl AsyncRead for SocketFlowStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            SocketFlowStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            SocketFlowStream::Secure(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for SocketFlowStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            SocketFlowStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            SocketFlowStream::Secure(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            SocketFlowStream::Plain(s) => Pin::new(s).poll_flush(cx),
            SocketFlowStream::Secure(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            SocketFlowStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            SocketFlowStream::Secure(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}
