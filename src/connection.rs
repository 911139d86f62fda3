use tokio::sync::mpsc;

use crate::instream::InStream;

/// Lifecycle of one endpoint's view of a connection (spec.md §3, I1: the
/// state only ever moves forward `Connecting -> Open -> Closing -> Closed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// What the reader hands to the application. `Binary` carries an
/// `InStream` rather than a fully assembled `Vec<u8>` so a caller can
/// start consuming a large message before it has finished arriving
/// (spec.md §4.3).
#[derive(Debug)]
pub enum ConnectionEvent {
    Text(String),
    Binary(InStream),
    Pong(Vec<u8>),
    Close(u16, String),
}

/// Tracks an in-progress fragmented message (spec.md I4). Only one of
/// these may be open at a time per connection; a non-continuation data
/// frame arriving while this is `Some` is a protocol error.
pub(crate) enum Assembly {
    None,
    Text(Vec<u8>),
    Binary(mpsc::Sender<Vec<u8>>),
}

impl Assembly {
    pub(crate) fn is_none(&self) -> bool {
        matches!(self, Assembly::None)
    }
}
