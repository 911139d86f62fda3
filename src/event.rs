use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc::Receiver;
use uuid::Uuid;

use crate::connection::ConnectionEvent;
use crate::error::Error;
use crate::split::WSWriter;

pub type ID = Uuid;

/// Generates a fresh connection identifier, one per accepted client.
pub fn generate_new_uuid() -> Uuid {
    let mut rng = StdRng::from_rng(rand::thread_rng());
    let buf = rng.random::<[u8; 16]>();
    Uuid::new_v8(buf)
}

/// Every notable thing that happens across a [`Server`](crate::server::Server)'s
/// lifetime, tagged with the connection it belongs to so a caller
/// driving many connections from one `EventStream` can tell them apart.
pub enum Event {
    NewClient(ID, WSWriter),
    NewMessage(ID, ConnectionEvent),
    Disconnect(ID, u16, String),
    Error(ID, Error),
}

/// `Stream` wrapper over the server's internal `mpsc::Receiver<Event>`
/// so callers don't interact with the channel directly.
pub struct EventStream {
    receiver: Receiver<Event>,
}

impl EventStream {
    pub(crate) fn new(receiver: Receiver<Event>) -> Self {
        Self { receiver }
    }
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().receiver).poll_recv(cx)
    }
}
