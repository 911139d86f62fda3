//! A small async WebSocket (RFC 6455) endpoint library for the Tokio
//! stack, usable as both a server and a client.
//!
//! It drives the HTTP/1.1 upgrade handshake, frames and masks payloads,
//! reassembles fragmented messages, and exposes a `Stream`-based
//! reader half plus a cloneable writer handle. An optional sign
//! dispatcher module builds a tagged-JSON-envelope request router on
//! top of the raw text channel for applications that want one.

pub mod config;
pub mod connection;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod instream;
pub mod outstream;
mod read;
mod request;
pub mod server;
pub mod sign;
pub mod split;
pub mod stream;
mod utils;
mod write;

pub mod event;
