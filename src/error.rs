use httparse::Error as HttpParseError;
use pki_types::InvalidDnsNameError;
use std::io;
use std::string::FromUtf8Error;
use thiserror::Error;
use tokio::sync::mpsc::error::SendError;
use tokio::time::error::Elapsed;
use url::ParseError;

use crate::frame::Frame;

#[derive(Error, Debug)]
pub enum Error {
    // Channel / task-boundary errors
    #[error("{source}")]
    SendError {
        #[from]
        source: SendError<Frame>,
    },

    #[error("channel communication error")]
    CommunicationError,

    // General errors
    #[error("{source}")]
    Timeout {
        #[from]
        source: Elapsed,
    },

    #[error("IO error happened: {source}")]
    IOError {
        #[from]
        source: io::Error,
    },

    #[error("{source}")]
    FromUtf8Error {
        #[from]
        source: FromUtf8Error,
    },

    // Handshake errors (§7.3 — server replies 400, client emits error)
    #[error("invalid HTTP handshake request line")]
    InvalidHTTPHandshake,

    #[error("invalid HTTP handshake status line")]
    InvalidHTTPStatusLine,

    #[error("Connection: Upgrade header missing or malformed")]
    NoConnectionHeaderPresent,

    #[error("Upgrade: websocket header missing or malformed")]
    NoUpgradeHeaderPresent,

    #[error("Host header missing in the request")]
    NoHostHeaderPresent,

    #[error("couldn't find Sec-WebSocket-Key header in the request")]
    NoSecWebsocketKey,

    #[error("Sec-WebSocket-Version must be 13")]
    InvalidWebsocketVersion,

    #[error("server didn't upgrade the connection")]
    NoUpgrade,

    #[error("server didn't send a valid Sec-WebSocket-Accept key")]
    InvalidAcceptKey,

    #[error("server negotiated a subprotocol the client never offered")]
    InvalidSubprotocol,

    #[error("{source}")]
    HttpParseError {
        #[from]
        source: HttpParseError,
    },

    #[error("incomplete HTTP request")]
    IncompleteHTTPRequest,

    #[error("handshake exceeded max_buffer_length before a terminator was found")]
    HandshakeTooLarge,

    // Framing errors (§7.1 — local close(1002))
    #[error("RSV bits must be zero")]
    RSVNotZero,

    #[error("control frames must not be fragmented")]
    ControlFramesFragmented,

    #[error("control frame payload exceeds 125 bytes")]
    ControlFramePayloadSize,

    #[error("invalid opcode")]
    InvalidOpcode,

    #[error("frame violates masking discipline for its role")]
    MaskingDiscipline,

    // Fragmentation errors (I4 — local close(1002))
    #[error("non-continuation frame received while a fragmented message is in progress")]
    InvalidFrameFragmentation,

    #[error("continuation frame received with no fragmented message in progress")]
    InvalidContinuationFrame,

    // Oversize errors (§7.2 — local close(1009))
    #[error("frame length exceeds max_buffer_length")]
    PayloadTooLarge,

    #[error("fragment_size `{0}` exceeds max_buffer_length `{1}`")]
    CustomFragmentSizeExceeded(usize, usize),

    // Usage errors (§7.4 — surfaced as error events)
    #[error("write attempted on a connection that is not OPEN")]
    NotOpen,

    #[error("a binary OutStream or text send is already in flight on this connection")]
    SendInProgress,

    // HTTP/URL errors
    #[error("{source}")]
    URLParseError {
        #[from]
        source: ParseError,
    },

    #[error("invalid scheme in WebSocket URL, expected ws:// or wss://")]
    InvalidSchemeURL,

    #[error("URL has no host")]
    URLNoHost,

    #[error("{source}")]
    DomainError {
        #[from]
        source: InvalidDnsNameError,
    },

    #[error("use_tls = `{0}` argument does not match the passed URL scheme: `{1}`")]
    SchemeAgainstTlsConfig(bool, String),

    // Sign-dispatcher errors (§4.5)
    #[error("{source}")]
    JSONError {
        #[from]
        source: serde_json::Error,
    },

    // TLS configuration errors
    #[error("invalid TLS certificate/key material: {0}")]
    TlsConfigError(String),
}
