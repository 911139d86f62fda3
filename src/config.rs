use rustls::ServerConfig as RustlsConfig;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::sync::OnceLock;

/// Default cap on a fragmented message / single-frame payload before
/// the connection is forced closed with code 1009 (spec.md §6).
pub const DEFAULT_MAX_BUFFER_LENGTH: usize = 2 * 1024 * 1024;

/// Default threshold at which an `OutStream` flushes an accumulated
/// fragment (spec.md §6).
pub const DEFAULT_BINARY_FRAGMENTATION: usize = 512 * 1024;

fn max_buffer_length_cell() -> &'static AtomicUsize {
    static CELL: OnceLock<AtomicUsize> = OnceLock::new();
    CELL.get_or_init(|| AtomicUsize::new(DEFAULT_MAX_BUFFER_LENGTH))
}

fn binary_fragmentation_cell() -> &'static AtomicUsize {
    static CELL: OnceLock<AtomicUsize> = OnceLock::new();
    CELL.get_or_init(|| AtomicUsize::new(DEFAULT_BINARY_FRAGMENTATION))
}

/// Process-wide tuning of the receive-buffer cap, mirroring the
/// teacher's static-field tunables while `WebSocketConfig::default()`
/// remains the source of truth each new connection reads from.
pub fn set_max_buffer_length(bytes: usize) {
    max_buffer_length_cell().store(bytes, Ordering::Relaxed);
}

/// Process-wide tuning of the `OutStream` fragmentation threshold.
pub fn set_binary_fragmentation(bytes: usize) {
    binary_fragmentation_cell().store(bytes, Ordering::Relaxed);
}

#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Cap on a single frame's payload length and on the running total
    /// of a fragmented message's assembled bytes (spec.md I5).
    pub max_buffer_length: usize,
    /// Byte threshold at which an `OutStream` flushes a fragment
    /// (spec.md §4.3).
    pub binary_fragmentation: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        WebSocketConfig {
            max_buffer_length: max_buffer_length_cell().load(Ordering::Relaxed),
            binary_fragmentation: binary_fragmentation_cell().load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Default)]
pub struct ServerConfig {
    pub web_socket_config: Option<WebSocketConfig>,
    pub tls_config: Option<Arc<RustlsConfig>>,
    /// Subprotocols the server is willing to negotiate, in preference
    /// order. Used by the default selector when no `select_protocol`
    /// closure is supplied (spec.md §4.4).
    pub valid_protocols: Option<Vec<String>>,
    /// User-supplied subprotocol selector: given the client's offered
    /// subprotocols in its preference order, returns the chosen one, or
    /// `None` to negotiate none. Takes priority over `valid_protocols`
    /// when set (spec.md §4.4).
    pub select_protocol: Option<Arc<dyn Fn(&[String]) -> Option<String> + Send + Sync>>,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("web_socket_config", &self.web_socket_config)
            .field("tls_config", &self.tls_config)
            .field("valid_protocols", &self.valid_protocols)
            .field("select_protocol", &self.select_protocol.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub web_socket_config: WebSocketConfig,
    pub ca_file: Option<String>,
    /// Subprotocols offered to the server, in preference order
    /// (spec.md §3, `protocols`).
    pub protocols: Vec<String>,
    /// Headers appended verbatim to the handshake request
    /// (spec.md §3, `extraHeaders`).
    pub extra_headers: Vec<(String, String)>,
}
