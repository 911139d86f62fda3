use std::collections::HashMap;

use tokio::io::{AsyncReadExt, BufReader, ReadHalf};
use tokio::time::{timeout, Duration};
use url::Url;

use crate::error::Error;
use crate::stream::SocketFlowStream;

const HTTP_REQUEST_DELIMITER: &[u8] = b"\r\n\r\n";
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Parses a `ws://`/`wss://` URL into the pieces needed to open a TCP
/// connection and build the handshake request: the request line +
/// headers, the `host:port` to dial, the bare host (for the TLS SNI
/// name) and whether TLS is required by the scheme.
pub fn construct_http_request(
    ws_url: &str,
    key: &str,
    protocols: &[String],
    extra_headers: &[(String, String)],
) -> Result<(String, String, String, bool), Error> {
    let parsed_url = Url::parse(ws_url)?;
    let mut use_tls = false;

    let http_port: u16 = match parsed_url.scheme() {
        "ws" => 80,
        "wss" => {
            use_tls = true;
            443
        }
        _ => return Err(Error::InvalidSchemeURL),
    };

    let host = parsed_url.host_str().ok_or(Error::URLNoHost)?;
    let port = parsed_url.port().unwrap_or(http_port);

    let request_host_field = match parsed_url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => String::from(host),
    };

    let host_with_port = format!("{}:{}", host, port);

    let request_path = match parsed_url.query() {
        Some(query) => format!("{}?{}", parsed_url.path(), query),
        None => parsed_url.path().to_string(),
    };

    let mut request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: Upgrade\r\nUpgrade: websocket\r\nSec-WebSocket-Key: {}\r\nSec-WebSocket-Version: 13\r\n",
        request_path,
        request_host_field,
        key,
    );

    if !protocols.is_empty() {
        request.push_str(&format!(
            "Sec-WebSocket-Protocol: {}\r\n",
            protocols.join(", ")
        ));
    }

    for (name, value) in extra_headers {
        request.push_str(&format!("{}: {}\r\n", name, value));
    }

    request.push_str("\r\n");

    Ok((request, host_with_port, String::from(host), use_tls))
}

#[derive(Debug)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
}

impl HttpRequest {
    /// Reads a full HTTP/1.1 request (request line + headers, no body
    /// expected for a WebSocket handshake) off the wire and parses it
    /// with `httparse`. Bounded by `max_buffer_length` so a client that
    /// never sends the terminating blank line can't grow the buffer
    /// without limit, and by a fixed timeout so a peer that opens a TCP
    /// connection and goes silent doesn't tie up the acceptor forever.
    pub async fn parse_http_request(
        reader: &mut BufReader<ReadHalf<SocketFlowStream>>,
        max_buffer_length: usize,
    ) -> Result<HttpRequest, Error> {
        let mut buffer: Vec<u8> = Vec::new();
        let mut chunk = [0u8; 512];

        let header_end = timeout(HANDSHAKE_TIMEOUT, async {
            loop {
                if let Some(pos) = find_subslice(&buffer, HTTP_REQUEST_DELIMITER) {
                    return Ok(pos + HTTP_REQUEST_DELIMITER.len());
                }
                if buffer.len() > max_buffer_length {
                    return Err(Error::HandshakeTooLarge);
                }
                let n = reader.read(&mut chunk).await?;
                if n == 0 {
                    return Err(Error::IncompleteHTTPRequest);
                }
                buffer.extend_from_slice(&chunk[..n]);
            }
        })
        .await??;

        let mut header_storage = [httparse::EMPTY_HEADER; 64];
        let mut parsed = httparse::Request::new(&mut header_storage);
        let status = parsed.parse(&buffer[..header_end])?;
        if status.is_partial() {
            return Err(Error::IncompleteHTTPRequest);
        }

        let method = parsed
            .method
            .ok_or(Error::InvalidHTTPHandshake)?
            .to_string();
        let path = parsed.path.ok_or(Error::InvalidHTTPHandshake)?.to_string();

        let mut headers = HashMap::new();
        for header in parsed.headers.iter() {
            headers.insert(
                header.name.to_lowercase(),
                String::from_utf8_lossy(header.value).trim().to_string(),
            );
        }

        Ok(HttpRequest {
            method,
            path,
            headers,
        })
    }

    pub fn get_header_value(&self, key: &str) -> Option<String> {
        self.headers.get(&key.to_lowercase()).cloned()
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
