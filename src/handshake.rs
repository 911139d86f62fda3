use std::sync::Arc;

use log::debug;
use pki_types::ServerName;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, WriteHalf};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tokio_rustls::{TlsAcceptor, TlsConnector, TlsStream};

use crate::config::{ClientConfig, ServerConfig};
use crate::error::Error;
use crate::request::{construct_http_request, HttpRequest};
use crate::split::{split, WSReader, WSWriter};
use crate::stream::SocketFlowStream;
use crate::utils::{generate_websocket_accept_value, generate_websocket_key};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Accepts a raw TCP connection as a WebSocket server endpoint, using
/// default tuning. See [`accept_async_with_config`] for TLS and
/// subprotocol control.
pub async fn accept_async(
    stream: TcpStream,
    server_config: Option<ServerConfig>,
) -> Result<(WSReader, WSWriter, Option<String>), Error> {
    accept_async_with_config(stream, server_config.unwrap_or_default()).await
}

pub async fn accept_async_with_config(
    stream: TcpStream,
    config: ServerConfig,
) -> Result<(WSReader, WSWriter, Option<String>), Error> {
    let socket_stream = match &config.tls_config {
        Some(tls_config) => {
            let acceptor = TlsAcceptor::from(tls_config.clone());
            let tls_stream = acceptor.accept(stream).await?;
            SocketFlowStream::Secure(TlsStream::Server(tls_stream))
        }
        None => SocketFlowStream::Plain(stream),
    };

    let ws_config = config.web_socket_config.clone().unwrap_or_default();
    let (read_half, write_half) = tokio::io::split(socket_stream);
    let mut buf_reader = BufReader::new(read_half);

    let request = match HttpRequest::parse_http_request(&mut buf_reader, ws_config.max_buffer_length).await {
        Ok(request) => request,
        Err(err) => return reject_handshake(write_half, err).await,
    };
    if let Err(err) = answer_handshake_checks(&request) {
        return reject_handshake(write_half, err).await;
    }

    let key = match request.get_header_value("sec-websocket-key") {
        Some(key) => key,
        None => return reject_handshake(write_half, Error::NoSecWebsocketKey).await,
    };
    let accept_value = generate_websocket_accept_value(key);

    let negotiated = select_protocol(&request, &config.select_protocol, &config.valid_protocols);

    let mut response = format!(
        "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {}\r\n",
        accept_value
    );
    if let Some(protocol) = &negotiated {
        response.push_str(&format!("Sec-WebSocket-Protocol: {}\r\n", protocol));
    }
    response.push_str("\r\n");

    let mut write_half = write_half;
    write_half.write_all(response.as_bytes()).await?;
    write_half.flush().await?;

    debug!("handshake accepted, negotiated protocol: {negotiated:?}");

    let stream = buf_reader.into_inner().unsplit(write_half);
    let (reader, writer) = split(stream, crate::frame::Role::Server, ws_config);
    Ok((reader, writer, negotiated))
}

/// Writes the `400 Bad Request` response spec.md §4.2/§7 require on any
/// handshake failure, then hands the original error back to the caller.
async fn reject_handshake<T>(
    mut write_half: WriteHalf<SocketFlowStream>,
    err: Error,
) -> Result<T, Error> {
    let _ = write_half.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n").await;
    let _ = write_half.flush().await;
    Err(err)
}

fn answer_handshake_checks(request: &HttpRequest) -> Result<(), Error> {
    if request.method.as_str() != "GET" {
        return Err(Error::InvalidHTTPHandshake);
    }
    request
        .get_header_value("host")
        .ok_or(Error::NoHostHeaderPresent)?;
    let connection = request
        .get_header_value("connection")
        .ok_or(Error::NoConnectionHeaderPresent)?;
    if !connection.to_lowercase().contains("upgrade") {
        return Err(Error::NoConnectionHeaderPresent);
    }
    let upgrade = request
        .get_header_value("upgrade")
        .ok_or(Error::NoUpgradeHeaderPresent)?;
    if !upgrade.eq_ignore_ascii_case("websocket") {
        return Err(Error::NoUpgradeHeaderPresent);
    }
    let version = request
        .get_header_value("sec-websocket-version")
        .ok_or(Error::InvalidWebsocketVersion)?;
    if version != "13" {
        return Err(Error::InvalidWebsocketVersion);
    }
    Ok(())
}

/// Negotiates a subprotocol per spec.md §4.4: a user-supplied
/// `select_protocol` closure takes priority; otherwise picks the first
/// protocol, in the *client's* offering order, that is also present in
/// the server's `valid_protocols` allow-list. Neither configured means
/// no subprotocol is ever negotiated, even if the client offered some.
fn select_protocol(
    request: &HttpRequest,
    select_protocol: &Option<Arc<dyn Fn(&[String]) -> Option<String> + Send + Sync>>,
    valid_protocols: &Option<Vec<String>>,
) -> Option<String> {
    let offered = request.get_header_value("sec-websocket-protocol")?;
    let offered: Vec<String> = offered.split(',').map(|p| p.trim().to_string()).collect();

    if let Some(select_protocol) = select_protocol {
        return select_protocol(&offered);
    }

    let allow_list = valid_protocols.as_ref()?;
    offered.into_iter().find(|p| allow_list.contains(p))
}

/// Opens a client connection to `ws_url` (or `wss_url`) with default
/// tuning. See [`connect_async_with_config`] for TLS CA and subprotocol
/// control.
pub async fn connect_async(ws_url: &str) -> Result<(WSReader, WSWriter), Error> {
    connect_async_with_config(ws_url, ClientConfig::default()).await
}

pub async fn connect_async_with_config(
    ws_url: &str,
    config: ClientConfig,
) -> Result<(WSReader, WSWriter), Error> {
    let key = generate_websocket_key();
    let (request, host_with_port, host, use_tls) =
        construct_http_request(ws_url, &key, &config.protocols, &config.extra_headers)?;

    let tcp = TcpStream::connect(&host_with_port).await?;

    let socket_stream = if use_tls {
        let connector = build_tls_connector(&config)?;
        let domain = ServerName::try_from(host.clone())?.to_owned();
        let tls_stream = connector.connect(domain, tcp).await?;
        SocketFlowStream::Secure(TlsStream::Client(tls_stream))
    } else {
        SocketFlowStream::Plain(tcp)
    };

    let (read_half, write_half) = tokio::io::split(socket_stream);
    let mut buf_reader = BufReader::new(read_half);
    let mut write_half = write_half;

    write_half.write_all(request.as_bytes()).await?;
    write_half.flush().await?;

    let response =
        read_http_response(&mut buf_reader, config.web_socket_config.max_buffer_length).await?;
    check_handshake(&response, &key, &config.protocols)?;

    let stream = buf_reader.into_inner().unsplit(write_half);
    Ok(split(stream, crate::frame::Role::Client, config.web_socket_config))
}

struct HttpResponse {
    status: u16,
    headers: std::collections::HashMap<String, String>,
}

impl HttpResponse {
    fn get_header_value(&self, key: &str) -> Option<String> {
        self.headers.get(&key.to_lowercase()).cloned()
    }
}

async fn read_http_response(
    reader: &mut BufReader<tokio::io::ReadHalf<SocketFlowStream>>,
    max_buffer_length: usize,
) -> Result<HttpResponse, Error> {
    let mut buffer: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 512];
    const DELIM: &[u8] = b"\r\n\r\n";

    let header_end = timeout(HANDSHAKE_TIMEOUT, async {
        loop {
            if let Some(pos) = buffer
                .windows(DELIM.len())
                .position(|window| window == DELIM)
            {
                return Ok(pos + DELIM.len());
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
    let mut parsed = httparse::Response::new(&mut header_storage);
    let status = parsed.parse(&buffer[..header_end])?;
    if status.is_partial() {
        return Err(Error::IncompleteHTTPRequest);
    }

    let status_code = parsed.code.ok_or(Error::InvalidHTTPStatusLine)?;
    let mut headers = std::collections::HashMap::new();
    for header in parsed.headers.iter() {
        headers.insert(
            header.name.to_lowercase(),
            String::from_utf8_lossy(header.value).trim().to_string(),
        );
    }

    Ok(HttpResponse {
        status: status_code,
        headers,
    })
}

fn check_handshake(response: &HttpResponse, key: &str, offered: &[String]) -> Result<(), Error> {
    if response.status != 101 {
        return Err(Error::NoUpgrade);
    }
    let upgrade = response
        .get_header_value("upgrade")
        .ok_or(Error::NoUpgradeHeaderPresent)?;
    if !upgrade.eq_ignore_ascii_case("websocket") {
        return Err(Error::NoUpgradeHeaderPresent);
    }
    let connection = response
        .get_header_value("connection")
        .ok_or(Error::NoConnectionHeaderPresent)?;
    if !connection.to_lowercase().contains("upgrade") {
        return Err(Error::NoConnectionHeaderPresent);
    }

    let expected_accept = generate_websocket_accept_value(key.to_string());
    let actual_accept = response
        .get_header_value("sec-websocket-accept")
        .ok_or(Error::InvalidAcceptKey)?;
    if actual_accept != expected_accept {
        return Err(Error::InvalidAcceptKey);
    }

    if let Some(negotiated) = response.get_header_value("sec-websocket-protocol") {
        if !offered.iter().any(|p| p == &negotiated) {
            return Err(Error::InvalidSubprotocol);
        }
    }

    Ok(())
}

fn build_tls_connector(config: &ClientConfig) -> Result<TlsConnector, Error> {
    let mut root_store = rustls::RootCertStore::empty();

    if let Some(ca_file) = &config.ca_file {
        let mut reader = std::io::BufReader::new(std::fs::File::open(ca_file)?);
        for cert in rustls_pemfile::certs(&mut reader) {
            root_store
                .add(cert?)
                .map_err(|err| Error::TlsConfigError(err.to_string()))?;
        }
    } else {
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(tls_config)))
}
