use flowsocket::config::ServerConfig;
use flowsocket::connection::ConnectionEvent;
use flowsocket::handshake::accept_async;
use futures::StreamExt;
use log::{error, info};
use pki_types::{CertificateDer, PrivateKeyDer};
use rustls_pemfile::{certs, private_key};
use std::fs::File;
use std::io::{self, BufReader, ErrorKind};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

async fn handle_connection(_: SocketAddr, stream: TcpStream, config: ServerConfig) {
    match accept_async(stream, Some(config)).await {
        Ok((mut reader, writer, _protocol)) => {
            while let Some(event) = reader.next().await {
                let result = match event {
                    ConnectionEvent::Text(text) => writer.send_text(&text).await,
                    ConnectionEvent::Binary(_) => continue,
                    ConnectionEvent::Pong(_) => continue,
                    ConnectionEvent::Close(code, reason) => {
                        info!("client closed with code {}: {}", code, reason);
                        break;
                    }
                };
                if let Err(err) = result {
                    error!("failed to echo message: {}", err);
                    break;
                }
            }
        }
        Err(err) => error!("error when performing handshake: {}", err),
    }
}

fn load_certs(path: &Path) -> io::Result<Vec<CertificateDer<'static>>> {
    certs(&mut BufReader::new(File::open(path)?)).collect()
}

fn load_key(path: &Path) -> io::Result<PrivateKeyDer<'static>> {
    private_key(&mut BufReader::new(File::open(path)?))?
        .ok_or(io::Error::new(ErrorKind::Other, "no private key found"))
}

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let addr = String::from("127.0.0.1:9002")
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::from(io::ErrorKind::AddrNotAvailable))?;

    let certs = load_certs(Path::new("server.crt"))?;
    let key = load_key(Path::new("server.key"))?;

    let tls_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;

    let mut server_config = ServerConfig::default();
    server_config.tls_config = Some(Arc::new(tls_config));

    let listener = TcpListener::bind(&addr).await?;

    while let Ok((stream, peer)) = listener.accept().await {
        info!("peer address: {}", peer);
        tokio::spawn(handle_connection(peer, stream, server_config.clone()));
    }

    Ok(())
}
