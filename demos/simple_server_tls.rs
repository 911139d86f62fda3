use flowsocket::config::ServerConfig;
use flowsocket::connection::ConnectionEvent;
use flowsocket::event::{Event, ID};
use flowsocket::server::start_server_with_config;
use flowsocket::split::WSWriter;
use futures::StreamExt;
use log::{error, info};
use pki_types::{CertificateDer, PrivateKeyDer};
use rustls_pemfile::{certs, private_key};
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::io::{BufReader, ErrorKind};
use std::path::Path;
use std::sync::Arc;

fn load_certs(path: &Path) -> io::Result<Vec<CertificateDer<'static>>> {
    certs(&mut BufReader::new(File::open(path)?)).collect()
}

fn load_key(path: &Path) -> io::Result<PrivateKeyDer<'static>> {
    private_key(&mut BufReader::new(File::open(path)?))?
        .ok_or(io::Error::new(ErrorKind::Other, "no private key found"))
}

async fn run_server(port: u16, config: ServerConfig) {
    match start_server_with_config(port, Some(config)).await {
        Ok(mut event_receiver) => {
            let mut clients: HashMap<ID, WSWriter> = HashMap::new();
            info!("server started on address 0.0.0.0:{}", port);
            while let Some(event) = event_receiver.next().await {
                match event {
                    Event::NewClient(id, writer) => {
                        info!("new client {} connected", id);
                        clients.insert(id, writer);
                    }
                    Event::NewMessage(client_id, ConnectionEvent::Text(text)) => {
                        info!("message from client {}: {}", client_id, text);
                        if let Some(writer) = clients.get(&client_id) {
                            let _ = writer.send_text(&text).await;
                        }
                    }
                    Event::NewMessage(client_id, _) => {
                        info!("non-text message from client {}", client_id);
                    }
                    Event::Disconnect(client_id, code, reason) => {
                        info!("client {} disconnected ({}: {})", client_id, code, reason);
                        clients.remove(&client_id);
                    }
                    Event::Error(client_id, error) => {
                        error!("error occurred for client {}: {:?}", client_id, error);
                    }
                }
            }
        }
        Err(err) => {
            eprintln!("could not start the server due to: {:?}", err);
        }
    }
}

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let certs = load_certs(Path::new("cert.pem"))?;
    let key = load_key(Path::new("key.pem"))?;

    let tls_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;

    let mut server_config = ServerConfig::default();
    server_config.tls_config = Some(Arc::new(tls_config));

    let port: u16 = 8080;

    run_server(port, server_config).await;

    Ok(())
}
