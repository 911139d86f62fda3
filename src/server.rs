use futures::StreamExt;
use log::{error, warn};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::config::ServerConfig;
use crate::event::{generate_new_uuid, Event, EventStream};
use crate::handshake::accept_async_with_config;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// A ready-to-use WebSocket server: binds a `TcpListener`, performs the
/// handshake (optionally over TLS) on each accepted connection, and
/// emits every connect/message/disconnect/error as an [`Event`] on the
/// returned [`EventStream`].
pub struct Server {
    host: String,
    port: u16,
    config: ServerConfig,
}

impl Server {
    pub fn new(port: u16, config: Option<ServerConfig>) -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port,
            config: config.unwrap_or_default(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub async fn listen(self) -> Result<EventStream, std::io::Error> {
        let listener = TcpListener::bind(format!("{}:{}", self.host, self.port)).await?;
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let config = self.config;

        tokio::spawn(async move {
            loop {
                let uuid = generate_new_uuid();
                match listener.accept().await {
                    Ok((stream, _addr)) => {
                        let config = config.clone();
                        let tx = tx.clone();
                        tokio::spawn(async move {
                            match accept_async_with_config(stream, config).await {
                                Ok((mut reader, writer, _protocol)) => {
                                    if tx
                                        .send(Event::NewClient(uuid, writer.clone()))
                                        .await
                                        .is_err()
                                    {
                                        return;
                                    }

                                    while let Some(event) = reader.next().await {
                                        if let crate::connection::ConnectionEvent::Close(code, reason) = event {
                                            let _ = tx.send(Event::Disconnect(uuid, code, reason)).await;
                                            return;
                                        }
                                        if tx.send(Event::NewMessage(uuid, event)).await.is_err() {
                                            return;
                                        }
                                    }
                                    let _ = tx.send(Event::Disconnect(uuid, 1006, String::new())).await;
                                }
                                Err(err) => {
                                    warn!("handshake failed: {err}");
                                    let _ = tx.send(Event::Error(uuid, err)).await;
                                }
                            }
                        });
                    }
                    Err(err) => {
                        error!("accept() failed: {err}");
                    }
                }
            }
        });

        Ok(EventStream::new(rx))
    }
}

pub async fn start_server(port: u16) -> Result<EventStream, std::io::Error> {
    Server::new(port, None).listen().await
}

pub async fn start_server_with_config(
    port: u16,
    config: Option<ServerConfig>,
) -> Result<EventStream, std::io::Error> {
    Server::new(port, config).listen().await
}
