use flowsocket::connection::ConnectionEvent;
use flowsocket::handshake::accept_async;
use futures::StreamExt;
use log::*;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};

async fn handle_connection(_: SocketAddr, stream: TcpStream) {
    match accept_async(stream, None).await {
        Ok((mut reader, writer, _protocol)) => {
            while let Some(event) = reader.next().await {
                let result = match event {
                    ConnectionEvent::Text(text) => writer.send_text(&text).await,
                    ConnectionEvent::Binary(mut stream) => {
                        let mut out = match writer.begin_binary().await {
                            Ok(out) => out,
                            Err(err) => {
                                error!("could not start echo stream: {}", err);
                                break;
                            }
                        };
                        let mut failed = false;
                        while let Some(chunk) = stream.next().await {
                            if out.push(&chunk).await.is_err() {
                                failed = true;
                                break;
                            }
                        }
                        if failed {
                            continue;
                        }
                        out.finish().await
                    }
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

#[tokio::main]
async fn main() {
    env_logger::init();

    let addr = "127.0.0.1:9002";
    let listener = TcpListener::bind(&addr).await.expect("can't listen");
    info!("listening on: {}", addr);

    while let Ok((stream, _)) = listener.accept().await {
        let peer = stream
            .peer_addr()
            .expect("connected streams should have a peer address");
        info!("peer address: {}", peer);

        tokio::spawn(handle_connection(peer, stream));
    }
}
