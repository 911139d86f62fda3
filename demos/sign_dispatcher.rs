use flowsocket::connection::ConnectionEvent;
use flowsocket::handshake::accept_async;
use flowsocket::sign::SignDispatcher;
use futures::StreamExt;
use log::*;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

async fn handle_connection(_: SocketAddr, stream: TcpStream, dispatcher: Arc<SignDispatcher>) {
    match accept_async(stream, None).await {
        Ok((mut reader, writer, _protocol)) => {
            while let Some(event) = reader.next().await {
                match event {
                    ConnectionEvent::Text(text) => dispatcher.dispatch(&text, &writer).await,
                    ConnectionEvent::Binary(_) | ConnectionEvent::Pong(_) => continue,
                    ConnectionEvent::Close(code, reason) => {
                        info!("client closed with code {}: {}", code, reason);
                        break;
                    }
                }
            }
        }
        Err(err) => error!("error when performing handshake: {}", err),
    }
}

fn build_dispatcher() -> SignDispatcher {
    SignDispatcher::new()
        .sign("ping", |_data, writer, _next| async move {
            if let Err(err) = writer.send_sign("pong", json!({})).await {
                error!("failed to answer ping: {}", err);
            }
        })
        .sign("echo", |data, writer, _next| async move {
            if let Err(err) = writer.send_sign("echo", data).await {
                error!("failed to echo envelope: {}", err);
            }
        })
        .sign("unknow", |data, _writer, _next| async move {
            warn!("no handler registered for inbound tag, data: {}", data);
        })
        .sign("noJSON", |_data, _writer, _next| async move {
            warn!("received a text frame that wasn't a sign envelope");
        })
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let dispatcher = Arc::new(build_dispatcher());

    let addr = "127.0.0.1:9002";
    let listener = TcpListener::bind(&addr).await.expect("can't listen");
    info!("listening on: {}", addr);

    while let Ok((stream, _)) = listener.accept().await {
        let peer = stream
            .peer_addr()
            .expect("connected streams should have a peer address");
        info!("peer address: {}", peer);

        tokio::spawn(handle_connection(peer, stream, dispatcher.clone()));
    }
}
