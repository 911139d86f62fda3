use flowsocket::connection::ConnectionEvent;
use flowsocket::event::{Event, ID};
use flowsocket::server::start_server;
use flowsocket::split::WSWriter;
use futures::StreamExt;
use log::*;
use std::collections::HashMap;

#[tokio::main]
async fn main() {
    env_logger::init();

    let port: u16 = 8080;
    match start_server(port).await {
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
