use flowsocket::config::ClientConfig;
use flowsocket::connection::ConnectionEvent;
use flowsocket::handshake::connect_async_with_config;
use futures::StreamExt;
use log::*;
use rand::distr::Alphanumeric;
use rand::{thread_rng, Rng};
use tokio::select;
use tokio::time::{interval, Duration};

async fn handle_connection(addr: &str) {
    let mut client_config = ClientConfig::default();
    client_config.ca_file = Some(String::from("ca.crt"));

    match connect_async_with_config(addr, client_config).await {
        Ok((mut reader, writer)) => {
            let mut ticker = interval(Duration::from_secs(5));
            let mut counter = 0;

            loop {
                select! {
                    Some(event) = reader.next() => {
                        match event {
                            ConnectionEvent::Text(text) => {
                                info!("received message: {}", text);
                                counter += 1;
                                if counter >= 3 {
                                    if writer.close(1000, "done").await.is_err() {
                                        error!("error occurred when closing connection");
                                    }
                                    break;
                                }
                            }
                            ConnectionEvent::Binary(_) | ConnectionEvent::Pong(_) => continue,
                            ConnectionEvent::Close(code, reason) => {
                                info!("server closed with code {}: {}", code, reason);
                                break;
                            }
                        }
                    }
                    _ = ticker.tick() => {
                        let random_string = generate_random_string();

                        if writer.send_text(&random_string).await.is_err() {
                            error!("failed to send message");
                            break;
                        }
                    }
                }
            }
        }
        Err(err) => error!("error when performing handshake: {}", err),
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    handle_connection("wss://localhost:9002").await;
}

fn generate_random_string() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(30)
        .map(char::from)
        .collect()
}
