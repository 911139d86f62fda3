use flowsocket::handshake::connect_async;
use log::*;
use rand::distr::Alphanumeric;
use rand::{thread_rng, Rng};

async fn handle_connection(addr: &str) {
    match connect_async(addr).await {
        Ok((_reader, writer)) => {
            let my_random_string = generate_random_string();
            info!("sending random string in chunks: {}", my_random_string);

            match writer.begin_binary().await {
                Ok(mut out) => {
                    for chunk in my_random_string.as_bytes().chunks(8) {
                        if out.push(chunk).await.is_err() {
                            error!("error occurred when sending data in chunks");
                            return;
                        }
                    }
                    if out.finish().await.is_err() {
                        error!("error occurred when finishing the fragmented message");
                    }
                }
                Err(err) => error!("could not start fragmented send: {}", err),
            }

            writer.close(1000, "done").await.unwrap();
        }
        Err(err) => error!("error when performing handshake: {}", err),
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    handle_connection("ws://127.0.0.1:9002").await;
}

fn generate_random_string() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(30)
        .map(char::from)
        .collect()
}
