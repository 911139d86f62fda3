use flowsocket::config::{ClientConfig, ServerConfig, WebSocketConfig};
use flowsocket::connection::ConnectionEvent;
use flowsocket::handshake::{accept_async, accept_async_with_config, connect_async, connect_async_with_config};
use futures::StreamExt;
use tokio::net::TcpListener;

#[tokio::test]
async fn text_frame_echo_over_real_sockets() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (mut reader, writer, _protocol) = accept_async(stream, None).await.unwrap();
        while let Some(event) = reader.next().await {
            match event {
                ConnectionEvent::Text(text) => {
                    writer.send_text(&text).await.unwrap();
                }
                ConnectionEvent::Close(_, _) => break,
                _ => {}
            }
        }
    });

    let url = format!("ws://{}/", addr);
    let (mut reader, writer) = connect_async(&url).await.unwrap();

    writer.send_text("hello flowsocket").await.unwrap();
    let event = reader.next().await.expect("expected echoed frame");
    match event {
        ConnectionEvent::Text(text) => assert_eq!(text, "hello flowsocket"),
        other => panic!("unexpected event: {:?}", other),
    }

    writer.close(1000, "bye").await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn fragmented_binary_message_reassembles_exactly() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (mut reader, writer, _protocol) = accept_async(stream, None).await.unwrap();
        while let Some(event) = reader.next().await {
            match event {
                ConnectionEvent::Binary(mut stream) => {
                    let mut assembled = Vec::new();
                    while let Some(chunk) = stream.next().await {
                        assembled.extend_from_slice(&chunk);
                    }
                    let mut out = writer.begin_binary().await.unwrap();
                    out.push(&assembled).await.unwrap();
                    out.finish().await.unwrap();
                }
                ConnectionEvent::Close(_, _) => break,
                _ => {}
            }
        }
    });

    let url = format!("ws://{}/", addr);
    let mut client_config = ClientConfig::default();
    // Small enough that the 200,000-byte payload below is genuinely sent
    // across many continuation frames rather than a single final frame.
    client_config.web_socket_config.binary_fragmentation = 4096;
    let (mut reader, writer) = connect_async_with_config(&url, client_config).await.unwrap();

    let payload: Vec<u8> = (0..200_000u32).map(|n| (n % 251) as u8).collect();
    let mut out = writer.begin_binary().await.unwrap();
    for chunk in payload.chunks(4096) {
        out.push(chunk).await.unwrap();
    }
    out.finish().await.unwrap();

    let event = reader.next().await.expect("expected echoed binary message");
    let mut assembled = Vec::new();
    match event {
        ConnectionEvent::Binary(mut stream) => {
            while let Some(chunk) = stream.next().await {
                assembled.extend_from_slice(&chunk);
            }
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert_eq!(assembled, payload);

    writer.close(1000, "bye").await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn ping_is_answered_with_pong_automatically() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (mut reader, _writer, _protocol) = accept_async(stream, None).await.unwrap();
        while let Some(event) = reader.next().await {
            if matches!(event, ConnectionEvent::Close(_, _)) {
                break;
            }
        }
    });

    let url = format!("ws://{}/", addr);
    let (mut reader, writer) = connect_async(&url).await.unwrap();

    writer.send_ping(b"are you there").await.unwrap();
    let event = reader.next().await.expect("expected a pong");
    match event {
        ConnectionEvent::Pong(payload) => assert_eq!(payload, b"are you there"),
        other => panic!("unexpected event: {:?}", other),
    }

    writer.close(1000, "bye").await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn close_handshake_emits_exactly_one_close_event() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (mut reader, _writer, _protocol) = accept_async(stream, None).await.unwrap();
        let mut close_events = 0;
        while let Some(event) = reader.next().await {
            if let ConnectionEvent::Close(code, _reason) = event {
                close_events += 1;
                assert_eq!(code, 1000);
            }
        }
        assert_eq!(close_events, 1);
    });

    let url = format!("ws://{}/", addr);
    let (_reader, writer) = connect_async(&url).await.unwrap();
    writer.close(1000, "normal closure").await.unwrap();

    server.await.unwrap();
}

#[tokio::test]
async fn oversize_frame_force_closes_with_1009() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut server_config = ServerConfig::default();
    server_config.web_socket_config = Some(WebSocketConfig {
        max_buffer_length: 1024,
        binary_fragmentation: 512,
    });

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (mut reader, _writer, _protocol) =
            accept_async_with_config(stream, server_config).await.unwrap();
        let mut last_close = None;
        while let Some(event) = reader.next().await {
            if let ConnectionEvent::Close(code, _) = event {
                last_close = Some(code);
            }
        }
        last_close
    });

    let url = format!("ws://{}/", addr);
    let (mut reader, writer) = connect_async(&url).await.unwrap();

    // send_binary always emits a single atomic frame, well over the
    // server's 1024-byte cap.
    writer.send_binary(&vec![0u8; 4096]).await.unwrap();

    let event = reader.next().await;
    if let Some(ConnectionEvent::Close(code, _)) = event {
        assert_eq!(code, 1009);
    }

    let server_close_code = server.await.unwrap();
    assert_eq!(server_close_code, Some(1009));
}

#[tokio::test]
async fn subprotocol_negotiation_picks_first_mutual_match() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut server_config = ServerConfig::default();
    server_config.valid_protocols = Some(vec!["chat.v2".to_string(), "chat.v1".to_string()]);

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        accept_async_with_config(stream, server_config).await.unwrap()
    });

    let url = format!("ws://{}/", addr);
    let mut client_config = ClientConfig::default();
    client_config.protocols = vec!["chat.v1".to_string(), "chat.v2".to_string()];
    let (_reader, _writer) = connect_async_with_config(&url, client_config).await.unwrap();

    let (_reader, _writer, negotiated) = server.await.unwrap();
    assert_eq!(negotiated.as_deref(), Some("chat.v2"));
}
