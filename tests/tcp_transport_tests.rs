//! Loopback exercises for the production TCP transport.

use device_query_rust::error::QueryError;
use device_query_rust::transport::{
    DeviceTransport, ExchangeRequest, TcpTransport, RESPONSE_BUFFER_SIZE,
};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn request<'a>(command: &'a str, port: u16) -> ExchangeRequest<'a> {
    ExchangeRequest {
        address: "127.0.0.1",
        port,
        command,
        attempt_timeout: Duration::from_secs(2),
        connect_timeout: Duration::from_secs(2),
        use_tls: false,
    }
}

/// One-shot device double: read the command, send the canned response.
async fn spawn_device(response: Vec<u8>) -> (u16, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        let mut buffer = [0u8; 256];
        let read = stream.read(&mut buffer).await.expect("read command");
        let command = String::from_utf8_lossy(&buffer[..read]).into_owned();
        stream.write_all(&response).await.expect("write response");
        stream.shutdown().await.ok();
        command
    });

    (port, handle)
}

#[tokio::test]
async fn plain_exchange_round_trips_command_and_payload() {
    let (port, device) = spawn_device(b"1.0.3".to_vec()).await;
    let transport = TcpTransport::new();

    let reply = transport
        .exchange(request("GET_FIRMWARE", port))
        .await
        .expect("exchange succeeds");
    assert_eq!(reply.payload, "1.0.3");
    assert!(!reply.tls_downgraded);

    let received = device.await.expect("device task");
    assert_eq!(received, "GET_FIRMWARE");
}

#[tokio::test]
async fn refused_connection_is_classified() {
    // grab a port with no listener behind it
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);

    let transport = TcpTransport::new();
    let result = transport.exchange(request("GET_FIRMWARE", port)).await;
    assert!(matches!(result, Err(QueryError::ConnectionRefused(_))));
}

#[tokio::test]
async fn silent_device_times_out_within_the_attempt_budget() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();

    // accept but never answer
    tokio::spawn(async move {
        let (_stream, _) = listener.accept().await.expect("accept");
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    let transport = TcpTransport::new();
    let result = transport
        .exchange(ExchangeRequest {
            attempt_timeout: Duration::from_millis(200),
            ..request("GET_FIRMWARE", port)
        })
        .await;
    assert!(matches!(result, Err(QueryError::Timeout(_))));
}

#[tokio::test]
async fn response_read_is_bounded() {
    let oversized = vec![b'A'; RESPONSE_BUFFER_SIZE + 500];
    let (port, _device) = spawn_device(oversized).await;

    let transport = TcpTransport::new();
    let reply = transport
        .exchange(request("GET_FIRMWARE", port))
        .await
        .expect("exchange succeeds");
    assert!(!reply.payload.is_empty());
    assert!(reply.payload.len() <= RESPONSE_BUFFER_SIZE);
    assert!(reply.payload.bytes().all(|b| b == b'A'));
}

#[tokio::test]
async fn probe_against_a_plain_device_reports_no_tls() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();

    // a device that accepts but does not speak TLS
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        let mut buffer = [0u8; 256];
        let _ = stream.read(&mut buffer).await;
        stream.shutdown().await.ok();
    });

    let transport = TcpTransport::new();
    let supported = transport
        .probe_tls("127.0.0.1", port, Duration::from_millis(500))
        .await;
    assert!(!supported);
}
