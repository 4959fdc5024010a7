//! End-to-end BattlEye RCON scenarios against an in-process mock server.
//!
//! Each test binds a UDP socket on an ephemeral port and scripts the server
//! side of the exchange with the same codec the client uses.

#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;
use std::time::Duration;

use rcon_client::{BattlEyeClient, ClientConfig, ClientEvent, ConnectionState, RconError};
use rcon_proto::battleye::{self, Payload};
use tokio::net::UdpSocket;
use tokio::time::timeout;

/// Receive the login datagram, verify the password, reply with `result`.
async fn serve_login(server: &UdpSocket, expected_password: &[u8], result: u8) -> SocketAddr {
    let mut buf = [0u8; 1024];
    let (len, peer) = server.recv_from(&mut buf).await.unwrap();

    let payload = battleye::parse(&buf[..len]).unwrap();
    assert_eq!(payload[0], battleye::LOGIN);
    assert_eq!(&payload[1..], expected_password);

    let reply = battleye::build(&[battleye::LOGIN, result]);
    server.send_to(&reply, peer).await.unwrap();
    peer
}

fn test_config(port: u16) -> ClientConfig {
    ClientConfig::battleye("127.0.0.1", "testpassword")
        .with_port(port)
        .with_connect_timeout(Duration::from_secs(2))
}

#[tokio::test]
async fn happy_path_executes_with_sequence_zero() {
    let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = server.local_addr().unwrap().port();

    let server_task = tokio::spawn(async move {
        let peer = serve_login(&server, b"testpassword", battleye::LOGIN_OK).await;

        let mut buf = [0u8; 1024];
        let (len, from) = server.recv_from(&mut buf).await.unwrap();
        assert_eq!(from, peer);

        let payload = battleye::parse(&buf[..len]).unwrap();
        match Payload::parse(payload).unwrap() {
            Payload::Command { seq, body } => {
                assert_eq!(seq, 0);
                assert_eq!(body, b"players");
                let reply = battleye::build(&battleye::command_payload(seq, b"0 players"));
                server.send_to(&reply, peer).await.unwrap();
            },
            other => unreachable!("expected command, got {other:?}"),
        }
    });

    let client = BattlEyeClient::new(test_config(port));
    client.connect().await.unwrap();
    assert!(client.is_authenticated());

    let response = client.execute("players").await.unwrap();
    assert_eq!(response, "0 players");

    client.disconnect().await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(client.pending_requests(), 0);

    server_task.await.unwrap();
}

#[tokio::test]
async fn wrong_password_is_rejected_without_retry() {
    let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = server.local_addr().unwrap().port();

    let server_task = tokio::spawn(async move {
        serve_login(&server, b"testpassword", 0x00).await;

        // No second login may arrive.
        let mut buf = [0u8; 1024];
        let extra = timeout(Duration::from_millis(300), server.recv_from(&mut buf)).await;
        assert!(extra.is_err(), "client attempted a login retry");
    });

    let client = BattlEyeClient::new(test_config(port));
    let err = client.connect().await.unwrap_err();
    assert_eq!(err, RconError::AuthFailed);
    assert_eq!(client.state(), ConnectionState::Disconnected);

    server_task.await.unwrap();
}

#[tokio::test]
async fn server_message_is_acknowledged_and_delivered() {
    let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = server.local_addr().unwrap().port();

    let server_task = tokio::spawn(async move {
        let peer = serve_login(&server, b"testpassword", battleye::LOGIN_OK).await;

        let mut payload = vec![battleye::SERVER_MESSAGE, 42];
        payload.extend_from_slice(b"player connected");
        server.send_to(&battleye::build(&payload), peer).await.unwrap();

        // The ack must come back on the wire: {0x02, 42}.
        let mut buf = [0u8; 1024];
        let (len, from) = server.recv_from(&mut buf).await.unwrap();
        assert_eq!(from, peer);
        let ack = battleye::parse(&buf[..len]).unwrap();
        assert_eq!(ack, [battleye::SERVER_MESSAGE, 42].as_slice());
    });

    let client = BattlEyeClient::new(test_config(port));
    let mut events = client.subscribe();
    client.connect().await.unwrap();

    let deadline = Duration::from_secs(2);
    let text = loop {
        match timeout(deadline, events.recv()).await.unwrap().unwrap() {
            ClientEvent::ServerMessage(text) => break text,
            _ => {},
        }
    };
    assert_eq!(text, "player connected");

    server_task.await.unwrap();
    client.disconnect().await;
}

#[tokio::test]
async fn segmented_response_is_reassembled() {
    let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = server.local_addr().unwrap().port();

    let server_task = tokio::spawn(async move {
        let peer = serve_login(&server, b"testpassword", battleye::LOGIN_OK).await;

        let mut buf = [0u8; 1024];
        let (len, _) = server.recv_from(&mut buf).await.unwrap();
        let payload = battleye::parse(&buf[..len]).unwrap();
        let seq = match Payload::parse(payload).unwrap() {
            Payload::Command { seq, body } => {
                assert_eq!(body, b"admins");
                seq
            },
            other => unreachable!("expected command, got {other:?}"),
        };

        // A response split across two datagrams.
        for (index, piece) in [(0u8, b"admin one\n".as_slice()), (1u8, b"admin two".as_slice())] {
            let reply = battleye::build(&battleye::command_part_payload(seq, 2, index, piece));
            server.send_to(&reply, peer).await.unwrap();
        }
    });

    let client = BattlEyeClient::new(test_config(port));
    client.connect().await.unwrap();

    let response = client.execute("admins").await.unwrap();
    assert_eq!(response, "admin one\nadmin two");

    client.disconnect().await;
    server_task.await.unwrap();
}

#[tokio::test]
async fn execute_without_connect_never_touches_the_transport() {
    let client = BattlEyeClient::new(test_config(1));

    let err = client.execute("players").await.unwrap_err();
    assert_eq!(err, RconError::NotAuthenticated { state: ConnectionState::Disconnected });
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn unanswered_command_times_out_and_clears_its_slot() {
    let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = server.local_addr().unwrap().port();

    let server_task = tokio::spawn(async move {
        serve_login(&server, b"testpassword", battleye::LOGIN_OK).await;

        // Swallow the command.
        let mut buf = [0u8; 1024];
        let _ = server.recv_from(&mut buf).await;
    });

    let config = ClientConfig::battleye("127.0.0.1", "testpassword")
        .with_port(port)
        .with_connect_timeout(Duration::from_millis(200));
    let client = BattlEyeClient::new(config);
    client.connect().await.unwrap();

    let err = client.execute("players").await.unwrap_err();
    assert!(matches!(err, RconError::Timeout { .. }), "expected timeout, got {err:?}");
    assert_eq!(client.pending_requests(), 0);

    // The session itself survives a lost reply.
    assert!(client.is_authenticated());

    client.disconnect().await;
    server_task.abort();
}

#[tokio::test]
async fn silent_server_times_out_authentication() {
    let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = server.local_addr().unwrap().port();

    let config = ClientConfig::battleye("127.0.0.1", "testpassword")
        .with_port(port)
        .with_connect_timeout(Duration::from_millis(200));
    let client = BattlEyeClient::new(config);

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, RconError::Timeout { .. }), "expected timeout, got {err:?}");
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn responses_resolve_their_own_waiters() {
    let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = server.local_addr().unwrap().port();

    let server_task = tokio::spawn(async move {
        let peer = serve_login(&server, b"testpassword", battleye::LOGIN_OK).await;

        // Collect two commands, then answer them in reverse order.
        let mut requests = Vec::new();
        let mut buf = [0u8; 1024];
        for _ in 0..2 {
            let (len, _) = server.recv_from(&mut buf).await.unwrap();
            let payload = battleye::parse(&buf[..len]).unwrap();
            match Payload::parse(payload).unwrap() {
                Payload::Command { seq, body } => requests.push((seq, body.to_vec())),
                other => unreachable!("expected command, got {other:?}"),
            }
        }

        for (seq, body) in requests.into_iter().rev() {
            let mut reply = b"echo: ".to_vec();
            reply.extend_from_slice(&body);
            server.send_to(&battleye::build(&battleye::command_payload(seq, &reply)), peer)
                .await
                .unwrap();
        }
    });

    let client = std::sync::Arc::new(BattlEyeClient::new(test_config(port)));
    client.connect().await.unwrap();

    let first = {
        let client = std::sync::Arc::clone(&client);
        tokio::spawn(async move { client.execute("alpha").await })
    };
    let second = {
        let client = std::sync::Arc::clone(&client);
        tokio::spawn(async move { client.execute("bravo").await })
    };

    // Replies arrived in reverse order; each must still reach its own waiter.
    assert_eq!(first.await.unwrap().unwrap(), "echo: alpha");
    assert_eq!(second.await.unwrap().unwrap(), "echo: bravo");

    client.disconnect().await;
    server_task.await.unwrap();
}
