//! Full-stack tests over real TCP: newline-delimited JSON in, typed
//! messages out.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpStream, TcpListener};
use tokio::time::timeout;
use tokio_util::codec::{Framed, LinesCodec};

use tandem_server::{AppContext, Gateway, ServerConfig};
use tandem_types::{ClientMessage, EditOp, ErrorKind, OpBody, PresenceDelta, RoomId, ServerMessage};

async fn start_server() -> SocketAddr {
    start_server_with(ServerConfig::for_tests()).await
}

async fn start_server_with(config: ServerConfig) -> SocketAddr {
    let ctx = AppContext::with_defaults(config);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = Gateway::new(ctx).serve(listener).await;
    });
    addr
}

struct TestClient {
    framed: Framed<TcpStream, LinesCodec>,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        Self { framed: Framed::new(stream, LinesCodec::new()) }
    }

    async fn send(&mut self, msg: &ClientMessage) {
        let line = serde_json::to_string(msg).unwrap();
        self.framed.send(line).await.unwrap();
    }

    async fn recv(&mut self) -> ServerMessage {
        let line = timeout(Duration::from_secs(5), self.framed.next())
            .await
            .expect("timed out waiting for frame")
            .expect("connection closed")
            .expect("frame error");
        serde_json::from_str(&line).expect("unparseable server message")
    }

    /// True once the server has closed the connection.
    async fn closed(&mut self) -> bool {
        matches!(
            timeout(Duration::from_secs(5), self.framed.next()).await,
            Ok(None)
        )
    }

    async fn join(addr: SocketAddr, room: &RoomId, name: &str) -> Self {
        let mut client = Self::connect(addr).await;
        client
            .send(&ClientMessage::Join {
                room: room.clone(),
                display_name: name.to_string(),
            })
            .await;
        client
    }
}

fn edit(base: u64, position: usize, text: &str) -> ClientMessage {
    ClientMessage::EditOp(EditOp {
        base_revision: base,
        position,
        body: OpBody::Insert { text: text.to_string() },
    })
}

#[tokio::test]
async fn create_join_edit_chat_over_tcp() {
    let addr = start_server().await;

    // Amy creates a room.
    let mut amy = TestClient::connect(addr).await;
    amy.send(&ClientMessage::CreateRoom { display_name: "amy".into() })
        .await;
    let room = match amy.recv().await {
        ServerMessage::RoomCreated { room } => room,
        other => panic!("expected roomCreated, got {other:?}"),
    };
    let amy_session = match amy.recv().await {
        ServerMessage::Joined { session, room: joined_room, document, revision, .. } => {
            assert_eq!(joined_room, room);
            assert_eq!(document, "");
            assert_eq!(revision, 0);
            session
        }
        other => panic!("expected joined, got {other:?}"),
    };
    assert!(matches!(amy.recv().await, ServerMessage::PresenceSnapshot { .. }));

    // Bob joins by id.
    let mut bob = TestClient::join(addr, &room, "bob").await;
    assert!(matches!(bob.recv().await, ServerMessage::Joined { .. }));
    match bob.recv().await {
        ServerMessage::PresenceSnapshot { entries } => assert_eq!(entries.len(), 2),
        other => panic!("expected snapshot, got {other:?}"),
    }
    assert!(matches!(
        amy.recv().await,
        ServerMessage::PresenceDelta { delta: PresenceDelta::Joined { .. } }
    ));

    // Amy edits; she is acked, bob gets the broadcast.
    amy.send(&edit(0, 0, "hello")).await;
    assert_eq!(amy.recv().await, ServerMessage::Ack { revision: 1 });
    match bob.recv().await {
        ServerMessage::OpBroadcast { op, revision } => {
            assert_eq!(revision, 1);
            assert_eq!(op.body, OpBody::Insert { text: "hello".into() });
        }
        other => panic!("expected opBroadcast, got {other:?}"),
    }

    // Bob builds on the new revision.
    bob.send(&edit(1, 5, "!")).await;
    assert_eq!(bob.recv().await, ServerMessage::Ack { revision: 2 });
    match amy.recv().await {
        ServerMessage::OpBroadcast { op, revision } => {
            assert_eq!(revision, 2);
            assert_eq!(op.position, 5);
        }
        other => panic!("expected opBroadcast, got {other:?}"),
    }

    // Chat reaches everyone, sender included, in posting order.
    bob.send(&ClientMessage::ChatPost { text: "nice".into() }).await;
    for client in [&mut amy, &mut bob] {
        match client.recv().await {
            ServerMessage::ChatBroadcast { message } => {
                assert_eq!(message.text, "nice");
                assert_eq!(message.display_name, "bob");
            }
            other => panic!("expected chatBroadcast, got {other:?}"),
        }
    }

    // Heartbeat.
    amy.send(&ClientMessage::Ping).await;
    assert_eq!(amy.recv().await, ServerMessage::Pong);

    // Amy leaves; bob sees a left delta; a late joiner sees the document.
    amy.send(&ClientMessage::Leave).await;
    match bob.recv().await {
        ServerMessage::PresenceDelta { delta: PresenceDelta::Left { session } } => {
            assert_eq!(session, amy_session);
        }
        other => panic!("expected left delta, got {other:?}"),
    }
    assert!(amy.closed().await);

    let mut carol = TestClient::join(addr, &room, "carol").await;
    match carol.recv().await {
        ServerMessage::Joined { document, revision, .. } => {
            assert_eq!(document, "hello!");
            assert_eq!(revision, 2);
        }
        other => panic!("expected joined, got {other:?}"),
    }
}

#[tokio::test]
async fn first_message_must_establish_a_room() {
    let addr = start_server().await;
    let mut client = TestClient::connect(addr).await;

    client.send(&ClientMessage::Ping).await;
    match client.recv().await {
        ServerMessage::Error { kind, detail } => {
            assert_eq!(kind, ErrorKind::Protocol);
            assert!(detail.contains("join"));
        }
        other => panic!("expected protocol error, got {other:?}"),
    }
    assert!(client.closed().await);
}

#[tokio::test]
async fn malformed_frame_is_an_error_but_not_a_disconnect() {
    let addr = start_server().await;
    let room = RoomId::from("resilient");
    let mut client = TestClient::join(addr, &room, "amy").await;
    assert!(matches!(client.recv().await, ServerMessage::Joined { .. }));
    assert!(matches!(client.recv().await, ServerMessage::PresenceSnapshot { .. }));

    client.framed.send("this is not json".to_string()).await.unwrap();
    match client.recv().await {
        ServerMessage::Error { kind, .. } => assert_eq!(kind, ErrorKind::Protocol),
        other => panic!("expected protocol error, got {other:?}"),
    }

    // Still in the room.
    client.send(&edit(0, 0, "x")).await;
    assert_eq!(client.recv().await, ServerMessage::Ack { revision: 1 });
}

#[tokio::test]
async fn stale_operation_closes_the_connection() {
    let addr = start_server().await;
    let room = RoomId::from("strict");
    let mut client = TestClient::join(addr, &room, "amy").await;
    assert!(matches!(client.recv().await, ServerMessage::Joined { .. }));
    assert!(matches!(client.recv().await, ServerMessage::PresenceSnapshot { .. }));

    client.send(&edit(42, 0, "x")).await;
    match client.recv().await {
        ServerMessage::Error { kind, .. } => assert_eq!(kind, ErrorKind::StaleOperation),
        other => panic!("expected stale error, got {other:?}"),
    }
    assert!(client.closed().await);
}

#[tokio::test]
async fn silent_connection_times_out_and_leaves_once() {
    let mut config = ServerConfig::for_tests();
    config.heartbeat_window = Duration::from_millis(250);
    let addr = start_server_with(config).await;
    let room = RoomId::from("quiet");

    let mut amy = TestClient::join(addr, &room, "amy").await;
    let amy_session = match amy.recv().await {
        ServerMessage::Joined { session, .. } => session,
        other => panic!("expected joined, got {other:?}"),
    };
    assert!(matches!(amy.recv().await, ServerMessage::PresenceSnapshot { .. }));
    let mut bob = TestClient::join(addr, &room, "bob").await;
    assert!(matches!(bob.recv().await, ServerMessage::Joined { .. }));
    assert!(matches!(bob.recv().await, ServerMessage::PresenceSnapshot { .. }));
    assert!(matches!(
        amy.recv().await,
        ServerMessage::PresenceDelta { delta: PresenceDelta::Joined { .. } }
    ));

    // Amy falls silent. Bob keeps his own heartbeat going and waits for
    // the server to drop her.
    loop {
        bob.send(&ClientMessage::Ping).await;
        match bob.recv().await {
            ServerMessage::Pong => tokio::time::sleep(Duration::from_millis(50)).await,
            ServerMessage::PresenceDelta { delta: PresenceDelta::Left { session } } => {
                assert_eq!(session, amy_session);
                break;
            }
            other => panic!("unexpected message while waiting: {other:?}"),
        }
    }
    assert!(amy.closed().await);

    // The release ran exactly once: everything bob sees up to his next
    // pong is heartbeat traffic, never a second left delta.
    bob.send(&ClientMessage::Ping).await;
    match bob.recv().await {
        ServerMessage::Pong => {}
        other => panic!("expected pong, got {other:?}"),
    }
}

#[tokio::test]
async fn execute_request_runs_the_document() {
    let addr = start_server().await;
    let room = RoomId::from("runner");
    let mut client = TestClient::join(addr, &room, "amy").await;
    assert!(matches!(client.recv().await, ServerMessage::Joined { .. }));
    assert!(matches!(client.recv().await, ServerMessage::PresenceSnapshot { .. }));

    client.send(&edit(0, 0, "echo from-the-room")).await;
    assert_eq!(client.recv().await, ServerMessage::Ack { revision: 1 });

    client
        .send(&ClientMessage::ExecuteRequest { language: "sh".into(), stdin: String::new() })
        .await;
    match client.recv().await {
        ServerMessage::ExecutionResult { stdout, exit_code, .. } => {
            assert_eq!(stdout, "from-the-room\n");
            assert_eq!(exit_code, 0);
        }
        other => panic!("expected executionResult, got {other:?}"),
    }
}
