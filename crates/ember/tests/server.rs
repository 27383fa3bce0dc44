//! End-to-end tests: real server, real WebSocket clients.
//!
//! Each test starts a server on an OS-assigned loopback port and drives it
//! with `tokio-tungstenite` clients speaking the binary frame format.

use std::time::Duration;

use ember::prelude::*;
use ember::protocol::{
    FORMAT_VERSION, HandshakeAck, disconnect_frame, id_frame, npc_frame, read_list, read_npc,
};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

const WAIT: Duration = Duration::from_secs(3);

fn test_config() -> ServerConfig {
    ServerConfig::default()
        .port(0)
        .shutdown_grace(Duration::from_secs(1))
}

async fn start_server() -> Server {
    Server::start(test_config())
        .await
        .expect("server should start")
}

async fn connect(server: &Server) -> ClientWs {
    let url = format!("ws://{}/game", server.local_addr());
    let (ws, _) = tokio_tungstenite::connect_async(url)
        .await
        .expect("should connect");
    ws
}

async fn send(ws: &mut ClientWs, frame: bytes::Bytes) {
    ws.send(Message::Binary(frame.to_vec().into()))
        .await
        .expect("send should succeed");
}

/// Returns the next binary frame, skipping control frames.
async fn recv_frame(ws: &mut ClientWs) -> Frame {
    loop {
        let msg = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Binary(data) = msg {
            return Frame::decode(&data).expect("server frames are valid");
        }
    }
}

/// Waits until the server closes the connection.
async fn expect_closed(ws: &mut ClientWs) {
    loop {
        match tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for close")
        {
            None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
            Some(Ok(_)) => continue,
        }
    }
}

/// Connects and completes the handshake.
async fn join(server: &Server) -> (ClientWs, HandshakeAck) {
    let mut ws = connect(server).await;
    send(&mut ws, Frame::empty(MessageTag::HANDSHAKE)).await;
    let frame = recv_frame(&mut ws).await;
    assert_eq!(frame.tag, MessageTag::HANDSHAKE_ACK);
    let ack = HandshakeAck::read(&mut frame.body_cursor()).expect("valid ack");
    (ws, ack)
}

fn goblin() -> Npc {
    let limits = GameLimits::default();
    Npc {
        name: "Goblin".into(),
        sprite: Some("goblin.png".into()),
        level: 3,
        max_vitals: vec![50, 0],
        spells: vec![ObjectId(2)],
        ..Npc::new(&limits)
    }
}

fn named(name: &str) -> Npc {
    Npc {
        name: name.into(),
        ..Npc::new(&GameLimits::default())
    }
}

fn codec() -> NpcCodec {
    NpcCodec::new(GameLimits::default())
}

async fn save(ws: &mut ClientWs, id: u32, npc: &Npc) {
    let frame = npc_frame(MessageTag::NPC_SAVE, &codec(), ObjectId(id), npc).unwrap();
    send(ws, frame).await;
}

async fn wait_for_live(server: &Server, expected: usize) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while server.context().sessions().len() != expected {
        assert!(
            tokio::time::Instant::now() < deadline,
            "live sessions stuck at {}",
            server.context().sessions().len()
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_handshake_ack_carries_limits() {
    let server = start_server().await;
    let (_ws, ack) = join(&server).await;

    assert!(ack.session_id > 0);
    assert_eq!(ack.limits, GameLimits::default());
    wait_for_live(&server, 1).await;

    server.stop().await;
}

#[tokio::test]
async fn test_save_is_broadcast_to_every_client() {
    let server = start_server().await;
    let (mut editor, _) = join(&server).await;
    let (mut viewer, _) = join(&server).await;

    save(&mut editor, 1, &goblin()).await;

    for ws in [&mut editor, &mut viewer] {
        let frame = recv_frame(ws).await;
        assert_eq!(frame.tag, MessageTag::NPC_DATA);
        let (id, npc) = read_npc(&codec(), &mut frame.body_cursor()).unwrap();
        assert_eq!(id, ObjectId(1));
        assert_eq!(npc, goblin());
    }

    let npcs = server.context().npcs();
    assert_eq!(npcs.list_names(), ["Goblin"]);
    assert_eq!(npcs.get(ObjectId(1)).unwrap(), goblin());

    server.stop().await;
}

#[tokio::test]
async fn test_list_follows_insertion_order() {
    let server = start_server().await;
    let (mut ws, _) = join(&server).await;

    for (id, name) in [(30, "Wolf"), (10, "Bear"), (20, "Boar")] {
        save(&mut ws, id, &named(name)).await;
        assert_eq!(recv_frame(&mut ws).await.tag, MessageTag::NPC_DATA);
    }
    // Re-saving keeps the original position.
    save(&mut ws, 30, &named("Dire Wolf")).await;
    assert_eq!(recv_frame(&mut ws).await.tag, MessageTag::NPC_DATA);

    send(&mut ws, Frame::empty(MessageTag::NPC_LIST_REQUEST)).await;
    let frame = recv_frame(&mut ws).await;
    assert_eq!(frame.tag, MessageTag::NPC_LIST);
    let rows = read_list(&mut frame.body_cursor()).unwrap();
    let names: Vec<_> = rows.iter().map(|row| row.name.as_str()).collect();
    assert_eq!(names, ["Dire Wolf", "Bear", "Boar"]);
    let ids: Vec<_> = rows.iter().map(|row| row.id).collect();
    assert_eq!(ids, [ObjectId(30), ObjectId(10), ObjectId(20)]);

    server.stop().await;
}

#[tokio::test]
async fn test_request_existing_and_missing() {
    let server = start_server().await;
    let (mut ws, _) = join(&server).await;
    save(&mut ws, 5, &goblin()).await;
    recv_frame(&mut ws).await;

    send(&mut ws, id_frame(MessageTag::NPC_REQUEST, ObjectId(5)).unwrap()).await;
    let frame = recv_frame(&mut ws).await;
    assert_eq!(frame.tag, MessageTag::NPC_DATA);
    assert_eq!(
        read_npc(&codec(), &mut frame.body_cursor()).unwrap().1,
        goblin()
    );

    send(&mut ws, id_frame(MessageTag::NPC_REQUEST, ObjectId(6)).unwrap()).await;
    let frame = recv_frame(&mut ws).await;
    assert_eq!(frame.tag, MessageTag::ERROR);
    let reply = ErrorReply::read(&mut frame.body_cursor()).unwrap();
    assert_eq!(reply.code, ErrorReply::NOT_FOUND);

    server.stop().await;
}

#[tokio::test]
async fn test_delete_is_broadcast() {
    let server = start_server().await;
    let (mut editor, _) = join(&server).await;
    let (mut viewer, _) = join(&server).await;

    save(&mut editor, 1, &goblin()).await;
    recv_frame(&mut editor).await;
    recv_frame(&mut viewer).await;

    send(&mut editor, id_frame(MessageTag::NPC_DELETE, ObjectId(1)).unwrap()).await;
    for ws in [&mut editor, &mut viewer] {
        let frame = recv_frame(ws).await;
        assert_eq!(frame.tag, MessageTag::NPC_REMOVED);
        assert_eq!(frame.body_cursor().read_object_id().unwrap(), ObjectId(1));
    }
    assert!(server.context().npcs().is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_version_mismatch_on_handshake_is_answered_then_closed() {
    let server = start_server().await;
    let mut ws = connect(&server).await;

    let mut bad = Frame::empty(MessageTag::HANDSHAKE).to_vec();
    bad[0] = FORMAT_VERSION + 1;
    ws.send(Message::Binary(bad.into())).await.unwrap();

    let frame = recv_frame(&mut ws).await;
    assert_eq!(frame.tag, MessageTag::ERROR);
    let reply = ErrorReply::read(&mut frame.body_cursor()).unwrap();
    assert_eq!(reply.code, ErrorReply::VERSION_MISMATCH);
    expect_closed(&mut ws).await;

    server.stop().await;
}

#[tokio::test]
async fn test_unknown_and_malformed_frames_are_dropped() {
    let server = start_server().await;
    let (mut ws, _) = join(&server).await;

    send(&mut ws, Frame::empty(MessageTag(777))).await;
    // NPC_SAVE cut off in the middle of the name.
    let full = npc_frame(MessageTag::NPC_SAVE, &codec(), ObjectId(1), &goblin()).unwrap();
    send(&mut ws, full.slice(..15)).await;
    ws.send(Message::Binary(vec![FORMAT_VERSION, 1].into()))
        .await
        .unwrap();

    // The session is still alive and nothing was stored.
    send(&mut ws, Frame::empty(MessageTag::NPC_LIST_REQUEST)).await;
    let frame = recv_frame(&mut ws).await;
    assert_eq!(frame.tag, MessageTag::NPC_LIST);
    assert!(read_list(&mut frame.body_cursor()).unwrap().is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_broadcast_survives_departed_client() {
    let server = start_server().await;
    let (mut first, _) = join(&server).await;
    let (mut leaving, _) = join(&server).await;
    let (mut last, _) = join(&server).await;

    leaving.close(None).await.unwrap();
    drop(leaving);

    save(&mut first, 1, &goblin()).await;
    assert_eq!(recv_frame(&mut first).await.tag, MessageTag::NPC_DATA);
    assert_eq!(recv_frame(&mut last).await.tag, MessageTag::NPC_DATA);
    wait_for_live(&server, 2).await;

    server.stop().await;
}

#[tokio::test]
async fn test_disconnect_message_closes_session() {
    let server = start_server().await;
    let (mut ws, _) = join(&server).await;
    wait_for_live(&server, 1).await;

    send(&mut ws, disconnect_frame("done editing").unwrap()).await;
    expect_closed(&mut ws).await;
    wait_for_live(&server, 0).await;

    server.stop().await;
}

#[tokio::test]
async fn test_wrong_path_is_rejected() {
    let server = start_server().await;
    let url = format!("ws://{}/elsewhere", server.local_addr());
    assert!(tokio_tungstenite::connect_async(url).await.is_err());
    server.stop().await;
}

#[tokio::test]
async fn test_stop_closes_clients_and_releases_port() {
    let server = start_server().await;
    let addr = server.local_addr();
    let (mut a, _) = join(&server).await;
    let (mut b, _) = join(&server).await;
    // Still handshaking when the server stops.
    let mut pending = connect(&server).await;
    wait_for_live(&server, 3).await;

    tokio::time::timeout(Duration::from_secs(5), server.stop())
        .await
        .expect("stop should be bounded");

    expect_closed(&mut a).await;
    expect_closed(&mut b).await;
    expect_closed(&mut pending).await;
    assert!(tokio::net::TcpListener::bind(addr).await.is_ok());
}

#[tokio::test]
async fn test_restored_registry_is_served() {
    let limits = GameLimits::default();
    let mut registry = EntityRegistry::new();
    registry.insert(ObjectId(7), named("Ancient Ent"));
    let server = Server::builder()
        .config(test_config().limits(limits))
        .npcs(SharedRegistry::from_registry(registry))
        .start()
        .await
        .unwrap();

    let (mut ws, _) = join(&server).await;
    send(&mut ws, Frame::empty(MessageTag::NPC_LIST_REQUEST)).await;
    let rows = read_list(&mut recv_frame(&mut ws).await.body_cursor()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "Ancient Ent");

    server.stop().await;
}
