//! End-to-end signaling tests over real WebSockets: pairing, relay, capacity
//! rejection, and disconnect cleanup against a running server.

use futures_util::{SinkExt, StreamExt};
use lib::config::Config;
use lib::gateway;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

/// Boot a server on a free port and wait for the health endpoint.
async fn start_server(validate_relay_target: bool) -> u16 {
    let port = free_port();
    let mut config = Config::default();
    config.signaling.port = port;
    config.signaling.bind = "127.0.0.1".to_string();
    config.signaling.validate_relay_target = validate_relay_target;
    tokio::spawn(async move {
        let _ = gateway::run_server(config).await;
    });

    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/", port);
    for _ in 0..100 {
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return port;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("server on port {} did not become healthy within 5s", port);
}

/// Current room count as reported by the health endpoint.
async fn room_count(port: u16) -> u64 {
    let resp = reqwest::get(format!("http://127.0.0.1:{}/", port))
        .await
        .expect("health request");
    let json: Value = resp.json().await.expect("health JSON");
    json["rooms"].as_u64().expect("rooms count")
}

/// Poll the health endpoint until the room count reaches `expected` (close
/// handling is asynchronous on the server side).
async fn wait_for_room_count(port: u16, expected: u64) {
    for _ in 0..100 {
        if room_count(port).await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("room count did not reach {} within 2s", expected);
}

async fn connect(port: u16) -> Ws {
    let (ws, _) = connect_async(format!("ws://127.0.0.1:{}/ws", port))
        .await
        .expect("ws connect");
    ws
}

async fn send(ws: &mut Ws, frame: Value) {
    ws.send(Message::Text(frame.to_string())).await.expect("send frame");
}

async fn join(ws: &mut Ws, room: &str, user: &str) {
    send(ws, json!({ "event": "join", "payload": { "roomId": room, "userId": user } })).await;
}

/// Next text frame as JSON, within a timeout.
async fn next_event(ws: &mut Ws) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("connection closed")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).expect("parse event");
        }
    }
}

async fn assert_no_event(ws: &mut Ws) {
    if let Ok(msg) = tokio::time::timeout(Duration::from_millis(300), ws.next()).await {
        panic!("expected no event, got {:?}", msg);
    }
}

/// Join and return this connection's own socket id from the ack.
async fn join_and_ack(ws: &mut Ws, room: &str, user: &str, expected_existing: u64) -> String {
    join(ws, room, user).await;
    let ack = next_event(ws).await;
    assert_eq!(ack["event"], "joined-room");
    assert_eq!(ack["payload"]["roomId"], room);
    assert_eq!(ack["payload"]["userId"], user);
    assert_eq!(ack["payload"]["existingCount"], expected_existing);
    ack["payload"]["socketId"].as_str().expect("socketId").to_string()
}

#[tokio::test]
async fn two_joins_pair_with_deterministic_roles() {
    let port = start_server(false).await;

    let mut x = connect(port).await;
    let x_id = join_and_ack(&mut x, "r1", "u1", 0).await;

    let mut y = connect(port).await;
    let y_id = join_and_ack(&mut y, "r1", "u2", 1).await;

    // Second arrival initiates; the waiter answers.
    let ready_y = next_event(&mut y).await;
    assert_eq!(ready_y["event"], "ready");
    assert_eq!(ready_y["payload"]["isInitiator"], true);
    assert_eq!(ready_y["payload"]["peerSocketId"], x_id.as_str());

    let ready_x = next_event(&mut x).await;
    assert_eq!(ready_x["event"], "ready");
    assert_eq!(ready_x["payload"]["isInitiator"], false);
    assert_eq!(ready_x["payload"]["peerSocketId"], y_id.as_str());
}

#[tokio::test]
async fn offer_answer_and_candidate_are_relayed_verbatim() {
    let port = start_server(false).await;

    let mut x = connect(port).await;
    let x_id = join_and_ack(&mut x, "r1", "u1", 0).await;
    let mut y = connect(port).await;
    let y_id = join_and_ack(&mut y, "r1", "u2", 1).await;
    let _ = next_event(&mut y).await; // ready
    let _ = next_event(&mut x).await; // ready

    let sdp_offer = json!({ "type": "offer", "sdp": "v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\n" });
    send(&mut y, json!({ "event": "offer", "payload": { "sdp": sdp_offer, "to": x_id } })).await;
    let offer = next_event(&mut x).await;
    assert_eq!(offer["event"], "offer");
    assert_eq!(offer["payload"]["sdp"], sdp_offer);
    assert_eq!(offer["payload"]["from"], y_id.as_str());

    let sdp_answer = json!({ "type": "answer", "sdp": "v=0\r\n" });
    send(&mut x, json!({ "event": "answer", "payload": { "sdp": sdp_answer, "to": y_id } })).await;
    let answer = next_event(&mut y).await;
    assert_eq!(answer["event"], "answer");
    assert_eq!(answer["payload"]["sdp"], sdp_answer);
    assert_eq!(answer["payload"]["from"], x_id.as_str());

    send(
        &mut y,
        json!({
            "event": "ice-candidate",
            "payload": {
                "candidate": { "candidate": "candidate:1 1 udp 2122260223 192.0.2.1 54400 typ host", "sdpMid": "0", "sdpMLineIndex": 0 },
                "to": x_id
            }
        }),
    )
    .await;
    let candidate = next_event(&mut x).await;
    assert_eq!(candidate["event"], "ice-candidate");
    assert_eq!(candidate["payload"]["candidate"]["sdpMid"], "0");
    assert_eq!(candidate["payload"]["from"], y_id.as_str());
}

#[tokio::test]
async fn third_join_gets_room_full_and_may_retry_elsewhere() {
    let port = start_server(false).await;

    let mut x = connect(port).await;
    let _ = join_and_ack(&mut x, "r1", "u1", 0).await;
    let mut y = connect(port).await;
    let _ = join_and_ack(&mut y, "r1", "u2", 1).await;
    let _ = next_event(&mut y).await;
    let _ = next_event(&mut x).await;

    let mut z = connect(port).await;
    join(&mut z, "r1", "u3").await;
    let full = next_event(&mut z).await;
    assert_eq!(full["event"], "room-full");
    assert_eq!(full["payload"]["roomId"], "r1");

    // The pair saw nothing.
    assert_no_event(&mut x).await;
    assert_no_event(&mut y).await;

    // The rejected connection can retry with a different room id.
    let _ = join_and_ack(&mut z, "r2", "u3", 0).await;
}

#[tokio::test]
async fn disconnect_notifies_peer_and_empty_rooms_are_deleted() {
    let port = start_server(false).await;

    let mut x = connect(port).await;
    let _ = join_and_ack(&mut x, "r1", "u1", 0).await;
    let mut y = connect(port).await;
    let y_id = join_and_ack(&mut y, "r1", "u2", 1).await;
    let _ = next_event(&mut y).await;
    let _ = next_event(&mut x).await;

    y.close(None).await.expect("close y");
    let left = next_event(&mut x).await;
    assert_eq!(left["event"], "peer-left");
    assert_eq!(left["payload"]["socketId"], y_id.as_str());
    assert_eq!(left["payload"]["userId"], "u2");

    // Room survives with one member; a newcomer pairs with the survivor.
    let mut w = connect(port).await;
    let _ = join_and_ack(&mut w, "r1", "u4", 1).await;
    let _ = next_event(&mut w).await; // ready
    let _ = next_event(&mut x).await; // ready

    // Dropping the last members deletes the room; a later join starts fresh.
    drop(x);
    drop(w);
    wait_for_room_count(port, 0).await;

    let mut f = connect(port).await;
    let _ = join_and_ack(&mut f, "r1", "u5", 0).await;
}

#[tokio::test]
async fn relay_to_a_disconnected_target_is_silently_dropped() {
    let port = start_server(false).await;

    let mut x = connect(port).await;
    let _ = join_and_ack(&mut x, "r1", "u1", 0).await;
    let mut y = connect(port).await;
    let y_id = join_and_ack(&mut y, "r1", "u2", 1).await;
    let _ = next_event(&mut y).await;
    let _ = next_event(&mut x).await;

    y.close(None).await.expect("close y");
    let _ = next_event(&mut x).await; // peer-left

    send(&mut x, json!({ "event": "offer", "payload": { "sdp": { "type": "offer" }, "to": y_id } })).await;
    assert_no_event(&mut x).await;
}

#[tokio::test]
async fn rejoining_switches_rooms_and_leaves_the_old_one() {
    let port = start_server(false).await;

    let mut x = connect(port).await;
    let _ = join_and_ack(&mut x, "r1", "u1", 0).await;
    let mut y = connect(port).await;
    let y_id = join_and_ack(&mut y, "r1", "u2", 1).await;
    let _ = next_event(&mut y).await;
    let _ = next_event(&mut x).await;

    // y joins a different room over the same socket: it leaves r1 first.
    let _ = join_and_ack(&mut y, "r2", "u2", 0).await;
    let left = next_event(&mut x).await;
    assert_eq!(left["event"], "peer-left");
    assert_eq!(left["payload"]["socketId"], y_id.as_str());
}

#[tokio::test]
async fn relay_target_validation_drops_cross_room_frames() {
    let port = start_server(true).await;

    let mut x = connect(port).await;
    let _ = join_and_ack(&mut x, "r1", "u1", 0).await;
    let mut y = connect(port).await;
    let y_id = join_and_ack(&mut y, "r1", "u2", 1).await;
    let _ = next_event(&mut y).await;
    let _ = next_event(&mut x).await;

    let mut z = connect(port).await;
    let z_id = join_and_ack(&mut z, "r2", "u3", 0).await;

    // Cross-room target: dropped. Co-member target: delivered.
    send(&mut x, json!({ "event": "offer", "payload": { "sdp": { "type": "offer" }, "to": z_id } })).await;
    assert_no_event(&mut z).await;

    send(&mut x, json!({ "event": "offer", "payload": { "sdp": { "type": "offer" }, "to": y_id } })).await;
    let offer = next_event(&mut y).await;
    assert_eq!(offer["event"], "offer");
}

#[tokio::test]
async fn malformed_frames_are_ignored() {
    let port = start_server(false).await;

    let mut x = connect(port).await;
    send(&mut x, json!({ "event": "join", "payload": { "roomId": "r1" } })).await; // missing userId
    ws_send_raw(&mut x, "not json").await;
    assert_no_event(&mut x).await;

    // The connection is still usable afterwards.
    let _ = join_and_ack(&mut x, "r1", "u1", 0).await;
}

async fn ws_send_raw(ws: &mut Ws, text: &str) {
    ws.send(Message::Text(text.to_string())).await.expect("send raw");
}
