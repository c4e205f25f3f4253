//! Signaling wire protocol types (join, offer, answer, ice-candidate, etc.).
//!
//! Frames are JSON text: `{ "event": "<name>", "payload": { ... } }`.
//! Session descriptions and candidates are opaque to the server and relayed verbatim.

use serde::{Deserialize, Serialize};

/// Unique connection identifier (opaque string, assigned at accept).
pub type ConnectionId = String;

/// Inbound frame (client → server).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Enter a room; the room is created on first join.
    Join(JoinParams),
    /// Relay a session offer to the peer named by `to`.
    Offer(RelaySdpParams),
    /// Relay a session answer to the peer named by `to`.
    Answer(RelaySdpParams),
    /// Relay a connectivity candidate to the peer named by `to`.
    IceCandidate(RelayCandidateParams),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinParams {
    pub room_id: String,
    /// Client-supplied label, not authenticated.
    pub user_id: String,
}

/// Offer/answer relay params: opaque sdp plus the target connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelaySdpParams {
    pub sdp: serde_json::Value,
    pub to: ConnectionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayCandidateParams {
    pub candidate: IceCandidate,
    pub to: ConnectionId,
}

/// Connectivity candidate; forwarded verbatim to the peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u32>,
}

/// Outbound frame (server → client).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Join rejected: the room already has two members.
    RoomFull(RoomFullEvent),
    /// Join acknowledgment with the caller's own connection id.
    JoinedRoom(JoinedRoomEvent),
    /// The room reached two members; exactly one recipient is the initiator.
    Ready(ReadyEvent),
    Offer(ForwardedSdp),
    Answer(ForwardedSdp),
    IceCandidate(ForwardedCandidate),
    /// The other member of the room disconnected.
    PeerLeft(PeerLeftEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomFullEvent {
    pub room_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedRoomEvent {
    pub room_id: String,
    pub user_id: String,
    pub socket_id: ConnectionId,
    /// Members already present before this join (0 or 1).
    pub existing_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyEvent {
    pub peer_socket_id: ConnectionId,
    pub is_initiator: bool,
}

/// Relayed offer/answer with the sender's connection id attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardedSdp {
    pub sdp: serde_json::Value,
    pub from: ConnectionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardedCandidate {
    pub candidate: IceCandidate,
    pub from: ConnectionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerLeftEvent {
    pub socket_id: ConnectionId,
    pub user_id: String,
}
