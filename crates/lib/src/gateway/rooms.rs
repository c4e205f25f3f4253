//! Room pairing state machine: membership, roles, relay, and cleanup.
//!
//! A room is a caller-supplied id mapping to at most two member connections,
//! kept in join order. The second arrival becomes the initiator so exactly one
//! side creates the outbound offer. Rooms are created on first join and removed
//! when the last member leaves; an empty room never stays in the map.

use crate::gateway::protocol::{
    ConnectionId, JoinParams, JoinedRoomEvent, PeerLeftEvent, ReadyEvent, RoomFullEvent,
    ServerEvent,
};
use crate::gateway::registry::ConnectionRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Room/user association recorded on a connection after a successful join.
/// Owned by the connection's socket task; read back at disconnect time.
#[derive(Debug, Clone)]
pub struct JoinedState {
    pub room_id: String,
    pub user_id: String,
}

/// Result of a join attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Admitted; `existing` members were already present (0 or 1).
    Joined { existing: usize },
    /// Rejected: the room already had two members. No state was mutated.
    Full,
}

enum JoinDecision {
    Full,
    Joined {
        existing: usize,
        /// The already-present member when this join completed the pair.
        peer: Option<ConnectionId>,
    },
}

/// Owns the room id → member list mapping. All mutations go through one write
/// guard, so joins and disconnects apply in arrival order; nothing here ever
/// awaits delivery of a send.
pub struct RoomManager {
    rooms: Arc<RwLock<HashMap<String, Vec<ConnectionId>>>>,
    registry: Arc<ConnectionRegistry>,
    validate_relay_target: bool,
}

impl RoomManager {
    pub fn new(registry: Arc<ConnectionRegistry>, validate_relay_target: bool) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            registry,
            validate_relay_target,
        }
    }

    /// Handle a join from `conn`. Emits `room-full` or `joined-room` to the
    /// caller, and `ready` to both members when the room reaches two.
    pub async fn join(&self, conn: &ConnectionId, params: &JoinParams) -> JoinOutcome {
        let decision = {
            let mut rooms = self.rooms.write().await;
            let members = rooms.entry(params.room_id.clone()).or_default();
            if members.len() >= 2 {
                JoinDecision::Full
            } else {
                members.push(conn.clone());
                let existing = members.len() - 1;
                let peer = if members.len() == 2 {
                    Some(members[0].clone())
                } else {
                    None
                };
                JoinDecision::Joined { existing, peer }
            }
        };

        match decision {
            JoinDecision::Full => {
                log::info!("room {} is full, rejecting {}", params.room_id, conn);
                self.registry
                    .send(
                        conn,
                        ServerEvent::RoomFull(RoomFullEvent {
                            room_id: params.room_id.clone(),
                        }),
                    )
                    .await;
                JoinOutcome::Full
            }
            JoinDecision::Joined { existing, peer } => {
                log::info!(
                    "{} ({}) joined room {} ({} already present)",
                    params.user_id,
                    conn,
                    params.room_id,
                    existing
                );
                self.registry
                    .send(
                        conn,
                        ServerEvent::JoinedRoom(JoinedRoomEvent {
                            room_id: params.room_id.clone(),
                            user_id: params.user_id.clone(),
                            socket_id: conn.clone(),
                            existing_count: existing,
                        }),
                    )
                    .await;

                if let Some(receiver) = peer {
                    // Second arrival initiates; the waiting member answers.
                    log::info!(
                        "room {} ready, initiator: {}, receiver: {}",
                        params.room_id,
                        conn,
                        receiver
                    );
                    self.registry
                        .send(
                            conn,
                            ServerEvent::Ready(ReadyEvent {
                                peer_socket_id: receiver.clone(),
                                is_initiator: true,
                            }),
                        )
                        .await;
                    self.registry
                        .send(
                            &receiver,
                            ServerEvent::Ready(ReadyEvent {
                                peer_socket_id: conn.clone(),
                                is_initiator: false,
                            }),
                        )
                        .await;
                }
                JoinOutcome::Joined { existing }
            }
        }
    }

    /// Forward a relayed event to `to`. When relay-target validation is
    /// enabled, the target must be a current co-member of the sender's room;
    /// otherwise the frame is dropped with a debug log. A target that no
    /// longer exists is silently ignored either way.
    pub async fn relay(
        &self,
        from: &ConnectionId,
        sender_room: Option<&str>,
        to: &ConnectionId,
        event: ServerEvent,
    ) {
        if self.validate_relay_target {
            let co_member = match sender_room {
                Some(room) => {
                    let rooms = self.rooms.read().await;
                    rooms.get(room).map_or(false, |m| m.iter().any(|id| id == to))
                }
                None => false,
            };
            if !co_member {
                log::debug!("dropping relay from {} to {}: not a co-member", from, to);
                return;
            }
        }
        self.registry.send(to, event).await;
    }

    /// Handle the close of a joined connection: remove it from its room,
    /// notify the remaining member, and drop the room once empty. A connection
    /// that never joined has no room state and needs no call here.
    pub async fn disconnect(&self, conn: &ConnectionId, joined: &JoinedState) {
        let remaining = {
            let mut rooms = self.rooms.write().await;
            let Some(members) = rooms.get_mut(&joined.room_id) else {
                return;
            };
            members.retain(|id| id != conn);
            if members.is_empty() {
                rooms.remove(&joined.room_id);
                log::info!("room {} removed", joined.room_id);
                Vec::new()
            } else {
                members.clone()
            }
        };
        for peer in remaining {
            self.registry
                .send(
                    &peer,
                    ServerEvent::PeerLeft(PeerLeftEvent {
                        socket_id: conn.clone(),
                        user_id: joined.user_id.clone(),
                    }),
                )
                .await;
        }
    }

    /// Number of rooms with at least one member.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}
