//! Gateway: HTTP + WebSocket signaling plane.
//!
//! Single port serves HTTP and WebSocket. Clients exchange JSON event frames;
//! pairing, relay, and room cleanup live in the room manager.

mod protocol;
mod registry;
mod rooms;
mod server;

pub use protocol::{
    ClientEvent, ConnectionId, ForwardedCandidate, ForwardedSdp, IceCandidate, JoinParams,
    JoinedRoomEvent, PeerLeftEvent, ReadyEvent, RelayCandidateParams, RelaySdpParams,
    RoomFullEvent, ServerEvent,
};
pub use registry::ConnectionRegistry;
pub use rooms::{JoinOutcome, JoinedState, RoomManager};
pub use server::{run_server, GatewayState};
