//! Gateway HTTP + WebSocket server (single port).

use crate::config::Config;
use crate::gateway::protocol::{
    ClientEvent, ConnectionId, ForwardedCandidate, ForwardedSdp, ServerEvent,
};
use crate::gateway::registry::ConnectionRegistry;
use crate::gateway::rooms::{JoinOutcome, JoinedState, RoomManager};
use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;

/// Shared state for the gateway (connection registry and room manager).
#[derive(Clone)]
pub struct GatewayState {
    pub registry: Arc<ConnectionRegistry>,
    pub rooms: Arc<RoomManager>,
}

/// Run the signaling server; binds to config.signaling.bind:config.signaling.port.
/// Blocks until shutdown (e.g. Ctrl+C).
pub async fn run_server(config: Config) -> Result<()> {
    let registry = Arc::new(ConnectionRegistry::new());
    let rooms = Arc::new(RoomManager::new(
        registry.clone(),
        config.signaling.validate_relay_target,
    ));
    let state = GatewayState { registry, rooms };

    let app = Router::new()
        .route("/", get(health_http))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let bind_addr = format!("{}:{}", config.signaling.bind.trim(), config.signaling.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("signaling server listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("signaling server exited")?;
    log::info!("signaling server stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received");
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "rooms": state.rooms.room_count().await,
    }))
}

/// GET /ws upgrades to WebSocket; every frame after that is a signaling event.
async fn ws_handler(State(state): State<GatewayState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: GatewayState) {
    let conn_id: ConnectionId = uuid::Uuid::new_v4().to_string();
    let (tx, mut rx) = mpsc::unbounded_channel();
    state.registry.register(conn_id.clone(), tx).await;
    log::info!("socket connected: {}", conn_id);

    // Room/user association for this connection; set by a successful join and
    // read back at close time to locate the room to clean up.
    let mut joined: Option<JoinedState> = None;

    loop {
        tokio::select! {
            out = rx.recv() => {
                let Some(event) = out else { break };
                let Ok(text) = serde_json::to_string(&event) else { continue };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                let Message::Text(text) = msg else { continue };
                let Ok(event) = serde_json::from_str::<ClientEvent>(&text) else {
                    log::debug!("ignoring malformed frame from {}", conn_id);
                    continue;
                };
                dispatch_event(&state, &conn_id, &mut joined, event).await;
            }
        }
    }

    state.registry.unregister(&conn_id).await;
    if let Some(ref j) = joined {
        state.rooms.disconnect(&conn_id, j).await;
    }
    log::info!(
        "socket disconnected: {} ({})",
        conn_id,
        joined.as_ref().map(|j| j.user_id.as_str()).unwrap_or("no-user")
    );
}

/// Route one inbound event to the room manager. A join from an already-joined
/// connection switches rooms: the previous room is left (with a peer-left to
/// any remaining member) before the new join is applied.
async fn dispatch_event(
    state: &GatewayState,
    conn_id: &ConnectionId,
    joined: &mut Option<JoinedState>,
    event: ClientEvent,
) {
    match event {
        ClientEvent::Join(params) => {
            if let Some(prev) = joined.take() {
                state.rooms.disconnect(conn_id, &prev).await;
            }
            if let JoinOutcome::Joined { .. } = state.rooms.join(conn_id, &params).await {
                *joined = Some(JoinedState {
                    room_id: params.room_id,
                    user_id: params.user_id,
                });
            }
        }
        ClientEvent::Offer(p) => {
            log::debug!("offer from {} to {}", conn_id, p.to);
            state
                .rooms
                .relay(
                    conn_id,
                    joined.as_ref().map(|j| j.room_id.as_str()),
                    &p.to,
                    ServerEvent::Offer(ForwardedSdp {
                        sdp: p.sdp,
                        from: conn_id.clone(),
                    }),
                )
                .await;
        }
        ClientEvent::Answer(p) => {
            log::debug!("answer from {} to {}", conn_id, p.to);
            state
                .rooms
                .relay(
                    conn_id,
                    joined.as_ref().map(|j| j.room_id.as_str()),
                    &p.to,
                    ServerEvent::Answer(ForwardedSdp {
                        sdp: p.sdp,
                        from: conn_id.clone(),
                    }),
                )
                .await;
        }
        ClientEvent::IceCandidate(p) => {
            state
                .rooms
                .relay(
                    conn_id,
                    joined.as_ref().map(|j| j.room_id.as_str()),
                    &p.to,
                    ServerEvent::IceCandidate(ForwardedCandidate {
                        candidate: p.candidate,
                        from: conn_id.clone(),
                    }),
                )
                .await;
        }
    }
}
