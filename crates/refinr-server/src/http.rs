// HTTP endpoint for reserving a new room ID.

use anyhow::Context;
use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use refinr_core::protocol::RoomId;
use refinr_session::gateway::Command;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResponse {
    pub room_id: RoomId,
}

/// Build the router: `POST /room/create`.
pub fn build_router(cmd_tx: mpsc::Sender<Command>, cors_origin: Option<&str>) -> anyhow::Result<Router> {
    Ok(Router::new()
        .route("/room/create", post(create_room))
        .with_state(cmd_tx)
        .layer(cors_layer(cors_origin)?))
}

fn cors_layer(origin: Option<&str>) -> anyhow::Result<CorsLayer> {
    let Some(origin) = origin else {
        return Ok(CorsLayer::permissive());
    };
    let origin = HeaderValue::from_str(origin)
        .with_context(|| format!("invalid CORS origin {origin:?}"))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any))
}

/// Ask the gateway for an unused room ID.
pub async fn create_room(
    State(cmd_tx): State<mpsc::Sender<Command>>,
    Json(request): Json<CreateRoomRequest>,
) -> Result<Json<CreateRoomResponse>, StatusCode> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let (reply, reply_rx) = oneshot::channel();
    let command = Command::CreateRoom {
        name: name.to_string(),
        reply,
    };
    if cmd_tx.send(command).await.is_err() {
        warn!("Create-room request rejected: gateway is not running");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    let room_id = reply_rx.await.map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    Ok(Json(CreateRoomResponse { room_id }))
}
