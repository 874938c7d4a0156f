// Fan-out of server messages to room subscribers.
//
// Delivery is fire-and-forget: a closed connection just fails its own send.
// Cleaning it up is the disconnect path's job.

use refinr_core::protocol::{ConnectionId, ServerMessage};
use tracing::{debug, error};

use crate::registry::ConnectionRegistry;
use crate::RoomUpdate;

fn encode(message: &ServerMessage) -> Option<String> {
    match message.to_json() {
        Ok(json) => Some(json),
        Err(e) => {
            error!("Failed to serialize {message:?}: {e}");
            None
        }
    }
}

/// Deliver every message of `update` to every subscriber of its room.
/// Returns the number of frames handed to live connections.
pub fn broadcast(registry: &ConnectionRegistry, update: &RoomUpdate) -> usize {
    let frames: Vec<String> = update.messages.iter().filter_map(encode).collect();
    if frames.is_empty() {
        return 0;
    }

    let mut delivered = 0;
    for (conn_id, outbound) in registry.subscribers(&update.room_id) {
        for frame in &frames {
            if outbound.send(frame.clone()).is_err() {
                debug!("Client {conn_id} is gone, skipping broadcast to room {}", update.room_id);
                break;
            }
            delivered += 1;
        }
    }
    delivered
}

/// Send one message to a single connection.
pub fn send_to(registry: &ConnectionRegistry, conn_id: &ConnectionId, message: &ServerMessage) -> bool {
    let Some(outbound) = registry.outbound(conn_id) else {
        return false;
    };
    let Some(frame) = encode(message) else {
        return false;
    };
    outbound.send(frame).is_ok()
}
