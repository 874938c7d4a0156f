// Room/session coordination core.
//
// All state is owned by a single `gateway::Gateway` that one task drives;
// the other modules are plain functions over that state.

pub mod broadcast;
pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod registry;
pub mod store;
pub mod voting;

use refinr_core::protocol::{RoomId, ServerMessage};

pub use error::SessionError;

/// Messages to deliver to every subscriber of one room, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomUpdate {
    pub room_id: RoomId,
    pub messages: Vec<ServerMessage>,
}

impl RoomUpdate {
    pub fn new(room_id: impl Into<RoomId>, messages: Vec<ServerMessage>) -> Self {
        RoomUpdate {
            room_id: room_id.into(),
            messages,
        }
    }
}
