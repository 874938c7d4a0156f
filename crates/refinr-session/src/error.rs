// Reasons a session operation is dropped.

use refinr_core::protocol::{ConnectionId, RoomId};
use thiserror::Error;

/// None of these are fatal: the gateway logs them and, unless error
/// reporting is enabled, tells nobody.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("room {room_id} not found")]
    UnknownRoom { room_id: RoomId },

    #[error("voting is not active in room {room_id}")]
    VotingClosed { room_id: RoomId },

    #[error("connection {connection_id} is not the moderator of room {room_id}")]
    NotModerator {
        room_id: RoomId,
        connection_id: ConnectionId,
    },
}
