// Room membership: join (which also creates rooms) and leave.

use refinr_core::config::SessionConfig;
use refinr_core::protocol::{ConnectionId, Participant, Phase, ServerMessage};
use tracing::{debug, info};

use crate::registry::ConnectionRegistry;
use crate::store::RoomStore;
use crate::RoomUpdate;

/// Result of a join.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome {
    /// The room did not exist and was created by this join.
    pub created: bool,
    /// Set when the connection was moved out of another room first.
    pub previous: Option<Departure>,
    /// Full room snapshot for every subscriber, the joiner included.
    pub update: RoomUpdate,
}

/// Result of removing a member from a room.
#[derive(Debug, Clone, PartialEq)]
pub struct Departure {
    pub participant: Participant,
    /// Updated member list (and pruned votes) for the remaining members.
    pub update: RoomUpdate,
    /// The room became empty and is gone from the store.
    pub room_deleted: bool,
}

/// Add `conn_id` to `room_id`, creating the room with `conn_id` as moderator
/// if it does not exist yet.
///
/// Joining the same room twice is a no-op apart from the fresh snapshot. A
/// connection already in a different room leaves that room first.
pub fn join(
    store: &mut RoomStore,
    registry: &mut ConnectionRegistry,
    config: &SessionConfig,
    room_id: &str,
    conn_id: &ConnectionId,
    name: &str,
) -> JoinOutcome {
    let current = registry.room_of(conn_id).map(str::to_owned);
    let previous = match current {
        Some(current) if current != room_id => {
            debug!("Client {conn_id} switching from room {current} to {room_id}");
            leave(store, registry, config, conn_id)
        }
        _ => None,
    };

    let (room, created) = store.get_or_create(room_id, conn_id);
    if created {
        info!("Room {room_id} created, moderator {conn_id}");
    }

    let added = room.add_member(Participant {
        connection_id: conn_id.clone(),
        name: name.to_string(),
    });
    if added {
        debug!(
            "Client {conn_id} joined room {room_id} as {name:?} ({} members)",
            room.members.len()
        );
    } else {
        debug!("Duplicate join of {conn_id} to room {room_id} ignored");
    }

    let update = RoomUpdate::new(room_id, room.snapshot());
    registry.subscribe(conn_id, room_id);

    JoinOutcome {
        created,
        previous,
        update,
    }
}

/// Remove `conn_id` from whatever room it belongs to, deleting the room
/// once nobody is left. Returns `None` when the connection was in no room.
pub fn leave(
    store: &mut RoomStore,
    registry: &mut ConnectionRegistry,
    config: &SessionConfig,
    conn_id: &ConnectionId,
) -> Option<Departure> {
    let room_id = registry
        .unsubscribe(conn_id)
        .or_else(|| store.room_containing(conn_id))?;
    let room = store.get_mut(&room_id)?;
    let participant = room.remove_member(conn_id)?;

    let mut messages = vec![ServerMessage::RoomUsers(room.members.clone())];
    if config.prune_departed_votes && room.votes.remove(conn_id).is_some() {
        let votes = room.votes.clone();
        messages.push(match room.phase {
            Phase::Results => ServerMessage::VotingResults(votes),
            _ => ServerMessage::VoteReceived(votes),
        });
    }

    let room_deleted = room.is_empty();
    if room_deleted {
        store.delete(&room_id);
        info!("No clients left in room {room_id}, room deleted");
    } else {
        debug!("Client {conn_id} left room {room_id}");
    }

    Some(Departure {
        participant,
        update: RoomUpdate::new(room_id, messages),
        room_deleted,
    })
}
