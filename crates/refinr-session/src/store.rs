// In-memory room state and the store that owns it.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use refinr_core::protocol::{ConnectionId, Participant, Phase, RoomId, ServerMessage, Votes};

/// The state of a single voting room.
#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    /// Members in join order, unique by connection.
    pub members: Vec<Participant>,
    /// The creator's connection. Never reassigned while the room exists,
    /// even after that connection leaves.
    pub moderator_id: ConnectionId,
    pub phase: Phase,
    pub votes: Votes,
}

impl Room {
    pub fn new(moderator_id: ConnectionId) -> Self {
        Room {
            members: Vec::new(),
            moderator_id,
            phase: Phase::Ended,
            votes: Votes::new(),
        }
    }

    pub fn is_member(&self, conn_id: &ConnectionId) -> bool {
        self.members.iter().any(|m| &m.connection_id == conn_id)
    }

    pub fn is_moderator(&self, conn_id: &ConnectionId) -> bool {
        &self.moderator_id == conn_id
    }

    /// Append a member. Returns `false` if the connection is already present.
    pub fn add_member(&mut self, participant: Participant) -> bool {
        if self.is_member(&participant.connection_id) {
            return false;
        }
        self.members.push(participant);
        true
    }

    pub fn remove_member(&mut self, conn_id: &ConnectionId) -> Option<Participant> {
        let idx = self.members.iter().position(|m| &m.connection_id == conn_id)?;
        Some(self.members.remove(idx))
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Full room state, in the order clients expect after a join.
    pub fn snapshot(&self) -> Vec<ServerMessage> {
        vec![
            ServerMessage::Moderator(self.moderator_id.clone()),
            ServerMessage::VotingResults(self.votes.clone()),
            ServerMessage::VotingPhase(self.phase),
            ServerMessage::RoomUsers(self.members.clone()),
        ]
    }
}

/// Owns every live room, keyed by room ID.
///
/// Only the gateway task touches the store, so `get_or_create` needs no
/// locking to guarantee a single creator per room.
#[derive(Debug, Default)]
pub struct RoomStore {
    rooms: HashMap<RoomId, Room>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn get_mut(&mut self, room_id: &str) -> Option<&mut Room> {
        self.rooms.get_mut(room_id)
    }

    /// Fetch a room, creating it with `creator` as moderator if it is new.
    /// The flag is `true` when the room was created by this call.
    pub fn get_or_create(&mut self, room_id: &str, creator: &ConnectionId) -> (&mut Room, bool) {
        match self.rooms.entry(room_id.to_string()) {
            Entry::Occupied(entry) => (entry.into_mut(), false),
            Entry::Vacant(entry) => (entry.insert(Room::new(creator.clone())), true),
        }
    }

    pub fn delete(&mut self, room_id: &str) -> Option<Room> {
        self.rooms.remove(room_id)
    }

    pub fn contains(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Linear scan for the room listing `conn_id` as a member.
    pub fn room_containing(&self, conn_id: &ConnectionId) -> Option<RoomId> {
        self.rooms
            .iter()
            .find(|(_, room)| room.is_member(conn_id))
            .map(|(id, _)| id.clone())
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
