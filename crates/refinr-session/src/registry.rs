// Live connections and the room each one is subscribed to.

use std::collections::HashMap;

use refinr_core::protocol::{ConnectionId, RoomId};
use refinr_core::ws_server::Outbound;

struct ConnectionEntry {
    outbound: Outbound,
    room: Option<RoomId>,
}

/// Registry of connected clients. A connection belongs to at most one room.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, ConnectionEntry>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a newly opened connection. Replaces any previous entry.
    pub fn register(&mut self, conn_id: ConnectionId, outbound: Outbound) {
        self.connections
            .insert(conn_id, ConnectionEntry { outbound, room: None });
    }

    /// Forget a connection, dropping its outbound sender. Returns the room it
    /// was still subscribed to, if any.
    pub fn unregister(&mut self, conn_id: &ConnectionId) -> Option<RoomId> {
        self.connections.remove(conn_id).and_then(|entry| entry.room)
    }

    /// Subscribe a connection to a room's broadcast group. Returns the room it
    /// was previously subscribed to. Unknown connections are ignored.
    pub fn subscribe(&mut self, conn_id: &ConnectionId, room_id: &str) -> Option<RoomId> {
        let entry = self.connections.get_mut(conn_id)?;
        entry.room.replace(room_id.to_string())
    }

    pub fn unsubscribe(&mut self, conn_id: &ConnectionId) -> Option<RoomId> {
        self.connections.get_mut(conn_id)?.room.take()
    }

    pub fn room_of(&self, conn_id: &ConnectionId) -> Option<&str> {
        self.connections.get(conn_id)?.room.as_deref()
    }

    pub fn outbound(&self, conn_id: &ConnectionId) -> Option<&Outbound> {
        self.connections.get(conn_id).map(|entry| &entry.outbound)
    }

    /// Every connection currently subscribed to `room_id`.
    pub fn subscribers<'a>(
        &'a self,
        room_id: &'a str,
    ) -> impl Iterator<Item = (&'a ConnectionId, &'a Outbound)> + 'a {
        self.connections
            .iter()
            .filter(move |(_, entry)| entry.room.as_deref() == Some(room_id))
            .map(|(id, entry)| (id, &entry.outbound))
    }

    pub fn is_connected(&self, conn_id: &ConnectionId) -> bool {
        self.connections.contains_key(conn_id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn registry_with(ids: &[&str]) -> ConnectionRegistry {
        let mut registry = ConnectionRegistry::new();
        for id in ids {
            let (tx, _rx) = mpsc::unbounded_channel();
            registry.register(ConnectionId::from(*id), tx);
        }
        registry
    }

    #[test]
    fn subscribe_tracks_single_room() {
        let mut registry = registry_with(&["a"]);
        let a = ConnectionId::from("a");

        assert_eq!(registry.subscribe(&a, "R1"), None);
        assert_eq!(registry.room_of(&a), Some("R1"));
        assert_eq!(registry.subscribe(&a, "R2"), Some("R1".to_string()));
        assert_eq!(registry.room_of(&a), Some("R2"));
    }

    #[test]
    fn subscribe_ignores_unknown_connection() {
        let mut registry = ConnectionRegistry::new();
        let ghost = ConnectionId::from("ghost");
        assert_eq!(registry.subscribe(&ghost, "R1"), None);
        assert_eq!(registry.room_of(&ghost), None);
    }

    #[test]
    fn subscribers_filters_by_room() {
        let mut registry = registry_with(&["a", "b", "c"]);
        registry.subscribe(&ConnectionId::from("a"), "R1");
        registry.subscribe(&ConnectionId::from("b"), "R1");
        registry.subscribe(&ConnectionId::from("c"), "R2");

        let mut ids: Vec<String> = registry
            .subscribers("R1")
            .map(|(id, _)| id.to_string())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(registry.subscribers("R3").count(), 0);
    }

    #[test]
    fn unregister_returns_subscribed_room() {
        let mut registry = registry_with(&["a", "b"]);
        registry.subscribe(&ConnectionId::from("a"), "R1");

        assert_eq!(registry.unregister(&ConnectionId::from("a")), Some("R1".to_string()));
        assert_eq!(registry.unregister(&ConnectionId::from("b")), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn unsubscribe_keeps_connection() {
        let mut registry = registry_with(&["a"]);
        let a = ConnectionId::from("a");
        registry.subscribe(&a, "R1");

        assert_eq!(registry.unsubscribe(&a), Some("R1".to_string()));
        assert!(registry.is_connected(&a));
        assert_eq!(registry.room_of(&a), None);
    }
}
