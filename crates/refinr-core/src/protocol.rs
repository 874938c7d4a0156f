// Wire protocol between browser clients and the session server.
//
// Every WebSocket text frame carries one JSON object of the shape
// `{"event": "<name>", "data": <payload>}`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Opaque room identifier. Callers may supply any non-blank string.
pub type RoomId = String;

/// Transport-assigned identity of one live client connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    /// Generate a fresh random identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Shared room types
// ---------------------------------------------------------------------------

/// Voting phase of a room.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Ended,
    Voting,
    Results,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Ended => "ended",
            Phase::Voting => "voting",
            Phase::Results => "results",
        };
        f.write_str(name)
    }
}

/// A room member as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub connection_id: ConnectionId,
    pub name: String,
}

/// Votes keyed by connection. Ordered so the JSON output is deterministic.
pub type Votes = BTreeMap<ConnectionId, String>;

// ---------------------------------------------------------------------------
// Inbound messages (client -> server)
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed client message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("field `{field}` must not be empty")]
    EmptyField { field: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    JoinRoom { room_id: RoomId, name: String },
    StartVoting { room_id: RoomId },
    EndVoting { room_id: RoomId },
    ResetVoting { room_id: RoomId },
    GiveVote { room_id: RoomId, vote: String },
}

impl ClientMessage {
    /// Parse and validate a raw text frame.
    ///
    /// Room IDs must not be blank and votes must not be empty; display names
    /// are trimmed and must be non-empty afterwards. Anything that gets past
    /// this point is considered well-formed by the session layer.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let mut msg: ClientMessage = serde_json::from_str(text)?;

        if msg.room_id().trim().is_empty() {
            return Err(ProtocolError::EmptyField { field: "roomId" });
        }

        match &mut msg {
            ClientMessage::JoinRoom { name, .. } => {
                let trimmed = name.trim();
                if trimmed.is_empty() {
                    return Err(ProtocolError::EmptyField { field: "name" });
                }
                *name = trimmed.to_string();
            }
            ClientMessage::GiveVote { vote, .. } => {
                if vote.is_empty() {
                    return Err(ProtocolError::EmptyField { field: "vote" });
                }
            }
            _ => {}
        }

        Ok(msg)
    }

    /// The room this message addresses.
    pub fn room_id(&self) -> &str {
        match self {
            ClientMessage::JoinRoom { room_id, .. }
            | ClientMessage::StartVoting { room_id }
            | ClientMessage::EndVoting { room_id }
            | ClientMessage::ResetVoting { room_id }
            | ClientMessage::GiveVote { room_id, .. } => room_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound messages (server -> clients)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    /// Sent once to a freshly opened connection with its own identity.
    Connected { connection_id: ConnectionId },
    RoomUsers(Vec<Participant>),
    Moderator(ConnectionId),
    VotingPhase(Phase),
    VotingResults(Votes),
    VoteReceived(Votes),
    /// Always carries an empty mapping; clients clear their selection.
    ResetVotes(Votes),
    /// Only sent when error reporting is enabled in `[session]`.
    Error { message: String },
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_join_room() {
        let msg = ClientMessage::parse(r#"{"event":"joinRoom","data":{"roomId":"R1","name":"Alice"}}"#)
            .unwrap();
        assert_eq!(
            msg,
            ClientMessage::JoinRoom {
                room_id: "R1".into(),
                name: "Alice".into()
            }
        );
    }

    #[test]
    fn parses_every_phase_command() {
        for (event, expected) in [
            ("startVoting", ClientMessage::StartVoting { room_id: "R1".into() }),
            ("endVoting", ClientMessage::EndVoting { room_id: "R1".into() }),
            ("resetVoting", ClientMessage::ResetVoting { room_id: "R1".into() }),
        ] {
            let text = format!(r#"{{"event":"{event}","data":{{"roomId":"R1"}}}}"#);
            assert_eq!(ClientMessage::parse(&text).unwrap(), expected);
        }
    }

    #[test]
    fn join_name_is_trimmed() {
        let msg = ClientMessage::parse(r#"{"event":"joinRoom","data":{"roomId":"R1","name":"  Bob "}}"#)
            .unwrap();
        match msg {
            ClientMessage::JoinRoom { name, .. } => assert_eq!(name, "Bob"),
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn rejects_blank_name() {
        let err = ClientMessage::parse(r#"{"event":"joinRoom","data":{"roomId":"R1","name":"   "}}"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::EmptyField { field: "name" }));
    }

    #[test]
    fn rejects_empty_vote() {
        let err = ClientMessage::parse(r#"{"event":"giveVote","data":{"roomId":"R1","vote":""}}"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::EmptyField { field: "vote" }));
    }

    #[test]
    fn whitespace_vote_is_kept_as_sent() {
        let msg = ClientMessage::parse(r#"{"event":"giveVote","data":{"roomId":"R1","vote":" "}}"#)
            .unwrap();
        assert_eq!(
            msg,
            ClientMessage::GiveVote {
                room_id: "R1".into(),
                vote: " ".into()
            }
        );
    }

    #[test]
    fn rejects_empty_room_id() {
        let err = ClientMessage::parse(r#"{"event":"startVoting","data":{"roomId":""}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::EmptyField { field: "roomId" }));
        let err = ClientMessage::parse(r#"{"event":"endVoting","data":{"roomId":"  "}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::EmptyField { field: "roomId" }));
    }

    #[test]
    fn rejects_missing_fields_and_unknown_events() {
        assert!(matches!(
            ClientMessage::parse(r#"{"event":"giveVote","data":{"roomId":"R1"}}"#),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            ClientMessage::parse(r#"{"event":"kickUser","data":{"roomId":"R1"}}"#),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            ClientMessage::parse("not json"),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn server_messages_use_event_data_envelope() {
        let mut votes = Votes::new();
        votes.insert(ConnectionId::from("b"), "5".into());

        let value = serde_json::to_value(ServerMessage::VoteReceived(votes)).unwrap();
        assert_eq!(value, json!({"event": "voteReceived", "data": {"b": "5"}}));

        let value = serde_json::to_value(ServerMessage::VotingPhase(Phase::Results)).unwrap();
        assert_eq!(value, json!({"event": "votingPhase", "data": "results"}));

        let value = serde_json::to_value(ServerMessage::RoomUsers(vec![Participant {
            connection_id: ConnectionId::from("a"),
            name: "Alice".into(),
        }]))
        .unwrap();
        assert_eq!(
            value,
            json!({"event": "roomUsers", "data": [{"connectionId": "a", "name": "Alice"}]})
        );

        let value = serde_json::to_value(ServerMessage::Connected {
            connection_id: ConnectionId::from("a"),
        })
        .unwrap();
        assert_eq!(value, json!({"event": "connected", "data": {"connectionId": "a"}}));
    }

    #[test]
    fn generated_connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }

    #[test]
    fn default_phase_is_ended() {
        assert_eq!(Phase::default(), Phase::Ended);
        assert_eq!(Phase::Voting.to_string(), "voting");
    }
}
