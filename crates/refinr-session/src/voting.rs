// Voting phase transitions and vote collection.
//
//   any --start--> Voting   (votes cleared)
//   any --end----> Results
//   any --reset--> Ended     (votes cleared)

use refinr_core::config::SessionConfig;
use refinr_core::protocol::{ConnectionId, Phase, ServerMessage, Votes};
use tracing::debug;

use crate::store::{Room, RoomStore};
use crate::{RoomUpdate, SessionError};

/// Look up a room for a phase change, enforcing `moderator_only` when set.
fn moderated_room<'a>(
    store: &'a mut RoomStore,
    config: &SessionConfig,
    room_id: &str,
    requester: &ConnectionId,
) -> Result<&'a mut Room, SessionError> {
    let room = store.get_mut(room_id).ok_or_else(|| SessionError::UnknownRoom {
        room_id: room_id.to_string(),
    })?;
    if config.moderator_only && !room.is_moderator(requester) {
        return Err(SessionError::NotModerator {
            room_id: room_id.to_string(),
            connection_id: requester.clone(),
        });
    }
    Ok(room)
}

pub fn start_voting(
    store: &mut RoomStore,
    config: &SessionConfig,
    room_id: &str,
    requester: &ConnectionId,
) -> Result<RoomUpdate, SessionError> {
    let room = moderated_room(store, config, room_id, requester)?;
    room.phase = Phase::Voting;
    room.votes.clear();
    debug!("Voting started in room {room_id}");

    Ok(RoomUpdate::new(
        room_id,
        vec![
            ServerMessage::VotingPhase(room.phase),
            ServerMessage::ResetVotes(Votes::new()),
        ],
    ))
}

/// Record or overwrite `voter`'s vote. Membership is not checked.
pub fn cast_vote(
    store: &mut RoomStore,
    room_id: &str,
    voter: &ConnectionId,
    value: &str,
) -> Result<RoomUpdate, SessionError> {
    let room = store.get_mut(room_id).ok_or_else(|| SessionError::UnknownRoom {
        room_id: room_id.to_string(),
    })?;
    if room.phase != Phase::Voting {
        return Err(SessionError::VotingClosed {
            room_id: room_id.to_string(),
        });
    }

    room.votes.insert(voter.clone(), value.to_string());
    debug!("{voter} voted in room {room_id} ({} votes)", room.votes.len());

    Ok(RoomUpdate::new(
        room_id,
        vec![ServerMessage::VoteReceived(room.votes.clone())],
    ))
}

/// Close voting and reveal the votes, which stay in place for display.
pub fn end_voting(
    store: &mut RoomStore,
    config: &SessionConfig,
    room_id: &str,
    requester: &ConnectionId,
) -> Result<RoomUpdate, SessionError> {
    let room = moderated_room(store, config, room_id, requester)?;
    room.phase = Phase::Results;
    debug!("Voting ended in room {room_id}");

    Ok(RoomUpdate::new(
        room_id,
        vec![
            ServerMessage::VotingPhase(room.phase),
            ServerMessage::VotingResults(room.votes.clone()),
        ],
    ))
}

pub fn reset_voting(
    store: &mut RoomStore,
    config: &SessionConfig,
    room_id: &str,
    requester: &ConnectionId,
) -> Result<RoomUpdate, SessionError> {
    let room = moderated_room(store, config, room_id, requester)?;
    room.phase = Phase::Ended;
    room.votes.clear();
    debug!("Voting reset in room {room_id}");

    Ok(RoomUpdate::new(
        room_id,
        vec![
            ServerMessage::VotingPhase(room.phase),
            ServerMessage::ResetVotes(Votes::new()),
        ],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ConnectionId {
        ConnectionId::from(s)
    }

    /// A store holding room "R1" moderated by "a".
    fn store_with_room() -> RoomStore {
        let mut store = RoomStore::new();
        store.get_or_create("R1", &id("a"));
        store
    }

    fn room(store: &RoomStore) -> &Room {
        store.get("R1").unwrap()
    }

    #[test]
    fn phase_round_trip() {
        let mut store = store_with_room();
        let config = SessionConfig::default();

        start_voting(&mut store, &config, "R1", &id("a")).unwrap();
        assert_eq!(room(&store).phase, Phase::Voting);

        cast_vote(&mut store, "R1", &id("b"), "5").unwrap();
        let update = end_voting(&mut store, &config, "R1", &id("a")).unwrap();
        assert_eq!(room(&store).phase, Phase::Results);
        assert_eq!(room(&store).votes.get(&id("b")).map(String::as_str), Some("5"));
        assert_eq!(update.messages[0], ServerMessage::VotingPhase(Phase::Results));

        reset_voting(&mut store, &config, "R1", &id("a")).unwrap();
        assert_eq!(room(&store).phase, Phase::Ended);
        assert!(room(&store).votes.is_empty());
    }

    #[test]
    fn start_clears_previous_votes() {
        let mut store = store_with_room();
        let config = SessionConfig::default();
        start_voting(&mut store, &config, "R1", &id("a")).unwrap();
        cast_vote(&mut store, "R1", &id("a"), "8").unwrap();
        end_voting(&mut store, &config, "R1", &id("a")).unwrap();

        let update = start_voting(&mut store, &config, "R1", &id("a")).unwrap();
        assert!(room(&store).votes.is_empty());
        assert_eq!(
            update.messages,
            vec![
                ServerMessage::VotingPhase(Phase::Voting),
                ServerMessage::ResetVotes(Votes::new()),
            ]
        );
    }

    #[test]
    fn vote_outside_voting_never_mutates() {
        let mut store = store_with_room();
        let config = SessionConfig::default();

        let err = cast_vote(&mut store, "R1", &id("a"), "3").unwrap_err();
        assert_eq!(err, SessionError::VotingClosed { room_id: "R1".into() });
        assert!(room(&store).votes.is_empty());

        start_voting(&mut store, &config, "R1", &id("a")).unwrap();
        cast_vote(&mut store, "R1", &id("a"), "3").unwrap();
        end_voting(&mut store, &config, "R1", &id("a")).unwrap();

        assert!(cast_vote(&mut store, "R1", &id("a"), "13").is_err());
        assert_eq!(room(&store).votes.get(&id("a")).map(String::as_str), Some("3"));
    }

    #[test]
    fn last_vote_wins() {
        let mut store = store_with_room();
        start_voting(&mut store, &SessionConfig::default(), "R1", &id("a")).unwrap();
        cast_vote(&mut store, "R1", &id("b"), "5").unwrap();
        let update = cast_vote(&mut store, "R1", &id("b"), "8").unwrap();

        let mut expected = Votes::new();
        expected.insert(id("b"), "8".into());
        assert_eq!(update.messages, vec![ServerMessage::VoteReceived(expected)]);
    }

    #[test]
    fn vote_from_non_member_is_recorded() {
        let mut store = store_with_room();
        start_voting(&mut store, &SessionConfig::default(), "R1", &id("a")).unwrap();
        cast_vote(&mut store, "R1", &id("stranger"), "1").unwrap();
        assert!(room(&store).votes.contains_key(&id("stranger")));
    }

    #[test]
    fn reset_is_idempotent() {
        let mut store = store_with_room();
        let config = SessionConfig::default();
        start_voting(&mut store, &config, "R1", &id("a")).unwrap();
        cast_vote(&mut store, "R1", &id("a"), "2").unwrap();

        let first = reset_voting(&mut store, &config, "R1", &id("a")).unwrap();
        let state_after_first = room(&store).clone();
        let second = reset_voting(&mut store, &config, "R1", &id("a")).unwrap();

        assert_eq!(first, second);
        assert_eq!(room(&store), &state_after_first);
        assert_eq!(room(&store).phase, Phase::Ended);
        assert!(room(&store).votes.is_empty());
    }

    #[test]
    fn end_from_ended_reveals_empty_results() {
        let mut store = store_with_room();
        let update = end_voting(&mut store, &SessionConfig::default(), "R1", &id("a")).unwrap();
        assert_eq!(
            update.messages,
            vec![
                ServerMessage::VotingPhase(Phase::Results),
                ServerMessage::VotingResults(Votes::new()),
            ]
        );
        assert_eq!(room(&store).phase, Phase::Results);
    }

    #[test]
    fn unknown_room_is_reported() {
        let mut store = RoomStore::new();
        let config = SessionConfig::default();
        let expected = SessionError::UnknownRoom { room_id: "nope".into() };

        assert_eq!(start_voting(&mut store, &config, "nope", &id("a")), Err(expected.clone()));
        assert_eq!(end_voting(&mut store, &config, "nope", &id("a")), Err(expected.clone()));
        assert_eq!(reset_voting(&mut store, &config, "nope", &id("a")), Err(expected.clone()));
        assert_eq!(cast_vote(&mut store, "nope", &id("a"), "1"), Err(expected));
        assert!(store.is_empty());
    }

    #[test]
    fn anyone_may_drive_phases_by_default() {
        let mut store = store_with_room();
        start_voting(&mut store, &SessionConfig::default(), "R1", &id("b")).unwrap();
        assert_eq!(room(&store).phase, Phase::Voting);
    }

    #[test]
    fn moderator_only_rejects_other_connections() {
        let mut store = store_with_room();
        let config = SessionConfig {
            moderator_only: true,
            ..SessionConfig::default()
        };

        let err = start_voting(&mut store, &config, "R1", &id("b")).unwrap_err();
        assert!(matches!(err, SessionError::NotModerator { .. }));
        assert_eq!(room(&store).phase, Phase::Ended);

        start_voting(&mut store, &config, "R1", &id("a")).unwrap();
        // Voting stays open to everyone.
        cast_vote(&mut store, "R1", &id("b"), "5").unwrap();
        assert!(end_voting(&mut store, &config, "R1", &id("b")).is_err());
        assert!(reset_voting(&mut store, &config, "R1", &id("b")).is_err());
        end_voting(&mut store, &config, "R1", &id("a")).unwrap();
    }
}
