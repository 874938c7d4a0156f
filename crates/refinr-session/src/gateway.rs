// Session gateway: the single owner of all room state.
//
// Transport events and commands from the HTTP layer are funnelled into one
// task, so every mutation of rooms, memberships and votes is serialized
// without locks.

use refinr_core::config::SessionConfig;
use refinr_core::protocol::{ClientMessage, ConnectionId, RoomId, ServerMessage};
use refinr_core::ws_server::WsEvent;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::broadcast;
use crate::lifecycle;
use crate::registry::ConnectionRegistry;
use crate::store::RoomStore;
use crate::voting;
use crate::{RoomUpdate, SessionError};

/// Requests from outside the WebSocket channel.
#[derive(Debug)]
pub enum Command {
    /// Reserve a fresh room ID. The room itself is created by the first join.
    CreateRoom {
        name: String,
        reply: oneshot::Sender<RoomId>,
    },
    Shutdown,
}

/// Room store, connection registry and session options.
pub struct Gateway {
    store: RoomStore,
    registry: ConnectionRegistry,
    config: SessionConfig,
}

impl Gateway {
    pub fn new(config: SessionConfig) -> Self {
        Gateway {
            store: RoomStore::new(),
            registry: ConnectionRegistry::new(),
            config,
        }
    }

    pub fn store(&self) -> &RoomStore {
        &self.store
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Generate an opaque room ID that no live room is using.
    pub fn create_room(&mut self, name: &str) -> RoomId {
        let room_id = loop {
            let candidate = Uuid::new_v4().to_string();
            if !self.store.contains(&candidate) {
                break candidate;
            }
        };
        info!("Room ID {room_id} issued for {name:?}");
        room_id
    }

    pub fn handle_ws_event(&mut self, event: WsEvent) {
        match event {
            WsEvent::Connected {
                conn_id,
                addr,
                outbound,
            } => {
                debug!("Registering client {conn_id} from {addr}");
                self.registry.register(conn_id.clone(), outbound);
                broadcast::send_to(
                    &self.registry,
                    &conn_id,
                    &ServerMessage::Connected {
                        connection_id: conn_id.clone(),
                    },
                );
            }
            WsEvent::Message { conn_id, text } => self.handle_text(&conn_id, &text),
            WsEvent::Disconnected { conn_id } => self.handle_disconnect(&conn_id),
        }
    }

    fn handle_text(&mut self, conn_id: &ConnectionId, text: &str) {
        match ClientMessage::parse(text) {
            Ok(msg) => self.handle_client_message(conn_id, msg),
            Err(e) => {
                warn!("Dropping message from {conn_id}: {e}");
                self.report(conn_id, e.to_string());
            }
        }
    }

    pub fn handle_client_message(&mut self, conn_id: &ConnectionId, msg: ClientMessage) {
        let result = match msg {
            ClientMessage::JoinRoom { room_id, name } => {
                let outcome = lifecycle::join(
                    &mut self.store,
                    &mut self.registry,
                    &self.config,
                    &room_id,
                    conn_id,
                    &name,
                );
                if let Some(previous) = outcome.previous {
                    broadcast::broadcast(&self.registry, &previous.update);
                }
                Ok(outcome.update)
            }
            ClientMessage::StartVoting { room_id } => {
                voting::start_voting(&mut self.store, &self.config, &room_id, conn_id)
            }
            ClientMessage::EndVoting { room_id } => {
                voting::end_voting(&mut self.store, &self.config, &room_id, conn_id)
            }
            ClientMessage::ResetVoting { room_id } => {
                voting::reset_voting(&mut self.store, &self.config, &room_id, conn_id)
            }
            ClientMessage::GiveVote { room_id, vote } => {
                voting::cast_vote(&mut self.store, &room_id, conn_id, &vote)
            }
        };
        self.dispatch(conn_id, result);
    }

    fn handle_disconnect(&mut self, conn_id: &ConnectionId) {
        if let Some(departure) =
            lifecycle::leave(&mut self.store, &mut self.registry, &self.config, conn_id)
        {
            broadcast::broadcast(&self.registry, &departure.update);
        }
        self.registry.unregister(conn_id);
        debug!(
            "Client {conn_id} unregistered ({} connections, {} rooms)",
            self.registry.len(),
            self.store.len()
        );
    }

    fn dispatch(&mut self, conn_id: &ConnectionId, result: Result<RoomUpdate, SessionError>) {
        match result {
            Ok(update) => {
                broadcast::broadcast(&self.registry, &update);
            }
            Err(e) => {
                warn!("Dropping request from {conn_id}: {e}");
                self.report(conn_id, e.to_string());
            }
        }
    }

    fn report(&self, conn_id: &ConnectionId, message: String) {
        if self.config.report_errors {
            broadcast::send_to(&self.registry, conn_id, &ServerMessage::Error { message });
        }
    }
}

/// Run the gateway until the transport or command channel closes, or a
/// [`Command::Shutdown`] arrives.
pub async fn run(
    mut ws_rx: mpsc::Receiver<WsEvent>,
    mut cmd_rx: mpsc::Receiver<Command>,
    mut gateway: Gateway,
) -> anyhow::Result<()> {
    info!("Session gateway started");

    loop {
        tokio::select! {
            ws_event = ws_rx.recv() => {
                match ws_event {
                    Some(event) => gateway.handle_ws_event(event),
                    None => {
                        info!("WebSocket channel closed, shutting down");
                        break;
                    }
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Command::CreateRoom { name, reply }) => {
                        let room_id = gateway.create_room(&name);
                        if reply.send(room_id).is_err() {
                            debug!("Create-room requester went away");
                        }
                    }
                    Some(Command::Shutdown) => {
                        info!("Shutdown command received");
                        break;
                    }
                    None => {
                        info!("Command channel closed, shutting down");
                        break;
                    }
                }
            }
        }
    }

    info!(
        "Session gateway exiting with {} rooms, {} connections",
        gateway.store.len(),
        gateway.registry.len()
    );
    Ok(())
}
