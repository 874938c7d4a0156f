// Shared building blocks: wire protocol, configuration and the WebSocket
// transport. Holds no room state.

pub mod config;
pub mod protocol;
pub mod ws_server;
