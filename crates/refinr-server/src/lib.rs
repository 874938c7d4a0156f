// Server composition, shared by the `refinr` binary and integration tests.

pub mod http;
pub mod server;
