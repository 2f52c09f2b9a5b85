//! # codebreak-server
//!
//! TCP front end for `codebreak-core`: players log in, pick a room, and
//! every full room runs its own session. Players whose game ends go back
//! to the room list on the same connection.

pub mod client;
pub mod config;
pub mod rooms;
pub mod server;

pub use config::ServerConfig;
pub use server::Server;
