//! Session layer: who is connected, the single-writer loop that owns them,
//! and delivery of server events back to sockets

pub mod broadcast;
pub mod directory;
pub mod server;

#[cfg(test)]
pub(crate) mod testing;

pub use broadcast::{BroadcastGateway, OUTBOUND_BUFFER};
pub use directory::{SessionDirectory, SessionError};
pub use server::{Command, GameServer, ServerHandle};
