//! Broadcast gateway: delivers server events to connections
//!
//! Recipients are resolved from the session directory at send time. Delivery
//! is fire-and-forget; a closed or saturated connection is skipped.

use std::collections::HashMap;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::ws::protocol::ServerMsg;

use super::directory::SessionDirectory;

/// Outbound queue capacity per connection
pub const OUTBOUND_BUFFER: usize = 128;

/// Per-connection outbound channels
#[derive(Debug, Default)]
pub struct BroadcastGateway {
    connections: HashMap<Uuid, mpsc::Sender<ServerMsg>>,
}

impl BroadcastGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a connection's outbound channel
    pub fn connect(&mut self, connection_id: Uuid, outbound: mpsc::Sender<ServerMsg>) {
        self.connections.insert(connection_id, outbound);
    }

    /// Detach a connection; its writer sees the channel close
    pub fn disconnect(&mut self, connection_id: Uuid) {
        self.connections.remove(&connection_id);
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Deliver to exactly one connection
    pub fn to_connection(&self, connection_id: Uuid, msg: ServerMsg) {
        self.deliver(connection_id, msg);
    }

    /// Deliver to every member of a match
    pub fn to_match(&self, directory: &SessionDirectory, match_id: Uuid, msg: &ServerMsg) {
        for connection_id in directory.members(match_id) {
            self.deliver(connection_id, msg.clone());
        }
    }

    /// Deliver to every member of a match but one
    pub fn to_match_except(
        &self,
        directory: &SessionDirectory,
        match_id: Uuid,
        exclude: Uuid,
        msg: &ServerMsg,
    ) {
        for connection_id in directory.members(match_id) {
            if connection_id != exclude {
                self.deliver(connection_id, msg.clone());
            }
        }
    }

    fn deliver(&self, connection_id: Uuid, msg: ServerMsg) {
        let Some(tx) = self.connections.get(&connection_id) else {
            debug!(connection_id = %connection_id, "No outbound channel, skipping");
            return;
        };

        match tx.try_send(msg) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(connection_id = %connection_id, "Client lagged, dropping event");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(connection_id = %connection_id, "Outbound channel closed, skipping");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pong(t: u64) -> ServerMsg {
        ServerMsg::Pong { t }
    }

    fn drain(rx: &mut mpsc::Receiver<ServerMsg>) -> Vec<u64> {
        let mut seen = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            if let ServerMsg::Pong { t } = msg {
                seen.push(t);
            }
        }
        seen
    }

    #[test]
    fn match_fanout_respects_exclusion_and_order() {
        let mut directory = SessionDirectory::new();
        let mut gateway = BroadcastGateway::new();
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let mut receivers = Vec::new();
        for id in &ids {
            directory.register(*id, "p".to_string(), true).unwrap();
            let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
            gateway.connect(*id, tx);
            receivers.push(rx);
        }
        let match_id = directory.create_match();
        directory.assign(ids[0], match_id).unwrap();
        directory.assign(ids[1], match_id).unwrap();

        gateway.to_match(&directory, match_id, &pong(1));
        gateway.to_match_except(&directory, match_id, ids[0], &pong(2));
        gateway.to_connection(ids[2], pong(3));

        assert_eq!(drain(&mut receivers[0]), vec![1]);
        assert_eq!(drain(&mut receivers[1]), vec![1, 2]);
        assert_eq!(drain(&mut receivers[2]), vec![3], "not in the match");
    }

    #[test]
    fn closed_and_unknown_recipients_are_skipped() {
        let mut gateway = BroadcastGateway::new();
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(1);
        gateway.connect(id, tx);
        drop(rx);

        gateway.to_connection(id, pong(1));
        gateway.to_connection(Uuid::new_v4(), pong(2));
    }

    #[test]
    fn saturated_recipient_drops_instead_of_blocking() {
        let mut gateway = BroadcastGateway::new();
        let id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(2);
        gateway.connect(id, tx);

        for t in 0..5 {
            gateway.to_connection(id, pong(t));
        }
        assert_eq!(drain(&mut rx), vec![0, 1]);
    }
}
