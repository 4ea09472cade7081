//! Matchmaking queue implementation

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Connection waiting for a match
#[derive(Debug, Clone)]
pub struct QueuedPlayer {
    pub connection_id: Uuid,
    pub queued_at: Instant,
}

impl QueuedPlayer {
    pub fn new(connection_id: Uuid) -> Self {
        Self {
            connection_id,
            queued_at: Instant::now(),
        }
    }

    /// How long this player has been waiting
    pub fn wait_time(&self) -> Duration {
        self.queued_at.elapsed()
    }
}

/// FIFO of connections awaiting assignment
#[derive(Debug, Default)]
pub struct MatchmakingQueue {
    queue: VecDeque<QueuedPlayer>,
}

impl MatchmakingQueue {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to the back of the queue
    pub fn enqueue(&mut self, connection_id: Uuid) {
        // Remove if already in queue (rejoin)
        self.queue.retain(|p| p.connection_id != connection_id);
        self.queue.push_back(QueuedPlayer::new(connection_id));
    }

    /// Remove a connection from the queue
    pub fn dequeue(&mut self, connection_id: Uuid) -> Option<QueuedPlayer> {
        let pos = self
            .queue
            .iter()
            .position(|p| p.connection_id == connection_id)?;
        self.queue.remove(pos)
    }

    /// Put a player back at the head, keeping its original wait time
    pub fn requeue_front(&mut self, player: QueuedPlayer) {
        self.queue.retain(|p| p.connection_id != player.connection_id);
        self.queue.push_front(player);
    }

    pub fn front(&self) -> Option<&QueuedPlayer> {
        self.queue.front()
    }

    pub fn pop_front(&mut self) -> Option<QueuedPlayer> {
        self.queue.pop_front()
    }

    /// Check if a connection is in the queue
    #[cfg(test)]
    pub fn contains(&self, connection_id: Uuid) -> bool {
        self.queue.iter().any(|p| p.connection_id == connection_id)
    }

    /// Get queue length
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check if queue is empty
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
