//! Deferred actions: reload and respawn completions
//!
//! A deferred action is a tokio task that sleeps for its delay and then posts
//! a [`DeferredAction`] back to the session loop, which applies it like any
//! other inbound command. The [`ScheduledTask`] handle is stored on the entity
//! that owns the action; dropping it aborts the task.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::debug;
use uuid::Uuid;

/// Identifies one scheduled task so that a late completion can be told apart
/// from the one its owner is currently waiting for.
pub type TaskId = u64;

/// Completion posted back to the session loop when a task's delay elapses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredAction {
    /// Refill the magazine of `weapon_index` on the player's loadout
    ReloadComplete {
        connection_id: Uuid,
        weapon_index: usize,
        task_id: TaskId,
    },
    /// Bring a dead player back at the spawn point
    Respawn { connection_id: Uuid, task_id: TaskId },
}

/// Handle to a pending deferred action. Aborts the task on drop.
pub struct ScheduledTask {
    id: TaskId,
    handle: AbortHandle,
}

impl ScheduledTask {
    pub fn id(&self) -> TaskId {
        self.id
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask").field("id", &self.id).finish()
    }
}

/// Spawns deferred actions that re-enter the session loop
pub struct Scheduler {
    tx: mpsc::Sender<DeferredAction>,
    next_id: AtomicU64,
}

impl Scheduler {
    /// Create a scheduler and the receiver the session loop drains
    pub fn new() -> (Self, mpsc::Receiver<DeferredAction>) {
        let (tx, rx) = mpsc::channel(256);
        let scheduler = Self {
            tx,
            next_id: AtomicU64::new(1),
        };
        (scheduler, rx)
    }

    /// Schedule the action built by `make` to fire after `delay`
    pub fn schedule(
        &self,
        delay: Duration,
        make: impl FnOnce(TaskId) -> DeferredAction,
    ) -> ScheduledTask {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let action = make(id);
        let tx = self.tx.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(action).await.is_err() {
                debug!(task_id = id, "Session loop gone, dropping deferred action");
            }
        });

        ScheduledTask {
            id,
            handle: handle.abort_handle(),
        }
    }
}
