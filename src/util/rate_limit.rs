//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::ws::protocol::ClientMsg;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Default `player:move` budget per connection: twice a 60 Hz client
pub const MOVE_RATE_LIMIT: u32 = 120;

/// Default budget for shots, reloads, weapon switches, respawn requests and
/// pings: twice the fastest weapon's fire rate
pub const ACTION_RATE_LIMIT: u32 = 30;

/// Per-connection rate limiter state. Movement and actions draw from separate
/// budgets so a steady move stream never starves shots; join, leave and hit
/// claims are not limited.
#[derive(Clone)]
pub struct ConnectionRateLimiter {
    move_limiter: Arc<Limiter>,
    action_limiter: Arc<Limiter>,
}

impl ConnectionRateLimiter {
    pub fn new(moves_per_second: u32, actions_per_second: u32) -> Self {
        Self {
            move_limiter: create_limiter(moves_per_second),
            action_limiter: create_limiter(actions_per_second),
        }
    }

    /// Check if a parsed client message is allowed (returns true if allowed)
    pub fn check(&self, msg: &ClientMsg) -> bool {
        match msg {
            ClientMsg::Move { .. } => self.move_limiter.check().is_ok(),
            ClientMsg::Shoot { .. }
            | ClientMsg::Reload
            | ClientMsg::SwitchWeapon { .. }
            | ClientMsg::RespawnRequest
            | ClientMsg::Ping { .. } => self.action_limiter.check().is_ok(),
            ClientMsg::Join { .. } | ClientMsg::Leave { .. } | ClientMsg::Hit { .. } => true,
        }
    }
}

impl Default for ConnectionRateLimiter {
    fn default() -> Self {
        Self::new(MOVE_RATE_LIMIT, ACTION_RATE_LIMIT)
    }
}
