//! Game rules: players, weapons, matches and combat resolution

pub mod combat;
pub mod r#match;
pub mod player;
pub mod scheduler;
pub mod snapshot;
pub mod weapon;

pub use combat::CombatResolver;
pub use player::PlayerRecord;
pub use r#match::{Match, MatchError};
pub use scheduler::{DeferredAction, Scheduler, TaskId};
pub use weapon::ShotRejection;

use crate::ws::protocol::Vec3;

/// Roster capacity per team
pub const MAX_PLAYERS_PER_TEAM: usize = 8;
/// Players needed on each side before a match goes active
pub const MIN_PLAYERS_PER_TEAM: usize = 1;
/// Kills to win per player on the larger team
pub const BASE_KILLS_TO_WIN: u32 = 10;

/// Full health
pub const PLAYER_HEALTH: u32 = 100;
/// Where players start and respawn
pub const SPAWN_POINT: Vec3 = Vec3::new(0.0, 1.0, 0.0);
