//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Position, rotation or velocity as sent by clients
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// The two sides of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    Humans,
    RogueAi,
}

impl Team {
    pub const ALL: [Team; 2] = [Team::Humans, Team::RogueAi];
}

/// Origin of a player: a person at a client, or a bot driven by one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerType {
    Human,
    RogueAi,
}

impl PlayerType {
    pub fn from_is_human(is_human: bool) -> Self {
        if is_human {
            Self::Human
        } else {
            Self::RogueAi
        }
    }

    pub fn is_human(self) -> bool {
        self == Self::Human
    }
}

/// Weapon catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponKind {
    AssaultRifle,
    Pistol,
    Shotgun,
    SniperRifle,
    Smg,
}

/// Match lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Waiting,
    Active,
    Ended,
}

fn default_true() -> bool {
    true
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMsg {
    /// Register this connection and queue it for matchmaking
    #[serde(rename = "player:join")]
    Join {
        name: String,
        #[serde(default = "default_true")]
        is_human: bool,
    },

    /// Kinematic update, relayed to the rest of the match
    #[serde(rename = "player:move")]
    Move {
        position: Vec3,
        rotation: Vec3,
        velocity: Vec3,
    },

    /// Fire the active weapon
    #[serde(rename = "player:shoot")]
    Shoot { direction: Vec3 },

    /// Claim that the last shot hit another player
    #[serde(rename = "player:hit")]
    Hit { target_id: Uuid },

    /// Ask to be shown the server-side respawn
    #[serde(rename = "player:respawn")]
    RespawnRequest,

    /// Leave the current match but keep the socket open
    #[serde(rename = "player:leave")]
    Leave {
        #[serde(default)]
        reason: Option<String>,
    },

    /// Select a weapon slot
    #[serde(rename = "weapon:switch")]
    SwitchWeapon { index: usize },

    /// Reload the active weapon
    #[serde(rename = "weapon:reload")]
    Reload,

    /// Ping for latency measurement
    #[serde(rename = "ping")]
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMsg {
    /// Welcome message after connection
    #[serde(rename = "welcome")]
    Welcome {
        connection_id: Uuid,
        server_time: u64,
    },

    #[serde(rename = "player:join")]
    PlayerJoin { player: PlayerSnapshot },

    #[serde(rename = "player:leave")]
    PlayerLeave { player_id: Uuid, reason: String },

    #[serde(rename = "player:move")]
    PlayerMove {
        id: Uuid,
        position: Vec3,
        rotation: Vec3,
        velocity: Vec3,
    },

    #[serde(rename = "player:shoot")]
    PlayerShoot {
        id: Uuid,
        position: Vec3,
        direction: Vec3,
    },

    #[serde(rename = "player:hit")]
    PlayerHit {
        shooter_id: Uuid,
        target_id: Uuid,
        damage: u32,
        /// Target health after the hit
        health: u32,
    },

    #[serde(rename = "player:die")]
    PlayerDie { shooter_id: Uuid, target_id: Uuid },

    #[serde(rename = "player:respawn")]
    PlayerRespawn { id: Uuid, position: Vec3 },

    /// Match assignment, with the full roster at that moment
    #[serde(rename = "game:start")]
    GameStart {
        #[serde(rename = "match")]
        game: MatchSnapshot,
        players: Vec<PlayerSnapshot>,
    },

    #[serde(rename = "game:end")]
    GameEnd {
        #[serde(rename = "match")]
        game: MatchSnapshot,
    },

    /// Full match and roster state
    #[serde(rename = "game:update")]
    GameUpdate {
        #[serde(rename = "match")]
        game: MatchSnapshot,
        players: Vec<PlayerSnapshot>,
    },

    /// Pong response
    #[serde(rename = "pong")]
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// Kill/death/assist counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerScore {
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
}

/// Weapon state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponSnapshot {
    pub kind: WeaponKind,
    pub ammo: u32,
    pub reserve_ammo: u32,
    pub max_ammo: u32,
    pub max_reserve_ammo: u32,
    pub damage: u32,
    /// Shots per second
    pub fire_rate: u32,
    pub reload_time_ms: u64,
    pub is_reloading: bool,
    pub last_fired: Option<u64>,
}

/// Player state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub player_type: PlayerType,
    /// Unset while the player waits in the matchmaking queue
    pub team: Option<Team>,
    pub health: u32,
    pub position: Vec3,
    pub rotation: Vec3,
    pub velocity: Vec3,
    pub is_alive: bool,
    pub is_sprinting: bool,
    pub sprint_cooldown: f32,
    pub crouching: bool,
    pub weapons: Vec<WeaponSnapshot>,
    pub current_weapon_index: usize,
    pub score: PlayerScore,
}

/// Player ids on each side
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRosters {
    pub humans: Vec<Uuid>,
    pub rogue_ai: Vec<Uuid>,
}

/// Kills scored by each side
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamScores {
    pub humans: u32,
    pub rogue_ai: u32,
}

impl TeamScores {
    pub fn get(&self, team: Team) -> u32 {
        match team {
            Team::Humans => self.humans,
            Team::RogueAi => self.rogue_ai,
        }
    }
}

/// Match state in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub id: Uuid,
    pub teams: TeamRosters,
    pub scores: TeamScores,
    pub kills_to_win: u32,
    pub start_time: u64,
    pub end_time: Option<u64>,
    pub status: MatchStatus,
}
