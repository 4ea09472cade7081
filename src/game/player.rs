//! Per-connection player record (authoritative combat state)

use std::time::Duration;

use uuid::Uuid;

use crate::ws::protocol::{PlayerScore, PlayerSnapshot, PlayerType, Team, Vec3, WeaponKind};

use super::scheduler::{DeferredAction, ScheduledTask, Scheduler, TaskId};
use super::weapon::Weapon;
use super::{PLAYER_HEALTH, SPAWN_POINT};

/// Player state owned by the session directory
#[derive(Debug)]
pub struct PlayerRecord {
    pub id: Uuid,
    pub name: String,
    pub player_type: PlayerType,
    /// Assigned when the player is placed in a match
    pub team: Option<Team>,

    // Combat
    health: u32,
    alive: bool,
    weapons: Vec<Weapon>,
    current_weapon: usize,
    pub score: PlayerScore,

    // Kinematics mirror, as last reported by the client
    pub position: Vec3,
    pub rotation: Vec3,
    pub velocity: Vec3,
    pub is_sprinting: bool,
    pub sprint_cooldown: f32,
    pub crouching: bool,

    pending_respawn: Option<ScheduledTask>,
}

impl PlayerRecord {
    pub fn new(id: Uuid, name: String, is_human: bool) -> Self {
        Self {
            id,
            name,
            player_type: PlayerType::from_is_human(is_human),
            team: None,
            health: PLAYER_HEALTH,
            alive: true,
            weapons: vec![
                Weapon::new(WeaponKind::AssaultRifle),
                Weapon::new(WeaponKind::Pistol),
            ],
            current_weapon: 0,
            score: PlayerScore::default(),
            position: SPAWN_POINT,
            rotation: Vec3::default(),
            velocity: Vec3::default(),
            is_sprinting: false,
            sprint_cooldown: 0.0,
            crouching: false,
            pending_respawn: None,
        }
    }

    pub fn health(&self) -> u32 {
        self.health
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn is_human(&self) -> bool {
        self.player_type.is_human()
    }

    pub fn weapons(&self) -> &[Weapon] {
        &self.weapons
    }

    /// Apply damage. Returns true if this hit killed the player.
    /// Dead players take no further damage.
    pub fn take_damage(&mut self, amount: u32) -> bool {
        if !self.alive {
            return false;
        }

        self.health = self.health.saturating_sub(amount);
        if self.health == 0 {
            self.alive = false;
            self.score.deaths += 1;
            return true;
        }
        false
    }

    /// Restore a dead player at `position` with full health and ammunition.
    /// Callers check `is_alive` first.
    pub fn respawn(&mut self, position: Vec3) {
        self.health = PLAYER_HEALTH;
        self.alive = true;
        self.position = position;
        self.is_sprinting = false;
        self.sprint_cooldown = 0.0;
        self.crouching = false;
        self.pending_respawn = None;

        for weapon in &mut self.weapons {
            weapon.refill();
        }
    }

    pub fn current_weapon(&self) -> &Weapon {
        &self.weapons[self.current_weapon]
    }

    pub fn current_weapon_mut(&mut self) -> &mut Weapon {
        &mut self.weapons[self.current_weapon]
    }

    pub fn current_weapon_index(&self) -> usize {
        self.current_weapon
    }

    /// Select a weapon slot; out-of-range indices are ignored
    pub fn switch_weapon(&mut self, index: usize) -> bool {
        if index < self.weapons.len() {
            self.current_weapon = index;
            true
        } else {
            false
        }
    }

    pub fn set_kinematics(&mut self, position: Vec3, rotation: Vec3, velocity: Vec3) {
        self.position = position;
        self.rotation = rotation;
        self.velocity = velocity;
    }

    /// Start reloading the active weapon and schedule its completion
    pub fn reload(&mut self, scheduler: &Scheduler) -> bool {
        let connection_id = self.id;
        let weapon_index = self.current_weapon;
        let weapon = self.current_weapon_mut();
        if !weapon.begin_reload() {
            return false;
        }

        let task = scheduler.schedule(weapon.stats().reload_time, |task_id| {
            DeferredAction::ReloadComplete {
                connection_id,
                weapon_index,
                task_id,
            }
        });
        weapon.set_pending_reload(task);
        true
    }

    /// Apply a reload completion; see [`Weapon::complete_reload`]
    pub fn complete_reload(&mut self, weapon_index: usize, task_id: TaskId) -> Option<u32> {
        self.weapons
            .get_mut(weapon_index)
            .and_then(|weapon| weapon.complete_reload(task_id))
    }

    /// Schedule the automatic respawn of a dead player
    pub fn schedule_respawn(&mut self, scheduler: &Scheduler, delay: Duration) {
        let connection_id = self.id;
        let task = scheduler.schedule(delay, |task_id| DeferredAction::Respawn {
            connection_id,
            task_id,
        });
        self.pending_respawn = Some(task);
    }

    pub fn respawn_pending(&self) -> bool {
        self.pending_respawn.is_some()
    }

    /// Consume the pending respawn if `task_id` is the one being waited on
    pub fn take_due_respawn(&mut self, task_id: TaskId) -> bool {
        match &self.pending_respawn {
            Some(task) if task.id() == task_id && !self.alive => {
                self.pending_respawn = None;
                true
            }
            _ => false,
        }
    }

    /// Cancel every pending reload and respawn
    pub fn cancel_pending(&mut self) {
        self.pending_respawn = None;
        for weapon in &mut self.weapons {
            weapon.cancel_reload();
        }
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id,
            name: self.name.clone(),
            player_type: self.player_type,
            team: self.team,
            health: self.health,
            position: self.position,
            rotation: self.rotation,
            velocity: self.velocity,
            is_alive: self.alive,
            is_sprinting: self.is_sprinting,
            sprint_cooldown: self.sprint_cooldown,
            crouching: self.crouching,
            weapons: self.weapons.iter().map(Weapon::snapshot).collect(),
            current_weapon_index: self.current_weapon,
            score: self.score,
        }
    }
}
