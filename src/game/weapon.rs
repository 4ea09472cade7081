//! Weapon catalog, ammunition and reload timing

use std::time::Duration;

use crate::util::time::elapsed_between;
use crate::ws::protocol::{WeaponKind, WeaponSnapshot};

use super::scheduler::{ScheduledTask, TaskId};

/// Fixed stats per weapon kind
#[derive(Debug, Clone, Copy)]
pub struct WeaponStats {
    /// Damage per hit
    pub damage: u32,
    /// Shots per second
    pub fire_rate: u32,
    /// Rounds per magazine
    pub magazine_size: u32,
    /// Reserve ammunition cap
    pub max_reserve: u32,
    /// Time from reload start to refilled magazine
    pub reload_time: Duration,
}

impl WeaponStats {
    pub fn for_kind(kind: WeaponKind) -> Self {
        match kind {
            WeaponKind::AssaultRifle => Self {
                damage: 25,
                fire_rate: 10,
                magazine_size: 30,
                max_reserve: 90,
                reload_time: Duration::from_millis(2_000),
            },
            WeaponKind::Pistol => Self {
                damage: 15,
                fire_rate: 5,
                magazine_size: 12,
                max_reserve: 36,
                reload_time: Duration::from_millis(1_500),
            },
            WeaponKind::Shotgun => Self {
                damage: 80,
                fire_rate: 1,
                magazine_size: 8,
                max_reserve: 32,
                reload_time: Duration::from_millis(3_000),
            },
            WeaponKind::SniperRifle => Self {
                damage: 80,
                fire_rate: 1,
                magazine_size: 5,
                max_reserve: 20,
                reload_time: Duration::from_millis(3_000),
            },
            WeaponKind::Smg => Self {
                damage: 15,
                fire_rate: 15,
                magazine_size: 25,
                max_reserve: 75,
                reload_time: Duration::from_millis(1_800),
            },
        }
    }

    /// Minimum spacing between two accepted shots
    pub fn fire_interval(&self) -> Duration {
        Duration::from_secs(1) / self.fire_rate.max(1)
    }
}

/// Why a shot was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShotRejection {
    Reloading,
    EmptyMagazine,
    /// Fired again before the fire-rate interval elapsed
    Cooldown,
}

/// A weapon instance in a player's loadout
#[derive(Debug)]
pub struct Weapon {
    pub kind: WeaponKind,
    ammo: u32,
    reserve_ammo: u32,
    reloading: bool,
    last_fired: Option<u64>,
    pending_reload: Option<ScheduledTask>,
}

impl Weapon {
    /// A weapon with full magazine and reserve
    pub fn new(kind: WeaponKind) -> Self {
        let stats = WeaponStats::for_kind(kind);
        Self {
            kind,
            ammo: stats.magazine_size,
            reserve_ammo: stats.max_reserve,
            reloading: false,
            last_fired: None,
            pending_reload: None,
        }
    }

    pub fn stats(&self) -> WeaponStats {
        WeaponStats::for_kind(self.kind)
    }

    #[cfg(test)]
    pub fn ammo(&self) -> u32 {
        self.ammo
    }

    #[cfg(test)]
    pub fn reserve_ammo(&self) -> u32 {
        self.reserve_ammo
    }

    #[cfg(test)]
    pub fn is_reloading(&self) -> bool {
        self.reloading
    }

    #[cfg(test)]
    pub fn last_fired(&self) -> Option<u64> {
        self.last_fired
    }

    /// Spend one round at `now` (unix millis) if the weapon may fire
    pub fn fire(&mut self, now: u64) -> Result<(), ShotRejection> {
        if self.reloading {
            return Err(ShotRejection::Reloading);
        }
        if self.ammo == 0 {
            return Err(ShotRejection::EmptyMagazine);
        }
        if let Some(last) = self.last_fired {
            if elapsed_between(last, now) < self.stats().fire_interval() {
                return Err(ShotRejection::Cooldown);
            }
        }

        self.last_fired = Some(now);
        self.ammo -= 1;
        Ok(())
    }

    /// First reload phase. Returns false when already reloading, when the
    /// magazine is full, or when there is nothing left in reserve.
    pub fn begin_reload(&mut self) -> bool {
        if self.reloading
            || self.ammo == self.stats().magazine_size
            || self.reserve_ammo == 0
        {
            return false;
        }
        self.reloading = true;
        true
    }

    /// Attach the completion task of a reload started with [`begin_reload`](Self::begin_reload)
    pub fn set_pending_reload(&mut self, task: ScheduledTask) {
        self.pending_reload = Some(task);
    }

    /// Second reload phase. Applies only if `task_id` is the pending
    /// completion; returns the number of rounds moved into the magazine.
    pub fn complete_reload(&mut self, task_id: TaskId) -> Option<u32> {
        if !self.reloading {
            return None;
        }
        match &self.pending_reload {
            Some(task) if task.id() == task_id => {}
            _ => return None,
        }

        let refill = (self.stats().magazine_size - self.ammo).min(self.reserve_ammo);
        self.ammo += refill;
        self.reserve_ammo -= refill;
        self.reloading = false;
        self.pending_reload = None;
        Some(refill)
    }

    /// Abort a pending reload without refilling
    pub fn cancel_reload(&mut self) {
        self.pending_reload = None;
        self.reloading = false;
    }

    /// Full magazine and reserve, no reload in flight
    pub fn refill(&mut self) {
        let stats = self.stats();
        self.cancel_reload();
        self.ammo = stats.magazine_size;
        self.reserve_ammo = stats.max_reserve;
    }

    pub fn snapshot(&self) -> WeaponSnapshot {
        let stats = self.stats();
        WeaponSnapshot {
            kind: self.kind,
            ammo: self.ammo,
            reserve_ammo: self.reserve_ammo,
            max_ammo: stats.magazine_size,
            max_reserve_ammo: stats.max_reserve,
            damage: stats.damage,
            fire_rate: stats.fire_rate,
            reload_time_ms: stats.reload_time.as_millis() as u64,
            is_reloading: self.reloading,
            last_fired: self.last_fired,
        }
    }
}
