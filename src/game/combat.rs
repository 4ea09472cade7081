//! Combat resolution - shots, hit claims, movement relay and the deferred
//! reload/respawn completions.
//!
//! Clients only claim; every rule is checked here against the server's
//! records before anything is broadcast.

use std::time::Duration;

use tracing::{debug, info};
use uuid::Uuid;

use crate::session::{BroadcastGateway, SessionDirectory};
use crate::ws::protocol::{ServerMsg, Team, Vec3};

use super::snapshot::SnapshotBuilder;
use super::{Scheduler, ShotRejection, TaskId, SPAWN_POINT};

/// Result of a shoot intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShotOutcome {
    /// Round spent and broadcast to the match
    Fired,
    /// Weapon refused to fire; nothing changed except a possible auto-reload
    Rejected(ShotRejection),
    /// Unknown or dead shooter, or no running match
    Ignored,
}

/// Why a hit claim was not applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitRejection {
    UnknownPlayer,
    NotInSameMatch,
    MatchEnded,
    TargetDead,
    FriendlyFire,
}

/// Result of a hit claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    Damaged { health: u32 },
    Killed { ended_match: bool },
    Rejected(HitRejection),
}

/// Combat rules over the session directory
pub struct CombatResolver;

impl CombatResolver {
    /// Fire the shooter's active weapon at `now` (unix millis)
    pub fn handle_shoot(
        directory: &mut SessionDirectory,
        gateway: &BroadcastGateway,
        scheduler: &Scheduler,
        shooter_id: Uuid,
        direction: Vec3,
        now: u64,
    ) -> ShotOutcome {
        let Some(match_id) = directory.match_id_of(shooter_id) else {
            return ShotOutcome::Ignored;
        };
        if directory.get_match(match_id).map_or(true, |game| game.is_ended()) {
            return ShotOutcome::Ignored;
        }
        let Some(shooter) = directory.player_of_mut(shooter_id) else {
            return ShotOutcome::Ignored;
        };
        if !shooter.is_alive() {
            return ShotOutcome::Ignored;
        }

        if let Err(rejection) = shooter.current_weapon_mut().fire(now) {
            let reloading =
                rejection == ShotRejection::EmptyMagazine && shooter.reload(scheduler);
            debug!(
                connection_id = %shooter_id,
                reason = ?rejection,
                auto_reload = reloading,
                "Shot rejected"
            );
            return ShotOutcome::Rejected(rejection);
        }

        let msg = ServerMsg::PlayerShoot {
            id: shooter_id,
            position: shooter.position,
            direction,
        };
        gateway.to_match(directory, match_id, &msg);
        ShotOutcome::Fired
    }

    /// Apply a hit claimed by `shooter_id` on `target_id`
    pub fn handle_hit(
        directory: &mut SessionDirectory,
        gateway: &BroadcastGateway,
        scheduler: &Scheduler,
        shooter_id: Uuid,
        target_id: Uuid,
        respawn_delay: Duration,
    ) -> HitOutcome {
        let (match_id, team, damage) =
            match Self::validate_hit(directory, shooter_id, target_id) {
                Ok(validated) => validated,
                Err(rejection) => {
                    debug!(
                        shooter_id = %shooter_id,
                        target_id = %target_id,
                        reason = ?rejection,
                        "Hit rejected"
                    );
                    return HitOutcome::Rejected(rejection);
                }
            };

        let Some(target) = directory.player_of_mut(target_id) else {
            return HitOutcome::Rejected(HitRejection::UnknownPlayer);
        };
        let killed = target.take_damage(damage);
        let health = target.health();

        let hit = ServerMsg::PlayerHit {
            shooter_id,
            target_id,
            damage,
            health,
        };
        gateway.to_match(directory, match_id, &hit);

        if !killed {
            return HitOutcome::Damaged { health };
        }

        if let Some(shooter) = directory.player_of_mut(shooter_id) {
            shooter.score.kills += 1;
        }
        let ended_match = directory.get_match_mut(match_id).is_some_and(|game| {
            game.add_score(team);
            game.is_ended()
        });

        info!(
            match_id = %match_id,
            shooter_id = %shooter_id,
            target_id = %target_id,
            "Player killed"
        );
        gateway.to_match(
            directory,
            match_id,
            &ServerMsg::PlayerDie {
                shooter_id,
                target_id,
            },
        );

        if ended_match {
            if let Some(game) = directory.get_match(match_id) {
                gateway.to_match(directory, match_id, &SnapshotBuilder::game_end(game));
            }
        } else if let Some(target) = directory.player_of_mut(target_id) {
            target.schedule_respawn(scheduler, respawn_delay);
        }

        HitOutcome::Killed { ended_match }
    }

    /// Rule checks for a hit claim: (match, shooter's team, damage)
    fn validate_hit(
        directory: &SessionDirectory,
        shooter_id: Uuid,
        target_id: Uuid,
    ) -> Result<(Uuid, Team, u32), HitRejection> {
        let (Some(shooter), Some(target)) =
            (directory.player_of(shooter_id), directory.player_of(target_id))
        else {
            return Err(HitRejection::UnknownPlayer);
        };

        let match_id = directory
            .match_id_of(shooter_id)
            .filter(|id| directory.match_id_of(target_id) == Some(*id))
            .ok_or(HitRejection::NotInSameMatch)?;
        if directory.get_match(match_id).map_or(true, |game| game.is_ended()) {
            return Err(HitRejection::MatchEnded);
        }
        if !target.is_alive() {
            return Err(HitRejection::TargetDead);
        }

        let team = shooter.team.ok_or(HitRejection::NotInSameMatch)?;
        if target.team == Some(team) {
            return Err(HitRejection::FriendlyFire);
        }

        Ok((match_id, team, shooter.current_weapon().stats().damage))
    }

    /// Update the kinematic mirror and relay it to the rest of the match.
    /// Dead players are relayed too.
    pub fn handle_move(
        directory: &mut SessionDirectory,
        gateway: &BroadcastGateway,
        id: Uuid,
        position: Vec3,
        rotation: Vec3,
        velocity: Vec3,
    ) -> bool {
        let Some(player) = directory.player_of_mut(id) else {
            return false;
        };
        player.set_kinematics(position, rotation, velocity);

        if let Some(match_id) = directory.match_id_of(id) {
            let msg = ServerMsg::PlayerMove {
                id,
                position,
                rotation,
                velocity,
            };
            gateway.to_match_except(directory, match_id, id, &msg);
        }
        true
    }

    /// Manual reload of the active weapon
    pub fn handle_reload(directory: &mut SessionDirectory, scheduler: &Scheduler, id: Uuid) -> bool {
        let Some(player) = directory.player_of_mut(id) else {
            return false;
        };
        if !player.is_alive() {
            return false;
        }
        player.reload(scheduler)
    }

    pub fn handle_switch_weapon(directory: &mut SessionDirectory, id: Uuid, index: usize) -> bool {
        directory
            .player_of_mut(id)
            .is_some_and(|player| player.switch_weapon(index))
    }

    /// Apply a reload completion and send the owner a fresh `game:update`
    pub fn complete_reload(
        directory: &mut SessionDirectory,
        gateway: &BroadcastGateway,
        id: Uuid,
        weapon_index: usize,
        task_id: TaskId,
    ) -> Option<u32> {
        let refilled = directory
            .player_of_mut(id)?
            .complete_reload(weapon_index, task_id)?;
        debug!(connection_id = %id, weapon_index, refilled, "Reload complete");

        if let Some(update) = directory
            .match_id_of(id)
            .and_then(|match_id| SnapshotBuilder::game_update(directory, match_id))
        {
            gateway.to_connection(id, update);
        }
        Some(refilled)
    }

    /// Apply a scheduled respawn. Skipped once the match has ended.
    pub fn complete_respawn(
        directory: &mut SessionDirectory,
        gateway: &BroadcastGateway,
        id: Uuid,
        task_id: TaskId,
    ) -> bool {
        let Some(match_id) = directory.match_id_of(id) else {
            return false;
        };
        let running = directory
            .get_match(match_id)
            .is_some_and(|game| !game.is_ended());

        let Some(player) = directory.player_of_mut(id) else {
            return false;
        };
        if !player.take_due_respawn(task_id) || !running {
            return false;
        }
        player.respawn(SPAWN_POINT);

        info!(connection_id = %id, match_id = %match_id, "Player respawned");
        let msg = ServerMsg::PlayerRespawn {
            id,
            position: SPAWN_POINT,
        };
        gateway.to_match(directory, match_id, &msg);
        true
    }

    /// Client asks to respawn. Respawns are server-scheduled only; this just
    /// re-sends the requester its own respawn once the server has applied it.
    pub fn handle_respawn_request(
        directory: &SessionDirectory,
        gateway: &BroadcastGateway,
        id: Uuid,
    ) -> bool {
        let Some(player) = directory.player_of(id) else {
            return false;
        };
        if !player.is_alive() || player.respawn_pending() || player.score.deaths == 0 {
            debug!(connection_id = %id, "Respawn request ignored");
            return false;
        }

        gateway.to_connection(
            id,
            ServerMsg::PlayerRespawn {
                id,
                position: player.position,
            },
        );
        true
    }
}
