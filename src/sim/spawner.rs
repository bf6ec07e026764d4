//! Distance-gated procedural spawning of coins and traffic

use std::ops::RangeInclusive;

use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::pool::EntityId;
use super::state::{Controls, SimEvent, SimulationState, Transform, Vehicle, VehicleKind};
use super::scene::{EntityKind, RenderProxy};
use crate::{is_oncoming_lane, lane_offset};

/// Why a spawn request was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SpawnError {
    #[error("lane {lane} out of range (road has {lane_count} lanes)")]
    LaneOutOfRange { lane: u32, lane_count: u32 },

    #[error("road has no lanes")]
    NoLanes,

    #[error("spawn position is not finite")]
    NonFinite,
}

/// Highest integer distance milestone reached; only moves forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistanceCounter {
    value: i64,
}

impl DistanceCounter {
    pub fn starting_at(z: f32) -> Self {
        let value = if z.is_finite() { z.floor() as i64 } else { 0 };
        Self { value }
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    /// Milestones passed since the last call, oldest first
    pub fn advance(&mut self, z: f32) -> Option<RangeInclusive<i64>> {
        if !z.is_finite() {
            return None;
        }
        let milestone = z.floor() as i64;
        if milestone > self.value {
            let crossed = self.value + 1..=milestone;
            self.value = milestone;
            Some(crossed)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Gate {
    Coin,
    Traffic,
}

/// Multiples of `interval` inside `crossed`, keeping at most the newest `limit`
fn gate_milestones(crossed: &RangeInclusive<i64>, interval: u32, limit: u32) -> Vec<i64> {
    let interval = i64::from(interval.max(1));
    // ceil(start / interval) * interval
    let first = -((-crossed.start()).div_euclid(interval)) * interval;
    let last = crossed.end().div_euclid(interval) * interval;
    if first > last {
        return Vec::new();
    }
    let count = (last - first) / interval + 1;
    let limit = i64::from(limit);
    let first = if count > limit {
        log::debug!("Skipping {} spawn milestones in one tick", count - limit);
        last - (limit - 1) * interval
    } else {
        first
    };
    (0..count.min(limit)).map(|i| first + i * interval).collect()
}

/// Evaluate both spawn gates for every milestone crossed this tick
///
/// A tick can cover several units of distance, so each crossed gate milestone
/// gets its own draw. Catch-up spawns are placed as far behind the newest one
/// as their milestone is behind the player.
pub fn run(state: &mut SimulationState) {
    let player_z = state.player_position().z;
    let Some(crossed) = state.distance.advance(player_z) else {
        return;
    };
    let newest = *crossed.end();
    let limit = state.tuning.spawn_catchup_limit;

    let mut gates: Vec<(i64, Gate)> = gate_milestones(&crossed, state.tuning.coin_interval, limit)
        .into_iter()
        .map(|m| (m, Gate::Coin))
        .chain(
            gate_milestones(&crossed, state.tuning.traffic_interval, limit)
                .into_iter()
                .map(|m| (m, Gate::Traffic)),
        )
        .collect();
    gates.sort();

    for (milestone, gate) in gates {
        let spawn_z = player_z + state.tuning.lead_distance - (newest - milestone) as f32;
        match gate {
            Gate::Coin => {
                if state.rng.random::<f32>() < state.tuning.coin_spawn_chance {
                    spawn_coin(state, spawn_z);
                }
            }
            Gate::Traffic => {
                if state.rng.random::<f32>() < state.tuning.traffic_spawn_chance {
                    spawn_random_traffic(state, milestone, spawn_z);
                }
            }
        }
    }
}

fn spawn_random_traffic(state: &mut SimulationState, milestone: i64, z: f32) {
    let lane_count = state.tuning.lane_count;
    let result = if lane_count == 0 {
        Err(SpawnError::NoLanes)
    } else {
        let lane = state.rng.random_range(0..lane_count);
        spawn_traffic(state, lane, z)
    };
    if let Err(e) = result {
        log::warn!("Dropped traffic spawn at milestone {milestone}: {e}");
        state.stats.spawns_rejected += 1;
        state.events.push(SimEvent::SpawnRejected);
    }
}

/// Spawn one coin at longitudinal `z` with a random on-road offset
pub fn spawn_coin(state: &mut SimulationState, z: f32) -> EntityId {
    let coin = state.random_coin(z);
    let id = coin.id;
    log::debug!("Spawned coin {} at ({:.1}, {:.1})", id, coin.position.x, coin.position.z);
    state.spawned.push(RenderProxy {
        id,
        kind: EntityKind::Coin,
        transform: coin.transform(),
    });
    state.events.push(SimEvent::CoinSpawned { id });
    state.coins.push(coin);
    id
}

/// Spawn a traffic car in `lane` at longitudinal `z`
///
/// Oncoming lanes get a 180° yaw so the car drives back toward the player.
pub fn spawn_traffic(state: &mut SimulationState, lane: u32, z: f32) -> Result<EntityId, SpawnError> {
    let lane_count = state.tuning.lane_count;
    if lane_count == 0 {
        return Err(SpawnError::NoLanes);
    }
    let x = lane_offset(lane, lane_count, state.tuning.road_width)
        .ok_or(SpawnError::LaneOutOfRange { lane, lane_count })?;
    if !z.is_finite() {
        return Err(SpawnError::NonFinite);
    }

    let oncoming = is_oncoming_lane(lane, lane_count);
    let yaw = if oncoming { std::f32::consts::PI } else { 0.0 };
    let position = Vec3::new(x, state.tuning.vehicle_half_extents[1], z);
    let transform = Transform::from_position_yaw(position, yaw);
    let speed = state.tuning.traffic_drive.max_speed;
    let body = state
        .physics
        .insert_vehicle_body(&transform, speed, state.tuning.vehicle_half_extents);

    let id = state.next_entity_id();
    let vehicle = Vehicle {
        id,
        kind: VehicleKind::Traffic,
        transform,
        speed,
        controls: Controls::default(),
        body,
        remove: false,
    };
    log::debug!("Spawned traffic {} in lane {} (oncoming: {})", id, lane, oncoming);
    state.spawned.push(vehicle.proxy());
    state.events.push(SimEvent::TrafficSpawned { id, lane, oncoming });
    state.stats.traffic_spawned += 1;
    state.traffic.push(vehicle);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::tuning::Tuning;

    fn forced_tuning() -> Tuning {
        Tuning {
            initial_coins: 0,
            coin_spawn_chance: 1.0,
            traffic_spawn_chance: 0.0,
            ..Default::default()
        }
    }

    fn set_player_z(state: &mut SimulationState, z: f32) {
        state.player.transform.position.z = z;
    }

    #[test]
    fn test_counter_fires_once_per_milestone() {
        let mut counter = DistanceCounter::starting_at(0.0);
        assert_eq!(counter.advance(0.4), None);
        assert_eq!(counter.advance(1.0), Some(1..=1));
        assert_eq!(counter.advance(1.0), None);
        assert_eq!(counter.advance(1.9999), None);
        assert_eq!(counter.advance(2.0001), Some(2..=2));
        assert_eq!(counter.advance(4.5), Some(3..=4));
    }

    #[test]
    fn test_counter_ignores_backward_motion() {
        let mut counter = DistanceCounter::starting_at(10.0);
        assert_eq!(counter.advance(4.0), None);
        assert_eq!(counter.advance(10.5), None);
        assert_eq!(counter.advance(f32::NAN), None);
        assert_eq!(counter.value(), 10);
        assert_eq!(counter.advance(11.0), Some(11..=11));
    }

    #[test]
    fn test_coin_spawns_lead_distance_ahead() {
        let mut state = SimulationState::new(42, forced_tuning());
        set_player_z(&mut state, 20.0);
        run(&mut state);

        assert_eq!(state.coins.len(), 1);
        let coin = state.coins.iter().next().unwrap();
        assert!((coin.position.z - 120.0).abs() < 1e-3);
        assert_eq!(state.distance.value(), 20);
        assert_eq!(state.spawned.len(), 1);
    }

    #[test]
    fn test_fractional_ticks_spawn_once() {
        let mut state = SimulationState::new(42, forced_tuning());
        for z in [20.0, 20.0001, 20.25, 20.5, 20.999] {
            set_player_z(&mut state, z);
            run(&mut state);
        }
        assert_eq!(state.coins.len(), 1);
    }

    #[test]
    fn test_off_interval_milestone_spawns_nothing() {
        let mut state = SimulationState::new(42, forced_tuning());
        set_player_z(&mut state, 19.0);
        run(&mut state);
        assert!(state.coins.is_empty());
        assert_eq!(state.distance.value(), 19);
    }

    #[test]
    fn test_zero_chance_never_spawns() {
        let tuning = Tuning {
            coin_spawn_chance: 0.0,
            ..forced_tuning()
        };
        let mut state = SimulationState::new(42, tuning);
        for m in 1..=200 {
            set_player_z(&mut state, m as f32);
            run(&mut state);
        }
        assert!(state.coins.is_empty());
    }

    #[test]
    fn test_both_gates_fire_on_shared_milestone() {
        let tuning = Tuning {
            traffic_spawn_chance: 1.0,
            ..forced_tuning()
        };
        let mut state = SimulationState::new(9, tuning);
        state.distance = DistanceCounter::starting_at(99.0);
        // lcm(20, 50)
        set_player_z(&mut state, 100.0);
        run(&mut state);
        assert_eq!(state.coins.len(), 1);
        assert_eq!(state.traffic.len(), 1);
        // ground + player + traffic
        assert_eq!(state.physics.body_count(), 3);
    }

    #[test]
    fn test_gate_milestones_in_range() {
        assert_eq!(gate_milestones(&(1..=45), 20, 8), vec![20, 40]);
        assert_eq!(gate_milestones(&(21..=39), 20, 8), Vec::<i64>::new());
        assert_eq!(gate_milestones(&(20..=20), 20, 8), vec![20]);
        assert_eq!(gate_milestones(&(-45..=-1), 20, 8), vec![-40, -20]);
        assert_eq!(gate_milestones(&(1..=1000), 50, 3), vec![900, 950, 1000]);
    }

    #[test]
    fn test_jump_spawns_every_crossed_coin_milestone() {
        let mut state = SimulationState::new(42, forced_tuning());
        set_player_z(&mut state, 45.0);
        run(&mut state);

        let zs: Vec<f32> = state.coins.iter().map(|c| c.position.z).collect();
        assert_eq!(zs.len(), 2);
        // milestone 20 trails milestone 40 by one interval
        assert!((zs[0] - 120.0).abs() < 1e-3, "{zs:?}");
        assert!((zs[1] - 140.0).abs() < 1e-3, "{zs:?}");
    }

    #[test]
    fn test_teleport_catchup_is_capped() {
        let mut state = SimulationState::new(42, forced_tuning());
        set_player_z(&mut state, 10_000.0);
        run(&mut state);
        assert_eq!(state.coins.len(), state.tuning.spawn_catchup_limit as usize);
        assert_eq!(state.distance.value(), 10_000);
    }

    #[test]
    fn test_oncoming_lane_faces_player() {
        let mut state = SimulationState::new(1, forced_tuning());
        let same = spawn_traffic(&mut state, 0, 100.0).unwrap();
        let oncoming = spawn_traffic(&mut state, 3, 100.0).unwrap();

        let same = state.traffic.get(same).unwrap().transform;
        let oncoming = state.traffic.get(oncoming).unwrap().transform;
        assert!((same.forward() - Vec3::Z).length() < 1e-4);
        assert!((oncoming.forward() - Vec3::NEG_Z).length() < 1e-4);
        let relative = same.rotation.angle_between(oncoming.rotation);
        assert!((relative - std::f32::consts::PI).abs() < 1e-3);
    }

    #[test]
    fn test_lane_one_not_oncoming() {
        let mut state = SimulationState::new(1, forced_tuning());
        spawn_traffic(&mut state, 1, 50.0).unwrap();
        assert!(matches!(
            state.events.last(),
            Some(SimEvent::TrafficSpawned {
                lane: 1,
                oncoming: false,
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_lane_rejected() {
        let mut state = SimulationState::new(1, forced_tuning());
        let bodies = state.physics.body_count();
        assert_eq!(
            spawn_traffic(&mut state, 4, 100.0),
            Err(SpawnError::LaneOutOfRange {
                lane: 4,
                lane_count: 4
            })
        );
        assert_eq!(spawn_traffic(&mut state, 0, f32::INFINITY), Err(SpawnError::NonFinite));
        assert!(state.traffic.is_empty());
        assert_eq!(state.physics.body_count(), bodies);
    }

    #[test]
    fn test_no_lanes_is_logged_not_fatal() {
        let tuning = Tuning {
            lane_count: 0,
            traffic_spawn_chance: 1.0,
            ..forced_tuning()
        };
        let mut state = SimulationState::new(1, tuning);
        state.distance = DistanceCounter::starting_at(49.0);
        set_player_z(&mut state, 50.0);
        run(&mut state);
        assert!(state.traffic.is_empty());
        assert_eq!(state.stats.spawns_rejected, 1);
        assert_eq!(state.events, vec![SimEvent::SpawnRejected]);
    }

    proptest! {
        #[test]
        fn prop_coins_stay_on_road(seed in any::<u64>(), milestones in 1u32..40) {
            let mut state = SimulationState::new(seed, forced_tuning());
            let half = state.tuning.coin_lateral_fraction * state.tuning.road_width;
            for m in 1..=milestones {
                let z = (m * state.tuning.coin_interval) as f32;
                set_player_z(&mut state, z);
                run(&mut state);
            }
            prop_assert_eq!(state.coins.len(), milestones as usize);
            for coin in &state.coins {
                prop_assert!(coin.position.x.abs() <= half);
            }
        }
    }
}
