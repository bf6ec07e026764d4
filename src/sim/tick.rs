//! Per-frame simulation loop
//!
//! Stage order is fixed; later stages read what earlier ones wrote:
//! physics → spawn → lifecycle → prune → road recycle → input.

use std::collections::HashSet;

use super::lifecycle;
use super::physics::{self, SyncOutcome};
use super::road;
use super::scene::Scene;
use super::spawner;
use super::state::{Controls, SimEvent, SimulationState};

/// Driver intents sampled by the host for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickInput {
    pub accelerate: bool,
    pub steer_left: bool,
    pub steer_right: bool,
    pub brake: bool,
}

impl From<&TickInput> for Controls {
    fn from(input: &TickInput) -> Self {
        Self {
            throttle: input.accelerate,
            brake: input.brake,
            steer_left: input.steer_left,
            steer_right: input.steer_right,
        }
    }
}

/// Advance the simulation by one render frame
///
/// Must not be called re-entrantly; the host invokes it once per frame.
/// Input is latched at the end of the tick and drives the next physics step.
pub fn tick<S: Scene + ?Sized>(
    state: &mut SimulationState,
    input: &TickInput,
    frame_dt: f32,
    scene: &mut S,
) {
    state.events.clear();
    state.time_ticks += 1;
    let frame_dt = if frame_dt.is_finite() { frame_dt.max(0.0) } else { 0.0 };

    // Camera follow is the host's job: it reads `snapshot().player` after this

    step_physics(state, frame_dt);

    spawner::run(state);
    for proxy in state.spawned.drain(..) {
        scene.add_entity(&proxy);
    }

    lifecycle::evaluate_coins(state, frame_dt);
    lifecycle::evaluate_traffic(state);

    lifecycle::prune(state, scene);
    check_physics_desync(state);

    let player_z = state.player_position().z;
    for id in road::recycle(&mut state.segments, player_z, state.tuning.segment_length) {
        state.stats.segments_recycled += 1;
        state.events.push(SimEvent::SegmentRecycled { id });
    }

    state.player.controls = Controls::from(input);
}

/// Run this frame's fixed steps, then copy body transforms onto vehicles
fn step_physics(state: &mut SimulationState, frame_dt: f32) {
    let steps = state.clock.steps_for(frame_dt, &state.tuning);
    let dt = state.tuning.fixed_dt;

    for _ in 0..steps {
        let player = &state.player;
        if let Some(body) = state.physics.body_mut(player.body) {
            physics::drive(body, &player.controls, &state.tuning.player_drive, dt);
        }
        for car in &state.traffic {
            if let Some(body) = state.physics.body_mut(car.body) {
                physics::drive(body, &car.controls, car.drive_tuning(&state.tuning), dt);
            }
        }
        state.physics.step(dt);
    }

    if physics::sync_vehicle(&state.physics, &mut state.player) == SyncOutcome::MissingBody {
        debug_assert!(false, "player vehicle lost its physics body");
        log::warn!("Player body missing, re-registering at last transform");
        state.player.body = state.physics.insert_vehicle_body(
            &state.player.transform,
            state.player.speed,
            state.tuning.vehicle_half_extents,
        );
    }
    for car in &mut state.traffic {
        if physics::sync_vehicle(&state.physics, car) == SyncOutcome::MissingBody {
            debug_assert!(false, "traffic {} lost its physics body", car.id);
            log::warn!("Traffic {} has no physics body, retiring it", car.id);
            car.remove = true;
        }
    }
}

/// Every live vehicle owns exactly one body; anything else is an orphan
fn check_physics_desync(state: &mut SimulationState) {
    let live: HashSet<_> = std::iter::once(state.player.body)
        .chain(state.traffic.iter().map(|car| car.body))
        .collect();
    // ground + one body per vehicle
    if state.physics.body_count() == live.len() + 1 {
        return;
    }

    let healed = state.physics.heal_orphans(&live);
    debug_assert!(healed == 0, "physics desync: {healed} orphan bodies");
    for _ in 0..healed {
        state.events.push(SimEvent::OrphanBodyRemoved);
    }
}
