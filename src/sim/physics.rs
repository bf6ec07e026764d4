//! Rigid-body physics bridge (Rapier 3D)
//!
//! The physics world is authoritative for vehicle transforms. The bridge runs
//! fixed timesteps, turns each vehicle's controls into body velocities before
//! every step, and copies the resulting transforms back afterwards.

use std::collections::HashSet;

use glam::{Quat, Vec3};
use rapier3d::prelude::*;

use super::state::{Controls, Transform, Vehicle};
use crate::tuning::{DriveTuning, StepPolicy, Tuning};

#[inline]
fn to_vector(v: Vec3) -> Vector<Real> {
    vector![v.x, v.y, v.z]
}

#[inline]
fn from_vector(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

#[inline]
fn from_rotation(r: &Rotation<Real>) -> Quat {
    let c = r.quaternion().coords;
    Quat::from_xyzw(c.x, c.y, c.z, c.w)
}

/// Wraps Rapier's pipeline and body/collider sets
pub struct PhysicsWorld {
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    physics_pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    /// Static ground plane
    ground: RigidBodyHandle,
}

impl PhysicsWorld {
    /// Create a world with gravity and a frictionless, non-bouncy ground plane
    pub fn new(tuning: &Tuning) -> Self {
        let mut rigid_body_set = RigidBodySet::new();
        let mut collider_set = ColliderSet::new();

        let ground = rigid_body_set.insert(RigidBodyBuilder::fixed().build());
        // Min combine rule: a zero-friction ground wins over any tire friction
        let ground_collider = ColliderBuilder::halfspace(Vector::<Real>::y_axis())
            .friction(0.0)
            .restitution(0.0)
            .friction_combine_rule(CoefficientCombineRule::Min)
            .restitution_combine_rule(CoefficientCombineRule::Min)
            .build();
        collider_set.insert_with_parent(ground_collider, ground, &mut rigid_body_set);

        let integration_parameters = IntegrationParameters {
            dt: tuning.fixed_dt,
            ..Default::default()
        };

        Self {
            rigid_body_set,
            collider_set,
            gravity: vector![0.0, tuning.gravity, 0.0],
            integration_parameters,
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            ground,
        }
    }

    /// Step the simulation by dt seconds
    pub fn step(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;

        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None,
            &(),
            &(),
        );
    }

    /// Register a car body: yaw-only rotation, box collider with tire material
    pub fn insert_vehicle_body(
        &mut self,
        transform: &Transform,
        initial_speed: f32,
        half_extents: [f32; 3],
    ) -> RigidBodyHandle {
        let yaw = transform.yaw();
        let velocity = transform.forward() * initial_speed;
        let body = RigidBodyBuilder::dynamic()
            .translation(to_vector(transform.position))
            .rotation(vector![0.0, yaw, 0.0])
            .linvel(to_vector(velocity))
            .enabled_rotations(false, true, false)
            .build();
        let handle = self.rigid_body_set.insert(body);

        let [hx, hy, hz] = half_extents;
        let tire = ColliderBuilder::cuboid(hx, hy, hz)
            .friction(0.0)
            .restitution(0.0)
            .build();
        self.collider_set
            .insert_with_parent(tire, handle, &mut self.rigid_body_set);
        handle
    }

    /// Remove a body and its colliders; unknown handles are ignored
    pub fn remove_body(&mut self, handle: RigidBodyHandle) -> bool {
        self.rigid_body_set
            .remove(
                handle,
                &mut self.island_manager,
                &mut self.collider_set,
                &mut self.impulse_joint_set,
                &mut self.multibody_joint_set,
                true,
            )
            .is_some()
    }

    pub fn body(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.rigid_body_set.get(handle)
    }

    pub fn body_mut(&mut self, handle: RigidBodyHandle) -> Option<&mut RigidBody> {
        self.rigid_body_set.get_mut(handle)
    }

    pub fn ground(&self) -> RigidBodyHandle {
        self.ground
    }

    /// Registered colliders, ground included
    pub fn collider_count(&self) -> usize {
        self.collider_set.len()
    }

    pub fn contains(&self, handle: RigidBodyHandle) -> bool {
        self.rigid_body_set.contains(handle)
    }

    /// Registered bodies, ground included
    pub fn body_count(&self) -> usize {
        self.rigid_body_set.len()
    }

    /// Deregister every body that is neither the ground nor in `live`
    ///
    /// Returns how many orphans were removed.
    pub fn heal_orphans(&mut self, live: &HashSet<RigidBodyHandle>) -> usize {
        let orphans: Vec<RigidBodyHandle> = self
            .rigid_body_set
            .iter()
            .map(|(handle, _)| handle)
            .filter(|h| *h != self.ground && !live.contains(h))
            .collect();
        for handle in &orphans {
            log::warn!("Removing orphan physics body {:?}", handle);
            self.remove_body(*handle);
        }
        orphans.len()
    }
}

/// Turn driver intents into body velocities for one fixed step
///
/// Forward speed integrates throttle / brake / coasting inside
/// `[0, max_speed]`. Yaw rate scales with speed so a stopped car cannot spin
/// in place. Vertical velocity is left to gravity and contacts.
pub fn drive(body: &mut RigidBody, controls: &Controls, tuning: &DriveTuning, dt: f32) {
    let forward = body.rotation() * vector![0.0, 0.0, 1.0];
    let linvel = *body.linvel();
    let mut speed = linvel.dot(&forward);

    if controls.throttle {
        speed += tuning.acceleration * dt;
    }
    if controls.brake {
        speed -= tuning.braking * dt;
    }
    if !controls.throttle && !controls.brake {
        speed -= tuning.coast_decel * dt;
    }
    let speed = speed.clamp(0.0, tuning.max_speed);

    let speed_factor = if tuning.max_speed > 0.0 {
        speed / tuning.max_speed
    } else {
        0.0
    };
    let yaw_rate = controls.steer_axis() * tuning.steer_rate * speed_factor;

    let planar = forward * speed;
    body.set_linvel(vector![planar.x, linvel.y, planar.z], true);
    body.set_angvel(vector![0.0, yaw_rate, 0.0], true);
}

/// Result of copying a body's state onto its vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Updated,
    /// Body produced non-finite values; vehicle keeps last tick's transform
    Skipped,
    /// No registered body for this vehicle
    MissingBody,
}

/// Overwrite a vehicle's transform and speed from its body
pub fn sync_vehicle(world: &PhysicsWorld, vehicle: &mut Vehicle) -> SyncOutcome {
    let Some(body) = world.body(vehicle.body) else {
        return SyncOutcome::MissingBody;
    };

    let transform = Transform {
        position: from_vector(body.translation()),
        rotation: from_rotation(body.rotation()),
    };
    let linvel = from_vector(body.linvel());
    if !transform.is_finite() || !linvel.is_finite() {
        log::warn!("Non-finite transform on vehicle {}, skipping sync", vehicle.id);
        return SyncOutcome::Skipped;
    }

    vehicle.speed = linvel.dot(transform.forward());
    vehicle.transform = transform;
    SyncOutcome::Updated
}

/// Fixed-timestep scheduler for the physics world
#[derive(Debug, Clone)]
pub struct StepClock {
    pub policy: StepPolicy,
    accumulator: f32,
}

impl StepClock {
    pub fn new(policy: StepPolicy) -> Self {
        Self {
            policy,
            accumulator: 0.0,
        }
    }

    /// Number of fixed steps to run for a frame of `frame_dt` seconds
    ///
    /// `Accumulated` carries leftover time into the next frame; backlog beyond
    /// `max_substeps` is dropped rather than replayed.
    pub fn steps_for(&mut self, frame_dt: f32, tuning: &Tuning) -> u32 {
        match self.policy {
            StepPolicy::FixedPerFrame => 1,
            StepPolicy::Accumulated => {
                let frame_dt = if frame_dt.is_finite() {
                    frame_dt.clamp(0.0, tuning.max_frame_dt)
                } else {
                    0.0
                };
                self.accumulator += frame_dt;

                let mut steps = 0;
                while self.accumulator >= tuning.fixed_dt && steps < tuning.max_substeps {
                    self.accumulator -= tuning.fixed_dt;
                    steps += 1;
                }
                if steps == tuning.max_substeps && self.accumulator >= tuning.fixed_dt {
                    log::debug!("Dropping {:.3}s of physics backlog", self.accumulator);
                    self.accumulator %= tuning.fixed_dt;
                }
                steps
            }
        }
    }

    /// Leftover time not yet simulated
    pub fn pending(&self) -> f32 {
        self.accumulator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::pool::EntityId;
    use crate::sim::state::VehicleKind;

    fn vehicle(world: &mut PhysicsWorld, tuning: &Tuning, z: f32, speed: f32) -> Vehicle {
        let transform = Transform::from_position_yaw(
            Vec3::new(0.0, tuning.vehicle_half_extents[1], z),
            0.0,
        );
        let body = world.insert_vehicle_body(&transform, speed, tuning.vehicle_half_extents);
        Vehicle {
            id: EntityId(1),
            kind: VehicleKind::Traffic,
            transform,
            speed,
            controls: Controls::default(),
            body,
            remove: false,
        }
    }

    #[test]
    fn test_world_has_ground_only() {
        let world = PhysicsWorld::new(&Tuning::default());
        assert_eq!(world.body_count(), 1);
        assert!(world.contains(world.ground()));
    }

    #[test]
    fn test_insert_and_remove_body() {
        let tuning = Tuning::default();
        let mut world = PhysicsWorld::new(&tuning);
        let v = vehicle(&mut world, &tuning, 0.0, 0.0);
        assert_eq!(world.body_count(), 2);
        assert_eq!(world.collider_count(), 2);

        assert!(world.remove_body(v.body));
        assert!(!world.remove_body(v.body));
        assert_eq!(world.body_count(), 1);
        assert_eq!(world.collider_count(), 1);
    }

    #[test]
    fn test_falling_body_lands_on_ground() {
        let tuning = Tuning::default();
        let mut world = PhysicsWorld::new(&tuning);
        let transform = Transform::from_position_yaw(Vec3::new(0.0, 5.0, 0.0), 0.0);
        let handle = world.insert_vehicle_body(&transform, 0.0, tuning.vehicle_half_extents);

        for _ in 0..240 {
            world.step(tuning.fixed_dt);
        }

        let y = world.body(handle).unwrap().translation().y;
        assert!(y < 5.0, "body should fall");
        assert!(y > 0.0, "ground plane should stop the fall, got {y}");
    }

    #[test]
    fn test_throttle_accelerates_forward() {
        let tuning = Tuning::default();
        let mut world = PhysicsWorld::new(&tuning);
        let mut v = vehicle(&mut world, &tuning, 0.0, 0.0);
        v.controls.throttle = true;

        for _ in 0..60 {
            let body = world.body_mut(v.body).unwrap();
            drive(body, &v.controls, &tuning.player_drive, tuning.fixed_dt);
            world.step(tuning.fixed_dt);
        }

        assert_eq!(sync_vehicle(&world, &mut v), SyncOutcome::Updated);
        // one second at 15 u/s² from rest
        assert!((v.speed - 15.0).abs() < 0.5, "speed {}", v.speed);
        assert!(v.transform.position.z > 5.0);
        assert!(v.transform.position.x.abs() < 1e-3);
    }

    #[test]
    fn test_drive_clamps_to_max_speed() {
        let tuning = Tuning::default();
        let mut world = PhysicsWorld::new(&tuning);
        let v = vehicle(&mut world, &tuning, 0.0, 100.0);
        let body = world.body_mut(v.body).unwrap();
        drive(body, &Controls::default(), &tuning.traffic_drive, tuning.fixed_dt);
        assert!(body.linvel().z <= tuning.traffic_drive.max_speed + 1e-4);
    }

    #[test]
    fn test_steer_left_turns_toward_positive_x() {
        let tuning = Tuning::default();
        let mut world = PhysicsWorld::new(&tuning);
        let mut v = vehicle(&mut world, &tuning, 0.0, 20.0);
        v.controls = Controls {
            throttle: true,
            steer_left: true,
            ..Default::default()
        };
        for _ in 0..30 {
            let body = world.body_mut(v.body).unwrap();
            drive(body, &v.controls, &tuning.player_drive, tuning.fixed_dt);
            world.step(tuning.fixed_dt);
        }
        sync_vehicle(&world, &mut v);
        assert!(v.transform.yaw() > 0.0);
        assert!(v.transform.position.x > 0.0);
    }

    #[test]
    fn test_sync_skips_non_finite() {
        let tuning = Tuning::default();
        let mut world = PhysicsWorld::new(&tuning);
        let mut v = vehicle(&mut world, &tuning, 3.0, 0.0);
        let before = v.transform;
        world
            .body_mut(v.body)
            .unwrap()
            .set_translation(vector![f32::NAN, 0.0, 0.0], false);

        assert_eq!(sync_vehicle(&world, &mut v), SyncOutcome::Skipped);
        assert_eq!(v.transform, before);
    }

    #[test]
    fn test_sync_missing_body() {
        let tuning = Tuning::default();
        let mut world = PhysicsWorld::new(&tuning);
        let mut v = vehicle(&mut world, &tuning, 0.0, 0.0);
        world.remove_body(v.body);
        assert_eq!(sync_vehicle(&world, &mut v), SyncOutcome::MissingBody);
    }

    #[test]
    fn test_heal_orphans_keeps_ground_and_live() {
        let tuning = Tuning::default();
        let mut world = PhysicsWorld::new(&tuning);
        let live = vehicle(&mut world, &tuning, 0.0, 0.0);
        let _orphan = vehicle(&mut world, &tuning, 10.0, 0.0);

        let owned: HashSet<_> = [live.body].into_iter().collect();
        assert_eq!(world.heal_orphans(&owned), 1);
        assert_eq!(world.body_count(), 2);
        assert!(world.contains(live.body));
        assert!(world.contains(world.ground()));
        assert_eq!(world.heal_orphans(&owned), 0);
    }

    #[test]
    fn test_accumulator_carries_leftover() {
        let tuning = Tuning::default();
        let mut clock = StepClock::new(StepPolicy::Accumulated);
        // Half a step: nothing yet
        assert_eq!(clock.steps_for(tuning.fixed_dt * 0.5, &tuning), 0);
        // Another half plus a bit: one step
        assert_eq!(clock.steps_for(tuning.fixed_dt * 0.6, &tuning), 1);
        assert!(clock.pending() > 0.0 && clock.pending() < tuning.fixed_dt);
        // Two steps worth
        let leftover = clock.pending();
        assert_eq!(clock.steps_for(tuning.fixed_dt * 2.0, &tuning), 2);
        assert!((clock.pending() - leftover).abs() < 1e-5);
    }

    #[test]
    fn test_accumulator_caps_substeps() {
        let tuning = Tuning::default();
        let mut clock = StepClock::new(StepPolicy::Accumulated);
        assert_eq!(clock.steps_for(1.0, &tuning), tuning.max_substeps);
        assert!(clock.pending() < tuning.fixed_dt);
        assert_eq!(clock.steps_for(f32::NAN, &tuning), 0);
        assert_eq!(clock.steps_for(-1.0, &tuning), 0);
    }

    #[test]
    fn test_fixed_per_frame_ignores_dt() {
        let tuning = Tuning::default();
        let mut clock = StepClock::new(StepPolicy::FixedPerFrame);
        assert_eq!(clock.steps_for(0.0, &tuning), 1);
        assert_eq!(clock.steps_for(1.0, &tuning), 1);
    }
}
