//! Simulation state and entity types
//!
//! Everything the loop mutates lives in [`SimulationState`]; there are no
//! module-level singletons. Entities are plain data, the renderer only ever
//! sees them through [`RenderProxy`] snapshots.

use glam::{Quat, Vec3};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use rapier3d::prelude::RigidBodyHandle;
use serde::{Deserialize, Serialize};

use super::physics::{PhysicsWorld, StepClock};
use super::pool::{EntityId, EntityPool, Pooled};
use super::road;
use super::scene::{EntityKind, RenderProxy, RenderSnapshot};
use super::spawner::DistanceCounter;
use crate::tuning::{DriveTuning, Tuning};

/// Position and orientation of an entity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl Transform {
    pub fn from_position_yaw(position: Vec3, yaw: f32) -> Self {
        Self {
            position,
            rotation: Quat::from_rotation_y(yaw),
        }
    }

    /// Heading the entity faces (+Z at zero yaw)
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }

    /// Rotation about +Y, in (-π, π]
    pub fn yaw(&self) -> f32 {
        let f = self.forward();
        f.x.atan2(f.z)
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.rotation.is_finite()
    }
}

/// One slot of the road ring. Created once, only ever repositioned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadSegment {
    pub id: EntityId,
    pub position: Vec3,
}

/// Coin lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoinState {
    Active,
    /// Picked up by the player (scores)
    Collected,
    /// Left behind or too far away (no score)
    Expired,
}

/// A collectible coin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coin {
    pub id: EntityId,
    pub position: Vec3,
    /// Cosmetic spin about +Y (radians)
    pub spin: f32,
    pub state: CoinState,
}

impl Coin {
    pub fn new(id: EntityId, position: Vec3, spin: f32) -> Self {
        Self {
            id,
            position,
            spin,
            state: CoinState::Active,
        }
    }

    pub fn is_collected(&self) -> bool {
        self.state == CoinState::Collected
    }

    /// Collected or expired; either way it is pruned this tick
    pub fn is_finished(&self) -> bool {
        self.state != CoinState::Active
    }

    pub fn transform(&self) -> Transform {
        Transform::from_position_yaw(self.position, self.spin)
    }
}

impl Pooled for Coin {
    fn id(&self) -> EntityId {
        self.id
    }

    fn is_removal_eligible(&self) -> bool {
        self.is_finished()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleKind {
    Player,
    Traffic,
}

/// Driver intents held by a vehicle between physics steps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Controls {
    pub throttle: bool,
    pub brake: bool,
    pub steer_left: bool,
    pub steer_right: bool,
}

impl Controls {
    /// -1 (right) .. +1 (left); both or neither cancel out
    pub fn steer_axis(&self) -> f32 {
        match (self.steer_left, self.steer_right) {
            (true, false) => 1.0,
            (false, true) => -1.0,
            _ => 0.0,
        }
    }
}

/// Player or traffic car; its physics body is authoritative for `transform`
#[derive(Debug, Clone)]
pub struct Vehicle {
    pub id: EntityId,
    pub kind: VehicleKind,
    pub transform: Transform,
    /// Signed speed along `transform.forward()`, read back from physics
    pub speed: f32,
    pub controls: Controls,
    /// Exclusively owned; deregistered when the vehicle is pruned
    pub body: RigidBodyHandle,
    pub remove: bool,
}

impl Vehicle {
    pub fn drive_tuning<'a>(&self, tuning: &'a Tuning) -> &'a DriveTuning {
        match self.kind {
            VehicleKind::Player => &tuning.player_drive,
            VehicleKind::Traffic => &tuning.traffic_drive,
        }
    }

    pub fn proxy(&self) -> RenderProxy {
        let kind = match self.kind {
            VehicleKind::Player => EntityKind::Player,
            VehicleKind::Traffic => EntityKind::Traffic,
        };
        RenderProxy {
            id: self.id,
            kind,
            transform: self.transform,
        }
    }
}

impl Pooled for Vehicle {
    fn id(&self) -> EntityId {
        self.id
    }

    fn is_removal_eligible(&self) -> bool {
        self.remove
    }
}

/// Things that happened during one tick (scoring / telemetry)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    CoinSpawned { id: EntityId },
    CoinCollected { id: EntityId },
    CoinExpired { id: EntityId },
    TrafficSpawned { id: EntityId, lane: u32, oncoming: bool },
    TrafficDespawned { id: EntityId },
    SpawnRejected,
    SegmentRecycled { id: EntityId },
    OrphanBodyRemoved,
}

/// Cumulative run statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub coins_collected: u64,
    pub coins_expired: u64,
    pub traffic_spawned: u64,
    pub traffic_despawned: u64,
    pub segments_recycled: u64,
    pub spawns_rejected: u64,
}

/// Complete simulation state
pub struct SimulationState {
    /// Run seed for reproducibility
    pub seed: u64,
    pub tuning: Tuning,
    pub(crate) rng: Pcg32,
    /// Simulation tick counter
    pub time_ticks: u64,
    pub physics: PhysicsWorld,
    pub clock: StepClock,
    /// Singleton, never pruned
    pub player: Vehicle,
    pub traffic: EntityPool<Vehicle>,
    pub coins: EntityPool<Coin>,
    pub segments: Vec<RoadSegment>,
    pub distance: DistanceCounter,
    pub stats: RunStats,
    /// Events from the most recent tick
    pub events: Vec<SimEvent>,
    /// Entities created this tick, not yet announced to the scene
    pub(crate) spawned: Vec<RenderProxy>,
    next_id: u32,
}

impl SimulationState {
    /// Create a new session with the given seed
    pub fn new(seed: u64, tuning: Tuning) -> Self {
        if let Err(e) = tuning.validate() {
            log::warn!("Running with invalid tuning: {e}");
        }

        let mut physics = PhysicsWorld::new(&tuning);
        let start = Vec3::new(0.0, tuning.vehicle_half_extents[1], 0.0);
        let body = physics.insert_vehicle_body(
            &Transform::from_position_yaw(start, 0.0),
            0.0,
            tuning.vehicle_half_extents,
        );
        let player = Vehicle {
            id: EntityId(0),
            kind: VehicleKind::Player,
            transform: Transform::from_position_yaw(start, 0.0),
            speed: 0.0,
            controls: Controls::default(),
            body,
            remove: false,
        };

        let mut state = Self {
            seed,
            clock: StepClock::new(tuning.step_policy),
            rng: Pcg32::seed_from_u64(seed),
            time_ticks: 0,
            physics,
            player,
            traffic: EntityPool::new(),
            coins: EntityPool::new(),
            segments: Vec::with_capacity(tuning.segment_count),
            distance: DistanceCounter::starting_at(start.z),
            stats: RunStats::default(),
            events: Vec::new(),
            spawned: Vec::new(),
            next_id: 1,
            tuning,
        };

        for z in road::initial_positions(start.z, state.tuning.segment_count, state.tuning.segment_length)
        {
            let id = state.next_entity_id();
            state.segments.push(RoadSegment {
                id,
                position: Vec3::new(0.0, 0.0, z),
            });
        }

        for i in 1..=state.tuning.initial_coins {
            let z = start.z + i as f32 * state.tuning.initial_coin_spacing;
            let coin = state.random_coin(z);
            state.coins.push(coin);
        }

        log::info!(
            "Session started: seed={}, segments={}, coins={}",
            seed,
            state.segments.len(),
            state.coins.len()
        );
        state
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn player_position(&self) -> Vec3 {
        self.player.transform.position
    }

    /// A coin at longitudinal `z` with a random on-road lateral offset
    pub(crate) fn random_coin(&mut self, z: f32) -> Coin {
        let half = self.tuning.coin_lateral_fraction * self.tuning.road_width;
        let x = if half > 0.0 {
            self.rng.random_range(-half..=half)
        } else {
            0.0
        };
        let spin = self.rng.random::<f32>() * std::f32::consts::PI;
        let id = self.next_entity_id();
        Coin::new(id, Vec3::new(x, self.tuning.coin_height, z), spin)
    }

    /// Announce every live entity to a freshly attached scene
    pub fn populate_scene<S: super::scene::Scene + ?Sized>(&self, scene: &mut S) {
        for proxy in self.snapshot().proxies {
            scene.add_entity(&proxy);
        }
    }

    /// Read-only view for the renderer
    pub fn snapshot(&self) -> RenderSnapshot {
        let mut proxies =
            Vec::with_capacity(self.segments.len() + self.coins.len() + self.traffic.len() + 1);
        proxies.extend(self.segments.iter().map(|s| RenderProxy {
            id: s.id,
            kind: EntityKind::RoadSegment,
            transform: Transform::from_position_yaw(s.position, 0.0),
        }));
        proxies.extend(self.coins.iter().map(|c| RenderProxy {
            id: c.id,
            kind: EntityKind::Coin,
            transform: c.transform(),
        }));
        proxies.push(self.player.proxy());
        proxies.extend(self.traffic.iter().map(Vehicle::proxy));
        RenderSnapshot {
            player: self.player.transform,
            proxies,
        }
    }
}
