//! Simulation module
//!
//! All gameplay logic lives here:
//! - Fixed physics timestep, decoupled from render frame rate
//! - Seeded RNG only
//! - Stable iteration order (spawn order)
//! - No rendering or platform dependencies; the renderer sees a [`Scene`]

pub mod lifecycle;
pub mod physics;
pub mod pool;
pub mod road;
pub mod scene;
pub mod spawner;
pub mod state;
pub mod tick;

pub use physics::{PhysicsWorld, StepClock, SyncOutcome};
pub use pool::{EntityId, EntityPool, Pooled};
pub use scene::{EntityKind, NullScene, RenderProxy, RenderSnapshot, Scene};
pub use spawner::{DistanceCounter, SpawnError};
pub use state::{
    Coin, CoinState, Controls, RoadSegment, RunStats, SimEvent, SimulationState, Transform,
    Vehicle, VehicleKind,
};
pub use tick::{TickInput, tick};
