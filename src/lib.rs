//! Endless Drive - simulation core of an endless-runner driving game
//!
//! Core modules:
//! - `sim`: Simulation loop (physics co-stepping, spawning, lifecycle, road recycling)
//! - `tuning`: Data-driven game balance

pub mod sim;
pub mod tuning;

pub use tuning::{DriveTuning, StepPolicy, Tuning, TuningError};

/// Game configuration constants (defaults for [`Tuning`])
pub mod consts {
    /// Fixed physics timestep (60 Hz)
    pub const FIXED_DT: f32 = 1.0 / 60.0;
    /// Maximum physics substeps per frame
    pub const MAX_SUBSTEPS: u32 = 4;
    /// Longest frame delta accepted before clamping (prevents spiral of death)
    pub const MAX_FRAME_DT: f32 = 0.25;

    /// Road ring
    pub const SEGMENT_COUNT: usize = 25;
    pub const SEGMENT_LENGTH: f32 = 10.0;
    pub const ROAD_WIDTH: f32 = 20.0;
    pub const LANE_COUNT: u32 = 4;

    /// How far ahead of the player new entities appear
    pub const LEAD_DISTANCE: f32 = 100.0;
    /// Spawn milestones one gate may catch up on in a single tick
    pub const SPAWN_CATCHUP_LIMIT: u32 = 8;

    /// Coins
    pub const COIN_INTERVAL: u32 = 20;
    pub const COIN_SPAWN_CHANCE: f32 = 0.8;
    pub const COIN_LATERAL_FRACTION: f32 = 0.45;
    pub const COIN_HEIGHT: f32 = 1.5;
    /// Cosmetic spin (radians per second)
    pub const COIN_SPIN_RATE: f32 = 1.5;
    pub const COLLECT_RADIUS: f32 = 5.0;
    pub const COIN_DESPAWN_RADIUS: f32 = 200.0;

    /// Traffic
    pub const TRAFFIC_INTERVAL: u32 = 50;
    pub const TRAFFIC_SPAWN_CHANCE: f32 = 0.6;
    pub const TRAFFIC_DESPAWN_RADIUS: f32 = 500.0;

    /// Vehicle collision box half extents (x, y, z)
    pub const VEHICLE_HALF_EXTENTS: [f32; 3] = [1.0, 0.6, 2.0];

    /// Gravity (m/s², along -Y)
    pub const GRAVITY: f32 = -9.81;
}

/// Lateral centre of a lane, lanes laid out left to right across the road
///
/// Lane 0 sits at the most negative x. Returns `None` for an out-of-range lane.
#[inline]
pub fn lane_offset(lane: u32, lane_count: u32, road_width: f32) -> Option<f32> {
    if lane >= lane_count {
        return None;
    }
    let lane_width = road_width / lane_count as f32;
    Some((lane as f32 + 0.5) * lane_width - road_width / 2.0)
}

/// Lanes in the upper half drive against the player
#[inline]
pub fn is_oncoming_lane(lane: u32, lane_count: u32) -> bool {
    lane >= lane_count / 2
}
