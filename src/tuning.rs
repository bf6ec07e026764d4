//! Game balance and simulation parameters
//!
//! Every spawn chance, radius and interval the loop uses lives here so it can
//! be tuned for feel from a JSON file instead of recompiling.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::*;

/// Errors loading or validating a [`Tuning`]
#[derive(Debug, Error)]
pub enum TuningError {
    #[error("Tuning parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid tuning value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// How the physics world is advanced relative to render frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StepPolicy {
    /// Accumulate frame time and run whole fixed steps (capped at `max_substeps`)
    #[default]
    Accumulated,
    /// Exactly one fixed step per frame regardless of frame time
    FixedPerFrame,
}

/// Longitudinal and steering response of a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriveTuning {
    /// Top forward speed (units/s)
    pub max_speed: f32,
    /// Throttle acceleration (units/s²)
    pub acceleration: f32,
    /// Brake deceleration (units/s²)
    pub braking: f32,
    /// Deceleration with no pedal pressed (units/s²)
    pub coast_decel: f32,
    /// Yaw rate at top speed (radians/s)
    pub steer_rate: f32,
}

impl DriveTuning {
    pub fn player() -> Self {
        Self {
            max_speed: 40.0,
            acceleration: 15.0,
            braking: 30.0,
            coast_decel: 4.0,
            steer_rate: 1.2,
        }
    }

    pub fn traffic() -> Self {
        Self {
            max_speed: 12.0,
            acceleration: 8.0,
            braking: 20.0,
            coast_decel: 2.0,
            steer_rate: 0.8,
        }
    }
}

/// Complete simulation tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    // === Road ===
    pub segment_count: usize,
    pub segment_length: f32,
    pub road_width: f32,
    pub lane_count: u32,

    // === Spawning ===
    pub lead_distance: f32,
    pub coin_interval: u32,
    pub coin_spawn_chance: f32,
    /// Coins spawn within ±(fraction × width) of the road centre
    pub coin_lateral_fraction: f32,
    pub coin_height: f32,
    pub traffic_interval: u32,
    pub traffic_spawn_chance: f32,
    /// Coins laid out ahead of the player at startup
    pub initial_coins: u32,
    pub initial_coin_spacing: f32,
    /// Most spawns per gate a single tick may catch up on
    pub spawn_catchup_limit: u32,

    // === Lifecycle ===
    pub coin_spin_rate: f32,
    pub collect_radius: f32,
    pub coin_despawn_radius: f32,
    pub traffic_despawn_radius: f32,

    // === Vehicles ===
    pub player_drive: DriveTuning,
    pub traffic_drive: DriveTuning,
    pub vehicle_half_extents: [f32; 3],

    // === Physics ===
    pub gravity: f32,
    pub fixed_dt: f32,
    pub max_substeps: u32,
    pub max_frame_dt: f32,
    pub step_policy: StepPolicy,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            segment_count: SEGMENT_COUNT,
            segment_length: SEGMENT_LENGTH,
            road_width: ROAD_WIDTH,
            lane_count: LANE_COUNT,

            lead_distance: LEAD_DISTANCE,
            coin_interval: COIN_INTERVAL,
            coin_spawn_chance: COIN_SPAWN_CHANCE,
            coin_lateral_fraction: COIN_LATERAL_FRACTION,
            coin_height: COIN_HEIGHT,
            traffic_interval: TRAFFIC_INTERVAL,
            traffic_spawn_chance: TRAFFIC_SPAWN_CHANCE,
            initial_coins: 8,
            initial_coin_spacing: 2.0 * SEGMENT_LENGTH,
            spawn_catchup_limit: SPAWN_CATCHUP_LIMIT,

            coin_spin_rate: COIN_SPIN_RATE,
            collect_radius: COLLECT_RADIUS,
            coin_despawn_radius: COIN_DESPAWN_RADIUS,
            traffic_despawn_radius: TRAFFIC_DESPAWN_RADIUS,

            player_drive: DriveTuning::player(),
            traffic_drive: DriveTuning::traffic(),
            vehicle_half_extents: VEHICLE_HALF_EXTENTS,

            gravity: GRAVITY,
            fixed_dt: FIXED_DT,
            max_substeps: MAX_SUBSTEPS,
            max_frame_dt: MAX_FRAME_DT,
            step_policy: StepPolicy::Accumulated,
        }
    }
}

impl Tuning {
    /// Parse and validate a tuning document; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self, TuningError> {
        let tuning: Self = serde_json::from_str(json)?;
        tuning.validate()?;
        Ok(tuning)
    }

    pub fn to_json(&self) -> Result<String, TuningError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Full length of the road ring
    pub fn ring_length(&self) -> f32 {
        self.segment_count as f32 * self.segment_length
    }

    /// Reject values the loop cannot run with
    pub fn validate(&self) -> Result<(), TuningError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> TuningError {
            TuningError::Invalid {
                field,
                reason: reason.into(),
            }
        }

        if self.segment_count == 0 {
            return Err(invalid("segment_count", "must be at least 1"));
        }
        if !(self.segment_length > 0.0) {
            return Err(invalid("segment_length", "must be positive"));
        }
        if !(self.road_width > 0.0) {
            return Err(invalid("road_width", "must be positive"));
        }
        if self.coin_interval == 0 {
            return Err(invalid("coin_interval", "must be at least 1"));
        }
        if self.traffic_interval == 0 {
            return Err(invalid("traffic_interval", "must be at least 1"));
        }
        if self.spawn_catchup_limit == 0 {
            return Err(invalid("spawn_catchup_limit", "must be at least 1"));
        }
        for (field, chance) in [
            ("coin_spawn_chance", self.coin_spawn_chance),
            ("traffic_spawn_chance", self.traffic_spawn_chance),
        ] {
            if !(0.0..=1.0).contains(&chance) {
                return Err(invalid(field, format!("{chance} is not a probability")));
            }
        }
        if !(0.0..=0.5).contains(&self.coin_lateral_fraction) {
            return Err(invalid("coin_lateral_fraction", "must keep coins on the road (0..=0.5)"));
        }
        if !(self.fixed_dt > 0.0) {
            return Err(invalid("fixed_dt", "must be positive"));
        }
        if self.max_substeps == 0 {
            return Err(invalid("max_substeps", "must be at least 1"));
        }
        // One tick can never move the player further than the ring length,
        // otherwise a recycled segment could land outside the window.
        let max_drift = self.player_drive.max_speed * self.fixed_dt * self.max_substeps as f32;
        if max_drift >= self.ring_length() {
            return Err(invalid(
                "segment_count",
                format!(
                    "ring length {} must exceed max per-tick drift {max_drift}",
                    self.ring_length()
                ),
            ));
        }
        if self.vehicle_half_extents.iter().any(|h| !(*h > 0.0)) {
            return Err(invalid("vehicle_half_extents", "must be positive"));
        }
        Ok(())
    }
}
