//! Road ring recycling
//!
//! A fixed ring of segments follows the player: any segment further than half
//! the ring length away is teleported by exactly one ring length. Nothing is
//! allocated or destroyed after startup.

use super::pool::EntityId;
use super::state::RoadSegment;

/// Segment z positions for a contiguous ring centred on `center_z`
pub fn initial_positions(center_z: f32, count: usize, length: f32) -> Vec<f32> {
    let first = center_z - (count as f32 - 1.0) * length / 2.0;
    (0..count).map(|i| first + i as f32 * length).collect()
}

/// Teleport segments that fell out of the window; returns the ids moved
pub fn recycle(segments: &mut [RoadSegment], player_z: f32, length: f32) -> Vec<EntityId> {
    let ring = segments.len() as f32 * length;
    let half = ring / 2.0;
    let mut moved = Vec::new();

    if !player_z.is_finite() {
        return moved;
    }

    for segment in segments.iter_mut() {
        let dz = player_z - segment.position.z;
        if dz.abs() > half {
            let sign = if dz > 0.0 { 1.0 } else { -1.0 };
            segment.position.z += sign * ring;
            log::debug!("Recycled segment {} to z={:.1}", segment.id, segment.position.z);
            moved.push(segment.id);
        }
    }
    moved
}
