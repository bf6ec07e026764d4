//! Endless Drive headless runner
//!
//! Drives a scripted session through the simulation core and logs what the
//! renderer would have been told. Usage: `endless-drive [tuning.json]`

use endless_drive::Tuning;
use endless_drive::consts::FIXED_DT;
use endless_drive::sim::{EntityId, RenderProxy, Scene, SimulationState, TickInput, tick};

/// Session length in frames (60 fps)
const FRAMES: u32 = 60 * 90;
const SEED: u64 = 20_240_601;

/// Scene that logs entity lifetimes instead of drawing them
#[derive(Default)]
struct LogScene {
    live: usize,
}

impl Scene for LogScene {
    fn add_entity(&mut self, proxy: &RenderProxy) {
        self.live += 1;
        log::trace!("scene add {} {:?} at {:?}", proxy.id, proxy.kind, proxy.transform.position);
    }

    fn remove_entity(&mut self, id: EntityId) {
        self.live = self.live.saturating_sub(1);
        log::trace!("scene remove {}", id);
    }
}

fn load_tuning() -> Tuning {
    let Some(path) = std::env::args().nth(1) else {
        return Tuning::default();
    };
    match std::fs::read_to_string(&path) {
        Ok(json) => match Tuning::from_json(&json) {
            Ok(tuning) => {
                log::info!("Loaded tuning from {}", path);
                tuning
            }
            Err(e) => {
                log::error!("Bad tuning file {}: {}", path, e);
                Tuning::default()
            }
        },
        Err(e) => {
            log::error!("Cannot read {}: {}", path, e);
            Tuning::default()
        }
    }
}

/// Hold the throttle; weave one lane over and back every few seconds
fn scripted_input(frame: u32) -> TickInput {
    let phase = frame % 600;
    TickInput {
        accelerate: true,
        steer_left: (300..320).contains(&phase),
        steer_right: (340..360).contains(&phase),
        brake: false,
    }
}

fn main() {
    env_logger::init();
    log::info!("Endless Drive (headless) starting...");

    let mut state = SimulationState::new(SEED, load_tuning());
    let mut scene = LogScene::default();
    state.populate_scene(&mut scene);

    for frame in 0..FRAMES {
        tick(&mut state, &scripted_input(frame), FIXED_DT, &mut scene);

        if frame % 600 == 0 {
            let pos = state.player_position();
            log::info!(
                "t={:>3}s z={:>8.1} x={:>5.1} speed={:>5.1} coins={} traffic={} scene={}",
                frame / 60,
                pos.z,
                pos.x,
                state.player.speed,
                state.coins.len(),
                state.traffic.len(),
                scene.live
            );
        }
    }

    let stats = &state.stats;
    log::info!(
        "Session over: distance={} collected={} expired={} traffic {}/{} recycled={} rejected={}",
        state.distance.value(),
        stats.coins_collected,
        stats.coins_expired,
        stats.traffic_spawned,
        stats.traffic_despawned,
        stats.segments_recycled,
        stats.spawns_rejected
    );
    match serde_json::to_string(stats) {
        Ok(json) => println!("{json}"),
        Err(e) => log::error!("Could not serialize stats: {}", e),
    }
}
