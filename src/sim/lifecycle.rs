//! Per-tick lifecycle transitions and pruning
//!
//! Evaluation only flags entities. Pruning runs afterwards as its own pass and
//! is the only place bodies are deregistered and the scene is told to drop
//! proxies.

use super::scene::Scene;
use super::state::{CoinState, Controls, SimEvent, SimulationState};

/// Spin coins and flag the ones collected or left too far away
pub fn evaluate_coins(state: &mut SimulationState, dt: f32) {
    let player = state.player_position();
    let tuning = &state.tuning;

    for coin in &mut state.coins {
        coin.spin = (coin.spin + tuning.coin_spin_rate * dt) % std::f32::consts::TAU;

        if coin.is_finished() {
            continue;
        }

        let distance = coin.position.distance(player);
        if distance < tuning.collect_radius {
            coin.state = CoinState::Collected;
            log::debug!("Collected coin {} at distance {:.2}", coin.id, distance);
        } else if distance > tuning.coin_despawn_radius {
            coin.state = CoinState::Expired;
            log::debug!("Expired coin {} at distance {:.1}", coin.id, distance);
        }
    }
}

/// Drive traffic autonomously and flag cars far from the player
pub fn evaluate_traffic(state: &mut SimulationState) {
    let player = state.player_position();
    let far = state.tuning.traffic_despawn_radius;

    for car in &mut state.traffic {
        // Cruise: hold the throttle and the spawn heading
        car.controls = Controls {
            throttle: true,
            ..Default::default()
        };

        if car.transform.position.distance(player) > far {
            car.remove = true;
        }
    }
}

/// Remove flagged coins, then flagged traffic (deregistering their bodies)
pub fn prune<S: Scene + ?Sized>(state: &mut SimulationState, scene: &mut S) {
    for coin in state.coins.compact() {
        scene.remove_entity(coin.id);
        if coin.is_collected() {
            state.stats.coins_collected += 1;
            state.events.push(SimEvent::CoinCollected { id: coin.id });
        } else {
            state.stats.coins_expired += 1;
            state.events.push(SimEvent::CoinExpired { id: coin.id });
        }
    }

    for car in state.traffic.compact() {
        if !state.physics.remove_body(car.body) {
            log::warn!("Traffic {} had no physics body at removal", car.id);
        }
        scene.remove_entity(car.id);
        log::debug!("Despawned traffic {}", car.id);
        state.stats.traffic_despawned += 1;
        state.events.push(SimEvent::TrafficDespawned { id: car.id });
    }
}
