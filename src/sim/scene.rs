//! Renderer-facing adapter
//!
//! The core never renders. It tells a [`Scene`] when entities appear and
//! disappear, and exposes transforms through [`RenderSnapshot`].

use serde::{Deserialize, Serialize};

use super::pool::EntityId;
use super::state::Transform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    RoadSegment,
    Coin,
    Player,
    Traffic,
}

/// Renderable stand-in for a simulation entity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderProxy {
    pub id: EntityId,
    pub kind: EntityKind,
    pub transform: Transform,
}

/// Per-frame read-only view of the simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSnapshot {
    /// Camera follow target
    pub player: Transform,
    pub proxies: Vec<RenderProxy>,
}

/// External scene graph the simulation reports entity lifetimes to
pub trait Scene {
    fn add_entity(&mut self, proxy: &RenderProxy);
    fn remove_entity(&mut self, id: EntityId);
}

/// Scene that ignores everything (headless runs)
#[derive(Debug, Default)]
pub struct NullScene;

impl Scene for NullScene {
    fn add_entity(&mut self, _proxy: &RenderProxy) {}
    fn remove_entity(&mut self, _id: EntityId) {}
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;

    use super::*;

    /// Tracks which entities a renderer would currently hold
    #[derive(Debug, Default)]
    pub struct RecordingScene {
        pub live: HashMap<EntityId, EntityKind>,
        pub added: usize,
        pub removed: usize,
    }

    impl RecordingScene {
        pub fn count(&self, kind: EntityKind) -> usize {
            self.live.values().filter(|k| **k == kind).count()
        }
    }

    impl Scene for RecordingScene {
        fn add_entity(&mut self, proxy: &RenderProxy) {
            let prev = self.live.insert(proxy.id, proxy.kind);
            assert!(prev.is_none(), "entity {} added twice", proxy.id);
            self.added += 1;
        }

        fn remove_entity(&mut self, id: EntityId) {
            assert!(self.live.remove(&id).is_some(), "entity {id} was never added");
            self.removed += 1;
        }
    }
}
