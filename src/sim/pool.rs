//! Ordered entity collections with deferred removal
//!
//! Update passes only flag entities; [`EntityPool::compact`] removes them in a
//! separate pass so no element is skipped or visited twice while iterating.

use serde::{Deserialize, Serialize};

/// Stable identifier for a simulation entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An entity that can live in an [`EntityPool`]
pub trait Pooled {
    fn id(&self) -> EntityId;
    /// Flagged for pruning but not yet removed
    fn is_removal_eligible(&self) -> bool;
}

/// Entities in spawn order
#[derive(Debug, Clone)]
pub struct EntityPool<T> {
    items: Vec<T>,
}

impl<T> Default for EntityPool<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Pooled> EntityPool<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entity: T) {
        self.items.push(entity);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.items.iter().find(|e| e.id() == id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        self.items.iter_mut().find(|e| e.id() == id)
    }

    /// Remove a single entity; removing a missing id is a no-op
    pub fn remove(&mut self, id: EntityId) -> Option<T> {
        let idx = self.items.iter().position(|e| e.id() == id)?;
        Some(self.items.remove(idx))
    }

    /// Extract every removal-eligible entity, preserving order on both sides
    pub fn compact(&mut self) -> Vec<T> {
        if !self.items.iter().any(Pooled::is_removal_eligible) {
            return Vec::new();
        }
        let (removed, kept): (Vec<T>, Vec<T>) = std::mem::take(&mut self.items)
            .into_iter()
            .partition(Pooled::is_removal_eligible);
        self.items = kept;
        removed
    }
}

impl<'a, T> IntoIterator for &'a EntityPool<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<'a, T> IntoIterator for &'a mut EntityPool<T> {
    type Item = &'a mut T;
    type IntoIter = std::slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter_mut()
    }
}
