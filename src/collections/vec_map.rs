use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::ids::DenseId;

/// Dense map from an opaque id to a value.
///
/// Ids are handed out sequentially and a removed id is never reused within
/// one game, so iteration order is creation order on every peer. This is the
/// only map type the simulation iterates over; lockstep correctness depends
/// on that.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VecMap<K, V> {
    slots: Vec<Option<V>>,
    live: usize,
    #[serde(skip)]
    marker: PhantomData<K>,
}

impl<K, V> Default for VecMap<K, V> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            live: 0,
            marker: PhantomData,
        }
    }
}

impl<K: DenseId, V> VecMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: V) -> K {
        let id = K::from_index(self.slots.len());
        self.slots.push(Some(value));
        self.live += 1;
        id
    }

    pub fn next_id(&self) -> K {
        K::from_index(self.slots.len())
    }

    /// Panics on a dead or never-issued id; looking one up is a programmer
    /// error, not a recoverable condition.
    pub fn get(&self, id: K) -> &V {
        self.try_get(id).unwrap_or_else(|| {
            panic!("lookup of dead or unknown id {}", id.index());
        })
    }

    pub fn get_mut(&mut self, id: K) -> &mut V {
        self.try_get_mut(id).unwrap_or_else(|| {
            panic!("lookup of dead or unknown id {}", id.index());
        })
    }

    pub fn try_get(&self, id: K) -> Option<&V> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    pub fn try_get_mut(&mut self, id: K) -> Option<&mut V> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn contains(&self, id: K) -> bool {
        self.try_get(id).is_some()
    }

    /// Tombstones the slot. The id will not be issued again.
    pub fn remove(&mut self, id: K) -> Option<V> {
        let removed = self.slots.get_mut(id.index()).and_then(Option::take);
        if removed.is_some() {
            self.live -= 1;
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (K::from_index(i), v)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (K, &mut V)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|v| (K::from_index(i), v)))
    }

    pub fn ids(&self) -> Vec<K> {
        self.iter().map(|(id, _)| id).collect()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.slots.iter().filter_map(Option::as_ref)
    }
}
