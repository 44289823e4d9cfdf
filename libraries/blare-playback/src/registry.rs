//! Local/remote sound pairing registry
//!
//! One logical clip played to two destinations yields two engine instances;
//! this registry keeps the local id mapped to its remote twin. Mutated from
//! both the command thread and the engine's completion path, so every
//! access goes through a short mutex critical section. Callers must release
//! the scoped view before any engine or backend call.

use blare_core::PlayingSoundId;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct SoundGroupRegistry {
    map: Mutex<HashMap<PlayingSoundId, PlayingSoundId>>,
}

impl SoundGroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a local/remote pairing, replacing any previous remote
    pub fn insert(&self, local: PlayingSoundId, remote: PlayingSoundId) {
        self.map.lock().unwrap().insert(local, remote);
    }

    /// Remove a pairing; returns the remote id if one existed
    pub fn erase(&self, local: PlayingSoundId) -> Option<PlayingSoundId> {
        self.map.lock().unwrap().remove(&local)
    }

    /// Remote twin of a local id, if paired
    pub fn remote_of(&self, local: PlayingSoundId) -> Option<PlayingSoundId> {
        self.map.lock().unwrap().get(&local).copied()
    }

    /// Brief guarded access to the whole map
    pub fn scoped<R>(&self, f: impl FnOnce(&mut HashMap<PlayingSoundId, PlayingSoundId>) -> R) -> R {
        f(&mut self.map.lock().unwrap())
    }

    /// Unguarded copy for iteration over slow per-entry operations
    pub fn snapshot(&self) -> Vec<(PlayingSoundId, PlayingSoundId)> {
        self.map.lock().unwrap().iter().map(|(l, r)| (*l, *r)).collect()
    }

    pub fn clear(&self) {
        self.map.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.map.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.lock().unwrap().is_empty()
    }
}
