//! Collaborator seams consumed by the playback layer
//!
//! Directory scanning, tab management, hotkey capture, and icon lookup live
//! outside the playback core. These traits are the surface the coordinator
//! consumes; [`MemoryCatalog`] is a complete in-memory catalog used by
//! embedders and tests.

use crate::types::{Sound, SoundId, TabId};
use std::collections::HashMap;
use std::sync::Mutex;

/// Read/update access to the clip catalog
///
/// The catalog owns `Sound` lifetimes. Volume setters persist the preference
/// on the stored sound and return the updated copy, or `None` when the id is
/// unknown.
pub trait SoundCatalog: Send + Sync {
    /// Look up a sound by id
    fn get(&self, id: SoundId) -> Option<Sound>;

    /// Persist a per-sound local volume override
    fn set_local_volume(&self, id: SoundId, volume: Option<u8>) -> Option<Sound>;

    /// Persist a per-sound remote volume override
    fn set_remote_volume(&self, id: SoundId, volume: Option<u8>) -> Option<Sound>;

    /// All sound ids currently in the catalog
    fn all_ids(&self) -> Vec<SoundId>;

    /// Sound ids on a tab, or `None` if the tab does not exist
    fn tab_ids(&self, tab: TabId) -> Option<Vec<SoundId>>;
}

/// Simulated key press/release for push-to-talk
pub trait KeySimulator: Send + Sync {
    /// Press and hold the given scancodes
    fn press_keys(&self, keys: &[i32]);

    /// Release previously pressed scancodes
    fn release_keys(&self, keys: &[i32]);
}

/// Resolve an application icon by process id
pub trait IconResolver: Send + Sync {
    /// Base64-encoded icon data, or `None` when unresolvable
    fn icon(&self, pid: u32) -> Option<String>;
}

/// Key simulator that does nothing (headless setups, tests)
#[derive(Debug, Default)]
pub struct NoopKeys;

impl KeySimulator for NoopKeys {
    fn press_keys(&self, _keys: &[i32]) {}
    fn release_keys(&self, _keys: &[i32]) {}
}

/// Icon resolver that never resolves anything
#[derive(Debug, Default)]
pub struct NoopIcons;

impl IconResolver for NoopIcons {
    fn icon(&self, _pid: u32) -> Option<String> {
        None
    }
}

/// In-memory catalog implementation
///
/// Insertion order is preserved per tab so "random sound on tab" draws from
/// a stable population.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    inner: Mutex<CatalogState>,
}

#[derive(Debug, Default)]
struct CatalogState {
    sounds: HashMap<SoundId, Sound>,
    order: Vec<SoundId>,
    tabs: HashMap<TabId, Vec<SoundId>>,
}

impl MemoryCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a sound
    pub fn insert(&self, sound: Sound) {
        let mut state = self.inner.lock().unwrap();
        if !state.sounds.contains_key(&sound.id) {
            state.order.push(sound.id);
        }
        state.sounds.insert(sound.id, sound);
    }

    /// Assign the sounds belonging to a tab
    pub fn set_tab(&self, tab: TabId, ids: Vec<SoundId>) {
        self.inner.lock().unwrap().tabs.insert(tab, ids);
    }

    /// Remove a sound; `true` if it existed
    pub fn remove(&self, id: SoundId) -> bool {
        let mut state = self.inner.lock().unwrap();
        state.order.retain(|other| *other != id);
        for ids in state.tabs.values_mut() {
            ids.retain(|other| *other != id);
        }
        state.sounds.remove(&id).is_some()
    }
}

impl SoundCatalog for MemoryCatalog {
    fn get(&self, id: SoundId) -> Option<Sound> {
        self.inner.lock().unwrap().sounds.get(&id).cloned()
    }

    fn set_local_volume(&self, id: SoundId, volume: Option<u8>) -> Option<Sound> {
        let mut state = self.inner.lock().unwrap();
        let sound = state.sounds.get_mut(&id)?;
        sound.local_volume = volume;
        Some(sound.clone())
    }

    fn set_remote_volume(&self, id: SoundId, volume: Option<u8>) -> Option<Sound> {
        let mut state = self.inner.lock().unwrap();
        let sound = state.sounds.get_mut(&id)?;
        sound.remote_volume = volume;
        Some(sound.clone())
    }

    fn all_ids(&self) -> Vec<SoundId> {
        self.inner.lock().unwrap().order.clone()
    }

    fn tab_ids(&self, tab: TabId) -> Option<Vec<SoundId>> {
        self.inner.lock().unwrap().tabs.get(&tab).cloned()
    }
}
