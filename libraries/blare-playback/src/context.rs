//! Shared playback context
//!
//! All process-wide collaborators live here, constructed once at startup
//! and shared by `Arc`. The routing backend sits behind an `Option` because
//! it is torn down and rebuilt on a backend switch, and may be absent
//! entirely on systems without a sound server.

use crate::registry::SoundGroupRegistry;
use blare_core::{IconResolver, KeySimulator, NoopIcons, NoopKeys, Settings, SoundCatalog};
use blare_engine::AudioEngine;
use blare_routing::RoutingBackend;
use std::sync::{Arc, Mutex, RwLock};

pub struct Context {
    pub engine: AudioEngine,
    pub backend: Mutex<Option<Box<dyn RoutingBackend>>>,
    pub registry: SoundGroupRegistry,
    pub settings: RwLock<Settings>,
    pub catalog: Arc<dyn SoundCatalog>,
    pub keys: Arc<dyn KeySimulator>,
    pub icons: Arc<dyn IconResolver>,
}

impl Context {
    pub fn new(
        engine: AudioEngine,
        backend: Option<Box<dyn RoutingBackend>>,
        catalog: Arc<dyn SoundCatalog>,
    ) -> Self {
        Self {
            engine,
            backend: Mutex::new(backend),
            registry: SoundGroupRegistry::new(),
            settings: RwLock::new(Settings::default()),
            catalog,
            keys: Arc::new(NoopKeys),
            icons: Arc::new(NoopIcons),
        }
    }

    /// Replace the key simulator (hotkey collaborator)
    #[must_use]
    pub fn with_keys(mut self, keys: Arc<dyn KeySimulator>) -> Self {
        self.keys = keys;
        self
    }

    /// Replace the icon resolver
    #[must_use]
    pub fn with_icons(mut self, icons: Arc<dyn IconResolver>) -> Self {
        self.icons = icons;
        self
    }

    /// Run `f` with the backend locked, when one is installed
    pub fn with_backend<R>(&self, f: impl FnOnce(&mut dyn RoutingBackend) -> R) -> Option<R> {
        let mut guard = self.backend.lock().unwrap();
        guard.as_mut().map(|backend| f(backend.as_mut()))
    }

    /// Name of the active backend's virtual sink, if a backend is installed
    pub fn sink_name(&self) -> Option<String> {
        self.with_backend(|backend| backend.sink_name().to_string())
    }
}
