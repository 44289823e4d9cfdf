//! Shared harness: a coordinator wired to the mock driver and a shared
//! handle onto the mock routing backend, so tests can inspect routing
//! state after the fact.

use blare_core::{BackendKind, ErrorCode, KeySimulator, MemoryCatalog, Sound, SoundCatalog};
use blare_engine::{AudioEngine, MockDriver};
use blare_playback::{Context, Coordinator};
use blare_routing::{MockBackend, PlaybackApp, RecordingApp, RoutingBackend};
use std::sync::{Arc, Mutex};

/// Key simulator that records press/release calls
#[derive(Default)]
pub struct RecordingKeys {
    pub pressed: Mutex<Vec<i32>>,
    pub released: Mutex<Vec<i32>>,
}

impl KeySimulator for RecordingKeys {
    fn press_keys(&self, keys: &[i32]) {
        self.pressed.lock().unwrap().extend_from_slice(keys);
    }

    fn release_keys(&self, keys: &[i32]) {
        self.released.lock().unwrap().extend_from_slice(keys);
    }
}

/// Backend wrapper keeping the mock inspectable after handing ownership to
/// the context
pub struct SharedBackend(pub Arc<Mutex<MockBackend>>);

impl RoutingBackend for SharedBackend {
    fn kind(&self) -> BackendKind {
        self.0.lock().unwrap().kind()
    }

    fn sink_name(&self) -> &str {
        blare_routing::SINK_NAME
    }

    fn recording_apps(&self) -> Vec<Box<dyn RecordingApp>> {
        self.0.lock().unwrap().recording_apps()
    }

    fn playback_apps(&self) -> Vec<Box<dyn PlaybackApp>> {
        self.0.lock().unwrap().playback_apps()
    }

    fn recording_app(&self, name: &str) -> Option<Box<dyn RecordingApp>> {
        self.0.lock().unwrap().recording_app(name)
    }

    fn playback_app(&self, name: &str) -> Option<Box<dyn PlaybackApp>> {
        self.0.lock().unwrap().playback_app(name)
    }

    fn input_sound_to(&mut self, app: &dyn RecordingApp) -> bool {
        self.0.lock().unwrap().input_sound_to(app)
    }

    fn stop_sound_input(&mut self) -> bool {
        self.0.lock().unwrap().stop_sound_input()
    }

    fn passthrough_from(&mut self, app: &dyn PlaybackApp) -> bool {
        self.0.lock().unwrap().passthrough_from(app)
    }

    fn stop_passthrough(&mut self, name: &str) -> bool {
        self.0.lock().unwrap().stop_passthrough(name)
    }

    fn stop_all_passthrough(&mut self) -> bool {
        self.0.lock().unwrap().stop_all_passthrough()
    }

    fn currently_passed_through(&self) -> Vec<String> {
        self.0.lock().unwrap().currently_passed_through()
    }

    fn mute_input(&mut self, mute: bool) -> bool {
        self.0.lock().unwrap().mute_input(mute)
    }

    fn use_as_default(&mut self) -> bool {
        self.0.lock().unwrap().use_as_default()
    }

    fn revert_default(&mut self) -> bool {
        self.0.lock().unwrap().revert_default()
    }

    fn destroy(&mut self) -> bool {
        self.0.lock().unwrap().destroy()
    }
}

pub struct Fixture {
    pub driver: Arc<MockDriver>,
    pub backend: Arc<Mutex<MockBackend>>,
    pub catalog: Arc<MemoryCatalog>,
    pub keys: Arc<RecordingKeys>,
    pub ctx: Arc<Context>,
    pub coordinator: Coordinator,
}

impl Fixture {
    /// Drain everything currently in the error side channel
    pub fn errors(&self) -> Vec<ErrorCode> {
        self.coordinator.errors().try_iter().collect()
    }

    pub fn add_sound(&self, id: u32, name: &str) {
        let mut sound = Sound::new(id, format!("/clips/{name}.wav"));
        sound.name = name.to_string();
        self.catalog.insert(sound);
    }

    pub fn local_volume_of(&self, id: u32) -> Option<u8> {
        self.catalog.get(id).and_then(|s| s.local_volume)
    }
}

pub fn fixture() -> Fixture {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let driver = Arc::new(MockDriver::new());
    let engine = AudioEngine::new(driver.clone());

    let mut mock = MockBackend::new(BackendKind::PulseAudio);
    mock.add_recording_app("Discord", "discord", Some(4120));
    mock.add_recording_app("Telephony", "mumble", Some(5377));
    mock.add_playback_app("Music", "spotify", Some(9001));
    let backend = Arc::new(Mutex::new(mock));

    let catalog = Arc::new(MemoryCatalog::new());
    let keys = Arc::new(RecordingKeys::default());

    let ctx = Arc::new(
        Context::new(
            engine,
            Some(Box::new(SharedBackend(backend.clone()))),
            catalog.clone() as Arc<dyn SoundCatalog>,
        )
        .with_keys(keys.clone()),
    );
    let coordinator = Coordinator::new(ctx.clone());

    Fixture {
        driver,
        backend,
        catalog,
        keys,
        ctx,
        coordinator,
    }
}
