//! Mock routing backend
//!
//! Full contract over in-memory state, with per-capability failure
//! injection so error paths in the orchestration layer can be exercised
//! without a sound server.

use crate::app::{PlaybackApp, RecordingApp};
use crate::backend::{RoutingBackend, SINK_NAME};
use blare_core::BackendKind;
use std::collections::HashSet;

/// Failure-injection points, one per fallible capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    InputSoundTo,
    StopSoundInput,
    PassthroughFrom,
    StopPassthrough,
    MuteInput,
    UseAsDefault,
    RevertDefault,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MockApp {
    name: String,
    application: String,
    pid: Option<u32>,
    handle: u32,
}

impl RecordingApp for MockApp {
    fn name(&self) -> &str {
        &self.name
    }

    fn application(&self) -> &str {
        &self.application
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn handle(&self) -> u32 {
        self.handle
    }
}

impl PlaybackApp for MockApp {
    fn name(&self) -> &str {
        &self.name
    }

    fn application(&self) -> &str {
        &self.application
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn handle(&self) -> u32 {
        self.handle
    }
}

pub struct MockBackend {
    kind: BackendKind,
    recording: Vec<MockApp>,
    playback: Vec<MockApp>,
    failing: HashSet<Capability>,
    /// Names of recording apps currently redirected to the sink
    moved: Vec<String>,
    /// Names of playback apps currently mixed into the sink
    passthrough: Vec<String>,
    muted: bool,
    default_overridden: bool,
    destroyed: bool,
}

impl MockBackend {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            recording: Vec::new(),
            playback: Vec::new(),
            failing: HashSet::new(),
            moved: Vec::new(),
            passthrough: Vec::new(),
            muted: false,
            default_overridden: false,
            destroyed: false,
        }
    }

    /// Register an application visible through `recording_apps`
    pub fn add_recording_app(&mut self, name: &str, application: &str, pid: Option<u32>) {
        let handle = (self.recording.len() + 1) as u32;
        self.recording.push(MockApp {
            name: name.to_string(),
            application: application.to_string(),
            pid,
            handle,
        });
    }

    /// Register an application visible through `playback_apps`
    pub fn add_playback_app(&mut self, name: &str, application: &str, pid: Option<u32>) {
        let handle = (self.playback.len() + 100) as u32;
        self.playback.push(MockApp {
            name: name.to_string(),
            application: application.to_string(),
            pid,
            handle,
        });
    }

    /// Make every call through `capability` fail
    pub fn fail(&mut self, capability: Capability) {
        self.failing.insert(capability);
    }

    /// Clear a failure injection
    pub fn heal(&mut self, capability: Capability) {
        self.failing.remove(&capability);
    }

    /// Names of recording apps currently redirected to the sink
    pub fn moved(&self) -> &[String] {
        &self.moved
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_default_overridden(&self) -> bool {
        self.default_overridden
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn ok(&self, capability: Capability) -> bool {
        !self.failing.contains(&capability)
    }
}

impl RoutingBackend for MockBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn sink_name(&self) -> &str {
        SINK_NAME
    }

    fn recording_apps(&self) -> Vec<Box<dyn RecordingApp>> {
        self.recording
            .iter()
            .cloned()
            .map(|a| Box::new(a) as Box<dyn RecordingApp>)
            .collect()
    }

    fn playback_apps(&self) -> Vec<Box<dyn PlaybackApp>> {
        self.playback
            .iter()
            .cloned()
            .map(|a| Box::new(a) as Box<dyn PlaybackApp>)
            .collect()
    }

    fn recording_app(&self, name: &str) -> Option<Box<dyn RecordingApp>> {
        self.recording
            .iter()
            .find(|a| a.name == name)
            .cloned()
            .map(|a| Box::new(a) as Box<dyn RecordingApp>)
    }

    fn playback_app(&self, name: &str) -> Option<Box<dyn PlaybackApp>> {
        self.playback
            .iter()
            .find(|a| a.name == name)
            .cloned()
            .map(|a| Box::new(a) as Box<dyn PlaybackApp>)
    }

    fn input_sound_to(&mut self, app: &dyn RecordingApp) -> bool {
        if !self.ok(Capability::InputSoundTo) {
            return false;
        }
        let name = app.name().to_string();
        if !self.moved.contains(&name) {
            self.moved.push(name);
        }
        true
    }

    fn stop_sound_input(&mut self) -> bool {
        if !self.ok(Capability::StopSoundInput) {
            return false;
        }
        self.moved.clear();
        true
    }

    fn passthrough_from(&mut self, app: &dyn PlaybackApp) -> bool {
        if !self.ok(Capability::PassthroughFrom) {
            return false;
        }
        let name = app.name().to_string();
        if !self.passthrough.contains(&name) {
            self.passthrough.push(name);
        }
        true
    }

    fn stop_passthrough(&mut self, name: &str) -> bool {
        if !self.ok(Capability::StopPassthrough) {
            return false;
        }
        self.passthrough.retain(|n| n != name);
        true
    }

    fn stop_all_passthrough(&mut self) -> bool {
        if !self.ok(Capability::StopPassthrough) {
            return false;
        }
        self.passthrough.clear();
        true
    }

    fn currently_passed_through(&self) -> Vec<String> {
        self.passthrough.clone()
    }

    fn mute_input(&mut self, mute: bool) -> bool {
        if !self.ok(Capability::MuteInput) {
            return false;
        }
        self.muted = mute;
        true
    }

    fn use_as_default(&mut self) -> bool {
        if !self.ok(Capability::UseAsDefault) {
            return false;
        }
        self.default_overridden = true;
        true
    }

    fn revert_default(&mut self) -> bool {
        if !self.ok(Capability::RevertDefault) {
            return false;
        }
        self.default_overridden = false;
        true
    }

    fn destroy(&mut self) -> bool {
        if self.destroyed {
            return true;
        }
        self.destroyed = true;
        self.moved.clear();
        self.passthrough.clear();
        self.muted = false;
        self.default_overridden = false;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend_with_apps() -> MockBackend {
        let mut backend = MockBackend::new(BackendKind::PulseAudio);
        backend.add_recording_app("Discord", "discord", Some(4120));
        backend.add_playback_app("Music", "spotify", None);
        backend
    }

    #[test]
    fn redirect_and_revert_round_trip() {
        let mut backend = backend_with_apps();
        let app = backend.recording_app("Discord").unwrap();
        assert!(backend.input_sound_to(app.as_ref()));
        assert_eq!(backend.moved(), ["Discord"]);

        assert!(backend.stop_sound_input());
        assert!(backend.moved().is_empty());
    }

    #[test]
    fn passthrough_bookkeeping() {
        let mut backend = backend_with_apps();
        let app = backend.playback_app("Music").unwrap();
        assert!(backend.passthrough_from(app.as_ref()));
        assert_eq!(backend.currently_passed_through(), ["Music"]);

        // Unknown name is a no-op, not a failure
        assert!(backend.stop_passthrough("Nope"));
        assert_eq!(backend.currently_passed_through(), ["Music"]);

        assert!(backend.stop_passthrough("Music"));
        assert!(backend.currently_passed_through().is_empty());
    }

    #[test]
    fn failure_injection_flips_results() {
        let mut backend = backend_with_apps();
        backend.fail(Capability::MuteInput);
        assert!(!backend.mute_input(true));
        assert!(!backend.is_muted());

        backend.heal(Capability::MuteInput);
        assert!(backend.mute_input(true));
        assert!(backend.is_muted());
    }

    #[test]
    fn destroy_reverts_everything_once() {
        let mut backend = backend_with_apps();
        let app = backend.recording_app("Discord").unwrap();
        backend.input_sound_to(app.as_ref());
        backend.mute_input(true);
        backend.use_as_default();

        assert!(backend.destroy());
        assert!(backend.moved().is_empty());
        assert!(!backend.is_muted());
        assert!(!backend.is_default_overridden());
        // Second destroy is a no-op
        assert!(backend.destroy());
    }
}
