//! Process-wide playback settings

use serde::{Deserialize, Serialize};

/// Routing backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// PulseAudio (also covers pipewire-pulse compatibility setups)
    PulseAudio,

    /// Native PipeWire graph rewiring
    PipeWire,
}

impl BackendKind {
    /// Human-readable name of the backend
    pub fn name(&self) -> &'static str {
        match self {
            Self::PulseAudio => "PulseAudio",
            Self::PipeWire => "PipeWire",
        }
    }
}

/// Process-wide settings
///
/// A single instance lives in the shared context and is mutated only through
/// `Coordinator::change_settings`, which diffs against the previous value to
/// decide which side effects to apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Allow multiple sounds to play at once; when off, starting a sound
    /// stops everything currently playing first
    pub allow_overlapping: bool,

    /// Mute the system default capture source while any sound plays
    pub mute_during_playback: bool,

    /// Key scancodes to hold down for the duration of playback
    pub push_to_talk_keys: Vec<i32>,

    /// Ordered list of application names whose capture input is redirected
    /// to the virtual sink while sounds play
    pub outputs: Vec<String>,

    /// Route the soundboard output as the system default capture source,
    /// removing the need for per-app redirection
    pub use_as_default_device: bool,

    /// Permit more than one entry in `outputs`
    pub allow_multiple_outputs: bool,

    /// Default local volume (0-100), used when a sound has no override
    pub local_volume: u8,

    /// Default remote volume (0-100), used when a sound has no override
    pub remote_volume: u8,

    /// Active routing backend
    pub audio_backend: BackendKind,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            allow_overlapping: true,
            mute_during_playback: false,
            push_to_talk_keys: Vec::new(),
            outputs: Vec::new(),
            use_as_default_device: false,
            allow_multiple_outputs: false,
            local_volume: 100,
            remote_volume: 100,
            audio_backend: BackendKind::PulseAudio,
        }
    }
}
