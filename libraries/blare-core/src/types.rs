//! Core domain types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Identifier of a catalog sound
pub type SoundId = u32;

/// Identifier of a catalog tab (folder of sounds)
pub type TabId = u32;

/// Identifier of a playing sound instance
///
/// Allocated from a single monotonic counter and never reused, so a stale id
/// can never alias a newer instance.
pub type PlayingSoundId = u64;

/// A clip known to the catalog
///
/// The catalog owns `Sound` lifetimes; playback entities hold copies of the
/// fields they need and refer back by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sound {
    /// Immutable identity within the catalog
    pub id: SoundId,

    /// File path for decoding
    pub path: PathBuf,

    /// Display name (usually the file stem)
    pub name: String,

    /// Last modification time of the file (epoch nanoseconds, 0 if unknown)
    pub modified_date: i64,

    /// Bound hotkey scancodes
    pub hotkeys: Vec<i32>,

    /// Marked as favorite in the UI
    pub is_favorite: bool,

    /// Per-sound local volume override (0-100); `None` uses the default
    pub local_volume: Option<u8>,

    /// Per-sound remote volume override (0-100); `None` uses the default
    pub remote_volume: Option<u8>,
}

impl Sound {
    /// Create a sound with just identity and path; remaining fields default
    pub fn new(id: SoundId, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            id,
            path,
            name,
            modified_date: 0,
            hotkeys: Vec::new(),
            is_favorite: false,
            local_volume: None,
            remote_volume: None,
        }
    }
}

/// An output device enumerated from the audio driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioDevice {
    /// Device name (human-readable, unique per host)
    pub name: String,

    /// Is this the system default output device?
    pub is_default: bool,
}

impl AudioDevice {
    /// Convenience constructor
    pub fn new(name: impl Into<String>, is_default: bool) -> Self {
        Self {
            name: name.into(),
            is_default,
        }
    }
}
