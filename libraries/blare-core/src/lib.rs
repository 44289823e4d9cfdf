//! blare - Core Types
//!
//! Platform-agnostic domain types and collaborator seams for the blare
//! soundboard engine.
//!
//! This crate provides:
//! - Domain types: [`Sound`], [`AudioDevice`], [`Settings`]
//! - The UI-facing error signal codes ([`ErrorCode`])
//! - Volume percent/factor mapping and the atomic [`VolumeFactor`] cell
//!   shared with audio callbacks
//! - Uniform random selection ([`random::pick`])
//! - Collaborator traits for the clip catalog, key simulation, and icon
//!   lookup, which the playback layer consumes but does not own
//!
//! # Architecture
//!
//! `blare-core` has no audio I/O dependencies. Engine and routing crates
//! build on these types; the playback coordinator ties everything together.

#![forbid(unsafe_code)]

pub mod catalog;
pub mod error;
pub mod random;
pub mod settings;
pub mod types;
pub mod volume;

pub use catalog::{IconResolver, KeySimulator, MemoryCatalog, NoopIcons, NoopKeys, SoundCatalog};
pub use error::ErrorCode;
pub use settings::{BackendKind, Settings};
pub use types::{AudioDevice, PlayingSoundId, Sound, SoundId, TabId};
pub use volume::{factor_from_percent, VolumeFactor};
