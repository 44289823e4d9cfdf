//! Application stream descriptors
//!
//! Backends describe the streams they can route through these two traits.
//! The concrete fields differ per backend (PulseAudio always knows the
//! process id, PipeWire nodes may not carry one until bound), so callers
//! query capabilities instead of matching on a backend tag.

/// An application currently recording from a capture source
pub trait RecordingApp: Send + Sync {
    /// Display name shown to the user
    fn name(&self) -> &str;

    /// Application label (usually the binary name)
    fn application(&self) -> &str;

    /// Process id, when the backend exposes one
    fn pid(&self) -> Option<u32>;

    /// Backend-interpreted stream handle: source-output index on
    /// PulseAudio, node id on PipeWire
    fn handle(&self) -> u32;
}

/// An application currently playing audio
pub trait PlaybackApp: Send + Sync {
    /// Display name shown to the user
    fn name(&self) -> &str;

    /// Application label (usually the binary name)
    fn application(&self) -> &str;

    /// Process id, when the backend exposes one
    fn pid(&self) -> Option<u32>;

    /// Backend-interpreted stream handle: sink-input index on PulseAudio,
    /// node id on PipeWire
    fn handle(&self) -> u32;
}
