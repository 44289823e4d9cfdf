//! blare - Playback Coordination
//!
//! The orchestration layer tying the engine, the routing backend, and the
//! pairing registry together. A [`Coordinator`] implements the public
//! soundboard operations: dual-output play with rollback, mirrored
//! pause/resume/seek/repeat, live settings reconciliation, passthrough
//! management, and the strict undo pairing between effects applied at
//! play time (mute, push-to-talk, capture redirection) and the
//! all-sounds-finished sequence.
//!
//! Errors never surface as `Result`s at this layer; operations return their
//! primary value and emit [`ErrorCode`]s on a side channel for the UI.
//!
//! [`ErrorCode`]: blare_core::ErrorCode

mod context;
mod coordinator;
mod queue;
mod registry;

pub use context::Context;
pub use coordinator::{Coordinator, StreamInfo, ToggleAction};
pub use queue::TaskQueue;
pub use registry::SoundGroupRegistry;
