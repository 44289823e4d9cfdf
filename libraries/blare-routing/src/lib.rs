//! blare - Routing Backends
//!
//! Capture/playback stream routing over the system audio graph. A
//! [`RoutingBackend`] owns a virtual sink and can redirect an application's
//! capture input into it, mix another application's playback into it
//! (passthrough), mute the default capture source, and install the sink as
//! the system default source. Every redirect it performs is recorded so it
//! can be reversed, and [`RoutingBackend::destroy`] tears the whole graph
//! state back down.
//!
//! Two concrete variants exist, selected by [`BackendKind`]:
//! - [`PulseBackend`] drives `pactl`
//! - [`PipeWireBackend`] drives `pw-dump`, `pw-link`, `pw-cli` and `wpctl`
//!
//! [`MockBackend`] implements the same contract over in-memory state for
//! headless embedding and tests.
//!
//! [`BackendKind`]: blare_core::BackendKind

mod app;
mod backend;
mod mock;
mod pipewire;
mod pulse;

pub use app::{PlaybackApp, RecordingApp};
pub use backend::{create_backend, RoutingBackend, RoutingError, Result, SINK_NAME};
pub use mock::{Capability, MockBackend};
pub use pipewire::PipeWireBackend;
pub use pulse::PulseBackend;
