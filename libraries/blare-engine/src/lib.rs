//! blare - Playback Engine
//!
//! Allocates and tracks concurrently playing clip instances over a pluggable
//! audio driver.
//!
//! This crate provides:
//! - The [`AudioDriver`]/[`DriverStream`] abstraction over the real-time
//!   device layer
//! - [`CpalDriver`], the cpal + symphonia concrete driver
//! - [`MockDriver`] for headless embedding and tests
//! - [`AudioEngine`], which assigns monotonically increasing instance ids,
//!   applies live volume factors, and raises lifecycle events from the
//!   decode-callback thread
//!
//! # Concurrency
//!
//! Each active stream runs its own audio callback. The callback shares state
//! with the command thread only through [`StreamControl`]: atomic volume
//! factor, pause/repeat flags, and the read cursor. On exhaustion the
//! callback flags the instance finished and emits [`EngineEvent::SoundFinished`]
//! over a crossbeam channel; it never takes a lock longer than O(1) work.

mod cpal_driver;
mod decode;
mod driver;
mod engine;
mod error;
mod mock;

pub use cpal_driver::CpalDriver;
pub use decode::{decode_file, DecodedClip};
pub use driver::{AudioDriver, DriverStream, FinishedHook, StreamControl};
pub use engine::{AudioEngine, EngineEvent, PlayingSound};
pub use error::{EngineError, Result};
pub use mock::{MockDriver, MockStreamState};
