//! Audio driver abstraction
//!
//! The engine never talks to a device API directly; it allocates instances
//! over an [`AudioDriver`] and shares per-stream state with the real-time
//! callback through [`StreamControl`].

use crate::error::Result;
use blare_core::{AudioDevice, VolumeFactor};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Invoked exactly once from the callback context when a stream runs out of
/// frames (never invoked while the repeat flag is set)
pub type FinishedHook = Box<dyn Fn() + Send + Sync>;

/// State shared between the command thread and one audio callback
///
/// The command thread writes, the callback reads; every field is an atomic
/// so neither side blocks. The read cursor doubles as the seek target: a
/// seek is a plain store, which the callback picks up on its next pull.
#[derive(Debug)]
pub struct StreamControl {
    /// Live volume factor applied inside the callback
    volume: VolumeFactor,

    /// Callback outputs silence (and holds position) while set
    paused: AtomicBool,

    /// Restart in place instead of finishing when frames run out
    repeat: AtomicBool,

    /// Flagged by the callback after the finished hook ran
    finished: AtomicBool,

    /// Frames consumed so far; also the seek target
    read_frames: AtomicU64,

    /// Total frames in the decoded clip
    length_frames: AtomicU64,

    /// Clip sample rate (Hz)
    sample_rate: AtomicU32,
}

impl StreamControl {
    /// Create a control block with the given initial volume factor
    pub fn new(volume: f32) -> Self {
        Self {
            volume: VolumeFactor::new(volume),
            paused: AtomicBool::new(false),
            repeat: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            read_frames: AtomicU64::new(0),
            length_frames: AtomicU64::new(0),
            sample_rate: AtomicU32::new(0),
        }
    }

    /// Live volume factor cell
    pub fn volume(&self) -> &VolumeFactor {
        &self.volume
    }

    /// Set the pause flag
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    /// Is the stream paused?
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Set the repeat flag
    pub fn set_repeat(&self, repeat: bool) {
        self.repeat.store(repeat, Ordering::Release);
    }

    /// Is the repeat flag set?
    pub fn repeats(&self) -> bool {
        self.repeat.load(Ordering::Acquire)
    }

    /// Mark the stream finished; `true` on the first call only
    pub fn mark_finished(&self) -> bool {
        !self.finished.swap(true, Ordering::AcqRel)
    }

    /// Has the stream run out of frames?
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Clear the finished flag (repeat restart)
    pub fn clear_finished(&self) {
        self.finished.store(false, Ordering::Release);
    }

    /// Current read cursor in frames
    pub fn read_frames(&self) -> u64 {
        self.read_frames.load(Ordering::Acquire)
    }

    /// Move the read cursor (seek); clamped to the clip length
    pub fn seek_to_frame(&self, frame: u64) {
        let clamped = frame.min(self.length_frames());
        self.read_frames.store(clamped, Ordering::Release);
        self.finished.store(false, Ordering::Release);
    }

    /// Advance the read cursor after a pull (callback side)
    pub fn advance(&self, frames: u64) {
        self.read_frames.fetch_add(frames, Ordering::AcqRel);
    }

    /// Rewind to the start (repeat restart, callback side)
    pub fn rewind(&self) {
        self.read_frames.store(0, Ordering::Release);
    }

    /// Total clip length in frames
    pub fn length_frames(&self) -> u64 {
        self.length_frames.load(Ordering::Acquire)
    }

    /// Record clip geometry once decoding resolved it
    pub fn set_geometry(&self, length_frames: u64, sample_rate: u32) {
        self.length_frames.store(length_frames, Ordering::Release);
        self.sample_rate.store(sample_rate, Ordering::Release);
    }

    /// Clip sample rate in Hz (0 until geometry is known)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Acquire)
    }

    /// Current position in milliseconds
    pub fn position_ms(&self) -> u64 {
        frames_to_ms(self.read_frames(), self.sample_rate())
    }

    /// Clip length in milliseconds
    pub fn length_ms(&self) -> u64 {
        frames_to_ms(self.length_frames(), self.sample_rate())
    }

    /// Convert a millisecond position to a frame index for this clip
    pub fn frame_at_ms(&self, ms: u64) -> u64 {
        let rate = u64::from(self.sample_rate());
        ms.saturating_mul(rate) / 1000
    }
}

fn frames_to_ms(frames: u64, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    frames.saturating_mul(1000) / u64::from(sample_rate)
}

/// The opaque audio I/O provider
///
/// Implementations own device discovery and the decode/playback primitive.
/// [`crate::CpalDriver`] is the production implementation; [`crate::MockDriver`]
/// drives the whole engine headless.
pub trait AudioDriver: Send + Sync {
    /// Enumerate output devices, default first
    fn devices(&self) -> Result<Vec<AudioDevice>>;

    /// Open a playback stream for a clip on a device
    ///
    /// The stream starts playing immediately. `ctl` carries the live state
    /// shared with the callback; `on_finished` fires once when frames run
    /// out and the repeat flag is clear.
    fn open(
        &self,
        path: &Path,
        device: &AudioDevice,
        ctl: Arc<StreamControl>,
        on_finished: FinishedHook,
    ) -> Result<Box<dyn DriverStream>>;
}

/// An open playback stream
///
/// Dropping the stream tears the device resources down.
pub trait DriverStream: Send {
    /// Stop the device callback (position is held by the control block)
    fn pause(&mut self) -> Result<()>;

    /// Restart the device callback
    fn resume(&mut self) -> Result<()>;
}
