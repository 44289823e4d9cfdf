//! Mock audio driver
//!
//! Drives the whole engine without touching a device, which keeps the test
//! suite headless. Streams record control calls; tests trigger completion
//! explicitly, mimicking the real callback's finish semantics.

use crate::driver::{AudioDriver, DriverStream, FinishedHook, StreamControl};
use crate::error::{EngineError, Result};
use blare_core::AudioDevice;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Geometry reported for every mock clip: one second at 44.1 kHz
const MOCK_CLIP_FRAMES: u64 = 44_100;
const MOCK_SAMPLE_RATE: u32 = 44_100;

/// Observable state of one opened mock stream
#[derive(Debug)]
pub struct MockStreamState {
    /// Clip path the stream was opened with
    pub path: PathBuf,

    /// Device the stream targets
    pub device: AudioDevice,

    /// Control block shared with the engine
    pub ctl: Arc<StreamControl>,

    /// Number of `pause` calls
    pub pause_calls: AtomicUsize,

    /// Number of `resume` calls
    pub resume_calls: AtomicUsize,

    /// Cleared when the stream is dropped (stopped)
    pub alive: AtomicBool,
}

struct MockEntry {
    state: Arc<MockStreamState>,
    hook: FinishedHook,
}

/// [`AudioDriver`] implementation with scripted devices and completion
pub struct MockDriver {
    devices: Mutex<Vec<AudioDevice>>,
    entries: Mutex<Vec<MockEntry>>,
    failing_devices: Mutex<HashSet<String>>,
    fail_all_opens: AtomicBool,
}

impl MockDriver {
    /// Driver with a default device plus a secondary one
    pub fn new() -> Self {
        Self::with_devices(vec![
            AudioDevice::new("Mock Speakers", true),
            AudioDevice::new("blare_sink", false),
        ])
    }

    /// Driver with an explicit device list
    pub fn with_devices(devices: Vec<AudioDevice>) -> Self {
        Self {
            devices: Mutex::new(devices),
            entries: Mutex::new(Vec::new()),
            failing_devices: Mutex::new(HashSet::new()),
            fail_all_opens: AtomicBool::new(false),
        }
    }

    /// Make every `open` on the named device fail
    pub fn fail_device(&self, name: &str) {
        self.failing_devices.lock().unwrap().insert(name.to_string());
    }

    /// Make every `open` fail
    pub fn fail_all_opens(&self, fail: bool) {
        self.fail_all_opens.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of every stream opened so far (including stopped ones)
    pub fn streams(&self) -> Vec<Arc<MockStreamState>> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.state.clone())
            .collect()
    }

    /// Number of streams still alive
    pub fn live_count(&self) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.state.alive.load(Ordering::SeqCst))
            .count()
    }

    /// Run live streams matching the predicate to completion
    ///
    /// Follows the real callback's semantics: a repeat-flagged stream
    /// rewinds instead of finishing, and the hook fires at most once.
    /// Returns the number of hooks fired.
    pub fn finish_where<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&MockStreamState) -> bool,
    {
        let entries = self.entries.lock().unwrap();
        let mut fired = 0;

        for entry in entries.iter() {
            let state = &entry.state;
            if !state.alive.load(Ordering::SeqCst) || !predicate(state) {
                continue;
            }

            if state.ctl.repeats() {
                state.ctl.rewind();
                continue;
            }

            state.ctl.seek_to_frame(state.ctl.length_frames());
            if state.ctl.mark_finished() {
                (entry.hook)();
                fired += 1;
            }
        }

        fired
    }

    /// Run every live stream to completion
    pub fn finish_all(&self) -> usize {
        self.finish_where(|_| true)
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioDriver for MockDriver {
    fn devices(&self) -> Result<Vec<AudioDevice>> {
        Ok(self.devices.lock().unwrap().clone())
    }

    fn open(
        &self,
        path: &Path,
        device: &AudioDevice,
        ctl: Arc<StreamControl>,
        on_finished: FinishedHook,
    ) -> Result<Box<dyn DriverStream>> {
        if self.fail_all_opens.load(Ordering::SeqCst)
            || self.failing_devices.lock().unwrap().contains(&device.name)
        {
            return Err(EngineError::StreamOpenFailed(format!(
                "mock open failure on '{}'",
                device.name
            )));
        }

        ctl.set_geometry(MOCK_CLIP_FRAMES, MOCK_SAMPLE_RATE);

        let state = Arc::new(MockStreamState {
            path: path.to_path_buf(),
            device: device.clone(),
            ctl,
            pause_calls: AtomicUsize::new(0),
            resume_calls: AtomicUsize::new(0),
            alive: AtomicBool::new(true),
        });

        self.entries.lock().unwrap().push(MockEntry {
            state: state.clone(),
            hook: on_finished,
        });

        Ok(Box::new(MockStream { state }))
    }
}

struct MockStream {
    state: Arc<MockStreamState>,
}

impl DriverStream for MockStream {
    fn pause(&mut self) -> Result<()> {
        self.state.pause_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        self.state.resume_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.state.alive.store(false, Ordering::SeqCst);
    }
}
