//! CPAL + Symphonia audio driver
//!
//! Production [`AudioDriver`]: enumerates cpal output devices and plays a
//! decoded clip per stream. Decoding happens on the command thread inside
//! [`AudioDriver::open`]; the real-time callback only copies frames, honors
//! the control block, and applies the volume factor.

use crate::decode::decode_file;
use crate::driver::{AudioDriver, DriverStream, FinishedHook, StreamControl};
use crate::error::{EngineError, Result};
use blare_core::AudioDevice;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, StreamConfig};
use std::path::Path;
use std::sync::Arc;

/// Audio driver backed by cpal and symphonia
pub struct CpalDriver {
    host: cpal::Host,
}

impl CpalDriver {
    /// Create a driver on the system default host
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    fn cpal_device(&self, wanted: &AudioDevice) -> Result<cpal::Device> {
        let devices = self
            .host
            .output_devices()
            .map_err(|e| EngineError::EnumerationFailed(e.to_string()))?;

        for device in devices {
            if let Ok(name) = device.name() {
                if name == wanted.name {
                    return Ok(device);
                }
            }
        }

        Err(EngineError::DeviceNotFound(wanted.name.clone()))
    }
}

impl Default for CpalDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioDriver for CpalDriver {
    fn devices(&self) -> Result<Vec<AudioDevice>> {
        let default_name = self
            .host
            .default_output_device()
            .and_then(|d| d.name().ok());

        let devices = self
            .host
            .output_devices()
            .map_err(|e| EngineError::EnumerationFailed(e.to_string()))?;

        let mut list = Vec::new();
        for device in devices {
            if let Ok(name) = device.name() {
                let is_default = Some(&name) == default_name.as_ref();
                list.push(AudioDevice { name, is_default });
            }
        }

        sort_devices(&mut list);
        Ok(list)
    }

    fn open(
        &self,
        path: &Path,
        device: &AudioDevice,
        ctl: Arc<StreamControl>,
        on_finished: FinishedHook,
    ) -> Result<Box<dyn DriverStream>> {
        let clip = decode_file(path)?;
        ctl.set_geometry(clip.frames(), clip.sample_rate);

        let cpal_device = self.cpal_device(device)?;
        let config = StreamConfig {
            channels: clip.channels,
            sample_rate: clip.sample_rate,
            buffer_size: BufferSize::Default,
        };

        let samples = Arc::new(clip.samples);
        let channels = clip.channels as usize;

        let stream = cpal_device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    fill_output(data, &samples, channels, &ctl, &on_finished);
                },
                |err| tracing::warn!("audio stream error: {err}"),
                None,
            )
            .map_err(|e| EngineError::StreamOpenFailed(e.to_string()))?;

        stream
            .play()
            .map_err(|e| EngineError::StreamOpenFailed(e.to_string()))?;

        Ok(Box::new(CpalStream { stream }))
    }
}

/// Real-time callback body
///
/// Copies frames from the decoded clip at the shared cursor, restarting in
/// place when the repeat flag is set, firing the finished hook once when the
/// clip runs out. No allocation, no locks.
fn fill_output(
    data: &mut [f32],
    samples: &Arc<Vec<f32>>,
    channels: usize,
    ctl: &StreamControl,
    on_finished: &FinishedHook,
) {
    if ctl.is_paused() || ctl.is_finished() {
        data.fill(0.0);
        return;
    }

    let mut written = 0;
    while written < data.len() {
        let cursor = ctl.read_frames() as usize * channels;
        if cursor >= samples.len() {
            if ctl.repeats() {
                ctl.rewind();
                continue;
            }
            if ctl.mark_finished() {
                on_finished();
            }
            data[written..].fill(0.0);
            break;
        }

        let n = (samples.len() - cursor).min(data.len() - written);
        data[written..written + n].copy_from_slice(&samples[cursor..cursor + n]);
        ctl.advance((n / channels) as u64);
        written += n;
    }

    ctl.volume().apply(&mut data[..written]);
}

struct CpalStream {
    stream: cpal::Stream,
}

// SAFETY: cpal's Stream is !Send only because of a PhantomData marker; the
// underlying handles are thread-safe. Same rationale as wrapping the stream
// in a playback manager that lives on another thread.
#[allow(unsafe_code)]
unsafe impl Send for CpalStream {}

impl DriverStream for CpalStream {
    fn pause(&mut self) -> Result<()> {
        self.stream
            .pause()
            .map_err(|e| EngineError::StreamControlFailed(e.to_string()))
    }

    fn resume(&mut self) -> Result<()> {
        self.stream
            .play()
            .map_err(|e| EngineError::StreamControlFailed(e.to_string()))
    }
}

/// Sort devices default-first, then alphabetically
fn sort_devices(devices: &mut [AudioDevice]) {
    devices.sort_by(|a, b| match (a.is_default, b.is_default) {
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        _ => a.name.cmp(&b.name),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn device_sorting_default_first() {
        let mut devices = vec![
            AudioDevice::new("Zeta", false),
            AudioDevice::new("Speakers", true),
            AudioDevice::new("Alpha", false),
        ];
        sort_devices(&mut devices);

        assert_eq!(devices[0].name, "Speakers");
        assert_eq!(devices[1].name, "Alpha");
        assert_eq!(devices[2].name, "Zeta");
    }

    #[test]
    fn callback_copies_and_finishes_once() {
        let ctl = StreamControl::new(1.0);
        ctl.set_geometry(4, 44_100);
        let samples = Arc::new(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8]);

        let fired = Arc::new(AtomicUsize::new(0));
        let fired_in_hook = fired.clone();
        let hook: FinishedHook = Box::new(move || {
            fired_in_hook.fetch_add(1, Ordering::SeqCst);
        });

        // First pull drains the whole clip
        let mut out = vec![0.0; 8];
        fill_output(&mut out, &samples, 2, &ctl, &hook);
        assert_eq!(out, vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8]);
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        // Next pull hits the end, fires the hook, pads with silence
        let mut out = vec![9.0; 4];
        fill_output(&mut out, &samples, 2, &ctl, &hook);
        assert_eq!(out, vec![0.0; 4]);
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Further pulls stay silent without re-firing
        fill_output(&mut out, &samples, 2, &ctl, &hook);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_applies_volume() {
        let ctl = StreamControl::new(0.5);
        ctl.set_geometry(2, 44_100);
        let samples = Arc::new(vec![1.0, 1.0, 1.0, 1.0]);
        let hook: FinishedHook = Box::new(|| {});

        let mut out = vec![0.0; 4];
        fill_output(&mut out, &samples, 2, &ctl, &hook);
        assert_eq!(out, vec![0.5, 0.5, 0.5, 0.5]);
    }

    #[test]
    fn callback_repeat_restarts_in_place() {
        let ctl = StreamControl::new(1.0);
        ctl.set_geometry(2, 44_100);
        ctl.set_repeat(true);
        let samples = Arc::new(vec![0.1, 0.2, 0.3, 0.4]);

        let fired = Arc::new(AtomicUsize::new(0));
        let fired_in_hook = fired.clone();
        let hook: FinishedHook = Box::new(move || {
            fired_in_hook.fetch_add(1, Ordering::SeqCst);
        });

        // Two clip lengths in one pull: wraps around, never finishes
        let mut out = vec![0.0; 8];
        fill_output(&mut out, &samples, 2, &ctl, &hook);
        assert_eq!(out, vec![0.1, 0.2, 0.3, 0.4, 0.1, 0.2, 0.3, 0.4]);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn callback_paused_outputs_silence() {
        let ctl = StreamControl::new(1.0);
        ctl.set_geometry(2, 44_100);
        ctl.set_paused(true);
        let samples = Arc::new(vec![0.1, 0.2, 0.3, 0.4]);
        let hook: FinishedHook = Box::new(|| {});

        let mut out = vec![9.0; 4];
        fill_output(&mut out, &samples, 2, &ctl, &hook);
        assert_eq!(out, vec![0.0; 4]);
        // Position held
        assert_eq!(ctl.read_frames(), 0);
    }
}
