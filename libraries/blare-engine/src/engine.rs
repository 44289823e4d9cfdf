//! Playback engine
//!
//! Owns every live stream and hands out serializable snapshots of their
//! state. All control paths run on the caller's thread; the audio callback
//! only ever touches the shared [`StreamControl`] atomics and, on clip
//! exhaustion, pushes a completion event onto an unbounded channel. The
//! instance map is never locked from a callback, so a stream is never torn
//! down from inside its own callback.

use crate::driver::{AudioDriver, DriverStream, StreamControl};
use crate::error::Result;
use blare_core::{AudioDevice, PlayingSoundId, Sound};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Snapshot of one live (or just-finished) stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayingSound {
    /// Engine-wide unique id, monotonically increasing
    pub id: PlayingSoundId,

    /// The catalog entry being played
    pub sound: Sound,

    /// Device the stream is routed to
    pub playback_device: AudioDevice,

    pub paused: bool,
    pub repeat: bool,

    /// Set once the clip ran out without repeat
    pub finished: bool,

    pub position_ms: u64,
    pub length_ms: u64,
}

/// Event emitted by the engine, drained by the owner
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A new stream started
    SoundPlayed(PlayingSound),

    /// A stream ran out of audio (sent from the audio callback)
    SoundFinished(PlayingSound),
}

struct Instance {
    sound: Sound,
    device: AudioDevice,
    ctl: Arc<StreamControl>,
    stream: Box<dyn DriverStream>,
}

impl Instance {
    fn snapshot(&self, id: PlayingSoundId) -> PlayingSound {
        snapshot_from_ctl(id, &self.sound, &self.device, &self.ctl)
    }
}

fn snapshot_from_ctl(
    id: PlayingSoundId,
    sound: &Sound,
    device: &AudioDevice,
    ctl: &StreamControl,
) -> PlayingSound {
    PlayingSound {
        id,
        sound: sound.clone(),
        playback_device: device.clone(),
        paused: ctl.is_paused(),
        repeat: ctl.repeats(),
        finished: ctl.is_finished(),
        position_ms: ctl.position_ms(),
        length_ms: ctl.length_ms(),
    }
}

/// Plays decoded clips on audio devices through a pluggable driver
pub struct AudioEngine {
    driver: Arc<dyn AudioDriver>,
    instances: Mutex<HashMap<PlayingSoundId, Instance>>,
    device_volumes: Mutex<HashMap<String, f32>>,
    next_id: AtomicU64,
    event_tx: Sender<EngineEvent>,
    event_rx: Receiver<EngineEvent>,
}

impl AudioEngine {
    pub fn new(driver: Arc<dyn AudioDriver>) -> Self {
        let (event_tx, event_rx) = unbounded();
        Self {
            driver,
            instances: Mutex::new(HashMap::new()),
            device_volumes: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            event_tx,
            event_rx,
        }
    }

    /// Channel carrying [`EngineEvent`]s; clone freely
    pub fn events(&self) -> Receiver<EngineEvent> {
        self.event_rx.clone()
    }

    /// Known output devices, default first
    pub fn devices(&self) -> Result<Vec<AudioDevice>> {
        self.driver.devices()
    }

    /// Look a device up by name
    pub fn device(&self, name: &str) -> Result<Option<AudioDevice>> {
        Ok(self.devices()?.into_iter().find(|d| d.name == name))
    }

    fn default_device(&self) -> Result<Option<AudioDevice>> {
        Ok(self.devices()?.into_iter().find(|d| d.is_default))
    }

    /// Start playing `sound` on `device` (the default device when `None`)
    ///
    /// `volume` overrides the remembered per-device volume factor for this
    /// stream only. Emits [`EngineEvent::SoundPlayed`] on success.
    pub fn play(
        &self,
        sound: &Sound,
        device: Option<&AudioDevice>,
        volume: Option<f32>,
    ) -> Result<PlayingSound> {
        let device = match device {
            Some(d) => d.clone(),
            None => match self.default_device()? {
                Some(d) => d,
                None => return Err(crate::error::EngineError::NoDefaultDevice),
            },
        };

        let factor = volume.unwrap_or_else(|| {
            self.device_volumes
                .lock()
                .unwrap()
                .get(&device.name)
                .copied()
                .unwrap_or(1.0)
        });

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let ctl = Arc::new(StreamControl::new(factor));

        let hook = {
            let tx = self.event_tx.clone();
            let sound = sound.clone();
            let device = device.clone();
            let ctl = ctl.clone();
            Box::new(move || {
                let snapshot = snapshot_from_ctl(id, &sound, &device, &ctl);
                if tx.send(EngineEvent::SoundFinished(snapshot)).is_err() {
                    warn!(id, "dropping completion event, engine gone");
                }
            })
        };

        let stream = self.driver.open(&sound.path, &device, ctl.clone(), hook)?;

        let instance = Instance {
            sound: sound.clone(),
            device,
            ctl,
            stream,
        };
        let snapshot = instance.snapshot(id);
        self.instances.lock().unwrap().insert(id, instance);

        debug!(id, sound = %snapshot.sound.name, device = %snapshot.playback_device.name, "stream started");
        let _ = self.event_tx.send(EngineEvent::SoundPlayed(snapshot.clone()));
        Ok(snapshot)
    }

    /// Pause a stream; `None` when the id is unknown
    pub fn pause(&self, id: PlayingSoundId) -> Option<PlayingSound> {
        let mut instances = self.instances.lock().unwrap();
        let instance = instances.get_mut(&id)?;
        if let Err(err) = instance.stream.pause() {
            warn!(id, %err, "pause failed");
            return None;
        }
        instance.ctl.set_paused(true);
        Some(instance.snapshot(id))
    }

    /// Resume a paused stream; `None` when the id is unknown
    pub fn resume(&self, id: PlayingSoundId) -> Option<PlayingSound> {
        let mut instances = self.instances.lock().unwrap();
        let instance = instances.get_mut(&id)?;
        if let Err(err) = instance.stream.resume() {
            warn!(id, %err, "resume failed");
            return None;
        }
        instance.ctl.set_paused(false);
        Some(instance.snapshot(id))
    }

    /// Move the play cursor; clamps past-end positions to the clip end
    pub fn seek(&self, id: PlayingSoundId, position_ms: u64) -> Option<PlayingSound> {
        let instances = self.instances.lock().unwrap();
        let instance = instances.get(&id)?;
        let frame = instance.ctl.frame_at_ms(position_ms);
        instance.ctl.seek_to_frame(frame);
        Some(instance.snapshot(id))
    }

    /// Toggle looping for a stream
    pub fn repeat(&self, id: PlayingSoundId, repeat: bool) -> Option<PlayingSound> {
        let instances = self.instances.lock().unwrap();
        let instance = instances.get(&id)?;
        instance.ctl.set_repeat(repeat);
        Some(instance.snapshot(id))
    }

    /// Override the volume factor of a single live stream
    pub fn set_volume(&self, id: PlayingSoundId, factor: f32) -> bool {
        let instances = self.instances.lock().unwrap();
        match instances.get(&id) {
            Some(instance) => {
                instance.ctl.volume().set(factor);
                true
            }
            None => false,
        }
    }

    /// Stop and tear a stream down; `false` when the id is unknown
    pub fn stop(&self, id: PlayingSoundId) -> bool {
        let removed = self.instances.lock().unwrap().remove(&id);
        if removed.is_some() {
            debug!(id, "stream stopped");
        }
        removed.is_some()
    }

    /// Stop every live stream
    pub fn stop_all(&self) {
        let mut instances = self.instances.lock().unwrap();
        let count = instances.len();
        instances.clear();
        if count > 0 {
            debug!(count, "all streams stopped");
        }
    }

    /// Drop a finished instance without a device-level stop, returning its
    /// final snapshot
    pub fn discard(&self, id: PlayingSoundId) -> Option<PlayingSound> {
        let instance = self.instances.lock().unwrap().remove(&id)?;
        Some(instance.snapshot(id))
    }

    /// Snapshots of every stream still producing audio
    ///
    /// Finished instances awaiting discard are excluded.
    pub fn playing_sounds(&self) -> Vec<PlayingSound> {
        let instances = self.instances.lock().unwrap();
        let mut sounds: Vec<PlayingSound> = instances
            .iter()
            .filter(|(_, i)| !i.ctl.is_finished())
            .map(|(id, i)| i.snapshot(*id))
            .collect();
        sounds.sort_by_key(|s| s.id);
        sounds
    }

    /// Set and remember a device-wide volume factor
    ///
    /// Applies to every live stream on the device and to future streams
    /// that do not pass an explicit volume.
    pub fn set_device_volume(&self, device_name: &str, factor: f32) {
        self.device_volumes
            .lock()
            .unwrap()
            .insert(device_name.to_string(), factor);

        let instances = self.instances.lock().unwrap();
        for instance in instances.values() {
            if instance.device.name == device_name {
                instance.ctl.volume().set(factor);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDriver;
    use std::path::PathBuf;

    fn sound(id: u32, name: &str) -> Sound {
        let mut s = Sound::new(id, PathBuf::from(format!("/clips/{name}.wav")));
        s.name = name.to_string();
        s
    }

    fn engine() -> (Arc<MockDriver>, AudioEngine) {
        let driver = Arc::new(MockDriver::new());
        let engine = AudioEngine::new(driver.clone());
        (driver, engine)
    }

    #[test]
    fn ids_are_monotonic_and_unique() {
        let (_driver, engine) = engine();
        let a = engine.play(&sound(1, "a"), None, None).unwrap();
        let b = engine.play(&sound(1, "a"), None, None).unwrap();
        let c = engine.play(&sound(2, "b"), None, None).unwrap();
        assert!(a.id < b.id && b.id < c.id);
    }

    #[test]
    fn play_defaults_to_the_default_device() {
        let (_driver, engine) = engine();
        let snap = engine.play(&sound(1, "a"), None, None).unwrap();
        assert_eq!(snap.playback_device.name, "Mock Speakers");
        assert!(!snap.paused);
        assert!(!snap.finished);
    }

    #[test]
    fn pause_resume_round_trip() {
        let (driver, engine) = engine();
        let snap = engine.play(&sound(1, "a"), None, None).unwrap();

        let paused = engine.pause(snap.id).unwrap();
        assert!(paused.paused);
        let resumed = engine.resume(snap.id).unwrap();
        assert!(!resumed.paused);

        let state = &driver.streams()[0];
        assert_eq!(state.pause_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(state.resume_calls.load(std::sync::atomic::Ordering::SeqCst), 1);

        assert!(engine.pause(9999).is_none());
    }

    #[test]
    fn seek_clamps_to_clip_length() {
        let (_driver, engine) = engine();
        let snap = engine.play(&sound(1, "a"), None, None).unwrap();
        // Mock clips are one second long
        let seeked = engine.seek(snap.id, 10_000).unwrap();
        assert_eq!(seeked.position_ms, seeked.length_ms);
    }

    #[test]
    fn stop_tears_the_stream_down() {
        let (driver, engine) = engine();
        let snap = engine.play(&sound(1, "a"), None, None).unwrap();
        assert_eq!(driver.live_count(), 1);

        assert!(engine.stop(snap.id));
        assert_eq!(driver.live_count(), 0);
        assert!(engine.playing_sounds().is_empty());

        // Unknown id / second stop
        assert!(!engine.stop(snap.id));
    }

    #[test]
    fn stop_all_clears_everything() {
        let (driver, engine) = engine();
        engine.play(&sound(1, "a"), None, None).unwrap();
        engine.play(&sound(2, "b"), None, None).unwrap();
        engine.stop_all();
        assert_eq!(driver.live_count(), 0);
        assert!(engine.playing_sounds().is_empty());
    }

    #[test]
    fn finished_stream_emits_event_and_leaves_playing_list() {
        let (driver, engine) = engine();
        let snap = engine.play(&sound(1, "a"), None, None).unwrap();
        let events = engine.events();

        // Drain the start event
        assert!(matches!(events.recv().unwrap(), EngineEvent::SoundPlayed(_)));

        driver.finish_all();
        match events.recv().unwrap() {
            EngineEvent::SoundFinished(finished) => {
                assert_eq!(finished.id, snap.id);
                assert!(finished.finished);
                assert_eq!(finished.position_ms, finished.length_ms);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        assert!(engine.playing_sounds().is_empty());
        let last = engine.discard(snap.id).unwrap();
        assert!(last.finished);
    }

    #[test]
    fn repeat_suppresses_completion() {
        let (driver, engine) = engine();
        let snap = engine.play(&sound(1, "a"), None, None).unwrap();
        engine.repeat(snap.id, true);

        assert_eq!(driver.finish_all(), 0);
        assert_eq!(engine.playing_sounds().len(), 1);

        engine.repeat(snap.id, false);
        assert_eq!(driver.finish_all(), 1);
    }

    #[test]
    fn device_volume_applies_to_live_and_future_streams() {
        let (driver, engine) = engine();
        let live = engine.play(&sound(1, "a"), None, None).unwrap();

        engine.set_device_volume("Mock Speakers", 0.42);
        let ctl = &driver.streams()[0].ctl;
        assert!((ctl.volume().get() - 0.42).abs() < f32::EPSILON);

        let later = engine.play(&sound(2, "b"), None, None).unwrap();
        assert!((driver.streams()[1].ctl.volume().get() - 0.42).abs() < f32::EPSILON);
        assert_ne!(live.id, later.id);

        // Explicit override wins for that stream only
        engine.play(&sound(3, "c"), None, Some(1.0)).unwrap();
        assert!((driver.streams()[2].ctl.volume().get() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn per_stream_volume_override() {
        let (driver, engine) = engine();
        let snap = engine.play(&sound(1, "a"), None, None).unwrap();
        assert!(engine.set_volume(snap.id, 0.5));
        assert!((driver.streams()[0].ctl.volume().get() - 0.5).abs() < f32::EPSILON);
        assert!(!engine.set_volume(9999, 0.5));
    }

    #[test]
    fn failed_open_propagates_without_registering() {
        let (driver, engine) = engine();
        driver.fail_all_opens(true);
        assert!(engine.play(&sound(1, "a"), None, None).is_err());
        assert!(engine.playing_sounds().is_empty());
    }
}
