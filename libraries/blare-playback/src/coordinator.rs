//! Playback coordinator
//!
//! Top-level orchestration of dual-output playback: every public operation
//! runs on the command thread, talks to the engine and the routing backend,
//! and keeps the pairing registry consistent. Primary failures roll back
//! partial state and emit an error code; side-effect failures (mute,
//! redirection) emit a code but never abort the sound itself.

use crate::context::Context;
use crate::queue::TaskQueue;
use blare_core::{factor_from_percent, ErrorCode, PlayingSoundId, Settings, Sound, SoundId, TabId};
use blare_engine::{EngineEvent, PlayingSound};
use blare_routing::create_backend;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Coalescing key for deferred bulk stops
const STOP_SOUNDS_KEY: &str = "stop-sounds";

/// Application stream entry shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub name: String,
    pub application: String,
    pub pid: Option<u32>,
    /// Base64 icon data resolved by process id, when available
    pub icon: Option<String>,
}

/// What [`Coordinator::toggle_sound_playback`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToggleAction {
    Paused,
    Resumed,
}

#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

struct Inner {
    ctx: Arc<Context>,
    queue: TaskQueue,
    error_tx: Sender<ErrorCode>,
    error_rx: Receiver<ErrorCode>,
    /// Set while play-time side effects (mute, push-to-talk, redirection)
    /// are outstanding; cleared by the one all-finished pass that undoes them
    effects_armed: AtomicBool,
    shutdown: AtomicBool,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl Coordinator {
    pub fn new(ctx: Arc<Context>) -> Self {
        let (error_tx, error_rx) = unbounded();
        Self {
            inner: Arc::new(Inner {
                ctx,
                queue: TaskQueue::new(),
                error_tx,
                error_rx,
                effects_armed: AtomicBool::new(false),
                shutdown: AtomicBool::new(false),
                pump: Mutex::new(None),
            }),
        }
    }

    /// Side channel carrying error codes for UI display
    pub fn errors(&self) -> Receiver<ErrorCode> {
        self.inner.error_rx.clone()
    }

    /// Start playing the catalog sound `id` to the local device and, in
    /// dual-output mode, to the backend sink
    pub fn play_sound(&self, id: SoundId) -> Option<PlayingSound> {
        self.inner.play_sound(id)
    }

    /// Play a uniformly random catalog sound
    pub fn play_random_sound(&self) -> Option<PlayingSound> {
        let ids = self.inner.ctx.catalog.all_ids();
        let id = *blare_core::random::pick(&ids)?;
        self.inner.play_sound(id)
    }

    /// Play a uniformly random sound from one tab
    pub fn play_random_sound_on_tab(&self, tab: TabId) -> Option<PlayingSound> {
        let Some(ids) = self.inner.ctx.catalog.tab_ids(tab) else {
            self.inner.report(ErrorCode::TabDoesNotExist);
            return None;
        };
        let id = *blare_core::random::pick(&ids)?;
        self.inner.play_sound(id)
    }

    pub fn pause_sound(&self, id: PlayingSoundId) -> Option<PlayingSound> {
        let remote = self.inner.ctx.registry.remote_of(id);
        let Some(local) = self.inner.ctx.engine.pause(id) else {
            self.inner.report(ErrorCode::FailedToPause);
            return None;
        };
        if let Some(remote_id) = remote {
            if self.inner.ctx.engine.pause(remote_id).is_none() {
                debug!(remote_id, "remote pause mirror failed");
            }
        }
        Some(local)
    }

    pub fn resume_sound(&self, id: PlayingSoundId) -> Option<PlayingSound> {
        let remote = self.inner.ctx.registry.remote_of(id);
        let Some(local) = self.inner.ctx.engine.resume(id) else {
            self.inner.report(ErrorCode::FailedToResume);
            return None;
        };
        if let Some(remote_id) = remote {
            if self.inner.ctx.engine.resume(remote_id).is_none() {
                debug!(remote_id, "remote resume mirror failed");
            }
        }
        Some(local)
    }

    pub fn seek_sound(&self, id: PlayingSoundId, position_ms: u64) -> Option<PlayingSound> {
        let remote = self.inner.ctx.registry.remote_of(id);
        let Some(local) = self.inner.ctx.engine.seek(id, position_ms) else {
            self.inner.report(ErrorCode::FailedToSeek);
            return None;
        };
        if let Some(remote_id) = remote {
            if self.inner.ctx.engine.seek(remote_id, position_ms).is_none() {
                debug!(remote_id, "remote seek mirror failed");
            }
        }
        Some(local)
    }

    pub fn repeat_sound(&self, id: PlayingSoundId, repeat: bool) -> Option<PlayingSound> {
        let remote = self.inner.ctx.registry.remote_of(id);
        let Some(local) = self.inner.ctx.engine.repeat(id, repeat) else {
            self.inner.report(ErrorCode::FailedToRepeat);
            return None;
        };
        if let Some(remote_id) = remote {
            if self.inner.ctx.engine.repeat(remote_id, repeat).is_none() {
                debug!(remote_id, "remote repeat mirror failed");
            }
        }
        Some(local)
    }

    /// Stop one sound and its remote twin
    ///
    /// In dual-output mode a missing pairing fails the call outright, with
    /// no device call attempted.
    pub fn stop_sound(&self, id: PlayingSoundId) -> bool {
        self.inner.stop_sound(id)
    }

    /// Stop everything. `sync` executes inline; otherwise the request is
    /// coalesced onto the task queue (rapid repeats collapse into one run).
    pub fn stop_sounds(&self, sync: bool) {
        if sync {
            self.inner.stop_sounds_now();
        } else {
            let inner = self.inner.clone();
            self.inner
                .queue
                .push_unique(STOP_SOUNDS_KEY, move || inner.stop_sounds_now());
        }
    }

    /// Persist a per-sound local volume override and re-apply it to live
    /// local instances of that sound
    pub fn set_custom_local_volume(&self, id: SoundId, volume: Option<u8>) -> Option<Sound> {
        self.inner.set_custom_volume(id, volume, false)
    }

    /// Persist a per-sound remote volume override and re-apply it to live
    /// sink-targeted instances of that sound
    pub fn set_custom_remote_volume(&self, id: SoundId, volume: Option<u8>) -> Option<Sound> {
        self.inner.set_custom_volume(id, volume, true)
    }

    /// Apply new settings, reconciling live playback and routing state
    /// against the previous value. Returns the settings actually applied.
    pub fn change_settings(&self, settings: Settings) -> Settings {
        self.inner.change_settings(settings)
    }

    /// Applications currently recording, deduplicated by display name
    pub fn get_outputs(&self) -> Vec<StreamInfo> {
        let raw = self
            .inner
            .ctx
            .with_backend(|backend| {
                backend
                    .recording_apps()
                    .iter()
                    .map(|app| (app.name().to_string(), app.application().to_string(), app.pid()))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        self.inner.build_stream_infos(raw)
    }

    /// Applications currently playing audio, deduplicated by display name
    pub fn get_playback(&self) -> Vec<StreamInfo> {
        let raw = self
            .inner
            .ctx
            .with_backend(|backend| {
                backend
                    .playback_apps()
                    .iter()
                    .map(|app| (app.name().to_string(), app.application().to_string(), app.pid()))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        self.inner.build_stream_infos(raw)
    }

    /// Mix the named playback application into the sink, redirecting
    /// configured outputs first
    pub fn start_passthrough(&self, name: &str) -> bool {
        self.inner.start_passthrough(name)
    }

    /// Remove the named passthrough mix, reverting capture redirection
    /// first when it was the last mix and nothing is playing
    pub fn stop_passthrough(&self, name: &str) -> bool {
        self.inner.stop_passthrough(name)
    }

    /// Pause everything if nothing is paused, resume everything otherwise
    pub fn toggle_sound_playback(&self) -> Option<ToggleAction> {
        let playing = self.inner.ctx.engine.playing_sounds();
        if playing.is_empty() {
            return None;
        }
        if playing.iter().any(|p| p.paused) {
            for sound in &playing {
                if sound.paused {
                    self.inner.ctx.engine.resume(sound.id);
                }
            }
            Some(ToggleAction::Resumed)
        } else {
            for sound in &playing {
                self.inner.ctx.engine.pause(sound.id);
            }
            Some(ToggleAction::Paused)
        }
    }

    /// Drain pending engine events on the calling thread; returns how many
    /// were handled
    pub fn process_engine_events(&self) -> usize {
        let events = self.inner.ctx.engine.events();
        let mut handled = 0;
        while let Ok(event) = events.try_recv() {
            self.inner.handle_event(&event);
            handled += 1;
        }
        handled
    }

    /// Spawn a background thread draining engine events until shutdown
    pub fn spawn_event_pump(&self) {
        let inner = self.inner.clone();
        let events = self.inner.ctx.engine.events();
        let handle = thread::Builder::new()
            .name("blare-engine-events".into())
            .spawn(move || loop {
                if inner.shutdown.load(Ordering::SeqCst) {
                    break;
                }
                match events.recv_timeout(Duration::from_millis(50)) {
                    Ok(event) => inner.handle_event(&event),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .ok();
        *self.inner.pump.lock().unwrap() = handle;
    }

    /// Stop all playback, join the event pump, and tear the backend down
    pub fn shutdown(&self) {
        info!("shutting down playback");
        self.inner.stop_sounds_now();
        self.inner.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.inner.pump.lock().unwrap().take() {
            let _ = handle.join();
        }
        let mut guard = self.inner.ctx.backend.lock().unwrap();
        if let Some(mut backend) = guard.take() {
            backend.destroy();
        }
    }
}

impl Inner {
    fn report(&self, code: ErrorCode) {
        warn!(error = %code, "playback error");
        let _ = self.error_tx.send(code);
    }

    fn settings(&self) -> Settings {
        self.ctx.settings.read().unwrap().clone()
    }

    /// Dual-output mode: a routing backend provides the remote sink and the
    /// sink is not already installed as the system default source
    fn dual_output_active(&self, settings: &Settings) -> bool {
        !settings.use_as_default_device && self.ctx.backend.lock().unwrap().is_some()
    }

    fn remote_device(&self) -> Option<blare_core::AudioDevice> {
        let sink = self.ctx.sink_name()?;
        match self.ctx.engine.device(&sink) {
            Ok(device) => device,
            Err(err) => {
                warn!(%err, sink, "remote device lookup failed");
                None
            }
        }
    }

    fn targets_sink(&self, playing: &PlayingSound) -> bool {
        self.ctx.sink_name().as_deref() == Some(playing.playback_device.name.as_str())
    }

    fn play_sound(&self, id: SoundId) -> Option<PlayingSound> {
        let Some(sound) = self.ctx.catalog.get(id) else {
            self.report(ErrorCode::SoundNotFound);
            return None;
        };
        let settings = self.settings();

        if !settings.allow_overlapping {
            self.stop_sounds_now();
        }
        self.effects_armed.store(true, Ordering::SeqCst);
        if settings.mute_during_playback {
            // Without a backend there is nothing to mute; only report when
            // the backend call itself fails.
            let muted = self.ctx.with_backend(|b| b.mute_input(true)).unwrap_or(true);
            if !muted {
                self.report(ErrorCode::FailedToMute);
            }
        }
        if !settings.push_to_talk_keys.is_empty() {
            self.ctx.keys.press_keys(&settings.push_to_talk_keys);
        }

        let local_factor = factor_from_percent(sound.local_volume.unwrap_or(settings.local_volume));
        let local = match self.ctx.engine.play(&sound, None, Some(local_factor)) {
            Ok(playing) => playing,
            Err(err) => {
                warn!(%err, sound = id, "local start failed");
                self.report(ErrorCode::FailedToPlay);
                self.undo_effects_if_idle();
                return None;
            }
        };

        if !self.dual_output_active(&settings) {
            return Some(local);
        }

        let remote_factor = factor_from_percent(sound.remote_volume.unwrap_or(settings.remote_volume));
        let remote = self.remote_device().and_then(|device| {
            match self.ctx.engine.play(&sound, Some(&device), Some(remote_factor)) {
                Ok(playing) => Some(playing),
                Err(err) => {
                    warn!(%err, sound = id, "remote start failed");
                    None
                }
            }
        });
        let Some(remote) = remote else {
            // Roll the local leg back so no half-started pair lingers
            self.ctx.engine.stop(local.id);
            self.report(ErrorCode::FailedToPlay);
            self.undo_effects_if_idle();
            return None;
        };
        self.ctx.registry.insert(local.id, remote.id);

        if !settings.outputs.is_empty() {
            let mut moved_any = false;
            for output in &settings.outputs {
                let moved = self
                    .ctx
                    .with_backend(|backend| {
                        backend
                            .recording_app(output)
                            .is_some_and(|app| backend.input_sound_to(app.as_ref()))
                    })
                    .unwrap_or(false);
                if moved {
                    moved_any = true;
                } else {
                    warn!(app = %output, "capture redirection failed");
                }
            }
            if !moved_any {
                self.ctx.engine.stop(local.id);
                self.ctx.engine.stop(remote.id);
                self.ctx.registry.erase(local.id);
                self.report(ErrorCode::FailedToMoveToSink);
                self.undo_effects_if_idle();
                return None;
            }
        }

        debug!(sound = id, local = local.id, remote = remote.id, "dual playback started");
        Some(local)
    }

    fn stop_sound(&self, id: PlayingSoundId) -> bool {
        let settings = self.settings();
        let remote = self.ctx.registry.remote_of(id);

        if self.dual_output_active(&settings) && remote.is_none() {
            warn!(id, "dual routing active but sound has no remote pairing");
            return false;
        }

        let mut ok = self.ctx.engine.stop(id);
        if let Some(remote_id) = remote {
            ok &= self.ctx.engine.stop(remote_id);
        }
        self.ctx.registry.erase(id);

        if self.ctx.engine.playing_sounds().is_empty() {
            self.on_all_sounds_finished();
        }
        ok
    }

    fn stop_sounds_now(&self) {
        self.ctx.engine.stop_all();
        self.ctx.registry.clear();

        if let Some((moved_ok, passthrough_ok)) = self
            .ctx
            .with_backend(|b| (b.stop_sound_input(), b.stop_all_passthrough()))
        {
            if !moved_ok {
                self.report(ErrorCode::FailedToMoveBack);
            }
            if !passthrough_ok {
                self.report(ErrorCode::FailedToMoveBackPassthrough);
            }
        }
        self.on_all_sounds_finished();
    }

    fn set_custom_volume(&self, id: SoundId, volume: Option<u8>, remote: bool) -> Option<Sound> {
        let updated = if remote {
            self.ctx.catalog.set_remote_volume(id, volume)
        } else {
            self.ctx.catalog.set_local_volume(id, volume)
        };
        let Some(sound) = updated else {
            self.report(ErrorCode::FailedToSetCustomVolume);
            return None;
        };

        let settings = self.settings();
        let default = if remote { settings.remote_volume } else { settings.local_volume };
        let factor = factor_from_percent(volume.unwrap_or(default));

        for playing in self.ctx.engine.playing_sounds() {
            if playing.sound.id == id && self.targets_sink(&playing) == remote {
                self.ctx.engine.set_volume(playing.id, factor);
            }
        }
        Some(sound)
    }

    fn change_settings(&self, mut settings: Settings) -> Settings {
        let old = self.settings();

        if !settings.allow_multiple_outputs && settings.outputs.len() > 1 {
            warn!(
                dropped = settings.outputs.len() - 1,
                "multiple outputs configured but not allowed, keeping the first"
            );
            settings.outputs.truncate(1);
        }

        if old.audio_backend != settings.audio_backend {
            info!(from = old.audio_backend.name(), to = settings.audio_backend.name(), "switching backend");
            self.stop_sounds_now();
            let mut guard = self.ctx.backend.lock().unwrap();
            if let Some(backend) = guard.as_mut() {
                backend.destroy();
            }
            *guard = match create_backend(settings.audio_backend) {
                Ok(backend) => Some(backend),
                Err(err) => {
                    warn!(%err, "new backend unavailable");
                    None
                }
            };
        }

        let playing = self.ctx.engine.playing_sounds();

        if (old.local_volume != settings.local_volume || old.remote_volume != settings.remote_volume)
            && !playing.is_empty()
        {
            for sound in &playing {
                let overrides = self.ctx.catalog.get(sound.sound.id);
                let percent = if self.targets_sink(sound) {
                    overrides
                        .and_then(|s| s.remote_volume)
                        .unwrap_or(settings.remote_volume)
                } else {
                    overrides
                        .and_then(|s| s.local_volume)
                        .unwrap_or(settings.local_volume)
                };
                self.ctx.engine.set_volume(sound.id, factor_from_percent(percent));
            }
        }

        if old.mute_during_playback != settings.mute_during_playback && !playing.is_empty() {
            let target = settings.mute_during_playback;
            let ok = self.ctx.with_backend(|b| b.mute_input(target)).unwrap_or(true);
            if !ok {
                self.report(ErrorCode::FailedToMute);
            }
        }

        if old.use_as_default_device != settings.use_as_default_device {
            if settings.use_as_default_device {
                settings.outputs.clear();
                // The default-source override replaces per-app redirection
                if let Some(false) = self.ctx.with_backend(|b| b.stop_sound_input()) {
                    self.report(ErrorCode::FailedToMoveBack);
                }
                let ok = self.ctx.with_backend(|b| b.use_as_default()).unwrap_or(false);
                if !ok {
                    self.report(ErrorCode::FailedToSetDefaultSource);
                }
            } else {
                let ok = self.ctx.with_backend(|b| b.revert_default()).unwrap_or(false);
                if !ok {
                    self.report(ErrorCode::FailedToRevertDefaultSource);
                }
            }
        }

        if old.outputs != settings.outputs && !settings.use_as_default_device {
            self.ctx.with_backend(|b| b.stop_sound_input());
            if !playing.is_empty() {
                for output in &settings.outputs {
                    let moved = self
                        .ctx
                        .with_backend(|backend| {
                            backend
                                .recording_app(output)
                                .is_some_and(|app| backend.input_sound_to(app.as_ref()))
                        })
                        .unwrap_or(false);
                    if !moved {
                        self.report(ErrorCode::FailedToMoveToSink);
                    }
                }
            }
        }

        *self.ctx.settings.write().unwrap() = settings.clone();
        settings
    }

    fn start_passthrough(&self, name: &str) -> bool {
        let settings = self.settings();

        for output in &settings.outputs {
            let moved = self
                .ctx
                .with_backend(|backend| {
                    backend
                        .recording_app(output)
                        .is_some_and(|app| backend.input_sound_to(app.as_ref()))
                })
                .unwrap_or(false);
            if !moved {
                self.report(ErrorCode::FailedToMoveToSink);
                return false;
            }
        }

        let mixed = self
            .ctx
            .with_backend(|backend| {
                backend
                    .playback_app(name)
                    .is_some_and(|app| backend.passthrough_from(app.as_ref()))
            })
            .unwrap_or(false);
        if !mixed {
            self.report(ErrorCode::FailedToStartPassthrough);
            return false;
        }
        debug!(app = name, "passthrough started");
        true
    }

    fn stop_passthrough(&self, name: &str) -> bool {
        let idle = self.ctx.engine.playing_sounds().is_empty();
        let mut ok = true;

        let last = self
            .ctx
            .with_backend(|b| {
                let passed = b.currently_passed_through();
                passed.len() == 1 && passed.iter().any(|n| n == name)
            })
            .unwrap_or(false);

        if idle && last {
            let reverted = self.ctx.with_backend(|b| b.stop_sound_input()).unwrap_or(false);
            if !reverted {
                self.report(ErrorCode::FailedToMoveBack);
                ok = false;
            }
        }

        let removed = self
            .ctx
            .with_backend(|b| b.stop_passthrough(name))
            .unwrap_or(false);
        if !removed {
            self.report(ErrorCode::FailedToMoveBackPassthrough);
            ok = false;
        }
        ok
    }

    fn build_stream_infos(&self, raw: Vec<(String, String, Option<u32>)>) -> Vec<StreamInfo> {
        let mut seen = Vec::new();
        let mut infos = Vec::new();
        for (name, application, pid) in raw {
            // The engine's own streams are not offered as routing targets
            if application.to_lowercase().contains("blare") || name.to_lowercase().contains("blare")
            {
                continue;
            }
            if seen.contains(&name) {
                continue;
            }
            seen.push(name.clone());
            let icon = pid.and_then(|pid| self.ctx.icons.icon(pid));
            infos.push(StreamInfo {
                name,
                application,
                pid,
                icon,
            });
        }
        infos
    }

    fn handle_event(&self, event: &EngineEvent) {
        match event {
            EngineEvent::SoundPlayed(playing) => self.on_sound_played(playing),
            EngineEvent::SoundFinished(playing) => self.on_sound_finished(playing),
        }
    }

    fn on_sound_played(&self, playing: &PlayingSound) {
        debug!(id = playing.id, sound = %playing.sound.name, "sound started");
    }

    fn on_sound_finished(&self, playing: &PlayingSound) {
        self.ctx.engine.discard(playing.id);
        self.ctx.registry.scoped(|map| {
            map.remove(&playing.id);
            map.retain(|_, remote| *remote != playing.id);
        });
        debug!(id = playing.id, sound = %playing.sound.name, "sound finished");

        if self.ctx.engine.playing_sounds().is_empty() {
            self.on_all_sounds_finished();
        }
    }

    /// Run the all-finished undo when nothing is left playing
    fn undo_effects_if_idle(&self) {
        if self.ctx.engine.playing_sounds().is_empty() {
            self.on_all_sounds_finished();
        }
    }

    /// Undo everything `play_sound` set up, exactly once per busy period
    fn on_all_sounds_finished(&self) {
        if !self.effects_armed.swap(false, Ordering::SeqCst) {
            return;
        }
        let settings = self.settings();

        if !settings.push_to_talk_keys.is_empty() {
            self.ctx.keys.release_keys(&settings.push_to_talk_keys);
        }
        if settings.mute_during_playback {
            let ok = self.ctx.with_backend(|b| b.mute_input(false)).unwrap_or(true);
            if !ok {
                self.report(ErrorCode::FailedToMute);
            }
        }

        // Keep redirection while a passthrough mix still feeds the sink
        let reverted = self
            .ctx
            .with_backend(|b| {
                if b.currently_passed_through().is_empty() {
                    Some(b.stop_sound_input())
                } else {
                    None
                }
            })
            .flatten();
        if reverted == Some(false) {
            self.report(ErrorCode::FailedToMoveBack);
        }
    }
}
