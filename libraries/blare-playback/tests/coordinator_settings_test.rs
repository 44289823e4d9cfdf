//! Settings diff reconciliation against live playback state.

mod common;

use blare_core::{BackendKind, ErrorCode, Settings};
use blare_routing::Capability;
use common::fixture;

fn current(f: &common::Fixture) -> Settings {
    f.ctx.settings.read().unwrap().clone()
}

#[test]
fn outputs_truncate_when_multiple_disallowed() {
    let f = fixture();
    let mut settings = current(&f);
    settings.allow_multiple_outputs = false;
    settings.outputs = vec!["A".to_string(), "B".to_string()];

    let applied = f.coordinator.change_settings(settings);
    assert_eq!(applied.outputs, vec!["A".to_string()]);
    assert_eq!(current(&f).outputs, vec!["A".to_string()]);
}

#[test]
fn default_volume_change_reapplies_to_live_instances() {
    let f = fixture();
    f.add_sound(1, "a");
    f.add_sound(2, "b");
    // Sound 2 carries its own override and must not follow the default
    f.coordinator.set_custom_local_volume(2, Some(80));
    f.coordinator.play_sound(1).unwrap();
    f.coordinator.play_sound(2).unwrap();

    let mut settings = current(&f);
    settings.local_volume = 50;
    settings.remote_volume = 30;
    f.coordinator.change_settings(settings);

    let streams = f.driver.streams();
    let volume_of = |sound: &str, device: &str| {
        streams
            .iter()
            .find(|s| {
                s.path.to_string_lossy().ends_with(&format!("/{sound}.wav"))
                    && s.device.name == device
            })
            .unwrap()
            .ctl
            .volume()
            .get()
    };
    assert!((volume_of("a", "Mock Speakers") - 0.5).abs() < f32::EPSILON);
    assert!((volume_of("a", "blare_sink") - 0.3).abs() < f32::EPSILON);
    assert!((volume_of("b", "Mock Speakers") - 0.8).abs() < f32::EPSILON);
}

#[test]
fn mute_toggle_reconciles_live_playback() {
    let f = fixture();
    f.add_sound(1, "a");
    f.coordinator.play_sound(1).unwrap();
    assert!(!f.backend.lock().unwrap().is_muted());

    let mut settings = current(&f);
    settings.mute_during_playback = true;
    f.coordinator.change_settings(settings);
    assert!(f.backend.lock().unwrap().is_muted());

    let mut settings = current(&f);
    settings.mute_during_playback = false;
    f.coordinator.change_settings(settings);
    assert!(!f.backend.lock().unwrap().is_muted());
}

#[test]
fn mute_toggle_without_playback_is_deferred() {
    let f = fixture();
    let mut settings = current(&f);
    settings.mute_during_playback = true;
    f.coordinator.change_settings(settings);
    // Nothing playing, so nothing to reconcile yet
    assert!(!f.backend.lock().unwrap().is_muted());
}

#[test]
fn use_as_default_clears_outputs_and_overrides_source() {
    let f = fixture();
    f.ctx.settings.write().unwrap().outputs = vec!["Discord".to_string()];

    let mut settings = current(&f);
    settings.use_as_default_device = true;
    let applied = f.coordinator.change_settings(settings);

    assert!(applied.outputs.is_empty());
    assert!(f.backend.lock().unwrap().is_default_overridden());

    let mut settings = current(&f);
    settings.use_as_default_device = false;
    f.coordinator.change_settings(settings);
    assert!(!f.backend.lock().unwrap().is_default_overridden());
}

#[test]
fn use_as_default_reverts_live_capture_redirection() {
    let f = fixture();
    f.add_sound(1, "a");
    f.ctx.settings.write().unwrap().outputs = vec!["Discord".to_string()];
    f.coordinator.play_sound(1).unwrap();
    assert_eq!(f.backend.lock().unwrap().moved(), ["Discord"]);

    let mut settings = current(&f);
    settings.use_as_default_device = true;
    f.coordinator.change_settings(settings);

    // Moved streams are released before the default-source override
    assert!(f.backend.lock().unwrap().moved().is_empty());
    assert!(f.backend.lock().unwrap().is_default_overridden());
    assert!(f.errors().is_empty());
}

#[test]
fn default_source_failures_are_reported() {
    let f = fixture();
    f.backend.lock().unwrap().fail(Capability::UseAsDefault);
    f.backend.lock().unwrap().fail(Capability::RevertDefault);

    let mut settings = current(&f);
    settings.use_as_default_device = true;
    f.coordinator.change_settings(settings);
    assert!(f.errors().contains(&ErrorCode::FailedToSetDefaultSource));

    let mut settings = current(&f);
    settings.use_as_default_device = false;
    f.coordinator.change_settings(settings);
    assert!(f.errors().contains(&ErrorCode::FailedToRevertDefaultSource));
}

#[test]
fn output_change_rewires_while_playing() {
    let f = fixture();
    f.add_sound(1, "a");
    f.ctx.settings.write().unwrap().outputs = vec!["Discord".to_string()];
    f.coordinator.play_sound(1).unwrap();
    assert_eq!(f.backend.lock().unwrap().moved(), ["Discord"]);

    let mut settings = current(&f);
    settings.outputs = vec!["Telephony".to_string()];
    f.coordinator.change_settings(settings);
    assert_eq!(f.backend.lock().unwrap().moved(), ["Telephony"]);
}

#[test]
fn output_change_to_missing_app_reports_error() {
    let f = fixture();
    f.add_sound(1, "a");
    f.coordinator.play_sound(1).unwrap();

    let mut settings = current(&f);
    settings.outputs = vec!["Ghost".to_string()];
    f.coordinator.change_settings(settings);
    assert!(f.errors().contains(&ErrorCode::FailedToMoveToSink));
    // Playback itself keeps running
    assert_eq!(f.ctx.engine.playing_sounds().len(), 2);
}

#[test]
fn backend_swap_stops_everything_and_destroys_old_backend() {
    let f = fixture();
    f.add_sound(1, "a");
    f.coordinator.play_sound(1).unwrap();
    assert_eq!(f.driver.live_count(), 2);

    let mut settings = current(&f);
    settings.audio_backend = BackendKind::PipeWire;
    let applied = f.coordinator.change_settings(settings);

    assert_eq!(applied.audio_backend, BackendKind::PipeWire);
    assert!(f.ctx.engine.playing_sounds().is_empty());
    assert!(f.ctx.registry.is_empty());
    assert!(f.backend.lock().unwrap().is_destroyed());
}

#[test]
fn applied_settings_are_returned_and_stored() {
    let f = fixture();
    let mut settings = current(&f);
    settings.local_volume = 65;
    settings.push_to_talk_keys = vec![29];

    let applied = f.coordinator.change_settings(settings.clone());
    assert_eq!(applied, settings);
    assert_eq!(current(&f), settings);
}
