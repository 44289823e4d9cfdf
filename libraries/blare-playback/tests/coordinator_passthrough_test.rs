//! Passthrough start/stop gating and its interaction with capture
//! redirection.

mod common;

use blare_core::ErrorCode;
use blare_routing::{Capability, RoutingBackend};
use common::fixture;

#[test]
fn start_redirects_outputs_then_mixes() {
    let f = fixture();
    f.ctx.settings.write().unwrap().outputs = vec!["Discord".to_string()];

    assert!(f.coordinator.start_passthrough("Music"));
    let backend = f.backend.lock().unwrap();
    assert_eq!(backend.moved(), ["Discord"]);
    assert_eq!(backend.currently_passed_through(), ["Music"]);
}

#[test]
fn start_aborts_when_redirection_fails() {
    let f = fixture();
    f.ctx.settings.write().unwrap().outputs = vec!["Discord".to_string()];
    f.backend.lock().unwrap().fail(Capability::InputSoundTo);

    assert!(!f.coordinator.start_passthrough("Music"));
    assert_eq!(f.errors(), vec![ErrorCode::FailedToMoveToSink]);
    assert!(f.backend.lock().unwrap().currently_passed_through().is_empty());
}

#[test]
fn start_with_unknown_playback_app_fails() {
    let f = fixture();
    assert!(!f.coordinator.start_passthrough("Ghost"));
    assert_eq!(f.errors(), vec![ErrorCode::FailedToStartPassthrough]);
}

#[test]
fn stop_of_last_mix_while_idle_reverts_redirection() {
    let f = fixture();
    f.ctx.settings.write().unwrap().outputs = vec!["Discord".to_string()];
    f.coordinator.start_passthrough("Music");

    assert!(f.coordinator.stop_passthrough("Music"));
    let backend = f.backend.lock().unwrap();
    assert!(backend.moved().is_empty());
    assert!(backend.currently_passed_through().is_empty());
}

#[test]
fn stop_while_sound_plays_leaves_redirection_intact() {
    let f = fixture();
    f.add_sound(1, "airhorn");
    f.ctx.settings.write().unwrap().outputs = vec!["Discord".to_string()];
    f.coordinator.play_sound(1).unwrap();
    f.coordinator.start_passthrough("Music");

    assert!(f.coordinator.stop_passthrough("Music"));
    let backend = f.backend.lock().unwrap();
    // The mix is gone but redirection stays for the playing sound
    assert!(backend.currently_passed_through().is_empty());
    assert_eq!(backend.moved(), ["Discord"]);
}

#[test]
fn all_finished_keeps_redirection_while_mix_is_active() {
    let f = fixture();
    f.add_sound(1, "airhorn");
    f.ctx.settings.write().unwrap().outputs = vec!["Discord".to_string()];
    f.coordinator.play_sound(1).unwrap();
    f.coordinator.start_passthrough("Music");

    f.driver.finish_all();
    f.coordinator.process_engine_events();

    assert!(f.ctx.engine.playing_sounds().is_empty());
    let backend = f.backend.lock().unwrap();
    assert_eq!(backend.currently_passed_through(), ["Music"]);
    assert_eq!(backend.moved(), ["Discord"]);
    drop(backend);

    // Removing the last mix with nothing playing now reverts everything
    assert!(f.coordinator.stop_passthrough("Music"));
    let backend = f.backend.lock().unwrap();
    assert!(backend.moved().is_empty());
    assert!(backend.currently_passed_through().is_empty());
}

#[test]
fn stop_failure_codes_surface() {
    let f = fixture();
    f.ctx.settings.write().unwrap().outputs = vec!["Discord".to_string()];
    f.coordinator.start_passthrough("Music");

    f.backend.lock().unwrap().fail(Capability::StopSoundInput);
    f.backend.lock().unwrap().fail(Capability::StopPassthrough);

    assert!(!f.coordinator.stop_passthrough("Music"));
    let errors = f.errors();
    assert!(errors.contains(&ErrorCode::FailedToMoveBack));
    assert!(errors.contains(&ErrorCode::FailedToMoveBackPassthrough));
}
