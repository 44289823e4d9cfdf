//! Routing backend contract
//!
//! One backend is active at a time. Redirect/revert operations return
//! `bool` rather than `Result` because the caller treats them as
//! best-effort side effects and maps failures onto its own error codes;
//! the `Result` type here covers construction and tool invocation.

use crate::app::{PlaybackApp, RecordingApp};
use crate::pipewire::PipeWireBackend;
use crate::pulse::PulseBackend;
use blare_core::BackendKind;
use std::process::Command;
use tracing::debug;

/// Name of the virtual sink every backend creates
pub const SINK_NAME: &str = "blare_sink";

#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    /// The backend's command-line tooling is missing or the daemon is down
    #[error("audio backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A tool invocation exited non-zero
    #[error("'{command}' failed: {detail}")]
    CommandFailed { command: String, detail: String },

    /// Tool output did not parse
    #[error("failed to parse {0} output")]
    ParseFailed(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RoutingError>;

/// Capability contract all routing backends implement
///
/// Mutating operations record enough state to be reversible;
/// [`destroy`](RoutingBackend::destroy) reverts everything still standing
/// and unloads the virtual sink. It must only be called while no sound is
/// playing, and at most once.
pub trait RoutingBackend: Send {
    fn kind(&self) -> BackendKind;

    /// Name of the virtual sink this backend manages
    fn sink_name(&self) -> &str;

    /// Applications currently recording
    fn recording_apps(&self) -> Vec<Box<dyn RecordingApp>>;

    /// Applications currently playing audio
    fn playback_apps(&self) -> Vec<Box<dyn PlaybackApp>>;

    /// Look a recording application up by display name
    fn recording_app(&self, name: &str) -> Option<Box<dyn RecordingApp>>;

    /// Look a playback application up by display name
    fn playback_app(&self, name: &str) -> Option<Box<dyn PlaybackApp>>;

    /// Redirect `app`'s capture input to the virtual sink
    fn input_sound_to(&mut self, app: &dyn RecordingApp) -> bool;

    /// Undo every capture-input redirection
    fn stop_sound_input(&mut self) -> bool;

    /// Mix `app`'s playback into the virtual sink
    fn passthrough_from(&mut self, app: &dyn PlaybackApp) -> bool;

    /// Remove the passthrough mix for the named application
    fn stop_passthrough(&mut self, name: &str) -> bool;

    /// Remove every passthrough mix
    fn stop_all_passthrough(&mut self) -> bool;

    /// Names of applications currently mixed into the sink
    fn currently_passed_through(&self) -> Vec<String>;

    /// Mute or unmute the system default capture source
    fn mute_input(&mut self, mute: bool) -> bool;

    /// Install the sink monitor as the system default source
    fn use_as_default(&mut self) -> bool;

    /// Revert the default-source override
    fn revert_default(&mut self) -> bool;

    /// Revert all outstanding state and unload the sink
    fn destroy(&mut self) -> bool;
}

/// Construct the backend for `kind`, creating its virtual sink
pub fn create_backend(kind: BackendKind) -> Result<Box<dyn RoutingBackend>> {
    debug!(backend = kind.name(), "creating routing backend");
    match kind {
        BackendKind::PulseAudio => Ok(Box::new(PulseBackend::new()?)),
        BackendKind::PipeWire => Ok(Box::new(PipeWireBackend::new()?)),
    }
}

/// Run a backend tool and capture its stdout
pub(crate) fn run_tool(program: &str, args: &[&str]) -> Result<String> {
    debug!(%program, ?args, "running backend tool");
    let output = Command::new(program).args(args).output().map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            RoutingError::BackendUnavailable(format!("'{program}' not found"))
        } else {
            RoutingError::Io(err)
        }
    })?;

    if !output.status.success() {
        return Err(RoutingError::CommandFailed {
            command: format!("{program} {}", args.join(" ")),
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run a backend tool for its side effect only
pub(crate) fn run_tool_ok(program: &str, args: &[&str]) -> bool {
    match run_tool(program, args) {
        Ok(_) => true,
        Err(err) => {
            tracing::warn!(%program, ?args, %err, "backend tool failed");
            false
        }
    }
}
