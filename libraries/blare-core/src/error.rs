//! UI-facing error signal codes

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Enumerated error codes surfaced to the UI layer
///
/// Every public playback operation returns a primary result (optional value
/// or bool) and may additionally emit one of these codes on the error side
/// channel. Secondary side-effect failures (muting, routing) emit a code
/// without aborting the primary action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ErrorCode {
    /// The requested sound id is not in the catalog
    #[error("sound not found")]
    SoundNotFound,

    /// Neither playback leg could be started
    #[error("failed to play sound")]
    FailedToPlay,

    /// The local instance could not be paused
    #[error("failed to pause sound")]
    FailedToPause,

    /// The local instance could not be resumed
    #[error("failed to resume sound")]
    FailedToResume,

    /// The local instance could not seek
    #[error("failed to seek sound")]
    FailedToSeek,

    /// The repeat flag could not be applied
    #[error("failed to set repeat state")]
    FailedToRepeat,

    /// Muting or unmuting the default capture source failed
    #[error("failed to mute input")]
    FailedToMute,

    /// Redirecting an application's capture input to the sink failed
    #[error("failed to move application to sink")]
    FailedToMoveToSink,

    /// Reverting capture-input redirection failed
    #[error("failed to move application back")]
    FailedToMoveBack,

    /// Removing a passthrough mix failed
    #[error("failed to remove passthrough stream")]
    FailedToMoveBackPassthrough,

    /// Mixing a playback application into the sink failed
    #[error("failed to start passthrough")]
    FailedToStartPassthrough,

    /// Turning off use-as-default mode could not restore the previous source
    #[error("failed to revert default source")]
    FailedToRevertDefaultSource,

    /// Turning on use-as-default mode failed
    #[error("failed to set default source")]
    FailedToSetDefaultSource,

    /// Per-sound volume override targeted a sound that does not exist
    #[error("failed to set custom volume")]
    FailedToSetCustomVolume,

    /// The requested tab does not exist
    #[error("tab does not exist")]
    TabDoesNotExist,

    /// The requested folder does not exist
    #[error("folder does not exist")]
    FolderDoesNotExist,
}
