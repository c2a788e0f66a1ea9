//! Error kinds surfaced by the recorder controller
//!
//! Platform calls fail with `anyhow::Error`. Each controller operation
//! converts those failures into one of these kinds at its boundary, so
//! callers never see raw platform errors.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// Microphone access was refused
    #[error("Microphone permission denied")]
    PermissionDenied,

    /// The platform could not open an audio input or output
    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Stopping or flushing the recording failed
    #[error("Failed to finalize recording: {0}")]
    FinalizeError(String),

    /// A playback command failed
    #[error("Playback failed: {0}")]
    PlaybackError(String),

    #[error("A recording is already in progress")]
    AlreadyRecording,

    #[error("No recording in progress")]
    NotRecording,

    #[error("No clip has been recorded yet")]
    NoClip,

    /// Another operation has not finished yet
    #[error("Another audio operation is still running")]
    Busy,
}

impl ControllerError {
    pub(crate) fn device(err: anyhow::Error) -> Self {
        ControllerError::DeviceUnavailable(format!("{:#}", err))
    }

    pub(crate) fn finalize(err: anyhow::Error) -> Self {
        ControllerError::FinalizeError(format!("{:#}", err))
    }

    pub(crate) fn playback(err: anyhow::Error) -> Self {
        ControllerError::PlaybackError(format!("{:#}", err))
    }

    /// Errors the operation was rejected for before any platform call was made
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ControllerError::AlreadyRecording
                | ControllerError::NotRecording
                | ControllerError::NoClip
                | ControllerError::Busy
        )
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors leave the controller usable as-is; the user can
    /// simply try again. The others must be shown to the user.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ControllerError::PermissionDenied => false,
            ControllerError::DeviceUnavailable(_) => false,
            ControllerError::FinalizeError(_) => false,
            ControllerError::PlaybackError(_) => true,
            _ => self.is_precondition(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_errors_keep_context_chain() {
        let err = anyhow::anyhow!("device busy").context("Failed to open input");
        let converted = ControllerError::device(err);

        assert_eq!(
            converted,
            ControllerError::DeviceUnavailable("Failed to open input: device busy".to_string())
        );
    }

    #[test]
    fn test_only_playback_and_preconditions_are_recoverable() {
        assert!(ControllerError::PlaybackError("x".into()).is_recoverable());
        assert!(ControllerError::Busy.is_recoverable());
        assert!(ControllerError::NoClip.is_recoverable());
        assert!(!ControllerError::PermissionDenied.is_recoverable());
        assert!(!ControllerError::FinalizeError("x".into()).is_recoverable());
        assert!(!ControllerError::DeviceUnavailable("x".into()).is_recoverable());
    }
}
