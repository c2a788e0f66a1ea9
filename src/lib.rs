pub mod audio;
pub mod config;
pub mod error;
pub mod platform;
pub mod session;
pub mod ui;

pub use audio::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFile, AudioFrame, AudioOutput, AudioSource,
    ClipMetadata, ClipWriter, OutputKind, Pacing,
};
pub use config::Config;
pub use error::ControllerError;
pub use platform::{
    AudioMode, AudioPlatform, ClipUri, LocalPlatform, LocalPlatformConfig, PermissionStatus, PlaybackStatus,
    RecordingHandle, RecordingPreset, SoundHandle, SoundOptions, StatusCallback,
};
pub use session::{ControllerOptions, ControllerSnapshot, ControllerState, GainLevel, PlaybackMode, RecorderController};
