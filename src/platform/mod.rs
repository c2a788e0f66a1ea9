//! Platform audio API
//!
//! The controller talks to audio hardware only through these traits:
//! - `AudioPlatform`: permissions, audio mode, opening recordings, loading sounds
//! - `RecordingHandle`: one capture session
//! - `SoundHandle`: one playable instance of a clip
//!
//! `LocalPlatform` implements them on top of the `audio` module.

mod local;
mod player;

pub use local::{LocalPlatform, LocalPlatformConfig};
pub use player::LocalSound;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Outcome of a microphone permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// Session-wide audio behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AudioMode {
    pub allow_recording: bool,
    pub play_in_silent_mode: bool,
}

impl AudioMode {
    /// The mode used before every recording
    pub fn recording() -> Self {
        Self {
            allow_recording: true,
            play_in_silent_mode: true,
        }
    }
}

/// Capture quality preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingPreset {
    /// 44.1kHz stereo
    #[default]
    HighQuality,
    /// 22.05kHz mono
    LowQuality,
}

impl RecordingPreset {
    pub fn sample_rate(self) -> u32 {
        match self {
            RecordingPreset::HighQuality => 44100,
            RecordingPreset::LowQuality => 22050,
        }
    }

    pub fn channels(self) -> u16 {
        match self {
            RecordingPreset::HighQuality => 2,
            RecordingPreset::LowQuality => 1,
        }
    }
}

/// Platform-assigned location of a finalized clip
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClipUri(String);

impl ClipUri {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn from_path(path: &Path) -> Self {
        Self(format!("file://{}", path.display()))
    }

    /// Local filesystem path, for `file://` URIs
    pub fn to_path(&self) -> Option<PathBuf> {
        self.0.strip_prefix("file://").map(PathBuf::from)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClipUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of a sound handle's playback
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PlaybackStatus {
    pub is_loaded: bool,
    pub is_playing: bool,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub volume: f32,
    pub pitch: f32,
    /// Set only on the update sent when playback reaches the end
    pub did_just_finish: bool,
}

/// Receives playback status updates from a sound handle
pub type StatusCallback = Arc<dyn Fn(PlaybackStatus) + Send + Sync>;

/// Initial state of a newly loaded sound
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundOptions {
    /// Start playing as soon as the sound is loaded
    pub should_play: bool,
    pub volume: f32,
}

impl Default for SoundOptions {
    fn default() -> Self {
        Self {
            should_play: false,
            volume: 1.0,
        }
    }
}

#[async_trait::async_trait]
pub trait AudioPlatform: Send + Sync {
    async fn request_permission(&self) -> Result<PermissionStatus>;

    async fn configure_audio_mode(&self, mode: AudioMode) -> Result<()>;

    /// Prepare a new recording; it does not capture until `start`
    async fn open_recording(&self, preset: RecordingPreset) -> Result<Box<dyn RecordingHandle>>;

    async fn load_sound(
        &self,
        uri: &ClipUri,
        options: SoundOptions,
        on_status: Option<StatusCallback>,
    ) -> Result<Box<dyn SoundHandle>>;

    /// Delete the stored clip behind a URI once nothing refers to it
    async fn discard_clip(&self, uri: &ClipUri) -> Result<()>;

    /// Get platform name for logging
    fn name(&self) -> &str;
}

#[async_trait::async_trait]
pub trait RecordingHandle: Send + Sync {
    async fn start(&mut self) -> Result<()>;

    /// Stop capturing, flush and close; returns where the clip was stored
    async fn stop_and_finalize(&mut self) -> Result<ClipUri>;

    /// Abandon the recording and free everything it holds
    async fn release(&mut self) -> Result<()>;

    fn is_recording(&self) -> bool;
}

#[async_trait::async_trait]
pub trait SoundHandle: Send + Sync {
    /// Play from the current position
    async fn play(&mut self) -> Result<()>;

    /// Stop and rewind to the beginning
    async fn stop(&mut self) -> Result<()>;

    async fn set_volume(&mut self, volume: f32) -> Result<()>;

    async fn set_pitch(&mut self, pitch: f32) -> Result<()>;

    fn set_on_playback_status_update(&mut self, callback: Option<StatusCallback>);

    /// Release the native resources; the handle is unusable afterwards
    async fn unload(&mut self) -> Result<()>;

    fn status(&self) -> PlaybackStatus;
}
