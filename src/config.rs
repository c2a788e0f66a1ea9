use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

use crate::audio::{AudioBackendConfig, AudioSource, OutputKind, Pacing};
use crate::platform::{LocalPlatformConfig, PermissionStatus, RecordingPreset};
use crate::session::{ControllerOptions, GainLevel, PlaybackMode};

/// Environment variables override file values, e.g. `VOICE_MEMO__PLAYBACK__MODE=tracked`
pub const ENV_PREFIX: &str = "VOICE_MEMO";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub permissions: PermissionsConfig,
    pub playback: PlaybackConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "voice-memo".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub recordings_path: String,
    pub preset: RecordingPreset,
    /// Replay this file instead of capturing from the microphone
    pub input_file: Option<String>,
    pub buffer_duration_ms: u64,
    /// Deliver replayed input at real-time speed
    pub realtime: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            recordings_path: "~/.voice-memo/recordings".to_string(),
            preset: RecordingPreset::HighQuality,
            input_file: None,
            buffer_duration_ms: 100,
            realtime: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PermissionsConfig {
    pub microphone: PermissionStatus,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            microphone: PermissionStatus::Granted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputChoice {
    #[default]
    Virtual,
    Speaker,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub mode: PlaybackMode,
    pub pitch_per_gain: f32,
    pub initial_gain: f32,
    pub output: OutputChoice,
    /// Pace the virtual output like a real speaker
    pub realtime: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            mode: PlaybackMode::OneShot,
            pitch_per_gain: 1000.0,
            initial_gain: 0.0,
            output: OutputChoice::Virtual,
            realtime: true,
        }
    }
}

impl Config {
    /// Load defaults, then the optional config file, then the environment
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Recordings directory with `~` expanded
    pub fn recordings_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.audio.recordings_path).as_ref())
    }

    pub fn audio_source(&self) -> AudioSource {
        match &self.audio.input_file {
            Some(path) => AudioSource::File(PathBuf::from(shellexpand::tilde(path).as_ref())),
            None => AudioSource::Microphone,
        }
    }

    pub fn output_kind(&self) -> Result<OutputKind> {
        match self.playback.output {
            OutputChoice::Virtual => Ok(OutputKind::Virtual {
                paced: self.playback.realtime,
            }),
            #[cfg(feature = "cpal")]
            OutputChoice::Speaker => Ok(OutputKind::Speaker),
            #[cfg(not(feature = "cpal"))]
            OutputChoice::Speaker => anyhow::bail!("Speaker output requires the `cpal` feature"),
        }
    }

    pub fn platform_config(&self) -> Result<LocalPlatformConfig> {
        Ok(LocalPlatformConfig {
            recordings_dir: self.recordings_dir(),
            source: self.audio_source(),
            backend: AudioBackendConfig {
                buffer_duration_ms: self.audio.buffer_duration_ms,
                pacing: if self.audio.realtime {
                    Pacing::Realtime
                } else {
                    Pacing::Immediate
                },
            },
            microphone_permission: self.permissions.microphone,
            output: self.output_kind()?,
        })
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            preset: self.audio.preset,
            playback_mode: self.playback.mode,
            pitch_per_gain: self.playback.pitch_per_gain,
            initial_gain: GainLevel::new(self.playback.initial_gain),
        }
    }
}
