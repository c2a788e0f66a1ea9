use serde::{Deserialize, Serialize};

use super::gain::GainLevel;
use crate::platform::RecordingPreset;

/// What happens to the sound handle after `play_sound` issues play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    /// Detach the status callback and unload the handle right after play.
    /// Playback is never tracked to completion and may be cut short.
    #[default]
    OneShot,
    /// Keep the handle; a status callback clears the playing flag on finish
    Tracked,
}

/// Configuration for a recorder controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerOptions {
    /// Capture quality for new recordings
    pub preset: RecordingPreset,

    pub playback_mode: PlaybackMode,

    /// Pitch applied on play is `pitch_per_gain × gain`
    /// Default: 1000
    pub pitch_per_gain: f32,

    /// Gain before the slider is first moved
    pub initial_gain: GainLevel,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            preset: RecordingPreset::HighQuality,
            playback_mode: PlaybackMode::OneShot,
            pitch_per_gain: 1000.0,
            initial_gain: GainLevel::MIN,
        }
    }
}
