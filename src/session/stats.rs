use chrono::{DateTime, Utc};
use serde::Serialize;

use super::config::PlaybackMode;
use super::gain::GainLevel;
use super::state::ControllerState;
use crate::platform::PlaybackStatus;

/// Point-in-time view of the controller, for rendering and status output
#[derive(Debug, Clone, Serialize)]
pub struct ControllerSnapshot {
    /// No recording / recording / has clip
    #[serde(flatten)]
    pub state: ControllerState,

    /// Gain applied on the next play
    pub gain: GainLevel,

    /// Source of the current clip, if any
    pub clip_uri: Option<String>,

    /// When the active recording started
    pub recording_started_at: Option<DateTime<Utc>>,

    /// Number of clips recorded in this session
    pub takes: u64,

    pub playback_mode: PlaybackMode,

    /// Status of the clip's sound handle while one is held
    pub playback: Option<PlaybackStatus>,
}

impl ControllerSnapshot {
    pub fn is_recording(&self) -> bool {
        self.state == ControllerState::Recording
    }

    pub fn has_clip(&self) -> bool {
        matches!(self.state, ControllerState::HasClip { .. })
    }
}
