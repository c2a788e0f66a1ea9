use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use super::gain::GainLevel;
use crate::error::ControllerError;
use crate::platform::{ClipUri, RecordingHandle, SoundHandle};

/// Observable controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ControllerState {
    NoRecording,
    Recording,
    HasClip { playing: bool },
}

/// An in-progress capture
pub struct ActiveRecording {
    pub id: Uuid,
    pub handle: Box<dyn RecordingHandle>,
    pub started_at: DateTime<Utc>,
}

impl ActiveRecording {
    pub fn new(handle: Box<dyn RecordingHandle>) -> Self {
        Self {
            id: Uuid::new_v4(),
            handle,
            started_at: Utc::now(),
        }
    }
}

/// A finalized clip ready for playback
pub struct PlayableClip {
    pub id: Uuid,
    pub uri: ClipUri,
    /// None once the handle has been released (one-shot playback)
    pub handle: Option<Box<dyn SoundHandle>>,
    /// Volume applied on the last play
    volume: GainLevel,
    /// Shared with status callbacks of tracked handles
    playing: Arc<AtomicBool>,
    pub created_at: DateTime<Utc>,
}

impl PlayableClip {
    pub fn new(uri: ClipUri, handle: Box<dyn SoundHandle>, playing: Arc<AtomicBool>) -> Self {
        Self {
            id: Uuid::new_v4(),
            uri,
            handle: Some(handle),
            volume: GainLevel::MAX,
            playing,
            created_at: Utc::now(),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    pub fn volume(&self) -> GainLevel {
        self.volume
    }

    /// The flag status callbacks for this clip write to
    pub fn playing_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.playing)
    }
}

/// The only ways the session slots change
pub enum Transition {
    /// Fill the recording slot; displaces any clip (implicit replace)
    BeginRecording(ActiveRecording),
    /// Empty the recording slot so the recording can be finalized
    EndRecording,
    /// The finalized recording never became a clip
    AbandonFinalize,
    /// Fill the clip slot with a clip made from the last finalized recording
    InstallClip(PlayableClip),
    /// Give the clip the fresh handle that was just played; displaces the old one
    SwapSoundHandle {
        handle: Box<dyn SoundHandle>,
        volume: GainLevel,
    },
    /// Playback of the clip is about to start
    MarkPlaying,
    /// Playback of the clip stopped or never started
    MarkStopped,
    /// Take the clip's sound handle out for release
    ReleaseSoundHandle,
    /// Empty both slots
    Clear,
}

/// Everything a transition displaced; the caller must release it
#[derive(Default)]
pub struct Released {
    pub recording: Option<ActiveRecording>,
    pub clip: Option<PlayableClip>,
    pub sound: Option<Box<dyn SoundHandle>>,
}

impl Released {
    pub fn is_empty(&self) -> bool {
        self.recording.is_none() && self.clip.is_none() && self.sound.is_none()
    }
}

/// At most one recording and at most one clip
#[derive(Default)]
pub struct SessionSlots {
    recording: Option<ActiveRecording>,
    clip: Option<PlayableClip>,
    /// Recordings finalized but not yet installed as a clip
    pending_finalize: bool,
    takes: u64,
}

impl SessionSlots {
    pub fn apply(&mut self, transition: Transition) -> Result<Released, ControllerError> {
        let mut released = Released::default();

        match transition {
            Transition::BeginRecording(recording) => {
                if self.recording.is_some() {
                    return Err(ControllerError::AlreadyRecording);
                }
                released.clip = self.clip.take();
                self.recording = Some(recording);
            }
            Transition::EndRecording => {
                let recording = self.recording.take().ok_or(ControllerError::NotRecording)?;
                self.pending_finalize = true;
                released.recording = Some(recording);
            }
            Transition::AbandonFinalize => {
                self.pending_finalize = false;
            }
            Transition::InstallClip(clip) => {
                if !self.pending_finalize || self.recording.is_some() {
                    return Err(ControllerError::NotRecording);
                }
                self.pending_finalize = false;
                self.takes += 1;
                released.clip = self.clip.replace(clip);
            }
            Transition::SwapSoundHandle { handle, volume } => {
                let clip = self.clip.as_mut().ok_or(ControllerError::NoClip)?;
                released.sound = clip.handle.replace(handle);
                clip.volume = volume;
            }
            Transition::MarkPlaying => {
                let clip = self.clip.as_ref().ok_or(ControllerError::NoClip)?;
                clip.playing.store(true, Ordering::SeqCst);
            }
            Transition::MarkStopped => {
                let clip = self.clip.as_ref().ok_or(ControllerError::NoClip)?;
                clip.playing.store(false, Ordering::SeqCst);
            }
            Transition::ReleaseSoundHandle => {
                let clip = self.clip.as_mut().ok_or(ControllerError::NoClip)?;
                released.sound = clip.handle.take();
                clip.playing.store(false, Ordering::SeqCst);
            }
            Transition::Clear => {
                self.pending_finalize = false;
                released.recording = self.recording.take();
                released.clip = self.clip.take();
            }
        }

        Ok(released)
    }

    pub fn state(&self) -> ControllerState {
        match (&self.recording, &self.clip) {
            (Some(_), _) => ControllerState::Recording,
            (None, Some(clip)) => ControllerState::HasClip {
                playing: clip.is_playing(),
            },
            (None, None) => ControllerState::NoRecording,
        }
    }

    pub fn recording(&self) -> Option<&ActiveRecording> {
        self.recording.as_ref()
    }

    pub fn clip(&self) -> Option<&PlayableClip> {
        self.clip.as_ref()
    }

    pub fn clip_mut(&mut self) -> Option<&mut PlayableClip> {
        self.clip.as_mut()
    }

    /// Number of clips installed so far
    pub fn takes(&self) -> u64 {
        self.takes
    }

    pub fn has_live_handles(&self) -> bool {
        self.recording.is_some() || self.clip.as_ref().is_some_and(|c| c.handle.is_some())
    }
}
