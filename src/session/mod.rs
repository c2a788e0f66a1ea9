//! Recorder session management
//!
//! This module provides the `RecorderController` that manages:
//! - The single active recording and the single playable clip
//! - Gain state fed into every playback
//! - Busy guarding of overlapping operations
//! - Snapshots for the UI

mod config;
mod controller;
mod gain;
mod state;
mod stats;

pub use config::{ControllerOptions, PlaybackMode};
pub use controller::RecorderController;
pub use gain::GainLevel;
pub use state::{ActiveRecording, ControllerState, PlayableClip, Released, SessionSlots, Transition};
pub use stats::ControllerSnapshot;
