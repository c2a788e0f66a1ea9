use std::fmt::Write as _;

use crate::session::{ControllerSnapshot, ControllerState, GainLevel};

pub const TITLE: &str = "Record Voice from Here";

/// Gain slider: 0.0 to 1.0 in steps of 0.1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainSlider {
    pub value: GainLevel,
}

impl GainSlider {
    pub const MIN: f32 = 0.0;
    pub const MAX: f32 = 1.0;
    pub const LABEL: &'static str = "Gain Slider";
    const WIDTH: usize = 10;

    pub fn new(value: GainLevel) -> Self {
        Self { value }
    }

    /// Adopt the value the slider reports
    pub fn on_value_change(&mut self, reported: f32) -> GainLevel {
        self.value = GainLevel::new(reported);
        self.value
    }

    fn render(&self) -> String {
        let filled = self.value.tenths() as usize;
        format!(
            "{} [{}{}] {}",
            Self::LABEL,
            "#".repeat(filled),
            "-".repeat(Self::WIDTH - filled),
            self.value
        )
    }
}

/// What the screen shows for a given controller snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Screen {
    pub record_label: &'static str,
    /// Play/stop buttons and the slider only exist once a clip does
    pub show_player: bool,
    pub playing: bool,
    pub slider: GainSlider,
    pub clip_uri: Option<String>,
}

impl Screen {
    pub fn from_snapshot(snapshot: &ControllerSnapshot) -> Self {
        let record_label = if snapshot.is_recording() {
            "Stop Recording"
        } else {
            "Start Recording"
        };

        Self {
            record_label,
            show_player: snapshot.has_clip(),
            playing: matches!(snapshot.state, ControllerState::HasClip { playing: true }),
            slider: GainSlider::new(snapshot.gain),
            clip_uri: snapshot.clip_uri.clone(),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "== {} ==", TITLE);
        let _ = writeln!(out, "  [r] {}", self.record_label);

        if self.show_player {
            let _ = writeln!(out, "  [p] Play Sound    [s] Stop Sound");
            let _ = writeln!(out, "  {}", self.slider.render());
            if let Some(uri) = &self.clip_uri {
                let state = if self.playing { "playing" } else { "stopped" };
                let _ = writeln!(out, "  clip: {} ({})", uri, state);
            }
        }

        out
    }
}
