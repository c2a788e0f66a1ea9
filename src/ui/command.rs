use anyhow::{bail, Context, Result};

use super::screen::GainSlider;
use crate::error::ControllerError;
use crate::session::{ControllerState, GainLevel, RecorderController};

/// A typed screen command
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Record button: start or stop depending on state
    ToggleRecording,
    Play,
    Stop,
    /// Slider moved to the given value
    Gain(f32),
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  r, record     start / stop recording
  p, play       play the clip
  s, stop       stop the clip
  g, gain <v>   set gain (0.0 - 1.0, step 0.1)
  status        show controller status
  help          show this help
  q, quit       exit";

impl Command {
    pub fn parse(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let Some(word) = parts.next() else {
            bail!("Empty command");
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "r" | "record" => Command::ToggleRecording,
            "p" | "play" => Command::Play,
            "s" | "stop" => Command::Stop,
            "g" | "gain" => {
                let value = parts.next().context("Missing gain value")?;
                let value: f32 = value
                    .parse()
                    .with_context(|| format!("Invalid gain value: {}", value))?;
                Command::Gain(value)
            }
            "status" => Command::Status,
            "h" | "help" | "?" => Command::Help,
            "q" | "quit" | "exit" => Command::Quit,
            other => bail!("Unknown command: {}", other),
        };

        if let Some(extra) = parts.next() {
            bail!("Unexpected argument: {}", extra);
        }

        Ok(command)
    }
}

/// What a dispatched command did
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    RecordingStarted,
    RecordingSaved(String),
    PlaybackStarted,
    PlaybackStopped,
    GainSet(GainLevel),
    /// Nothing to do for the controller
    None,
}

/// Run a command against the controller
pub async fn dispatch(controller: &RecorderController, command: Command) -> Result<Outcome, ControllerError> {
    match command {
        Command::ToggleRecording => {
            if controller.state().await == ControllerState::Recording {
                let uri = controller.stop_recording().await?;
                Ok(Outcome::RecordingSaved(uri.to_string()))
            } else {
                controller.start_recording().await?;
                Ok(Outcome::RecordingStarted)
            }
        }
        Command::Play => {
            controller.play_sound().await?;
            Ok(Outcome::PlaybackStarted)
        }
        Command::Stop => {
            controller.stop_sound().await?;
            Ok(Outcome::PlaybackStopped)
        }
        Command::Gain(value) => {
            let mut slider = GainSlider::new(controller.gain());
            let gain = slider.on_value_change(value);
            Ok(Outcome::GainSet(controller.set_gain(gain.value())))
        }
        Command::Status | Command::Help | Command::Quit => Ok(Outcome::None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("r").unwrap(), Command::ToggleRecording);
        assert_eq!(Command::parse("  PLAY ").unwrap(), Command::Play);
        assert_eq!(Command::parse("stop").unwrap(), Command::Stop);
        assert_eq!(Command::parse("gain 0.7").unwrap(), Command::Gain(0.7));
        assert_eq!(Command::parse("q").unwrap(), Command::Quit);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Command::parse("").is_err());
        assert!(Command::parse("gain").is_err());
        assert!(Command::parse("gain loud").is_err());
        assert!(Command::parse("play twice").is_err());
        assert!(Command::parse("rewind").is_err());
    }
}
