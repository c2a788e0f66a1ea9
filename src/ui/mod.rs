//! Terminal rendition of the recorder screen
//!
//! One record toggle, play/stop buttons and a gain slider that appear once
//! a clip exists, driven by typed commands.

mod command;
mod screen;

pub use command::{dispatch, Command, Outcome, HELP};
pub use screen::{GainSlider, Screen, TITLE};
