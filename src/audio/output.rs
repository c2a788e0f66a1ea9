use anyhow::Result;
use std::time::Duration;

use super::backend::AudioFrame;

/// Audio playback sink
///
/// Implementations:
/// - Virtual: discards samples, optionally paced like a real device
/// - Speaker: cpal default output device (feature `cpal`)
#[async_trait::async_trait]
pub trait AudioOutput: Send {
    /// Queue one frame for output; may wait until the device has room
    async fn write(&mut self, frame: &AudioFrame) -> Result<()>;

    /// Wait for queued audio to finish playing
    async fn drain(&mut self) -> Result<()>;

    /// Get output name for logging
    fn name(&self) -> &str;
}

/// Output sink with no device behind it
///
/// When paced, each write takes as long as the frame would take to play,
/// so playback position and completion behave like a real speaker.
pub struct VirtualOutput {
    paced: bool,
    frames_written: usize,
}

impl VirtualOutput {
    pub fn new(paced: bool) -> Self {
        Self {
            paced,
            frames_written: 0,
        }
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }
}

#[async_trait::async_trait]
impl AudioOutput for VirtualOutput {
    async fn write(&mut self, frame: &AudioFrame) -> Result<()> {
        if self.paced {
            tokio::time::sleep(Duration::from_millis(frame.duration_ms())).await;
        }
        self.frames_written += 1;
        Ok(())
    }

    async fn drain(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "virtual"
    }
}

/// Which output a sound plays through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Virtual { paced: bool },
    #[cfg(feature = "cpal")]
    Speaker,
}

impl OutputKind {
    pub async fn open(self) -> Result<Box<dyn AudioOutput>> {
        match self {
            OutputKind::Virtual { paced } => Ok(Box::new(VirtualOutput::new(paced))),
            #[cfg(feature = "cpal")]
            OutputKind::Speaker => Ok(Box::new(super::speaker::SpeakerOutput::open().await?)),
        }
    }
}
