use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::{info, warn};

use super::backend::AudioFrame;

/// Metadata for a finished clip
#[derive(Debug, Clone)]
pub struct ClipMetadata {
    /// File path to the clip
    pub file_path: PathBuf,
    /// Timestamp of the first frame, in milliseconds since capture started
    pub start_ms: u64,
    /// Timestamp of the last frame
    pub end_ms: u64,
    /// Sample rate
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Number of samples written (all channels)
    pub sample_count: usize,
}

impl ClipMetadata {
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        (self.sample_count as u64 / self.channels as u64) * 1000 / self.sample_rate as u64
    }
}

/// Writes a single recorded clip to disk as a 16-bit WAV file
pub struct ClipWriter {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    metadata: ClipMetadata,
    started: bool,
}

impl ClipWriter {
    pub fn create(file_path: PathBuf, sample_rate: u32, channels: u16) -> Result<Self> {
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create output directory")?;
        }

        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = hound::WavWriter::create(&file_path, spec)
            .with_context(|| format!("Failed to create WAV file: {:?}", file_path))?;

        info!(
            "Clip writer opened: {} ({}Hz, {} channels)",
            file_path.display(),
            sample_rate,
            channels
        );

        Ok(Self {
            writer: Some(writer),
            metadata: ClipMetadata {
                file_path,
                start_ms: 0,
                end_ms: 0,
                sample_rate,
                channels,
                sample_count: 0,
            },
            started: false,
        })
    }

    /// Frames must already be in the clip's format (see `convert::conform`)
    pub fn write_frame(&mut self, frame: &AudioFrame) -> Result<()> {
        if frame.sample_rate != self.metadata.sample_rate || frame.channels != self.metadata.channels {
            anyhow::bail!(
                "Frame format {}Hz/{}ch does not match clip format {}Hz/{}ch",
                frame.sample_rate,
                frame.channels,
                self.metadata.sample_rate,
                self.metadata.channels
            );
        }

        if let Some(writer) = &mut self.writer {
            for &sample in &frame.samples {
                writer
                    .write_sample(sample)
                    .context("Failed to write sample to WAV")?;
            }

            if !self.started {
                self.metadata.start_ms = frame.timestamp_ms;
                self.started = true;
            }
            self.metadata.end_ms = frame.timestamp_ms;
            self.metadata.sample_count += frame.samples.len();
        }

        Ok(())
    }

    pub fn sample_count(&self) -> usize {
        self.metadata.sample_count
    }

    /// Flush the WAV header and close the file
    pub fn finish(mut self) -> Result<ClipMetadata> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().context("Failed to finalize WAV file")?;
        }

        Ok(self.metadata.clone())
    }
}

impl Drop for ClipWriter {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                warn!("Failed to finalize WAV writer on drop: {}", e);
            }
        }
    }
}
