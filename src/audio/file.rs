use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame, Pacing};

/// A fully decoded audio file (interleaved i16 PCM)
#[derive(Debug, Clone)]
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    /// Decode any container/codec symphonia understands (WAV, FLAC, MP3, OGG, M4A)
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open audio file: {}", path.display()))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .context("Unsupported audio format")?;
        let mut format = probed.format;

        let track = format
            .default_track()
            .context("Audio file has no default track")?
            .clone();
        let sample_rate = track
            .codec_params
            .sample_rate
            .context("Audio track has no sample rate")?;
        let channels = track
            .codec_params
            .channels
            .map(|c| c.count() as u16)
            .unwrap_or(1);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .context("Unsupported audio codec")?;

        let mut samples: Vec<i16> = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break
                }
                Err(e) => return Err(e).context("Failed to read audio packet"),
            };

            if packet.track_id() != track.id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Skipping undecodable packet: {}", e);
                    continue;
                }
                Err(e) => return Err(e).context("Failed to decode audio packet"),
            };

            let spec = *decoded.spec();
            let mut buf = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }

        let duration_seconds = samples.len() as f64 / (sample_rate as f64 * channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            sample_rate,
            channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate,
            channels,
            samples,
        })
    }

    pub fn duration_ms(&self) -> u64 {
        (self.duration_seconds * 1000.0).round() as u64
    }

    /// Split into frames of `buffer_ms` each; the last frame may be shorter
    pub fn frames(&self, buffer_ms: u64) -> Vec<AudioFrame> {
        let samples_per_frame =
            ((self.sample_rate as u64 * buffer_ms / 1000).max(1) * self.channels as u64) as usize;

        self.samples
            .chunks(samples_per_frame)
            .enumerate()
            .map(|(i, chunk)| AudioFrame {
                samples: chunk.to_vec(),
                sample_rate: self.sample_rate,
                channels: self.channels,
                timestamp_ms: i as u64 * buffer_ms,
            })
            .collect()
    }
}

/// Capture backend that replays an audio file as microphone input
pub struct FileBackend {
    path: PathBuf,
    config: AudioBackendConfig,
    stop_requested: Arc<AtomicBool>,
    feeder: Option<JoinHandle<()>>,
}

impl FileBackend {
    pub fn open(path: impl AsRef<Path>, config: AudioBackendConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            anyhow::bail!("Input file not found: {}", path.display());
        }

        info!(
            "File backend initialized: {} ({}ms buffers, {:?})",
            path.display(),
            config.buffer_duration_ms,
            config.pacing
        );

        Ok(Self {
            path,
            config,
            stop_requested: Arc::new(AtomicBool::new(false)),
            feeder: None,
        })
    }
}

#[async_trait::async_trait]
impl AudioBackend for FileBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.feeder.is_some() {
            anyhow::bail!("Already capturing");
        }

        let audio = AudioFile::open(&self.path)?;
        let frames = audio.frames(self.config.buffer_duration_ms);
        let pacing = self.config.pacing;
        let buffer = std::time::Duration::from_millis(self.config.buffer_duration_ms);

        self.stop_requested.store(false, Ordering::SeqCst);
        let stop_requested = Arc::clone(&self.stop_requested);
        let (tx, rx) = mpsc::channel(100);

        let feeder = tokio::spawn(async move {
            for frame in frames {
                if pacing == Pacing::Realtime {
                    if stop_requested.load(Ordering::SeqCst) {
                        break;
                    }
                    tokio::time::sleep(buffer).await;
                }
                if tx.send(frame).await.is_err() {
                    break;
                }
            }
        });

        self.feeder = Some(feeder);
        info!("File capture started: {}", self.path.display());

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        let Some(feeder) = self.feeder.take() else {
            return Ok(());
        };

        // Immediate pacing delivers the whole file before stopping
        self.stop_requested.store(true, Ordering::SeqCst);
        feeder.await.context("File feeder task panicked")?;

        info!("File capture stopped: {}", self.path.display());
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.feeder.is_some()
    }

    fn name(&self) -> &str {
        "file replay"
    }
}

impl Drop for FileBackend {
    fn drop(&mut self) {
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio(samples: usize, sample_rate: u32, channels: u16) -> AudioFile {
        AudioFile {
            path: "memory".to_string(),
            duration_seconds: samples as f64 / (sample_rate as f64 * channels as f64),
            sample_rate,
            channels,
            samples: vec![7; samples],
        }
    }

    #[test]
    fn test_frames_split_by_buffer_duration() {
        // 250ms of 16kHz mono
        let file = audio(4000, 16000, 1);
        let frames = file.frames(100);

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].samples.len(), 1600);
        assert_eq!(frames[2].samples.len(), 800);
        assert_eq!(frames[1].timestamp_ms, 100);
        assert_eq!(frames[2].timestamp_ms, 200);
    }

    #[test]
    fn test_frames_keep_stereo_interleaving() {
        let file = audio(8820, 44100, 2);
        let frames = file.frames(50);

        // 50ms at 44.1kHz = 2205 frames * 2 channels
        assert_eq!(frames[0].samples.len(), 4410);
        assert!(frames.iter().all(|f| f.samples.len() % 2 == 0));
    }

    #[test]
    fn test_duration_ms() {
        let file = audio(22050, 44100, 1);
        assert_eq!(file.duration_ms(), 500);
    }
}
