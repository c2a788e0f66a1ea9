use anyhow::Result;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Duration of this frame in milliseconds
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        let frames = self.samples.len() as u64 / self.channels as u64;
        frames * 1000 / self.sample_rate as u64
    }
}

/// How a file-backed source delivers its frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// One buffer per buffer duration, like a live device
    Realtime,
    /// As fast as the consumer accepts them
    Immediate,
}

/// Configuration for audio backend
#[derive(Debug, Clone)]
pub struct AudioBackendConfig {
    /// Buffer size in milliseconds (affects latency)
    pub buffer_duration_ms: u64,
    /// Frame delivery for file sources
    pub pacing: Pacing,
}

impl Default for AudioBackendConfig {
    fn default() -> Self {
        Self {
            buffer_duration_ms: 100, // 100ms buffers
            pacing: Pacing::Realtime,
        }
    }
}

/// Audio capture backend trait
///
/// Implementations:
/// - Microphone: cpal default input device (feature `cpal`)
/// - File: replays a decoded audio file (for testing/headless use)
#[async_trait::async_trait]
pub trait AudioBackend: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio frames
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing audio
    async fn stop(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Audio backend factory
pub struct AudioBackendFactory;

impl AudioBackendFactory {
    /// Create audio backend based on source and configuration
    pub fn create(source: &AudioSource, config: AudioBackendConfig) -> Result<Box<dyn AudioBackend>> {
        match source {
            AudioSource::Microphone => {
                #[cfg(feature = "cpal")]
                {
                    use super::mic::MicrophoneBackend;
                    let backend = MicrophoneBackend::new(config)?;
                    Ok(Box::new(backend))
                }

                #[cfg(not(feature = "cpal"))]
                {
                    let _ = config;
                    anyhow::bail!("Microphone capture requires the `cpal` feature")
                }
            }

            AudioSource::File(path) => {
                use super::file::FileBackend;
                let backend = FileBackend::open(path, config)?;
                Ok(Box::new(backend))
            }
        }
    }
}

/// Audio source type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Default input device
    Microphone,
    /// File input, replayed as if it were the microphone
    File(PathBuf),
}
