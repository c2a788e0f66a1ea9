use anyhow::{bail, Context, Result};
use chrono::Utc;
use parking_lot::Mutex;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::player::LocalSound;
use super::{
    AudioMode, AudioPlatform, ClipUri, PermissionStatus, RecordingHandle, RecordingPreset, SoundHandle,
    SoundOptions, StatusCallback,
};
use crate::audio::{
    convert, AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFile, AudioSource, ClipMetadata,
    ClipWriter, OutputKind,
};

/// Configuration for the local platform
#[derive(Debug, Clone)]
pub struct LocalPlatformConfig {
    /// Where finalized clips are written
    pub recordings_dir: PathBuf,
    /// Capture source for new recordings
    pub source: AudioSource,
    pub backend: AudioBackendConfig,
    /// Answer given to permission requests
    pub microphone_permission: PermissionStatus,
    pub output: OutputKind,
}

/// Audio platform backed by the local capture backends and outputs
pub struct LocalPlatform {
    config: LocalPlatformConfig,
    mode: Mutex<AudioMode>,
}

impl LocalPlatform {
    pub fn new(config: LocalPlatformConfig) -> Self {
        info!(
            "Local audio platform: source={:?}, recordings={}",
            config.source,
            config.recordings_dir.display()
        );

        Self {
            config,
            mode: Mutex::new(AudioMode::default()),
        }
    }

    pub fn audio_mode(&self) -> AudioMode {
        *self.mode.lock()
    }

    fn next_clip_path(&self) -> PathBuf {
        let id = Uuid::new_v4().simple().to_string();
        self.config.recordings_dir.join(format!(
            "take-{}-{}.wav",
            Utc::now().format("%Y%m%d-%H%M%S"),
            &id[..8]
        ))
    }
}

#[async_trait::async_trait]
impl AudioPlatform for LocalPlatform {
    async fn request_permission(&self) -> Result<PermissionStatus> {
        info!("Microphone permission: {:?}", self.config.microphone_permission);
        Ok(self.config.microphone_permission)
    }

    async fn configure_audio_mode(&self, mode: AudioMode) -> Result<()> {
        info!(
            "Audio mode: allow_recording={}, play_in_silent_mode={}",
            mode.allow_recording, mode.play_in_silent_mode
        );
        *self.mode.lock() = mode;
        Ok(())
    }

    async fn open_recording(&self, preset: RecordingPreset) -> Result<Box<dyn RecordingHandle>> {
        if !self.mode.lock().allow_recording {
            bail!("Recording is not allowed by the current audio mode");
        }

        let backend = AudioBackendFactory::create(&self.config.source, self.config.backend.clone())
            .context("Failed to create audio backend")?;

        let recording = LocalRecording::new(backend, preset, self.next_clip_path());
        Ok(Box::new(recording))
    }

    async fn load_sound(
        &self,
        uri: &ClipUri,
        options: SoundOptions,
        on_status: Option<StatusCallback>,
    ) -> Result<Box<dyn SoundHandle>> {
        let path = uri
            .to_path()
            .with_context(|| format!("Cannot load non-file clip: {}", uri))?;

        let audio = tokio::task::spawn_blocking(move || AudioFile::open(path))
            .await
            .context("Decoder task panicked")??;

        let mut sound = LocalSound::new(
            audio,
            self.config.output,
            self.config.backend.buffer_duration_ms,
            options.volume,
            on_status,
        );

        if options.should_play {
            sound.play().await?;
        }

        Ok(Box::new(sound))
    }

    async fn discard_clip(&self, uri: &ClipUri) -> Result<()> {
        let path = uri
            .to_path()
            .with_context(|| format!("Cannot discard non-file clip: {}", uri))?;
        if !path.starts_with(&self.config.recordings_dir) {
            bail!("Clip {} is outside the recordings directory", uri);
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!("Clip discarded: {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove clip file {}", path.display())),
        }
    }

    fn name(&self) -> &str {
        "local"
    }
}

/// A capture session writing one clip file
pub struct LocalRecording {
    id: Uuid,
    preset: RecordingPreset,
    path: PathBuf,
    backend: Box<dyn AudioBackend>,
    writer_task: Option<JoinHandle<Result<ClipMetadata>>>,
}

impl LocalRecording {
    fn new(backend: Box<dyn AudioBackend>, preset: RecordingPreset, path: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            preset,
            path,
            backend,
            writer_task: None,
        }
    }

    fn remove_file(&self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!("Failed to remove clip file {}: {}", self.path.display(), e);
            }
        }
    }
}

#[async_trait::async_trait]
impl RecordingHandle for LocalRecording {
    async fn start(&mut self) -> Result<()> {
        if self.writer_task.is_some() {
            bail!("Recording already started");
        }

        info!(
            "Starting recording {} via {} ({:?})",
            self.id,
            self.backend.name(),
            self.preset
        );

        let sample_rate = self.preset.sample_rate();
        let channels = self.preset.channels();
        let mut writer = ClipWriter::create(self.path.clone(), sample_rate, channels)?;

        let mut audio_rx = match self.backend.start().await {
            Ok(rx) => rx,
            Err(e) => {
                drop(writer);
                self.remove_file();
                return Err(e).context("Failed to start audio capture");
            }
        };

        self.writer_task = Some(tokio::spawn(async move {
            while let Some(frame) = audio_rx.recv().await {
                let frame = convert::conform(frame, sample_rate, channels);
                writer.write_frame(&frame)?;
            }
            debug!("Capture channel closed after {} samples", writer.sample_count());
            writer.finish()
        }));

        info!("Recording {} started", self.id);
        Ok(())
    }

    async fn stop_and_finalize(&mut self) -> Result<ClipUri> {
        let task = self
            .writer_task
            .take()
            .context("Recording was never started")?;

        info!("Stopping recording {}", self.id);

        if let Err(e) = self.backend.stop().await {
            task.abort();
            self.remove_file();
            return Err(e).context("Failed to stop audio capture");
        }

        let metadata = match task.await {
            Ok(Ok(metadata)) => metadata,
            Ok(Err(e)) => {
                self.remove_file();
                return Err(e);
            }
            Err(e) => {
                self.remove_file();
                return Err(e).context("Clip writer task panicked");
            }
        };

        if metadata.sample_count == 0 {
            self.remove_file();
            bail!("Recording is empty (zero-length capture)");
        }

        info!(
            "Recording {} finalized: {} ({:.1}s, {} samples)",
            self.id,
            metadata.file_path.display(),
            metadata.duration_ms() as f64 / 1000.0,
            metadata.sample_count
        );

        Ok(ClipUri::from_path(&metadata.file_path))
    }

    async fn release(&mut self) -> Result<()> {
        if let Some(task) = self.writer_task.take() {
            task.abort();
            if let Err(e) = self.backend.stop().await {
                warn!("Failed to stop audio capture on release: {:#}", e);
            }
            // Let the aborted writer drop its file handle before removal
            let _ = task.await;
            self.remove_file();
            info!("Recording {} released", self.id);
        }
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.writer_task.is_some()
    }
}

impl Drop for LocalRecording {
    fn drop(&mut self) {
        if let Some(task) = self.writer_task.take() {
            task.abort();
        }
    }
}
