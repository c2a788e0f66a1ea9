// Local sound playback
//
// A LocalSound holds a decoded clip in memory. Playing spawns a task that
// writes volume-scaled frames to an AudioOutput. Every play/stop/unload bumps
// a generation counter, and a task whose generation is stale exits without
// touching the shared state.

use anyhow::{bail, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::{PlaybackStatus, SoundHandle, StatusCallback};
use crate::audio::{convert, AudioFile, AudioFrame, OutputKind};

struct SoundState {
    loaded: bool,
    playing: bool,
    /// Sample index (interleaved) of the next sample to play
    position: usize,
    volume: f32,
    pitch: f32,
    generation: u64,
}

struct Shared {
    audio: Arc<AudioFile>,
    state: Mutex<SoundState>,
    callback: Mutex<Option<StatusCallback>>,
}

impl Shared {
    fn status(&self, did_just_finish: bool) -> PlaybackStatus {
        let state = self.state.lock();
        let frames = state.position as u64 / self.audio.channels.max(1) as u64;
        PlaybackStatus {
            is_loaded: state.loaded,
            is_playing: state.playing,
            position_ms: frames * 1000 / self.audio.sample_rate.max(1) as u64,
            duration_ms: self.audio.duration_ms(),
            volume: state.volume,
            pitch: state.pitch,
            did_just_finish,
        }
    }

    fn notify(&self, did_just_finish: bool) {
        let callback = self.callback.lock().clone();
        if let Some(callback) = callback {
            callback(self.status(did_just_finish));
        }
    }
}

/// A playable instance of a decoded clip
pub struct LocalSound {
    shared: Arc<Shared>,
    output: OutputKind,
    buffer_duration_ms: u64,
    task: Option<JoinHandle<()>>,
}

impl LocalSound {
    pub fn new(
        audio: AudioFile,
        output: OutputKind,
        buffer_duration_ms: u64,
        volume: f32,
        on_status: Option<StatusCallback>,
    ) -> Self {
        debug!("Sound loaded: {} ({:.1}s)", audio.path, audio.duration_seconds);

        Self {
            shared: Arc::new(Shared {
                audio: Arc::new(audio),
                state: Mutex::new(SoundState {
                    loaded: true,
                    playing: false,
                    position: 0,
                    volume: volume.clamp(0.0, 1.0),
                    pitch: 1.0,
                    generation: 0,
                }),
                callback: Mutex::new(on_status),
            }),
            output,
            buffer_duration_ms,
            task: None,
        }
    }

    fn ensure_loaded(&self) -> Result<()> {
        if !self.shared.state.lock().loaded {
            bail!("Sound is not loaded");
        }
        Ok(())
    }

    fn abort_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[async_trait::async_trait]
impl SoundHandle for LocalSound {
    async fn play(&mut self) -> Result<()> {
        let generation = {
            let mut state = self.shared.state.lock();
            if !state.loaded {
                bail!("Sound is not loaded");
            }
            if state.playing {
                return Ok(());
            }
            if state.position >= self.shared.audio.samples.len() {
                state.position = 0;
            }
            state.playing = true;
            state.generation += 1;
            state.generation
        };

        self.abort_task();
        let shared = Arc::clone(&self.shared);
        let output = self.output;
        let buffer_duration_ms = self.buffer_duration_ms;
        self.task = Some(tokio::spawn(async move {
            run_playback(shared, output, buffer_duration_ms, generation).await;
        }));

        info!("Playback started: {}", self.shared.audio.path);
        self.shared.notify(false);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        {
            let mut state = self.shared.state.lock();
            if !state.loaded {
                bail!("Sound is not loaded");
            }
            state.generation += 1;
            state.playing = false;
            state.position = 0;
        }
        self.abort_task();

        debug!("Playback stopped: {}", self.shared.audio.path);
        self.shared.notify(false);
        Ok(())
    }

    async fn set_volume(&mut self, volume: f32) -> Result<()> {
        self.ensure_loaded()?;
        if !volume.is_finite() {
            bail!("Invalid volume: {}", volume);
        }
        self.shared.state.lock().volume = volume.clamp(0.0, 1.0);
        Ok(())
    }

    async fn set_pitch(&mut self, pitch: f32) -> Result<()> {
        self.ensure_loaded()?;
        if !pitch.is_finite() || pitch < 0.0 {
            bail!("Invalid pitch: {}", pitch);
        }
        self.shared.state.lock().pitch = pitch;
        Ok(())
    }

    fn set_on_playback_status_update(&mut self, callback: Option<StatusCallback>) {
        *self.shared.callback.lock() = callback;
    }

    async fn unload(&mut self) -> Result<()> {
        {
            let mut state = self.shared.state.lock();
            if !state.loaded {
                return Ok(());
            }
            state.generation += 1;
            state.loaded = false;
            state.playing = false;
        }
        self.abort_task();
        *self.shared.callback.lock() = None;

        debug!("Sound unloaded: {}", self.shared.audio.path);
        Ok(())
    }

    fn status(&self) -> PlaybackStatus {
        self.shared.status(false)
    }
}

impl Drop for LocalSound {
    fn drop(&mut self) {
        self.abort_task();
    }
}

async fn run_playback(shared: Arc<Shared>, output: OutputKind, buffer_duration_ms: u64, generation: u64) {
    let audio = Arc::clone(&shared.audio);
    let mut output = match output.open().await {
        Ok(output) => output,
        Err(e) => {
            error!("Failed to open audio output: {:#}", e);
            let mut state = shared.state.lock();
            if state.generation == generation {
                state.playing = false;
            }
            return;
        }
    };

    let channels = audio.channels.max(1) as usize;
    let samples_per_frame =
        (audio.sample_rate as u64 * buffer_duration_ms / 1000).max(1) as usize * channels;

    loop {
        let (start, volume) = {
            let state = shared.state.lock();
            if state.generation != generation {
                return;
            }
            (state.position, state.volume)
        };

        if start >= audio.samples.len() {
            break;
        }

        let end = (start + samples_per_frame).min(audio.samples.len());
        let mut samples = audio.samples[start..end].to_vec();
        convert::apply_volume(&mut samples, volume);

        let frame = AudioFrame {
            samples,
            sample_rate: audio.sample_rate,
            channels: audio.channels,
            timestamp_ms: (start / channels) as u64 * 1000 / audio.sample_rate.max(1) as u64,
        };

        if let Err(e) = output.write(&frame).await {
            error!("Audio output write failed on {}: {:#}", output.name(), e);
            break;
        }

        let mut state = shared.state.lock();
        if state.generation != generation {
            return;
        }
        state.position = end;
    }

    if let Err(e) = output.drain().await {
        error!("Failed to drain audio output: {:#}", e);
    }

    {
        let mut state = shared.state.lock();
        if state.generation != generation {
            return;
        }
        state.playing = false;
    }

    info!("Playback finished: {}", audio.path);
    shared.notify(true);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn clip(ms: usize) -> AudioFile {
        AudioFile {
            path: "memory.wav".to_string(),
            duration_seconds: ms as f64 / 1000.0,
            sample_rate: 16000,
            channels: 1,
            samples: vec![1000; 16 * ms],
        }
    }

    async fn wait_until(mut done: impl FnMut() -> bool) {
        for _ in 0..200 {
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn test_play_to_end_reports_finish() -> Result<()> {
        let finished = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&finished);
        let callback: StatusCallback = Arc::new(move |status: PlaybackStatus| {
            if status.did_just_finish {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let mut sound = LocalSound::new(clip(300), OutputKind::Virtual { paced: false }, 100, 1.0, Some(callback));
        sound.play().await?;

        wait_until(|| finished.load(Ordering::SeqCst) == 1).await;
        let status = sound.status();
        assert!(!status.is_playing);
        assert_eq!(status.position_ms, 300);
        assert_eq!(status.duration_ms, 300);
        Ok(())
    }

    #[tokio::test]
    async fn test_stop_rewinds() -> Result<()> {
        let mut sound = LocalSound::new(clip(2000), OutputKind::Virtual { paced: true }, 100, 1.0, None);
        sound.play().await?;
        tokio::time::sleep(Duration::from_millis(250)).await;

        sound.stop().await?;
        let status = sound.status();
        assert!(!status.is_playing);
        assert_eq!(status.position_ms, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_unload_rejects_further_commands() -> Result<()> {
        let mut sound = LocalSound::new(clip(100), OutputKind::Virtual { paced: false }, 100, 1.0, None);
        sound.set_volume(0.4).await?;
        sound.set_pitch(400.0).await?;
        assert_eq!(sound.status().volume, 0.4);
        assert_eq!(sound.status().pitch, 400.0);

        sound.unload().await?;

        assert!(!sound.status().is_loaded);
        assert!(sound.play().await.is_err());
        assert!(sound.set_volume(0.5).await.is_err());
        // Unloading twice is harmless
        sound.unload().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_volume_rejected() {
        let mut sound = LocalSound::new(clip(100), OutputKind::Virtual { paced: false }, 100, 1.0, None);
        assert!(sound.set_volume(f32::NAN).await.is_err());
        assert!(sound.set_pitch(-1.0).await.is_err());
    }
}
