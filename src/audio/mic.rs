// Microphone capture through cpal
//
// cpal streams are not Send, so each capture owns a dedicated thread that
// builds the stream, keeps it alive, and drops it when told to stop.

use anyhow::{bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};

pub struct MicrophoneBackend {
    config: AudioBackendConfig,
    stop_tx: Option<oneshot::Sender<()>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl MicrophoneBackend {
    pub fn new(config: AudioBackendConfig) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .context("No input device available")?;

        info!(
            "Microphone backend initialized: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        Ok(Self {
            config,
            stop_tx: None,
            thread: None,
        })
    }
}

#[async_trait::async_trait]
impl AudioBackend for MicrophoneBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.thread.is_some() {
            bail!("Already capturing");
        }

        let (frame_tx, frame_rx) = mpsc::channel(100);
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<()>>();
        let buffer_duration_ms = self.config.buffer_duration_ms;

        let thread = std::thread::spawn(move || {
            let stream = match build_input_stream(frame_tx, buffer_duration_ms) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));

            // Keep the stream alive until stop() or the backend is dropped
            let _ = stop_rx.blocking_recv();
            drop(stream);
            debug!("Microphone stream dropped");
        });

        ready_rx
            .await
            .context("Microphone thread exited before starting")??;

        self.stop_tx = Some(stop_tx);
        self.thread = Some(thread);
        info!("Microphone capture started");

        Ok(frame_rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            tokio::task::spawn_blocking(move || thread.join())
                .await
                .context("Failed to join microphone thread")?
                .map_err(|_| anyhow::anyhow!("Microphone thread panicked"))?;
            info!("Microphone capture stopped");
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.thread.is_some()
    }

    fn name(&self) -> &str {
        "cpal microphone"
    }
}

fn build_input_stream(
    frame_tx: mpsc::Sender<AudioFrame>,
    buffer_duration_ms: u64,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .context("No input device available")?;
    let config: cpal::StreamConfig = device
        .default_input_config()
        .context("Failed to get input config")?
        .into();

    let sample_rate = config.sample_rate.0;
    let channels = config.channels;
    let samples_per_frame =
        ((sample_rate as u64 * buffer_duration_ms / 1000).max(1) * channels as u64) as usize;
    let started = Instant::now();
    let mut pending: Vec<i16> = Vec::with_capacity(samples_per_frame);

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                pending.extend(
                    data.iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16),
                );

                while pending.len() >= samples_per_frame {
                    let samples: Vec<i16> = pending.drain(..samples_per_frame).collect();
                    let frame = AudioFrame {
                        samples,
                        sample_rate,
                        channels,
                        timestamp_ms: started.elapsed().as_millis() as u64,
                    };
                    if let Err(e) = frame_tx.try_send(frame) {
                        debug!("Dropping microphone frame: {}", e);
                    }
                }
            },
            |err| error!("Audio input stream error: {}", err),
            None,
        )
        .context("Failed to build input stream")?;

    stream.play().context("Failed to start input stream")?;
    Ok(stream)
}

impl Drop for MicrophoneBackend {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }
}
