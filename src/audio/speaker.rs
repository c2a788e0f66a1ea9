// Speaker output through cpal
//
// Like the microphone, the stream lives on its own thread. Frames are
// pushed into a shared queue that the output callback drains.

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use super::backend::AudioFrame;
use super::convert;
use super::output::AudioOutput;

/// Keep at most this much audio queued ahead of the device
const MAX_QUEUED_MS: u64 = 200;

pub struct SpeakerOutput {
    queue: Arc<Mutex<VecDeque<i16>>>,
    sample_rate: u32,
    channels: u16,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl SpeakerOutput {
    pub async fn open() -> Result<Self> {
        let queue = Arc::new(Mutex::new(VecDeque::new()));
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(u32, u16)>>();
        let callback_queue = Arc::clone(&queue);

        std::thread::spawn(move || {
            let (stream, format) = match build_output_stream(callback_queue) {
                Ok(built) => built,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(format));

            let _ = stop_rx.blocking_recv();
            drop(stream);
            debug!("Speaker stream dropped");
        });

        let (sample_rate, channels) = ready_rx
            .await
            .context("Speaker thread exited before starting")??;

        info!("Speaker output opened ({}Hz, {} channels)", sample_rate, channels);

        Ok(Self {
            queue,
            sample_rate,
            channels,
            stop_tx: Some(stop_tx),
        })
    }

    fn queued_ms(&self) -> u64 {
        let queued = self.queue.lock().len() as u64;
        queued * 1000 / (self.sample_rate as u64 * self.channels as u64).max(1)
    }
}

#[async_trait::async_trait]
impl AudioOutput for SpeakerOutput {
    async fn write(&mut self, frame: &AudioFrame) -> Result<()> {
        let device_frame = convert::conform(frame.clone(), self.sample_rate, self.channels);

        while self.queued_ms() > MAX_QUEUED_MS {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        self.queue.lock().extend(device_frame.samples);
        Ok(())
    }

    async fn drain(&mut self) -> Result<()> {
        while self.queued_ms() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "cpal speaker"
    }
}

impl Drop for SpeakerOutput {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }
}

fn build_output_stream(queue: Arc<Mutex<VecDeque<i16>>>) -> Result<(cpal::Stream, (u32, u16))> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .context("No output device available")?;
    let config: cpal::StreamConfig = device
        .default_output_config()
        .context("Failed to get output config")?
        .into();

    let format = (config.sample_rate.0, config.channels);

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut queue = queue.lock();
                for sample in data.iter_mut() {
                    *sample = queue
                        .pop_front()
                        .map(|s| s as f32 / i16::MAX as f32)
                        .unwrap_or(0.0);
                }
            },
            |err| error!("Audio output stream error: {}", err),
            None,
        )
        .context("Failed to build output stream")?;

    stream.play().context("Failed to start output stream")?;
    Ok((stream, format))
}
