// Tests for the capture backends and clip writing
//
// A generated WAV replayed through the file backend stands in for
// microphone input.

use anyhow::Result;
use std::path::Path;
use tempfile::TempDir;
use voice_memo::audio::convert;
use voice_memo::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource, ClipWriter, Pacing,
};

fn write_ramp(path: &Path, sample_rate: u32, channels: u16, frames: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for i in 0..frames {
        for _ in 0..channels {
            writer.write_sample((i % 1000) as i16)?;
        }
    }
    writer.finalize()?;
    Ok(())
}

#[test]
fn test_audio_frame_duration() {
    let frame = AudioFrame {
        samples: vec![0i16; 3200],
        sample_rate: 16000,
        channels: 2,
        timestamp_ms: 0,
    };

    // 1600 stereo frames at 16kHz
    assert_eq!(frame.duration_ms(), 100);
}

#[test]
fn test_audio_backend_config_default() {
    let config = AudioBackendConfig::default();

    assert_eq!(config.buffer_duration_ms, 100, "Default buffer should be 100ms");
    assert_eq!(config.pacing, Pacing::Realtime);
}

#[test]
fn test_factory_rejects_missing_input_file() {
    let source = AudioSource::File("/nonexistent/input.wav".into());
    assert!(AudioBackendFactory::create(&source, AudioBackendConfig::default()).is_err());
}

#[cfg(not(feature = "cpal"))]
#[test]
fn test_microphone_requires_cpal_feature() {
    assert!(AudioBackendFactory::create(&AudioSource::Microphone, AudioBackendConfig::default()).is_err());
}

#[tokio::test]
async fn test_file_backend_delivers_whole_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let input = temp_dir.path().join("ramp.wav");
    write_ramp(&input, 16000, 1, 4000)?;

    let config = AudioBackendConfig {
        buffer_duration_ms: 100,
        pacing: Pacing::Immediate,
    };
    let mut backend = AudioBackendFactory::create(&AudioSource::File(input), config)?;
    let mut rx = backend.start().await?;
    assert!(backend.is_capturing());
    assert!(backend.start().await.is_err(), "Second start should be rejected");

    backend.stop().await?;
    assert!(!backend.is_capturing());

    let mut frames = Vec::new();
    while let Some(frame) = rx.recv().await {
        frames.push(frame);
    }

    assert_eq!(frames.len(), 3);
    assert_eq!(frames.iter().map(|f| f.samples.len()).sum::<usize>(), 4000);
    assert_eq!(frames[2].timestamp_ms, 200);
    Ok(())
}

#[tokio::test]
async fn test_conformed_frames_write_preset_clip() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let clip_path = temp_dir.path().join("clips").join("take.wav");

    let mut writer = ClipWriter::create(clip_path.clone(), 44100, 2)?;
    for i in 0..5 {
        let frame = AudioFrame {
            samples: vec![500i16; 1600],
            sample_rate: 16000,
            channels: 1,
            timestamp_ms: i * 100,
        };
        writer.write_frame(&convert::conform(frame, 44100, 2))?;
    }

    let metadata = writer.finish()?;
    assert_eq!(metadata.sample_rate, 44100);
    assert_eq!(metadata.channels, 2);
    assert!((metadata.duration_ms() as i64 - 500).abs() <= 10);

    let reader = hound::WavReader::open(&clip_path)?;
    assert_eq!(reader.spec().channels, 2);
    assert_eq!(reader.len() as usize, metadata.sample_count);
    Ok(())
}

#[test]
fn test_clip_writer_rejects_mismatched_frames() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut writer = ClipWriter::create(temp_dir.path().join("take.wav"), 22050, 1)?;

    let frame = AudioFrame {
        samples: vec![0i16; 320],
        sample_rate: 16000,
        channels: 1,
        timestamp_ms: 0,
    };
    assert!(writer.write_frame(&frame).is_err());
    assert_eq!(writer.sample_count(), 0);
    Ok(())
}
