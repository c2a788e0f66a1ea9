//! Frame format conversion
//!
//! Captured frames arrive in whatever format the device or file provides.
//! Clips are written in the recording preset's format, so every frame is
//! conformed to the preset's sample rate and channel count first.

use super::backend::AudioFrame;

/// Convert a frame to the target sample rate and channel count
pub fn conform(frame: AudioFrame, target_sample_rate: u32, target_channels: u16) -> AudioFrame {
    let mut processed = frame;

    if processed.channels != target_channels {
        processed = remix(processed, target_channels);
    }

    if processed.sample_rate != target_sample_rate {
        processed = resample(processed, target_sample_rate);
    }

    processed
}

/// Nearest-neighbour resampling: decimates when downsampling, repeats when upsampling
fn resample(frame: AudioFrame, target_rate: u32) -> AudioFrame {
    if frame.sample_rate == target_rate || frame.sample_rate == 0 || frame.channels == 0 {
        return frame;
    }

    let channels = frame.channels as usize;
    let in_frames = frame.samples.len() / channels;
    let out_frames = (in_frames as u64 * target_rate as u64 / frame.sample_rate as u64) as usize;

    let mut samples = Vec::with_capacity(out_frames * channels);
    for i in 0..out_frames {
        let src = (i as u64 * frame.sample_rate as u64 / target_rate as u64) as usize;
        let src = src.min(in_frames.saturating_sub(1));
        samples.extend_from_slice(&frame.samples[src * channels..(src + 1) * channels]);
    }

    AudioFrame {
        samples,
        sample_rate: target_rate,
        channels: frame.channels,
        timestamp_ms: frame.timestamp_ms,
    }
}

/// Mix down to mono (average) or fan mono out to every target channel
fn remix(frame: AudioFrame, target_channels: u16) -> AudioFrame {
    if frame.channels == target_channels || frame.channels == 0 || target_channels == 0 {
        return frame;
    }

    let mono: Vec<i16> = if frame.channels == 1 {
        frame.samples
    } else {
        frame
            .samples
            .chunks_exact(frame.channels as usize)
            .map(|chunk| {
                let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
                (sum / chunk.len() as i32) as i16
            })
            .collect()
    };

    let samples = if target_channels == 1 {
        mono
    } else {
        mono.iter()
            .flat_map(|&s| std::iter::repeat(s).take(target_channels as usize))
            .collect()
    };

    AudioFrame {
        samples,
        sample_rate: frame.sample_rate,
        channels: target_channels,
        timestamp_ms: frame.timestamp_ms,
    }
}

/// Scale samples by a linear volume in [0, 1]
pub fn apply_volume(samples: &mut [i16], volume: f32) {
    let volume = volume.clamp(0.0, 1.0);
    if volume >= 1.0 {
        return;
    }
    for sample in samples.iter_mut() {
        *sample = (*sample as f32 * volume).round() as i16;
    }
}
