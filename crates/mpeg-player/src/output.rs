//! Device output stage.
//!
//! Builds the cpal output stream. The callback drains the queue without
//! blocking, maps source channels onto the device layout, converts to the
//! device sample type, and fills silence on underrun.

use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use cpal::traits::DeviceTrait;

use crate::pcm::PcmQueue;

/// Build an output stream rendering interleaved frames from `queue`.
///
/// The queue must already carry audio at the stream's sample rate.
pub fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    queue: &Arc<PcmQueue>,
    refill_max_frames: usize,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, queue, refill_max_frames),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, queue, refill_max_frames),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, queue, refill_max_frames),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, queue, refill_max_frames),
        other => Err(anyhow!("unsupported output sample format: {other:?}")),
    }
}

/// Samples pulled from the queue but not yet rendered.
struct Refill {
    samples: Vec<f32>,
    next: usize,
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    queue: &Arc<PcmQueue>,
    refill_max_frames: usize,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let dst_channels = config.channels as usize;
    let src_channels = queue.channels();
    let refill_max = refill_max_frames.max(1);
    let queue = queue.clone();
    let state = Arc::new(Mutex::new(Refill { samples: Vec::new(), next: 0 }));

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            let mut refill = state.lock().unwrap();
            for frame in data.chunks_mut(dst_channels) {
                if refill.next >= refill.samples.len() {
                    refill.next = 0;
                    refill.samples = queue.try_pop(refill_max).unwrap_or_default();
                }
                if refill.samples.is_empty() {
                    // underrun or end of stream
                    frame.fill(<T as cpal::Sample>::from_sample::<f32>(0.0));
                    continue;
                }
                let start = refill.next;
                for (ch, slot) in frame.iter_mut().enumerate() {
                    let value =
                        map_channel(&refill.samples[start..start + src_channels], ch, dst_channels);
                    *slot = <T as cpal::Sample>::from_sample::<f32>(value);
                }
                refill.next += src_channels;
            }
        },
        |err| tracing::warn!("output stream error: {err}"),
        None,
    )?;

    Ok(stream)
}

/// Map one source frame onto output channel `dst_ch`.
///
/// Mono duplicates into every output channel, stereo downmixes to mono by
/// averaging, and any other combination clamps to the nearest source channel.
fn map_channel(frame: &[f32], dst_ch: usize, dst_channels: usize) -> f32 {
    match (frame.len(), dst_channels) {
        (2, 1) => 0.5 * (frame[0] + frame[1]),
        (1, _) => frame[0],
        (n, _) => frame[dst_ch.min(n - 1)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_duplicates_into_every_channel() {
        let frame = [0.7];
        assert_eq!(map_channel(&frame, 0, 2), 0.7);
        assert_eq!(map_channel(&frame, 1, 2), 0.7);
        assert_eq!(map_channel(&frame, 5, 6), 0.7);
    }

    #[test]
    fn stereo_downmix_averages() {
        let frame = [0.2, 0.6];
        let mixed = map_channel(&frame, 0, 1);
        assert!((mixed - 0.4).abs() < 1e-6);
    }

    #[test]
    fn matching_layouts_pass_through() {
        let frame = [0.1, 0.9];
        assert_eq!(map_channel(&frame, 0, 2), 0.1);
        assert_eq!(map_channel(&frame, 1, 2), 0.9);
    }

    #[test]
    fn extra_output_channels_clamp_to_last_source() {
        let frame = [0.1, 0.9];
        assert_eq!(map_channel(&frame, 2, 4), 0.9);
        assert_eq!(map_channel(&frame, 3, 4), 0.9);
    }
}
