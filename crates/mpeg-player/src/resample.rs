//! Sample-rate conversion stage.
//!
//! Runs Rubato's streaming sinc resampler on its own thread between two
//! bounded queues, converting interleaved `f32` audio from the source rate to
//! the device rate.

use std::sync::Arc;
use std::thread;

use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{
    Async, FixedAsync, Indexing, Resampler, SincInterpolationParameters, SincInterpolationType,
    WindowFunction, calculate_cutoff,
};

use crate::config::PlayerConfig;
use crate::decode::StreamSpec;
use crate::pcm::PcmQueue;

fn sinc_parameters() -> SincInterpolationParameters {
    let window = WindowFunction::Blackman2;
    SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: calculate_cutoff(256, window),
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 1024,
        window,
    }
}

/// Start the resampler thread converting `src` at `spec.rate` into a new
/// queue at `dst_rate`.
///
/// The returned queue closes once the source closes and the tail has been
/// flushed, or on a resampler error.
pub fn spawn_resampler(
    src: Arc<PcmQueue>,
    spec: StreamSpec,
    dst_rate: u32,
    config: &PlayerConfig,
) -> Arc<PcmQueue> {
    let channels = spec.channels;
    let chunk = config.chunk_frames.max(1);
    let ratio = dst_rate as f64 / spec.rate as f64;
    let dst = Arc::new(PcmQueue::for_duration(channels, dst_rate, config.buffer_seconds));

    let thread_dst = dst.clone();
    thread::spawn(move || {
        let mut resampler =
            match Async::<f32>::new_sinc(ratio, 1.1, &sinc_parameters(), chunk, channels, FixedAsync::Input) {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!("resampler init error: {e:#}");
                    thread_dst.close();
                    return;
                }
            };

        // capacity covers one chunk at the conversion ratio with ample slack
        let out_frames = ((chunk as f64 * ratio).ceil() as usize).max(chunk) + chunk;
        let mut out = vec![0.0f32; out_frames * channels];
        let mut indexing = Indexing {
            input_offset: 0,
            output_offset: 0,
            active_channels_mask: None,
            partial_len: None,
        };

        loop {
            // steady blocks first; once the source closes, flush the tail
            let (block, in_frames, partial) = match src.pop_frames(chunk) {
                Some(block) => (block, chunk, false),
                None => match src.pop_ready(chunk) {
                    Some(tail) => {
                        let frames = tail.len() / channels;
                        (tail, frames, true)
                    }
                    None => break,
                },
            };

            let input = match InterleavedSlice::new(&block, channels, in_frames) {
                Ok(adapter) => adapter,
                Err(e) => {
                    tracing::error!("resampler input view error: {e:#}");
                    break;
                }
            };
            let out_frames = out.len() / channels;
            let mut output = match InterleavedSlice::new_mut(&mut out, channels, out_frames) {
                Ok(adapter) => adapter,
                Err(e) => {
                    tracing::error!("resampler output view error: {e:#}");
                    break;
                }
            };

            indexing.partial_len = if partial { Some(in_frames) } else { None };

            let produced = match resampler.process_into_buffer(&input, &mut output, Some(&indexing)) {
                Ok((_, frames_out)) => frames_out * channels,
                Err(e) => {
                    tracing::error!("resample error: {e:#}");
                    break;
                }
            };

            if produced > 0 && !thread_dst.push_blocking(&out[..produced]) {
                break;
            }
        }

        thread_dst.close();
    });

    dst
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_rate_within_tolerance() {
        let spec = StreamSpec { rate: 44_100, channels: 2 };
        let src = Arc::new(PcmQueue::new(2, 200_000));
        let input: Vec<f32> = (0..88_200).map(|i| (i as f32 * 0.001).sin()).collect();
        assert!(src.push_blocking(&input));
        src.close();

        let dst = spawn_resampler(src, spec, 48_000, &PlayerConfig::default());
        let mut samples = 0usize;
        while let Some(chunk) = dst.pop_ready(4096) {
            assert_eq!(chunk.len() % 2, 0);
            samples += chunk.len();
        }

        // 1 s in -> about 1 s out at the new rate, modulo filter delay
        let frames = samples / 2;
        assert!((43_000..=53_000).contains(&frames), "got {frames} frames");
    }

    #[test]
    fn closing_the_output_stops_the_thread() {
        let spec = StreamSpec { rate: 96_000, channels: 1 };
        let src = Arc::new(PcmQueue::new(1, 200_000));
        assert!(src.push_blocking(&vec![0.25f32; 96_000]));

        let dst = spawn_resampler(
            src.clone(),
            spec,
            8_000,
            &PlayerConfig { buffer_seconds: 0.05, ..PlayerConfig::default() },
        );
        dst.pop_frames(64).unwrap();
        dst.close();
        src.close();
        while dst.pop_ready(4096).is_some() {}
    }
}
