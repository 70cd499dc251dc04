//! Blocking single-stream playback sessions.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use cpal::traits::StreamTrait;

use crate::config::PlayerConfig;
use crate::pcm::PcmQueue;
use crate::{decode, device, output, resample};

/// Synchronous playback engine for anything Symphonia can probe.
///
/// One instance can be shared freely; every [`MpegPlayer::play_stream`] call
/// runs its own decode/resample/output pipeline.
#[derive(Clone, Debug, Default)]
pub struct MpegPlayer {
    config: PlayerConfig,
}

impl MpegPlayer {
    pub fn new(config: PlayerConfig) -> Self {
        Self { config }
    }

    /// Decode `stream` and render it to the configured output device.
    ///
    /// Blocks until the audio has fully played or `cancel` is raised. On
    /// cancellation the pipeline is torn down promptly and buffered audio is
    /// dropped. A setup failure after the decoder has started closes the
    /// queues so the decode and resample threads exit before the error
    /// returns.
    pub fn play_stream(&self, stream: File, path: &Path, cancel: &AtomicBool) -> Result<()> {
        let (spec, decoded) = decode::spawn_decoder(stream, path, self.config.buffer_seconds)?;

        let (device, stream_config, sample_format) = match self.pick_output(spec.rate) {
            Ok(picked) => picked,
            Err(e) => {
                // the decode thread stays parked in push_blocking until the
                // queue closes
                decoded.close();
                return Err(e);
            }
        };

        tracing::info!(
            source = %path.display(),
            src_rate_hz = spec.rate,
            out_rate_hz = stream_config.sample_rate,
            channels = spec.channels,
            "starting playback pipeline"
        );

        let rendered = if spec.rate == stream_config.sample_rate {
            decoded.clone()
        } else {
            resample::spawn_resampler(decoded.clone(), spec, stream_config.sample_rate, &self.config)
        };

        let stream = match self.start_output(&device, &stream_config, sample_format, &rendered) {
            Ok(stream) => stream,
            Err(e) => {
                decoded.close();
                rendered.close();
                return Err(e);
            }
        };

        if rendered.wait_drained_or_cancelled(cancel) {
            // let the device drain its last buffer before tearing down
            thread::sleep(Duration::from_millis(100));
        } else {
            decoded.close();
            rendered.close();
            tracing::debug!(source = %path.display(), "playback cancelled");
        }
        drop(stream);

        Ok(())
    }

    fn pick_output(
        &self,
        src_rate: u32,
    ) -> Result<(cpal::Device, cpal::StreamConfig, cpal::SampleFormat)> {
        let host = cpal::default_host();
        let device = device::pick_device(&host, self.config.device.as_deref())?;
        let supported = device::pick_output_config(&device, Some(src_rate))?;
        let mut stream_config = supported.config();
        if let Some(size) = device::pick_buffer_size(&supported) {
            stream_config.buffer_size = size;
        }
        Ok((device, stream_config, supported.sample_format()))
    }

    fn start_output(
        &self,
        device: &cpal::Device,
        stream_config: &cpal::StreamConfig,
        sample_format: cpal::SampleFormat,
        rendered: &Arc<PcmQueue>,
    ) -> Result<cpal::Stream> {
        let stream = output::build_output_stream(
            device,
            stream_config,
            sample_format,
            rendered,
            self.config.refill_max_frames,
        )?;
        stream.play().context("start output stream")?;
        Ok(stream)
    }
}
