//! Streaming decode stage.
//!
//! Symphonia probes the container, then a background thread decodes packets
//! into interleaved `f32` samples and feeds a bounded [`PcmQueue`].

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result, anyhow};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, DecoderOptions};
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::pcm::PcmQueue;

/// Source stream parameters reported by the probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamSpec {
    pub rate: u32,
    pub channels: usize,
}

/// Probe `stream` and start a decode thread feeding a bounded queue.
///
/// `path` supplies the container hint and log context; the stream itself is
/// already open. The queue closes when the stream ends, the decoder fails, or
/// the consumer closes it first.
pub fn spawn_decoder(
    stream: File,
    path: &Path,
    buffer_seconds: f32,
) -> Result<(StreamSpec, Arc<PcmQueue>)> {
    let mss = MediaSourceStream::new(Box::new(stream), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &hint_for(path),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .with_context(|| format!("probe {}", path.display()))?;

    let format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| anyhow!("no default audio track"))?;
    let params = track.codec_params.clone();

    let rate = params
        .sample_rate
        .ok_or_else(|| anyhow!("source sample rate unknown"))?;
    let channels = params
        .channels
        .ok_or_else(|| anyhow!("source channel layout unknown"))?
        .count();
    let spec = StreamSpec { rate, channels };

    let queue = Arc::new(PcmQueue::for_duration(channels, rate, buffer_seconds));

    let thread_queue = queue.clone();
    let label = path.display().to_string();
    thread::spawn(move || {
        if let Err(e) = pump_packets(format, params, &thread_queue) {
            tracing::error!(source = %label, "decode thread error: {e:#}");
        }
        thread_queue.close();
    });

    Ok((spec, queue))
}

fn hint_for(path: &Path) -> Hint {
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }
    hint
}

/// Decode packets to the end of the stream, pushing interleaved `f32` frames.
///
/// Malformed packets are skipped. Stops early when the consumer closes the
/// queue.
fn pump_packets(
    mut format: Box<dyn FormatReader>,
    params: CodecParameters,
    queue: &Arc<PcmQueue>,
) -> Result<()> {
    let mut decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .context("instantiate decoder")?;

    loop {
        if queue.is_closed() {
            break;
        }

        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(_) => break, // end of stream
        };

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(_) => continue,
        };
        if decoded.frames() == 0 {
            continue;
        }

        let mut pcm = SampleBuffer::<f32>::new(decoded.frames() as u64, *decoded.spec());
        pcm.copy_interleaved_ref(decoded);
        if !queue.push_blocking(pcm.samples()) {
            break;
        }
    }

    Ok(())
}
