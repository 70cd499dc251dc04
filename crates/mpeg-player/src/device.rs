//! Output device and stream configuration selection.

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait};

/// Pick the output device whose name contains `needle` (case-insensitive),
/// or the host default when no selector is given.
pub fn pick_device(host: &cpal::Host, needle: Option<&str>) -> Result<cpal::Device> {
    let Some(needle) = needle else {
        return host
            .default_output_device()
            .ok_or_else(|| anyhow!("no default output device"));
    };

    let devices = host.output_devices().context("enumerate output devices")?;
    for device in devices {
        let matched = device
            .description()
            .ok()
            .is_some_and(|d| name_matches(&d.name(), needle));
        if matched {
            return Ok(device);
        }
    }
    Err(anyhow!("no output device matching '{needle}'"))
}

fn name_matches(name: &str, needle: &str) -> bool {
    let needle = needle.trim();
    if needle.is_empty() {
        return false;
    }
    name.to_lowercase().contains(&needle.to_lowercase())
}

/// How desirable one supported config is; see [`Candidate::beats`].
struct Candidate {
    below_target: bool,
    rate: u32,
    format_rank: u8,
}

impl Candidate {
    /// Rates at or below the target win, then higher rates, then friendlier
    /// sample formats.
    fn beats(&self, other: &Candidate) -> bool {
        if self.below_target != other.below_target {
            return self.below_target;
        }
        if self.rate != other.rate {
            return self.rate > other.rate;
        }
        self.format_rank < other.format_rank
    }
}

/// Choose the supported output config closest to `target_rate`.
pub fn pick_output_config(
    device: &cpal::Device,
    target_rate: Option<u32>,
) -> Result<cpal::SupportedStreamConfig> {
    let ranges = device
        .supported_output_configs()
        .context("query supported output configs")?;

    let mut best: Option<(Candidate, cpal::SupportedStreamConfig)> = None;
    for range in ranges {
        let rate = clamp_rate(range.min_sample_rate(), range.max_sample_rate(), target_rate);
        let candidate = Candidate {
            below_target: target_rate.is_none_or(|t| rate <= t),
            rate,
            format_rank: format_rank(range.sample_format()),
        };
        let config = range.with_sample_rate(rate);
        match &best {
            Some((current, _)) if !candidate.beats(current) => {}
            _ => best = Some((candidate, config)),
        }
    }

    best.map(|(_, config)| config)
        .ok_or_else(|| anyhow!("device reports no supported output configs"))
}

fn clamp_rate(min: u32, max: u32, target: Option<u32>) -> u32 {
    match target {
        Some(t) => t.clamp(min, max),
        None => max,
    }
}

fn format_rank(format: cpal::SampleFormat) -> u8 {
    match format {
        cpal::SampleFormat::F32 => 0,
        cpal::SampleFormat::I32 => 1,
        cpal::SampleFormat::I16 => 2,
        cpal::SampleFormat::U16 => 3,
        _ => 10,
    }
}

/// Prefer a large fixed buffer when the device advertises a range, capped at
/// 16k frames.
pub fn pick_buffer_size(config: &cpal::SupportedStreamConfig) -> Option<cpal::BufferSize> {
    const CAP_FRAMES: u32 = 16_384;
    match config.buffer_size() {
        cpal::SupportedBufferSize::Range { min, max } => {
            let frames = (*max).min(CAP_FRAMES).max(*min);
            Some(cpal::BufferSize::Fixed(frames))
        }
        cpal::SupportedBufferSize::Unknown => None,
    }
}
