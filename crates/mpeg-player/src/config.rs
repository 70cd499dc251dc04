/// Tuning knobs for the decode, resample and output stages.
#[derive(Clone, Debug)]
pub struct PlayerConfig {
    /// Output device selector, matched as a case-insensitive substring of the
    /// device name. `None` selects the host default output device.
    pub device: Option<String>,
    /// Resampler input chunk size in frames.
    pub chunk_frames: usize,
    /// Maximum frames pulled from the queue per output callback refill.
    pub refill_max_frames: usize,
    /// Buffered audio per stage queue, in seconds at the queue's sample rate.
    pub buffer_seconds: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            device: None,
            chunk_frames: 1024,
            refill_max_frames: 4096,
            buffer_seconds: 2.0,
        }
    }
}
