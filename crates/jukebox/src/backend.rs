//! Rendering seam between the coordinator and the decoder.

use std::fs::File;
use std::path::Path;
use std::sync::atomic::AtomicBool;

use mpeg_player::MpegPlayer;

/// A synchronous decode-and-render capability.
///
/// `play` blocks until the stream is exhausted or `cancel` is raised, and
/// returns an error when the stream cannot be decoded or rendered. The worker
/// runs every call on a dedicated session thread, so implementations are free
/// to block for the whole duration of the audio.
pub trait StreamPlayer: Send + Sync {
    fn play(&self, stream: File, path: &Path, cancel: &AtomicBool) -> anyhow::Result<()>;
}

impl StreamPlayer for MpegPlayer {
    fn play(&self, stream: File, path: &Path, cancel: &AtomicBool) -> anyhow::Result<()> {
        self.play_stream(stream, path, cancel)
    }
}
