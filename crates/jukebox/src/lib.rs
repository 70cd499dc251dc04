//! Asynchronous playlist playback on top of a synchronous decoder.
//!
//! [`Jukebox`] owns an ordered, cyclic playlist and a single persistent
//! worker thread. Start operations hand the worker a command and return
//! immediately; track progress, failures and stop outcomes come back on the
//! [`PlayerEvent`] channel, and the `playing`/`looping` flags are readable at
//! any time. Decoding and device output live behind the [`StreamPlayer`]
//! trait, implemented by [`mpeg_player::MpegPlayer`].

pub mod backend;
pub mod error;
pub mod events;
pub mod player;
pub mod playlist;

mod worker;

pub use backend::StreamPlayer;
pub use error::PlayerError;
pub use events::{EndReason, PlayerEvent};
pub use player::Jukebox;
pub use playlist::Playlist;
