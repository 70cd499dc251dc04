//! Error taxonomy for the public playback surface.

use thiserror::Error;

/// Errors returned directly by [`Jukebox`](crate::Jukebox) calls.
///
/// Failures that happen after a start call has returned (unreadable files,
/// decode errors, device trouble) are not in this enum; they arrive as
/// [`EndReason::Error`](crate::EndReason) events instead.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PlayerError {
    /// The playlist had no entries.
    #[error("playlist must contain at least one track")]
    EmptyPlaylist,

    /// A playlist entry was an empty path.
    #[error("playlist entry {index} is an empty path")]
    BlankEntry { index: usize },

    /// The operation is not supported by the underlying decoder.
    #[error("{operation} is not supported: the decoder cannot suspend a stream")]
    Unsupported { operation: &'static str },
}

pub type Result<T> = std::result::Result<T, PlayerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        assert_eq!(
            PlayerError::BlankEntry { index: 3 }.to_string(),
            "playlist entry 3 is an empty path"
        );
        assert!(
            PlayerError::Unsupported { operation: "pause" }
                .to_string()
                .starts_with("pause is not supported")
        );
    }
}
