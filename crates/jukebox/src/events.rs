//! Events published by the playback worker.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Why a track stopped playing.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Natural end of the stream.
    Eof,
    /// Playback was stopped by request.
    Stopped,
    /// The file could not be opened, decoded, or rendered.
    Error { message: String },
}

/// Progress feed for everything the worker does.
///
/// Events are emitted by the worker thread in the order things happened, so a
/// `TrackStarted` always precedes the matching `TrackEnded`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlayerEvent {
    /// A track began decoding.
    TrackStarted { path: PathBuf },
    /// A track finished, failed, or was stopped.
    TrackEnded { path: PathBuf, reason: EndReason },
    /// One full pass over the playlist completed.
    PassCompleted { tracks: usize },
    /// The worker went idle: the program completed or was stopped.
    Idle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_serialize_snake_case() {
        assert_eq!(serde_json::to_string(&EndReason::Eof).unwrap(), "\"eof\"");
        assert_eq!(
            serde_json::to_string(&EndReason::Error { message: "boom".into() }).unwrap(),
            "{\"error\":{\"message\":\"boom\"}}"
        );
    }

    #[test]
    fn events_round_trip() {
        let event = PlayerEvent::TrackEnded {
            path: PathBuf::from("a.mp3"),
            reason: EndReason::Stopped,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(serde_json::from_str::<PlayerEvent>(&json).unwrap(), event);
    }
}
