//! Ordered, cyclic playlist of track paths.

use std::collections::VecDeque;
use std::path::PathBuf;

use crate::error::PlayerError;

/// Ring of track paths.
///
/// Taking the head re-appends it at the tail, so traversal order is stable
/// and the ring never shrinks. Guaranteed non-empty after construction.
#[derive(Clone, Debug)]
pub struct Playlist {
    tracks: VecDeque<PathBuf>,
}

impl Playlist {
    /// Validate and build a playlist.
    ///
    /// Fails when the list is empty or any entry is an empty path.
    pub fn new<I, P>(tracks: I) -> Result<Self, PlayerError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let tracks: VecDeque<PathBuf> = tracks.into_iter().map(Into::into).collect();
        if tracks.is_empty() {
            return Err(PlayerError::EmptyPlaylist);
        }
        if let Some(index) = tracks.iter().position(|p| p.as_os_str().is_empty()) {
            return Err(PlayerError::BlankEntry { index });
        }
        Ok(Self { tracks })
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Rotate the ring by one step: the head moves to the tail and is
    /// returned for playback.
    pub fn advance(&mut self) -> Option<PathBuf> {
        let head = self.tracks.front().cloned()?;
        self.tracks.rotate_left(1);
        Some(head)
    }

    /// Snapshot of the current head-to-tail order.
    pub fn order(&self) -> Vec<PathBuf> {
        self.tracks.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_list() {
        let err = Playlist::new(Vec::<PathBuf>::new()).unwrap_err();
        assert_eq!(err, PlayerError::EmptyPlaylist);
    }

    #[test]
    fn rejects_blank_entries() {
        let err = Playlist::new(["a.mp3", "", "c.mp3"]).unwrap_err();
        assert_eq!(err, PlayerError::BlankEntry { index: 1 });
    }

    #[test]
    fn advance_rotates_head_to_tail() {
        let mut list = Playlist::new(["a", "b", "c"]).unwrap();
        assert_eq!(list.advance().unwrap(), PathBuf::from("a"));
        assert_eq!(
            list.order(),
            vec![PathBuf::from("b"), PathBuf::from("c"), PathBuf::from("a")]
        );
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn full_rotation_restores_order() {
        let mut list = Playlist::new(["a", "b", "c"]).unwrap();
        let played: Vec<PathBuf> = (0..3).map(|_| list.advance().unwrap()).collect();
        assert_eq!(
            played,
            vec![PathBuf::from("a"), PathBuf::from("b"), PathBuf::from("c")]
        );
        assert_eq!(
            list.order(),
            vec![PathBuf::from("a"), PathBuf::from("b"), PathBuf::from("c")]
        );
    }
}
