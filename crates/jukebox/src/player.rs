//! The playback coordinator.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

use crate::backend::StreamPlayer;
use crate::error::PlayerError;
use crate::events::PlayerEvent;
use crate::playlist::Playlist;
use crate::worker::{Command, Msg, Worker};

/// Shared playback flags.
///
/// Only the worker raises them, so a rejected start command can never leave
/// one set. Both the worker and [`Jukebox::stop`] clear them; clearing twice
/// is harmless.
#[derive(Debug, Default)]
pub(crate) struct PlayerFlags {
    playing: AtomicBool,
    looping: AtomicBool,
}

impl PlayerFlags {
    pub(crate) fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    pub(crate) fn is_looping(&self) -> bool {
        self.looping.load(Ordering::Relaxed)
    }

    pub(crate) fn set_playing(&self, value: bool) {
        self.playing.store(value, Ordering::Relaxed);
    }

    pub(crate) fn set_looping(&self, value: bool) {
        self.looping.store(value, Ordering::Relaxed);
    }
}

/// Asynchronous playlist player.
///
/// Owns an ordered, cyclic playlist and one persistent worker thread. The
/// start operations ([`play_next`](Jukebox::play_next),
/// [`play_all_once`](Jukebox::play_all_once), [`loop_all`](Jukebox::loop_all))
/// hand the worker a command and return immediately; while a program is
/// running, further start calls are no-ops. Progress, failures and stop
/// outcomes are published on the [`events`](Jukebox::events) channel.
///
/// Dropping the player stops playback and joins the worker.
#[derive(Debug)]
pub struct Jukebox {
    playlist: Arc<Mutex<Playlist>>,
    flags: Arc<PlayerFlags>,
    msg_tx: Sender<Msg>,
    events_rx: Receiver<PlayerEvent>,
    active_cancel: Arc<Mutex<Option<Arc<AtomicBool>>>>,
    worker: Option<JoinHandle<()>>,
}

impl Jukebox {
    /// Validate `tracks`, spawn the worker, and return the idle player.
    pub fn new<I, P>(tracks: I, backend: Arc<dyn StreamPlayer>) -> Result<Self, PlayerError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let playlist = Arc::new(Mutex::new(Playlist::new(tracks)?));
        let flags = Arc::new(PlayerFlags::default());
        let active_cancel = Arc::new(Mutex::new(None));
        let (msg_tx, msg_rx) = crossbeam_channel::unbounded();
        let (event_tx, events_rx) = crossbeam_channel::unbounded();

        let worker = Worker::new(
            playlist.clone(),
            backend,
            flags.clone(),
            active_cancel.clone(),
            event_tx,
            msg_tx.clone(),
            msg_rx,
        );
        let join = std::thread::spawn(move || worker.run());

        Ok(Self {
            playlist,
            flags,
            msg_tx,
            events_rx,
            active_cancel,
            worker: Some(join),
        })
    }

    /// Play the current head of the playlist and rotate it to the tail.
    ///
    /// Returns immediately; a no-op while playback is active. If the head
    /// cannot be opened it is still rotated, and the failure is published as
    /// a [`PlayerEvent::TrackEnded`] with an error reason.
    pub fn play_next(&self) {
        self.send_start(Command::PlayNext);
    }

    /// Play every track currently in the playlist exactly once, in order.
    ///
    /// Returns immediately; a no-op while playback is active.
    pub fn play_all_once(&self) {
        self.send_start(Command::PlayAllOnce);
    }

    /// Play full passes over the playlist until [`stop`](Jukebox::stop).
    ///
    /// Returns immediately; a no-op while playback is active.
    pub fn loop_all(&self) {
        self.send_start(Command::LoopAll);
    }

    fn send_start(&self, command: Command) {
        if self.flags.is_playing() {
            tracing::debug!(?command, "start ignored, playback active");
            return;
        }
        let _ = self.msg_tx.send(Msg::Command(command));
    }

    /// Stop playback.
    ///
    /// Clears both flags immediately, cancels the active track, and abandons
    /// whatever remained of the current program. Idempotent, and safe to call
    /// while idle.
    pub fn stop(&self) {
        self.flags.set_looping(false);
        self.flags.set_playing(false);
        if let Some(cancel) = self.active_cancel.lock().unwrap().as_ref() {
            cancel.store(true, Ordering::Relaxed);
        }
        let _ = self.msg_tx.send(Msg::Command(Command::Stop));
    }

    /// Whether a playback program is currently active.
    pub fn is_playing(&self) -> bool {
        self.flags.is_playing()
    }

    /// Whether the player is in loop mode.
    pub fn is_looping(&self) -> bool {
        self.flags.is_looping()
    }

    /// Always fails: the decoder cannot suspend a stream mid-file.
    pub fn pause(&self) -> Result<(), PlayerError> {
        Err(PlayerError::Unsupported { operation: "pause" })
    }

    /// Always fails, see [`Jukebox::pause`].
    pub fn resume(&self) -> Result<(), PlayerError> {
        Err(PlayerError::Unsupported { operation: "resume" })
    }

    /// Snapshot of the playlist in current head-to-tail order.
    pub fn tracks(&self) -> Vec<PathBuf> {
        self.playlist.lock().unwrap().order()
    }

    /// The worker's event feed. Events arrive in the order the worker
    /// produced them.
    pub fn events(&self) -> &Receiver<PlayerEvent> {
        &self.events_rx
    }
}

impl Drop for Jukebox {
    fn drop(&mut self) {
        self.flags.set_looping(false);
        if let Ok(guard) = self.active_cancel.lock() {
            if let Some(cancel) = guard.as_ref() {
                cancel.store(true, Ordering::Relaxed);
            }
        }
        let _ = self.msg_tx.send(Msg::Command(Command::Shutdown));
        if let Some(join) = self.worker.take() {
            let _ = join.join();
        }
    }
}
