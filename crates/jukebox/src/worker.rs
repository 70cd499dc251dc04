//! Persistent playback worker.
//!
//! One thread owns every playback state transition. Public operations arrive
//! as [`Command`]s on the same channel session threads use to report
//! completion, so transitions are fully serialized and the events the worker
//! publishes reflect the order things actually happened.

use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

use crate::backend::StreamPlayer;
use crate::events::{EndReason, PlayerEvent};
use crate::player::PlayerFlags;
use crate::playlist::Playlist;

/// Public operations forwarded to the worker.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Command {
    PlayNext,
    PlayAllOnce,
    LoopAll,
    Stop,
    Shutdown,
}

/// Everything the worker can receive: commands from the coordinator plus
/// completion notices from session threads.
pub(crate) enum Msg {
    Command(Command),
    SessionEnded { id: u64, error: Option<String> },
}

/// What remains of the active playback request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Program {
    Idle,
    /// Play `left` more tracks, then go idle. `announce` controls the
    /// pass-completed event; single-track passes stay silent.
    Pass { left: usize, announce: bool },
    /// Looping pass over the ring: `left` tracks remain in the current
    /// cycle, `started` sessions began in it. Refills while looping holds.
    Cycle { left: usize, started: usize },
}

/// One running playback session.
struct Session {
    id: u64,
    path: PathBuf,
    cancel: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

pub(crate) struct Worker {
    playlist: Arc<Mutex<Playlist>>,
    backend: Arc<dyn StreamPlayer>,
    flags: Arc<PlayerFlags>,
    active_cancel: Arc<Mutex<Option<Arc<AtomicBool>>>>,
    events: Sender<PlayerEvent>,
    msg_tx: Sender<Msg>,
    msg_rx: Receiver<Msg>,
    session: Option<Session>,
    next_session_id: u64,
    program: Program,
}

impl Worker {
    pub(crate) fn new(
        playlist: Arc<Mutex<Playlist>>,
        backend: Arc<dyn StreamPlayer>,
        flags: Arc<PlayerFlags>,
        active_cancel: Arc<Mutex<Option<Arc<AtomicBool>>>>,
        events: Sender<PlayerEvent>,
        msg_tx: Sender<Msg>,
        msg_rx: Receiver<Msg>,
    ) -> Self {
        Self {
            playlist,
            backend,
            flags,
            active_cancel,
            events,
            msg_tx,
            msg_rx,
            session: None,
            next_session_id: 0,
            program: Program::Idle,
        }
    }

    pub(crate) fn run(mut self) {
        while let Ok(msg) = self.msg_rx.recv() {
            match msg {
                Msg::Command(Command::PlayNext) => {
                    self.begin(Program::Pass { left: 1, announce: false }, false);
                }
                Msg::Command(Command::PlayAllOnce) => {
                    let len = self.ring_len();
                    self.begin(Program::Pass { left: len, announce: true }, false);
                }
                Msg::Command(Command::LoopAll) => {
                    let len = self.ring_len();
                    self.begin(Program::Cycle { left: len, started: 0 }, true);
                }
                Msg::Command(Command::Stop) => self.halt(),
                Msg::Command(Command::Shutdown) => {
                    self.halt();
                    break;
                }
                Msg::SessionEnded { id, error } => self.on_session_ended(id, error),
            }
        }
        tracing::debug!("playback worker exiting");
    }

    fn ring_len(&self) -> usize {
        self.playlist.lock().unwrap().len()
    }

    /// Accept a start command unless a program is already running.
    fn begin(&mut self, program: Program, looping: bool) {
        if self.session.is_some() || self.program != Program::Idle {
            tracing::debug!(?program, "start command ignored, player busy");
            return;
        }
        self.flags.set_playing(true);
        if looping {
            self.flags.set_looping(true);
        }
        self.program = program;
        tracing::info!(?program, "playback program started");
        self.advance();
    }

    /// Start sessions until one sticks or the program is exhausted.
    ///
    /// An unopenable file consumes its slot, is reported as a failed track,
    /// and the pass moves on.
    fn advance(&mut self) {
        while self.claim_slot() {
            let next = self.playlist.lock().unwrap().advance();
            let Some(path) = next else {
                self.finish();
                return;
            };
            match self.start_session(path) {
                Ok(()) => {
                    if let Program::Cycle { started, .. } = &mut self.program {
                        *started += 1;
                    }
                    return;
                }
                Err((path, message)) => {
                    tracing::warn!(track = %path.display(), error = %message, "track skipped");
                    let _ = self.events.send(PlayerEvent::TrackEnded {
                        path,
                        reason: EndReason::Error { message },
                    });
                }
            }
        }
    }

    /// Consume one slot of the program, or report it exhausted.
    ///
    /// Emits the pass-completed event at cycle and pass boundaries. A cycle
    /// in which not a single track started is abandoned instead of refilled,
    /// so a fully unplayable playlist cannot spin.
    fn claim_slot(&mut self) -> bool {
        match self.program {
            Program::Idle => false,
            Program::Pass { left: 0, announce } => {
                if announce {
                    let tracks = self.ring_len();
                    let _ = self.events.send(PlayerEvent::PassCompleted { tracks });
                }
                self.finish();
                false
            }
            Program::Pass { left, announce } => {
                self.program = Program::Pass { left: left - 1, announce };
                true
            }
            Program::Cycle { left: 0, started } => {
                let tracks = self.ring_len();
                let _ = self.events.send(PlayerEvent::PassCompleted { tracks });
                if started == 0 {
                    tracing::warn!("no track in the playlist could start, leaving loop mode");
                    self.finish();
                    return false;
                }
                if !self.flags.is_looping() {
                    self.finish();
                    return false;
                }
                self.program = Program::Cycle { left: tracks - 1, started: 0 };
                true
            }
            Program::Cycle { left, started } => {
                self.program = Program::Cycle { left: left - 1, started };
                true
            }
        }
    }

    /// Open the file and run the backend on a dedicated session thread.
    ///
    /// The thread reports back over the worker channel; it never touches
    /// worker state directly.
    fn start_session(&mut self, path: PathBuf) -> Result<(), (PathBuf, String)> {
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) => {
                let message = format!("open {}: {e}", path.display());
                return Err((path, message));
            }
        };

        let cancel = Arc::new(AtomicBool::new(false));
        let id = self.next_session_id;
        self.next_session_id += 1;

        let backend = self.backend.clone();
        let notify = self.msg_tx.clone();
        let session_path = path.clone();
        let session_cancel = cancel.clone();
        let join = std::thread::spawn(move || {
            let result = backend.play(file, &session_path, &session_cancel);
            if let Err(e) = &result {
                tracing::warn!(track = %session_path.display(), "playback error: {e:#}");
            }
            let error = result.err().map(|e| format!("{e:#}"));
            let _ = notify.send(Msg::SessionEnded { id, error });
        });

        self.set_active_cancel(Some(cancel.clone()));
        tracing::info!(track = %path.display(), session = id, "track started");
        let _ = self.events.send(PlayerEvent::TrackStarted { path: path.clone() });
        self.session = Some(Session { id, path, cancel, join });
        Ok(())
    }

    /// Handle a completion notice from a session thread.
    ///
    /// Notices for anything but the active session are stale (the session was
    /// already torn down by a stop) and are dropped.
    fn on_session_ended(&mut self, id: u64, error: Option<String>) {
        let session = match self.session.take() {
            Some(s) if s.id == id => s,
            other => {
                self.session = other;
                tracing::debug!(session = id, "stale session notice ignored");
                return;
            }
        };
        let _ = session.join.join();
        self.set_active_cancel(None);

        // a cancelled session may surface a teardown error; the stop wins
        let reason = if session.cancel.load(Ordering::Relaxed) {
            EndReason::Stopped
        } else if let Some(message) = error {
            EndReason::Error { message }
        } else {
            EndReason::Eof
        };
        let stopped = reason == EndReason::Stopped;
        tracing::info!(track = %session.path.display(), ?reason, "session ended");
        let _ = self.events.send(PlayerEvent::TrackEnded { path: session.path, reason });

        if stopped {
            self.halt();
        } else {
            self.advance();
        }
    }

    /// Tear down the active session, if any, and go idle.
    fn halt(&mut self) {
        let was_active = self.session.is_some() || self.program != Program::Idle;
        self.flags.set_looping(false);
        if let Some(session) = self.session.take() {
            session.cancel.store(true, Ordering::Relaxed);
            let _ = session.join.join();
            self.set_active_cancel(None);
            tracing::info!(track = %session.path.display(), "session cancelled");
            let _ = self.events.send(PlayerEvent::TrackEnded {
                path: session.path,
                reason: EndReason::Stopped,
            });
        }
        self.program = Program::Idle;
        self.flags.set_playing(false);
        if was_active {
            let _ = self.events.send(PlayerEvent::Idle);
        }
    }

    /// Wrap up a completed program.
    fn finish(&mut self) {
        self.program = Program::Idle;
        self.flags.set_playing(false);
        self.flags.set_looping(false);
        tracing::info!("playback program finished");
        let _ = self.events.send(PlayerEvent::Idle);
    }

    fn set_active_cancel(&self, cancel: Option<Arc<AtomicBool>>) {
        *self.active_cancel.lock().unwrap() = cancel;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    struct NoopBackend;

    impl StreamPlayer for NoopBackend {
        fn play(&self, _stream: File, _path: &Path, _cancel: &AtomicBool) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn worker_with(tracks: &[&str]) -> Worker {
        let playlist = Arc::new(Mutex::new(Playlist::new(tracks.to_vec()).unwrap()));
        let (msg_tx, msg_rx) = crossbeam_channel::unbounded();
        let (event_tx, _) = crossbeam_channel::unbounded();
        Worker::new(
            playlist,
            Arc::new(NoopBackend),
            Arc::new(PlayerFlags::default()),
            Arc::new(Mutex::new(None)),
            event_tx,
            msg_tx,
            msg_rx,
        )
    }

    #[test]
    fn pass_slots_count_down_then_finish() {
        let mut worker = worker_with(&["a", "b"]);
        worker.flags.set_playing(true);
        worker.program = Program::Pass { left: 2, announce: false };

        assert!(worker.claim_slot());
        assert!(worker.claim_slot());
        assert!(!worker.claim_slot());
        assert_eq!(worker.program, Program::Idle);
        assert!(!worker.flags.is_playing());
    }

    #[test]
    fn cycle_refills_from_the_ring_while_looping() {
        let mut worker = worker_with(&["a", "b", "c"]);
        worker.flags.set_playing(true);
        worker.flags.set_looping(true);
        worker.program = Program::Cycle { left: 0, started: 2 };

        assert!(worker.claim_slot());
        assert_eq!(worker.program, Program::Cycle { left: 2, started: 0 });
    }

    #[test]
    fn cycle_without_a_single_start_abandons_the_loop() {
        let mut worker = worker_with(&["a", "b"]);
        worker.flags.set_playing(true);
        worker.flags.set_looping(true);
        worker.program = Program::Cycle { left: 0, started: 0 };

        assert!(!worker.claim_slot());
        assert_eq!(worker.program, Program::Idle);
        assert!(!worker.flags.is_looping());
        assert!(!worker.flags.is_playing());
    }

    #[test]
    fn cleared_loop_flag_ends_the_cycle_at_the_boundary() {
        let mut worker = worker_with(&["a", "b"]);
        worker.flags.set_playing(true);
        worker.program = Program::Cycle { left: 0, started: 1 };

        assert!(!worker.claim_slot());
        assert_eq!(worker.program, Program::Idle);
        assert!(!worker.flags.is_playing());
    }
}
