//! Bounded queue of interleaved `f32` PCM shared between pipeline stages.
//!
//! Producers block while the queue is full; consumers block while it is
//! empty. Closing the queue wakes everyone: producers stop accepting samples
//! and consumers drain whatever is left. Every pop hands out whole frames so
//! channel interleaving survives arbitrary chunk sizes.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

struct State {
    samples: VecDeque<f32>,
    closed: bool,
}

pub struct PcmQueue {
    state: Mutex<State>,
    cv: Condvar,
    channels: usize,
    capacity_samples: usize,
}

impl PcmQueue {
    /// Queue holding at most `capacity_samples` interleaved samples.
    ///
    /// The capacity is raised to at least one frame so a push can always make
    /// progress.
    pub fn new(channels: usize, capacity_samples: usize) -> Self {
        let channels = channels.max(1);
        Self {
            state: Mutex::new(State {
                samples: VecDeque::new(),
                closed: false,
            }),
            cv: Condvar::new(),
            channels,
            capacity_samples: capacity_samples.max(channels),
        }
    }

    /// Queue sized to hold `seconds` of audio at `rate_hz`.
    ///
    /// Non-finite or non-positive durations fall back to two seconds.
    pub fn for_duration(channels: usize, rate_hz: u32, seconds: f32) -> Self {
        let seconds = if seconds.is_finite() && seconds > 0.0 {
            seconds
        } else {
            2.0
        };
        let frames = (rate_hz as f32 * seconds).ceil() as usize;
        Self::new(channels, frames.saturating_mul(channels.max(1)))
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn capacity_frames(&self) -> usize {
        self.capacity_samples / self.channels
    }

    pub fn len_frames(&self) -> usize {
        self.state.lock().unwrap().samples.len() / self.channels
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    /// Append `samples`, blocking while the queue is full.
    ///
    /// Returns `false` if the queue was closed before everything was
    /// accepted; the remainder is dropped.
    pub fn push_blocking(&self, mut samples: &[f32]) -> bool {
        while !samples.is_empty() {
            let mut state = self.state.lock().unwrap();
            while state.samples.len() >= self.capacity_samples && !state.closed {
                state = self.cv.wait(state).unwrap();
            }
            if state.closed {
                return false;
            }
            let room = self.capacity_samples - state.samples.len();
            let n = room.min(samples.len());
            state.samples.extend(samples[..n].iter().copied());
            samples = &samples[n..];
            drop(state);
            self.cv.notify_all();
        }
        true
    }

    /// Pop exactly `frames` frames, blocking until they are available.
    ///
    /// Returns `None` once the queue is closed and cannot supply a full
    /// block; the tail is left for [`PcmQueue::pop_ready`].
    pub fn pop_frames(&self, frames: usize) -> Option<Vec<f32>> {
        let want = frames * self.channels;
        let mut state = self.state.lock().unwrap();
        while state.samples.len() < want && !state.closed {
            state = self.cv.wait(state).unwrap();
        }
        if state.samples.len() < want {
            return None;
        }
        let out: Vec<f32> = state.samples.drain(..want).collect();
        drop(state);
        self.cv.notify_all();
        Some(out)
    }

    /// Pop up to `max_frames` frames, blocking until at least one frame is
    /// available. Returns `None` once the queue is closed and empty.
    pub fn pop_ready(&self, max_frames: usize) -> Option<Vec<f32>> {
        let mut state = self.state.lock().unwrap();
        while state.samples.is_empty() && !state.closed {
            state = self.cv.wait(state).unwrap();
        }
        let take = (state.samples.len() / self.channels).min(max_frames) * self.channels;
        if take == 0 {
            return None;
        }
        let out: Vec<f32> = state.samples.drain(..take).collect();
        drop(state);
        self.cv.notify_all();
        Some(out)
    }

    /// Pop up to `max_frames` frames without blocking.
    ///
    /// Returns `None` when not even one whole frame is buffered. Safe to call
    /// from the audio callback.
    pub fn try_pop(&self, max_frames: usize) -> Option<Vec<f32>> {
        let mut state = self.state.lock().unwrap();
        let take = (state.samples.len() / self.channels).min(max_frames) * self.channels;
        if take == 0 {
            return None;
        }
        let out: Vec<f32> = state.samples.drain(..take).collect();
        drop(state);
        self.cv.notify_all();
        Some(out)
    }

    /// Mark the queue closed and wake all waiters. Idempotent.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        drop(state);
        self.cv.notify_all();
    }

    /// Block until the queue is closed and fully drained, or `cancel` is
    /// raised. Returns `true` when drained, `false` on cancellation.
    ///
    /// `cancel` has no waker, so this polls on a short timeout.
    pub fn wait_drained_or_cancelled(&self, cancel: &AtomicBool) -> bool {
        let mut state = self.state.lock().unwrap();
        loop {
            if cancel.load(Ordering::Relaxed) {
                return false;
            }
            if state.closed && state.samples.is_empty() {
                return true;
            }
            let (next, _) = self
                .cv
                .wait_timeout(state, Duration::from_millis(50))
                .unwrap();
            state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn for_duration_sizes_by_rate_and_channels() {
        let q = PcmQueue::for_duration(2, 48_000, 0.5);
        assert_eq!(q.capacity_frames(), 24_000);
        assert_eq!(q.channels(), 2);
    }

    #[test]
    fn for_duration_rejects_bad_seconds() {
        let nan = PcmQueue::for_duration(1, 1_000, f32::NAN);
        assert_eq!(nan.capacity_frames(), 2_000);
        let negative = PcmQueue::for_duration(1, 1_000, -3.0);
        assert_eq!(negative.capacity_frames(), 2_000);
    }

    #[test]
    fn try_pop_empty_returns_none() {
        let q = PcmQueue::new(2, 64);
        assert!(q.try_pop(8).is_none());
    }

    #[test]
    fn try_pop_hands_out_whole_frames() {
        let q = PcmQueue::new(2, 64);
        assert!(q.push_blocking(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
        let out = q.try_pop(2).unwrap();
        assert_eq!(out, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(q.len_frames(), 1);
    }

    #[test]
    fn pop_frames_waits_for_a_full_block() {
        let q = Arc::new(PcmQueue::new(1, 64));
        let gate = Arc::new(Barrier::new(2));

        let producer = {
            let q = q.clone();
            let gate = gate.clone();
            thread::spawn(move || {
                gate.wait();
                assert!(q.push_blocking(&[1.0, 2.0]));
                assert!(q.push_blocking(&[3.0, 4.0]));
            })
        };

        gate.wait();
        let out = q.pop_frames(4).unwrap();
        assert_eq!(out, vec![1.0, 2.0, 3.0, 4.0]);
        producer.join().unwrap();
    }

    #[test]
    fn pop_frames_returns_none_on_short_close() {
        let q = Arc::new(PcmQueue::new(1, 64));
        assert!(q.push_blocking(&[1.0, 2.0]));
        q.close();
        assert!(q.pop_frames(4).is_none());
        // the tail is still there for pop_ready
        assert_eq!(q.pop_ready(4).unwrap(), vec![1.0, 2.0]);
        assert!(q.pop_ready(4).is_none());
    }

    #[test]
    fn push_blocking_stops_at_close() {
        let q = Arc::new(PcmQueue::new(1, 2));
        let gate = Arc::new(Barrier::new(2));

        let producer = {
            let q = q.clone();
            let gate = gate.clone();
            thread::spawn(move || {
                gate.wait();
                // capacity 2, so this parks until the queue is closed
                q.push_blocking(&[1.0, 2.0, 3.0, 4.0])
            })
        };

        gate.wait();
        while q.len_frames() < 2 {
            thread::yield_now();
        }
        q.close();
        assert!(!producer.join().unwrap());
    }

    #[test]
    fn bounded_producer_completes_once_consumed() {
        let q = Arc::new(PcmQueue::new(1, 4));

        let producer = {
            let q = q.clone();
            thread::spawn(move || {
                let data: Vec<f32> = (0..32).map(|i| i as f32).collect();
                assert!(q.push_blocking(&data));
                q.close();
            })
        };

        let mut got = Vec::new();
        while let Some(chunk) = q.pop_ready(4) {
            got.extend(chunk);
        }
        assert_eq!(got, (0..32).map(|i| i as f32).collect::<Vec<_>>());
        producer.join().unwrap();
    }

    #[test]
    fn wait_drained_reports_drain() {
        let q = Arc::new(PcmQueue::new(1, 8));
        assert!(q.push_blocking(&[1.0]));

        let waiter = {
            let q = q.clone();
            thread::spawn(move || q.wait_drained_or_cancelled(&AtomicBool::new(false)))
        };

        assert_eq!(q.pop_ready(8).unwrap(), vec![1.0]);
        q.close();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn wait_drained_reports_cancellation() {
        let q = PcmQueue::new(1, 8);
        let cancel = AtomicBool::new(true);
        assert!(!q.wait_drained_or_cancelled(&cancel));
    }
}
