//! Tone sequencing: one-shot cues and cancellable loops
//!
//! Every cue runs on its own short-lived thread so callers never wait on
//! audio. Loops check for cancellation only between tones and between
//! repeats; a tone already being written plays out unless the current
//! session is stopped explicitly, which [`LoopHandle::cancel`] does.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chime_core::TonePattern;
use chime_core::tone::synthesize_with;
use tracing::{debug, warn};

use crate::config::AudioSettings;
use crate::playback::AudioPlayer;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cancellation flag a worker can sleep on
#[derive(Clone, Default)]
pub struct CancelSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let (flag, cond) = &*self.inner;
        *lock(flag) = true;
        cond.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *lock(&self.inner.0)
    }

    /// Sleep up to `timeout`, returning early (with `true`) once cancelled
    pub fn wait(&self, timeout: Duration) -> bool {
        let (flag, cond) = &*self.inner;
        let guard = lock(flag);
        let (guard, _) = cond
            .wait_timeout_while(guard, timeout, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

/// Handle to a running loop
#[must_use = "dropping a LoopHandle leaves the loop running"]
pub struct LoopHandle {
    pattern: TonePattern,
    signal: CancelSignal,
    player: AudioPlayer,
    worker: JoinHandle<()>,
}

impl LoopHandle {
    /// Stop the loop and silence whatever is playing right now
    ///
    /// Safe to call any number of times, including after the loop exited.
    pub fn cancel(&self) {
        if !self.signal.is_cancelled() {
            debug!(pattern = %self.pattern, "cancelling tone loop");
        }
        self.signal.cancel();
        self.player.stop_current();
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.is_cancelled()
    }

    /// Whether the loop's worker has exited
    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Wait for the worker to exit
    pub fn join(self) {
        if self.worker.join().is_err() {
            warn!(pattern = %self.pattern, "tone loop worker panicked");
        }
    }
}

/// Plays named patterns on background threads
#[derive(Clone)]
pub struct ToneSequencer {
    player: AudioPlayer,
    amplitude: f64,
    loop_pause: Duration,
    loops: Arc<Mutex<Vec<CancelSignal>>>,
}

impl ToneSequencer {
    pub fn new(player: AudioPlayer, settings: &AudioSettings) -> Self {
        Self {
            player,
            amplitude: settings.amplitude,
            loop_pause: settings.loop_pause(),
            loops: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn player(&self) -> &AudioPlayer {
        &self.player
    }

    /// Play a pattern once without blocking
    ///
    /// The returned handle may be joined to wait for the cue, or dropped.
    pub fn play_once(&self, pattern: TonePattern) -> JoinHandle<()> {
        let sequencer = self.clone();
        thread::spawn(move || {
            let never = CancelSignal::new();
            if let Err(e) = sequencer.play_pattern(pattern, &never) {
                warn!(%pattern, "failed to play cue: {}", e);
            }
        })
    }

    /// Start repeating a pattern until the returned handle is cancelled
    pub fn start_loop(&self, pattern: TonePattern) -> LoopHandle {
        let signal = CancelSignal::new();
        {
            let mut loops = lock(&self.loops);
            loops.retain(|s| !s.is_cancelled());
            loops.push(signal.clone());
        }

        let sequencer = self.clone();
        let worker_signal = signal.clone();
        let worker = thread::spawn(move || {
            debug!(%pattern, "tone loop started");
            loop {
                if let Err(e) = sequencer.play_pattern(pattern, &worker_signal) {
                    warn!(%pattern, "abandoning tone loop: {}", e);
                    break;
                }
                if worker_signal.wait(sequencer.loop_pause) {
                    break;
                }
            }
            // Mark finished so stop_all's registry can forget it
            worker_signal.cancel();
            debug!(%pattern, "tone loop stopped");
        });

        LoopHandle {
            pattern,
            signal,
            player: self.player.clone(),
            worker,
        }
    }

    /// Cancel every loop started here, then stop the current session
    pub fn stop_all(&self) {
        let loops = std::mem::take(&mut *lock(&self.loops));
        for signal in &loops {
            signal.cancel();
        }
        self.player.stop_current();
    }

    /// Play each step of a pattern in order on the calling thread
    ///
    /// Returns early, without error, once `signal` is cancelled.
    fn play_pattern(&self, pattern: TonePattern, signal: &CancelSignal) -> crate::Result<()> {
        for step in pattern.steps() {
            if signal.is_cancelled() {
                return Ok(());
            }
            let pcm = synthesize_with(step.tone, self.player.sample_rate(), self.amplitude);
            self.player.play(&pcm)?;
            if step.pause_after_ms > 0 && signal.wait(step.pause_after()) {
                return Ok(());
            }
        }
        Ok(())
    }
}
