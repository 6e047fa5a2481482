//! In-memory audio output for tests
//!
//! Records every write with a timestamp and drains in simulated real time,
//! waking early when the line is stopped.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use chime_core::tone::pcm_duration;

use crate::error::{EngineError, Result};
use crate::playback::{AudioOutput, LineStopper, OutputLine};

#[derive(Debug, Clone, Copy)]
pub struct RecordedWrite {
    pub at: Instant,
    pub bytes: usize,
}

#[derive(Default)]
pub struct RecordingOutput {
    writes: Arc<Mutex<Vec<RecordedWrite>>>,
    opens: AtomicUsize,
    unavailable: AtomicBool,
}

impl RecordingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.lock().unwrap().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl AudioOutput for RecordingOutput {
    fn open_line(&self, sample_rate: u32) -> Result<Box<dyn OutputLine>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(EngineError::audio_device(
                "no output device",
                io::Error::new(io::ErrorKind::NotFound, "test device unplugged"),
            ));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingLine {
            writes: Arc::clone(&self.writes),
            sample_rate,
            queued: Duration::ZERO,
            stop: Arc::new(StopFlag::default()),
        }))
    }
}

struct RecordingLine {
    writes: Arc<Mutex<Vec<RecordedWrite>>>,
    sample_rate: u32,
    queued: Duration,
    stop: Arc<StopFlag>,
}

impl OutputLine for RecordingLine {
    fn write(&mut self, pcm: &[u8]) -> Result<()> {
        self.writes.lock().unwrap().push(RecordedWrite {
            at: Instant::now(),
            bytes: pcm.len(),
        });
        self.queued += pcm_duration(pcm, self.sample_rate);
        Ok(())
    }

    fn drain(&mut self) {
        let stopped = self.stop.stopped.lock().unwrap();
        drop(
            self.stop
                .cond
                .wait_timeout_while(stopped, self.queued, |stopped| !*stopped)
                .unwrap(),
        );
        self.queued = Duration::ZERO;
    }

    fn stopper(&self) -> Arc<dyn LineStopper> {
        Arc::clone(&self.stop) as Arc<dyn LineStopper>
    }
}

#[derive(Default)]
struct StopFlag {
    stopped: Mutex<bool>,
    cond: Condvar,
}

impl LineStopper for StopFlag {
    fn stop(&self) {
        *self.stopped.lock().unwrap() = true;
        self.cond.notify_all();
    }
}
