//! Tone playback with stop-from-anywhere semantics
//!
//! [`AudioPlayer::play`] blocks its calling thread until a buffer has been
//! drained. The session it opens is registered as the player's *current*
//! session for exactly as long as the line is open, so
//! [`AudioPlayer::stop_current`] can silence it from any other thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chime_core::tone::decode_pcm16;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamBuilder, Sink};
use tracing::debug;

use crate::error::{EngineError, Result};

/// Something that can open an output line for 16-bit mono PCM
pub trait AudioOutput: Send + Sync {
    fn open_line(&self, sample_rate: u32) -> Result<Box<dyn OutputLine>>;
}

/// An open output line, owned by the thread that is playing on it
pub trait OutputLine {
    /// Queue PCM bytes. Must not block for the playback duration.
    fn write(&mut self, pcm: &[u8]) -> Result<()>;

    /// Block until everything written has played or the line was stopped
    fn drain(&mut self);

    /// Handle that stops and flushes this line from another thread
    fn stopper(&self) -> Arc<dyn LineStopper>;
}

/// Cross-thread stop handle for an [`OutputLine`]
pub trait LineStopper: Send + Sync {
    fn stop(&self);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Stop flag of one session. Writes happen under this lock, so once a stop
/// has been observed no further bytes reach the line.
#[derive(Default)]
struct SessionState {
    stopped: Mutex<bool>,
}

struct CurrentSession {
    id: u64,
    state: Arc<SessionState>,
    stopper: Arc<dyn LineStopper>,
}

impl CurrentSession {
    fn stop(&self) {
        let mut stopped = lock(&self.state.stopped);
        if !*stopped {
            *stopped = true;
            self.stopper.stop();
        }
    }
}

/// Plays PCM buffers and tracks the single current playback session
///
/// Clones share the same current-session slot; an application creates one
/// player and hands clones to whoever needs to play or stop sound.
#[derive(Clone)]
pub struct AudioPlayer {
    output: Arc<dyn AudioOutput>,
    current: Arc<Mutex<Option<CurrentSession>>>,
    next_id: Arc<AtomicU64>,
    sample_rate: u32,
}

impl AudioPlayer {
    pub fn new(output: Arc<dyn AudioOutput>, sample_rate: u32) -> Self {
        Self {
            output,
            current: Arc::new(Mutex::new(None)),
            next_id: Arc::new(AtomicU64::new(1)),
            sample_rate,
        }
    }

    /// Player on the system's default output device
    pub fn with_default_output(sample_rate: u32) -> Self {
        Self::new(Arc::new(RodioOutput), sample_rate)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Play a PCM buffer, blocking until it has drained or been stopped
    ///
    /// A newer session pre-empts the previous current one. Stopping is not
    /// an error: a stopped session returns `Ok(())` early.
    pub fn play(&self, pcm: &[u8]) -> Result<()> {
        if pcm.is_empty() {
            return Ok(());
        }

        let mut line = self.output.open_line(self.sample_rate)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let state = Arc::new(SessionState::default());

        let previous = lock(&self.current).replace(CurrentSession {
            id,
            state: Arc::clone(&state),
            stopper: line.stopper(),
        });
        if let Some(previous) = previous {
            debug!(session = previous.id, by = id, "playback session pre-empted");
            previous.stop();
        }

        let written = {
            let stopped = lock(&state.stopped);
            if *stopped {
                None
            } else {
                Some(line.write(pcm))
            }
        };

        let result = match written {
            Some(Ok(())) => {
                line.drain();
                Ok(())
            }
            Some(Err(e)) => Err(e),
            None => Ok(()),
        };

        let mut current = lock(&self.current);
        if current.as_ref().is_some_and(|session| session.id == id) {
            *current = None;
        }
        drop(current);
        drop(line);

        result
    }

    /// Stop the current session, if any. Returns whether one was stopped.
    pub fn stop_current(&self) -> bool {
        let session = lock(&self.current).take();
        match session {
            Some(session) => {
                debug!(session = session.id, "stopping current playback session");
                session.stop();
                true
            }
            None => false,
        }
    }

    pub fn is_playing(&self) -> bool {
        lock(&self.current).is_some()
    }
}

/// Output on the default device via rodio
pub struct RodioOutput;

impl AudioOutput for RodioOutput {
    fn open_line(&self, sample_rate: u32) -> Result<Box<dyn OutputLine>> {
        let mut stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| EngineError::audio_device("failed to open default output stream", e))?;
        stream.log_on_drop(false);
        let sink = Arc::new(Sink::connect_new(stream.mixer()));
        Ok(Box::new(RodioLine {
            _stream: stream,
            sink,
            sample_rate,
        }))
    }
}

struct RodioLine {
    // Dropping the stream closes the device; it must outlive the sink.
    _stream: OutputStream,
    sink: Arc<Sink>,
    sample_rate: u32,
}

impl OutputLine for RodioLine {
    fn write(&mut self, pcm: &[u8]) -> Result<()> {
        let samples = decode_pcm16(pcm);
        if samples.is_empty() {
            return Err(EngineError::playback("buffer holds no complete sample"));
        }
        self.sink
            .append(SamplesBuffer::new(1, self.sample_rate, samples));
        Ok(())
    }

    fn drain(&mut self) {
        self.sink.sleep_until_end();
    }

    fn stopper(&self) -> Arc<dyn LineStopper> {
        Arc::new(SinkStopper(Arc::clone(&self.sink)))
    }
}

struct SinkStopper(Arc<Sink>);

impl LineStopper for SinkStopper {
    fn stop(&self) {
        self.0.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingOutput;
    use chime_core::{ToneSpec, synthesize};
    use std::thread;
    use std::time::{Duration, Instant};

    fn player(output: &Arc<RecordingOutput>) -> AudioPlayer {
        AudioPlayer::new(Arc::clone(output) as Arc<dyn AudioOutput>, 44_100)
    }

    fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if check() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        check()
    }

    #[test]
    fn test_play_blocks_until_drained() {
        let output = Arc::new(RecordingOutput::new());
        let player = player(&output);

        let started = Instant::now();
        player.play(&synthesize(ToneSpec::new(440.0, 60))).unwrap();

        assert!(started.elapsed() >= Duration::from_millis(55));
        assert_eq!(output.write_count(), 1);
        assert!(!player.is_playing());
    }

    #[test]
    fn test_empty_buffer_opens_nothing() {
        let output = Arc::new(RecordingOutput::new());
        player(&output).play(&[]).unwrap();
        assert_eq!(output.open_count(), 0);
    }

    #[test]
    fn test_stop_current_truncates_from_other_thread() {
        let output = Arc::new(RecordingOutput::new());
        let player = player(&output);

        let worker = {
            let player = player.clone();
            thread::spawn(move || {
                let started = Instant::now();
                player.play(&synthesize(ToneSpec::new(440.0, 2_000))).unwrap();
                started.elapsed()
            })
        };

        assert!(wait_until(Duration::from_secs(1), || player.is_playing()));
        assert!(player.stop_current());

        let elapsed = worker.join().unwrap();
        assert!(elapsed < Duration::from_millis(1_000), "stopped after {elapsed:?}");
        assert!(!player.is_playing());
    }

    #[test]
    fn test_stop_current_without_session_is_noop() {
        let output = Arc::new(RecordingOutput::new());
        let player = player(&output);
        assert!(!player.stop_current());
        assert!(!player.stop_current());
        assert_eq!(output.open_count(), 0);
    }

    #[test]
    fn test_device_unavailable_is_reported_and_leaves_no_session() {
        let output = Arc::new(RecordingOutput::new());
        output.set_unavailable(true);
        let player = player(&output);

        let err = player.play(&synthesize(ToneSpec::new(440.0, 20))).unwrap_err();
        assert!(err.is_device_error());
        assert!(!player.is_playing());
        assert_eq!(output.write_count(), 0);
    }

    #[test]
    fn test_new_session_preempts_previous() {
        let output = Arc::new(RecordingOutput::new());
        let player = player(&output);

        let long = {
            let player = player.clone();
            thread::spawn(move || {
                let started = Instant::now();
                player.play(&synthesize(ToneSpec::new(440.0, 2_000))).unwrap();
                started.elapsed()
            })
        };
        assert!(wait_until(Duration::from_secs(1), || player.is_playing()));

        player.play(&synthesize(ToneSpec::new(880.0, 30))).unwrap();

        assert!(long.join().unwrap() < Duration::from_millis(1_000));
        assert_eq!(output.write_count(), 2);
        assert!(!player.is_playing());
    }
}
