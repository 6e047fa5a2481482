//! Chime Engine - alarm scheduling and tone playback
//!
//! - [`AlarmScheduler`] keeps at most one pending alarm per task and calls
//!   an [`AlarmHandler`] when one fires.
//! - [`AudioPlayer`] plays synthesized PCM and can stop the current
//!   session from any thread.
//! - [`ToneSequencer`] turns named patterns into one-shot cues and
//!   cancellable loops.
//!
//! ```rust,ignore
//! use chime_engine::{AlarmScheduler, AudioPlayer, EngineConfig, ToneSequencer};
//!
//! let config = EngineConfig::default();
//! let player = AudioPlayer::with_default_output(config.audio.sample_rate);
//! let sequencer = ToneSequencer::new(player, &config.audio);
//!
//! let scheduler = AlarmScheduler::new(&config.alarm, move |_: &AlarmScheduler, alarm| {
//!     println!("Reminder: {}", alarm.task);
//!     sequencer.play_once(TonePattern::Bell);
//! })?;
//! scheduler.schedule_relative(TaskRef::new("Report", today), 30);
//! ```

pub mod config;
pub mod error;
pub mod playback;
pub mod scheduler;
pub mod sequencer;

#[cfg(test)]
mod testing;

pub use config::{AlarmSettings, AudioSettings, EngineConfig};
pub use error::{EngineError, Result};
pub use playback::{AudioOutput, AudioPlayer, LineStopper, OutputLine, RodioOutput};
pub use scheduler::{AlarmHandler, AlarmScheduler, FiredAlarm, PendingAlarm};
pub use sequencer::{CancelSignal, LoopHandle, ToneSequencer};
