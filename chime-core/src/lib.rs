//! Chime Core - Pure domain logic for task reminders
//!
//! This crate contains no I/O operations. Scheduling, audio output
//! and presentation are handled by the engine and the CLI.

pub mod date;
pub mod error;
pub mod pattern;
pub mod task;
pub mod tone;

pub use error::{CoreError, Result};
pub use pattern::{TonePattern, ToneStep};
pub use task::TaskRef;
pub use tone::{ToneSpec, synthesize};
