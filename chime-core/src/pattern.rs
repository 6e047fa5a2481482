//! Named tone patterns used as audible cues

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::tone::ToneSpec;

/// One tone followed by a pause before the next step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneStep {
    pub tone: ToneSpec,
    pub pause_after_ms: u64,
}

impl ToneStep {
    const fn new(frequency_hz: f64, duration_ms: i64, pause_after_ms: u64) -> Self {
        Self {
            tone: ToneSpec::new(frequency_hz, duration_ms),
            pause_after_ms,
        }
    }

    pub fn pause_after(&self) -> Duration {
        Duration::from_millis(self.pause_after_ms)
    }
}

const BELL: [ToneStep; 2] = [ToneStep::new(880.0, 80, 40), ToneStep::new(660.0, 120, 0)];

const CHIME: [ToneStep; 3] = [
    ToneStep::new(900.0, 80, 90),
    ToneStep::new(1100.0, 80, 90),
    ToneStep::new(1300.0, 80, 0),
];

const SUCCESS: [ToneStep; 1] = [ToneStep::new(800.0, 200, 0)];

const BEEP: [ToneStep; 1] = [ToneStep::new(440.0, 300, 0)];

/// A named audible cue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TonePattern {
    /// Short descending two-tone bell; the default alarm loop
    Bell,
    /// Rising comedic tri-beep
    Chime,
    /// Single confirmation tone, played when a reminder is set
    Success,
    /// Plain test tone
    Beep,
}

impl TonePattern {
    pub const ALL: [TonePattern; 4] = [Self::Bell, Self::Chime, Self::Success, Self::Beep];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Bell => "bell",
            Self::Chime => "chime",
            Self::Success => "success",
            Self::Beep => "beep",
        }
    }

    pub fn steps(&self) -> &'static [ToneStep] {
        match self {
            Self::Bell => &BELL,
            Self::Chime => &CHIME,
            Self::Success => &SUCCESS,
            Self::Beep => &BEEP,
        }
    }

    /// Time to play the pattern once, pauses included
    pub fn duration(&self) -> Duration {
        self.steps()
            .iter()
            .map(|step| step.tone.duration() + step.pause_after())
            .sum()
    }

    /// Length of the longest single tone in the pattern
    pub fn longest_tone(&self) -> Duration {
        self.steps()
            .iter()
            .map(|step| step.tone.duration())
            .max()
            .unwrap_or_default()
    }
}

impl fmt::Display for TonePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TonePattern {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bell" => Ok(Self::Bell),
            "chime" | "comedic" => Ok(Self::Chime),
            "success" => Ok(Self::Success),
            "beep" | "test" => Ok(Self::Beep),
            other => Err(CoreError::validation(
                "pattern",
                format!(
                    "unknown pattern '{}' (expected one of: {})",
                    other,
                    Self::ALL.map(|p| p.name()).join(", ")
                ),
            )),
        }
    }
}
