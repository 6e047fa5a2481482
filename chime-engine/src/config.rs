//! Centralized configuration for the alarm engine
//!
//! Every tunable number lives here with its default.

use chime_core::TonePattern;
use chime_core::tone::{DEFAULT_AMPLITUDE, SAMPLE_RATE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure for the engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tone playback settings
    pub audio: AudioSettings,
    /// Alarm scheduling settings
    pub alarm: AlarmSettings,
}

/// Tone playback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Whether cues are played at all
    pub enabled: bool,
    /// Sample rate tones are synthesized at
    pub sample_rate: u32,
    /// Peak amplitude (0.0 - 1.0)
    pub amplitude: f64,
    /// Pause between repeats of a looping pattern in milliseconds
    pub loop_pause_ms: u64,
    /// Pattern looped while an alarm is waiting for an answer
    pub alarm_pattern: TonePattern,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_rate: SAMPLE_RATE,
            amplitude: DEFAULT_AMPLITUDE,
            loop_pause_ms: 800,
            alarm_pattern: TonePattern::Bell,
        }
    }
}

impl AudioSettings {
    pub fn loop_pause(&self) -> Duration {
        Duration::from_millis(self.loop_pause_ms)
    }
}

/// Alarm scheduling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmSettings {
    /// Repeat minutes offered when a reminder is set without one
    pub default_repeat_minutes: u32,
    /// Granularity of suggested snooze choices
    pub snooze_step_minutes: u32,
    /// Longest snooze accepted (12 hours)
    pub max_snooze_minutes: u32,
    /// Name of the thread that owns all alarm timers
    pub timer_thread_name: String,
}

impl Default for AlarmSettings {
    fn default() -> Self {
        Self {
            default_repeat_minutes: 30,
            snooze_step_minutes: 30,
            max_snooze_minutes: 720,
            timer_thread_name: "chime-alarms".to_string(),
        }
    }
}

impl AlarmSettings {
    /// Suggested snooze lengths: 0, then every step up to the maximum
    pub fn snooze_choices(&self) -> Vec<u32> {
        let step = self.snooze_step_minutes.max(1) as usize;
        std::iter::once(0)
            .chain((step as u32..=self.max_snooze_minutes).step_by(step))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.audio.enabled);
        assert_eq!(config.audio.sample_rate, 44_100);
        assert_eq!(config.audio.loop_pause(), Duration::from_millis(800));
        assert_eq!(config.audio.alarm_pattern, TonePattern::Bell);
        assert_eq!(config.alarm.default_repeat_minutes, 30);
        assert_eq!(config.alarm.timer_thread_name, "chime-alarms");
    }

    #[test]
    fn test_snooze_choices() {
        let choices = AlarmSettings::default().snooze_choices();
        assert_eq!(choices.len(), 25);
        assert_eq!(&choices[..3], &[0, 30, 60]);
        assert_eq!(choices.last(), Some(&720));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let json = r#"{ "audio": { "alarm_pattern": "chime", "loop_pause_ms": 500 } }"#;
        let parsed: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.audio.alarm_pattern, TonePattern::Chime);
        assert_eq!(parsed.audio.loop_pause_ms, 500);
        assert!(parsed.audio.enabled);
        assert_eq!(parsed.alarm.max_snooze_minutes, 720);
    }

    #[test]
    fn test_config_serialization() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.alarm.snooze_step_minutes, parsed.alarm.snooze_step_minutes);
        assert_eq!(parsed.audio.alarm_pattern, TonePattern::Bell);
    }
}
