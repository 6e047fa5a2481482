//! Sine tone synthesis
//!
//! Produces signed 16-bit little-endian mono PCM. Output is a pure function
//! of its inputs so the same tone can be synthesized from any thread.

use std::f64::consts::TAU;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Reference sample rate (Hz)
pub const SAMPLE_RATE: u32 = 44_100;

/// Peak amplitude as a fraction of full scale, leaving headroom against clipping
pub const DEFAULT_AMPLITUDE: f64 = 0.8;

/// Bytes per sample (16-bit mono)
pub const BYTES_PER_SAMPLE: usize = 2;

/// Longest tone synthesized (one hour); longer durations are truncated
pub const MAX_DURATION_MS: i64 = 3_600_000;

/// A single tone: frequency and length
///
/// A non-positive frequency is silence. A negative duration is treated as
/// empty rather than rejected, and anything past [`MAX_DURATION_MS`] is
/// truncated to it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToneSpec {
    pub frequency_hz: f64,
    pub duration_ms: i64,
}

impl ToneSpec {
    pub const fn new(frequency_hz: f64, duration_ms: i64) -> Self {
        Self {
            frequency_hz,
            duration_ms,
        }
    }

    /// Wall-clock length of the tone, zero for negative durations
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms.clamp(0, MAX_DURATION_MS) as u64)
    }

    pub fn is_silent(&self) -> bool {
        !(self.frequency_hz.is_finite() && self.frequency_hz > 0.0)
    }
}

/// Synthesize a tone at the reference sample rate and amplitude
pub fn synthesize(tone: ToneSpec) -> Vec<u8> {
    synthesize_with(tone, SAMPLE_RATE, DEFAULT_AMPLITUDE)
}

/// Synthesize a tone with an explicit sample rate and peak amplitude
///
/// `amplitude` is clamped to `0.0..=1.0`.
pub fn synthesize_with(tone: ToneSpec, sample_rate: u32, amplitude: f64) -> Vec<u8> {
    let samples = sample_count(tone.duration_ms, sample_rate);
    let mut pcm = Vec::with_capacity(samples * BYTES_PER_SAMPLE);

    if tone.is_silent() {
        pcm.resize(samples * BYTES_PER_SAMPLE, 0);
        return pcm;
    }

    let peak = amplitude.clamp(0.0, 1.0) * f64::from(i16::MAX);
    let step = TAU * tone.frequency_hz / f64::from(sample_rate);
    for i in 0..samples {
        let value = ((step * i as f64).sin() * peak).round() as i16;
        pcm.extend_from_slice(&value.to_le_bytes());
    }
    pcm
}

/// Number of samples needed for `duration_ms` at `sample_rate`
pub fn sample_count(duration_ms: i64, sample_rate: u32) -> usize {
    if duration_ms <= 0 {
        return 0;
    }
    let duration_ms = duration_ms.min(MAX_DURATION_MS) as u64;
    let samples = duration_ms.saturating_mul(u64::from(sample_rate)) / 1000;
    usize::try_from(samples).unwrap_or(usize::MAX / BYTES_PER_SAMPLE)
}

/// Playback length of a PCM buffer
pub fn pcm_duration(pcm: &[u8], sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    let samples = (pcm.len() / BYTES_PER_SAMPLE) as u64;
    Duration::from_micros(samples * 1_000_000 / u64::from(sample_rate))
}

/// Decode 16-bit little-endian PCM into normalized `f32` samples
///
/// A trailing odd byte is ignored.
pub fn decode_pcm16(pcm: &[u8]) -> Vec<f32> {
    pcm.chunks_exact(BYTES_PER_SAMPLE)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / f32::from(i16::MAX))
        .collect()
}
