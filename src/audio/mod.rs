//! Ambient soundscape catalogue and synthesis entry points.
//! Synthesis is pure and CPU-bound: (key, sample rate, seconds) → mono buffer.
//! Output routing lives in `sink`/`output`; lifecycle lives in `crate::playback`.

pub mod filters;
pub mod generators;
pub mod output;
pub mod sink;

use std::str::FromStr;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ErrorKind;
use generators::GeneratorFn;

/// Samples above this magnitude get the whole buffer scaled down.
const PEAK_CEILING: f32 = 1.0;

/// A mono buffer of samples in roughly [-1, 1].
/// Buffers are looped by the sink; seams at the loop point are not smoothed.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }

    /// Root-mean-square level.
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
        (sum / self.samples.len() as f64).sqrt() as f32
    }
}

/// Symbolic identifier of every synthesizable soundscape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SoundKey {
    WhiteNoise,
    Rain,
    Ocean,
    Heartbeat,
    Shush,
    Lullaby,
    Fan,
    Birds,
    Womb,
}

impl SoundKey {
    pub const ALL: [SoundKey; 9] = [
        SoundKey::WhiteNoise,
        SoundKey::Rain,
        SoundKey::Ocean,
        SoundKey::Heartbeat,
        SoundKey::Shush,
        SoundKey::Lullaby,
        SoundKey::Fan,
        SoundKey::Birds,
        SoundKey::Womb,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SoundKey::WhiteNoise => "white-noise",
            SoundKey::Rain => "rain",
            SoundKey::Ocean => "ocean",
            SoundKey::Heartbeat => "heartbeat",
            SoundKey::Shush => "shush",
            SoundKey::Lullaby => "lullaby",
            SoundKey::Fan => "fan",
            SoundKey::Birds => "birds",
            SoundKey::Womb => "womb",
        }
    }

    pub fn profile(self) -> &'static SoundProfile {
        &PROFILES[self as usize]
    }
}

impl std::fmt::Display for SoundKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SoundKey {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SoundKey::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| SynthError::NotFound(s.to_string()))
    }
}

/// Immutable catalogue entry: how to synthesize one soundscape.
pub struct SoundProfile {
    pub key: SoundKey,
    pub display_name: &'static str,
    /// Buffer length used when the caller does not configure one.
    pub default_buffer_seconds: f32,
    generator: GeneratorFn,
}

impl SoundProfile {
    /// Synthesize with a caller-supplied random source.
    pub fn generate(
        &self,
        rng: &mut dyn RngCore,
        sample_rate: u32,
        seconds: f32,
    ) -> Result<SampleBuffer, SynthError> {
        let len = buffer_len(sample_rate, seconds)?;
        let mut samples = (self.generator)(rng, sample_rate, len);
        debug_assert_eq!(samples.len(), len);
        let scale = filters::limit_peak(&mut samples, PEAK_CEILING);
        if scale < 1.0 {
            debug!(key = %self.key, scale, "peak limited");
        }
        Ok(SampleBuffer::new(samples, sample_rate))
    }

    /// Look up a profile by its symbolic key.
    pub fn lookup(key: &str) -> Option<&'static SoundProfile> {
        key.parse::<SoundKey>().ok().map(SoundKey::profile)
    }
}

impl std::fmt::Debug for SoundProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundProfile")
            .field("key", &self.key)
            .field("display_name", &self.display_name)
            .field("default_buffer_seconds", &self.default_buffer_seconds)
            .finish()
    }
}

/// Catalogue, indexed by `SoundKey as usize`.
static PROFILES: [SoundProfile; 9] = [
    SoundProfile {
        key: SoundKey::WhiteNoise,
        display_name: "White Noise",
        default_buffer_seconds: 2.0,
        generator: generators::white_noise,
    },
    SoundProfile {
        key: SoundKey::Rain,
        display_name: "Rain",
        default_buffer_seconds: 2.0,
        generator: generators::rain,
    },
    SoundProfile {
        key: SoundKey::Ocean,
        display_name: "Ocean",
        default_buffer_seconds: 4.0,
        generator: generators::ocean,
    },
    SoundProfile {
        key: SoundKey::Heartbeat,
        display_name: "Heartbeat",
        default_buffer_seconds: 2.0,
        generator: generators::heartbeat,
    },
    SoundProfile {
        key: SoundKey::Shush,
        display_name: "Shush",
        default_buffer_seconds: 3.0,
        generator: generators::shush,
    },
    SoundProfile {
        key: SoundKey::Lullaby,
        display_name: "Lullaby",
        default_buffer_seconds: 9.0,
        generator: generators::lullaby,
    },
    SoundProfile {
        key: SoundKey::Fan,
        display_name: "Fan",
        default_buffer_seconds: 2.0,
        generator: generators::fan,
    },
    SoundProfile {
        key: SoundKey::Birds,
        display_name: "Birds",
        default_buffer_seconds: 6.0,
        generator: generators::birds,
    },
    SoundProfile {
        key: SoundKey::Womb,
        display_name: "Womb",
        default_buffer_seconds: 4.0,
        generator: generators::womb,
    },
];

/// All catalogue entries, in display order.
pub fn profiles() -> &'static [SoundProfile] {
    &PROFILES
}

#[derive(Debug, Clone, PartialEq)]
pub enum SynthError {
    InvalidSampleRate(u32),
    InvalidDuration(f32),
    NotFound(String),
}

impl SynthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SynthError::InvalidSampleRate(_) | SynthError::InvalidDuration(_) => {
                ErrorKind::InputValidation
            }
            SynthError::NotFound(_) => ErrorKind::NotFound,
        }
    }
}

impl std::fmt::Display for SynthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SynthError::InvalidSampleRate(sr) => write!(f, "invalid sample rate: {sr}"),
            SynthError::InvalidDuration(d) => write!(f, "invalid duration: {d}s"),
            SynthError::NotFound(key) => write!(f, "sound not found: {key}"),
        }
    }
}

impl std::error::Error for SynthError {}

/// Longest buffer a single synthesis call may render.
pub const MAX_BUFFER_SECONDS: f32 = 600.0;
/// Highest accepted sample rate.
pub const MAX_SAMPLE_RATE: u32 = 384_000;

/// Number of samples for `seconds` at `sample_rate`: `round(sr * seconds)`.
pub fn buffer_len(sample_rate: u32, seconds: f32) -> Result<usize, SynthError> {
    if sample_rate == 0 || sample_rate > MAX_SAMPLE_RATE {
        return Err(SynthError::InvalidSampleRate(sample_rate));
    }
    if !seconds.is_finite() || seconds <= 0.0 || seconds > MAX_BUFFER_SECONDS {
        return Err(SynthError::InvalidDuration(seconds));
    }
    Ok((sample_rate as f64 * seconds as f64).round() as usize)
}

/// Synthesize `key` with a fresh entropy-seeded random source.
pub fn synthesize(key: &str, sample_rate: u32, seconds: f32) -> Result<SampleBuffer, SynthError> {
    let mut rng = StdRng::from_entropy();
    synthesize_with_rng(key, sample_rate, seconds, &mut rng)
}

/// Synthesize `key` drawing randomness from `rng`.
pub fn synthesize_with_rng(
    key: &str,
    sample_rate: u32,
    seconds: f32,
    rng: &mut dyn RngCore,
) -> Result<SampleBuffer, SynthError> {
    let profile = SoundProfile::lookup(key).ok_or_else(|| SynthError::NotFound(key.to_string()))?;
    let start = Instant::now();
    let buffer = profile.generate(rng, sample_rate, seconds)?;
    debug!(
        key = %profile.key,
        samples = buffer.len(),
        elapsed_us = start.elapsed().as_micros() as u64,
        "synthesized"
    );
    Ok(buffer)
}
