//! Soundscape generators. Each one fills `len` mono samples at
//! `sample_rate` from a caller-supplied random source.
//! Output is texture, not a fixed waveform: two calls with different RNG
//! state produce statistically similar but distinct buffers.

use std::f32::consts::PI;

use rand::{Rng, RngCore};

use super::filters::{BandEmphasis, BrownIntegrator, Lowpass, OnePoleLowpass, PinkingFilter};

/// Signature shared by every generator in the catalogue.
pub type GeneratorFn = fn(&mut dyn RngCore, u32, usize) -> Vec<f32>;

#[inline]
fn white(rng: &mut dyn RngCore) -> f32 {
    rng.gen::<f32>() * 2.0 - 1.0
}

/// One damped-sine thump inside a heartbeat cycle.
#[derive(Debug, Clone, Copy)]
pub struct Lobe {
    /// Offset from the start of the beat, seconds.
    pub onset: f32,
    /// Active length, seconds.
    pub length: f32,
    pub freq_hz: f32,
    /// Exponential decay rate, 1/s.
    pub decay: f32,
    pub amplitude: f32,
}

impl Lobe {
    #[inline]
    fn sample(&self, t_in_beat: f32) -> f32 {
        let t = t_in_beat - self.onset;
        if t < 0.0 || t >= self.length {
            return 0.0;
        }
        (2.0 * PI * self.freq_hz * t).sin() * (-t * self.decay).exp() * self.amplitude
    }
}

/// Two-lobe ("lub-dub") percussive envelope repeated at a fixed tempo.
#[derive(Debug, Clone, Copy)]
pub struct HeartbeatShape {
    pub bpm: f32,
    pub lobes: [Lobe; 2],
}

impl HeartbeatShape {
    pub const RESTING: HeartbeatShape = HeartbeatShape {
        bpm: 70.0,
        lobes: [
            Lobe { onset: 0.0, length: 0.08, freq_hz: 60.0, decay: 30.0, amplitude: 1.0 },
            Lobe { onset: 0.15, length: 0.08, freq_hz: 50.0, decay: 25.0, amplitude: 0.7 },
        ],
    };

    /// Quieter, muffled beat heard under the womb rumble.
    pub const MATERNAL: HeartbeatShape = HeartbeatShape {
        bpm: 75.0,
        lobes: [
            Lobe { onset: 0.0, length: 0.07, freq_hz: 40.0, decay: 35.0, amplitude: 0.3 },
            Lobe { onset: 0.12, length: 0.07, freq_hz: 35.0, decay: 30.0, amplitude: 0.2 },
        ],
    };

    pub fn beat_seconds(&self) -> f32 {
        60.0 / self.bpm
    }

    /// Envelope value at absolute time `t` (seconds from buffer start).
    #[inline]
    pub fn sample(&self, t: f32) -> f32 {
        let t_in_beat = t % self.beat_seconds();
        self.lobes.iter().map(|l| l.sample(t_in_beat)).sum()
    }
}

/// Lullaby melody, Hz.
pub const LULLABY_NOTES: [f32; 15] = [
    262.0, 294.0, 330.0, 349.0, 330.0, 294.0, 262.0, 247.0, 262.0, 294.0, 330.0, 294.0, 262.0,
    247.0, 220.0,
];
pub const LULLABY_NOTE_SECONDS: f32 = 0.6;
const LULLABY_DECAY: f32 = 2.5;
const LULLABY_AMPLITUDE: f32 = 0.3;

const BIRD_CHIRPS: usize = 15;

pub fn white_noise(rng: &mut dyn RngCore, sample_rate: u32, len: usize) -> Vec<f32> {
    let mut out: Vec<f32> = (0..len).map(|_| white(rng)).collect();
    OnePoleLowpass::new(sample_rate, 4000.0).apply(&mut out);
    out
}

pub fn rain(rng: &mut dyn RngCore, sample_rate: u32, len: usize) -> Vec<f32> {
    let mut brown = BrownIntegrator::new(0.02);
    let mut out: Vec<f32> = (0..len).map(|_| brown.process(white(rng)) * 3.5).collect();
    BandEmphasis::new(sample_rate, 1500.0, 0.5).apply(&mut out);
    out
}

pub fn ocean(rng: &mut dyn RngCore, sample_rate: u32, len: usize) -> Vec<f32> {
    let sr = sample_rate as f32;
    let mut brown = BrownIntegrator::new(0.02);
    let mut out: Vec<f32> = (0..len)
        .map(|i| {
            let t = i as f32 / sr;
            let swell = (2.0 * PI * 0.1 * t).sin() * 0.5 + 0.5;
            brown.process(white(rng)) * swell * 4.0
        })
        .collect();
    Lowpass::new(sample_rate, 800.0).apply(&mut out);
    out
}

pub fn heartbeat(_rng: &mut dyn RngCore, sample_rate: u32, len: usize) -> Vec<f32> {
    let sr = sample_rate as f32;
    let shape = HeartbeatShape::RESTING;
    (0..len).map(|i| shape.sample(i as f32 / sr)).collect()
}

pub fn shush(rng: &mut dyn RngCore, sample_rate: u32, len: usize) -> Vec<f32> {
    const CYCLE: f32 = 1.5;
    const ACTIVE: f32 = 0.8;
    let sr = sample_rate as f32;
    let mut out: Vec<f32> = (0..len)
        .map(|i| {
            let phase = (i as f32 / sr) % CYCLE;
            let envelope = if phase < ACTIVE { (PI * phase / ACTIVE).sin() } else { 0.0 };
            white(rng) * envelope * 0.5
        })
        .collect();
    BandEmphasis::new(sample_rate, 3000.0, 1.0).apply(&mut out);
    out
}

pub fn lullaby(_rng: &mut dyn RngCore, sample_rate: u32, len: usize) -> Vec<f32> {
    let sr = sample_rate as f32;
    let note_len = ((LULLABY_NOTE_SECONDS * sr) as usize).max(1);
    (0..len)
        .map(|i| {
            let freq = LULLABY_NOTES[(i / note_len) % LULLABY_NOTES.len()];
            let t = (i % note_len) as f32 / sr;
            (2.0 * PI * freq * t).sin() * (-t * LULLABY_DECAY).exp() * LULLABY_AMPLITUDE
        })
        .collect()
}

pub fn fan(rng: &mut dyn RngCore, sample_rate: u32, len: usize) -> Vec<f32> {
    let mut pink = PinkingFilter::new();
    let mut out: Vec<f32> = (0..len).map(|_| pink.process(white(rng))).collect();
    Lowpass::new(sample_rate, 2000.0).apply(&mut out);
    out
}

pub fn birds(rng: &mut dyn RngCore, sample_rate: u32, len: usize) -> Vec<f32> {
    let sr = sample_rate as f32;
    let mut out = vec![0.0f32; len];
    if len == 0 {
        return out;
    }
    // Keep chirp onsets clear of the final 300 ms where the buffer allows it.
    let start_span = len.saturating_sub((0.3 * sr) as usize).max(1);

    for _ in 0..BIRD_CHIRPS {
        let start = rng.gen_range(0..start_span);
        let freq = rng.gen_range(2000.0f32..5000.0);
        let chirp_len = ((rng.gen_range(0.05f32..0.2) * sr) as usize).max(1);
        let mut phase = 0.0f32;
        for i in 0..chirp_len {
            let idx = start + i;
            if idx >= len {
                break;
            }
            let t = i as f32 / sr;
            let envelope = (PI * i as f32 / chirp_len as f32).sin();
            let inst_freq = freq + (2.0 * PI * 20.0 * t).sin() * 500.0;
            phase = (phase + 2.0 * PI * inst_freq / sr) % (2.0 * PI);
            out[idx] += phase.sin() * envelope * 0.15;
        }
    }
    out
}

pub fn womb(rng: &mut dyn RngCore, sample_rate: u32, len: usize) -> Vec<f32> {
    let sr = sample_rate as f32;
    let shape = HeartbeatShape::MATERNAL;
    let mut rumble = BrownIntegrator::new(0.01);
    let mut out: Vec<f32> = (0..len)
        .map(|i| rumble.process(white(rng)) * 5.0 + shape.sample(i as f32 / sr))
        .collect();
    Lowpass::new(sample_rate, 300.0).apply(&mut out);
    out
}
