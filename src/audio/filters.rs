//! Filter primitives shared by the generators: one-pole smoothing,
//! biquad lowpass and band emphasis, leaky-integrator brown noise and
//! the Kellet pinking bank. All filters are per-call state; nothing is shared.

use std::f32::consts::PI;

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Q_BUTTERWORTH_F32};
use tracing::warn;

/// Highest usable cutoff as a fraction of the sample rate (just under Nyquist).
const MAX_CUTOFF_RATIO: f32 = 0.45;

fn clamp_cutoff(sample_rate: u32, cutoff_hz: f32) -> f32 {
    cutoff_hz.clamp(1.0, sample_rate as f32 * MAX_CUTOFF_RATIO)
}

/// Single-pole lowpass: `y += a * (x - y)`.
pub struct OnePoleLowpass {
    alpha: f32,
    state: f32,
}

impl OnePoleLowpass {
    pub fn new(sample_rate: u32, cutoff_hz: f32) -> Self {
        let fc = clamp_cutoff(sample_rate, cutoff_hz);
        let alpha = 1.0 - (-2.0 * PI * fc / sample_rate as f32).exp();
        Self { alpha, state: 0.0 }
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        self.state += self.alpha * (x - self.state);
        self.state
    }

    /// Filter a whole buffer in place.
    pub fn apply(&mut self, samples: &mut [f32]) {
        for s in samples.iter_mut() {
            *s = self.process(*s);
        }
    }
}

/// Second-order section built with `biquad`; `None` if the parameters are rejected.
fn design(
    kind: biquad::Type<f32>,
    sample_rate: u32,
    freq_hz: f32,
    q: f32,
) -> Option<DirectForm2Transposed<f32>> {
    let freq = clamp_cutoff(sample_rate, freq_hz);
    match Coefficients::<f32>::from_params(kind, (sample_rate as f32).hz(), freq.hz(), q) {
        Ok(coeffs) => Some(DirectForm2Transposed::<f32>::new(coeffs)),
        Err(e) => {
            warn!(?e, sample_rate, freq, "biquad coefficients rejected, bypassing");
            None
        }
    }
}

/// 12 dB/octave Butterworth lowpass. Bypasses if the coefficients cannot be built.
pub struct Lowpass {
    filter: Option<DirectForm2Transposed<f32>>,
}

impl Lowpass {
    pub fn new(sample_rate: u32, cutoff_hz: f32) -> Self {
        Self {
            filter: design(biquad::Type::LowPass, sample_rate, cutoff_hz, Q_BUTTERWORTH_F32),
        }
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        match self.filter.as_mut() {
            Some(f) => f.run(x),
            None => x,
        }
    }

    pub fn apply(&mut self, samples: &mut [f32]) {
        for s in samples.iter_mut() {
            *s = self.process(*s);
        }
    }
}

/// Resonant band emphasis around a centre frequency.
pub struct BandEmphasis {
    filter: Option<DirectForm2Transposed<f32>>,
}

impl BandEmphasis {
    pub fn new(sample_rate: u32, center_hz: f32, q: f32) -> Self {
        Self {
            filter: design(biquad::Type::BandPass, sample_rate, center_hz, q.max(0.1)),
        }
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        match self.filter.as_mut() {
            Some(f) => f.run(x),
            None => x,
        }
    }

    pub fn apply(&mut self, samples: &mut [f32]) {
        for s in samples.iter_mut() {
            *s = self.process(*s);
        }
    }
}

/// Leaky integrator turning white noise brown: `out = (prev + leak * w) / (1 + leak)`.
/// Bounded to [-1, 1] for inputs in [-1, 1].
pub struct BrownIntegrator {
    leak: f32,
    last: f32,
}

impl BrownIntegrator {
    pub fn new(leak: f32) -> Self {
        Self { leak, last: 0.0 }
    }

    #[inline]
    pub fn process(&mut self, white: f32) -> f32 {
        self.last = (self.last + self.leak * white) / (1.0 + self.leak);
        self.last
    }
}

/// Paul Kellet's refined pinking filter (seven-term recursive bank).
#[derive(Default)]
pub struct PinkingFilter {
    b: [f32; 7],
}

impl PinkingFilter {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn process(&mut self, white: f32) -> f32 {
        let b = &mut self.b;
        b[0] = 0.99886 * b[0] + white * 0.055_517_9;
        b[1] = 0.99332 * b[1] + white * 0.075_075_9;
        b[2] = 0.96900 * b[2] + white * 0.153_852;
        b[3] = 0.86650 * b[3] + white * 0.310_485_6;
        b[4] = 0.55000 * b[4] + white * 0.532_952_2;
        b[5] = -0.7616 * b[5] - white * 0.016_898;
        let out = (b[0] + b[1] + b[2] + b[3] + b[4] + b[5] + b[6] + white * 0.5362) * 0.11;
        b[6] = white * 0.115_926;
        out
    }
}

/// Scale the buffer down so its peak sits at `ceiling`. Buffers already
/// within the ceiling are untouched. Returns the applied scale factor.
pub fn limit_peak(samples: &mut [f32], ceiling: f32) -> f32 {
    let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    if peak <= ceiling || peak == 0.0 {
        return 1.0;
    }
    let scale = ceiling / peak;
    for s in samples.iter_mut() {
        *s *= scale;
    }
    scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_pole_converges_to_dc() {
        let mut lp = OnePoleLowpass::new(44100, 800.0);
        let mut y = 0.0;
        for _ in 0..44100 {
            y = lp.process(1.0);
        }
        assert!((y - 1.0).abs() < 1e-3, "got {y}");
    }

    #[test]
    fn one_pole_attenuates_nyquist() {
        let mut lp = OnePoleLowpass::new(44100, 300.0);
        let mut peak = 0.0f32;
        for i in 0..4410 {
            let x = if i % 2 == 0 { 1.0 } else { -1.0 };
            let y = lp.process(x);
            if i > 100 {
                peak = peak.max(y.abs());
            }
        }
        assert!(peak < 0.1, "alternating signal leaked through: {peak}");
    }

    #[test]
    fn cutoff_above_nyquist_is_clamped() {
        let mut lp = OnePoleLowpass::new(8000, 20_000.0);
        assert!(lp.process(1.0).is_finite());
        let mut bp = BandEmphasis::new(4000, 3000.0, 1.0);
        assert!(bp.filter.is_some());
        assert!(bp.process(0.5).is_finite());
        let mut lp = Lowpass::new(4000, 3000.0);
        assert!(lp.filter.is_some());
        assert!(lp.process(0.5).is_finite());
    }

    /// Steady-state RMS of a unit sine at `freq` after filtering.
    fn sine_gain(filter: &mut dyn FnMut(f32) -> f32, sample_rate: u32, freq: f32) -> f32 {
        let n = sample_rate as usize;
        let out: Vec<f32> = (0..n)
            .map(|i| filter((2.0 * PI * freq * i as f32 / sample_rate as f32).sin()))
            .collect();
        let tail = &out[n / 2..];
        let rms = (tail.iter().map(|s| s * s).sum::<f32>() / tail.len() as f32).sqrt();
        rms * std::f32::consts::SQRT_2
    }

    #[test]
    fn butterworth_rolls_off_twice_as_fast_as_one_pole() {
        for cutoff in [300.0f32, 800.0, 2000.0] {
            let mut lp = Lowpass::new(44100, cutoff);
            let passband = sine_gain(&mut |x| lp.process(x), 44100, cutoff / 4.0);
            assert!(passband > 0.95, "fc={cutoff}: passband gain {passband}");

            let mut lp = Lowpass::new(44100, cutoff);
            let stop = 20.0 * sine_gain(&mut |x| lp.process(x), 44100, cutoff * 4.0).log10();
            let mut one = OnePoleLowpass::new(44100, cutoff);
            let stop_one = 20.0 * sine_gain(&mut |x| one.process(x), 44100, cutoff * 4.0).log10();
            assert!(stop < -22.0, "fc={cutoff}: biquad at 4x cutoff {stop} dB");
            assert!(stop < stop_one - 8.0, "fc={cutoff}: {stop} dB vs one-pole {stop_one} dB");
        }
    }

    #[test]
    fn brown_integrator_stays_bounded() {
        let mut brown = BrownIntegrator::new(0.02);
        for _ in 0..100_000 {
            let y = brown.process(1.0);
            assert!(y <= 1.0 + 1e-6);
        }
    }

    #[test]
    fn pinking_filter_is_finite_for_constant_input() {
        let mut pink = PinkingFilter::new();
        for _ in 0..10_000 {
            assert!(pink.process(-1.0).is_finite());
        }
    }

    #[test]
    fn limit_peak_preserves_quiet_buffers() {
        let mut quiet = vec![0.2, -0.5, 0.9];
        assert_eq!(limit_peak(&mut quiet, 1.0), 1.0);
        assert_eq!(quiet, vec![0.2, -0.5, 0.9]);

        let mut loud = vec![0.5, -2.0, 1.0];
        let scale = limit_peak(&mut loud, 1.0);
        assert!((scale - 0.5).abs() < 1e-6);
        assert!((loud[1] + 1.0).abs() < 1e-6);
    }
}
