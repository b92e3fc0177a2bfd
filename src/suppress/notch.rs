//! Second-order notch section with slew-limited retuning.
//!
//! Coefficients always follow `(freq_current, q_current)`; targets only move
//! the current values by bounded steps on each [`NotchFilter::tick`], so the
//! response never jumps between two audio samples.

use std::f32::consts::PI;

use rustfft::num_complex::Complex;

/// Normalized biquad coefficients (`a0 == 1`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NotchCoeffs {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl NotchCoeffs {
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Bilinear-transform notch at `freq` Hz.
    ///
    /// Frequencies outside `(0, nyquist)` and non-positive Q give the identity,
    /// which is also how a disabled band is represented.
    pub fn design(freq: f32, sample_rate: f32, q: f32) -> Self {
        let usable = freq.is_finite()
            && q.is_finite()
            && sample_rate.is_finite()
            && freq > 0.0
            && q > 0.0
            && freq < sample_rate / 2.0;
        if !usable {
            return Self::IDENTITY;
        }

        let omega = 2.0 * PI * freq / sample_rate;
        let alpha = omega.sin() / (2.0 * q);
        let cos_w = omega.cos();
        let inv_a0 = 1.0 / (1.0 + alpha);

        Self {
            b0: inv_a0,
            b1: -2.0 * cos_w * inv_a0,
            b2: inv_a0,
            a1: -2.0 * cos_w * inv_a0,
            a2: (1.0 - alpha) * inv_a0,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Linear magnitude response at `freq` Hz.
    pub fn magnitude_at(&self, freq: f32, sample_rate: f32) -> f32 {
        let w = 2.0 * std::f64::consts::PI * freq as f64 / sample_rate as f64;
        let z1 = Complex::from_polar(1.0, -w);
        let z2 = z1 * z1;
        let num = self.b0 as f64 + z1 * self.b1 as f64 + z2 * self.b2 as f64;
        let den = 1.0 + z1 * self.a1 as f64 + z2 * self.a2 as f64;
        (num / den).norm() as f32
    }
}

/// One band slot: live coefficients, smoothing targets and filter memory.
///
/// Processing uses the transposed direct form II, so two state registers
/// stand in for the input and output history.
#[derive(Clone, Debug)]
pub struct NotchFilter {
    freq_current: f32,
    freq_target: f32,
    q_current: f32,
    q_target: f32,
    step_freq: f32,
    step_q: f32,
    coeffs: NotchCoeffs,
    z1: f32,
    z2: f32,
}

impl NotchFilter {
    /// A disabled band that will retune by at most `step_freq` Hz and
    /// `step_q` per tick.
    pub fn new(q_default: f32, step_freq: f32, step_q: f32) -> Self {
        Self {
            freq_current: 0.0,
            freq_target: 0.0,
            q_current: q_default,
            q_target: q_default,
            step_freq,
            step_q,
            coeffs: NotchCoeffs::IDENTITY,
            z1: 0.0,
            z2: 0.0,
        }
    }

    /// Set where the notch should glide to. A target of 0 Hz disables the band
    /// once reached.
    pub fn set_target(&mut self, freq: f32, q: f32) {
        self.freq_target = if freq.is_finite() && freq > 0.0 { freq } else { 0.0 };
        if q.is_finite() && q > 0.0 {
            self.q_target = q;
        }
    }

    /// Filter one sample. Output is clamped to the 16-bit PCM range.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let c = &self.coeffs;
        let y = c.b0 * x + self.z1;
        self.z1 = c.b1 * x - c.a1 * y + self.z2;
        self.z2 = c.b2 * x - c.a2 * y;
        y.clamp(-32768.0, 32767.0)
    }

    /// Advance current frequency and Q one bounded step towards their targets
    /// and refresh the coefficients. Returns whether anything moved.
    pub fn tick(&mut self, sample_rate: f32) -> bool {
        let freq = approach(self.freq_current, self.freq_target, self.step_freq);
        let q = approach(self.q_current, self.q_target, self.step_q);
        if freq == self.freq_current && q == self.q_current {
            return false;
        }

        self.freq_current = freq;
        self.q_current = q;
        self.coeffs = NotchCoeffs::design(freq, sample_rate, q);
        if self.coeffs.is_identity() {
            self.z1 = 0.0;
            self.z2 = 0.0;
        }
        true
    }

    /// Disabled bands pass audio through unchanged.
    pub fn is_enabled(&self) -> bool {
        self.freq_current > 0.0
    }

    /// Current values equal the targets.
    pub fn is_settled(&self) -> bool {
        self.freq_current == self.freq_target && self.q_current == self.q_target
    }

    pub fn freq_current(&self) -> f32 {
        self.freq_current
    }

    pub fn freq_target(&self) -> f32 {
        self.freq_target
    }

    pub fn q_current(&self) -> f32 {
        self.q_current
    }

    pub fn q_target(&self) -> f32 {
        self.q_target
    }

    pub fn coeffs(&self) -> NotchCoeffs {
        self.coeffs
    }

    /// Back to a disabled band with Q `q_default` and empty memory.
    pub fn reset(&mut self, q_default: f32) {
        *self = Self::new(q_default, self.step_freq, self.step_q);
    }
}

/// Move `current` towards `target` by at most `step`, landing exactly on the
/// target for the last step.
fn approach(current: f32, target: f32, step: f32) -> f32 {
    let next = current + (target - current).clamp(-step, step);
    if (target - next).abs() <= step * 1e-3 {
        target
    } else {
        next
    }
}
