use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Magnitude spectrum of one analysis block: `fft_size / 2` bins, linear scale.
#[derive(Clone, Debug, PartialEq)]
pub struct SpectrumFrame {
    magnitudes: Vec<f32>,
}

impl SpectrumFrame {
    /// All-zero frame for an `fft_size`-point analysis.
    pub fn new(fft_size: usize) -> Self {
        Self {
            magnitudes: vec![0.0; fft_size / 2],
        }
    }

    pub fn from_magnitudes(magnitudes: Vec<f32>) -> Self {
        Self { magnitudes }
    }

    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }

    /// FFT length this frame was produced with.
    pub fn fft_size(&self) -> usize {
        self.magnitudes.len() * 2
    }
}

/// Hann-windowed forward FFT over a fixed block size.
///
/// The plan, window, and work buffers are created once; `analyze` does not
/// allocate.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl SpectrumAnalyzer {
    pub fn new(fft_size: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Self {
            fft,
            window: hann_window(fft_size),
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.window.len()
    }

    /// Overwrite `frame` with the spectrum of the first `fft_size` samples of
    /// `block`.
    ///
    /// Returns `false` and leaves `frame` untouched when `block` is too short.
    pub fn analyze(&mut self, block: &[i16], frame: &mut SpectrumFrame) -> bool {
        let n = self.window.len();
        if block.len() < n || frame.len() != n / 2 {
            return false;
        }

        for ((slot, &sample), &w) in self.buffer.iter_mut().zip(block).zip(&self.window) {
            *slot = Complex::new(sample as f32 * w, 0.0);
        }
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        for (mag, bin) in frame.magnitudes.iter_mut().zip(&self.buffer) {
            *mag = bin.norm();
        }
        true
    }
}

fn hann_window(size: usize) -> Vec<f32> {
    if size < 2 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, amplitude: f32, sample_rate: f32, len: usize) -> Vec<i16> {
        (0..len)
            .map(|i| {
                let t = i as f32 / sample_rate;
                (amplitude * (2.0 * std::f32::consts::PI * freq * t).sin()).round() as i16
            })
            .collect()
    }

    #[test]
    fn window_is_symmetric_hann() {
        let w = hann_window(128);
        assert_eq!(w.len(), 128);
        assert!(w[0].abs() < 1e-6);
        assert!(w[127].abs() < 1e-6);
        for i in 0..64 {
            assert!((w[i] - w[127 - i]).abs() < 1e-5);
        }
    }

    #[test]
    fn tone_peaks_at_its_bin() {
        let mut analyzer = SpectrumAnalyzer::new(128);
        let mut frame = SpectrumFrame::new(128);
        let block = sine(3000.0, 3277.0, 16000.0, 128);

        assert!(analyzer.analyze(&block, &mut frame));
        assert_eq!(frame.len(), 64);

        let (peak_bin, _) = frame
            .magnitudes()
            .iter()
            .enumerate()
            .fold((0, 0.0f32), |best, (i, &m)| if m > best.1 { (i, m) } else { best });
        assert_eq!(peak_bin, 24);
    }

    #[test]
    fn short_block_keeps_previous_frame() {
        let mut analyzer = SpectrumAnalyzer::new(128);
        let mut frame = SpectrumFrame::from_magnitudes(vec![7.0; 64]);

        assert!(!analyzer.analyze(&[1000; 100], &mut frame));
        assert!(frame.magnitudes().iter().all(|&m| m == 7.0));
    }

    #[test]
    fn silence_gives_zero_spectrum() {
        let mut analyzer = SpectrumAnalyzer::new(128);
        let mut frame = SpectrumFrame::from_magnitudes(vec![1.0; 64]);

        assert!(analyzer.analyze(&[0; 128], &mut frame));
        assert!(frame.magnitudes().iter().all(|&m| m == 0.0));
    }
}
