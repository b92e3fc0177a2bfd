use super::config::SuppressorConfig;
use super::notch::NotchFilter;

/// Series cascade of 1 to `MAX_BANDS` notch sections. Slot order is
/// processing order.
#[derive(Clone, Debug)]
pub struct SuppressorBank {
    bands: Vec<NotchFilter>,
    sample_rate: f32,
    q_default: f32,
}

impl SuppressorBank {
    /// All bands start disabled. `config` must pass
    /// [`SuppressorConfig::validate`].
    pub fn new(config: &SuppressorConfig) -> Self {
        debug_assert!(config.validate().is_ok(), "unvalidated config: {:?}", config);
        let band = NotchFilter::new(config.q_default, config.step_freq_hz, config.step_q);
        Self {
            bands: vec![band; config.band_count],
            sample_rate: config.sample_rate as f32,
            q_default: config.q_default,
        }
    }

    /// Run one sample through every band in slot order.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        self.bands.iter_mut().fold(x, |acc, band| band.process(acc))
    }

    /// Filter a block of 16-bit PCM in place.
    pub fn process_block(&mut self, pcm: &mut [i16]) {
        for sample in pcm.iter_mut() {
            *sample = self.process_i16(*sample);
        }
    }

    #[inline]
    pub fn process_i16(&mut self, sample: i16) -> i16 {
        self.process(sample as f32).round() as i16
    }

    /// One smoothing step on every band. Returns how many bands moved.
    pub fn tick(&mut self) -> usize {
        let sample_rate = self.sample_rate;
        self.bands
            .iter_mut()
            .map(|band| band.tick(sample_rate))
            .filter(|&moved| moved)
            .count()
    }

    pub fn bands(&self) -> &[NotchFilter] {
        &self.bands
    }

    pub fn band(&self, slot: usize) -> Option<&NotchFilter> {
        self.bands.get(slot)
    }

    pub fn band_mut(&mut self, slot: usize) -> Option<&mut NotchFilter> {
        self.bands.get_mut(slot)
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.bands.iter().filter(|b| b.is_enabled()).count()
    }

    pub fn reset(&mut self) {
        let q_default = self.q_default;
        for band in &mut self.bands {
            band.reset(q_default);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn tone(freq: f32, len: usize) -> Vec<i16> {
        (0..len)
            .map(|i| (3000.0 * (2.0 * PI * freq * i as f32 / 16000.0).sin()).round() as i16)
            .collect()
    }

    fn rms(x: &[i16]) -> f32 {
        (x.iter().map(|&v| (v as f32).powi(2)).sum::<f32>() / x.len() as f32).sqrt()
    }

    fn settle(bank: &mut SuppressorBank) {
        while bank.tick() > 0 {}
    }

    #[test]
    fn fresh_bank_is_transparent() {
        let cfg = SuppressorConfig::multi_band();
        let mut bank = SuppressorBank::new(&cfg);
        assert_eq!(bank.len(), 3);
        assert_eq!(bank.active_count(), 0);

        let input = tone(3000.0, 512);
        let mut output = input.clone();
        bank.process_block(&mut output);
        assert_eq!(input, output);
    }

    #[test]
    fn cascade_removes_each_tuned_tone() {
        let cfg = SuppressorConfig::multi_band();
        let mut bank = SuppressorBank::new(&cfg);
        for (slot, freq) in [2000.0, 3000.0, 4500.0].into_iter().enumerate() {
            bank.band_mut(slot).unwrap().set_target(freq, 5.0);
        }
        settle(&mut bank);
        assert_eq!(bank.active_count(), 3);

        for freq in [2000.0, 3000.0, 4500.0] {
            let input = tone(freq, 4000);
            let mut output = input.clone();
            bank.process_block(&mut output);
            assert!(rms(&output[2000..]) < rms(&input[2000..]) / 10.0, "{} Hz", freq);
        }
    }

    #[test]
    fn reset_disables_every_band() {
        let cfg = SuppressorConfig::multi_band();
        let mut bank = SuppressorBank::new(&cfg);
        bank.band_mut(1).unwrap().set_target(2500.0, 4.0);
        settle(&mut bank);
        assert_eq!(bank.active_count(), 1);

        bank.reset();
        assert_eq!(bank.active_count(), 0);
        assert!(bank.bands().iter().all(|b| b.q_current() == cfg.q_default));
    }
}
