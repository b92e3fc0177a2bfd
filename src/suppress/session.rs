use crate::error::ConfigError;

use super::bank::SuppressorBank;
use super::config::SuppressorConfig;
use super::controller::{AdaptiveController, AdaptiveState, Phase, RetuneEvent};
use super::spectrum::{SpectrumAnalyzer, SpectrumFrame};

/// Events kept between two drains; later ones are counted and dropped.
const EVENT_CAPACITY: usize = 64;

/// One monitoring session: the filter cascade plus the control loop that
/// steers it.
///
/// The per-sample path (`process_sample`/`process_block`) filters audio and
/// accumulates input; every `smooth_interval` samples the bands take one
/// smoothing step, and every `adapt_interval` samples the most recent
/// `fft_size` input samples are analyzed and band targets updated. Buffers
/// are sized up front so none of this allocates.
pub struct FeedbackSuppressor {
    config: SuppressorConfig,
    analyzer: SpectrumAnalyzer,
    controller: AdaptiveController,
    state: AdaptiveState,
    bank: SuppressorBank,
    history: Vec<i16>,
    history_pos: usize,
    ordered: Vec<i16>,
    smooth_counter: usize,
    samples_seen: u64,
    events: Vec<RetuneEvent>,
    dropped_events: u64,
}

impl FeedbackSuppressor {
    pub fn new(config: SuppressorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        log::info!(
            "feedback suppressor: {} Hz, fft {}, {} band(s), {:?}/{:?}, search {}-{} Hz",
            config.sample_rate,
            config.fft_size,
            config.band_count,
            config.detection,
            config.retune_policy,
            config.min_freq,
            config.max_freq
        );

        Ok(Self {
            analyzer: SpectrumAnalyzer::new(config.fft_size),
            controller: AdaptiveController::new(&config),
            state: AdaptiveState::new(&config),
            bank: SuppressorBank::new(&config),
            history: vec![0; config.fft_size],
            history_pos: 0,
            ordered: vec![0; config.fft_size],
            smooth_counter: 0,
            samples_seen: 0,
            events: Vec::with_capacity(EVENT_CAPACITY),
            dropped_events: 0,
            config,
        })
    }

    /// Filter one sample and advance both cadences.
    #[inline]
    pub fn process_sample(&mut self, sample: i16) -> i16 {
        self.history[self.history_pos] = sample;
        self.history_pos = (self.history_pos + 1) % self.history.len();

        let out = self.bank.process_i16(sample);

        self.samples_seen += 1;
        self.smooth_counter += 1;
        if self.smooth_counter >= self.config.smooth_interval {
            self.smooth_counter = 0;
            self.bank.tick();
        }

        self.state.sample_counter += 1;
        if self.state.tick_due() {
            self.adapt();
        }
        out
    }

    /// Filter a block of 16-bit PCM in place.
    pub fn process_block(&mut self, pcm: &mut [i16]) {
        for sample in pcm.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    /// Analyze the latest input and run one controller tick.
    /// Returns how many bands were retuned.
    pub fn adapt(&mut self) -> usize {
        let (tail, head) = self.history.split_at(self.history_pos);
        self.ordered[..head.len()].copy_from_slice(head);
        self.ordered[head.len()..].copy_from_slice(tail);

        if !self.analyzer.analyze(&self.ordered, &mut self.state.spectrum) {
            self.state.sample_counter = 0;
            return 0;
        }

        let retuned = self
            .controller
            .on_tick(&mut self.state, &mut self.bank, self.samples_seen);

        for event in self.controller.last_events() {
            if self.events.len() < EVENT_CAPACITY {
                self.events.push(*event);
            } else {
                self.dropped_events += 1;
            }
        }
        retuned
    }

    /// One smoothing step on every band, outside the regular cadence.
    pub fn smooth_tick(&mut self) -> usize {
        self.bank.tick()
    }

    /// Take the retune events recorded since the last drain.
    pub fn drain_events(&mut self) -> std::vec::Drain<'_, RetuneEvent> {
        self.events.drain(..)
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped_events
    }

    pub fn config(&self) -> &SuppressorConfig {
        &self.config
    }

    pub fn bank(&self) -> &SuppressorBank {
        &self.bank
    }

    pub fn spectrum(&self) -> &SpectrumFrame {
        &self.state.spectrum
    }

    pub fn controller(&self) -> &AdaptiveController {
        &self.controller
    }

    pub fn phase(&self) -> Phase {
        self.controller.phase(&self.bank)
    }

    pub fn samples_seen(&self) -> u64 {
        self.samples_seen
    }

    /// Back to the freshly created state: all bands disabled, counters and
    /// history cleared.
    pub fn reset(&mut self) {
        self.bank.reset();
        self.controller.reset();
        self.state = AdaptiveState::new(&self.config);
        self.history.fill(0);
        self.history_pos = 0;
        self.smooth_counter = 0;
        self.samples_seen = 0;
        self.events.clear();
        self.dropped_events = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    /// 3000 Hz at -20 dBFS.
    fn feedback_tone(start: usize, len: usize) -> Vec<i16> {
        let amplitude = 32767.0 * 0.1;
        (start..start + len)
            .map(|i| (amplitude * (2.0 * PI * 3000.0 * i as f64 / 16000.0).sin()).round() as i16)
            .collect()
    }

    fn rms(x: &[i16]) -> f32 {
        (x.iter().map(|&v| (v as f32).powi(2)).sum::<f32>() / x.len() as f32).sqrt()
    }

    #[test]
    fn rejects_invalid_config() {
        let cfg = SuppressorConfig {
            band_count: 5,
            ..Default::default()
        };
        assert!(FeedbackSuppressor::new(cfg).is_err());
    }

    #[test]
    fn suppresses_sustained_feedback_tone() {
        let cfg = SuppressorConfig {
            sample_rate: 16000,
            fft_size: 128,
            ..Default::default()
        };
        let step_freq = cfg.step_freq_hz;
        let mut session = FeedbackSuppressor::new(cfg).unwrap();

        // One analysis interval of feedback.
        let mut block = feedback_tone(0, 16000);
        session.process_block(&mut block);
        assert_eq!(session.controller().ticks(), 1);

        let hit = session.controller().last_candidates()[0];
        assert!((hit.frequency_hz - 3000.0).abs() <= 125.0);
        assert!(hit.level_db > -35.0);
        assert_eq!(session.bank().bands()[0].freq_target(), 3000.0);

        let events: Vec<RetuneEvent> = session.drain_events().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].band, 0);
        assert_eq!(events[0].frequency_hz, 3000.0);

        for _ in 0..(3000.0 / step_freq).ceil() as usize {
            session.smooth_tick();
        }
        assert_eq!(session.bank().bands()[0].freq_current(), 3000.0);

        let input = feedback_tone(16000, 4000);
        let mut output = input.clone();
        session.process_block(&mut output);
        let attenuation = 20.0 * (rms(&input[2000..]) / rms(&output[2000..]).max(1e-3)).log10();
        assert!(attenuation >= 10.0, "only {:.1} dB", attenuation);
    }

    #[test]
    fn silence_changes_nothing() {
        let mut session = FeedbackSuppressor::new(SuppressorConfig::multi_band()).unwrap();
        let mut block = vec![0i16; 48000];
        session.process_block(&mut block);

        assert_eq!(session.controller().ticks(), 3);
        assert!(block.iter().all(|&s| s == 0));
        assert!(session.bank().bands().iter().all(|b| b.freq_target() == 0.0));
        assert_eq!(session.drain_events().count(), 0);
        assert_eq!(session.phase(), Phase::Inert);
    }

    #[test]
    fn analysis_uses_most_recent_input() {
        let cfg = SuppressorConfig {
            adapt_interval: 1000,
            ..Default::default()
        };
        let mut session = FeedbackSuppressor::new(cfg).unwrap();

        // Silence, then feedback only in the last 200 samples before the tick.
        let mut block = vec![0i16; 800];
        block.extend(feedback_tone(800, 200));
        session.process_block(&mut block);

        assert_eq!(session.controller().ticks(), 1);
        assert_eq!(session.bank().bands()[0].freq_target(), 3000.0);
    }

    #[test]
    fn regular_cadence_settles_the_notch() {
        let cfg = SuppressorConfig {
            adapt_interval: 4000,
            smooth_interval: 16,
            ..Default::default()
        };
        let mut session = FeedbackSuppressor::new(cfg).unwrap();

        let mut pos = 0;
        while pos < 16000 * 6 {
            let mut block = feedback_tone(pos, 160);
            session.process_block(&mut block);
            pos += 160;
        }
        let band = &session.bank().bands()[0];
        assert_eq!(band.freq_current(), 3000.0);
        assert!(band.is_settled());

        let input = feedback_tone(pos, 4000);
        let mut output = input.clone();
        session.process_block(&mut output);
        assert!(rms(&output[2000..]) < rms(&input[2000..]) / 10.0);
    }

    #[test]
    fn reset_returns_to_fresh_state() {
        let mut session = FeedbackSuppressor::new(SuppressorConfig::default()).unwrap();
        let mut block = feedback_tone(0, 16000);
        session.process_block(&mut block);
        assert_eq!(session.bank().bands()[0].freq_target(), 3000.0);

        session.reset();
        assert_eq!(session.samples_seen(), 0);
        assert_eq!(session.controller().ticks(), 0);
        assert!(session.bank().bands().iter().all(|b| b.freq_target() == 0.0));
        assert_eq!(session.drain_events().count(), 0);
    }
}
