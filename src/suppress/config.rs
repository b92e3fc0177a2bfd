use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

use super::MAX_BANDS;

/// Bins kept free on each side of the search band. Peak tests read up to
/// three bins beyond a candidate.
pub const EDGE_BINS: usize = 3;

/// How the spectrum is scanned for feedback tones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    /// Strongest bin in the search band, accepted when it is narrow.
    SinglePeak,
    /// Every prominent bin in the search band, up to the band count.
    MultiPeak,
}

/// How detected tones are mapped onto band slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetunePolicy {
    /// A slot only moves when the tone drifted more than `hysteresis_hz`.
    /// Slots without a tone keep their notch.
    Hysteresis,
    /// Every slot is reassigned each tick; slots without a tone are detuned.
    Reassign,
}

/// Complete configuration of one suppression session.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SuppressorConfig {
    pub sample_rate: u32,
    pub fft_size: usize,
    pub band_count: usize,
    pub min_freq: f32,
    pub max_freq: f32,
    pub threshold_db: f32,
    pub q_default: f32,
    pub q_min: f32,
    pub q_max: f32,
    pub hysteresis_hz: f32,
    pub step_freq_hz: f32,
    pub step_q: f32,
    /// Samples between two analysis ticks.
    pub adapt_interval: usize,
    /// Samples between two smoothing ticks.
    pub smooth_interval: usize,
    pub detection: DetectionMode,
    pub retune_policy: RetunePolicy,
    /// Single-peak mode: both neighbors must stay below this fraction of the peak.
    pub neighbor_ratio: f32,
    /// Multi-peak mode: required excess over the immediate neighbors.
    pub prominence_near: f32,
    /// Multi-peak mode: required excess over the second-nearest neighbors.
    pub prominence_far: f32,
    /// Accept a tone whose energy is split over two adjacent bins by testing
    /// the bins around the pair instead of the pair itself.
    pub split_lobes: bool,
    /// Minimum peak to band-median ratio in dB. Zero disables the gate.
    pub min_crest_db: f32,
    /// Consecutive empty ticks after which every band is detuned. Zero keeps
    /// notches in place indefinitely.
    pub release_after: u32,
}

impl Default for SuppressorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            fft_size: 128,
            band_count: 1,
            min_freq: 1500.0,
            max_freq: 5500.0,
            threshold_db: -35.0,
            q_default: 3.0,
            q_min: 1.0,
            q_max: 5.0,
            hysteresis_hz: 50.0,
            step_freq_hz: 10.0,
            step_q: 0.1,
            adapt_interval: 16_000,
            smooth_interval: 32,
            detection: DetectionMode::SinglePeak,
            retune_policy: RetunePolicy::Hysteresis,
            neighbor_ratio: 0.6,
            prominence_near: 1.4,
            prominence_far: 1.2,
            split_lobes: true,
            min_crest_db: 18.0,
            release_after: 0,
        }
    }
}

impl SuppressorConfig {
    /// Three cascaded bands, every slot reassigned on each tick.
    pub fn multi_band() -> Self {
        Self {
            band_count: MAX_BANDS,
            detection: DetectionMode::MultiPeak,
            retune_policy: RetunePolicy::Reassign,
            ..Self::default()
        }
    }

    /// Narrow notches (Q 5 to 30) with a looser narrowness test.
    pub fn narrow() -> Self {
        Self {
            q_default: 5.0,
            q_min: 5.0,
            q_max: 30.0,
            neighbor_ratio: 0.7,
            ..Self::default()
        }
    }

    pub fn nyquist(&self) -> f32 {
        self.sample_rate as f32 / 2.0
    }

    /// Width of one analysis bin in Hz.
    pub fn bin_width(&self) -> f32 {
        self.sample_rate as f32 / self.fft_size as f32
    }

    /// Linear magnitude matching `threshold_db`.
    pub fn threshold_linear(&self) -> f32 {
        10.0f32.powf(self.threshold_db / 20.0)
    }

    /// Bins whose centre frequency lies in `[min_freq, max_freq]`, both ends
    /// inclusive.
    pub fn search_bins(&self) -> RangeInclusive<usize> {
        let to_bin = |hz: f32| hz as f64 * self.fft_size as f64 / self.sample_rate as f64;
        let start = to_bin(self.min_freq).ceil() as usize;
        let end = (to_bin(self.max_freq).floor() as usize).min((self.fft_size / 2).saturating_sub(1));
        start..=end
    }

    pub fn clamp_q(&self, q: f32) -> f32 {
        q.clamp(self.q_min, self.q_max)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        if self.fft_size < 8 || self.fft_size % 2 != 0 {
            return Err(ConfigError::InvalidFftSize(self.fft_size));
        }
        if !(1..=MAX_BANDS).contains(&self.band_count) {
            return Err(ConfigError::InvalidBandCount(self.band_count));
        }

        let nyquist = self.nyquist();
        let first = EDGE_BINS;
        let last = (self.fft_size / 2).saturating_sub(EDGE_BINS + 1);
        let freq_ok = self.min_freq.is_finite()
            && self.max_freq.is_finite()
            && self.min_freq > 0.0
            && self.min_freq <= self.max_freq
            && self.max_freq < nyquist;
        let bins = self.search_bins();
        if !freq_ok || bins.is_empty() || *bins.start() < first || *bins.end() > last {
            return Err(ConfigError::InvalidSearchBand {
                min_freq: self.min_freq,
                max_freq: self.max_freq,
                low_hz: first as f32 * self.bin_width(),
                high_hz: last as f32 * self.bin_width(),
            });
        }

        let q_ok = self.q_min > 0.0
            && self.q_min <= self.q_default
            && self.q_default <= self.q_max
            && self.q_max.is_finite();
        if !q_ok {
            return Err(ConfigError::InvalidQBounds {
                q_min: self.q_min,
                q_default: self.q_default,
                q_max: self.q_max,
            });
        }

        for (name, value) in [
            ("step_freq_hz", self.step_freq_hz),
            ("step_q", self.step_q),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositive { name, value });
            }
        }
        if !(self.hysteresis_hz.is_finite() && self.hysteresis_hz >= 0.0) {
            return Err(ConfigError::NonPositive {
                name: "hysteresis_hz",
                value: self.hysteresis_hz,
            });
        }
        if !self.threshold_db.is_finite() {
            return Err(ConfigError::RatioOutOfRange {
                name: "threshold_db",
                value: self.threshold_db,
                range: "finite dB",
            });
        }

        if self.adapt_interval < self.fft_size {
            return Err(ConfigError::AdaptIntervalTooShort {
                adapt_interval: self.adapt_interval,
                fft_size: self.fft_size,
            });
        }
        if self.smooth_interval == 0 {
            return Err(ConfigError::ZeroSmoothInterval);
        }

        if !(self.neighbor_ratio > 0.0 && self.neighbor_ratio < 1.0) {
            return Err(ConfigError::RatioOutOfRange {
                name: "neighbor_ratio",
                value: self.neighbor_ratio,
                range: "(0, 1)",
            });
        }
        for (name, value) in [
            ("prominence_near", self.prominence_near),
            ("prominence_far", self.prominence_far),
        ] {
            if !(value.is_finite() && value >= 1.0) {
                return Err(ConfigError::RatioOutOfRange {
                    name,
                    value,
                    range: "[1, inf)",
                });
            }
        }
        if !(self.min_crest_db.is_finite() && self.min_crest_db >= 0.0) {
            return Err(ConfigError::RatioOutOfRange {
                name: "min_crest_db",
                value: self.min_crest_db,
                range: "[0, inf) dB",
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() {
        assert!(SuppressorConfig::default().validate().is_ok());
        assert!(SuppressorConfig::multi_band().validate().is_ok());
        assert!(SuppressorConfig::narrow().validate().is_ok());
    }

    #[test]
    fn rejects_band_count_out_of_range() {
        let cfg = SuppressorConfig {
            band_count: 4,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidBandCount(4)));
        assert_eq!(
            ConfigError::InvalidBandCount(4).to_string(),
            "band count 4 must be between 1 and 3"
        );

        let cfg = SuppressorConfig {
            band_count: 0,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidBandCount(0)));
    }

    #[test]
    fn rejects_search_band_above_nyquist() {
        let cfg = SuppressorConfig {
            max_freq: 8000.0,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidSearchBand { .. })
        ));
    }

    #[test]
    fn search_band_keeps_clear_of_the_spectrum_edges() {
        // 125 Hz bins: the band may span bins 3 to 60.
        assert!(edge_band(375.0, 7500.0).validate().is_ok());
        assert!(edge_band(375.0, 7624.0).validate().is_ok());

        for (min_freq, max_freq) in [(250.0, 5500.0), (1500.0, 7625.0), (1500.0, 7900.0)] {
            assert!(
                matches!(
                    edge_band(min_freq, max_freq).validate(),
                    Err(ConfigError::InvalidSearchBand { low_hz, high_hz, .. })
                        if low_hz == 375.0 && high_hz == 7500.0
                ),
                "{}-{} Hz",
                min_freq,
                max_freq
            );
        }

        // No bin centre between 1510 and 1600 Hz.
        assert!(edge_band(1510.0, 1600.0).validate().is_err());
    }

    #[test]
    fn search_band_maps_to_inclusive_bins() {
        assert_eq!(SuppressorConfig::default().search_bins(), 12..=44);
        assert_eq!(edge_band(1550.0, 5450.0).search_bins(), 13..=43);
    }

    fn edge_band(min_freq: f32, max_freq: f32) -> SuppressorConfig {
        SuppressorConfig {
            min_freq,
            max_freq,
            ..Default::default()
        }
    }

    #[test]
    fn rejects_q_default_outside_bounds() {
        let cfg = SuppressorConfig {
            q_default: 6.0,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidQBounds { .. })
        ));
    }

    #[test]
    fn rejects_adapt_interval_shorter_than_block() {
        let cfg = SuppressorConfig {
            adapt_interval: 64,
            ..Default::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::AdaptIntervalTooShort {
                adapt_interval: 64,
                fft_size: 128
            })
        );
    }

    #[test]
    fn threshold_linear_matches_db() {
        let cfg = SuppressorConfig {
            threshold_db: -20.0,
            ..Default::default()
        };
        assert!((cfg.threshold_linear() - 0.1).abs() < 1e-6);
        assert!((cfg.bin_width() - 125.0).abs() < 1e-6);
    }

    #[test]
    fn parses_partial_toml_table() {
        let cfg: SuppressorConfig = toml::from_str(
            r#"
            band_count = 3
            detection = "multi_peak"
            retune_policy = "reassign"
            q_max = 8.0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.band_count, 3);
        assert_eq!(cfg.detection, DetectionMode::MultiPeak);
        assert_eq!(cfg.retune_policy, RetunePolicy::Reassign);
        assert_eq!(cfg.q_max, 8.0);
        assert_eq!(cfg.fft_size, 128);
    }
}
