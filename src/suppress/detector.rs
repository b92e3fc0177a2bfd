use std::ops::RangeInclusive;

use serde::Serialize;

use super::config::SuppressorConfig;
use super::spectrum::SpectrumFrame;
use super::MAX_BANDS;

/// A tonal peak classified as acoustic feedback.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct FeedbackCandidate {
    pub frequency_hz: f32,
    pub magnitude: f32,
    pub level_db: f32,
}

/// Up to `MAX_BANDS` candidates in ascending frequency order.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Candidates {
    items: [FeedbackCandidate; MAX_BANDS],
    len: usize,
}

impl Candidates {
    fn push(&mut self, candidate: FeedbackCandidate) {
        if self.len < MAX_BANDS {
            self.items[self.len] = candidate;
            self.len += 1;
        }
    }

    pub fn as_slice(&self) -> &[FeedbackCandidate] {
        &self.items[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeedbackCandidate> {
        self.as_slice().iter()
    }
}

impl From<Option<FeedbackCandidate>> for Candidates {
    fn from(candidate: Option<FeedbackCandidate>) -> Self {
        let mut found = Self::default();
        if let Some(c) = candidate {
            found.push(c);
        }
        found
    }
}

/// Scans a spectrum for narrow, loud peaks inside the configured search band.
pub struct HowlingDetector {
    sample_rate: f32,
    fft_size: usize,
    bins: RangeInclusive<usize>,
    threshold_db: f32,
    threshold_linear: f32,
    neighbor_ratio: f32,
    prominence_near: f32,
    prominence_far: f32,
    split_lobes: bool,
    /// Linear peak-to-median ratio; zero disables the gate.
    crest_ratio: f32,
    scratch: Vec<f32>,
}

impl HowlingDetector {
    /// `config` must pass [`SuppressorConfig::validate`].
    pub fn new(config: &SuppressorConfig) -> Self {
        debug_assert!(config.validate().is_ok(), "unvalidated config: {:?}", config);
        let bins = config.search_bins();
        let crest_ratio = if config.min_crest_db > 0.0 {
            10.0f32.powf(config.min_crest_db / 20.0)
        } else {
            0.0
        };

        Self {
            sample_rate: config.sample_rate as f32,
            fft_size: config.fft_size,
            scratch: Vec::with_capacity(bins.clone().count()),
            bins,
            threshold_db: config.threshold_db,
            threshold_linear: config.threshold_linear(),
            neighbor_ratio: config.neighbor_ratio,
            prominence_near: config.prominence_near,
            prominence_far: config.prominence_far,
            split_lobes: config.split_lobes,
            crest_ratio,
        }
    }

    /// Bins covered by the search band, both ends inclusive.
    pub fn bin_range(&self) -> RangeInclusive<usize> {
        self.bins.clone()
    }

    pub fn bin_to_hz(&self, bin: usize) -> f32 {
        bin as f32 * self.sample_rate / self.fft_size as f32
    }

    /// Strongest in-band peak, if it is loud and narrow enough to be feedback.
    pub fn detect(&mut self, frame: &SpectrumFrame) -> Option<FeedbackCandidate> {
        let mags = self.usable_band(frame)?;

        let mut peak_bin = None;
        let mut peak_val = 0.0f32;
        for i in self.bins.clone() {
            if mags[i] > peak_val {
                peak_val = mags[i];
                peak_bin = Some(i);
            }
        }
        let peak_bin = peak_bin?;

        let level_db = 20.0 * peak_val.log10();
        if level_db < self.threshold_db {
            log::trace!("peak at bin {} too quiet: {:.1} dB", peak_bin, level_db);
            return None;
        }

        if !self.is_narrow(mags, peak_bin) {
            log::trace!("peak at bin {} is broadband", peak_bin);
            return None;
        }

        if !self.passes_crest(frame, peak_val) {
            log::trace!("peak at bin {} does not stand out of the band", peak_bin);
            return None;
        }

        Some(FeedbackCandidate {
            frequency_hz: self.bin_to_hz(peak_bin),
            magnitude: peak_val,
            level_db,
        })
    }

    /// Every prominent in-band peak, at most `max_k` (capped at `MAX_BANDS`).
    ///
    /// After a peak is accepted the next two bins are skipped so one spectral
    /// lobe never yields two candidates.
    pub fn detect_many(&mut self, frame: &SpectrumFrame, max_k: usize) -> Candidates {
        let mut found = Candidates::default();
        let max_k = max_k.min(MAX_BANDS);
        let Some(mags) = self.usable_band(frame) else {
            return found;
        };

        let mut i = *self.bins.start();
        while i <= *self.bins.end() && found.len() < max_k {
            let val = mags[i];
            if val > self.threshold_linear && self.is_prominent(mags, i) {
                let level_db = 20.0 * val.log10();
                if level_db > self.threshold_db && self.passes_crest(frame, val) {
                    found.push(FeedbackCandidate {
                        frequency_hz: self.bin_to_hz(i),
                        magnitude: val,
                        level_db,
                    });
                    i += 3;
                    continue;
                }
            }
            i += 1;
        }

        found
    }

    /// Both neighbours below `neighbor_ratio` of the peak.
    ///
    /// A tone between two bin centres puts nearly equal energy into both. With
    /// `split_lobes` the larger neighbour then counts as part of the peak and
    /// the bins on either side of the pair are tested instead.
    fn is_narrow(&self, mags: &[f32], peak: usize) -> bool {
        let at = |steps: isize| neighbour(mags, peak, steps);
        let (Some(left), Some(right)) = (at(-1), at(1)) else {
            return false;
        };
        let val = mags[peak];
        let limit = val * self.neighbor_ratio;
        if left < limit && right < limit {
            return true;
        }
        if !self.split_lobes || left > val || right > val {
            return false;
        }

        let dir = if right >= left { 1 } else { -1 };
        let inner = if dir == 1 { left } else { right };
        matches!(at(2 * dir), Some(outer) if inner < limit && outer < limit)
    }

    /// Prominence over the immediate and second-nearest neighbours, or over
    /// the bins around a two-bin lobe when `split_lobes` is set.
    fn is_prominent(&self, mags: &[f32], i: usize) -> bool {
        let at = |steps: isize| neighbour(mags, i, steps);
        let (Some(l1), Some(r1), Some(l2), Some(r2)) = (at(-1), at(1), at(-2), at(2)) else {
            return false;
        };
        let val = mags[i];
        let (near, far) = (self.prominence_near, self.prominence_far);
        if val > l1 * near && val > r1 * near && val > l2 * far && val > r2 * far {
            return true;
        }
        if !self.split_lobes || val < l1 || val < r1 {
            return false;
        }

        let dir = if r1 >= l1 { 1 } else { -1 };
        match (at(-dir), at(2 * dir), at(-2 * dir), at(3 * dir)) {
            (Some(inner), Some(outer), Some(inner_far), Some(outer_far)) => {
                val > inner * near
                    && val > outer * near
                    && val > inner_far * far
                    && val > outer_far * far
            }
            _ => false,
        }
    }

    /// Magnitudes of `frame`, or `None` when the frame cannot be trusted.
    fn usable_band<'a>(&self, frame: &'a SpectrumFrame) -> Option<&'a [f32]> {
        let mags = frame.magnitudes();
        if mags.len() != self.fft_size / 2 || self.bins.is_empty() {
            return None;
        }
        if mags[self.bins.clone()].iter().any(|m| !m.is_finite()) {
            log::debug!("non-finite magnitude in spectrum, skipping detection");
            return None;
        }
        Some(mags)
    }

    fn passes_crest(&mut self, frame: &SpectrumFrame, peak: f32) -> bool {
        if self.crest_ratio <= 0.0 {
            return true;
        }

        self.scratch.clear();
        self.scratch
            .extend_from_slice(&frame.magnitudes()[self.bins.clone()]);
        let mid = self.scratch.len() / 2;
        let (_, median, _) = self.scratch.select_nth_unstable_by(mid, f32::total_cmp);
        let median = *median;

        median <= 0.0 || peak >= median * self.crest_ratio
    }
}

fn neighbour(mags: &[f32], bin: usize, steps: isize) -> Option<f32> {
    bin.checked_add_signed(steps)
        .and_then(|i| mags.get(i))
        .copied()
}
