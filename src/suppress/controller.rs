use serde::Serialize;

use super::bank::SuppressorBank;
use super::config::{DetectionMode, RetunePolicy, SuppressorConfig};
use super::detector::{Candidates, FeedbackCandidate, HowlingDetector};
use super::spectrum::SpectrumFrame;
use super::MAX_BANDS;

/// A band target change, reported for diagnostics only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct RetuneEvent {
    /// Input sample position at which the tick ran.
    pub sample_index: u64,
    pub band: usize,
    /// New target; 0 means the band was released.
    pub frequency_hz: f32,
    pub q: f32,
    pub level_db: f32,
}

/// Counters and the latest spectrum shared by the tick path.
#[derive(Clone, Debug)]
pub struct AdaptiveState {
    pub sample_counter: usize,
    pub adapt_interval: usize,
    pub threshold_db: f32,
    pub threshold_linear: f32,
    pub spectrum: SpectrumFrame,
}

impl AdaptiveState {
    pub fn new(config: &SuppressorConfig) -> Self {
        Self {
            sample_counter: 0,
            adapt_interval: config.adapt_interval,
            threshold_db: config.threshold_db,
            threshold_linear: config.threshold_linear(),
            spectrum: SpectrumFrame::new(config.fft_size),
        }
    }

    pub fn tick_due(&self) -> bool {
        self.sample_counter >= self.adapt_interval
    }
}

/// Where the control loop stands after the last tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No band is tuned or gliding.
    Inert,
    /// The spectrum was refreshed but no target moved.
    Analyzing,
    /// At least one band target moved on the last tick.
    Retuning,
}

/// Maps detected feedback onto band targets once per analysis tick.
pub struct AdaptiveController {
    detector: HowlingDetector,
    detection: DetectionMode,
    policy: RetunePolicy,
    hysteresis_hz: f32,
    match_radius: f32,
    q_default: f32,
    q_min: f32,
    q_max: f32,
    threshold_db: f32,
    release_after: u32,
    misses: u32,
    ticks: u64,
    candidates: Candidates,
    events: [RetuneEvent; MAX_BANDS],
    event_count: usize,
}

impl AdaptiveController {
    /// `config` must pass [`SuppressorConfig::validate`].
    pub fn new(config: &SuppressorConfig) -> Self {
        debug_assert!(config.validate().is_ok(), "unvalidated config: {:?}", config);
        Self {
            detector: HowlingDetector::new(config),
            detection: config.detection,
            policy: config.retune_policy,
            hysteresis_hz: config.hysteresis_hz,
            match_radius: config.hysteresis_hz.max(config.bin_width()),
            q_default: config.q_default,
            q_min: config.q_min,
            q_max: config.q_max,
            threshold_db: config.threshold_db,
            release_after: config.release_after,
            misses: 0,
            ticks: 0,
            candidates: Candidates::default(),
            events: [RetuneEvent::default(); MAX_BANDS],
            event_count: 0,
        }
    }

    /// Notch Q for a detection: louder feedback gets a narrower notch.
    pub fn q_for_level(&self, level_db: f32) -> f32 {
        let q = self.q_default * (1.0 + (level_db - self.threshold_db) / 20.0);
        if q.is_finite() {
            q.clamp(self.q_min, self.q_max)
        } else {
            self.q_default
        }
    }

    /// Detect on the current spectrum, update band targets, reset the sample
    /// counter. Returns how many bands were moved onto a new tone; releases
    /// are not counted.
    pub fn on_tick(
        &mut self,
        state: &mut AdaptiveState,
        bank: &mut SuppressorBank,
        sample_index: u64,
    ) -> usize {
        state.sample_counter = 0;
        self.ticks += 1;
        self.event_count = 0;

        self.candidates = match self.detection {
            DetectionMode::SinglePeak => self.detector.detect(&state.spectrum).into(),
            DetectionMode::MultiPeak => self.detector.detect_many(&state.spectrum, bank.len()),
        };

        if self.candidates.is_empty() {
            self.misses = self.misses.saturating_add(1);
            if self.release_after > 0 && self.misses == self.release_after {
                self.release_all(bank, sample_index);
            }
            0
        } else {
            self.misses = 0;
            self.apply(bank, sample_index)
        }
    }

    fn apply(&mut self, bank: &mut SuppressorBank, sample_index: u64) -> usize {
        let candidates = self.candidates;
        let slots = assign_slots(candidates.as_slice(), bank, self.match_radius);
        let mut claimed = [false; MAX_BANDS];
        let mut retuned = 0;

        for (candidate, slot) in candidates.iter().zip(slots) {
            let Some(slot) = slot else { continue };
            claimed[slot] = true;

            let Some(band) = bank.band_mut(slot) else { continue };
            let drift = (candidate.frequency_hz - band.freq_current()).abs();
            if self.policy == RetunePolicy::Hysteresis && drift <= self.hysteresis_hz {
                continue;
            }

            let q = self.q_for_level(candidate.level_db);
            if band.freq_target() == candidate.frequency_hz && band.q_target() == q {
                continue;
            }
            band.set_target(candidate.frequency_hz, q);
            retuned += 1;
            self.record(slot, candidate, q, sample_index);
        }

        if self.policy == RetunePolicy::Reassign {
            for slot in 0..bank.len() {
                if !claimed[slot] {
                    self.release(bank, slot, sample_index);
                }
            }
        }

        retuned
    }

    fn release_all(&mut self, bank: &mut SuppressorBank, sample_index: u64) {
        log::debug!("no feedback for {} ticks, releasing all bands", self.misses);
        for slot in 0..bank.len() {
            self.release(bank, slot, sample_index);
        }
    }

    fn release(&mut self, bank: &mut SuppressorBank, slot: usize, sample_index: u64) {
        let q_default = self.q_default;
        let Some(band) = bank.band_mut(slot) else { return };
        if band.freq_target() == 0.0 {
            return;
        }
        band.set_target(0.0, q_default);
        log::debug!("band {} released", slot);
        self.push_event(RetuneEvent {
            sample_index,
            band: slot,
            frequency_hz: 0.0,
            q: q_default,
            level_db: f32::NEG_INFINITY,
        });
    }

    fn record(&mut self, slot: usize, candidate: &FeedbackCandidate, q: f32, sample_index: u64) {
        log::debug!(
            "band {} -> {:.0} Hz, Q {:.2}, level {:.1} dB",
            slot,
            candidate.frequency_hz,
            q,
            candidate.level_db
        );
        self.push_event(RetuneEvent {
            sample_index,
            band: slot,
            frequency_hz: candidate.frequency_hz,
            q,
            level_db: candidate.level_db,
        });
    }

    fn push_event(&mut self, event: RetuneEvent) {
        if self.event_count < MAX_BANDS {
            self.events[self.event_count] = event;
            self.event_count += 1;
        }
    }

    /// Target changes made by the most recent tick.
    pub fn last_events(&self) -> &[RetuneEvent] {
        &self.events[..self.event_count]
    }

    /// Candidates found by the most recent tick.
    pub fn last_candidates(&self) -> &[FeedbackCandidate] {
        self.candidates.as_slice()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn phase(&self, bank: &SuppressorBank) -> Phase {
        let idle = bank
            .bands()
            .iter()
            .all(|b| !b.is_enabled() && b.freq_target() == 0.0);
        if idle {
            Phase::Inert
        } else if self.event_count > 0 {
            Phase::Retuning
        } else {
            Phase::Analyzing
        }
    }

    pub fn detector(&self) -> &HowlingDetector {
        &self.detector
    }

    pub fn reset(&mut self) {
        self.misses = 0;
        self.ticks = 0;
        self.candidates = Candidates::default();
        self.event_count = 0;
    }
}

/// Slot for each candidate. A candidate keeps the band already aimed close to
/// it; the rest take free bands first, then whatever is left.
fn assign_slots(
    candidates: &[FeedbackCandidate],
    bank: &SuppressorBank,
    match_radius: f32,
) -> [Option<usize>; MAX_BANDS] {
    let mut slots = [None; MAX_BANDS];
    let mut taken = [false; MAX_BANDS];
    let bands = bank.bands();

    for (ci, candidate) in candidates.iter().enumerate() {
        let nearest = bands
            .iter()
            .enumerate()
            .filter(|(slot, band)| !taken[*slot] && band.freq_target() > 0.0)
            .map(|(slot, band)| (slot, (band.freq_target() - candidate.frequency_hz).abs()))
            .filter(|&(_, distance)| distance <= match_radius)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((slot, _)) = nearest {
            slots[ci] = Some(slot);
            taken[slot] = true;
        }
    }

    for ci in 0..candidates.len() {
        if slots[ci].is_some() {
            continue;
        }
        let free = (0..bands.len())
            .find(|&slot| !taken[slot] && bands[slot].freq_target() == 0.0)
            .or_else(|| (0..bands.len()).find(|&slot| !taken[slot]));
        if let Some(slot) = free {
            slots[ci] = Some(slot);
            taken[slot] = true;
        }
    }

    slots
}
