//! Adaptive acoustic feedback suppression.
//!
//! PCM flows through a cascade of notch filters on every sample. In parallel
//! the input is periodically analyzed, narrow tonal peaks are classified as
//! feedback, and the notches glide towards them in bounded steps.

pub mod bank;
pub mod config;
pub mod controller;
pub mod detector;
pub mod notch;
pub mod session;
pub mod spectrum;

/// Upper bound on cascaded notch bands.
pub const MAX_BANDS: usize = 3;

pub use bank::SuppressorBank;
pub use config::{DetectionMode, RetunePolicy, SuppressorConfig};
pub use controller::{AdaptiveController, AdaptiveState, Phase, RetuneEvent};
pub use detector::{Candidates, FeedbackCandidate, HowlingDetector};
pub use notch::{NotchCoeffs, NotchFilter};
pub use session::FeedbackSuppressor;
pub use spectrum::{SpectrumAnalyzer, SpectrumFrame};
