use thiserror::Error;

/// Rejected suppressor configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("sample rate must be positive")]
    ZeroSampleRate,
    #[error("fft size {0} must be even and at least 8")]
    InvalidFftSize(usize),
    #[error("band count {0} must be between 1 and {max}", max = crate::suppress::MAX_BANDS)]
    InvalidBandCount(usize),
    #[error("search band {min_freq}-{max_freq} Hz must cover at least one bin between {low_hz} and {high_hz} Hz")]
    InvalidSearchBand {
        min_freq: f32,
        max_freq: f32,
        low_hz: f32,
        high_hz: f32,
    },
    #[error("Q bounds must satisfy 0 < q_min <= q_default <= q_max (got {q_min}, {q_default}, {q_max})")]
    InvalidQBounds {
        q_min: f32,
        q_default: f32,
        q_max: f32,
    },
    #[error("{name} must be positive and finite (got {value})")]
    NonPositive { name: &'static str, value: f32 },
    #[error("adapt interval {adapt_interval} is shorter than the fft size {fft_size}")]
    AdaptIntervalTooShort {
        adapt_interval: usize,
        fft_size: usize,
    },
    #[error("smooth interval must be at least one sample")]
    ZeroSmoothInterval,
    #[error("{name} {value} is out of range {range}")]
    RatioOutOfRange {
        name: &'static str,
        value: f32,
        range: &'static str,
    },
}
