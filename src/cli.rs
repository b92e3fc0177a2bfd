use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use howlguard::suppress::{DetectionMode, RetunePolicy, SuppressorConfig};

#[derive(Parser, Debug)]
#[command(name = "howlguard", about = "Adaptive acoustic feedback suppressor")]
pub struct Cli {
    /// Input audio files (WAV, MP3, FLAC, OGG)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output WAV file (only with a single input)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory for `<name>.suppressed.wav` outputs
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Config file (defaults to howlguard.toml or the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write every retune as a JSON line to this file
    #[arg(long)]
    pub events: Option<PathBuf>,

    /// Samples handed to the suppressor per callback
    #[arg(long)]
    pub block_size: Option<usize>,

    /// Number of cascaded notch bands (1-3)
    #[arg(long)]
    pub bands: Option<usize>,

    /// Peak detection strategy
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// How detected tones are assigned to bands
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// Minimum tonal level classified as feedback (dB)
    #[arg(long, allow_hyphen_values = true)]
    pub threshold_db: Option<f32>,

    /// Lower edge of the feedback search band (Hz)
    #[arg(long)]
    pub min_freq: Option<f32>,

    /// Upper edge of the feedback search band (Hz)
    #[arg(long)]
    pub max_freq: Option<f32>,

    /// Analysis FFT length
    #[arg(long)]
    pub fft_size: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Single,
    Multi,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    Hysteresis,
    Reassign,
}

impl From<ModeArg> for DetectionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Single => DetectionMode::SinglePeak,
            ModeArg::Multi => DetectionMode::MultiPeak,
        }
    }
}

impl From<PolicyArg> for RetunePolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::Hysteresis => RetunePolicy::Hysteresis,
            PolicyArg::Reassign => RetunePolicy::Reassign,
        }
    }
}

impl Cli {
    /// Overwrite config values with the flags that were given explicitly.
    pub fn apply_overrides(&self, config: &mut SuppressorConfig) {
        if let Some(bands) = self.bands {
            config.band_count = bands;
        }
        if let Some(mode) = self.mode {
            config.detection = mode.into();
        }
        if let Some(policy) = self.policy {
            config.retune_policy = policy.into();
        }
        if let Some(threshold_db) = self.threshold_db {
            config.threshold_db = threshold_db;
        }
        if let Some(min_freq) = self.min_freq {
            config.min_freq = min_freq;
        }
        if let Some(max_freq) = self.max_freq {
            config.max_freq = max_freq;
        }
        if let Some(fft_size) = self.fft_size {
            config.fft_size = fft_size;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_only_when_given() {
        let cli = Cli::try_parse_from([
            "howlguard",
            "in.wav",
            "--bands",
            "3",
            "--mode",
            "multi",
            "--threshold-db",
            "-40",
        ])
        .unwrap();

        let mut config = SuppressorConfig {
            max_freq: 6000.0,
            ..Default::default()
        };
        cli.apply_overrides(&mut config);

        assert_eq!(config.band_count, 3);
        assert_eq!(config.detection, DetectionMode::MultiPeak);
        assert_eq!(config.threshold_db, -40.0);
        assert_eq!(config.max_freq, 6000.0);
        assert_eq!(config.retune_policy, RetunePolicy::Hysteresis);
    }

    #[test]
    fn requires_an_input() {
        assert!(Cli::try_parse_from(["howlguard"]).is_err());
    }

    #[test]
    fn accepts_several_inputs() {
        let cli = Cli::try_parse_from(["howlguard", "a.wav", "b.flac", "--policy", "reassign"])
            .unwrap();
        assert_eq!(cli.inputs.len(), 2);
        assert_eq!(cli.policy, Some(PolicyArg::Reassign));
    }
}
