mod audio;
mod cli;
mod config;
mod encode;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use audio::decode::AudioData;
use audio::pipeline::RunSummary;
use cli::Cli;
use config::Config;
use howlguard::suppress::RetuneEvent;
use howlguard::{FeedbackSuppressor, SuppressorConfig};

struct FileResult {
    input: PathBuf,
    output: PathBuf,
    events: Vec<RetuneEvent>,
    summary: RunSummary,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let config = match config::find_config(cli.config.clone()) {
        Some(path) => match config::load_config(&path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            Err(e) => {
                log::warn!("{:#}; using defaults", e);
                Config::default()
            }
        },
        None => Config::default(),
    };

    let mut suppressor = config.suppressor.clone();
    cli.apply_overrides(&mut suppressor);

    let block_size = cli.block_size.unwrap_or(config.output.block_size);
    if block_size == 0 {
        anyhow::bail!("Block size must be at least one sample");
    }
    if cli.output.is_some() && cli.inputs.len() > 1 {
        anyhow::bail!("--output can only be used with a single input");
    }
    for input in &cli.inputs {
        if !input.exists() {
            anyhow::bail!("Input file not found: {}", input.display());
        }
    }

    let output_dir = cli
        .output_dir
        .clone()
        .or_else(|| config.output.directory.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;

    log::info!("howlguard - adaptive feedback suppressor");
    log::info!(
        "{} input(s), {} band(s), {:?}/{:?}, block {} samples",
        cli.inputs.len(),
        suppressor.band_count,
        suppressor.detection,
        suppressor.retune_policy,
        block_size
    );

    // 1. Decode
    log::info!("Decoding audio...");
    let decoded: Vec<AudioData> = cli
        .inputs
        .par_iter()
        .map(|path| audio::decode::decode_audio(path))
        .collect::<Result<_>>()?;

    // 2. Suppress
    let total: u64 = decoded.iter().map(|a| a.samples.len() as u64).sum();
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} samples ({eta} remaining)")
            .context("Invalid progress bar template")?
            .progress_chars("=>-"),
    );

    let results: Vec<FileResult> = cli
        .inputs
        .par_iter()
        .zip(decoded.par_iter())
        .map(|(input, audio)| {
            let output = match &cli.output {
                Some(path) => path.clone(),
                None => output_dir.join(output_name(input)),
            };
            suppress_file(input, output, audio, &suppressor, block_size, &pb)
        })
        .collect::<Result<_>>()?;

    pb.finish_with_message("Suppression complete");

    // 3. Event log
    if let Some(path) = cli.events.as_ref().or(config.output.events.as_ref()) {
        encode::events::write_events(
            path,
            results.iter().map(|r| (r.input.as_path(), r.events.as_slice())),
        )?;
    }

    for result in &results {
        log_summary(result);
    }

    log::info!("Done! {} file(s) processed", results.len());
    Ok(())
}

fn suppress_file(
    input: &Path,
    output: PathBuf,
    audio: &AudioData,
    base: &SuppressorConfig,
    block_size: usize,
    pb: &ProgressBar,
) -> Result<FileResult> {
    let config = SuppressorConfig {
        sample_rate: audio.sample_rate,
        ..base.clone()
    };
    let mut session = FeedbackSuppressor::new(config)
        .with_context(|| format!("Invalid suppressor settings for {}", input.display()))?;

    let (filtered, events, summary) =
        audio::pipeline::run(&mut session, &audio.samples, block_size, |n| pb.inc(n as u64));

    encode::wav::write_wav(&output, &filtered, audio.sample_rate)?;

    Ok(FileResult {
        input: input.to_path_buf(),
        output,
        events,
        summary,
    })
}

/// `talk.mp3` becomes `talk.suppressed.wav`.
fn output_name(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    PathBuf::from(format!("{}.suppressed.wav", stem))
}

fn log_summary(result: &FileResult) {
    let s = &result.summary;
    log::info!(
        "{} -> {}: {:.1}s, {} tick(s), {} retune(s), {:.1} dBFS -> {:.1} dBFS",
        result.input.display(),
        result.output.display(),
        s.duration(),
        s.ticks,
        s.retunes,
        s.input_dbfs,
        s.output_dbfs
    );
    if s.dropped_events > 0 {
        log::warn!("{}: {} retune event(s) dropped", result.input.display(), s.dropped_events);
    }
    for (i, band) in s.bands.iter().enumerate() {
        if band.enabled {
            log::info!("  band {}: {:.0} Hz, Q {:.2}", i, band.frequency_hz, band.q);
        } else {
            log::info!("  band {}: idle", i);
        }
    }
}
