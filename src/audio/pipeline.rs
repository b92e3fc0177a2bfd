use howlguard::suppress::{FeedbackSuppressor, RetuneEvent};

/// Final state of one band after a run.
#[derive(Clone, Debug, PartialEq)]
pub struct BandState {
    pub frequency_hz: f32,
    pub q: f32,
    pub enabled: bool,
}

/// What happened while one recording went through a session.
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub samples: usize,
    pub sample_rate: u32,
    pub ticks: u64,
    pub retunes: usize,
    pub dropped_events: u64,
    pub input_dbfs: f32,
    pub output_dbfs: f32,
    pub bands: Vec<BandState>,
}

impl RunSummary {
    pub fn duration(&self) -> f32 {
        self.samples as f32 / self.sample_rate as f32
    }
}

/// Feed `pcm` through `session` in `block_size` chunks, the way a capture
/// callback would, and return the filtered signal with the retune events.
///
/// `on_block` receives the number of samples just processed.
pub fn run(
    session: &mut FeedbackSuppressor,
    pcm: &[i16],
    block_size: usize,
    mut on_block: impl FnMut(usize),
) -> (Vec<i16>, Vec<RetuneEvent>, RunSummary) {
    let mut output = pcm.to_vec();
    let mut events = Vec::new();

    for block in output.chunks_mut(block_size.max(1)) {
        session.process_block(block);
        events.extend(session.drain_events());
        on_block(block.len());
    }

    let bands = session
        .bank()
        .bands()
        .iter()
        .map(|b| BandState {
            frequency_hz: b.freq_current(),
            q: b.q_current(),
            enabled: b.is_enabled(),
        })
        .collect();

    let summary = RunSummary {
        samples: pcm.len(),
        sample_rate: session.config().sample_rate,
        ticks: session.controller().ticks(),
        retunes: events.len(),
        dropped_events: session.dropped_events(),
        input_dbfs: level_dbfs(pcm),
        output_dbfs: level_dbfs(&output),
        bands,
    };

    (output, events, summary)
}

/// RMS level relative to 16-bit full scale.
pub fn level_dbfs(pcm: &[i16]) -> f32 {
    if pcm.is_empty() {
        return f32::NEG_INFINITY;
    }
    let mean_square = pcm.iter().map(|&s| (s as f64).powi(2)).sum::<f64>() / pcm.len() as f64;
    let rms = mean_square.sqrt() / 32768.0;
    if rms > 0.0 {
        (20.0 * rms.log10()) as f32
    } else {
        f32::NEG_INFINITY
    }
}
