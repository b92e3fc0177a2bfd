use anyhow::{Context, Result};
use std::path::Path;

/// Write mono 16-bit PCM as a WAV file.
pub fn write_wav(path: &Path, samples: &[i16], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file: {}", path.display()))?;
    let mut pcm = writer.get_i16_writer(samples.len() as u32);
    for &sample in samples {
        pcm.write_sample(sample);
    }
    pcm.flush().context("Failed to write samples")?;
    writer
        .finalize()
        .with_context(|| format!("Failed to finalize WAV file: {}", path.display()))?;

    log::info!(
        "Wrote {}: {} samples @ {}Hz",
        path.display(),
        samples.len(),
        sample_rate
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decode::decode_audio;

    #[test]
    fn written_file_decodes_back() {
        let path = std::env::temp_dir().join(format!("howlguard-wav-{}.wav", std::process::id()));
        let samples: Vec<i16> = (0..1600).map(|i| ((i % 64) * 512 - 16384) as i16).collect();

        write_wav(&path, &samples, 16000).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.len() as usize, samples.len());

        let decoded = decode_audio(&path).unwrap();
        assert_eq!(decoded.sample_rate, 16000);
        assert_eq!(decoded.samples, samples);

        std::fs::remove_file(&path).ok();
    }
}
