use anyhow::{Context, Result};
use serde::Serialize;
use std::io::{BufWriter, Write};
use std::path::Path;

use howlguard::suppress::RetuneEvent;

#[derive(Serialize)]
struct EventRecord<'a> {
    input: &'a str,
    #[serde(flatten)]
    event: &'a RetuneEvent,
}

/// Write retune events as JSON lines, one object per event, tagged with the
/// input file they came from.
pub fn write_events<'a, I>(path: &Path, runs: I) -> Result<usize>
where
    I: IntoIterator<Item = (&'a Path, &'a [RetuneEvent])>,
{
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create event log: {}", path.display()))?;
    let mut out = BufWriter::new(file);
    let written = write_records(&mut out, runs)?;
    out.flush()
        .with_context(|| format!("Failed to write event log: {}", path.display()))?;

    log::info!("Wrote {} retune event(s) to {}", written, path.display());
    Ok(written)
}

fn write_records<'a, W, I>(out: &mut W, runs: I) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = (&'a Path, &'a [RetuneEvent])>,
{
    let mut written = 0;
    for (input, events) in runs {
        let input = input.to_string_lossy();
        for event in events {
            serde_json::to_writer(&mut *out, &EventRecord { input: &input, event })?;
            out.write_all(b"\n")?;
            written += 1;
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_line_per_event() {
        let events = [
            RetuneEvent {
                sample_index: 16000,
                band: 0,
                frequency_hz: 3000.0,
                q: 5.0,
                level_db: 100.0,
            },
            RetuneEvent {
                sample_index: 32000,
                band: 1,
                frequency_hz: 0.0,
                q: 3.0,
                level_db: 0.0,
            },
        ];
        let mut buf = Vec::new();
        let n = write_records(&mut buf, [(Path::new("talk.wav"), &events[..])]).unwrap();
        assert_eq!(n, 2);

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["input"], "talk.wav");
        assert_eq!(first["sample_index"], 16000);
        assert_eq!(first["band"], 0);
        assert_eq!(first["frequency_hz"], 3000.0);

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["band"], 1);
        assert_eq!(second["frequency_hz"], 0.0);
    }

    #[test]
    fn no_events_writes_nothing() {
        let none: [RetuneEvent; 0] = [];
        let mut buf = Vec::new();
        let n = write_records(&mut buf, [(Path::new("quiet.wav"), &none[..])]).unwrap();
        assert_eq!(n, 0);
        assert!(buf.is_empty());
    }
}
