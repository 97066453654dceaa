use crate::measurement::Measurement;
use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct MeasurementRow {
    signal: String,
    /// One value, or a `;`-separated batch for waveform signals.
    value: String,
}

impl MeasurementRow {
    fn into_measurement(self) -> Result<Measurement> {
        let values = self
            .value
            .split(';')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| {
                v.parse::<f64>()
                    .with_context(|| format!("'{v}' is not a number"))
            })
            .collect::<Result<Vec<f64>>>()?;
        Ok(Measurement::from_named(self.signal.trim(), &values)?)
    }
}

/// Read a `signal,value` CSV recording in arrival order.
pub fn parse_measurements<R: Read>(reader: R) -> Result<Vec<Measurement>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .has_headers(true)
        .comment(Some(b'#'))
        .from_reader(reader);
    let mut out = Vec::new();
    for (idx, row) in reader.deserialize::<MeasurementRow>().enumerate() {
        let row = row.with_context(|| format!("parsing measurement row {}", idx + 1))?;
        let measurement = row
            .into_measurement()
            .with_context(|| format!("measurement row {}", idx + 1))?;
        out.push(measurement);
    }
    Ok(out)
}

pub fn read_measurements(path: &Path) -> Result<Vec<Measurement>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening measurements {}", path.display()))?;
    parse_measurements(file).with_context(|| format!("in {}", path.display()))
}
