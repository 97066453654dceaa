use crate::error::{AnalysisError, AnalysisResult};
use serde::Serialize;

/// One event as delivered by the sensor link. Values are raw: RR intervals
/// are in (signed) seconds and may repeat, posture is an unsigned 16-bit
/// reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "signal", content = "value", rename_all = "snake_case")]
pub enum Measurement {
    Rr(f64),
    Breathing(Vec<f64>),
    Ecg(Vec<f64>),
    HeartRate(f64),
    RespirationRate(f64),
    BreathingWaveAmplitude(f64),
    Activity(f64),
    Posture(f64),
}

impl Measurement {
    /// Build a measurement from its signal name and value(s). Waveform
    /// signals take any non-empty batch, scalar signals exactly one value.
    pub fn from_named(name: &str, values: &[f64]) -> AnalysisResult<Self> {
        let batch = || {
            if values.is_empty() {
                Err(AnalysisError::InvalidInput(format!("{name}: empty sample batch")))
            } else {
                Ok(values.to_vec())
            }
        };
        let scalar = || match values {
            [v] => Ok(*v),
            _ => Err(AnalysisError::InvalidInput(format!(
                "{name}: expected one value, got {}",
                values.len()
            ))),
        };
        Ok(match name {
            "rr" => Measurement::Rr(scalar()?),
            "breathing" => Measurement::Breathing(batch()?),
            "ecg" => Measurement::Ecg(batch()?),
            "heart_rate" => Measurement::HeartRate(scalar()?),
            "respiration_rate" => Measurement::RespirationRate(scalar()?),
            "breathing_wave_amplitude" => Measurement::BreathingWaveAmplitude(scalar()?),
            "activity" => Measurement::Activity(scalar()?),
            "posture" => Measurement::Posture(scalar()?),
            other => {
                return Err(AnalysisError::InvalidInput(format!(
                    "unknown signal '{other}'"
                )))
            }
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Measurement::Rr(_) => "rr",
            Measurement::Breathing(_) => "breathing",
            Measurement::Ecg(_) => "ecg",
            Measurement::HeartRate(_) => "heart_rate",
            Measurement::RespirationRate(_) => "respiration_rate",
            Measurement::BreathingWaveAmplitude(_) => "breathing_wave_amplitude",
            Measurement::Activity(_) => "activity",
            Measurement::Posture(_) => "posture",
        }
    }
}

/// Posture arrives as an unsigned 16-bit word; readings above 180 degrees
/// are negative angles in two's complement.
pub fn posture_degrees(raw: f64) -> f64 {
    if raw > 180.0 {
        raw - 65536.0
    } else {
        raw
    }
}

/// Turns the repeated RR reports of the sensor into distinct intervals.
#[derive(Debug, Clone, Default)]
pub struct RrDeduplicator {
    previous: f64,
}

impl RrDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interval in whole milliseconds, or `None` when `raw_seconds` repeats
    /// the previous report.
    pub fn accept(&mut self, raw_seconds: f64) -> Option<f64> {
        if raw_seconds == self.previous {
            return None;
        }
        self.previous = raw_seconds;
        Some((raw_seconds.abs() * 1000.0).trunc())
    }

    pub fn reset(&mut self) {
        self.previous = 0.0;
    }
}
