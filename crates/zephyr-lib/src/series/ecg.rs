use crate::config::Retention;
use crate::signal::{SampleBuffer, SignalKind};
use std::ops::Deref;

/// Raw ECG waveform, 4 ms between samples. Stored for display only.
#[derive(Debug, Clone)]
pub struct EcgSeries {
    buffer: SampleBuffer,
}

impl EcgSeries {
    pub fn new(retention: Retention) -> Self {
        Self {
            buffer: SampleBuffer::new(SignalKind::Ecg, retention),
        }
    }

    pub fn add_ecg(&mut self, values: &[f64]) {
        self.buffer.extend(values.iter().copied());
    }

    pub fn set_start_time(&mut self) {
        self.buffer.set_start_time();
    }

    pub fn buffer_mut(&mut self) -> &mut SampleBuffer {
        &mut self.buffer
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Deref for EcgSeries {
    type Target = SampleBuffer;

    fn deref(&self) -> &SampleBuffer {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_are_four_ms_apart() {
        let mut ecg = EcgSeries::new(Retention::Unbounded);
        ecg.add_ecg(&[512.0, 530.0, 610.0]);
        assert_eq!(ecg.len(), 3);
        assert_eq!(ecg.sample_times().to_vec(), vec![0.0, 4.0, 8.0]);
        assert_eq!(ecg.cumulative_time(), 12.0);
    }
}
