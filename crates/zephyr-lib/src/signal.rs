use crate::config::Retention;
use crate::error::{AnalysisError, AnalysisResult};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::VecDeque;
use std::ops::Range;
use std::time::{SystemTime, UNIX_EPOCH};

/// Append-only history of scalars. With bounded retention the oldest entry is
/// evicted once capacity is reached.
#[derive(Debug, Clone, Default)]
pub struct History {
    data: VecDeque<f64>,
    capacity: Option<usize>,
}

impl History {
    pub fn new(retention: Retention) -> Self {
        Self {
            data: VecDeque::new(),
            capacity: retention.capacity(),
        }
    }

    pub fn push(&mut self, value: f64) {
        if let Some(cap) = self.capacity {
            while self.data.len() >= cap {
                self.data.pop_front();
            }
        }
        self.data.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn last(&self) -> Option<f64> {
        self.data.back().copied()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.data.get(index).copied()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = f64> + ExactSizeIterator + '_ {
        self.data.iter().copied()
    }

    /// Copy of the entries in `range`, clamped to the stored length.
    pub fn slice(&self, range: Range<usize>) -> Vec<f64> {
        let end = range.end.min(self.data.len());
        let start = range.start.min(end);
        self.data.range(start..end).copied().collect()
    }

    /// The newest `n` entries, oldest first.
    pub fn tail(&self, n: usize) -> Vec<f64> {
        let len = self.data.len();
        self.slice(len.saturating_sub(n)..len)
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.data.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    fn partition_point<P: FnMut(&f64) -> bool>(&self, pred: P) -> usize {
        self.data.partition_point(pred)
    }
}

impl Serialize for History {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.data.iter())
    }
}

/// Nominal time advanced by one appended sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleSpacing {
    /// The value is itself a duration in milliseconds (beat intervals).
    SelfTimed,
    /// Fixed spacing in milliseconds.
    Fixed(f64),
}

impl SampleSpacing {
    pub fn duration_ms(&self, value: f64) -> f64 {
        match self {
            SampleSpacing::SelfTimed => value,
            SampleSpacing::Fixed(ms) => *ms,
        }
    }
}

/// Physiological signal carried by a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    BeatInterval,
    Respiration,
    Ecg,
}

impl SignalKind {
    pub fn spacing(&self) -> SampleSpacing {
        match self {
            SignalKind::BeatInterval => SampleSpacing::SelfTimed,
            // 18 Hz breathing waveform
            SignalKind::Respiration => SampleSpacing::Fixed(56.0),
            // 250 Hz ECG waveform
            SignalKind::Ecg => SampleSpacing::Fixed(4.0),
        }
    }
}

/// Samples paired with a synthetic sample time (ms, cumulative nominal
/// spacing) and a wall-clock time (s since epoch).
///
/// The three histories always have the same length and sample times never
/// decrease.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    kind: SignalKind,
    values: History,
    sample_time: History,
    real_time: History,
    start_time: f64,
    cumulative_time: f64,
    start_index: usize,
}

impl SampleBuffer {
    pub fn new(kind: SignalKind, retention: Retention) -> Self {
        Self {
            kind,
            values: History::new(retention),
            sample_time: History::new(retention),
            real_time: History::new(retention),
            start_time: 0.0,
            cumulative_time: 0.0,
            start_index: 0,
        }
    }

    /// Record wall-clock now as the origin of `real_time`.
    pub fn set_start_time(&mut self) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        self.set_start_time_at(now);
    }

    pub fn set_start_time_at(&mut self, epoch_seconds: f64) {
        self.start_time = epoch_seconds;
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn cumulative_time(&self) -> f64 {
        self.cumulative_time
    }

    /// Append `value` stamped with the current cumulative time, then advance
    /// the clock by `nominal_duration_ms` (negative durations count as zero).
    pub fn add(&mut self, value: f64, nominal_duration_ms: f64) {
        self.values.push(value);
        self.sample_time.push(self.cumulative_time);
        self.real_time
            .push(self.start_time + self.cumulative_time / 1000.0);
        self.cumulative_time += nominal_duration_ms.max(0.0);
    }

    /// Append using the spacing policy of this buffer's signal kind.
    pub fn push(&mut self, value: f64) {
        let duration = self.kind.spacing().duration_ms(value);
        self.add(value, duration);
    }

    pub fn extend<I: IntoIterator<Item = f64>>(&mut self, values: I) {
        for value in values {
            self.push(value);
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &History {
        &self.values
    }

    pub fn sample_times(&self) -> &History {
        &self.sample_time
    }

    pub fn real_times(&self) -> &History {
        &self.real_time
    }

    /// First index whose sample time lies within `window_s` seconds of the
    /// newest sample. The result is also kept as [`Self::start_index`].
    ///
    /// A window wider than the elapsed recording yields 0. An empty buffer or
    /// a non-positive window has no sample inside it.
    pub fn window_index(&mut self, window_s: f64) -> AnalysisResult<usize> {
        let last = self.sample_time.last().ok_or(AnalysisError::EmptyWindow)?;
        if window_s.is_nan() || window_s <= 0.0 {
            return Err(AnalysisError::EmptyWindow);
        }
        let threshold = last - window_s * 1000.0;
        let idx = self.sample_time.partition_point(|&t| t <= threshold);
        if idx >= self.len() {
            return Err(AnalysisError::EmptyWindow);
        }
        self.start_index = idx;
        Ok(idx)
    }

    /// Index found by the most recent successful [`Self::window_index`].
    pub fn start_index(&self) -> usize {
        self.start_index
    }

    /// Analysis range for a window starting at `start`: the newest sample is
    /// provisional and always left out.
    pub fn settled_range(&self, start: usize) -> AnalysisResult<Range<usize>> {
        let end = self.len().saturating_sub(1);
        if start >= end {
            return Err(AnalysisError::EmptyWindow);
        }
        Ok(start..end)
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.sample_time.clear();
        self.real_time.clear();
        self.start_time = 0.0;
        self.cumulative_time = 0.0;
        self.start_index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(kind: SignalKind) -> SampleBuffer {
        let mut buf = SampleBuffer::new(kind, Retention::Unbounded);
        buf.set_start_time_at(1_000.0);
        buf
    }

    #[test]
    fn add_stamps_before_advancing_clock() {
        let mut buf = buffer(SignalKind::BeatInterval);
        buf.push(750.0);
        buf.push(850.0);
        assert_eq!(buf.sample_times().to_vec(), vec![0.0, 750.0]);
        assert_eq!(buf.real_times().to_vec(), vec![1_000.0, 1_000.75]);
        assert_eq!(buf.cumulative_time(), 1_600.0);
    }

    #[test]
    fn histories_stay_aligned_and_sorted() {
        let mut buf = buffer(SignalKind::Respiration);
        buf.extend((0..40).map(|i| i as f64));
        buf.add(1.0, -5.0);
        buf.add(2.0, 0.0);
        buf.push(3.0);
        assert_eq!(buf.len(), buf.sample_times().len());
        assert_eq!(buf.len(), buf.real_times().len());
        let times = buf.sample_times().to_vec();
        assert!(times.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn window_wider_than_recording_starts_at_zero() {
        let mut buf = buffer(SignalKind::Ecg);
        buf.extend([0.1, 0.2, 0.3]);
        assert_eq!(buf.window_index(60.0), Ok(0));
    }

    #[test]
    fn window_index_excludes_samples_on_the_boundary() {
        let mut buf = buffer(SignalKind::BeatInterval);
        // sample times: 0, 1000, 2000, 3000, 4000
        buf.extend([1_000.0; 5]);
        assert_eq!(buf.window_index(2.0), Ok(3));
        assert_eq!(buf.start_index(), 3);
        assert_eq!(buf.window_index(2.5), Ok(2));
    }

    #[test]
    fn empty_buffer_has_no_window() {
        let mut buf = buffer(SignalKind::BeatInterval);
        assert_eq!(buf.window_index(60.0), Err(AnalysisError::EmptyWindow));
        buf.push(900.0);
        assert_eq!(buf.window_index(0.0), Err(AnalysisError::EmptyWindow));
    }

    #[test]
    fn settled_range_drops_newest_sample() {
        let mut buf = buffer(SignalKind::BeatInterval);
        buf.extend([800.0, 810.0, 820.0]);
        assert_eq!(buf.settled_range(0), Ok(0..2));
        assert_eq!(buf.settled_range(2), Err(AnalysisError::EmptyWindow));
    }

    #[test]
    fn bounded_retention_evicts_oldest() {
        let mut buf = SampleBuffer::new(SignalKind::Ecg, Retention::Bounded(3));
        buf.extend([1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(buf.values().to_vec(), vec![3.0, 4.0, 5.0]);
        assert_eq!(buf.sample_times().to_vec(), vec![8.0, 12.0, 16.0]);
        assert_eq!(buf.window_index(1.0), Ok(0));
    }

    #[test]
    fn clear_resets_clock() {
        let mut buf = buffer(SignalKind::Respiration);
        buf.extend([1.0, 2.0]);
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.cumulative_time(), 0.0);
        assert_eq!(buf.start_time(), 0.0);
    }
}
