use crate::config::Retention;
use crate::error::{AnalysisError, AnalysisResult};
use crate::metrics::detrend::Detrender;
use crate::metrics::hrv::{lomb_spectrum, sample_std, BandPowers, LombSpectrum};
use crate::signal::{History, SampleBuffer, SignalKind};
use serde::Serialize;
use std::ops::Deref;

/// Fewest intervals for which SDNN is attempted.
pub const MIN_SDNN_SAMPLES: usize = 3;
/// Fewest intervals for which the periodogram is attempted.
pub const MIN_PERIODOGRAM_SAMPLES: usize = 11;

/// Beat-to-beat (RR) intervals in milliseconds. Each interval is also its own
/// nominal duration, so sample time is the cumulative beat time.
#[derive(Debug, Clone)]
pub struct BeatIntervalSeries {
    buffer: SampleBuffer,
    sdnn: History,
    spectrum: LombSpectrum,
    detrender: Detrender,
}

#[derive(Debug, Clone, Serialize)]
pub struct BeatIntervalSnapshot {
    pub count: usize,
    pub window_start: usize,
    pub last_interval_ms: Option<f64>,
    pub sdnn: History,
    pub spectrum: LombSpectrum,
}

impl BeatIntervalSeries {
    pub fn new(retention: Retention) -> Self {
        Self::with_detrender(retention, Detrender::default())
    }

    pub fn with_detrender(retention: Retention, detrender: Detrender) -> Self {
        Self {
            buffer: SampleBuffer::new(SignalKind::BeatInterval, retention),
            sdnn: History::new(retention),
            spectrum: LombSpectrum::default(),
            detrender,
        }
    }

    pub fn add_interval(&mut self, duration_ms: f64) {
        self.buffer.add(duration_ms, duration_ms);
    }

    pub fn set_start_time(&mut self) {
        self.buffer.set_start_time();
    }

    pub fn buffer_mut(&mut self) -> &mut SampleBuffer {
        &mut self.buffer
    }

    pub fn window_index(&mut self, window_s: f64) -> AnalysisResult<usize> {
        self.buffer.window_index(window_s)
    }

    /// Standard deviation (N−1) of the settled intervals from `window_index`
    /// on, appended to the SDNN history. The newest interval is provisional
    /// and left out.
    pub fn compute_sdnn(&mut self, window_index: usize, detrend: bool) -> AnalysisResult<f64> {
        let len = self.buffer.len();
        if len < MIN_SDNN_SAMPLES {
            return Err(AnalysisError::insufficient(MIN_SDNN_SAMPLES, len));
        }
        let values = self.window_values(window_index, detrend)?;
        let sd = sample_std(&values).ok_or_else(|| AnalysisError::insufficient(2, values.len()))?;
        self.sdnn.push(sd);
        Ok(sd)
    }

    /// Lomb–Scargle spectrum and VLF/LF/HF powers of the settled intervals
    /// from `window_index` on. Earlier results are kept when this fails.
    pub fn compute_periodogram(
        &mut self,
        window_index: usize,
        detrend: bool,
    ) -> AnalysisResult<&LombSpectrum> {
        let len = self.buffer.len();
        if len < MIN_PERIODOGRAM_SAMPLES {
            return Err(AnalysisError::insufficient(MIN_PERIODOGRAM_SAMPLES, len));
        }
        let range = self.buffer.settled_range(window_index)?;
        let times = self.buffer.sample_times().slice(range);
        let values = self.window_values(window_index, detrend)?;
        self.spectrum = lomb_spectrum(&times, &values)?;
        Ok(&self.spectrum)
    }

    /// Settled window values, optionally detrended. Detrending runs over the
    /// whole window including the provisional interval, which is dropped
    /// afterwards.
    fn window_values(&self, window_index: usize, detrend: bool) -> AnalysisResult<Vec<f64>> {
        let range = self.buffer.settled_range(window_index)?;
        if !detrend {
            return Ok(self.buffer.values().slice(range));
        }
        let span = self.buffer.values().slice(range.start..self.buffer.len());
        let mut stationary = self.detrender.detrend(&span)?;
        stationary.truncate(range.len());
        Ok(stationary)
    }

    pub fn sdnn(&self) -> &History {
        &self.sdnn
    }

    pub fn spectrum(&self) -> &LombSpectrum {
        &self.spectrum
    }

    pub fn psd_freq(&self) -> &[f64] {
        &self.spectrum.freqs
    }

    pub fn psd_mag(&self) -> &[f64] {
        &self.spectrum.magnitudes
    }

    pub fn bands(&self) -> BandPowers {
        self.spectrum.bands
    }

    pub fn vlf(&self) -> f64 {
        self.spectrum.bands.vlf
    }

    pub fn lf(&self) -> f64 {
        self.spectrum.bands.lf
    }

    pub fn hf(&self) -> f64 {
        self.spectrum.bands.hf
    }

    pub fn snapshot(&self) -> BeatIntervalSnapshot {
        BeatIntervalSnapshot {
            count: self.buffer.len(),
            window_start: self.buffer.start_index(),
            last_interval_ms: self.buffer.values().last(),
            sdnn: self.sdnn.clone(),
            spectrum: self.spectrum.clone(),
        }
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.sdnn.clear();
        self.spectrum = LombSpectrum::default();
    }
}

impl Deref for BeatIntervalSeries {
    type Target = SampleBuffer;

    fn deref(&self) -> &SampleBuffer {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series_with(intervals: &[f64]) -> BeatIntervalSeries {
        let mut rr = BeatIntervalSeries::new(Retention::Unbounded);
        rr.set_start_time();
        for &v in intervals {
            rr.add_interval(v);
        }
        rr
    }

    fn alternating(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| if i % 2 == 0 { 800.0 } else { 850.0 })
            .collect()
    }

    #[test]
    fn interval_is_its_own_duration() {
        let rr = series_with(&[800.0, 850.0, 900.0]);
        assert_eq!(rr.sample_times().to_vec(), vec![0.0, 800.0, 1650.0]);
        assert_eq!(rr.cumulative_time(), 2550.0);
    }

    #[test]
    fn two_intervals_give_insufficient_data() {
        let mut rr = series_with(&[800.0, 850.0]);
        let idx = rr.window_index(60.0).unwrap();
        assert_eq!(
            rr.compute_sdnn(idx, false),
            Err(AnalysisError::insufficient(3, 2))
        );
        assert!(rr.sdnn().is_empty());
    }

    #[test]
    fn sdnn_excludes_newest_interval() {
        let mut rr = series_with(&[800.0, 820.0, 840.0, 2000.0]);
        let idx = rr.window_index(60.0).unwrap();
        let sd = rr.compute_sdnn(idx, false).unwrap();
        assert!((sd - 20.0).abs() < 1e-12);
        assert_eq!(rr.sdnn().to_vec(), vec![sd]);
    }

    #[test]
    fn failed_sdnn_keeps_history() {
        let mut rr = series_with(&alternating(8));
        let idx = rr.window_index(60.0).unwrap();
        let sd = rr.compute_sdnn(idx, false).unwrap();
        let last = rr.len() - 1;
        assert_eq!(rr.compute_sdnn(last, false), Err(AnalysisError::EmptyWindow));
        assert_eq!(rr.sdnn().to_vec(), vec![sd]);
    }

    #[test]
    fn constant_series_has_zero_sdnn() {
        let mut rr = series_with(&[850.0; 12]);
        let idx = rr.window_index(60.0).unwrap();
        assert_eq!(rr.compute_sdnn(idx, false), Ok(0.0));
        let detrended = rr.compute_sdnn(idx, true).unwrap();
        assert!(detrended.abs() < 1e-6);
        assert_eq!(rr.sdnn().len(), 2);
    }

    #[test]
    fn periodogram_needs_eleven_intervals() {
        let mut rr = series_with(&alternating(10));
        let idx = rr.window_index(60.0).unwrap();
        assert_eq!(
            rr.compute_periodogram(idx, false).unwrap_err(),
            AnalysisError::insufficient(11, 10)
        );
        assert!(rr.psd_freq().is_empty());
        assert_eq!(rr.bands(), BandPowers::default());
    }

    #[test]
    fn alternating_intervals_produce_band_power() {
        let mut rr = BeatIntervalSeries::new(Retention::Unbounded);
        rr.set_start_time();
        for (i, v) in alternating(20).into_iter().enumerate() {
            rr.add_interval(v);
            let idx = rr.window_index(60.0).unwrap();
            let result = rr.compute_periodogram(idx, false);
            if i + 1 < 11 {
                assert!(result.is_err());
            } else {
                let spectrum = result.unwrap();
                assert_eq!(spectrum.samples, i);
            }
        }
        assert!(!rr.psd_freq().is_empty());
        assert_eq!(rr.psd_freq().len(), rr.psd_mag().len());
        assert!(rr.vlf() + rr.lf() + rr.hf() > 0.0);
    }

    #[test]
    fn failed_recompute_keeps_previous_spectrum() {
        let mut rr = series_with(&alternating(16));
        let idx = rr.window_index(60.0).unwrap();
        let before = rr.compute_periodogram(idx, false).unwrap().clone();
        // a window holding only the newest interval has nothing settled
        let last = rr.len() - 1;
        assert_eq!(
            rr.compute_periodogram(last, false).unwrap_err(),
            AnalysisError::EmptyWindow
        );
        assert_eq!(rr.psd_mag(), before.magnitudes.as_slice());
        assert_eq!(rr.bands(), before.bands);
    }

    #[test]
    fn detrended_periodogram_drops_drift() {
        let drifting: Vec<f64> = alternating(30)
            .iter()
            .enumerate()
            .map(|(i, v)| v + 5.0 * i as f64)
            .collect();
        let mut rr = series_with(&drifting);
        let idx = rr.window_index(120.0).unwrap();
        let raw_vlf = rr.compute_periodogram(idx, false).unwrap().bands.vlf;
        let detrended_vlf = rr.compute_periodogram(idx, true).unwrap().bands.vlf;
        assert!(detrended_vlf < raw_vlf);
    }

    #[test]
    fn window_limits_analysis_span() {
        let mut rr = series_with(&alternating(40));
        let idx = rr.window_index(10.0).unwrap();
        assert!(idx > 0);
        let spectrum = rr.compute_periodogram(idx, false).unwrap();
        assert_eq!(spectrum.samples, 40 - 1 - idx);
    }
}
