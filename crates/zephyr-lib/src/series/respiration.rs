use crate::config::Retention;
use crate::detectors::extrema::turning_points;
use crate::detectors::spline::SmoothingSpline;
use crate::error::{AnalysisError, AnalysisResult};
use crate::metrics::welch::{welch, WelchSpectrum};
use crate::signal::{History, SampleBuffer, SignalKind};
use serde::Serialize;
use std::ops::Deref;

/// Nominal breathing sample rate used for spectral estimates.
pub const BREATHING_RATE_HZ: f64 = 18.0;
/// Raw points handed to the smoothing spline.
pub const INTERPOLATION_POINTS: usize = 50;
/// Resampling step of the interpolated breathing signal, in seconds.
pub const INTERPOLATION_STEP_S: f64 = 1.0 / 16.0;
/// Extrema closer than this (seconds) to the previous one are dropped.
pub const MIN_EXTREMUM_SPACING_S: f64 = 1.0;

/// Breathing waveform sampled at about 18 Hz, with its Welch spectrum and the
/// extrema/amplitudes recovered by the tracker.
#[derive(Debug, Clone)]
pub struct RespirationSeries {
    buffer: SampleBuffer,
    psd: WelchSpectrum,
    extremum_time: History,
    extremum_value: History,
    amplitude: History,
    last_extremum_time: Option<f64>,
    generation: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RespirationSnapshot {
    pub count: usize,
    pub window_start: usize,
    pub psd: WelchSpectrum,
    pub dominant_frequency: Option<f64>,
    pub extremum_time: History,
    pub extremum_value: History,
    pub amplitude: History,
}

impl RespirationSeries {
    pub fn new(retention: Retention) -> Self {
        Self {
            buffer: SampleBuffer::new(SignalKind::Respiration, retention),
            psd: WelchSpectrum::default(),
            extremum_time: History::new(retention),
            extremum_value: History::new(retention),
            amplitude: History::new(retention),
            last_extremum_time: None,
            generation: 0,
        }
    }

    pub fn add_breath(&mut self, value: f64) {
        self.buffer.push(value);
    }

    pub fn add_breaths(&mut self, values: &[f64]) {
        self.buffer.extend(values.iter().copied());
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

    /// Welch PSD of the newest `window_s · 18` samples as one segment.
    pub fn compute_welch(&mut self, window_s: usize) -> AnalysisResult<&WelchSpectrum> {
        let needed = window_s
            .checked_mul(BREATHING_RATE_HZ as usize)
            .ok_or_else(|| {
                AnalysisError::InvalidInput(format!("welch window of {window_s} s is too long"))
            })?;
        let len = self.buffer.len();
        if needed == 0 || len < needed {
            return Err(AnalysisError::insufficient(needed.max(1), len));
        }
        let segment = self.buffer.values().tail(needed);
        self.psd = welch(&segment, BREATHING_RATE_HZ, needed)?;
        Ok(&self.psd)
    }

    /// The newest `n` (real time, value) pairs.
    pub fn recent_points(&self, n: usize) -> (Vec<f64>, Vec<f64>) {
        (self.buffer.real_times().tail(n), self.buffer.values().tail(n))
    }

    /// Smoothing-spline interpolation of the newest 50 samples on a 1/16 s
    /// grid.
    pub fn interpolate_recent(&self, smoothing: f64) -> AnalysisResult<(Vec<f64>, Vec<f64>)> {
        let len = self.buffer.len();
        if len < INTERPOLATION_POINTS {
            return Err(AnalysisError::insufficient(INTERPOLATION_POINTS, len));
        }
        let (x, y) = self.recent_points(INTERPOLATION_POINTS);
        interpolate_points(&x, &y, smoothing)
    }

    /// Record the turning points of the interpolated `(x, y)`. The first call
    /// takes every turning point; later calls only take points more than one
    /// second after the last accepted extremum. Returns how many were taken.
    pub fn update_extrema(&mut self, x: &[f64], y: &[f64]) -> usize {
        let first_batch = self.last_extremum_time.is_none();
        let mut accepted = 0;
        for i in turning_points(y) {
            let (Some(&t), Some(&v)) = (x.get(i), y.get(i)) else {
                continue;
            };
            if !first_batch {
                if let Some(last) = self.last_extremum_time {
                    if t <= last + MIN_EXTREMUM_SPACING_S {
                        continue;
                    }
                }
            }
            if let Some(previous) = self.extremum_value.last() {
                self.amplitude.push((v - previous).abs());
            }
            self.extremum_time.push(t);
            self.extremum_value.push(v);
            self.last_extremum_time = Some(t);
            accepted += 1;
        }
        accepted
    }

    /// One tracker step: interpolate the recent signal and update extrema.
    /// Needs more than 50 samples.
    pub fn track_once(&mut self, smoothing: f64) -> AnalysisResult<usize> {
        let len = self.buffer.len();
        if len <= INTERPOLATION_POINTS {
            return Err(AnalysisError::insufficient(INTERPOLATION_POINTS + 1, len));
        }
        let (x, y) = self.interpolate_recent(smoothing)?;
        Ok(self.update_extrema(&x, &y))
    }

    pub fn psd(&self) -> &WelchSpectrum {
        &self.psd
    }

    pub fn psd_freq(&self) -> &[f64] {
        &self.psd.freqs
    }

    pub fn psd_mag(&self) -> &[f64] {
        &self.psd.magnitudes
    }

    pub fn extremum_time(&self) -> &History {
        &self.extremum_time
    }

    pub fn extremum_value(&self) -> &History {
        &self.extremum_value
    }

    pub fn amplitude(&self) -> &History {
        &self.amplitude
    }

    pub fn last_extremum_time(&self) -> Option<f64> {
        self.last_extremum_time
    }

    /// Bumped by every [`Self::clear`].
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn extremum_count(&self) -> usize {
        self.extremum_time.len()
    }

    pub fn snapshot(&self) -> RespirationSnapshot {
        RespirationSnapshot {
            count: self.buffer.len(),
            window_start: self.buffer.start_index(),
            psd: self.psd.clone(),
            dominant_frequency: self.psd.dominant_frequency(),
            extremum_time: self.extremum_time.clone(),
            extremum_value: self.extremum_value.clone(),
            amplitude: self.amplitude.clone(),
        }
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.psd = WelchSpectrum::default();
        self.extremum_time.clear();
        self.extremum_value.clear();
        self.amplitude.clear();
        self.last_extremum_time = None;
        self.generation = self.generation.wrapping_add(1);
    }
}

impl Deref for RespirationSeries {
    type Target = SampleBuffer;

    fn deref(&self) -> &SampleBuffer {
        &self.buffer
    }
}

/// Fit a smoothing spline through `(x, y)` and resample it every 1/16 s.
pub fn interpolate_points(
    x: &[f64],
    y: &[f64],
    smoothing: f64,
) -> AnalysisResult<(Vec<f64>, Vec<f64>)> {
    let spline = SmoothingSpline::fit(x, y, smoothing)?;
    Ok(spline.resample(INTERPOLATION_STEP_S))
}
