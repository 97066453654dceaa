use crate::error::{AnalysisError, AnalysisResult};
use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// One-sided power spectral density.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WelchSpectrum {
    pub freqs: Vec<f64>,
    pub magnitudes: Vec<f64>,
}

impl WelchSpectrum {
    pub fn is_empty(&self) -> bool {
        self.freqs.is_empty()
    }

    /// Frequency of the strongest non-DC bin.
    pub fn dominant_frequency(&self) -> Option<f64> {
        self.freqs
            .iter()
            .zip(&self.magnitudes)
            .skip(1)
            .fold(None, |best: Option<(f64, f64)>, (&f, &p)| match best {
                Some((_, bp)) if bp >= p => best,
                _ => Some((f, p)),
            })
            .map(|(f, _)| f)
    }
}

/// Welch PSD with a periodic Hann window, per-segment mean removal, 50 %
/// overlap and density scaling (units²/Hz). With `nperseg == signal.len()`
/// this is a single windowed periodogram.
pub fn welch(signal: &[f64], fs: f64, nperseg: usize) -> AnalysisResult<WelchSpectrum> {
    let n = signal.len();
    if nperseg < 2 {
        return Err(AnalysisError::InvalidInput(format!(
            "segment length must be at least 2, got {nperseg}"
        )));
    }
    if n < nperseg {
        return Err(AnalysisError::insufficient(nperseg, n));
    }
    if fs.is_nan() || fs <= 0.0 {
        return Err(AnalysisError::InvalidInput(format!(
            "sampling frequency must be positive, got {fs}"
        )));
    }
    let step = (nperseg / 2).max(1);
    let window = hann(nperseg);
    let scale = 1.0 / (fs * window.iter().map(|w| w * w).sum::<f64>());

    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(nperseg);
    let mut spectrum = r2c.make_output_vec();
    let bins = spectrum.len();
    let freqs: Vec<f64> = (0..bins).map(|k| k as f64 * fs / nperseg as f64).collect();
    let mut powers = vec![0.0; bins];
    let mut segments = 0usize;
    let mut pos = 0;
    while pos + nperseg <= n {
        let slice = &signal[pos..pos + nperseg];
        let mean = slice.iter().sum::<f64>() / nperseg as f64;
        let mut frame: Vec<f64> = slice
            .iter()
            .zip(&window)
            .map(|(x, w)| (x - mean) * w)
            .collect();
        r2c.process(&mut frame, &mut spectrum)
            .map_err(|e| AnalysisError::Transform(e.to_string()))?;
        for (k, val) in spectrum.iter().enumerate() {
            let one_sided = if k == 0 || (nperseg % 2 == 0 && k == bins - 1) {
                1.0
            } else {
                2.0
            };
            powers[k] += one_sided * val.norm_sqr() * scale;
        }
        segments += 1;
        pos += step;
    }
    for p in powers.iter_mut() {
        *p /= segments as f64;
    }
    Ok(WelchSpectrum {
        freqs,
        magnitudes: powers,
    })
}

fn hann(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / (size as f64)).cos()))
        .collect()
}
