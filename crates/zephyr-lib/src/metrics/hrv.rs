use crate::error::{AnalysisError, AnalysisResult};
use crate::metrics::lomb::fast_lomb;
use serde::{Deserialize, Serialize};

/// Oversampling factor of the beat-interval periodogram.
pub const OVERSAMPLING: f64 = 4.0;
/// Highest frequency evaluated, as a multiple of the average Nyquist frequency.
pub const MAX_FREQUENCY_FACTOR: f64 = 2.0;

/// Autonomic frequency bands in Hz, each `(low, high]`.
pub const VLF_BAND: (f64, f64) = (0.0, 0.04);
pub const LF_BAND: (f64, f64) = (0.04, 0.15);
pub const HF_BAND: (f64, f64) = (0.15, 0.4);

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BandPowers {
    pub vlf: f64,
    pub lf: f64,
    pub hf: f64,
}

impl BandPowers {
    pub fn total(&self) -> f64 {
        self.vlf + self.lf + self.hf
    }

    pub fn lf_hf(&self) -> f64 {
        if self.hf > 0.0 {
            self.lf / self.hf
        } else {
            0.0
        }
    }
}

/// Beat-interval spectrum with its band aggregation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LombSpectrum {
    pub freqs: Vec<f64>,
    /// Power normalized to ms²/Hz, scaled by 1000.
    pub magnitudes: Vec<f64>,
    pub bands: BandPowers,
    /// Number of intervals that entered the estimate.
    pub samples: usize,
    pub peak_index: usize,
    pub false_alarm_probability: f64,
}

impl LombSpectrum {
    pub fn is_empty(&self) -> bool {
        self.freqs.is_empty()
    }
}

/// Bessel-corrected standard deviation; `None` below two samples.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    Some((values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0)).sqrt())
}

/// Sum the magnitudes falling in each band, scaled by 1000. A bin lands in
/// at most one band because the bands are disjoint half-open intervals.
pub fn band_powers(freqs: &[f64], magnitudes: &[f64]) -> BandPowers {
    let mut bands = BandPowers::default();
    for (&f, &m) in freqs.iter().zip(magnitudes) {
        if in_band(f, VLF_BAND) {
            bands.vlf += m;
        } else if in_band(f, LF_BAND) {
            bands.lf += m;
        } else if in_band(f, HF_BAND) {
            bands.hf += m;
        }
    }
    bands.vlf *= 1000.0;
    bands.lf *= 1000.0;
    bands.hf *= 1000.0;
    bands
}

fn in_band(f: f64, band: (f64, f64)) -> bool {
    band.0 < f && f <= band.1
}

/// Lomb–Scargle spectrum of beat intervals.
///
/// `times_ms` and `intervals_ms` are converted to seconds. The periodogram,
/// normalized by twice the variance, is rescaled by `4·pwr / nout` (`pwr`
/// being the Bessel-corrected variance of the intervals in seconds) and by
/// 1000, giving magnitudes comparable across window lengths.
pub fn lomb_spectrum(times_ms: &[f64], intervals_ms: &[f64]) -> AnalysisResult<LombSpectrum> {
    let x: Vec<f64> = times_ms.iter().map(|t| t / 1000.0).collect();
    let y: Vec<f64> = intervals_ms.iter().map(|v| v / 1000.0).collect();
    let pwr = sample_std(&y)
        .map(|sd| sd * sd)
        .ok_or_else(|| AnalysisError::insufficient(2, y.len()))?;
    let raw = fast_lomb(&x, &y, OVERSAMPLING, MAX_FREQUENCY_FACTOR)?;
    let nout = raw.nout as f64;
    let magnitudes: Vec<f64> = raw
        .power
        .iter()
        .map(|p| p / (nout / (4.0 * pwr)) * 1000.0)
        .map(|m| if m.is_finite() { m } else { 0.0 })
        .collect();
    let bands = band_powers(&raw.freqs, &magnitudes);
    Ok(LombSpectrum {
        freqs: raw.freqs,
        magnitudes,
        bands,
        samples: y.len(),
        peak_index: raw.peak_index,
        false_alarm_probability: raw.false_alarm_probability,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alternating(n: usize) -> (Vec<f64>, Vec<f64>) {
        let rr: Vec<f64> = (0..n)
            .map(|i| if i % 2 == 0 { 800.0 } else { 850.0 })
            .collect();
        let mut t = 0.0;
        let times = rr
            .iter()
            .map(|v| {
                let stamp = t;
                t += v;
                stamp
            })
            .collect();
        (times, rr)
    }

    #[test]
    fn sample_std_uses_n_minus_one() {
        assert_eq!(sample_std(&[1.0]), None);
        let sd = sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((sd - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!(sample_std(&[850.0; 6]), Some(0.0));
    }

    #[test]
    fn bands_are_right_inclusive_and_disjoint() {
        let freqs = [0.0, 0.04, 0.041, 0.15, 0.151, 0.4, 0.41];
        let mags = [1.0, 2.0, 4.0, 8.0, 16.0, 32.0, 64.0];
        let bands = band_powers(&freqs, &mags);
        assert_eq!(bands.vlf, 2.0 * 1000.0);
        assert_eq!(bands.lf, 12.0 * 1000.0);
        assert_eq!(bands.hf, 48.0 * 1000.0);
        // DC and everything above 0.4 Hz are left out
        assert_eq!(bands.total(), 62.0 * 1000.0);
    }

    #[test]
    fn alternating_intervals_peak_near_half_beat_rate() {
        let (times, rr) = alternating(40);
        let spectrum = lomb_spectrum(&times, &rr).unwrap();
        assert_eq!(spectrum.samples, 40);
        let peak = spectrum.freqs[spectrum.peak_index];
        // one full cycle every 1.65 s
        assert!((peak - 1.0 / 1.65).abs() < 0.02, "peak at {peak}");
        assert!(spectrum.bands.total() > 0.0);
    }

    #[test]
    fn single_interval_is_insufficient() {
        assert_eq!(
            lomb_spectrum(&[0.0], &[800.0]).unwrap_err(),
            AnalysisError::insufficient(2, 1)
        );
    }
}
