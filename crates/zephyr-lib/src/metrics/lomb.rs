use crate::error::{AnalysisError, AnalysisResult};
use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};

/// Interpolation order used when spreading samples onto the FFT mesh.
const MACC: usize = 4;
const FACTORIALS: [f64; 11] = [
    0.0, 1.0, 1.0, 2.0, 6.0, 24.0, 120.0, 720.0, 5040.0, 40320.0, 362880.0,
];

/// Raw periodogram normalized by twice the sample variance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LombPeriodogram {
    pub freqs: Vec<f64>,
    pub power: Vec<f64>,
    /// Number of frequencies evaluated.
    pub nout: usize,
    /// Index of the strongest bin.
    pub peak_index: usize,
    /// False-alarm probability of the strongest bin under the null of pure noise.
    pub false_alarm_probability: f64,
}

/// Evaluate the periodogram of `(x, y)` at `nout = ⌊0.5·ofac·hifac·N⌋`
/// frequencies spaced `1 / (span·ofac)` apart, `hifac` times the average
/// Nyquist frequency at the top.
pub fn fast_lomb(x: &[f64], y: &[f64], ofac: f64, hifac: f64) -> AnalysisResult<LombPeriodogram> {
    let n = x.len();
    if n != y.len() {
        return Err(AnalysisError::InvalidInput(format!(
            "time/value length mismatch: {} vs {}",
            n,
            y.len()
        )));
    }
    if n < 2 {
        return Err(AnalysisError::insufficient(2, n));
    }
    let nf = n as f64;
    let nout = (0.5 * ofac * hifac * nf) as usize;
    if nout == 0 {
        return Err(AnalysisError::InvalidInput(
            "oversampling and frequency factors leave no output bins".into(),
        ));
    }
    let nfreqt = (ofac * hifac * nf * MACC as f64) as usize;
    let mut nfreq = 64usize;
    while nfreq < nfreqt {
        nfreq <<= 1;
    }
    let ndim = nfreq << 1;

    let ave = y.iter().sum::<f64>() / nf;
    let var = y.iter().map(|v| (v - ave).powi(2)).sum::<f64>() / (nf - 1.0);
    let xmin = x.iter().copied().fold(f64::INFINITY, f64::min);
    let xmax = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let xdif = xmax - xmin;
    if xdif.is_nan() || xdif <= 0.0 || !var.is_finite() {
        return Err(AnalysisError::InvalidInput(
            "sample times must span a positive, finite duration".into(),
        ));
    }
    let df = 1.0 / (xdif * ofac);
    let freqs: Vec<f64> = (1..=nout).map(|k| df * k as f64).collect();
    if var <= 0.0 {
        // A constant series carries no power at any frequency.
        return Ok(LombPeriodogram {
            freqs,
            power: vec![0.0; nout],
            nout,
            peak_index: 0,
            false_alarm_probability: 1.0,
        });
    }

    let mut wk1 = vec![0.0; ndim];
    let mut wk2 = vec![0.0; ndim];
    let fndim = ndim as f64;
    let fac = fndim / (xdif * ofac);
    for (&xj, &yj) in x.iter().zip(y) {
        let ck = ((xj - xmin) * fac) % fndim;
        let ckk = (2.0 * ck) % fndim;
        spread(yj - ave, &mut wk1, ck, MACC);
        spread(1.0, &mut wk2, ckk, MACC);
    }

    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(ndim);
    let mut sums1 = r2c.make_output_vec();
    let mut sums2 = r2c.make_output_vec();
    r2c.process(&mut wk1, &mut sums1)
        .map_err(|e| AnalysisError::Transform(e.to_string()))?;
    r2c.process(&mut wk2, &mut sums2)
        .map_err(|e| AnalysisError::Transform(e.to_string()))?;

    let mut power = Vec::with_capacity(nout);
    for k in 1..=nout {
        // forward FFT yields Σ cos − i Σ sin
        let (rwk1, iwk1) = (sums1[k].re, -sums1[k].im);
        let (rwk2, iwk2) = (sums2[k].re, -sums2[k].im);
        let hypo2 = 2.0 * rwk2.hypot(iwk2);
        let (hc2wt, hs2wt) = if hypo2 > 0.0 {
            (rwk2 / hypo2, iwk2 / hypo2)
        } else {
            (0.0, 0.0)
        };
        let cwt = (0.5 + hc2wt).max(0.0).sqrt();
        let swt = sign(hs2wt) * (0.5 - hc2wt).max(0.0).sqrt();
        let den = 0.5 * nf + hc2wt * rwk2 + hs2wt * iwk2;
        let cterm = if den > 0.0 {
            (cwt * rwk1 + swt * iwk1).powi(2) / den
        } else {
            0.0
        };
        let sterm = if nf - den > 0.0 {
            (cwt * iwk1 - swt * rwk1).powi(2) / (nf - den)
        } else {
            0.0
        };
        power.push((cterm + sterm) / (2.0 * var));
    }

    let (peak_index, pmax) = power
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, p)| {
            if p > best.1 {
                (i, p)
            } else {
                best
            }
        });
    let expy = (-pmax).exp();
    let effm = 2.0 * nout as f64 / ofac;
    let mut prob = effm * expy;
    if prob > 0.01 {
        prob = 1.0 - (1.0 - expy).powf(effm);
    }

    Ok(LombPeriodogram {
        freqs,
        power,
        nout,
        peak_index,
        false_alarm_probability: prob,
    })
}

/// Add `y` to `mesh` at fractional position `x` using Lagrange weights on
/// the `m` nearest nodes.
fn spread(y: f64, mesh: &mut [f64], x: f64, m: usize) {
    let n = mesh.len();
    let ix = x as usize;
    if x == ix as f64 {
        mesh[ix] += y;
        return;
    }
    let ilo = ((x - 0.5 * m as f64 + 1.0).floor().max(0.0) as usize).min(n - m);
    let ihi = ilo + m - 1;
    let mut nden = FACTORIALS[m];
    let mut fac = x - ilo as f64;
    for j in ilo + 1..=ihi {
        fac *= x - j as f64;
    }
    mesh[ihi] += y * fac / (nden * (x - ihi as f64));
    for j in (ilo..ihi).rev() {
        nden = (nden / (j + 1 - ilo) as f64) * (j as f64 - ihi as f64);
        mesh[j] += y * fac / (nden * (x - j as f64));
    }
}

fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}
