use crate::error::{AnalysisError, AnalysisResult};
use nalgebra::{DMatrix, DVector};

pub const DEFAULT_LAMBDA: f64 = 50.0;

/// High-pass filter removing slow drift from an interval series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detrender {
    pub lambda: f64,
}

impl Default for Detrender {
    fn default() -> Self {
        Self {
            lambda: DEFAULT_LAMBDA,
        }
    }
}

impl Detrender {
    pub fn new(lambda: f64) -> Self {
        Self { lambda }
    }

    /// Stationary component of `z`. Series shorter than three samples have no
    /// second difference and are returned unchanged.
    pub fn detrend(&self, z: &[f64]) -> AnalysisResult<Vec<f64>> {
        let t = z.len();
        if t < 3 {
            return Ok(z.to_vec());
        }
        if z.iter().any(|v| !v.is_finite()) {
            return Err(AnalysisError::InvalidInput(
                "detrend input contains non-finite values".into(),
            ));
        }
        let mut d2 = DMatrix::<f64>::zeros(t - 2, t);
        for i in 0..t - 2 {
            d2[(i, i)] = 1.0;
            d2[(i, i + 1)] = -2.0;
            d2[(i, i + 2)] = 1.0;
        }
        let mut system = d2.transpose() * &d2 * (self.lambda * self.lambda);
        for i in 0..t {
            system[(i, i)] += 1.0;
        }
        let trend = system
            .cholesky()
            .ok_or_else(|| {
                AnalysisError::InvalidInput("detrend system is not positive definite".into())
            })?
            .solve(&DVector::from_column_slice(z));
        Ok(z.iter().zip(trend.iter()).map(|(v, tr)| v - tr).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_series_pass_through() {
        let d = Detrender::default();
        assert_eq!(d.detrend(&[]).unwrap(), Vec::<f64>::new());
        assert_eq!(d.detrend(&[800.0, 820.0]).unwrap(), vec![800.0, 820.0]);
    }

    #[test]
    fn constant_and_linear_series_detrend_to_zero() {
        let d = Detrender::default();
        let constant = vec![850.0; 30];
        assert!(d.detrend(&constant).unwrap().iter().all(|v| v.abs() < 1e-6));
        let ramp: Vec<f64> = (0..30).map(|i| 700.0 + 3.0 * i as f64).collect();
        assert!(d.detrend(&ramp).unwrap().iter().all(|v| v.abs() < 1e-6));
    }

    #[test]
    fn fast_oscillation_survives_drift_removal() {
        let d = Detrender::default();
        let n = 40;
        let alternating: Vec<f64> = (0..n)
            .map(|i| if i % 2 == 0 { 10.0 } else { -10.0 })
            .collect();
        let drifting: Vec<f64> = alternating
            .iter()
            .enumerate()
            .map(|(i, a)| 800.0 + 2.5 * i as f64 + a)
            .collect();
        let out = d.detrend(&drifting).unwrap();
        for (got, want) in out.iter().zip(&alternating) {
            assert_eq!(got.signum(), want.signum());
            assert!((got - want).abs() < 2.0, "got {got}, want {want}");
        }
    }

    #[test]
    fn rejects_nan() {
        let d = Detrender::default();
        assert!(matches!(
            d.detrend(&[1.0, f64::NAN, 2.0]),
            Err(AnalysisError::InvalidInput(_))
        ));
    }
}
