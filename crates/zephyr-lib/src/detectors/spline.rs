use crate::error::{AnalysisError, AnalysisResult};
use nalgebra::{DMatrix, DVector};

const MAX_BRACKET_STEPS: usize = 40;
const MAX_BISECTIONS: usize = 100;

/// Natural cubic spline, smoothed until its squared residual meets a budget.
#[derive(Debug, Clone)]
pub struct SmoothingSpline {
    /// Knot abscissae relative to `origin`.
    knots: Vec<f64>,
    origin: f64,
    /// Fitted values at the knots.
    values: Vec<f64>,
    /// Second derivatives at the knots (zero at both ends).
    curvature: Vec<f64>,
}

impl SmoothingSpline {
    /// Fit `(x, y)`; `x` must be strictly increasing with at least 3 points.
    /// `smoothing <= 0` interpolates the data.
    pub fn fit(x: &[f64], y: &[f64], smoothing: f64) -> AnalysisResult<Self> {
        let n = x.len();
        if n != y.len() {
            return Err(AnalysisError::InvalidInput(format!(
                "spline abscissa/ordinate length mismatch: {} vs {}",
                n,
                y.len()
            )));
        }
        if n < 3 {
            return Err(AnalysisError::insufficient(3, n));
        }
        if x.iter().chain(y).any(|v| !v.is_finite()) {
            return Err(AnalysisError::InvalidInput(
                "spline input contains non-finite values".into(),
            ));
        }
        if x.windows(2).any(|w| w[1] <= w[0]) {
            return Err(AnalysisError::InvalidInput(
                "spline abscissae must be strictly increasing".into(),
            ));
        }
        let origin = x[0];
        let knots: Vec<f64> = x.iter().map(|v| v - origin).collect();
        let system = SplineSystem::new(&knots, y);

        if smoothing <= 0.0 {
            let (values, gamma) = system.solve(0.0)?;
            return Ok(Self::from_parts(knots, origin, values, &gamma));
        }

        let (line_values, line_rss) = least_squares_line(&knots, y);
        if line_rss <= smoothing {
            let curvature = vec![0.0; n];
            return Ok(Self {
                knots,
                origin,
                values: line_values,
                curvature,
            });
        }

        // residual(lo) <= S <= residual(hi)
        let mut lo = 1.0;
        let mut hi = 1.0;
        if system.residual(1.0)? < smoothing {
            for _ in 0..MAX_BRACKET_STEPS {
                lo = hi;
                hi *= 10.0;
                if system.residual(hi)? >= smoothing {
                    break;
                }
            }
        } else {
            for _ in 0..MAX_BRACKET_STEPS {
                hi = lo;
                lo /= 10.0;
                if system.residual(lo)? <= smoothing {
                    break;
                }
            }
        }
        let mut alpha = hi;
        for _ in 0..MAX_BISECTIONS {
            let mid = (lo * hi).sqrt();
            let rss = system.residual(mid)?;
            alpha = mid;
            if (rss - smoothing).abs() <= 1e-9 * smoothing || hi / lo < 1.0 + 1e-12 {
                break;
            }
            if rss < smoothing {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        let (values, gamma) = system.solve(alpha)?;
        Ok(Self::from_parts(knots, origin, values, &gamma))
    }

    fn from_parts(knots: Vec<f64>, origin: f64, values: DVector<f64>, gamma: &DVector<f64>) -> Self {
        let mut curvature = Vec::with_capacity(knots.len());
        curvature.push(0.0);
        curvature.extend(gamma.iter().copied());
        curvature.push(0.0);
        Self {
            knots,
            origin,
            values: values.iter().copied().collect(),
            curvature,
        }
    }

    pub fn end(&self) -> f64 {
        self.origin + self.knots[self.knots.len() - 1]
    }

    /// Fitted values at the input abscissae.
    pub fn fitted(&self) -> &[f64] {
        &self.values
    }

    pub fn evaluate(&self, at: f64) -> f64 {
        let t = at - self.origin;
        let last = self.knots.len() - 2;
        let i = self.knots.partition_point(|&k| k <= t).saturating_sub(1).min(last);
        let (xl, xr) = (self.knots[i], self.knots[i + 1]);
        let h = xr - xl;
        let (gl, gr) = (self.values[i], self.values[i + 1]);
        let (cl, cr) = (self.curvature[i], self.curvature[i + 1]);
        let dl = t - xl;
        let dr = xr - t;
        (dl * gr + dr * gl) / h - dl * dr / 6.0 * ((1.0 + dl / h) * cr + (1.0 + dr / h) * cl)
    }

    /// Sample the spline on `start, start + step, …` up to but excluding the
    /// last knot.
    pub fn resample(&self, step: f64) -> (Vec<f64>, Vec<f64>) {
        if step.is_nan() || step <= 0.0 {
            return (Vec::new(), Vec::new());
        }
        let span = self.knots[self.knots.len() - 1];
        let count = (span / step).ceil() as usize;
        let times: Vec<f64> = (0..count).map(|k| self.origin + k as f64 * step).collect();
        let values = times.iter().map(|&t| self.evaluate(t)).collect();
        (times, values)
    }
}

struct SplineSystem {
    q: DMatrix<f64>,
    r: DMatrix<f64>,
    qtq: DMatrix<f64>,
    qty: DVector<f64>,
    y: DVector<f64>,
}

impl SplineSystem {
    fn new(knots: &[f64], y: &[f64]) -> Self {
        let n = knots.len();
        let m = n - 2;
        let h: Vec<f64> = knots.windows(2).map(|w| w[1] - w[0]).collect();
        let mut q = DMatrix::<f64>::zeros(n, m);
        let mut r = DMatrix::<f64>::zeros(m, m);
        for c in 0..m {
            let i = c + 1;
            q[(i - 1, c)] = 1.0 / h[i - 1];
            q[(i, c)] = -1.0 / h[i - 1] - 1.0 / h[i];
            q[(i + 1, c)] = 1.0 / h[i];
            r[(c, c)] = (h[i - 1] + h[i]) / 3.0;
            if c + 1 < m {
                r[(c, c + 1)] = h[i] / 6.0;
                r[(c + 1, c)] = h[i] / 6.0;
            }
        }
        let y = DVector::from_column_slice(y);
        let qt = q.transpose();
        let qtq = &qt * &q;
        let qty = &qt * &y;
        Self { q, r, qtq, qty, y }
    }

    /// Knot values and interior second derivatives for penalty weight `alpha`.
    fn solve(&self, alpha: f64) -> AnalysisResult<(DVector<f64>, DVector<f64>)> {
        let a = &self.r + &self.qtq * alpha;
        let gamma = a
            .cholesky()
            .ok_or_else(|| AnalysisError::InvalidInput("spline system is singular".into()))?
            .solve(&self.qty);
        let values = &self.y - (&self.q * &gamma) * alpha;
        Ok((values, gamma))
    }

    fn residual(&self, alpha: f64) -> AnalysisResult<f64> {
        let (values, _) = self.solve(alpha)?;
        Ok((&values - &self.y).norm_squared())
    }
}

fn least_squares_line(x: &[f64], y: &[f64]) -> (Vec<f64>, f64) {
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;
    let sxx: f64 = x.iter().map(|v| (v - mean_x).powi(2)).sum();
    let sxy: f64 = x.iter().zip(y).map(|(a, b)| (a - mean_x) * (b - mean_y)).sum();
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    let fitted: Vec<f64> = x.iter().map(|v| mean_y + slope * (v - mean_x)).collect();
    let rss = fitted.iter().zip(y).map(|(f, v)| (f - v).powi(2)).sum();
    (fitted, rss)
}
