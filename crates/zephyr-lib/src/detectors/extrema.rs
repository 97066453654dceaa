/// Indices where the slope of `y` changes sign: local minima and maxima,
/// undistinguished. Flat runs count as their own slope sign, so entering or
/// leaving a plateau is reported too.
pub fn turning_points(y: &[f64]) -> Vec<usize> {
    let slopes: Vec<i8> = y.windows(2).map(|w| slope_sign(w[1] - w[0])).collect();
    slopes
        .windows(2)
        .enumerate()
        .filter(|(_, s)| s[0] != s[1])
        .map(|(i, _)| i + 1)
        .collect()
}

fn slope_sign(d: f64) -> i8 {
    if d > 0.0 {
        1
    } else if d < 0.0 {
        -1
    } else {
        0
    }
}
