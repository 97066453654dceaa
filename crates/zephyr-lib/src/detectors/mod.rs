pub mod extrema;
pub mod spline;
