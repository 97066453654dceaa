pub mod measurements;
pub mod text;

pub use measurements::{parse_measurements, read_measurements};
pub use text::{parse_f64_series, read_f64_series};
