pub mod config;
pub mod detectors;
pub mod error;
pub mod io;
pub mod measurement;
pub mod metrics;
pub mod router;
pub mod series;
pub mod session;
pub mod signal;
pub mod tracker;

pub use config::*;
pub use error::*;
pub use measurement::Measurement;
pub use router::{MeasurementRouter, RouterStats};
pub use series::*;
pub use session::*;
pub use signal::*;
pub use tracker::{AmplitudeTracker, TrackerStats};
