pub mod beat;
pub mod ecg;
pub mod respiration;

pub use beat::BeatIntervalSeries;
pub use ecg::EcgSeries;
pub use respiration::RespirationSeries;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type Shared<T> = Arc<Mutex<T>>;

pub fn shared<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// Lock a series. A panic on another thread while holding the lock leaves
/// the data structurally valid, so poisoning is ignored.
pub fn lock<T>(series: &Mutex<T>) -> MutexGuard<'_, T> {
    series.lock().unwrap_or_else(PoisonError::into_inner)
}
