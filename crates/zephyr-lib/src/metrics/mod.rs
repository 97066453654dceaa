pub mod detrend;
pub mod hrv;
pub mod lomb;
pub mod welch;
