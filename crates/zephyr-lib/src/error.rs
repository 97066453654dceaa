use thiserror::Error;

/// Reasons an analysis step produced no output for the current tick.
///
/// None of these are fatal: callers skip the dependent computation and keep
/// whatever results were stored before.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("insufficient data: {available} samples available, {required} required")]
    InsufficientData { required: usize, available: usize },
    #[error("no data in window")]
    EmptyWindow,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("spectral transform failed: {0}")]
    Transform(String),
}

impl AnalysisError {
    pub fn insufficient(required: usize, available: usize) -> Self {
        Self::InsufficientData {
            required,
            available,
        }
    }
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
