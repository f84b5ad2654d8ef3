use thiserror::Error;

/// Error types for the compartment-fit library.
#[derive(Error, Debug)]
pub enum FitError {
    /// A fitter was assembled inconsistently, e.g. a parameter vector whose
    /// length does not match the declared compartments. Fatal to that fitter.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error indicating a mismatch in vector or matrix dimensions.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// A single optimization run broke down (singular normal equations,
    /// non-finite cost). Recovered locally by the callers.
    #[error("Numerical failure: {0}")]
    NumericalFailure(String),

    /// Every run of a multi-run fit failed numerically.
    #[error("All {runs} optimization runs failed")]
    AllRunsFailed { runs: usize },

    /// An unexpected failure while fitting one voxel.
    #[error("Voxel {index} could not be processed: {reason}")]
    VoxelProcessing { index: usize, reason: String },

    /// Invalid input data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Error during objective evaluation.
    #[error("Function evaluation error: {0}")]
    FunctionEvaluation(String),

    /// Malformed bytes in an input stream.
    #[error("Format error: {0}")]
    Format(String),

    /// I/O error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FitError {
    /// Whether this error is one a multi-run fit may recover from by
    /// trying other start points.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FitError::NumericalFailure(_)
                | FitError::FunctionEvaluation(_)
                | FitError::AllRunsFailed { .. }
        )
    }
}

/// Result type alias for compartment-fit operations.
pub type Result<T> = std::result::Result<T, FitError>;
