use thiserror::Error;

/// Error taxonomy of the dynamics core. Configuration errors are fatal and
/// raised before the first step, evaluation errors are propagated to the
/// caller, numerical degeneracies are handled in place (logged, never fatal).
#[derive(Debug, Error)]
pub enum DynamicsError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("surface evaluation failed: {0}")]
    Evaluation(String),

    #[error("trajectory record unusable for restart: {0}")]
    Restart(String),

    #[error("linear algebra failure: {0}")]
    Linalg(#[from] ndarray_linalg::error::LinalgError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("serialization failure: {0}")]
    Serialization(String),
}

impl From<serde_yaml::Error> for DynamicsError {
    fn from(err: serde_yaml::Error) -> Self {
        DynamicsError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for DynamicsError {
    fn from(err: serde_json::Error) -> Self {
        DynamicsError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for DynamicsError {
    fn from(err: ndarray::ShapeError) -> Self {
        DynamicsError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DynamicsError>;
