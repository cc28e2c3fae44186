use std::path::PathBuf;

pub mod class_weight;
pub mod curve;
pub mod threshold;
pub mod util;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("prediction data not found at: {0:?}")]
    PredictionDataNotFound(PathBuf),
    #[error("video not found in prediction data: {0}")]
    VideoNotFound(String),
    #[error("invalid segment key: {0:?} (expected \"<index>_<name>\")")]
    InvalidSegmentKey(String),
    #[error("no scores to threshold")]
    EmptyScores,
    #[error("scores cannot be normalized: maximum is {0}")]
    DegenerateScores(f32),
    #[error("need at least {required} points, but only got {actual}")]
    InsufficientPoints { required: usize, actual: usize },
    #[error("window size must be a positive odd number, got {0}")]
    InvalidWindow(usize),
    #[error("window size {window} is too small for polynomial order {order}")]
    WindowTooSmall { window: usize, order: usize },
    #[error("least-squares system is singular")]
    SingularSystem,
    #[error("no classes provided")]
    NoClasses,
    #[error("label {0} is not one of the provided classes")]
    UnknownLabel(String),
    #[error("class {0} does not appear in the labels")]
    ClassNotPresent(String),
    #[error("bincode error: {0}")]
    BincodeError(#[from] bincode::Error),
    #[error("serde_json error: {0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
