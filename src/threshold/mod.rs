mod data;
mod detector;
mod labeler;

pub use data::{PredictionStore, Segment, ThresholdFile};
pub use detector::{Detector, Threshold};
pub use labeler::{write_labels, Labeler, SegmentLabel};

/// Default second derivative threshold for per-video detection.
///
/// The threshold is placed at the first point where the (smoothed) sorted score curve
/// starts bending upwards faster than this.
pub const DEFAULT_SECOND_DERIVATIVE_THRESHOLD: f32 = 0.01;

/// Default second derivative threshold for pooled detection.
///
/// The pooled curve is a low-degree polynomial fit, so any upward bend is significant.
pub const DEFAULT_POOLED_SECOND_DERIVATIVE_THRESHOLD: f32 = 0.0;

static THRESHOLD_FILE_EXT: &str = "thresholds.json";
