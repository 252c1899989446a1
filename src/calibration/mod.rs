//! Calibration module: camera-to-display correspondence acquisition.

mod circles;
mod coordinator;
mod corners;
mod feedback;
mod gradient;
pub(crate) mod homography;
mod manual;
mod marker;

#[cfg(test)]
pub(crate) mod testing;

pub use circles::{Circle, CircleDetector};
pub use coordinator::{
    CalibrationCoordinator, CalibrationResult, CalibrationState, StrategyOutcome,
};
pub use corners::{
    display_corners, harris_response, merge_points, order_quad, CornerClusterStrategy,
    ResponseMap,
};
pub use feedback::{
    wait_for_abort, ChannelFeedback, FeedbackEvent, FeedbackSender, FeedbackSink, Surface,
};
pub use homography::{CorrespondencePair, Transform};
pub use manual::ManualStrategy;
pub use marker::MarkerSequenceStrategy;
