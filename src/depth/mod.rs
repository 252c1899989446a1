//! Depth baseline estimation and normalization.

mod baseline;
mod normalize;

pub use baseline::{sample_ground, DepthBaseline, GroundPlaneCalibrator};
pub use normalize::{
    invert, normalize, ColorBand, ColorProfiles, DepthNormalizer, NormalizedFrame,
    MAX_COLOR_PROFILES,
};
