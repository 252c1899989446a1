//! Display-space rendering: perspective warp and calibration patterns.

mod pattern;
mod warp;

pub use pattern::{draw_ring, fill_disc, MarkerPattern};
pub use warp::{warp_perspective, GeometricRectifier};
