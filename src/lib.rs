//! Augmented-reality sandbox projector.
//!
//! A depth camera looks down into a sandbox and a projector paints the sand
//! with a height map. The crate covers:
//! - Camera to projector calibration (manual clicks, projected markers,
//!   corner detection) producing a perspective transform
//! - Ground plane estimation of the box bottom
//! - Temporal smoothing of depth frames
//! - Height normalization through color bands
//! - A treasure hunt overlay

pub mod calibration;
pub mod camera;
pub mod config;
pub mod depth;
pub mod error;
pub mod export;
pub mod filter;
pub mod frame;
pub mod pipeline;
pub mod render;
pub mod treasure;

pub use error::{Result, SandboxError};
