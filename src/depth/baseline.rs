//! Box-bottom distance estimation.

use crate::config::SandboxConfig;
use crate::error::{Result, SandboxError};
use crate::frame::DepthFrame;

/// Samples per axis of the ground estimation grid.
const GRID: u32 = 16;

/// Depth window of the sand table, all values in millimetres.
///
/// Valid raw depth readings lie in `[top + 1, box_bottom_distance]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthBaseline {
    pub box_bottom_distance: u16,
    pub max_sand_depth: u16,
    pub max_sand_height: u16,
}

impl DepthBaseline {
    pub fn new(box_bottom_distance: u16, max_sand_depth: u16, max_sand_height: u16) -> Self {
        Self {
            box_bottom_distance,
            max_sand_depth,
            max_sand_height,
        }
    }

    /// Highest permitted sand surface distance minus one. May be negative
    /// when the box bottom is closer than the window is tall.
    pub fn top(&self) -> i32 {
        self.box_bottom_distance as i32 - self.max_sand_depth as i32 - self.max_sand_height as i32
    }

    /// Number of distinct heights, `box_bottom_distance - top`.
    pub fn range(&self) -> u32 {
        self.max_sand_depth as u32 + self.max_sand_height as u32
    }

    /// Normalized height of one raw reading, in `0..range`.
    #[inline]
    pub fn height_of(&self, raw: u16) -> u16 {
        let lower = (self.top() + 1).clamp(0, self.box_bottom_distance as i32) as u16;
        self.box_bottom_distance - raw.clamp(lower, self.box_bottom_distance)
    }
}

/// Determines the box-bottom distance once at startup.
#[derive(Debug, Clone)]
pub struct GroundPlaneCalibrator {
    max_sand_depth: u16,
    max_sand_height: u16,
    manual_sand_plane_distance: i32,
}

impl GroundPlaneCalibrator {
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            max_sand_depth: config.max_sand_depth,
            max_sand_height: config.max_sand_height,
            manual_sand_plane_distance: config.manual_sand_plane_distance,
        }
    }

    /// Baseline from the configured sand plane distance, if one is set.
    pub fn manual_baseline(&self) -> Result<Option<DepthBaseline>> {
        if self.manual_sand_plane_distance < 0 {
            return Ok(None);
        }

        log::info!(
            "Using manual settings for depth correction, sand level {}mm",
            self.manual_sand_plane_distance
        );
        let bottom = self.manual_sand_plane_distance as i64 + self.max_sand_depth as i64;
        self.baseline_at(bottom).map(Some)
    }

    /// Baseline for a rectified depth frame. A manual sand plane distance
    /// takes precedence over sampling.
    pub fn estimate_baseline(&self, frame: &DepthFrame) -> Result<DepthBaseline> {
        if let Some(baseline) = self.manual_baseline()? {
            return Ok(baseline);
        }

        let ground = sample_ground(frame);
        log::info!("Sandbox sand level estimated at: {}mm", ground);
        self.baseline_at(ground as i64 + self.max_sand_depth as i64)
    }

    fn baseline_at(&self, bottom: i64) -> Result<DepthBaseline> {
        let bottom = u16::try_from(bottom).map_err(|_| {
            SandboxError::Config(format!("Box bottom distance {}mm is out of range", bottom))
        })?;
        log::info!("Sandbox box bottom level estimated at: {}mm", bottom);
        Ok(DepthBaseline::new(bottom, self.max_sand_depth, self.max_sand_height))
    }
}

/// Truncating integer average of a 16x16 grid of evenly spaced samples.
pub fn sample_ground(frame: &DepthFrame) -> u16 {
    let (width, height) = frame.dimensions();
    assert!(width > 0 && height > 0, "cannot sample an empty depth frame");

    let mut sum = 0u64;
    for i in 0..GRID {
        let x = (i as u64 * width as u64 / GRID as u64) as u32;
        for j in 0..GRID {
            let y = (j as u64 * height as u64 / GRID as u64) as u32;
            sum += frame.get_pixel(x, y)[0] as u64;
        }
    }

    (sum / (GRID * GRID) as u64) as u16
}
