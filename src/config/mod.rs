//! Configuration and serialization module.

use crate::error::{Result, SandboxError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Correspondence acquisition strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationStrategy {
    /// User clicks the four display corners.
    Manual,
    /// Projected disc markers located by circle detection.
    MarkerSequence,
    /// Corner response clusters of the lit display area.
    CornerCluster,
}

impl std::fmt::Display for CalibrationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalibrationStrategy::Manual => write!(f, "manual"),
            CalibrationStrategy::MarkerSequence => write!(f, "marker sequence"),
            CalibrationStrategy::CornerCluster => write!(f, "corner cluster"),
        }
    }
}

/// Temporal smoothing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalMode {
    #[default]
    None,
    Average,
    Median,
}

/// Temporal smoothing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalConfig {
    pub mode: TemporalMode,
    /// Ring buffer capacity in frames.
    pub depth: usize,
    /// Sampling interval inside the ring buffer.
    pub stride: usize,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            mode: TemporalMode::None,
            depth: 0,
            stride: 1,
        }
    }
}

impl TemporalConfig {
    /// Whether frames go through a temporal buffer at all.
    pub fn is_enabled(&self) -> bool {
        self.mode != TemporalMode::None && self.depth > 0
    }
}

/// Projected marker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    /// Marker disc radius in display pixels.
    pub radius: u32,
    /// Gap between the disc and the display border.
    pub border_distance: u32,
    /// Gaussian blur sigma applied before circle detection.
    pub blur_sigma: f32,
    /// Gradient magnitude treated as a circle edge.
    pub edge_threshold: f32,
    /// Minimum accumulator votes for a circle centre.
    pub accumulator_threshold: u32,
    /// Minimum circle radius searched, in camera pixels.
    pub min_radius: u32,
    /// Maximum circle radius searched (0 = frame size).
    pub max_radius: u32,
    /// Pause after a detection so the projector can switch markers.
    pub settle_time_ms: u64,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            radius: 150,
            border_distance: 25,
            blur_sigma: 2.0,
            edge_threshold: 200.0,
            accumulator_threshold: 100,
            min_radius: 3,
            max_radius: 0,
            settle_time_ms: 1000,
        }
    }
}

impl MarkerConfig {
    /// Offset of each marker centre from the display edges.
    pub fn inset(&self) -> u32 {
        self.radius + self.border_distance
    }

    pub fn settle_time(&self) -> Duration {
        Duration::from_millis(self.settle_time_ms)
    }
}

/// Corner cluster detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CornerConfig {
    /// Structure tensor window size.
    pub block_size: u32,
    /// Harris free parameter.
    pub k: f32,
    /// Threshold on the response normalized to 0..255.
    pub threshold: f32,
    /// Points closer than this on both axes merge into one corner.
    pub merge_distance: u32,
}

impl Default for CornerConfig {
    fn default() -> Self {
        Self {
            block_size: 4,
            k: 0.01,
            threshold: 70.0,
            merge_distance: 10,
        }
    }
}

/// Complete sandbox configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Projector output width.
    pub display_width: u32,
    /// Projector output height.
    pub display_height: u32,
    /// Maximum sand depth below the sand plane in mm.
    pub max_sand_depth: u16,
    /// Maximum sand height above the sand plane in mm.
    pub max_sand_height: u16,
    /// Sensor to sand plane distance in mm, negative for automatic estimation.
    pub manual_sand_plane_distance: i32,
    /// Strategies tried in order. Manual is always the last resort.
    pub calibration_order: Vec<CalibrationStrategy>,
    /// Wait for input events between calibration frames.
    pub poll_interval_ms: u64,
    /// Frames an automatic strategy may consume before giving up (None = until aborted).
    pub max_attempts: Option<usize>,
    pub marker: MarkerConfig,
    pub corners: CornerConfig,
    pub temporal: TemporalConfig,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            display_width: 1024,
            display_height: 768,
            max_sand_depth: 90,
            max_sand_height: 200,
            manual_sand_plane_distance: -1,
            calibration_order: vec![CalibrationStrategy::MarkerSequence],
            poll_interval_ms: 30,
            max_attempts: None,
            marker: MarkerConfig::default(),
            corners: CornerConfig::default(),
            temporal: TemporalConfig::default(),
        }
    }
}

impl SandboxConfig {
    /// Width of the valid depth window in mm.
    pub fn depth_range(&self) -> u32 {
        self.max_sand_depth as u32 + self.max_sand_height as u32
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Strategy chain with manual calibration appended as the final fallback.
    pub fn strategy_chain(&self) -> Vec<CalibrationStrategy> {
        let mut chain = Vec::with_capacity(self.calibration_order.len() + 1);
        for strategy in &self.calibration_order {
            if !chain.contains(strategy) {
                chain.push(*strategy);
            }
        }
        if !chain.contains(&CalibrationStrategy::Manual) {
            chain.push(CalibrationStrategy::Manual);
        }
        chain
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.display_width == 0 || self.display_height == 0 {
            return Err(SandboxError::Config(format!(
                "Invalid display size {}x{}",
                self.display_width, self.display_height
            )));
        }

        if self.depth_range() == 0 {
            return Err(SandboxError::Config(
                "Maximum sand depth plus height must be greater than zero".to_string(),
            ));
        }

        if self.temporal.stride == 0 {
            return Err(SandboxError::Config(
                "Temporal filter stride must be at least 1".to_string(),
            ));
        }

        if self.temporal.mode != TemporalMode::None && self.temporal.depth == 0 {
            return Err(SandboxError::Config(format!(
                "Temporal mode {:?} needs a buffer depth of at least 1",
                self.temporal.mode
            )));
        }

        if self.corners.block_size == 0 {
            return Err(SandboxError::Config(
                "Corner block size must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Load configuration, JSON for `.json` files and XML otherwise.
pub fn load_config(path: &Path) -> Result<SandboxConfig> {
    let contents = std::fs::read_to_string(path)?;

    let config: SandboxConfig = if path.extension().map(|e| e == "json").unwrap_or(false) {
        serde_json::from_str(&contents).map_err(|e| SandboxError::Serialization(e.to_string()))?
    } else {
        quick_xml::de::from_str(&contents)
            .map_err(|e| SandboxError::Serialization(e.to_string()))?
    };

    config.validate()?;
    Ok(config)
}

/// Write configuration as pretty JSON.
pub fn save_config(config: &SandboxConfig, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| SandboxError::Serialization(e.to_string()))?;
    std::fs::write(path, json)?;
    Ok(())
}
