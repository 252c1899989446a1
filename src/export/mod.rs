//! Export module for frames and calibration results.

use crate::calibration::Transform;
use crate::depth::NormalizedFrame;
use crate::error::{Result, SandboxError};
use crate::frame::{ColorFrame, DepthFrame};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Serializable snapshot of a calibration result, for inspection only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformRecord {
    /// Row-major 3x3 homography, camera to display.
    pub matrix: Vec<f64>,
    pub display_width: u32,
    pub display_height: u32,
}

impl TransformRecord {
    pub fn new(transform: &Transform, display_width: u32, display_height: u32) -> Self {
        let m = transform.matrix();
        let matrix = (0..3)
            .flat_map(|r| (0..3).map(move |c| m[(r, c)]))
            .collect();
        Self {
            matrix,
            display_width,
            display_height,
        }
    }
}

/// Writes frames and calibration data to disk.
pub struct FrameExporter;

impl FrameExporter {
    /// Export a depth frame as 16-bit grayscale PNG.
    pub fn export_depth(frame: &DepthFrame, path: &Path) -> Result<()> {
        frame.save(path)?;
        Ok(())
    }

    /// Export a color frame as 8-bit RGB PNG.
    pub fn export_color(frame: &ColorFrame, path: &Path) -> Result<()> {
        frame.save(path)?;
        Ok(())
    }

    /// Export a normalized output frame, grayscale at 16 bits.
    pub fn export_output(frame: &NormalizedFrame, path: &Path) -> Result<()> {
        match frame {
            NormalizedFrame::Gray(gray) => gray.save(path)?,
            NormalizedFrame::Color(color) => color.save(path)?,
        }
        Ok(())
    }

    /// Export a calibration result to JSON.
    pub fn export_transform_json(record: &TransformRecord, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| SandboxError::Serialization(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Export a sequence of output frames as `output_<n>.png` into a directory.
    pub fn export_all_outputs(frames: &[NormalizedFrame], output_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(output_dir)?;

        for (i, frame) in frames.iter().enumerate() {
            let path = output_path(output_dir, i as u64);
            Self::export_output(frame, &path)?;
            log::debug!("Exported output frame: {}", path.display());
        }

        Ok(())
    }
}

/// File name used for the `index`-th exported output frame.
pub fn output_path(output_dir: &Path, index: u64) -> PathBuf {
    output_dir.join(format!("output_{:05}.png", index))
}

/// Record one color/depth frame pair for later replay.
pub fn record_frame_pair(
    dir: &Path,
    index: u64,
    color: &ColorFrame,
    depth: &DepthFrame,
) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    FrameExporter::export_color(color, &dir.join(format!("{}_color.png", index)))?;
    FrameExporter::export_depth(depth, &dir.join(format!("{}_depth.png", index)))?;
    Ok(())
}
