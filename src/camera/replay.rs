//! Playback of recorded frame pairs.
//!
//! A recording directory holds `<n>_color.png` (8-bit RGB) and
//! `<n>_depth.png` (16-bit grayscale, millimetres) files as written by
//! [`crate::export::record_frame_pair`]. Frames are replayed in index order
//! and wrap around at the end.

use super::FrameSource;
use crate::error::{Result, SandboxError};
use crate::frame::{ColorFrame, DepthFrame};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const COLOR_SUFFIX: &str = "_color.png";
const DEPTH_SUFFIX: &str = "_depth.png";

#[derive(Debug, Default, Clone)]
struct RecordedFrame {
    color: Option<PathBuf>,
    depth: Option<PathBuf>,
}

/// Frame source backed by a directory of recorded frames.
#[derive(Debug)]
pub struct ReplaySource {
    frames: Vec<RecordedFrame>,
    current: Option<usize>,
    frame_count: u64,
}

impl ReplaySource {
    /// Index the recordings in `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        let mut indexed: BTreeMap<u64, RecordedFrame> = BTreeMap::new();

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            if let Some(index) = parse_index(name, COLOR_SUFFIX) {
                indexed.entry(index).or_default().color = Some(path.clone());
            } else if let Some(index) = parse_index(name, DEPTH_SUFFIX) {
                indexed.entry(index).or_default().depth = Some(path.clone());
            }
        }

        if indexed.is_empty() {
            return Err(SandboxError::Acquisition(format!(
                "No recorded frames found in {}",
                dir.display()
            )));
        }

        log::info!(
            "Replay source: {} recorded frame(s) in {}",
            indexed.len(),
            dir.display()
        );

        Ok(Self {
            frames: indexed.into_values().collect(),
            current: None,
            frame_count: 0,
        })
    }

    /// Number of recorded frame sets.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames grabbed so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn current_frame(&self) -> Result<&RecordedFrame> {
        self.current
            .and_then(|i| self.frames.get(i))
            .ok_or_else(|| SandboxError::Acquisition("Retrieve called before grab".to_string()))
    }
}

impl FrameSource for ReplaySource {
    fn grab(&mut self) -> Result<()> {
        if self.frames.is_empty() {
            return Err(SandboxError::Acquisition("Replay source is empty".to_string()));
        }
        let next = self.current.map(|i| (i + 1) % self.frames.len()).unwrap_or(0);
        self.current = Some(next);
        self.frame_count += 1;
        Ok(())
    }

    fn retrieve_color(&mut self) -> Result<ColorFrame> {
        let path = self.current_frame()?.color.clone().ok_or_else(|| {
            SandboxError::Acquisition("Recorded frame has no color channel".to_string())
        })?;
        let image = image::open(&path).map_err(|e| {
            SandboxError::Acquisition(format!("Failed to retrieve {}: {}", path.display(), e))
        })?;
        Ok(image.into_rgb8())
    }

    fn retrieve_depth(&mut self) -> Result<DepthFrame> {
        let path = self.current_frame()?.depth.clone().ok_or_else(|| {
            SandboxError::Acquisition("Recorded frame has no depth channel".to_string())
        })?;
        let image = image::open(&path).map_err(|e| {
            SandboxError::Acquisition(format!("Failed to retrieve {}: {}", path.display(), e))
        })?;
        Ok(image.into_luma16())
    }
}

fn parse_index(name: &str, suffix: &str) -> Option<u64> {
    name.strip_suffix(suffix)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::record_frame_pair;
    use crate::frame::uniform_depth;
    use image::Rgb;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sandbox_replay_{}_{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_parse_index() {
        assert_eq!(parse_index("12_depth.png", DEPTH_SUFFIX), Some(12));
        assert_eq!(parse_index("12_color.png", DEPTH_SUFFIX), None);
        assert_eq!(parse_index("x_depth.png", DEPTH_SUFFIX), None);
    }

    #[test]
    fn test_replay_cycles_recorded_frames() {
        let dir = temp_dir("cycle");
        for (i, mm) in [700u16, 650, 600].iter().enumerate() {
            let color = ColorFrame::from_pixel(6, 4, Rgb([i as u8, 0, 0]));
            record_frame_pair(&dir, i as u64, &color, &uniform_depth(6, 4, *mm)).unwrap();
        }

        let mut source = ReplaySource::open(&dir).unwrap();
        assert_eq!(source.len(), 3);

        let depths: Vec<u16> = (0..4)
            .map(|_| source.grab_depth().unwrap().get_pixel(0, 0)[0])
            .collect();
        assert_eq!(depths, vec![700, 650, 600, 700]);

        let color = source.retrieve_color().unwrap();
        assert_eq!(color.get_pixel(1, 1), &Rgb([0, 0, 0]));
        assert_eq!(source.frame_count(), 4);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_empty_directory_is_acquisition_error() {
        let dir = temp_dir("empty");
        assert!(matches!(
            ReplaySource::open(&dir),
            Err(SandboxError::Acquisition(_))
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_retrieve_before_grab_fails() {
        let dir = temp_dir("nograb");
        record_frame_pair(&dir, 0, &ColorFrame::new(2, 2), &uniform_depth(2, 2, 1)).unwrap();
        let mut source = ReplaySource::open(&dir).unwrap();
        assert!(source.retrieve_depth().is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
