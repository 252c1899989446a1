//! Treasure hunt overlay.
//!
//! A treasure image is hidden at a random display position. Wherever the sand
//! above it has been dug down close to the box bottom, the treasure pixels
//! show through; once enough of it is uncovered it counts as found and the
//! output flashes inverted for a short while.

use crate::depth::{DepthBaseline, NormalizedFrame};
use crate::error::{Result, SandboxError};
use crate::frame::{ColorFrame, DepthFrame};
use image::{Luma, Pixel, Rgb};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;

/// Overlay color that is never painted.
pub const TRANSPARENT_KEY: Rgb<u8> = Rgb([255, 0, 255]);
pub const DEFAULT_DEPTH_THRESHOLD: u16 = 50;
pub const DEFAULT_COVERAGE_THRESHOLD: f64 = 0.7;
/// Frames the output flashes after a find.
pub const WIN_SHUFFLE_FRAMES: u32 = 30;

/// Paint the uncovered part of `overlay` at `top_left` onto `output` and
/// report whether the uncovered share reaches `coverage_threshold`.
///
/// A pixel is uncovered when its normalized height is at most
/// `depth_threshold` millimetres above the box bottom.
pub fn check_region(
    depth: &DepthFrame,
    output: &mut NormalizedFrame,
    overlay: &ColorFrame,
    top_left: (u32, u32),
    baseline: &DepthBaseline,
    depth_threshold: u16,
    coverage_threshold: f64,
) -> bool {
    assert_eq!(
        depth.dimensions(),
        output.dimensions(),
        "frame dimensions differ"
    );

    let (width, height) = depth.dimensions();
    let (left, top) = top_left;
    let mut uncovered = 0usize;

    for (ox, oy, pixel) in overlay.enumerate_pixels() {
        let (x, y) = (left + ox, top + oy);
        if x >= width || y >= height {
            continue;
        }
        if baseline.height_of(depth.get_pixel(x, y)[0]) > depth_threshold {
            continue;
        }

        uncovered += 1;
        if *pixel == TRANSPARENT_KEY {
            continue;
        }
        match output {
            NormalizedFrame::Color(frame) => frame.put_pixel(x, y, *pixel),
            NormalizedFrame::Gray(frame) => {
                let luma = pixel.to_luma()[0] as u16;
                frame.put_pixel(x, y, Luma([luma * 257]));
            }
        }
    }

    let total = overlay.width() as usize * overlay.height() as usize;
    total > 0 && uncovered as f64 / total as f64 >= coverage_threshold
}

/// Game state around one hidden treasure.
pub struct TreasureHunt {
    overlay: ColorFrame,
    display_width: u32,
    display_height: u32,
    position: (u32, u32),
    found: bool,
    shuffle: u32,
    depth_threshold: u16,
    coverage_threshold: f64,
    rng: StdRng,
}

impl TreasureHunt {
    pub fn load(path: &Path, display_width: u32, display_height: u32) -> Result<Self> {
        let overlay = image::open(path)?.into_rgb8();
        log::info!("Loaded treasure {}", path.display());
        Self::new(overlay, display_width, display_height, StdRng::from_os_rng())
    }

    /// The overlay must be smaller than the display on both axes.
    pub fn new(
        overlay: ColorFrame,
        display_width: u32,
        display_height: u32,
        rng: StdRng,
    ) -> Result<Self> {
        if overlay.width() == 0
            || overlay.height() == 0
            || overlay.width() >= display_width
            || overlay.height() >= display_height
        {
            return Err(SandboxError::Config(format!(
                "Treasure image {}x{} does not fit a {}x{} display",
                overlay.width(),
                overlay.height(),
                display_width,
                display_height
            )));
        }

        let mut hunt = Self {
            overlay,
            display_width,
            display_height,
            position: (0, 0),
            found: false,
            shuffle: 0,
            depth_threshold: DEFAULT_DEPTH_THRESHOLD,
            coverage_threshold: DEFAULT_COVERAGE_THRESHOLD,
            rng,
        };
        hunt.rehide();
        Ok(hunt)
    }

    pub fn with_thresholds(mut self, depth_threshold: u16, coverage_threshold: f64) -> Self {
        self.depth_threshold = depth_threshold;
        self.coverage_threshold = coverage_threshold;
        self
    }

    pub fn position(&self) -> (u32, u32) {
        self.position
    }

    pub fn is_found(&self) -> bool {
        self.found
    }

    /// Hide the treasure at a new random position.
    pub fn rehide(&mut self) {
        let x = self.rng.random_range(0..self.display_width - self.overlay.width());
        let y = self.rng.random_range(0..self.display_height - self.overlay.height());
        self.position = (x, y);
        self.found = false;
        self.shuffle = 0;
        log::info!("Find the treasure");
        log::debug!("Treasure hidden at {:?}", self.position);
    }

    /// Run one frame of the game on the rectified depth and its output.
    /// Returns `true` on the frame the treasure is first found.
    pub fn update(
        &mut self,
        depth: &DepthFrame,
        output: &mut NormalizedFrame,
        baseline: &DepthBaseline,
    ) -> bool {
        let uncovered = check_region(
            depth,
            output,
            &self.overlay,
            self.position,
            baseline,
            self.depth_threshold,
            self.coverage_threshold,
        );

        let newly_found = uncovered && !self.found;
        if newly_found {
            log::info!("You found the treasure, hide it again to continue");
            self.found = true;
            self.shuffle = WIN_SHUFFLE_FRAMES;
        }

        if self.shuffle > 0 {
            if self.shuffle % 10 < 5 {
                output.invert();
            }
            self.shuffle -= 1;
        }

        newly_found
    }
}
