//! Depth to display conversion: clip each reading into the sand window and
//! map the resulting height through a color band or onto full-range gray.

use super::baseline::DepthBaseline;
use crate::error::{Result, SandboxError};
use crate::frame::{ColorFrame, DepthFrame, Gray16Frame};
use image::{Luma, Rgb};
use std::path::Path;

/// Maximum number of selectable color profiles.
pub const MAX_COLOR_PROFILES: usize = 10;

/// One-row lookup image, one column per millimetre of height.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorBand {
    colors: Vec<Rgb<u8>>,
}

impl ColorBand {
    /// Validate a band image against the height range.
    pub fn from_image(image: &ColorFrame, range: u32) -> Result<Self> {
        if image.height() != 1 {
            return Err(SandboxError::ColorBandRows(image.height()));
        }
        if image.width() != range {
            return Err(SandboxError::ColorBand {
                expected: range,
                actual: image.width(),
            });
        }
        Ok(Self {
            colors: image.pixels().copied().collect(),
        })
    }

    pub fn load(path: &Path, range: u32) -> Result<Self> {
        let image = image::open(path)?.into_rgb8();
        let band = Self::from_image(&image, range)?;
        log::info!("Loaded colorband {}", path.display());
        Ok(band)
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    #[inline]
    pub fn color(&self, height: u16) -> Rgb<u8> {
        self.colors[height as usize]
    }
}

/// Color bands loaded from `<prefix>0.png` to `<prefix>9.png`.
#[derive(Debug, Clone, Default)]
pub struct ColorProfiles {
    bands: Vec<ColorBand>,
}

impl ColorProfiles {
    pub fn new(bands: Vec<ColorBand>) -> Self {
        Self { bands }
    }

    /// Load every existing profile file. Missing numbers are skipped, an
    /// invalid band is fatal.
    pub fn load_prefix(prefix: &str, range: u32) -> Result<Self> {
        let mut bands = Vec::new();
        for n in 0..MAX_COLOR_PROFILES {
            let path = format!("{}{}.png", prefix, n);
            let path = Path::new(&path);
            if !path.exists() {
                log::debug!("No colorband at {}", path.display());
                continue;
            }
            bands.push(ColorBand::load(path, range)?);
        }

        if bands.is_empty() {
            log::warn!("No colorbands found for prefix {}, using grayscale", prefix);
        }
        Ok(Self { bands })
    }

    pub fn get(&self, index: usize) -> Option<&ColorBand> {
        self.bands.get(index)
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }
}

/// Displayable output of normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedFrame {
    Gray(Gray16Frame),
    Color(ColorFrame),
}

impl NormalizedFrame {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            NormalizedFrame::Gray(f) => f.dimensions(),
            NormalizedFrame::Color(f) => f.dimensions(),
        }
    }

    /// Invert every sample in place.
    pub fn invert(&mut self) {
        match self {
            NormalizedFrame::Gray(f) => f.iter_mut().for_each(|v| *v = u16::MAX - *v),
            NormalizedFrame::Color(f) => f.iter_mut().for_each(|v| *v = u8::MAX - *v),
        }
    }

    /// Color view of the frame, gray scaled down to 8 bits.
    pub fn to_color(&self) -> ColorFrame {
        match self {
            NormalizedFrame::Color(f) => f.clone(),
            NormalizedFrame::Gray(f) => ColorFrame::from_fn(f.width(), f.height(), |x, y| {
                let v = (f.get_pixel(x, y)[0] >> 8) as u8;
                Rgb([v, v, v])
            }),
        }
    }
}

/// Per-pixel clip, scale and colorize transform for one baseline.
#[derive(Debug, Clone)]
pub struct DepthNormalizer {
    baseline: DepthBaseline,
}

impl DepthNormalizer {
    /// Fails for a degenerate zero-height window.
    pub fn new(baseline: DepthBaseline) -> Result<Self> {
        if baseline.range() == 0 {
            return Err(SandboxError::Config(
                "Depth range is zero, maximum sand depth plus height must be positive".to_string(),
            ));
        }
        Ok(Self { baseline })
    }

    pub fn baseline(&self) -> &DepthBaseline {
        &self.baseline
    }

    pub fn normalize(&self, frame: &DepthFrame, band: Option<&ColorBand>) -> NormalizedFrame {
        match band {
            Some(band) => NormalizedFrame::Color(self.colorize(frame, band)),
            None => NormalizedFrame::Gray(self.grayscale(frame)),
        }
    }

    pub fn colorize(&self, frame: &DepthFrame, band: &ColorBand) -> ColorFrame {
        assert_eq!(
            band.len(),
            self.baseline.range() as usize,
            "colorband does not cover the depth range"
        );

        let mut output = ColorFrame::new(frame.width(), frame.height());
        for (out, raw) in output.pixels_mut().zip(frame.pixels()) {
            *out = band.color(self.baseline.height_of(raw[0]));
        }
        output
    }

    pub fn grayscale(&self, frame: &DepthFrame) -> Gray16Frame {
        let range = self.baseline.range();
        let mut output = Gray16Frame::new(frame.width(), frame.height());
        for (out, raw) in output.pixels_mut().zip(frame.pixels()) {
            let height = self.baseline.height_of(raw[0]) as u32;
            *out = Luma([(height * u16::MAX as u32 / range) as u16]);
        }
        output
    }
}

/// Normalize with a one-off normalizer.
pub fn normalize(
    frame: &DepthFrame,
    baseline: &DepthBaseline,
    band: Option<&ColorBand>,
) -> Result<NormalizedFrame> {
    Ok(DepthNormalizer::new(*baseline)?.normalize(frame, band))
}

/// Invert an output frame in place.
pub fn invert(frame: &mut NormalizedFrame) {
    frame.invert();
}
