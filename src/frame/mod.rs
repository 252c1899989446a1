//! Frame types passed between the capture, filter, warp and normalize stages.
//!
//! Frames are plain `image` buffers: an owned contiguous sample vector plus
//! width and height. Depth frames carry millimetres in 16-bit luma samples,
//! color frames carry 8-bit RGB.

use image::{ImageBuffer, Luma, Pixel, Rgb};

/// Depth map in millimetres.
pub type DepthFrame = ImageBuffer<Luma<u16>, Vec<u16>>;
/// 8-bit RGB camera or display frame.
pub type ColorFrame = ImageBuffer<Rgb<u8>, Vec<u8>>;
/// 8-bit intensity frame used by the detectors.
pub type GrayFrame = ImageBuffer<Luma<u8>, Vec<u8>>;
/// Full-range 16-bit intensity frame produced by grayscale normalization.
pub type Gray16Frame = ImageBuffer<Luma<u16>, Vec<u16>>;

/// Frame over any pixel type with a `Vec` backing store.
pub type Frame<P> = ImageBuffer<P, Vec<<P as Pixel>::Subpixel>>;

/// Scalar sample type stored in a frame channel.
pub trait Channel: image::Primitive + Ord + Send + Sync + 'static {
    fn to_f64(self) -> f64;

    /// Round and clamp into the channel's range.
    fn from_f64_saturating(value: f64) -> Self;
}

impl Channel for u8 {
    fn to_f64(self) -> f64 {
        self as f64
    }

    fn from_f64_saturating(value: f64) -> Self {
        value.round().clamp(0.0, u8::MAX as f64) as u8
    }
}

impl Channel for u16 {
    fn to_f64(self) -> f64 {
        self as f64
    }

    fn from_f64_saturating(value: f64) -> Self {
        value.round().clamp(0.0, u16::MAX as f64) as u16
    }
}

/// Panic unless two frames have identical dimensions.
///
/// Sample type equality is enforced by the type system; dimensions are a
/// caller contract.
pub fn assert_same_layout<P: Pixel>(expected: &Frame<P>, actual: &Frame<P>) {
    assert_eq!(
        expected.dimensions(),
        actual.dimensions(),
        "frame dimensions differ"
    );
}

/// Convert a color frame to intensity.
pub fn to_gray(frame: &ColorFrame) -> GrayFrame {
    image::imageops::grayscale(frame)
}

/// Depth frame filled with a single value.
pub fn uniform_depth(width: u32, height: u32, millimetres: u16) -> DepthFrame {
    DepthFrame::from_pixel(width, height, Luma([millimetres]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_saturation() {
        assert_eq!(u8::from_f64_saturating(300.0), 255);
        assert_eq!(u8::from_f64_saturating(-4.0), 0);
        assert_eq!(u16::from_f64_saturating(1234.4), 1234);
        assert_eq!(u16::from_f64_saturating(1234.6), 1235);
    }

    #[test]
    fn test_gray_conversion_keeps_size() {
        let color = ColorFrame::from_pixel(8, 4, Rgb([255, 255, 255]));
        let gray = to_gray(&color);
        assert_eq!(gray.dimensions(), (8, 4));
        assert_eq!(gray.get_pixel(3, 2)[0], 255);
    }

    #[test]
    #[should_panic(expected = "frame dimensions differ")]
    fn test_layout_mismatch_panics() {
        let a = uniform_depth(4, 4, 10);
        let b = uniform_depth(4, 5, 10);
        assert_same_layout(&a, &b);
    }
}
