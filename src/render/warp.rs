//! Perspective warp of camera frames into display space.

use crate::calibration::homography::apply_matrix;
use crate::calibration::Transform;
use crate::frame::Frame;
use image::Pixel;

/// Resample `frame` into a `width` x `height` display-space frame.
///
/// Each output pixel is mapped back through the inverse transform and takes
/// the nearest source sample. Pixels mapping outside the source stay zero.
pub fn warp_perspective<P: Pixel>(
    frame: &Frame<P>,
    transform: &Transform,
    width: u32,
    height: u32,
) -> Frame<P> {
    let mut output = Frame::<P>::new(width, height);
    let (src_width, src_height) = frame.dimensions();
    let inverse = transform.inverse_matrix();

    for (x, y, pixel) in output.enumerate_pixels_mut() {
        let Some((sx, sy)) = apply_matrix(inverse, x as f64, y as f64) else {
            continue;
        };

        let sx = sx.round();
        let sy = sy.round();
        if sx >= 0.0 && sy >= 0.0 && sx < src_width as f64 && sy < src_height as f64 {
            *pixel = *frame.get_pixel(sx as u32, sy as u32);
        }
    }

    output
}

/// Applies one calibrated transform to every incoming frame.
#[derive(Debug, Clone)]
pub struct GeometricRectifier {
    transform: Transform,
    width: u32,
    height: u32,
}

impl GeometricRectifier {
    pub fn new(transform: Transform, width: u32, height: u32) -> Self {
        Self {
            transform,
            width,
            height,
        }
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Display-space output size.
    pub fn output_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Warp a depth or color frame; the sample type is preserved.
    pub fn apply<P: Pixel>(&self, frame: &Frame<P>) -> Frame<P> {
        warp_perspective(frame, &self.transform, self.width, self.height)
    }
}
