//! Sobel image gradients shared by the circle and corner detectors.

use crate::frame::GrayFrame;

/// Horizontal and vertical 3x3 Sobel responses in row-major order.
#[derive(Debug, Clone)]
pub struct Gradients {
    pub width: usize,
    pub height: usize,
    pub dx: Vec<f32>,
    pub dy: Vec<f32>,
}

impl Gradients {
    /// Compute gradients with replicated borders.
    pub fn sobel(image: &GrayFrame) -> Self {
        let (w, h) = (image.width() as usize, image.height() as usize);
        let raw = image.as_raw();
        let mut dx = vec![0.0f32; w * h];
        let mut dy = vec![0.0f32; w * h];

        if w == 0 || h == 0 {
            return Self { width: w, height: h, dx, dy };
        }

        let at = |x: usize, y: usize| raw[y * w + x] as f32;

        for y in 0..h {
            let ym = y.saturating_sub(1);
            let yp = (y + 1).min(h - 1);
            for x in 0..w {
                let xm = x.saturating_sub(1);
                let xp = (x + 1).min(w - 1);

                let gx = (at(xp, ym) + 2.0 * at(xp, y) + at(xp, yp))
                    - (at(xm, ym) + 2.0 * at(xm, y) + at(xm, yp));
                let gy = (at(xm, yp) + 2.0 * at(x, yp) + at(xp, yp))
                    - (at(xm, ym) + 2.0 * at(x, ym) + at(xp, ym));

                dx[y * w + x] = gx;
                dy[y * w + x] = gy;
            }
        }

        Self { width: w, height: h, dx, dy }
    }

    /// L1 gradient magnitude at a flat index.
    #[inline]
    pub fn magnitude_l1(&self, idx: usize) -> f32 {
        self.dx[idx].abs() + self.dy[idx].abs()
    }
}
