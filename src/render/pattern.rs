//! Calibration marker patterns and feedback overlays.

use crate::config::MarkerConfig;
use crate::frame::ColorFrame;
use image::Rgb;
use nalgebra::Point2;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// Marker disc pattern generator for the projector.
///
/// The four anchors sit in the display corners, inset from both edges by the
/// disc radius plus the border distance, in the order top-left, top-right,
/// bottom-right, bottom-left.
#[derive(Debug, Clone)]
pub struct MarkerPattern {
    width: u32,
    height: u32,
    radius: u32,
    inset: u32,
}

impl MarkerPattern {
    pub fn new(width: u32, height: u32, config: &MarkerConfig) -> Self {
        Self {
            width,
            height,
            radius: config.radius,
            inset: config.inset(),
        }
    }

    /// Whether four non-overlapping anchors fit on the display.
    pub fn fits(&self) -> bool {
        self.width > 2 * self.inset && self.height > 2 * self.inset
    }

    /// Anchor centres in display coordinates.
    pub fn anchors(&self) -> [Point2<f64>; 4] {
        let near = self.inset as f64;
        let far_x = self.width as f64 - self.inset as f64;
        let far_y = self.height as f64 - self.inset as f64;
        [
            Point2::new(near, near),
            Point2::new(far_x, near),
            Point2::new(far_x, far_y),
            Point2::new(near, far_y),
        ]
    }

    /// White canvas with a single black disc at anchor `index`.
    pub fn generate(&self, index: usize) -> ColorFrame {
        let mut canvas = self.generate_white();
        if let Some(anchor) = self.anchors().get(index) {
            fill_disc(&mut canvas, *anchor, self.radius as f64, BLACK);
        }
        canvas
    }

    /// All-white canvas.
    pub fn generate_white(&self) -> ColorFrame {
        ColorFrame::from_pixel(self.width, self.height, WHITE)
    }
}

/// Fill a disc, clipped to the frame.
pub fn fill_disc(frame: &mut ColorFrame, center: Point2<f64>, radius: f64, color: Rgb<u8>) {
    let r2 = radius * radius;
    for_each_in_box(frame, center, radius, |frame, x, y, d2| {
        if d2 <= r2 {
            frame.put_pixel(x, y, color);
        }
    });
}

/// Draw a circle outline of the given thickness, clipped to the frame.
pub fn draw_ring(
    frame: &mut ColorFrame,
    center: Point2<f64>,
    radius: f64,
    thickness: f64,
    color: Rgb<u8>,
) {
    let outer = radius + thickness / 2.0;
    let inner = (radius - thickness / 2.0).max(0.0);
    let (outer2, inner2) = (outer * outer, inner * inner);
    for_each_in_box(frame, center, outer, |frame, x, y, d2| {
        if d2 <= outer2 && d2 >= inner2 {
            frame.put_pixel(x, y, color);
        }
    });
}

fn for_each_in_box(
    frame: &mut ColorFrame,
    center: Point2<f64>,
    extent: f64,
    mut visit: impl FnMut(&mut ColorFrame, u32, u32, f64),
) {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    let x0 = (center.x - extent).floor().max(0.0) as u32;
    let y0 = (center.y - extent).floor().max(0.0) as u32;
    let x1 = (center.x + extent).ceil().min(width as f64 - 1.0);
    let y1 = (center.y + extent).ceil().min(height as f64 - 1.0);
    if x1 < 0.0 || y1 < 0.0 {
        return;
    }

    for y in y0..=y1 as u32 {
        for x in x0..=x1 as u32 {
            let dx = x as f64 - center.x;
            let dy = y as f64 - center.y;
            visit(frame, x, y, dx * dx + dy * dy);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_positions() {
        let pattern = MarkerPattern::new(1024, 768, &MarkerConfig::default());
        let anchors = pattern.anchors();
        assert_eq!(anchors[0], Point2::new(175.0, 175.0));
        assert_eq!(anchors[1], Point2::new(849.0, 175.0));
        assert_eq!(anchors[2], Point2::new(849.0, 593.0));
        assert_eq!(anchors[3], Point2::new(175.0, 593.0));
        assert!(pattern.fits());
    }

    #[test]
    fn test_small_display_does_not_fit() {
        let pattern = MarkerPattern::new(320, 240, &MarkerConfig::default());
        assert!(!pattern.fits());
    }

    #[test]
    fn test_marker_disc_is_drawn() {
        let config = MarkerConfig {
            radius: 10,
            border_distance: 5,
            ..Default::default()
        };
        let pattern = MarkerPattern::new(100, 80, &config);
        let frame = pattern.generate(2);
        assert_eq!(frame.get_pixel(85, 65), &BLACK);
        assert_eq!(frame.get_pixel(15, 15), &WHITE);
        assert_eq!(frame.get_pixel(50, 40), &WHITE);
    }

    #[test]
    fn test_ring_is_hollow() {
        let mut frame = ColorFrame::from_pixel(40, 40, WHITE);
        draw_ring(&mut frame, Point2::new(20.0, 20.0), 10.0, 2.0, Rgb([255, 0, 0]));
        assert_eq!(frame.get_pixel(30, 20), &Rgb([255, 0, 0]));
        assert_eq!(frame.get_pixel(20, 20), &WHITE);
    }

    #[test]
    fn test_drawing_clips_at_border() {
        let mut frame = ColorFrame::from_pixel(10, 10, WHITE);
        fill_disc(&mut frame, Point2::new(0.0, 0.0), 4.0, BLACK);
        fill_disc(&mut frame, Point2::new(-50.0, -50.0), 4.0, BLACK);
        assert_eq!(frame.get_pixel(0, 0), &BLACK);
        assert_eq!(frame.get_pixel(9, 9), &WHITE);
    }
}
