//! Gradient Hough circle detector.
//!
//! Edge pixels vote along their gradient direction, in both senses, for every
//! candidate radius. Local accumulator maxima above the vote threshold become
//! centres, stronger centres suppress weaker ones closer than the minimum
//! distance, and each surviving centre takes the radius supported by the most
//! edge pixels.

use super::gradient::Gradients;
use crate::config::MarkerConfig;
use crate::frame::GrayFrame;
use nalgebra::Point2;

/// A detected circle in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub center: Point2<f64>,
    pub radius: f64,
    pub votes: u32,
}

#[derive(Debug, Clone)]
pub struct CircleDetector {
    /// Minimum L1 Sobel magnitude for an edge pixel.
    pub edge_threshold: f32,
    /// Minimum votes for a centre candidate.
    pub accumulator_threshold: u32,
    pub min_radius: u32,
    /// Zero means the larger image dimension.
    pub max_radius: u32,
    /// Minimum distance between centres; zero means a eighth of the rows.
    pub min_distance: f64,
}

impl CircleDetector {
    pub fn from_config(config: &MarkerConfig) -> Self {
        Self {
            edge_threshold: config.edge_threshold,
            accumulator_threshold: config.accumulator_threshold,
            min_radius: config.min_radius,
            max_radius: config.max_radius,
            min_distance: 0.0,
        }
    }

    /// Detect circles in an already smoothed intensity image.
    pub fn detect(&self, image: &GrayFrame) -> Vec<Circle> {
        let (w, h) = (image.width() as usize, image.height() as usize);
        if w < 3 || h < 3 {
            return Vec::new();
        }

        let gradients = Gradients::sobel(image);
        let edges: Vec<(usize, usize)> = (0..h)
            .flat_map(|y| (0..w).map(move |x| (x, y)))
            .filter(|&(x, y)| gradients.magnitude_l1(y * w + x) >= self.edge_threshold)
            .collect();
        if edges.is_empty() {
            return Vec::new();
        }

        let min_r = self.min_radius.max(1) as usize;
        let max_r = if self.max_radius == 0 {
            w.max(h)
        } else {
            self.max_radius as usize
        };
        if min_r > max_r {
            return Vec::new();
        }

        let accumulator = self.vote(&gradients, &edges, min_r, max_r);
        let centers = self.local_maxima(&accumulator, w, h);

        let min_distance = if self.min_distance > 0.0 {
            self.min_distance
        } else {
            h as f64 / 8.0
        };
        let min_distance2 = min_distance * min_distance;

        let mut accepted: Vec<Circle> = Vec::new();
        for (idx, votes) in centers {
            let center = Point2::new((idx % w) as f64, (idx / w) as f64);
            let too_close = accepted.iter().any(|c| {
                let d = c.center - center;
                d.x * d.x + d.y * d.y < min_distance2
            });
            if too_close {
                continue;
            }

            if let Some(radius) = estimate_radius(center, &edges, min_r, max_r) {
                accepted.push(Circle {
                    center,
                    radius,
                    votes,
                });
            }
        }

        log::debug!(
            "Circle detector: {} edge pixels, {} circle(s)",
            edges.len(),
            accepted.len()
        );

        accepted
    }

    fn vote(
        &self,
        gradients: &Gradients,
        edges: &[(usize, usize)],
        min_r: usize,
        max_r: usize,
    ) -> Vec<u32> {
        let (w, h) = (gradients.width, gradients.height);
        let mut accumulator = vec![0u32; w * h];

        for &(x, y) in edges {
            let idx = y * w + x;
            let (gx, gy) = (gradients.dx[idx] as f64, gradients.dy[idx] as f64);
            let norm = (gx * gx + gy * gy).sqrt();
            if norm == 0.0 {
                continue;
            }
            let (ux, uy) = (gx / norm, gy / norm);

            for sign in [1.0, -1.0] {
                for r in min_r..=max_r {
                    let cx = (x as f64 + sign * ux * r as f64).round();
                    let cy = (y as f64 + sign * uy * r as f64).round();
                    if cx < 0.0 || cy < 0.0 || cx >= w as f64 || cy >= h as f64 {
                        break;
                    }
                    accumulator[cy as usize * w + cx as usize] += 1;
                }
            }
        }

        accumulator
    }

    /// Accumulator peaks sorted by descending votes.
    fn local_maxima(&self, acc: &[u32], w: usize, h: usize) -> Vec<(usize, u32)> {
        let mut peaks = Vec::new();

        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let idx = y * w + x;
                let v = acc[idx];
                if v > self.accumulator_threshold
                    && v > acc[idx - 1]
                    && v >= acc[idx + 1]
                    && v > acc[idx - w]
                    && v >= acc[idx + w]
                {
                    peaks.push((idx, v));
                }
            }
        }

        peaks.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        peaks
    }
}

fn estimate_radius(
    center: Point2<f64>,
    edges: &[(usize, usize)],
    min_r: usize,
    max_r: usize,
) -> Option<f64> {
    let mut histogram = vec![0u32; max_r + 1];

    for &(x, y) in edges {
        let dx = x as f64 - center.x;
        let dy = y as f64 - center.y;
        let r = (dx * dx + dy * dy).sqrt().round() as usize;
        if r >= min_r && r <= max_r {
            histogram[r] += 1;
        }
    }

    let (radius, &count) = histogram
        .iter()
        .enumerate()
        .skip(min_r)
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))?;

    (count > 0).then_some(radius as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn disc_image(width: u32, height: u32, discs: &[(f64, f64, f64)]) -> GrayFrame {
        let image = GrayFrame::from_fn(width, height, |x, y| {
            let inside = discs.iter().any(|&(cx, cy, r)| {
                let (dx, dy) = (x as f64 - cx, y as f64 - cy);
                dx * dx + dy * dy <= r * r
            });
            Luma([if inside { 0 } else { 255 }])
        });
        image::imageops::blur(&image, 2.0)
    }

    fn detector() -> CircleDetector {
        CircleDetector::from_config(&MarkerConfig::default())
    }

    #[test]
    fn test_detects_single_dark_disc() {
        let image = disc_image(200, 200, &[(100.0, 90.0, 30.0)]);
        let circles = detector().detect(&image);

        assert_eq!(circles.len(), 1, "{:?}", circles);
        let c = circles[0];
        assert!((c.center.x - 100.0).abs() <= 2.0);
        assert!((c.center.y - 90.0).abs() <= 2.0);
        assert!((c.radius - 30.0).abs() <= 3.0);
    }

    #[test]
    fn test_blank_frame_has_no_circles() {
        let image = GrayFrame::from_pixel(120, 100, Luma([255]));
        assert!(detector().detect(&image).is_empty());
    }

    #[test]
    fn test_detects_two_separate_discs() {
        let image = disc_image(300, 200, &[(70.0, 100.0, 25.0), (230.0, 100.0, 25.0)]);
        let mut circles = detector().detect(&image);
        circles.sort_by(|a, b| a.center.x.total_cmp(&b.center.x));

        assert_eq!(circles.len(), 2, "{:?}", circles);
        assert!((circles[0].center.x - 70.0).abs() <= 2.0);
        assert!((circles[1].center.x - 230.0).abs() <= 2.0);
    }

    #[test]
    fn test_tiny_image_is_ignored() {
        let image = GrayFrame::new(2, 2);
        assert!(detector().detect(&image).is_empty());
    }
}
