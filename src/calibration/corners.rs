//! Corner-cluster calibration strategy.
//!
//! The projector shows a white canvas; the bright display rectangle seen by
//! the camera yields four strong Harris corners. Each camera frame is turned
//! into a min-max normalized response map, thresholded, and nearby responses
//! are merged until exactly four clusters remain.

use super::coordinator::StrategyOutcome;
use super::feedback::{wait_for_abort, FeedbackSink, Surface};
use super::gradient::Gradients;
use super::homography::CorrespondencePair;
use crate::camera::FrameSource;
use crate::config::{CornerConfig, SandboxConfig};
use crate::error::Result;
use crate::frame::{to_gray, ColorFrame, GrayFrame};
use crate::render::{draw_ring, MarkerPattern};
use image::Rgb;
use nalgebra::Point2;
use std::time::Duration;

const CLUSTER_MARK: Rgb<u8> = Rgb([0, 0, 0]);

/// Harris response normalized to `0..=255`, row-major.
#[derive(Debug, Clone)]
pub struct ResponseMap {
    pub width: usize,
    pub height: usize,
    pub values: Vec<f32>,
}

impl ResponseMap {
    /// Pixels whose truncated response exceeds `threshold`, row by row.
    pub fn points_above(&self, threshold: f64) -> Vec<Point2<f64>> {
        let threshold = threshold.floor() as i64;
        let mut points = Vec::new();
        for y in 0..self.height {
            for x in 0..self.width {
                if self.values[y * self.width + x] as i64 > threshold {
                    points.push(Point2::new(x as f64, y as f64));
                }
            }
        }
        points
    }

    /// Render as an intensity image for the operator monitor.
    pub fn to_color(&self) -> ColorFrame {
        ColorFrame::from_fn(self.width as u32, self.height as u32, |x, y| {
            let v = self.values[y as usize * self.width + x as usize]
                .round()
                .clamp(0.0, 255.0) as u8;
            Rgb([v, v, v])
        })
    }
}

/// Harris corner response with a `block_size` summation window.
pub fn harris_response(image: &GrayFrame, block_size: u32, k: f64) -> ResponseMap {
    let gradients = Gradients::sobel(image);
    let (w, h) = (gradients.width, gradients.height);
    let mut values = vec![0.0f32; w * h];
    if w == 0 || h == 0 {
        return ResponseMap { width: w, height: h, values };
    }

    let n = w * h;
    let mut xx = vec![0.0f64; n];
    let mut yy = vec![0.0f64; n];
    let mut xy = vec![0.0f64; n];
    for i in 0..n {
        let (gx, gy) = (gradients.dx[i] as f64, gradients.dy[i] as f64);
        xx[i] = gx * gx;
        yy[i] = gy * gy;
        xy[i] = gx * gy;
    }

    let block = block_size.max(1) as i64;
    let lo = -(block / 2);
    let hi = block - 1 + lo;
    let clamp = |v: i64, max: usize| v.clamp(0, max as i64 - 1) as usize;

    let mut raw = vec![0.0f64; n];
    for y in 0..h {
        for x in 0..w {
            let (mut a, mut b, mut c) = (0.0, 0.0, 0.0);
            for oy in lo..=hi {
                let sy = clamp(y as i64 + oy, h);
                for ox in lo..=hi {
                    let idx = sy * w + clamp(x as i64 + ox, w);
                    a += xx[idx];
                    b += yy[idx];
                    c += xy[idx];
                }
            }
            let det = a * b - c * c;
            let trace = a + b;
            raw[y * w + x] = det - k * trace * trace;
        }
    }

    let (min, max) = raw
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let span = max - min;
    if span > 0.0 {
        for (out, &r) in values.iter_mut().zip(raw.iter()) {
            *out = ((r - min) / span * 255.0) as f32;
        }
    }

    ResponseMap { width: w, height: h, values }
}

/// Greedy scan-order merge: each point not yet absorbed becomes a
/// representative and absorbs every later point closer than `distance` on
/// both axes, wherever it appears later in the list.
pub fn merge_points(points: &[Point2<f64>], distance: f64) -> Vec<Point2<f64>> {
    let mut absorbed = vec![false; points.len()];
    let mut merged = Vec::new();

    for i in 0..points.len() {
        if absorbed[i] {
            continue;
        }
        let rep = points[i];
        merged.push(rep);

        for j in i + 1..points.len() {
            if !absorbed[j]
                && (points[j].x - rep.x).abs() < distance
                && (points[j].y - rep.y).abs() < distance
            {
                absorbed[j] = true;
            }
        }
    }

    merged
}

/// Arrange four points as top-left, top-right, bottom-right, bottom-left.
pub fn order_quad(points: &[Point2<f64>; 4]) -> [Point2<f64>; 4] {
    let by = |key: fn(&Point2<f64>) -> f64, max: bool| {
        let mut best = points[0];
        for p in &points[1..] {
            let better = if max { key(p) > key(&best) } else { key(p) < key(&best) };
            if better {
                best = *p;
            }
        }
        best
    };

    [
        by(|p| p.x + p.y, false),
        by(|p| p.x - p.y, true),
        by(|p| p.x + p.y, true),
        by(|p| p.x - p.y, false),
    ]
}

/// Full display rectangle corners, clockwise from the top-left.
pub fn display_corners(width: u32, height: u32) -> [Point2<f64>; 4] {
    let (w, h) = (width as f64, height as f64);
    [
        Point2::new(0.0, 0.0),
        Point2::new(w, 0.0),
        Point2::new(w, h),
        Point2::new(0.0, h),
    ]
}

pub struct CornerClusterStrategy {
    params: CornerConfig,
    pattern: MarkerPattern,
    destination: [Point2<f64>; 4],
    poll_interval: Duration,
    max_attempts: Option<usize>,
}

impl CornerClusterStrategy {
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            params: config.corners.clone(),
            pattern: MarkerPattern::new(config.display_width, config.display_height, &config.marker),
            destination: display_corners(config.display_width, config.display_height),
            poll_interval: config.poll_interval(),
            max_attempts: config.max_attempts,
        }
    }

    /// Merged corner clusters found in one camera frame.
    pub fn detect(&self, frame: &ColorFrame) -> (Vec<Point2<f64>>, ResponseMap) {
        let response = harris_response(&to_gray(frame), self.params.block_size, self.params.k as f64);
        let points = response.points_above(self.params.threshold as f64);
        let merged = merge_points(&points, self.params.merge_distance as f64);
        (merged, response)
    }

    pub fn acquire(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FeedbackSink,
    ) -> Result<StrategyOutcome> {
        sink.show(Surface::Projector, &self.pattern.generate_white());

        let mut attempt = 0usize;
        loop {
            if self.max_attempts.is_some_and(|max| attempt >= max) {
                return Ok(StrategyOutcome::Failed(format!(
                    "No four corner clusters within {} frames",
                    attempt
                )));
            }
            if wait_for_abort(sink, self.poll_interval) {
                return Ok(StrategyOutcome::Failed("Corner calibration aborted".to_string()));
            }

            let frame = source.grab_color()?;
            attempt += 1;

            let (clusters, response) = self.detect(&frame);
            let mut overlay = response.to_color();
            for c in &clusters {
                draw_ring(&mut overlay, *c, 5.0, 2.0, CLUSTER_MARK);
            }
            sink.show(Surface::Monitor, &overlay);

            log::debug!("Frame {}: {} corner cluster(s)", attempt, clusters.len());

            if let Ok(quad) = <[Point2<f64>; 4]>::try_from(clusters.as_slice()) {
                let source_points = order_quad(&quad);
                log::info!("Corner calibration done after {} frame(s)", attempt);
                return Ok(StrategyOutcome::Found(CorrespondencePair::new(
                    source_points,
                    self.destination,
                )));
            }
        }
    }
}
