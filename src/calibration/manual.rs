//! Manual calibration: the operator clicks the four display corners in the
//! camera image, clockwise from the top-left.

use super::coordinator::StrategyOutcome;
use super::corners::display_corners;
use super::feedback::{FeedbackEvent, FeedbackSink, Surface};
use super::homography::CorrespondencePair;
use crate::camera::FrameSource;
use crate::config::SandboxConfig;
use crate::error::Result;
use crate::render::draw_ring;
use image::Rgb;
use nalgebra::Point2;
use std::time::{Duration, Instant};

const CLICK_MARK: Rgb<u8> = Rgb([255, 0, 0]);
const CLICK_MARK_RADIUS: f64 = 5.0;

pub struct ManualStrategy {
    destination: [Point2<f64>; 4],
    poll_interval: Duration,
    points: Vec<Point2<f64>>,
}

impl ManualStrategy {
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            destination: display_corners(config.display_width, config.display_height),
            poll_interval: config.poll_interval(),
            points: Vec::with_capacity(4),
        }
    }

    /// Points clicked so far.
    pub fn points(&self) -> &[Point2<f64>] {
        &self.points
    }

    pub fn acquire(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FeedbackSink,
    ) -> Result<StrategyOutcome> {
        self.points.clear();
        log::info!("Click the edges of the projector area clockwise, starting top left");

        while self.points.len() < 4 {
            let mut frame = source.grab_color()?;
            for p in &self.points {
                draw_ring(&mut frame, *p, CLICK_MARK_RADIUS, 2.0, CLICK_MARK);
            }
            sink.show(Surface::Monitor, &frame);

            if self.collect_clicks(sink) {
                log::warn!("Manual calibration aborted with {} point(s)", self.points.len());
                return Ok(StrategyOutcome::Failed(format!(
                    "Aborted after {} of 4 points",
                    self.points.len()
                )));
            }
        }

        let mut source_points = [Point2::origin(); 4];
        source_points.copy_from_slice(&self.points);
        Ok(StrategyOutcome::Found(CorrespondencePair::new(
            source_points,
            self.destination,
        )))
    }

    /// Drain events for one poll interval. Returns `true` on abort.
    fn collect_clicks(&mut self, sink: &mut dyn FeedbackSink) -> bool {
        let deadline = Instant::now() + self.poll_interval;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match sink.poll_event(remaining) {
                Some(FeedbackEvent::Abort) => return true,
                Some(FeedbackEvent::Click { x, y }) => {
                    if self.points.len() < 4 {
                        log::info!("Calibration point at x: {} y: {}", x, y);
                        self.points.push(Point2::new(x, y));
                    }
                    if self.points.len() == 4 {
                        return false;
                    }
                }
                None => {}
            }
            if Instant::now() >= deadline {
                return false;
            }
        }
    }
}
