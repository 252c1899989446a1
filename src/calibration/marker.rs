//! Marker-sequence calibration strategy.
//!
//! One black disc at a time is projected at the four inset anchors. Each
//! phase grabs camera frames until the circle detector reports exactly one
//! circle, whose centre becomes the source point for that anchor.

use super::circles::{Circle, CircleDetector};
use super::coordinator::StrategyOutcome;
use super::feedback::{wait_for_abort, FeedbackSink, Surface};
use super::homography::CorrespondencePair;
use crate::camera::FrameSource;
use crate::config::SandboxConfig;
use crate::error::Result;
use crate::frame::{to_gray, ColorFrame};
use crate::render::{draw_ring, fill_disc, MarkerPattern};
use image::Rgb;
use nalgebra::Point2;
use std::time::Duration;

const PHASE_NAMES: [&str; 4] = ["top left", "top right", "bottom right", "bottom left"];

pub struct MarkerSequenceStrategy {
    pattern: MarkerPattern,
    detector: CircleDetector,
    blur_sigma: f32,
    poll_interval: Duration,
    settle_time: Duration,
    max_attempts: Option<usize>,
}

impl MarkerSequenceStrategy {
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            pattern: MarkerPattern::new(config.display_width, config.display_height, &config.marker),
            detector: CircleDetector::from_config(&config.marker),
            blur_sigma: config.marker.blur_sigma,
            poll_interval: config.poll_interval(),
            settle_time: config.marker.settle_time(),
            max_attempts: config.max_attempts,
        }
    }

    /// Circles visible in one camera frame.
    pub fn detect(&self, frame: &ColorFrame) -> Vec<Circle> {
        let gray = to_gray(frame);
        let smoothed = if self.blur_sigma > 0.0 {
            image::imageops::blur(&gray, self.blur_sigma)
        } else {
            gray
        };
        self.detector.detect(&smoothed)
    }

    pub fn acquire(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FeedbackSink,
    ) -> Result<StrategyOutcome> {
        if !self.pattern.fits() {
            return Ok(StrategyOutcome::Failed(
                "Display too small for the marker layout".to_string(),
            ));
        }

        let mut found = [Point2::origin(); 4];
        let mut attempt = 0usize;

        for (phase, name) in PHASE_NAMES.iter().enumerate() {
            sink.show(Surface::Projector, &self.pattern.generate(phase));

            loop {
                if self.max_attempts.is_some_and(|max| attempt >= max) {
                    return Ok(StrategyOutcome::Failed(format!(
                        "No single circle for the {} marker within {} frames",
                        name, attempt
                    )));
                }
                if wait_for_abort(sink, self.poll_interval) {
                    return Ok(StrategyOutcome::Failed(format!(
                        "Marker calibration aborted at the {} marker",
                        name
                    )));
                }

                let mut frame = source.grab_color()?;
                attempt += 1;

                let circles = self.detect(&frame);
                if let [circle] = circles.as_slice() {
                    draw_detection(&mut frame, circle);
                    sink.show(Surface::Monitor, &frame);
                    log::info!(
                        "Circle detected for the {} marker at ({:.1}, {:.1})",
                        name,
                        circle.center.x,
                        circle.center.y
                    );
                    found[phase] = circle.center;

                    if wait_for_abort(sink, self.settle_time) {
                        return Ok(StrategyOutcome::Failed(format!(
                            "Marker calibration aborted after the {} marker",
                            name
                        )));
                    }
                    break;
                }

                sink.show(Surface::Monitor, &frame);
                log::debug!("Frame {}: {} circle(s), retrying", attempt, circles.len());
            }
        }

        log::info!("Automatic calibration done after {} frame(s)", attempt);
        Ok(StrategyOutcome::Found(CorrespondencePair::new(
            found,
            self.pattern.anchors(),
        )))
    }
}

fn draw_detection(frame: &mut ColorFrame, circle: &Circle) {
    fill_disc(frame, circle.center, 3.0, Rgb([0, 255, 0]));
    draw_ring(frame, circle.center, circle.radius, 3.0, Rgb([255, 0, 0]));
}
