//! Steady-state processing chain.
//!
//! Startup calibrates the camera against the display and fixes the depth
//! baseline. Afterwards every depth frame goes through temporal smoothing,
//! rectification, normalization and the optional treasure overlay.

use crate::calibration::{CalibrationCoordinator, CalibrationResult, FeedbackSink, Transform};
use crate::camera::FrameSource;
use crate::config::SandboxConfig;
use crate::depth::{
    ColorBand, ColorProfiles, DepthBaseline, DepthNormalizer, GroundPlaneCalibrator,
    NormalizedFrame,
};
use crate::error::Result;
use crate::filter::TemporalFilter;
use crate::frame::DepthFrame;
use crate::render::GeometricRectifier;
use crate::treasure::TreasureHunt;
use std::ops::ControlFlow;
use std::time::Instant;

/// Seconds between frame rate log lines.
const FPS_UPDATE_INTERVAL_SECS: f64 = 2.0;

/// Calibrate, then determine the depth baseline from a rectified frame.
pub fn startup(
    config: &SandboxConfig,
    source: &mut dyn FrameSource,
    sink: &mut dyn FeedbackSink,
) -> Result<(CalibrationResult, DepthBaseline)> {
    let mut coordinator = CalibrationCoordinator::new(config.clone());
    let calibration = coordinator.run(source, sink)?;

    let ground = GroundPlaneCalibrator::new(config);
    let baseline = match ground.manual_baseline()? {
        Some(baseline) => baseline,
        None => {
            let rectifier = GeometricRectifier::new(
                calibration.transform.clone(),
                config.display_width,
                config.display_height,
            );
            let depth = rectifier.apply(&source.grab_depth()?);
            ground.estimate_baseline(&depth)?
        }
    };

    Ok((calibration, baseline))
}

/// Frame counter logging the frame rate every couple of seconds.
#[derive(Debug)]
pub struct FrameStats {
    total: u64,
    frames_since_update: u64,
    last_update: Instant,
    fps: f64,
}

impl Default for FrameStats {
    fn default() -> Self {
        Self {
            total: 0,
            frames_since_update: 0,
            last_update: Instant::now(),
            fps: 0.0,
        }
    }
}

impl FrameStats {
    pub fn tick(&mut self) {
        self.total += 1;
        self.frames_since_update += 1;

        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        if elapsed >= FPS_UPDATE_INTERVAL_SECS {
            self.fps = self.frames_since_update as f64 / elapsed;
            self.frames_since_update = 0;
            self.last_update = now;
            log::info!("{:.1} fps ({} frames total)", self.fps, self.total);
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Frame rate over the last completed interval.
    pub fn fps(&self) -> f64 {
        self.fps
    }
}

pub struct Pipeline {
    rectifier: GeometricRectifier,
    normalizer: DepthNormalizer,
    filter: Option<TemporalFilter>,
    profiles: ColorProfiles,
    current_band: usize,
    treasure: Option<TreasureHunt>,
    stats: FrameStats,
}

impl Pipeline {
    pub fn new(config: &SandboxConfig, transform: Transform, baseline: DepthBaseline) -> Result<Self> {
        let normalizer = DepthNormalizer::new(baseline)?;
        let filter = TemporalFilter::from_config(&config.temporal);
        if let Some(filter) = &filter {
            log::info!(
                "Temporal {:?} filter over {} frames, stride {}",
                filter.reduction(),
                config.temporal.depth,
                config.temporal.stride
            );
        }

        Ok(Self {
            rectifier: GeometricRectifier::new(transform, config.display_width, config.display_height),
            normalizer,
            filter,
            profiles: ColorProfiles::default(),
            current_band: 0,
            treasure: None,
            stats: FrameStats::default(),
        })
    }

    pub fn with_color_profiles(mut self, profiles: ColorProfiles) -> Self {
        self.profiles = profiles;
        self.current_band = 0;
        self
    }

    pub fn with_treasure(mut self, treasure: TreasureHunt) -> Self {
        self.treasure = Some(treasure);
        self
    }

    pub fn baseline(&self) -> &DepthBaseline {
        self.normalizer.baseline()
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn treasure(&self) -> Option<&TreasureHunt> {
        self.treasure.as_ref()
    }

    /// Color band in use, `None` for grayscale output.
    pub fn color_band(&self) -> Option<&ColorBand> {
        self.profiles.get(self.current_band)
    }

    /// Switch color profile. Out-of-range numbers are ignored.
    pub fn select_color_band(&mut self, index: usize) -> bool {
        if index < self.profiles.len() {
            log::info!("Switching to color profile {}", index);
            self.current_band = index;
            true
        } else {
            false
        }
    }

    pub fn rehide_treasure(&mut self) {
        if let Some(treasure) = self.treasure.as_mut() {
            treasure.rehide();
        }
    }

    /// Turn one raw depth frame into display output.
    pub fn process(&mut self, raw: DepthFrame) -> NormalizedFrame {
        let filtered = match self.filter.as_mut() {
            Some(filter) => filter.apply(raw),
            None => raw,
        };
        let rectified = self.rectifier.apply(&filtered);

        let mut output = self
            .normalizer
            .normalize(&rectified, self.profiles.get(self.current_band));

        if let Some(treasure) = self.treasure.as_mut() {
            treasure.update(&rectified, &mut output, self.normalizer.baseline());
        }

        self.stats.tick();
        output
    }

    /// Grab, retrieve and process the next depth frame.
    pub fn step(&mut self, source: &mut dyn FrameSource) -> Result<NormalizedFrame> {
        let depth = source.grab_depth()?;
        Ok(self.process(depth))
    }

    /// Process frames until `limit` is reached or `on_frame` breaks.
    /// `on_frame` may adjust the pipeline between frames. Acquisition errors
    /// end the loop. Returns the number of frames processed.
    pub fn run<F>(
        &mut self,
        source: &mut dyn FrameSource,
        limit: Option<u64>,
        mut on_frame: F,
    ) -> Result<u64>
    where
        F: FnMut(&mut Self, u64, &NormalizedFrame) -> Result<ControlFlow<()>>,
    {
        let mut count = 0u64;
        while limit.map_or(true, |limit| count < limit) {
            let output = self.step(source)?;
            let flow = on_frame(self, count, &output)?;
            count += 1;
            if flow.is_break() {
                break;
            }
        }

        log::info!("Processed {} frame(s)", count);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::testing::{ScriptedSink, ScriptedSource};
    use crate::calibration::FeedbackEvent;
    use crate::config::{CalibrationStrategy, TemporalConfig, TemporalMode};
    use crate::error::SandboxError;
    use crate::frame::{uniform_depth, ColorFrame};
    use image::Rgb;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Depth source with a fixed sequence of frames, cycling.
    struct DepthSequence {
        frames: Vec<DepthFrame>,
        index: usize,
    }

    impl FrameSource for DepthSequence {
        fn grab(&mut self) -> Result<()> {
            self.index += 1;
            Ok(())
        }

        fn retrieve_color(&mut self) -> Result<ColorFrame> {
            Err(SandboxError::Acquisition("no color".to_string()))
        }

        fn retrieve_depth(&mut self) -> Result<DepthFrame> {
            Ok(self.frames[(self.index - 1) % self.frames.len()].clone())
        }
    }

    fn small_config() -> SandboxConfig {
        SandboxConfig {
            display_width: 8,
            display_height: 6,
            ..Default::default()
        }
    }

    fn baseline() -> DepthBaseline {
        DepthBaseline::new(700, 90, 200)
    }

    fn gray_value(output: &NormalizedFrame, x: u32, y: u32) -> u16 {
        match output {
            NormalizedFrame::Gray(f) => f.get_pixel(x, y)[0],
            NormalizedFrame::Color(_) => panic!("expected gray output"),
        }
    }

    #[test]
    fn test_process_gray_identity() {
        let mut pipeline = Pipeline::new(&small_config(), Transform::identity(), baseline()).unwrap();
        let output = pipeline.process(uniform_depth(8, 6, 300));
        assert_eq!(output.dimensions(), (8, 6));
        assert_eq!(gray_value(&output, 3, 3), 65309);
        assert_eq!(pipeline.stats().total(), 1);
    }

    #[test]
    fn test_median_filter_suppresses_spike() {
        let mut config = small_config();
        config.temporal = TemporalConfig {
            mode: TemporalMode::Median,
            depth: 3,
            stride: 1,
        };
        let mut pipeline = Pipeline::new(&config, Transform::identity(), baseline()).unwrap();
        let mut source = DepthSequence {
            frames: vec![
                uniform_depth(8, 6, 700),
                uniform_depth(8, 6, 300),
                uniform_depth(8, 6, 700),
            ],
            index: 0,
        };

        let mut values = Vec::new();
        let processed = pipeline
            .run(&mut source, Some(3), |_, _, output| {
                values.push(gray_value(output, 0, 0));
                Ok(ControlFlow::Continue(()))
            })
            .unwrap();

        assert_eq!(processed, 3);
        // [700] -> 700, [700, 300] -> upper median 700, [700, 300, 700] -> 700.
        assert_eq!(values, vec![0, 0, 0]);
    }

    #[test]
    fn test_color_profile_switching() {
        let bands = [Rgb([1, 1, 1]), Rgb([2, 2, 2])]
            .map(|c| ColorBand::from_image(&ColorFrame::from_pixel(290, 1, c), 290).unwrap());
        let mut pipeline = Pipeline::new(&small_config(), Transform::identity(), baseline())
            .unwrap()
            .with_color_profiles(ColorProfiles::new(bands.to_vec()));

        let first = pipeline.process(uniform_depth(8, 6, 500));
        assert_eq!(first.to_color().get_pixel(0, 0), &Rgb([1, 1, 1]));

        assert!(pipeline.select_color_band(1));
        assert!(!pipeline.select_color_band(7));
        let second = pipeline.process(uniform_depth(8, 6, 500));
        assert_eq!(second.to_color().get_pixel(0, 0), &Rgb([2, 2, 2]));
    }

    #[test]
    fn test_run_stops_on_break() {
        let mut pipeline = Pipeline::new(&small_config(), Transform::identity(), baseline()).unwrap();
        let mut source = DepthSequence {
            frames: vec![uniform_depth(8, 6, 600)],
            index: 0,
        };
        let processed = pipeline
            .run(&mut source, None, |pipeline, n, _| {
                assert_eq!(pipeline.stats().total(), n + 1);
                Ok(if n == 4 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                })
            })
            .unwrap();
        assert_eq!(processed, 5);
    }

    #[test]
    fn test_treasure_found_in_pipeline() {
        let overlay = ColorFrame::from_pixel(2, 2, Rgb([9, 9, 9]));
        let hunt = TreasureHunt::new(overlay, 8, 6, StdRng::seed_from_u64(3)).unwrap();
        let mut pipeline = Pipeline::new(&small_config(), Transform::identity(), baseline())
            .unwrap()
            .with_treasure(hunt);

        pipeline.process(uniform_depth(8, 6, 700));
        assert!(pipeline.treasure().unwrap().is_found());

        pipeline.rehide_treasure();
        assert!(!pipeline.treasure().unwrap().is_found());
    }

    #[test]
    fn test_startup_with_manual_ground() {
        let mut config = small_config();
        config.calibration_order = vec![CalibrationStrategy::Manual];
        config.manual_sand_plane_distance = 610;
        config.poll_interval_ms = 0;

        let mut source = ScriptedSource::new(vec![ColorFrame::new(64, 48)]);
        let mut sink = ScriptedSink::new(
            [(1.0, 1.0), (60.0, 2.0), (62.0, 45.0), (3.0, 40.0)]
                .map(|(x, y)| Some(FeedbackEvent::Click { x, y })),
        );

        let (calibration, baseline) = startup(&config, &mut source, &mut sink).unwrap();
        assert_eq!(calibration.strategy, CalibrationStrategy::Manual);
        assert_eq!(baseline.box_bottom_distance, 700);
        assert_eq!(source.grabs, 4);
    }

    #[test]
    fn test_startup_estimates_ground() {
        let mut config = small_config();
        config.calibration_order = vec![CalibrationStrategy::Manual];
        config.poll_interval_ms = 0;

        // The scripted source reports all-zero depth.
        let mut source = ScriptedSource::new(vec![ColorFrame::new(64, 48)]);
        let mut sink = ScriptedSink::new(
            [(0.0, 0.0), (64.0, 0.0), (64.0, 48.0), (0.0, 48.0)]
                .map(|(x, y)| Some(FeedbackEvent::Click { x, y })),
        );

        let (_, baseline) = startup(&config, &mut source, &mut sink).unwrap();
        assert_eq!(baseline.box_bottom_distance, 90);
        assert_eq!(source.grabs, 5);
    }
}
