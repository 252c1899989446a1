//! Calibration state machine and strategy fallback chain.

use super::corners::CornerClusterStrategy;
use super::feedback::FeedbackSink;
use super::homography::{CorrespondencePair, Transform};
use super::manual::ManualStrategy;
use super::marker::MarkerSequenceStrategy;
use crate::camera::FrameSource;
use crate::config::{CalibrationStrategy, SandboxConfig};
use crate::error::{Result, SandboxError};

/// Result of running one strategy to completion.
///
/// Giving up is not an error: only acquisition failures are, and those are
/// returned through `Result` instead.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyOutcome {
    Found(CorrespondencePair),
    Failed(String),
}

/// State of the calibration coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationState {
    /// Waiting to start.
    Idle,
    /// Running a strategy; `attempt` is its 1-based position in the chain.
    Running {
        strategy: CalibrationStrategy,
        attempt: usize,
    },
    /// A transform was built.
    Complete { strategy: CalibrationStrategy },
    /// Calibration ended without a transform.
    Failed(String),
}

impl CalibrationState {
    pub fn is_idle(&self) -> bool {
        matches!(self, CalibrationState::Idle)
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, CalibrationState::Complete { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CalibrationState::Failed(_))
    }
}

impl std::fmt::Display for CalibrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalibrationState::Idle => write!(f, "Idle"),
            CalibrationState::Running { strategy, attempt } => {
                write!(f, "Running {} (strategy {})", strategy, attempt)
            }
            CalibrationState::Complete { strategy } => write!(f, "Complete ({})", strategy),
            CalibrationState::Failed(msg) => write!(f, "Failed: {}", msg),
        }
    }
}

/// Successful calibration.
#[derive(Debug, Clone)]
pub struct CalibrationResult {
    pub strategy: CalibrationStrategy,
    pub correspondence: CorrespondencePair,
    pub transform: Transform,
}

/// Runs the configured strategies until one yields a transform.
pub struct CalibrationCoordinator {
    config: SandboxConfig,
    state: CalibrationState,
    failures: Vec<(CalibrationStrategy, String)>,
}

impl CalibrationCoordinator {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config,
            state: CalibrationState::Idle,
            failures: Vec::new(),
        }
    }

    pub fn state(&self) -> &CalibrationState {
        &self.state
    }

    /// Strategies that gave up before the current one, with their reasons.
    pub fn failures(&self) -> &[(CalibrationStrategy, String)] {
        &self.failures
    }

    /// Run a single strategy.
    pub fn acquire_correspondence(
        &self,
        strategy: CalibrationStrategy,
        source: &mut dyn FrameSource,
        sink: &mut dyn FeedbackSink,
    ) -> Result<StrategyOutcome> {
        match strategy {
            CalibrationStrategy::Manual => ManualStrategy::new(&self.config).acquire(source, sink),
            CalibrationStrategy::MarkerSequence => {
                MarkerSequenceStrategy::new(&self.config).acquire(source, sink)
            }
            CalibrationStrategy::CornerCluster => {
                CornerClusterStrategy::new(&self.config).acquire(source, sink)
            }
        }
    }

    /// Walk the strategy chain. Automatic strategies fall through to the
    /// next one on failure; a manual failure ends calibration.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FeedbackSink,
    ) -> Result<CalibrationResult> {
        self.failures.clear();
        let result = self.run_chain(source, sink);
        sink.close();

        if let Err(e) = &result {
            log::error!("Calibration failed: {}", e);
            self.state = CalibrationState::Failed(e.to_string());
        }
        result
    }

    fn run_chain(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FeedbackSink,
    ) -> Result<CalibrationResult> {
        for (i, strategy) in self.config.strategy_chain().into_iter().enumerate() {
            self.state = CalibrationState::Running {
                strategy,
                attempt: i + 1,
            };
            log::info!("Calibrating with the {} strategy", strategy);

            let reason = match self.acquire_correspondence(strategy, source, sink)? {
                StrategyOutcome::Found(correspondence) => {
                    match Transform::build(&correspondence) {
                        Ok(transform) => {
                            self.state = CalibrationState::Complete { strategy };
                            log::info!("Calibration complete using the {} strategy", strategy);
                            return Ok(CalibrationResult {
                                strategy,
                                correspondence,
                                transform,
                            });
                        }
                        Err(e) if strategy == CalibrationStrategy::Manual => return Err(e),
                        Err(e) => e.to_string(),
                    }
                }
                StrategyOutcome::Failed(reason) => {
                    if strategy == CalibrationStrategy::Manual {
                        return Err(SandboxError::CalibrationFailed(reason));
                    }
                    reason
                }
            };

            log::warn!(
                "The {} strategy failed ({}), falling back to the next strategy",
                strategy,
                reason
            );
            self.failures.push((strategy, reason));
        }

        Err(SandboxError::CalibrationFailed(
            "No calibration strategy left".to_string(),
        ))
    }
}
