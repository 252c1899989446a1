//! Scripted collaborators for calibration tests.

use super::feedback::{FeedbackEvent, FeedbackSink, Surface};
use crate::camera::FrameSource;
use crate::error::{Result, SandboxError};
use crate::frame::{ColorFrame, DepthFrame};
use std::collections::VecDeque;
use std::time::Duration;

/// Frame source cycling through fixed color frames.
pub struct ScriptedSource {
    frames: Vec<ColorFrame>,
    pub grabs: usize,
    /// Fail every grab after this many.
    pub fail_after: Option<usize>,
}

impl ScriptedSource {
    pub fn new(frames: Vec<ColorFrame>) -> Self {
        Self {
            frames,
            grabs: 0,
            fail_after: None,
        }
    }
}

impl FrameSource for ScriptedSource {
    fn grab(&mut self) -> Result<()> {
        if self.fail_after.is_some_and(|n| self.grabs >= n) {
            return Err(SandboxError::Acquisition("Failed to grab".to_string()));
        }
        self.grabs += 1;
        Ok(())
    }

    fn retrieve_color(&mut self) -> Result<ColorFrame> {
        let index = (self.grabs.max(1) - 1) % self.frames.len();
        Ok(self.frames[index].clone())
    }

    fn retrieve_depth(&mut self) -> Result<DepthFrame> {
        let (w, h) = self.frames[0].dimensions();
        Ok(DepthFrame::new(w, h))
    }
}

/// Sink replaying one scripted answer per poll, then `None` forever.
#[derive(Default)]
pub struct ScriptedSink {
    script: VecDeque<Option<FeedbackEvent>>,
    pub polls: usize,
    pub shown: Vec<Surface>,
    pub closed: bool,
}

impl ScriptedSink {
    pub fn new(script: impl IntoIterator<Item = Option<FeedbackEvent>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            ..Default::default()
        }
    }

    /// `quiet` empty polls followed by an abort.
    pub fn abort_after(quiet: usize) -> Self {
        Self::new(std::iter::repeat(None).take(quiet).chain([Some(FeedbackEvent::Abort)]))
    }

    pub fn push(&mut self, event: Option<FeedbackEvent>) {
        self.script.push_back(event);
    }
}

impl FeedbackSink for ScriptedSink {
    fn show(&mut self, surface: Surface, _image: &ColorFrame) {
        self.shown.push(surface);
    }

    fn poll_event(&mut self, _timeout: Duration) -> Option<FeedbackEvent> {
        self.polls += 1;
        self.script.pop_front().flatten()
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
