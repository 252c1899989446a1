//! Camera input module for the sandbox.
//!
//! Device access lives outside this crate; everything here talks to a
//! [`FrameSource`]. [`ReplaySource`] plays back recorded frame pairs.

mod replay;

pub use replay::ReplaySource;

use crate::error::Result;
use crate::frame::{ColorFrame, DepthFrame};

/// Depth camera delivering paired color and depth channels.
///
/// Frame dimensions stay constant for a session. Any failure is an
/// acquisition error and is fatal to the caller.
pub trait FrameSource {
    /// Block until the next frame set is captured.
    fn grab(&mut self) -> Result<()>;

    /// Color channel of the last grabbed frame set.
    fn retrieve_color(&mut self) -> Result<ColorFrame>;

    /// Depth channel (millimetres) of the last grabbed frame set.
    fn retrieve_depth(&mut self) -> Result<DepthFrame>;

    fn grab_color(&mut self) -> Result<ColorFrame> {
        self.grab()?;
        self.retrieve_color()
    }

    fn grab_depth(&mut self) -> Result<DepthFrame> {
        self.grab()?;
        self.retrieve_depth()
    }
}
