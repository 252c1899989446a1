//! Feedback boundary between calibration and whatever displays its images.
//!
//! Calibration shows images through a [`FeedbackSink`] and polls it for input
//! events. Clicks and abort requests travel over a channel so the strategies
//! never depend on a particular windowing or input mechanism.

use crate::frame::ColorFrame;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

/// Where a calibration image should be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    /// Operator monitor showing the camera view with overlays.
    Monitor,
    /// Projector output used for calibration markers.
    Projector,
}

/// Input event delivered to a running calibration strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeedbackEvent {
    /// Click in camera image coordinates.
    Click { x: f64, y: f64 },
    /// Cancel the running strategy.
    Abort,
}

/// Display and input collaborator used during calibration.
pub trait FeedbackSink {
    /// Show an image on a surface.
    fn show(&mut self, surface: Surface, image: &ColorFrame);

    /// Wait up to `timeout` for the next input event.
    ///
    /// Implementations must block until an event arrives or `timeout`
    /// elapses. [`wait_for_abort`] polls in a loop until its deadline, so a
    /// sink that returns `None` immediately is spun on and consumes any
    /// queued input as fast as it can.
    fn poll_event(&mut self, timeout: Duration) -> Option<FeedbackEvent>;

    /// Calibration finished with the surfaces no longer needed.
    fn close(&mut self) {}
}

/// Poll `sink` until `duration` has passed. Returns `true` on abort; clicks
/// arriving meanwhile are dropped.
pub fn wait_for_abort(sink: &mut dyn FeedbackSink, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match sink.poll_event(remaining) {
            Some(FeedbackEvent::Abort) => return true,
            Some(FeedbackEvent::Click { .. }) | None => {}
        }
        if Instant::now() >= deadline {
            return false;
        }
    }
}

/// Sending half handed to input producers.
#[derive(Debug, Clone)]
pub struct FeedbackSender {
    tx: Sender<FeedbackEvent>,
}

impl FeedbackSender {
    pub fn click(&self, x: f64, y: f64) {
        self.send(FeedbackEvent::Click { x, y });
    }

    pub fn abort(&self) {
        self.send(FeedbackEvent::Abort);
    }

    fn send(&self, event: FeedbackEvent) {
        if self.tx.send(event).is_err() {
            log::warn!("Feedback receiver dropped, event {:?} lost", event);
        }
    }
}

/// Channel-backed sink that hands shown images to an optional callback.
pub struct ChannelFeedback {
    rx: Receiver<FeedbackEvent>,
    on_show: Option<Box<dyn FnMut(Surface, &ColorFrame) + Send>>,
    shown: usize,
}

impl ChannelFeedback {
    /// Create a sink and the sender feeding its event queue.
    pub fn new() -> (Self, FeedbackSender) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (
            Self {
                rx,
                on_show: None,
                shown: 0,
            },
            FeedbackSender { tx },
        )
    }

    /// Forward every shown image to `callback`.
    pub fn with_display(mut self, callback: impl FnMut(Surface, &ColorFrame) + Send + 'static) -> Self {
        self.on_show = Some(Box::new(callback));
        self
    }

    /// Number of images shown so far.
    pub fn shown_count(&self) -> usize {
        self.shown
    }
}

impl FeedbackSink for ChannelFeedback {
    fn show(&mut self, surface: Surface, image: &ColorFrame) {
        self.shown += 1;
        if let Some(callback) = self.on_show.as_mut() {
            callback(surface, image);
        }
    }

    fn poll_event(&mut self, timeout: Duration) -> Option<FeedbackEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) => None,
            // Every sender is gone: nobody can finish the calibration any more.
            Err(RecvTimeoutError::Disconnected) => Some(FeedbackEvent::Abort),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_events_arrive_in_order() {
        let (mut sink, sender) = ChannelFeedback::new();
        sender.click(1.0, 2.0);
        sender.abort();

        assert_eq!(
            sink.poll_event(Duration::ZERO),
            Some(FeedbackEvent::Click { x: 1.0, y: 2.0 })
        );
        assert_eq!(sink.poll_event(Duration::ZERO), Some(FeedbackEvent::Abort));
        assert_eq!(sink.poll_event(Duration::from_millis(1)), None);
    }

    #[test]
    fn test_wait_for_abort_drops_clicks() {
        let (mut sink, sender) = ChannelFeedback::new();
        sender.click(3.0, 4.0);
        assert!(!wait_for_abort(&mut sink, Duration::from_millis(5)));
        assert_eq!(sink.poll_event(Duration::ZERO), None);

        sender.abort();
        assert!(wait_for_abort(&mut sink, Duration::from_millis(5)));
    }

    #[test]
    fn test_poll_blocks_until_timeout() {
        let (mut sink, _sender) = ChannelFeedback::new();
        let timeout = Duration::from_millis(20);
        let start = Instant::now();
        assert_eq!(sink.poll_event(timeout), None);
        assert!(start.elapsed() >= timeout);
    }

    #[test]
    fn test_dropped_sender_aborts() {
        let (mut sink, sender) = ChannelFeedback::new();
        drop(sender);
        assert_eq!(sink.poll_event(Duration::ZERO), Some(FeedbackEvent::Abort));
    }

    #[test]
    fn test_show_invokes_display() {
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&counter);
        let (sink, _sender) = ChannelFeedback::new();
        let mut sink = sink.with_display(move |surface, _| {
            if surface == Surface::Projector {
                seen.fetch_add(1, Ordering::Relaxed);
            }
        });

        let image = ColorFrame::new(2, 2);
        sink.show(Surface::Projector, &image);
        sink.show(Surface::Monitor, &image);

        assert_eq!(sink.shown_count(), 2);
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }
}
