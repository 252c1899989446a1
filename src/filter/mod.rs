//! Temporal smoothing over a ring buffer of recent frames.
//!
//! A single [`TemporalBuffer`] holds the history; the reduction (average or
//! median) is chosen per call through [`Reduction`]. Both reductions sample
//! buffer slots `0, stride, 2 * stride, ...` up to the fill count.

use crate::config::{TemporalConfig, TemporalMode};
use crate::frame::{assert_same_layout, Channel, DepthFrame, Frame};
use image::Pixel;

/// How buffered frames are combined into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    /// Equally weighted mean of the sampled frames.
    Average,
    /// Per-sample upper median of the sampled frames.
    Median,
}

/// Fixed-capacity ring buffer of frames.
#[derive(Clone)]
pub struct TemporalBuffer<P: Pixel> {
    frames: Vec<Frame<P>>,
    capacity: usize,
    cursor: usize,
}

impl<P: Pixel> std::fmt::Debug for TemporalBuffer<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemporalBuffer")
            .field("len", &self.frames.len())
            .field("capacity", &self.capacity)
            .field("cursor", &self.cursor)
            .finish()
    }
}

impl<P> TemporalBuffer<P>
where
    P: Pixel,
    P::Subpixel: Channel,
{
    /// Callers bypass smoothing entirely instead of creating a zero-capacity
    /// buffer.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "temporal buffer capacity must be positive");
        Self {
            frames: Vec::with_capacity(capacity),
            capacity,
            cursor: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frames currently resident.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Resident frames in slot order.
    pub fn frames(&self) -> &[Frame<P>] {
        &self.frames
    }

    /// Store a copy of `frame`.
    pub fn push(&mut self, frame: &Frame<P>) {
        self.push_owned(frame.clone());
    }

    /// Store `frame`, overwriting the oldest slot once full.
    pub fn push_owned(&mut self, frame: Frame<P>) {
        if let Some(first) = self.frames.first() {
            assert_same_layout(first, &frame);
        }

        if self.frames.len() < self.capacity {
            self.frames.push(frame);
        } else {
            self.frames[self.cursor] = frame;
        }
        self.cursor = (self.cursor + 1) % self.capacity;
    }

    pub fn reduce(&self, reduction: Reduction, stride: usize) -> Frame<P> {
        match reduction {
            Reduction::Average => self.average(stride),
            Reduction::Median => self.median(stride),
        }
    }

    pub fn average(&self, stride: usize) -> Frame<P> {
        let sampled = self.sampled(stride);
        let weight = 1.0 / sampled.len() as f64;

        let first = sampled[0];
        let mut sums = vec![0.0f64; first.as_raw().len()];
        for frame in &sampled {
            for (sum, &v) in sums.iter_mut().zip(frame.as_raw().iter()) {
                *sum += weight * v.to_f64();
            }
        }

        let mut output = Frame::<P>::new(first.width(), first.height());
        for (out, sum) in output.iter_mut().zip(sums) {
            *out = P::Subpixel::from_f64_saturating(sum);
        }
        output
    }

    pub fn median(&self, stride: usize) -> Frame<P> {
        let sampled = self.sampled(stride);
        let mid = sampled.len() / 2;

        let first = sampled[0];
        let mut output = Frame::<P>::new(first.width(), first.height());
        let mut values: Vec<P::Subpixel> = Vec::with_capacity(sampled.len());

        for (i, out) in output.iter_mut().enumerate() {
            values.clear();
            values.extend(sampled.iter().map(|f| f.as_raw()[i]));
            values.sort_unstable();
            *out = values[mid];
        }
        output
    }

    fn sampled(&self, stride: usize) -> Vec<&Frame<P>> {
        assert!(!self.frames.is_empty(), "temporal buffer is empty");
        assert!(stride >= 1, "temporal stride must be at least 1");
        self.frames.iter().step_by(stride).collect()
    }
}

/// Depth smoothing stage configured from [`TemporalConfig`].
#[derive(Debug, Clone)]
pub struct TemporalFilter {
    buffer: TemporalBuffer<image::Luma<u16>>,
    reduction: Reduction,
    stride: usize,
}

impl TemporalFilter {
    /// `None` when smoothing is disabled.
    pub fn from_config(config: &TemporalConfig) -> Option<Self> {
        let reduction = match config.mode {
            TemporalMode::None => return None,
            TemporalMode::Average => Reduction::Average,
            TemporalMode::Median => Reduction::Median,
        };
        if config.depth == 0 {
            return None;
        }

        Some(Self {
            buffer: TemporalBuffer::new(config.depth),
            reduction,
            stride: config.stride.max(1),
        })
    }

    pub fn reduction(&self) -> Reduction {
        self.reduction
    }

    /// Add a frame and return the smoothed result.
    pub fn apply(&mut self, frame: DepthFrame) -> DepthFrame {
        self.buffer.push_owned(frame);
        self.buffer.reduce(self.reduction, self.stride)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::uniform_depth;
    use image::{Luma, Rgb};

    fn depth_values(values: &[u16]) -> DepthFrame {
        DepthFrame::from_fn(values.len() as u32, 1, |x, _| Luma([values[x as usize]]))
    }

    #[test]
    fn test_wrap_replaces_oldest() {
        let mut buffer = TemporalBuffer::new(3);
        for v in 1..=5u16 {
            buffer.push(&uniform_depth(2, 2, v));
        }
        assert_eq!(buffer.len(), 3);
        let resident: Vec<u16> = buffer.frames().iter().map(|f| f.get_pixel(0, 0)[0]).collect();
        assert_eq!(resident, vec![4, 5, 3]);
    }

    #[test]
    fn test_average_of_identical_frames_is_exact() {
        let frame = DepthFrame::from_fn(5, 4, |x, y| Luma([1000 + (x * 37 + y * 11) as u16]));
        for n in [1, 3, 7, 10] {
            let mut buffer = TemporalBuffer::new(n);
            for _ in 0..n {
                buffer.push(&frame);
            }
            assert_eq!(buffer.average(1), frame);
        }
    }

    #[test]
    fn test_average_with_stride() {
        let mut buffer = TemporalBuffer::new(5);
        for v in [10u16, 99, 20, 99, 30] {
            buffer.push(&uniform_depth(1, 1, v));
        }
        // Slots 0, 2, 4.
        assert_eq!(buffer.average(2).get_pixel(0, 0)[0], 20);
        // Slots 0, 3: weight 1/2.
        assert_eq!(buffer.average(3).get_pixel(0, 0)[0], 55);
    }

    #[test]
    fn test_median_odd_and_even() {
        let mut buffer = TemporalBuffer::new(4);
        buffer.push(&depth_values(&[5, 1]));
        buffer.push(&depth_values(&[1, 2]));
        buffer.push(&depth_values(&[3, 9]));
        assert_eq!(buffer.median(1), depth_values(&[3, 2]));

        buffer.push(&depth_values(&[4, 7]));
        // Sorted [1, 3, 4, 5] and [1, 2, 7, 9]: index 2 is the upper median.
        assert_eq!(buffer.median(1), depth_values(&[4, 7]));
    }

    #[test]
    fn test_median_on_color_frames() {
        let mut buffer = TemporalBuffer::new(3);
        for c in [[10u8, 200, 0], [30, 100, 255], [20, 150, 128]] {
            buffer.push_owned(image::RgbImage::from_pixel(2, 1, Rgb(c)));
        }
        let median = buffer.reduce(Reduction::Median, 1);
        assert_eq!(median.get_pixel(1, 0), &Rgb([20, 150, 128]));
    }

    #[test]
    #[should_panic(expected = "frame dimensions differ")]
    fn test_mismatched_frames_panic() {
        let mut buffer = TemporalBuffer::new(2);
        buffer.push(&uniform_depth(2, 2, 1));
        buffer.push(&uniform_depth(3, 2, 1));
    }

    #[test]
    fn test_filter_from_config() {
        let disabled = TemporalConfig::default();
        assert!(TemporalFilter::from_config(&disabled).is_none());

        let config = TemporalConfig {
            mode: TemporalMode::Median,
            depth: 3,
            stride: 1,
        };
        let mut filter = TemporalFilter::from_config(&config).unwrap();
        assert_eq!(filter.reduction(), Reduction::Median);
        filter.apply(uniform_depth(1, 1, 100));
        filter.apply(uniform_depth(1, 1, 900));
        let out = filter.apply(uniform_depth(1, 1, 110));
        assert_eq!(out.get_pixel(0, 0)[0], 110);
    }
}
