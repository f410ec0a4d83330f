use std::fmt;

use image::Rgb;
use tracing::debug;

use crate::error::VideoError;
use crate::video::frame::{ChannelOrder, Frame};

/// Decimal digits kept in each channel mean.
const PRECISION: i32 = 3;

/// Per-channel mean of a frame, in RGB order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AverageColor {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

impl AverageColor {
    pub fn to_array(self) -> [f64; 3] {
        [self.red, self.green, self.blue]
    }

    /// Nearest 8-bit color, for drawing a swatch.
    pub fn to_rgb8(self) -> Rgb<u8> {
        let clamp = |v: f64| v.round().clamp(0.0, 255.0) as u8;
        Rgb([clamp(self.red), clamp(self.green), clamp(self.blue)])
    }
}

impl fmt::Display for AverageColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Shortest form that round-trips: 30.0, 20.5, 0.125.
        write!(f, "({:?}, {:?}, {:?})", self.red, self.green, self.blue)
    }
}

/// Round half to even at [`PRECISION`] decimals.
fn round_mean(value: f64) -> f64 {
    let factor = 10f64.powi(PRECISION);
    (value * factor).round_ties_even() / factor
}

/// Reorder `frame` to RGB and compute the mean of each channel over all pixels.
///
/// The returned frame is an independent copy; `frame` is left untouched.
/// Malformed buffers are rejected with [`VideoError::InvalidInput`].
pub fn summarize(frame: &Frame) -> Result<(Frame, AverageColor), VideoError> {
    let rgb = frame.reorder(ChannelOrder::Rgb)?;

    let mut sums = [0u64; 3];
    for px in rgb.data.chunks_exact(3) {
        sums[0] += px[0] as u64;
        sums[1] += px[1] as u64;
        sums[2] += px[2] as u64;
    }

    let pixels = rgb.pixel_count() as f64;
    let average = AverageColor {
        red: round_mean(sums[0] as f64 / pixels),
        green: round_mean(sums[1] as f64 / pixels),
        blue: round_mean(sums[2] as f64 / pixels),
    };

    debug!(
        width = rgb.width,
        height = rgb.height,
        source_order = %frame.order,
        %average,
        "summarized frame"
    );

    Ok((rgb, average))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_color_frame_is_exact() {
        let frame = Frame::solid(1, 1, ChannelOrder::Bgr, [10, 20, 30]);
        let (rgb, avg) = summarize(&frame).unwrap();
        assert_eq!(avg.to_array(), [30.0, 20.0, 10.0]);
        assert_eq!(rgb.data, vec![30, 20, 10]);
        assert_eq!(rgb.order, ChannelOrder::Rgb);
    }

    #[test]
    fn large_uniform_frame_has_no_drift() {
        let frame = Frame::solid(1920, 1080, ChannelOrder::Bgr, [255, 128, 1]);
        let (_, avg) = summarize(&frame).unwrap();
        assert_eq!(avg.to_array(), [1.0, 128.0, 255.0]);
    }

    #[test]
    fn mean_is_rounded_to_three_decimals() {
        // Red values 0, 0, 1 -> 0.333...
        let frame = Frame::from_raw(
            3,
            1,
            ChannelOrder::Rgb,
            vec![0, 10, 0, 0, 20, 0, 1, 30, 2],
        );
        let (_, avg) = summarize(&frame).unwrap();
        assert_eq!(avg.red, 0.333);
        assert_eq!(avg.green, 20.0);
        assert_eq!(avg.blue, 0.667);
    }

    #[test]
    fn summarize_is_idempotent_and_leaves_input_alone() {
        let frame = Frame::from_raw(
            2,
            2,
            ChannelOrder::Bgr,
            vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12],
        );
        let before = frame.clone();

        let first = summarize(&frame).unwrap();
        let second = summarize(&frame).unwrap();

        assert_eq!(first.0, second.0);
        assert_eq!(first.1, second.1);
        assert_eq!(frame, before);
    }

    #[test]
    fn rgb_input_is_copied_unchanged() {
        let frame = Frame::from_raw(1, 2, ChannelOrder::Rgb, vec![9, 8, 7, 6, 5, 4]);
        let (rgb, avg) = summarize(&frame).unwrap();
        assert_eq!(rgb, frame);
        assert_eq!(avg.to_array(), [7.5, 6.5, 5.5]);
    }

    #[test]
    fn malformed_frame_is_invalid_input() {
        let truncated = Frame::from_raw(4, 4, ChannelOrder::Bgr, vec![0; 10]);
        assert!(matches!(
            summarize(&truncated),
            Err(VideoError::InvalidInput(_))
        ));

        let empty = Frame::from_raw(0, 0, ChannelOrder::Bgr, Vec::new());
        assert!(matches!(summarize(&empty), Err(VideoError::InvalidInput(_))));
    }

    #[test]
    fn display_prints_plain_floats() {
        let avg = AverageColor {
            red: 30.0,
            green: 20.5,
            blue: 0.125,
        };
        assert_eq!(avg.to_string(), "(30.0, 20.5, 0.125)");
    }

    #[test]
    fn display_of_summarized_frame_matches_caption_format() {
        let frame = Frame::solid(3, 3, ChannelOrder::Bgr, [10, 20, 30]);
        let (_, avg) = summarize(&frame).unwrap();
        assert_eq!(format!("Avg RGB = {avg}"), "Avg RGB = (30.0, 20.0, 10.0)");

        let thirds = Frame::from_raw(3, 1, ChannelOrder::Rgb, vec![0, 0, 0, 0, 0, 0, 1, 2, 0]);
        let (_, avg) = summarize(&thirds).unwrap();
        assert_eq!(avg.to_string(), "(0.333, 0.667, 0.0)");
    }

    #[test]
    fn swatch_color_rounds_and_clamps() {
        let avg = AverageColor {
            red: 12.4,
            green: 12.6,
            blue: 255.0,
        };
        assert_eq!(avg.to_rgb8(), Rgb([12, 13, 255]));
    }
}
