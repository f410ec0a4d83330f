use std::fmt;

use image::RgbImage;

use crate::error::VideoError;

/// Number of interleaved channels every frame carries.
pub const CHANNELS: u8 = 3;

/// Byte order of the three color channels within a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    /// Blue, green, red. What the decoder produces.
    Bgr,
    /// Red, green, blue. What images are displayed and saved in.
    Rgb,
}

impl fmt::Display for ChannelOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelOrder::Bgr => write!(f, "bgr"),
            ChannelOrder::Rgb => write!(f, "rgb"),
        }
    }
}

/// A single decoded image buffer, interleaved row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Channels per pixel. Anything other than [`CHANNELS`] is rejected by [`Frame::validate`].
    pub channels: u8,
    pub order: ChannelOrder,
    pub data: Vec<u8>,
}

impl Frame {
    /// Wrap a raw 3-channel buffer. The buffer is not checked here; see [`Frame::validate`].
    pub fn from_raw(width: u32, height: u32, order: ChannelOrder, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            channels: CHANNELS,
            order,
            data,
        }
    }

    /// A frame where every pixel has the same channel values, given in `order`.
    pub fn solid(width: u32, height: u32, order: ChannelOrder, pixel: [u8; 3]) -> Self {
        let pixels = width as usize * height as usize;
        let data = pixel.iter().copied().cycle().take(pixels * 3).collect();
        Self::from_raw(width, height, order, data)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Check that this is a non-empty 3-channel buffer whose length matches its dimensions.
    pub fn validate(&self) -> Result<(), VideoError> {
        if self.channels != CHANNELS {
            return Err(VideoError::InvalidInput(format!(
                "expected {CHANNELS} channels, got {}",
                self.channels
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(VideoError::InvalidInput(format!(
                "frame has no pixels ({}x{})",
                self.width, self.height
            )));
        }
        let expected = self.pixel_count() * CHANNELS as usize;
        if self.data.len() != expected {
            return Err(VideoError::InvalidInput(format!(
                "buffer holds {} bytes, {}x{}x{CHANNELS} needs {expected}",
                self.data.len(),
                self.width,
                self.height
            )));
        }
        Ok(())
    }

    /// Return a copy of this frame with its channels rearranged into `order`.
    pub fn reorder(&self, order: ChannelOrder) -> Result<Frame, VideoError> {
        self.validate()?;

        let data = if order == self.order {
            self.data.clone()
        } else {
            // Both supported orders are each other's reverse.
            self.data
                .chunks_exact(3)
                .flat_map(|px| [px[2], px[1], px[0]])
                .collect()
        };

        Ok(Frame {
            width: self.width,
            height: self.height,
            channels: CHANNELS,
            order,
            data,
        })
    }

    /// Convert into an [`RgbImage`] for saving or drawing, reordering if needed.
    pub fn to_rgb_image(&self) -> Result<RgbImage, VideoError> {
        let rgb = self.reorder(ChannelOrder::Rgb)?;
        RgbImage::from_raw(rgb.width, rgb.height, rgb.data).ok_or_else(|| {
            VideoError::InvalidInput("buffer does not fit an RGB image".to_string())
        })
    }
}
