use tracing::debug;

use super::frame::{ChannelOrder, Frame};
use super::{VideoMetadata, VideoSource};
use crate::error::VideoError;

/// A video held entirely in memory, e.g. a generated test pattern or an image sequence.
pub struct MemorySource {
    frames: Vec<Frame>,
    metadata: VideoMetadata,
    position: u64,
}

impl MemorySource {
    /// Build a source from already decoded frames. Dimensions come from the first frame.
    pub fn new(frames: Vec<Frame>, fps: f64) -> Self {
        let (width, height) = frames
            .first()
            .map(|f| (f.width, f.height))
            .unwrap_or((0, 0));
        let metadata = VideoMetadata {
            width,
            height,
            fps,
            frame_count: frames.len() as u64,
        };
        Self {
            frames,
            metadata,
            position: 0,
        }
    }

    /// A `frame_count`-frame video where frame `i` is [`MemorySource::synthetic_frame`]`(i)`.
    pub fn synthetic(frame_count: u64, width: u32, height: u32, fps: f64) -> Self {
        let frames = (0..frame_count)
            .map(|i| Self::synthetic_frame(i, width, height))
            .collect();
        Self::new(frames, fps)
    }

    /// Solid BGR frame whose color encodes its index.
    pub fn synthetic_frame(index: u64, width: u32, height: u32) -> Frame {
        let pixel = [
            (index % 256) as u8,
            (index * 2 % 256) as u8,
            (index * 3 % 256) as u8,
        ];
        Frame::solid(width, height, ChannelOrder::Bgr, pixel)
    }

    /// Override the reported frame count, as a container with bad metadata would.
    pub fn with_reported_frame_count(mut self, frame_count: u64) -> Self {
        self.metadata.frame_count = frame_count;
        self
    }
}

impl VideoSource for MemorySource {
    fn metadata(&self) -> VideoMetadata {
        self.metadata
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn read_next(&mut self) -> Result<Option<Frame>, VideoError> {
        let Some(frame) = self.frames.get(self.position as usize) else {
            debug!(position = self.position, "memory source exhausted");
            return Ok(None);
        };
        self.position += 1;
        Ok(Some(frame.clone()))
    }

    fn seek(&mut self, index: u64) -> Result<(), VideoError> {
        self.position = index;
        Ok(())
    }
}
