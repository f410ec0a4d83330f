pub mod decoder;
pub mod frame;
pub mod memory;

use tracing::{debug, warn};

use crate::error::VideoError;
use frame::Frame;

/// Container-level facts about an opened video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    /// Frames per second, or 0.0 if the container does not say.
    pub fps: f64,
    /// Total frames, or 0 if unknown or the file is corrupt.
    pub frame_count: u64,
}

impl VideoMetadata {
    pub fn duration_seconds(&self) -> f64 {
        if self.fps > 0.0 {
            self.frame_count as f64 / self.fps
        } else {
            0.0
        }
    }

    /// Seconds from the start of the source to `index`, or 0.0 without a frame rate.
    pub fn timestamp_of(&self, index: u64) -> f64 {
        if self.fps > 0.0 {
            index as f64 / self.fps
        } else {
            0.0
        }
    }
}

/// An opened, decodable video with a read cursor.
///
/// Methods take `&mut self`, so one handle has one reader at a time.
/// Decode resources are released when the source is dropped.
pub trait VideoSource {
    fn metadata(&self) -> VideoMetadata;

    /// Index of the frame the next [`VideoSource::read_next`] returns.
    fn position(&self) -> u64;

    /// Decode the frame under the cursor and advance it, or `None` at end of stream.
    fn read_next(&mut self) -> Result<Option<Frame>, VideoError>;

    /// Move the cursor so the next read returns frame `index`.
    fn seek(&mut self, index: u64) -> Result<(), VideoError>;
}

impl<S: VideoSource + ?Sized> VideoSource for Box<S> {
    fn metadata(&self) -> VideoMetadata {
        (**self).metadata()
    }

    fn position(&self) -> u64 {
        (**self).position()
    }

    fn read_next(&mut self) -> Result<Option<Frame>, VideoError> {
        (**self).read_next()
    }

    fn seek(&mut self, index: u64) -> Result<(), VideoError> {
        (**self).seek(index)
    }
}

/// Seek to `index` and decode exactly one frame.
///
/// Returns [`VideoError::DecodeFailure`] if the index is past the end or nothing decodes there.
pub fn read_frame_at<S: VideoSource + ?Sized>(
    source: &mut S,
    index: u64,
) -> Result<Frame, VideoError> {
    let frame_count = source.metadata().frame_count;
    if index >= frame_count {
        warn!(index, frame_count, "requested frame is past the end of the video");
        return Err(VideoError::decode(
            index,
            format!("video has {frame_count} frames"),
        ));
    }

    source.seek(index)?;
    match source.read_next()? {
        Some(frame) => {
            debug!(index, "read single frame");
            Ok(frame)
        }
        None => {
            warn!(index, "stream ended before requested frame");
            Err(VideoError::decode(index, "end of stream"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemorySource;
    use super::*;

    #[test]
    fn duration_without_fps_is_zero() {
        let meta = VideoMetadata {
            width: 4,
            height: 4,
            fps: 0.0,
            frame_count: 120,
        };
        assert_eq!(meta.duration_seconds(), 0.0);
        assert_eq!(meta.timestamp_of(60), 0.0);
    }

    #[test]
    fn duration_from_count_and_fps() {
        let meta = VideoMetadata {
            width: 4,
            height: 4,
            fps: 30.0,
            frame_count: 90,
        };
        assert_eq!(meta.duration_seconds(), 3.0);
        assert_eq!(meta.timestamp_of(15), 0.5);
    }

    #[test]
    fn read_frame_at_returns_requested_frame() {
        let mut source = MemorySource::synthetic(10, 2, 2, 25.0);
        let frame = read_frame_at(&mut source, 7).unwrap();
        assert_eq!(frame, MemorySource::synthetic_frame(7, 2, 2));
        assert_eq!(source.position(), 8);
    }

    #[test]
    fn read_frame_at_past_end_is_decode_failure() {
        let mut source = MemorySource::synthetic(10, 2, 2, 25.0);
        let err = read_frame_at(&mut source, 10).unwrap_err();
        assert!(matches!(err, VideoError::DecodeFailure { index: 10, .. }));

        // The handle stays usable afterwards.
        assert!(read_frame_at(&mut source, 3).is_ok());
    }

    #[test]
    fn read_frame_at_works_through_a_box() {
        let mut source: Box<dyn VideoSource> = Box::new(MemorySource::synthetic(3, 1, 1, 1.0));
        assert!(read_frame_at(&mut source, 2).is_ok());
    }
}
