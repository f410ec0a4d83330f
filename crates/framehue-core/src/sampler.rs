use std::iter::FusedIterator;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::VideoError;
use crate::video::decoder::FfmpegSource;
use crate::video::frame::Frame;
use crate::video::{VideoMetadata, VideoSource};

/// A decoded frame together with its position in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledFrame {
    /// 0-based index in source order. Always a multiple of the sampling interval.
    pub index: u64,
    /// Elapsed seconds from the start of the source.
    pub timestamp_seconds: f64,
    pub frame: Frame,
}

/// Lazily decodes a source front to back and yields every `interval`-th frame.
///
/// Frames in between are decoded and dropped. The sequence ends at end of stream,
/// after the reported frame count, or after the first decode error.
/// Restarting means opening a new source.
pub struct FrameSampler<S> {
    source: S,
    interval: u32,
    metadata: VideoMetadata,
    finished: bool,
}

/// Open `path` with ffmpeg and sample it every `interval` frames.
///
/// An interval of 0 is rejected before anything is opened.
pub fn sample(path: &Path, interval: u32) -> Result<FrameSampler<FfmpegSource>, VideoError> {
    if interval == 0 {
        return Err(VideoError::InvalidInterval(interval));
    }
    let source = FfmpegSource::open(path)?;
    FrameSampler::new(source, interval)
}

impl<S: VideoSource> FrameSampler<S> {
    pub fn new(source: S, interval: u32) -> Result<Self, VideoError> {
        if interval == 0 {
            warn!("rejecting sampling interval of 0");
            return Err(VideoError::InvalidInterval(interval));
        }

        let metadata = source.metadata();
        info!(
            interval,
            frame_count = metadata.frame_count,
            fps = metadata.fps,
            "frame sampler ready"
        );

        Ok(Self {
            source,
            interval,
            metadata,
            finished: metadata.frame_count == 0,
        })
    }

    pub fn metadata(&self) -> VideoMetadata {
        self.metadata
    }
}

impl<S: VideoSource> Iterator for FrameSampler<S> {
    type Item = Result<SampledFrame, VideoError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let index = self.source.position();
            if index >= self.metadata.frame_count {
                debug!(index, "reached reported frame count");
                self.finished = true;
                break;
            }

            let frame = match self.source.read_next() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    self.finished = true;
                    break;
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            };

            if index % self.interval as u64 != 0 {
                continue;
            }

            debug!(index, "sampled frame");
            return Some(Ok(SampledFrame {
                index,
                timestamp_seconds: self.metadata.timestamp_of(index),
                frame,
            }));
        }
        None
    }
}

impl<S: VideoSource> FusedIterator for FrameSampler<S> {}
