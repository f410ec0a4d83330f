//! Interactive frame viewer state.
//!
//! A [`Viewer`] keeps one open source per loaded path and a single selected
//! frame index. Changing the selection re-reads and re-summarizes that frame.
//! Loading a different path drops the previous source and resets the selection.

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::color::{summarize, AverageColor};
use crate::error::VideoError;
use crate::video::decoder::FfmpegSource;
use crate::video::frame::Frame;
use crate::video::{read_frame_at, VideoMetadata, VideoSource};

/// Opens a source for a path.
pub type Opener<S> = Box<dyn FnMut(&Path) -> Result<S, VideoError>>;

/// What the viewer shows for the selected frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewedFrame {
    pub index: u64,
    /// RGB copy of the decoded frame, ready to display or save.
    pub image: Frame,
    pub average: AverageColor,
}

struct LoadedVideo<S> {
    path: PathBuf,
    source: S,
    metadata: VideoMetadata,
}

pub struct Viewer<S> {
    opener: Opener<S>,
    loaded: Option<LoadedVideo<S>>,
    selected: u64,
}

impl Viewer<FfmpegSource> {
    /// A viewer that decodes files with ffmpeg.
    pub fn ffmpeg() -> Self {
        Self::new(Box::new(FfmpegSource::open))
    }
}

impl<S: VideoSource> Viewer<S> {
    pub fn new(opener: Opener<S>) -> Self {
        Self {
            opener,
            loaded: None,
            selected: 0,
        }
    }

    /// Load `path`, reusing the open source if it is already the current video.
    ///
    /// A video reporting zero frames stays loaded but returns [`VideoError::EmptyVideo`].
    pub fn load(&mut self, path: &Path) -> Result<VideoMetadata, VideoError> {
        let cached = self.loaded.as_ref().filter(|v| v.path == path);
        let metadata = match cached {
            Some(video) => video.metadata,
            None => {
                // Release the old handle before opening the new one.
                self.loaded = None;
                self.selected = 0;

                let source = (self.opener)(path).inspect_err(|e| {
                    error!(?path, error = %e, "failed to load video");
                })?;
                let metadata = source.metadata();
                info!(
                    ?path,
                    frame_count = metadata.frame_count,
                    fps = metadata.fps,
                    duration_seconds = metadata.duration_seconds(),
                    "video loaded"
                );
                self.loaded = Some(LoadedVideo {
                    path: path.to_path_buf(),
                    source,
                    metadata,
                });
                metadata
            }
        };

        if metadata.frame_count == 0 {
            warn!(?path, "loaded video has no frames");
            return Err(VideoError::EmptyVideo {
                path: path.to_path_buf(),
            });
        }
        Ok(metadata)
    }

    pub fn path(&self) -> Option<&Path> {
        self.loaded.as_ref().map(|v| v.path.as_path())
    }

    pub fn selected(&self) -> u64 {
        self.selected
    }

    /// Select frame `index` and return it with its average color.
    ///
    /// The selection is kept even if the frame cannot be read, so another index can be tried.
    pub fn select(&mut self, index: u64) -> Result<ViewedFrame, VideoError> {
        let video = self.loaded.as_mut().ok_or(VideoError::NoVideoLoaded)?;
        self.selected = index;

        let frame = read_frame_at(&mut video.source, index)?;
        let (image, average) = summarize(&frame)?;
        info!(index, %average, "frame selected");

        Ok(ViewedFrame {
            index,
            image,
            average,
        })
    }

    /// Re-read the currently selected frame.
    pub fn current(&mut self) -> Result<ViewedFrame, VideoError> {
        self.select(self.selected)
    }
}
