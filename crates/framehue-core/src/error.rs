use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by video sources, the sampler and the summarizer.
///
/// Messages are written to be shown to a user as-is.
#[derive(Debug, Error)]
pub enum VideoError {
    /// The file is missing, unreadable, or not a video ffprobe understands.
    #[error("cannot open video {}: {reason}", path.display())]
    OpenFailure { path: PathBuf, reason: String },

    /// A specific frame could not be decoded. Another index may still work.
    #[error("could not read frame {index}: {reason}")]
    DecodeFailure { index: u64, reason: String },

    /// A frame buffer that is not a well-formed 3-channel image.
    #[error("invalid frame: {0}")]
    InvalidInput(String),

    #[error("sampling interval must be >= 1, got {0}")]
    InvalidInterval(u32),

    #[error("no video loaded")]
    NoVideoLoaded,

    #[error("video {} has no frames, it may be corrupt", path.display())]
    EmptyVideo { path: PathBuf },
}

impl VideoError {
    pub(crate) fn open(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        VideoError::OpenFailure {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn decode(index: u64, reason: impl Into<String>) -> Self {
        VideoError::DecodeFailure {
            index,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_distinguish_failure_kinds() {
        let open = VideoError::open("missing.mp4", "file does not exist");
        let decode = VideoError::decode(42, "end of stream");
        let empty = VideoError::EmptyVideo {
            path: PathBuf::from("blank.mp4"),
        };

        assert_eq!(
            open.to_string(),
            "cannot open video missing.mp4: file does not exist"
        );
        assert_eq!(decode.to_string(), "could not read frame 42: end of stream");
        assert_eq!(
            empty.to_string(),
            "video blank.mp4 has no frames, it may be corrupt"
        );
    }
}
