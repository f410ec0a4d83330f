//! Frame sampling and average-color statistics for video files.
//!
//! [`sampler::sample`] walks a video at a fixed stride, [`color::summarize`]
//! reduces one frame to its mean color, and [`viewer::Viewer`] ties both to a
//! single selected frame for interactive scrubbing.

pub mod color;
pub mod error;
pub mod pipeline;
pub mod render;
pub mod sampler;
pub mod video;
pub mod viewer;

pub use color::{summarize, AverageColor};
pub use error::VideoError;
pub use sampler::{sample, FrameSampler, SampledFrame};
pub use video::frame::{ChannelOrder, Frame};
pub use video::{read_frame_at, VideoMetadata, VideoSource};
