use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{error, info, warn};

use framehue_proto::proto::{ColorReport, FrameColor, SourceMetadata};

use crate::color::summarize;
use crate::error::VideoError;
use crate::render::SwatchRenderer;
use crate::sampler::{self, FrameSampler};
use crate::video::{VideoMetadata, VideoSource};

/// Parameters for the sampling pipeline.
pub struct PipelineConfig {
    /// Summarize every Nth decoded frame (1 = every frame).
    pub interval: u32,
    /// Directory to write annotated frame images, or None to skip.
    pub frames_dir: Option<PathBuf>,
    /// Font for the caption on saved frames. Without one only the swatch is drawn.
    pub font_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            interval: 30,
            frames_dir: None,
            font_path: None,
        }
    }
}

/// Sample a video file and report the average color of each sampled frame.
///
/// A video that cannot be opened is logged and produces a report with no frames.
pub fn run_pipeline(input: &Path, config: &PipelineConfig) -> Result<ColorReport> {
    if config.interval < 1 {
        bail!("interval must be >= 1, got {}", config.interval);
    }

    info!(?input, interval = config.interval, "pipeline starting");

    let mut sampler = match sampler::sample(input, config.interval) {
        Ok(sampler) => sampler,
        Err(e @ VideoError::OpenFailure { .. }) => {
            error!(error = %e, "cannot open video, nothing to sample");
            return Ok(empty_report(input, config.interval));
        }
        Err(e) => return Err(e).context("failed to start sampling"),
    };

    let renderer = match &config.frames_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            info!(?dir, "frames directory ready");
            Some(SwatchRenderer::new(config.font_path.as_deref()))
        }
        None => None,
    };
    let output = renderer.as_ref().zip(config.frames_dir.as_deref());

    let metadata = sampler.metadata();
    let frames = collect_frame_colors(&mut sampler, output)?;
    info!(sampled_frames = frames.len(), "pipeline complete");

    Ok(build_report(input, &metadata, config.interval, frames))
}

/// Summarize every frame the sampler yields, optionally saving each one.
pub fn collect_frame_colors<S: VideoSource>(
    sampler: &mut FrameSampler<S>,
    output: Option<(&SwatchRenderer, &Path)>,
) -> Result<Vec<FrameColor>> {
    let mut results = Vec::new();

    for sampled in sampler {
        let sampled = sampled.context("failed to decode video")?;
        let (rgb, average) = summarize(&sampled.frame)
            .with_context(|| format!("failed to summarize frame {}", sampled.index))?;

        info!(frame_index = sampled.index, %average, "frame summarized");

        if let Some((renderer, dir)) = output {
            renderer
                .save_frame(&rgb, sampled.index, &average, dir)
                .context("failed to save frame")?;
        }

        results.push(FrameColor {
            frame_index: sampled.index,
            timestamp_seconds: sampled.timestamp_seconds,
            red: average.red,
            green: average.green,
            blue: average.blue,
        });
    }

    if results.is_empty() {
        warn!("no frames sampled");
    }
    Ok(results)
}

fn build_report(
    input: &Path,
    metadata: &VideoMetadata,
    interval: u32,
    frames: Vec<FrameColor>,
) -> ColorReport {
    ColorReport {
        source: Some(SourceMetadata {
            file_path: input.to_string_lossy().into_owned(),
            frame_count: metadata.frame_count,
            fps: metadata.fps,
        }),
        interval,
        frames,
    }
}

fn empty_report(input: &Path, interval: u32) -> ColorReport {
    ColorReport {
        source: Some(SourceMetadata {
            file_path: input.to_string_lossy().into_owned(),
            frame_count: 0,
            fps: 0.0,
        }),
        interval,
        frames: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::frame::{ChannelOrder, Frame};
    use crate::video::memory::MemorySource;
    use tracing_test::traced_test;

    #[test]
    fn collects_one_color_per_sampled_frame() {
        let mut sampler =
            FrameSampler::new(MemorySource::synthetic(100, 3, 2, 20.0), 20).unwrap();
        let colors = collect_frame_colors(&mut sampler, None).unwrap();

        let indices: Vec<u64> = colors.iter().map(|c| c.frame_index).collect();
        assert_eq!(indices, vec![0, 20, 40, 60, 80]);

        // Synthetic frame 40 is BGR (40, 80, 120).
        let c = &colors[2];
        assert_eq!((c.red, c.green, c.blue), (120.0, 80.0, 40.0));
        assert_eq!(c.timestamp_seconds, 2.0);
    }

    #[test]
    fn report_carries_source_metadata() {
        let source = MemorySource::synthetic(10, 1, 1, 5.0);
        let metadata = source.metadata();
        let mut sampler = FrameSampler::new(source, 5).unwrap();
        let frames = collect_frame_colors(&mut sampler, None).unwrap();

        let report = build_report(Path::new("clip.mp4"), &metadata, 5, frames);
        let src = report.source.unwrap();
        assert_eq!(src.file_path, "clip.mp4");
        assert_eq!(src.frame_count, 10);
        assert_eq!(src.fps, 5.0);
        assert_eq!(report.interval, 5);
        assert_eq!(report.frames.len(), 2);
    }

    #[test]
    fn malformed_frame_propagates() {
        let broken = MemorySource::new(
            vec![Frame::from_raw(2, 2, ChannelOrder::Bgr, vec![0; 5])],
            30.0,
        );
        let mut sampler = FrameSampler::new(broken, 1).unwrap();
        let err = collect_frame_colors(&mut sampler, None).unwrap_err();
        assert!(err.to_string().contains("failed to summarize frame 0"));
    }

    #[test]
    #[traced_test]
    fn unopenable_video_yields_empty_report() {
        let config = PipelineConfig {
            interval: 20,
            ..PipelineConfig::default()
        };
        let report = run_pipeline(Path::new("no/such/video.mp4"), &config).unwrap();
        assert!(report.frames.is_empty());
        assert!(logs_contain("cannot open video"));
    }

    #[test]
    fn zero_interval_is_an_error() {
        let config = PipelineConfig {
            interval: 0,
            ..PipelineConfig::default()
        };
        assert!(run_pipeline(Path::new("clip.mp4"), &config).is_err());
    }
}
