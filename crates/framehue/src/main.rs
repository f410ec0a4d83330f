mod cli;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use prost::Message;
use tracing::{info, warn};

use framehue_core::pipeline::{self, PipelineConfig};
use framehue_core::render::SwatchRenderer;
use framehue_core::viewer::Viewer;
use framehue_proto::proto::ColorReport;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = cli::Cli::parse();

    match cli.command {
        cli::Command::Sample {
            input,
            output,
            interval,
            frames_dir,
            font,
        } => {
            info!(?input, ?output, interval, "starting sampling");

            let config = PipelineConfig {
                interval,
                frames_dir,
                font_path: font,
            };

            let report = pipeline::run_pipeline(&input, &config).context("pipeline failed")?;

            if report.frames.is_empty() {
                warn!("no frames sampled from video");
            }
            for frame in &report.frames {
                println!(
                    "Frame {} -> RGB = ({:?}, {:?}, {:?})",
                    frame.frame_index, frame.red, frame.green, frame.blue
                );
            }

            if let Some(output) = output {
                write_report(&report, &output)?;
            }

            info!(sampled_frames = report.frames.len(), "sampling complete");
            Ok(())
        }
        cli::Command::Inspect {
            input,
            frame,
            save,
            font,
        } => inspect(&input, frame, save, font),
    }
}

/// Load one video, print its info, and show the average color of `frame`.
fn inspect(input: &Path, frame: u64, save: Option<PathBuf>, font: Option<PathBuf>) -> Result<()> {
    let mut viewer = Viewer::ffmpeg();

    let meta = viewer
        .load(input)
        .context("could not process video, it may be corrupt or have 0 frames")?;
    println!(
        "Duration: {:.2}s ({} frames @ {:.1} FPS)",
        meta.duration_seconds(),
        meta.frame_count,
        meta.fps
    );

    let viewed = viewer
        .select(frame)
        .with_context(|| format!("could not read frame {frame}, try another one"))?;
    println!("Frame {} | Avg RGB = {}", viewed.index, viewed.average);

    if let Some(path) = save {
        let renderer = SwatchRenderer::new(font.as_deref());
        renderer
            .save_frame_to(&viewed.image, viewed.index, &viewed.average, &path)
            .context("failed to save frame")?;
        info!(?path, "frame saved");
    }

    Ok(())
}

/// Serialize the report as length-delimited protobuf and write to file.
fn write_report(report: &ColorReport, output: &Path) -> Result<()> {
    info!(?output, frame_count = report.frames.len(), "writing protobuf output");

    let mut buf = Vec::new();
    report
        .encode_length_delimited(&mut buf)
        .context("failed to encode ColorReport")?;

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).context("failed to create output directory")?;
    }

    std::fs::write(output, &buf)
        .with_context(|| format!("failed to write {}", output.display()))?;

    info!(?output, bytes = buf.len(), "protobuf output written");
    Ok(())
}
