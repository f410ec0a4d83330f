use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "framehue", about = "Average color of video frames")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Sample a video at a fixed stride and report each sampled frame's average color.
    Sample {
        /// Path to the input video file (MP4, MOV, AVI, etc.).
        #[arg(short, long)]
        input: PathBuf,

        /// Path to write the protobuf color report.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Sample every Nth frame.
        #[arg(short = 'n', long, default_value_t = 30)]
        interval: u32,

        /// Directory to save sampled frames with an average-color swatch.
        #[arg(long)]
        frames_dir: Option<PathBuf>,

        /// TrueType font used to caption saved frames.
        #[arg(long)]
        font: Option<PathBuf>,
    },

    /// Show video info and the average color of a single frame.
    Inspect {
        /// Path to the input video file.
        #[arg(short, long)]
        input: PathBuf,

        /// Frame index to read.
        #[arg(short, long, default_value_t = 0)]
        frame: u64,

        /// Save the frame as PNG with an average-color swatch.
        #[arg(long)]
        save: Option<PathBuf>,

        /// TrueType font used to caption the saved frame.
        #[arg(long)]
        font: Option<PathBuf>,
    },
}
