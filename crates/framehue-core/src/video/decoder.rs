use std::ffi::OsString;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

use anyhow::{bail, Context, Result};
use tracing::{debug, error, info, warn};

use super::frame::{ChannelOrder, Frame};
use super::{VideoMetadata, VideoSource};
use crate::error::VideoError;

/// Video metadata obtained by probing with ffprobe.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ProbeResult {
    width: u32,
    height: u32,
    fps: f64,
    frame_count: u64,
}

fn probe(path: &Path) -> Result<ProbeResult> {
    info!(?path, "probing video metadata with ffprobe");

    let output = Command::new("ffprobe")
        .args([
            "-v", "error",
            "-select_streams", "v:0",
            "-show_entries", "stream=width,height,r_frame_rate,nb_frames,duration",
            "-of", "default=noprint_wrappers=1",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .context("failed to run ffprobe, is ffmpeg installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!(%stderr, ?path, "ffprobe failed");
        bail!("ffprobe failed: {}", stderr.trim());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let result = parse_probe_output(&stdout)?;

    if result.fps <= 0.0 {
        warn!(fps = result.fps, ?path, "video has non-positive fps, timestamps will be 0.0");
    }
    if result.frame_count == 0 {
        warn!(?path, "video reports no frames");
    }

    info!(
        width = result.width,
        height = result.height,
        fps = result.fps,
        frame_count = result.frame_count,
        "probe completed"
    );
    Ok(result)
}

/// Parse ffprobe's `key=value` stream output.
///
/// `nb_frames` is missing for some containers; the count is then estimated from
/// `duration * fps`, and left at 0 when neither is known.
fn parse_probe_output(stdout: &str) -> Result<ProbeResult> {
    let mut width = None;
    let mut height = None;
    let mut fps = 0.0;
    let mut nb_frames = None;
    let mut duration = None;

    for line in stdout.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        if value == "N/A" {
            continue;
        }
        match key {
            "width" => width = Some(value.parse::<u32>().context("failed to parse width")?),
            "height" => height = Some(value.parse::<u32>().context("failed to parse height")?),
            "r_frame_rate" => fps = parse_rate(value)?,
            "nb_frames" => {
                nb_frames = Some(value.parse::<u64>().context("failed to parse nb_frames")?)
            }
            "duration" => {
                duration = Some(value.parse::<f64>().context("failed to parse duration")?)
            }
            _ => {}
        }
    }

    let (Some(width), Some(height)) = (width, height) else {
        error!(%stdout, "ffprobe output has no video dimensions");
        bail!("no video stream found");
    };

    let frame_count = match (nb_frames, duration) {
        (Some(n), _) if n > 0 => n,
        (_, Some(d)) if d > 0.0 && fps > 0.0 => {
            let estimate = (d * fps).round() as u64;
            debug!(duration = d, fps, estimate, "estimated frame count from duration");
            estimate
        }
        _ => 0,
    };

    Ok(ProbeResult {
        width,
        height,
        fps,
        frame_count,
    })
}

/// Parse a frame rate given either as `num/den` or as a plain number.
fn parse_rate(value: &str) -> Result<f64> {
    if let Some((num, den)) = value.split_once('/') {
        let num: f64 = num.parse().context("failed to parse fps numerator")?;
        let den: f64 = den.parse().context("failed to parse fps denominator")?;
        Ok(if den > 0.0 { num / den } else { 0.0 })
    } else {
        value.parse().context("failed to parse fps")
    }
}

/// ffmpeg arguments that decode `path` to raw BGR24 on stdout, starting at frame `start`.
fn decoder_args(path: &Path, start: u64) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-nostdin", "-v", "error", "-noautorotate", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(path.as_os_str().to_owned());
    if start > 0 {
        // Exact frame index, not the nearest keyframe.
        args.push("-vf".into());
        args.push(format!("select=gte(n\\,{start})").into());
    }
    args.extend(
        [
            "-fps_mode", "passthrough",
            "-f", "rawvideo",
            "-pix_fmt", "bgr24",
            "pipe:1",
        ]
        .into_iter()
        .map(OsString::from),
    );
    args
}

/// Bytes of ffmpeg's stderr kept for error messages.
const STDERR_TAIL_BYTES: usize = 4096;

/// Read `pipe` to the end, keeping only the last [`STDERR_TAIL_BYTES`].
///
/// Runs on its own thread so a chatty ffmpeg never blocks on a full stderr pipe.
fn drain_stderr(mut pipe: ChildStderr) -> String {
    let mut tail: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match pipe.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                tail.extend_from_slice(&chunk[..n]);
                if tail.len() > STDERR_TAIL_BYTES {
                    let excess = tail.len() - STDERR_TAIL_BYTES;
                    tail.drain(..excess);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
    String::from_utf8_lossy(&tail).into_owned()
}

/// A running decoder process with its stderr drained in the background.
struct DecoderProcess {
    child: Child,
    stderr: Option<JoinHandle<String>>,
}

impl DecoderProcess {
    fn spawn(mut command: Command) -> Result<Self> {
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("failed to spawn ffmpeg, is ffmpeg installed?")?;

        let stderr = match child.stderr.take() {
            Some(pipe) => {
                let drained = thread::Builder::new()
                    .name("ffmpeg-stderr".to_string())
                    .spawn(move || drain_stderr(pipe));
                match drained {
                    Ok(handle) => Some(handle),
                    Err(e) => {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(e).context("failed to start stderr reader thread");
                    }
                }
            }
            None => None,
        };

        Ok(Self { child, stderr })
    }

    fn stdout(&mut self) -> Option<&mut ChildStdout> {
        self.child.stdout.as_mut()
    }

    /// Wait for the process to exit and collect what it wrote to stderr.
    fn finish(&mut self) -> io::Result<(ExitStatus, String)> {
        let status = self.child.wait()?;
        Ok((status, self.collect_stderr()))
    }

    fn stop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.collect_stderr();
    }

    fn collect_stderr(&mut self) -> String {
        self.stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default()
    }
}

fn spawn_decoder(path: &Path, start: u64) -> Result<DecoderProcess> {
    info!(?path, start, "spawning ffmpeg decoder process");

    let mut command = Command::new("ffmpeg");
    command.args(decoder_args(path, start));
    DecoderProcess::spawn(command)
}

/// Decodes video frames by piping raw BGR24 data from the ffmpeg CLI.
///
/// Seeking forward skips frames on the running process; seeking backward
/// restarts ffmpeg at the requested frame.
pub struct FfmpegSource {
    path: PathBuf,
    process: DecoderProcess,
    metadata: VideoMetadata,
    frame_bytes: usize,
    position: u64,
    ended: bool,
}

impl FfmpegSource {
    /// Open a video file for decoding.
    pub fn open(path: &Path) -> Result<Self, VideoError> {
        if !path.exists() {
            error!(?path, "video file does not exist");
            return Err(VideoError::open(path, "file does not exist"));
        }

        let info = probe(path).map_err(|e| VideoError::open(path, format!("{e:#}")))?;
        if info.width == 0 || info.height == 0 {
            error!(width = info.width, height = info.height, "invalid video dimensions");
            return Err(VideoError::open(
                path,
                format!("invalid video dimensions {}x{}", info.width, info.height),
            ));
        }

        let process =
            spawn_decoder(path, 0).map_err(|e| VideoError::open(path, format!("{e:#}")))?;
        let metadata = VideoMetadata {
            width: info.width,
            height: info.height,
            fps: info.fps,
            frame_count: info.frame_count,
        };
        Ok(Self::with_process(path, metadata, process))
    }

    fn with_process(path: &Path, metadata: VideoMetadata, process: DecoderProcess) -> Self {
        let frame_bytes = (metadata.width as usize) * (metadata.height as usize) * 3;

        info!(
            width = metadata.width,
            height = metadata.height,
            fps = metadata.fps,
            frame_count = metadata.frame_count,
            frame_bytes,
            "video decoder opened"
        );

        Self {
            path: path.to_path_buf(),
            process,
            metadata,
            frame_bytes,
            position: 0,
            ended: false,
        }
    }

    /// Called once stdout hits EOF on a frame boundary.
    fn finish_stream(&mut self) -> Result<(), VideoError> {
        self.ended = true;
        let (status, stderr) = self
            .process
            .finish()
            .map_err(|e| VideoError::decode(self.position, format!("failed to wait for ffmpeg: {e}")))?;

        if status.success() {
            info!(frames_read = self.position, "video stream ended");
            return Ok(());
        }

        error!(%status, stderr = stderr.trim(), frame = self.position, "ffmpeg exited with an error");
        Err(VideoError::decode(
            self.position,
            format!("ffmpeg exited with {status}: {}", stderr.trim()),
        ))
    }

    /// Read the raw bytes of the next frame and advance the cursor.
    fn read_frame_bytes(&mut self) -> Result<Option<Vec<u8>>, VideoError> {
        if self.ended {
            return Ok(None);
        }

        let position = self.position;
        let stdout = self
            .process
            .stdout()
            .ok_or_else(|| VideoError::decode(position, "ffmpeg stdout not available"))?;

        let mut buf = vec![0u8; self.frame_bytes];
        let mut read = 0;

        while read < self.frame_bytes {
            match stdout.read(&mut buf[read..]) {
                Ok(0) => {
                    if read == 0 {
                        self.finish_stream()?;
                        return Ok(None);
                    }
                    error!(
                        read_bytes = read,
                        expected_bytes = self.frame_bytes,
                        frame = position,
                        "ffmpeg stream ended mid-frame"
                    );
                    self.ended = true;
                    return Err(VideoError::decode(
                        position,
                        format!(
                            "stream ended mid-frame (read {read}/{} bytes)",
                            self.frame_bytes
                        ),
                    ));
                }
                Ok(n) => read += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!(frame = position, %e, "failed to read from ffmpeg pipe");
                    return Err(VideoError::decode(
                        position,
                        format!("failed to read from ffmpeg pipe: {e}"),
                    ));
                }
            }
        }

        self.position += 1;
        Ok(Some(buf))
    }
}

impl VideoSource for FfmpegSource {
    fn metadata(&self) -> VideoMetadata {
        self.metadata
    }

    fn position(&self) -> u64 {
        self.position
    }

    /// Read the next frame from the ffmpeg pipe, or `None` if the video is finished.
    fn read_next(&mut self) -> Result<Option<Frame>, VideoError> {
        let position = self.position;
        let Some(buf) = self.read_frame_bytes()? else {
            return Ok(None);
        };
        debug!(frame = position, "decoded frame");

        Ok(Some(Frame::from_raw(
            self.metadata.width,
            self.metadata.height,
            ChannelOrder::Bgr,
            buf,
        )))
    }

    fn seek(&mut self, index: u64) -> Result<(), VideoError> {
        if index == self.position && !self.ended {
            return Ok(());
        }

        if index > self.position && !self.ended {
            debug!(from = self.position, to = index, "skipping forward");
            while self.position < index {
                if self.read_frame_bytes()?.is_none() {
                    // Past the end; the next read reports end of stream.
                    self.position = index;
                    break;
                }
            }
            return Ok(());
        }

        debug!(from = self.position, to = index, "restarting decoder to seek");
        self.process.stop();
        self.process = spawn_decoder(&self.path, index)
            .map_err(|e| VideoError::decode(index, format!("{e:#}")))?;
        self.position = index;
        self.ended = false;
        Ok(())
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        info!(path = ?self.path, position = self.position, "closing video decoder");
        self.process.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_probe_with_frame_count() {
        let out = "width=1920\nheight=1080\nr_frame_rate=30000/1001\nduration=10.010000\nnb_frames=300\n";
        let probe = parse_probe_output(out).unwrap();
        assert_eq!(probe.width, 1920);
        assert_eq!(probe.height, 1080);
        assert!((probe.fps - 29.97).abs() < 0.01);
        assert_eq!(probe.frame_count, 300);
    }

    #[test]
    fn parse_probe_estimates_missing_frame_count() {
        let out = "width=640\nheight=360\nr_frame_rate=25/1\nduration=4.000000\nnb_frames=N/A\n";
        let probe = parse_probe_output(out).unwrap();
        assert_eq!(probe.fps, 25.0);
        assert_eq!(probe.frame_count, 100);
    }

    #[test]
    fn parse_probe_unknown_count_is_zero() {
        let out = "width=640\nheight=360\nr_frame_rate=0/0\nduration=N/A\nnb_frames=N/A\n";
        let probe = parse_probe_output(out).unwrap();
        assert_eq!(probe.fps, 0.0);
        assert_eq!(probe.frame_count, 0);
    }

    #[test]
    fn parse_probe_without_video_stream_fails() {
        assert!(parse_probe_output("").is_err());
        assert!(parse_probe_output("r_frame_rate=30/1\n").is_err());
    }

    #[test]
    fn parse_rate_plain_number() {
        assert_eq!(parse_rate("24").unwrap(), 24.0);
        assert!(parse_rate("abc").is_err());
    }

    #[test]
    fn decoder_args_from_start_have_no_filter() {
        let args = decoder_args(Path::new("clip.mp4"), 0);
        assert!(!args.iter().any(|a| a == "-vf"));
        assert!(args.iter().any(|a| a == "bgr24"));
        assert_eq!(args.last().and_then(|a| a.to_str()), Some("pipe:1"));
    }

    #[test]
    fn decoder_args_select_exact_frame() {
        let args = decoder_args(Path::new("clip.mp4"), 42);
        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(args[vf + 1].to_str(), Some("select=gte(n\\,42)"));
    }

    /// A 2x2 source whose decoder is `sh -c script` instead of ffmpeg.
    #[cfg(unix)]
    fn scripted_source(script: &str, frame_count: u64) -> FfmpegSource {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        let process = DecoderProcess::spawn(command).unwrap();
        let metadata = VideoMetadata {
            width: 2,
            height: 2,
            fps: 10.0,
            frame_count,
        };
        FfmpegSource::with_process(Path::new("scripted.mp4"), metadata, process)
    }

    /// Writes `lines` error lines to stderr, then `frames` 12-byte frames filled with 1, 2, ...
    #[cfg(unix)]
    fn noisy_decoder_script(lines: u32, frames: u32, exit_code: i32) -> String {
        format!(
            "i=0; while [ $i -lt {lines} ]; do \
               echo \"[h264] error while decoding MB $i, bytestream -7\" >&2; i=$((i+1)); \
             done; \
             f=1; while [ $f -le {frames} ]; do \
               head -c 12 /dev/zero | tr '\\000' \"\\00$f\"; f=$((f+1)); \
             done; \
             exit {exit_code}"
        )
    }

    #[test]
    #[cfg(unix)]
    fn noisy_stderr_does_not_block_frames() {
        // Far more than a pipe buffer of stderr before the first frame.
        let mut source = scripted_source(&noisy_decoder_script(6000, 1, 0), 1);

        let frame = source.read_next().unwrap().unwrap();
        assert_eq!(frame.data, vec![1; 12]);
        assert!(source.read_next().unwrap().is_none());
    }

    #[test]
    #[cfg(unix)]
    fn failing_decoder_reports_stderr_tail() {
        let mut source = scripted_source(&noisy_decoder_script(6000, 0, 1), 3);

        let err = source.read_next().unwrap_err();
        let VideoError::DecodeFailure { index, reason } = err else {
            panic!("expected decode failure, got {err:?}");
        };
        assert_eq!(index, 0);
        assert!(reason.contains("error while decoding MB 5999"), "{reason}");
        assert!(reason.len() < STDERR_TAIL_BYTES + 100);
        assert!(source.read_next().unwrap().is_none());
    }

    #[test]
    #[cfg(unix)]
    fn forward_seek_skips_on_running_decoder() {
        let mut source = scripted_source(&noisy_decoder_script(0, 5, 0), 5);

        source.seek(3).unwrap();
        assert_eq!(source.position(), 3);
        let frame = source.read_next().unwrap().unwrap();
        assert_eq!(frame.data, vec![4; 12]);
        assert_eq!(source.position(), 4);
    }

    #[test]
    #[cfg(unix)]
    fn forward_seek_past_end_reads_nothing() {
        let mut source = scripted_source(&noisy_decoder_script(0, 2, 0), 2);

        source.seek(10).unwrap();
        assert_eq!(source.position(), 10);
        assert!(source.read_next().unwrap().is_none());
    }

    #[test]
    fn open_missing_file_is_open_failure() {
        let result = FfmpegSource::open(Path::new("definitely/not/here.mp4"));
        assert!(matches!(result, Err(VideoError::OpenFailure { .. })));
    }
}
