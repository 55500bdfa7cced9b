//! Video decoding through the `ffmpeg`/`ffprobe` command-line tools.

use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use ndarray::Array3;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{VideoError, VideoSource};
use crate::frame::Image;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: usize,
    height: usize,
    #[serde(default)]
    avg_frame_rate: Option<String>,
    #[serde(default)]
    r_frame_rate: Option<String>,
}

/// Stream properties reported by ffprobe.
#[derive(Debug, Clone, Copy, PartialEq)]
struct StreamInfo {
    width: usize,
    height: usize,
    fps: Option<f64>,
}

/// Parse an ffprobe rate such as `30000/1001` or `25`.
fn parse_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}

fn parse_probe(json: &[u8]) -> Result<StreamInfo, String> {
    let output: ProbeOutput = serde_json::from_slice(json).map_err(|e| e.to_string())?;
    let stream = output
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| "no video stream".to_string())?;
    if stream.width == 0 || stream.height == 0 {
        return Err(format!("invalid frame size {}x{}", stream.width, stream.height));
    }
    let fps = [stream.avg_frame_rate, stream.r_frame_rate]
        .into_iter()
        .flatten()
        .find_map(|rate| parse_rate(&rate));
    Ok(StreamInfo {
        width: stream.width,
        height: stream.height,
        fps,
    })
}

fn probe(path: &Path) -> Result<StreamInfo, VideoError> {
    let output = Command::new("ffprobe")
        .arg("-v")
        .arg("error")
        .arg("-select_streams")
        .arg("v:0")
        .arg("-show_entries")
        .arg("stream=width,height,avg_frame_rate,r_frame_rate")
        .arg("-of")
        .arg("json")
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|source| VideoError::Spawn {
            program: "ffprobe",
            source,
        })?;

    if !output.status.success() {
        return Err(VideoError::Probe {
            path: path.to_path_buf(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    parse_probe(&output.stdout).map_err(|message| VideoError::Probe {
        path: path.to_path_buf(),
        message,
    })
}

/// Decodes a video file to raw `rgb24` frames read from an ffmpeg child.
pub struct FfmpegSource {
    path: PathBuf,
    child: Child,
    stdout: ChildStdout,
    width: usize,
    height: usize,
    fps: f64,
    buffer: Vec<u8>,
    finished: bool,
}

impl FfmpegSource {
    /// Probe `path` and start decoding. `fps` overrides the probed rate.
    pub fn open(path: &Path, fps: Option<f64>) -> Result<Self, VideoError> {
        if !path.exists() {
            return Err(VideoError::NotFound(path.to_path_buf()));
        }
        let info = probe(path)?;
        let fps = fps
            .or(info.fps)
            .ok_or_else(|| VideoError::FrameRate(path.to_path_buf()))?;

        let mut child = Command::new("ffmpeg")
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(path)
            .arg("-an")
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("-f")
            .arg("rawvideo")
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| VideoError::Spawn {
                program: "ffmpeg",
                source,
            })?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(VideoError::Read(std::io::Error::new(
                ErrorKind::BrokenPipe,
                "failed to capture ffmpeg stdout",
            )));
        };

        debug!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            fps,
            "opened video"
        );
        Ok(Self {
            path: path.to_path_buf(),
            child,
            stdout,
            width: info.width,
            height: info.height,
            fps,
            buffer: vec![0; info.width * info.height * 3],
            finished: false,
        })
    }
}

/// Fill `buffer` completely, returning how many bytes were read before EOF.
fn fill(reader: &mut impl Read, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

impl VideoSource for FfmpegSource {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn next_frame(&mut self) -> Result<Option<Image>, VideoError> {
        if self.finished {
            return Ok(None);
        }
        let filled = fill(&mut self.stdout, &mut self.buffer).map_err(VideoError::Read)?;
        if filled < self.buffer.len() {
            self.finished = true;
            if filled > 0 {
                warn!(path = %self.path.display(), bytes = filled, "dropping truncated last frame");
            }
            return Ok(None);
        }
        let frame = Array3::from_shape_vec((self.height, self.width, 3), self.buffer.clone())
            .map_err(|e| VideoError::Read(std::io::Error::new(ErrorKind::InvalidData, e)))?;
        Ok(Some(frame))
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
