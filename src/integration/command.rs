//! Detection and OCR engines running as child processes.
//!
//! Models live outside this crate (e.g. an ultralytics YOLO script or the
//! tesseract CLI). Images cross the process boundary either as raw RGB
//! frames (streaming detector) or as PNG files on stdin (plate detection
//! and OCR, which only run on violations).

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::thread;

use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::frame::{self, Image};
use crate::geometry::BBox;
use crate::tracker::Detection;

use super::replay::DetectionRecord;
use super::{DetectionSource, PlateDetector, TextRecognition, TextRecognizer};

const MODEL_PLACEHOLDER: &str = "{model}";

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to spawn {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("i/o with {program} failed")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}")]
    Status { program: String, status: ExitStatus },
    #[error("{program} produced invalid output")]
    Output {
        program: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{program} closed its output stream")]
    Closed { program: String },
    #[error("failed to encode image for {program}")]
    Encode {
        program: String,
        #[source]
        source: image::ImageError,
    },
}

/// Program and arguments of an external engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
}

impl CommandSpec {
    /// Build from an argv list, replacing `{model}` with `model`.
    ///
    /// Returns `None` for an empty argv.
    pub fn from_argv(argv: &[String], model: Option<&Path>) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        let model = model.map(|m| m.display().to_string());
        let args = args
            .iter()
            .map(|arg| match &model {
                Some(model) => arg.replace(MODEL_PLACEHOLDER, model),
                None => arg.clone(),
            })
            .collect();
        Some(Self {
            program: program.clone(),
            args,
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }

    /// Run to completion with `input` on stdin and return stdout.
    fn run(&self, input: Vec<u8>) -> Result<Vec<u8>, CommandError> {
        let mut child = self
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| CommandError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdin = child.stdin.take();
        let writer = thread::spawn(move || match stdin {
            Some(mut stdin) => stdin.write_all(&input),
            None => Ok(()),
        });

        let output = child.wait_with_output().map_err(|source| self.io_error(source))?;
        if let Ok(Err(source)) = writer.join() {
            // The engine may legitimately stop reading early; only report it.
            debug!(program = %self.program, error = %source, "stdin write incomplete");
        }

        if !output.status.success() {
            return Err(CommandError::Status {
                program: self.program.clone(),
                status: output.status,
            });
        }
        Ok(output.stdout)
    }

    fn io_error(&self, source: std::io::Error) -> CommandError {
        CommandError::Io {
            program: self.program.clone(),
            source,
        }
    }

    fn encode(&self, image: &Image) -> Result<Vec<u8>, CommandError> {
        frame::encode_png(image).map_err(|source| CommandError::Encode {
            program: self.program.clone(),
            source,
        })
    }
}

/// Long-lived detector process fed one raw frame at a time.
///
/// Per frame the process receives a JSON header line
/// `{"width": w, "height": h}` followed by `w * h * 3` RGB bytes, and must
/// answer with one JSON line holding the detections array.
pub struct CommandDetector {
    spec: CommandSpec,
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    line: String,
}

impl CommandDetector {
    pub fn spawn(spec: CommandSpec) -> Result<Self, CommandError> {
        let mut child = spec
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| CommandError::Spawn {
                program: spec.program.clone(),
                source,
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(CommandError::Closed {
                program: spec.program.clone(),
            });
        };

        debug!(program = %spec.program, "spawned detector process");
        Ok(Self {
            spec,
            child,
            stdin,
            stdout: BufReader::new(stdout),
            line: String::new(),
        })
    }
}

impl DetectionSource for CommandDetector {
    type Error = CommandError;

    fn detect(&mut self, image: &Image) -> Result<Vec<Detection>, Self::Error> {
        let (width, height) = frame::dimensions(image);
        let header = json!({ "width": width, "height": height }).to_string();

        let write = |stdin: &mut ChildStdin| -> std::io::Result<()> {
            stdin.write_all(header.as_bytes())?;
            stdin.write_all(b"\n")?;
            match image.as_slice() {
                Some(pixels) => stdin.write_all(pixels)?,
                None => stdin.write_all(&image.iter().copied().collect::<Vec<u8>>())?,
            }
            stdin.flush()
        };
        write(&mut self.stdin).map_err(|source| self.spec.io_error(source))?;

        self.line.clear();
        let read = self
            .stdout
            .read_line(&mut self.line)
            .map_err(|source| self.spec.io_error(source))?;
        if read == 0 {
            return Err(CommandError::Closed {
                program: self.spec.program.clone(),
            });
        }

        let records: Vec<DetectionRecord> =
            serde_json::from_str(self.line.trim()).map_err(|source| CommandError::Output {
                program: self.spec.program.clone(),
                source,
            })?;
        Ok(records.into_iter().map(Detection::from).collect())
    }
}

impl Drop for CommandDetector {
    fn drop(&mut self) {
        if let Err(err) = self.child.kill() {
            warn!(program = %self.spec.program, error = %err, "failed to stop detector process");
        }
        let _ = self.child.wait();
    }
}

/// Plate detector process: PNG on stdin, JSON `[[x1, y1, x2, y2], ...]` on
/// stdout.
pub struct CommandPlateDetector {
    spec: CommandSpec,
}

impl CommandPlateDetector {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }
}

impl PlateDetector for CommandPlateDetector {
    type Error = CommandError;

    fn detect_plates(&mut self, image: &Image) -> Result<Vec<BBox>, Self::Error> {
        let png = self.spec.encode(image)?;
        let stdout = self.spec.run(png)?;
        parse_plate_boxes(&stdout).map_err(|source| CommandError::Output {
            program: self.spec.program.clone(),
            source,
        })
    }
}

fn parse_plate_boxes(stdout: &[u8]) -> Result<Vec<BBox>, serde_json::Error> {
    let text = String::from_utf8_lossy(stdout);
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }
    let boxes: Vec<[f32; 4]> = serde_json::from_str(text)?;
    Ok(boxes.into_iter().map(BBox::from_tlbr_f32).collect())
}

/// OCR process: PNG on stdin, one recognition per non-empty stdout line.
///
/// A line may carry a tab-separated confidence (`TEXT\t0.93`); lines
/// without one get confidence 1.0. The default configuration runs
/// `tesseract stdin stdout --psm 7`.
pub struct CommandTextRecognizer {
    spec: CommandSpec,
}

impl CommandTextRecognizer {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }
}

impl TextRecognizer for CommandTextRecognizer {
    type Error = CommandError;

    fn recognize(&mut self, image: &Image) -> Result<Vec<TextRecognition>, Self::Error> {
        let png = self.spec.encode(image)?;
        let stdout = self.spec.run(png)?;
        Ok(parse_recognitions(&String::from_utf8_lossy(&stdout)))
    }
}

fn parse_recognitions(stdout: &str) -> Vec<TextRecognition> {
    stdout
        .lines()
        .filter_map(|line| {
            let (text, confidence) = match line.rsplit_once('\t') {
                Some((text, conf)) => match conf.trim().parse::<f32>() {
                    Ok(conf) => (text, conf),
                    Err(_) => (line, 1.0),
                },
                None => (line, 1.0),
            };
            let text = text.trim();
            (!text.is_empty()).then(|| TextRecognition::new(text, confidence))
        })
        .collect()
}
