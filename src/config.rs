//! YAML configuration for the monitor.
//!
//! Every section is optional; missing fields fall back to the calibrated
//! defaults of the reference camera setup.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::integration::CommandSpec;
use crate::speed::{Calibration, CrossingLines};
use crate::tracker::TrackerConfig;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub video: VideoConfig,
    pub models: ModelsConfig,
    pub speed: SpeedConfig,
    pub log: LogConfig,
    pub classes: BTreeMap<u32, String>,
    pub detector: DetectorConfig,
    pub tracking: TrackingConfig,
    pub plate_detector: PlateDetectorConfig,
    pub ocr: OcrConfig,
    pub overlay: OverlayConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Video file, or a directory read as an image sequence.
    pub path: PathBuf,
    /// Overrides the probed frame rate.
    pub fps: Option<f64>,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("ntpc.mp4"),
            fps: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub vehicle: PathBuf,
    pub plate: PathBuf,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            vehicle: PathBuf::from("yolov8n.pt"),
            plate: PathBuf::from("models/detect_license.pt"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeedConfig {
    pub limit_kmph: f64,
    pub real_distance_m: f64,
    pub entry_line_y: i32,
    pub exit_line_y: i32,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            limit_kmph: 10.0,
            real_distance_m: 3.0,
            entry_line_y: 330,
            exit_line_y: 800,
        }
    }
}

impl SpeedConfig {
    pub fn lines(&self) -> Result<CrossingLines> {
        CrossingLines::new(self.entry_line_y, self.exit_line_y).ok_or_else(|| {
            Error::InvalidConfig(format!(
                "exit_line_y ({}) must be greater than entry_line_y ({})",
                self.exit_line_y, self.entry_line_y
            ))
        })
    }

    pub fn calibration(&self) -> Result<Calibration> {
        Ok(Calibration::new(self.real_distance_m, self.lines()?))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub csv_path: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("logs/overspeeding_log.csv"),
        }
    }
}

/// Vehicle detector behind the binary.
///
/// `BurnDetector` is a library-only adapter: it needs a caller-supplied
/// `BurnModel`, so it has no entry here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    /// Long-lived detector process fed raw frames.
    #[default]
    Command,
    /// Detections recorded in a JSON-lines file.
    Replay,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub kind: DetectorKind,
    pub command: Vec<String>,
    pub path: Option<PathBuf>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            kind: DetectorKind::Command,
            command: ["python3", "scripts/detect.py", "--model", "{model}"]
                .map(String::from)
                .to_vec(),
            path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingMode {
    /// Raw detections go through the built-in ByteTrack tracker.
    #[default]
    Builtin,
    /// The detector already assigns persistent ids.
    Upstream,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub mode: TrackingMode,
    #[serde(flatten)]
    pub tracker: TrackerConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlateDetectorConfig {
    pub command: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrEngine {
    /// One process per crop, PNG on stdin.
    #[default]
    Command,
    /// libtesseract in process; needs the `tesseract` feature.
    Tesseract,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub engine: OcrEngine,
    pub command: Vec<String>,
    /// tessdata directory, `None` for the library default.
    pub data_path: Option<PathBuf>,
    pub language: String,
    pub whitelist: Option<String>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            engine: OcrEngine::Command,
            command: ["tesseract", "stdin", "stdout", "--psm", "7"]
                .map(String::from)
                .to_vec(),
            data_path: None,
            language: "eng".to_string(),
            whitelist: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Annotated frames are written here as JPEG when set.
    pub output_dir: Option<PathBuf>,
}

/// COCO ids of the vehicle classes of interest.
pub fn default_classes() -> BTreeMap<u32, String> {
    [(2, "car"), (5, "bus"), (7, "truck")]
        .into_iter()
        .map(|(id, label)| (id, label.to_string()))
        .collect()
}

impl Config {
    /// Load and validate `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&contents)?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "configuration not found, using defaults");
            let config = Self::with_defaults();
            config.validate()?;
            Ok(config)
        }
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let mut config: Config = if contents.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(contents)?
        };
        if config.classes.is_empty() {
            config.classes = default_classes();
        }
        config.validate()?;
        Ok(config)
    }

    /// Defaults including the vehicle class table.
    pub fn with_defaults() -> Self {
        Self {
            classes: default_classes(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.speed.lines()?;
        if !(self.speed.real_distance_m > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "real_distance_m must be positive, got {}",
                self.speed.real_distance_m
            )));
        }
        if !(self.speed.limit_kmph >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "limit_kmph must not be negative, got {}",
                self.speed.limit_kmph
            )));
        }
        if let Some(fps) = self.video.fps {
            if !(fps > 0.0) {
                return Err(Error::InvalidConfig(format!("fps must be positive, got {fps}")));
            }
        }
        if self.detector.kind == DetectorKind::Command && self.detector.command.is_empty() {
            return Err(Error::InvalidConfig("detector.command is empty".into()));
        }
        if self.detector.kind == DetectorKind::Replay && self.detector.path.is_none() {
            return Err(Error::InvalidConfig(
                "detector.path is required for replay".into(),
            ));
        }
        if self.plate_detector.command.as_ref().is_some_and(Vec::is_empty) {
            return Err(Error::InvalidConfig("plate_detector.command is empty".into()));
        }
        match self.ocr.engine {
            OcrEngine::Command if self.ocr.command.is_empty() => {
                return Err(Error::InvalidConfig("ocr.command is empty".into()));
            }
            OcrEngine::Tesseract if self.ocr.language.trim().is_empty() => {
                return Err(Error::InvalidConfig("ocr.language is empty".into()));
            }
            _ => {}
        }
        Ok(())
    }

    pub fn label_for(&self, class_id: u32) -> Option<&str> {
        self.classes.get(&class_id).map(String::as_str)
    }

    pub fn detector_command(&self) -> Option<CommandSpec> {
        CommandSpec::from_argv(&self.detector.command, Some(&self.models.vehicle))
    }

    pub fn plate_command(&self) -> Option<CommandSpec> {
        let argv = self.plate_detector.command.as_ref()?;
        CommandSpec::from_argv(argv, Some(&self.models.plate))
    }

    pub fn ocr_command(&self) -> Option<CommandSpec> {
        CommandSpec::from_argv(&self.ocr.command, None)
    }
}
