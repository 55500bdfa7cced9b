//! Plate detector retraining through the ultralytics `yolo` CLI.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::SystemTime;

use tracing::info;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingJob {
    pub program: String,
    pub base_model: PathBuf,
    pub data: PathBuf,
    pub epochs: u32,
    pub image_size: u32,
    /// Where the trainer creates its `train*` run folders.
    pub runs_dir: PathBuf,
    pub destination: PathBuf,
}

impl Default for TrainingJob {
    fn default() -> Self {
        Self {
            program: "yolo".to_string(),
            base_model: PathBuf::from("yolov8n.pt"),
            data: PathBuf::from("Indian number plate.v2i.yolov8/data.yaml"),
            epochs: 50,
            image_size: 640,
            runs_dir: PathBuf::from("runs/detect"),
            destination: PathBuf::from("models/detect_license.pt"),
        }
    }
}

impl TrainingJob {
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("detect")
            .arg("train")
            .arg(format!("data={}", self.data.display()))
            .arg(format!("model={}", self.base_model.display()))
            .arg(format!("epochs={}", self.epochs))
            .arg(format!("imgsz={}", self.image_size));
        cmd
    }

    /// Train, then copy the best weights of the newest run to `destination`.
    pub fn run(&self) -> Result<PathBuf> {
        info!(
            data = %self.data.display(),
            model = %self.base_model.display(),
            epochs = self.epochs,
            "starting training"
        );
        let status = self
            .command()
            .status()
            .map_err(|e| Error::Training(format!("failed to run {}: {e}", self.program)))?;
        if !status.success() {
            return Err(Error::Training(format!("{} exited with {status}", self.program)));
        }
        promote_best_weights(&self.runs_dir, &self.destination)
    }
}

/// Most recently modified `train*` directory in `runs_dir`.
pub fn latest_run(runs_dir: &Path) -> Result<PathBuf> {
    let entries = fs::read_dir(runs_dir).map_err(|e| Error::io(runs_dir, e))?;
    let mut latest: Option<(SystemTime, PathBuf)> = None;

    for entry in entries {
        let entry = entry.map_err(|e| Error::io(runs_dir, e))?;
        let path = entry.path();
        let is_run = path.is_dir()
            && entry.file_name().to_str().is_some_and(|name| name.starts_with("train"));
        if !is_run {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .map_err(|e| Error::io(&path, e))?;
        if latest.as_ref().is_none_or(|(time, _)| modified > *time) {
            latest = Some((modified, path));
        }
    }

    latest
        .map(|(_, path)| path)
        .ok_or_else(|| Error::Training(format!("no train* run in {}", runs_dir.display())))
}

/// Copy `weights/best.pt` of the latest run to `destination`.
pub fn promote_best_weights(runs_dir: &Path, destination: &Path) -> Result<PathBuf> {
    let run = latest_run(runs_dir)?;
    info!(run = %run.display(), "latest training run");

    let best = run.join("weights").join("best.pt");
    if !best.is_file() {
        return Err(Error::Training(format!("could not find {}", best.display())));
    }
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    fs::copy(&best, destination).map_err(|e| Error::io(destination, e))?;
    info!(destination = %destination.display(), "trained weights saved");
    Ok(destination.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;

    fn make_run(runs: &Path, name: &str, weights: Option<&str>, age: Duration) {
        let dir = runs.join(name);
        fs::create_dir_all(dir.join("weights")).unwrap();
        if let Some(contents) = weights {
            fs::write(dir.join("weights/best.pt"), contents).unwrap();
        }
        let mtime = SystemTime::now() - age;
        File::open(&dir).unwrap().set_modified(mtime).unwrap();
    }

    #[test]
    fn test_command_arguments() {
        let cmd = TrainingJob::default().command();
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(cmd.get_program(), "yolo");
        assert_eq!(
            args,
            [
                "detect",
                "train",
                "data=Indian number plate.v2i.yolov8/data.yaml",
                "model=yolov8n.pt",
                "epochs=50",
                "imgsz=640",
            ]
        );
    }

    #[test]
    fn test_promotes_newest_run() {
        let dir = tempfile::tempdir().unwrap();
        let runs = dir.path().join("runs/detect");
        make_run(&runs, "train", Some("old"), Duration::from_secs(3600));
        make_run(&runs, "train2", Some("new"), Duration::from_secs(10));
        make_run(&runs, "val", Some("other"), Duration::ZERO);

        let destination = dir.path().join("models/detect_license.pt");
        promote_best_weights(&runs, &destination).unwrap();
        assert_eq!(fs::read_to_string(&destination).unwrap(), "new");
    }

    #[test]
    fn test_missing_weights_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let runs = dir.path().join("runs");
        make_run(&runs, "train3", None, Duration::ZERO);

        let destination = dir.path().join("best.pt");
        assert!(matches!(
            promote_best_weights(&runs, &destination),
            Err(Error::Training(_))
        ));
        assert!(!destination.exists());
    }
}
