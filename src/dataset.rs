//! Licence-plate dataset preparation in the YOLO directory layout.
//!
//! Labelled frames from several capture folders are pooled, shuffled with a
//! fixed seed and split into `images/{train,val}` and `labels/{train,val}`,
//! with a `data.yaml` describing the single `license_plate` class.

use std::fs;
use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Error, Result};

const CLASS_NAME: &str = "license_plate";

#[derive(Debug, Clone)]
pub struct DatasetOptions {
    pub root: PathBuf,
    /// Folders under `root` holding `*.jpg` frames with sibling `.txt` labels.
    pub sources: Vec<String>,
    pub val_fraction: f64,
    pub seed: u64,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("dataset"),
            sources: ["vid-1", "vid-2", "vid-3"].map(String::from).to_vec(),
            val_fraction: 0.2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetSummary {
    pub total: usize,
    pub train: usize,
    pub val: usize,
    pub missing_labels: usize,
}

#[derive(Debug, Serialize)]
struct DataYaml<'a> {
    path: String,
    train: &'a str,
    val: &'a str,
    nc: usize,
    names: [&'a str; 1],
}

#[derive(Debug, Clone, Copy)]
enum Split {
    Train,
    Val,
}

impl Split {
    fn name(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
        }
    }
}

fn collect_images(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        warn!(dir = %dir.display(), "source folder not found, skipping");
        return Ok(Vec::new());
    }
    let mut images = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let path = entry.map_err(|e| Error::io(dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "jpg") {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

/// Number of validation images for `total` images, rounded up.
pub fn val_count(total: usize, val_fraction: f64) -> usize {
    (total as f64 * val_fraction).ceil() as usize
}

fn copy_into(file: &Path, dir: &Path) -> Result<()> {
    let Some(name) = file.file_name() else {
        return Err(Error::Dataset(format!("{} has no file name", file.display())));
    };
    let target = dir.join(name);
    fs::copy(file, &target).map_err(|e| Error::io(target, e))?;
    Ok(())
}

/// Copy images and their labels into one split; returns missing label count.
fn copy_split(images: &[PathBuf], root: &Path, split: Split) -> Result<usize> {
    let image_dir = root.join("images").join(split.name());
    let label_dir = root.join("labels").join(split.name());
    let mut missing = 0;

    for image in images {
        copy_into(image, &image_dir)?;
        let label = image.with_extension("txt");
        if label.is_file() {
            copy_into(&label, &label_dir)?;
        } else {
            warn!(image = %image.display(), "label not found");
            missing += 1;
        }
    }
    Ok(missing)
}

pub fn prepare_dataset(options: &DatasetOptions) -> Result<DatasetSummary> {
    if !(options.val_fraction > 0.0 && options.val_fraction < 1.0) {
        return Err(Error::Dataset(format!(
            "val_fraction must be between 0 and 1, got {}",
            options.val_fraction
        )));
    }
    let root = &options.root;

    for split in [Split::Train, Split::Val] {
        for kind in ["images", "labels"] {
            let dir = root.join(kind).join(split.name());
            fs::create_dir_all(&dir).map_err(|e| Error::io(dir, e))?;
        }
    }

    let mut images = Vec::new();
    for source in &options.sources {
        images.extend(collect_images(&root.join(source))?);
    }
    info!(total = images.len(), "collected images");

    let total = images.len();
    let val = val_count(total, options.val_fraction);
    if total == 0 || val >= total {
        return Err(Error::Dataset(format!(
            "{total} images are not enough for a train/val split"
        )));
    }

    images.shuffle(&mut StdRng::seed_from_u64(options.seed));
    let (val_images, train_images) = images.split_at(val);

    let missing_labels = copy_split(train_images, root, Split::Train)?
        + copy_split(val_images, root, Split::Val)?;

    let data = DataYaml {
        path: root.display().to_string(),
        train: "images/train",
        val: "images/val",
        nc: 1,
        names: [CLASS_NAME],
    };
    let yaml = serde_yaml::to_string(&data).map_err(|e| Error::Dataset(e.to_string()))?;
    let yaml_path = root.join("data.yaml");
    fs::write(&yaml_path, yaml).map_err(|e| Error::io(yaml_path, e))?;

    let summary = DatasetSummary {
        total,
        train: train_images.len(),
        val: val_images.len(),
        missing_labels,
    };
    info!(
        train = summary.train,
        val = summary.val,
        missing_labels,
        "dataset prepared"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populate(root: &Path, source: &str, count: usize, labelled: bool) {
        let dir = root.join(source);
        fs::create_dir_all(&dir).unwrap();
        for i in 0..count {
            fs::write(dir.join(format!("{source}_{i:03}.jpg")), b"jpg").unwrap();
            if labelled {
                fs::write(dir.join(format!("{source}_{i:03}.txt")), "0 0.5 0.5 0.1 0.1\n").unwrap();
            }
        }
        fs::write(dir.join("notes.md"), "ignored").unwrap();
    }

    fn count_files(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_val_count_rounds_up() {
        assert_eq!(val_count(10, 0.2), 2);
        assert_eq!(val_count(11, 0.2), 3);
        assert_eq!(val_count(1, 0.2), 1);
    }

    #[test]
    fn test_prepare_dataset_layout() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("dataset");
        populate(&root, "vid-1", 6, true);
        populate(&root, "vid-2", 3, false);
        populate(&root, "vid-3", 1, true);

        let options = DatasetOptions {
            root: root.clone(),
            ..DatasetOptions::default()
        };
        let summary = prepare_dataset(&options).unwrap();

        assert_eq!(
            summary,
            DatasetSummary {
                total: 10,
                train: 8,
                val: 2,
                missing_labels: 3,
            }
        );
        assert_eq!(count_files(&root.join("images/train")), 8);
        assert_eq!(count_files(&root.join("images/val")), 2);
        assert_eq!(
            count_files(&root.join("labels/train")) + count_files(&root.join("labels/val")),
            7
        );

        let yaml: serde_yaml::Value =
            serde_yaml::from_str(&fs::read_to_string(root.join("data.yaml")).unwrap()).unwrap();
        assert_eq!(yaml["train"].as_str(), Some("images/train"));
        assert_eq!(yaml["val"].as_str(), Some("images/val"));
        assert_eq!(yaml["nc"].as_u64(), Some(1));
        assert_eq!(yaml["names"][0].as_str(), Some("license_plate"));
    }

    #[test]
    fn test_split_is_deterministic() {
        let split_of = || {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path().to_path_buf();
            populate(&root, "vid-1", 12, true);
            let options = DatasetOptions {
                root: root.clone(),
                sources: vec!["vid-1".into()],
                ..DatasetOptions::default()
            };
            prepare_dataset(&options).unwrap();
            let mut names: Vec<_> = fs::read_dir(root.join("images/val"))
                .unwrap()
                .map(|e| e.unwrap().file_name())
                .collect();
            names.sort();
            names
        };
        assert_eq!(split_of(), split_of());
    }

    #[test]
    fn test_empty_dataset_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let options = DatasetOptions {
            root: dir.path().to_path_buf(),
            ..DatasetOptions::default()
        };
        assert!(matches!(prepare_dataset(&options), Err(Error::Dataset(_))));
    }
}
