use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use overspeed::config::{Config, DetectorKind, OcrEngine, TrackingMode};
use overspeed::dataset::{self, DatasetOptions};
use overspeed::integration::{
    CommandDetector, CommandPlateDetector, CommandTextRecognizer, DetectionReplay,
    DetectionSource, TextRecognizer, TrackerPipeline, UpstreamTracks, VehicleTracker,
};
use overspeed::monitor::{MonitorSettings, SpeedMonitor};
use overspeed::training::{self, TrainingJob};
use overspeed::video::{self, FrameSink, JpegDirSink, NullSink, VideoSource};
use overspeed::{CsvLogSink, logging};

#[derive(Parser, Debug)]
#[command(name = "overspeed", version, about = "Vehicle overspeeding detection from video")]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Track vehicles, measure speeds and log violations
    Monitor {
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,
    },
    /// Split labelled plate frames into a YOLO train/val dataset
    PrepareDataset(PrepareArgs),
    /// Train the plate detector and install its best weights
    Train(TrainArgs),
}

#[derive(Args, Debug)]
struct PrepareArgs {
    #[arg(long, default_value = "dataset")]
    root: PathBuf,
    /// Source folder under the root (repeatable)
    #[arg(long = "source", default_values = ["vid-1", "vid-2", "vid-3"])]
    sources: Vec<String>,
    #[arg(long, default_value_t = 0.2)]
    val_fraction: f64,
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[derive(Args, Debug)]
struct TrainArgs {
    #[arg(long, default_value = "Indian number plate.v2i.yolov8/data.yaml")]
    data: PathBuf,
    #[arg(long, default_value = "yolov8n.pt")]
    base_model: PathBuf,
    #[arg(long, default_value_t = 50)]
    epochs: u32,
    #[arg(long, default_value_t = 640)]
    imgsz: u32,
    #[arg(long, default_value = "runs/detect")]
    runs_dir: PathBuf,
    #[arg(long, default_value = "models/detect_license.pt")]
    output: PathBuf,
    /// Skip training and only copy the latest run's best weights
    #[arg(long)]
    promote_only: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Commands::Monitor { config } => monitor(&config),
        Commands::PrepareDataset(args) => {
            let options = DatasetOptions {
                root: args.root,
                sources: args.sources,
                val_fraction: args.val_fraction,
                seed: args.seed,
            };
            let summary = dataset::prepare_dataset(&options).context("dataset preparation failed")?;
            info!(
                "dataset ready: {} train / {} val images, {} missing labels",
                summary.train, summary.val, summary.missing_labels
            );
            Ok(())
        }
        Commands::Train(args) => {
            let job = TrainingJob {
                base_model: args.base_model,
                data: args.data,
                epochs: args.epochs,
                image_size: args.imgsz,
                runs_dir: args.runs_dir,
                destination: args.output,
                ..TrainingJob::default()
            };
            let saved = if args.promote_only {
                training::promote_best_weights(&job.runs_dir, &job.destination)
            } else {
                job.run()
            }
            .context("training failed")?;
            info!("trained model saved to {}", saved.display());
            Ok(())
        }
    }
}

fn monitor(config_path: &Path) -> Result<()> {
    let config = Config::load_or_default(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed))
            .context("failed to install Ctrl-C handler")?;
    }

    let source = video::open(&config.video.path, config.video.fps)
        .with_context(|| format!("failed to open video {}", config.video.path.display()))?;
    info!(
        path = %config.video.path.display(),
        fps = source.fps(),
        "video opened"
    );

    match config.detector.kind {
        DetectorKind::Command => {
            let spec = config
                .detector_command()
                .ok_or_else(|| anyhow!("detector.command is empty"))?;
            let detector = CommandDetector::spawn(spec).context("failed to start detector")?;
            with_detector(&config, detector, source, &stop)
        }
        DetectorKind::Replay => {
            let path = config
                .detector
                .path
                .as_ref()
                .ok_or_else(|| anyhow!("detector.path is required for replay"))?;
            let replay = DetectionReplay::open(path)?;
            with_detector(&config, replay, source, &stop)
        }
    }
}

fn with_detector<D: DetectionSource>(
    config: &Config,
    detector: D,
    source: Box<dyn VideoSource>,
    stop: &AtomicBool,
) -> Result<()> {
    match config.tracking.mode {
        TrackingMode::Builtin => {
            let mut tracker_config = config.tracking.tracker.clone();
            tracker_config.frame_rate = source.fps() as f32;
            run(config, TrackerPipeline::new(detector, tracker_config), source, stop)
        }
        TrackingMode::Upstream => run(config, UpstreamTracks::new(detector), source, stop),
    }
}

fn run<T: VehicleTracker>(
    config: &Config,
    tracker: T,
    source: Box<dyn VideoSource>,
    stop: &AtomicBool,
) -> Result<()> {
    match config.ocr.engine {
        OcrEngine::Command => {
            let ocr = config
                .ocr_command()
                .map(CommandTextRecognizer::new)
                .ok_or_else(|| anyhow!("ocr.command is empty"))?;
            run_with_ocr(config, tracker, ocr, source, stop)
        }
        #[cfg(feature = "tesseract")]
        OcrEngine::Tesseract => {
            let ocr = overspeed::integration::TesseractRecognizer::new(
                config.ocr.data_path.as_deref(),
                &config.ocr.language,
                config.ocr.whitelist.as_deref(),
            )
            .context("failed to initialise tesseract")?;
            run_with_ocr(config, tracker, ocr, source, stop)
        }
        #[cfg(not(feature = "tesseract"))]
        OcrEngine::Tesseract => Err(anyhow!(
            "ocr.engine is tesseract but this build lacks the `tesseract` feature"
        )),
    }
}

fn run_with_ocr<T: VehicleTracker, R: TextRecognizer>(
    config: &Config,
    tracker: T,
    ocr: R,
    mut source: Box<dyn VideoSource>,
    stop: &AtomicBool,
) -> Result<()> {
    let settings = MonitorSettings::from_config(config, source.fps())?;

    let plates = config.plate_command().map(CommandPlateDetector::new);
    if plates.is_none() {
        warn!("no plate detector configured, plates will be logged as Unknown");
    }
    let sink = CsvLogSink::open(&config.log.csv_path)?;
    info!(path = %sink.path().display(), "logging violations");

    let mut frame_sink: Box<dyn FrameSink> = match &config.overlay.output_dir {
        Some(dir) => Box::new(JpegDirSink::create(dir)?),
        None => Box::new(NullSink),
    };

    let mut monitor = SpeedMonitor::new(settings, tracker, plates, ocr, sink);
    let summary = monitor.run(&mut source, &mut frame_sink, stop)?;

    info!(
        "processed {} frames: {} vehicles, {} violations{}",
        summary.frames,
        summary.vehicles,
        summary.violations,
        if summary.interrupted { " (interrupted)" } else { "" }
    );
    Ok(())
}
