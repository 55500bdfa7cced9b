//! The per-frame driver tying tracking, crossing detection, speed
//! estimation and violation logging together.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::frame::Image;
use crate::geometry::BBox;
use crate::integration::{PlateDetector, TextRecognizer, VehicleTracker};
use crate::speed::{
    Calibration, CrossingEvent, CrossingLines, SpeedEstimator, SpeedMeasurement, TrackId,
    TrackStore,
};
use crate::video::{FrameSink, Overlay, VideoSource};
use crate::violation::{LogRecord, LogSink, ViolationPipeline};

/// Calibration and filtering parameters of a monitoring session.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub calibration: Calibration,
    pub fps: f64,
    pub speed_limit: f64,
    /// Class id → label; tracks of other classes are ignored.
    pub classes: BTreeMap<u32, String>,
}

impl MonitorSettings {
    pub fn from_config(config: &Config, fps: f64) -> Result<Self> {
        if !(fps > 0.0) {
            return Err(Error::InvalidConfig(format!("fps must be positive, got {fps}")));
        }
        Ok(Self {
            calibration: config.speed.calibration()?,
            fps,
            speed_limit: config.speed.limit_kmph,
            classes: config.classes.clone(),
        })
    }
}

/// What happened on one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub frame_index: u64,
    /// Tracks of a configured class seen on this frame.
    pub tracked: usize,
    pub entries: Vec<TrackId>,
    pub measurements: Vec<(TrackId, SpeedMeasurement)>,
    pub records: Vec<LogRecord>,
}

/// Totals of a completed [`SpeedMonitor::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub vehicles: usize,
    pub violations: usize,
    pub interrupted: bool,
}

pub struct SpeedMonitor<T, P, R, S> {
    tracker: T,
    store: TrackStore,
    lines: CrossingLines,
    estimator: SpeedEstimator,
    pipeline: ViolationPipeline<P, R>,
    sink: S,
    classes: BTreeMap<u32, String>,
    overlay: Overlay,
}

impl<T, P, R, S> SpeedMonitor<T, P, R, S>
where
    T: VehicleTracker,
    P: PlateDetector,
    R: TextRecognizer,
    S: LogSink,
{
    pub fn new(settings: MonitorSettings, tracker: T, plates: P, ocr: R, sink: S) -> Self {
        let lines = settings.calibration.lines;
        Self {
            tracker,
            store: TrackStore::new(),
            lines,
            estimator: SpeedEstimator::new(settings.fps, &settings.calibration),
            pipeline: ViolationPipeline::new(settings.speed_limit, plates, ocr),
            sink,
            classes: settings.classes,
            overlay: Overlay::new(lines),
        }
    }

    /// Replace the violation pipeline, e.g. to inject a clock.
    pub fn with_pipeline(mut self, pipeline: ViolationPipeline<P, R>) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn store(&self) -> &TrackStore {
        &self.store
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Process one frame and draw the overlay onto it.
    ///
    /// Crops for plate recognition are taken before anything is drawn.
    pub fn process_frame(&mut self, frame_index: u64, image: &mut Image) -> Result<FrameReport> {
        let tracks = self
            .tracker
            .detect_and_track(image)
            .map_err(|e| Error::Tracker(Box::new(e)))?;

        let mut report = FrameReport {
            frame_index,
            ..FrameReport::default()
        };
        let mut drawn: Vec<(BBox, String)> = Vec::with_capacity(tracks.len());

        for track in tracks {
            let Some(label) = self.classes.get(&track.class_id) else {
                continue;
            };
            report.tracked += 1;
            drawn.push((track.bbox, format!("{}-{}", track.id, label)));

            let vehicle = self.store.get_or_create(track.id, label);
            vehicle.set_bbox(track.bbox);
            let (_, center_y) = track.bbox.center();

            match self.lines.update(vehicle, center_y, frame_index) {
                Some(CrossingEvent::Entered(_)) => report.entries.push(track.id),
                Some(CrossingEvent::Exited { entry, exit }) => {
                    let Some(measurement) = self.estimator.estimate(&entry, &exit) else {
                        continue;
                    };
                    debug!(
                        id = track.id,
                        speed_kmph = measurement.speed_kmph,
                        delta_frames = measurement.delta_frames,
                        "speed measured"
                    );
                    report.measurements.push((track.id, measurement));

                    if let Some(record) = self.pipeline.process(
                        image,
                        vehicle,
                        measurement.speed_kmph,
                        &mut self.sink,
                    )? {
                        report.records.push(record);
                    }
                }
                None => {}
            }
        }

        for (bbox, label) in &drawn {
            self.overlay.draw_vehicle(image, bbox, label);
        }
        self.overlay.draw_lines(image);

        Ok(report)
    }

    /// Drive the loop until the source is exhausted or `stop` is set.
    /// Frames are numbered from 1.
    pub fn run<V, F>(&mut self, source: &mut V, frame_sink: &mut F, stop: &AtomicBool) -> Result<RunSummary>
    where
        V: VideoSource + ?Sized,
        F: FrameSink + ?Sized,
    {
        let mut summary = RunSummary::default();

        loop {
            if stop.load(Ordering::Relaxed) {
                info!(frames = summary.frames, "stop requested");
                summary.interrupted = true;
                break;
            }
            let Some(mut image) = source.next_frame()? else {
                break;
            };
            summary.frames += 1;
            let frame_index = summary.frames;

            let report = self.process_frame(frame_index, &mut image)?;
            if report.tracked > 0 {
                debug!(frame = frame_index, tracked = report.tracked, "frame processed");
            }
            frame_sink.write_frame(frame_index, &image)?;
        }

        summary.vehicles = self.store.len();
        summary.violations = self.store.logged_count();
        info!(
            frames = summary.frames,
            vehicles = summary.vehicles,
            violations = summary.violations,
            "run finished"
        );
        Ok(summary)
    }
}
