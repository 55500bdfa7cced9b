use std::collections::VecDeque;
use std::convert::Infallible;
use std::fs;

use ndarray::{Array3, s};

use overspeed::violation::{CSV_HEADER, UNKNOWN_PLATE};
use overspeed::{
    BBox, Calibration, CrossingLines, CsvLogSink, Image, LogRecord, LogSink, LogState,
    MonitorSettings, PlateDetector, SpeedMonitor, TextRecognition, TextRecognizer, VehicleTrack,
    VehicleTracker,
};

const CAR: u32 = 2;
const TRUCK: u32 = 7;

struct ScriptedTracker(VecDeque<Vec<VehicleTrack>>);

impl VehicleTracker for ScriptedTracker {
    type Error = Infallible;

    fn detect_and_track(&mut self, _image: &Image) -> Result<Vec<VehicleTrack>, Infallible> {
        Ok(self.0.pop_front().unwrap_or_default())
    }
}

/// Reports the whole crop as one plate, or nothing.
struct WholeCropPlate(bool);

impl PlateDetector for WholeCropPlate {
    type Error = Infallible;

    fn detect_plates(&mut self, image: &Image) -> Result<Vec<BBox>, Infallible> {
        if !self.0 {
            return Ok(Vec::new());
        }
        let (rows, cols, _) = image.dim();
        Ok(vec![BBox::new(0, 0, cols as i32, rows as i32)])
    }
}

/// "Reads" the red value of the top-left pixel, so each vehicle painted in
/// its own shade gets its own plate.
struct PixelOcr;

impl TextRecognizer for PixelOcr {
    type Error = Infallible;

    fn recognize(&mut self, image: &Image) -> Result<Vec<TextRecognition>, Infallible> {
        Ok(vec![TextRecognition::new(format!("PLATE{}", image[[0, 0, 0]]), 0.9)])
    }
}

fn settings() -> MonitorSettings {
    let lines = CrossingLines::new(330, 800).unwrap();
    MonitorSettings {
        calibration: Calibration::new(3.0, lines),
        fps: 30.0,
        speed_limit: 10.0,
        classes: [(CAR, "car".to_string()), (TRUCK, "truck".to_string())]
            .into_iter()
            .collect(),
    }
}

/// 60x20 box centred on (`cx`, `cy`).
fn track(id: u64, class_id: u32, cx: i32, cy: i32) -> VehicleTrack {
    VehicleTrack {
        id,
        class_id,
        bbox: BBox::new(cx - 30, cy - 10, cx + 30, cy + 10),
    }
}

fn frame() -> Image {
    Array3::zeros((900, 400, 3))
}

fn monitor<S: LogSink>(
    frames: Vec<Vec<VehicleTrack>>,
    with_plates: bool,
    sink: S,
) -> SpeedMonitor<ScriptedTracker, WholeCropPlate, PixelOcr, S> {
    SpeedMonitor::new(
        settings(),
        ScriptedTracker(frames.into()),
        WholeCropPlate(with_plates),
        PixelOcr,
        sink,
    )
}

#[test]
fn scenario_a_single_speeding_car() {
    let mut monitor = monitor(
        vec![vec![track(7, CAR, 100, 330)], vec![track(7, CAR, 100, 800)]],
        true,
        Vec::<LogRecord>::new(),
    );

    let entered = monitor.process_frame(100, &mut frame()).unwrap();
    assert_eq!(entered.entries, vec![7]);

    let exited = monitor.process_frame(106, &mut frame()).unwrap();
    assert_eq!(exited.measurements.len(), 1);
    let (id, measurement) = exited.measurements[0];
    assert_eq!(id, 7);
    assert_eq!(measurement.delta_pixels, 470);
    assert_eq!(measurement.delta_frames, 6);
    assert!((measurement.speed_kmph - 54.0).abs() < 1e-9);

    let records = monitor.sink();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, 7);
    assert_eq!(records[0].vehicle_type, "car");
    assert_eq!(records[0].plate, "PLATE0");
    assert!(records[0].to_csv_line().starts_with("7,car,PLATE0,54.0,"));

    let vehicle = monitor.store().get(7).unwrap();
    assert_eq!(vehicle.log_state(), LogState::Logged);
    assert!(vehicle.entry().unwrap().frame_index < vehicle.exit().unwrap().frame_index);
}

#[test]
fn scenario_b_never_reaches_entry_line() {
    let frames = (0..10).map(|i| vec![track(3, CAR, 100, 100 + i * 20)]).collect();
    let mut monitor = monitor(frames, true, Vec::<LogRecord>::new());

    for index in 1..=10 {
        let report = monitor.process_frame(index, &mut frame()).unwrap();
        assert!(report.entries.is_empty());
    }

    let vehicle = monitor.store().get(3).unwrap();
    assert!(vehicle.entry().is_none());
    assert!(vehicle.exit().is_none());
    assert!(!vehicle.is_logged());
    assert!(monitor.sink().is_empty());
}

#[test]
fn scenario_c_no_plate_found_still_logged() {
    let mut monitor = monitor(
        vec![vec![track(4, TRUCK, 200, 340)], vec![track(4, TRUCK, 200, 810)]],
        false,
        Vec::<LogRecord>::new(),
    );

    monitor.process_frame(1, &mut frame()).unwrap();
    let report = monitor.process_frame(3, &mut frame()).unwrap();

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].plate, UNKNOWN_PLATE);
    assert_eq!(report.records[0].vehicle_type, "truck");
    assert!(monitor.store().get(4).unwrap().is_logged());
}

#[test]
fn scenario_d_two_vehicles_exit_same_frame() {
    let mut monitor = monitor(
        vec![
            vec![track(1, CAR, 80, 330), track(2, TRUCK, 300, 400)],
            vec![track(1, CAR, 80, 800), track(2, TRUCK, 300, 820)],
        ],
        true,
        Vec::<LogRecord>::new(),
    );

    monitor.process_frame(10, &mut frame()).unwrap();

    // Paint each vehicle's region so the plates differ.
    let mut image = frame();
    image.slice_mut(s![790..810, 50..110, 0]).fill(11);
    image.slice_mut(s![810..830, 270..330, 0]).fill(22);
    let report = monitor.process_frame(16, &mut image).unwrap();

    assert_eq!(report.records.len(), 2);
    let mut records = monitor.sink().clone();
    records.sort_by_key(|r| r.id);

    assert_eq!(records[0].id, 1);
    assert_eq!(records[0].plate, "PLATE11");
    assert!((records[0].speed_kmph - 54.0).abs() < 1e-9);

    assert_eq!(records[1].id, 2);
    assert_eq!(records[1].vehicle_type, "truck");
    assert_eq!(records[1].plate, "PLATE22");
    // 420 px over 6 frames
    let expected = 420.0 * (3.0 / 470.0) / (6.0 / 30.0) * 3.6;
    assert!((records[1].speed_kmph - expected).abs() < 1e-9);
}

#[test]
fn completed_vehicle_is_inert() {
    let mut frames = vec![vec![track(5, CAR, 100, 330)], vec![track(5, CAR, 100, 800)]];
    frames.extend((0..5).map(|i| vec![track(5, CAR, 100, 820 + i * 10)]));
    frames.push(vec![track(5, CAR, 100, 340)]);
    let mut monitor = monitor(frames, true, Vec::<LogRecord>::new());

    monitor.process_frame(1, &mut frame()).unwrap();
    monitor.process_frame(7, &mut frame()).unwrap();
    let entry = monitor.store().get(5).unwrap().entry();
    let exit = monitor.store().get(5).unwrap().exit();

    for index in 8..14 {
        let report = monitor.process_frame(index, &mut frame()).unwrap();
        assert!(report.entries.is_empty());
        assert!(report.measurements.is_empty());
        assert!(report.records.is_empty());
    }

    let vehicle = monitor.store().get(5).unwrap();
    assert_eq!(vehicle.entry(), entry);
    assert_eq!(vehicle.exit(), exit);
    assert_eq!(monitor.sink().len(), 1);
}

#[test]
fn slow_vehicle_measured_but_not_logged() {
    let mut monitor = monitor(
        vec![vec![track(9, CAR, 100, 330)], vec![track(9, CAR, 100, 800)]],
        true,
        Vec::<LogRecord>::new(),
    );

    monitor.process_frame(1, &mut frame()).unwrap();
    // 3 m in 60 frames at 30 fps: 5.4 km/h
    let report = monitor.process_frame(61, &mut frame()).unwrap();

    assert_eq!(report.measurements.len(), 1);
    assert!((report.measurements[0].1.speed_kmph - 5.4).abs() < 1e-9);
    assert!(report.records.is_empty());
    assert!(!monitor.store().get(9).unwrap().is_logged());
}

#[test]
fn csv_log_lines_have_five_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs").join("overspeeding_log.csv");
    let sink = CsvLogSink::open(&path).unwrap();

    let mut monitor = monitor(
        vec![
            vec![track(1, CAR, 80, 330), track(2, TRUCK, 300, 335)],
            vec![track(1, CAR, 80, 800), track(2, TRUCK, 300, 805)],
        ],
        false,
        sink,
    );
    monitor.process_frame(1, &mut frame()).unwrap();
    monitor.process_frame(4, &mut frame()).unwrap();
    drop(monitor);

    let contents = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines[0], CSV_HEADER);
    assert_eq!(lines.len(), 3);
    for line in &lines {
        assert_eq!(line.split(',').count(), 5, "{line}");
    }
    assert!(lines[1..].iter().all(|l| l.contains(",Unknown,")));
}
