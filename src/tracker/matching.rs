//! Detection input and assignment utilities for the tracker.

use ndarray::Array2;

use crate::geometry::BBox;

/// Detection input for the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Bounding box in TLBR format (x1, y1, x2, y2)
    pub tlbr: [f32; 4],
    /// Detection confidence score
    pub score: f32,
    /// Detector class id (COCO ids for the stock vehicle models)
    pub class_id: u32,
    /// Identity supplied by an upstream tracker, if any
    pub track_id: Option<u64>,
}

impl Detection {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, score: f32, class_id: u32) -> Self {
        Self {
            tlbr: [x1, y1, x2, y2],
            score,
            class_id,
            track_id: None,
        }
    }

    pub fn with_track_id(mut self, track_id: u64) -> Self {
        self.track_id = Some(track_id);
        self
    }

    pub fn bbox(&self) -> BBox {
        BBox::from_tlbr_f32(self.tlbr)
    }
}

/// A box paired with its class id; association never crosses classes.
pub type ClassBox = ([f32; 4], u32);

pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = inter_w * inter_h;

    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    let union = area_a + area_b - inter;

    if union > 0.0 { inter / union } else { 0.0 }
}

/// `1 - IoU` cost between every track and detection; class mismatches cost 1.
pub fn iou_distance(tracks: &[ClassBox], detections: &[ClassBox]) -> Array2<f64> {
    Array2::from_shape_fn((tracks.len(), detections.len()), |(i, j)| {
        let (track_box, track_class) = &tracks[i];
        let (det_box, det_class) = &detections[j];
        if track_class != det_class {
            1.0
        } else {
            1.0 - f64::from(iou(track_box, det_box))
        }
    })
}

/// Weight IoU similarity by detection confidence.
pub fn fuse_score(cost: &mut Array2<f64>, scores: &[f32]) {
    for ((_, j), value) in cost.indexed_iter_mut() {
        let similarity = (1.0 - *value) * f64::from(scores[j]);
        *value = 1.0 - similarity;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignment {
    pub matches: Vec<(usize, usize)>,
    pub unmatched_rows: Vec<usize>,
    pub unmatched_cols: Vec<usize>,
}

/// Minimum-cost assignment where pairs costing more than `cost_limit` stay
/// unmatched.
///
/// The cost matrix is extended to `(rows + cols)` square with dummy rows and
/// columns priced at `cost_limit / 2`, so leaving both sides unmatched is
/// always at least as cheap as accepting a pair above the limit.
pub fn linear_assignment(cost: &Array2<f64>, cost_limit: f64) -> Assignment {
    let (rows, cols) = cost.dim();
    if rows == 0 || cols == 0 {
        return Assignment {
            matches: Vec::new(),
            unmatched_rows: (0..rows).collect(),
            unmatched_cols: (0..cols).collect(),
        };
    }

    let size = rows + cols;
    let mut extended = Array2::<f64>::from_elem((size, size), cost_limit / 2.0);
    for i in rows..size {
        for j in cols..size {
            extended[[i, j]] = 0.0;
        }
    }
    for ((i, j), &value) in cost.indexed_iter() {
        extended[[i, j]] = value;
    }

    let mut row_matched = vec![false; rows];
    let mut col_matched = vec![false; cols];
    let mut matches = Vec::new();

    if let Ok((row_to_col, _)) = lapjv::lapjv(&extended) {
        for (i, &j) in row_to_col.iter().enumerate().take(rows) {
            if j < cols && cost[[i, j]] <= cost_limit {
                matches.push((i, j));
                row_matched[i] = true;
                col_matched[j] = true;
            }
        }
    }

    Assignment {
        matches,
        unmatched_rows: unmatched(&row_matched),
        unmatched_cols: unmatched(&col_matched),
    }
}

fn unmatched(mask: &[bool]) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter_map(|(i, &matched)| (!matched).then_some(i))
        .collect()
}
