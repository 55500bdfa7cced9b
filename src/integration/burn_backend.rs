//! Burn inference backend for vehicle and plate detection.
//!
//! `BurnDetector` implements both [`DetectionSource`] (vehicle detection,
//! feeding the built-in tracker) and [`PlateDetector`] (plate boxes on a
//! vehicle crop).
//!
//! # Example
//!
//! ```ignore
//! use overspeed::integration::{BurnDetector, BurnModel, RawDetection};
//! use burn::backend::NdArray;
//!
//! struct MyYoloModel { /* ... */ }
//!
//! impl BurnModel<NdArray> for MyYoloModel {
//!     fn forward(&self, input: burn::tensor::Tensor<NdArray, 4>) -> Vec<RawDetection> {
//!         // Run inference
//!     }
//! }
//!
//! let detector = BurnDetector::new(MyYoloModel::load("yolov8n.bin"), Default::default());
//! ```

use burn::prelude::*;
use burn::tensor::Tensor;
use ndarray::{Array3, Axis};
use thiserror::Error;

use super::{DetectionBuilder, DetectionSource, PlateDetector};
use crate::frame::{self, Image};
use crate::geometry::BBox;
use crate::tracker::Detection;

#[derive(Debug, Clone, Error)]
pub enum BurnDetectorError {
    #[error("model expects {expected} channels, image has {got}")]
    InvalidChannels { expected: usize, got: usize },
    #[error("image is empty")]
    EmptyImage,
}

/// Raw detection output from the model before thresholding.
#[derive(Debug, Clone)]
pub struct RawDetection {
    /// Box in model input pixels: [x1, y1, x2, y2] or [cx, cy, w, h]
    pub bbox: [f32; 4],
    pub score: f32,
    pub class_id: Option<u32>,
}

/// Trait for Burn-based detection models.
pub trait BurnModel<B: Backend>: Send + Sync {
    /// Run forward pass on a `[batch, channels, height, width]` tensor.
    fn forward(&self, input: Tensor<B, 4>) -> Vec<RawDetection>;

    /// Expected input size (channels, height, width).
    fn input_size(&self) -> (usize, usize, usize) {
        (3, 640, 640)
    }

    /// Whether bbox output is in XYWH format (vs TLBR).
    fn bbox_is_xywh(&self) -> bool {
        true
    }
}

pub struct BurnDetector<B: Backend, M: BurnModel<B>> {
    model: M,
    device: B::Device,
    conf_threshold: f32,
}

impl<B: Backend, M: BurnModel<B>> BurnDetector<B, M> {
    pub fn new(model: M, device: B::Device) -> Self {
        Self {
            model,
            device,
            conf_threshold: 0.25,
        }
    }

    pub fn with_conf_threshold(mut self, threshold: f32) -> Self {
        self.conf_threshold = threshold;
        self
    }

    /// Resize to the model input with nearest-neighbour sampling and convert
    /// to a normalised CHW tensor.
    pub fn preprocess(&self, image: &Image) -> Result<Tensor<B, 4>, BurnDetectorError> {
        let (channels, target_h, target_w) = self.model.input_size();
        let (rows, cols, got) = image.dim();
        if got != channels {
            return Err(BurnDetectorError::InvalidChannels {
                expected: channels,
                got,
            });
        }
        if rows == 0 || cols == 0 {
            return Err(BurnDetectorError::EmptyImage);
        }

        let resized = Array3::from_shape_fn((target_h, target_w, channels), |(y, x, c)| {
            image[[y * rows / target_h, x * cols / target_w, c]]
        });
        let mut chw = resized.view();
        chw.swap_axes(0, 2);
        chw.swap_axes(1, 2);
        debug_assert_eq!(chw.len_of(Axis(0)), channels);

        let data: Vec<f32> = chw.iter().map(|&v| f32::from(v) / 255.0).collect();
        Ok(Tensor::<B, 1>::from_floats(data.as_slice(), &self.device).reshape([
            1, channels, target_h, target_w,
        ]))
    }

    fn run(&self, image: &Image) -> Result<Vec<Detection>, BurnDetectorError> {
        let tensor = self.preprocess(image)?;
        let (_, target_h, target_w) = self.model.input_size();
        let (width, height) = frame::dimensions(image);
        let sx = width as f32 / target_w as f32;
        let sy = height as f32 / target_h as f32;

        Ok(self
            .model
            .forward(tensor)
            .into_iter()
            .filter(|d| d.score >= self.conf_threshold)
            .map(|d| {
                let [a, b, c, e] = d.bbox;
                let builder = DetectionBuilder::new()
                    .score(d.score)
                    .class_id(d.class_id.unwrap_or(0));
                let builder = if self.model.bbox_is_xywh() {
                    builder.xywh(a, b, c, e)
                } else {
                    builder.tlbr(a, b, c, e)
                };
                builder.scale(sx, sy).build()
            })
            .collect())
    }
}

impl<B: Backend, M: BurnModel<B>> DetectionSource for BurnDetector<B, M> {
    type Error = BurnDetectorError;

    fn detect(&mut self, image: &Image) -> Result<Vec<Detection>, Self::Error> {
        self.run(image)
    }
}

impl<B: Backend, M: BurnModel<B>> PlateDetector for BurnDetector<B, M> {
    type Error = BurnDetectorError;

    fn detect_plates(&mut self, image: &Image) -> Result<Vec<BBox>, Self::Error> {
        Ok(self.run(image)?.iter().map(Detection::bbox).collect())
    }
}
