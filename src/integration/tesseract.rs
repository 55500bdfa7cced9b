//! In-process OCR through libtesseract.

use std::ffi::CString;
use std::path::Path;

use leptess::tesseract::TessApi;
use thiserror::Error;
use tracing::debug;

use super::{TextRecognition, TextRecognizer};
use crate::frame::{self, Image};

/// Single text line.
const PAGE_SEGMENTATION_MODE: &str = "7";

#[derive(Debug, Clone, Error)]
pub enum TesseractError {
    #[error("failed to initialise tesseract: {0}")]
    Init(String),
    #[error("failed to set tesseract variable {name}: {reason}")]
    Variable { name: String, reason: String },
    #[error("crop is not an RGB image")]
    NotRgb,
    #[error("tesseract rejected the image: {0}")]
    Image(String),
    #[error("tesseract returned invalid text: {0}")]
    Text(String),
}

pub struct TesseractRecognizer {
    api: TessApi,
}

impl TesseractRecognizer {
    pub fn new(
        data_path: Option<&Path>,
        language: &str,
        whitelist: Option<&str>,
    ) -> Result<Self, TesseractError> {
        let data_path = data_path
            .map(|p| {
                p.to_str()
                    .ok_or_else(|| TesseractError::Init(format!("non UTF-8 path {}", p.display())))
            })
            .transpose()?;
        let api = TessApi::new(data_path, language).map_err(|e| TesseractError::Init(format!("{e:?}")))?;

        let mut recognizer = Self { api };
        recognizer.set_variable("tessedit_pageseg_mode", PAGE_SEGMENTATION_MODE)?;
        if let Some(whitelist) = whitelist {
            recognizer.set_variable("tessedit_char_whitelist", whitelist)?;
        }
        Ok(recognizer)
    }

    fn set_variable(&mut self, name: &str, value: &str) -> Result<(), TesseractError> {
        let variable_error = |reason: String| TesseractError::Variable {
            name: name.to_string(),
            reason,
        };
        let key = CString::new(name).map_err(|e| variable_error(e.to_string()))?;
        let value = CString::new(value).map_err(|e| variable_error(e.to_string()))?;
        self.api
            .raw
            .set_variable(&key, &value)
            .map_err(|e| variable_error(format!("{e:?}")))
    }
}

impl TextRecognizer for TesseractRecognizer {
    type Error = TesseractError;

    fn recognize(&mut self, image: &Image) -> Result<Vec<TextRecognition>, Self::Error> {
        let gray = frame::to_luma(image).ok_or(TesseractError::NotRgb)?;
        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }

        self.api
            .raw
            .set_image(gray.as_raw(), width as i32, height as i32, 1, width as i32)
            .map_err(|e| TesseractError::Image(format!("{e:?}")))?;
        let text = self
            .api
            .get_utf8_text()
            .map_err(|e| TesseractError::Text(e.to_string()))?;
        let confidence = self.api.mean_text_conf() as f32 / 100.0;
        debug!(text = text.trim(), confidence, "tesseract result");

        Ok(text_lines(&text, confidence))
    }
}

fn text_lines(text: &str, confidence: f32) -> Vec<TextRecognition> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| TextRecognition::new(line, confidence))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_lines_skip_blank_output() {
        let lines = text_lines("\n  MH12AB1234 \n\n\x0c", 0.87);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "MH12AB1234");
        assert!((lines[0].confidence - 0.87).abs() < 1e-6);

        assert!(text_lines("  \n", 0.5).is_empty());
    }
}
