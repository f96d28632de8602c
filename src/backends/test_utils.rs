//! Test utilities and mock sessions for backend and registry tests
//!
//! Mock implementations of [`SessionProvider`] and [`SegmentationSession`]
//! let the delegated backend and the registry be exercised without model
//! files or an ONNX runtime.

use crate::{
    error::{RemoverError, Result},
    inference::{SegmentationSession, SessionProvider},
};
use image::{GrayImage, Luma, Rgba, RgbImage, RgbaImage};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Write an opaque patterned RGBA PNG and return its path
pub fn write_test_image(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let image = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    });
    let path = dir.join(name);
    image
        .save_with_format(&path, image::ImageFormat::Png)
        .unwrap();
    path
}

#[derive(Debug, Clone, Copy)]
enum MockBehavior {
    Fail,
    LeftHalfForeground,
}

/// Session provider with scripted behavior and call counters
#[derive(Debug, Clone)]
pub struct MockSessionProvider {
    behavior: MockBehavior,
    message: String,
    acquisitions: Arc<AtomicUsize>,
    predictions: Arc<AtomicUsize>,
}

impl MockSessionProvider {
    /// Provider whose every acquisition fails with `message`
    #[must_use]
    pub fn failing(message: &str) -> Self {
        Self {
            behavior: MockBehavior::Fail,
            message: message.to_string(),
            acquisitions: Arc::new(AtomicUsize::new(0)),
            predictions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Provider whose sessions mark the left half of every image as foreground
    #[must_use]
    pub fn left_half_foreground() -> Self {
        Self {
            behavior: MockBehavior::LeftHalfForeground,
            message: String::new(),
            acquisitions: Arc::new(AtomicUsize::new(0)),
            predictions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of `acquire` calls so far
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    /// Number of masks predicted by sessions from this provider
    pub fn predictions(&self) -> usize {
        self.predictions.load(Ordering::SeqCst)
    }
}

impl SessionProvider for MockSessionProvider {
    fn acquire(&self, model_name: &str) -> Result<Box<dyn SegmentationSession>> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            MockBehavior::Fail => Err(RemoverError::invalid_config(self.message.clone())),
            MockBehavior::LeftHalfForeground => Ok(Box::new(HalfMaskSession {
                model_name: model_name.to_string(),
                predictions: Arc::clone(&self.predictions),
            })),
        }
    }

    fn runtime_name(&self) -> &'static str {
        "mock"
    }
}

struct HalfMaskSession {
    model_name: String,
    predictions: Arc<AtomicUsize>,
}

impl SegmentationSession for HalfMaskSession {
    fn predict_mask(&mut self, image: &RgbImage) -> Result<GrayImage> {
        self.predictions.fetch_add(1, Ordering::SeqCst);
        let (width, height) = image.dimensions();
        Ok(GrayImage::from_fn(width, height, |x, _| {
            Luma([if x < width / 2 { 255 } else { 0 }])
        }))
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
