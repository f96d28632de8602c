//! Shared fixtures for integration tests

#![allow(dead_code)]

use clothing_bgremove::{
    FallbackBackend, Remover, RemoverError, RemoverFactory, Result, Role, SegmentationSession,
    SessionProvider,
};
use image::{GrayImage, Luma, Rgba, RgbImage, RgbaImage};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Write an opaque RGBA PNG with a position-dependent pattern
pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let image = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 2 % 256) as u8, (y * 3 % 256) as u8, 200, 255])
    });
    let path = dir.join(name);
    image
        .save_with_format(&path, image::ImageFormat::Png)
        .unwrap();
    path
}

/// Factory that builds fallback removers and counts constructions
pub struct CountingFactory {
    constructions: AtomicUsize,
    failures_left: AtomicUsize,
    delay: Duration,
}

impl CountingFactory {
    pub fn new(delay: Duration) -> Self {
        Self {
            constructions: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(0),
            delay,
        }
    }

    pub fn failing_first(failures: usize) -> Self {
        let factory = Self::new(Duration::ZERO);
        factory.failures_left.store(failures, Ordering::SeqCst);
        factory
    }

    pub fn constructions(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }
}

impl RemoverFactory for CountingFactory {
    fn create(&self, role: Role, sub_model: Option<&str>) -> Result<Remover> {
        self.constructions.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);

        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            return Err(RemoverError::invalid_config("simulated model load failure"));
        }

        Remover::new(
            role,
            Box::new(FallbackBackend::new()),
            sub_model.unwrap_or("u2net_cloth_seg"),
        )
    }
}

/// Provider that either refuses every session or hands out threshold sessions
pub struct ScriptedProvider {
    pub available: bool,
    pub acquisitions: AtomicUsize,
}

impl ScriptedProvider {
    pub fn available() -> Self {
        Self {
            available: true,
            acquisitions: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            acquisitions: AtomicUsize::new(0),
        }
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }
}

impl SessionProvider for ScriptedProvider {
    fn acquire(&self, model_name: &str) -> Result<Box<dyn SegmentationSession>> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        if !self.available {
            return Err(RemoverError::invalid_config(format!(
                "model '{}' not installed",
                model_name
            )));
        }
        Ok(Box::new(ThresholdSession {
            model_name: model_name.to_string(),
        }))
    }

    fn runtime_name(&self) -> &'static str {
        "scripted"
    }
}

/// Marks pixels with a red channel above 128 as foreground
struct ThresholdSession {
    model_name: String,
}

impl SegmentationSession for ThresholdSession {
    fn predict_mask(&mut self, image: &RgbImage) -> Result<GrayImage> {
        let (width, height) = image.dimensions();
        Ok(GrayImage::from_fn(width, height, |x, y| {
            Luma([if image.get_pixel(x, y)[0] > 128 { 255 } else { 0 }])
        }))
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
