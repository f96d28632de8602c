//! Segmentation session abstraction
//!
//! A [`SessionProvider`] stands in for the external model library: it turns a
//! pretrained model name into a live [`SegmentationSession`]. The delegated
//! backend only ever talks to these traits, so the runtime behind them can be
//! swapped without touching the fallback protocol.

use crate::error::Result;
use image::{GrayImage, RgbImage};

/// A loaded segmentation model
pub trait SegmentationSession: Send {
    /// Predict a foreground mask with the same dimensions as `image`
    ///
    /// 255 marks foreground, 0 marks background.
    ///
    /// # Errors
    /// - Model inference failures
    /// - Tensor conversion or shape errors
    fn predict_mask(&mut self, image: &RgbImage) -> Result<GrayImage>;

    /// Name of the model this session was created from
    fn model_name(&self) -> &str;
}

/// Source of segmentation sessions keyed by model name
pub trait SessionProvider: Send + Sync {
    /// Acquire a session for `model_name`
    ///
    /// # Errors
    /// - Unknown model name
    /// - Model file missing or unreadable
    /// - Runtime initialization failures
    fn acquire(&self, model_name: &str) -> Result<Box<dyn SegmentationSession>>;

    /// Short identifier of the runtime behind this provider
    fn runtime_name(&self) -> &'static str;
}

/// Provider used when no model runtime is compiled in
///
/// Every acquisition fails, which sends delegated backends down their
/// fallback policy.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableProvider;

impl SessionProvider for UnavailableProvider {
    fn acquire(&self, model_name: &str) -> Result<Box<dyn SegmentationSession>> {
        Err(crate::error::RemoverError::invalid_config(format!(
            "No segmentation runtime available to load '{}' (build with the 'onnx' feature)",
            model_name
        )))
    }

    fn runtime_name(&self) -> &'static str {
        "none"
    }
}
