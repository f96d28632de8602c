//! Shared utilities for model-backed processing

pub mod preprocessing;

pub use preprocessing::{ImagePreprocessor, MaskPostprocessor};
