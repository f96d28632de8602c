//! Image-processing backends
//!
//! - `fallback`: deterministic center-crop-to-transparent transform
//! - `delegated`: model-backed removal through a [`SessionProvider`](crate::inference::SessionProvider)
//! - `onnx`: ONNX Runtime session provider (feature `onnx`)

pub mod delegated;
pub mod fallback;

#[cfg(feature = "onnx")]
pub mod onnx;

// Test utilities for backend testing
#[cfg(test)]
pub mod test_utils;

use crate::{config::RemovalOptions, error::Result};
use std::path::{Path, PathBuf};

pub use self::delegated::{AcquisitionPolicy, DelegatedBackend};
pub use self::fallback::FallbackBackend;

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxSessionProvider;

/// A single image-processing strategy
///
/// Implementations must be safe to call from several threads at once; any
/// model session that is not must be serialized inside the backend.
pub trait Backend: Send + Sync {
    /// Strategy name for diagnostics
    fn name(&self) -> &str;

    /// Whether this backend produces deterministic fallback output
    fn is_fallback(&self) -> bool;

    /// Why a model-backed backend is running the fallback instead
    fn degraded_reason(&self) -> Option<&str> {
        None
    }

    /// Process `input` and return the path of the written PNG
    ///
    /// The output is always written to a new path derived from `input`.
    ///
    /// # Errors
    /// - `RemoverError::Decode` when `input` is not a readable image
    /// - `RemoverError::Io` when `input` cannot be read or the output cannot be written
    fn process(&self, input: &Path, options: &RemovalOptions) -> Result<PathBuf>;
}
