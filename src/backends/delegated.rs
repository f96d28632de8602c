//! Model-backed backend
//!
//! Acquires a segmentation session once, at construction. When acquisition
//! fails the backend either refuses to exist or, if the caller allows it,
//! switches permanently to the deterministic fallback and remembers why.

use super::{Backend, FallbackBackend};
use crate::{
    config::RemovalOptions,
    error::{RemoverError, Result},
    inference::{SegmentationSession, SessionProvider},
    services::ImageIOService,
    types::Role,
    utils::MaskPostprocessor,
};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// What to do when the model session cannot be acquired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionPolicy {
    /// Fail construction with `BackendUnavailable`
    Strict,
    /// Run the fallback transform for the backend's whole lifetime
    DowngradeToFallback,
}

enum Mode {
    Model(Mutex<Box<dyn SegmentationSession>>),
    Degraded {
        reason: String,
        fallback: FallbackBackend,
    },
}

/// Backend delegating mask prediction to an external segmentation model
pub struct DelegatedBackend {
    model_name: String,
    mode: Mode,
}

impl DelegatedBackend {
    /// Acquire a session for `model_name` from `provider`
    ///
    /// # Errors
    /// - `RemoverError::BackendUnavailable` when acquisition fails under
    ///   [`AcquisitionPolicy::Strict`]
    #[instrument(skip(provider), fields(runtime = provider.runtime_name()))]
    pub fn acquire(
        provider: &dyn SessionProvider,
        role: Role,
        model_name: &str,
        policy: AcquisitionPolicy,
    ) -> Result<Self> {
        match provider.acquire(model_name) {
            Ok(session) => {
                info!(model = model_name, "Segmentation session acquired");
                Ok(Self {
                    model_name: model_name.to_string(),
                    mode: Mode::Model(Mutex::new(session)),
                })
            },
            Err(e) => match policy {
                AcquisitionPolicy::Strict => Err(RemoverError::backend_unavailable(
                    role,
                    format!("Failed to acquire session for '{}': {}", model_name, e),
                )),
                AcquisitionPolicy::DowngradeToFallback => {
                    warn!(
                        model = model_name,
                        error = %e,
                        "Segmentation session unavailable, using center-crop fallback"
                    );
                    Ok(Self {
                        model_name: model_name.to_string(),
                        mode: Mode::Degraded {
                            reason: e.to_string(),
                            fallback: FallbackBackend::new(),
                        },
                    })
                },
            },
        }
    }

    /// Model the backend was asked to load
    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    fn run_model(
        session: &Mutex<Box<dyn SegmentationSession>>,
        input: &Path,
    ) -> Result<PathBuf> {
        let image = ImageIOService::load_image(input)?;
        let rgb = image.to_rgb8();

        let mask = {
            let mut session = session
                .lock()
                .map_err(|_| RemoverError::unexpected("Segmentation session lock poisoned"))?;
            session.predict_mask(&rgb)?
        };

        let result = MaskPostprocessor::apply_mask(&image, &mask)?;
        let output_path = ImageIOService::output_path_for(input);
        ImageIOService::save_png(&DynamicImage::ImageRgba8(result), &output_path)?;
        Ok(output_path)
    }
}

impl Backend for DelegatedBackend {
    fn name(&self) -> &str {
        match self.mode {
            Mode::Model(_) => "segmentation_model",
            Mode::Degraded { .. } => "segmentation_model_degraded",
        }
    }

    fn is_fallback(&self) -> bool {
        matches!(self.mode, Mode::Degraded { .. })
    }

    fn degraded_reason(&self) -> Option<&str> {
        match &self.mode {
            Mode::Model(_) => None,
            Mode::Degraded { reason, .. } => Some(reason),
        }
    }

    #[instrument(skip(self, options), fields(model = %self.model_name, input = %input.display()))]
    fn process(&self, input: &Path, options: &RemovalOptions) -> Result<PathBuf> {
        match &self.mode {
            Mode::Model(session) => {
                let output_path = Self::run_model(session, input)?;
                debug!(output = %output_path.display(), "Model processing completed");
                Ok(output_path)
            },
            Mode::Degraded { fallback, .. } => fallback.process(input, options),
        }
    }
}
