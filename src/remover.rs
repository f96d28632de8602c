//! Per-role remover facade
//!
//! A [`Remover`] owns exactly one backend and gives callers the same
//! `process` / `model_name` contract whichever backend ended up serving the
//! role.

use crate::{
    backends::Backend,
    config::RemovalOptions,
    error::{RemoverError, Result},
    types::{RemovalOutput, Role},
};
use std::path::Path;
use tracing::{debug, instrument};

/// Model name of the ultra role when its model session is live
pub const ULTRA_MODEL_NAME: &str = "clothing_optimized";
/// Model name of the ultra role when it runs the fallback
pub const ULTRA_FALLBACK_MODEL_NAME: &str = "simple_ultra";
/// Prefix of advanced-role model names when the model session is live
pub const MODEL_FAMILY_PREFIX: &str = "clothing";
/// Prefix of advanced-role model names when running the fallback
pub const FALLBACK_FAMILY_PREFIX: &str = "simple";

/// Facade binding a backend to a role and a reported model name
pub struct Remover {
    role: Role,
    backend: Box<dyn Backend>,
    model_name: String,
    sub_model: Option<String>,
}

impl std::fmt::Debug for Remover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Remover")
            .field("role", &self.role)
            .field("backend", &self.backend.name())
            .field("model_name", &self.model_name)
            .finish()
    }
}

impl Remover {
    /// Wrap a ready backend for `role`
    ///
    /// `sub_model` names the segmentation model for the advanced role and is
    /// part of its reported model name; the ultra role ignores it.
    ///
    /// # Errors
    /// - `RemoverError::InvalidConfig` when the advanced role gets an empty sub-model
    pub fn new(role: Role, backend: Box<dyn Backend>, sub_model: &str) -> Result<Self> {
        let family = if backend.is_fallback() {
            FALLBACK_FAMILY_PREFIX
        } else {
            MODEL_FAMILY_PREFIX
        };

        let (model_name, sub_model) = match role {
            Role::Ultra if backend.is_fallback() => (ULTRA_FALLBACK_MODEL_NAME.to_string(), None),
            Role::Ultra => (ULTRA_MODEL_NAME.to_string(), None),
            Role::Advanced => {
                let sub_model = sub_model.trim();
                if sub_model.is_empty() {
                    return Err(RemoverError::invalid_config(
                        "Advanced remover requires a sub-model name",
                    ));
                }
                (
                    format!("{}_{}", family, sub_model),
                    Some(sub_model.to_string()),
                )
            },
        };

        Ok(Self {
            role,
            backend,
            model_name,
            sub_model,
        })
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Name reported to callers; never empty
    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Sub-model the advanced role was built with
    #[must_use]
    pub fn sub_model(&self) -> Option<&str> {
        self.sub_model.as_deref()
    }

    /// Whether results from this remover come from the deterministic fallback
    #[must_use]
    pub fn used_fallback(&self) -> bool {
        self.backend.is_fallback()
    }

    /// Acquisition error that put the backend on the fallback path
    #[must_use]
    pub fn degraded_reason(&self) -> Option<&str> {
        self.backend.degraded_reason()
    }

    /// Name of the backend strategy behind this remover
    #[must_use]
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Remove the background of the image at `input`
    ///
    /// Backend errors propagate unchanged.
    ///
    /// # Errors
    /// - `RemoverError::Decode` when `input` is not a readable image
    /// - `RemoverError::Io` when reading input or writing output fails
    #[instrument(skip(self, options), fields(role = %self.role, model = %self.model_name))]
    pub fn process(&self, input: &Path, options: &RemovalOptions) -> Result<RemovalOutput> {
        debug!(?options, "Processing request");
        let output_path = self.backend.process(input, options)?;
        Ok(RemovalOutput {
            output_path,
            used_fallback: self.backend.is_fallback(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::write_test_image;
    use crate::backends::FallbackBackend;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct ModelStub;

    impl Backend for ModelStub {
        fn name(&self) -> &str {
            "stub"
        }

        fn is_fallback(&self) -> bool {
            false
        }

        fn process(&self, input: &Path, _options: &RemovalOptions) -> Result<PathBuf> {
            Ok(input.with_extension("out.png"))
        }
    }

    #[test]
    fn test_advanced_model_name_contains_sub_model() {
        let remover = Remover::new(Role::Advanced, Box::new(ModelStub), "u2net_cloth_seg").unwrap();
        assert_eq!(remover.model_name(), "clothing_u2net_cloth_seg");
        assert_eq!(remover.sub_model(), Some("u2net_cloth_seg"));
        assert!(!remover.used_fallback());

        let remover =
            Remover::new(Role::Advanced, Box::new(FallbackBackend::new()), "u2net_cloth_seg")
                .unwrap();
        assert_eq!(remover.model_name(), "simple_u2net_cloth_seg");
        assert!(remover.used_fallback());
    }

    #[test]
    fn test_ultra_model_names() {
        let remover = Remover::new(Role::Ultra, Box::new(ModelStub), "ignored").unwrap();
        assert_eq!(remover.model_name(), ULTRA_MODEL_NAME);
        assert!(remover.sub_model().is_none());

        let remover = Remover::new(Role::Ultra, Box::new(FallbackBackend::new()), "").unwrap();
        assert_eq!(remover.model_name(), ULTRA_FALLBACK_MODEL_NAME);
        assert_eq!(remover.role(), Role::Ultra);
    }

    #[test]
    fn test_advanced_requires_sub_model() {
        let err = Remover::new(Role::Advanced, Box::new(ModelStub), "  ").unwrap_err();
        assert_eq!(err.kind(), "invalid_config");
    }

    #[test]
    fn test_process_threads_fallback_flag() {
        let dir = TempDir::new().unwrap();
        let input = write_test_image(dir.path(), "coat.png", 24, 16);
        let remover = Remover::new(Role::Ultra, Box::new(FallbackBackend::new()), "").unwrap();

        let output = remover.process(&input, &RemovalOptions::default()).unwrap();
        assert!(output.used_fallback);
        assert_eq!(output.output_path, dir.path().join("coat_bg_removed.png"));
        assert!(std::fs::metadata(&output.output_path).unwrap().len() > 0);
    }

    #[test]
    fn test_debug_shows_backend_name() {
        let remover = Remover::new(Role::Ultra, Box::new(FallbackBackend::new()), "").unwrap();
        let rendered = format!("{:?}", remover);
        assert!(rendered.contains("center_crop"));
        assert!(rendered.contains("simple_ultra"));
    }
}
