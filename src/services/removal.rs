//! Request-facing removal service
//!
//! [`RemovalService`] is the seam a transport layer calls: it parses the role
//! string, resolves the remover through the registry, runs processing on the
//! blocking pool and shapes a [`RemovalOutcome`].

use crate::{
    config::{InitMode, RegistryConfig, RemovalOptions},
    error::{RemoverError, Result},
    models::ModelDescriptor,
    registry::RemoverRegistry,
    types::{RemovalOutcome, Role, RoleInfo, RoleStatus},
};
use instant::Instant;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const CATALOG: [RoleInfo; 2] = [
    RoleInfo {
        role: Role::Ultra,
        name: "Ultra AI Model",
        description: "Best available segmentation model with automatic optimization",
        features: &["Smart positioning", "AI-assisted preprocessing", "Ultra quality"],
        recommended: true,
    },
    RoleInfo {
        role: Role::Advanced,
        name: "Advanced Model",
        description: "Caller-selected segmentation sub-model with size correction",
        features: &["Size optimization", "Positioning correction"],
        recommended: false,
    },
];

/// Entry point for background removal requests
#[derive(Debug, Clone)]
pub struct RemovalService {
    registry: Arc<RemoverRegistry>,
    init_mode: InitMode,
}

impl RemovalService {
    /// Wrap an existing registry
    #[must_use]
    pub fn new(registry: Arc<RemoverRegistry>, init_mode: InitMode) -> Self {
        Self {
            registry,
            init_mode,
        }
    }

    /// Build the registry and its default factory from `config`
    ///
    /// # Errors
    /// - Configuration validation failures
    pub fn from_config(config: RegistryConfig) -> Result<Self> {
        let init_mode = config.init_mode;
        let registry = RemoverRegistry::from_config(config)?;
        Ok(Self::new(Arc::new(registry), init_mode))
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<RemoverRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn init_mode(&self) -> InitMode {
        self.init_mode
    }

    /// Apply the configured initialization mode
    ///
    /// Eager mode constructs every role now; lazy mode leaves them `Absent`.
    ///
    /// # Errors
    /// - `RemoverError::BackendUnavailable` when eager construction fails
    pub async fn start(&self) -> Result<()> {
        match self.init_mode {
            InitMode::Eager => {
                info!("Eager initialization of all removers");
                self.registry.init_all().await
            },
            InitMode::Lazy => {
                info!("Lazy initialization, removers load on first request");
                Ok(())
            },
        }
    }

    /// Remove the background of `input` with the remover for `role`
    ///
    /// `sub_model` selects the advanced segmentation model. It only takes
    /// effect when the advanced remover is first built; a request naming a
    /// different sub-model than the ready remover's is rejected.
    ///
    /// # Errors
    /// - `RemoverError::InvalidRole` for an unknown role string
    /// - `RemoverError::InvalidConfig` for an unknown, unusable or conflicting sub-model
    /// - `RemoverError::BackendUnavailable` when the remover cannot be built
    /// - `RemoverError::Decode` / `RemoverError::Io` from processing
    #[instrument(skip(self, options))]
    pub async fn process(
        &self,
        role: &str,
        input: &Path,
        options: RemovalOptions,
        sub_model: Option<&str>,
    ) -> Result<RemovalOutcome> {
        let role = Role::parse(role)?;
        let sub_model = match (role, sub_model) {
            (Role::Advanced, Some(name)) => {
                RegistryConfig::validate_model_name("sub_model", name)?;
                // Rejected here so a typo never builds a degraded remover
                if ModelDescriptor::lookup(name).is_none() {
                    return Err(RemoverError::invalid_config(format!(
                        "Unknown sub-model '{}'",
                        name
                    )));
                }
                Some(name)
            },
            (Role::Ultra, Some(name)) => {
                debug!(sub_model = name, "Ultra role ignores sub-model selection");
                None
            },
            (_, None) => None,
        };

        let remover = self.registry.get_or_init_with(role, sub_model).await?;

        if let (Some(requested), Some(active)) = (sub_model, remover.sub_model()) {
            if requested != active {
                return Err(RemoverError::invalid_config(format!(
                    "Advanced remover is serving sub-model '{}', requested '{}'",
                    active, requested
                )));
            }
        }

        let start = Instant::now();
        let task_remover = Arc::clone(&remover);
        let task_input = input.to_path_buf();
        let output = tokio::task::spawn_blocking(move || {
            task_remover.process(&task_input, &options)
        })
        .await
        .map_err(|e| RemoverError::unexpected(format!("Processing task failed: {}", e)))??;
        let processing_time = start.elapsed();

        let size_bytes = tokio::fs::metadata(&output.output_path)
            .await
            .map_err(|e| RemoverError::file_io_error("read metadata of", &output.output_path, &e))?
            .len();

        if output.used_fallback {
            warn!(
                role = %role,
                model = remover.model_name(),
                "Request served by center-crop fallback"
            );
        }
        info!(
            role = %role,
            model = remover.model_name(),
            used_fallback = output.used_fallback,
            elapsed_ms = processing_time.as_millis() as u64,
            size_bytes,
            "Background removal completed"
        );

        Ok(RemovalOutcome {
            role,
            output_path: output.output_path,
            model_used: remover.model_name().to_string(),
            used_fallback: output.used_fallback,
            processing_time,
            size_bytes,
        })
    }

    /// Readiness of every role; never triggers initialization
    #[must_use]
    pub fn status_snapshot(&self) -> BTreeMap<Role, RoleStatus> {
        self.registry.status_snapshot()
    }

    /// Roles offered to clients, `ultra` first and recommended
    #[must_use]
    pub fn catalog() -> Vec<RoleInfo> {
        CATALOG.to_vec()
    }
}
