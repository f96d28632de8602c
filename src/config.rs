//! Configuration types for removers and the registry

use crate::error::{RemoverError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default segmentation model for both roles
pub const DEFAULT_SUB_MODEL: &str = "u2net_cloth_seg";

/// Environment variable selecting `eager` or `lazy` initialization
pub const ENV_INIT_MODE: &str = "BGREMOVE_INIT_MODE";
/// Environment variable overriding the model directory
pub const ENV_MODELS_DIR: &str = "BGREMOVE_MODELS_DIR";
/// Environment variable overriding the advanced sub-model
pub const ENV_ADVANCED_MODEL: &str = "BGREMOVE_ADVANCED_MODEL";
/// Environment variable enabling or disabling the fallback downgrade
pub const ENV_ALLOW_FALLBACK: &str = "BGREMOVE_ALLOW_FALLBACK";

/// Subject placement requested by the client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositioningMode {
    /// Model-driven placement
    #[default]
    Smart,
    /// Vertically centered placement
    Center,
}

impl std::str::FromStr for PositioningMode {
    type Err = RemoverError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "smart" => Ok(Self::Smart),
            "center" => Ok(Self::Center),
            other => Err(RemoverError::invalid_config(format!(
                "Unknown positioning mode '{}' (expected 'smart' or 'center')",
                other
            ))),
        }
    }
}

/// Per-request options passed through to the backend
///
/// Unknown keys are ignored when deserializing. The fallback backend accepts
/// these options but does not act on them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemovalOptions {
    pub positioning_mode: PositioningMode,
    pub enhance: bool,
    pub create_variants: bool,
}

impl RemovalOptions {
    /// Create a new options builder
    #[must_use]
    pub fn builder() -> RemovalOptionsBuilder {
        RemovalOptionsBuilder::default()
    }

    /// Parse options from a JSON object as sent by clients
    ///
    /// # Errors
    /// - `RemoverError::InvalidConfig` when a recognized key has the wrong type
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        Self::deserialize(value)
            .map_err(|e| RemoverError::invalid_config(format!("Invalid removal options: {}", e)))
    }
}

/// Builder for `RemovalOptions`
#[derive(Debug, Default)]
pub struct RemovalOptionsBuilder {
    options: RemovalOptions,
}

impl RemovalOptionsBuilder {
    #[must_use]
    pub fn positioning_mode(mut self, mode: PositioningMode) -> Self {
        self.options.positioning_mode = mode;
        self
    }

    #[must_use]
    pub fn enhance(mut self, enhance: bool) -> Self {
        self.options.enhance = enhance;
        self
    }

    #[must_use]
    pub fn create_variants(mut self, create_variants: bool) -> Self {
        self.options.create_variants = create_variants;
        self
    }

    #[must_use]
    pub fn build(self) -> RemovalOptions {
        self.options
    }
}

/// When removers are constructed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitMode {
    /// Construct every role at startup and surface failures immediately
    Eager,
    /// Construct each role on its first request
    #[default]
    Lazy,
}

impl std::str::FromStr for InitMode {
    type Err = RemoverError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eager" => Ok(Self::Eager),
            "lazy" => Ok(Self::Lazy),
            other => Err(RemoverError::invalid_config(format!(
                "Unknown init mode '{}' (expected 'eager' or 'lazy')",
                other
            ))),
        }
    }
}

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon acceleration
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

/// Registry and backend construction settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Initialization timing
    pub init_mode: InitMode,
    /// Segmentation model used by the ultra role
    pub ultra_model: String,
    /// Segmentation sub-model used by the advanced role
    pub advanced_sub_model: String,
    /// Directory holding `<model>.onnx` files (None = user cache directory)
    pub models_dir: Option<PathBuf>,
    /// Downgrade to the deterministic fallback when a model session cannot be acquired
    pub allow_fallback: bool,
    /// Execution provider for model sessions
    pub execution_provider: ExecutionProvider,
    /// Number of intra-op threads (0 = auto)
    pub intra_threads: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            init_mode: InitMode::Lazy,
            ultra_model: DEFAULT_SUB_MODEL.to_string(),
            advanced_sub_model: DEFAULT_SUB_MODEL.to_string(),
            models_dir: None,
            allow_fallback: true,
            execution_provider: ExecutionProvider::Auto,
            intra_threads: 0,
        }
    }
}

impl RegistryConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> RegistryConfigBuilder {
        RegistryConfigBuilder::new()
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// - Empty model names
    /// - Model names containing path separators
    pub fn validate(&self) -> Result<()> {
        Self::validate_model_name("ultra_model", &self.ultra_model)?;
        Self::validate_model_name("advanced_sub_model", &self.advanced_sub_model)?;
        Ok(())
    }

    pub(crate) fn validate_model_name(field: &str, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(RemoverError::invalid_config(format!(
                "{} must not be empty",
                field
            )));
        }
        if name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(RemoverError::invalid_config(format!(
                "{} '{}' must be a bare model name",
                field, name
            )));
        }
        Ok(())
    }

    /// Directory model files are resolved against
    ///
    /// # Errors
    /// - No `models_dir` configured and no user cache directory available
    pub fn resolved_models_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.models_dir {
            return Ok(dir.clone());
        }
        dirs::cache_dir()
            .map(|dir| dir.join("clothing-bgremove").join("models"))
            .ok_or_else(|| {
                RemoverError::invalid_config(format!(
                    "Failed to determine model directory. Set {}.",
                    ENV_MODELS_DIR
                ))
            })
    }

    /// Load configuration from a JSON file; missing keys take defaults
    ///
    /// # Errors
    /// - File cannot be read
    /// - File is not valid JSON for this structure
    /// - Resulting configuration fails validation
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| RemoverError::file_io_error("read config file", path, &e))?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            RemoverError::invalid_config(format!(
                "Failed to parse config '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `BGREMOVE_*` environment variables
    ///
    /// # Errors
    /// - Unparseable variable values
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a variable lookup
    ///
    /// # Errors
    /// - Unparseable variable values
    /// - Resulting configuration fails validation
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = lookup(ENV_INIT_MODE) {
            self.init_mode = mode.parse()?;
        }
        if let Some(dir) = lookup(ENV_MODELS_DIR) {
            self.models_dir = Some(PathBuf::from(dir));
        }
        if let Some(model) = lookup(ENV_ADVANCED_MODEL) {
            self.advanced_sub_model = model;
        }
        if let Some(flag) = lookup(ENV_ALLOW_FALLBACK) {
            self.allow_fallback = match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => {
                    return Err(RemoverError::invalid_config(format!(
                        "{} must be true or false, got '{}'",
                        ENV_ALLOW_FALLBACK, other
                    )))
                },
            };
        }
        self.validate()?;
        Ok(self)
    }
}

/// Builder for `RegistryConfig`
pub struct RegistryConfigBuilder {
    config: RegistryConfig,
}

impl RegistryConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: RegistryConfig::default(),
        }
    }

    #[must_use]
    pub fn init_mode(mut self, mode: InitMode) -> Self {
        self.config.init_mode = mode;
        self
    }

    #[must_use]
    pub fn ultra_model<S: Into<String>>(mut self, model: S) -> Self {
        self.config.ultra_model = model.into();
        self
    }

    #[must_use]
    pub fn advanced_sub_model<S: Into<String>>(mut self, model: S) -> Self {
        self.config.advanced_sub_model = model.into();
        self
    }

    #[must_use]
    pub fn models_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.models_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn allow_fallback(mut self, allow: bool) -> Self {
        self.config.allow_fallback = allow;
        self
    }

    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    /// - Configuration validation failures
    pub fn build(self) -> Result<RegistryConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for RegistryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
