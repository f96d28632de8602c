#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Clothing Background Removal Core
//!
//! Role-based background removal with lazy model initialization and a
//! deterministic fallback.
//!
//! Callers ask for a **role** (`ultra` or `advanced`). The
//! [`RemoverRegistry`] owns at most one [`Remover`] per role and builds it on
//! demand, exactly once even under concurrent cold-start requests. A remover
//! wraps a single [`Backend`](backends::Backend):
//!
//! - [`DelegatedBackend`](backends::DelegatedBackend) runs a segmentation model
//!   obtained from a [`SessionProvider`](inference::SessionProvider)
//!   (ONNX Runtime with the `onnx` feature)
//! - [`FallbackBackend`](backends::FallbackBackend) keeps a centered rectangle
//!   and makes everything else transparent
//!
//! When a model session cannot be acquired and `allow_fallback` is set, the
//! delegated backend downgrades to the fallback. Every result carries
//! `used_fallback` so callers can tell which strategy ran.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use clothing_bgremove::{RegistryConfig, RemovalOptions, RemovalService};
//! use std::path::Path;
//!
//! # async fn example() -> clothing_bgremove::Result<()> {
//! let config = RegistryConfig::from_env()?;
//! let service = RemovalService::from_config(config)?;
//! service.start().await?;
//!
//! let outcome = service
//!     .process("advanced", Path::new("shirt.jpg"), RemovalOptions::default(), Some("u2net_cloth_seg"))
//!     .await?;
//! println!(
//!     "{} -> {} (fallback: {})",
//!     outcome.model_used,
//!     outcome.output_path.display(),
//!     outcome.used_fallback
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `onnx`: ONNX Runtime session provider (CUDA and `CoreML` when available)
//! - `tracing-init`: `TracingConfig` subscriber setup for host applications
//! - `tracing-json`: JSON output format for `tracing-init`

pub mod backends;
pub mod config;
pub mod error;
pub mod inference;
pub mod models;
pub mod registry;
pub mod remover;
pub mod services;
#[cfg(feature = "tracing-init")]
pub mod tracing_config;
pub mod types;
pub mod utils;

pub use backends::{AcquisitionPolicy, Backend, DelegatedBackend, FallbackBackend};
pub use config::{
    ExecutionProvider, InitMode, PositioningMode, RegistryConfig, RegistryConfigBuilder,
    RemovalOptions, RemovalOptionsBuilder,
};
pub use error::{RemoverError, Result};
pub use inference::{SegmentationSession, SessionProvider, UnavailableProvider};
pub use registry::{DefaultRemoverFactory, RemoverFactory, RemoverRegistry};
pub use remover::Remover;
pub use services::{ImageIOService, RemovalService};
pub use types::{RemovalOutcome, RemovalOutput, Role, RoleInfo, RoleState, RoleStatus};

#[cfg(feature = "onnx")]
pub use backends::OnnxSessionProvider;

#[cfg(feature = "tracing-init")]
pub use tracing_config::{TracingConfig, TracingFormat};
