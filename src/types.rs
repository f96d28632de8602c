//! Core types shared by removers, the registry and the service layer

use crate::error::{RemoverError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Logical processing tier requested by a caller
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Best-quality tier, default for requests that name no role
    #[default]
    Ultra,
    /// Tier with a caller-visible segmentation sub-model
    Advanced,
}

impl Role {
    /// All roles in registry order
    pub const ALL: [Role; 2] = [Role::Ultra, Role::Advanced];

    /// Wire name of the role
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ultra => "ultra",
            Self::Advanced => "advanced",
        }
    }

    /// Parse a role name as sent by a client
    ///
    /// # Errors
    /// - `RemoverError::InvalidRole` for anything other than `ultra` / `advanced`
    pub fn parse(name: &str) -> Result<Self> {
        name.parse()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = RemoverError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ultra" => Ok(Self::Ultra),
            "advanced" => Ok(Self::Advanced),
            _ => Err(RemoverError::invalid_role(s)),
        }
    }
}

/// Result of a single facade call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalOutput {
    /// Path of the written PNG
    pub output_path: PathBuf,
    /// Whether the deterministic fallback produced this output
    pub used_fallback: bool,
}

/// Result of a service-level request, shaped for response building
#[derive(Debug, Clone, Serialize)]
pub struct RemovalOutcome {
    /// Role that served the request
    pub role: Role,
    /// Path of the written PNG
    pub output_path: PathBuf,
    /// Model name of the serving facade
    pub model_used: String,
    /// Whether the deterministic fallback produced this output
    pub used_fallback: bool,
    /// Wall-clock processing time, excluding initialization
    pub processing_time: Duration,
    /// Size of the output file in bytes
    pub size_bytes: u64,
}

/// Per-role lifecycle state held by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleState {
    Absent,
    Initializing,
    Ready,
    Failed,
}

/// Readiness report for one role
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleStatus {
    pub state: RoleState,
    pub ready: bool,
    pub model_name: Option<String>,
    pub used_fallback: bool,
    /// Why a ready remover runs the fallback instead of its model
    pub degraded_reason: Option<String>,
    /// Message of the most recent failed initialization, cleared on success
    pub last_error: Option<String>,
    pub ready_since: Option<DateTime<Utc>>,
}

impl RoleStatus {
    pub(crate) fn absent() -> Self {
        Self {
            state: RoleState::Absent,
            ready: false,
            model_name: None,
            used_fallback: false,
            degraded_reason: None,
            last_error: None,
            ready_since: None,
        }
    }
}

/// Catalog entry describing a role to clients
#[derive(Debug, Clone, Serialize)]
pub struct RoleInfo {
    pub role: Role,
    pub name: &'static str,
    pub description: &'static str,
    pub features: &'static [&'static str],
    pub recommended: bool,
}
