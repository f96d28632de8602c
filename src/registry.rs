//! Per-role remover registry
//!
//! The registry owns at most one [`Remover`] per [`Role`] and moves each role
//! through `Absent -> Initializing -> Ready | Failed`. Construction is
//! single-flight per role: callers that arrive while an attempt is running
//! wait for it and receive its outcome instead of starting their own. A
//! `Failed` role is retried by the next caller that finds no attempt in
//! flight; a `Ready` role is never rebuilt.
//!
//! Construction runs on tokio's blocking pool and writes its result back into
//! the role slot itself, so a caller that stops waiting cannot leave the role
//! stuck in `Initializing`.

use crate::{
    backends::{AcquisitionPolicy, DelegatedBackend},
    config::RegistryConfig,
    error::{RemoverError, Result},
    inference::{SessionProvider, UnavailableProvider},
    remover::Remover,
    types::{Role, RoleState, RoleStatus},
};
use chrono::{DateTime, Utc};
use instant::Instant;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info, instrument};

/// Builds the remover for a role
///
/// Called at most once at a time per role, from a blocking thread. Returning
/// an error or panicking leaves the role `Failed` and retryable.
pub trait RemoverFactory: Send + Sync {
    /// Construct a remover for `role`
    ///
    /// `sub_model` overrides the configured advanced sub-model; the ultra role
    /// ignores it.
    ///
    /// # Errors
    /// - Backend construction or model session acquisition failures
    /// - Invalid sub-model names
    fn create(&self, role: Role, sub_model: Option<&str>) -> Result<Remover>;
}

/// Factory building delegated backends from a [`RegistryConfig`]
pub struct DefaultRemoverFactory {
    config: RegistryConfig,
    provider: Arc<dyn SessionProvider>,
}

impl DefaultRemoverFactory {
    /// Factory using the runtime compiled into this build
    ///
    /// With the `onnx` feature sessions come from ONNX Runtime; without it
    /// every acquisition fails and roles follow `allow_fallback`.
    ///
    /// # Errors
    /// - Configuration validation failures
    /// - Model directory cannot be determined
    pub fn from_config(config: RegistryConfig) -> Result<Self> {
        config.validate()?;

        #[cfg(feature = "onnx")]
        let provider: Arc<dyn SessionProvider> = Arc::new(
            crate::backends::OnnxSessionProvider::from_config(&config)?,
        );
        #[cfg(not(feature = "onnx"))]
        let provider: Arc<dyn SessionProvider> = Arc::new(UnavailableProvider);

        Ok(Self::with_provider(config, provider))
    }

    /// Factory drawing sessions from an injected provider
    #[must_use]
    pub fn with_provider(config: RegistryConfig, provider: Arc<dyn SessionProvider>) -> Self {
        Self { config, provider }
    }

    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn policy(&self) -> AcquisitionPolicy {
        if self.config.allow_fallback {
            AcquisitionPolicy::DowngradeToFallback
        } else {
            AcquisitionPolicy::Strict
        }
    }
}

impl std::fmt::Debug for DefaultRemoverFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultRemoverFactory")
            .field("config", &self.config)
            .field("runtime", &self.provider.runtime_name())
            .finish()
    }
}

impl Default for DefaultRemoverFactory {
    fn default() -> Self {
        Self::with_provider(RegistryConfig::default(), Arc::new(UnavailableProvider))
    }
}

impl RemoverFactory for DefaultRemoverFactory {
    fn create(&self, role: Role, sub_model: Option<&str>) -> Result<Remover> {
        let (model, sub_model) = match role {
            Role::Ultra => (self.config.ultra_model.as_str(), ""),
            Role::Advanced => {
                let sub_model = sub_model.unwrap_or(&self.config.advanced_sub_model);
                RegistryConfig::validate_model_name("sub_model", sub_model)?;
                (sub_model, sub_model)
            },
        };

        let backend = DelegatedBackend::acquire(self.provider.as_ref(), role, model, self.policy())?;
        Remover::new(role, Box::new(backend), sub_model)
    }
}

struct SlotInner {
    state: RoleState,
    remover: Option<Arc<Remover>>,
    last_error: Option<String>,
    ready_since: Option<DateTime<Utc>>,
    /// Completed construction attempts
    attempts: u64,
}

struct Slot {
    role: Role,
    init_lock: Arc<tokio::sync::Mutex<()>>,
    inner: RwLock<SlotInner>,
}

impl Slot {
    fn new(role: Role) -> Self {
        Self {
            role,
            init_lock: Arc::new(tokio::sync::Mutex::new(())),
            inner: RwLock::new(SlotInner {
                state: RoleState::Absent,
                remover: None,
                last_error: None,
                ready_since: None,
                attempts: 0,
            }),
        }
    }

    // State writes never panic while holding the lock, so a poisoned lock
    // still holds consistent data.
    fn read(&self) -> RwLockReadGuard<'_, SlotInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SlotInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn ready(&self) -> Option<Arc<Remover>> {
        self.read().remover.clone()
    }

    fn begin_attempt(&self) {
        self.write().state = RoleState::Initializing;
    }

    fn mark_ready(&self, remover: Remover) -> Arc<Remover> {
        let remover = Arc::new(remover);
        let mut inner = self.write();
        inner.state = RoleState::Ready;
        inner.remover = Some(Arc::clone(&remover));
        inner.last_error = None;
        inner.ready_since = Some(Utc::now());
        inner.attempts += 1;
        remover
    }

    fn mark_failed(&self, reason: String) -> RemoverError {
        let mut inner = self.write();
        inner.state = RoleState::Failed;
        inner.last_error = Some(reason.clone());
        inner.attempts += 1;
        RemoverError::backend_unavailable(self.role, reason)
    }

    fn status(&self) -> RoleStatus {
        let inner = self.read();
        match &inner.remover {
            Some(remover) => RoleStatus {
                state: inner.state,
                ready: true,
                model_name: Some(remover.model_name().to_string()),
                used_fallback: remover.used_fallback(),
                degraded_reason: remover.degraded_reason().map(str::to_string),
                last_error: None,
                ready_since: inner.ready_since,
            },
            None => RoleStatus {
                state: inner.state,
                last_error: inner.last_error.clone(),
                ..RoleStatus::absent()
            },
        }
    }
}

fn failure_reason(error: RemoverError) -> String {
    match error {
        RemoverError::BackendUnavailable { reason, .. } => reason,
        other => other.to_string(),
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    format!("Remover construction panicked: {}", message)
}

/// Owner of the one-remover-per-role contract
pub struct RemoverRegistry {
    factory: Arc<dyn RemoverFactory>,
    ultra: Arc<Slot>,
    advanced: Arc<Slot>,
}

impl RemoverRegistry {
    /// Create a registry with every role `Absent`
    #[must_use]
    pub fn new(factory: Arc<dyn RemoverFactory>) -> Self {
        Self {
            factory,
            ultra: Arc::new(Slot::new(Role::Ultra)),
            advanced: Arc::new(Slot::new(Role::Advanced)),
        }
    }

    /// Create a registry backed by [`DefaultRemoverFactory`]
    ///
    /// # Errors
    /// - Configuration validation failures
    pub fn from_config(config: RegistryConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(DefaultRemoverFactory::from_config(
            config,
        )?)))
    }

    fn slot(&self, role: Role) -> &Arc<Slot> {
        match role {
            Role::Ultra => &self.ultra,
            Role::Advanced => &self.advanced,
        }
    }

    /// The ready remover for `role`, without triggering initialization
    #[must_use]
    pub fn get(&self, role: Role) -> Option<Arc<Remover>> {
        self.slot(role).ready()
    }

    /// Return the remover for `role`, constructing it if needed
    ///
    /// # Errors
    /// - `RemoverError::BackendUnavailable` when construction fails or panics
    pub async fn get_or_init(&self, role: Role) -> Result<Arc<Remover>> {
        self.get_or_init_with(role, None).await
    }

    /// Like [`get_or_init`](Self::get_or_init), with a sub-model used only if
    /// this call ends up constructing the remover
    ///
    /// # Errors
    /// - `RemoverError::BackendUnavailable` when construction fails or panics
    #[instrument(skip(self))]
    pub async fn get_or_init_with(
        &self,
        role: Role,
        sub_model: Option<&str>,
    ) -> Result<Arc<Remover>> {
        let slot = Arc::clone(self.slot(role));

        let observed_attempts = {
            let inner = slot.read();
            if let Some(remover) = &inner.remover {
                return Ok(Arc::clone(remover));
            }
            inner.attempts
        };

        let guard = Arc::clone(&slot.init_lock).lock_owned().await;

        {
            let inner = slot.read();
            if let Some(remover) = &inner.remover {
                return Ok(Arc::clone(remover));
            }
            // An attempt finished while we waited: report its failure rather
            // than starting a second construction.
            if inner.attempts > observed_attempts && inner.state == RoleState::Failed {
                return Err(RemoverError::backend_unavailable(
                    role,
                    inner.last_error.clone().unwrap_or_default(),
                ));
            }
        }

        slot.begin_attempt();
        info!(role = %role, "Initializing remover");

        let factory = Arc::clone(&self.factory);
        let task_slot = Arc::clone(&slot);
        let sub_model = sub_model.map(str::to_string);

        tokio::task::spawn_blocking(move || {
            let start = Instant::now();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                factory.create(role, sub_model.as_deref())
            }));

            let result = match outcome {
                Ok(Ok(remover)) => {
                    let remover = task_slot.mark_ready(remover);
                    info!(
                        role = %role,
                        model = remover.model_name(),
                        used_fallback = remover.used_fallback(),
                        init_ms = start.elapsed().as_millis() as u64,
                        "Remover ready"
                    );
                    Ok(remover)
                },
                Ok(Err(e)) => {
                    error!(role = %role, error = %e, "Remover initialization failed");
                    Err(task_slot.mark_failed(failure_reason(e)))
                },
                Err(payload) => {
                    let reason = panic_reason(payload.as_ref());
                    error!(role = %role, error = %reason, "Remover initialization panicked");
                    Err(task_slot.mark_failed(reason))
                },
            };
            drop(guard);
            result
        })
        .await
        .map_err(|e| RemoverError::unexpected(format!("Remover initialization task failed: {}", e)))?
    }

    /// Initialize every role, surfacing the first failure
    ///
    /// All roles are attempted even when one fails; failed roles stay
    /// retryable.
    ///
    /// # Errors
    /// - `RemoverError::BackendUnavailable` for the first role that failed
    pub async fn init_all(&self) -> Result<()> {
        let results =
            futures::future::join_all(Role::ALL.iter().map(|role| self.get_or_init(*role))).await;

        let mut first_error = None;
        for (role, result) in Role::ALL.iter().zip(results) {
            match result {
                Ok(remover) => debug!(role = %role, model = remover.model_name(), "Role initialized"),
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                },
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Current state of every role
    ///
    /// Only reads shared state; never waits on or starts a construction.
    #[must_use]
    pub fn status_snapshot(&self) -> BTreeMap<Role, RoleStatus> {
        Role::ALL
            .iter()
            .map(|role| (*role, self.slot(*role).status()))
            .collect()
    }
}

impl std::fmt::Debug for RemoverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoverRegistry")
            .field("status", &self.status_snapshot())
            .finish_non_exhaustive()
    }
}
