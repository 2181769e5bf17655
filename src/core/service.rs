//! # Service lifecycle contract.
//!
//! Every subsystem the [`Coordinator`](crate::Coordinator) manages implements [`Service`].
//! The capability is checked by the type system at registration, so there is no runtime
//! casting: a type that does not implement the contract cannot be registered.
//!
//! ## Lifecycle
//! ```text
//! register ──► start(host) ──► ... serve inbound events ...
//!                                   │
//!            shutdown(graceful) ────┘
//!              ├─► can_disconnect(host) → bool     (graceful only; may capture `host`)
//!              ├─► ... service calls host.mark_ready(id) once idle ...
//!              └─► disconnect(host)                (always; bounded, may be abandoned)
//! ```

use std::any::TypeId;
use std::fmt;

use async_trait::async_trait;

use crate::core::host::HostContext;
use crate::error::ServiceError;

/// Opaque identity of a registered service (one per service type).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceId(TypeId);

impl ServiceId {
    /// Identity of service type `S`.
    pub fn of<S: Service>() -> Self {
        ServiceId(TypeId::of::<S>())
    }
}

impl fmt::Debug for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceId({:?})", self.0)
    }
}

/// # A subsystem with a bounded shutdown.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use botvisor::{HostContext, Service, ServiceError};
///
/// struct Heartbeat;
///
/// #[async_trait]
/// impl Service for Heartbeat {
///     fn name(&self) -> &'static str { "heartbeat" }
///
///     async fn can_disconnect(&self, _host: &HostContext) -> bool { true }
///
///     async fn disconnect(&self, _host: &HostContext) -> Result<(), ServiceError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Returns a stable, human-readable service name.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Called once by [`Coordinator::start`](crate::Coordinator::start).
    async fn start(&self, _host: &HostContext) -> Result<(), ServiceError> {
        Ok(())
    }

    /// Returns whether the service has no pending obligations right now.
    ///
    /// Implementations may keep `host` to signal readiness later via
    /// [`HostContext::mark_ready`].
    async fn can_disconnect(&self, host: &HostContext) -> bool;

    /// Releases the service's resources.
    ///
    /// Runs as an independent task; if it outlives the shutdown budget it is abandoned.
    async fn disconnect(&self, host: &HostContext) -> Result<(), ServiceError>;
}
