//! Error types used by the botvisor runtime, its services and collaborators.
//!
//! - [`RuntimeError`]: misuse of the lifecycle coordinator or host teardown failures.
//! - [`ServiceError`]: failures raised by a single service call (claim, grant, disconnect).
//! - [`CollabError`]: failures reported by external collaborators (chat client, config store).
//!
//! All of them provide `as_label` for logs/metrics. There is no timeout variant:
//! a service that does not finish in time is reported in
//! [`ShutdownReport`](crate::ShutdownReport), not raised.

use thiserror::Error;

/// # Errors produced by the lifecycle coordinator.
///
/// These represent programmer misuse (fail fast) or a failing host resource
/// during the final teardown step.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A service was registered after shutdown had begun.
    #[error("cannot register service `{service}`: shutdown already started")]
    RegistrationClosed {
        /// Name of the rejected service.
        service: &'static str,
    },

    /// The same service type was registered twice.
    #[error("service `{service}` is already registered")]
    AlreadyRegistered {
        /// Name of the duplicate service.
        service: &'static str,
    },

    /// Host-owned resources (gateway connection) failed to tear down.
    #[error("host teardown failed: {error}")]
    HostTeardown {
        /// The underlying collaborator error.
        error: CollabError,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use botvisor::RuntimeError;
    ///
    /// let err = RuntimeError::RegistrationClosed { service: "snacks" };
    /// assert_eq!(err.as_label(), "runtime_registration_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::RegistrationClosed { .. } => "runtime_registration_closed",
            RuntimeError::AlreadyRegistered { .. } => "runtime_already_registered",
            RuntimeError::HostTeardown { .. } => "runtime_host_teardown",
        }
    }
}

/// # Errors produced by a service operation.
///
/// A service error only affects the call that raised it: a failed claim leaves
/// other claims untouched, and a failed disconnect never aborts the shutdown batch.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ServiceError {
    /// An external collaborator call failed.
    #[error("{op} failed: {error}")]
    Collaborator {
        /// Operation that was attempted (e.g. "write", "send_message").
        op: &'static str,
        /// The collaborator error.
        error: CollabError,
    },

    /// Non-recoverable failure inside the service.
    #[error("fatal error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// The service call panicked (captured by the coordinator's task isolation).
    #[error("service panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl ServiceError {
    /// Wraps a collaborator failure with the operation that caused it.
    pub fn collaborator(op: &'static str, error: CollabError) -> Self {
        ServiceError::Collaborator { op, error }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use botvisor::{CollabError, ServiceError};
    ///
    /// let err = ServiceError::collaborator("write", CollabError::new("disk full"));
    /// assert_eq!(err.as_label(), "service_collaborator");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceError::Collaborator { .. } => "service_collaborator",
            ServiceError::Fatal { .. } => "service_fatal",
            ServiceError::Panicked { .. } => "service_panicked",
        }
    }
}

/// Failure reported by an external collaborator.
///
/// Collaborators live outside this crate (chat REST client, config database),
/// so their errors are carried as text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CollabError {
    message: String,
}

impl CollabError {
    /// Creates a collaborator error from any displayable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}
