//! Runtime core: service lifecycle and bounded shutdown.
//!
//! The public API of this module is [`Coordinator`] (built with [`CoordinatorBuilder`]),
//! the [`Service`] contract and the [`HostContext`] handle services keep.
//!
//! Internal modules:
//! - [`registry`]: service records and readiness flags;
//! - [`coordinator`]: registration, start, two-phase shutdown;
//! - [`signal`]: cross-platform termination signals.

mod builder;
mod coordinator;
mod host;
mod registry;
mod service;
mod signal;

pub use builder::CoordinatorBuilder;
pub use coordinator::{Coordinator, ServiceFailure, ShutdownReport};
pub use host::HostContext;
pub use service::{Service, ServiceId};
