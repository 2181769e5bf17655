//! # Event subscribers.
//!
//! ```text
//!   Service ── publish(Event) ──► Bus ──► Coordinator listener ──► SubscriberSet
//!                                                                     │
//!                                                          ┌──────────┼──────────┐
//!                                                          ▼          ▼          ▼
//!                                                      LogWriter   Metrics    Custom
//! ```
//!
//! - [`Subscribe`] trait for custom observers
//! - [`SubscriberSet`] bounded, panic-isolated fan-out
//! - `LogWriter` (feature `logging`) forwards events to `tracing`

#[cfg(feature = "logging")]
mod log;
mod subscriber;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscriber::Subscribe;
pub use subscriber_set::SubscriberSet;
pub(crate) use subscriber_set::panic_message;
