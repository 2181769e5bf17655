//! Cancellable one-shot timers for keyed state machines.
//!
//! A timer carries only what its callback captures (a key and a generation), never a
//! reference into the state table. Cancelling the token before expiry drops the
//! callback without running it.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Runs `fire` after `delay` unless `token` is cancelled first.
pub(crate) fn schedule<F>(delay: Duration, token: CancellationToken, fire: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(delay) => fire.await,
        }
    })
}
