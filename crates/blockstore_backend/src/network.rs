//! Process-wide network client state.
//!
//! Network-based drivers share one HTTP client per process. It is created by
//! an explicit [`init`] step that the factory runs before constructing such a
//! driver; driver constructors only receive the resulting context. `init` is
//! idempotent and serialized, so concurrent callers never build two clients.

use crate::error::{BackendError, BackendResult};
use crate::s3::CLOUD_OBJECT_BACKEND;
use parking_lot::{const_mutex, Mutex};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("blockstore/", env!("CARGO_PKG_VERSION"));

/// Connect timeout of the shared client.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

static CONTEXT: Mutex<Option<Arc<NetworkContext>>> = const_mutex(None);

/// Shared network state for the lifetime of the process.
#[derive(Debug)]
pub struct NetworkContext {
    http: reqwest::blocking::Client,
}

impl NetworkContext {
    /// Returns the shared blocking HTTP client.
    #[must_use]
    pub fn http(&self) -> &reqwest::blocking::Client {
        &self.http
    }
}

/// Initializes the process-wide network context, or returns the existing one.
///
/// # Errors
///
/// Returns `DriverInit` if the HTTP client cannot be built (for example when
/// the TLS backend fails to load).
pub fn init() -> BackendResult<Arc<NetworkContext>> {
    let mut slot = CONTEXT.lock();
    if let Some(context) = slot.as_ref() {
        return Ok(Arc::clone(context));
    }

    let http = reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| BackendError::DriverInit {
            backend: CLOUD_OBJECT_BACKEND,
            reason: format!("cannot initialize HTTP client: {e}"),
        })?;

    let context = Arc::new(NetworkContext { http });
    *slot = Some(Arc::clone(&context));
    info!(user_agent = USER_AGENT, "initialized network client");
    Ok(context)
}

/// Returns true once [`init`] has succeeded in this process.
#[must_use]
pub fn is_initialized() -> bool {
    CONTEXT.lock().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn init_is_idempotent_across_threads() {
        let contexts: Vec<Arc<NetworkContext>> = (0..4)
            .map(|_| thread::spawn(|| init().unwrap()))
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect();

        assert!(is_initialized());
        for context in &contexts[1..] {
            assert!(Arc::ptr_eq(&contexts[0], context));
        }
        assert!(Arc::ptr_eq(&contexts[0], &init().unwrap()));
    }
}
