//! Credential and catalog stores.
//!
//! Both wrap the same SQLite pool. Each store serializes its own
//! read-modify sequences behind a mutex; the lock is never held across an
//! `.await` or while talking to the transcoder.

pub mod catalog;
pub mod credentials;

pub use catalog::CatalogStore;
pub use credentials::{hash_password, CredentialStore};

use vidforge_common::{Error, Result};

/// Run blocking store work on the blocking thread pool.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::internal(format!("spawn_blocking join error: {e}")))?
}
