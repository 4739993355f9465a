//! TCP server and per-connection session dispatch.

mod listener;
mod session;

pub use listener::Server;
pub use session::{Session, SessionState};

use std::sync::Arc;
use std::time::Duration;

use vidforge_av::Transcoder;
use vidforge_db::DbPool;

use crate::config::Config;
use crate::pipeline::{Pipeline, PipelineOptions};
use crate::store::{CatalogStore, CredentialStore};

/// Per-connection transport limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    pub max_frame_bytes: u32,
    /// Bounds each stalled read or write of a payload transfer.
    pub io_timeout: Duration,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_frame_bytes: crate::protocol::DEFAULT_MAX_FRAME_BYTES,
            io_timeout: Duration::from_secs(30),
        }
    }
}

/// Everything sessions share. Sessions never share state with each other
/// except through these stores.
#[derive(Clone)]
pub struct ServerContext {
    pub credentials: CredentialStore,
    pub catalog: CatalogStore,
    pub pipeline: Pipeline,
    pub limits: SessionLimits,
}

impl ServerContext {
    pub fn from_config(config: &Config, pool: DbPool, transcoder: Arc<dyn Transcoder>) -> Self {
        let catalog = CatalogStore::new(pool.clone(), config.catalog.page_size);
        let pipeline = Pipeline::new(
            transcoder,
            catalog.clone(),
            config.server.data_dir.clone(),
            PipelineOptions::from(&config.pipeline),
        );

        Self {
            credentials: CredentialStore::new(pool, config.auth.bcrypt_cost),
            catalog,
            pipeline,
            limits: SessionLimits {
                max_frame_bytes: config.server.max_frame_bytes,
                io_timeout: config.server.io_timeout(),
            },
        }
    }
}
