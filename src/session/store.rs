use std::{future::Future, io::ErrorKind, path::PathBuf};

use anyhow::Result;
use tracing::{debug, warn};

use super::entities::SessionSnapshot;

/// Interface for abstracting the durable session record.
///
/// The record is always read and written as a whole. `load` fails soft: any
/// unreadable or malformed record is reported as absence so that a corrupt
/// state file can never block tracking.
pub trait SessionStore {
    fn load(&self) -> impl Future<Output = Option<SessionSnapshot>>;

    fn save(&self, snapshot: &SessionSnapshot) -> impl Future<Output = Result<()>>;

    fn clear(&self) -> impl Future<Output = Result<()>>;
}

/// The main realization of [SessionStore], backed by a single JSON file.
pub struct SessionStoreImpl {
    path: PathBuf,
}

impl SessionStoreImpl {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn load_inner(&self) -> Result<SessionSnapshot, std::io::Error> {
        let bytes = tokio::fs::read(&self.path).await?;
        serde_json::from_slice(&bytes).map_err(std::io::Error::from)
    }
}

impl SessionStore for SessionStoreImpl {
    async fn load(&self) -> Option<SessionSnapshot> {
        match self.load_inner().await {
            Ok(v) => Some(v),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No session record at {:?}", self.path);
                None
            }
            Err(e) => {
                // Might happen after a shutdown cut a write short. Tracking
                // restarts from scratch rather than refusing to run.
                warn!("Could not load session record {:?}: {e}", self.path);
                None
            }
        }
    }

    async fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        let bytes = serde_json::to_vec(snapshot)?;

        // Whole-record overwrite through a sibling temp file. The rename makes
        // the switch atomic, so an interrupted save leaves either the old
        // record or the new one, never a torn write.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!("Saved session record {snapshot:?}");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
