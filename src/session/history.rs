use std::{future::Future, io::ErrorKind, path::PathBuf};

use anyhow::Result;
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
};
use tracing::{debug, warn};

use super::entities::CompletedSessionEntity;

/// Interface for abstracting the completed-session history.
///
/// The history is append-only: entries are never rewritten or deleted once
/// committed, and resetting the current session leaves it untouched.
pub trait HistoryLedger {
    fn append(&self, entity: &CompletedSessionEntity) -> impl Future<Output = Result<()>>;

    fn read_all(&self) -> impl Future<Output = Result<Vec<CompletedSessionEntity>>>;
}

/// The main realization of [HistoryLedger]. One JSON object per line in a
/// single ledger file; appends only ever grow the file, so a failed write
/// cannot damage committed entries.
pub struct HistoryLedgerImpl {
    path: PathBuf,
}

impl HistoryLedgerImpl {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn read_all_inner(&self) -> Result<Vec<CompletedSessionEntity>, std::io::Error> {
        let file = File::open(&self.path).await?;
        file.lock_shared()?;
        let buffer = BufReader::new(file);
        let mut lines = buffer.lines();
        let mut entries = vec![];
        while let Ok(Some(v)) = lines.next_line().await {
            if v.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<CompletedSessionEntity>(&v) {
                Ok(v) => entries.push(v),
                Err(e) => {
                    // ignore illegal values. Might happen after shutdowns
                    warn!(
                        "During parsing in path {:?} found illegal json string {}: {e}",
                        self.path, &v
                    )
                }
            }
        }

        lines.into_inner().into_inner().unlock_async().await?;

        Ok(entries)
    }
}

impl HistoryLedger for HistoryLedgerImpl {
    async fn append(&self, entity: &CompletedSessionEntity) -> Result<()> {
        let mut buffer = serde_json::to_vec(entity)?;
        buffer.push(b'\n');

        let file = File::options()
            .append(true)
            .create(true)
            .open(&self.path)
            .await?;

        // Semi-safe acquire-release for the file. Report commands may read
        // the ledger while an interactive session appends to it.
        file.lock_exclusive()?;
        let result = async {
            let mut file = file.try_clone().await?;
            file.write_all(&buffer).await?;
            file.flush().await?;
            Ok::<_, anyhow::Error>(())
        }
        .await;
        file.unlock_async().await?;
        result?;

        debug!("Appended history entry {entity:?}");
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<CompletedSessionEntity>> {
        match self.read_all_inner().await {
            Ok(v) => Ok(v),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(vec![]),
            Err(e) => Err(e.into()),
        }
    }
}
