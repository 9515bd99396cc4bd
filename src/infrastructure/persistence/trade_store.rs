//! Append-only trade history (spec §4.F): one JSON-Lines file, one writer
//! at a time (spec §5: "trade history is append-only from one writer at a
//! time, serialized").

use crate::domain::errors::PersistenceError;
use crate::domain::trade_record::TradeRecord;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

pub struct TradeStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl TradeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub async fn append(&self, record: &TradeRecord) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;
        let mut line = serde_json::to_vec(record).map_err(|e| PersistenceError::Write {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| PersistenceError::Write {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })?;

        file.write_all(&line).await.map_err(|e| PersistenceError::Write {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }

    pub async fn load_all(&self) -> Result<Vec<TradeRecord>, PersistenceError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| PersistenceError::Read {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut records = Vec::new();
        for (lineno, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TradeRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(lineno, error = %e, "skipping unparseable trade record"),
            }
        }
        Ok(records)
    }

    pub async fn recent(&self, n: usize) -> Result<Vec<TradeRecord>, PersistenceError> {
        let mut all = self.load_all().await?;
        if all.len() > n {
            all.drain(0..all.len() - n);
        }
        Ok(all)
    }
}
