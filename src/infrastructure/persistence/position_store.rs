//! Durable position snapshot (spec §4.F): one JSON array, rewritten
//! atomically after every mutation via write-to-temp-then-rename so a
//! reader never observes a torn file.

use crate::domain::errors::PersistenceError;
use crate::domain::position::Position;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

pub struct PositionStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl PositionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Loads the snapshot, quarantining (dropping with a log line) any
    /// record that fails Position invariant validation rather than
    /// aborting the whole load (spec §4.F / §7).
    pub async fn load(&self) -> Result<Vec<Position>, PersistenceError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| PersistenceError::Read {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;

        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        let records: Vec<serde_json::Value> = serde_json::from_str(&raw).map_err(|e| PersistenceError::Read {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut positions = Vec::with_capacity(records.len());
        for record in records {
            match serde_json::from_value::<Position>(record.clone()) {
                Ok(position) => match validate(&position) {
                    Ok(()) => positions.push(position),
                    Err(reason) => {
                        tracing::warn!(symbol = %position.symbol, reason, "quarantining position: invariant violation");
                    }
                },
                Err(e) => {
                    tracing::warn!(record = %record, error = %e, "quarantining unparseable position record");
                }
            }
        }

        Ok(positions)
    }

    /// Atomically rewrites the whole snapshot (spec §4.F: "rewritten
    /// atomically after every mutation"). Write-to-temp-then-rename is the
    /// implementation technique the durability contract leaves open.
    pub async fn save_all(&self, positions: &[Position]) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;
        let serialized = serde_json::to_vec_pretty(positions).map_err(|e| PersistenceError::Write {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;

        write_atomically(&self.path, &serialized).await.map_err(|e| PersistenceError::Write {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

fn validate(position: &Position) -> Result<(), String> {
    if position.quantity <= rust_decimal::Decimal::ZERO {
        return Err("quantity must be positive".to_string());
    }
    use crate::domain::position::{STOP_LOSS_PERCENT_RANGE, TAKE_PROFIT_PERCENT_RANGE};
    if !(STOP_LOSS_PERCENT_RANGE.0..=STOP_LOSS_PERCENT_RANGE.1).contains(&position.ai_stop_loss_percent) {
        return Err("ai_stop_loss_percent out of range".to_string());
    }
    if !(TAKE_PROFIT_PERCENT_RANGE.0..=TAKE_PROFIT_PERCENT_RANGE.1).contains(&position.ai_take_profit_percent) {
        return Err("ai_take_profit_percent out of range".to_string());
    }
    if position.highest_price_seen < position.entry_price {
        return Err("highest_price_seen below entry_price".to_string());
    }
    Ok(())
}

pub(crate) async fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, bytes).await?;
    tokio::fs::rename(&tmp_path, path).await
}
