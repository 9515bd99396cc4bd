//! Control-plane surface (spec §6 SUPPLEMENT): a cheap, cloneable handle
//! onto a running [`crate::application::engine::Engine`] for a host binary
//! (or a future dashboard process) to observe and steer without reaching
//! into engine internals.

use crate::config::{Config, ConfigHandle};
use crate::domain::errors::{ConfigError, PersistenceError};
use crate::domain::position::Position;
use crate::domain::trade_record::TradeRecord;
use crate::application::engine::state::EngineState;
use crate::infrastructure::persistence::trade_store::TradeStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};

/// Point-in-time snapshot of engine health, wait-free to read (a plain
/// `Arc` clone behind a `RwLock`, never blocked on tick work).
#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub running: bool,
    pub open_positions: usize,
    pub last_tick_at: Option<DateTime<Utc>>,
    pub last_tick_skipped: bool,
    pub untracked_assets: Vec<String>,
}

impl Default for EngineStatus {
    fn default() -> Self {
        Self {
            running: false,
            open_positions: 0,
            last_tick_at: None,
            last_tick_skipped: false,
            untracked_assets: Vec::new(),
        }
    }
}

/// Cloneable control surface over a running engine. Every method is an
/// async fn over shared `Arc` state; none of them touch the tick loop's
/// own locks beyond a quick read.
#[derive(Clone)]
pub struct EngineHandle {
    config: ConfigHandle,
    state: Arc<EngineState>,
    trade_store: Arc<TradeStore>,
    status: Arc<RwLock<Arc<EngineStatus>>>,
    stop: Arc<Notify>,
}

impl EngineHandle {
    pub fn new(config: ConfigHandle, state: Arc<EngineState>, trade_store: Arc<TradeStore>, status: Arc<RwLock<Arc<EngineStatus>>>, stop: Arc<Notify>) -> Self {
        Self { config, state, trade_store, status, stop }
    }

    pub async fn status(&self) -> Arc<EngineStatus> {
        self.status.read().await.clone()
    }

    pub async fn positions(&self) -> Vec<Position> {
        self.state.snapshot_positions().await
    }

    pub async fn recent_trades(&self, n: usize) -> Result<Vec<TradeRecord>, PersistenceError> {
        self.trade_store.recent(n).await
    }

    /// Hot-reloads the in-flight config snapshot (spec §7: "Refuse to
    /// load; keep previous config; log loudly" on validation failure).
    pub async fn update_config(&self, new_config: Config) -> Result<(), ConfigError> {
        self.config.update(new_config).await
    }

    /// Signals the engine's tick loop to exit after its current tick
    /// finishes. Does not force-abort in-flight work.
    pub fn stop(&self) {
        self.stop.notify_one();
    }
}
