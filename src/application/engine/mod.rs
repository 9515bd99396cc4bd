//! Trading Engine (component E, spec §4.E): the orchestrator. A single
//! periodic tick drains an entry phase then a monitor phase across every
//! configured symbol, with per-symbol serialization and a bounded
//! cross-symbol fan-out (spec §5 / §9: "async-heavy control flow maps to
//! a supervised task set").

pub mod entry;
pub mod monitor;
pub mod reconcile;
pub mod retry;
pub mod state;

use crate::application::control_plane::{EngineHandle, EngineStatus};
use crate::application::ensemble::Scorer;
use crate::config::ConfigHandle;
use crate::infrastructure::exchange::ExchangeAdapter;
use crate::infrastructure::observability::metrics;
use crate::infrastructure::persistence::position_store::PositionStore;
use crate::infrastructure::persistence::trade_store::TradeStore;
use chrono::Utc;
use state::EngineState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock, Semaphore};
use tracing::{error, info, warn};

const TICK_INTERVAL: Duration = Duration::from_secs(30);
const TICK_SOFT_DEADLINE: Duration = Duration::from_secs(25);
const MAX_CONCURRENT_SYMBOLS: usize = 8;

/// Everything a tick needs. Cloned cheaply (every field is an `Arc` or
/// `Copy` handle) so `entry::run` / `monitor::run` can be spawned as
/// independent tasks per symbol.
pub struct Engine {
    pub config: ConfigHandle,
    pub exchange: Arc<dyn ExchangeAdapter>,
    pub scorers: Vec<Arc<dyn Scorer>>,
    pub position_store: Arc<PositionStore>,
    pub trade_store: Arc<TradeStore>,
    pub state: Arc<EngineState>,
    status: Arc<RwLock<Arc<EngineStatus>>>,
    stop: Arc<Notify>,
    semaphore: Arc<Semaphore>,
}

impl Engine {
    /// Loads persisted positions, reconciles them against live exchange
    /// balances (spec §4.E "Crash recovery"), and persists the
    /// reconciled snapshot before the first tick runs.
    pub async fn bootstrap(
        config: ConfigHandle,
        exchange: Arc<dyn ExchangeAdapter>,
        scorers: Vec<Arc<dyn Scorer>>,
        position_store: Arc<PositionStore>,
        trade_store: Arc<TradeStore>,
    ) -> anyhow::Result<Self> {
        let current = config.current().await;
        let symbols: Vec<String> = current.pairs.iter().map(|p| p.symbol.clone()).collect();
        let loaded_positions = position_store.load().await?;

        let (retained, untracked_assets) = match reconcile::reconcile(exchange.as_ref(), loaded_positions.clone()).await {
            Ok(outcome) => {
                for (_, record) in &outcome.closed_as_manual {
                    if let Err(e) = trade_store.append(record).await {
                        error!(error = %e, "failed to persist reconciliation MANUAL close");
                    }
                }
                if !outcome.closed_as_manual.is_empty() {
                    warn!(
                        count = outcome.closed_as_manual.len(),
                        "closed positions with no matching exchange balance as MANUAL (unknown P&L)"
                    );
                }
                for asset in &outcome.untracked_assets {
                    warn!(asset, "exchange holds an asset with no matching persisted position; acknowledging only, never auto-ingesting");
                }
                (outcome.retained, outcome.untracked_assets)
            }
            Err(e) => {
                error!(error = %e, "startup reconciliation could not reach the exchange; keeping persisted positions unreconciled");
                (loaded_positions, Vec::new())
            }
        };

        if let Err(e) = position_store.save_all(&retained).await {
            error!(error = %e, "failed to persist post-reconciliation position snapshot");
        }
        metrics::open_positions().set(retained.len() as i64);

        let status = EngineStatus {
            running: true,
            open_positions: retained.len(),
            last_tick_at: None,
            last_tick_skipped: false,
            untracked_assets,
        };

        Ok(Self {
            config,
            exchange,
            scorers,
            position_store,
            trade_store,
            state: Arc::new(EngineState::new(symbols, retained)),
            status: Arc::new(RwLock::new(Arc::new(status))),
            stop: Arc::new(Notify::new()),
            semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT_SYMBOLS)),
        })
    }

    pub fn status_cell(&self) -> Arc<RwLock<Arc<EngineStatus>>> {
        Arc::clone(&self.status)
    }

    pub fn stop_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.stop)
    }

    /// A cheap, cloneable control-plane handle onto this engine (spec §6
    /// SUPPLEMENT). Safe to hand to a host binary or dashboard task.
    pub fn handle(&self) -> EngineHandle {
        EngineHandle::new(
            self.config.clone(),
            Arc::clone(&self.state),
            Arc::clone(&self.trade_store),
            Arc::clone(&self.status),
            Arc::clone(&self.stop),
        )
    }

    /// Runs ticks every [`TICK_INTERVAL`] until `stop()` is called on the
    /// corresponding `EngineHandle`. Each tick is bounded by
    /// [`TICK_SOFT_DEADLINE`]; a tick that runs over has its outstanding
    /// per-symbol tasks aborted via [`tokio::task::JoinHandle::abort`] —
    /// dropping a `JoinHandle` alone only detaches the spawned task rather
    /// than stopping it, so the deadline check below aborts each handle
    /// explicitly, which cancels every in-flight exchange call and
    /// AI-scorer invocation the task was driving at its next await point
    /// (spec §4.D "any outstanding scorer work is abandoned; its result,
    /// if it arrives, is discarded").
    pub async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = self.stop.notified() => {
                    info!("engine stop requested; exiting tick loop");
                    let mut status = self.status.write().await;
                    *status = Arc::new(EngineStatus { running: false, ..(**status).clone() });
                    return;
                }
            }

            let deadline = tokio::time::Instant::now() + TICK_SOFT_DEADLINE;
            let skipped = self.run_tick(deadline).await;
            if skipped {
                metrics::ticks_skipped_total().inc();
                warn!("tick exceeded the 25s soft deadline; aborted outstanding per-symbol tasks and moved on");
            } else {
                metrics::ticks_total().inc();
            }

            let open_positions = self.state.positions.read().await.len();
            let untracked_assets = self.status.read().await.untracked_assets.clone();
            let mut status = self.status.write().await;
            *status = Arc::new(EngineStatus {
                running: true,
                open_positions,
                last_tick_at: Some(Utc::now()),
                last_tick_skipped: skipped,
                untracked_assets,
            });
        }
    }

    /// Runs the entry phase then the monitor phase, each phase's
    /// per-symbol tasks raced against `deadline`. Returns `true` if either
    /// phase had to abort outstanding tasks.
    async fn run_tick(self: &Arc<Self>, deadline: tokio::time::Instant) -> bool {
        let config = self.config.current().await;

        let mut entry_tasks = Vec::new();
        for pair in config.pairs.iter().filter(|p| p.enabled).cloned() {
            let engine = Arc::clone(self);
            let permit = Arc::clone(&self.semaphore);
            entry_tasks.push(tokio::spawn(async move {
                let _permit = permit.acquire_owned().await.expect("semaphore never closed");
                entry::run(&pair, &engine).await;
            }));
        }
        if !Self::join_before_deadline(entry_tasks, deadline).await {
            return true;
        }

        let open_symbols: Vec<String> = self.state.positions.read().await.keys().cloned().collect();
        let mut monitor_tasks = Vec::new();
        for symbol in open_symbols {
            let engine = Arc::clone(self);
            let permit = Arc::clone(&self.semaphore);
            monitor_tasks.push(tokio::spawn(async move {
                let _permit = permit.acquire_owned().await.expect("semaphore never closed");
                monitor::run(&symbol, &engine).await;
            }));
        }
        !Self::join_before_deadline(monitor_tasks, deadline).await
    }

    /// Awaits every handle in `tasks`, but no later than `deadline`. If the
    /// deadline passes first, every handle still outstanding is aborted —
    /// this is what actually cancels the spawned task's in-flight work;
    /// merely dropping the awaiting future here would detach those tasks
    /// and let them keep running unsupervised. Returns `false` if any task
    /// had to be aborted.
    async fn join_before_deadline(mut tasks: Vec<tokio::task::JoinHandle<()>>, deadline: tokio::time::Instant) -> bool {
        let all_completed = tokio::time::timeout_at(deadline, async {
            for task in &mut tasks {
                if let Err(e) = task.await {
                    if !e.is_cancelled() {
                        error!(error = %e, "per-symbol task panicked");
                    }
                }
            }
        })
        .await
        .is_ok();

        if !all_completed {
            for task in &tasks {
                task.abort();
            }
        }
        all_completed
    }
}
