//! Shared engine state (spec §5): the positions map, per-symbol
//! serialization locks, and per-symbol MACD crossover trackers. All
//! mutation flows through here so the rest of the engine never holds two
//! position mutexes at once (spec §5 locking discipline).

use crate::domain::indicators::MacdCrossoverTracker;
use crate::domain::position::{Position, PositionStatus};
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};

pub struct EngineState {
    pub positions: RwLock<HashMap<String, Position>>,
    symbol_locks: HashMap<String, Mutex<()>>,
    pub crossover_trackers: Mutex<HashMap<String, MacdCrossoverTracker>>,
    pub untracked_assets: RwLock<Vec<String>>,
}

impl EngineState {
    pub fn new(symbols: impl IntoIterator<Item = String>, positions: Vec<Position>) -> Self {
        let symbol_locks = symbols.into_iter().map(|s| (s, Mutex::new(()))).collect();
        let positions = positions.into_iter().map(|p| (p.symbol.clone(), p)).collect();
        Self {
            positions: RwLock::new(positions),
            symbol_locks,
            crossover_trackers: Mutex::new(HashMap::new()),
            untracked_assets: RwLock::new(Vec::new()),
        }
    }

    /// Serializes all entry/exit work for one symbol (spec §4.E: "no
    /// symbol has more than one in-flight entry or exit operation at a
    /// time"). Panics if `symbol` was never registered at startup — a
    /// programmer error, not a runtime condition.
    pub fn lock_for(&self, symbol: &str) -> &Mutex<()> {
        self.symbol_locks
            .get(symbol)
            .unwrap_or_else(|| panic!("no serialization lock registered for symbol {symbol}"))
    }

    pub async fn snapshot_positions(&self) -> Vec<Position> {
        self.positions.read().await.values().cloned().collect()
    }
}

/// Begins the CLOSING half of the OPEN -> CLOSING -> CLOSED lifecycle
/// (spec §3 "Position" lifecycle note). The position stays in the shared
/// map while the sell retry runs so the monitor doesn't re-evaluate exit
/// conditions against it on an overlapping tick.
pub fn begin_closing(position: &mut Position) {
    position.status = PositionStatus::Closing;
}

/// Reverts a CLOSING position to OPEN after its exit retry schedule is
/// exhausted without a fill (spec §4.E: "CLOSING -> OPEN on any
/// non-terminal failure (so the next tick retries)"; "the position
/// remains in memory to be re-evaluated on the next tick").
/// `closing_retry_exhausted` is surfaced to the control plane (spec §7).
pub fn mark_retry_exhausted(position: &mut Position) {
    position.status = PositionStatus::Open;
    position.closing_retry_exhausted = true;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::StrategyKind;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn sample_position(symbol: &str) -> Position {
        Position::new(
            symbol.to_string(),
            dec!(0.01),
            dec!(100),
            Utc::now(),
            StrategyKind::Momentum,
            dec!(10),
            dec!(2),
            dec!(4),
            dec!(2),
        )
    }

    #[tokio::test]
    async fn lock_for_returns_the_same_mutex_across_calls() {
        let state = EngineState::new(vec!["BTCUSD".to_string()], vec![]);
        let _first = state.lock_for("BTCUSD").lock().await;
        drop(_first);
        let _second = state.lock_for("BTCUSD").lock().await;
    }

    #[test]
    #[should_panic]
    fn lock_for_panics_on_unregistered_symbol() {
        let state = EngineState::new(vec!["BTCUSD".to_string()], vec![]);
        let _ = state.lock_for("ETHUSD");
    }

    #[test]
    fn begin_closing_transitions_from_open() {
        let mut position = sample_position("BTCUSD");
        begin_closing(&mut position);
        assert_eq!(position.status, PositionStatus::Closing);
    }

    #[test]
    fn mark_retry_exhausted_sets_the_flag_and_reverts_to_open() {
        let mut position = sample_position("BTCUSD");
        begin_closing(&mut position);
        mark_retry_exhausted(&mut position);
        assert!(position.closing_retry_exhausted);
        assert_eq!(position.status, PositionStatus::Open);
    }
}
