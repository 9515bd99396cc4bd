//! Retry schedules for order execution (spec §4.E: "max 3 attempts,
//! exponential backoff 3s/6s/9s" for buys; "5 attempts,
//! 3s/6s/9s/12s/15s" for exits). The schedule length fixes the attempt
//! count; a delay is taken between attempts, not after the last one.

use crate::domain::errors::ExchangeError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

pub const BUY_RETRY_SCHEDULE: [Duration; 3] = [Duration::from_secs(3), Duration::from_secs(6), Duration::from_secs(9)];

pub const SELL_RETRY_SCHEDULE: [Duration; 5] = [
    Duration::from_secs(3),
    Duration::from_secs(6),
    Duration::from_secs(9),
    Duration::from_secs(12),
    Duration::from_secs(15),
];

pub async fn retry_with_schedule<T, F, Fut>(op_name: &str, schedule: &[Duration], mut attempt: F) -> Result<T, ExchangeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ExchangeError>>,
{
    let mut last_err: Option<ExchangeError> = None;

    for (index, &delay) in schedule.iter().enumerate() {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if !e.is_retryable() {
                    return Err(e);
                }
                let is_last = index + 1 == schedule.len();
                if !is_last {
                    warn!(op = op_name, attempt = index + 1, delay_secs = delay.as_secs(), error = %e, "retrying after exchange error");
                    sleep(delay).await;
                }
                last_err = Some(e);
            }
        }
    }

    Err(last_err.expect("schedule must have at least one element"))
}
