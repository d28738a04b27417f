// src/timeouts.rs

//! Bounded execution of control-loop steps.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::errors::{Result, RespawnerError};
use crate::types::StepKind;

/// Await `fut`, failing with [`RespawnerError::StepTimeout`] once `budget`
/// has elapsed. The future is dropped on timeout.
pub async fn bounded<T, F>(step: StepKind, budget: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(budget, fut).await {
        Ok(res) => res,
        Err(_elapsed) => {
            warn!(%step, ?budget, "step exceeded its time budget");
            Err(RespawnerError::StepTimeout {
                step,
                after: budget,
            })
        }
    }
}
