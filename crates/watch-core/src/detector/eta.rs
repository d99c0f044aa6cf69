use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::debug;

use crate::upstream::CosmosClient;

/// Block timestamps at the current height and one window below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockTimeSample {
    pub current_height: u64,
    pub current_time: DateTime<Utc>,
    pub past_time: DateTime<Utc>,
    pub window: u64,
}

impl BlockTimeSample {
    /// Average block interval in microseconds; `None` when time did not move forward.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_block_micros(&self) -> Option<f64> {
        let elapsed = (self.current_time - self.past_time).num_microseconds()?;
        if elapsed <= 0 || self.window == 0 {
            return None;
        }
        Some(elapsed as f64 / self.window as f64)
    }

    /// `anchor + avg_block_time × (upgrade_height − current_height)`.
    ///
    /// `None` when the upgrade height is not ahead of the sample or the projection overflows.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn project(&self, upgrade_height: u64, anchor: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let remaining = upgrade_height.checked_sub(self.current_height).filter(|r| *r > 0)?;
        let average = self.average_block_micros()?;

        let offset_micros = (average * remaining as f64).round();
        if !offset_micros.is_finite() || offset_micros > i64::MAX as f64 {
            return None;
        }

        anchor.checked_add_signed(ChronoDuration::microseconds(offset_micros as i64))
    }
}

/// Projects upgrade arrival from observed chain throughput.
#[derive(Clone)]
pub struct EtaEstimator {
    cosmos: CosmosClient,
    window: u64,
}

impl EtaEstimator {
    #[must_use]
    pub fn new(cosmos: CosmosClient, window: u64) -> Self {
        Self { cosmos, window: window.max(1) }
    }

    /// Samples both timestamps on `rpc`. Chains younger than the window yield `None`.
    pub async fn sample(&self, rpc: &str, current_height: u64) -> Option<BlockTimeSample> {
        if current_height <= self.window {
            debug!(rpc, current_height, window = self.window, "chain too young for block time sample");
            return None;
        }

        let past_height = current_height - self.window;
        let (current, past) = tokio::join!(
            self.cosmos.block_time(rpc, current_height),
            self.cosmos.block_time(rpc, past_height)
        );

        match (current, past) {
            (Ok(current_time), Ok(past_time)) => {
                Some(BlockTimeSample { current_height, current_time, past_time, window: self.window })
            }
            (Err(e), _) | (_, Err(e)) => {
                debug!(rpc, error = %e, "block time sample unavailable");
                None
            }
        }
    }

    /// Estimated time at which `upgrade_height` is reached, projected from the timestamp of
    /// the current block.
    pub async fn estimate(
        &self,
        rpc: &str,
        current_height: u64,
        upgrade_height: u64,
    ) -> Option<DateTime<Utc>> {
        let sample = self.sample(rpc, current_height).await?;
        sample.project(upgrade_height, sample.current_time)
    }
}
