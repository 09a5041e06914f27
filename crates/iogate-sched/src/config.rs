//! Startup configuration for the scheduler.

use serde::{Deserialize, Serialize};

use crate::error::{SchedError, SchedResult};

/// Configuration for the admission scheduler.
///
/// Read once at startup and immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedConfig {
    /// Maximum concurrent in-flight operations. Must be positive.
    pub max_inflight: usize,
    /// Probability of servicing the compaction queue when both classes have
    /// pending work. Must be in [0, 1]. 0.0 degenerates to strict
    /// interactive-first priority, 1.0 to strict compaction-first.
    pub compaction_ratio: f64,
}

impl Default for SchedConfig {
    fn default() -> Self {
        Self {
            max_inflight: 10,
            compaction_ratio: 0.01,
        }
    }
}

impl SchedConfig {
    /// Validates the configuration, rejecting out-of-range values rather
    /// than clamping them.
    pub fn validate(&self) -> SchedResult<()> {
        if self.max_inflight == 0 {
            return Err(SchedError::InvalidConfig {
                reason: "max_inflight must be positive".to_string(),
            });
        }
        // The negated range check also rejects NaN.
        if !(self.compaction_ratio >= 0.0 && self.compaction_ratio <= 1.0) {
            return Err(SchedError::InvalidConfig {
                reason: format!(
                    "compaction_ratio must be in [0, 1], got {}",
                    self.compaction_ratio
                ),
            });
        }
        Ok(())
    }
}
