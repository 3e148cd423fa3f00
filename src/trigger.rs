//! Intervention trigger
//!
//! Stateless per-sample threshold evaluation. A single qualifying sample is
//! sufficient to fire. There is no hysteresis or debounce here; repeated
//! firing on sustained low readings is suppressed by the coordinator, which
//! ignores requests while a guided session is already active.

use tracing::debug;

use crate::types::{InterventionRequest, Sample};

/// Evaluates each incoming sample against the concentration threshold.
#[derive(Debug, Clone)]
pub struct InterventionTrigger {
    /// Absolute threshold; fires on `concentration < threshold` (strict)
    threshold: f64,
    /// Calibrated baseline; when set, fires on `concentration < 0.7 * baseline`
    baseline: Option<f64>,
}

/// Fraction of the calibrated baseline below which a dip fires.
const BASELINE_DIP_FRACTION: f64 = 0.7;

impl InterventionTrigger {
    pub fn new(threshold: f64, baseline: Option<f64>) -> Self {
        Self {
            threshold,
            baseline,
        }
    }

    /// Inspect one sample; returns a request with the default candidate list
    /// when the sample qualifies.
    pub fn evaluate(&self, sample: &Sample) -> Option<InterventionRequest> {
        let below_threshold = sample.concentration < self.threshold;
        let below_baseline = self
            .baseline
            .map(|b| sample.concentration < b * BASELINE_DIP_FRACTION)
            .unwrap_or(false);

        if !below_threshold && !below_baseline {
            return None;
        }

        debug!(
            concentration = sample.concentration,
            threshold = self.threshold,
            baseline_dip = below_baseline,
            "Concentration dip detected"
        );
        Some(InterventionRequest::with_defaults(sample.clone()))
    }
}

impl Default for InterventionTrigger {
    fn default() -> Self {
        Self::new(30.0, None)
    }
}
