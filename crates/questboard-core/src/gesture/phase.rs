//! Progress to phase classification.
//!
//! Bands are closed on the lower edge and open on the upper edge:
//!
//! ```text
//! 0            -> Idle
//! (0, low)     -> Pressing
//! [low, mid)   -> Charging
//! [mid, high)  -> Radiating
//! [high, crit) -> Critical
//! [crit, 1)    -> Finishing
//! 1            -> Confirmed
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Discrete feedback phase, ordered from rest to commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Pressing,
    Charging,
    Radiating,
    Critical,
    Finishing,
    Confirmed,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Pressing => "pressing",
            Phase::Charging => "charging",
            Phase::Radiating => "radiating",
            Phase::Critical => "critical",
            Phase::Finishing => "finishing",
            Phase::Confirmed => "confirmed",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower edges of the intermediate bands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseThresholds {
    pub low: f64,
    pub mid: f64,
    pub high: f64,
    pub critical: f64,
}

impl PhaseThresholds {
    pub fn new(low: f64, mid: f64, high: f64, critical: f64) -> Result<Self, ValidationError> {
        let thresholds = Self {
            low,
            mid,
            high,
            critical,
        };
        thresholds.validate()?;
        Ok(thresholds)
    }

    /// Thresholds used by the shop purchase confirmation.
    pub fn purchase() -> Self {
        Self {
            low: 0.02,
            mid: 0.50,
            high: 0.85,
            critical: 0.995,
        }
    }

    /// Thresholds used by the daily ritual check-in.
    pub fn ritual() -> Self {
        Self {
            low: 0.05,
            mid: 0.40,
            high: 0.80,
            critical: 0.98,
        }
    }

    /// Require `0 < low < mid < high < critical < 1`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let ordered = 0.0 < self.low
            && self.low < self.mid
            && self.mid < self.high
            && self.high < self.critical
            && self.critical < 1.0;
        if ordered {
            Ok(())
        } else {
            Err(ValidationError::ThresholdOrder {
                low: self.low,
                mid: self.mid,
                high: self.high,
                critical: self.critical,
            })
        }
    }
}

impl Default for PhaseThresholds {
    fn default() -> Self {
        Self::purchase()
    }
}

/// Classify a progress value. Total over all `f64` inputs: values are
/// clamped into `[0, 1]` and NaN is treated as 0.
pub fn classify(progress: f64, thresholds: &PhaseThresholds) -> Phase {
    let p = if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    };

    if p <= 0.0 {
        Phase::Idle
    } else if p < thresholds.low {
        Phase::Pressing
    } else if p < thresholds.mid {
        Phase::Charging
    } else if p < thresholds.high {
        Phase::Radiating
    } else if p < thresholds.critical {
        Phase::Critical
    } else if p < 1.0 {
        Phase::Finishing
    } else {
        Phase::Confirmed
    }
}

/// Classify while unwinding after an early release. Decay never reaches
/// the commit band, so the result is capped at `Finishing`.
pub fn classify_cancelling(progress: f64, thresholds: &PhaseThresholds) -> Phase {
    classify(progress, thresholds).min(Phase::Finishing)
}
