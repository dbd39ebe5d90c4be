use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::phase::PhaseThresholds;
use crate::error::ValidationError;

/// Named call-site presets with their own config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GesturePreset {
    Purchase,
    Ritual,
}

impl GesturePreset {
    pub fn as_str(self) -> &'static str {
        match self {
            GesturePreset::Purchase => "purchase",
            GesturePreset::Ritual => "ritual",
        }
    }

    /// Built-in parameters, used when no config file overrides them.
    pub fn defaults(self) -> GestureConfig {
        match self {
            GesturePreset::Purchase => GestureConfig::purchase_confirm(),
            GesturePreset::Ritual => GestureConfig::daily_ritual(),
        }
    }
}

impl fmt::Display for GesturePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GesturePreset {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "purchase" => Ok(GesturePreset::Purchase),
            "ritual" => Ok(GesturePreset::Ritual),
            other => Err(ValidationError::InvalidValue {
                field: "preset".into(),
                message: format!("unknown preset '{other}', expected purchase or ritual"),
            }),
        }
    }
}

/// Parameters for one hold-to-confirm control.
///
/// Each call site supplies only this and its commit binding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GestureConfig {
    /// How long the press must be held to confirm.
    pub required_duration_ms: u64,
    /// Time for a full-progress release to unwind back to zero.
    /// Partial progress unwinds proportionally faster.
    pub decay_duration_ms: u64,
    pub thresholds: PhaseThresholds,
}

impl GestureConfig {
    /// Shop purchase confirmation: a short, deliberate hold.
    pub fn purchase_confirm() -> Self {
        Self {
            required_duration_ms: 1_500,
            decay_duration_ms: 400,
            thresholds: PhaseThresholds::purchase(),
        }
    }

    /// Daily ritual check-in: a long, meditative hold.
    pub fn daily_ritual() -> Self {
        Self {
            required_duration_ms: 20_000,
            decay_duration_ms: 900,
            thresholds: PhaseThresholds::ritual(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.required_duration_ms == 0 {
            return Err(ValidationError::ZeroDuration("required_duration_ms".into()));
        }
        if self.decay_duration_ms == 0 {
            return Err(ValidationError::ZeroDuration("decay_duration_ms".into()));
        }
        self.thresholds.validate()
    }
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self::purchase_confirm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_validate() {
        assert!(GestureConfig::purchase_confirm().validate().is_ok());
        assert!(GestureConfig::daily_ritual().validate().is_ok());
    }

    #[test]
    fn presets_parse_case_insensitively() {
        assert_eq!("Ritual".parse::<GesturePreset>(), Ok(GesturePreset::Ritual));
        assert_eq!(
            "purchase".parse::<GesturePreset>().map(GesturePreset::defaults),
            Ok(GestureConfig::purchase_confirm())
        );
        assert!("shop".parse::<GesturePreset>().is_err());
    }

    #[test]
    fn zero_durations_are_rejected() {
        let cfg = GestureConfig {
            required_duration_ms: 0,
            ..GestureConfig::purchase_confirm()
        };
        assert_eq!(
            cfg.validate(),
            Err(ValidationError::ZeroDuration("required_duration_ms".into()))
        );

        let cfg = GestureConfig {
            decay_duration_ms: 0,
            ..GestureConfig::daily_ritual()
        };
        assert!(cfg.validate().is_err());
    }
}
