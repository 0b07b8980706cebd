use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::HistSysError;

/// How a one-sided variation is folded into a symmetric up/down pair.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Symmetrization {
    /// The full difference to nominal is applied on both sides:
    /// `up = nominal + (syst - nominal)`, `down = nominal - (syst - nominal)`.
    FullDifference,
    /// Half the difference to nominal is applied on both sides:
    /// `up = nominal + (syst - nominal)/2`, `down = nominal - (syst - nominal)/2`.
    HalfDifference,
}

impl Symmetrization {
    /// The scale applied to the nominal-to-variation difference.
    pub fn scale(&self) -> f64 {
        match self {
            Symmetrization::FullDifference => 1.0,
            Symmetrization::HalfDifference => 0.5,
        }
    }
}

impl Display for Symmetrization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Symmetrization::FullDifference => write!(f, "full-difference"),
            Symmetrization::HalfDifference => write!(f, "half-difference"),
        }
    }
}

impl FromStr for Symmetrization {
    type Err = HistSysError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" | "fulldiff" | "full-difference" | "full difference" => {
                Ok(Self::FullDifference)
            }
            "half" | "halfdiff" | "half-difference" | "half difference" => {
                Ok(Self::HalfDifference)
            }
            _ => Err(HistSysError::ParseError {
                name: s.to_string(),
                object: "Symmetrization".to_string(),
            }),
        }
    }
}

/// The direction of a systematic variation.
///
/// The [`Display`] form matches the `High`/`Low` suffix convention used in the
/// template-storage artifact.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variation {
    /// The upward (`High`) variation.
    Up,
    /// The downward (`Low`) variation.
    Down,
}

impl Display for Variation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Variation::Up => write!(f, "High"),
            Variation::Down => write!(f, "Low"),
        }
    }
}

impl FromStr for Variation {
    type Err = HistSysError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "up" | "high" | "hi" => Ok(Self::Up),
            "down" | "low" | "lo" => Ok(Self::Down),
            _ => Err(HistSysError::ParseError {
                name: s.to_string(),
                object: "Variation".to_string(),
            }),
        }
    }
}

/// Re-centering policy for two-sided variations on a shape-only discriminant.
///
/// The normalization applied after a shape-discriminant swap is a policy
/// choice, not a fixed formula, so it is selected here rather than hard-coded
/// in the combination step.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recentering {
    /// Leave the up/down pair untouched.
    #[default]
    None,
    /// Scale each of the up/down templates so its integral matches the nominal
    /// integral, keeping only the shape of the variation.
    NormalizeToNominal,
}

impl Display for Recentering {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Recentering::None => write!(f, "none"),
            Recentering::NormalizeToNominal => write!(f, "normalize-to-nominal"),
        }
    }
}

impl FromStr for Recentering {
    type Err = HistSysError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "off" => Ok(Self::None),
            "normalize" | "normalize-to-nominal" | "nominal" => Ok(Self::NormalizeToNominal),
            _ => Err(HistSysError::ParseError {
                name: s.to_string(),
                object: "Recentering".to_string(),
            }),
        }
    }
}
