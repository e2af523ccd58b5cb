//! Signal quality classification
//!
//! Maps a node's SNR and hop count to one of five marker colors. Relay-only
//! nodes and nodes without an SNR reading are always black.

use serde::Serialize;
use std::fmt;

/// Lowest SNR (dB) the classifier distinguishes
pub const SNR_FLOOR_DB: f64 = -20.0;
/// Highest SNR (dB) the classifier distinguishes
pub const SNR_CEIL_DB: f64 = 10.0;

/// Marker color category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerColor {
    /// No SNR reading, or the node is only reachable via relays
    Black,
    /// Very weak link (<= -10 dB)
    Red,
    /// Moderate link (<= 0 dB)
    Orange,
    /// Good link (<= 5 dB)
    LightGreen,
    /// Excellent link (> 5 dB)
    Green,
}

impl MarkerColor {
    /// CSS color name used in the rendered map
    pub fn css(self) -> &'static str {
        match self {
            Self::Black => "black",
            Self::Red => "red",
            Self::Orange => "orange",
            Self::LightGreen => "lightgreen",
            Self::Green => "green",
        }
    }

    /// Link quality rank; `None` for black, which carries no quality information
    pub fn rank(self) -> Option<u8> {
        match self {
            Self::Black => None,
            Self::Red => Some(0),
            Self::Orange => Some(1),
            Self::LightGreen => Some(2),
            Self::Green => Some(3),
        }
    }
}

impl fmt::Display for MarkerColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.css())
    }
}

/// Classify a node by SNR (dB) and hop count
pub fn classify(snr: Option<f64>, hops_away: Option<u32>) -> MarkerColor {
    let snr = match snr {
        Some(value) if !value.is_nan() => value,
        _ => return MarkerColor::Black,
    };
    if matches!(hops_away, Some(hops) if hops > 0) {
        return MarkerColor::Black;
    }

    let clamped = snr.clamp(SNR_FLOOR_DB, SNR_CEIL_DB);
    if clamped <= -10.0 {
        MarkerColor::Red
    } else if clamped <= 0.0 {
        MarkerColor::Orange
    } else if clamped <= 5.0 {
        MarkerColor::LightGreen
    } else {
        MarkerColor::Green
    }
}
