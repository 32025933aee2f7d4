//! Parse and filter settings, loadable from TOML.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::frames::CoordFrame;

/// Top-level settings.
///
/// ```toml
/// [parse]
/// default_frame = "image"
///
/// [filter]
/// origin = 0.0
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RegionConfig {
    #[serde(default)]
    pub parse: ParseOptions,

    #[serde(default)]
    pub filter: FilterOptions,
}

impl RegionConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Region text parsing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseOptions {
    /// Frame in effect before the first frame command of a region text
    #[serde(default = "default_frame")]
    pub default_frame: CoordFrame,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            default_frame: default_frame(),
        }
    }
}

/// Mask rasterization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterOptions {
    /// Image coordinate of the first pixel; 1.0 for FITS convention
    #[serde(default = "default_origin")]
    pub origin: f64,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            origin: default_origin(),
        }
    }
}

fn default_frame() -> CoordFrame {
    CoordFrame::Physical
}

fn default_origin() -> f64 {
    1.0
}
