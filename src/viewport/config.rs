//! Typed viewport configuration

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::gesture::FlingThresholds;
use crate::error::ConfigError;

/// One spread at a time, or free vertical scroll across spreads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LayoutMode {
    #[default]
    Paged,
    Scroll,
}

impl LayoutMode {
    pub fn is_scroll(self) -> bool {
        self == LayoutMode::Scroll
    }
}

impl FromStr for LayoutMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "paged" | "page" => Ok(LayoutMode::Paged),
            "scroll" | "continuous" => Ok(LayoutMode::Scroll),
            other => Err(ConfigError::generic(format!("unknown layout mode: {other}"))),
        }
    }
}

impl fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LayoutMode::Paged => "paged",
            LayoutMode::Scroll => "scroll",
        })
    }
}

/// Behaviour switches of the viewport controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportConfig {
    pub layout: LayoutMode,
    /// Right-to-left reading: higher indices sit left of / above lower ones
    pub reverse: bool,
    /// Animate the page back into bounds on release (paged mode)
    pub sliding_enabled: bool,
    pub double_tap_zoom: bool,
    /// Carry the zoomed on-screen offset over to the next page
    pub keep_scroll_offset: bool,
    pub fling: FlingThresholds,
    /// Gap between spreads in pixels at scale 1
    pub page_gap: i32,
    /// Estimate scrollbar length from every spread's own height
    pub flexible_content_size: bool,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            layout: LayoutMode::Paged,
            reverse: false,
            sliding_enabled: false,
            double_tap_zoom: true,
            keep_scroll_offset: false,
            fling: FlingThresholds::default(),
            page_gap: 0,
            flexible_content_size: false,
        }
    }
}

impl ViewportConfig {
    /// Reject values the controller cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fling.distance <= 0 {
            return Err(ConfigError::InvalidFlingThreshold {
                which: "distance",
                value: self.fling.distance as f32,
            });
        }
        if self.fling.velocity <= 0 {
            return Err(ConfigError::InvalidFlingThreshold {
                which: "velocity",
                value: self.fling.velocity as f32,
            });
        }
        if self.page_gap < 0 {
            return Err(ConfigError::InvalidPageGap(self.page_gap));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(ViewportConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = ViewportConfig::default();
        config.page_gap = -1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPageGap(-1))
        ));

        let mut config = ViewportConfig::default();
        config.fling.velocity = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidFlingThreshold {
                which: "velocity",
                ..
            })
        ));
    }

    #[test]
    fn layout_mode_parses() {
        assert_eq!("Scroll".parse::<LayoutMode>().unwrap(), LayoutMode::Scroll);
        assert_eq!("paged".parse::<LayoutMode>().unwrap(), LayoutMode::Paged);
        assert!("sideways".parse::<LayoutMode>().is_err());
    }
}
