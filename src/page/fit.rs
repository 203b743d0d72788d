//! Scale strategies: how a page fits the canvas, and how two pages size a spread

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::geometry::SizeF;
use crate::error::ConfigError;

/// How a page's base rendering is fitted into the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FitPolicy {
    /// Whole page visible
    #[default]
    Page,
    /// Page width fills the canvas width
    Width,
    /// Page height fills the canvas height
    Height,
}

impl FitPolicy {
    /// Scale factor mapping `content` logical units to canvas pixels
    #[must_use]
    pub fn scale(self, canvas_width: i32, canvas_height: i32, content: SizeF) -> f32 {
        let by_width = canvas_width as f32 / content.width;
        let by_height = canvas_height as f32 / content.height;
        match self {
            FitPolicy::Page => by_width.min(by_height),
            FitPolicy::Width => by_width,
            FitPolicy::Height => by_height,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FitPolicy::Page => "page",
            FitPolicy::Width => "width",
            FitPolicy::Height => "height",
        }
    }
}

impl FromStr for FitPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "page" => Ok(FitPolicy::Page),
            "width" => Ok(FitPolicy::Width),
            "height" => Ok(FitPolicy::Height),
            other => Err(ConfigError::generic(format!("unknown fit policy: {other}"))),
        }
    }
}

impl fmt::Display for FitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the logical size of a two-page spread is derived from its halves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpreadSizePolicy {
    /// Smaller of each dimension, width doubled
    SmallerFit,
    /// Larger of each dimension, width doubled
    #[default]
    LargerFit,
}

impl SpreadSizePolicy {
    #[must_use]
    pub fn compute_size(self, left: SizeF, right: SizeF) -> SizeF {
        match self {
            SpreadSizePolicy::SmallerFit => SizeF::new(
                left.width.min(right.width) * 2.0,
                left.height.min(right.height),
            ),
            SpreadSizePolicy::LargerFit => SizeF::new(
                left.width.max(right.width) * 2.0,
                left.height.max(right.height),
            ),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpreadSizePolicy::SmallerFit => "smaller",
            SpreadSizePolicy::LargerFit => "larger",
        }
    }
}

impl FromStr for SpreadSizePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "smaller" | "smaller_fit" => Ok(SpreadSizePolicy::SmallerFit),
            "larger" | "larger_fit" => Ok(SpreadSizePolicy::LargerFit),
            other => Err(ConfigError::generic(format!(
                "unknown spread size policy: {other}"
            ))),
        }
    }
}

impl fmt::Display for SpreadSizePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
