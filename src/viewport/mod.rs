//! Touch-driven viewport over a sequence of spreads

pub mod config;
pub mod controller;
pub mod gesture;
pub mod listener;
pub mod scrollbar;
pub mod scroller;
pub mod zoom;

pub use config::{LayoutMode, ViewportConfig};
pub use controller::{DisplayItem, ViewportController, correction, scroll_bounds};
pub use gesture::{Direction, FlingThresholds, Release, TouchEvent};
pub use listener::{NoopListener, ViewportListener};
pub use scrollbar::{BookHeights, Orientation, ScrollBarModel, ScrollThumb};
pub use scroller::Scroller;
pub use zoom::{DEFAULT_SCALE, MAX_SCALE, MIN_SCALE, ZoomAnimation};
