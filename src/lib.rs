//! Spread-aware page viewport: pairs pages into two-page spreads, renders
//! them in the background and drives zoom and scroll from touch gestures.

pub mod error;
pub mod page;
pub mod panic_handler;
pub mod render;
pub mod settings;
pub mod viewport;

pub use error::{ConfigError, ProviderError, RenderFault};
pub use page::{ImageDirectoryProvider, SpreadOptions, SpreadProvider};
pub use render::{PageSurface, SurfaceConfig, ThreadPoolExecutor};
pub use settings::ViewerSettings;
pub use viewport::{ViewportConfig, ViewportController, ViewportListener};
