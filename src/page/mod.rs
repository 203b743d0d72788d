//! Page contents, spreads and the providers that hand them out

pub mod bitmap;
pub mod cache;
pub mod content;
pub mod fit;
pub mod geometry;
pub mod image_provider;
pub mod spread;
pub mod spread_provider;

pub use bitmap::{Bitmap, Color, PixelFormat};
pub use content::{
    BitmapPostProcessor, DummyContent, Link, LinkTarget, PageContent, PageContentProvider,
    RenderRequest, SharedContent,
};
pub use fit::{FitPolicy, SpreadSizePolicy};
pub use geometry::{Point, PointF, Rect, RectF, Size, SizeF};
pub use image_provider::ImageDirectoryProvider;
pub use spread::{Spread, composite};
pub use spread_provider::{SpreadOptions, SpreadPages, SpreadProvider};
