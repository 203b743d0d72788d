//! Page content contracts
//!
//! A page content knows its logical size and can render any rectangle of itself
//! at any resolution. Providers hand out content by index and may block while
//! doing so, so they are only called from background tasks.

use std::fmt;
use std::sync::Arc;

use super::bitmap::Bitmap;
use super::geometry::{RectF, SizeF};

/// A viewport-relative region of a page to rasterize
///
/// The page is laid out at `page_width` x `page_height` pixels and the bitmap
/// window starts at (`-start_x`, `-start_y`) on that layout. A start of
/// (-100, 0) therefore renders the page from x = 100 onwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderRequest {
    pub bitmap_width: i32,
    pub bitmap_height: i32,
    pub start_x: i32,
    pub start_y: i32,
    pub page_width: i32,
    pub page_height: i32,
    pub high_quality: bool,
}

impl RenderRequest {
    /// Whole-page request at the given size
    #[must_use]
    pub const fn full_page(width: i32, height: i32, high_quality: bool) -> Self {
        Self {
            bitmap_width: width,
            bitmap_height: height,
            start_x: 0,
            start_y: 0,
            page_width: width,
            page_height: height,
            high_quality,
        }
    }

    /// True when the bitmap or the page layout has no area
    #[must_use]
    pub const fn is_degenerate(&self) -> bool {
        self.bitmap_width <= 0
            || self.bitmap_height <= 0
            || self.page_width <= 0
            || self.page_height <= 0
    }
}

/// Where a link leads
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkTarget {
    Internal { page: usize },
    External { uri: String },
}

/// Clickable area in page-space coordinates
#[derive(Clone, Debug, PartialEq)]
pub struct Link {
    pub target: LinkTarget,
    pub bounding_rect: RectF,
}

impl Link {
    /// Copy of this link shifted horizontally
    #[must_use]
    pub fn shifted(&self, dx: f32) -> Link {
        Link {
            target: self.target.clone(),
            bounding_rect: self.bounding_rect.offset(dx, 0.0),
        }
    }
}

/// A single renderable page or a composite of pages
pub trait PageContent: Send + Sync {
    /// Logical size in page units
    fn size(&self) -> SizeF;

    /// Render the requested window; the bitmap, if any, is exactly
    /// `bitmap_width` x `bitmap_height`
    fn render_to_bitmap(&self, request: &RenderRequest) -> Option<Bitmap>;

    fn links(&self) -> Vec<Link> {
        Vec::new()
    }

    /// Placeholders render nothing and only reserve space
    fn is_placeholder(&self) -> bool {
        false
    }
}

pub type SharedContent = Arc<dyn PageContent>;

/// Blank stand-in for the missing partner of an unpaired page
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DummyContent {
    size: SizeF,
}

impl DummyContent {
    #[must_use]
    pub fn sized_like(reference: &dyn PageContent) -> Self {
        Self {
            size: reference.size(),
        }
    }
}

impl PageContent for DummyContent {
    fn size(&self) -> SizeF {
        self.size
    }

    fn render_to_bitmap(&self, _request: &RenderRequest) -> Option<Bitmap> {
        None
    }

    fn is_placeholder(&self) -> bool {
        true
    }
}

/// Source of page contents by index
pub trait PageContentProvider: Send + Sync {
    fn count(&self) -> usize;

    /// Logical size without building the content; may block
    fn size_of(&self, index: usize) -> Option<SizeF>;

    /// Build the content for `index`; may block
    fn content_of(&self, index: usize) -> Option<SharedContent>;
}

/// Transforms a freshly rendered base bitmap on the worker
pub trait BitmapPostProcessor: Send + Sync {
    fn process(&self, src: Bitmap) -> Bitmap;
}

impl<F> BitmapPostProcessor for F
where
    F: Fn(Bitmap) -> Bitmap + Send + Sync,
{
    fn process(&self, src: Bitmap) -> Bitmap {
        self(src)
    }
}

impl fmt::Debug for dyn PageContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageContent")
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Blank(SizeF);

    impl PageContent for Blank {
        fn size(&self) -> SizeF {
            self.0
        }

        fn render_to_bitmap(&self, _request: &RenderRequest) -> Option<Bitmap> {
            None
        }
    }

    #[test]
    fn dummy_copies_sibling_size() {
        let sibling = Blank(SizeF::new(120.0, 300.0));
        let dummy = DummyContent::sized_like(&sibling);
        assert_eq!(dummy.size(), SizeF::new(120.0, 300.0));
        assert!(dummy.is_placeholder());
        assert!(dummy.links().is_empty());
        assert!(
            dummy
                .render_to_bitmap(&RenderRequest::full_page(10, 10, false))
                .is_none()
        );
    }

    #[test]
    fn degenerate_requests() {
        assert!(RenderRequest::full_page(0, 10, false).is_degenerate());
        assert!(!RenderRequest::full_page(1, 1, true).is_degenerate());
    }

    #[test]
    fn shifted_link_keeps_original() {
        let link = Link {
            target: LinkTarget::Internal { page: 3 },
            bounding_rect: RectF::new(1.0, 2.0, 3.0, 4.0),
        };
        let moved = link.shifted(50.0);
        assert_eq!(moved.bounding_rect, RectF::new(51.0, 2.0, 53.0, 4.0));
        assert_eq!(link.bounding_rect.left, 1.0);
    }
}
