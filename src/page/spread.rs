//! Two-page spreads and region compositing
//!
//! A spread lays its left and right contents side by side. Each half occupies a
//! footprint proportional to its logical size, and a render request is split
//! into at most one request per half, clipped to the part of the footprint that
//! falls inside the requested window.

use std::sync::Arc;

use log::debug;

use super::bitmap::{Bitmap, Color};
use super::content::{Link, PageContent, RenderRequest, SharedContent};
use super::fit::SpreadSizePolicy;
use super::geometry::{Rect, SizeF};

/// Left and right contents shown as one navigable item
pub struct Spread {
    left: SharedContent,
    right: SharedContent,
    size: SizeF,
    paper: Color,
}

impl Spread {
    #[must_use]
    pub fn new(
        left: SharedContent,
        right: SharedContent,
        policy: SpreadSizePolicy,
        paper: Color,
    ) -> Self {
        let size = policy.compute_size(left.size(), right.size());
        Self {
            left,
            right,
            size,
            paper,
        }
    }

    pub fn left(&self) -> &SharedContent {
        &self.left
    }

    pub fn right(&self) -> &SharedContent {
        &self.right
    }

    pub fn into_shared(self) -> SharedContent {
        Arc::new(self)
    }
}

impl PageContent for Spread {
    fn size(&self) -> SizeF {
        self.size
    }

    fn render_to_bitmap(&self, request: &RenderRequest) -> Option<Bitmap> {
        composite(
            self.left.as_ref(),
            self.right.as_ref(),
            self.size,
            request,
            self.paper,
        )
    }

    fn links(&self) -> Vec<Link> {
        let half = self.size.width / 2.0;
        let mut links = self.left.links();
        links.extend(self.right.links().iter().map(|link| link.shifted(half)));
        links
    }
}

impl std::fmt::Debug for Spread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spread")
            .field("size", &self.size)
            .field("left", &self.left.size())
            .field("right", &self.right.size())
            .finish_non_exhaustive()
    }
}

/// One half's share of a composite request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Piece {
    /// Where the piece lands in the output bitmap
    dest_x: i32,
    dest_y: i32,
    request: RenderRequest,
}

/// Footprint of a half on the laid out spread, in page pixels
fn footprint(sub: SizeF, whole: SizeF, origin_x: i32, request: &RenderRequest) -> Rect {
    let width = (request.page_width as f32 * sub.width / whole.width) as i32;
    let height = (request.page_height as f32 * sub.height / whole.height) as i32;
    Rect::new(origin_x, 0, origin_x + width, height)
}

/// Portion of `footprint` visible through the request window, as a sub request
fn plan_piece(footprint: Rect, request: &RenderRequest) -> Option<Piece> {
    let window = Rect::new(
        -request.start_x,
        -request.start_y,
        -request.start_x + request.bitmap_width,
        -request.start_y + request.bitmap_height,
    );
    let clip = footprint.intersect(&window)?;
    Some(Piece {
        dest_x: clip.left - window.left,
        dest_y: clip.top - window.top,
        request: RenderRequest {
            bitmap_width: clip.width(),
            bitmap_height: clip.height(),
            start_x: -(clip.left - footprint.left),
            start_y: -(clip.top - footprint.top),
            page_width: footprint.width(),
            page_height: footprint.height(),
            high_quality: request.high_quality,
        },
    })
}

fn render_piece(content: &dyn PageContent, piece: Option<Piece>) -> Option<(Piece, Bitmap)> {
    let piece = piece?;
    let bitmap = content.render_to_bitmap(&piece.request)?;
    Some((piece, bitmap))
}

/// Render `request` against two contents laid side by side in a `size` spread
///
/// Halves outside the window are never asked to render. Returns `None` when
/// neither half produced a bitmap.
pub fn composite(
    left: &dyn PageContent,
    right: &dyn PageContent,
    size: SizeF,
    request: &RenderRequest,
    paper: Color,
) -> Option<Bitmap> {
    if request.is_degenerate() || size.is_degenerate() {
        return None;
    }

    let left_area = footprint(left.size(), size, 0, request);
    let right_area = footprint(right.size(), size, left_area.right, request);
    let left_piece = plan_piece(left_area, request);
    let right_piece = plan_piece(right_area, request);

    let (left_result, right_result) = match (left_piece, right_piece) {
        (Some(_), Some(_)) => rayon::join(
            || render_piece(left, left_piece),
            || render_piece(right, right_piece),
        ),
        _ => (
            render_piece(left, left_piece),
            render_piece(right, right_piece),
        ),
    };

    let format = [&left_result, &right_result]
        .into_iter()
        .flatten()
        .map(|(_, bitmap)| bitmap.format())
        .max()?;

    let mut output = Bitmap::filled(
        request.bitmap_width as u32,
        request.bitmap_height as u32,
        format,
        paper,
    )?;
    for (piece, bitmap) in [left_result, right_result].into_iter().flatten() {
        output.draw_bitmap(&bitmap, piece.dest_x, piece.dest_y);
    }
    debug!(
        "Composited {}x{} at ({}, {}) as {:?}",
        request.bitmap_width, request.bitmap_height, request.start_x, request.start_y, format
    );
    Some(output)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::page::bitmap::PixelFormat;
    use crate::page::content::{DummyContent, LinkTarget};
    use crate::page::geometry::RectF;

    /// Solid page that records every request it receives
    struct Solid {
        size: SizeF,
        color: Color,
        format: PixelFormat,
        calls: Mutex<Vec<RenderRequest>>,
    }

    impl Solid {
        fn new(width: f32, height: f32, color: Color) -> Arc<Self> {
            Arc::new(Self {
                size: SizeF::new(width, height),
                color,
                format: PixelFormat::Rgba8888,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<RenderRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl PageContent for Solid {
        fn size(&self) -> SizeF {
            self.size
        }

        fn render_to_bitmap(&self, request: &RenderRequest) -> Option<Bitmap> {
            self.calls.lock().unwrap().push(*request);
            Bitmap::filled(
                request.bitmap_width as u32,
                request.bitmap_height as u32,
                self.format,
                self.color,
            )
        }

        fn links(&self) -> Vec<Link> {
            vec![Link {
                target: LinkTarget::External {
                    uri: "https://example.com".into(),
                },
                bounding_rect: RectF::new(0.0, 0.0, 10.0, 10.0),
            }]
        }
    }

    const RED: Color = Color::rgb(0xFF, 0, 0);
    const BLUE: Color = Color::rgb(0, 0, 0xFF);

    fn request(bw: i32, bh: i32, sx: i32, sy: i32, pw: i32, ph: i32) -> RenderRequest {
        RenderRequest {
            bitmap_width: bw,
            bitmap_height: bh,
            start_x: sx,
            start_y: sy,
            page_width: pw,
            page_height: ph,
            high_quality: false,
        }
    }

    #[test]
    fn window_over_left_half_renders_left_only() {
        let left = Solid::new(100.0, 200.0, RED);
        let right = Solid::new(100.0, 200.0, BLUE);
        let spread = Spread::new(
            left.clone(),
            right.clone(),
            SpreadSizePolicy::LargerFit,
            Color::WHITE,
        );

        let bitmap = spread
            .render_to_bitmap(&request(100, 200, 0, 0, 200, 200))
            .unwrap();

        assert_eq!(left.calls(), vec![request(100, 200, 0, 0, 100, 200)]);
        assert!(right.calls().is_empty());
        assert_eq!(bitmap.pixel(0, 0), Some(RED));
        assert_eq!(bitmap.pixel(99, 199), Some(RED));
    }

    #[test]
    fn window_over_right_half_renders_right_only() {
        let left = Solid::new(100.0, 200.0, RED);
        let right = Solid::new(100.0, 200.0, BLUE);
        let spread = Spread::new(
            left.clone(),
            right.clone(),
            SpreadSizePolicy::LargerFit,
            Color::WHITE,
        );

        let bitmap = spread
            .render_to_bitmap(&request(100, 200, -100, 0, 200, 200))
            .unwrap();

        assert!(left.calls().is_empty());
        assert_eq!(right.calls(), vec![request(100, 200, 0, 0, 100, 200)]);
        assert_eq!(bitmap.pixel(0, 0), Some(BLUE));
    }

    #[test]
    fn straddling_window_splits_between_halves() {
        let left = Solid::new(100.0, 200.0, RED);
        let right = Solid::new(100.0, 200.0, BLUE);
        let spread = Spread::new(
            left.clone(),
            right.clone(),
            SpreadSizePolicy::LargerFit,
            Color::WHITE,
        );

        // Laid out at 400x400, window covers x in [150, 250)
        let bitmap = spread
            .render_to_bitmap(&request(100, 50, -150, -10, 400, 400))
            .unwrap();

        assert_eq!(left.calls(), vec![request(50, 50, -150, -10, 200, 400)]);
        assert_eq!(right.calls(), vec![request(50, 50, 0, -10, 200, 400)]);
        assert_eq!(bitmap.pixel(49, 0), Some(RED));
        assert_eq!(bitmap.pixel(50, 0), Some(BLUE));
    }

    #[test]
    fn shorter_half_is_clipped_and_paper_shows_below() {
        let left = Solid::new(100.0, 100.0, RED);
        let right = Solid::new(100.0, 200.0, BLUE);
        let spread = Spread::new(
            left.clone(),
            right.clone(),
            SpreadSizePolicy::LargerFit,
            Color::WHITE,
        );

        let bitmap = spread
            .render_to_bitmap(&request(200, 200, 0, 0, 200, 200))
            .unwrap();

        assert_eq!(left.calls(), vec![request(100, 100, 0, 0, 100, 100)]);
        assert_eq!(bitmap.pixel(10, 150), Some(Color::WHITE));
        assert_eq!(bitmap.pixel(150, 150), Some(BLUE));
    }

    #[test]
    fn dummy_half_leaves_paper() {
        let left = Solid::new(100.0, 200.0, RED);
        let dummy: SharedContent = Arc::new(DummyContent::sized_like(left.as_ref()));
        let spread = Spread::new(left.clone(), dummy, SpreadSizePolicy::LargerFit, Color::BLACK);

        let bitmap = spread
            .render_to_bitmap(&request(200, 200, 0, 0, 200, 200))
            .unwrap();
        assert_eq!(bitmap.pixel(50, 50), Some(RED));
        assert_eq!(bitmap.pixel(150, 50), Some(Color::BLACK));
    }

    #[test]
    fn no_contributor_means_no_content() {
        let left = Solid::new(100.0, 200.0, RED);
        let dummy: SharedContent = Arc::new(DummyContent::sized_like(left.as_ref()));
        let spread = Spread::new(
            dummy.clone(),
            dummy,
            SpreadSizePolicy::LargerFit,
            Color::WHITE,
        );
        assert!(
            spread
                .render_to_bitmap(&request(200, 200, 0, 0, 200, 200))
                .is_none()
        );
    }

    #[test]
    fn output_uses_richest_format() {
        let left = Arc::new(Solid {
            size: SizeF::new(100.0, 100.0),
            color: Color::BLACK,
            format: PixelFormat::Rgb565,
            calls: Mutex::new(Vec::new()),
        });
        let right = Solid::new(100.0, 100.0, BLUE);
        let spread = Spread::new(left, right, SpreadSizePolicy::LargerFit, Color::WHITE);

        let bitmap = spread
            .render_to_bitmap(&request(200, 100, 0, 0, 200, 100))
            .unwrap();
        assert_eq!(bitmap.format(), PixelFormat::Rgba8888);
    }

    #[test]
    fn nested_spread_recurses() {
        let a = Solid::new(50.0, 100.0, RED);
        let b = Solid::new(50.0, 100.0, BLUE);
        let inner = Spread::new(a.clone(), b.clone(), SpreadSizePolicy::LargerFit, Color::WHITE);
        let c = Solid::new(100.0, 100.0, Color::BLACK);
        let outer = Spread::new(inner.into_shared(), c, SpreadSizePolicy::LargerFit, Color::WHITE);

        let bitmap = outer
            .render_to_bitmap(&request(200, 100, 0, 0, 200, 100))
            .unwrap();
        assert_eq!(bitmap.pixel(10, 10), Some(RED));
        assert_eq!(bitmap.pixel(60, 10), Some(BLUE));
        assert_eq!(bitmap.pixel(150, 10), Some(Color::BLACK));
    }

    #[test]
    fn right_links_are_shifted_by_half_width() {
        let left = Solid::new(100.0, 200.0, RED);
        let right = Solid::new(100.0, 200.0, BLUE);
        let spread = Spread::new(left, right, SpreadSizePolicy::LargerFit, Color::WHITE);

        let links = spread.links();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].bounding_rect.left, 0.0);
        assert_eq!(links[1].bounding_rect.left, 100.0);
    }

    #[test]
    fn window_past_right_edge_keeps_piece_at_its_position() {
        let blue = Color::rgb(0, 0, 0xFF);
        let left = Solid::new(100.0, 100.0, Color::BLACK);
        let right = Solid::new(100.0, 100.0, blue);
        let request = RenderRequest {
            bitmap_width: 200,
            bitmap_height: 100,
            start_x: -300,
            start_y: 0,
            page_width: 400,
            page_height: 100,
            high_quality: false,
        };
        let bitmap = composite(
            left.as_ref(),
            right.as_ref(),
            SizeF::new(200.0, 100.0),
            &request,
            Color::WHITE,
        )
        .unwrap();

        assert!(left.calls().is_empty());
        assert_eq!(bitmap.pixel(0, 50), Some(blue));
        assert_eq!(bitmap.pixel(99, 50), Some(blue));
        // Past the spread the paper shows, the piece is not pushed right
        assert_eq!(bitmap.pixel(100, 50), Some(Color::WHITE));
        assert_eq!(bitmap.pixel(199, 50), Some(Color::WHITE));
    }
}
