mod common;

use std::sync::Arc;

use common::{BLUE, Book, PAPER, RED, Solid};
use spreadview::page::{
    Color, PageContentProvider, RenderRequest, SizeF, SpreadOptions, SpreadProvider,
    SpreadSizePolicy, composite,
};

fn spreads(pages: usize, use_dummy_content: bool) -> SpreadProvider {
    SpreadProvider::new(
        Book::new(pages),
        SpreadOptions {
            use_dummy_content,
            paper_color: PAPER,
            ..SpreadOptions::default()
        },
    )
}

#[test]
fn full_spread_shows_both_halves() {
    let content = spreads(2, false).content_of(0).unwrap();
    assert_eq!(content.size(), SizeF::new(200.0, 200.0));

    let bitmap = content
        .render_to_bitmap(&RenderRequest::full_page(400, 400, false))
        .unwrap();
    assert_eq!((bitmap.width(), bitmap.height()), (400, 400));
    assert_eq!(bitmap.pixel(0, 0), Some(RED));
    assert_eq!(bitmap.pixel(199, 399), Some(RED));
    assert_eq!(bitmap.pixel(200, 0), Some(BLUE));
    assert_eq!(bitmap.pixel(399, 399), Some(BLUE));
}

#[test]
fn window_across_the_seam() {
    let content = spreads(2, false).content_of(0).unwrap();
    let request = RenderRequest {
        bitmap_width: 100,
        bitmap_height: 50,
        start_x: -150,
        start_y: -100,
        page_width: 400,
        page_height: 400,
        high_quality: true,
    };
    let bitmap = content.render_to_bitmap(&request).unwrap();
    assert_eq!((bitmap.width(), bitmap.height()), (100, 50));
    assert_eq!(bitmap.pixel(49, 0), Some(RED));
    assert_eq!(bitmap.pixel(50, 0), Some(BLUE));
    assert_eq!(bitmap.pixel(99, 49), Some(BLUE));
}

#[test]
fn window_past_the_page_is_paper() {
    let content = spreads(2, false).content_of(0).unwrap();
    let request = RenderRequest {
        bitmap_width: 100,
        bitmap_height: 100,
        start_x: -350,
        start_y: 0,
        page_width: 400,
        page_height: 400,
        high_quality: false,
    };
    let bitmap = content.render_to_bitmap(&request).unwrap();
    assert_eq!(bitmap.pixel(10, 10), Some(BLUE));
    assert_eq!(bitmap.pixel(60, 10), Some(PAPER));
}

#[test]
fn lone_page_with_dummy_partner() {
    let content = spreads(3, true).content_of(1).unwrap();
    assert_eq!(content.size(), SizeF::new(200.0, 200.0));
    let bitmap = content
        .render_to_bitmap(&RenderRequest::full_page(200, 200, false))
        .unwrap();
    assert_eq!(bitmap.pixel(50, 100), Some(RED));
    assert_eq!(bitmap.pixel(150, 100), Some(PAPER));
}

#[test]
fn lone_page_without_dummy_is_the_page_itself() {
    let content = spreads(3, false).content_of(1).unwrap();
    assert_eq!(content.size(), SizeF::new(100.0, 200.0));
}

#[test]
fn uneven_halves_take_proportional_footprints() {
    let wide = Solid {
        size: SizeF::new(200.0, 100.0),
        color: RED,
    };
    let narrow = Solid {
        size: SizeF::new(100.0, 100.0),
        color: BLUE,
    };
    let size = SpreadSizePolicy::LargerFit.compute_size(wide.size, narrow.size);
    assert_eq!(size, SizeF::new(400.0, 100.0));

    let bitmap = composite(
        &wide,
        &narrow,
        size,
        &RenderRequest::full_page(400, 100, false),
        PAPER,
    )
    .unwrap();
    assert_eq!(bitmap.pixel(199, 50), Some(RED));
    assert_eq!(bitmap.pixel(200, 50), Some(BLUE));
    assert_eq!(bitmap.pixel(299, 50), Some(BLUE));
    assert_eq!(bitmap.pixel(300, 50), Some(PAPER));
}

#[test]
fn degenerate_request_renders_nothing() {
    let content: Arc<Solid> = Arc::new(Solid {
        size: SizeF::new(100.0, 100.0),
        color: Color::BLACK,
    });
    let request = RenderRequest::full_page(0, 100, false);
    let spread = SizeF::new(200.0, 100.0);
    assert!(composite(content.as_ref(), content.as_ref(), spread, &request, PAPER).is_none());
}
