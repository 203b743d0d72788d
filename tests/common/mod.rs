#![allow(dead_code)]

use std::sync::Arc;

use spreadview::page::{
    Bitmap, Color, PageContent, PageContentProvider, PixelFormat, RenderRequest, SharedContent,
    SizeF,
};

pub const RED: Color = Color::rgb(0xFF, 0, 0);
pub const BLUE: Color = Color::rgb(0, 0, 0xFF);
pub const PAPER: Color = Color::rgb(0xF0, 0xE8, 0xD8);

/// Page painted in one color at any resolution
pub struct Solid {
    pub size: SizeF,
    pub color: Color,
}

impl PageContent for Solid {
    fn size(&self) -> SizeF {
        self.size
    }

    fn render_to_bitmap(&self, request: &RenderRequest) -> Option<Bitmap> {
        Bitmap::filled(
            request.bitmap_width as u32,
            request.bitmap_height as u32,
            PixelFormat::Rgba8888,
            self.color,
        )
    }
}

/// Book of equally sized pages alternating red and blue
pub struct Book {
    pub pages: usize,
    pub page_size: SizeF,
}

impl Book {
    pub fn new(pages: usize) -> Arc<Self> {
        Arc::new(Self {
            pages,
            page_size: SizeF::new(100.0, 200.0),
        })
    }

    pub fn color_of(index: usize) -> Color {
        if index % 2 == 0 { RED } else { BLUE }
    }
}

impl PageContentProvider for Book {
    fn count(&self) -> usize {
        self.pages
    }

    fn size_of(&self, index: usize) -> Option<SizeF> {
        (index < self.pages).then_some(self.page_size)
    }

    fn content_of(&self, index: usize) -> Option<SharedContent> {
        (index < self.pages).then(|| {
            Arc::new(Solid {
                size: self.page_size,
                color: Book::color_of(index),
            }) as SharedContent
        })
    }
}
