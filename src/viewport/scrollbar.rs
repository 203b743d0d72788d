//! Scrollbar thumb geometry

use crate::page::{Rect, RectF, Size};

/// Thumbs never shrink below this length
pub const MIN_THUMB_SIZE: f32 = 5.0;
/// Thickness of a thumb
pub const STROKE_WIDTH: f32 = 8.0;
/// Translucent grey, 0xAARRGGBB
pub const THUMB_COLOR: u32 = 0x8880_8080;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Vertical,
    Horizontal,
}

/// A thumb to draw, in viewport pixels
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollThumb {
    pub orientation: Orientation,
    pub rect: RectF,
}

/// How the book's total height is estimated in continuous scroll
#[derive(Clone, Debug, PartialEq)]
pub enum BookHeights {
    /// Every spread is as tall as the current one
    Uniform,
    /// Fitted height of each spread at scale 1
    Flexible(Vec<f32>),
}

/// Layout snapshot the scrollbars are derived from
#[derive(Clone, Debug, PartialEq)]
pub struct ScrollBarModel {
    pub viewport: Size,
    pub scroll_mode: bool,
    pub reverse: bool,
    pub count: usize,
    pub current_index: usize,
    /// On-screen rectangle of the current spread
    pub current_frame: Rect,
    /// Centering offset of the current spread
    pub sub_screen_offset_y: i32,
    pub page_gap: i32,
    pub scale: f32,
    pub heights: BookHeights,
}

impl ScrollBarModel {
    /// Thumbs for the current layout; empty when nothing overflows
    #[must_use]
    pub fn thumbs(&self) -> Vec<ScrollThumb> {
        let frame = self.current_frame;
        if frame.width() <= 0 || frame.height() <= 0 {
            return Vec::new();
        }

        if self.scroll_mode && self.count > 1 {
            return vec![self.book_thumb()];
        }

        let (width, height) = (self.viewport.width as f32, self.viewport.height as f32);
        let mut thumbs = Vec::new();
        if frame.height() > self.viewport.height {
            let position = height * -frame.top as f32 / frame.height() as f32;
            let size = height * height / frame.height() as f32;
            thumbs.push(self.vertical(position, size));
        }
        if frame.width() > self.viewport.width {
            let position = width * -frame.left as f32 / frame.width() as f32;
            let size = width * width / frame.width() as f32;
            thumbs.push(self.horizontal(position, size));
        }
        thumbs
    }

    /// Single vertical thumb over the whole book
    fn book_thumb(&self) -> ScrollThumb {
        let frame = self.current_frame;
        let height = self.viewport.height as f32;
        let gap = self.page_gap as f32 * self.scale;

        let (mut total, current) = match &self.heights {
            BookHeights::Flexible(heights) => {
                let mut total = 0.0f32;
                let mut current = -frame.top as f32;
                for (i, h) in heights.iter().enumerate() {
                    let spread = h * self.scale + gap;
                    total += spread;
                    let before = if self.reverse {
                        i > self.current_index
                    } else {
                        i < self.current_index
                    };
                    if before {
                        current += spread;
                    }
                }
                (total, current)
            }
            BookHeights::Uniform => {
                let count = self.count as f32;
                let before = if self.reverse {
                    self.count - self.current_index - 1
                } else {
                    self.current_index
                } as f32;
                let spread = frame.height() as f32;
                let offset = self.sub_screen_offset_y as f32;
                let total = offset * 2.0 + spread * count + gap * (count - 1.0);
                let current = offset + before * (spread + gap) - frame.top as f32;
                (total.trunc(), current.trunc())
            }
        };

        let mut size = height * height / total;
        if size < MIN_THUMB_SIZE {
            size = MIN_THUMB_SIZE;
            total = (total - height) + total * size / height;
        }
        let position = height * current / total;
        self.vertical(position, size)
    }

    fn vertical(&self, position: f32, size: f32) -> ScrollThumb {
        let (position, size) = clip(position, size, self.viewport.height as f32);
        let width = self.viewport.width as f32;
        ScrollThumb {
            orientation: Orientation::Vertical,
            rect: RectF::new(width - STROKE_WIDTH, position, width, position + size),
        }
    }

    fn horizontal(&self, position: f32, size: f32) -> ScrollThumb {
        let (position, size) = clip(position, size, self.viewport.width as f32);
        let height = self.viewport.height as f32;
        ScrollThumb {
            orientation: Orientation::Horizontal,
            rect: RectF::new(position, height - STROKE_WIDTH, position + size, height),
        }
    }
}

/// Keep a thumb inside its track by shortening the overhanging end
fn clip(mut position: f32, mut size: f32, track: f32) -> (f32, f32) {
    if position < 0.0 {
        size += position;
        position = 0.0;
    } else if position + size > track {
        size -= position + size - track;
    }
    (position, size)
}
