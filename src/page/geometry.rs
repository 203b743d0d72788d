//! Geometry value types shared by compositing, surfaces and the viewport
//!
//! Integer types are in screen pixels, float types are in logical page units.

/// Logical page size
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SizeF {
    pub width: f32,
    pub height: f32,
}

impl SizeF {
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Scale both dimensions by the same factor
    #[must_use]
    pub fn scaled(self, factor: f32) -> Self {
        Self::new(self.width * factor, self.height * factor)
    }

    /// True when either dimension is zero, negative or not finite
    #[must_use]
    pub fn is_degenerate(self) -> bool {
        !(self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
    }

    /// Truncate to whole pixels
    #[must_use]
    pub fn to_size(self) -> Size {
        Size::new(self.width as i32, self.height as i32)
    }
}

/// Pixel size
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    #[must_use]
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Multiply by a zoom factor, truncating like a layout measure pass
    #[must_use]
    pub fn scaled(self, factor: f32) -> Self {
        Self::new(
            (self.width as f32 * factor) as i32,
            (self.height as f32 * factor) as i32,
        )
    }
}

/// Pixel position
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.x == 0 && self.y == 0
    }
}

/// Touch position or velocity
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointF {
    pub x: f32,
    pub y: f32,
}

impl PointF {
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl std::ops::Sub for PointF {
    type Output = PointF;

    fn sub(self, rhs: Self) -> Self::Output {
        PointF::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Pixel rectangle, right and bottom exclusive
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    #[must_use]
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Rectangle anchored at the origin
    #[must_use]
    pub const fn from_size(size: Size) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    /// Rectangle with the given top-left corner and size
    #[must_use]
    pub const fn with_origin(origin: Point, size: Size) -> Self {
        Self::new(
            origin.x,
            origin.y,
            origin.x + size.width,
            origin.y + size.height,
        )
    }

    #[must_use]
    pub const fn width(&self) -> i32 {
        self.right - self.left
    }

    #[must_use]
    pub const fn height(&self) -> i32 {
        self.bottom - self.top
    }

    #[must_use]
    pub const fn size(&self) -> Size {
        Size::new(self.width(), self.height())
    }

    #[must_use]
    pub const fn origin(&self) -> Point {
        Point::new(self.left, self.top)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    /// Overlapping part of two rectangles, `None` when they do not overlap
    #[must_use]
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        if !self.intersects(other) {
            return None;
        }
        Some(Rect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        ))
    }

    #[must_use]
    pub fn intersects(&self, other: &Rect) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }

    /// Containment test; an empty rectangle contains nothing
    #[must_use]
    pub const fn contains(&self, x: i32, y: i32) -> bool {
        !self.is_empty() && x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    #[must_use]
    pub const fn offset(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(
            self.left + dx,
            self.top + dy,
            self.right + dx,
            self.bottom + dy,
        )
    }

    /// Shrink by `dx`/`dy` on each side; negative values grow the rectangle
    #[must_use]
    pub const fn inset(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(
            self.left + dx,
            self.top + dy,
            self.right - dx,
            self.bottom - dy,
        )
    }
}

/// Page-space rectangle, used for link hit areas and scrollbar thumbs
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RectF {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl RectF {
    #[must_use]
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    #[must_use]
    pub fn offset(&self, dx: f32, dy: f32) -> RectF {
        RectF::new(
            self.left + dx,
            self.top + dy,
            self.right + dx,
            self.bottom + dy,
        )
    }

    #[must_use]
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    #[must_use]
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}
