//! Zoom limits, double-tap targets and the animated zoom

use std::f32::consts::PI;
use std::time::Duration;

use crate::page::{PointF, Rect};

/// Minimum zoom factor, the fitted base rendering
pub const MIN_SCALE: f32 = 1.0;
/// Maximum zoom factor
pub const MAX_SCALE: f32 = 5.0;
pub const DEFAULT_SCALE: f32 = MIN_SCALE;
/// Zoom applied by a double tap on a portrait page
pub const DOUBLE_TAP_SCALE: f32 = 1.5;

/// Clamp to the valid range, handling NaN/Inf
#[must_use]
pub fn clamp_scale(scale: f32) -> f32 {
    if scale.is_finite() {
        scale.clamp(MIN_SCALE, MAX_SCALE)
    } else {
        DEFAULT_SCALE
    }
}

#[must_use]
pub fn is_default_scale(scale: f32) -> bool {
    (scale - DEFAULT_SCALE).abs() <= f32::EPSILON
}

/// Slow at both ends, fastest in the middle
#[must_use]
pub fn ease_in_out(t: f32) -> f32 {
    ((t + 1.0) * PI).cos() / 2.0 + 0.5
}

/// What a double tap should do
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DoubleTapAction {
    Zoom { to: f32, focus: PointF },
    /// Treat as a single tap (outside the page while unzoomed)
    SingleTap,
}

/// Pick the double-tap zoom target for a page shown in `frame`
///
/// Unzoomed, a landscape spread zooms so one half fills the viewport width,
/// anchored at the screen edge nearest the tap; a portrait page zooms 1.5x.
/// Zoomed, it returns to the default scale.
#[must_use]
pub fn double_tap_target(
    scale: f32,
    frame: Rect,
    tap: PointF,
    viewport_width: i32,
) -> DoubleTapAction {
    let mut focus = tap;
    let mut content_width = frame.width() as f32;
    let content_height = frame.height() as f32;
    let left = frame.left as f32;
    let top = frame.top as f32;
    let width = viewport_width as f32;

    if is_default_scale(scale) {
        if tap.x < left || tap.x > left + content_width || tap.y < top || tap.y > top + content_height
        {
            return DoubleTapAction::SingleTap;
        }
        if content_width > content_height {
            content_width /= 2.0;
            focus.x = if tap.x < width / 2.0 { 0.0 } else { width };
            DoubleTapAction::Zoom {
                to: width / content_width,
                focus,
            }
        } else {
            DoubleTapAction::Zoom {
                to: DOUBLE_TAP_SCALE,
                focus,
            }
        }
    } else {
        if content_width > content_height {
            focus.x = if tap.x - left < content_width / 2.0 {
                0.0
            } else {
                width
            };
        }
        DoubleTapAction::Zoom {
            to: DEFAULT_SCALE,
            focus,
        }
    }
}

/// Zoom animated in fixed steps, spaced along an ease-in/ease-out curve
#[derive(Clone, Debug, PartialEq)]
pub struct ZoomAnimation {
    from: f32,
    to: f32,
    focus: PointF,
    started: Duration,
    next_step: usize,
}

impl ZoomAnimation {
    pub const STEPS: usize = 100;
    pub const DURATION: Duration = Duration::from_millis(200);

    #[must_use]
    pub fn new(from: f32, to: f32, focus: PointF, now: Duration) -> Self {
        Self {
            from,
            to,
            focus,
            started: now,
            next_step: 0,
        }
    }

    pub fn focus(&self) -> PointF {
        self.focus
    }

    pub fn target(&self) -> f32 {
        self.to
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.next_step >= Self::STEPS
    }

    fn delay_of(step: usize) -> Duration {
        Self::DURATION.mul_f32(ease_in_out(step as f32 / Self::STEPS as f32))
    }

    fn scale_of(&self, step: usize) -> f32 {
        if step + 1 == Self::STEPS {
            self.to
        } else {
            self.from + (self.to - self.from) * (step + 1) as f32 / Self::STEPS as f32
        }
    }

    /// Scales of every step that has come due by `now`, in order
    pub fn advance(&mut self, now: Duration) -> Vec<f32> {
        let elapsed = now.saturating_sub(self.started);
        let mut due = Vec::new();
        while self.next_step < Self::STEPS && Self::delay_of(self.next_step) <= elapsed {
            due.push(self.scale_of(self.next_step));
            self.next_step += 1;
        }
        due
    }
}
