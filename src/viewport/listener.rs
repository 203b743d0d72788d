use crate::page::PointF;

/// Notifications from the viewport to its host
///
/// Every method has a no-op default so hosts implement only what they use.
#[allow(unused_variables)]
pub trait ViewportListener {
    fn on_view_mode_changed(&mut self) {}

    fn on_current_index_changed(&mut self, index: usize) {}

    fn on_scroll_changed(&mut self) {}

    /// A gesture tried to move before the first spread
    fn on_try_over_first_page(&mut self) {}

    /// A gesture tried to move past the last spread
    fn on_try_over_last_page(&mut self) {}

    /// Return true to consume the tap
    fn on_single_tap_up(&mut self, position: PointF) -> bool {
        false
    }

    /// Drag at the default scale in paged mode; return true to take over the gesture
    fn on_scroll_without_scaling(
        &mut self,
        start: PointF,
        current: PointF,
        distance_x: f32,
        distance_y: f32,
    ) -> bool {
        false
    }

    fn on_touch_up(&mut self) {}
}

/// Listener that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl ViewportListener for NoopListener {}
