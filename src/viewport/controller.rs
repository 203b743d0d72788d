//! Viewport state machine
//!
//! The controller owns the current spread index, the zoom scale and the
//! pending scroll offset. Hosts feed it recognized touch input and call
//! [`ViewportController::on_frame`] once per display frame; work that has to
//! wait for the next frame is queued the way a UI looper would and drained at
//! the start of each frame.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use log::debug;

use super::config::{LayoutMode, ViewportConfig};
use super::gesture::{Direction, Release, TouchEvent, axis_locked, within_bounds_in_direction};
use super::listener::ViewportListener;
use super::scrollbar::{BookHeights, ScrollBarModel, ScrollThumb};
use super::scroller::Scroller;
use super::zoom::{
    DEFAULT_SCALE, DoubleTapAction, MIN_SCALE, ZoomAnimation, clamp_scale, double_tap_target,
    is_default_scale,
};
use crate::error::RenderFault;
use crate::page::{Bitmap, PageContentProvider, Point, PointF, Rect, Size};
use crate::render::{Executor, HighQualityPatch, PageSurface, PostProcessors, SurfaceConfig};

/// Flings are not started when the page is further out of bounds than this
pub const FLING_MARGIN: i32 = 70;
/// Duration of the slide back into bounds
pub const SLIDE_DURATION: Duration = Duration::from_millis(400);

/// Work deferred to the next frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Posted {
    Settle(usize),
    Unsettle(usize),
    ScrollProcessor,
}

/// One laid out surface, as the presenter needs it
#[derive(Debug)]
pub struct DisplayItem<'a> {
    pub index: usize,
    /// On-screen rectangle, viewport relative
    pub frame: Rect,
    pub base: Option<&'a Bitmap>,
    pub patch: Option<&'a HighQualityPatch>,
    pub fault: Option<&'a RenderFault>,
}

/// Scroll limits for a rectangle laid out in `viewport`
///
/// `left..=right` is the range of horizontal offsets keeping the viewport
/// covered, likewise `top..=bottom` vertically. A rectangle smaller than the
/// viewport collapses its range to the centering offset, or to 0 for the
/// vertical axis in continuous scroll.
#[must_use]
pub fn scroll_bounds(viewport: Size, scroll_mode: bool, rect: Rect) -> Rect {
    let mut x_min = viewport.width - rect.right;
    let mut x_max = -rect.left;
    let mut y_min = viewport.height - rect.bottom;
    let mut y_max = -rect.top;

    if x_min > x_max {
        x_min = (x_min + x_max) / 2;
        x_max = x_min;
    }
    if y_min > y_max {
        if scroll_mode {
            y_min = 0;
            y_max = 0;
        } else {
            y_min = (y_min + y_max) / 2;
            y_max = y_min;
        }
    }
    Rect::new(x_min, y_min, x_max, y_max)
}

/// Smallest move bringing offset 0 inside `bounds`
#[must_use]
pub fn correction(bounds: Rect) -> Point {
    Point::new(
        0.max(bounds.left).min(bounds.right),
        0.max(bounds.top).min(bounds.bottom),
    )
}

pub struct ViewportController {
    config: ViewportConfig,
    viewport: Size,
    provider: Arc<dyn PageContentProvider>,
    surface_config: SurfaceConfig,
    executor: Arc<dyn Executor>,
    post_processors: PostProcessors,
    listener: Box<dyn ViewportListener>,

    surfaces: BTreeMap<usize, PageSurface>,
    pool: Vec<PageSurface>,
    /// Spreads that should carry a patch, including ones whose base is still rendering
    settled: BTreeSet<usize>,

    current_index: Option<usize>,
    scale: f32,
    requested_scale: f32,
    scroll_x: i32,
    scroll_y: i32,

    scroller: Scroller,
    scroller_last: Point,
    clock: Duration,
    posted: VecDeque<Posted>,
    zoom_animation: Option<ZoomAnimation>,

    user_interacting: bool,
    scaling: bool,
    sliding: bool,
    scroll_disabled: bool,
    external_gesture: bool,
    pinch_active: bool,
    reset_layout: bool,
    layout_requested: bool,
    /// Scroll mode: settle visible spreads once the released drag is laid out
    settle_after_layout: bool,
    try_over_first: bool,
    try_over_last: bool,

    /// Left and right edge of the current spread when the touch went down
    touch_start: Option<(i32, i32)>,
    kept_scroll_offset: Option<Point>,
}

impl ViewportController {
    /// Controller showing spread 0 of `provider`; the viewport is the canvas of `surface_config`
    pub fn new(
        config: ViewportConfig,
        surface_config: SurfaceConfig,
        provider: Arc<dyn PageContentProvider>,
        executor: Arc<dyn Executor>,
        listener: Box<dyn ViewportListener>,
    ) -> Self {
        let current_index = (provider.count() > 0).then_some(0);
        Self {
            config,
            viewport: surface_config.canvas,
            provider,
            surface_config,
            executor,
            post_processors: Arc::new(Vec::new()),
            listener,
            surfaces: BTreeMap::new(),
            pool: Vec::new(),
            settled: BTreeSet::new(),
            current_index,
            scale: DEFAULT_SCALE,
            requested_scale: DEFAULT_SCALE,
            scroll_x: 0,
            scroll_y: 0,
            scroller: Scroller::new(),
            scroller_last: Point::default(),
            clock: Duration::ZERO,
            posted: VecDeque::new(),
            zoom_animation: None,
            user_interacting: false,
            scaling: false,
            sliding: false,
            scroll_disabled: false,
            external_gesture: false,
            pinch_active: false,
            reset_layout: true,
            layout_requested: true,
            settle_after_layout: false,
            try_over_first: false,
            try_over_last: false,
            touch_start: None,
            kept_scroll_offset: None,
        }
    }

    /// Post-process every bitmap rendered from now on
    #[must_use]
    pub fn with_post_processors(mut self, post_processors: PostProcessors) -> Self {
        self.post_processors = post_processors;
        self.refresh();
        self
    }

    pub fn config(&self) -> &ViewportConfig {
        &self.config
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn surface(&self, index: usize) -> Option<&PageSurface> {
        self.surfaces.get(&index)
    }

    pub fn is_current_surface_present(&self) -> bool {
        self.current_surface().is_some()
    }

    /// Top-left corner of the current spread on screen
    pub fn scroll_offset(&self) -> Option<Point> {
        self.current_surface().map(|surface| surface.frame().origin())
    }

    /// Indices of every surface currently laid out
    pub fn visible_indices(&self) -> Vec<usize> {
        self.surfaces.keys().copied().collect()
    }

    /// Base size of the current spread
    pub fn render_size(&self) -> Size {
        self.current_surface()
            .or_else(|| self.surfaces.values().next())
            .map_or(Size::new(1, 1), PageSurface::size)
    }

    /// Surfaces overlapping the viewport in drawing order
    pub fn display_list(&self) -> Vec<DisplayItem<'_>> {
        let screen = Rect::from_size(self.viewport);
        self.surfaces
            .iter()
            .filter(|(_, surface)| surface.frame().intersects(&screen))
            .map(|(&index, surface)| DisplayItem {
                index,
                frame: surface.frame(),
                base: surface.base_bitmap(),
                patch: surface.patch(),
                fault: surface.fault(),
            })
            .collect()
    }

    /// Snapshot for the scrollbars; `None` until the current spread is laid out
    pub fn scroll_bar_model(&self) -> Option<ScrollBarModel> {
        let index = self.current_index?;
        let surface = self.surfaces.get(&index)?;
        let frame = surface.frame();
        let heights = if self.config.flexible_content_size {
            let (width, height) = (self.viewport.width, self.viewport.height);
            BookHeights::Flexible(
                (0..self.count())
                    .map(|i| {
                        self.provider.size_of(i).map_or(0.0, |size| {
                            size.height * self.surface_config.fit_policy.scale(width, height, size)
                        })
                    })
                    .collect(),
            )
        } else {
            BookHeights::Uniform
        };
        Some(ScrollBarModel {
            viewport: self.viewport,
            scroll_mode: self.is_scroll_mode(),
            reverse: self.config.reverse,
            count: self.count(),
            current_index: index,
            current_frame: frame,
            sub_screen_offset_y: self.sub_screen_offset(index, frame.size()).y,
            page_gap: self.config.page_gap,
            scale: self.scale,
            heights,
        })
    }

    pub fn scroll_bars(&self) -> Vec<ScrollThumb> {
        self.scroll_bar_model()
            .map(|model| model.thumbs())
            .unwrap_or_default()
    }

    /// True while anything is still moving, loading or waiting for a frame
    pub fn is_animating(&self) -> bool {
        self.layout_requested
            || self.settle_after_layout
            || !self.posted.is_empty()
            || self.zoom_animation.is_some()
            || !self.scroller.is_finished()
            || self.surfaces.values().any(|s| s.pending_tasks() > 0)
    }

    /// Advance the clock by `elapsed` and run one frame; true while more frames are needed
    pub fn on_frame(&mut self, elapsed: Duration) -> bool {
        self.clock += elapsed;

        let mut changed = false;
        let mut landed = Vec::new();
        for (&index, surface) in &mut self.surfaces {
            if surface.poll() {
                changed = true;
                if surface.is_rendered() && self.settled.contains(&index) {
                    landed.push(index);
                }
            }
        }
        if changed {
            self.layout_requested = true;
        }

        let posted: Vec<Posted> = self.posted.drain(..).collect();
        for action in posted {
            self.run_posted(action);
        }

        if let Some(mut animation) = self.zoom_animation.take() {
            for step in animation.advance(self.clock) {
                self.do_scaling(step, animation.focus());
            }
            if animation.is_finished() {
                self.scroll_disabled = false;
                self.end_scaling();
                if let Some(index) = self.present_current() {
                    self.post(Posted::Settle(index));
                }
            } else {
                self.zoom_animation = Some(animation);
            }
        }

        if self.layout_requested {
            self.layout_requested = false;
            self.do_layout();
        }

        // Bases that finished after their spread settled
        for index in landed {
            if let Some(surface) = self.surfaces.get_mut(&index) {
                surface.update_high_quality();
            }
        }

        if self.settle_after_layout && !self.layout_requested && self.scroller.is_finished() {
            self.settle_after_layout = false;
            self.settle_or_unsettle();
        }

        self.is_animating()
    }

    /// Feed one recognized touch event
    pub fn handle_touch(&mut self, event: TouchEvent) {
        match event {
            TouchEvent::Down { .. } => {
                if let Some(surface) = self.current_surface() {
                    let frame = surface.frame();
                    self.touch_start = Some((frame.left, frame.right));
                }
                if !self.sliding {
                    self.scroller.force_finished();
                }
                self.user_interacting = true;
            }
            TouchEvent::Drag {
                start,
                current,
                distance_x,
                distance_y,
            } => {
                if self.on_drag(start, current, distance_x, distance_y) {
                    self.touch_start = None;
                }
            }
            TouchEvent::Up { position, release } => self.on_up(position, release),
            TouchEvent::SingleTapConfirmed { position } => {
                if self.config.double_tap_zoom {
                    self.listener.on_single_tap_up(position);
                }
            }
            TouchEvent::DoubleTap { position } => self.on_double_tap(position),
            TouchEvent::PinchBegin { .. } => {
                if self.external_gesture || self.zoom_animation.is_some() || !self.can_scale() {
                    return;
                }
                self.prepare_scaling();
                self.pinch_active = true;
            }
            TouchEvent::Pinch { factor, focus } => {
                if self.pinch_active {
                    self.do_scaling(self.scale * factor, focus);
                }
            }
            TouchEvent::PinchEnd => {
                if self.pinch_active {
                    self.pinch_active = false;
                    self.end_scaling();
                }
            }
        }
    }

    /// Switch layout mode, reading direction and sliding
    pub fn set_view_mode(&mut self, layout: LayoutMode, reverse: bool, sliding_enabled: bool) {
        self.config.layout = layout;
        self.config.reverse = reverse;
        self.config.sliding_enabled = sliding_enabled;

        self.user_interacting = false;
        self.layout_requested = true;

        if sliding_enabled && !layout.is_scroll() {
            if let Some(index) = self.present_current() {
                self.slide_onto_screen(index);
            }
        }
        self.listener.on_view_mode_changed();
    }

    pub fn set_page_gap(&mut self, page_gap: i32) {
        self.config.page_gap = page_gap.max(0);
        self.layout_requested = true;
    }

    /// Jump to spread `index` at the default scale
    pub fn set_current_index(&mut self, index: usize) {
        if index < self.count() {
            self.current_index = Some(index);
            self.listener.on_current_index_changed(index);
            self.scale = DEFAULT_SCALE;
            self.reset_layout = true;
            self.layout_requested = true;
        }
    }

    /// Apply `scale`, and with keep-scroll-offset an on-screen offset, on the next layout
    pub fn request_scale(&mut self, scale: f32, offset: Option<Point>) {
        self.requested_scale = clamp_scale(scale);
        if self.config.keep_scroll_offset && offset.is_some() {
            self.kept_scroll_offset = offset;
        }
        self.layout_requested = true;
    }

    pub fn view_prev(&mut self) {
        self.user_interacting = false;
        match self.current_index {
            Some(index) if index > 0 => {
                self.keep_scroll_offset_if_needed();
                self.decrease_current_index();
            }
            _ => self.try_over_first = true,
        }
        self.finish_programmatic_turn();
    }

    pub fn view_next(&mut self) {
        self.user_interacting = false;
        match self.current_index {
            Some(index) if index + 1 < self.count() => {
                self.keep_scroll_offset_if_needed();
                self.increase_current_index();
            }
            _ => self.try_over_last = true,
        }
        self.finish_programmatic_turn();
    }

    pub fn view_left_or_up(&mut self) {
        if self.config.reverse {
            self.view_next();
        } else {
            self.view_prev();
        }
    }

    pub fn view_right_or_down(&mut self) {
        if self.config.reverse {
            self.view_prev();
        } else {
            self.view_next();
        }
    }

    /// Scroll by `offset` pixels in continuous scroll; ignored in paged mode
    pub fn scroll_vertical(&mut self, offset: i32) {
        if !self.is_scroll_mode() {
            return;
        }
        self.scroll_y -= offset;
        self.layout_requested = true;

        let Some(index) = self.present_current() else {
            return;
        };
        let measured = self.measured(index);
        let offset = self.sub_screen_offset(index, measured);
        let top = self.surfaces[&index].frame().top + self.scroll_y;
        if !self.right_or_down_available(index) && top < offset.y {
            self.listener.on_try_over_last_page();
        }
    }

    /// Provider content changed: drop every surface and lay out again
    pub fn refresh(&mut self) {
        for (_, mut surface) in std::mem::take(&mut self.surfaces) {
            surface.clear();
        }
        self.pool.clear();
        self.settled.clear();
        let count = self.count();
        self.current_index = match self.current_index {
            _ if count == 0 => None,
            Some(index) => Some(index.min(count - 1)),
            None => Some(0),
        };
        self.scale = DEFAULT_SCALE;
        self.reset_layout = true;
        self.layout_requested = true;
    }

    /// New viewport size; surfaces are rebuilt for the new canvas
    pub fn set_viewport_size(&mut self, size: Size) {
        if size == self.viewport {
            return;
        }
        debug!("Viewport resized to {}x{}", size.width, size.height);
        self.viewport = size;
        self.surface_config.canvas = size;
        self.refresh();
    }

    /// Cancel all background work and release every surface
    pub fn destroy(&mut self) {
        for surface in self.surfaces.values_mut() {
            surface.clear();
        }
        self.surfaces.clear();
        self.pool.clear();
        self.settled.clear();
        self.posted.clear();
        self.zoom_animation = None;
        self.scroller.force_finished();
    }

    fn count(&self) -> usize {
        self.provider.count()
    }

    fn is_scroll_mode(&self) -> bool {
        self.config.layout.is_scroll()
    }

    fn current_surface(&self) -> Option<&PageSurface> {
        self.current_index.and_then(|index| self.surfaces.get(&index))
    }

    /// Current index if its surface exists
    fn present_current(&self) -> Option<usize> {
        self.current_index
            .filter(|index| self.surfaces.contains_key(index))
    }

    fn post(&mut self, action: Posted) {
        if action == Posted::ScrollProcessor && self.posted.contains(&action) {
            return;
        }
        self.posted.push_back(action);
    }

    fn run_posted(&mut self, action: Posted) {
        match action {
            Posted::Settle(index) => {
                self.settled.insert(index);
                if let Some(surface) = self.surfaces.get_mut(&index) {
                    surface.update_high_quality();
                }
            }
            Posted::Unsettle(index) => {
                self.settled.remove(&index);
                if let Some(surface) = self.surfaces.get_mut(&index) {
                    surface.remove_high_quality();
                }
            }
            Posted::ScrollProcessor => self.process_scroll(),
        }
    }

    /// One step of the physics loop; re-posts itself until the scroller stops
    fn process_scroll(&mut self) {
        if !self.scroller.is_finished() {
            self.scroller.compute_offset(self.clock);
            let position = self.scroller.current();
            self.scroll_x += position.x - self.scroller_last.x;
            self.scroll_y += position.y - self.scroller_last.y;
            self.scroller_last = position;
            self.listener.on_scroll_changed();
            self.layout_requested = true;
            self.post(Posted::ScrollProcessor);
            return;
        }

        self.sliding = false;
        if self.is_scroll_mode() {
            self.settle_or_unsettle();
        } else if !self.user_interacting {
            self.scaling = false;
            let current = self.current_index;
            let others: Vec<usize> = self
                .surfaces
                .keys()
                .copied()
                .filter(|&index| Some(index) != current)
                .collect();
            for index in others {
                self.post(Posted::Unsettle(index));
            }
            if let Some(index) = self.present_current() {
                self.post(Posted::Settle(index));
            }
        }

        if self.try_over_first {
            self.listener.on_try_over_first_page();
        } else if self.try_over_last {
            self.listener.on_try_over_last_page();
        }
        self.try_over_first = false;
        self.try_over_last = false;
    }

    /// Settle what intersects the viewport, unsettle the rest
    fn settle_or_unsettle(&mut self) {
        let screen = Rect::from_size(self.viewport);
        let mut settle = Vec::new();
        let mut unsettle = Vec::new();
        for (&index, surface) in &self.surfaces {
            if surface.frame().intersects(&screen) {
                settle.push(index);
            } else {
                unsettle.push(index);
            }
        }
        for index in unsettle {
            self.post(Posted::Unsettle(index));
        }
        for index in settle {
            self.post(Posted::Settle(index));
        }
    }

    fn finish_programmatic_turn(&mut self) {
        if self.config.sliding_enabled {
            match self.present_current() {
                Some(index) => self.slide_onto_screen(index),
                None => self.post(Posted::ScrollProcessor),
            }
        } else {
            self.do_layout();
            self.post(Posted::ScrollProcessor);
        }
    }

    fn slide_onto_screen(&mut self, index: usize) {
        let fix = correction(self.surface_scroll_bounds(index));
        if !fix.is_zero() {
            self.scroller_last = Point::default();
            self.sliding = true;
            self.scroller
                .start_scroll(self.clock, Point::default(), fix, SLIDE_DURATION);
        }
        self.post(Posted::ScrollProcessor);
    }

    fn left_or_up_available(&self, index: usize) -> bool {
        if self.config.reverse {
            index + 1 < self.count()
        } else {
            index > 0
        }
    }

    fn right_or_down_available(&self, index: usize) -> bool {
        if self.config.reverse {
            index > 0
        } else {
            index + 1 < self.count()
        }
    }

    fn left_or_up_of(&self, index: usize) -> usize {
        if self.config.reverse { index + 1 } else { index - 1 }
    }

    fn right_or_down_of(&self, index: usize) -> usize {
        if self.config.reverse { index - 1 } else { index + 1 }
    }

    fn set_current_index_to_left_or_up(&mut self) {
        if self.config.reverse {
            self.increase_current_index();
        } else {
            self.decrease_current_index();
        }
    }

    fn set_current_index_to_right_or_down(&mut self) {
        if self.config.reverse {
            self.decrease_current_index();
        } else {
            self.increase_current_index();
        }
    }

    fn increase_current_index(&mut self) {
        if let Some(index) = self.current_index {
            if index + 1 < self.count() {
                self.change_current_index(index + 1);
            }
        }
    }

    fn decrease_current_index(&mut self) {
        if let Some(index) = self.current_index {
            if index > 0 {
                self.change_current_index(index - 1);
            }
        }
    }

    fn change_current_index(&mut self, index: usize) {
        if self.current_index != Some(index) {
            debug!("Current spread {:?} -> {index}", self.current_index);
            self.current_index = Some(index);
            self.listener.on_current_index_changed(index);
        }
    }

    fn should_keep_scroll_offset(&self) -> bool {
        self.config.keep_scroll_offset && self.scale > MIN_SCALE
    }

    fn keep_scroll_offset_if_needed(&mut self) {
        if self.should_keep_scroll_offset() {
            if let Some(origin) = self.scroll_offset() {
                self.kept_scroll_offset = Some(origin);
            }
        }
    }

    fn prev_by_gesture_available(&self) -> bool {
        is_default_scale(self.scale) || self.touch_start.is_some_and(|(left, _)| left == 0)
    }

    fn next_by_gesture_available(&self) -> bool {
        is_default_scale(self.scale)
            || self
                .touch_start
                .is_some_and(|(_, right)| right == self.viewport.width)
    }

    fn can_scale(&self) -> bool {
        self.current_surface().is_some_and(PageSurface::is_rendered)
    }

    /// Base size of surface `index` at the current scale
    fn measured(&self, index: usize) -> Size {
        self.surfaces
            .get(&index)
            .map_or(self.viewport, PageSurface::size)
            .scaled(self.scale)
    }

    /// Offset centering a spread smaller than the viewport
    ///
    /// In continuous scroll the first spread is pinned to the top and the last
    /// one to the bottom.
    fn sub_screen_offset(&self, index: usize, measured: Size) -> Point {
        let (width, height) = (self.viewport.width, self.viewport.height);
        let x = ((width - measured.width) / 2).max(0);
        if self.is_scroll_mode() {
            let last = self.count().saturating_sub(1);
            let (first_index, last_index) = if self.config.reverse {
                (last, 0)
            } else {
                (0, last)
            };
            if index == first_index {
                return Point::new(x, 0);
            } else if index == last_index {
                return Point::new(x, height - measured.height);
            }
        }
        Point::new(x, ((height - measured.height) / 2).max(0))
    }

    /// Scroll bounds of surface `index` including offsets not laid out yet
    fn surface_scroll_bounds(&self, index: usize) -> Rect {
        let frame = self.surfaces.get(&index).map_or_else(Rect::default, PageSurface::frame);
        let measured = self.measured(index);
        let origin = Point::new(frame.left + self.scroll_x, frame.top + self.scroll_y);
        scroll_bounds(
            self.viewport,
            self.is_scroll_mode(),
            Rect::with_origin(origin, measured),
        )
    }

    /// Make sure spread `index` has a surface, loading it if new
    fn ensure_surface(&mut self, index: usize) {
        if self.surfaces.contains_key(&index) {
            return;
        }
        let mut surface = self.pool.pop().unwrap_or_else(|| {
            PageSurface::with_post_processors(
                self.surface_config,
                self.executor.clone(),
                self.post_processors.clone(),
            )
        });
        surface.load_page_content(self.provider.clone(), index);
        surface.set_frame(Rect::from_size(surface.size().scaled(self.scale)));
        self.surfaces.insert(index, surface);
    }

    fn evict(&mut self, index: usize) {
        self.settled.remove(&index);
        if let Some(mut surface) = self.surfaces.remove(&index) {
            surface.clear();
            self.pool.push(surface);
        }
    }

    fn evict_where(&mut self, doomed: impl Fn(usize, &PageSurface) -> bool) {
        let indices: Vec<usize> = self
            .surfaces
            .iter()
            .filter(|(index, surface)| doomed(**index, surface))
            .map(|(index, _)| *index)
            .collect();
        for index in indices {
            self.evict(index);
        }
    }

    fn set_surface_frame(&mut self, index: usize, frame: Rect) {
        if let Some(surface) = self.surfaces.get_mut(&index) {
            surface.set_frame(frame);
        }
    }

    fn frame_of(&self, index: usize) -> Option<Rect> {
        self.surfaces.get(&index).map(PageSurface::frame)
    }

    fn do_layout(&mut self) {
        let Some(start_index) = self.current_index else {
            return;
        };
        let (width, height) = (self.viewport.width, self.viewport.height);
        let scroll_mode = self.is_scroll_mode();

        let rescaled = !is_default_scale(self.requested_scale);
        if rescaled {
            self.scale = self.requested_scale;
            self.requested_scale = DEFAULT_SCALE;
        }

        if self.reset_layout {
            self.reset_layout = false;
            self.scroll_x = 0;
            self.scroll_y = 0;
            self.evict_where(|_, _| true);
        } else {
            // Move on once the current spread has scrolled off
            if scroll_mode && !self.sliding {
                if let Some(frame) = self.frame_of(start_index) {
                    let measured = self.measured(start_index);
                    let half_gap = self.config.page_gap as f32 * self.scale / 2.0;
                    let scroll_y = self.scroll_y as f32;
                    if (frame.top + measured.height) as f32 + half_gap + scroll_y < 0.0 {
                        self.set_current_index_to_right_or_down();
                    }
                    if frame.top as f32 - half_gap + scroll_y >= height as f32 {
                        self.set_current_index_to_left_or_up();
                    }
                }
            }

            let current = self.current_index.unwrap_or(start_index);
            let (h, scale) = (height as f32, self.scale);
            self.evict_where(|index, surface| {
                if scroll_mode {
                    let frame = surface.frame();
                    frame.top as f32 > h * 2.0 * scale || (frame.bottom as f32) < -h * scale
                } else {
                    index + 1 < current || index > current + 1
                }
            });
        }

        let current = self.current_index.unwrap_or(start_index);
        let not_present = !self.surfaces.contains_key(&current);
        self.ensure_surface(current);
        if rescaled {
            self.post(Posted::Settle(current));
        }
        let measured = self.measured(current);
        let mut offset = self.sub_screen_offset(current, measured);
        let frame = self.frame_of(current).unwrap_or_default();
        let keep = self.should_keep_scroll_offset();

        let (mut left, mut top);
        if not_present {
            if keep {
                if let Some(kept) = self.kept_scroll_offset.take() {
                    offset = kept;
                }
            }
            left = offset.x;
            top = offset.y;
        } else {
            match self.kept_scroll_offset.filter(|_| keep) {
                Some(kept) => {
                    self.kept_scroll_offset = None;
                    left = kept.x + self.scroll_x;
                    top = kept.y + self.scroll_y;
                }
                None => {
                    left = frame.left + self.scroll_x;
                    top = frame.top + self.scroll_y;
                }
            }
        }

        self.scroll_x = 0;
        self.scroll_y = 0;
        let mut right = left + measured.width;
        let mut bottom = top + measured.height;

        if scroll_mode {
            if !self.left_or_up_available(current) && top > offset.y {
                top = offset.y;
                bottom = top + measured.height;
                if !self.scroller.is_finished() {
                    self.try_over_first = !self.config.reverse;
                    self.try_over_last = self.config.reverse;
                    self.scroller.force_finished();
                }
            }
            if !self.right_or_down_available(current) && top < offset.y {
                top = offset.y;
                bottom = top + measured.height;
                if !self.scroller.is_finished() {
                    self.try_over_first = self.config.reverse;
                    self.try_over_last = !self.config.reverse;
                    self.scroller.force_finished();
                }
            }
            if left > offset.x {
                left = offset.x;
                right = left + measured.width;
            }
            if right < width - offset.x {
                right = width - offset.x;
                left = right - measured.width;
            }
        } else {
            if bottom < height - offset.y {
                bottom = height - offset.y;
                top = bottom - measured.height;
            }
            if top > offset.y {
                top = offset.y;
                bottom = top + measured.height;
            }
            if !self.config.sliding_enabled {
                if right < width - offset.x {
                    right = width - offset.x;
                    left = right - measured.width;
                }
                if left > offset.x {
                    left = offset.x;
                    right = left + measured.width;
                }
            }
        }

        let placed = Rect::new(left, top, right, bottom);
        let bounds = scroll_bounds(self.viewport, scroll_mode, placed);
        let fix = if !self.user_interacting && self.scroller.is_finished() {
            correction(bounds)
        } else if !self.scaling && measured.height <= height && !scroll_mode {
            Point::new(0, correction(bounds).y)
        } else if !self.scaling && measured.width <= width && scroll_mode {
            Point::new(correction(bounds).x, 0)
        } else {
            Point::default()
        };
        let placed = placed.offset(fix.x, fix.y);
        self.set_surface_frame(current, placed);

        if scroll_mode {
            self.layout_scroll_neighbours(current, placed);
        } else {
            self.layout_paged_neighbours(current, placed, offset);
        }
    }

    /// Stack spreads above and below the current one until twice the viewport is covered
    fn layout_scroll_neighbours(&mut self, current: usize, placed: Rect) {
        let height = self.viewport.height as f32;
        let margin = (self.config.page_gap as f32 * self.scale) as i32;

        let (mut index, mut frame) = (current, placed);
        while self.left_or_up_available(index) {
            let lv_bottom = frame.top - margin;
            if (lv_bottom as f32) < -height * self.scale {
                break;
            }
            let next = self.left_or_up_of(index);
            self.ensure_surface(next);
            let measured = self.measured(next);
            let centre = frame.right + frame.left;
            frame = Rect::new(
                (centre - measured.width) / 2,
                lv_bottom - measured.height,
                (centre + measured.width) / 2,
                lv_bottom,
            );
            self.set_surface_frame(next, frame);
            index = next;
        }
        let reverse = self.config.reverse;
        let topmost = index;
        self.evict_where(|i, _| if reverse { i > topmost } else { i < topmost });

        if !self.left_or_up_available(topmost) && frame.top >= 0 {
            self.change_current_index(topmost);
        }
        // The walk down continues from the spread placed first
        let Some(mut frame) = self.frame_of(current) else {
            return;
        };
        let mut index = current;

        while self.right_or_down_available(index) {
            let rv_top = frame.bottom + margin;
            if rv_top as f32 > height * 2.0 * self.scale {
                break;
            }
            let next = self.right_or_down_of(index);
            self.ensure_surface(next);
            let measured = self.measured(next);
            let centre = frame.right + frame.left;
            frame = Rect::new(
                (centre - measured.width) / 2,
                rv_top,
                (centre + measured.width) / 2,
                rv_top + measured.height,
            );
            self.set_surface_frame(next, frame);
            index = next;
        }
        let bottommost = index;
        self.evict_where(|i, _| if reverse { i < bottommost } else { i > bottommost });

        if self.count() > 1
            && !self.right_or_down_available(bottommost)
            && frame.bottom <= self.viewport.height
        {
            self.change_current_index(bottommost);
        }
    }

    /// Park the previous and next spreads beside the current one
    fn layout_paged_neighbours(&mut self, current: usize, placed: Rect, offset: Point) {
        let width = self.viewport.width;
        let gap = self.config.page_gap;

        if self.left_or_up_available(current) {
            let index = self.left_or_up_of(current);
            self.ensure_surface(index);
            let measured = self.measured(index);
            let side = self.sub_screen_offset(index, measured);
            let (top, bottom) = beside(placed, measured);
            let mut right = placed.left - (side.x + gap + offset.x);
            if self.scaling && right > 0 {
                right = -gap - side.x;
            }
            self.set_surface_frame(index, Rect::new(right - measured.width, top, right, bottom));
        }

        if self.right_or_down_available(current) {
            let index = self.right_or_down_of(current);
            self.ensure_surface(index);
            let measured = self.measured(index);
            let side = self.sub_screen_offset(index, measured);
            let (top, bottom) = beside(placed, measured);
            let mut left = placed.right + offset.x + gap + side.x;
            if self.scaling && left < width {
                left = width + gap + side.x;
            }
            self.set_surface_frame(index, Rect::new(left, top, left + measured.width, bottom));
        }
    }

    fn on_drag(&mut self, start: PointF, current: PointF, distance_x: f32, distance_y: f32) -> bool {
        if self.scroll_disabled {
            return false;
        }
        if self.external_gesture {
            self.listener
                .on_scroll_without_scaling(start, current, distance_x, distance_y);
            return true;
        }
        if is_default_scale(self.scale) && !self.is_scroll_mode() && !self.pinch_active {
            let consumed =
                self.listener
                    .on_scroll_without_scaling(start, current, distance_x, distance_y);
            if consumed {
                self.external_gesture = true;
                return true;
            }
        }

        let (dx, dy) = axis_locked(distance_x, distance_y);
        self.scroll_x = (self.scroll_x as f32 - dx) as i32;
        self.scroll_y = (self.scroll_y as f32 - dy) as i32;
        self.layout_requested = true;
        false
    }

    fn on_up(&mut self, position: PointF, release: Release) {
        let consumed = match release {
            Release::Tap => {
                !self.config.double_tap_zoom && self.listener.on_single_tap_up(position)
            }
            Release::Fling { start, velocity } => self.on_fling(start, position, velocity),
            Release::Plain => false,
        };
        if consumed {
            self.touch_start = None;
            return;
        }

        self.external_gesture = false;
        self.scroll_disabled = false;

        if self.is_scroll_mode() {
            if self.scroller.is_finished() {
                self.settle_after_layout = true;
            }
        } else {
            self.user_interacting = false;
            self.turn_page_after_drag();

            if let Some(index) = self.present_current() {
                if self.scroller.is_finished() && self.config.sliding_enabled {
                    self.slide_onto_screen(index);
                }
                if self.scroller.is_finished() {
                    self.post(Posted::Settle(index));
                }
            }
            self.post(Posted::ScrollProcessor);
        }

        self.touch_start = None;
        self.listener.on_touch_up();
    }

    /// Paged mode: a spread dragged past half the viewport becomes current
    fn turn_page_after_drag(&mut self) {
        let Some(index) = self.present_current() else {
            return;
        };
        if self.scaling {
            return;
        }
        let width = self.viewport.width;
        let gap = self.config.page_gap;
        let frame = self.surfaces[&index].frame();
        let measured = self.measured(index);
        let offset = self.sub_screen_offset(index, measured);
        let reverse = self.config.reverse;

        let right = frame.left + measured.width + offset.x + gap / 2 + self.scroll_x;
        if self.next_by_gesture_available() && right < width {
            if !self.right_or_down_available(index) {
                self.try_over_first = reverse;
                self.try_over_last = !reverse;
            } else if right < width / 2 {
                self.set_current_index_to_right_or_down();
                self.layout_requested = true;
            }
        }

        let left = frame.left - offset.x - gap / 2 + self.scroll_x;
        if self.prev_by_gesture_available() && left > 0 {
            if !self.left_or_up_available(index) {
                self.try_over_first = !reverse;
                self.try_over_last = reverse;
            } else if left >= width / 2 {
                self.set_current_index_to_left_or_up();
                self.layout_requested = true;
            }
        }
    }

    /// Returns true when the fling turned the page
    fn on_fling(&mut self, start: PointF, end: PointF, velocity: PointF) -> bool {
        if self.scroll_disabled {
            return false;
        }
        let Some(index) = self.present_current() else {
            return false;
        };
        let bounds = self.surface_scroll_bounds(index);
        let speed = Point::new(velocity.x as i32, velocity.y as i32);

        if self.is_scroll_mode() {
            self.scroller_last = Point::default();
            let max_y = velocity.y.abs() as i32;
            self.scroller.fling(
                self.clock,
                Point::default(),
                speed,
                Point::new(bounds.left, -max_y),
                Point::new(bounds.right, max_y),
            );
            self.post(Posted::ScrollProcessor);
            return true;
        }

        let direction = self.config.fling.classify(end - start, velocity);
        let keep = self.should_keep_scroll_offset();
        match direction {
            Direction::Left
                if bounds.left >= 0 && !keep && self.next_by_gesture_available() =>
            {
                self.view_right_or_down();
                return true;
            }
            Direction::Right
                if bounds.right <= 0 && !keep && self.prev_by_gesture_available() =>
            {
                self.view_left_or_up();
                return true;
            }
            _ => {}
        }

        self.scroller.force_finished();
        self.scroller_last = Point::default();
        let expanded = bounds.inset(-FLING_MARGIN, -FLING_MARGIN);
        if within_bounds_in_direction(&bounds, direction) && expanded.contains(0, 0) {
            self.scroller.fling(
                self.clock,
                Point::default(),
                speed,
                bounds.origin(),
                Point::new(bounds.right, bounds.bottom),
            );
            self.post(Posted::ScrollProcessor);
        }
        false
    }

    fn on_double_tap(&mut self, position: PointF) {
        if !self.config.double_tap_zoom || !self.can_scale() {
            self.listener.on_single_tap_up(position);
            return;
        }
        let Some(frame) = self.current_surface().map(PageSurface::frame) else {
            self.listener.on_single_tap_up(position);
            return;
        };

        match double_tap_target(self.scale, frame, position, self.viewport.width) {
            DoubleTapAction::SingleTap => {
                self.listener.on_single_tap_up(position);
            }
            DoubleTapAction::Zoom { to, focus } => {
                debug!("Double tap zoom {} -> {to}", self.scale);
                self.prepare_scaling();
                self.zoom_animation = Some(ZoomAnimation::new(self.scale, to, focus, self.clock));
            }
        }
    }

    fn prepare_scaling(&mut self) {
        self.scaling = true;
        self.scroll_x = 0;
        self.scroll_y = 0;
        self.scroll_disabled = true;
    }

    fn end_scaling(&mut self) {
        if self.is_scroll_mode() {
            self.scaling = false;
        }
    }

    /// Zoom to `to` keeping `focus` stationary on screen
    fn do_scaling(&mut self, to: f32, focus: PointF) {
        let previous = self.scale;
        self.scale = clamp_scale(to);
        let factor = self.scale / previous;

        let Some(frame) = self.current_surface().map(PageSurface::frame) else {
            return;
        };
        let view_focus_x = (focus.x as i32 - (frame.left + self.scroll_x)) as f32;
        let view_focus_y = (focus.y as i32 - (frame.top + self.scroll_y)) as f32;
        self.scroll_x = (self.scroll_x as f32 + view_focus_x - view_focus_x * factor) as i32;
        self.scroll_y = (self.scroll_y as f32 + view_focus_y - view_focus_y * factor) as i32;
        self.layout_requested = true;
    }
}

/// Vertical placement of a neighbour centred on `placed`, never above the viewport top
fn beside(placed: Rect, measured: Size) -> (i32, i32) {
    let mut top = (placed.bottom + placed.top - measured.height) / 2;
    let mut bottom = (placed.bottom + placed.top + measured.height) / 2;
    if top < 0 {
        bottom += -top;
        top = 0;
    }
    (top, bottom)
}

impl std::fmt::Debug for ViewportController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewportController")
            .field("current_index", &self.current_index)
            .field("scale", &self.scale)
            .field("viewport", &self.viewport)
            .field("surfaces", &self.surfaces.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
