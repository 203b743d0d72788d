//! Per-page render lifecycle
//!
//! A surface loads one spread's content, renders a base bitmap sized to fit the
//! canvas and, while zoomed, a high quality patch covering the visible part of
//! the page. All background work goes through cancellable tasks; at most one of
//! each kind is in flight and starting a new one drops its predecessor.

use std::sync::Arc;

use log::{debug, warn};

use super::executor::Executor;
use super::task::{self, TaskHandle, TaskPoll};
use crate::error::RenderFault;
use crate::page::{
    Bitmap, BitmapPostProcessor, Color, FitPolicy, Link, PageContentProvider, Rect,
    RenderRequest, SharedContent, Size,
};

/// Fixed inputs of every surface
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceConfig {
    /// Viewport size in pixels
    pub canvas: Size,
    pub paper_color: Color,
    pub fit_policy: FitPolicy,
}

impl SurfaceConfig {
    #[must_use]
    pub fn new(canvas: Size) -> Self {
        Self {
            canvas,
            paper_color: Color::WHITE,
            fit_policy: FitPolicy::default(),
        }
    }
}

/// Content and base rendering progress
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    LoadFailed(RenderFault),
    BaseRendering,
    BaseReady,
}

/// High quality patch progress, meaningful while the base is ready
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatchState {
    None,
    Pending,
    Ready,
}

/// High resolution rendering of the visible part of a zoomed page
#[derive(Debug)]
pub struct HighQualityPatch {
    /// On-screen page size the patch was rendered for
    pub size: Size,
    /// Covered region, relative to the page's top-left corner
    pub area: Rect,
    pub bitmap: Bitmap,
}

struct PendingPatch {
    size: Size,
    area: Rect,
    task: TaskHandle<Option<Bitmap>>,
}

pub type PostProcessors = Arc<Vec<Arc<dyn BitmapPostProcessor>>>;

pub struct PageSurface {
    config: SurfaceConfig,
    index: Option<usize>,
    /// Base size at minimum zoom; the canvas until content has loaded
    size: Size,
    /// Current on-screen rectangle, viewport relative
    frame: Rect,
    state: LoadState,
    content: Option<SharedContent>,
    load_task: Option<TaskHandle<Option<SharedContent>>>,
    base_task: Option<TaskHandle<Option<Bitmap>>>,
    base: Option<Bitmap>,
    pending_patch: Option<PendingPatch>,
    patch: Option<HighQualityPatch>,
    executor: Arc<dyn Executor>,
    post_processors: PostProcessors,
}

impl PageSurface {
    #[must_use]
    pub fn new(config: SurfaceConfig, executor: Arc<dyn Executor>) -> Self {
        Self::with_post_processors(config, executor, Arc::new(Vec::new()))
    }

    #[must_use]
    pub fn with_post_processors(
        config: SurfaceConfig,
        executor: Arc<dyn Executor>,
        post_processors: PostProcessors,
    ) -> Self {
        Self {
            config,
            index: None,
            size: config.canvas,
            frame: Rect::from_size(config.canvas),
            state: LoadState::Idle,
            content: None,
            load_task: None,
            base_task: None,
            base: None,
            pending_patch: None,
            patch: None,
            executor,
            post_processors,
        }
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn frame(&self) -> Rect {
        self.frame
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn config(&self) -> &SurfaceConfig {
        &self.config
    }

    pub fn patch_state(&self) -> PatchState {
        if self.patch.is_some() {
            PatchState::Ready
        } else if self.pending_patch.is_some() {
            PatchState::Pending
        } else {
            PatchState::None
        }
    }

    pub fn base_bitmap(&self) -> Option<&Bitmap> {
        self.base.as_ref()
    }

    pub fn patch(&self) -> Option<&HighQualityPatch> {
        self.patch.as_ref()
    }

    pub fn content(&self) -> Option<&SharedContent> {
        self.content.as_ref()
    }

    /// Fault that ended the last load, if any
    pub fn fault(&self) -> Option<&RenderFault> {
        match &self.state {
            LoadState::LoadFailed(fault) => Some(fault),
            _ => None,
        }
    }

    /// Links of the loaded content in page space
    pub fn links(&self) -> Vec<Link> {
        self.content
            .as_ref()
            .map(|content| content.links())
            .unwrap_or_default()
    }

    /// True once the base bitmap is in place
    pub fn is_rendered(&self) -> bool {
        self.state == LoadState::BaseReady
    }

    /// Background tasks still in flight
    pub fn pending_tasks(&self) -> usize {
        usize::from(self.load_task.is_some())
            + usize::from(self.base_task.is_some())
            + usize::from(self.pending_patch.is_some())
    }

    /// Drop all work and results; the surface can be reused for another index
    pub fn clear(&mut self) {
        if self.pending_tasks() > 0 {
            debug!("Cancelling {} tasks of surface {:?}", self.pending_tasks(), self.index);
        }
        self.index = None;
        self.load_task = None;
        self.base_task = None;
        self.content = None;
        self.base = None;
        self.pending_patch = None;
        self.patch = None;
        self.state = LoadState::Idle;
    }

    /// Start loading the content of spread `index`, cancelling prior work
    pub fn load_page_content(&mut self, provider: Arc<dyn PageContentProvider>, index: usize) {
        self.clear();
        self.index = Some(index);
        self.state = LoadState::Loading;
        self.load_task = Some(task::spawn(self.executor.as_ref(), move |_| {
            provider.content_of(index)
        }));
        debug!("Surface {index}: loading content");
    }

    /// Collect finished background work; true when anything visible changed
    pub fn poll(&mut self) -> bool {
        let mut changed = false;

        if let Some(load) = &self.load_task {
            match load.try_take() {
                TaskPoll::Pending => {}
                TaskPoll::Ready(Some(content)) => {
                    self.load_task = None;
                    self.set_content(content);
                    changed = true;
                }
                TaskPoll::Ready(None) | TaskPoll::Abandoned => {
                    self.load_task = None;
                    self.fail(RenderFault::ContentUnavailable {
                        index: self.index.unwrap_or_default(),
                    });
                    changed = true;
                }
            }
        }

        if let Some(base) = &self.base_task {
            match base.try_take() {
                TaskPoll::Pending => {}
                TaskPoll::Ready(Some(bitmap)) => {
                    self.base_task = None;
                    self.base = Some(bitmap);
                    self.state = LoadState::BaseReady;
                    debug!("Surface {:?}: base ready", self.index);
                    changed = true;
                }
                TaskPoll::Ready(None) | TaskPoll::Abandoned => {
                    self.base_task = None;
                    self.fail(RenderFault::RenderFailure {
                        index: self.index.unwrap_or_default(),
                    });
                    changed = true;
                }
            }
        }

        if let Some(pending) = &self.pending_patch {
            match pending.task.try_take() {
                TaskPoll::Pending => {}
                TaskPoll::Ready(Some(bitmap)) => {
                    if let Some(pending) = self.pending_patch.take() {
                        debug!("Surface {:?}: patch ready for {:?}", self.index, pending.area);
                        self.patch = Some(HighQualityPatch {
                            size: pending.size,
                            area: pending.area,
                            bitmap,
                        });
                    }
                    changed = true;
                }
                TaskPoll::Ready(None) | TaskPoll::Abandoned => {
                    warn!("Surface {:?}: high quality render failed", self.index);
                    self.pending_patch = None;
                }
            }
        }

        changed
    }

    /// Move the surface on screen; a patch for another size is discarded
    pub fn set_frame(&mut self, frame: Rect) {
        self.frame = frame;
        let size = frame.size();
        if self.patch.as_ref().is_some_and(|patch| patch.size != size) {
            self.patch = None;
        }
        if self
            .pending_patch
            .as_ref()
            .is_some_and(|pending| pending.size != size)
        {
            self.pending_patch = None;
        }
    }

    /// Request a patch for the visible part of the page at its current frame
    pub fn update_high_quality(&mut self) {
        if self.state != LoadState::BaseReady {
            return;
        }
        let Some(content) = self.content.clone() else {
            return;
        };

        let frame = self.frame;
        let patch_size = frame.size();
        if patch_size == self.size {
            return;
        }
        let Some(area) = Rect::from_size(self.config.canvas).intersect(&frame) else {
            return;
        };
        let area = area.offset(-frame.left, -frame.top);

        let matches = |size: Size, existing: Rect| size == patch_size && existing == area;
        if self.patch.as_ref().is_some_and(|p| matches(p.size, p.area))
            || self
                .pending_patch
                .as_ref()
                .is_some_and(|p| matches(p.size, p.area))
        {
            return;
        }

        self.patch = None;
        let request = RenderRequest {
            bitmap_width: area.width(),
            bitmap_height: area.height(),
            start_x: -area.left,
            start_y: -area.top,
            page_width: patch_size.width,
            page_height: patch_size.height,
            high_quality: true,
        };
        let processors = self.post_processors.clone();
        let task = task::spawn(self.executor.as_ref(), move |token| {
            let bitmap = content.render_to_bitmap(&request)?;
            if token.is_cancelled() {
                return None;
            }
            Some(post_process(&processors, bitmap))
        });
        debug!("Surface {:?}: patch requested for {area:?}", self.index);
        self.pending_patch = Some(PendingPatch {
            size: patch_size,
            area,
            task,
        });
    }

    /// Drop the patch and any patch render in flight
    pub fn remove_high_quality(&mut self) {
        self.pending_patch = None;
        self.patch = None;
    }

    fn set_content(&mut self, content: SharedContent) {
        self.base_task = None;
        let logical = content.size();
        if logical.is_degenerate() {
            self.fail(RenderFault::GeometryDegenerate {
                width: logical.width as i32,
                height: logical.height as i32,
            });
            return;
        }

        let canvas = self.config.canvas;
        let scale = self
            .config
            .fit_policy
            .scale(canvas.width, canvas.height, logical);
        let base = logical.scaled(scale).to_size();
        if base.is_empty() {
            self.fail(RenderFault::GeometryDegenerate {
                width: base.width,
                height: base.height,
            });
            return;
        }

        self.size = base;
        self.content = Some(content.clone());
        self.state = LoadState::BaseRendering;
        let processors = self.post_processors.clone();
        self.base_task = Some(task::spawn(self.executor.as_ref(), move |token| {
            let bitmap =
                content.render_to_bitmap(&RenderRequest::full_page(base.width, base.height, false))?;
            if token.is_cancelled() {
                return None;
            }
            Some(post_process(&processors, bitmap))
        }));
        debug!(
            "Surface {:?}: rendering base at {}x{}",
            self.index, base.width, base.height
        );
    }

    fn fail(&mut self, fault: RenderFault) {
        warn!("Surface {:?}: {fault}", self.index);
        self.content = None;
        self.base = None;
        self.state = LoadState::LoadFailed(fault);
    }
}

fn post_process(processors: &[Arc<dyn BitmapPostProcessor>], bitmap: Bitmap) -> Bitmap {
    processors
        .iter()
        .fold(bitmap, |bitmap, processor| processor.process(bitmap))
}

impl std::fmt::Debug for PageSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageSurface")
            .field("index", &self.index)
            .field("state", &self.state)
            .field("size", &self.size)
            .field("frame", &self.frame)
            .field("patch", &self.patch_state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::page::{PageContent, PixelFormat, SizeF};
    use crate::render::executor::QueuedExecutor;

    struct Page {
        size: SizeF,
        renders: Mutex<Vec<RenderRequest>>,
    }

    impl PageContent for Page {
        fn size(&self) -> SizeF {
            self.size
        }

        fn render_to_bitmap(&self, request: &RenderRequest) -> Option<Bitmap> {
            self.renders.lock().unwrap().push(*request);
            Bitmap::new(
                request.bitmap_width as u32,
                request.bitmap_height as u32,
                PixelFormat::Rgba8888,
            )
        }
    }

    struct OnePage(Arc<Page>);

    impl PageContentProvider for OnePage {
        fn count(&self) -> usize {
            1
        }

        fn size_of(&self, _index: usize) -> Option<SizeF> {
            Some(self.0.size)
        }

        fn content_of(&self, index: usize) -> Option<SharedContent> {
            (index == 0).then(|| self.0.clone() as SharedContent)
        }
    }

    fn setup(size: SizeF) -> (PageSurface, Arc<QueuedExecutor>, Arc<Page>, Arc<OnePage>) {
        let executor = Arc::new(QueuedExecutor::new());
        let page = Arc::new(Page {
            size,
            renders: Mutex::new(Vec::new()),
        });
        let provider = Arc::new(OnePage(page.clone()));
        let surface = PageSurface::new(SurfaceConfig::new(Size::new(400, 400)), executor.clone());
        (surface, executor, page, provider)
    }

    fn settle(surface: &mut PageSurface, executor: &QueuedExecutor) {
        while executor.run_pending() > 0 {
            surface.poll();
        }
        surface.poll();
    }

    #[test]
    fn base_is_fitted_to_canvas() {
        let (mut surface, executor, page, provider) = setup(SizeF::new(100.0, 200.0));
        surface.load_page_content(provider, 0);
        assert_eq!(surface.state(), &LoadState::Loading);

        settle(&mut surface, &executor);
        assert!(surface.is_rendered());
        assert_eq!(surface.size(), Size::new(200, 400));
        assert_eq!(
            page.renders.lock().unwrap().as_slice(),
            &[RenderRequest::full_page(200, 400, false)]
        );
    }

    #[test]
    fn missing_content_fails_load() {
        let (mut surface, executor, _page, provider) = setup(SizeF::new(100.0, 200.0));
        surface.load_page_content(provider, 3);
        settle(&mut surface, &executor);
        assert_eq!(
            surface.fault(),
            Some(&RenderFault::ContentUnavailable { index: 3 })
        );
    }

    #[test]
    fn degenerate_content_never_renders() {
        let (mut surface, executor, page, provider) = setup(SizeF::new(0.0, 200.0));
        surface.load_page_content(provider, 0);
        settle(&mut surface, &executor);
        assert!(matches!(
            surface.fault(),
            Some(RenderFault::GeometryDegenerate { .. })
        ));
        assert!(page.renders.lock().unwrap().is_empty());
    }

    #[test]
    fn clear_before_load_completes_skips_base_render() {
        let (mut surface, executor, page, provider) = setup(SizeF::new(100.0, 200.0));
        surface.load_page_content(provider, 0);
        surface.clear();
        settle(&mut surface, &executor);

        assert_eq!(surface.state(), &LoadState::Idle);
        assert!(page.renders.lock().unwrap().is_empty());
    }

    #[test]
    fn identical_patch_request_renders_once() {
        let (mut surface, executor, page, provider) = setup(SizeF::new(100.0, 200.0));
        surface.load_page_content(provider, 0);
        settle(&mut surface, &executor);

        surface.set_frame(Rect::new(-100, -200, 300, 600));
        surface.update_high_quality();
        surface.update_high_quality();
        assert_eq!(surface.patch_state(), PatchState::Pending);
        settle(&mut surface, &executor);
        surface.update_high_quality();

        assert_eq!(surface.patch_state(), PatchState::Ready);
        let renders = page.renders.lock().unwrap();
        assert_eq!(renders.len(), 2);
        assert_eq!(
            renders[1],
            RenderRequest {
                bitmap_width: 300,
                bitmap_height: 400,
                start_x: -100,
                start_y: -200,
                page_width: 400,
                page_height: 800,
                high_quality: true,
            }
        );
    }

    #[test]
    fn resize_discards_patch() {
        let (mut surface, executor, _page, provider) = setup(SizeF::new(100.0, 200.0));
        surface.load_page_content(provider, 0);
        settle(&mut surface, &executor);
        surface.set_frame(Rect::new(-100, -200, 300, 600));
        surface.update_high_quality();
        settle(&mut surface, &executor);
        assert_eq!(surface.patch_state(), PatchState::Ready);

        surface.set_frame(Rect::new(-150, -300, 350, 700));
        assert_eq!(surface.patch_state(), PatchState::None);
    }

    #[test]
    fn base_size_frame_needs_no_patch() {
        let (mut surface, executor, page, provider) = setup(SizeF::new(100.0, 200.0));
        surface.load_page_content(provider, 0);
        settle(&mut surface, &executor);
        surface.set_frame(Rect::new(100, 0, 300, 400));
        surface.update_high_quality();
        assert_eq!(surface.patch_state(), PatchState::None);
        assert_eq!(page.renders.lock().unwrap().len(), 1);
    }

    #[test]
    fn remove_high_quality_cancels_pending_patch() {
        let (mut surface, executor, page, provider) = setup(SizeF::new(100.0, 200.0));
        surface.load_page_content(provider, 0);
        settle(&mut surface, &executor);
        surface.set_frame(Rect::new(-100, -200, 300, 600));
        surface.update_high_quality();
        surface.remove_high_quality();
        settle(&mut surface, &executor);

        assert_eq!(surface.patch_state(), PatchState::None);
        assert_eq!(page.renders.lock().unwrap().len(), 1);
    }

    #[test]
    fn post_processors_run_in_order() {
        let executor = Arc::new(QueuedExecutor::new());
        let page = Arc::new(Page {
            size: SizeF::new(10.0, 10.0),
            renders: Mutex::new(Vec::new()),
        });
        let provider = Arc::new(OnePage(page));
        let fill = |color: Color| -> Arc<dyn BitmapPostProcessor> {
            Arc::new(move |mut bitmap: Bitmap| {
                bitmap.erase(color);
                bitmap
            })
        };
        let processors = Arc::new(vec![fill(Color::BLACK), fill(Color::WHITE)]);
        let mut surface = PageSurface::with_post_processors(
            SurfaceConfig::new(Size::new(10, 10)),
            executor.clone(),
            processors,
        );
        surface.load_page_content(provider, 0);
        settle(&mut surface, &executor);

        let base = surface.base_bitmap().unwrap();
        assert_eq!(base.pixel(5, 5), Some(Color::WHITE));
    }
}
