mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{BLUE, Book, RED};
use spreadview::page::{PageContentProvider, Size, SpreadOptions, SpreadProvider};
use spreadview::render::{QueuedExecutor, SurfaceConfig};
use spreadview::settings::{ReadingDirection, ViewerSettings};
use spreadview::viewport::{ViewportController, ViewportListener};

#[derive(Clone, Default)]
struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl ViewportListener for Log {
    fn on_current_index_changed(&mut self, index: usize) {
        self.0.lock().unwrap().push(format!("index {index}"));
    }

    fn on_try_over_last_page(&mut self) {
        self.0.lock().unwrap().push("over last".to_string());
    }
}

struct Viewer {
    controller: ViewportController,
    executor: Arc<QueuedExecutor>,
    log: Log,
}

impl Viewer {
    fn open(pages: usize, settings: &ViewerSettings) -> Self {
        let executor = Arc::new(QueuedExecutor::new());
        let log = Log::default();
        let book: Arc<dyn PageContentProvider> = Arc::new(SpreadProvider::new(
            Book::new(pages),
            settings.spread_options().unwrap(),
        ));
        let controller = ViewportController::new(
            settings.viewport_config().unwrap(),
            settings.surface_config(Size::new(400, 800)).unwrap(),
            book,
            executor.clone(),
            Box::new(log.clone()),
        );
        let mut viewer = Self {
            controller,
            executor,
            log,
        };
        viewer.pump();
        viewer
    }

    fn pump(&mut self) {
        for _ in 0..200 {
            self.executor.run_pending();
            let busy = self.controller.on_frame(Duration::from_millis(16));
            if !busy && self.executor.pending() == 0 {
                return;
            }
        }
    }
}

#[test]
fn pages_through_spreads_to_the_end() {
    let mut viewer = Viewer::open(6, &ViewerSettings::default());
    assert_eq!(viewer.controller.current_index(), Some(0));

    for _ in 0..3 {
        viewer.controller.view_next();
        viewer.pump();
    }
    assert_eq!(viewer.controller.current_index(), Some(2));
    assert_eq!(
        viewer.log.entries(),
        vec!["index 1", "index 2", "over last"]
    );

    let display = viewer.controller.display_list();
    let current = display.iter().find(|item| item.index == 2).unwrap();
    let base = current.base.unwrap();
    assert_eq!(base.pixel(10, 10), Some(RED));
    assert_eq!(base.pixel(base.width() - 10, 10), Some(BLUE));
}

#[test]
fn right_to_left_reading_puts_later_pages_left() {
    let settings = ViewerSettings {
        reading_direction: ReadingDirection::RightToLeft,
        ..ViewerSettings::default()
    };
    let mut viewer = Viewer::open(4, &settings);
    let base = viewer
        .controller
        .surface(0)
        .and_then(|surface| surface.base_bitmap())
        .unwrap();
    // Spread 0 shows page 1 (blue) on the left and page 0 (red) on the right
    assert_eq!(base.pixel(10, 10), Some(BLUE));
    assert_eq!(base.pixel(base.width() - 10, 10), Some(RED));

    viewer.controller.view_left_or_up();
    viewer.pump();
    assert_eq!(viewer.controller.current_index(), Some(1));
}

#[test]
fn refresh_after_the_book_shrinks_keeps_a_valid_index() {
    let mut viewer = Viewer::open(6, &ViewerSettings::default());
    viewer.controller.set_current_index(2);
    viewer.pump();
    viewer.controller.refresh();
    viewer.pump();
    assert_eq!(viewer.controller.current_index(), Some(2));
    assert!(viewer.controller.is_current_surface_present());
}

#[test]
fn surface_config_follows_settings() {
    let settings = ViewerSettings {
        paper_color: "#102030".to_string(),
        ..ViewerSettings::default()
    };
    let config: SurfaceConfig = settings.surface_config(Size::new(10, 20)).unwrap();
    assert_eq!(config.canvas, Size::new(10, 20));
    assert_eq!(config.paper_color.to_hex(), "#102030");
    let options: SpreadOptions = settings.spread_options().unwrap();
    assert!(!options.reverse);
}
