use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::{debug, info};
use simplelog::{Config, LevelFilter, WriteLogger};

use spreadview::page::{
    FitPolicy, ImageDirectoryProvider, PageContentProvider, Size, SpreadProvider,
    SpreadSizePolicy,
};
use spreadview::panic_handler;
use spreadview::render::{Executor, LoadState, PageSurface, ThreadPoolExecutor};
use spreadview::settings::{self, ReadingDirection, ViewerSettings};

const RENDER_TIMEOUT: Duration = Duration::from_secs(60);
const POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Parser, Debug)]
#[command(name = "spreadview", version, about = "Render book pages as two-page spreads")]
struct Cli {
    /// Log file path
    #[arg(long, global = true, default_value = "spreadview.log")]
    log_file: PathBuf,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render one spread of a directory of page images to a PNG
    Render {
        /// Directory holding one image file per page
        dir: PathBuf,
        /// Spread index
        #[arg(short, long, default_value_t = 0)]
        index: usize,
        #[arg(long, default_value_t = 1600)]
        width: i32,
        #[arg(long, default_value_t = 1200)]
        height: i32,
        /// Right-to-left reading order
        #[arg(long)]
        reverse: bool,
        /// Show the first page alone
        #[arg(long)]
        single_first: bool,
        /// Pad an unpaired page with a blank one
        #[arg(long)]
        dummy: bool,
        /// Spread size policy: smaller or larger
        #[arg(long)]
        policy: Option<SpreadSizePolicy>,
        /// Fit policy: page, width or height
        #[arg(long)]
        fit: Option<FitPolicy>,
        #[arg(short, long, default_value = "spread.png")]
        out: PathBuf,
    },
    /// Print the page count and how pages pair into spreads
    Info {
        dir: PathBuf,
        #[arg(long)]
        reverse: bool,
        #[arg(long)]
        single_first: bool,
    },
    /// Print the settings file location and its effective contents
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    WriteLogger::init(
        level,
        Config::default(),
        File::create(&cli.log_file)
            .with_context(|| format!("creating log file {}", cli.log_file.display()))?,
    )?;
    panic_handler::initialize_panic_handler();

    info!("Starting spreadview");
    settings::load_settings();
    let base = settings::get_settings();

    let result = match cli.command {
        Command::Render {
            dir,
            index,
            width,
            height,
            reverse,
            single_first,
            dummy,
            policy,
            fit,
            out,
        } => {
            let mut settings = base;
            if reverse {
                settings.reading_direction = ReadingDirection::RightToLeft;
            }
            settings.single_on_first_page |= single_first;
            settings.use_dummy_content |= dummy;
            if let Some(policy) = policy {
                settings.spread_size_policy = policy;
            }
            if let Some(fit) = fit {
                settings.fit_policy = fit;
            }
            render(&settings, &dir, index, Size::new(width, height), &out)
        }
        Command::Info {
            dir,
            reverse,
            single_first,
        } => {
            let mut settings = base;
            if reverse {
                settings.reading_direction = ReadingDirection::RightToLeft;
            }
            settings.single_on_first_page |= single_first;
            print_info(&settings, &dir)
        }
        Command::Config => print_config(&base),
    };

    info!("Shutting down spreadview");
    result
}

fn open_book(settings: &ViewerSettings, dir: &Path) -> Result<Arc<dyn PageContentProvider>> {
    let pages: Arc<dyn PageContentProvider> = Arc::new(
        ImageDirectoryProvider::open(dir)
            .with_context(|| format!("opening page directory {}", dir.display()))?,
    );
    if !settings.double_page {
        return Ok(pages);
    }
    let options = settings.spread_options().context("invalid spread settings")?;
    Ok(Arc::new(SpreadProvider::new(pages, options)))
}

fn render(
    settings: &ViewerSettings,
    dir: &Path,
    index: usize,
    canvas: Size,
    out: &Path,
) -> Result<()> {
    if canvas.is_empty() {
        bail!("canvas must not be empty, got {}x{}", canvas.width, canvas.height);
    }
    let book = open_book(settings, dir)?;
    if index >= book.count() {
        bail!("spread {index} out of range, the book has {}", book.count());
    }

    let config = settings
        .surface_config(canvas)
        .context("invalid surface settings")?;
    let executor: Arc<dyn Executor> = Arc::new(ThreadPoolExecutor::default());
    let mut surface = PageSurface::new(config, executor);
    surface.load_page_content(book, index);

    let started = Instant::now();
    loop {
        surface.poll();
        match surface.state() {
            LoadState::BaseReady => break,
            LoadState::LoadFailed(fault) => bail!("rendering spread {index} failed: {fault}"),
            LoadState::Idle => bail!("surface stopped before rendering spread {index}"),
            LoadState::Loading | LoadState::BaseRendering => {}
        }
        if started.elapsed() > RENDER_TIMEOUT {
            bail!("timed out rendering spread {index}");
        }
        thread::sleep(POLL_INTERVAL);
    }
    debug!("Spread {index} rendered in {:?}", started.elapsed());

    let Some(bitmap) = surface.base_bitmap() else {
        bail!("spread {index} has no bitmap");
    };
    bitmap
        .to_rgba_image()
        .save(out)
        .with_context(|| format!("saving {}", out.display()))?;
    println!(
        "Spread {index}: {}x{} written to {}",
        bitmap.width(),
        bitmap.height(),
        out.display()
    );
    Ok(())
}

fn print_info(settings: &ViewerSettings, dir: &Path) -> Result<()> {
    let pages = Arc::new(
        ImageDirectoryProvider::open(dir)
            .with_context(|| format!("opening page directory {}", dir.display()))?,
    );
    println!("{}: {} pages", dir.display(), pages.count());
    for (i, file) in pages.files().iter().enumerate() {
        let size = pages
            .size_of(i)
            .map(|s| format!("{}x{}", s.width, s.height))
            .unwrap_or_else(|| "unreadable".to_string());
        println!("  page {i}: {} ({size})", file.display());
    }

    let options = settings.spread_options().context("invalid spread settings")?;
    let spreads = SpreadProvider::new(pages, options);
    println!("{} spreads", spreads.count());
    let side = |page: Option<usize>| page.map_or_else(|| "-".to_string(), |p| p.to_string());
    for i in 0..spreads.count() {
        let pair = spreads.page_indices(i);
        println!("  spread {i}: [{} | {}]", side(pair.left), side(pair.right));
    }
    Ok(())
}

fn print_config(settings: &ViewerSettings) -> Result<()> {
    match settings::settings_path() {
        Some(path) => println!("# {}", path.display()),
        None => println!("# no config directory on this platform"),
    }
    print!("{}", settings.to_yaml().context("serializing settings")?);
    Ok(())
}
