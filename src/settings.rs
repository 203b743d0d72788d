use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, PoisonError, RwLock};

use crate::error::ConfigError;
use crate::page::{Color, FitPolicy, Size, SpreadOptions, SpreadSizePolicy};
use crate::render::SurfaceConfig;
use crate::viewport::{FlingThresholds, LayoutMode, ViewportConfig};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "spreadview";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReadingDirection {
    #[default]
    LeftToRight,
    RightToLeft,
}

impl ReadingDirection {
    pub fn is_reverse(self) -> bool {
        self == ReadingDirection::RightToLeft
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerSettings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub reading_direction: ReadingDirection,

    #[serde(default)]
    pub layout_mode: LayoutMode,

    #[serde(default)]
    pub sliding_enabled: bool,

    #[serde(default = "default_true")]
    pub double_tap_zoom: bool,

    #[serde(default)]
    pub keep_scroll_offset: bool,

    #[serde(default = "default_fling_distance")]
    pub fling_distance_threshold: i32,

    #[serde(default = "default_fling_velocity")]
    pub fling_velocity_threshold: i32,

    #[serde(default)]
    pub page_gap: i32,

    /// Background behind and between pages, "#RRGGBB"
    #[serde(default = "default_paper_color")]
    pub paper_color: String,

    #[serde(default)]
    pub fit_policy: FitPolicy,

    #[serde(default)]
    pub spread_size_policy: SpreadSizePolicy,

    #[serde(default)]
    pub single_on_first_page: bool,

    #[serde(default)]
    pub use_dummy_content: bool,

    /// Pair pages into two-page spreads
    #[serde(default = "default_true")]
    pub double_page: bool,
}

fn default_true() -> bool {
    true
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_fling_distance() -> i32 {
    FlingThresholds::default().distance
}

fn default_fling_velocity() -> i32 {
    FlingThresholds::default().velocity
}

fn default_paper_color() -> String {
    Color::WHITE.to_hex()
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            reading_direction: ReadingDirection::default(),
            layout_mode: LayoutMode::default(),
            sliding_enabled: false,
            double_tap_zoom: true,
            keep_scroll_offset: false,
            fling_distance_threshold: default_fling_distance(),
            fling_velocity_threshold: default_fling_velocity(),
            page_gap: 0,
            paper_color: default_paper_color(),
            fit_policy: FitPolicy::default(),
            spread_size_policy: SpreadSizePolicy::default(),
            single_on_first_page: false,
            use_dummy_content: false,
            double_page: true,
        }
    }
}

impl ViewerSettings {
    /// Check every value before anything is built from these settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.viewport_config()?;
        self.paper()?;
        Ok(())
    }

    pub fn paper(&self) -> Result<Color, ConfigError> {
        Color::from_hex(&self.paper_color)
    }

    pub fn viewport_config(&self) -> Result<ViewportConfig, ConfigError> {
        let config = ViewportConfig {
            layout: self.layout_mode,
            reverse: self.reading_direction.is_reverse(),
            sliding_enabled: self.sliding_enabled,
            double_tap_zoom: self.double_tap_zoom,
            keep_scroll_offset: self.keep_scroll_offset,
            fling: FlingThresholds {
                distance: self.fling_distance_threshold,
                velocity: self.fling_velocity_threshold,
            },
            page_gap: self.page_gap,
            flexible_content_size: false,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn spread_options(&self) -> Result<SpreadOptions, ConfigError> {
        Ok(SpreadOptions {
            reverse: self.reading_direction.is_reverse(),
            single_on_first_page: self.single_on_first_page,
            use_dummy_content: self.use_dummy_content,
            size_policy: self.spread_size_policy,
            paper_color: self.paper()?,
        })
    }

    pub fn surface_config(&self, canvas: Size) -> Result<SurfaceConfig, ConfigError> {
        Ok(SurfaceConfig {
            canvas,
            paper_color: self.paper()?,
            fit_policy: self.fit_policy,
        })
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(format!("{SETTINGS_HEADER}{}", serde_yaml::to_string(self)?))
    }
}

const SETTINGS_HEADER: &str = r##"# spreadview settings
#
# reading_direction: left_to_right | right_to_left
# layout_mode: paged | scroll
# fit_policy: page | width | height
# spread_size_policy: smaller_fit | larger_fit
# paper_color: "#RRGGBB"

"##;

static SETTINGS: LazyLock<RwLock<ViewerSettings>> =
    LazyLock::new(|| RwLock::new(ViewerSettings::default()));

/// Where the settings file lives
pub fn settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Load the settings file into the global settings, writing defaults when missing
pub fn load_settings() {
    let Some(path) = settings_path() else {
        warn!("Could not determine config directory, using default settings");
        return;
    };
    if path.exists() {
        match load_from_path(&path) {
            Ok(settings) => set_settings(settings),
            Err(e) => error!("Failed to load settings file {path:?}: {e}"),
        }
    } else {
        info!("Settings file not found, creating with defaults at {path:?}");
        if let Err(e) = save_to_path(&get_settings(), &path) {
            error!("{e}");
        }
    }
}

/// Read, migrate and validate a settings file
pub fn load_from_path(path: &Path) -> Result<ViewerSettings, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut settings: ViewerSettings = serde_yaml::from_str(&content)?;
    debug!("Loaded settings from {path:?}");

    if settings.version < CURRENT_VERSION {
        migrate_settings(&mut settings);
        save_to_path(&settings, path)?;
    }
    settings.validate()?;
    Ok(settings)
}

fn migrate_settings(settings: &mut ViewerSettings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );
    settings.version = CURRENT_VERSION;
}

pub fn save_settings() {
    let Some(path) = settings_path() else {
        warn!("Could not determine config directory, cannot save settings");
        return;
    };
    if let Err(e) = save_to_path(&get_settings(), &path) {
        error!("{e}");
    }
}

pub fn save_to_path(settings: &ViewerSettings, path: &Path) -> Result<(), ConfigError> {
    let io_error = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
    }
    fs::write(path, settings.to_yaml()?).map_err(io_error)?;
    debug!("Saved settings to {path:?}");
    Ok(())
}

pub fn get_settings() -> ViewerSettings {
    SETTINGS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

pub fn set_settings(settings: ViewerSettings) {
    *SETTINGS.write().unwrap_or_else(PoisonError::into_inner) = settings;
}

/// Change the global settings in place and persist them
pub fn update_settings(change: impl FnOnce(&mut ViewerSettings)) {
    {
        let mut settings = SETTINGS.write().unwrap_or_else(PoisonError::into_inner);
        change(&mut settings);
    }
    save_settings();
}
