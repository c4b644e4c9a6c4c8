use crate::engine::{EngineOptions, HintEntry, InferenceTables, TaskEntry};
use ratatui::style::Color;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Project-relative location of the event log
pub const EVENTS_FILE: &str = ".kracked/runtime/events.jsonl";

/// Project-relative location of the roster
pub const ROSTER_FILE: &str = ".kracked/config/agents.json";

/// Project-relative location of the persisted reconciler state
pub const STATE_FILE: &str = ".kracked/runtime/observer-state.json";

/// Project-relative location of the observer config
pub const PROJECT_CONFIG_FILE: &str = ".kracked/config/observer.toml";

/// Files of one KD project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    root: PathBuf,
    events: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let events = root.join(EVENTS_FILE);
        Self { root, events }
    }

    /// Read the log from somewhere other than `.kracked/runtime`
    #[must_use]
    pub fn with_events(mut self, events: Option<PathBuf>) -> Self {
        if let Some(events) = events {
            self.events = if events.is_absolute() {
                events
            } else {
                self.root.join(events)
            };
        }
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn events(&self) -> &Path {
        &self.events
    }

    pub fn roster(&self) -> PathBuf {
        self.root.join(ROSTER_FILE)
    }

    pub fn state_file(&self) -> PathBuf {
        self.root.join(STATE_FILE)
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(PROJECT_CONFIG_FILE)
    }
}

/// Observer configuration loaded from file
///
/// Every field has a default, so an empty or partial file is valid.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct KdConfig {
    #[serde(default)]
    pub observer: ObserverConfig,

    #[serde(default)]
    pub web: WebConfig,

    #[serde(default)]
    pub inference: InferenceConfig,
}

/// `[observer]`: terminal observer defaults
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ObserverConfig {
    /// Poll interval in milliseconds
    #[serde(default = "default_observer_interval")]
    pub interval_ms: u64,

    /// Recent events shown
    #[serde(default = "default_observer_max_events")]
    pub max_events: usize,

    /// Raw log lines considered per poll
    #[serde(default = "default_observer_max_history")]
    pub max_history: usize,

    /// Desktop notification when a delegate appears
    #[serde(default)]
    pub notify: bool,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_observer_interval(),
            max_events: default_observer_max_events(),
            max_history: default_observer_max_history(),
            notify: false,
        }
    }
}

fn default_observer_interval() -> u64 {
    1000
}

fn default_observer_max_events() -> usize {
    12
}

fn default_observer_max_history() -> usize {
    250
}

impl ObserverConfig {
    /// Read windows for the terminal observer and `kd snapshot`
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            max_history: self.max_history,
            max_events: self.max_events,
        }
        .with_overrides(None, None)
    }
}

/// `[web]`: web observer defaults
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct WebConfig {
    #[serde(default = "default_web_port")]
    pub port: u16,

    /// Extra ports tried after `port` when it is taken
    #[serde(default = "default_port_retries")]
    pub port_retries: u16,

    /// Server-side poll interval in milliseconds
    #[serde(default = "default_web_interval")]
    pub interval_ms: u64,

    #[serde(default = "default_web_max_events")]
    pub max_events: usize,

    #[serde(default = "default_web_max_history")]
    pub max_history: usize,

    /// Notifications kept for `/api/notifications`
    #[serde(default = "default_notification_buffer")]
    pub notification_buffer: usize,

    /// Launch the browser once bound
    #[serde(default)]
    pub open: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: default_web_port(),
            port_retries: default_port_retries(),
            interval_ms: default_web_interval(),
            max_events: default_web_max_events(),
            max_history: default_web_max_history(),
            notification_buffer: default_notification_buffer(),
            open: false,
        }
    }
}

impl WebConfig {
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            max_history: self.max_history,
            max_events: self.max_events,
        }
        .with_overrides(None, None)
    }
}

fn default_web_port() -> u16 {
    4892
}

fn default_port_retries() -> u16 {
    10
}

fn default_web_interval() -> u64 {
    1200
}

fn default_web_max_events() -> usize {
    80
}

fn default_web_max_history() -> usize {
    1200
}

fn default_notification_buffer() -> usize {
    256
}

/// `[[inference.task]]` / `[[inference.hint]]` table overrides
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct InferenceConfig {
    #[serde(default)]
    pub task: Vec<TaskEntry>,

    #[serde(default)]
    pub hint: Vec<HintEntry>,
}

impl InferenceConfig {
    pub fn tables(&self) -> InferenceTables {
        InferenceTables::from_entries(self.task.clone(), self.hint.clone())
    }
}

impl KdConfig {
    /// Load the project config, falling back to the user config, then defaults
    pub fn load(paths: &ProjectPaths) -> Self {
        let project = paths.config_file();
        if project.exists() {
            return Self::load_from_path(&project);
        }
        Self::load_from_path(&Self::user_path())
    }

    /// `~/.config/kd-observer/config.toml` (platform equivalent)
    pub fn user_path() -> PathBuf {
        directories::BaseDirs::new().map_or_else(
            || PathBuf::from("~/.config/kd-observer/config.toml"),
            |dirs| dirs.config_dir().join("kd-observer").join("config.toml"),
        )
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse config file: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config file: {}, using defaults", e);
                Self::default()
            }
        }
    }
}

/// Terminal palette
pub mod colors {
    use super::Color;

    pub const BG: Color = Color::Rgb(3, 8, 6); // #030806
    pub const FG: Color = Color::Rgb(216, 255, 233); // #d8ffe9
    pub const MUTED: Color = Color::Rgb(124, 181, 154); // #7cb59a
    pub const BORDER: Color = Color::Rgb(15, 112, 64); // #0f7040
    pub const ACCENT: Color = Color::Rgb(28, 255, 138); // #1cff8a
    pub const ACTIVE: Color = Color::Rgb(134, 245, 176); // #86f5b0
    pub const WAITING: Color = Color::Rgb(255, 215, 107); // #ffd76b
    pub const INFERRED: Color = Color::Rgb(135, 184, 255); // #87b8ff
    pub const OFFLINE: Color = Color::Rgb(255, 107, 107); // #ff6b6b
}
