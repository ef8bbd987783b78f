// SPDX-License-Identifier: MIT
//
// Runtime configuration.
//
// Everything the runtime decides at startup: frame rate, which terminal
// modes to switch on, queue sizing, and the knobs that reach down into the
// terminal layer (diff merge gap, paste tab width, synchronized output).
//
// A `RuntimeConfig` can be built in code with the `with_*` methods or read
// from TOML. Missing keys take their defaults, so an empty file is a valid
// config:
//
//   fps = 30
//   mouse = true
//   tab_width = 8

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use weft_term::ansi::MouseMode;
use weft_term::terminal::Mode;

/// Highest accepted tick rate.
pub const MAX_FPS: u32 = 240;

/// Smallest accepted event queue. One slot for a tick plus one for
/// everything else.
pub const MIN_QUEUE_CAPACITY: usize = 2;

// ─── ConfigError ────────────────────────────────────────────────────────────

/// Why a configuration could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config syntax: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ─── RuntimeConfig ──────────────────────────────────────────────────────────

/// Startup configuration for a [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Tick events per second. 0 disables ticks.
    pub fps: u32,
    /// Render on the alternate screen, leaving scrollback untouched.
    pub alt_screen: bool,
    /// Hide the hardware cursor in frames that do not place it.
    pub hide_cursor: bool,
    /// Report mouse presses, releases and wheel turns.
    pub mouse: bool,
    /// Also report motion while a button is held. Implies `mouse`.
    pub mouse_motion: bool,
    /// Deliver pastes as one event instead of a burst of keys.
    pub bracketed_paste: bool,
    /// Report terminal focus changes.
    pub focus_reporting: bool,
    /// Tab stop width for pasted text. 0 keeps tabs as-is.
    pub tab_width: u8,
    /// Capacity of the event queue between producers and the loop.
    pub queue_capacity: usize,
    /// Unchanged cells the diff may rewrite to join two changed spans.
    pub merge_gap: u16,
    /// Whether Ctrl-C ends the loop before the application sees it.
    pub ctrl_c_quits: bool,
    /// Wrap each frame in synchronized output (DEC 2026).
    pub sync_output: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            fps: 60,
            alt_screen: true,
            hide_cursor: true,
            mouse: false,
            mouse_motion: false,
            bracketed_paste: true,
            focus_reporting: false,
            tab_width: 4,
            queue_capacity: 256,
            merge_gap: weft_term::diff::DEFAULT_MERGE_GAP,
            ctrl_c_quits: true,
            sync_output: true,
        }
    }
}

impl RuntimeConfig {
    /// Parse and validate TOML text.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for bad syntax or unknown keys,
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        log::info!("config: loaded {}", path.display());
        Ok(config)
    }

    /// Serialize back to TOML.
    ///
    /// # Errors
    ///
    /// Only fails if `toml` cannot represent a value, which does not happen
    /// for the field types used here.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fps > MAX_FPS {
            return Err(ConfigError::Invalid(format!(
                "fps must be at most {MAX_FPS}, got {}",
                self.fps
            )));
        }
        if self.queue_capacity < MIN_QUEUE_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "queue_capacity must be at least {MIN_QUEUE_CAPACITY}, got {}",
                self.queue_capacity
            )));
        }
        Ok(())
    }

    /// Time between ticks, or `None` when ticks are disabled.
    #[must_use]
    pub fn tick_interval(&self) -> Option<Duration> {
        (self.fps > 0).then(|| Duration::from_secs(1) / self.fps)
    }

    /// Terminal modes to switch on, in the order to switch them on.
    ///
    /// Raw mode always comes first so it is the last thing undone.
    #[must_use]
    pub fn modes(&self) -> Vec<Mode> {
        let mut modes = vec![Mode::Raw];
        if self.alt_screen {
            modes.push(Mode::AltScreen);
        }
        if self.hide_cursor {
            modes.push(Mode::HideCursor);
        }
        if self.mouse_motion {
            modes.push(Mode::Mouse(MouseMode::Drag));
        } else if self.mouse {
            modes.push(Mode::Mouse(MouseMode::Click));
        }
        if self.bracketed_paste {
            modes.push(Mode::BracketedPaste);
        }
        if self.focus_reporting {
            modes.push(Mode::FocusReporting);
        }
        modes
    }

    // ── Builders ──────────────────────────────────────────────────────

    #[must_use]
    pub const fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    #[must_use]
    pub const fn with_alt_screen(mut self, on: bool) -> Self {
        self.alt_screen = on;
        self
    }

    #[must_use]
    pub const fn with_hide_cursor(mut self, on: bool) -> Self {
        self.hide_cursor = on;
        self
    }

    #[must_use]
    pub const fn with_mouse(mut self, on: bool) -> Self {
        self.mouse = on;
        self
    }

    #[must_use]
    pub const fn with_mouse_motion(mut self, on: bool) -> Self {
        self.mouse_motion = on;
        self
    }

    #[must_use]
    pub const fn with_bracketed_paste(mut self, on: bool) -> Self {
        self.bracketed_paste = on;
        self
    }

    #[must_use]
    pub const fn with_focus_reporting(mut self, on: bool) -> Self {
        self.focus_reporting = on;
        self
    }

    #[must_use]
    pub const fn with_tab_width(mut self, width: u8) -> Self {
        self.tab_width = width;
        self
    }

    #[must_use]
    pub const fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    #[must_use]
    pub const fn with_merge_gap(mut self, gap: u16) -> Self {
        self.merge_gap = gap;
        self
    }

    #[must_use]
    pub const fn with_ctrl_c_quits(mut self, on: bool) -> Self {
        self.ctrl_c_quits = on;
        self
    }

    #[must_use]
    pub const fn with_sync_output(mut self, on: bool) -> Self {
        self.sync_output = on;
        self
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
