use std::path::Path;

use crate::foundation::error::{RenderError, RenderResult};
use crate::render::backend::BackendKind;

/// Environment variable that overrides [`EngineConfig::backend`].
pub const BACKEND_ENV: &str = "VN_RENDER_BACKEND";

/// Largest accepted window edge.
pub const MAX_WINDOW_DIM: u32 = 16_384;

/// Startup values read once and immutable for the life of the process.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub window_width: u32,
    pub window_height: u32,
    /// Seed the back buffer white instead of black.
    pub window_white: bool,
    pub window_title: String,
    /// Language tag; absent means the native (Japanese) messages.
    pub language: Option<String>,
    pub backend: BackendKind,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_width: 640,
            window_height: 480,
            window_white: false,
            window_title: "vn-render".to_owned(),
            language: None,
            backend: BackendKind::Software,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> RenderResult<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| RenderError::config(format!("invalid config json: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load a JSON file, then apply the `VN_RENDER_BACKEND` override.
    #[tracing::instrument]
    pub fn from_json_file(path: &Path) -> RenderResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| RenderError::config(format!("{}: {e}", path.display())))?;
        let cfg = Self::from_json_str(&text)
            .map_err(|e| RenderError::config(format!("{}: {e}", path.display())))?;
        cfg.with_backend_override(std::env::var(BACKEND_ENV).ok().as_deref())
    }

    /// Replace the backend when `value` is set (the value of `VN_RENDER_BACKEND`).
    pub fn with_backend_override(mut self, value: Option<&str>) -> RenderResult<Self> {
        if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
            self.backend = v.parse()?;
            tracing::debug!(backend = %self.backend, "backend overridden from environment");
        }
        Ok(self)
    }

    pub fn validate(&self) -> RenderResult<()> {
        if self.window_width == 0 || self.window_height == 0 {
            return Err(RenderError::config(format!(
                "window size must be non-zero (got {}x{})",
                self.window_width, self.window_height
            )));
        }
        if self.window_width > MAX_WINDOW_DIM || self.window_height > MAX_WINDOW_DIM {
            return Err(RenderError::config(format!(
                "window size {}x{} exceeds {MAX_WINDOW_DIM}",
                self.window_width, self.window_height
            )));
        }
        if self.window_title.trim().is_empty() {
            return Err(RenderError::config("window title must be non-empty"));
        }
        Ok(())
    }

    pub fn language(&self) -> Language {
        Language::from_tag(self.language.as_deref())
    }

    /// Fail when the display cannot hold the window.
    pub fn check_display(&self, screen_width: u32, screen_height: u32) -> RenderResult<()> {
        if screen_width < self.window_width || screen_height < self.window_height {
            return Err(RenderError::config(format!(
                "{} ({screen_width}x{screen_height} < {}x{})",
                self.language().display_too_small(),
                self.window_width,
                self.window_height
            )));
        }
        Ok(())
    }

    /// Offset that centers the window on a fullscreen display.
    pub fn fullscreen_offset(&self, screen_width: u32, screen_height: u32) -> (i32, i32) {
        let center = |screen: u32, window: u32| {
            i32::try_from(screen.saturating_sub(window) / 2).unwrap_or(i32::MAX)
        };
        (
            center(screen_width, self.window_width),
            center(screen_height, self.window_height),
        )
    }
}

/// Message language for user-facing diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Language {
    Japanese,
    English,
}

impl Language {
    /// No tag selects Japanese; any tag selects English.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some(t) if !t.trim().is_empty() => Self::English,
            _ => Self::Japanese,
        }
    }

    pub fn startup_failed(self) -> &'static str {
        match self {
            Self::Japanese => "初期化に失敗しました。",
            Self::English => "Failed to initialize.",
        }
    }

    pub fn display_too_small(self) -> &'static str {
        match self {
            Self::Japanese => "画面のサイズが足りません。",
            Self::English => "The display is too small.",
        }
    }

    pub fn quit_prompt(self) -> &'static str {
        match self {
            Self::Japanese => "終了しますか？",
            Self::English => "Are you sure you want to quit?",
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/config.rs"]
mod tests;
