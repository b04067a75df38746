use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::history::MAX_HISTORY;
use crate::markup::escape_html;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(anyhow!("unknown theme {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Text shown in the single paragraph of a fresh document.
    pub placeholder: String,
    pub auto_save: bool,
    pub auto_save_interval_ms: u64,
    /// Quiet period after the last edit before a history snapshot is taken.
    pub snapshot_debounce_ms: u64,
    pub max_history: usize,
    /// Overrides the stored theme preference when set.
    pub theme: Option<Theme>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            placeholder: "Start typing your document here...".to_string(),
            auto_save: true,
            auto_save_interval_ms: 30_000,
            snapshot_debounce_ms: 1_000,
            max_history: MAX_HISTORY,
            theme: None,
        }
    }
}

impl EditorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        toml::from_str(&raw).with_context(|| format!("failed to parse config file {:?}", path))
    }

    /// Loads `path` when it exists, otherwise returns the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn placeholder_markup(&self) -> String {
        format!("<p>{}</p>", escape_html(&self.placeholder))
    }

    pub fn auto_save_interval(&self) -> Duration {
        Duration::from_millis(self.auto_save_interval_ms)
    }

    pub fn snapshot_debounce(&self) -> Duration {
        Duration::from_millis(self.snapshot_debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    #[test]
    fn partial_config_keeps_defaults_for_missing_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "snapshot_debounce_ms = 250\ntheme = \"dark\"\n").unwrap();

        let config = EditorConfig::load(&path).unwrap();
        assert_eq!(config.snapshot_debounce(), Duration::from_millis(250));
        assert_eq!(config.theme, Some(Theme::Dark));
        assert_eq!(config.max_history, MAX_HISTORY);
        assert!(config.auto_save);
    }

    #[test]
    fn missing_config_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = EditorConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, EditorConfig::default());
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_history = \"lots\"").unwrap();
        assert!(EditorConfig::load(&path).is_err());
    }

    #[test]
    fn placeholder_markup_wraps_escaped_text() {
        let config = EditorConfig {
            placeholder: "Type <here>".to_string(),
            ..EditorConfig::default()
        };
        assert_eq!(config.placeholder_markup(), "<p>Type &lt;here&gt;</p>");
    }

    #[test]
    fn theme_toggles_and_parses() {
        assert_eq!(Theme::Light.toggled(), Theme::Dark);
        assert_eq!("dark".parse::<Theme>().unwrap(), Theme::Dark);
        assert!("blue".parse::<Theme>().is_err());
    }
}
