use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use log::warn;

pub const DEFAULT_THRESHOLD: f32 = 0.85;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    #[default]
    CcoeffNormed,
    CcorrNormed,
    SqdiffNormed,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClickMode {
    #[default]
    Center,
    Random,
}

/// Fractional inset applied to a matched rect before picking a click point.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ClickPadding {
    #[serde(default)]
    pub left: f32,
    #[serde(default)]
    pub right: f32,
    #[serde(default)]
    pub top: f32,
    #[serde(default)]
    pub bottom: f32,
}

/// Search rectangle as fractions of the window size.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct SearchRegion {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default = "one")]
    pub width: f32,
    #[serde(default = "one")]
    pub height: f32,
}

fn one() -> f32 {
    1.0
}

impl SearchRegion {
    /// Absolute pixel rect for a window of the given size.
    pub fn to_absolute(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let x = (self.x * width as f32) as u32;
        let y = (self.y * height as f32) as u32;
        let w = (self.width * width as f32) as u32;
        let h = (self.height * height as f32) as u32;
        (x, y, w, h)
    }
}

#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TemplateDef {
    /// Reference image, absolute or relative to the catalog file's directory.
    pub file: PathBuf,
    /// What this template marks on screen.
    pub desc: Option<String>,
    pub threshold: Option<f32>,
    pub method: Option<MatchMethod>,
    pub search_region: Option<SearchRegion>,
    pub click_mode: Option<ClickMode>,
    pub padding: Option<ClickPadding>,
}

#[derive(Debug, Default)]
pub struct TemplateConfig(pub HashMap<String, TemplateDef>);

impl TemplateConfig {
    /// Re-reads and re-parses the catalog on every call so concurrent edits
    /// are reflected within one automation step. These files are hand
    /// edited; a malformed entry is logged and skipped, it never blocks the
    /// rest of the catalog.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)?;
        let value = toml::from_str::<toml::Table>(&raw)?;
        let dir = path.parent().unwrap_or(Path::new("."));

        let mut templates = HashMap::new();
        let Some(entries) = value.get("templates").and_then(|v| v.as_table()) else {
            return Ok(Self(templates));
        };

        for (key, entry) in entries {
            match entry.clone().try_into::<TemplateDef>() {
                Ok(mut def) => {
                    if def.file.is_relative() {
                        def.file = dir.join(&def.file);
                    }
                    templates.insert(key.clone(), def);
                }
                Err(err) => {
                    warn!("skipping malformed template entry '{key}': {err}");
                }
            }
        }

        Ok(Self(templates))
    }

    pub fn get(&self, key: &str) -> Option<&TemplateDef> {
        self.0.get(key)
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use super::*;

    #[test]
    fn test_region_to_absolute() {
        let region = SearchRegion {
            x: 0.1,
            y: 0.1,
            width: 0.5,
            height: 0.5,
        };
        assert_eq!(region.to_absolute(1000, 800), (100, 80, 500, 400));
    }

    #[test]
    fn test_load_skips_malformed_entries() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("templates.toml"),
            r#"
[templates.ok_button]
file = "images/ok.png"
threshold = 0.9

[templates.broken]
threshold = 0.9
"#,
        )
        .unwrap();

        let config = TemplateConfig::load(dir.path().join("templates.toml")).unwrap();
        assert_eq!(config.0.len(), 1);

        let def = config.get("ok_button").unwrap();
        assert_eq!(def.file, dir.path().join("images/ok.png"));
        assert_eq!(def.threshold, Some(0.9));
        assert!(config.get("broken").is_none());
    }

    #[test]
    fn test_defaults_and_absolute_paths() {
        let dir = tempfile::tempdir().unwrap();
        let absolute = if cfg!(windows) {
            r#"C:\images\save.png"#
        } else {
            "/images/save.png"
        };
        fs::write(
            dir.path().join("templates.toml"),
            format!(
                r#"
[templates.save_button]
file = '{absolute}'
"#
            ),
        )
        .unwrap();

        let config = TemplateConfig::load(dir.path().join("templates.toml")).unwrap();
        let def = config.get("save_button").unwrap();
        // absolute paths stay untouched
        assert_eq!(def.file, PathBuf::from(absolute));
        assert_eq!(def.method.unwrap_or_default(), MatchMethod::CcoeffNormed);
        assert_eq!(def.click_mode.unwrap_or_default(), ClickMode::Center);
        assert_eq!(def.threshold.unwrap_or(DEFAULT_THRESHOLD), DEFAULT_THRESHOLD);
    }

    #[test]
    fn test_missing_catalog_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = TemplateConfig::load(dir.path().join("missing.toml")).unwrap();
        assert!(config.0.is_empty());
    }

    #[test]
    fn test_full_entry_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("templates.toml"),
            r#"
[templates.log_button]
file = "images/log_button.png"
desc = "log panel toggle"
threshold = 0.8
method = "sqdiff_normed"
search_region = { x = 0.0, y = 0.5, width = 1.0, height = 0.5 }
click_mode = "random"
padding = { left = 0.1, right = 0.1 }
"#,
        )
        .unwrap();

        let config = TemplateConfig::load(dir.path().join("templates.toml")).unwrap();
        let def = config.get("log_button").unwrap();
        assert_eq!(def.method, Some(MatchMethod::SqdiffNormed));
        assert_eq!(def.click_mode, Some(ClickMode::Random));
        let padding = def.padding.unwrap();
        assert_eq!(padding.left, 0.1);
        assert_eq!(padding.bottom, 0.0);
        let region = def.search_region.unwrap();
        assert_eq!(region.to_absolute(200, 100), (0, 50, 200, 50));
    }
}
