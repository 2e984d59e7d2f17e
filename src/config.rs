use crate::error::{Result, UiError};
use crate::style::Color;
use serde::{Deserialize, Deserializer};
use smol_str::SmolStr;
use std::path::Path;

/// Every tunable constant the toolkit core reads. Passed explicitly to the
/// components that need it; there is no global instance.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ToolkitConfig {
    pub text: TextDefaults,
    pub menu: MenuMetrics,
    pub dropdown: DropdownMetrics,
    pub tabs: TabMetrics,
    pub entry: EntryMetrics,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TextDefaults {
    pub font_family: SmolStr,
    pub fallback_family: SmolStr,
    pub font_size: f32,
    #[serde(deserialize_with = "deserialize_color")]
    pub color: Color,
}

impl Default for TextDefaults {
    fn default() -> Self {
        Self {
            font_family: SmolStr::new_static("Inter"),
            fallback_family: SmolStr::new_static("sans-serif"),
            font_size: 14.0,
            color: Color::rgb(0x11, 0x11, 0x11),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MenuMetrics {
    pub item_height: f32,
    pub separator_height: f32,
    pub min_width: f32,
    pub horizontal_padding: f32,
    pub checkmark_column: f32,
    pub icon_column: f32,
    pub shortcut_gap: f32,
    pub submenu_arrow_column: f32,
    pub window_margin: f32,
    pub submenu_overlap: f32,
    pub font_size: f32,
    pub corner_radius: f32,
    #[serde(deserialize_with = "deserialize_color")]
    pub background: Color,
    #[serde(deserialize_with = "deserialize_color")]
    pub hover_background: Color,
    #[serde(deserialize_with = "deserialize_color")]
    pub text_color: Color,
    #[serde(deserialize_with = "deserialize_color")]
    pub disabled_text_color: Color,
    #[serde(deserialize_with = "deserialize_color")]
    pub separator_color: Color,
}

impl Default for MenuMetrics {
    fn default() -> Self {
        Self {
            item_height: 32.0,
            separator_height: 9.0,
            min_width: 160.0,
            horizontal_padding: 12.0,
            checkmark_column: 20.0,
            icon_column: 24.0,
            shortcut_gap: 24.0,
            submenu_arrow_column: 16.0,
            window_margin: 4.0,
            submenu_overlap: 4.0,
            font_size: 14.0,
            corner_radius: 6.0,
            background: Color::WHITE,
            hover_background: Color::rgb(0xE8, 0xF0, 0xFE),
            text_color: Color::rgb(0x11, 0x18, 0x27),
            disabled_text_color: Color::rgb(0x9C, 0xA3, 0xAF),
            separator_color: Color::rgb(0xE5, 0xE7, 0xEB),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DropdownMetrics {
    pub item_height: f32,
    pub max_height: f32,
    pub horizontal_padding: f32,
    pub arrow_column: f32,
    pub window_margin: f32,
}

impl Default for DropdownMetrics {
    fn default() -> Self {
        Self {
            item_height: 32.0,
            max_height: 300.0,
            horizontal_padding: 12.0,
            arrow_column: 24.0,
            window_margin: 4.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TabMetrics {
    pub header_padding_x: f32,
    pub header_padding_y: f32,
    pub header_spacing: f32,
    pub min_header_extent: f32,
    pub indicator_thickness: f32,
}

impl Default for TabMetrics {
    fn default() -> Self {
        Self {
            header_padding_x: 16.0,
            header_padding_y: 8.0,
            header_spacing: 2.0,
            min_header_extent: 48.0,
            indicator_thickness: 2.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EntryMetrics {
    pub padding_x: f32,
    pub padding_y: f32,
    pub caret_width: f32,
}

impl Default for EntryMetrics {
    fn default() -> Self {
        Self {
            padding_x: 8.0,
            padding_y: 6.0,
            caret_width: 1.0,
        }
    }
}

impl ToolkitConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| UiError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Like [`ToolkitConfig::from_path`], but a missing or invalid file
    /// yields the defaults.
    pub fn from_path_or_default(path: impl AsRef<Path>) -> Self {
        match Self::from_path(path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(%err, "using default toolkit configuration");
                Self::default()
            }
        }
    }

    /// Applies `TRELLIS_DEFAULT_FONT` and `TRELLIS_FONT_SIZE` when present.
    /// Unparseable values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(family) = std::env::var("TRELLIS_DEFAULT_FONT") {
            let family = family.trim();
            if !family.is_empty() {
                self.text.font_family = SmolStr::new(family);
            }
        }
        if let Ok(raw) = std::env::var("TRELLIS_FONT_SIZE") {
            match raw.trim().parse::<f32>() {
                Ok(size) if size > 0.0 => self.text.font_size = size,
                _ => tracing::warn!(value = %raw, "ignoring invalid TRELLIS_FONT_SIZE"),
            }
        }
        self
    }
}

fn deserialize_color<'de, D>(deserializer: D) -> std::result::Result<Color, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let parsed = crate::style::HexColor::new(raw.as_str());
    if !parsed.is_valid() {
        return Err(serde::de::Error::custom(format!(
            "expected #rgb, #rgba, #rrggbb or #rrggbbaa, got `{raw}`"
        )));
    }
    Ok(parsed.color())
}

#[cfg(test)]
mod tests {
    use super::ToolkitConfig;
    use crate::error::UiError;
    use crate::style::Color;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = ToolkitConfig::from_json_str(r##"{ "menu": { "item_height": 28 } }"##)
            .expect("valid config");
        assert_eq!(config.menu.item_height, 28.0);
        assert_eq!(config.menu.window_margin, 4.0);
        assert_eq!(config.dropdown.max_height, 300.0);
    }

    #[test]
    fn colors_parse_from_hex() {
        let config = ToolkitConfig::from_json_str(r##"{ "text": { "color": "#ff0000" } }"##)
            .expect("valid config");
        assert_eq!(config.text.color, Color::rgb(255, 0, 0));
    }

    #[test]
    fn bad_color_is_a_config_error() {
        let err = ToolkitConfig::from_json_str(r##"{ "text": { "color": "red" } }"##)
            .expect_err("color must be hex");
        assert!(matches!(err, UiError::Config(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ToolkitConfig::from_path("/definitely/not/here.json").expect_err("no file");
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }

    struct EnvGuard(&'static [&'static str]);

    impl EnvGuard {
        fn set(&self, key: &str, value: &str) {
            // SAFETY: only this test reads or writes the TRELLIS_* variables.
            unsafe { std::env::set_var(key, value) };
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for key in self.0 {
                // SAFETY: see `EnvGuard::set`.
                unsafe { std::env::remove_var(key) };
            }
        }
    }

    #[test]
    fn env_overrides_apply_only_valid_values() {
        let env = EnvGuard(&["TRELLIS_FONT_SIZE", "TRELLIS_DEFAULT_FONT"]);
        let defaults = ToolkitConfig::default();

        env.set("TRELLIS_FONT_SIZE", "18");
        assert_eq!(ToolkitConfig::default().with_env_overrides().text.font_size, 18.0);

        for invalid in ["abc", "-1", "0", ""] {
            env.set("TRELLIS_FONT_SIZE", invalid);
            let config = ToolkitConfig::default().with_env_overrides();
            assert_eq!(config.text.font_size, defaults.text.font_size, "{invalid:?}");
        }

        env.set("TRELLIS_DEFAULT_FONT", "   ");
        let config = ToolkitConfig::default().with_env_overrides();
        assert_eq!(config.text.font_family, defaults.text.font_family);

        env.set("TRELLIS_DEFAULT_FONT", " Fira Sans ");
        let config = ToolkitConfig::default().with_env_overrides();
        assert_eq!(config.text.font_family, "Fira Sans");
    }

    #[test]
    fn lenient_loader_falls_back_to_defaults() {
        let config = ToolkitConfig::from_path_or_default("/definitely/not/here.json");
        assert_eq!(config.dropdown.item_height, 32.0);
    }
}
