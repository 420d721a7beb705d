//! Editor configuration. Loaded the same way as `SyncConfig`: defaults,
//! then an optional JSON file, then environment overrides for the sync part.

use crate::tools::ToolSettings;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tc_render::Surface;
use tc_sync::SyncConfig;
use tc_sync::config::ConfigError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub sync: SyncConfig,
    /// Trailing delay before a pan/zoom/rotate change is committed.
    pub view_debounce_ms: u64,
    /// Re-run reconciliation when a pushed snapshot disagrees with the
    /// active scene.
    pub resync_on_push: bool,
    pub canvas_width: f64,
    pub canvas_height: f64,
    pub handle_radius: f64,
    pub token_radius: f64,
    pub eraser_radius: f64,
    pub brush_color: String,
    pub brush_width: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        let tools = ToolSettings::default();
        Self {
            sync: SyncConfig::default(),
            view_debounce_ms: 250,
            resync_on_push: true,
            canvas_width: 1280.0,
            canvas_height: 720.0,
            handle_radius: tools.handle_radius,
            token_radius: tools.token_radius,
            eraser_radius: tools.eraser_radius,
            brush_color: tools.brush_color,
            brush_width: tools.brush_width,
        }
    }
}

impl EditorConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn with_env(mut self) -> Self {
        self.sync = self.sync.with_env();
        self
    }

    pub fn view_debounce(&self) -> Duration {
        Duration::from_millis(self.view_debounce_ms)
    }

    pub fn surface(&self) -> Surface {
        Surface::new(self.canvas_width, self.canvas_height)
    }

    pub fn tool_settings(&self) -> ToolSettings {
        ToolSettings {
            handle_radius: self.handle_radius,
            token_radius: self.token_radius,
            eraser_radius: self.eraser_radius,
            brush_color: self.brush_color.clone(),
            brush_width: self.brush_width,
            ..ToolSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_sync_section_parses() {
        let cfg: EditorConfig = serde_json::from_str(
            r##"{"sync": {"server": "http://dm.local:8000"}, "view_debounce_ms": 100, "brush_color": "#00ff00"}"##,
        )
        .unwrap();
        assert_eq!(cfg.sync.server, "http://dm.local:8000");
        assert_eq!(cfg.sync.reconnect_after_close_ms, 1500);
        assert_eq!(cfg.view_debounce(), Duration::from_millis(100));
        assert_eq!(cfg.tool_settings().brush_color, "#00ff00");
        assert!(cfg.resync_on_push);
    }
}
