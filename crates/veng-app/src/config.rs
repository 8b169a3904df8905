// SPDX-License-Identifier: CEPL-1.0
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};
use veng_platform::WindowConfig;
use veng_render_vk::RendererOptions;

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct WindowCfg {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default)]
    pub monitor: Option<usize>,
}

impl Default for WindowCfg {
    fn default() -> Self {
        WindowCfg {
            title: default_title(),
            width: default_width(),
            height: default_height(),
            monitor: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RenderCfg {
    #[serde(default = "default_validation")]
    pub validation: bool,
    #[serde(default)]
    pub vertex_shader: Option<PathBuf>,
    #[serde(default)]
    pub fragment_shader: Option<PathBuf>,
}

impl Default for RenderCfg {
    fn default() -> Self {
        RenderCfg {
            validation: default_validation(),
            vertex_shader: None,
            fragment_shader: None,
        }
    }
}

fn default_title() -> String {
    WindowConfig::default().title
}
fn default_width() -> u32 {
    WindowConfig::default().width
}
fn default_height() -> u32 {
    WindowConfig::default().height
}
fn default_validation() -> bool {
    cfg!(debug_assertions)
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct AppCfg {
    #[serde(default)]
    pub window: WindowCfg,
    #[serde(default)]
    pub render: RenderCfg,
}

impl AppCfg {
    /// Command-line values win over the file.
    pub fn apply_overrides(&mut self, monitor: Option<usize>, validation: Option<bool>) {
        if monitor.is_some() {
            self.window.monitor = monitor;
        }
        if let Some(v) = validation {
            self.render.validation = v;
        }
    }

    pub fn window_config(&self) -> WindowConfig {
        WindowConfig {
            title: self.window.title.clone(),
            width: self.window.width,
            height: self.window.height,
        }
    }

    pub fn renderer_options(&self) -> RendererOptions {
        let defaults = RendererOptions::default();
        RendererOptions {
            application_name: self.window.title.clone(),
            validation: self.render.validation,
            vertex_shader: self
                .render
                .vertex_shader
                .clone()
                .unwrap_or(defaults.vertex_shader),
            fragment_shader: self
                .render
                .fragment_shader
                .clone()
                .unwrap_or(defaults.fragment_shader),
        }
    }
}

pub fn parse_cfg(text: &str) -> Result<AppCfg, toml::de::Error> {
    toml::from_str::<AppCfg>(text)
}

/// A missing file means defaults; an unreadable or malformed one is logged and ignored.
pub fn load_cfg(path: &Path) -> AppCfg {
    let text = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("no config at {}; using defaults", path.display());
            return AppCfg::default();
        }
        Err(e) => {
            warn!("cannot read {}: {e}; using defaults", path.display());
            return AppCfg::default();
        }
    };

    match parse_cfg(&text) {
        Ok(cfg) => {
            debug!("loaded config from {}", path.display());
            cfg
        }
        Err(e) => {
            warn!("ignoring malformed {}: {e}", path.display());
            AppCfg::default()
        }
    }
}
