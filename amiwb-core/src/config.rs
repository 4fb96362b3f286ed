//! Configuration file parsing (spec.md SS6 "Configuration").
//!
//! `amiwbrc` and `toolsdaemonrc` are small line-oriented formats, not
//! TOML/JSON, so there's no natural serde-adjacent crate in the teacher's
//! stack for them (noted in DESIGN.md). Parsed with the same small
//! hand-written free-function style the teacher uses for its own parsing
//! helpers (`window.rs`'s `translate_pos`/`translate_shape`): read the file,
//! split lines, match on shape, return a plain struct.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;

use tracing::{debug, warn};

/// Frame scheduling strategy (spec.md SS4.C "Frame scheduling").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    OnDemand,
    Continuous,
}

impl Default for RenderMode {
    fn default() -> Self {
        RenderMode::OnDemand
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    InvalidFps(String),
    InvalidRenderMode(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "{}", err),
            ConfigError::InvalidFps(v) => write!(f, "fps must be an integer 1..=240, got {:?}", v),
            ConfigError::InvalidRenderMode(v) => write!(f, "render mode must be on-demand|continuous, got {:?}", v),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

/// Parsed contents of `amiwbrc` (spec.md SS6).
#[derive(Debug, Clone)]
pub struct Config {
    pub wallpaper_desktop: Option<PathBuf>,
    pub wallpaper_windows: Option<PathBuf>,
    pub fps: u32,
    pub render_mode: RenderMode,
    pub log_cap_bytes: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self { wallpaper_desktop: None, wallpaper_windows: None, fps: 120, render_mode: RenderMode::OnDemand, log_cap_bytes: Some(5 * 1024 * 1024) }
    }
}

impl Config {
    /// Loads `$HOME/.config/amiwb/amiwbrc`, falling back to
    /// `/usr/local/share/amiwb/amiwbrc`, and finally compiled-in defaults
    /// if neither exists (spec.md SS6, SS7 "Defaults apply when the file or
    /// a key is absent").
    pub fn load() -> Self {
        let path = Self::config_path();
        match path.and_then(|p| fs::read_to_string(&p).ok().map(|s| (p, s))) {
            Some((path, text)) => match parse_amiwbrc(&text) {
                Ok(cfg) => {
                    debug!("config: loaded {}", path.display());
                    cfg
                },
                Err(err) => {
                    warn!("config: {} invalid ({}), using defaults", path.display(), err);
                    Config::default()
                },
            },
            None => {
                debug!("config: no amiwbrc found, using defaults");
                Config::default()
            },
        }
    }

    fn config_path() -> Option<PathBuf> {
        if let Some(home) = std::env::var_os("HOME") {
            let user_path = PathBuf::from(home).join(".config/amiwb/amiwbrc");
            if user_path.exists() {
                return Some(user_path);
            }
        }
        let fallback = PathBuf::from("/usr/local/share/amiwb/amiwbrc");
        if fallback.exists() {
            return Some(fallback);
        }
        None
    }
}

fn parse_amiwbrc(text: &str) -> Result<Config, ConfigError> {
    let mut cfg = Config::default();
    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else { continue };
        let (key, value) = (key.trim(), value.trim().trim_matches('"'));
        match key {
            "wallpaper_desktop" => cfg.wallpaper_desktop = Some(PathBuf::from(value)),
            "wallpaper_windows" => cfg.wallpaper_windows = Some(PathBuf::from(value)),
            "fps" => {
                let fps: u32 = value.parse().map_err(|_| ConfigError::InvalidFps(value.to_string()))?;
                if fps < 1 || fps > 240 {
                    return Err(ConfigError::InvalidFps(value.to_string()));
                }
                cfg.fps = fps;
            },
            "render_mode" => {
                cfg.render_mode = match value {
                    "on-demand" => RenderMode::OnDemand,
                    "continuous" => RenderMode::Continuous,
                    _ => return Err(ConfigError::InvalidRenderMode(value.to_string())),
                };
            },
            "log_cap_bytes" => {
                cfg.log_cap_bytes = value.parse().ok();
            },
            _ => warn!("config: unknown key {:?}, ignoring", key),
        }
    }
    Ok(cfg)
}

/// A single entry of a user-defined custom menu (spec.md SS4.F "custom
/// menus loaded from config").
#[derive(Debug, Clone)]
pub struct CustomMenuItem {
    pub label: String,
    pub command: String,
}

/// Parsed contents of `toolsdaemonrc`: `[Name]` sections, each a list of
/// `"Label" = "shell command"` entries (spec.md SS6).
#[derive(Debug, Clone, Default)]
pub struct CustomMenus {
    pub menus: HashMap<String, Vec<CustomMenuItem>>,
}

impl CustomMenus {
    pub fn load() -> Self {
        let path = std::env::var_os("HOME")
            .map(PathBuf::from)
            .map(|home| home.join(".config/amiwb/toolsdaemonrc"));
        match path.and_then(|p| fs::read_to_string(&p).ok()) {
            Some(text) => parse_toolsdaemonrc(&text),
            None => CustomMenus::default(),
        }
    }
}

fn parse_toolsdaemonrc(text: &str) -> CustomMenus {
    let mut menus: HashMap<String, Vec<CustomMenuItem>> = HashMap::new();
    let mut current: Option<String> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            current = Some(line[1..line.len() - 1].to_string());
            menus.entry(current.clone().unwrap()).or_default();
            continue;
        }
        let Some(section) = current.as_ref() else {
            warn!("toolsdaemonrc: entry outside any [Section], ignoring: {}", line);
            continue;
        };
        let Some((label, command)) = line.split_once('=') else { continue };
        let label = label.trim().trim_matches('"').to_string();
        let command = command.trim().trim_matches('"').to_string();
        menus.entry(section.clone()).or_default().push(CustomMenuItem { label, command });
    }

    CustomMenus { menus }
}

/// Returns the true home-relative log file path (spec.md SS6 "Logging").
pub fn log_path() -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("/tmp"));
    home.join(".config/amiwb/amiwb.log")
}

pub fn config_dir() -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("/tmp"));
    home.join(".config/amiwb")
}

/// `.info` sidecar icon-set directory, overridable by the user per spec.md
/// SS4.E "a user-overridable icon set".
pub fn icon_set_dir() -> PathBuf {
    config_dir().join("icons")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_amiwbrc() {
        let text = "fps = 60\nrender_mode = continuous\nwallpaper_desktop = /a/b.png\n";
        let cfg = parse_amiwbrc(text).unwrap();
        assert_eq!(cfg.fps, 60);
        assert_eq!(cfg.render_mode, RenderMode::Continuous);
        assert_eq!(cfg.wallpaper_desktop, Some(PathBuf::from("/a/b.png")));
    }

    #[test]
    fn rejects_out_of_range_fps() {
        assert!(parse_amiwbrc("fps = 500").is_err());
        assert!(parse_amiwbrc("fps = 0").is_err());
    }

    #[test]
    fn rejects_unknown_render_mode() {
        assert!(parse_amiwbrc("render_mode = smooth").is_err());
    }

    #[test]
    fn ignores_comments_and_blank_lines() {
        let cfg = parse_amiwbrc("# comment\n\nfps = 90\n").unwrap();
        assert_eq!(cfg.fps, 90);
    }

    #[test]
    fn parses_toolsdaemonrc_sections() {
        let text = "[Tools]\n\"Edit\" = \"gedit %f\"\n\"Terminal\" = \"xterm\"\n[Workbench]\n\"Reboot\" = \"reboot\"\n";
        let menus = parse_toolsdaemonrc(text);
        assert_eq!(menus.menus["Tools"].len(), 2);
        assert_eq!(menus.menus["Tools"][0].label, "Edit");
        assert_eq!(menus.menus["Workbench"][0].command, "reboot");
    }
}
