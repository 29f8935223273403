use anyhow::{Context, Result};
use markstream::{LayoutStyle, ParseOptions};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub theme: String,
    pub bat_theme_dir: Option<PathBuf>,
    pub tab_width: usize,
    pub bullet: String,
    /// Columns per blockquote or list nesting level.
    pub indent_unit: u16,
    pub line_spacing: f32,
    /// Blank rows after every logical line.
    pub line_gap: u16,
    pub heading_gap: u16,
    pub rule_spacing: f32,
    pub quote_bar_offset: u16,
    pub marker_gap: u16,
    pub chars_per_tick: usize,
    pub tick_ms: u64,
    pub follow: bool,
    /// Command that receives the copied text on stdin, e.g. `wl-copy` or `pbcopy`.
    pub copy_command: Option<String>,
    pub long_press_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: "base16-ocean.dark".to_string(),
            bat_theme_dir: dirs::config_dir().map(|dir| dir.join("bat").join("themes")),
            tab_width: 4,
            bullet: "•".to_string(),
            indent_unit: 2,
            line_spacing: 1.0,
            line_gap: 0,
            heading_gap: 1,
            rule_spacing: 0.5,
            quote_bar_offset: 2,
            marker_gap: 1,
            chars_per_tick: 3,
            tick_ms: 16,
            follow: false,
            copy_command: None,
            long_press_ms: 400,
        }
    }
}

impl Config {
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            tab_width: self.tab_width,
            bullet: self.bullet.clone(),
        }
    }

    /// Layout style for a character grid: one row per line, one column per cell.
    pub fn layout_style(&self) -> LayoutStyle {
        LayoutStyle {
            base_line_height: 1.0,
            line_spacing: self.line_spacing.max(1.0),
            line_gap: f32::from(self.line_gap),
            heading_gap: f32::from(self.heading_gap),
            indent_unit: f32::from(self.indent_unit),
            quote_bar_offset: f32::from(self.quote_bar_offset),
            quote_bar_width: 1.0,
            marker_gap: f32::from(self.marker_gap),
            rule_spacing: self.rule_spacing,
            rule_thickness: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct PartialConfig {
    theme: Option<String>,
    bat_theme_dir: Option<PathBuf>,
    tab_width: Option<usize>,
    bullet: Option<String>,
    indent_unit: Option<u16>,
    line_spacing: Option<f32>,
    line_gap: Option<u16>,
    heading_gap: Option<u16>,
    rule_spacing: Option<f32>,
    quote_bar_offset: Option<u16>,
    marker_gap: Option<u16>,
    chars_per_tick: Option<usize>,
    tick_ms: Option<u64>,
    follow: Option<bool>,
    copy_command: Option<String>,
    long_press_ms: Option<u64>,
}

fn fill<T>(value: Option<T>, default: T, changed: &mut bool) -> T {
    match value {
        Some(v) => v,
        None => {
            *changed = true;
            default
        }
    }
}

impl PartialConfig {
    fn apply_defaults(self) -> (Config, bool) {
        let defaults = Config::default();
        let mut changed = false;

        let bat_theme_dir = match self.bat_theme_dir {
            Some(v) => Some(v),
            None => {
                changed = true;
                defaults.bat_theme_dir
            }
        };

        let cfg = Config {
            theme: fill(self.theme, defaults.theme, &mut changed),
            bat_theme_dir,
            tab_width: fill(self.tab_width, defaults.tab_width, &mut changed),
            bullet: fill(self.bullet, defaults.bullet, &mut changed),
            indent_unit: fill(self.indent_unit, defaults.indent_unit, &mut changed),
            line_spacing: fill(self.line_spacing, defaults.line_spacing, &mut changed),
            line_gap: fill(self.line_gap, defaults.line_gap, &mut changed),
            heading_gap: fill(self.heading_gap, defaults.heading_gap, &mut changed),
            rule_spacing: fill(self.rule_spacing, defaults.rule_spacing, &mut changed),
            quote_bar_offset: fill(self.quote_bar_offset, defaults.quote_bar_offset, &mut changed),
            marker_gap: fill(self.marker_gap, defaults.marker_gap, &mut changed),
            chars_per_tick: fill(self.chars_per_tick, defaults.chars_per_tick, &mut changed),
            tick_ms: fill(self.tick_ms, defaults.tick_ms, &mut changed),
            follow: fill(self.follow, defaults.follow, &mut changed),
            // Unset means "use the in-app register"; not worth a rewrite.
            copy_command: self.copy_command,
            long_press_ms: fill(self.long_press_ms, defaults.long_press_ms, &mut changed),
        };
        (cfg, changed)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("Could not determine config directory")?;
    Ok(base.join("markstream").join("config.toml"))
}

pub fn ensure_config_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

pub fn load_config() -> Result<Config> {
    let path = config_path()?;
    if !path.exists() {
        let cfg = Config::default();
        write_config(&cfg)?;
        return Ok(cfg);
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let partial: PartialConfig = toml::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    let (cfg, changed) = partial.apply_defaults();
    if changed {
        log::info!("filling missing keys in {}", path.display());
        write_config(&cfg)?;
    }
    Ok(cfg)
}

pub fn write_config(cfg: &Config) -> Result<()> {
    let path = config_path()?;
    ensure_config_dir(&path)?;
    let text = toml::to_string_pretty(cfg).context("Failed to serialize config")?;
    fs::write(&path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub fn open_config_in_editor() -> Result<()> {
    let path = config_path()?;
    if !path.exists() {
        let cfg = Config::default();
        write_config(&cfg)?;
    }

    let editor = env::var("EDITOR").unwrap_or_else(|_| "nvim".to_string());
    let mut parts = match shell_words::split(&editor) {
        Ok(p) if !p.is_empty() => p,
        _ => vec![editor],
    };
    let cmd = parts.remove(0);
    let status = Command::new(cmd)
        .args(parts)
        .arg(&path)
        .status()
        .with_context(|| format!("Failed to launch editor for {}", path.display()))?;
    if !status.success() {
        anyhow::bail!("Editor exited with status {}", status);
    }
    Ok(())
}
