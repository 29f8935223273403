use crate::config::Config;
use anyhow::{Context, Result};
use markstream::Attributes;
use ratatui::style::{Color, Modifier, Style};
use std::path::PathBuf;
use syntect::highlighting::{Theme, ThemeSet};

/// Heading levels with a dedicated look; deeper headings render like body text.
const STYLED_HEADING_LEVELS: usize = 6;

pub struct ThemeManager {
    theme_set: ThemeSet,
    theme_names: Vec<String>,
    empty: Theme,
}

#[derive(Debug, Clone, Copy)]
pub struct UiPalette {
    pub base_fg: Color,
    pub base_bg: Option<Color>,
    pub accent: Color,
    pub muted: Color,
    pub code_bg: Option<Color>,
    pub selection_bg: Color,
}

impl ThemeManager {
    pub fn load(config: &Config) -> Result<Self> {
        let mut theme_set = ThemeSet::load_defaults();

        if let Some(dir) = resolve_bat_theme_dir(config) {
            if dir.exists() {
                let extra = ThemeSet::load_from_folder(&dir)
                    .with_context(|| format!("Failed to load themes from {}", dir.display()))?;
                log::debug!("loaded {} themes from {}", extra.themes.len(), dir.display());
                theme_set.themes.extend(extra.themes);
            }
        }

        let mut theme_names: Vec<String> = theme_set.themes.keys().cloned().collect();
        theme_names.sort();

        Ok(Self {
            theme_set,
            theme_names,
            empty: Theme::default(),
        })
    }

    pub fn theme_names(&self) -> &[String] {
        &self.theme_names
    }

    pub fn has_theme(&self, name: &str) -> bool {
        self.theme_set.themes.contains_key(name)
    }

    pub fn get(&self, name: &str) -> &Theme {
        self.theme_set
            .themes
            .get(name)
            .or_else(|| self.theme_set.themes.get(self.fallback_name()))
            .unwrap_or(&self.empty)
    }

    pub fn ui_palette(&self, name: &str) -> UiPalette {
        palette_from_theme(self.get(name))
    }

    pub fn fallback_name(&self) -> &str {
        self.theme_names
            .first()
            .map(|s| s.as_str())
            .unwrap_or("base16-ocean.dark")
    }
}

fn resolve_bat_theme_dir(config: &Config) -> Option<PathBuf> {
    if let Some(dir) = &config.bat_theme_dir {
        return Some(dir.clone());
    }
    let base = dirs::config_dir()?;
    Some(base.join("bat").join("themes"))
}

fn palette_from_theme(theme: &Theme) -> UiPalette {
    let settings = &theme.settings;
    let base_fg = settings
        .foreground
        .map(to_ratatui)
        .unwrap_or(Color::Gray);
    let base_bg = settings.background.map(to_ratatui);
    let accent = settings
        .selection_foreground
        .or(settings.caret)
        .or(settings.foreground)
        .map(to_ratatui)
        .unwrap_or(Color::Cyan);
    let muted = settings
        .gutter_foreground
        .or(settings.foreground)
        .map(to_ratatui)
        .unwrap_or(Color::DarkGray);
    let code_bg = settings
        .line_highlight
        .or(settings.background)
        .map(to_ratatui);
    let selection_bg = settings
        .selection
        .map(to_ratatui)
        .unwrap_or(Color::DarkGray);

    UiPalette {
        base_fg,
        base_bg,
        accent,
        muted,
        code_bg,
        selection_bg,
    }
}

fn to_ratatui(color: syntect::highlighting::Color) -> Color {
    Color::Rgb(color.r, color.g, color.b)
}

/// Terminal styles for every piece of the glyph view.
#[derive(Debug, Clone, Copy)]
pub struct GlyphStyles {
    pub base: Style,
    pub heading: Style,
    pub code: Style,
    pub link: Style,
    pub quote: Style,
    pub marker: Style,
    pub rule: Style,
    pub selection: Style,
    pub handle: Style,
    pub accent: Style,
    pub muted: Style,
}

impl GlyphStyles {
    pub fn from_palette(ui: UiPalette) -> Self {
        let base = Style::default()
            .fg(ui.base_fg)
            .bg(bg_or_reset(ui.base_bg));
        let code_bg = ui.code_bg.or_else(|| adjust_bg(ui.base_bg, -0.08)).or(ui.base_bg);
        let muted = Style::default().fg(ui.muted);

        Self {
            base,
            heading: base.fg(ui.accent).add_modifier(Modifier::BOLD),
            code: base.fg(ui.accent).bg(bg_or_reset(code_bg)),
            link: Style::default().fg(ui.accent).add_modifier(Modifier::UNDERLINED),
            quote: muted,
            marker: muted,
            rule: muted,
            selection: Style::default().bg(ui.selection_bg),
            handle: Style::default().fg(ui.accent),
            accent: Style::default().fg(ui.accent),
            muted,
        }
    }

    /// Resolves the style of one parsed character.
    pub fn style_for(&self, attributes: &Attributes) -> Style {
        let styled_heading =
            attributes.is_heading() && attributes.heading_level <= STYLED_HEADING_LEVELS;
        let mut style = if attributes.code {
            self.code
        } else if styled_heading {
            self.heading
        } else {
            self.base
        };
        if attributes.blockquote_depth > 0 && !attributes.code && !styled_heading {
            style = style.patch(self.quote);
        }
        if attributes.link_target.is_some() {
            style = style.patch(self.link);
        }
        if attributes.bold {
            style = style.add_modifier(Modifier::BOLD);
        }
        if attributes.italic {
            style = style.add_modifier(Modifier::ITALIC);
        }
        if attributes.strikethrough {
            style = style.add_modifier(Modifier::CROSSED_OUT);
        }
        style
    }
}

fn bg_or_reset(color: Option<Color>) -> Color {
    color.unwrap_or(Color::Reset)
}

fn adjust_bg(color: Option<Color>, delta: f32) -> Option<Color> {
    match color {
        Some(Color::Rgb(r, g, b)) => Some(Color::Rgb(
            adjust_channel(r, delta),
            adjust_channel(g, delta),
            adjust_channel(b, delta),
        )),
        _ => None,
    }
}

fn adjust_channel(value: u8, delta: f32) -> u8 {
    let v = value as f32 / 255.0;
    let adjusted = (v + delta).clamp(0.0, 1.0);
    (adjusted * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn styles() -> GlyphStyles {
        GlyphStyles::from_palette(UiPalette {
            base_fg: Color::White,
            base_bg: Some(Color::Rgb(40, 40, 40)),
            accent: Color::Cyan,
            muted: Color::DarkGray,
            code_bg: None,
            selection_bg: Color::Blue,
        })
    }

    #[test]
    fn code_background_is_derived_from_base() {
        assert_eq!(styles().code.bg, Some(Color::Rgb(20, 20, 20)));
    }

    #[test]
    fn inline_flags_become_modifiers() {
        let attributes = Attributes {
            bold: true,
            italic: true,
            strikethrough: true,
            ..Attributes::default()
        };
        let style = styles().style_for(&attributes);
        assert!(style.add_modifier.contains(Modifier::BOLD | Modifier::ITALIC | Modifier::CROSSED_OUT));
        assert_eq!(style.fg, Some(Color::White));
    }

    #[test]
    fn deep_headings_fall_back_to_base() {
        let styles = styles();
        let h2 = Attributes {
            heading_level: 2,
            ..Attributes::default()
        };
        let h8 = Attributes {
            heading_level: 8,
            ..Attributes::default()
        };
        assert_eq!(styles.style_for(&h2), styles.heading);
        assert_eq!(styles.style_for(&h8), styles.base);
    }

    #[test]
    fn links_are_underlined_accent() {
        let attributes = Attributes {
            link_target: Some("https://go.dev".into()),
            ..Attributes::default()
        };
        let style = styles().style_for(&attributes);
        assert_eq!(style.fg, Some(Color::Cyan));
        assert!(style.add_modifier.contains(Modifier::UNDERLINED));
    }

    #[test]
    fn fallback_theme_name_is_first_sorted() {
        let manager = ThemeManager::load(&Config {
            bat_theme_dir: None,
            ..Config::default()
        })
        .unwrap();
        assert_eq!(manager.fallback_name(), manager.theme_names()[0]);
        assert!(manager.has_theme("base16-ocean.dark"));
    }
}
