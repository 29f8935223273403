use crate::theme::GlyphStyles;
use markstream::selection::MenuAnchor;
use markstream::{AttributedChar, Attributes, Entrance, GlyphSurface, HostError, Measure, SelectionHost, Size};
use ratatui::style::Style;
use std::io::Write;
use std::process::{Command, Stdio};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Ticks a freshly streamed glyph stays dimmed.
pub const ENTRANCE_TICKS: u64 = 6;

/// A glyph drawn into the cell grid.
#[derive(Debug, Clone)]
pub struct CellGlyph {
    pub symbol: String,
    pub style: Style,
    /// Tick the entrance effect started, or `None` for glyphs shown without one.
    pub born: Option<u64>,
}

impl CellGlyph {
    pub fn is_entering(&self, tick: u64) -> bool {
        self.born
            .is_some_and(|born| tick.saturating_sub(born) < ENTRANCE_TICKS)
    }
}

pub struct TerminalSurface {
    styles: GlyphStyles,
    tab_width: usize,
    tick: u64,
    live: usize,
}

impl TerminalSurface {
    pub fn new(styles: GlyphStyles, tab_width: usize) -> Self {
        Self {
            styles,
            tab_width,
            tick: 0,
            live: 0,
        }
    }

    pub fn advance(&mut self) {
        self.tick = self.tick.wrapping_add(1);
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn live_units(&self) -> usize {
        self.live
    }
}

impl GlyphSurface for TerminalSurface {
    type Handle = CellGlyph;

    fn create_unit(&mut self, _index: usize, item: &AttributedChar, entrance: Entrance) -> CellGlyph {
        self.live += 1;
        let symbol = match item.glyph {
            Some('\t') => " ".repeat(self.tab_width.max(1)),
            Some(ch) => ch.to_string(),
            None => String::new(),
        };
        CellGlyph {
            symbol,
            style: self.styles.style_for(&item.attributes),
            born: match entrance {
                Entrance::Animated => Some(self.tick),
                Entrance::Immediate => None,
            },
        }
    }

    fn destroy_unit(&mut self, _handle: CellGlyph) {
        self.live = self.live.saturating_sub(1);
    }
}

/// Measures glyphs in terminal cells: display width columns, one row tall.
#[derive(Debug, Clone, Copy)]
pub struct CellMeasure {
    pub tab_width: usize,
}

impl CellMeasure {
    fn glyph_width(&self, ch: char) -> usize {
        match ch {
            '\t' => self.tab_width.max(1),
            _ => ch.width().unwrap_or(0).max(1),
        }
    }
}

impl Measure for CellMeasure {
    fn unit_size(&self, _index: usize, item: &AttributedChar) -> Size {
        let width = item.glyph.map_or(0, |ch| self.glyph_width(ch));
        Size::new(width as f32, 1.0)
    }

    fn text_size(&self, text: &str, _attributes: &Attributes) -> Size {
        Size::new(text.width() as f32, 1.0)
    }
}

/// Selection capabilities of the terminal front-end.
///
/// The menu is a small overlay drawn by the app; copying pipes into `copy_command` when one is
/// configured and otherwise fills an in-app register.
#[derive(Debug, Default)]
pub struct TerminalHost {
    copy_command: Option<String>,
    register: String,
    menu: Option<MenuAnchor>,
    scroll_suspended: bool,
}

impl TerminalHost {
    pub fn new(copy_command: Option<String>) -> Self {
        Self {
            copy_command,
            ..Self::default()
        }
    }

    pub fn menu(&self) -> Option<MenuAnchor> {
        self.menu
    }

    pub fn register(&self) -> &str {
        &self.register
    }

    pub fn scroll_suspended(&self) -> bool {
        self.scroll_suspended
    }
}

impl SelectionHost for TerminalHost {
    fn suspend_scrolling(&mut self) {
        self.scroll_suspended = true;
    }

    fn resume_scrolling(&mut self) {
        self.scroll_suspended = false;
    }

    fn present_menu(&mut self, anchor: MenuAnchor) -> Result<(), HostError> {
        self.menu = Some(anchor);
        Ok(())
    }

    fn hide_menu(&mut self) {
        self.menu = None;
    }

    fn copy_to_clipboard(&mut self, text: &str) -> Result<(), HostError> {
        if let Some(command) = &self.copy_command {
            pipe_to_command(command, text)?;
        }
        self.register = text.to_string();
        Ok(())
    }
}

fn pipe_to_command(command: &str, text: &str) -> Result<(), HostError> {
    let mut parts = shell_words::split(command)
        .map_err(|err| HostError::Clipboard(format!("bad copy_command {command:?}: {err}")))?;
    if parts.is_empty() {
        return Err(HostError::Clipboard("copy_command is empty".to_string()));
    }
    let program = parts.remove(0);
    let mut child = Command::new(&program)
        .args(parts)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    let written = match child.stdin.take() {
        Some(mut stdin) => stdin.write_all(text.as_bytes()),
        None => Ok(()),
    };
    let status = child.wait()?;
    written?;
    if !status.success() {
        return Err(HostError::Clipboard(format!("{program} exited with {status}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::UiPalette;
    use markstream::parse_markdown;
    use pretty_assertions::assert_eq;
    use ratatui::style::Color;

    fn styles() -> GlyphStyles {
        GlyphStyles::from_palette(UiPalette {
            base_fg: Color::White,
            base_bg: None,
            accent: Color::Cyan,
            muted: Color::DarkGray,
            code_bg: None,
            selection_bg: Color::Blue,
        })
    }

    #[test]
    fn wide_and_tab_glyphs_measure_in_cells() {
        let measure = CellMeasure { tab_width: 4 };
        let sequence = parse_markdown("a界\t");
        let widths: Vec<f32> = sequence
            .iter()
            .enumerate()
            .map(|(i, item)| measure.unit_size(i, item).width)
            .collect();
        assert_eq!(widths, vec![1.0, 2.0, 4.0]);
        assert_eq!(measure.text_size("12.", &Attributes::default()), Size::new(3.0, 1.0));
    }

    #[test]
    fn animated_units_dim_for_a_few_ticks() {
        let mut surface = TerminalSurface::new(styles(), 4);
        let item = AttributedChar::new('x', Attributes::default());
        let glyph = surface.create_unit(0, &item, Entrance::Animated);
        assert!(glyph.is_entering(surface.tick()));
        for _ in 0..ENTRANCE_TICKS {
            surface.advance();
        }
        assert!(!glyph.is_entering(surface.tick()));

        let settled = surface.create_unit(1, &item, Entrance::Immediate);
        assert!(!settled.is_entering(surface.tick()));
        assert_eq!(surface.live_units(), 2);
        surface.destroy_unit(settled);
        assert_eq!(surface.live_units(), 1);
    }

    #[test]
    fn copy_without_command_fills_register() {
        let mut host = TerminalHost::new(None);
        host.copy_to_clipboard("hello").unwrap();
        assert_eq!(host.register(), "hello");
    }

    #[test]
    fn copy_command_that_stops_reading_is_reported() {
        let mut host = TerminalHost::new(Some("true".to_string()));
        let text = "x".repeat(1 << 20);
        assert!(matches!(host.copy_to_clipboard(&text), Err(HostError::Io(_))));
        assert_eq!(host.register(), "");
    }

    #[test]
    fn failing_copy_command_is_reported() {
        let mut host = TerminalHost::new(Some("false".to_string()));
        assert!(host.copy_to_clipboard("hello").is_err());
        assert_eq!(host.register(), "");
    }
}
