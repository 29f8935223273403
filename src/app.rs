use crate::config::{self, Config};
use crate::terminal::{CellMeasure, TerminalHost, TerminalSurface};
use crate::theme::{GlyphStyles, ThemeManager};
use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyModifiers,
    MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use markstream::layout::DecorationKind;
use markstream::{Handle, Outcome, ParseWorker, PointerEvent, Point, SelectionView, StreamView};
use notify::{RecursiveMode, Watcher};
use ratatui::backend::CrosstermBackend;
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Clear, Paragraph, Widget};
use ratatui::Terminal;
use std::fs;
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};

const MOUSE_SCROLL_ROWS: isize = 3;
const MENU_TEXT: &str = " y copy │ esc clear ";

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub follow: bool,
    pub instant: bool,
}

pub fn run_app(path: PathBuf, mut config: Config, options: RunOptions) -> Result<()> {
    let theme_manager = ThemeManager::load(&config)?;
    if !theme_manager.has_theme(&config.theme) {
        log::warn!("theme {:?} not found, falling back", config.theme);
        config.theme = theme_manager.fallback_name().to_string();
        config::write_config(&config)?;
    }

    let mut app = App::new(path, config, &theme_manager, options)?;

    let mut terminal = setup_terminal()?;
    let _guard = TerminalGuard;

    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = tx.send(res);
    })?;
    if app.follow {
        watcher.watch(&app.file_path, RecursiveMode::NonRecursive)?;
    }

    let tick_rate = Duration::from_millis(app.config.tick_ms.max(1));
    let mut last_tick = Instant::now();

    loop {
        let size = terminal.size()?;
        let layout = screen_layout(size);
        app.relayout(layout.content);

        terminal.draw(|f| ui(f, &app, &layout))?;

        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) => {
                    if app.handle_key(key, layout.content.height) {
                        break;
                    }
                }
                Event::Mouse(mouse) => app.handle_mouse(mouse, layout.content),
                _ => {}
            }
        }

        while let Ok(msg) = rx.try_recv() {
            match msg {
                Ok(event) => app.on_fs_event(event),
                Err(err) => log::warn!("watch error: {err}"),
            }
        }

        app.handle_pending_reload();

        if last_tick.elapsed() >= tick_rate {
            app.on_tick();
            last_tick = Instant::now();
        }

        app.poll_parsed();
    }

    Ok(())
}

struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = execute!(stdout, DisableMouseCapture, LeaveAlternateScreen);
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

#[derive(Default)]
struct FsReload {
    pending: bool,
    deadline: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PressState {
    /// Button down, not moved, long-press threshold not reached yet.
    Pending,
    LongPressed,
    Selecting,
    Handle,
}

#[derive(Debug, Clone, Copy)]
struct Press {
    origin: Point,
    at: Instant,
    state: PressState,
}

struct ScreenLayout {
    content: Rect,
    status: Rect,
}

fn screen_layout(size: Rect) -> ScreenLayout {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(size);
    ScreenLayout {
        content: chunks[0],
        status: chunks[1],
    }
}

struct App {
    file_path: PathBuf,
    config: Config,
    styles: GlyphStyles,
    view: StreamView<TerminalSurface, TerminalHost>,
    worker: ParseWorker,
    measure: CellMeasure,
    source: String,
    total_chars: usize,
    revealed: usize,
    instant: bool,
    follow: bool,
    paused: bool,
    scroll: usize,
    stick_to_bottom: bool,
    content: Rect,
    press: Option<Press>,
    status: Option<String>,
    reload: FsReload,
}

impl App {
    fn new(
        path: PathBuf,
        config: Config,
        theme_manager: &ThemeManager,
        options: RunOptions,
    ) -> Result<Self> {
        let source = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let styles = GlyphStyles::from_palette(theme_manager.ui_palette(&config.theme));
        let surface = TerminalSurface::new(styles, config.tab_width);
        let host = TerminalHost::new(config.copy_command.clone());
        let view = StreamView::new(surface, host, config.parse_options(), config.layout_style());
        let worker = ParseWorker::spawn(config.parse_options()).context("Failed to start parser")?;
        let measure = CellMeasure {
            tab_width: config.tab_width,
        };
        let total_chars = source.chars().count();
        let follow = options.follow || config.follow;

        let mut app = Self {
            file_path: path,
            config,
            styles,
            view,
            worker,
            measure,
            source,
            total_chars,
            revealed: 0,
            instant: options.instant,
            follow,
            paused: false,
            scroll: 0,
            stick_to_bottom: !options.instant,
            content: Rect::default(),
            press: None,
            status: None,
            reload: FsReload::default(),
        };
        if app.instant {
            app.revealed = app.total_chars;
            app.view.update_text(&app.source);
        }
        log::info!(
            "opened {} ({} chars, follow: {}, instant: {})",
            app.file_path.display(),
            app.total_chars,
            app.follow,
            app.instant
        );
        Ok(app)
    }

    fn relayout(&mut self, content: Rect) {
        self.content = content;
        self.view.relayout(f32::from(content.width), &self.measure);
        let max_scroll = self.max_scroll(content.height);
        if self.stick_to_bottom || self.scroll > max_scroll {
            self.scroll = max_scroll;
        }
    }

    fn total_rows(&self) -> usize {
        self.view.total_height().ceil() as usize
    }

    fn max_scroll(&self, height: u16) -> usize {
        self.total_rows().saturating_sub(height as usize)
    }

    fn scroll_by(&mut self, delta: isize, height: u16) {
        let max_scroll = self.max_scroll(height);
        self.scroll = self.scroll.saturating_add_signed(delta).min(max_scroll);
        self.stick_to_bottom = self.scroll == max_scroll;
    }

    fn on_tick(&mut self) {
        self.view.surface_mut().advance();
        self.check_long_press();

        if self.paused || self.revealed >= self.total_chars {
            return;
        }
        self.revealed = (self.revealed + self.config.chars_per_tick.max(1)).min(self.total_chars);
        self.submit_revealed();
    }

    fn submit_revealed(&mut self) {
        let prefix = prefix_chars(&self.source, self.revealed);
        if let Err(err) = self.worker.submit(prefix) {
            log::error!("parse submit failed: {err}");
            self.status = Some(format!("Parser stopped: {err}"));
        }
    }

    fn poll_parsed(&mut self) {
        match self.worker.poll_latest() {
            Ok(Some(parsed)) => {
                let delta = self.view.apply_parsed(parsed.sequence);
                if !delta.is_noop() {
                    self.press = None;
                }
            }
            Ok(None) => {}
            Err(err) => {
                log::error!("parse worker failed: {err}");
                self.status = Some(format!("Parser stopped: {err}"));
            }
        }
    }

    fn request_reload(&mut self) {
        self.reload.pending = true;
        self.reload.deadline = Some(Instant::now() + Duration::from_millis(150));
    }

    fn on_fs_event(&mut self, _event: notify::Event) {
        self.request_reload();
    }

    fn handle_pending_reload(&mut self) {
        if !self.reload.pending {
            return;
        }
        if let Some(deadline) = self.reload.deadline {
            if Instant::now() < deadline {
                return;
            }
        }
        self.reload.pending = false;
        self.reload.deadline = None;
        self.reload_file();
    }

    /// Appended text keeps streaming from where playback is; a rewrite restarts no further than
    /// the new length.
    fn reload_file(&mut self) {
        let text = match fs::read_to_string(&self.file_path) {
            Ok(text) => text,
            Err(err) => {
                self.status = Some(format!("Failed to reload: {err}"));
                return;
            }
        };
        if text == self.source {
            return;
        }
        let appended = text.starts_with(&self.source);
        self.total_chars = text.chars().count();
        self.source = text;
        if self.instant {
            self.revealed = self.total_chars;
        } else {
            self.revealed = self.revealed.min(self.total_chars);
        }
        log::debug!(
            "reloaded {} ({} chars, appended: {appended})",
            self.file_path.display(),
            self.total_chars
        );
        if !appended || self.instant {
            self.submit_revealed();
        }
        self.status = Some("Reloaded".to_string());
    }

    fn handle_key(&mut self, key: KeyEvent, content_height: u16) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return true;
        }
        let page = content_height.max(1) as isize;
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('y') => self.copy_selection(),
            KeyCode::Esc => {
                self.view.clear_selection();
                self.press = None;
                self.status = None;
            }
            KeyCode::Char('j') | KeyCode::Down => self.scroll_by(1, content_height),
            KeyCode::Char('k') | KeyCode::Up => self.scroll_by(-1, content_height),
            KeyCode::PageDown => self.scroll_by(page, content_height),
            KeyCode::PageUp => self.scroll_by(-page, content_height),
            KeyCode::Char('g') | KeyCode::Home => {
                self.scroll = 0;
                self.stick_to_bottom = false;
            }
            KeyCode::Char('G') | KeyCode::End => {
                self.scroll = self.max_scroll(content_height);
                self.stick_to_bottom = true;
            }
            KeyCode::Char(' ') => {
                self.paused = !self.paused;
                self.status = Some(if self.paused { "Paused" } else { "Resumed" }.to_string());
            }
            _ => {}
        }
        false
    }

    fn copy_selection(&mut self) {
        self.status = Some(match self.view.copy_selection() {
            Ok(Some(text)) => format!("Copied {} chars", text.chars().count()),
            Ok(None) => "Nothing selected".to_string(),
            Err(err) => format!("Copy failed: {err}"),
        });
    }

    fn content_point(&self, column: u16, row: u16) -> (usize, usize, Point) {
        let col = column
            .saturating_sub(self.content.x)
            .min(self.content.width.saturating_sub(1)) as usize;
        let row = row
            .saturating_sub(self.content.y)
            .min(self.content.height.saturating_sub(1)) as usize
            + self.scroll;
        (col, row, Point::new(col as f32 + 0.5, row as f32 + 0.5))
    }

    fn handle_at(&self, col: usize, row: usize) -> Option<Handle> {
        let selection = self.view.selection_view()?;
        handle_cells(&selection)
            .into_iter()
            .find(|&(_, x, y)| x == col && y == row)
            .map(|(handle, _, _)| handle)
    }

    fn handle_mouse(&mut self, mouse: MouseEvent, content: Rect) {
        self.content = content;
        let (col, row, point) = self.content_point(mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let state = match self.handle_at(col, row) {
                    Some(handle) => {
                        self.dispatch(PointerEvent::HandleDragBegan(handle));
                        PressState::Handle
                    }
                    None => PressState::Pending,
                };
                self.press = Some(Press {
                    origin: point,
                    at: Instant::now(),
                    state,
                });
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                let Some(press) = self.press else {
                    return;
                };
                let next = match press.state {
                    PressState::Handle => {
                        self.dispatch(PointerEvent::HandleDragChanged(point));
                        PressState::Handle
                    }
                    PressState::Pending => {
                        self.dispatch(PointerEvent::LongPress(press.origin));
                        self.dispatch(PointerEvent::DragBegan(press.origin));
                        self.dispatch(PointerEvent::DragChanged(point));
                        PressState::Selecting
                    }
                    PressState::LongPressed => {
                        self.dispatch(PointerEvent::DragBegan(press.origin));
                        self.dispatch(PointerEvent::DragChanged(point));
                        PressState::Selecting
                    }
                    PressState::Selecting => {
                        self.dispatch(PointerEvent::DragChanged(point));
                        PressState::Selecting
                    }
                };
                self.press = Some(Press {
                    state: next,
                    ..press
                });
            }
            MouseEventKind::Up(MouseButton::Left) => {
                let Some(press) = self.press.take() else {
                    return;
                };
                let event = match press.state {
                    PressState::Handle => PointerEvent::HandleDragEnded,
                    PressState::Pending => PointerEvent::Tap(point),
                    PressState::LongPressed | PressState::Selecting => PointerEvent::DragEnded(point),
                };
                self.dispatch(event);
            }
            MouseEventKind::ScrollDown => {
                if !self.view.session().host().scroll_suspended() {
                    self.scroll_by(MOUSE_SCROLL_ROWS, content.height);
                }
            }
            MouseEventKind::ScrollUp => {
                if !self.view.session().host().scroll_suspended() {
                    self.scroll_by(-MOUSE_SCROLL_ROWS, content.height);
                }
            }
            _ => {}
        }
    }

    fn check_long_press(&mut self) {
        let Some(press) = self.press else {
            return;
        };
        if press.state != PressState::Pending
            || press.at.elapsed() < Duration::from_millis(self.config.long_press_ms)
        {
            return;
        }
        self.dispatch(PointerEvent::LongPress(press.origin));
        if let Some(press) = self.press.as_mut() {
            press.state = PressState::LongPressed;
        }
    }

    fn dispatch(&mut self, event: PointerEvent) {
        match self.view.handle_pointer(event) {
            Ok(Outcome::Link(target)) => self.status = Some(format!("Link: {target}")),
            Ok(Outcome::Cleared) => self.status = None,
            Ok(_) => {}
            Err(err) => self.status = Some(format!("Selection: {err}")),
        }
    }

    fn status_line(&self) -> Line<'static> {
        let muted = self.styles.muted;
        let mut parts = Vec::new();
        parts.push(Span::styled(
            "markstream",
            self.styles.accent.add_modifier(Modifier::BOLD),
        ));
        parts.push(Span::styled(" | ", muted));
        let progress = if self.revealed >= self.total_chars {
            "done".to_string()
        } else if self.paused {
            "paused".to_string()
        } else {
            format!("streaming {}%", self.revealed * 100 / self.total_chars.max(1))
        };
        parts.push(Span::styled(progress, self.styles.accent));
        parts.push(Span::styled(" | ", muted));
        parts.push(Span::styled(
            self.file_path.to_string_lossy().to_string(),
            self.styles.base,
        ));
        parts.push(Span::styled(" | ", muted));
        parts.push(Span::styled(format!("theme: {}", self.config.theme), muted));
        if let Some(range) = self.view.session().range() {
            parts.push(Span::styled(" | ", muted));
            parts.push(Span::styled(format!("{} selected", range.len), muted));
        }
        if let Some(msg) = &self.status {
            parts.push(Span::styled(" | ", muted));
            parts.push(Span::styled(msg.clone(), self.styles.accent));
        }
        Line::from(parts)
    }
}

fn prefix_chars(text: &str, count: usize) -> &str {
    text.char_indices()
        .nth(count)
        .map_or(text, |(idx, _)| &text[..idx])
}

/// Content-space cells of the start and end handles.
fn handle_cells(selection: &SelectionView) -> [(Handle, usize, usize); 2] {
    let start = selection.start_handle;
    let end = selection.end_handle;
    [
        (
            Handle::Start,
            (start.x as usize).saturating_sub(1),
            start.y as usize,
        ),
        (
            Handle::End,
            end.x as usize,
            (end.y as usize).saturating_sub(1),
        ),
    ]
}

/// Screen cell for a content-space position, if it is visible.
fn cell_in_area(area: Rect, scroll: usize, x: f32, y: f32) -> Option<(u16, u16)> {
    if x < 0.0 || y < 0.0 {
        return None;
    }
    let row = (y.floor() as usize).checked_sub(scroll)?;
    let col = x.floor() as usize;
    if row >= area.height as usize || col >= area.width as usize {
        return None;
    }
    Some((area.x + col as u16, area.y + row as u16))
}

struct GlyphCanvas<'a> {
    app: &'a App,
}

impl Widget for GlyphCanvas<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let app = self.app;
        let styles = &app.styles;
        let scroll = app.scroll;
        let tick = app.view.surface().tick();

        for decoration in app.view.decorations() {
            let frame = decoration.frame;
            match &decoration.kind {
                DecorationKind::Rule => {
                    if let Some((x, y)) = cell_in_area(area, scroll, 0.0, frame.min_y()) {
                        buf.set_string(x, y, "─".repeat(area.width as usize), styles.rule);
                    }
                }
                DecorationKind::QuoteBar(_) => {
                    let top = frame.min_y().floor() as usize;
                    let bottom = frame.max_y().ceil() as usize;
                    for row in top..bottom {
                        if let Some((x, y)) = cell_in_area(area, scroll, frame.min_x(), row as f32) {
                            buf.set_string(x, y, "│", styles.quote);
                        }
                    }
                }
                DecorationKind::ListMarker(text) => {
                    if let Some((x, y)) = cell_in_area(area, scroll, frame.min_x().max(0.0), frame.min_y()) {
                        let width = (area.right() - x) as usize;
                        buf.set_stringn(x, y, text, width, styles.marker);
                    }
                }
            }
        }

        for (glyph, rect) in app.view.units().iter().zip(app.view.rects()) {
            let Some((x, y)) = cell_in_area(area, scroll, rect.min_x(), rect.min_y()) else {
                continue;
            };
            let mut style = glyph.style;
            if glyph.is_entering(tick) {
                style = style.add_modifier(Modifier::DIM);
            }
            let width = (area.right() - x) as usize;
            buf.set_stringn(x, y, &glyph.symbol, width, style);
        }

        let Some(selection) = app.view.selection_view() else {
            return;
        };
        for highlight in &selection.highlights {
            let left = highlight.min_x().floor() as usize;
            let right = highlight.max_x().ceil() as usize;
            let top = highlight.min_y().floor() as usize;
            let bottom = highlight.max_y().ceil() as usize;
            for row in top..bottom {
                for col in left..right {
                    if let Some((x, y)) = cell_in_area(area, scroll, col as f32, row as f32) {
                        buf.get_mut(x, y).set_style(styles.selection);
                    }
                }
            }
        }
        for (handle, col, row) in handle_cells(&selection) {
            let symbol = match handle {
                Handle::Start => "▐",
                Handle::End => "▌",
            };
            if let Some((x, y)) = cell_in_area(area, scroll, col as f32, row as f32) {
                buf.set_string(x, y, symbol, styles.handle);
            }
        }
    }
}

/// Menu overlay above the first selected row, or below the last one when there is no room.
fn menu_area(app: &App, content: Rect) -> Option<Rect> {
    let anchor = app.view.session().host().menu()?;
    let first_row = anchor.first_line.min_y().floor() as usize;
    let row = if first_row > app.scroll {
        first_row - 1
    } else {
        anchor.last_line.max_y().ceil() as usize
    };
    let (x, y) = cell_in_area(content, app.scroll, anchor.first_line.min_x(), row as f32)?;
    let width = (MENU_TEXT.chars().count() as u16).min(content.right() - x);
    Some(Rect::new(x, y, width, 1))
}

fn ui(f: &mut ratatui::Frame, app: &App, layout: &ScreenLayout) {
    f.render_widget(Block::default().style(app.styles.base), f.size());
    f.render_widget(GlyphCanvas { app }, layout.content);

    if let Some(area) = menu_area(app, layout.content) {
        f.render_widget(Clear, area);
        f.render_widget(
            Paragraph::new(MENU_TEXT).style(app.styles.accent.add_modifier(Modifier::REVERSED)),
            area,
        );
    }

    f.render_widget(
        Paragraph::new(app.status_line())
            .style(app.styles.base)
            .block(Block::default().style(Style::default())),
        layout.status,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use markstream::SelectionRange;
    use pretty_assertions::assert_eq;

    #[test]
    fn prefix_chars_counts_scalars() {
        assert_eq!(prefix_chars("héllo", 2), "hé");
        assert_eq!(prefix_chars("abc", 10), "abc");
        assert_eq!(prefix_chars("abc", 0), "");
    }

    #[test]
    fn cells_outside_viewport_are_hidden() {
        let area = Rect::new(0, 1, 10, 5);
        assert_eq!(cell_in_area(area, 0, 2.0, 3.0), Some((2, 4)));
        assert_eq!(cell_in_area(area, 4, 2.0, 3.0), None);
        assert_eq!(cell_in_area(area, 2, 2.0, 3.0), Some((2, 2)));
        assert_eq!(cell_in_area(area, 0, 12.0, 0.0), None);
        assert_eq!(cell_in_area(area, 0, 0.0, 5.0), None);
    }

    #[test]
    fn handles_sit_beside_the_selection() {
        let selection = SelectionView {
            range: SelectionRange::new(0, 3),
            highlights: Vec::new(),
            start_handle: Point::new(4.0, 1.0),
            end_handle: Point::new(9.0, 3.0),
            menu: markstream::MenuAnchor {
                first_line: markstream::Rect::new(4.0, 1.0, 5.0, 1.0),
                last_line: markstream::Rect::new(0.0, 2.0, 9.0, 1.0),
            },
        };
        assert_eq!(
            handle_cells(&selection),
            [(Handle::Start, 3, 1), (Handle::End, 9, 2)]
        );
    }
}
