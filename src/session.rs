use crate::error::HostError;
use crate::geometry::{Point, Rect};
use crate::model::{AttributedChar, renderable_glyphs};
use crate::selection::{
    Handle, MenuAnchor, SelectionRange, drag_handle, extend_selection, handle_points, hit_test,
    is_point_in_selection, menu_anchor, merge_rects, selected_text, selection_rects, word_range_at,
};
use log::{debug, warn};
use std::sync::Arc;

/// Capabilities the embedding view lends to a selection session.
pub trait SelectionHost {
    fn suspend_scrolling(&mut self);
    fn resume_scrolling(&mut self);
    fn present_menu(&mut self, anchor: MenuAnchor) -> Result<(), HostError>;
    fn hide_menu(&mut self);
    fn copy_to_clipboard(&mut self, text: &str) -> Result<(), HostError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    LongPress(Point),
    DragBegan(Point),
    DragChanged(Point),
    DragEnded(Point),
    DragCancelled,
    Tap(Point),
    HandleDragBegan(Handle),
    HandleDragChanged(Point),
    HandleDragEnded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Unchanged,
    /// The range changed, or a gesture finished and the menu was requested again.
    Updated,
    Cleared,
    /// A tap landed on a link while nothing was selected.
    Link(Arc<str>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Idle,
    Selecting { anchor: usize },
    HandleDragging(Handle),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionView {
    pub range: SelectionRange,
    pub highlights: Vec<Rect>,
    pub start_handle: Point,
    pub end_handle: Point,
    pub menu: MenuAnchor,
}

/// Single-selection interaction state machine.
///
/// `rects` passed to every call must be the current layout, index-aligned with the renderable
/// units of `sequence`.
#[derive(Debug)]
pub struct SelectionSession<H: SelectionHost> {
    host: H,
    mode: Mode,
    range: Option<SelectionRange>,
}

impl<H: SelectionHost> SelectionSession<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            mode: Mode::Idle,
            range: None,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn range(&self) -> Option<SelectionRange> {
        self.range
    }

    pub fn has_selection(&self) -> bool {
        self.range.is_some()
    }

    pub fn active_handle(&self) -> Option<Handle> {
        match self.mode {
            Mode::HandleDragging(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.mode != Mode::Idle
    }

    pub fn handle(
        &mut self,
        event: PointerEvent,
        rects: &[Rect],
        sequence: &[AttributedChar],
    ) -> Result<Outcome, HostError> {
        match event {
            PointerEvent::LongPress(point) => {
                let Some(index) = hit_test(point, rects) else {
                    return Ok(Outcome::Unchanged);
                };
                self.mode = Mode::Selecting { anchor: index };
                self.range = word_range_at(index, sequence);
                debug!("selection: long press at unit {index}, range {:?}", self.range);
                self.present_menu(rects)?;
                Ok(Outcome::Updated)
            }
            PointerEvent::DragBegan(_) => {
                if !matches!(self.mode, Mode::Selecting { .. }) {
                    return Ok(Outcome::Unchanged);
                }
                self.host.suspend_scrolling();
                self.host.hide_menu();
                Ok(Outcome::Unchanged)
            }
            PointerEvent::DragChanged(point) => {
                let Mode::Selecting { anchor } = self.mode else {
                    return Ok(Outcome::Unchanged);
                };
                let Some(current) = hit_test(point, rects) else {
                    return Ok(Outcome::Unchanged);
                };
                let next = extend_selection(anchor, current);
                if self.range == Some(next) {
                    return Ok(Outcome::Unchanged);
                }
                self.range = Some(next);
                Ok(Outcome::Updated)
            }
            PointerEvent::DragEnded(_) | PointerEvent::DragCancelled => {
                if !matches!(self.mode, Mode::Selecting { .. }) {
                    return Ok(Outcome::Unchanged);
                }
                self.mode = Mode::Idle;
                self.host.resume_scrolling();
                self.finish_gesture(rects)
            }
            PointerEvent::HandleDragBegan(handle) => {
                if self.range.is_none() {
                    return Ok(Outcome::Unchanged);
                }
                self.mode = Mode::HandleDragging(handle);
                self.host.suspend_scrolling();
                self.host.hide_menu();
                Ok(Outcome::Unchanged)
            }
            PointerEvent::HandleDragChanged(point) => {
                let (Mode::HandleDragging(handle), Some(current)) = (self.mode, self.range) else {
                    return Ok(Outcome::Unchanged);
                };
                let Some(index) = hit_test(point, rects) else {
                    return Ok(Outcome::Unchanged);
                };
                let (next, active) = drag_handle(handle, index, current);
                self.mode = Mode::HandleDragging(active);
                if next == current {
                    return Ok(Outcome::Unchanged);
                }
                self.range = Some(next);
                Ok(Outcome::Updated)
            }
            PointerEvent::HandleDragEnded => {
                if !matches!(self.mode, Mode::HandleDragging(_)) {
                    return Ok(Outcome::Unchanged);
                }
                self.mode = Mode::Idle;
                self.host.resume_scrolling();
                self.finish_gesture(rects)
            }
            PointerEvent::Tap(point) => self.tap(point, rects, sequence),
        }
    }

    fn tap(
        &mut self,
        point: Point,
        rects: &[Rect],
        sequence: &[AttributedChar],
    ) -> Result<Outcome, HostError> {
        if let Some(range) = self.range {
            if is_point_in_selection(point, range, rects) {
                self.present_menu(rects)?;
                return Ok(Outcome::Unchanged);
            }
            self.clear();
            return Ok(Outcome::Cleared);
        }

        let link = hit_test(point, rects)
            .and_then(|index| renderable_glyphs(sequence).nth(index))
            .and_then(|(_, item)| item.attributes.link_target.clone());
        Ok(match link {
            Some(target) => Outcome::Link(target),
            None => Outcome::Unchanged,
        })
    }

    fn finish_gesture(&mut self, rects: &[Rect]) -> Result<Outcome, HostError> {
        match self.range {
            Some(range) if !range.is_empty() => {
                self.present_menu(rects)?;
                Ok(Outcome::Updated)
            }
            _ => {
                self.clear();
                Ok(Outcome::Cleared)
            }
        }
    }

    fn present_menu(&mut self, rects: &[Rect]) -> Result<(), HostError> {
        let Some(range) = self.range else {
            return Ok(());
        };
        let Some(anchor) = selection_rects(range, rects).and_then(menu_anchor) else {
            self.clear();
            return Ok(());
        };
        self.host.present_menu(anchor).inspect_err(|err| {
            warn!("selection menu unavailable: {err}");
        })
    }

    pub fn clear(&mut self) {
        if self.mode != Mode::Idle {
            self.host.resume_scrolling();
        }
        self.mode = Mode::Idle;
        self.range = None;
        self.host.hide_menu();
    }

    pub fn view(&self, rects: &[Rect]) -> Option<SelectionView> {
        let range = self.range?;
        let selected = selection_rects(range, rects)?;
        let (start_handle, end_handle) = handle_points(selected)?;
        let menu = menu_anchor(selected)?;
        Some(SelectionView {
            range,
            highlights: merge_rects(selected),
            start_handle,
            end_handle,
            menu,
        })
    }

    pub fn selected_text(&self, sequence: &[AttributedChar]) -> Option<String> {
        self.range.map(|range| selected_text(range, sequence))
    }

    /// Copies the selected text through the host and clears the selection.
    ///
    /// On failure the selection stays so the user can retry.
    pub fn copy(&mut self, sequence: &[AttributedChar]) -> Result<Option<String>, HostError> {
        let Some(text) = self.selected_text(sequence) else {
            return Ok(None);
        };
        if let Err(err) = self.host.copy_to_clipboard(&text) {
            warn!("copy failed: {err}");
            return Err(err);
        }
        self.clear();
        Ok(Some(text))
    }
}
