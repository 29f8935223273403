use crate::error::HostError;
use crate::geometry::Rect;
use crate::layout::{Decoration, LayoutEngine, LayoutResult, LayoutStyle, Measure};
use crate::markdown::{ParseOptions, parse_markdown_with};
use crate::model::AttributedChar;
use crate::reconcile::{GlyphSurface, Reconciliation, UnitList, reconcile_in_place};
use crate::session::{Outcome, PointerEvent, SelectionHost, SelectionSession, SelectionView};

/// One streamed text view: parsed sequence, unit handles, layout and selection kept in step.
pub struct StreamView<S: GlyphSurface, H: SelectionHost> {
    surface: S,
    units: UnitList<S::Handle>,
    sequence: Vec<AttributedChar>,
    options: ParseOptions,
    engine: LayoutEngine,
    placed: LayoutResult,
    laid_out_width: Option<f32>,
    dirty: bool,
    session: SelectionSession<H>,
}

impl<S: GlyphSurface, H: SelectionHost> StreamView<S, H> {
    pub fn new(surface: S, host: H, options: ParseOptions, style: LayoutStyle) -> Self {
        Self {
            surface,
            units: UnitList::new(),
            sequence: Vec::new(),
            options,
            engine: LayoutEngine::new(style),
            placed: LayoutResult::default(),
            laid_out_width: None,
            dirty: false,
            session: SelectionSession::new(host),
        }
    }

    /// Parses `text` on the calling thread and applies the result.
    pub fn update_text(&mut self, text: &str) -> Reconciliation {
        let sequence = parse_markdown_with(text, &self.options);
        self.apply_parsed(sequence)
    }

    /// Applies a sequence parsed elsewhere, e.g. by a `ParseWorker`.
    pub fn apply_parsed(&mut self, sequence: Vec<AttributedChar>) -> Reconciliation {
        let delta = reconcile_in_place(&mut self.sequence, sequence);
        if !delta.is_noop() {
            self.units.apply(&delta, &mut self.surface);
            self.session.clear();
            self.dirty = true;
        }
        delta
    }

    /// Re-runs layout if the sequence or the width changed since the last pass.
    pub fn relayout(&mut self, width: f32, measure: &impl Measure) -> bool {
        if !self.dirty && self.laid_out_width == Some(width) {
            return false;
        }
        self.placed = self.engine.layout(&self.sequence, measure, width);
        self.laid_out_width = Some(width);
        self.dirty = false;
        true
    }

    pub fn set_style(&mut self, style: LayoutStyle) {
        self.engine.set_style(style);
        self.dirty = true;
    }

    pub fn needs_layout(&self) -> bool {
        self.dirty
    }

    pub fn sequence(&self) -> &[AttributedChar] {
        &self.sequence
    }

    pub fn units(&self) -> &UnitList<S::Handle> {
        &self.units
    }

    pub fn units_mut(&mut self) -> &mut UnitList<S::Handle> {
        &mut self.units
    }

    /// Unit rects, or nothing while a layout pass is pending.
    pub fn rects(&self) -> &[Rect] {
        if self.dirty { &[] } else { &self.placed.rects }
    }

    pub fn decorations(&self) -> &[Decoration] {
        &self.placed.decorations
    }

    pub fn total_height(&self) -> f32 {
        self.engine.total_height()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn session(&self) -> &SelectionSession<H> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SelectionSession<H> {
        &mut self.session
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) -> Result<Outcome, HostError> {
        let rects: &[Rect] = if self.dirty { &[] } else { &self.placed.rects };
        self.session.handle(event, rects, &self.sequence)
    }

    pub fn selection_view(&self) -> Option<SelectionView> {
        self.session.view(self.rects())
    }

    pub fn copy_selection(&mut self) -> Result<Option<String>, HostError> {
        self.session.copy(&self.sequence)
    }

    pub fn clear_selection(&mut self) {
        self.session.clear();
    }
}
