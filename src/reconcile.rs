use crate::model::AttributedChar;
use log::debug;

/// Result of diffing a previous parsed sequence against the next one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reconciliation {
    /// Length of the longest common prefix.
    pub keep_count: usize,
    /// Items of the previous sequence past `keep_count`.
    pub removed_tail_count: usize,
    /// Renderable units among the removed items; these own handles that must be destroyed.
    pub removed_units: usize,
    pub appended_tail: Vec<AttributedChar>,
}

impl Reconciliation {
    pub fn is_noop(&self) -> bool {
        self.removed_tail_count == 0 && self.appended_tail.is_empty()
    }

    pub fn appended_units(&self) -> usize {
        self.appended_tail
            .iter()
            .filter(|item| item.is_renderable())
            .count()
    }
}

pub fn common_prefix_len(previous: &[AttributedChar], next: &[AttributedChar]) -> usize {
    previous
        .iter()
        .zip(next)
        .take_while(|(a, b)| a == b)
        .count()
}

pub fn reconcile(previous: &[AttributedChar], next: &[AttributedChar]) -> Reconciliation {
    let keep_count = common_prefix_len(previous, next);
    let removed = &previous[keep_count..];
    Reconciliation {
        keep_count,
        removed_tail_count: removed.len(),
        removed_units: removed.iter().filter(|item| item.is_renderable()).count(),
        appended_tail: next[keep_count..].to_vec(),
    }
}

/// Diffs `next` against the stored snapshot and replaces the snapshot with `next`.
pub fn reconcile_in_place(previous: &mut Vec<AttributedChar>, next: Vec<AttributedChar>) -> Reconciliation {
    let delta = reconcile(previous, &next);
    if !delta.is_noop() {
        debug!(
            "reconcile: keep {} drop {} ({} units) append {} ({} units)",
            delta.keep_count,
            delta.removed_tail_count,
            delta.removed_units,
            delta.appended_tail.len(),
            delta.appended_units()
        );
        *previous = next;
    }
    delta
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entrance {
    /// Show at once; used when a whole sequence is rebuilt.
    Immediate,
    /// Play the entrance effect; used for units appended after kept content.
    Animated,
}

/// The rendering collaborator: owns whatever draws a single styled glyph.
pub trait GlyphSurface {
    type Handle;

    /// `index` is the unit index (renderable characters only) the new unit will occupy.
    fn create_unit(&mut self, index: usize, item: &AttributedChar, entrance: Entrance) -> Self::Handle;

    fn destroy_unit(&mut self, handle: Self::Handle);
}

/// Rendering handles, index-aligned with the renderable units of the current sequence.
#[derive(Debug)]
pub struct UnitList<H> {
    handles: Vec<H>,
}

impl<H> Default for UnitList<H> {
    fn default() -> Self {
        Self {
            handles: Vec::new(),
        }
    }
}

impl<H> UnitList<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&H> {
        self.handles.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut H> {
        self.handles.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &H> {
        self.handles.iter()
    }

    /// Destroys the removed tail (last unit first) and creates the appended units in order.
    pub fn apply<S>(&mut self, delta: &Reconciliation, surface: &mut S)
    where
        S: GlyphSurface<Handle = H>,
    {
        let keep_units = self.handles.len().saturating_sub(delta.removed_units);
        while self.handles.len() > keep_units {
            if let Some(handle) = self.handles.pop() {
                surface.destroy_unit(handle);
            }
        }

        let entrance = if delta.keep_count > 0 {
            Entrance::Animated
        } else {
            Entrance::Immediate
        };
        for item in delta.appended_tail.iter().filter(|item| item.is_renderable()) {
            let handle = surface.create_unit(self.handles.len(), item, entrance);
            self.handles.push(handle);
        }
    }

    pub fn clear<S>(&mut self, surface: &mut S)
    where
        S: GlyphSurface<Handle = H>,
    {
        while let Some(handle) = self.handles.pop() {
            surface.destroy_unit(handle);
        }
    }
}
