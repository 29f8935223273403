use crate::geometry::{Point, Rect};
use crate::model::{AttributedChar, renderable_glyphs};
use unicode_general_category::{GeneralCategory, get_general_category};

/// Vertical tolerance for treating two rects as the same visual line.
const SAME_LINE_TOLERANCE: f32 = 1.0;
const ADJACENCY_TOLERANCE: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SelectionRange {
    pub start: usize,
    pub len: usize,
}

impl SelectionRange {
    pub const fn new(start: usize, len: usize) -> Self {
        Self { start, len }
    }

    pub fn spanning(a: usize, b: usize) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Self::new(low, high - low + 1)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Index of the last selected unit. For an empty range this is `start`.
    pub fn last(&self) -> usize {
        self.start + self.len.saturating_sub(1)
    }

    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handle {
    Start,
    End,
}

/// Maps a point to a unit index.
///
/// The first rect containing the point wins. Otherwise the closest rect is chosen: rects whose
/// vertical span covers the point compare by horizontal distance to their center, the rest by
/// euclidean distance to their center. On a tie the lower index wins.
pub fn hit_test(point: Point, rects: &[Rect]) -> Option<usize> {
    if let Some(index) = rects.iter().position(|rect| rect.contains(point)) {
        return Some(index);
    }

    let mut closest: Option<(usize, f32)> = None;
    for (index, rect) in rects.iter().enumerate() {
        let distance = if point.y >= rect.min_y() && point.y <= rect.max_y() {
            (point.x - rect.mid_x()).abs()
        } else {
            point.distance_to(rect.center())
        };
        if closest.is_none_or(|(_, best)| distance < best) {
            closest = Some((index, distance));
        }
    }
    closest.map(|(index, _)| index)
}

pub fn is_word_boundary(ch: char) -> bool {
    ch.is_whitespace() || is_punctuation(ch)
}

fn is_punctuation(ch: char) -> bool {
    matches!(
        get_general_category(ch),
        GeneralCategory::ConnectorPunctuation
            | GeneralCategory::DashPunctuation
            | GeneralCategory::OpenPunctuation
            | GeneralCategory::ClosePunctuation
            | GeneralCategory::InitialPunctuation
            | GeneralCategory::FinalPunctuation
            | GeneralCategory::OtherPunctuation
    )
}

/// Expands `index` to the surrounding word over renderable units only.
///
/// The range grows left from `index` while the preceding unit is not a boundary and right while
/// the following unit is not a boundary. The unit at `index` itself is always included.
pub fn word_range_at(index: usize, sequence: &[AttributedChar]) -> Option<SelectionRange> {
    let glyphs: Vec<char> = renderable_glyphs(sequence).map(|(ch, _)| ch).collect();
    if index >= glyphs.len() {
        return None;
    }

    let mut start = index;
    while start > 0 && !is_word_boundary(glyphs[start - 1]) {
        start -= 1;
    }
    let mut last = index;
    while last + 1 < glyphs.len() && !is_word_boundary(glyphs[last + 1]) {
        last += 1;
    }
    Some(SelectionRange::spanning(start, last))
}

pub fn line_range_at(index: usize, rects: &[Rect]) -> Option<SelectionRange> {
    let row_y = rects.get(index)?.min_y();
    let same_row = |rect: &Rect| (rect.min_y() - row_y).abs() < SAME_LINE_TOLERANCE;

    let mut start = index;
    while start > 0 && same_row(&rects[start - 1]) {
        start -= 1;
    }
    let mut last = index;
    while last + 1 < rects.len() && same_row(&rects[last + 1]) {
        last += 1;
    }
    Some(SelectionRange::spanning(start, last))
}

pub fn extend_selection(anchor: usize, current: usize) -> SelectionRange {
    SelectionRange::spanning(anchor, current)
}

/// Moves one handle to `new_index`.
///
/// Dragging a handle past the opposite one swaps their roles; the returned handle is the one
/// that follows the pointer from now on.
pub fn drag_handle(handle: Handle, new_index: usize, current: SelectionRange) -> (SelectionRange, Handle) {
    match handle {
        Handle::Start => {
            let last = current.last();
            if new_index <= last {
                (SelectionRange::spanning(new_index, last), Handle::Start)
            } else {
                (SelectionRange::spanning(last, new_index), Handle::End)
            }
        }
        Handle::End => {
            let start = current.start;
            if new_index >= start {
                (SelectionRange::spanning(start, new_index), Handle::End)
            } else {
                (SelectionRange::spanning(new_index, start), Handle::Start)
            }
        }
    }
}

pub fn merge_rects(rects: &[Rect]) -> Vec<Rect> {
    let Some((&first, rest)) = rects.split_first() else {
        return Vec::new();
    };

    let mut merged = Vec::new();
    let mut current = first;
    for rect in rest {
        if (rect.min_y() - current.min_y()).abs() < SAME_LINE_TOLERANCE
            && (rect.min_x() - current.max_x()).abs() < ADJACENCY_TOLERANCE
        {
            current = current.union(rect);
        } else {
            merged.push(current);
            current = *rect;
        }
    }
    merged.push(current);
    merged
}

pub fn selection_rects(range: SelectionRange, rects: &[Rect]) -> Option<&[Rect]> {
    if range.is_empty() || range.start >= rects.len() {
        return None;
    }
    Some(&rects[range.start..range.end().min(rects.len())])
}

pub fn is_point_in_selection(point: Point, range: SelectionRange, rects: &[Rect]) -> bool {
    selection_rects(range, rects).is_some_and(|rects| rects.iter().any(|rect| rect.contains(point)))
}

/// Text of the selected units. A line break between two selected units becomes `\n`.
pub fn selected_text(range: SelectionRange, sequence: &[AttributedChar]) -> String {
    let mut text = String::new();
    let mut unit = 0usize;
    for item in sequence {
        if item.is_renderable() {
            if range.contains(unit) {
                if let Some(ch) = item.glyph {
                    text.push(ch);
                }
            }
            unit += 1;
        } else if item.is_line_break() && unit > range.start && unit < range.end() {
            text.push('\n');
        }
    }
    text
}

/// Where a contextual menu may be placed: above the first row, or below the last as a fallback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MenuAnchor {
    pub first_line: Rect,
    pub last_line: Rect,
}

pub fn menu_anchor(rects: &[Rect]) -> Option<MenuAnchor> {
    let first = rects.first()?;
    let last = rects.last()?;

    let first_line = rects
        .iter()
        .filter(|rect| (rect.min_y() - first.min_y()).abs() < SAME_LINE_TOLERANCE)
        .fold(*first, |acc, rect| acc.union(rect));
    let last_line = rects
        .iter()
        .filter(|rect| (rect.max_y() - last.max_y()).abs() < SAME_LINE_TOLERANCE)
        .fold(*last, |acc, rect| acc.union(rect));

    Some(MenuAnchor {
        first_line,
        last_line,
    })
}

pub fn handle_points(rects: &[Rect]) -> Option<(Point, Point)> {
    let first = rects.first()?;
    let last = rects.last()?;
    Some((first.origin, Point::new(last.max_x(), last.max_y())))
}
