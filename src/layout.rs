use crate::geometry::{Rect, Size};
use crate::model::{AttributedChar, Attributes};
use log::trace;
use std::sync::Arc;

/// Measurement capability supplied by whatever renders the units.
pub trait Measure {
    fn unit_size(&self, index: usize, item: &AttributedChar) -> Size;

    fn text_size(&self, text: &str, attributes: &Attributes) -> Size;
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutStyle {
    pub base_line_height: f32,
    /// Multiplier applied to a row's tallest unit when advancing to the next row.
    pub line_spacing: f32,
    pub line_gap: f32,
    /// Extra space after heading lines, on top of `line_gap`.
    pub heading_gap: f32,
    pub indent_unit: f32,
    pub quote_bar_offset: f32,
    pub quote_bar_width: f32,
    pub marker_gap: f32,
    /// Space above and below a rule, as a multiple of the base line height.
    pub rule_spacing: f32,
    pub rule_thickness: f32,
}

impl Default for LayoutStyle {
    fn default() -> Self {
        Self {
            base_line_height: 20.0,
            line_spacing: 1.2,
            line_gap: 4.0,
            heading_gap: 8.0,
            indent_unit: 25.0,
            quote_bar_offset: 15.0,
            quote_bar_width: 2.0,
            marker_gap: 5.0,
            rule_spacing: 0.6,
            rule_thickness: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecorationKind {
    Rule,
    /// Vertical bar for one blockquote nesting level, starting at 1.
    QuoteBar(usize),
    ListMarker(Arc<str>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decoration {
    pub kind: DecorationKind,
    pub frame: Rect,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayoutResult {
    pub rects: Vec<Rect>,
    pub decorations: Vec<Decoration>,
    pub total_height: f32,
}

/// Lays out a parsed sequence into per-unit rects.
///
/// Lines are split at line-break sentinels. Each line starts at its indent, which is derived from
/// the blockquote depth and list level of its first character; units flow left to right and wrap
/// back to the indent when the next one would cross `container_width`. The first unit of a row
/// never wraps, so a unit wider than the container still gets a rect.
pub fn layout(
    sequence: &[AttributedChar],
    measure: &impl Measure,
    container_width: f32,
    style: &LayoutStyle,
) -> LayoutResult {
    if sequence.is_empty() {
        return LayoutResult::default();
    }

    let base = style.base_line_height;
    let mut result = LayoutResult::default();
    let mut y = 0.0_f32;
    let mut unit_index = 0usize;

    for line in sequence.split(|item| item.is_line_break()) {
        let Some(first) = line.first() else {
            y += base * style.line_spacing + style.line_gap;
            continue;
        };

        if first.is_rule() {
            y += style.rule_spacing * base;
            result.decorations.push(Decoration {
                kind: DecorationKind::Rule,
                frame: Rect::new(0.0, y, container_width, style.rule_thickness),
            });
            y += style.rule_spacing * base;
            continue;
        }

        let attributes = &first.attributes;
        let indent = (attributes.blockquote_depth + attributes.list_level) as f32 * style.indent_unit;
        let line_top = y;

        if let Some(marker) = &attributes.list_marker {
            let size = measure.text_size(marker, attributes);
            result.decorations.push(Decoration {
                kind: DecorationKind::ListMarker(Arc::clone(marker)),
                frame: Rect::new(indent - size.width - style.marker_gap, y, size.width, size.height),
            });
        }

        let mut x = indent;
        let mut max_height = base;
        for item in line.iter().filter(|item| item.is_renderable()) {
            let size = measure.unit_size(unit_index, item);
            if x + size.width > container_width && x > indent {
                y += max_height * style.line_spacing;
                x = indent;
                max_height = base;
            }
            result.rects.push(Rect::new(x, y, size.width, size.height));
            x += size.width;
            max_height = max_height.max(size.height);
            unit_index += 1;
        }

        let line_bottom = y + max_height * style.line_spacing;
        for level in 1..=attributes.blockquote_depth {
            let bar_x = level as f32 * style.indent_unit - style.quote_bar_offset;
            result.decorations.push(Decoration {
                kind: DecorationKind::QuoteBar(level),
                frame: Rect::new(bar_x, line_top, style.quote_bar_width, line_bottom - line_top),
            });
        }

        y = line_bottom + style.line_gap;
        if attributes.is_heading() {
            y += style.heading_gap;
        }
    }

    result.total_height = y;
    trace!(
        "layout: {} rects, {} decorations, height {:.1} at width {:.1}",
        result.rects.len(),
        result.decorations.len(),
        result.total_height,
        container_width
    );
    result
}

#[derive(Debug, Clone, Default)]
pub struct LayoutEngine {
    style: LayoutStyle,
    total_height: f32,
}

impl LayoutEngine {
    pub fn new(style: LayoutStyle) -> Self {
        Self {
            style,
            total_height: 0.0,
        }
    }

    pub fn style(&self) -> &LayoutStyle {
        &self.style
    }

    pub fn set_style(&mut self, style: LayoutStyle) {
        self.style = style;
    }

    pub fn total_height(&self) -> f32 {
        self.total_height
    }

    pub fn layout(
        &mut self,
        sequence: &[AttributedChar],
        measure: &impl Measure,
        container_width: f32,
    ) -> LayoutResult {
        let result = layout(sequence, measure, container_width, &self.style);
        self.total_height = result.total_height;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::parse_markdown;
    use pretty_assertions::assert_eq;

    /// Every unit is 10 wide; heading units are 30 tall, the rest 20.
    struct FixedMeasure;

    impl Measure for FixedMeasure {
        fn unit_size(&self, _index: usize, item: &AttributedChar) -> Size {
            let height = if item.attributes.is_heading() { 30.0 } else { 20.0 };
            Size::new(10.0, height)
        }

        fn text_size(&self, text: &str, _attributes: &Attributes) -> Size {
            Size::new(10.0 * text.chars().count() as f32, 20.0)
        }
    }

    fn style() -> LayoutStyle {
        LayoutStyle {
            base_line_height: 20.0,
            line_spacing: 1.0,
            line_gap: 5.0,
            heading_gap: 7.0,
            rule_spacing: 0.5,
            ..LayoutStyle::default()
        }
    }

    #[test]
    fn empty_sequence_has_no_height() {
        let result = layout(&[], &FixedMeasure, 100.0, &style());
        assert_eq!(result, LayoutResult::default());
    }

    #[test]
    fn single_line_flows_left_to_right() {
        let result = layout(&parse_markdown("abc"), &FixedMeasure, 100.0, &style());
        assert_eq!(
            result.rects,
            vec![
                Rect::new(0.0, 0.0, 10.0, 20.0),
                Rect::new(10.0, 0.0, 10.0, 20.0),
                Rect::new(20.0, 0.0, 10.0, 20.0),
            ]
        );
        assert_eq!(result.total_height, 25.0);
    }

    #[test]
    fn wraps_when_exceeding_width() {
        let result = layout(&parse_markdown("abcde"), &FixedMeasure, 30.0, &style());
        let origins: Vec<(f32, f32)> = result.rects.iter().map(|r| (r.min_x(), r.min_y())).collect();
        assert_eq!(
            origins,
            vec![(0.0, 0.0), (10.0, 0.0), (20.0, 0.0), (0.0, 20.0), (10.0, 20.0)]
        );
        assert_eq!(result.total_height, 45.0);
    }

    #[test]
    fn overlong_first_unit_is_not_wrapped() {
        let result = layout(&parse_markdown("ab"), &FixedMeasure, 5.0, &style());
        assert_eq!(result.rects[0], Rect::new(0.0, 0.0, 10.0, 20.0));
        assert_eq!(result.rects[1], Rect::new(0.0, 20.0, 10.0, 20.0));
    }

    #[test]
    fn heading_line_uses_tallest_unit_and_extra_gap() {
        let result = layout(&parse_markdown("# H\nb"), &FixedMeasure, 100.0, &style());
        assert_eq!(result.rects[0], Rect::new(0.0, 0.0, 10.0, 30.0));
        assert_eq!(result.rects[1], Rect::new(0.0, 42.0, 10.0, 20.0));
        assert_eq!(result.total_height, 67.0);
    }

    #[test]
    fn blank_line_advances_one_base_line() {
        let result = layout(&parse_markdown("a\n\nb"), &FixedMeasure, 100.0, &style());
        assert_eq!(result.rects[1].min_y(), 50.0);
    }

    #[test]
    fn horizontal_rule_spacing() {
        let result = layout(&parse_markdown("a\n---\nb"), &FixedMeasure, 100.0, &style());
        assert_eq!(result.rects.len(), 2);
        assert_eq!(
            result.decorations,
            vec![Decoration {
                kind: DecorationKind::Rule,
                frame: Rect::new(0.0, 35.0, 100.0, 1.0),
            }]
        );
        assert_eq!(result.rects[1].min_y(), 45.0);
    }

    #[test]
    fn list_and_quote_indent_and_decorations() {
        let result = layout(&parse_markdown("> - item"), &FixedMeasure, 500.0, &style());
        assert_eq!(result.rects[0].min_x(), 50.0);
        assert_eq!(
            result.decorations,
            vec![
                Decoration {
                    kind: DecorationKind::ListMarker("•".into()),
                    frame: Rect::new(35.0, 0.0, 10.0, 20.0),
                },
                Decoration {
                    kind: DecorationKind::QuoteBar(1),
                    frame: Rect::new(10.0, 0.0, 2.0, 20.0),
                },
            ]
        );
    }

    #[test]
    fn quote_bar_spans_wrapped_rows() {
        let result = layout(&parse_markdown("> abcd"), &FixedMeasure, 50.0, &style());
        let bar = result
            .decorations
            .iter()
            .find(|d| d.kind == DecorationKind::QuoteBar(1))
            .expect("quote bar");
        assert_eq!(bar.frame.size.height, 40.0);
        assert_eq!(result.rects[2].origin.x, 25.0);
        assert_eq!(result.rects[2].origin.y, 20.0);
    }

    #[test]
    fn wrapped_rows_return_to_indent() {
        let result = layout(&parse_markdown("- abcdef"), &FixedMeasure, 60.0, &style());
        let xs: Vec<f32> = result.rects.iter().map(|r| r.min_x()).collect();
        assert_eq!(xs, vec![25.0, 35.0, 45.0, 25.0, 35.0, 45.0]);
    }

    #[test]
    fn engine_caches_total_height() {
        let mut engine = LayoutEngine::new(style());
        let result = engine.layout(&parse_markdown("a\nb"), &FixedMeasure, 100.0);
        assert_eq!(engine.total_height(), result.total_height);
        assert_eq!(engine.total_height(), 50.0);
    }
}
