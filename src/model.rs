use std::sync::Arc;

/// Glyph used for the line-break sentinel between parsed lines.
pub const LINE_BREAK: char = '\n';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CharKind {
    #[default]
    Character,
    HorizontalRule,
}

/// Resolved style of a single parsed character.
///
/// Block attributes (`heading_level`, `blockquote_depth`, `list_level`, `list_marker`) are the
/// same for every character of a line; the inline flags and `link_target` vary per run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Attributes {
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    pub code: bool,
    pub heading_level: usize,
    pub blockquote_depth: usize,
    pub list_level: usize,
    pub list_marker: Option<Arc<str>>,
    pub link_target: Option<Arc<str>>,
}

impl Attributes {
    pub fn is_heading(&self) -> bool {
        self.heading_level > 0
    }

    pub fn is_plain(&self) -> bool {
        *self == Self::default()
    }
}

/// One element of a parsed sequence: a glyph, a line-break sentinel, or a horizontal rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct AttributedChar {
    pub kind: CharKind,
    pub glyph: Option<char>,
    pub attributes: Attributes,
}

impl AttributedChar {
    pub fn new(glyph: char, attributes: Attributes) -> Self {
        Self {
            kind: CharKind::Character,
            glyph: Some(glyph),
            attributes,
        }
    }

    pub fn line_break() -> Self {
        Self::new(LINE_BREAK, Attributes::default())
    }

    pub fn horizontal_rule() -> Self {
        Self {
            kind: CharKind::HorizontalRule,
            glyph: None,
            attributes: Attributes::default(),
        }
    }

    pub fn is_line_break(&self) -> bool {
        self.kind == CharKind::Character && self.glyph == Some(LINE_BREAK)
    }

    pub fn is_rule(&self) -> bool {
        self.kind == CharKind::HorizontalRule
    }

    /// True for items that own a glyph surface and a placement rect.
    pub fn is_renderable(&self) -> bool {
        self.kind == CharKind::Character && matches!(self.glyph, Some(ch) if ch != LINE_BREAK)
    }
}

/// Iterates the renderable glyphs of a sequence, in unit-index order.
pub fn renderable_glyphs(sequence: &[AttributedChar]) -> impl Iterator<Item = (char, &AttributedChar)> {
    sequence
        .iter()
        .filter(|item| item.is_renderable())
        .filter_map(|item| item.glyph.map(|ch| (ch, item)))
}

pub fn renderable_count(sequence: &[AttributedChar]) -> usize {
    sequence.iter().filter(|item| item.is_renderable()).count()
}

/// Plain text of a sequence, with line breaks kept and rules dropped.
pub fn plain_text(sequence: &[AttributedChar]) -> String {
    sequence.iter().filter_map(|item| item.glyph).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_break_is_not_renderable() {
        let item = AttributedChar::line_break();
        assert!(item.is_line_break());
        assert!(!item.is_renderable());
    }

    #[test]
    fn horizontal_rule_is_not_renderable() {
        let item = AttributedChar::horizontal_rule();
        assert!(item.is_rule());
        assert!(!item.is_renderable());
        assert_eq!(item.glyph, None);
    }

    #[test]
    fn renderable_count_skips_sentinels_and_rules() {
        let seq = vec![
            AttributedChar::new('a', Attributes::default()),
            AttributedChar::line_break(),
            AttributedChar::horizontal_rule(),
            AttributedChar::line_break(),
            AttributedChar::new('b', Attributes::default()),
        ];
        assert_eq!(renderable_count(&seq), 2);
        assert_eq!(plain_text(&seq), "a\n\nb");
    }

    #[test]
    fn attribute_equality_includes_link_target() {
        let plain = Attributes::default();
        let linked = Attributes {
            link_target: Some("https://go.dev".into()),
            ..Attributes::default()
        };
        assert!(plain.is_plain());
        assert_ne!(plain, linked);
    }
}
