use crate::model::{AttributedChar, Attributes};
use std::borrow::Cow;
use std::ops::Range;
use std::sync::Arc;

const LIST_INDENT_COLUMNS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Columns a tab contributes when measuring list indentation.
    pub tab_width: usize,
    pub bullet: String,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            tab_width: 4,
            bullet: "•".to_string(),
        }
    }
}

pub fn parse_markdown(input: &str) -> Vec<AttributedChar> {
    parse_markdown_with(input, &ParseOptions::default())
}

/// Parses a whole buffer into a flat sequence of attributed characters.
///
/// The output for a line only depends on that line and on the fence lines above it, so
/// re-parsing a buffer that grew at the end yields the previous output as a prefix (unless the
/// last line held an unterminated inline marker that the new text closes).
pub fn parse_markdown_with(input: &str, options: &ParseOptions) -> Vec<AttributedChar> {
    let normalized = normalize_line_endings(input);
    let lines: Vec<&str> = normalized.split('\n').collect();
    let last_line = lines.len().saturating_sub(1);

    let mut items: Vec<AttributedChar> = Vec::with_capacity(normalized.len());
    let bullet: Arc<str> = Arc::from(options.bullet.as_str());
    let mut in_code_block = false;

    for (line_idx, line) in lines.iter().enumerate() {
        let chars: Vec<char> = line.chars().collect();

        if is_horizontal_rule(&chars) {
            items.push(AttributedChar::horizontal_rule());
        } else if line.starts_with("```") {
            in_code_block = !in_code_block;
            continue;
        } else {
            let mut base = Attributes {
                code: in_code_block,
                ..Attributes::default()
            };
            let content = extract_block_attributes(&chars, &mut base, options, &bullet);
            push_line_content(content, &base, &mut items);
        }

        if line_idx < last_line {
            items.push(AttributedChar::line_break());
        }
    }

    items
}

fn normalize_line_endings(input: &str) -> Cow<'_, str> {
    if input.contains('\r') {
        Cow::Owned(input.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(input)
    }
}

/// Three or more `-`, `*` or `_` (the same one), optionally separated by spaces, after at most
/// three spaces of indentation.
fn is_horizontal_rule(line: &[char]) -> bool {
    let indent = line.iter().take_while(|&&ch| ch == ' ').count();
    if indent > 3 {
        return false;
    }
    let rest = &line[indent..];
    let Some(&marker) = rest.first() else {
        return false;
    };
    if !matches!(marker, '-' | '*' | '_') {
        return false;
    }

    let mut count = 0usize;
    let mut trailing = false;
    for &ch in rest {
        if trailing {
            if !ch.is_whitespace() {
                return false;
            }
        } else if ch == marker {
            count += 1;
        } else if ch == ' ' {
            continue;
        } else if ch.is_whitespace() {
            trailing = true;
        } else {
            return false;
        }
    }
    count >= 3
}

fn extract_block_attributes<'a>(
    line: &'a [char],
    attributes: &mut Attributes,
    options: &ParseOptions,
    bullet: &Arc<str>,
) -> &'a [char] {
    let mut rest = line;

    let hashes = rest.iter().take_while(|&&ch| ch == '#').count();
    if hashes > 0 && rest.get(hashes) == Some(&' ') {
        attributes.heading_level = hashes;
        rest = &rest[hashes + 1..];
    }

    let mut depth = 0usize;
    let mut consumed = 0usize;
    let mut columns = 0usize;
    while let Some(&ch) = rest.get(consumed) {
        if ch == '>' {
            depth += 1;
            consumed += 1;
            columns += 1;
            if rest.get(consumed) == Some(&' ') {
                consumed += 1;
                columns += 1;
            }
        } else if ch.is_whitespace() {
            consumed += 1;
            columns += if ch == '\t' { options.tab_width.max(1) } else { 1 };
        } else {
            break;
        }
    }
    attributes.blockquote_depth = depth;
    rest = &rest[consumed..];

    if let Some((marker, len)) = match_list_marker(rest) {
        attributes.list_level = columns / LIST_INDENT_COLUMNS + 1;
        attributes.list_marker = Some(match marker.as_str() {
            "*" | "-" => Arc::clone(bullet),
            _ => Arc::from(marker.as_str()),
        });
        rest = &rest[len..];
    }

    rest
}

// `*`, `-` or `<digits>.` followed by whitespace; returns the marker and the chars to strip.
fn match_list_marker(content: &[char]) -> Option<(String, usize)> {
    let marker_len = match content.first()? {
        '*' | '-' => 1,
        ch if ch.is_ascii_digit() => {
            let digits = content.iter().take_while(|ch| ch.is_ascii_digit()).count();
            if content.get(digits) != Some(&'.') {
                return None;
            }
            digits + 1
        }
        _ => return None,
    };
    let spaces = content[marker_len..]
        .iter()
        .take_while(|ch| ch.is_whitespace())
        .count();
    if spaces == 0 {
        return None;
    }
    Some((content[..marker_len].iter().collect(), marker_len + spaces))
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LinkMatch {
    start: usize,
    text: Range<usize>,
    url: Range<usize>,
    end: usize,
}

/// Finds the leftmost `!*[text](url)` at or after `from`. Text and url must be non-empty.
fn find_link(content: &[char], from: usize) -> Option<LinkMatch> {
    let mut open = from;
    while open < content.len() {
        if content[open] != '[' {
            open += 1;
            continue;
        }
        let text_start = open + 1;
        // Without a closing bracket no later `[` can match either.
        let close = text_start + content[text_start..].iter().position(|&ch| ch == ']')?;
        if close == text_start {
            open += 1;
            continue;
        }
        if content.get(close + 1) != Some(&'(') {
            open = close + 1;
            continue;
        }
        let url_start = close + 2;
        let paren = url_start + content[url_start..].iter().position(|&ch| ch == ')')?;
        if paren == url_start {
            open = close + 1;
            continue;
        }

        let mut start = open;
        while start > from && content[start - 1] == '!' {
            start -= 1;
        }
        return Some(LinkMatch {
            start,
            text: text_start..close,
            url: url_start..paren,
            end: paren + 1,
        });
    }
    None
}

fn push_line_content(content: &[char], base: &Attributes, items: &mut Vec<AttributedChar>) {
    let mut cursor = 0usize;
    while let Some(link) = find_link(content, cursor) {
        parse_inline(&content[cursor..link.start], base, items);

        let url: String = content[link.url.clone()].iter().collect();
        let link_attributes = Attributes {
            link_target: Some(Arc::from(url)),
            ..base.clone()
        };
        parse_inline(&content[link.text.clone()], &link_attributes, items);

        cursor = link.end;
    }
    parse_inline(&content[cursor..], base, items);
}

/// Walks a run of text toggling inline flags on marker characters.
///
/// Markers flip their flag; an unmatched opener leaves it set until the end of the run.
fn parse_inline(content: &[char], base: &Attributes, items: &mut Vec<AttributedChar>) {
    let mut current = base.clone();
    let mut idx = 0usize;
    while idx < content.len() {
        let ch = content[idx];
        let next = content.get(idx + 1).copied();
        match (ch, next) {
            ('*', Some('*')) => {
                current.bold = !current.bold;
                idx += 2;
            }
            ('~', Some('~')) => {
                current.strikethrough = !current.strikethrough;
                idx += 2;
            }
            ('*' | '_', _) => {
                current.italic = !current.italic;
                idx += 1;
            }
            ('`', _) => {
                current.code = !current.code;
                idx += 1;
            }
            _ => {
                items.push(AttributedChar::new(ch, current.clone()));
                idx += 1;
            }
        }
    }
}
