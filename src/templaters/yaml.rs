//! In-place editing of YAML documents.
//!
//! The document is never re-serialized: block mappings are located by scanning
//! lines and tracking byte offsets, and only the bytes of the addressed scalar
//! are rewritten.

use bytes::Bytes;
use serde_yaml::Value;

use super::PatchError;

struct Line<'a> {
    /// Byte offset of the line in the document.
    start: usize,
    /// Line content without its terminator.
    text: &'a str,
    indent: usize,
}

impl Line<'_> {
    fn body(&self) -> &str {
        &self.text[self.indent..]
    }

    fn is_document_marker(&self) -> bool {
        self.text == "---" || self.text.starts_with("--- ") || self.text == "..."
    }

    /// Blank lines, comments and document markers carry no structure.
    fn is_significant(&self) -> bool {
        let body = self.body().trim();
        !(body.is_empty() || body.starts_with('#') || self.is_document_marker())
    }
}

fn lines(document: &str) -> Vec<Line<'_>> {
    let mut start = 0;
    document
        .split_inclusive('\n')
        .map(|raw| {
            let text = raw.strip_suffix('\n').unwrap_or(raw);
            let text = text.strip_suffix('\r').unwrap_or(text);
            let line = Line {
                start,
                text,
                indent: text.len() - text.trim_start_matches(' ').len(),
            };
            start += raw.len();
            line
        })
        .collect()
}

/// A `key: value` line of a block mapping.
struct Entry<'a> {
    key: String,
    /// Everything after the colon.
    value: &'a str,
    value_start: usize,
}

fn parse_entry<'a>(line: &Line<'a>) -> Option<Entry<'a>> {
    let text: &'a str = line.text;
    let body = &text[line.indent..];
    let (key, colon) = if body.starts_with('"') || body.starts_with('\'') {
        let (key, len) = quoted(body)?;
        let after = body[len..].trim_start_matches(' ');
        if !after.starts_with(':') {
            return None;
        }
        (key, body.len() - after.len())
    } else {
        let colon = body.match_indices(':').map(|(i, _)| i).find(|&i| {
            matches!(body.as_bytes().get(i + 1), None | Some(b' ') | Some(b'\t'))
        })?;
        (body[..colon].trim_end().to_string(), colon)
    };

    let value = &body[colon + 1..];
    if !(value.is_empty() || value.starts_with([' ', '\t'])) {
        return None;
    }
    Some(Entry {
        key,
        value,
        value_start: line.start + line.indent + colon + 1,
    })
}

/// Reads a quoted scalar at the start of `s`, returning its content and its length including quotes.
fn quoted(s: &str) -> Option<(String, usize)> {
    let quote = s.chars().next()?;
    let mut content = String::new();
    let mut chars = s.char_indices().skip(1).peekable();
    while let Some((i, c)) = chars.next() {
        if c == quote {
            if quote == '\'' && matches!(chars.peek(), Some((_, '\''))) {
                chars.next();
                content.push('\'');
                continue;
            }
            return Some((content, i + 1));
        }
        if c == '\\' && quote == '"' {
            let (_, escaped) = chars.next()?;
            content.push(match escaped {
                'n' => '\n',
                't' => '\t',
                other => other,
            });
            continue;
        }
        content.push(c);
    }
    None
}

/// Splits anchors and tags off the front of a value.
///
/// Returns the offset just past the last property and the remaining value.
fn split_properties(value: &str) -> (usize, &str) {
    let mut end = 0;
    let mut rest = value.trim_start_matches([' ', '\t']);
    while rest.starts_with('&') || rest.starts_with('!') {
        let token = rest.find([' ', '\t']).unwrap_or(rest.len());
        end = value.len() - rest.len() + token;
        rest = rest[token..].trim_start_matches([' ', '\t']);
    }
    (end, rest)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Style {
    Plain,
    SingleQuoted,
    DoubleQuoted,
}

/// The byte range to replace and how to write the new value into it.
struct Target {
    start: usize,
    end: usize,
    style: Style,
    prefix: &'static str,
}

/// Finds the mapping entry named `segment` among the lines `from..to`.
///
/// Returns the entry's line index and the end of the lines nested under it.
fn find_entry<'a>(
    lines: &[Line<'a>],
    from: usize,
    to: usize,
    segment: &str,
) -> Option<(usize, Entry<'a>, usize)> {
    let indent = lines[from..to]
        .iter()
        .find(|line| line.is_significant())?
        .indent;
    let (index, entry) = (from..to)
        .filter(|&i| lines[i].is_significant() && lines[i].indent == indent)
        .find_map(|i| {
            parse_entry(&lines[i])
                .filter(|entry| entry.key == segment)
                .map(|entry| (i, entry))
        })?;
    let end = (index + 1..to)
        .find(|&i| lines[i].is_significant() && lines[i].indent <= indent)
        .unwrap_or(to);
    Some((index, entry, end))
}

fn locate(lines: &[Line<'_>], key: &str) -> Option<Target> {
    let segments: Vec<&str> = key.split('.').collect();
    let (last, parents) = segments.split_last()?;

    let (mut from, mut to) = (0, lines.len());
    for segment in parents {
        let (index, entry, end) = find_entry(lines, from, to, segment)?;
        let (_, rest) = split_properties(entry.value);
        let nested = (index + 1..end).any(|i| lines[i].is_significant());
        if !(rest.is_empty() || rest.starts_with('#')) || !nested {
            return None;
        }
        (from, to) = (index + 1, end);
    }

    let (index, entry, end) = find_entry(lines, from, to, last)?;
    let indent = lines[index].indent;
    let nested = (index + 1..end).any(|i| lines[i].is_significant());
    let (properties_end, rest) = split_properties(entry.value);
    let start = entry.value_start + entry.value.len() - rest.len();
    // end of the last non-blank line indented under the entry; comments after it stay
    let block_end = (index + 1..end)
        .rev()
        .find(|&i| lines[i].indent > indent && !lines[i].text.trim().is_empty())
        .map(|i| lines[i].start + lines[i].text.len());

    match rest.chars().next() {
        None | Some('#') => {
            let sequence_follows = end < to
                && lines[end].indent == indent
                && lines[end].body().starts_with('-');
            if nested || sequence_follows {
                return None;
            }
            let at = entry.value_start + properties_end;
            Some(Target {
                start: at,
                end: at,
                style: Style::Plain,
                prefix: " ",
            })
        }
        Some('{') | Some('[') => None,
        Some('|') | Some('>') => Some(Target {
            start,
            end: block_end.unwrap_or(start + rest.trim_end().len()),
            style: Style::Plain,
            prefix: "",
        }),
        Some(quote @ ('"' | '\'')) => {
            // quoted scalars spanning several lines are not supported
            let (_, len) = quoted(rest)?;
            Some(Target {
                start,
                end: start + len,
                style: if quote == '"' {
                    Style::DoubleQuoted
                } else {
                    Style::SingleQuoted
                },
                prefix: "",
            })
        }
        Some(_) => {
            let scalar = match rest.find(" #").or_else(|| rest.find("\t#")) {
                Some(comment) => &rest[..comment],
                None => rest,
            };
            let end = match block_end {
                // a plain scalar continued on the following lines
                Some(block_end) if nested => block_end,
                _ => start + scalar.trim_end().len(),
            };
            Some(Target {
                start,
                end,
                style: Style::Plain,
                prefix: "",
            })
        }
    }
}

fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\t', "\\t")
}

/// Whether `value` written unquoted reads back as the same string.
fn is_plain_safe(value: &str) -> bool {
    !value.contains(['\n', '\r'])
        && matches!(serde_yaml::from_str::<Value>(value), Ok(Value::String(parsed)) if parsed == value)
}

fn render(style: Style, value: &str) -> String {
    match style {
        Style::SingleQuoted if !value.contains(['\n', '\r']) => {
            format!("'{}'", value.replace('\'', "''"))
        }
        Style::Plain if is_plain_safe(value) => value.to_string(),
        _ => format!("\"{}\"", escape(value)),
    }
}

/// Replaces the scalar at the dotted `key` path with `value`, leaving every other byte untouched.
pub fn update_file(file: &Bytes, key: &str, value: &str) -> Result<Bytes, PatchError> {
    let document = std::str::from_utf8(file).map_err(|_| PatchError::Encoding)?;
    let target = locate(&lines(document), key)
        .ok_or_else(|| PatchError::KeyNotFound(key.to_string()))?;

    let mut patched = String::with_capacity(document.len() + value.len());
    patched.push_str(&document[..target.start]);
    patched.push_str(target.prefix);
    patched.push_str(&render(target.style, value));
    patched.push_str(&document[target.end..]);
    Ok(Bytes::from(patched))
}
