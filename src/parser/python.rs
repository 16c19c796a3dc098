//! Python import extraction.
//!
//! Source text is first folded into logical lines: comments and string
//! contents are dropped, bracketed expressions and backslash continuations
//! are joined. Only module-level lines are scanned for imports.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::errors::BazelifyError;
use crate::core::import::{Member, RawImport};

static IMPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^import\s+(.+)$").expect("valid import regex"));

static FROM_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^from\s+(\.*)\s*([A-Za-z_][\w.]*)?\s+import\s+(.+)$")
        .expect("valid from-import regex")
});

static DOTTED_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_]\w*(\.[A-Za-z_]\w*)*$").expect("valid name regex"));

/// A statement after joining continuation lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    /// Statement text with comments removed and strings emptied
    pub text: String,
    /// Whether the statement starts inside an indented block
    pub indented: bool,
    /// Contents of the string literals emptied from `text`, in order
    pub literals: Vec<String>,
}

/// Fold Python source into logical lines.
pub fn logical_lines(source: &str) -> Vec<LogicalLine> {
    let chars: Vec<char> = source.chars().collect();
    let mut lines = Vec::new();
    let mut buf = String::new();
    let mut literals = Vec::new();
    let mut indented = false;
    let mut line_start = true;
    let mut depth: usize = 0;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if line_start && buf.is_empty() {
            if c == ' ' || c == '\t' || c == '\x0c' {
                indented = true;
                i += 1;
                continue;
            }
            line_start = false;
        }

        match c {
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }
            '\\' if chars.get(i + 1) == Some(&'\n') => {
                buf.push(' ');
                i += 2;
                continue;
            }
            '\\' if chars.get(i + 1) == Some(&'\r') && chars.get(i + 2) == Some(&'\n') => {
                buf.push(' ');
                i += 3;
                continue;
            }
            '\'' | '"' => {
                let end = skip_string(&chars, i);
                literals.push(string_contents(&chars, i, end));
                buf.push_str("\"\"");
                i = end;
                continue;
            }
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            '\n' => {
                if depth > 0 {
                    buf.push(' ');
                } else {
                    let text = buf.trim();
                    if !text.is_empty() {
                        lines.push(LogicalLine {
                            text: text.to_string(),
                            indented,
                            literals: std::mem::take(&mut literals),
                        });
                    }
                    buf.clear();
                    literals.clear();
                    indented = false;
                    line_start = true;
                }
                i += 1;
                continue;
            }
            '\r' => {
                i += 1;
                continue;
            }
            _ => {}
        }

        buf.push(c);
        i += 1;
    }

    let text = buf.trim();
    if !text.is_empty() {
        lines.push(LogicalLine {
            text: text.to_string(),
            indented,
            literals,
        });
    }

    lines
}

/// Text between the quotes of the literal spanning `start..end`.
fn string_contents(chars: &[char], start: usize, end: usize) -> String {
    let quote = chars[start];
    let triple = chars.get(start + 1) == Some(&quote) && chars.get(start + 2) == Some(&quote);
    let width = if triple { 3 } else { 1 };

    let from = (start + width).min(end);
    let to = if end >= from + width && chars[end - width..end].iter().all(|&c| c == quote) {
        end - width
    } else {
        end
    };
    chars[from..to].iter().collect()
}

/// Skip a string literal starting at `start`, returning the index after it.
fn skip_string(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let triple = chars.get(start + 1) == Some(&quote) && chars.get(start + 2) == Some(&quote);
    let mut i = if triple { start + 3 } else { start + 1 };

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            i += 2;
            continue;
        }
        if triple {
            if c == quote && chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote)
            {
                return i + 3;
            }
        } else if c == quote {
            return i + 1;
        } else if c == '\n' {
            // Unterminated single-quoted string; stop at the line end.
            return i;
        }
        i += 1;
    }

    chars.len()
}

/// Rename protobuf generated-module members to their Bazel target names.
///
/// `foo_pb2` becomes `foo_py_pb2` and `foo_pb2_grpc` becomes `foo_py_pb2_grpc`.
pub fn translate_protobuf_name(name: &str) -> String {
    if name.ends_with("_pb2") || name.ends_with("_pb2_grpc") {
        name.replace("_pb2", "_py_pb2")
    } else {
        name.to_string()
    }
}

/// Extract all module-level imports from Python source.
///
/// Fails on `from x import *` since the imported names cannot be known.
pub fn extract_imports(source: &str) -> Result<Vec<RawImport>, BazelifyError> {
    let mut imports = Vec::new();

    for line in logical_lines(source) {
        if line.indented {
            continue;
        }

        for statement in line.text.split(';') {
            parse_statement(statement.trim(), &mut imports)?;
        }
    }

    Ok(imports)
}

fn parse_statement(statement: &str, imports: &mut Vec<RawImport>) -> Result<(), BazelifyError> {
    if let Some(caps) = FROM_IMPORT_RE.captures(statement) {
        let level = caps.get(1).map_or(0, |m| m.as_str().len());
        let base = caps.get(2).map_or("", |m| m.as_str()).to_string();

        if level == 0 && base.is_empty() {
            return Ok(());
        }

        let names = caps.get(3).map_or("", |m| m.as_str()).trim();
        let names = names
            .strip_prefix('(')
            .and_then(|n| n.strip_suffix(')'))
            .unwrap_or(names);

        for name in names.split(',') {
            let Some(name) = name.split_whitespace().next() else {
                continue;
            };

            if name == "*" {
                return Err(BazelifyError::UnsupportedImport {
                    path: Default::default(),
                    statement: format!("from {}{} import *", ".".repeat(level), base),
                    reason: "wildcard imports hide which names are used".to_string(),
                });
            }

            if !DOTTED_NAME_RE.is_match(name) {
                continue;
            }

            imports.push(RawImport {
                base: base.clone(),
                member: Some(Member::Name(translate_protobuf_name(name))),
                level,
            });
        }
    } else if let Some(caps) = IMPORT_RE.captures(statement) {
        let names = caps.get(1).map_or("", |m| m.as_str());
        for name in names.split(',') {
            let Some(name) = name.split_whitespace().next() else {
                continue;
            };
            if DOTTED_NAME_RE.is_match(name) {
                imports.push(RawImport::module(name));
            }
        }
    }

    Ok(())
}
