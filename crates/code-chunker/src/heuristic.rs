//! Line-based chunking used when a file cannot be parsed structurally.
//!
//! Python is split by indentation; brace languages by matching `{`/`}` from a
//! top-level declaration line. The output is best-effort and never fails.

use crate::language::Language;
use crate::text::{indent_width, LineIndex};
use crate::types::{ChunkKind, Span};
use once_cell::sync::Lazy;
use regex::Regex;

static JS_DECL: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:export\s+)?(?:default\s+)?(?:declare\s+)?(?:abstract\s+)?(?:async\s+)?(function\*?|class|interface|enum)\s*([A-Za-z_$][\w$]*)?",
    )
    .ok()
});

static JS_BINDING: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*(?:async\s+)?(?:function\b|\([^)]*\)\s*(?::[^=]+)?=>|[A-Za-z_$][\w$]*\s*=>)",
    )
    .ok()
});

static RUST_DECL: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r#"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:(?:async|unsafe|const|default|extern(?:\s+"[^"]*")?)\s+)*(fn|struct|enum|trait|union|impl|mod)\b\s*(?:<[^>]*>\s*)?([A-Za-z_][\w:]*)?"#,
    )
    .ok()
});

/// A definition expressed as an inclusive line range
#[derive(Debug, Clone, PartialEq, Eq)]
struct LineUnit {
    qualified_name: String,
    kind: ChunkKind,
    first: usize,
    last: usize,
}

/// Best-effort definition spans from indentation or brace structure
pub(crate) fn fallback_spans(content: &str, language: Language) -> Vec<Span> {
    let index = LineIndex::new(content);
    let mut units = if language.uses_indentation() {
        indentation_units(&index)
    } else {
        brace_units(&index, language)
    };
    units.sort_by_key(|u| u.first);

    units
        .into_iter()
        .map(|unit| Span {
            qualified_name: unit.qualified_name,
            kind: unit.kind,
            start_byte: index.line_start(unit.first),
            end_byte: index.line_end(unit.last),
            start_line: unit.first,
        })
        .collect()
}

fn python_header(line: &str) -> Option<(ChunkKind, &str)> {
    let trimmed = line.trim_start();
    let rest = trimmed
        .strip_prefix("async ")
        .map_or(trimmed, str::trim_start);
    let (kind, rest) = if let Some(rest) = rest.strip_prefix("def ") {
        (ChunkKind::Function, rest)
    } else if let Some(rest) = rest.strip_prefix("class ") {
        (ChunkKind::Class, rest)
    } else {
        return None;
    };
    let rest = rest.trim_start();
    let end = rest
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    (end > 0).then(|| (kind, &rest[..end]))
}

struct OpenScope {
    indent: usize,
    qualified_name: String,
    kind: ChunkKind,
    first: usize,
    header_emitted: bool,
}

fn close_scope(scope: OpenScope, last: usize, units: &mut Vec<LineUnit>) {
    if scope.kind == ChunkKind::Function || !scope.header_emitted {
        units.push(LineUnit {
            qualified_name: scope.qualified_name,
            kind: scope.kind,
            first: scope.first,
            last: last.max(scope.first),
        });
    }
}

fn indentation_units(index: &LineIndex) -> Vec<LineUnit> {
    let mut units = Vec::new();
    let mut stack: Vec<OpenScope> = Vec::new();
    let mut last_code_line = 0;

    for line_no in 0..index.line_count() {
        let line = index.line(line_no);
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let indent = indent_width(line);

        while stack.last().is_some_and(|top| indent <= top.indent) {
            if let Some(scope) = stack.pop() {
                close_scope(scope, last_code_line, &mut units);
            }
        }

        if let Some((kind, name)) = python_header(line) {
            let qualified_name = match stack.last_mut() {
                Some(parent) if parent.kind == ChunkKind::Function => None,
                Some(parent) => {
                    if !parent.header_emitted {
                        units.push(LineUnit {
                            qualified_name: parent.qualified_name.clone(),
                            kind: ChunkKind::Class,
                            first: parent.first,
                            last: last_code_line,
                        });
                        parent.header_emitted = true;
                    }
                    Some(format!("{}.{name}", parent.qualified_name))
                }
                None => Some(name.to_string()),
            };
            if let Some(qualified_name) = qualified_name {
                stack.push(OpenScope {
                    indent,
                    qualified_name,
                    kind,
                    first: line_no,
                    header_emitted: false,
                });
            }
        }
        last_code_line = line_no;
    }

    while let Some(scope) = stack.pop() {
        close_scope(scope, last_code_line, &mut units);
    }
    units
}

fn brace_declaration(line: &str, language: Language) -> Option<(ChunkKind, String)> {
    if language == Language::Rust {
        let caps = RUST_DECL.as_ref()?.captures(line)?;
        let keyword = caps.get(1)?.as_str();
        let kind = if keyword == "fn" {
            ChunkKind::Function
        } else {
            ChunkKind::Class
        };
        let name = match (keyword, line.split_once(" for ")) {
            ("impl", Some((_, target))) => target
                .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == ':'))
                .find(|s| !s.is_empty())
                .map(str::to_string),
            _ => caps.get(2).map(|m| m.as_str().to_string()),
        }?;
        let name = name.rsplit("::").next().unwrap_or(&name).to_string();
        return Some((kind, name));
    }

    if let Some(caps) = JS_BINDING.as_ref().and_then(|re| re.captures(line)) {
        return Some((ChunkKind::Function, caps.get(1)?.as_str().to_string()));
    }
    let caps = JS_DECL.as_ref()?.captures(line)?;
    let kind = if caps.get(1)?.as_str().starts_with("function") {
        ChunkKind::Function
    } else {
        ChunkKind::Class
    };
    let name = caps
        .get(2)
        .map_or_else(|| "default".to_string(), |m| m.as_str().to_string());
    Some((kind, name))
}

#[derive(Default)]
struct LexState {
    in_block_comment: bool,
    quote: Option<char>,
}

/// Effect of one line on brace depth
struct LineScan {
    delta: i64,
    saw_open: bool,
    saw_terminator: bool,
}

fn scan_line(line: &str, state: &mut LexState, single_quote_strings: bool) -> LineScan {
    let mut scan = LineScan {
        delta: 0,
        saw_open: false,
        saw_terminator: false,
    };
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if state.in_block_comment {
            if c == '*' && chars.peek() == Some(&'/') {
                chars.next();
                state.in_block_comment = false;
            }
            continue;
        }
        if let Some(quote) = state.quote {
            if c == '\\' {
                chars.next();
            } else if c == quote {
                state.quote = None;
            }
            continue;
        }
        match c {
            '/' if chars.peek() == Some(&'/') => break,
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                state.in_block_comment = true;
            }
            '"' | '`' => state.quote = Some(c),
            '\'' if single_quote_strings => state.quote = Some(c),
            '{' => {
                scan.delta += 1;
                scan.saw_open = true;
            }
            '}' => scan.delta -= 1,
            ';' => scan.saw_terminator = true,
            _ => {}
        }
    }
    // Only template literals span lines
    if state.quote.is_some_and(|q| q != '`') {
        state.quote = None;
    }
    scan
}

fn continues_on_next_line(line: &str) -> bool {
    let trimmed = line.trim_end();
    trimmed.is_empty()
        || ["(", ",", "=>", "=", "<", ":", "|", "&", "+", "extends", "implements"]
            .iter()
            .any(|suffix| trimmed.ends_with(suffix))
        || trimmed.matches('(').count() > trimmed.matches(')').count()
}

struct Pending {
    qualified_name: String,
    kind: ChunkKind,
    first: usize,
    opened: bool,
}

fn brace_units(index: &LineIndex, language: Language) -> Vec<LineUnit> {
    let mut units = Vec::new();
    let mut depth: i64 = 0;
    let mut state = LexState::default();
    let mut current: Option<Pending> = None;
    let single_quote_strings = language != Language::Rust;

    for line_no in 0..index.line_count() {
        let line = index.line(line_no);
        if depth == 0 && current.is_none() && !state.in_block_comment && state.quote.is_none() {
            if let Some((kind, qualified_name)) = brace_declaration(line, language) {
                current = Some(Pending {
                    qualified_name,
                    kind,
                    first: line_no,
                    opened: false,
                });
            }
        }

        let scan = scan_line(line, &mut state, single_quote_strings);
        depth = (depth + scan.delta).max(0);

        let Some(pending) = current.as_mut() else {
            continue;
        };
        if scan.saw_open {
            pending.opened = true;
        }
        let finished = if pending.opened {
            depth == 0
        } else {
            depth == 0 && (scan.saw_terminator || !continues_on_next_line(line))
        };
        if finished {
            if let Some(done) = current.take() {
                units.push(LineUnit {
                    qualified_name: done.qualified_name,
                    kind: done.kind,
                    first: done.first,
                    last: line_no,
                });
            }
        }
    }

    if let Some(open) = current {
        let last = (0..index.line_count())
            .rev()
            .find(|&l| !index.line(l).trim().is_empty())
            .unwrap_or(open.first);
        units.push(LineUnit {
            qualified_name: open.qualified_name,
            kind: open.kind,
            first: open.first,
            last: last.max(open.first),
        });
    }
    units
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn spans(content: &str, language: Language) -> Vec<(String, ChunkKind, usize, String)> {
        fallback_spans(content, language)
            .into_iter()
            .map(|s| {
                let text = content[s.start_byte..s.end_byte].to_string();
                (s.qualified_name, s.kind, s.start_line, text)
            })
            .collect()
    }

    #[test]
    fn python_indentation_units() {
        let code = "import os\n\ndef a(x:\n    return x\n\nclass B:\n    y = 1\n    def m(self):\n        def inner():\n            pass\n        return 2\n\nprint(a)\n";
        let found = spans(code, Language::Python);
        assert_eq!(
            found,
            vec![
                ("a".to_string(), ChunkKind::Function, 2, "def a(x:\n    return x".to_string()),
                ("B".to_string(), ChunkKind::Class, 5, "class B:\n    y = 1".to_string()),
                (
                    "B.m".to_string(),
                    ChunkKind::Function,
                    7,
                    "    def m(self):\n        def inner():\n            pass\n        return 2".to_string()
                ),
            ]
        );
    }

    #[test]
    fn brace_units_for_javascript() {
        let code = "import x from 'y';\n\nfunction a() {\n  if (x) { return '}'; }\n}\n\nconst b = (v) => v * 2;\n\nclass C {\n  m() {}\n}\n";
        let found: Vec<_> = spans(code, Language::JavaScript)
            .into_iter()
            .map(|(name, kind, line, _)| (name, kind, line))
            .collect();
        assert_eq!(
            found,
            vec![
                ("a".to_string(), ChunkKind::Function, 2),
                ("b".to_string(), ChunkKind::Function, 6),
                ("C".to_string(), ChunkKind::Class, 8),
            ]
        );
    }

    #[test]
    fn brace_units_for_rust_impl_for() {
        let code = "impl<'a> Display for Wrapper<'a> {\n    fn fmt(&self) {}\n}\n\npub fn run() {\n}\n";
        let found: Vec<_> = spans(code, Language::Rust)
            .into_iter()
            .map(|(name, kind, line, _)| (name, kind, line))
            .collect();
        assert_eq!(
            found,
            vec![
                ("Wrapper".to_string(), ChunkKind::Class, 0),
                ("run".to_string(), ChunkKind::Function, 4),
            ]
        );
    }

    #[test]
    fn unterminated_block_runs_to_end_of_file() {
        let code = "function broken() {\n  return 1;\n";
        let found = spans(code, Language::JavaScript);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].3, "function broken() {\n  return 1;");
    }
}
