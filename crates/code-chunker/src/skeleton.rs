//! Signature-only views of source files for whole-project review.
//!
//! Function bodies are replaced (`pass` after any docstring in Python,
//! `{ /* ... */ }` elsewhere) while classes, impls and module-level code stay
//! intact, so many files fit into one prompt.

use crate::ast_analyzer::AstAnalyzer;
use crate::error::Result;
use crate::language::Language;
use tree_sitter::Node;

const BRACE_STUB: &str = "{ /* ... */ }";

/// Produce the skeleton of `source`, failing if it does not parse cleanly
pub fn skeleton(source: &str, language: Language) -> Result<String> {
    let mut analyzer = AstAnalyzer::new(language)?;
    let tree = analyzer.parse(source)?;

    let mut edits = Vec::new();
    collect_edits(source, tree.root_node(), language, &mut edits);
    edits.sort_by_key(|edit| edit.start);

    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for edit in edits {
        if edit.start < cursor {
            continue;
        }
        out.push_str(&source[cursor..edit.start]);
        out.push_str(&edit.replacement);
        cursor = edit.end;
    }
    out.push_str(&source[cursor..]);
    Ok(out)
}

struct Edit {
    start: usize,
    end: usize,
    replacement: String,
}

fn collect_edits(source: &str, node: Node, language: Language, edits: &mut Vec<Edit>) {
    if let Some(edit) = body_edit(source, node, language) {
        edits.push(edit);
        return;
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    for child in children {
        collect_edits(source, child, language, edits);
    }
}

fn body_edit(source: &str, node: Node, language: Language) -> Option<Edit> {
    let body = node.child_by_field_name("body")?;
    let replacement = match language {
        Language::Python => {
            if node.kind() != "function_definition" {
                return None;
            }
            python_stub(source, body)
        }
        Language::Rust => {
            if node.kind() != "function_item" {
                return None;
            }
            BRACE_STUB.to_string()
        }
        Language::JavaScript | Language::TypeScript | Language::Tsx => {
            let is_function = matches!(
                node.kind(),
                "function_declaration"
                    | "generator_function_declaration"
                    | "function_expression"
                    | "function"
                    | "generator_function"
                    | "arrow_function"
                    | "method_definition"
            );
            if !is_function || body.kind() != "statement_block" {
                return None;
            }
            BRACE_STUB.to_string()
        }
        Language::Unknown => return None,
    };

    Some(Edit {
        start: body.start_byte(),
        end: body.end_byte(),
        replacement,
    })
}

/// Docstring (if any) followed by `pass`, at the body's indentation
fn python_stub(source: &str, body: Node) -> String {
    let indent = " ".repeat(body.start_position().column);
    let docstring = body.named_child(0).filter(|first| {
        first.kind() == "expression_statement"
            && first.named_child(0).is_some_and(|inner| inner.kind() == "string")
    });
    match docstring {
        Some(doc) => format!("{}\n{indent}pass", &source[doc.start_byte()..doc.end_byte()]),
        None => "pass".to_string(),
    }
}
