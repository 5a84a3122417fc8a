use crate::error::{ChunkerError, Result};
use crate::language::Language;
use crate::types::{ChunkKind, Span};
use tree_sitter::{Node, Parser, Tree};

/// Locates function and class definitions in one language's syntax tree.
///
/// Implementations emit non-overlapping spans: a class contributes only its
/// header (everything before the first member definition) and each member
/// becomes its own span. Functions nested inside function bodies stay part
/// of the enclosing function.
pub(crate) trait LanguageChunker: Sync {
    fn collect(&self, source: &str, root: Node<'_>, spans: &mut Vec<Span>);
}

/// Select the extractor for a detected language
pub(crate) fn extractor_for(language: Language) -> Option<&'static dyn LanguageChunker> {
    match language {
        Language::Python => Some(&PythonChunker),
        Language::JavaScript | Language::TypeScript | Language::Tsx => Some(&JsChunker),
        Language::Rust => Some(&RustChunker),
        Language::Unknown => None,
    }
}

/// AST-based analyzer for semantic code chunking
pub struct AstAnalyzer {
    parser: Parser,
    language: Language,
}

impl AstAnalyzer {
    /// Create new AST analyzer for a language
    pub fn new(language: Language) -> Result<Self> {
        if !language.supports_ast() {
            return Err(ChunkerError::UnsupportedLanguage(language));
        }

        let ts_language = language.tree_sitter_language()?;
        let mut parser = Parser::new();
        parser.set_language(&ts_language)?;

        Ok(Self { parser, language })
    }

    /// Parse source, rejecting trees that contain syntax errors
    pub fn parse(&mut self, content: &str) -> Result<Tree> {
        let tree = self
            .parser
            .parse(content, None)
            .ok_or_else(|| ChunkerError::ParseError("parser returned no tree".into()))?;

        let root = tree.root_node();
        if root.has_error() {
            return Err(ChunkerError::Syntax {
                language: self.language,
                line: first_error_line(root).map_or(0, |row| row + 1),
            });
        }
        Ok(tree)
    }

    /// Definition spans in file order
    pub(crate) fn definitions(&mut self, content: &str) -> Result<Vec<Span>> {
        let extractor = extractor_for(self.language)
            .ok_or(ChunkerError::UnsupportedLanguage(self.language))?;
        let tree = self.parse(content)?;

        let mut spans = Vec::new();
        extractor.collect(content, tree.root_node(), &mut spans);
        spans.sort_by_key(|s| s.start_byte);
        Ok(spans)
    }
}

fn first_error_line(node: Node) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row);
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|child| child.has_error())
        .find_map(first_error_line)
}

fn node_text<'a>(source: &'a str, node: Node) -> &'a str {
    &source[node.start_byte()..node.end_byte()]
}

/// Extract symbol name from AST node
fn symbol_name(source: &str, node: Node) -> Option<String> {
    if let Some(name) = node.child_by_field_name("name") {
        return Some(node_text(source, name).to_string());
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        let is_name_node = matches!(
            child.kind(),
            "identifier"
                | "type_identifier"
                | "property_identifier"
                | "private_property_identifier"
                | "field_identifier"
        );
        if is_name_node {
            return Some(node_text(source, child).to_string());
        }
    }
    None
}

fn qualify(scope: Option<&str>, name: &str) -> String {
    match scope {
        Some(scope) => format!("{scope}.{name}"),
        None => name.to_string(),
    }
}

fn span_for(outer: Node, qualified_name: String, kind: ChunkKind) -> Span {
    Span {
        qualified_name,
        kind,
        start_byte: outer.start_byte(),
        end_byte: outer.end_byte(),
        start_line: outer.start_position().row,
    }
}

/// Span of a container from its start up to the line holding its first member
fn header_span(source: &str, outer: Node, first_member: Node, qualified_name: String) -> Span {
    let start = outer.start_byte();
    let member_start = first_member.start_byte();
    let member_line_start = source[..member_start].rfind('\n').map_or(0, |i| i + 1);
    let cut = if member_line_start > start {
        member_line_start
    } else {
        member_start
    };
    let end = start + source[start..cut].trim_end().len();

    Span {
        qualified_name,
        kind: ChunkKind::Class,
        start_byte: start,
        end_byte: end,
        start_line: outer.start_position().row,
    }
}

struct PythonChunker;

impl LanguageChunker for PythonChunker {
    fn collect(&self, source: &str, root: Node<'_>, spans: &mut Vec<Span>) {
        self.walk_block(source, root, None, spans);
    }
}

impl PythonChunker {
    /// Unwrap `@decorator` wrappers; the span keeps the decorators
    fn definition(node: Node) -> Option<Node> {
        if node.kind() == "decorated_definition" {
            node.child_by_field_name("definition")
        } else {
            Some(node)
        }
    }

    fn is_member(node: Node) -> bool {
        Self::definition(node).is_some_and(|def| {
            matches!(def.kind(), "function_definition" | "class_definition")
        })
    }

    fn walk_block(&self, source: &str, block: Node, scope: Option<&str>, spans: &mut Vec<Span>) {
        let mut cursor = block.walk();
        let children: Vec<_> = block.children(&mut cursor).collect();

        for outer in children {
            let Some(def) = Self::definition(outer) else {
                continue;
            };
            let Some(name) = symbol_name(source, def) else {
                continue;
            };
            let qualified = qualify(scope, &name);

            match def.kind() {
                "function_definition" => {
                    spans.push(span_for(outer, qualified, ChunkKind::Function));
                }
                "class_definition" => {
                    let body = def.child_by_field_name("body");
                    let first_member = body.and_then(|body| {
                        let mut body_cursor = body.walk();
                        let found = body.children(&mut body_cursor).find(|n| Self::is_member(*n));
                        found
                    });
                    match first_member {
                        Some(member) => spans.push(header_span(source, outer, member, qualified.clone())),
                        None => spans.push(span_for(outer, qualified.clone(), ChunkKind::Class)),
                    }
                    if let Some(body) = body {
                        self.walk_block(source, body, Some(&qualified), spans);
                    }
                }
                _ => {}
            }
        }
    }
}

struct JsChunker;

impl LanguageChunker for JsChunker {
    fn collect(&self, source: &str, root: Node<'_>, spans: &mut Vec<Span>) {
        let mut cursor = root.walk();
        let children: Vec<_> = root.children(&mut cursor).collect();
        for child in children {
            self.visit(source, child, child, spans);
        }
    }
}

impl JsChunker {
    fn is_function_like(kind: &str) -> bool {
        matches!(
            kind,
            "arrow_function" | "function_expression" | "function" | "generator_function"
        )
    }

    fn is_class_like(kind: &str) -> bool {
        matches!(
            kind,
            "class_declaration" | "abstract_class_declaration" | "class"
        )
    }

    /// `outer` is the node whose span is kept (e.g. the `export` statement),
    /// `node` is the declaration inside it
    fn visit(&self, source: &str, outer: Node, node: Node, spans: &mut Vec<Span>) {
        let kind = node.kind();
        match kind {
            "export_statement" => {
                if let Some(decl) = node.child_by_field_name("declaration") {
                    self.visit(source, outer, decl, spans);
                } else if let Some(value) = node.child_by_field_name("value") {
                    if Self::is_function_like(value.kind()) {
                        spans.push(span_for(outer, "default".to_string(), ChunkKind::Function));
                    } else if Self::is_class_like(value.kind()) {
                        self.class(source, outer, value, spans);
                    }
                }
            }
            "function_declaration" | "generator_function_declaration" => {
                let name = symbol_name(source, node).unwrap_or_else(|| "default".to_string());
                spans.push(span_for(outer, name, ChunkKind::Function));
            }
            "lexical_declaration" | "variable_declaration" => {
                let mut cursor = node.walk();
                let declarators: Vec<_> = node
                    .children(&mut cursor)
                    .filter(|c| c.kind() == "variable_declarator")
                    .collect();
                let named_function = declarators.into_iter().find_map(|decl| {
                    let value = decl.child_by_field_name("value")?;
                    if !Self::is_function_like(value.kind()) {
                        return None;
                    }
                    decl.child_by_field_name("name")
                        .map(|name| node_text(source, name).to_string())
                });
                if let Some(name) = named_function {
                    spans.push(span_for(outer, name, ChunkKind::Function));
                }
            }
            "interface_declaration" | "enum_declaration" => {
                if let Some(name) = symbol_name(source, node) {
                    spans.push(span_for(outer, name, ChunkKind::Class));
                }
            }
            k if Self::is_class_like(k) => self.class(source, outer, node, spans),
            _ => {}
        }
    }

    fn class(&self, source: &str, outer: Node, class: Node, spans: &mut Vec<Span>) {
        let class_name = symbol_name(source, class).unwrap_or_else(|| "default".to_string());
        let Some(body) = class.child_by_field_name("body") else {
            spans.push(span_for(outer, class_name, ChunkKind::Class));
            return;
        };

        let mut cursor = body.walk();
        let members: Vec<(Node, String)> = body
            .children(&mut cursor)
            .filter_map(|member| {
                let is_method = match member.kind() {
                    "method_definition" => true,
                    "field_definition" | "public_field_definition" => member
                        .child_by_field_name("value")
                        .is_some_and(|v| Self::is_function_like(v.kind())),
                    _ => false,
                };
                if !is_method {
                    return None;
                }
                let name = member
                    .child_by_field_name("property")
                    .map(|n| node_text(source, n).to_string())
                    .or_else(|| symbol_name(source, member))?;
                Some((member, name))
            })
            .collect();

        match members.first() {
            Some((first, _)) => spans.push(header_span(source, outer, *first, class_name.clone())),
            None => spans.push(span_for(outer, class_name.clone(), ChunkKind::Class)),
        }
        for (member, name) in members {
            spans.push(span_for(
                member,
                qualify(Some(&class_name), &name),
                ChunkKind::Function,
            ));
        }
    }
}

struct RustChunker;

impl LanguageChunker for RustChunker {
    fn collect(&self, source: &str, root: Node<'_>, spans: &mut Vec<Span>) {
        self.walk(source, root, None, spans);
    }
}

impl RustChunker {
    fn walk(&self, source: &str, parent: Node, scope: Option<&str>, spans: &mut Vec<Span>) {
        let mut cursor = parent.walk();
        let children: Vec<_> = parent.children(&mut cursor).collect();

        for child in children {
            match child.kind() {
                "function_item" => {
                    if let Some(name) = symbol_name(source, child) {
                        spans.push(span_for(child, qualify(scope, &name), ChunkKind::Function));
                    }
                }
                "struct_item" | "enum_item" | "union_item" => {
                    if let Some(name) = symbol_name(source, child) {
                        spans.push(span_for(child, qualify(scope, &name), ChunkKind::Class));
                    }
                }
                "trait_item" => {
                    if let Some(name) = symbol_name(source, child) {
                        let qualified = qualify(scope, &name);
                        self.container(source, child, qualified, true, spans);
                    }
                }
                "impl_item" => {
                    if let Some(target) = Self::impl_target(source, child) {
                        let qualified = qualify(scope, &target);
                        self.container(source, child, qualified, false, spans);
                    }
                }
                "mod_item" => {
                    let body = child.child_by_field_name("body");
                    if let (Some(name), Some(body)) = (symbol_name(source, child), body) {
                        let qualified = qualify(scope, &name);
                        self.walk(source, body, Some(&qualified), spans);
                    }
                }
                _ => {}
            }
        }
    }

    /// Methods of an `impl` or `trait` body; traits also keep their header
    fn container(
        &self,
        source: &str,
        node: Node,
        qualified: String,
        keep_header: bool,
        spans: &mut Vec<Span>,
    ) {
        let methods: Vec<Node> = node
            .child_by_field_name("body")
            .map(|body| {
                let mut cursor = body.walk();
                let found: Vec<Node> = body
                    .children(&mut cursor)
                    .filter(|n| n.kind() == "function_item")
                    .collect();
                found
            })
            .unwrap_or_default();

        if keep_header {
            match methods.first() {
                Some(first) => spans.push(header_span(source, node, *first, qualified.clone())),
                None => spans.push(span_for(node, qualified.clone(), ChunkKind::Class)),
            }
        }

        for method in methods {
            if let Some(name) = symbol_name(source, method) {
                spans.push(span_for(
                    method,
                    qualify(Some(&qualified), &name),
                    ChunkKind::Function,
                ));
            }
        }
    }

    /// The implementing type of an impl block (`impl Trait for Type` yields `Type`)
    fn impl_target(source: &str, impl_node: Node) -> Option<String> {
        let ty = impl_node.child_by_field_name("type")?;
        match ty.kind() {
            "type_identifier" => Some(node_text(source, ty).to_string()),
            "generic_type" => ty
                .child_by_field_name("type")
                .map(|base| Self::last_path_segment(node_text(source, base))),
            "scoped_type_identifier" => ty
                .child_by_field_name("name")
                .map(|name| node_text(source, name).to_string()),
            _ => Some(node_text(source, ty).to_string()),
        }
    }

    fn last_path_segment(path: &str) -> String {
        path.rsplit("::").next().unwrap_or(path).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(language: Language, code: &str) -> Vec<(String, ChunkKind)> {
        let mut analyzer = AstAnalyzer::new(language).unwrap();
        analyzer
            .definitions(code)
            .unwrap()
            .into_iter()
            .map(|s| (s.qualified_name, s.kind))
            .collect()
    }

    #[test]
    fn test_python_methods_are_qualified() {
        let code = r#"
def hello():
    print("Hello")

class MyClass:
    """Doc."""

    @staticmethod
    def build():
        pass

    def method(self):
        def inner():
            return 1
        return inner()
"#;
        assert_eq!(
            names(Language::Python, code),
            vec![
                ("hello".to_string(), ChunkKind::Function),
                ("MyClass".to_string(), ChunkKind::Class),
                ("MyClass.build".to_string(), ChunkKind::Function),
                ("MyClass.method".to_string(), ChunkKind::Function),
            ]
        );
    }

    #[test]
    fn test_python_class_header_stops_before_first_method() {
        let code = "class A:\n    x = 1\n\n    def f(self):\n        pass\n";
        let mut analyzer = AstAnalyzer::new(Language::Python).unwrap();
        let spans = analyzer.definitions(code).unwrap();
        assert_eq!(&code[spans[0].start_byte..spans[0].end_byte], "class A:\n    x = 1");
        assert!(spans[0].end_byte <= spans[1].start_byte);
    }

    #[test]
    fn test_js_exports_arrows_and_classes() {
        let code = r#"
export function load(path) {
  return path;
}

const handler = async (req) => {
  return req;
};

class Store {
  constructor() { this.items = []; }
  add(item) { this.items.push(item); }
}
"#;
        assert_eq!(
            names(Language::JavaScript, code),
            vec![
                ("load".to_string(), ChunkKind::Function),
                ("handler".to_string(), ChunkKind::Function),
                ("Store".to_string(), ChunkKind::Class),
                ("Store.constructor".to_string(), ChunkKind::Function),
                ("Store.add".to_string(), ChunkKind::Function),
            ]
        );
    }

    #[test]
    fn test_typescript_interface_and_class() {
        let code = r#"
interface Shape { area(): number; }

export class Circle implements Shape {
  constructor(private r: number) {}
  area(): number { return Math.PI * this.r * this.r; }
}
"#;
        let found = names(Language::TypeScript, code);
        assert!(found.contains(&("Shape".to_string(), ChunkKind::Class)));
        assert!(found.contains(&("Circle.area".to_string(), ChunkKind::Function)));
    }

    #[test]
    fn test_rust_impl_methods_use_implementing_type() {
        let code = r#"
struct Point { x: i32 }

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.x)
    }
}

mod geo {
    pub fn origin() -> i32 { 0 }
}
"#;
        assert_eq!(
            names(Language::Rust, code),
            vec![
                ("Point".to_string(), ChunkKind::Class),
                ("Point.fmt".to_string(), ChunkKind::Function),
                ("geo.origin".to_string(), ChunkKind::Function),
            ]
        );
    }

    #[test]
    fn test_syntax_error_is_parse_failure() {
        let mut analyzer = AstAnalyzer::new(Language::Python).unwrap();
        let err = analyzer.definitions("def broken(:\n    pass\n").unwrap_err();
        assert!(matches!(err, ChunkerError::Syntax { language: Language::Python, .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_unsupported_language() {
        assert!(AstAnalyzer::new(Language::Unknown).is_err());
    }
}
