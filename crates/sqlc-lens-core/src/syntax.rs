//! TypeScript syntax scanning.
//!
//! Parses a TypeScript source file with tree-sitter and lowers the small
//! subset of the grammar this crate cares about into an owned
//! [`ParsedSource`]:
//!
//! - import declarations and their bindings
//! - exported function declarations and exported arrow functions
//! - top-level string constants
//! - call expressions with a bare identifier callee
//!
//! The summary owns all of its data, so it can be cached independently of
//! the tree-sitter tree and the source text.

use crate::error::LookupError;
use crate::span::Span;
use std::path::Path;
use tree_sitter::{Language, Node, Parser};

/// The node kinds the scanner distinguishes. Everything else is [`NodeKind::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// `import ... from "..."`
    ImportStatement,
    /// The bindings part of an import.
    ImportClause,
    /// `{ a, b as c }`
    NamedImports,
    /// `b as c`
    ImportSpecifier,
    /// `* as ns`
    NamespaceImport,
    /// `export ...`
    ExportStatement,
    /// `function f() {}`
    FunctionDeclaration,
    /// `const`/`let` statement.
    LexicalDeclaration,
    /// `var` statement.
    VariableDeclaration,
    /// `name = value` inside a declaration.
    VariableDeclarator,
    /// `() => ...`
    ArrowFunction,
    /// `f(...)`
    CallExpression,
    /// A plain identifier.
    Identifier,
    /// `"..."` or `'...'`
    String,
    /// `` `...` ``
    TemplateString,
    /// `${...}` inside a template string.
    TemplateSubstitution,
    /// `default` keyword of an export statement.
    DefaultKeyword,
    /// Anything else.
    Other,
}

impl NodeKind {
    /// Classify a tree-sitter node.
    pub fn of(node: Node<'_>) -> Self {
        match node.kind() {
            "import_statement" => Self::ImportStatement,
            "import_clause" => Self::ImportClause,
            "named_imports" => Self::NamedImports,
            "import_specifier" => Self::ImportSpecifier,
            "namespace_import" => Self::NamespaceImport,
            "export_statement" => Self::ExportStatement,
            "function_declaration" => Self::FunctionDeclaration,
            "lexical_declaration" => Self::LexicalDeclaration,
            "variable_declaration" => Self::VariableDeclaration,
            "variable_declarator" => Self::VariableDeclarator,
            "arrow_function" => Self::ArrowFunction,
            "call_expression" => Self::CallExpression,
            "identifier" => Self::Identifier,
            "string" => Self::String,
            "template_string" => Self::TemplateString,
            "template_substitution" => Self::TemplateSubstitution,
            "default" => Self::DefaultKeyword,
            _ => Self::Other,
        }
    }
}

/// How a name is bound by an import declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// `import name from "..."`
    Default,
    /// `import { name } from "..."` or `import { orig as name } from "..."`
    Named,
    /// `import * as name from "..."`
    Namespace,
}

/// One local name introduced by an import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBinding {
    /// The name visible in the importing file.
    pub local_name: String,
    /// How the name is bound.
    pub kind: BindingKind,
}

/// An import declaration with a string-literal module specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDeclaration {
    /// The module specifier, unquoted.
    pub specifier: String,
    /// Names bound by this declaration.
    pub bindings: Vec<ImportBinding>,
}

/// An exported function declaration or exported arrow function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFunction {
    /// The function's name.
    pub name: String,
    /// Source range of the function.
    pub span: Span,
}

/// The first declarator of a top-level variable statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringConstant {
    /// The declared name.
    pub name: String,
    /// The literal's text, or `None` for a template with substitutions.
    pub value: Option<String>,
}

/// A call whose callee is a bare identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// The called name.
    pub callee: String,
    /// Source range of the whole call expression.
    pub span: Span,
}

/// Everything the locator needs to know about one source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSource {
    /// Top-level import declarations.
    pub imports: Vec<ImportDeclaration>,
    /// Exported functions, in source order.
    pub exports: Vec<ExportedFunction>,
    /// Top-level string constants.
    pub constants: Vec<StringConstant>,
    /// Calls with a bare identifier callee, in source order.
    pub calls: Vec<CallSite>,
}

impl ParsedSource {
    /// Exported functions of the file.
    pub fn exported_functions(&self) -> &[ExportedFunction] {
        &self.exports
    }

    /// Text of the top-level string constant `name`.
    ///
    /// Absent when there is no such constant or when its initializer is a
    /// template literal with substitutions.
    pub fn string_constant(&self, name: &str) -> Option<&str> {
        self.constants
            .iter()
            .find(|c| c.name == name)
            .and_then(|c| c.value.as_deref())
    }
}

/// Select the grammar for a file: TSX for `.tsx`/`.jsx`, TypeScript otherwise.
fn language_for(path: &Path) -> Language {
    match path.extension().and_then(|e| e.to_str()) {
        Some("tsx" | "jsx") => tree_sitter_typescript::LANGUAGE_TSX.into(),
        _ => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
    }
}

/// Parse TypeScript source text into a [`ParsedSource`].
///
/// `path` only selects the grammar and labels errors; nothing is read from disk.
pub fn parse_source(text: &str, path: &Path) -> Result<ParsedSource, LookupError> {
    let mut parser = Parser::new();
    parser.set_language(&language_for(path))?;

    let tree = parser.parse(text, None).ok_or_else(|| LookupError::Parse {
        path: path.to_path_buf(),
    })?;

    let mut lowering = Lowering {
        source: text.as_bytes(),
        parsed: ParsedSource::default(),
    };
    let root = tree.root_node();
    lowering.program(root);
    lowering.collect_calls(root);

    tracing::debug!(
        "Parsed {}: {} imports, {} exports, {} constants, {} calls",
        path.display(),
        lowering.parsed.imports.len(),
        lowering.parsed.exports.len(),
        lowering.parsed.constants.len(),
        lowering.parsed.calls.len()
    );

    Ok(lowering.parsed)
}

struct Lowering<'s> {
    source: &'s [u8],
    parsed: ParsedSource,
}

impl<'s> Lowering<'s> {
    fn program(&mut self, root: Node<'_>) {
        for node in named_children(root) {
            match NodeKind::of(node) {
                NodeKind::ImportStatement => self.import_statement(node),
                NodeKind::ExportStatement => self.export_statement(node),
                NodeKind::LexicalDeclaration | NodeKind::VariableDeclaration => {
                    self.string_constant(node);
                }
                _ => {}
            }
        }
    }

    fn import_statement(&mut self, node: Node<'_>) {
        let Some(source) = node.child_by_field_name("source") else {
            return;
        };
        let Some(specifier) = self.literal_value(source) else {
            return;
        };

        let mut bindings = Vec::new();
        for clause in named_children(node) {
            if NodeKind::of(clause) != NodeKind::ImportClause {
                continue;
            }
            for part in named_children(clause) {
                match NodeKind::of(part) {
                    NodeKind::Identifier => bindings.push(ImportBinding {
                        local_name: self.text(part).to_string(),
                        kind: BindingKind::Default,
                    }),
                    NodeKind::NamedImports => {
                        for specifier in named_children(part) {
                            if NodeKind::of(specifier) != NodeKind::ImportSpecifier {
                                continue;
                            }
                            let local = specifier
                                .child_by_field_name("alias")
                                .or_else(|| specifier.child_by_field_name("name"));
                            if let Some(local) = local.filter(|n| NodeKind::of(*n) == NodeKind::Identifier) {
                                bindings.push(ImportBinding {
                                    local_name: self.text(local).to_string(),
                                    kind: BindingKind::Named,
                                });
                            }
                        }
                    }
                    NodeKind::NamespaceImport => {
                        if let Some(name) = named_children(part)
                            .into_iter()
                            .find(|n| NodeKind::of(*n) == NodeKind::Identifier)
                        {
                            bindings.push(ImportBinding {
                                local_name: self.text(name).to_string(),
                                kind: BindingKind::Namespace,
                            });
                        }
                    }
                    _ => {}
                }
            }
        }

        self.parsed.imports.push(ImportDeclaration {
            specifier,
            bindings,
        });
    }

    fn export_statement(&mut self, node: Node<'_>) {
        let mut cursor = node.walk();
        let is_default = node
            .children(&mut cursor)
            .any(|child| NodeKind::of(child) == NodeKind::DefaultKeyword);
        if is_default {
            return;
        }

        let Some(declaration) = node.child_by_field_name("declaration") else {
            return;
        };

        match NodeKind::of(declaration) {
            NodeKind::FunctionDeclaration => {
                if let Some(name) = declaration.child_by_field_name("name") {
                    self.parsed.exports.push(ExportedFunction {
                        name: self.text(name).to_string(),
                        span: span_of(declaration),
                    });
                }
            }
            NodeKind::LexicalDeclaration | NodeKind::VariableDeclaration => {
                for declarator in declarators(declaration) {
                    let (Some(name), Some(value)) = (
                        declarator.child_by_field_name("name"),
                        declarator.child_by_field_name("value"),
                    ) else {
                        continue;
                    };
                    if NodeKind::of(name) == NodeKind::Identifier
                        && NodeKind::of(value) == NodeKind::ArrowFunction
                    {
                        self.parsed.exports.push(ExportedFunction {
                            name: self.text(name).to_string(),
                            span: span_of(value),
                        });
                    }
                }
                self.string_constant(declaration);
            }
            _ => {}
        }
    }

    /// Record the first declarator of a variable statement if it holds a literal.
    fn string_constant(&mut self, declaration: Node<'_>) {
        let Some(declarator) = declarators(declaration).into_iter().next() else {
            return;
        };
        let (Some(name), Some(value)) = (
            declarator.child_by_field_name("name"),
            declarator.child_by_field_name("value"),
        ) else {
            return;
        };
        if NodeKind::of(name) != NodeKind::Identifier {
            return;
        }

        let value = match NodeKind::of(value) {
            NodeKind::String | NodeKind::TemplateString => self.literal_value(value),
            _ => return,
        };

        self.parsed.constants.push(StringConstant {
            name: self.text(name).to_string(),
            value,
        });
    }

    /// Walk the whole tree and record calls with an identifier callee.
    fn collect_calls(&mut self, root: Node<'_>) {
        let mut cursor = root.walk();
        loop {
            let node = cursor.node();
            if NodeKind::of(node) == NodeKind::CallExpression {
                if let Some(callee) = node
                    .child_by_field_name("function")
                    .filter(|n| NodeKind::of(*n) == NodeKind::Identifier)
                {
                    self.parsed.calls.push(CallSite {
                        callee: self.text(callee).to_string(),
                        span: span_of(node),
                    });
                }
            }

            if cursor.goto_first_child() {
                continue;
            }
            loop {
                if cursor.goto_next_sibling() {
                    break;
                }
                if !cursor.goto_parent() {
                    return;
                }
            }
        }
    }

    /// Cooked value of a string or substitution-free template literal.
    fn literal_value(&self, node: Node<'_>) -> Option<String> {
        match NodeKind::of(node) {
            NodeKind::String => {}
            NodeKind::TemplateString => {
                let has_substitution = named_children(node)
                    .iter()
                    .any(|n| NodeKind::of(*n) == NodeKind::TemplateSubstitution);
                if has_substitution {
                    return None;
                }
            }
            _ => return None,
        }

        let raw = self.text(node);
        // Both literal forms are delimited by a single character on each side.
        let inner = raw.get(1..raw.len().checked_sub(1)?)?;
        Some(unescape(inner))
    }

    fn text(&self, node: Node<'_>) -> &'s str {
        node.utf8_text(self.source).unwrap_or("")
    }
}

fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

fn declarators(declaration: Node<'_>) -> Vec<Node<'_>> {
    named_children(declaration)
        .into_iter()
        .filter(|n| NodeKind::of(*n) == NodeKind::VariableDeclarator)
        .collect()
}

fn span_of(node: Node<'_>) -> Span {
    Span::new(node.start_byte(), node.end_byte())
}

/// Interpret JavaScript escape sequences in literal text.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(escaped) = chars.next() else {
            out.push('\\');
            break;
        };
        match escaped {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            // Line continuation.
            '\n' => {}
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            'x' => {
                let hex: String = chars.by_ref().take(2).collect();
                push_code_point(&mut out, &hex);
            }
            'u' => {
                let hex: String = if chars.peek() == Some(&'{') {
                    chars.next();
                    chars.by_ref().take_while(|c| *c != '}').collect()
                } else {
                    chars.by_ref().take(4).collect()
                };
                push_code_point(&mut out, &hex);
            }
            other => out.push(other),
        }
    }

    out
}

fn push_code_point(out: &mut String, hex: &str) {
    match u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
        Some(c) => out.push(c),
        None => out.push(char::REPLACEMENT_CHARACTER),
    }
}
