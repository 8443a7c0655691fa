//! Definition unit extraction.
//!
//! Parses Python source with tree-sitter and yields every function, async
//! function and class definition in document order, nested ones included.
//!
//! The syntax tree is owned by [`SourceFile`]; units borrow nodes from it so
//! the canonicalizer can serialize them without copying or mutating anything.
//!
//! Rejection policy: tree-sitter recovers from syntax errors, codeseal does
//! not. Any `ERROR` or `MISSING` node fails the parse with the line of the
//! first offending node, and so does indentation Python would refuse
//! (inconsistent dedents, mixed tabs and spaces).

use tree_sitter::{Node, Parser, Tree};

use crate::annotation::{decorator_expression, AnnotationKind, PythonDecorator};
use crate::errors::{SealError, SealResult};

/// Kind of a definition unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum UnitKind {
    Function,
    AsyncFunction,
    Class,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::AsyncFunction => "async_function",
            Self::Class => "class",
        }
    }
}

/// A parsed source file: the text plus its syntax tree.
pub struct SourceFile {
    text: String,
    tree: Tree,
}

impl std::fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceFile")
            .field("bytes", &self.text.len())
            .finish()
    }
}

impl SourceFile {
    /// Parse Python source text.
    pub fn parse(text: impl Into<String>) -> SealResult<Self> {
        let text = text.into();

        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::language())
            .map_err(|e| SealError::parse(1, format!("python grammar unavailable: {e}")))?;

        let tree = parser
            .parse(&text, None)
            .ok_or_else(|| SealError::parse(1, "parser produced no syntax tree"))?;

        let root = tree.root_node();
        if root.has_error() {
            let (line, message) = first_syntax_error(root);
            return Err(SealError::parse(line, message));
        }
        check_indentation(&text, root)?;

        Ok(Self { text, tree })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    /// All definition units in document order.
    pub fn units(&self) -> Vec<DefinitionUnit<'_>> {
        let mut units = Vec::new();
        let mut cursor = self.tree.walk();

        loop {
            let node = cursor.node();
            if is_definition(node) {
                units.push(DefinitionUnit::from_node(node, self.bytes()));
            }

            if cursor.goto_first_child() {
                continue;
            }
            loop {
                if cursor.goto_next_sibling() {
                    break;
                }
                if !cursor.goto_parent() {
                    tracing::trace!(units = units.len(), "extracted definition units");
                    return units;
                }
            }
        }
    }
}

/// One function, async function or class definition.
#[derive(Debug, Clone)]
pub struct DefinitionUnit<'t> {
    pub name: String,
    /// Enclosing definition names joined with `.`, e.g. `Outer.method`.
    pub qualified_name: String,
    pub kind: UnitKind,
    /// 1-indexed line of the `def`/`async`/`class` keyword.
    pub start_line: usize,
    /// 1-indexed line of the first attached decorator, or `start_line`.
    pub decorator_start_line: usize,
    /// 1-indexed last line of the definition.
    pub end_line: usize,
    /// Byte column of the definition keyword.
    pub indent: usize,
    /// The `function_definition` / `class_definition` node.
    pub node: Node<'t>,
    /// Attached `decorator` nodes in source order.
    pub decorators: Vec<Node<'t>>,
}

impl<'t> DefinitionUnit<'t> {
    fn from_node(node: Node<'t>, src: &[u8]) -> Self {
        let kind = match node.kind() {
            "class_definition" => UnitKind::Class,
            _ if node.child(0).map(|c| c.kind()) == Some("async") => UnitKind::AsyncFunction,
            _ => UnitKind::Function,
        };

        let name = definition_name(node, src);

        let mut scope = vec![name.clone()];
        let mut ancestor = node.parent();
        while let Some(a) = ancestor {
            if is_definition(a) {
                scope.push(definition_name(a, src));
            }
            ancestor = a.parent();
        }
        scope.reverse();

        let decorators: Vec<Node<'t>> = match node.parent() {
            Some(p) if p.kind() == "decorated_definition" => {
                let mut cursor = p.walk();
                let found = p
                    .named_children(&mut cursor)
                    .filter(|c| c.kind() == "decorator")
                    .collect();
                found
            }
            _ => Vec::new(),
        };

        let start_line = node.start_position().row + 1;
        let decorator_start_line = decorators
            .first()
            .map(|d| d.start_position().row + 1)
            .unwrap_or(start_line);

        Self {
            name,
            qualified_name: scope.join("."),
            kind,
            start_line,
            decorator_start_line,
            end_line: node.end_position().row + 1,
            indent: node.start_position().column,
            node,
            decorators,
        }
    }

    /// Decorators classified against a tool namespace.
    pub fn annotations(&self, fmt: &PythonDecorator, src: &[u8]) -> Vec<Annotation> {
        self.decorators
            .iter()
            .map(|d| {
                let start = d.start_position().row;
                let end = d.end_position();
                // A decorator that swallowed its newline does not own the next row.
                let end_row = if end.column == 0 && end.row > start {
                    end.row - 1
                } else {
                    end.row
                };
                Annotation {
                    start_line: start + 1,
                    end_line: end_row + 1,
                    text: d.utf8_text(src).unwrap_or_default().trim_end().to_string(),
                    kind: fmt.classify(*d, src),
                    comment: trailing_comment(*d, src),
                }
            })
            .collect()
    }
}

/// A decorator attached to a unit, with position and classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// 1-indexed line of the `@`.
    pub start_line: usize,
    /// 1-indexed last line the decorator occupies.
    pub end_line: usize,
    pub text: String,
    pub kind: AnnotationKind,
    /// `# ...` following the decorator expression on its last line.
    pub comment: Option<String>,
}

fn trailing_comment(decorator: Node<'_>, src: &[u8]) -> Option<String> {
    let expr = decorator_expression(decorator)?;
    let rest = src.get(expr.end_byte()..)?;
    let line = rest.split(|b| *b == b'\n').next()?;
    let line = std::str::from_utf8(line).ok()?.trim();
    line.starts_with('#').then(|| line.to_string())
}

fn is_definition(node: Node<'_>) -> bool {
    matches!(node.kind(), "function_definition" | "class_definition")
}

fn definition_name(node: Node<'_>, src: &[u8]) -> String {
    node.child_by_field_name("name")
        .and_then(|n| n.utf8_text(src).ok())
        .unwrap_or_default()
        .to_string()
}

/// Clause kinds that must line up with the statement that owns them.
const ALIGNED_CLAUSES: &[&str] = &[
    "elif_clause",
    "else_clause",
    "except_clause",
    "except_group_clause",
    "finally_clause",
];

/// tree-sitter's indentation scanner only compares widths (a tab counts as
/// 8) and dedents to any shallower level. Python is stricter:
/// - statements of one block share the exact same indentation text
/// - a block is indented strictly deeper than its owner, extending its text
/// - module-level statements are not indented
/// - clause headers (`else:`, `except:`, ...) line up with their owner
///
/// Only statements that begin their line are compared; `a = 1; b = 2` and
/// `if x: pass` bodies are not indentation.
fn check_indentation(text: &str, root: Node<'_>) -> SealResult<()> {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut cursor = root.walk();

    loop {
        let node = cursor.node();
        match node.kind() {
            "module" => {
                for (child, prefix) in line_starting_children(node, &lines) {
                    if !prefix.is_empty() {
                        return Err(indent_error(child, "unexpected indent"));
                    }
                }
            }
            "block" => check_block(node, &lines)?,
            kind if ALIGNED_CLAUSES.contains(&kind) => {
                let owner = node.parent().and_then(|p| starting_prefix(p, &lines));
                if let (Some(own), Some(owner)) = (starting_prefix(node, &lines), owner) {
                    if own != owner {
                        return Err(indent_error(node, mismatch_message(own, owner)));
                    }
                }
            }
            _ => {}
        }

        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return Ok(());
            }
        }
    }
}

fn check_block(block: Node<'_>, lines: &[&str]) -> SealResult<()> {
    let children = line_starting_children(block, lines);
    let Some((_, first)) = children.first().copied() else {
        return Ok(());
    };

    for (child, prefix) in &children[1..] {
        if *prefix != first {
            return Err(indent_error(*child, mismatch_message(prefix, first)));
        }
    }

    let owner = block.parent().and_then(|p| starting_prefix(p, lines));
    if let Some(owner) = owner {
        if first.len() <= owner.len() || !first.starts_with(owner) {
            let (child, _) = children[0];
            let message = if first.len() > owner.len() {
                "inconsistent use of tabs and spaces in indentation"
            } else {
                "expected an indented block"
            };
            return Err(indent_error(child, message));
        }
    }
    Ok(())
}

/// Non-extra named children that begin their line, with that line's indentation.
fn line_starting_children<'t, 'l>(node: Node<'t>, lines: &[&'l str]) -> Vec<(Node<'t>, &'l str)> {
    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .filter(|c| !c.is_extra())
        .filter_map(|c| starting_prefix(c, lines).map(|p| (c, p)))
        .collect();
    found
}

/// Indentation text of `node`'s line, if `node` is the first thing on it.
fn starting_prefix<'l>(node: Node<'_>, lines: &[&'l str]) -> Option<&'l str> {
    let pos = node.start_position();
    let line = lines.get(pos.row)?;
    let ws = line.len() - line.trim_start_matches(|c| c == ' ' || c == '\t' || c == '\x0c').len();
    (ws == pos.column).then(|| &line[..ws])
}

fn mismatch_message(a: &str, b: &str) -> &'static str {
    if a.contains('\t') || b.contains('\t') {
        "inconsistent use of tabs and spaces in indentation"
    } else {
        "unindent does not match any outer indentation level"
    }
}

fn indent_error(node: Node<'_>, message: &str) -> SealError {
    SealError::parse(node.start_position().row + 1, message)
}

fn first_syntax_error(root: Node<'_>) -> (usize, String) {
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if node.is_missing() {
            return (
                node.start_position().row + 1,
                format!("missing `{}`", node.kind()),
            );
        }
        if node.is_error() {
            return (node.start_position().row + 1, "invalid syntax".to_string());
        }

        // Only descend into subtrees that contain the error.
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return (
                    root.start_position().row + 1,
                    "invalid syntax".to_string(),
                );
            }
        }
    }
}
