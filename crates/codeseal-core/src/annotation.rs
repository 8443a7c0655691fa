//! Native annotation syntax for tool-owned markers.
//!
//! The signing protocol itself (canonicalize, sign, embed) knows nothing about
//! Python. Everything that depends on how a marker looks in source lives here:
//! rendering the injected decorator line and recognizing existing decorators
//! as tool-owned.
//!
//! Recognition rule. A decorator is tool-owned iff it is
//! - a zero-argument call whose callee is the dotted name `<ns>._<token>`, or
//! - a bare reference (identifier or attribute chain) whose dotted text starts
//!   with the namespace.
//!
//! Only the call form is ever generated, and only the call form carries a token.

use tree_sitter::Node;

/// Classification of one decorator attached to a definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationKind {
    /// Not owned by the tool; must survive every rewrite untouched.
    Foreign,
    /// `@<ns>._<token>()`.
    Signed { token: String },
    /// `@<ns>...` without a call; removed but never verified.
    Bare,
}

impl AnnotationKind {
    pub fn is_tool(&self) -> bool {
        !matches!(self, Self::Foreign)
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Signed { token } => Some(token),
            _ => None,
        }
    }
}

/// Python decorator formatter and recognizer for one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PythonDecorator {
    namespace: String,
}

impl PythonDecorator {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Render the injected line body (without indentation).
    pub fn render(&self, token: &str) -> String {
        format!("@{}._{}()", self.namespace, token)
    }

    /// Classify a `decorator` node.
    pub fn classify(&self, decorator: Node<'_>, src: &[u8]) -> AnnotationKind {
        let Some(expr) = decorator_expression(decorator) else {
            return AnnotationKind::Foreign;
        };

        match expr.kind() {
            "call" => self.classify_call(expr, src),
            "identifier" | "attribute" => match dotted_name(expr, src) {
                Some(name) if name.starts_with(&self.namespace) => AnnotationKind::Bare,
                _ => AnnotationKind::Foreign,
            },
            _ => AnnotationKind::Foreign,
        }
    }

    /// Shorthand for `classify(..).is_tool()`.
    pub fn is_tool(&self, decorator: Node<'_>, src: &[u8]) -> bool {
        self.classify(decorator, src).is_tool()
    }

    fn classify_call(&self, call: Node<'_>, src: &[u8]) -> AnnotationKind {
        let (Some(callee), Some(args)) = (
            call.child_by_field_name("function"),
            call.child_by_field_name("arguments"),
        ) else {
            return AnnotationKind::Foreign;
        };

        if args.kind() != "argument_list" || significant_named_children(args) != 0 {
            return AnnotationKind::Foreign;
        }

        let Some(name) = dotted_name(callee, src) else {
            return AnnotationKind::Foreign;
        };

        let prefix_len = self.namespace.len() + 2;
        match name.strip_prefix(&self.namespace) {
            Some(rest) if rest.starts_with("._") && !rest[2..].contains('.') => {
                AnnotationKind::Signed {
                    token: name[prefix_len..].to_string(),
                }
            }
            _ => AnnotationKind::Foreign,
        }
    }
}

/// The expression under a `decorator` node (the part after `@`).
pub fn decorator_expression(decorator: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = decorator.walk();
    let found = decorator
        .named_children(&mut cursor)
        .find(|c| c.kind() != "comment");
    found
}

/// Dotted text of an identifier or attribute chain, e.g. `pkg.mod.name`.
pub fn dotted_name(node: Node<'_>, src: &[u8]) -> Option<String> {
    match node.kind() {
        "identifier" => node.utf8_text(src).ok().map(str::to_string),
        "attribute" => {
            let object = node.child_by_field_name("object")?;
            let attr = node.child_by_field_name("attribute")?;
            let head = dotted_name(object, src)?;
            let tail = attr.utf8_text(src).ok()?;
            Some(format!("{head}.{tail}"))
        }
        _ => None,
    }
}

fn significant_named_children(node: Node<'_>) -> usize {
    let mut cursor = node.walk();
    let count = node
        .named_children(&mut cursor)
        .filter(|c| c.kind() != "comment")
        .count();
    count
}
