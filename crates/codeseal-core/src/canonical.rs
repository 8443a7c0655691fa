//! Canonical rendering of definition units.
//!
//! The canonical form is the exact text that gets signed. It is produced by a
//! read-only serializer over the syntax tree plus an exclusion predicate (the
//! tool-annotation recognizer). Nothing is cloned and the live tree used for
//! position bookkeeping is never touched.
//!
//! Rendering rules (`canon/v1`):
//! - one output line per logical statement, 4 spaces per nesting depth
//! - tokens within a statement separated by exactly one space
//! - string literals emitted verbatim as a single token
//! - comments and line continuations dropped
//! - clause headers (`elif`, `else`, `except`, `finally`, `case`) open a new
//!   line at the depth of their owning statement
//! - the unit's foreign decorators first, one per line, in source order
//! - tool decorators excluded at every depth, including on nested units
//!
//! IMPORTANT: any change to these rules invalidates every issued signature and
//! must come with a new [`CanonicalVersion`].

use tree_sitter::Node;

use crate::annotation::PythonDecorator;
use crate::extract::{DefinitionUnit, SourceFile};
use crate::version::CanonicalVersion;

const INDENT: &str = "    ";

const CLAUSES: &[&str] = &[
    "elif_clause",
    "else_clause",
    "except_clause",
    "except_group_clause",
    "finally_clause",
    "case_clause",
];

/// Canonical text of one unit, tagged with the rendering version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalText {
    version: CanonicalVersion,
    text: String,
}

impl CanonicalText {
    pub fn version(&self) -> CanonicalVersion {
        self.version
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl std::fmt::Display for CanonicalText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Render `unit` in canonical form, excluding tool annotations.
pub fn canonicalize(
    file: &SourceFile,
    unit: &DefinitionUnit<'_>,
    fmt: &PythonDecorator,
) -> CanonicalText {
    let mut printer = Printer::new(file.bytes(), fmt);

    for decorator in &unit.decorators {
        if fmt.is_tool(*decorator, file.bytes()) {
            continue;
        }
        printer.open(0);
        printer.emit(*decorator, 0);
    }

    printer.open(0);
    printer.emit(unit.node, 0);

    CanonicalText {
        version: CanonicalVersion::CURRENT,
        text: printer.finish(),
    }
}

struct Printer<'a> {
    src: &'a [u8],
    fmt: &'a PythonDecorator,
    lines: Vec<String>,
    depth: usize,
    tokens: Vec<&'a str>,
}

impl<'a> Printer<'a> {
    fn new(src: &'a [u8], fmt: &'a PythonDecorator) -> Self {
        Self {
            src,
            fmt,
            lines: Vec::new(),
            depth: 0,
            tokens: Vec::new(),
        }
    }

    /// Flush the pending line and start a new one at `depth`.
    fn open(&mut self, depth: usize) {
        self.flush();
        self.depth = depth;
    }

    fn flush(&mut self) {
        if self.tokens.is_empty() {
            return;
        }
        let mut line = INDENT.repeat(self.depth);
        line.push_str(&self.tokens.join(" "));
        self.lines.push(line);
        self.tokens.clear();
    }

    fn finish(mut self) -> String {
        self.flush();
        self.lines.join("\n")
    }

    fn token(&mut self, node: Node<'_>) {
        let src = self.src;
        let text = std::str::from_utf8(&src[node.start_byte()..node.end_byte()]).unwrap_or_default();
        if !text.is_empty() {
            self.tokens.push(text);
        }
    }

    fn emit(&mut self, node: Node<'_>, depth: usize) {
        if node.is_extra() {
            return;
        }

        match node.kind() {
            "string" => self.token(node),
            "decorated_definition" => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    if child.is_extra() {
                        continue;
                    }
                    if child.kind() == "decorator" && self.fmt.is_tool(child, self.src) {
                        continue;
                    }
                    self.open(depth);
                    self.emit(child, depth);
                }
            }
            "block" => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    if child.is_extra() {
                        continue;
                    }
                    self.open(depth + 1);
                    self.emit(child, depth + 1);
                }
            }
            kind if CLAUSES.contains(&kind) => {
                self.open(depth);
                self.emit_children(node, depth);
            }
            _ if node.child_count() == 0 => self.token(node),
            _ => self.emit_children(node, depth),
        }
    }

    fn emit_children(&mut self, node: Node<'_>, depth: usize) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.emit(child, depth);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canon_all(src: &str) -> Vec<(String, String)> {
        let file = SourceFile::parse(src).unwrap();
        let fmt = PythonDecorator::new("codeseal");
        file.units()
            .iter()
            .map(|u| (u.qualified_name.clone(), canonicalize(&file, u, &fmt).into_string()))
            .collect()
    }

    fn canon_first(src: &str) -> String {
        canon_all(src).remove(0).1
    }

    #[test]
    fn renders_statements_and_blocks() {
        let src = "def foo(a, b=2):\n    if a:\n        return a+b\n    else:\n        return  b\n";
        assert_eq!(
            canon_first(src),
            "def foo ( a , b = 2 ) :\n    if a :\n        return a + b\n    else :\n        return b"
        );
    }

    #[test]
    fn one_line_suite_matches_expanded_form() {
        assert_eq!(
            canon_first("def foo(): return 42\n"),
            canon_first("def foo():\n    return 42\n")
        );
    }

    #[test]
    fn comments_and_spacing_do_not_matter() {
        let a = "def foo(x):\n    # explain\n    y = x   *  2  # trailing\n    return y\n";
        let b = "def foo( x ):\n    y = x*2\n\n    return y\n";
        assert_eq!(canon_first(a), canon_first(b));
    }

    #[test]
    fn body_changes_matter() {
        assert_ne!(
            canon_first("def foo():\n    return 42\n"),
            canon_first("def foo():\n    return 43\n")
        );
    }

    #[test]
    fn indentation_that_changes_meaning_matters() {
        let a = "def f(x):\n    if x:\n        a()\n        b()\n";
        let b = "def f(x):\n    if x:\n        a()\n    b()\n";
        assert_ne!(canon_first(a), canon_first(b));
    }

    #[test]
    fn strings_are_verbatim() {
        let got = canon_first("def f():\n    return \"a  b\" 'c'\n");
        assert_eq!(got, "def f ( ) :\n    return \"a  b\" 'c'");
    }

    #[test]
    fn tool_annotations_are_excluded_but_foreign_kept() {
        let plain = canon_first("@cache\ndef f():\n    pass\n");
        let signed = canon_first("@codeseal._00ff()\n@cache\ndef f():\n    pass\n");
        let bare = canon_first("@cache\n@codeseal_pending\ndef f():\n    pass\n");
        assert_eq!(plain, "@ cache\ndef f ( ) :\n    pass");
        assert_eq!(plain, signed);
        assert_eq!(plain, bare);
    }

    #[test]
    fn foreign_decorator_order_matters() {
        assert_ne!(
            canon_first("@a\n@b\ndef f():\n    pass\n"),
            canon_first("@b\n@a\ndef f():\n    pass\n")
        );
    }

    #[test]
    fn nested_unit_is_canonicalized_alone() {
        let src = "class Bar:\n    def baz(self):\n        return 'baz'\n";
        let all = canon_all(src);
        assert_eq!(all[1].0, "Bar.baz");
        assert_eq!(all[1].1, "def baz ( self ) :\n    return 'baz'");
        assert_eq!(
            all[0].1,
            "class Bar :\n    def baz ( self ) :\n        return 'baz'"
        );
    }

    #[test]
    fn nested_tool_annotations_are_stripped_from_enclosing_unit() {
        let a = "class Bar:\n    @codeseal._aa()\n    def baz(self):\n        pass\n";
        let b = "class Bar:\n    @codeseal._bb()\n    def baz(self):\n        pass\n";
        let c = "class Bar:\n    def baz(self):\n        pass\n";
        assert_eq!(canon_first(a), canon_first(b));
        assert_eq!(canon_first(a), canon_first(c));
    }

    #[test]
    fn clauses_open_new_lines() {
        let src = "def f():\n    try:\n        x()\n    except ValueError as e:\n        y()\n    finally:\n        z()\n";
        assert_eq!(
            canon_first(src),
            "def f ( ) :\n    try :\n        x ( )\n    except ValueError as e :\n        y ( )\n    finally :\n        z ( )"
        );
    }
}
