//! Annotation rewriting.
//!
//! Decorate runs the full state machine on one file's text:
//!
//! 1. scan: extract units, collect every line covered by a tool annotation
//! 2. strip: delete those lines, highest first
//! 3. re-extract: re-parse the stripped text (positions from 1 are stale)
//! 4. compute: canonicalize and sign every unit
//! 5. insert: one annotation line per unit, bottom to top, directly above the
//!    unit's first line (above any remaining foreign decorators)
//! 6. confirm: re-parse and check every unit carries exactly the token that
//!    was computed for it
//!
//! Remove is steps 1 and 2 plus a confirming re-parse.
//!
//! Stripping deletes whole lines. A comment trailing a tool annotation
//! (`@codeseal._<token>()  # reviewed`) is not tool-owned, so it stays
//! behind as a standalone comment line where the annotation was.
//!
//! Text is split on `\n` and re-joined with `\n`, so trailing newlines and
//! CRLF endings survive unchanged. A parse failure on the input is a
//! `Parse` error; any failure after the first edit is a `Rewrite` error.
//! Nothing is returned unless the whole rewrite succeeded.

use std::collections::BTreeMap;

use ed25519_dalek::SigningKey;

use crate::annotation::PythonDecorator;
use crate::canonical::canonicalize;
use crate::crypto::sign;
use crate::errors::{SealError, SealResult};
use crate::extract::SourceFile;

/// Result of stripping tool annotations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stripped {
    pub text: String,
    /// Number of tool annotations that were removed.
    pub removed: usize,
}

impl Stripped {
    pub fn found(&self) -> bool {
        self.removed > 0
    }
}

/// A pending insertion, 0-indexed.
#[derive(Debug, Clone)]
struct Insertion {
    row: usize,
    line: String,
}

/// Steps 1 and 2: delete every line covered by a tool annotation. A trailing
/// `# ...` comment on the annotation's last line is kept on a line of its own,
/// at the annotation's indentation.
pub fn strip_tool_annotations(text: &str, fmt: &PythonDecorator) -> SealResult<Stripped> {
    let file = SourceFile::parse(text)?;

    // Row -> replacement line, or `None` to delete the row.
    let mut edits: BTreeMap<usize, Option<String>> = BTreeMap::new();
    let mut removed = 0usize;
    for unit in file.units() {
        for ann in unit.annotations(fmt, file.bytes()) {
            if !ann.kind.is_tool() {
                continue;
            }
            removed += 1;
            for row in ann.start_line - 1..ann.end_line {
                edits.insert(row, None);
            }
            if let Some(comment) = ann.comment {
                edits.insert(ann.start_line - 1, Some(comment));
            }
        }
    }

    if edits.is_empty() {
        return Ok(Stripped {
            text: text.to_string(),
            removed: 0,
        });
    }

    let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();
    let mut kept = 0usize;
    for (row, edit) in edits.iter().rev() {
        if *row >= lines.len() {
            return Err(SealError::rewrite(format!(
                "annotation line {} is past the end of the file",
                row + 1
            )));
        }
        match edit {
            Some(comment) => {
                let line = &lines[*row];
                let mut replacement = indentation(line).to_string();
                replacement.push_str(comment);
                if line.ends_with('\r') {
                    replacement.push('\r');
                }
                lines[*row] = replacement;
                kept += 1;
            }
            None => {
                lines.remove(*row);
            }
        }
    }

    tracing::debug!(
        removed,
        lines = edits.len() - kept,
        comments_kept = kept,
        "stripped tool annotations"
    );
    Ok(Stripped {
        text: lines.join("\n"),
        removed,
    })
}

/// Remove every tool annotation. Returns the new text and whether any existed.
pub fn remove_annotations(text: &str, fmt: &PythonDecorator) -> SealResult<(String, bool)> {
    let stripped = strip_tool_annotations(text, fmt)?;
    if stripped.found() {
        SourceFile::parse(stripped.text.as_str()).map_err(|e| {
            SealError::rewrite(format!("text no longer parses after stripping: {e}"))
        })?;
    }
    let found = stripped.found();
    Ok((stripped.text, found))
}

/// Strip old annotations and sign every definition unit afresh.
pub fn decorate(text: &str, fmt: &PythonDecorator, key: &SigningKey) -> SealResult<String> {
    let stripped = strip_tool_annotations(text, fmt)?;

    let file = SourceFile::parse(stripped.text.as_str()).map_err(|e| {
        SealError::rewrite(format!("text no longer parses after stripping: {e}"))
    })?;

    let mut lines: Vec<String> = file.text().split('\n').map(str::to_string).collect();

    let mut expected = Vec::new();
    let mut insertions = Vec::new();
    for unit in file.units() {
        let canonical = canonicalize(&file, &unit, fmt);
        let token = sign(&canonical, key)?;

        let row = unit.decorator_start_line - 1;
        let anchor = lines.get(row).ok_or_else(|| {
            SealError::rewrite(format!(
                "unit `{}` starts past the end of the file",
                unit.qualified_name
            ))
        })?;

        let mut line = leading_whitespace(anchor, unit.indent);
        line.push_str(&fmt.render(token.as_str()));
        if anchor.ends_with('\r') {
            line.push('\r');
        }

        insertions.push(Insertion { row, line });
        expected.push(token.into_string());
    }

    // Bottom to top: an insertion never shifts a row that is still pending.
    insertions.sort_by(|a, b| b.row.cmp(&a.row));
    for ins in insertions {
        lines.insert(ins.row, ins.line);
    }

    let out = lines.join("\n");
    confirm(&out, fmt, &expected)?;

    tracing::debug!(
        namespace = fmt.namespace(),
        units = expected.len(),
        replaced = stripped.removed,
        "decorated source"
    );
    Ok(out)
}

/// Step 6: every unit must carry exactly the expected token, in order.
fn confirm(text: &str, fmt: &PythonDecorator, expected: &[String]) -> SealResult<()> {
    let file = SourceFile::parse(text)
        .map_err(|e| SealError::rewrite(format!("decorated text does not parse: {e}")))?;

    let units = file.units();
    if units.len() != expected.len() {
        return Err(SealError::rewrite(format!(
            "expected {} definition units after insertion, found {}",
            expected.len(),
            units.len()
        )));
    }

    for (unit, token) in units.iter().zip(expected) {
        let tool: Vec<_> = unit
            .annotations(fmt, file.bytes())
            .into_iter()
            .filter(|a| a.kind.is_tool())
            .collect();

        match tool.as_slice() {
            [ann] if ann.kind.token() == Some(token.as_str()) => {}
            _ => {
                return Err(SealError::rewrite(format!(
                    "annotation for `{}` at line {} was not placed correctly",
                    unit.qualified_name, unit.start_line
                )))
            }
        }
    }
    Ok(())
}

fn indentation(line: &str) -> &str {
    let ws = line.len() - line.trim_start_matches(|c| c == ' ' || c == '\t').len();
    &line[..ws]
}

/// The whitespace prefix of `line`, capped at `indent` bytes. Falls back to
/// spaces when the line does not start with `indent` bytes of whitespace.
fn leading_whitespace(line: &str, indent: usize) -> String {
    let ws = line.len() - line.trim_start_matches(|c| c == ' ' || c == '\t').len();
    if ws >= indent {
        line[..indent].to_string()
    } else {
        " ".repeat(indent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_keypair;

    const SAMPLE: &str = "\ndef foo():\n    return 42\n\nclass Bar:\n    def baz(self):\n        return 'baz'\n";

    fn fmt() -> PythonDecorator {
        PythonDecorator::new("codeseal")
    }

    fn tool_lines(text: &str) -> Vec<(usize, String)> {
        text.split('\n')
            .enumerate()
            .filter(|(_, l)| l.trim_start().starts_with("@codeseal._"))
            .map(|(i, l)| (i + 1, l.to_string()))
            .collect()
    }

    #[test]
    fn decorate_inserts_one_line_per_unit() {
        let pair = generate_keypair();
        let out = decorate(SAMPLE, &fmt(), pair.signing_key()).unwrap();

        let lines: Vec<&str> = out.split('\n').collect();
        let tools = tool_lines(&out);
        assert_eq!(tools.len(), 3);

        // Each annotation sits directly above its definition, at its indent.
        assert!(lines[1].starts_with("@codeseal._"));
        assert_eq!(lines[2], "def foo():");
        assert!(lines[5].starts_with("@codeseal._"));
        assert_eq!(lines[6], "class Bar:");
        assert!(lines[7].starts_with("    @codeseal._"));
        assert_eq!(lines[8], "    def baz(self):");
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn decorate_is_idempotent() {
        let pair = generate_keypair();
        let once = decorate(SAMPLE, &fmt(), pair.signing_key()).unwrap();
        let twice = decorate(&once, &fmt(), pair.signing_key()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn remove_restores_original() {
        let pair = generate_keypair();
        let decorated = decorate(SAMPLE, &fmt(), pair.signing_key()).unwrap();
        let (restored, found) = remove_annotations(&decorated, &fmt()).unwrap();
        assert!(found);
        assert_eq!(restored, SAMPLE);
    }

    #[test]
    fn remove_without_annotations_reports_not_found() {
        let (text, found) = remove_annotations(SAMPLE, &fmt()).unwrap();
        assert!(!found);
        assert_eq!(text, SAMPLE);
    }

    #[test]
    fn new_annotation_goes_above_foreign_decorators() {
        let pair = generate_keypair();
        let src = "@functools.cache\n@other\ndef f():\n    pass\n";
        let out = decorate(src, &fmt(), pair.signing_key()).unwrap();
        let lines: Vec<&str> = out.split('\n').collect();
        assert!(lines[0].starts_with("@codeseal._"));
        assert_eq!(&lines[1..], &["@functools.cache", "@other", "def f():", "    pass", ""]);

        let (restored, _) = remove_annotations(&out, &fmt()).unwrap();
        assert_eq!(restored, src);
    }

    #[test]
    fn stale_annotations_are_replaced_not_duplicated() {
        let pair = generate_keypair();
        let src = "@codeseal._00\n@codeseal_pending\ndef f():\n    pass\n";
        let out = decorate(src, &fmt(), pair.signing_key()).unwrap();
        assert_eq!(tool_lines(&out).len(), 1);
        assert!(!out.contains("codeseal_pending"));
    }

    #[test]
    fn units_inserted_above_keep_annotations_in_place() {
        let pair = generate_keypair();
        let decorated = decorate(SAMPLE, &fmt(), pair.signing_key()).unwrap();

        let edited = format!("def new_one():\n    return 0\n{decorated}");
        let out = decorate(&edited, &fmt(), pair.signing_key()).unwrap();

        let lines: Vec<&str> = out.split('\n').collect();
        for (i, line) in lines.iter().enumerate() {
            if line.trim_start().starts_with("@codeseal._") {
                let next = lines[i + 1].trim_start();
                assert!(
                    next.starts_with("def ") || next.starts_with("class "),
                    "annotation at line {} is followed by {next:?}",
                    i + 1
                );
            }
        }
        assert_eq!(tool_lines(&out).len(), 4);

        // The old units keep exactly the tokens they had.
        let old_tokens: Vec<String> = tool_lines(&decorated).into_iter().map(|t| t.1).collect();
        let new_tokens: Vec<String> = tool_lines(&out).into_iter().skip(1).map(|t| t.1).collect();
        assert_eq!(old_tokens, new_tokens);
    }

    #[test]
    fn crlf_endings_survive() {
        let pair = generate_keypair();
        let src = "def foo():\r\n    return 1\r\n";
        let out = decorate(src, &fmt(), pair.signing_key()).unwrap();
        assert!(out.split('\n').filter(|l| !l.is_empty()).all(|l| l.ends_with('\r')));

        let (restored, _) = remove_annotations(&out, &fmt()).unwrap();
        assert_eq!(restored, src);
    }

    #[test]
    fn tab_indentation_is_reused() {
        let pair = generate_keypair();
        let src = "class A:\n\tdef f(self):\n\t\tpass\n";
        let out = decorate(src, &fmt(), pair.signing_key()).unwrap();
        let lines: Vec<&str> = out.split('\n').collect();
        assert!(lines[2].starts_with("\t@codeseal._"));
        assert_eq!(lines[3], "\tdef f(self):");
    }

    #[test]
    fn empty_module_is_untouched() {
        let pair = generate_keypair();
        let src = "\n# No functions or classes here\nx = 123\n";
        assert_eq!(decorate(src, &fmt(), pair.signing_key()).unwrap(), src);
        assert_eq!(decorate("", &fmt(), pair.signing_key()).unwrap(), "");
    }

    #[test]
    fn trailing_comment_on_annotation_is_kept() {
        let src = "class A:\n    @codeseal._00()  # reviewed by X\n    def f(self):\n        pass\n";
        let (removed, found) = remove_annotations(src, &fmt()).unwrap();
        assert!(found);
        assert_eq!(removed, "class A:\n    # reviewed by X\n    def f(self):\n        pass\n");

        let pair = generate_keypair();
        let out = decorate(src, &fmt(), pair.signing_key()).unwrap();
        let lines: Vec<&str> = out.split('\n').collect();
        assert_eq!(lines[2], "    # reviewed by X");
        assert!(lines[3].starts_with("    @codeseal._"));
        assert_eq!(lines[4], "    def f(self):");
        assert_eq!(decorate(&out, &fmt(), pair.signing_key()).unwrap(), out);
    }

    #[test]
    fn trailing_comment_survives_crlf_and_multiline_annotation() {
        let src = "@codeseal._00(\r\n)  # keep\r\ndef f():\r\n    pass\r\n";
        let (removed, _) = remove_annotations(src, &fmt()).unwrap();
        assert_eq!(removed, "# keep\r\ndef f():\r\n    pass\r\n");
    }

    #[test]
    fn inconsistent_indentation_is_refused() {
        let pair = generate_keypair();
        let err = decorate("def f():\n        x = 1\n    y = 2\n", &fmt(), pair.signing_key())
            .unwrap_err();
        assert_eq!(err.code(), "parse");
    }

    #[test]
    fn parse_failure_is_reported_as_parse_error() {
        let pair = generate_keypair();
        let err = decorate("def f(:\n", &fmt(), pair.signing_key()).unwrap_err();
        assert_eq!(err.code(), "parse");
    }
}
