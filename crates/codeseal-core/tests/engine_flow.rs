//! engine_flow.rs
//!
//! File-level decorate / check / remove against real files on disk.

use std::fs;
use std::path::{Path, PathBuf};

use assert_matches::assert_matches;
use codeseal_core::prelude::*;

const SAMPLE: &str = "
def foo():
    return 42

class Bar:
    def baz(self):
        return 'baz'
";

fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
    let p = dir.join(name);
    fs::write(&p, text).unwrap();
    p
}

fn annotation_lines(text: &str) -> usize {
    text.lines()
        .filter(|l| l.trim_start().starts_with("@codeseal._"))
        .count()
}

fn decorate_in_place(path: &Path, keys: &StaticKeys, cfg: &CoreConfig) -> String {
    let original = fs::read_to_string(path).unwrap();
    let text = decorate_file(path, keys, cfg).unwrap();
    commit(path, &original, &text).unwrap();
    text
}

#[test]
fn scenario_decorate_then_check() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "sample.py", SAMPLE);
    let keys = StaticKeys::from_keypair(&generate_keypair());
    let cfg = CoreConfig::default();

    let text = decorate_in_place(&path, &keys, &cfg);
    assert_eq!(annotation_lines(&text), 3);

    let report = check_file(&path, &keys, &cfg).unwrap();
    let names: Vec<&str> = report.units.iter().map(|u| u.qualified_name.as_str()).collect();
    assert_eq!(names, vec!["foo", "Bar", "Bar.baz"]);
    assert!(report.units.iter().all(|u| u.result.valid));
    assert!(report
        .units
        .iter()
        .all(|u| u.result.message == "Signature valid - code has not been tampered with"));
}

#[test]
fn scenario_tamper_is_local_to_the_unit() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "sample.py", SAMPLE);
    let keys = StaticKeys::from_keypair(&generate_keypair());
    let cfg = CoreConfig::default();

    let text = decorate_in_place(&path, &keys, &cfg);
    fs::write(&path, text.replace("return 42", "return 43")).unwrap();

    let report = check_file(&path, &keys, &cfg).unwrap();
    let foo = report.get("foo").unwrap();
    assert!(foo.has_annotation);
    assert!(!foo.valid);
    assert_eq!(foo.message, "Signature invalid - code may have been modified");
    assert!(report.get("Bar").unwrap().valid);
    assert!(report.get("Bar.baz").unwrap().valid);
    assert_eq!(report.failed_count(), 1);
}

#[test]
fn scenario_no_definitions() {
    let src = "\n# No functions or classes here\nx = 123\n";
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "plain.py", src);
    let keys = StaticKeys::from_keypair(&generate_keypair());
    let cfg = CoreConfig::default();

    assert_eq!(decorate_file(&path, &keys, &cfg).unwrap(), src);
    assert!(check_file(&path, &keys, &cfg).unwrap().is_empty());
    assert_eq!(remove_file(&path, &cfg).unwrap(), (src.to_string(), false));
}

#[test]
fn formatting_and_comments_do_not_invalidate() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "sample.py", SAMPLE);
    let keys = StaticKeys::from_keypair(&generate_keypair());
    let cfg = CoreConfig::default();

    let text = decorate_in_place(&path, &keys, &cfg);
    let reformatted = text
        .replace("return 42", "return   42  # the answer")
        .replace("class Bar:", "class Bar:\n\n    # helper methods");
    fs::write(&path, reformatted).unwrap();

    let report = check_file(&path, &keys, &cfg).unwrap();
    assert_eq!(report.valid_count(), 3, "{report:?}");
}

#[test]
fn inner_change_invalidates_enclosing_class() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "sample.py", SAMPLE);
    let keys = StaticKeys::from_keypair(&generate_keypair());
    let cfg = CoreConfig::default();

    let text = decorate_in_place(&path, &keys, &cfg);
    fs::write(&path, text.replace("return 'baz'", "return 'qux'")).unwrap();

    let report = check_file(&path, &keys, &cfg).unwrap();
    assert!(report.get("foo").unwrap().valid);
    assert!(!report.get("Bar").unwrap().valid);
    assert!(!report.get("Bar.baz").unwrap().valid);
}

#[test]
fn inner_annotation_change_leaves_outer_valid() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "sample.py", SAMPLE);
    let keys = StaticKeys::from_keypair(&generate_keypair());
    let cfg = CoreConfig::default();

    let text = decorate_in_place(&path, &keys, &cfg);
    let lines: Vec<&str> = text.split('\n').collect();
    let inner = lines
        .iter()
        .position(|l| l.starts_with("    @codeseal._"))
        .unwrap();

    let mut edited: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    edited[inner] = format!("    @codeseal._{}()", "0".repeat(128));
    fs::write(&path, edited.join("\n")).unwrap();

    let report = check_file(&path, &keys, &cfg).unwrap();
    assert!(report.get("Bar").unwrap().valid);
    assert!(!report.get("Bar.baz").unwrap().valid);
}

#[test]
fn missing_key_leaves_file_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "sample.py", SAMPLE);

    let err = decorate_file(&path, &StaticKeys::empty(), &CoreConfig::default()).unwrap_err();
    assert_matches!(err, SealError::Configuration { .. });
    assert_eq!(fs::read_to_string(&path).unwrap(), SAMPLE);
}

#[test]
fn verify_only_keys_can_check_but_not_decorate() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "sample.py", SAMPLE);
    let pair = generate_keypair();
    let cfg = CoreConfig::default();

    decorate_in_place(&path, &StaticKeys::from_keypair(&pair), &cfg);

    let verifier = StaticKeys::verify_only(pair.verifying_key());
    assert_eq!(check_file(&path, &verifier, &cfg).unwrap().valid_count(), 3);
    assert_matches!(
        decorate_file(&path, &verifier, &cfg),
        Err(SealError::Configuration { .. })
    );
}

#[test]
fn remove_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "sample.py", SAMPLE);
    let keys = StaticKeys::from_keypair(&generate_keypair());
    let cfg = CoreConfig::default();

    let decorated = decorate_in_place(&path, &keys, &cfg);
    let (text, found) = remove_file(&path, &cfg).unwrap();
    assert!(found);
    assert_eq!(text, SAMPLE);

    commit(&path, &decorated, &text).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), SAMPLE);

    let report = check_file(&path, &keys, &cfg).unwrap();
    assert_eq!(report.signed_count(), 0);
}

#[test]
fn decorators_and_async_units_are_covered() {
    let src = "import functools\n\n@functools.cache\nasync def fetch(url):\n    return url\n";
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "net.py", src);
    let keys = StaticKeys::from_keypair(&generate_keypair());
    let cfg = CoreConfig::default();

    let text = decorate_in_place(&path, &keys, &cfg);
    let lines: Vec<&str> = text.split('\n').collect();
    assert!(lines[2].starts_with("@codeseal._"));
    assert_eq!(lines[3], "@functools.cache");

    let report = check_file(&path, &keys, &cfg).unwrap();
    assert_eq!(report.units[0].kind, UnitKind::AsyncFunction);
    assert!(report.units[0].result.valid);

    // Dropping the foreign decorator changes what the unit means.
    fs::write(&path, text.replace("@functools.cache\n", "")).unwrap();
    assert!(!check_file(&path, &keys, &cfg).unwrap().units[0].result.valid);
}

#[test]
fn parse_error_reports_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "broken.py", "x = 1\ny = 2\ndef f(:\n    pass\n");
    let keys = StaticKeys::from_keypair(&generate_keypair());

    let err = check_file(&path, &keys, &CoreConfig::default()).unwrap_err();
    assert_matches!(err, SealError::Parse { line: 3, .. });
}

#[test]
fn stale_commit_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "sample.py", SAMPLE);
    let keys = StaticKeys::from_keypair(&generate_keypair());
    let cfg = CoreConfig::default();

    let text = decorate_file(&path, &keys, &cfg).unwrap();
    fs::write(&path, "def other():\n    pass\n").unwrap();

    assert_matches!(commit(&path, SAMPLE, &text), Err(SealError::Rewrite(_)));
    assert_eq!(fs::read_to_string(&path).unwrap(), "def other():\n    pass\n");
}
