//! Loading bug registries from dataset manifests on disk.

use std::fs;
use std::path::{Path, PathBuf};

use reprobox_core::{BugRegistry, DatasetError, HarnessSpec, ReproboxError, TestHarness};
use tempfile::TempDir;

const FIRST: &str = r#"
name = "first"

[[images]]
tag = "reprobox/first:base"
dockerfile = "base/Dockerfile"
context = "base"

[[bugs]]
name = "shared"
program = "calc"

[bugs.build]
tag = "reprobox/first:shared"
dockerfile = "shared/Dockerfile"
context = "shared"
depends_on = "reprobox/first:base"

[bugs.compiler]
command = "make"
context = "/experiment/src"

[bugs.harness]
kind = "numbered"
command = "./test.sh __ID__"
context = "/experiment"
passing = 3
failing = 2

[[bugs]]
name = "first:only"

[bugs.build]
tag = "reprobox/first:only"
dockerfile = "/abs/Dockerfile"
context = "/abs"

[bugs.compiler]
command = "make"

[bugs.harness]
kind = "explicit"

[[bugs.harness.passing]]
name = "smoke"
command = "./run.sh smoke"

[[bugs.harness.failing]]
name = "crash"
command = "./run.sh crash"
time_limit_secs = 5
"#;

const SECOND: &str = r#"
name = "second"

[[bugs]]
name = "shared"

[bugs.build]
tag = "reprobox/second:shared"
dockerfile = "Dockerfile"
context = "."

[bugs.compiler]
command = "make"

[bugs.harness]
kind = "numbered"
command = "./test.sh __ID__"
passing = 1
failing = 1
"#;

fn write_manifest(dir: &Path, rel: &str, text: &str) -> PathBuf {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, text).unwrap();
    path
}

#[test]
fn load_resolves_relative_paths_against_manifest_dir() {
    let tmp = TempDir::new().unwrap();
    let first = write_manifest(tmp.path(), "first/bugs.toml", FIRST);

    let registry = BugRegistry::load(&[first]).unwrap();
    let bug = registry.resolve("shared").unwrap();
    let dir = tmp.path().join("first");

    assert_eq!(bug.build_instructions.dockerfile, dir.join("shared/Dockerfile"));
    assert_eq!(bug.build_instructions.context, dir.join("shared"));
    assert_eq!(bug.dataset.as_deref(), Some("first"));
    assert_eq!(bug.program.as_deref(), Some("calc"));

    let absolute = registry.resolve("first:only").unwrap();
    assert_eq!(absolute.build_instructions.dockerfile, PathBuf::from("/abs/Dockerfile"));
}

#[test]
fn numbered_harness_expands_test_ids() {
    let tmp = TempDir::new().unwrap();
    let first = write_manifest(tmp.path(), "bugs.toml", FIRST);

    let registry = BugRegistry::load(&[first]).unwrap();
    let harness = registry.resolve("shared").unwrap().harness();

    let passing: Vec<String> = harness.passing().into_iter().map(|t| t.name).collect();
    let failing: Vec<String> = harness.failing().into_iter().map(|t| t.name).collect();
    assert_eq!(passing, vec!["p1", "p2", "p3"]);
    assert_eq!(failing, vec!["n1", "n2"]);
    assert_eq!(harness.failing()[1].command, "./test.sh n2");
    assert_eq!(harness.total(), 5);
}

#[test]
fn explicit_harness_keeps_declared_tests() {
    let tmp = TempDir::new().unwrap();
    let first = write_manifest(tmp.path(), "bugs.toml", FIRST);

    let registry = BugRegistry::load(&[first]).unwrap();
    let bug = registry.resolve("first:only").unwrap();

    assert!(matches!(bug.harness, HarnessSpec::Explicit(_)));
    let failing = bug.harness().failing();
    assert_eq!(failing.len(), 1);
    assert_eq!(failing[0].name, "crash");
    assert_eq!(failing[0].time_limit_secs, 5);
}

#[test]
fn earlier_manifest_wins_on_name_clash() {
    let tmp = TempDir::new().unwrap();
    let first = write_manifest(tmp.path(), "first.toml", FIRST);
    let second = write_manifest(tmp.path(), "second.toml", SECOND);

    let registry = BugRegistry::load(&[first, second]).unwrap();

    assert_eq!(registry.source_names(), vec!["first", "second"]);
    assert_eq!(
        registry.resolve("shared").unwrap().build_instructions.tag,
        "reprobox/first:shared"
    );
    let names: Vec<&str> = registry.bugs().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["shared", "first:only", "shared"]);
}

#[test]
fn build_instructions_list_images_before_bugs() {
    let tmp = TempDir::new().unwrap();
    let first = write_manifest(tmp.path(), "bugs.toml", FIRST);

    let registry = BugRegistry::load(&[first]).unwrap();
    let tags: Vec<&str> = registry
        .build_instructions()
        .map(|b| b.tag.as_str())
        .collect();

    assert_eq!(
        tags,
        vec!["reprobox/first:base", "reprobox/first:shared", "reprobox/first:only"]
    );
}

#[test]
fn duplicate_bug_names_are_rejected() {
    let tmp = TempDir::new().unwrap();
    let doubled = format!("{SECOND}\n{}", SECOND.replace("name = \"second\"", ""));
    let path = write_manifest(tmp.path(), "dup.toml", &doubled);

    let err = BugRegistry::load(&[path]).unwrap_err();

    assert!(matches!(
        err,
        ReproboxError::Dataset(DatasetError::DuplicateBug { ref bug, .. }) if bug == "shared"
    ));
}

#[test]
fn missing_manifest_is_a_read_error() {
    let tmp = TempDir::new().unwrap();
    let err = BugRegistry::load(&[tmp.path().join("absent.toml")]).unwrap_err();
    assert!(matches!(err, ReproboxError::Dataset(DatasetError::Read { .. })));
}

#[test]
fn malformed_manifest_is_a_parse_error() {
    let tmp = TempDir::new().unwrap();
    let path = write_manifest(tmp.path(), "bad.toml", "name = \"bad\"\n[[bugs]]\nname = 3\n");
    let err = BugRegistry::load(&[path]).unwrap_err();
    assert!(matches!(err, ReproboxError::Dataset(DatasetError::Parse { .. })));
}
