use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, SystemTime};

use chrono::Utc;
use pfind::finder::{EntryType, SizeFilter};
use pfind::{CancelToken, Entry, FindError, FindOptions, Finder, OutputFormat};
use tempfile::{tempdir, TempDir};
use walkdir::WalkDir;

fn mk_file(base: &Path, rel: &str, size: usize, modified: SystemTime) -> PathBuf {
    let path = base.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, vec![b'x'; size]).unwrap();
    File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(modified)
        .unwrap();
    path
}

fn options(root: &Path) -> FindOptions {
    FindOptions::new()
        .with_root(root)
        .with_respect_gitignore(false)
        .with_output(OutputFormat::Json)
}

fn run_json(options: FindOptions) -> Vec<Entry> {
    let mut out = Vec::new();
    Finder::new(options)
        .unwrap()
        .run(&mut out, &CancelToken::new())
        .unwrap();
    serde_json::from_slice(&out).unwrap_or_else(|e| {
        panic!("invalid json: {e}\n{}", String::from_utf8_lossy(&out))
    })
}

fn path_set(entries: &[Entry]) -> BTreeSet<PathBuf> {
    entries.iter().map(|e| e.path.clone()).collect()
}

fn name_set(entries: &[Entry]) -> BTreeSet<String> {
    entries.iter().map(|e| e.name.clone()).collect()
}

fn hours_ago(hours: u64) -> SystemTime {
    SystemTime::now() - Duration::from_secs(hours * 3600)
}

fn deep_tree() -> TempDir {
    let dir = tempdir().unwrap();
    for i in 0..20 {
        mk_file(dir.path(), &format!("a/b/c/f/g/file_{i}.txt"), 1, SystemTime::now());
        mk_file(dir.path(), &format!("w{}/x/file_{i}.txt", i % 4), 1, SystemTime::now());
    }
    dir
}

#[test]
fn test_same_results_with_different_concurrency() {
    let dir = deep_tree();

    let serial = path_set(&run_json(options(dir.path()).with_concurrency(1)));
    let parallel = path_set(&run_json(options(dir.path()).with_concurrency(8)));
    assert_eq!(serial, parallel);

    let expected: BTreeSet<PathBuf> = WalkDir::new(dir.path())
        .min_depth(1)
        .into_iter()
        .map(|e| e.unwrap().into_path())
        .collect();
    assert_eq!(serial, expected);
}

#[test]
fn test_max_depth_boundary() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    mk_file(root, "a.txt", 1, SystemTime::now());
    mk_file(root, "sub/b.txt", 1, SystemTime::now());
    mk_file(root, "sub/deeper/c.txt", 1, SystemTime::now());

    let run = |max_depth| {
        name_set(&run_json(
            options(root).with_max_depth(max_depth).with_concurrency(4),
        ))
    };

    let depth0 = run(Some(0));
    assert_eq!(depth0, ["a.txt", "sub"].map(String::from).into());

    let depth1 = run(Some(1));
    assert_eq!(depth1, ["a.txt", "sub", "b.txt", "deeper"].map(String::from).into());

    let unlimited = run(None);
    assert!(unlimited.contains("c.txt"));
    assert_eq!(unlimited.len(), 5);
}

#[test]
fn test_filter_composition() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    let recent = hours_ago(1);

    mk_file(root, "keep.go", 2000, recent);
    mk_file(root, "skip_ext.txt", 2000, recent);
    mk_file(root, "too_small.go", 10, recent);
    mk_file(root, "too_old.go", 2000, hours_ago(72));
    mk_file(root, "name.go", 2000, recent);

    let entries = run_json(
        options(root)
            .with_extensions([".go"])
            .with_regex("keep|too_old|too_small|skip_ext")
            .with_size(SizeFilter { min: Some(1000), ..Default::default() })
            .with_since(Utc::now() - chrono::Duration::hours(24))
            .with_concurrency(2),
    );

    assert_eq!(name_set(&entries), ["keep.go"].map(String::from).into());
}

#[test]
fn test_before_and_type_filters() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    mk_file(root, "a.go", 100, hours_ago(24));
    mk_file(root, "b.go", 100, hours_ago(1));
    fs::create_dir(root.join("pkg.go")).unwrap();

    let entries = run_json(
        options(root)
            .with_entry_type(EntryType::Files)
            .with_extensions(["go"])
            .with_before(Utc::now() - chrono::Duration::hours(2)),
    );
    assert_eq!(name_set(&entries), ["a.go"].map(String::from).into());

    let dirs = run_json(options(root).with_entry_type(EntryType::Directories));
    assert_eq!(name_set(&dirs), ["pkg.go"].map(String::from).into());
}

#[test]
fn test_directory_failing_filter_is_still_recursed() {
    let dir = tempdir().unwrap();
    mk_file(dir.path(), "src/nested/lib.rs", 10, SystemTime::now());

    let entries = run_json(
        options(dir.path())
            .with_entry_type(EntryType::Files)
            .with_name("lib"),
    );
    assert_eq!(name_set(&entries), ["lib.rs"].map(String::from).into());
}

#[test]
fn test_hidden_exclusion() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    mk_file(root, "visible.txt", 1, SystemTime::now());
    mk_file(root, ".hidden.txt", 1, SystemTime::now());
    mk_file(root, ".secret/inner.txt", 1, SystemTime::now());

    let files = options(root).with_entry_type(EntryType::Files);

    let without = run_json(files.clone());
    assert_eq!(name_set(&without), ["visible.txt"].map(String::from).into());

    let with = run_json(files.with_include_hidden(true));
    assert_eq!(
        name_set(&with),
        [".hidden.txt", "inner.txt", "visible.txt"].map(String::from).into()
    );
}

fn ignore_tree() -> TempDir {
    let dir = tempdir().unwrap();
    let root = dir.path();
    mk_file(root, "node_modules/pkg/index.js", 1, SystemTime::now());
    mk_file(root, "build/out.bin", 1, SystemTime::now());
    mk_file(root, "keep/file.tmp", 1, SystemTime::now());
    mk_file(root, "keep/readme.md", 1, SystemTime::now());
    dir
}

#[test]
fn test_ignore_patterns_prune_and_skip() {
    let dir = ignore_tree();

    let entries = run_json(
        options(dir.path()).with_ignore_patterns(["node_modules/", "*.tmp"]),
    );
    let names = name_set(&entries);

    assert!(!names.contains("node_modules"));
    assert!(!names.contains("pkg"));
    assert!(!names.contains("index.js"));
    assert!(!names.contains("file.tmp"));
    assert!(names.contains("readme.md"));
    assert!(names.contains("build"));
    assert!(names.contains("out.bin"));
}

#[test]
fn test_gitignore_from_project_root() {
    let dir = ignore_tree();
    let root = dir.path();
    fs::create_dir(root.join(".git")).unwrap();
    fs::write(root.join(".gitignore"), "# deps\nnode_modules/\nbuild\n").unwrap();

    let entries = run_json(
        FindOptions::new()
            .with_root(root)
            .with_output(OutputFormat::Json),
    );
    let names = name_set(&entries);
    assert_eq!(names, ["file.tmp", "keep", "readme.md"].map(String::from).into());

    let ignored_off = run_json(options(root));
    assert!(name_set(&ignored_off).contains("index.js"));

    // a search below the project root still uses the project's ignore file
    let nested = run_json(
        FindOptions::new()
            .with_root(root.join("node_modules"))
            .with_output(OutputFormat::Json),
    );
    assert!(nested.is_empty());
}

#[test]
fn test_json_array_framing() {
    let dir = tempdir().unwrap();

    for pretty in [false, true] {
        let empty = run_json(options(dir.path()).with_pretty(pretty));
        assert!(empty.is_empty());
    }

    for i in 0..5 {
        mk_file(dir.path(), &format!("d/sub/f{i}.txt"), 10, SystemTime::now());
    }
    for pretty in [false, true] {
        let entries = run_json(
            options(dir.path())
                .with_pretty(pretty)
                .with_concurrency(8)
                .with_entry_type(EntryType::Files),
        );
        assert_eq!(entries.len(), 5);
        assert!(entries.iter().all(|e| !e.path.as_os_str().is_empty() && !e.name.is_empty()));
    }
}

#[test]
fn test_ndjson_records_are_independent() {
    let dir = deep_tree();
    let mut out = Vec::new();
    let summary = Finder::new(
        options(dir.path())
            .with_output(OutputFormat::Ndjson)
            .with_entry_type(EntryType::Files),
    )
    .unwrap()
    .run(&mut out, &CancelToken::new())
    .unwrap();

    let text = String::from_utf8(out).unwrap();
    let records: Vec<Entry> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 40);
    assert_eq!(summary.matched, 40);
    assert!(records.iter().all(|e| !e.is_dir && e.size == 1));
}

#[cfg(unix)]
#[test]
fn test_symlink_cycle_terminates() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    mk_file(root, "real/file.txt", 1, SystemTime::now());
    std::os::unix::fs::symlink(root, root.join("real/back")).unwrap();
    std::os::unix::fs::symlink(root.join("real"), root.join("loop")).unwrap();

    let cancel = CancelToken::with_timeout(Duration::from_secs(20));
    let mut out = Vec::new();
    let summary = Finder::new(options(root).with_follow_links(true))
        .unwrap()
        .run(&mut out, &cancel)
        .unwrap();

    assert!(!summary.cancelled, "walk did not finish in time");
    let entries: Vec<Entry> = serde_json::from_slice(&out).unwrap();
    // `real` is only descended once, whichever path reaches it first
    let files = entries.iter().filter(|e| e.name == "file.txt").count();
    assert_eq!(files, 1);
}

/// Sink that fails once `allowed` writes have succeeded
struct FailingSink {
    allowed: usize,
}

impl Write for FailingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.allowed == 0 {
            return Err(io::Error::new(io::ErrorKind::Other, "simulated writer failure"));
        }
        self.allowed -= 1;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn run_with_failing_sink(options: FindOptions, allowed: usize) -> Result<(), FindError> {
    let (done_tx, done_rx) = mpsc::channel();
    thread::spawn(move || {
        let result = Finder::new(options)
            .and_then(|finder| finder.run(FailingSink { allowed }, &CancelToken::new()));
        let _ = done_tx.send(result.map(|_| ()));
    });
    done_rx
        .recv_timeout(Duration::from_secs(20))
        .expect("run hung on a failing sink")
}

#[test]
fn test_sink_failure_is_reported_without_hanging() {
    let dir = deep_tree();

    for format in [OutputFormat::Text, OutputFormat::Json, OutputFormat::Ndjson] {
        let result = run_with_failing_sink(options(dir.path()).with_output(format), 0);
        assert!(
            matches!(result, Err(FindError::Output { written: 0, .. })),
            "{format:?}: {result:?}"
        );
    }

    let pretty = options(dir.path()).with_pretty(true).with_concurrency(1);
    assert!(run_with_failing_sink(pretty, 0).is_err());

    // two records reach the sink, the third fails
    let text = options(dir.path()).with_output(OutputFormat::Text);
    let result = run_with_failing_sink(text, 2);
    assert!(
        matches!(result, Err(FindError::Output { written: 2, .. })),
        "{result:?}"
    );
}

#[test]
fn test_missing_root_is_config_error() {
    let dir = tempdir().unwrap();
    let result = Finder::new(options(&dir.path().join("missing")));
    match result {
        Err(err) => assert!(err.is_config_error()),
        Ok(_) => panic!("expected an error for a missing root"),
    }
}
