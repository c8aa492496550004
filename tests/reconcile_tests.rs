use foldersync_lib::core::{calculate_hash, RecordingSink};
use foldersync_lib::{EntryKind, SyncEngine, SyncEvent};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use walkdir::WalkDir;

/// 目录树快照：相对路径 -> 文件 hash（目录为 None）
fn snapshot(root: &Path) -> BTreeMap<PathBuf, Option<String>> {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|entry| {
            let entry = entry.unwrap();
            let relative = entry.path().strip_prefix(root).unwrap().to_path_buf();
            let digest = if entry.file_type().is_dir() {
                None
            } else {
                Some(calculate_hash(entry.path()).unwrap().to_hex().to_string())
            };
            (relative, digest)
        })
        .collect()
}

struct Trees {
    _dir: TempDir,
    source: PathBuf,
    replica: PathBuf,
}

impl Trees {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("source");
        let replica = dir.path().join("replica");
        fs::create_dir(&source).unwrap();
        fs::create_dir(&replica).unwrap();
        Self {
            _dir: dir,
            source,
            replica,
        }
    }

    fn write_source(&self, rel: &str, data: &[u8]) {
        write(&self.source.join(rel), data);
    }

    fn write_replica(&self, rel: &str, data: &[u8]) {
        write(&self.replica.join(rel), data);
    }

    fn assert_converged(&self) {
        assert_eq!(snapshot(&self.source), snapshot(&self.replica));
    }
}

fn write(path: &Path, data: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, data).unwrap();
}

fn engine() -> (SyncEngine, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    (SyncEngine::new(sink.clone()), sink)
}

#[test]
fn empty_replica_receives_whole_tree() {
    let trees = Trees::new();
    trees.write_source("a.txt", b"hello");
    trees.write_source("d/b.txt", b"x");
    let (engine, sink) = engine();

    let report = engine.reconcile(&trees.source, &trees.replica).unwrap();

    assert_eq!(fs::read(trees.replica.join("a.txt")).unwrap(), b"hello");
    assert_eq!(fs::read(trees.replica.join("d/b.txt")).unwrap(), b"x");
    assert_eq!(report.copied, 2);
    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| matches!(e, SyncEvent::Copied { .. })));
    trees.assert_converged();
}

#[test]
fn changed_file_replaced_and_stale_file_removed() {
    let trees = Trees::new();
    trees.write_source("a.txt", b"hello");
    trees.write_replica("a.txt", b"world");
    trees.write_replica("stale.txt", b"old");
    let (engine, sink) = engine();

    let report = engine.reconcile(&trees.source, &trees.replica).unwrap();

    assert_eq!(fs::read(trees.replica.join("a.txt")).unwrap(), b"hello");
    assert!(!trees.replica.join("stale.txt").exists());
    assert_eq!(report.removed, 1);
    assert_eq!(report.replaced, 1);
    assert_eq!(sink.events().len(), 2);
    trees.assert_converged();
}

#[test]
fn identical_trees_produce_no_mutations() {
    let trees = Trees::new();
    for (rel, data) in [("a.txt", &b"same"[..]), ("d/e/b.bin", &[0u8, 1, 2][..])] {
        trees.write_source(rel, data);
        trees.write_replica(rel, data);
    }
    let before = fs::metadata(trees.replica.join("a.txt"))
        .unwrap()
        .modified()
        .unwrap();
    let (engine, sink) = engine();

    let report = engine.reconcile(&trees.source, &trees.replica).unwrap();

    assert_eq!(report.actions(), 0);
    assert!(report.finished_at.is_some());
    assert!(sink.events().is_empty());
    let after = fs::metadata(trees.replica.join("a.txt"))
        .unwrap()
        .modified()
        .unwrap();
    assert_eq!(before, after);
}

#[test]
fn second_pass_is_a_no_op() {
    let trees = Trees::new();
    trees.write_source("a.txt", b"alpha");
    trees.write_source("nested/deeper/c.txt", b"charlie");
    trees.write_replica("nested/old.txt", b"old");
    trees.write_replica("gone/x.txt", b"x");
    let (engine, sink) = engine();

    let first = engine.reconcile(&trees.source, &trees.replica).unwrap();
    let after_first = snapshot(&trees.replica);
    let events_after_first = sink.events().len();
    let second = engine.reconcile(&trees.source, &trees.replica).unwrap();

    assert!(first.actions() > 0);
    assert_eq!(second.actions(), 0);
    assert_eq!(sink.events().len(), events_after_first);
    assert_eq!(after_first, snapshot(&trees.replica));
    trees.assert_converged();
}

#[test]
fn nested_replica_only_directories_removed() {
    let trees = Trees::new();
    trees.write_source("keep.txt", b"k");
    trees.write_replica("keep.txt", b"k");
    trees.write_replica("extra/a/b/c.txt", b"c");
    trees.write_replica("extra/top.txt", b"t");
    let (engine, sink) = engine();

    let report = engine.reconcile(&trees.source, &trees.replica).unwrap();

    assert!(!trees.replica.join("extra").exists());
    assert_eq!(report.removed, 1);
    assert_eq!(
        sink.events(),
        vec![SyncEvent::Removed {
            kind: EntryKind::Dir,
            name: "extra".to_string(),
            path: trees.replica.join("extra"),
        }]
    );
    trees.assert_converged();
}

#[test]
fn file_becomes_directory() {
    let trees = Trees::new();
    trees.write_source("x/inner.txt", b"inside");
    trees.write_replica("x", b"I used to be a file");
    let (engine, sink) = engine();

    engine.reconcile(&trees.source, &trees.replica).unwrap();

    assert!(trees.replica.join("x").is_dir());
    assert_eq!(fs::read(trees.replica.join("x/inner.txt")).unwrap(), b"inside");
    let events = sink.events();
    assert!(matches!(
        &events[0],
        SyncEvent::Removed { kind: EntryKind::File, .. }
    ));
    assert!(matches!(
        &events[1],
        SyncEvent::Copied { kind: EntryKind::Dir, .. }
    ));
    trees.assert_converged();
}

#[test]
fn directory_becomes_file() {
    let trees = Trees::new();
    trees.write_source("x", b"now a file");
    trees.write_replica("x/leftover/deep.txt", b"stale");
    trees.write_replica("x/other.txt", b"stale");
    let (engine, _sink) = engine();

    let report = engine.reconcile(&trees.source, &trees.replica).unwrap();

    assert!(trees.replica.join("x").is_file());
    assert_eq!(fs::read(trees.replica.join("x")).unwrap(), b"now a file");
    assert_eq!(report.removed, 1);
    assert_eq!(report.copied, 1);
    trees.assert_converged();
}

#[test]
fn same_size_content_change_detected_by_digest() {
    let trees = Trees::new();
    trees.write_source("data.bin", b"AAAA");
    trees.write_replica("data.bin", b"AAAB");
    let (engine, _sink) = engine();

    let report = engine.reconcile(&trees.source, &trees.replica).unwrap();

    assert_eq!(report.replaced, 1);
    assert_eq!(
        calculate_hash(&trees.source.join("data.bin")).unwrap(),
        calculate_hash(&trees.replica.join("data.bin")).unwrap()
    );
}

#[test]
fn converges_from_arbitrary_mixed_state() {
    let trees = Trees::new();
    trees.write_source("a.txt", b"a");
    trees.write_source("docs/readme.md", b"# readme");
    trees.write_source("docs/img/logo.png", &[137, 80, 78, 71]);
    trees.write_source("empty_dir/.keep", b"");
    fs::create_dir_all(trees.source.join("really_empty")).unwrap();

    trees.write_replica("a.txt", b"different");
    trees.write_replica("docs/readme.md", b"# readme");
    trees.write_replica("docs/img", b"was a file");
    trees.write_replica("docs/removed.md", b"bye");
    trees.write_replica("orphan/deep/file", b"bye");
    let (engine, _sink) = engine();

    let report = engine.reconcile(&trees.source, &trees.replica).unwrap();

    assert!(report.is_clean());
    trees.assert_converged();
    assert!(trees.replica.join("really_empty").is_dir());
}

#[test]
fn source_tree_is_never_modified() {
    let trees = Trees::new();
    trees.write_source("a.txt", b"a");
    trees.write_source("d/b.txt", b"b");
    trees.write_replica("z.txt", b"z");
    let before = snapshot(&trees.source);
    let (engine, _sink) = engine();

    engine.reconcile(&trees.source, &trees.replica).unwrap();

    assert_eq!(before, snapshot(&trees.source));
}

#[test]
fn source_names_resembling_temp_files_converge_in_one_pass() {
    let trees = Trees::new();
    trees.write_source("a.txt", b"real");
    trees.write_source(".a.txt.fsync-tmp", b"also real");
    trees.write_source(".fsync-abc123.tmp", b"still real");
    let (engine, _sink) = engine();

    let first = engine.reconcile(&trees.source, &trees.replica).unwrap();
    trees.assert_converged();
    let second = engine.reconcile(&trees.source, &trees.replica).unwrap();

    assert_eq!(first.copied, 3);
    assert!(first.is_clean());
    assert_eq!(second.actions(), 0);
}

#[cfg(unix)]
#[test]
fn replica_symlink_never_touches_data_outside_replica() {
    let trees = Trees::new();
    let outside = trees._dir.path().join("outside");
    write(&outside.join("precious.txt"), b"keep me");
    write(&outside.join("nested/also.txt"), b"keep me too");
    trees.write_source("d/new.txt", b"new");
    trees.write_source("f.txt", b"file");
    std::os::unix::fs::symlink(&outside, trees.replica.join("d")).unwrap();
    std::os::unix::fs::symlink(outside.join("precious.txt"), trees.replica.join("f.txt")).unwrap();
    let (engine, _sink) = engine();

    engine.reconcile(&trees.source, &trees.replica).unwrap();

    assert_eq!(fs::read(outside.join("precious.txt")).unwrap(), b"keep me");
    assert_eq!(fs::read(outside.join("nested/also.txt")).unwrap(), b"keep me too");
    assert!(!outside.join("new.txt").exists());
    trees.assert_converged();
}
