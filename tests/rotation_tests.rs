use ring_logger::{
    archive_path, emit, emit_str, force_rotate, init_new, stats, term, Kind, LogConfig,
    LogReader,
};
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

const CHILD_PATH_VAR: &str = "RING_LOGGER_TEST_SHARED_PATH";

fn texts(path: &Path, kind: Kind) -> Vec<String> {
    let data = fs::read_to_string(path).unwrap_or_default();
    LogReader::new(&data)
        .filter_map(Result::ok)
        .filter(|line| line.kind == kind)
        .map(|line| line.text.to_string())
        .collect()
}

fn forced_rotation_scenario() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scenario.log");
    let ctx = init_new(&LogConfig::new().path(&path).max_files(5)).unwrap();

    for pass in 0..10 {
        emit(Some(&ctx), Kind::Message, format_args!("End pass #{}", pass)).unwrap();
        force_rotate(Some(&ctx));
        emit(Some(&ctx), Kind::Message, format_args!("Beg pass #{}", pass)).unwrap();
    }
    assert_eq!(stats(Some(&ctx)).unwrap().rotations, 10);
    term(Some(&ctx));

    assert_eq!(texts(&path, Kind::Message), ["Beg pass #9"]);
    for n in 1..5 {
        let expected = [format!("Beg pass #{}", 9 - n), format!("End pass #{}", 10 - n)];
        assert_eq!(texts(&archive_path(&path, n), Kind::Message), expected, "archive {}", n);
    }
    assert!(!archive_path(&path, 5).exists());
    assert!(texts(&archive_path(&path, 1), Kind::Internal)
        .iter()
        .any(|t| t.ends_with("Rotating log files (forced)")));
}

#[test]
fn test_forced_rotation_scenario() {
    // Each run interleaves with the writer differently
    for _ in 0..10 {
        forced_rotation_scenario();
    }
}

#[test]
fn test_archive_count_after_rotations() {
    for (rotations, max_files) in [(2u64, 4u64), (6, 4), (3, 2)] {
        let dir = tempdir().unwrap();
        let path = dir.path().join("count.log");
        let ctx = init_new(&LogConfig::new().path(&path).max_files(max_files as i64)).unwrap();
        for _ in 0..rotations {
            force_rotate(Some(&ctx));
        }
        term(Some(&ctx));

        let expected = rotations.min(max_files - 1);
        assert!(path.exists());
        for n in 1..=expected {
            assert!(archive_path(&path, n).exists(), "archive {} missing", n);
        }
        assert!(!archive_path(&path, expected + 1).exists());
    }
}

#[test]
fn test_rotation_disabled() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("single.log");
    let ctx = init_new(&LogConfig::new().path(&path).max_files(-1).max_size(1)).unwrap();
    for i in 0..50 {
        emit(Some(&ctx), Kind::Message, format_args!("line {} {}", i, "z".repeat(100))).unwrap();
    }
    force_rotate(Some(&ctx));
    term(Some(&ctx));
    assert_eq!(texts(&path, Kind::Message).len(), 50);
    assert!(!archive_path(&path, 1).exists());
}

#[test]
fn test_size_rotation_keeps_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("size.log");
    let ctx = init_new(&LogConfig::new().path(&path).max_size(2048).max_files(3)).unwrap();
    let filler = "x".repeat(120);
    for i in 0..300 {
        emit(Some(&ctx), Kind::Message, format_args!("{:04} {}", i, filler)).unwrap();
    }
    term(Some(&ctx));

    assert!(archive_path(&path, 2).exists());
    assert!(!archive_path(&path, 3).exists());

    // Oldest surviving file first; what is left must be the tail of what was
    // logged, in order
    let mut seen = Vec::new();
    for n in [2, 1, 0] {
        let file = archive_path(&path, n);
        assert!(fs::metadata(&file).unwrap().len() < 2048 + 1024 + 512);
        seen.extend(texts(&file, Kind::Message));
    }
    let first: usize = seen[0][..4].parse().unwrap();
    let expected: Vec<String> = (first..300).map(|i| format!("{:04} {}", i, filler)).collect();
    assert_eq!(seen, expected);
}

#[test]
fn test_purge_on_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("purge.log");

    let ctx = init_new(&LogConfig::new().path(&path).max_files(8)).unwrap();
    for _ in 0..7 {
        force_rotate(Some(&ctx));
    }
    term(Some(&ctx));
    assert!(archive_path(&path, 7).exists());

    let ctx = init_new(&LogConfig::new().path(&path).max_files(3)).unwrap();
    term(Some(&ctx));
    assert!(archive_path(&path, 2).exists());
    for n in 3..8 {
        assert!(!archive_path(&path, n).exists(), "archive {} not purged", n);
    }
    let purged = texts(&path, Kind::Internal)
        .into_iter()
        .filter(|t| t.contains("Purged log file"))
        .count();
    assert_eq!(purged, 5);
    let ctl = fs::read_to_string(dir.path().join("purge.log.ctl")).unwrap();
    assert!(ctl.ends_with(",3\n"), "{:?}", ctl);
}

/// Runs in a separate process started by `test_later_opener_adopts_parameters`.
#[test]
fn shared_parameters_child() {
    let Ok(path) = std::env::var(CHILD_PATH_VAR) else {
        return;
    };
    let ctx = init_new(&LogConfig::new().path(&path).max_size(8192).max_files(7)).unwrap();
    for _ in 0..5 {
        force_rotate(Some(&ctx));
    }
    emit_str(Some(&ctx), Kind::Message, "from child").unwrap();
    term(Some(&ctx));
}

#[test]
fn test_later_opener_adopts_parameters() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("shared.log");
    let ctx = init_new(&LogConfig::new().path(&path).max_size(4096).max_files(3)).unwrap();

    let status = Command::new(std::env::current_exe().unwrap())
        .args(["shared_parameters_child", "--exact", "--nocapture"])
        .env(CHILD_PATH_VAR, &path)
        .status()
        .unwrap();
    assert!(status.success());
    term(Some(&ctx));

    let ctl = fs::read_to_string(dir.path().join("shared.log.ctl")).unwrap();
    assert_eq!(ctl, "4096,3\n");
    assert!(archive_path(&path, 2).exists());
    assert!(!archive_path(&path, 3).exists());
    assert_eq!(texts(&path, Kind::Message), ["from child"]);
}
