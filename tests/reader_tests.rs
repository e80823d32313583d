use ring_logger::{emit, init_new, sync, term, Kind, LogConfig, LogReader};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_empty_log() {
    let mut reader = LogReader::new("");
    assert!(reader.read_entry().is_none());
    assert_eq!(reader.malformed(), 0);
}

#[test]
fn test_reads_writer_output() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("read.log");
    let ctx = init_new(&LogConfig::new().path(&path).max_files(-1)).unwrap();
    for i in 0..3 {
        emit(Some(&ctx), Kind::Message, format_args!("value={} flag={}", i, i % 2 == 0)).unwrap();
    }
    emit(Some(&ctx), Kind::Warning, format_args!("pi is {:.2}", 3.14159)).unwrap();
    sync(Some(&ctx));
    term(Some(&ctx));

    let data = fs::read_to_string(&path).unwrap();
    let mut reader = LogReader::new(&data);
    let mut messages = Vec::new();
    while let Some(entry) = reader.read_entry() {
        let line = entry.unwrap();
        assert_eq!(line.pid, std::process::id());
        assert!(!line.app_name.is_empty());
        if line.kind == Kind::Message {
            messages.push(line.text.to_string());
        }
    }
    assert_eq!(messages, ["value=0 flag=true", "value=1 flag=false", "value=2 flag=true"]);
    assert_eq!(LogReader::count(&reader, Kind::Message), 3);
    assert_eq!(LogReader::count(&reader, Kind::Warning), 1);
    assert_eq!(reader.malformed(), 0);
}

#[test]
fn test_timestamps_do_not_go_backwards() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("time.log");
    let ctx = init_new(&LogConfig::new().path(&path).max_files(-1)).unwrap();
    for i in 0..50 {
        emit(Some(&ctx), Kind::Message, format_args!("tick {}", i)).unwrap();
    }
    term(Some(&ctx));

    let data = fs::read_to_string(&path).unwrap();
    let stamps: Vec<_> = LogReader::new(&data)
        .filter_map(Result::ok)
        .filter(|line| line.kind == Kind::Message)
        .map(|line| line.timestamp)
        .collect();
    assert_eq!(stamps.len(), 50);
    assert!(stamps.windows(2).all(|w| (w[0].secs, w[0].micros) <= (w[1].secs, w[1].micros)));
}
