use ring_logger::{
    flush_active_ring, init, log_dbg, log_msg, log_record, log_vrb, log_warn, term, trace1, Kind,
    LogConfig, LogReader,
};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_macros_log_to_default_context() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("macros.log");
    init(None, &LogConfig::new().path(&path).max_files(-1)).unwrap();

    let answer = 42;
    log_record!(None, Kind::Message, "plain {}", answer).unwrap();
    log_msg!("hello {}", "world");
    trace1!(ENTER);
    log_dbg!("counter={}", answer);
    log_vrb!("too chatty");
    trace1!(EXIT);
    log_warn!("careful");
    flush_active_ring(None);
    term(None);

    let data = fs::read_to_string(&path).unwrap();
    let records: Vec<(Kind, String)> = LogReader::new(&data)
        .filter_map(Result::ok)
        .filter(|line| line.kind != Kind::Internal)
        .map(|line| (line.kind, line.text.to_string()))
        .collect();

    assert!(records.contains(&(Kind::Message, "plain 42".to_string())));
    let tagged: Vec<(Kind, &str)> = records
        .iter()
        .filter_map(|(kind, text)| {
            let rest = text.strip_prefix("[macro_tests:")?;
            Some((*kind, rest.split_once("] ")?.1))
        })
        .collect();
    assert!(tagged.contains(&(Kind::Message, "hello world")));

    // Ring records keep their order; the message took another path
    let from_ring: Vec<(Kind, &str)> = tagged
        .into_iter()
        .filter(|(kind, _)| *kind != Kind::Message)
        .collect();
    assert_eq!(
        from_ring,
        [
            (Kind::Trace1, "ENTER"),
            (Kind::Debug1, "counter=42"),
            (Kind::Trace1, "EXIT"),
            (Kind::Warning, "careful"),
        ]
    );
    assert!(records.iter().all(|(kind, _)| *kind != Kind::Debug2));
}
