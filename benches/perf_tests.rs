use criterion::{black_box, criterion_group, criterion_main, Criterion};
use log::{info, LevelFilter};
use log4rs::{
    append::file::FileAppender,
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};
use ring_logger::ring::{Ring, RingState};
use ring_logger::{emit, flush_active_ring, init_new, sync, term, Kind, LogConfig, Record};
use std::sync::Once;
use std::time::Instant;
use tempfile::tempdir;

const RING_SIZE: usize = 1024 * 1024;
const ITERATIONS: usize = 20_000;

static LOGGER_INIT: Once = Once::new();

#[derive(Debug)]
struct TestEvent {
    id: i32,
    active: bool,
    data: [u8; 16],
    large_number: u64,
    description: String,
}

impl std::fmt::Display for TestEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Event[id={}, active={}, data={:?}, large_number={}, desc={}]",
            self.id, self.active, self.data, self.large_number, self.description
        )
    }
}

fn test_event() -> TestEvent {
    TestEvent {
        id: 42,
        active: true,
        data: [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16],
        large_number: u64::MAX,
        description: "This is a longer description that includes some special characters !@#$%^&*() \
                      and provides more context about the event. It also contains some metrics like \
                      CPU: 95%, Memory: 2.5GB, Network: 1.2Gbps"
            .to_string(),
    }
}

fn setup_log4rs(log_file: &str) {
    LOGGER_INIT.call_once(|| {
        let logfile = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new("{d} - {m}{n}")))
            .append(true)
            .build(log_file)
            .unwrap();

        let config = Config::builder()
            .appender(Appender::builder().build("logfile", Box::new(logfile)))
            .build(Root::builder().appender("logfile").build(LevelFilter::Info))
            .unwrap();

        log4rs::init_config(config).unwrap();
    });
}

fn bench_ring_put(c: &mut Criterion) {
    let event = test_event();
    let encoded = Record::format_args(Kind::Debug1, 1, format_args!("Test perf: event={}", event)).encode();
    let mut ring = Ring::try_new(RING_SIZE, RingState::Active).unwrap();

    c.bench_function("ring_put_overwriting", |b| {
        b.iter(|| black_box(ring.put(black_box(&encoded))))
    });
}

fn bench_logging_comparison(c: &mut Criterion) {
    let mut group = c.benchmark_group("Logging Comparison");
    group.sample_size(10);

    let dir = tempdir().unwrap();
    let event = test_event();
    let ring_path = dir.path().join("ring.log");
    let ctx = init_new(
        &LogConfig::new()
            .path(&ring_path)
            .ring_size(RING_SIZE as i64)
            .max_size(64 * 1024 * 1024)
            .max_files(2),
    )
    .unwrap();
    let traditional_log_file = dir.path().join("traditional.log");
    setup_log4rs(traditional_log_file.to_str().unwrap());

    group.bench_function("ring_vs_traditional", |b| {
        b.iter(|| {
            // Debug records stay in memory until a ring is flushed
            let ring_start = Instant::now();
            for i in 0..ITERATIONS {
                emit(Some(&ctx), Kind::Debug1, format_args!("Test perf: iteration={}, event={}", i, event)).unwrap();
            }
            let ring_duration = ring_start.elapsed();
            flush_active_ring(Some(&ctx));
            sync(Some(&ctx));

            // Messages go through the writer thread, still off this thread
            let message_start = Instant::now();
            for i in 0..ITERATIONS {
                emit(Some(&ctx), Kind::Message, format_args!("Test perf: iteration={}, event={}", i, event)).unwrap();
            }
            let message_duration = message_start.elapsed();
            sync(Some(&ctx));

            let traditional_start = Instant::now();
            for i in 0..ITERATIONS {
                info!("Test perf: iteration={}, event={}", i, event);
            }
            let traditional_duration = traditional_start.elapsed();

            println!("\nPerformance comparison ({} iterations):", ITERATIONS);
            println!("Ring logging (debug, in-memory): {:?}", ring_duration);
            println!("Ring logging (messages): {:?}", message_duration);
            println!("Traditional logging (with I/O): {:?}", traditional_duration);
            println!(
                "Speedup: {:.2}x",
                traditional_duration.as_secs_f64() / ring_duration.as_secs_f64()
            );
            println!(
                "Ring throughput: {:.2} million msgs/sec",
                ITERATIONS as f64 / ring_duration.as_secs_f64() / 1_000_000.0
            );

            black_box((ring_duration, message_duration, traditional_duration))
        });
    });

    group.finish();
    term(Some(&ctx));
}

criterion_group!(benches, bench_ring_put, bench_logging_comparison);
criterion_main!(benches);
