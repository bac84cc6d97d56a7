use pretty_assertions::assert_eq;
use recon_sink::{DiffSink, LaneOutcome, SinkConfig, SinkError, REPORT_HEADER};
use recon_types::{Difference, FieldPath, Value};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn config(dir: &Path) -> SinkConfig {
    SinkConfig::new(dir).with_poll_interval_ms(20)
}

fn diff(key: &str, path: &str, v1: &str, v2: &str) -> Difference {
    Difference::value_mismatch(key, &FieldPath::from(path), Value::from(v1), Value::from(v2))
}

fn report_lines(dir: &Path, schema: &str) -> Vec<String> {
    std::fs::read_to_string(dir.join(format!("{schema}_diff_report.csv")))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Polls `check` until it holds or five seconds pass.
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..250 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

// ── Construction ─────────────────────────────────────────────────

#[test]
fn new_requires_runtime() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(DiffSink::new(config(dir.path())), Err(SinkError::NoRuntime(_))));
}

#[test]
fn config_defaults() {
    let config = SinkConfig::default();
    assert_eq!(config.poll_interval_ms, 5_000);
    assert_eq!(config.idle_close_ms, None);
    assert_eq!(config.drain_deadline(), Duration::from_secs(30));
}

// ── Writing ──────────────────────────────────────────────────────

#[tokio::test]
async fn writes_header_then_lines_in_order() {
    let dir = TempDir::new().unwrap();
    let sink = DiffSink::new(config(dir.path())).unwrap();

    sink.submit("PriceData", diff("A", "price", "10.00", "10.001")).unwrap();
    sink.submit_all(
        "PriceData",
        vec![
            diff("B", "details.region", "US", "EU"),
            diff("B", "available", "true", "false"),
        ],
    )
    .unwrap();

    let report = sink.shutdown().await;
    assert_eq!(report.outcome("PriceData"), Some(&LaneOutcome::Closed { written: 3 }));
    assert!(report.is_clean());

    assert_eq!(
        report_lines(dir.path(), "PriceData"),
        vec![
            REPORT_HEADER,
            "A,price,10.00,10.001,VALUE_MISMATCH",
            "B,details.region,US,EU,VALUE_MISMATCH",
            "B,available,true,false,VALUE_MISMATCH",
        ]
    );
}

#[tokio::test]
async fn each_line_is_flushed_before_shutdown() {
    let dir = TempDir::new().unwrap();
    let sink = DiffSink::new(config(dir.path())).unwrap();

    sink.submit("S", diff("A", "x", "1", "2")).unwrap();
    let root = dir.path().to_path_buf();
    assert!(eventually(|| report_lines(&root, "S").len() == 2).await);

    sink.shutdown().await;
}

#[tokio::test]
async fn schemas_get_separate_reports() {
    let dir = TempDir::new().unwrap();
    let sink = DiffSink::new(config(dir.path())).unwrap();

    sink.submit("Orders", diff("1", "qty", "1", "2")).unwrap();
    sink.submit("Prices", diff("2", "price", "1", "2")).unwrap();
    sink.submit("Prices", diff("3", "price", "1", "2")).unwrap();
    assert_eq!(sink.schemas(), vec!["Orders".to_string(), "Prices".to_string()]);

    let report = sink.shutdown().await;
    assert_eq!(report.total_written(), 3);
    assert_eq!(report_lines(dir.path(), "Orders").len(), 2);
    assert_eq!(report_lines(dir.path(), "Prices").len(), 3);
}

#[tokio::test]
async fn restart_appends_without_second_header() {
    let dir = TempDir::new().unwrap();

    let first = DiffSink::new(config(dir.path())).unwrap();
    first.submit("S", diff("A", "x", "1", "2")).unwrap();
    first.shutdown().await;

    let second = DiffSink::new(config(dir.path())).unwrap();
    second.submit("S", diff("B", "x", "1", "2")).unwrap();
    second.shutdown().await;

    let lines = report_lines(dir.path(), "S");
    assert_eq!(lines.len(), 3);
    assert_eq!(lines.iter().filter(|l| l.as_str() == REPORT_HEADER).count(), 1);
    assert!(lines[2].starts_with("B,"));
}

#[tokio::test]
async fn existing_content_is_kept() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("S_diff_report.csv"), "legacy\n").unwrap();

    let sink = DiffSink::new(config(dir.path())).unwrap();
    sink.submit("S", diff("A", "x", "1", "2")).unwrap();
    sink.shutdown().await;

    assert_eq!(
        report_lines(dir.path(), "S"),
        vec!["legacy", "A,x,1,2,VALUE_MISMATCH"]
    );
}

#[tokio::test]
async fn creates_missing_output_directory() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("reports").join("daily");
    let sink = DiffSink::new(config(&nested)).unwrap();

    sink.submit("S", diff("A", "x", "1", "2")).unwrap();
    assert!(sink.shutdown().await.is_clean());
    assert_eq!(report_lines(&nested, "S").len(), 2);
}

// ── Concurrency ──────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_submissions_start_one_writer() {
    let dir = TempDir::new().unwrap();
    let sink = DiffSink::new(config(dir.path())).unwrap();

    let mut tasks = Vec::new();
    for t in 0..8 {
        let sink = sink.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..50 {
                sink.submit("shared", diff(&format!("{t}-{i}"), "x", "1", "2"))
                    .unwrap();
                sink.submit(&format!("own-{}", t % 2), diff("k", "x", "1", "2"))
                    .unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(sink.lanes_provisioned(), 3);
    let report = sink.shutdown().await;
    assert_eq!(report.outcome("shared"), Some(&LaneOutcome::Closed { written: 400 }));
    assert_eq!(report.outcome("own-0"), Some(&LaneOutcome::Closed { written: 200 }));
    assert_eq!(report_lines(dir.path(), "shared").len(), 401);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn batches_land_contiguously() {
    let dir = TempDir::new().unwrap();
    let sink = DiffSink::new(config(dir.path())).unwrap();

    let mut tasks = Vec::new();
    for t in 0..4 {
        let sink = sink.clone();
        tasks.push(tokio::spawn(async move {
            for b in 0..5 {
                let batch: Vec<Difference> = (0..10)
                    .map(|i| diff(&format!("t{t}-b{b}"), &format!("p{i}"), "1", "2"))
                    .collect();
                sink.submit_all("S", batch).unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    sink.shutdown().await;

    let lines = report_lines(dir.path(), "S");
    assert_eq!(lines.len(), 1 + 4 * 5 * 10);
    for chunk in lines[1..].chunks(10) {
        let key = chunk[0].split(',').next().unwrap();
        for (i, line) in chunk.iter().enumerate() {
            assert_eq!(line, &format!("{key},p{i},1,2,VALUE_MISMATCH"));
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_batch_does_not_hold_up_other_schemas() {
    let dir = TempDir::new().unwrap();
    let sink = DiffSink::new(config(dir.path())).unwrap();

    let producer = {
        let sink = sink.clone();
        std::thread::spawn(move || {
            let slow = (0..40).map(|i| {
                std::thread::sleep(Duration::from_millis(10));
                diff(&format!("big-{i}"), "x", "1", "2")
            });
            sink.submit_all("Big", slow).unwrap()
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    let started = std::time::Instant::now();
    sink.submit("Small", diff("A", "x", "1", "2")).unwrap();
    assert!(started.elapsed() < Duration::from_millis(100), "{:?}", started.elapsed());

    assert_eq!(producer.join().unwrap(), 40);
    let report = sink.shutdown().await;
    assert_eq!(report.outcome("Big"), Some(&LaneOutcome::Closed { written: 40 }));
    assert_eq!(report.outcome("Small"), Some(&LaneOutcome::Closed { written: 1 }));
}

#[tokio::test]
async fn empty_batch_starts_no_writer() {
    let dir = TempDir::new().unwrap();
    let sink = DiffSink::new(config(dir.path())).unwrap();
    assert_eq!(sink.submit_all("S", Vec::new()).unwrap(), 0);
    assert_eq!(sink.lanes_provisioned(), 0);
    assert!(sink.shutdown().await.schemas.is_empty());
}

// ── Shutdown ─────────────────────────────────────────────────────

#[tokio::test]
async fn shutdown_drains_everything_queued() {
    let dir = TempDir::new().unwrap();
    let sink = DiffSink::new(config(dir.path())).unwrap();

    let batch: Vec<Difference> = (0..1_000)
        .map(|i| diff(&i.to_string(), "x", "1", "2"))
        .collect();
    assert_eq!(sink.submit_all("S", batch).unwrap(), 1_000);

    let report = sink.shutdown().await;
    assert_eq!(report.outcome("S"), Some(&LaneOutcome::Closed { written: 1_000 }));
    assert_eq!(report_lines(dir.path(), "S").len(), 1_001);
}

#[tokio::test]
async fn submit_after_shutdown_is_rejected() {
    let dir = TempDir::new().unwrap();
    let sink = DiffSink::new(config(dir.path())).unwrap();
    sink.submit("S", diff("A", "x", "1", "2")).unwrap();

    let first = sink.shutdown().await;
    assert_eq!(first.schemas.len(), 1);
    assert!(sink.is_closed());
    assert!(matches!(
        sink.submit("S", diff("B", "x", "1", "2")),
        Err(SinkError::Closed)
    ));

    let second = sink.shutdown().await;
    assert!(second.schemas.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn writer_past_drain_deadline_is_aborted() {
    let dir = TempDir::new().unwrap();
    let sink = DiffSink::new(
        config(dir.path())
            .with_idle_close_ms(40)
            .with_drain_deadline_ms(1),
    )
    .unwrap();

    sink.submit("quick", diff("A", "x", "1", "2")).unwrap();
    assert!(eventually(|| !sink.schemas().contains(&"quick".to_string())).await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let backlog: Vec<Difference> = (0..200_000)
        .map(|i| diff(&i.to_string(), "x", "1", "2"))
        .collect();
    sink.submit_all("slow", backlog).unwrap();

    let report = sink.shutdown().await;
    assert!(!report.is_clean());
    assert_eq!(report.outcome("slow"), Some(&LaneOutcome::DrainTimedOut));
    assert_eq!(report.outcome("quick"), Some(&LaneOutcome::Closed { written: 1 }));
    assert_eq!(report_lines(dir.path(), "quick").len(), 2);
    assert!(report_lines(dir.path(), "slow").len() < 200_001);
}

#[tokio::test]
async fn shutdown_without_submissions_is_empty() {
    let dir = TempDir::new().unwrap();
    let sink = DiffSink::new(config(dir.path())).unwrap();
    let report = sink.shutdown().await;
    assert!(report.schemas.is_empty());
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

// ── Failure isolation ────────────────────────────────────────────

#[tokio::test]
async fn failing_schema_does_not_affect_siblings() {
    let dir = TempDir::new().unwrap();
    // A directory where the report file should be makes opening it fail.
    std::fs::create_dir(dir.path().join("bad_diff_report.csv")).unwrap();
    let sink = DiffSink::new(config(dir.path())).unwrap();

    sink.submit_all(
        "bad",
        vec![
            diff("A", "x", "1", "2"),
            diff("B", "x", "1", "2"),
            diff("C", "x", "1", "2"),
        ],
    )
    .unwrap();
    sink.submit_all("good", vec![diff("A", "x", "1", "2"), diff("B", "x", "1", "2")])
        .unwrap();

    let report = sink.shutdown().await;
    assert!(!report.is_clean());
    match report.outcome("bad") {
        Some(LaneOutcome::Failed {
            written, dropped, ..
        }) => {
            assert_eq!(*written, 0);
            assert_eq!(*dropped, 3);
        }
        other => panic!("expected failure for bad, got {other:?}"),
    }
    assert_eq!(report.outcome("good"), Some(&LaneOutcome::Closed { written: 2 }));
    assert_eq!(report_lines(dir.path(), "good").len(), 3);
}

#[tokio::test]
async fn next_submission_retries_with_fresh_writer() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("S_diff_report.csv");
    std::fs::create_dir(&blocker).unwrap();
    let sink = DiffSink::new(config(dir.path())).unwrap();

    sink.submit("S", diff("A", "x", "1", "2")).unwrap();
    assert!(eventually(|| sink.schemas().is_empty()).await);

    std::fs::remove_dir(&blocker).unwrap();
    sink.submit("S", diff("B", "x", "1", "2")).unwrap();
    assert_eq!(sink.lanes_provisioned(), 2);

    let report = sink.shutdown().await;
    match report.outcome("S") {
        Some(LaneOutcome::Failed {
            written, dropped, ..
        }) => {
            assert_eq!(*written, 1);
            assert_eq!(*dropped, 1);
        }
        other => panic!("expected merged failure, got {other:?}"),
    }
    assert_eq!(
        report_lines(dir.path(), "S"),
        vec![REPORT_HEADER, "B,x,1,2,VALUE_MISMATCH"]
    );
}

// ── Idle close ───────────────────────────────────────────────────

#[tokio::test]
async fn writers_stay_open_by_default() {
    let dir = TempDir::new().unwrap();
    let sink = DiffSink::new(config(dir.path())).unwrap();
    sink.submit("S", diff("A", "x", "1", "2")).unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(sink.schemas(), vec!["S".to_string()]);
    sink.shutdown().await;
}

#[tokio::test]
async fn idle_writer_retires_and_is_reprovisioned() {
    let dir = TempDir::new().unwrap();
    let sink = DiffSink::new(config(dir.path()).with_idle_close_ms(60)).unwrap();

    sink.submit("S", diff("A", "x", "1", "2")).unwrap();
    assert!(eventually(|| sink.schemas().is_empty()).await);
    assert_eq!(sink.lanes_provisioned(), 1);

    sink.submit("S", diff("B", "x", "1", "2")).unwrap();
    assert_eq!(sink.lanes_provisioned(), 2);

    let report = sink.shutdown().await;
    assert_eq!(report.outcome("S"), Some(&LaneOutcome::Closed { written: 2 }));
    assert_eq!(
        report_lines(dir.path(), "S"),
        vec![
            REPORT_HEADER,
            "A,x,1,2,VALUE_MISMATCH",
            "B,x,1,2,VALUE_MISMATCH"
        ]
    );
}

#[tokio::test]
async fn retired_writers_are_collected_on_reprovision() {
    let dir = TempDir::new().unwrap();
    let sink = DiffSink::new(config(dir.path()).with_idle_close_ms(40)).unwrap();

    for i in 0..5 {
        sink.submit("S", diff(&i.to_string(), "x", "1", "2")).unwrap();
        assert!(eventually(|| sink.schemas().is_empty()).await);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(sink.lanes_provisioned(), 5);
    assert!(sink.retired_writers() <= 1, "{}", sink.retired_writers());

    let report = sink.shutdown().await;
    assert_eq!(report.outcome("S"), Some(&LaneOutcome::Closed { written: 5 }));
    assert_eq!(report_lines(dir.path(), "S").len(), 6);
}
