use pretty_assertions::assert_eq;
use recon_correlate::mock::ScriptedSource;
use recon_correlate::{ChannelSource, Pull, RecordSource, SourceError};
use recon_types::Record;
use std::time::{Duration, Instant};

fn rec(id: &str, v: i64) -> Record {
    Record::new().with("id", id).with("v", v)
}

// ── Channel sources ──────────────────────────────────────────────

#[tokio::test]
async fn unbounded_channel_distinguishes_empty_and_closed() {
    let (tx, mut source) = ChannelSource::unbounded();
    assert_eq!(source.try_pull().await.unwrap(), Pull::Empty);

    tx.send(rec("A", 1)).unwrap();
    assert_eq!(source.try_pull().await.unwrap(), Pull::Record(rec("A", 1)));
    assert_eq!(source.try_pull().await.unwrap(), Pull::Empty);

    drop(tx);
    assert_eq!(source.try_pull().await.unwrap(), Pull::Closed);
}

#[tokio::test]
async fn closed_only_after_buffer_drains() {
    let (tx, mut source) = ChannelSource::bounded(2);
    tx.send(rec("A", 1)).await.unwrap();
    tx.send(rec("B", 2)).await.unwrap();
    drop(tx);

    assert!(matches!(source.try_pull().await.unwrap(), Pull::Record(_)));
    assert!(matches!(source.try_pull().await.unwrap(), Pull::Record(_)));
    assert_eq!(source.try_pull().await.unwrap(), Pull::Closed);
}

#[tokio::test]
async fn bounded_channel_pushes_back() {
    let (tx, mut source) = ChannelSource::bounded(1);
    tx.send(rec("A", 1)).await.unwrap();
    assert!(tx.try_send(rec("B", 2)).is_err());

    source.try_pull().await.unwrap();
    assert!(tx.try_send(rec("B", 2)).is_ok());
}

#[tokio::test]
async fn poll_timeout_waits_briefly() {
    let (tx, source) = ChannelSource::unbounded();
    let mut source = source.with_poll_timeout(Duration::from_millis(50));

    let started = Instant::now();
    assert_eq!(source.try_pull().await.unwrap(), Pull::Empty);
    assert!(started.elapsed() >= Duration::from_millis(40));

    let sender = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.send(rec("A", 1)).unwrap();
    });
    assert_eq!(source.try_pull().await.unwrap(), Pull::Record(rec("A", 1)));
    sender.await.unwrap();
    assert_eq!(source.try_pull().await.unwrap(), Pull::Closed);
}

#[tokio::test]
async fn boxed_sources_are_sources() {
    let mut boxed: Box<dyn RecordSource> = Box::new(ScriptedSource::records([rec("A", 1)]));
    assert!(matches!(boxed.try_pull().await.unwrap(), Pull::Record(_)));
}

// ── Scripted source ──────────────────────────────────────────────

#[tokio::test]
async fn script_plays_in_order() {
    let mut source = ScriptedSource::new()
        .record(rec("A", 1))
        .empty(2)
        .fail("boom")
        .then_close();

    assert!(matches!(source.try_pull().await.unwrap(), Pull::Record(_)));
    assert_eq!(source.try_pull().await.unwrap(), Pull::Empty);
    assert_eq!(source.try_pull().await.unwrap(), Pull::Empty);
    assert!(matches!(source.try_pull().await, Err(SourceError::Failed(m)) if m == "boom"));
    assert_eq!(source.try_pull().await.unwrap(), Pull::Closed);
    assert_eq!(source.pulls(), 5);
}

#[tokio::test]
async fn exhausted_script_stays_empty() {
    let mut source = ScriptedSource::new();
    for _ in 0..3 {
        assert_eq!(source.try_pull().await.unwrap(), Pull::Empty);
    }
}
