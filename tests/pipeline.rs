use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use stream_loader::config::{LoaderConfig, MalformedPolicy};
use stream_loader::error::LoaderError;
use stream_loader::load::{LoadReport, Pipeline, RecordSource, StatementBuilder};
use stream_loader::store::{Dialect, InsertStore};
use stream_loader::test_support::MemoryStore;

fn config(delimiter: u8, max_concurrency: usize) -> LoaderConfig {
    let mut config = LoaderConfig::new("mysql://loader@localhost/test", "scores");
    config.delimiter = delimiter;
    config.max_concurrency = max_concurrency;
    config
}

async fn load(
    store: Arc<MemoryStore>,
    config: &LoaderConfig,
    input: String,
) -> Result<LoadReport, LoaderError> {
    let pipeline = Pipeline::new(store, config);
    let source = RecordSource::spawn(Cursor::new(input), config.delimiter);
    pipeline.run(source).await
}

#[tokio::test]
async fn null_marker_row_is_inserted_with_null_argument() {
    let store = Arc::new(MemoryStore::new());
    let report = load(
        store.clone(),
        &config(b',', 1),
        "id,name\n1,Alice\n2,NULL\n".to_string(),
    )
    .await
    .expect("load succeeds");

    assert_eq!(report.insertions, 2);
    assert_eq!(report.valid_insertions, 2);
    assert_eq!(store.executions(), 2);

    let rows = store.rows();
    assert_eq!(
        rows[0],
        vec![Some("1".to_string()), Some("Alice".to_string())]
    );
    assert_eq!(rows[1], vec![Some("2".to_string()), None]);
}

#[tokio::test]
async fn malformed_row_aborts_the_run() {
    let store = Arc::new(MemoryStore::new());
    let result = load(
        store,
        &config(b',', 4),
        "id,name\n1,Alice\n2,Bob\n3\n4,Dan\n".to_string(),
    )
    .await;

    match result {
        Err(LoaderError::MalformedRecord { line, .. }) => assert_eq!(line, 4),
        other => panic!("expected malformed record error, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_row_aborts_without_waiting_for_in_flight_inserts() {
    let store = Arc::new(MemoryStore::new().with_latency(Duration::from_secs(5)));

    let result = tokio::time::timeout(
        Duration::from_secs(1),
        load(
            store.clone(),
            &config(b',', 4),
            "id,name\n1,Alice\n2,Bob\n3\n".to_string(),
        ),
    )
    .await
    .expect("abort does not wait on slow inserts");

    assert!(matches!(
        result,
        Err(LoaderError::MalformedRecord { line: 4, .. })
    ));
    assert!(store.rows().is_empty());
}

#[tokio::test]
async fn malformed_row_is_counted_when_skipping() {
    let store = Arc::new(MemoryStore::new());
    let mut config = config(b',', 4);
    config.malformed_policy = MalformedPolicy::Skip;

    let report = load(
        store.clone(),
        &config,
        "id,name\n1,Alice\n2,Bob\n3\n4,Dan\n".to_string(),
    )
    .await
    .expect("load succeeds");

    assert_eq!(report.insertions, 3);
    assert_eq!(report.skipped, 1);
    assert_eq!(store.rows().len(), 3);
}

#[tokio::test]
async fn failed_insertions_are_counted_not_fatal() {
    let store = Arc::new(
        MemoryStore::new()
            .with_latency(Duration::from_millis(1))
            .rejecting(|args| {
                args[0]
                    .as_deref()
                    .and_then(|id| id.parse::<u64>().ok())
                    .is_some_and(|id| id % 7 == 0)
            }),
    );

    let mut input = String::from("id\tname\n");
    for id in 1..=300u64 {
        input.push_str(&format!("{id}\tuser-{id}\n"));
    }

    let report = load(store.clone(), &config(b'\t', 8), input)
        .await
        .expect("per-row failures do not abort");

    let rejected = (1..=300u64).filter(|id| id % 7 == 0).count() as u64;
    assert_eq!(report.insertions, 300);
    assert_eq!(report.failed, rejected);
    assert_eq!(report.valid_insertions, 300 - rejected);
    assert_eq!(store.rows().len() as u64, 300 - rejected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn in_flight_never_exceeds_max_concurrency() {
    let max_concurrency = 5;
    let store = Arc::new(MemoryStore::new().with_latency(Duration::from_millis(2)));
    let config = config(b',', max_concurrency);
    let pipeline = Pipeline::new(store.clone(), &config);

    let counters = pipeline.counters();
    let done = Arc::new(AtomicBool::new(false));
    let observed = Arc::new(AtomicU64::new(0));
    let sampler = {
        let done = done.clone();
        let observed = observed.clone();
        tokio::spawn(async move {
            while !done.load(Ordering::SeqCst) {
                observed.fetch_max(counters.snapshot().in_flight, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_micros(200)).await;
            }
        })
    };

    let mut input = String::from("id,score\n");
    for id in 0..200 {
        input.push_str(&format!("{id},{}\n", id * 3));
    }
    let source = RecordSource::spawn(Cursor::new(input), config.delimiter);
    let report = pipeline.run(source).await.expect("load succeeds");

    done.store(true, Ordering::SeqCst);
    sampler.await.unwrap();

    assert_eq!(report.insertions, 200);
    assert!(report.peak_in_flight <= max_concurrency as u64);
    assert!(observed.load(Ordering::SeqCst) <= max_concurrency as u64);
    assert!(store.peak_concurrency() <= max_concurrency);
    assert!(store.peak_concurrency() > 1, "workers should overlap");

    let snapshot = pipeline.counters().snapshot();
    assert_eq!(snapshot.in_flight, 0);
    assert_eq!(snapshot.dispatched, snapshot.completed);
}

#[tokio::test]
async fn header_only_input_dispatches_nothing() {
    let store = Arc::new(MemoryStore::new());
    let report = load(store.clone(), &config(b',', 2), "id,name\n".to_string())
        .await
        .expect("load succeeds");

    assert_eq!(report.insertions, 0);
    assert_eq!(store.executions(), 0);
}

#[tokio::test]
async fn empty_input_reports_zero() {
    let store = Arc::new(MemoryStore::new());
    let report = load(store, &config(b',', 2), String::new())
        .await
        .expect("load succeeds");

    assert_eq!(report.insertions, 0);
    assert_eq!(report.valid_insertions, 0);
}

#[tokio::test]
async fn empty_header_column_is_fatal() {
    let store = Arc::new(MemoryStore::new());
    let result = load(store, &config(b',', 2), "id,,name\n1,2,3\n".to_string()).await;

    assert!(matches!(result, Err(LoaderError::EmptyColumnName(2))));
}

#[tokio::test]
async fn postgres_upsert_statement_reaches_workers() {
    let store = Arc::new(MemoryStore::new().with_dialect(Dialect::Postgres));
    let mut config = config(b'\t', 3);
    config.connection_string = "postgres://loader@localhost/test".to_string();
    config.enable_upsert = true;

    let report = load(
        store.clone(),
        &config,
        "id\tname\tscore\n1\tAlice\t9\n2\tNULL\t7\n".to_string(),
    )
    .await
    .expect("load succeeds");

    assert_eq!(report.insertions, 2);
    assert_eq!(
        store.statements(),
        vec![
            "INSERT INTO scores (id, name, score) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO UPDATE SET id = EXCLUDED.id, name = EXCLUDED.name, score = EXCLUDED.score"
                .to_string()
        ]
    );
    assert_eq!(store.rows().len(), 2);
}

#[tokio::test]
async fn memory_store_rejects_argument_count_mismatch() {
    let store = MemoryStore::new();
    let statement = StatementBuilder::new(Dialect::MySql, "scores")
        .build(vec!["id".to_string(), "name".to_string()], &[])
        .unwrap();

    let err = store
        .execute(&statement, &[Some("1".to_string())])
        .await
        .unwrap_err();

    assert!(err.to_string().contains("(id, name) got 1 values"));
    assert!(store.rows().is_empty());
}
