//! Integration tests for the lazy iteration engine

mod common;

use common::{ages, ages_db, TrackingSource};
use sluice::prelude::*;

fn batch_ages(batches: Vec<Batch>) -> Vec<Vec<i64>> {
    batches.iter().map(|b| ages(b)).collect()
}

#[test]
fn test_scenario_one_to_five() {
    let (_temp, source) = ages_db(&[1, 2, 3, 4, 5]);
    let engine = StreamEngine::new(source);
    let query = Query::new("SELECT age FROM ages");

    let rows: Vec<Row> = engine
        .row_stream(&query)
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();
    assert_eq!(ages(&rows), vec![1, 2, 3, 4, 5]);

    let batches: Vec<Batch> = engine
        .batch_stream(&query, 2)
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();
    assert_eq!(batch_ages(batches), vec![vec![1, 2], vec![3, 4], vec![5]]);

    let pages: Vec<Page> = engine
        .paginated_stream("ages", 2)
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();
    let offsets: Vec<u64> = pages.iter().map(|p| p.offset()).collect();
    assert_eq!(offsets, vec![0, 2, 4]);
    let contents: Vec<Vec<i64>> = pages.iter().map(|p| ages(p.rows())).collect();
    assert_eq!(contents, vec![vec![1, 2], vec![3, 4], vec![5]]);

    let average = engine.aggregate_stream("age", &query).unwrap().average().unwrap();
    assert_eq!(average, 3.0);
}

#[test]
fn test_empty_table_yields_nothing() {
    let (_temp, source) = ages_db(&[]);
    let engine = StreamEngine::new(source);
    let query = Query::new("SELECT age FROM ages");

    assert_eq!(engine.row_stream(&query).unwrap().count(), 0);
    assert_eq!(engine.batch_stream(&query, 3).unwrap().count(), 0);
    assert_eq!(engine.paginated_stream("ages", 3).unwrap().count(), 0);

    let stats = engine.aggregate_stream("age", &query).unwrap().fold_numeric().unwrap();
    assert_eq!(stats.count(), 0);
    assert_eq!(stats.average(), 0.0);
}

#[test]
fn test_batch_and_page_counts() {
    for n in [0usize, 1, 7, 10, 23] {
        let values: Vec<i64> = (1..=n as i64).collect();
        let (_temp, source) = ages_db(&values);
        let engine = StreamEngine::new(source);

        for size in [1usize, 3, 10, 25] {
            let expected = n.div_ceil(size);

            let batches: Vec<Batch> = engine
                .batch_stream(&Query::new("SELECT age FROM ages"), size)
                .unwrap()
                .collect::<Result<_>>()
                .unwrap();
            assert_eq!(batches.len(), expected, "n={} batch_size={}", n, size);
            assert_eq!(batches.iter().map(Vec::len).sum::<usize>(), n);
            if let Some((_, init)) = batches.split_last() {
                assert!(init.iter().all(|b| b.len() == size));
            }
            let flat: Vec<i64> = batches.iter().flat_map(|b| ages(b)).collect();
            assert_eq!(flat, values);

            let pages: Vec<Page> = engine
                .paginated_stream("ages", size)
                .unwrap()
                .collect::<Result<_>>()
                .unwrap();
            assert_eq!(pages.len(), expected, "n={} page_size={}", n, size);
            assert!(pages.windows(2).all(|w| w[0].offset() < w[1].offset()));
            let flat: Vec<i64> = pages.iter().flat_map(|p| ages(p.rows())).collect();
            assert_eq!(flat, values);
        }
    }
}

#[test]
fn test_zero_sizes_are_config_errors() {
    let (_temp, source) = ages_db(&[1, 2]);
    let tracking = TrackingSource::new(source);
    let engine = StreamEngine::new(tracking.clone());

    assert!(matches!(
        engine.batch_stream(&Query::new("SELECT age FROM ages"), 0),
        Err(SluiceError::Config(_))
    ));
    assert!(matches!(
        engine.paginated_stream("ages", 0),
        Err(SluiceError::Config(_))
    ));
    assert!(matches!(
        StreamEngine::with_config(tracking.clone(), StreamConfig::new().with_batch_size(0)),
        Err(SluiceError::Config(_))
    ));
    assert_eq!(tracking.opened(), 0);
}

#[test]
fn test_row_stream_releases_connection() {
    let (_temp, source) = ages_db(&[1, 2, 3, 4, 5]);
    let tracking = TrackingSource::new(source);
    let engine = StreamEngine::new(tracking.clone());
    let query = Query::new("SELECT age FROM ages");

    // Exhaustion
    let mut stream = engine.row_stream(&query).unwrap();
    assert_eq!(tracking.open_now(), 1);
    assert!(stream.by_ref().all(|row| row.is_ok()));
    assert!(stream.is_finished());
    assert_eq!(stream.rows_yielded(), 5);
    assert_eq!(tracking.open_now(), 0);
    drop(stream);

    // Early abandonment
    let taken: Vec<Row> = engine
        .row_stream(&query)
        .unwrap()
        .take(2)
        .collect::<Result<_>>()
        .unwrap();
    assert_eq!(ages(&taken), vec![1, 2]);
    assert_eq!(tracking.open_now(), 0);
    assert_eq!(tracking.opened(), 2);
}

#[test]
fn test_batch_stream_releases_connection_on_drop() {
    let (_temp, source) = ages_db(&[1, 2, 3, 4, 5]);
    let tracking = TrackingSource::new(source);
    let engine = StreamEngine::new(tracking.clone());

    let mut stream = engine
        .batch_stream(&Query::new("SELECT age FROM ages"), 2)
        .unwrap();
    let first = stream.next().unwrap().unwrap();
    assert_eq!(ages(&first), vec![1, 2]);
    assert_eq!(tracking.open_now(), 1);

    drop(stream);
    assert_eq!(tracking.open_now(), 0);
}

#[test]
fn test_pages_hold_no_connection_between_pulls() {
    let (_temp, source) = ages_db(&[1, 2, 3, 4, 5]);
    let tracking = TrackingSource::new(source);
    let engine = StreamEngine::new(tracking.clone());

    let mut pages = engine.paginated_stream("ages", 2).unwrap();
    let first = pages.next().unwrap().unwrap();
    assert_eq!(first.offset(), 0);
    assert_eq!(pages.next_offset(), 2);
    assert_eq!(tracking.open_now(), 0);

    assert_eq!(pages.by_ref().count(), 2);
    assert!(pages.next().is_none());
    // Three non-empty pages plus the terminating empty one.
    assert_eq!(tracking.opened(), 4);
    assert_eq!(tracking.open_now(), 0);
}

#[test]
fn test_paginated_query_with_params() {
    let (_temp, source) = ages_db(&[5, 1, 4, 2, 3]);
    let engine = StreamEngine::new(source);

    let base = Query::new("SELECT age FROM ages WHERE age > ? ORDER BY age;").bind(1);
    let pages: Vec<Vec<i64>> = engine
        .paginated_query(base, 3)
        .unwrap()
        .map(|page| ages(page.unwrap().rows()))
        .collect();
    assert_eq!(pages, vec![vec![2, 3, 4], vec![5]]);
}

#[test]
fn test_fetch_single_page() {
    let (_temp, source) = ages_db(&[1, 2, 3, 4, 5]);
    let engine = StreamEngine::new(source);

    let page = engine.fetch_page("ages", 2, 2).unwrap();
    assert_eq!(page.offset(), 2);
    assert_eq!(page.next_offset(), 4);
    assert_eq!(ages(page.rows()), vec![3, 4]);

    assert!(engine.fetch_page("ages", 2, 10).unwrap().is_empty());
}

#[test]
fn test_filter_rows_keeps_batch_boundaries() {
    let (_temp, source) = ages_db(&[1, 2, 3, 4, 5]);
    let engine = StreamEngine::new(source);

    let batches: Vec<Batch> = engine
        .batch_stream(&Query::new("SELECT age FROM ages"), 2)
        .unwrap()
        .filter_rows(|row| row.get("age").and_then(Value::as_i64).unwrap_or(0) > 2)
        .collect::<Result<_>>()
        .unwrap();
    assert_eq!(batch_ages(batches), vec![vec![3, 4], vec![5]]);
}

#[test]
fn test_statement_errors_surface_and_release() {
    let (_temp, source) = ages_db(&[1, 2]);
    let tracking = TrackingSource::new(source);
    let engine = StreamEngine::new(tracking.clone());

    let err = engine
        .row_stream(&Query::new("SELECT * FROM missing_table"))
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Query);

    tracking.fail_next_executes(1);
    let err = engine
        .batch_stream(&Query::new("SELECT age FROM ages"), 1)
        .err()
        .unwrap();
    assert!(err.is_retriable());

    tracking.fail_next_executes(1);
    let mut pages = engine.paginated_stream("ages", 1).unwrap();
    assert!(pages.next().unwrap().is_err());
    assert!(pages.next().is_none());

    assert_eq!(tracking.open_now(), 0);
}

#[test]
fn test_aggregates() {
    let (_temp, source) = common::users_db();
    let engine = StreamEngine::new(source);
    let query = Query::new("SELECT age, name FROM users");

    assert_eq!(engine.aggregate_stream("age", &query).unwrap().sum().unwrap(), 102.0);
    assert_eq!(engine.aggregate_stream("age", &query).unwrap().count().unwrap(), 3);
    assert_eq!(
        engine.aggregate_stream("age", &query).unwrap().average().unwrap(),
        34.0
    );

    let err = engine.aggregate_stream("name", &query).unwrap().average().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Query);

    let err = engine.aggregate_stream("salary", &query).unwrap().sum().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Query);
}

#[test]
fn test_aggregate_skips_nulls() {
    let (_temp, source) = ages_db(&[10, 20]);
    with_connection(&source, |conn| {
        conn.execute_update(&Query::new("INSERT INTO ages (age) VALUES (NULL)"))
    })()
    .unwrap();

    let engine = StreamEngine::new(source);
    let values: Vec<Value> = engine
        .aggregate_stream("age", &Query::new("SELECT age FROM ages"))
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();
    assert_eq!(values.len(), 3);
    assert!(values[2].is_null());

    let average = engine
        .aggregate_stream("age", &Query::new("SELECT age FROM ages"))
        .unwrap()
        .average()
        .unwrap();
    assert_eq!(average, 15.0);
}
