//! Integration tests: local HTTP object server, full classify + schedule runs.
//!
//! Each test builds a set of work items pointing at a `RangeServer`, runs the
//! completion checker and the scheduler against a temp directory, and checks
//! files on disk, the tally, and what the server saw.

mod common;

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use bulkdl_core::completion::{self, Layout};
use bulkdl_core::manifest::WorkItem;
use bulkdl_core::scheduler::{self, RunOptions, RunReport, StatusUpdate};
use common::range_server::{RangeServer, RangeServerOptions};
use tempfile::tempdir;
use tokio::sync::mpsc;

fn body_for(i: usize, len: usize) -> Vec<u8> {
    (0..len).map(|n| ((n * 31 + i * 7) % 251) as u8).collect()
}

fn objects(count: usize, len: usize) -> Vec<(String, Vec<u8>)> {
    (0..count)
        .map(|i| (format!("set/dir{}/obj-{:03}.bin", i % 3, i), body_for(i, len)))
        .collect()
}

fn items_for(server: &RangeServer, objects: &[(String, Vec<u8>)]) -> Vec<WorkItem> {
    objects
        .iter()
        .map(|(key, body)| WorkItem {
            key: key.clone(),
            size: body.len() as u64,
            signed_url: server.url(key),
            last_modified: None,
            bucket: Some("test-bucket".to_string()),
        })
        .collect()
}

async fn run_all(
    items: Vec<WorkItem>,
    layout: &Layout,
    width: usize,
) -> (RunReport, Vec<StatusUpdate>) {
    let opts = RunOptions {
        width,
        ..RunOptions::default()
    };
    run_with(items, layout, &opts).await
}

async fn run_with(
    items: Vec<WorkItem>,
    layout: &Layout,
    opts: &RunOptions,
) -> (RunReport, Vec<StatusUpdate>) {
    let (pending, tally) = completion::classify_all(items, layout).unwrap();
    let (tx, mut rx) = mpsc::channel(10_000);
    let report = scheduler::run(pending, tally, layout, opts, Some(tx))
        .await
        .expect("run");
    let mut updates = Vec::new();
    while let Ok(u) = rx.try_recv() {
        updates.push(u);
    }
    (report, updates)
}

fn assert_files_match(layout: &Layout, objects: &[(String, Vec<u8>)]) {
    for (key, body) in objects {
        let path = layout.destination(key).unwrap();
        let content = std::fs::read(&path).unwrap_or_else(|e| panic!("{}: {}", key, e));
        assert_eq!(&content, body, "content of {}", key);
    }
}

#[tokio::test]
async fn runs_in_batches_of_width_and_completes_everything() {
    let objects = objects(25, 100);
    let server = RangeServer::start(objects.clone());
    let dir = tempdir().unwrap();
    let layout = Layout::new(dir.path());

    let (report, updates) = run_all(items_for(&server, &objects), &layout, 10).await;

    assert!(report.is_complete());
    assert!(report.failures.is_empty());
    assert_eq!(report.batches_run, 3);
    assert_eq!(report.tally.complete_count, 25);
    assert_eq!(report.tally.complete_bytes, 2500);
    assert_eq!(report.tally.incomplete_bytes, 0);
    assert_files_match(&layout, &objects);

    let sizes: Vec<usize> = updates
        .iter()
        .filter_map(|u| match u {
            StatusUpdate::BatchStarted { items, .. } => Some(*items),
            _ => None,
        })
        .collect();
    assert_eq!(sizes, vec![10, 10, 5]);
    assert!(matches!(updates.last(), Some(StatusUpdate::Finished { tally }) if tally.is_done()));
}

#[tokio::test]
async fn progress_is_monotonic_per_transfer() {
    let objects = objects(4, 64 * 1024);
    let server = RangeServer::start(objects.clone());
    let dir = tempdir().unwrap();
    let layout = Layout::new(dir.path());

    let (report, updates) = run_all(items_for(&server, &objects), &layout, 4).await;
    assert!(report.is_complete());

    let mut last: HashMap<usize, u64> = HashMap::new();
    for u in &updates {
        if let StatusUpdate::Progress { sample, totals } = u {
            assert_eq!(sample.total_size, 64 * 1024);
            assert!(sample.downloaded_size <= sample.total_size);
            let prev = last.entry(sample.id).or_insert(0);
            assert!(sample.downloaded_size >= *prev, "sample went backwards");
            *prev = sample.downloaded_size;
            assert!(totals.downloaded_bytes <= totals.total_bytes);
            assert!(totals.progress_percent <= 100.0);
        }
    }
    assert_eq!(last.len(), 4);
    assert!(last.values().all(|&v| v == 64 * 1024));
}

#[tokio::test]
async fn complete_local_files_are_never_requested() {
    let objects = objects(3, 100);
    let server = RangeServer::start(objects.clone());
    let dir = tempdir().unwrap();
    let layout = Layout::new(dir.path());

    let (done_key, done_body) = &objects[1];
    let path = layout.destination(done_key).unwrap();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, done_body).unwrap();

    let (report, _) = run_all(items_for(&server, &objects), &layout, 10).await;

    assert!(report.is_complete());
    assert_eq!(server.hits(done_key), 0);
    assert_eq!(server.total_requests(), 2);
    assert_files_match(&layout, &objects);
}

#[tokio::test]
async fn nothing_to_do_starts_no_batch() {
    let objects = objects(2, 50);
    let server = RangeServer::start(objects.clone());
    let dir = tempdir().unwrap();
    let layout = Layout::new(dir.path());
    for (key, body) in &objects {
        let path = layout.destination(key).unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, body).unwrap();
    }

    let (report, updates) = run_all(items_for(&server, &objects), &layout, 10).await;

    assert!(report.is_complete());
    assert_eq!(report.batches_run, 0);
    assert_eq!(report.tally.complete_count, 2);
    assert_eq!(server.total_requests(), 0);
    assert!(!updates
        .iter()
        .any(|u| matches!(u, StatusUpdate::BatchStarted { .. })));
}

#[tokio::test]
async fn partial_file_resumes_from_local_length() {
    let objects = objects(1, 100);
    let server = RangeServer::start(objects.clone());
    let dir = tempdir().unwrap();
    let layout = Layout::new(dir.path());

    let (key, body) = &objects[0];
    let path = layout.destination(key).unwrap();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, &body[..40]).unwrap();

    let (report, updates) = run_all(items_for(&server, &objects), &layout, 10).await;

    assert!(report.is_complete());
    assert_eq!(server.ranges_for(key), vec![Some("bytes=40-".to_string())]);
    assert_eq!(std::fs::read(&path).unwrap(), *body);

    let first = updates.iter().find_map(|u| match u {
        StatusUpdate::Progress { sample, .. } => Some(*sample),
        _ => None,
    });
    assert_eq!(first.map(|s| s.downloaded_size), Some(40));
}

#[tokio::test]
async fn interrupted_transfer_resumes_on_rerun() {
    let objects = objects(1, 1000);
    let dir = tempdir().unwrap();
    let layout = Layout::new(dir.path());
    let (key, body) = &objects[0];

    let flaky = RangeServer::start_with_options(
        objects.clone(),
        RangeServerOptions {
            truncate_after: Some(300),
            ..RangeServerOptions::default()
        },
    );
    let (report, _) = run_all(items_for(&flaky, &objects), &layout, 10).await;
    assert!(!report.is_complete());
    assert_eq!(report.failures.len(), 1);
    let path = layout.destination(key).unwrap();
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 300);

    let healthy = RangeServer::start(objects.clone());
    let (report, _) = run_all(items_for(&healthy, &objects), &layout, 10).await;
    assert!(report.is_complete());
    assert_eq!(healthy.ranges_for(key), vec![Some("bytes=300-".to_string())]);
    assert_eq!(std::fs::read(&path).unwrap(), *body);
}

#[tokio::test]
async fn failed_item_does_not_stop_its_batch() {
    let objects = objects(10, 100);
    let server = RangeServer::start(objects.clone());
    let (bad_key, _) = &objects[4];
    server.fail_path(bad_key, 500);
    let dir = tempdir().unwrap();
    let layout = Layout::new(dir.path());

    let (report, _) = run_all(items_for(&server, &objects), &layout, 10).await;

    assert!(!report.is_complete());
    assert_eq!(report.tally.complete_count, 9);
    assert_eq!(report.tally.incomplete_count, 1);
    assert_eq!(report.tally.incomplete_bytes, 100);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(&report.failures[0].key, bad_key);
    assert!(report.failures[0].error.contains("500"));

    let bad_path = layout.destination(bad_key).unwrap();
    let written = std::fs::metadata(&bad_path).map(|m| m.len()).unwrap_or(0);
    assert_eq!(written, 0, "error body must not be written");
    assert_files_match(&layout, &[objects[0].clone(), objects[9].clone()]);
}

#[tokio::test]
async fn failures_in_one_batch_do_not_block_later_batches() {
    let objects = objects(6, 100);
    let server = RangeServer::start(objects.clone());
    server.fail_path(&objects[0].0, 403);
    let dir = tempdir().unwrap();
    let layout = Layout::new(dir.path());

    let (report, _) = run_all(items_for(&server, &objects), &layout, 2).await;

    assert_eq!(report.batches_run, 3);
    assert_eq!(report.tally.complete_count, 5);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].batch, 0);
    assert_files_match(&layout, &objects[1..]);
}

#[tokio::test]
async fn server_ignoring_range_still_yields_exact_file() {
    let objects = objects(1, 200);
    let server = RangeServer::start_with_options(
        objects.clone(),
        RangeServerOptions {
            support_ranges: false,
            ..RangeServerOptions::default()
        },
    );
    let dir = tempdir().unwrap();
    let layout = Layout::new(dir.path());
    let (key, body) = &objects[0];
    let path = layout.destination(key).unwrap();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, &body[..50]).unwrap();

    let (report, _) = run_all(items_for(&server, &objects), &layout, 10).await;

    assert!(report.is_complete());
    assert_eq!(server.ranges_for(key), vec![Some("bytes=50-".to_string())]);
    assert_eq!(std::fs::read(&path).unwrap(), *body);
}

#[tokio::test]
async fn oversized_local_file_is_restarted() {
    let objects = objects(1, 100);
    let server = RangeServer::start(objects.clone());
    let dir = tempdir().unwrap();
    let layout = Layout::new(dir.path());
    let (key, body) = &objects[0];
    let path = layout.destination(key).unwrap();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, vec![0u8; 150]).unwrap();

    let (report, _) = run_all(items_for(&server, &objects), &layout, 10).await;

    assert!(report.is_complete());
    assert_eq!(server.ranges_for(key), vec![None]);
    assert_eq!(std::fs::read(&path).unwrap(), *body);
}

#[tokio::test]
async fn partition_layout_places_files_under_part_dir() {
    let objects = objects(2, 100);
    let server = RangeServer::start(objects.clone());
    let dir = tempdir().unwrap();
    let layout = Layout::new(dir.path()).with_partition(3);

    let (report, _) = run_all(items_for(&server, &objects), &layout, 10).await;

    assert!(report.is_complete());
    for (key, body) in &objects {
        let path = dir.path().join("part-3").join(key);
        assert_eq!(std::fs::read(&path).unwrap(), *body);
    }
}

#[tokio::test]
async fn directory_failure_fails_only_its_batch() {
    let objects = vec![
        ("blocker/child.bin".to_string(), body_for(0, 100)),
        ("other.bin".to_string(), body_for(1, 100)),
    ];
    let server = RangeServer::start(objects.clone());
    let dir = tempdir().unwrap();
    let layout = Layout::new(dir.path());
    // A regular file where the first item needs a directory.
    std::fs::write(dir.path().join("blocker"), b"not a directory").unwrap();

    let (report, updates) = run_all(items_for(&server, &objects), &layout, 1).await;

    assert_eq!(report.batches_run, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].key, "blocker/child.bin");
    assert_eq!(report.failures[0].batch, 0);
    assert!(report.failures[0].error.starts_with("create directories"));
    assert_eq!(server.hits("blocker/child.bin"), 0);

    assert_eq!(report.tally.complete_count, 1);
    assert_eq!(report.tally.incomplete_count, 1);
    assert_eq!(
        report.tally.complete_count + report.tally.incomplete_count,
        objects.len()
    );
    assert_files_match(&layout, &objects[1..]);

    let settled: Vec<(usize, usize)> = updates
        .iter()
        .filter_map(|u| match u {
            StatusUpdate::BatchSettled { index, failed, .. } => Some((*index, *failed)),
            _ => None,
        })
        .collect();
    assert_eq!(settled, vec![(0, 1), (1, 0)]);
}

#[tokio::test]
async fn abort_before_start_runs_no_batch() {
    let objects = objects(4, 100);
    let server = RangeServer::start(objects.clone());
    let dir = tempdir().unwrap();
    let layout = Layout::new(dir.path());

    let mut opts = RunOptions {
        width: 2,
        ..RunOptions::default()
    };
    opts.transfer.abort = Some(Arc::new(AtomicBool::new(true)));

    let (report, updates) = run_with(items_for(&server, &objects), &layout, &opts).await;

    assert_eq!(report.batches_run, 0);
    assert!(!report.is_complete());
    assert_eq!(report.tally.incomplete_count, 4);
    assert_eq!(report.tally.incomplete_bytes, 400);
    assert!(report.failures.is_empty());
    assert_eq!(server.total_requests(), 0);
    assert!(!updates
        .iter()
        .any(|u| matches!(u, StatusUpdate::BatchStarted { .. })));
    assert!(matches!(
        updates.last(),
        Some(StatusUpdate::Finished { tally }) if tally.incomplete_count == 4
    ));
}
