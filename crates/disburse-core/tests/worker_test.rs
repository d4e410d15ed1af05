mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{FaultyQueue, ScriptedLedger, fast_config, request, wallet, worker};
use disburse_core::domain::{
    EnqueueError, ErrorKind, RequestId, RunError, TransferKind, TransferOperation,
    ValidationError,
};
use disburse_core::impls::InMemoryQueueStore;
use disburse_core::ports::QueueStore;
use disburse_core::{RunOutcome, WorkerConfig};

fn completed(outcome: RunOutcome) -> disburse_core::domain::RunReport {
    match outcome {
        RunOutcome::Completed(report) => report,
        RunOutcome::Skipped => panic!("run was skipped"),
    }
}

#[tokio::test]
async fn fulfills_request_with_primary_then_incentive() {
    let queue = FaultyQueue::with_requests(vec![request(5, "10.00")]);
    let ledger = ScriptedLedger::new();
    let worker = worker(queue.clone(), ledger.clone(), fast_config());

    let report = completed(worker.run_once().await.unwrap());

    assert_eq!(report.attempted, 1);
    assert_eq!(report.fulfilled.len(), 1);
    assert!(report.failed.is_empty());

    let operations = ledger.operations();
    assert_eq!(operations.len(), 2);
    match &operations[0] {
        TransferOperation::Token { recipient, units } => {
            assert_eq!(recipient.as_str(), wallet(5));
            assert_eq!(*units, 1_000);
        }
        other => panic!("expected token transfer first, got {other:?}"),
    }
    match &operations[1] {
        TransferOperation::Native { recipient, units } => {
            assert_eq!(recipient.as_str(), wallet(5));
            assert_eq!(*units, 1_000_000_000_000);
        }
        other => panic!("expected native transfer second, got {other:?}"),
    }
    assert!(queue.inner.get(RequestId::new(5)).await.unwrap().completed);
    assert_eq!(queue.complete_calls.load(Ordering::SeqCst), 1);
    assert!(queue.list_pending().await.unwrap().is_empty());

    let again = completed(worker.run_once().await.unwrap());
    assert_eq!(again.attempted, 0);
    assert_eq!(queue.complete_calls.load(Ordering::SeqCst), 1);
    assert_eq!(ledger.operations().len(), 2);
}

#[tokio::test]
async fn completed_requests_are_never_processed_again() {
    let mut done = request(1, "1.00");
    done.completed = true;
    let queue = InMemoryQueueStore::with_requests(vec![done, request(2, "2.00")]);
    let ledger = ScriptedLedger::new();
    let worker = worker(Arc::new(queue), ledger.clone(), fast_config());

    let first = completed(worker.run_once().await.unwrap());
    let second = completed(worker.run_once().await.unwrap());

    assert_eq!(first.attempted, 1);
    assert_eq!(first.fulfilled[0].request_id, RequestId::new(2));
    assert_eq!(second.attempted, 0);
    assert_eq!(ledger.operations().len(), 2);
}

#[tokio::test]
async fn requests_are_processed_in_queue_order() {
    let queue = InMemoryQueueStore::with_requests(vec![
        request(3, "3.00"),
        request(1, "1.00"),
        request(2, "2.00"),
    ]);
    let ledger = ScriptedLedger::new();
    let worker = worker(Arc::new(queue), ledger.clone(), fast_config());

    let report = completed(worker.run_once().await.unwrap());

    let order: Vec<_> = report.fulfilled.iter().map(|f| f.request_id.get()).collect();
    assert_eq!(order, vec![3, 1, 2]);

    let primaries: Vec<_> = ledger
        .operations()
        .into_iter()
        .filter(|operation| operation.kind() == TransferKind::Primary)
        .map(|operation| operation.recipient().to_string())
        .collect();
    assert_eq!(primaries, vec![wallet(3), wallet(1), wallet(2)]);
}

#[tokio::test]
async fn overlapping_trigger_is_dropped() {
    let queue = InMemoryQueueStore::with_requests(vec![request(1, "1.00")]);
    let (ledger, gate) = ScriptedLedger::gated();
    let worker = worker(Arc::new(queue.clone()), ledger.clone(), fast_config());

    let running = tokio::spawn({
        let worker = Arc::clone(&worker);
        async move { worker.run_once().await }
    });
    gate.wait_entered().await;

    assert!(worker.is_running());
    assert_eq!(worker.run_once().await.unwrap(), RunOutcome::Skipped);
    assert!(worker.status().await.is_running);

    gate.release();
    let report = completed(running.await.unwrap().unwrap());

    assert_eq!(report.fulfilled.len(), 1);
    assert!(!worker.is_running());
    assert_eq!(ledger.count(TransferKind::Primary), 1);
}

#[tokio::test]
async fn retry_budget_is_per_run() {
    let queue = InMemoryQueueStore::with_requests(vec![request(1, "1.00")]);
    let ledger = ScriptedLedger::new();
    ledger.fail(TransferKind::Primary, "request timed out");
    let worker = worker(Arc::new(queue.clone()), ledger.clone(), fast_config());

    let first = completed(worker.run_once().await.unwrap());
    assert_eq!(ledger.count(TransferKind::Primary), 3);
    assert_eq!(first.failed.len(), 1);
    assert_eq!(first.failed[0].kind, ErrorKind::Transient);
    assert!(!first.failed[0].dead);

    let second = completed(worker.run_once().await.unwrap());
    assert_eq!(second.attempted, 1);
    assert_eq!(ledger.count(TransferKind::Primary), 6);
    assert_eq!(ledger.count(TransferKind::Secondary), 0);
    assert!(!queue.get(RequestId::new(1)).await.unwrap().completed);
}

#[tokio::test]
async fn failed_request_does_not_stop_the_run() {
    let queue = InMemoryQueueStore::with_requests(vec![request(1, "1.00"), request(2, "2.00")]);
    let ledger = ScriptedLedger::new();
    let worker = worker(Arc::new(queue.clone()), ledger.clone(), fast_config());
    ledger.fail(TransferKind::Primary, "ERC20: transfer amount exceeds balance");

    let report = completed(worker.run_once().await.unwrap());

    assert_eq!(report.failed.len(), 2);
    assert_eq!(report.failed[0].kind, ErrorKind::Permanent);
    assert_eq!(ledger.count(TransferKind::Primary), 6);
}

#[tokio::test]
async fn primary_is_not_repeated_after_secondary_failure() {
    let queue = InMemoryQueueStore::with_requests(vec![request(1, "1.00")]);
    let ledger = ScriptedLedger::new();
    ledger.fail(TransferKind::Secondary, "nonce too low");
    let worker = worker(Arc::new(queue.clone()), ledger.clone(), fast_config());

    let first = completed(worker.run_once().await.unwrap());
    assert_eq!(first.failed.len(), 1);
    assert_eq!(ledger.count(TransferKind::Primary), 1);
    assert_eq!(ledger.count(TransferKind::Secondary), 3);
    let entry = queue.get(RequestId::new(1)).await.unwrap();
    assert!(!entry.completed);
    assert!(entry.primary.is_some());

    ledger.heal();
    let second = completed(worker.run_once().await.unwrap());

    assert_eq!(second.fulfilled.len(), 1);
    assert!(second.fulfilled[0].resumed);
    assert_eq!(ledger.count(TransferKind::Primary), 1);
    assert_eq!(ledger.count(TransferKind::Secondary), 4);
    assert!(queue.get(RequestId::new(1)).await.unwrap().completed);
}

#[tokio::test]
async fn invalid_requests_fail_without_ledger_calls() {
    let queue = InMemoryQueueStore::with_requests(vec![
        request(1, "-5"),
        request(2, "1.001"),
        disburse_core::domain::TransferRequest::new(RequestId::new(3), "1.00", "not-an-address"),
        request(4, "4.00"),
    ]);
    let ledger = ScriptedLedger::new();
    let worker = worker(Arc::new(queue), ledger.clone(), fast_config());

    let report = completed(worker.run_once().await.unwrap());

    assert_eq!(report.failed.len(), 3);
    assert!(
        report
            .failed
            .iter()
            .all(|failed| failed.kind == ErrorKind::Validation)
    );
    assert_eq!(report.fulfilled.len(), 1);
    assert_eq!(report.fulfilled[0].request_id, RequestId::new(4));
    assert_eq!(ledger.operations().len(), 2);
}

#[tokio::test]
async fn listing_failure_aborts_and_releases_the_guard() {
    let queue = FaultyQueue::with_requests(vec![request(1, "1.00")]);
    FaultyQueue::set(&queue.fail_list, true);
    let ledger = ScriptedLedger::new();
    let worker = worker(queue.clone(), ledger.clone(), fast_config());

    let err = worker.run_once().await.unwrap_err();

    assert!(matches!(err, RunError::Queue(_)));
    assert!(!worker.is_running());
    assert!(ledger.operations().is_empty());

    let status = worker.status().await;
    assert_eq!(status.pending_count, None);
    assert!(status.error.unwrap().contains("connection refused"));
    assert!(status.last_run.unwrap().error.is_some());

    FaultyQueue::set(&queue.fail_list, false);
    let report = completed(worker.run_once().await.unwrap());
    assert_eq!(report.fulfilled.len(), 1);
}

#[tokio::test]
async fn completion_failure_aborts_the_rest_of_the_run() {
    let queue = FaultyQueue::with_requests(vec![request(1, "1.00"), request(2, "2.00")]);
    FaultyQueue::set(&queue.fail_complete, true);
    let ledger = ScriptedLedger::new();
    let worker = worker(queue.clone(), ledger.clone(), fast_config());

    let err = worker.run_once().await.unwrap_err();

    assert!(matches!(err, RunError::Request { id, .. } if id == RequestId::new(1)));
    assert!(!worker.is_running());
    // request 2 was never started
    assert_eq!(ledger.operations().len(), 2);
}

#[tokio::test]
async fn dead_letter_after_repeated_failed_runs() {
    let queue = InMemoryQueueStore::with_requests(vec![request(1, "1.00"), request(2, "2.00")]);
    let ledger = ScriptedLedger::new();
    let config = WorkerConfig {
        dead_after_runs: Some(2),
        max_attempts: 1,
        ..fast_config()
    };
    let worker = worker(Arc::new(queue.clone()), ledger.clone(), config);
    ledger.fail(TransferKind::Primary, "execution reverted");

    let first = completed(worker.run_once().await.unwrap());
    assert!(first.failed.iter().all(|failed| !failed.dead));

    let second = completed(worker.run_once().await.unwrap());
    assert!(second.failed.iter().all(|failed| failed.dead));

    let third = completed(worker.run_once().await.unwrap());
    assert_eq!(third.attempted, 0);

    let status = worker.status().await;
    assert_eq!(status.pending_count, Some(0));
    assert_eq!(status.dead_count, Some(2));
    let entry = queue.get(RequestId::new(1)).await.unwrap();
    assert!(entry.dead);
    assert_eq!(entry.failures, 2);
}

#[tokio::test]
async fn without_dead_letter_requests_retry_forever() {
    let queue = InMemoryQueueStore::with_requests(vec![request(1, "1.00")]);
    let ledger = ScriptedLedger::new();
    ledger.fail(TransferKind::Primary, "execution reverted");
    let worker = worker(Arc::new(queue.clone()), ledger.clone(), fast_config());

    for _ in 0..4 {
        let report = completed(worker.run_once().await.unwrap());
        assert_eq!(report.attempted, 1);
    }
    let entry = queue.get(RequestId::new(1)).await.unwrap();
    assert!(!entry.dead);
    assert_eq!(entry.failures, 0);
}

#[tokio::test(start_paused = true)]
async fn waits_between_requests_but_not_after_the_last() {
    let queue = InMemoryQueueStore::with_requests(vec![
        request(1, "1.00"),
        request(2, "2.00"),
        request(3, "3.00"),
    ]);
    let ledger = ScriptedLedger::new();
    let config = WorkerConfig {
        inter_request_delay_ms: 2_000,
        ..fast_config()
    };
    let worker = worker(Arc::new(queue), ledger, config);
    let start = tokio::time::Instant::now();

    completed(worker.run_once().await.unwrap());

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(4));
    assert!(elapsed < Duration::from_secs(6));
}

#[tokio::test]
async fn enqueue_validates_before_appending() {
    let queue = InMemoryQueueStore::new();
    let worker = worker(Arc::new(queue.clone()), ScriptedLedger::new(), fast_config());

    let bad_address = worker.enqueue("1.00", "0x123").await.unwrap_err();
    assert!(matches!(
        bad_address,
        EnqueueError::Validation(ValidationError::InvalidAddress(_))
    ));
    let bad_amount = worker.enqueue("0", &wallet(1)).await.unwrap_err();
    assert!(matches!(
        bad_amount,
        EnqueueError::Validation(ValidationError::NonPositiveAmount(_))
    ));

    let id = worker.enqueue(" 10.00 ", &wallet(1)).await.unwrap();
    assert_eq!(id, RequestId::new(1));
    let pending = queue.list_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].amount, "10.00");
}

#[tokio::test]
async fn status_reports_counts_and_last_run() {
    let queue = FaultyQueue::with_requests(vec![request(1, "1.00"), request(2, "2.00")]);
    let ledger = ScriptedLedger::new();
    let worker = worker(queue.clone(), ledger.clone(), fast_config());

    let before = worker.status().await;
    assert!(!before.is_running);
    assert!(!before.scheduler_active);
    assert_eq!(before.pending_count, Some(2));
    assert_eq!(before.interval_ms, 10_000);
    assert!(before.last_run.is_none());

    worker.run_once().await.unwrap();

    let after = worker.status().await;
    assert_eq!(after.pending_count, Some(0));
    let last = after.last_run.unwrap();
    assert_eq!(last.succeeded, 2);
    assert_eq!(last.failed, 0);
    assert!(queue.list_calls.load(Ordering::SeqCst) >= 3);
}
