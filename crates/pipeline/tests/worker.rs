//! The worker loop end to end over in-memory stores.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use lipsync_core::error::CoreError;
use lipsync_core::job::{JobResult, JobStatus};
use lipsync_core::job_events::{
    MESSAGE_COMPLETED, MESSAGE_FAILED, MESSAGE_STARTED, MSG_TYPE_JOB_CANCELLED,
    MSG_TYPE_JOB_COMPLETED, MSG_TYPE_JOB_FAILED, MSG_TYPE_JOB_PROGRESS, MSG_TYPE_JOB_STARTED,
};
use lipsync_core::types::OwnerId;
use lipsync_db::JobStore;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use common::{events_until, payload, Harness, Script};

#[tokio::test]
async fn completes_a_job_and_reports_progress() {
    let h = Harness::with_script(Script::succeed_with_progress(
        "https://cdn.example/a.mp4",
        &["Rendering frames"],
    ));
    let owner = OwnerId::new_v4();
    let mut events = h.hub.subscribe(owner);
    let job = h.submit(owner).await;

    let cancel = CancellationToken::new();
    h.queue.start_worker(cancel.clone()).unwrap();

    let done = h.wait_for_status(job.id, JobStatus::Completed).await;
    assert_eq!(
        done.result,
        Some(JobResult {
            video_url: "https://cdn.example/a.mp4".into(),
            duration_secs: Some(4.5),
        })
    );
    assert!(done.completed_at.is_some());
    assert!(done.updated_at >= job.updated_at);
    assert_eq!(h.durable_copy(job.id).await, Some(done.clone()));

    let seen = events_until(&mut events, MSG_TYPE_JOB_COMPLETED).await;
    let types: Vec<&str> = seen.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(
        types,
        vec![MSG_TYPE_JOB_STARTED, MSG_TYPE_JOB_PROGRESS, MSG_TYPE_JOB_COMPLETED]
    );
    assert_eq!(seen[0].message, MESSAGE_STARTED);
    assert_eq!(seen[1].message, "Rendering frames");
    assert_eq!(seen[1].status, JobStatus::InProgress);
    assert_eq!(seen[2].message, MESSAGE_COMPLETED);
    assert_eq!(seen[2].video_url.as_deref(), Some("https://cdn.example/a.mp4"));
    assert_eq!(seen[2].duration_secs, Some(4.5));

    let requests = h.task.calls();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].request.idempotency_key, job.id.to_string());
    assert_eq!(requests[0].request.audio_url, job.payload.audio_url);
    assert_eq!(requests[0].request.image_url, job.payload.scene.image_url);

    cancel.cancel();
}

#[tokio::test]
async fn records_the_task_error_verbatim() {
    let h = Harness::with_script(Script::fail("rate limited"));
    let owner = OwnerId::new_v4();
    let mut events = h.hub.subscribe(owner);
    let job = h.submit(owner).await;

    let cancel = CancellationToken::new();
    h.queue.start_worker(cancel.clone()).unwrap();

    let failed = h.wait_for_status(job.id, JobStatus::Failed).await;
    assert_eq!(failed.error.as_deref(), Some("rate limited"));
    assert!(failed.result.is_none());

    let seen = events_until(&mut events, MSG_TYPE_JOB_FAILED).await;
    let last = seen.last().unwrap();
    assert_eq!(last.message, MESSAGE_FAILED);
    assert_eq!(last.error.as_deref(), Some("rate limited"));

    cancel.cancel();
}

#[tokio::test]
async fn job_cancelled_while_queued_never_runs() {
    let h = Harness::new();
    let owner = OwnerId::new_v4();
    let cancelled = h.submit(owner).await;
    let kept = h.submit(owner).await;

    h.queue.service().cancel(cancelled.id).await.unwrap();
    assert_eq!(h.cache.pending_ids().await.unwrap(), vec![kept.id]);

    let cancel = CancellationToken::new();
    h.queue.start_worker(cancel.clone()).unwrap();
    h.wait_for_status(kept.id, JobStatus::Completed).await;

    assert_eq!(h.task.called_ids(), vec![kept.id]);
    assert_eq!(
        h.queue.service().get_status(cancelled.id).await.unwrap().status,
        JobStatus::Cancelled
    );

    cancel.cancel();
}

#[tokio::test]
async fn cancelled_id_left_on_the_queue_is_skipped() {
    let h = Harness::new();
    let job = h.submit(OwnerId::new_v4()).await;
    h.queue.service().cancel(job.id).await.unwrap();
    // As if the list removal had been lost.
    h.cache.enqueue(job.id).await.unwrap();

    assert!(h.queue.worker().worker().process(job.id).await.is_none());
    assert!(h.task.calls().is_empty());
}

#[tokio::test]
async fn jobs_run_one_at_a_time_in_submission_order() {
    let h = Harness::new();
    h.task.script_for(
        "https://audio.example/second.mp3",
        Script::fail("voice track unreadable"),
    );
    let owner = OwnerId::new_v4();
    let service = h.queue.service();
    let first = service
        .submit(owner, payload("https://audio.example/first.mp3"))
        .await
        .unwrap();
    let second = service
        .submit(owner, payload("https://audio.example/second.mp3"))
        .await
        .unwrap();
    let third = service
        .submit(owner, payload("https://audio.example/third.mp3"))
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    h.queue.start_worker(cancel.clone()).unwrap();
    let first = h.wait_for_status(first.id, JobStatus::Completed).await;
    let second = h.wait_for_status(second.id, JobStatus::Failed).await;
    let third = h.wait_for_status(third.id, JobStatus::Completed).await;

    assert_eq!(h.task.called_ids(), vec![first.id, second.id, third.id]);

    let calls = h.task.calls();
    assert!(calls[1].started_at >= first.completed_at.unwrap());
    assert!(calls[2].started_at >= second.completed_at.unwrap());

    cancel.cancel();
}

#[tokio::test]
async fn second_start_is_ignored_and_restart_works() {
    let h = Harness::new();

    let cancel = CancellationToken::new();
    let handle = h.queue.start_worker(cancel.clone()).unwrap();
    assert!(h.queue.worker().is_running());
    assert!(h.queue.start_worker(cancel.clone()).is_none());

    cancel.cancel();
    handle.await.unwrap();
    assert!(!h.queue.worker().is_running());

    let cancel = CancellationToken::new();
    assert!(h.queue.start_worker(cancel.clone()).is_some());
    cancel.cancel();
}

#[tokio::test]
async fn shutdown_waits_for_the_job_in_hand() {
    let gate = Arc::new(Notify::new());
    let h = Harness::with_script(Script::gated(
        gate.clone(),
        Script::succeed("https://cdn.example/slow.mp4"),
    ));
    let job = h.submit(OwnerId::new_v4()).await;

    let cancel = CancellationToken::new();
    let handle = h.queue.start_worker(cancel.clone()).unwrap();
    h.wait_for_status(job.id, JobStatus::InProgress).await;

    cancel.cancel();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!handle.is_finished());

    gate.notify_one();
    handle.await.unwrap();
    assert_eq!(
        h.durable_copy(job.id).await.unwrap().status,
        JobStatus::Completed
    );
}

#[tokio::test]
async fn late_cancel_does_not_stop_the_running_task() {
    let gate = Arc::new(Notify::new());
    let h = Harness::with_script(Script::gated(
        gate.clone(),
        Script::succeed("https://cdn.example/late.mp4"),
    ));
    let owner = OwnerId::new_v4();
    let mut events = h.hub.subscribe(owner);
    let job = h.submit(owner).await;

    let cancel = CancellationToken::new();
    h.queue.start_worker(cancel.clone()).unwrap();
    h.wait_for_status(job.id, JobStatus::InProgress).await;

    let cancelled = h.queue.service().cancel(job.id).await.unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);

    gate.notify_one();
    let done = h.wait_for_status(job.id, JobStatus::Completed).await;
    assert_eq!(
        done.result.map(|r| r.video_url).as_deref(),
        Some("https://cdn.example/late.mp4")
    );

    let types: Vec<String> = events_until(&mut events, MSG_TYPE_JOB_COMPLETED)
        .await
        .into_iter()
        .map(|e| e.event_type)
        .collect();
    assert_eq!(
        types,
        vec![MSG_TYPE_JOB_STARTED, MSG_TYPE_JOB_CANCELLED, MSG_TYPE_JOB_COMPLETED]
    );

    cancel.cancel();
}

#[tokio::test]
async fn deleting_a_running_job_only_orphans_the_run() {
    let gate = Arc::new(Notify::new());
    let h = Harness::with_script(Script::gated(
        gate.clone(),
        Script::succeed("https://cdn.example/orphan.mp4"),
    ));
    let owner = OwnerId::new_v4();
    let mut events = h.hub.subscribe(owner);
    let job = h.submit(owner).await;

    let cancel = CancellationToken::new();
    let handle = h.queue.start_worker(cancel.clone()).unwrap();
    h.wait_for_status(job.id, JobStatus::InProgress).await;

    h.queue.service().delete(job.id).await.unwrap();
    gate.notify_one();
    cancel.cancel();
    handle.await.unwrap();

    assert_eq!(h.task.called_ids(), vec![job.id]);
    assert_eq!(h.durable_copy(job.id).await, None);
    assert_eq!(h.cache.get_job(job.id).await.unwrap(), None);
    assert_matches!(
        h.queue.service().get_status(job.id).await,
        Err(CoreError::NotFound { .. })
    );

    let mut types = Vec::new();
    while let Ok(event) = events.try_recv() {
        types.push(event.event_type);
    }
    assert_eq!(types, vec![MSG_TYPE_JOB_STARTED]);
}

#[tokio::test]
async fn unreadable_record_fails_before_running() {
    let h = Harness::new();
    let job = h.submit(OwnerId::new_v4()).await;
    h.durable.fail_reads.store(true, Ordering::SeqCst);

    let failed = h.queue.worker().worker().process(job.id).await.unwrap();

    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed
        .error
        .as_deref()
        .unwrap()
        .starts_with("Failed to load job record:"));
    assert!(h.task.calls().is_empty());

    h.durable.fail_reads.store(false, Ordering::SeqCst);
    assert_eq!(
        h.durable_copy(job.id).await.unwrap().status,
        JobStatus::Failed
    );
}

#[tokio::test]
async fn outcome_stays_visible_when_durable_writes_fail() {
    let h = Harness::new();
    let job = h.submit(OwnerId::new_v4()).await;
    h.durable.fail_updates.store(true, Ordering::SeqCst);

    let done = h.queue.worker().worker().process(job.id).await.unwrap();
    assert_eq!(done.status, JobStatus::Completed);

    assert_eq!(
        h.queue.service().get_status(job.id).await.unwrap().status,
        JobStatus::Completed
    );
    assert_eq!(
        h.durable_copy(job.id).await.unwrap().status,
        JobStatus::Pending
    );
}

#[tokio::test]
async fn missing_record_is_skipped() {
    let h = Harness::new();
    let job = h.submit(OwnerId::new_v4()).await;
    h.durable.inner.delete(job.id).await.unwrap();

    assert!(h.queue.worker().worker().process(job.id).await.is_none());
    assert!(h.task.calls().is_empty());
}

#[tokio::test]
async fn worker_survives_dequeue_errors() {
    let h = Harness::new();
    h.fast.fail_pop.store(true, Ordering::SeqCst);

    let cancel = CancellationToken::new();
    h.queue.start_worker(cancel.clone()).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.queue.worker().is_running());

    h.fast.fail_pop.store(false, Ordering::SeqCst);
    let job = h.submit(OwnerId::new_v4()).await;
    h.wait_for_status(job.id, JobStatus::Completed).await;

    cancel.cancel();
}
