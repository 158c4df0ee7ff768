//! Shared harness: in-memory stores that can be told to fail, a scripted
//! generation task and a queue wired over them.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use lipsync_cache::{CacheError, FastStore, JobCache, MemoryFastStore};
use lipsync_core::job::{Job, JobStatus, JobUpdate};
use lipsync_core::payload::{SceneData, VideoPayload};
use lipsync_core::types::{JobId, OwnerId, Timestamp};
use lipsync_db::models::job::JobListQuery;
use lipsync_db::{JobStore, MemoryJobStore, StoreError};
use lipsync_events::{JobEvent, NotificationHub};
use lipsync_generation::{
    GenerationError, GenerationOutput, GenerationProgress, GenerationRequest, GenerationTask,
};
use lipsync_pipeline::{JobQueue, QueueConfig};
use tokio::sync::{mpsc, Notify};

const WAIT_LIMIT: Duration = Duration::from_secs(5);

pub fn payload(audio_url: &str) -> VideoPayload {
    VideoPayload {
        scene: SceneData {
            image_url: "https://images.example/scene.png".into(),
            name: "Harbour".into(),
            description: "A narrator on the pier".into(),
            extra: Default::default(),
        },
        audio_url: audio_url.into(),
    }
}

pub fn default_payload() -> VideoPayload {
    payload("https://audio.example/line.mp3")
}

// ---------------------------------------------------------------------------
// Generation task
// ---------------------------------------------------------------------------

/// What the scripted task does for one request.
#[derive(Clone)]
pub enum Script {
    Succeed {
        progress: Vec<String>,
        video_url: String,
        duration_secs: Option<f64>,
    },
    Fail(String),
    /// Wait for the gate to be notified, then play the inner script.
    Gated(Arc<Notify>, Box<Script>),
}

impl Script {
    pub fn succeed(video_url: &str) -> Self {
        Script::Succeed {
            progress: Vec::new(),
            video_url: video_url.into(),
            duration_secs: Some(4.5),
        }
    }

    pub fn succeed_with_progress(video_url: &str, progress: &[&str]) -> Self {
        Script::Succeed {
            progress: progress.iter().map(|m| m.to_string()).collect(),
            video_url: video_url.into(),
            duration_secs: Some(4.5),
        }
    }

    pub fn fail(message: &str) -> Self {
        Script::Fail(message.into())
    }

    pub fn gated(gate: Arc<Notify>, then: Script) -> Self {
        Script::Gated(gate, Box::new(then))
    }
}

#[derive(Debug, Clone)]
pub struct Call {
    pub request: GenerationRequest,
    pub started_at: Timestamp,
}

/// Generation task that plays a script chosen by the request's audio URL.
pub struct ScriptedTask {
    default: Script,
    by_audio: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTask {
    pub fn new(default: Script) -> Self {
        Self {
            default,
            by_audio: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn script_for(&self, audio_url: &str, script: Script) {
        self.by_audio
            .lock()
            .unwrap()
            .insert(audio_url.to_string(), script);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called_ids(&self) -> Vec<JobId> {
        self.calls().into_iter().map(|c| c.request.job_id).collect()
    }
}

#[async_trait]
impl GenerationTask for ScriptedTask {
    async fn run(
        &self,
        request: GenerationRequest,
        progress: mpsc::UnboundedSender<GenerationProgress>,
    ) -> Result<GenerationOutput, GenerationError> {
        let mut script = self
            .by_audio
            .lock()
            .unwrap()
            .get(&request.audio_url)
            .cloned()
            .unwrap_or_else(|| self.default.clone());
        self.calls.lock().unwrap().push(Call {
            request,
            started_at: Utc::now(),
        });

        loop {
            match script {
                Script::Gated(gate, next) => {
                    gate.notified().await;
                    script = *next;
                }
                Script::Succeed {
                    progress: messages,
                    video_url,
                    duration_secs,
                } => {
                    for message in messages {
                        let _ = progress.send(GenerationProgress::message(message));
                    }
                    return Ok(GenerationOutput {
                        video_url,
                        duration_secs,
                    });
                }
                Script::Fail(message) => return Err(GenerationError::Failed(message)),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Stores with injectable outages
// ---------------------------------------------------------------------------

fn db_outage() -> StoreError {
    StoreError::Database(sqlx::Error::PoolTimedOut)
}

fn redis_outage() -> CacheError {
    CacheError::Redis(redis::RedisError::from((
        redis::ErrorKind::IoError,
        "connection refused",
    )))
}

/// [`MemoryJobStore`] whose operations can be switched to fail.
#[derive(Default)]
pub struct FlakyJobStore {
    pub inner: MemoryJobStore,
    pub fail_insert: AtomicBool,
    pub fail_reads: AtomicBool,
    pub fail_updates: AtomicBool,
}

impl FlakyJobStore {
    fn check(flag: &AtomicBool) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            Err(db_outage())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl JobStore for FlakyJobStore {
    async fn insert(&self, job: &Job) -> Result<(), StoreError> {
        Self::check(&self.fail_insert)?;
        self.inner.insert(job).await
    }

    async fn update(&self, id: JobId, update: &JobUpdate) -> Result<Option<Job>, StoreError> {
        Self::check(&self.fail_updates)?;
        self.inner.update(id, update).await
    }

    async fn get_by_id(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        Self::check(&self.fail_reads)?;
        self.inner.get_by_id(id).await
    }

    async fn query_by_owner(
        &self,
        owner_id: OwnerId,
        query: &JobListQuery,
    ) -> Result<Vec<Job>, StoreError> {
        Self::check(&self.fail_reads)?;
        self.inner.query_by_owner(owner_id, query).await
    }

    async fn query_stale(
        &self,
        status: JobStatus,
        older_than: Timestamp,
    ) -> Result<Vec<Job>, StoreError> {
        Self::check(&self.fail_reads)?;
        self.inner.query_stale(status, older_than).await
    }

    async fn delete(&self, id: JobId) -> Result<bool, StoreError> {
        self.inner.delete(id).await
    }
}

/// [`MemoryFastStore`] whose operations can be switched to fail.
#[derive(Default)]
pub struct FlakyFastStore {
    pub inner: MemoryFastStore,
    pub fail_get: AtomicBool,
    pub fail_push: AtomicBool,
    pub fail_pop: AtomicBool,
}

impl FlakyFastStore {
    fn check(flag: &AtomicBool) -> Result<(), CacheError> {
        if flag.load(Ordering::SeqCst) {
            Err(redis_outage())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl FastStore for FlakyFastStore {
    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.inner.set_with_expiry(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Self::check(&self.fail_get)?;
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        self.inner.delete(key).await
    }

    async fn add_to_set(&self, key: &str, member: &str) -> Result<(), CacheError> {
        self.inner.add_to_set(key, member).await
    }

    async fn remove_from_set(&self, key: &str, member: &str) -> Result<(), CacheError> {
        self.inner.remove_from_set(key, member).await
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, CacheError> {
        self.inner.set_members(key).await
    }

    async fn push_tail(&self, key: &str, value: &str) -> Result<(), CacheError> {
        Self::check(&self.fail_push)?;
        self.inner.push_tail(key, value).await
    }

    async fn pop_head_blocking(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<String>, CacheError> {
        Self::check(&self.fail_pop)?;
        self.inner.pop_head_blocking(key, timeout).await
    }

    async fn remove_from_list(&self, key: &str, value: &str) -> Result<usize, CacheError> {
        self.inner.remove_from_list(key, value).await
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>, CacheError> {
        self.inner.list_range(key).await
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub fn test_config() -> QueueConfig {
    QueueConfig {
        dequeue_timeout: Duration::from_millis(20),
        error_backoff: Duration::from_millis(10),
        ..QueueConfig::default()
    }
}

pub struct Harness {
    pub queue: JobQueue,
    pub durable: Arc<FlakyJobStore>,
    pub fast: Arc<FlakyFastStore>,
    pub hub: Arc<NotificationHub>,
    pub task: Arc<ScriptedTask>,
    /// A view over the same fast store, for inspecting keys and the list.
    pub cache: JobCache,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_script(Script::succeed("https://cdn.example/out.mp4"))
    }

    pub fn with_script(default: Script) -> Self {
        Self::with_config(default, test_config())
    }

    pub fn with_config(default: Script, config: QueueConfig) -> Self {
        let durable = Arc::new(FlakyJobStore::default());
        let fast = Arc::new(FlakyFastStore::default());
        let hub = Arc::new(NotificationHub::default());
        let task = Arc::new(ScriptedTask::new(default));
        let cache = JobCache::new(fast.clone(), config.keys.clone(), config.ttl);

        let queue = JobQueue::new(
            durable.clone(),
            fast.clone(),
            hub.clone(),
            task.clone(),
            config,
        );

        Self {
            queue,
            durable,
            fast,
            hub,
            task,
            cache,
        }
    }

    pub async fn submit(&self, owner_id: OwnerId) -> Job {
        self.queue
            .service()
            .submit(owner_id, default_payload())
            .await
            .unwrap()
    }

    pub async fn durable_copy(&self, id: JobId) -> Option<Job> {
        self.durable.inner.get_by_id(id).await.unwrap()
    }

    /// Poll `get_status` until the job reaches `status`.
    pub async fn wait_for_status(&self, id: JobId, status: JobStatus) -> Job {
        let poll = async {
            loop {
                if let Ok(job) = self.queue.service().get_status(id).await {
                    if job.status == status {
                        return job;
                    }
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(WAIT_LIMIT, poll)
            .await
            .unwrap_or_else(|_| panic!("job {id} never reached {status}"))
    }
}

/// Insert a record directly into the durable store, bypassing submission.
pub async fn seed(
    harness: &Harness,
    owner_id: OwnerId,
    status: JobStatus,
    age: chrono::Duration,
) -> Job {
    let mut job = Job::new(owner_id, default_payload());
    job.status = status;
    job.updated_at = Utc::now() - age;
    job.created_at = job.updated_at;
    harness.durable.inner.insert(&job).await.unwrap();
    job
}

/// Receive events until one of `event_type` arrives. Returns everything
/// received, in order.
pub async fn events_until(rx: &mut mpsc::Receiver<JobEvent>, event_type: &str) -> Vec<JobEvent> {
    let collect = async {
        let mut seen = Vec::new();
        while let Some(event) = rx.recv().await {
            let done = event.event_type == event_type;
            seen.push(event);
            if done {
                break;
            }
        }
        seen
    };
    tokio::time::timeout(WAIT_LIMIT, collect)
        .await
        .unwrap_or_else(|_| panic!("no {event_type} event received"))
}
