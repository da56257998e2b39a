//! Drives one generation task from submission to a terminal state.
//!
//! The orchestrator owns the single active [`GenerationTask`]. Submission
//! validates the inputs, hands the job to the remote service, and starts a
//! polling loop; repeated poll failures abandon the remote path and run the
//! local generator instead. Submitting again supersedes the previous
//! attempt: every mutation checks an epoch counter first, so a stale loop
//! exits without touching shared state. Consumers observe task snapshots
//! through [`TaskOrchestrator::subscribe`].

pub mod policy;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::generator::{compose_thumbnail, BiographyGenerator};
use crate::images::ImagePayload;
use crate::models::{Annotation, Biography, GenerationTask, TaskStatus};
use crate::remote::{RemoteBackend, RemoteStatus};
use crate::store::{ContentStore, StoreError};

use policy::{FAILURE_POLL_INTERVAL, MAX_POLL_FAILURES, MIN_IMAGES, POLL_INTERVAL};

/// Errors surfaced synchronously by orchestrator operations. Network and
/// protocol errors never appear here; the polling loop absorbs them into
/// its retry counter.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("at least {minimum} images are required, got {actual}")]
    TooFewImages { minimum: usize, actual: usize },
    #[error("requirements must not be empty")]
    EmptyRequirements,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Options accompanying every create request.
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub template_style: String,
    pub language: String,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            template_style: "classic".to_string(),
            language: "en".to_string(),
        }
    }
}

/// Everything a polling loop or fallback run needs, captured at submission.
struct SubmissionContext {
    task_id: String,
    requirements: String,
    images: Arc<Vec<ImagePayload>>,
    annotations: Vec<Annotation>,
}

/// Coordinates one generation attempt at a time.
///
/// Cheap to clone; all clones share the same task slot, epoch counter, and
/// subscriber list.
#[derive(Clone)]
pub struct TaskOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    remote: Arc<dyn RemoteBackend>,
    generator: Arc<dyn BiographyGenerator>,
    store: Arc<ContentStore>,
    /// Bumped on every submission; loops from earlier epochs must not
    /// mutate the task.
    epoch: AtomicU64,
    task: Mutex<Option<GenerationTask>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<GenerationTask>>>,
}

impl TaskOrchestrator {
    pub fn new(
        remote: Arc<dyn RemoteBackend>,
        generator: Arc<dyn BiographyGenerator>,
        store: Arc<ContentStore>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                remote,
                generator,
                store,
                epoch: AtomicU64::new(0),
                task: Mutex::new(None),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register for task snapshots. Every state change sends one snapshot;
    /// dropped receivers are pruned on the next send.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<GenerationTask> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut subscribers) = self.inner.subscribers.lock() {
            subscribers.push(tx);
        }
        rx
    }

    /// Snapshot of the active task, if any.
    pub fn current_task(&self) -> Option<GenerationTask> {
        self.inner
            .task
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().cloned())
    }

    /// Start a new generation attempt, superseding any task in flight.
    ///
    /// Requires at least [`MIN_IMAGES`] images and non-empty trimmed
    /// requirements. Completed annotations from the store are folded into
    /// the requirements text sent to the remote service. If the remote
    /// service rejects the submission outright, generation runs locally
    /// instead. Returns the task id.
    pub async fn submit(
        &self,
        images: Vec<ImagePayload>,
        requirements: &str,
        options: GenerationOptions,
    ) -> Result<String, OrchestratorError> {
        let trimmed = requirements.trim();
        if trimmed.is_empty() {
            return Err(OrchestratorError::EmptyRequirements);
        }
        if images.len() < MIN_IMAGES {
            return Err(OrchestratorError::TooFewImages {
                minimum: MIN_IMAGES,
                actual: images.len(),
            });
        }

        // Supersede any in-flight loop before touching shared state.
        let epoch = self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        let annotations = self.inner.store.load_annotations()?;
        let enriched = enrich_requirements(trimmed, &annotations);
        let images = Arc::new(images);
        let image_ids: Vec<String> = images.iter().map(|p| p.id.clone()).collect();

        match self
            .inner
            .remote
            .create_task(&enriched, &options.template_style, &options.language, &images)
            .await
        {
            Ok(created) => {
                info!(task_id = %created.task_id, "remote service accepted generation task");
                let mut task =
                    GenerationTask::new(created.task_id.clone(), trimmed.to_string(), image_ids);
                task.message = created.message;
                self.inner.install_task(epoch, task);

                let ctx = SubmissionContext {
                    task_id: created.task_id.clone(),
                    requirements: trimmed.to_string(),
                    images,
                    annotations,
                };
                let inner = self.inner.clone();
                tokio::spawn(async move { inner.run_polling(epoch, ctx).await });
                Ok(created.task_id)
            }
            Err(err) => {
                warn!(error = %err, "remote submission failed, generating locally");
                let task_id = format!("local_{}", Utc::now().timestamp());
                let task = GenerationTask::new(task_id.clone(), trimmed.to_string(), image_ids);
                self.inner.install_task(epoch, task);

                let ctx = SubmissionContext {
                    task_id: task_id.clone(),
                    requirements: trimmed.to_string(),
                    images,
                    annotations,
                };
                let inner = self.inner.clone();
                tokio::spawn(async move { inner.generate_locally(epoch, &ctx, false).await });
                Ok(task_id)
            }
        }
    }
}

impl Inner {
    fn superseded(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) != epoch
    }

    /// Install a freshly submitted task and broadcast its first snapshot,
    /// unless a later submission already took over.
    fn install_task(&self, epoch: u64, task: GenerationTask) {
        {
            let Ok(mut guard) = self.task.lock() else {
                return;
            };
            if self.superseded(epoch) {
                return;
            }
            *guard = Some(task.clone());
        }
        self.broadcast(task);
    }

    /// Mutate the active task and broadcast the new snapshot. Returns false
    /// without mutating if the epoch is stale, the task is gone, or it
    /// already reached a terminal state.
    fn mutate_task<F>(&self, epoch: u64, mutate: F) -> bool
    where
        F: FnOnce(&mut GenerationTask),
    {
        let snapshot = {
            let Ok(mut guard) = self.task.lock() else {
                return false;
            };
            if self.superseded(epoch) {
                return false;
            }
            let Some(task) = guard.as_mut() else {
                return false;
            };
            if task.is_terminal() {
                return false;
            }
            mutate(task);
            task.clone()
        };
        self.broadcast(snapshot);
        true
    }

    fn broadcast(&self, snapshot: GenerationTask) {
        let Ok(mut subscribers) = self.subscribers.lock() else {
            return;
        };
        subscribers.retain(|tx| tx.send(snapshot.clone()).is_ok());
    }

    fn task_message(&self) -> Option<String> {
        self.task
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().and_then(|t| t.message.clone()))
    }

    fn mark_failed(&self, epoch: u64, detail: String) {
        self.mutate_task(epoch, |task| {
            task.apply_status(TaskStatus::Failed);
            task.error_message = Some(detail);
        });
    }

    /// Poll the remote task until it lands in a terminal state, the failure
    /// policy triggers local fallback, or a newer submission supersedes us.
    async fn run_polling(&self, epoch: u64, ctx: SubmissionContext) {
        let mut failures: u32 = 0;
        loop {
            match self.remote.task_status(&ctx.task_id).await {
                Ok(update) => {
                    failures = 0;
                    if !self.apply_update(epoch, &update) {
                        debug!(task_id = %ctx.task_id, "polling loop superseded, exiting");
                        return;
                    }
                    match update.status {
                        TaskStatus::Completed => {
                            self.finish_remote(epoch, &ctx).await;
                            return;
                        }
                        TaskStatus::Failed => {
                            let detail = update
                                .error_detail
                                .unwrap_or_else(|| "generation failed".to_string());
                            info!(task_id = %ctx.task_id, "remote service reported failure");
                            self.mark_failed(epoch, detail);
                            return;
                        }
                        _ => {}
                    }
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                Err(err) => {
                    failures += 1;
                    warn!(
                        task_id = %ctx.task_id,
                        attempt = failures,
                        error = %err,
                        "status poll failed"
                    );
                    if failures >= MAX_POLL_FAILURES {
                        self.fall_back(epoch, &ctx).await;
                        return;
                    }
                    tokio::time::sleep(FAILURE_POLL_INTERVAL).await;
                }
            }
            if self.superseded(epoch) {
                debug!(task_id = %ctx.task_id, "polling loop superseded, exiting");
                return;
            }
        }
    }

    /// Fold one poll result into the task. Terminal statuses are withheld
    /// here: the task stays Processing until the artifact is downloaded and
    /// persisted, so a download failure can still mark it Failed.
    fn apply_update(&self, epoch: u64, update: &RemoteStatus) -> bool {
        self.mutate_task(epoch, |task| {
            if update.status.is_terminal() {
                task.apply_status(TaskStatus::Processing);
            } else {
                task.apply_status(update.status);
            }
            if let Some(progress) = update.progress {
                task.apply_progress(progress);
            }
            if let Some(message) = &update.message {
                task.message = Some(message.clone());
            }
            if let Some(detail) = &update.error_detail {
                task.error_message = Some(detail.clone());
            }
        })
    }

    /// The remote side reported Completed: download the document, persist
    /// the record, then mark the task Completed. A failed download fails
    /// the task; the remote side already claims success, so regenerating
    /// locally would mask a different class of failure.
    async fn finish_remote(&self, epoch: u64, ctx: &SubmissionContext) {
        let document = match self.remote.download_document(&ctx.task_id).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(task_id = %ctx.task_id, error = %err, "artifact download failed");
                self.mark_failed(epoch, format!("artifact download failed: {}", err));
                return;
            }
        };
        if self.superseded(epoch) {
            return;
        }

        let title = format!("Personal Biography - {}", Utc::now().format("%B %-d, %Y"));
        let content = self.task_message().unwrap_or_default();

        // A thumbnail that fails to compose is not worth failing the task
        // over; the record simply goes without one.
        let thumbnail = match compose_thumbnail(ctx.images.first(), &title, None) {
            Ok(png) => Some(png),
            Err(err) => {
                warn!(error = %err, "thumbnail composition failed, saving without one");
                None
            }
        };

        match self.persist(&ctx.task_id, &title, content, &document, thumbnail) {
            Ok(biography) => {
                info!(biography_id = %biography.id, "biography downloaded and saved");
                self.mutate_task(epoch, |task| {
                    task.apply_status(TaskStatus::Completed);
                    task.apply_progress(1.0);
                    task.message = Some("Biography ready".to_string());
                    task.artifact_ref = Some(biography.pdf_path.display().to_string());
                });
            }
            Err(err) => {
                warn!(error = %err, "failed to persist downloaded biography");
                self.mark_failed(epoch, format!("failed to persist biography: {}", err));
            }
        }
    }

    /// The failure policy fired: mark the task as falling back and run the
    /// local generator with the same inputs. The remote path is never
    /// re-attempted for this task.
    async fn fall_back(&self, epoch: u64, ctx: &SubmissionContext) {
        info!(task_id = %ctx.task_id, "abandoning remote polling, generating locally");
        let moved = self.mutate_task(epoch, |task| {
            task.apply_status(TaskStatus::Processing);
            task.message =
                Some("Remote service unreachable, generating the biography locally".to_string());
        });
        if !moved {
            return;
        }
        self.generate_locally(epoch, ctx, true).await;
    }

    /// Run the local pipeline and persist its artifact. Used both as the
    /// fallback after repeated poll failures and directly when the create
    /// request itself fails.
    async fn generate_locally(&self, epoch: u64, ctx: &SubmissionContext, fallback: bool) {
        let title = "Personal Biography (offline)".to_string();
        let generated_at = Utc::now();

        let generator = self.generator.clone();
        let images = ctx.images.clone();
        let requirements = ctx.requirements.clone();
        let annotations = ctx.annotations.clone();
        let task_title = title.clone();
        let result = tokio::task::spawn_blocking(move || {
            generator.generate(&task_title, &requirements, &images, &annotations, generated_at)
        })
        .await;

        let artifact = match result {
            Ok(Ok(artifact)) => artifact,
            Ok(Err(err)) => {
                warn!(error = %err, "local generation failed");
                self.mark_failed(epoch, format!("local generation failed: {}", err));
                return;
            }
            Err(err) => {
                warn!(error = %err, "local generation task aborted");
                self.mark_failed(epoch, "local generation aborted unexpectedly".to_string());
                return;
            }
        };

        if self.superseded(epoch) {
            return;
        }

        let biography_id = format!("local_{}", Utc::now().timestamp());
        match self.persist(
            &biography_id,
            &title,
            artifact.narrative,
            &artifact.document,
            Some(artifact.thumbnail),
        ) {
            Ok(biography) => {
                info!(biography_id = %biography.id, fallback, "biography generated locally");
                let message = if fallback {
                    "Biography generated locally after repeated remote failures"
                } else {
                    "Biography generated locally"
                };
                self.mutate_task(epoch, |task| {
                    task.apply_status(TaskStatus::Completed);
                    task.apply_progress(1.0);
                    task.message = Some(message.to_string());
                    task.artifact_ref = Some(biography.pdf_path.display().to_string());
                });
            }
            Err(err) => {
                warn!(error = %err, "failed to persist locally generated biography");
                self.mark_failed(epoch, format!("local generation failed: {}", err));
            }
        }
    }

    /// Write document and thumbnail first, publish metadata last.
    fn persist(
        &self,
        biography_id: &str,
        title: &str,
        content: String,
        document: &[u8],
        thumbnail: Option<Vec<u8>>,
    ) -> Result<Biography, StoreError> {
        let document_path = self.store.save_document(biography_id, document)?;
        let thumbnail_path = match thumbnail {
            Some(png) => Some(self.store.save_thumbnail(biography_id, &png)?),
            None => None,
        };
        let mut biography = Biography::new(
            biography_id.to_string(),
            title.to_string(),
            content,
            document_path,
        );
        biography.thumbnail_path = thumbnail_path;
        self.store.save_biography(&biography)?;
        Ok(biography)
    }
}

/// Fold completed annotations into the requirements text sent to the
/// remote service. Skipped or blank annotations are omitted; with none
/// completed, the text passes through unchanged.
pub fn enrich_requirements(requirements: &str, annotations: &[Annotation]) -> String {
    let fragments: Vec<&Annotation> = annotations
        .iter()
        .filter(|a| {
            a.is_completed && !a.time_period.trim().is_empty() && !a.activity.trim().is_empty()
        })
        .collect();
    if fragments.is_empty() {
        return requirements.to_string();
    }

    let mut enriched = String::from(requirements);
    enriched.push_str(
        "\n\n=== Real life fragments provided by the user (weave these into the matching chapters) ===\n",
    );
    for (index, fragment) in fragments.iter().enumerate() {
        enriched.push_str(&format!("\n[Life fragment {}]\n", index + 1));
        enriched.push_str(&format!("Period: {}\n", fragment.time_period.trim()));
        enriched.push_str(&format!("Experience: {}\n", fragment.activity.trim()));
    }
    enriched.push_str("\n=== Important writing guidance ===\n");
    enriched.push_str("1. Weave each life fragment above into the chapter covering its period\n");
    enriched.push_str("2. Arrange these real experiences chronologically into one coherent story\n");
    enriched.push_str("3. Describe the activities and experiences of each period in their chapter\n");
    enriched.push_str("4. Never invent or add content the user did not mention\n");
    enriched.push_str("5. Where a period lacks information, keep it brief rather than fabricating\n");
    enriched.push_str("6. Ground every chapter in the information the user actually provided\n");
    enriched.push_str("7. Tell these life fragments as a complete story in warm language\n");
    enriched.push_str(
        "\nWrite a complete personal biography in chronological order, with every chapter drawing on the real activities and experiences provided for that period.",
    );
    enriched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::generator::{GeneratedArtifact, GeneratorError};
    use crate::remote::{CreatedTask, RemoteError};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use image::{DynamicImage, Rgba, RgbaImage};
    use std::collections::VecDeque;
    use std::io::Cursor;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};
    use tokio::time::Instant;

    struct ScriptedBackend {
        create: Mutex<VecDeque<Result<CreatedTask, RemoteError>>>,
        statuses: Mutex<VecDeque<Result<RemoteStatus, RemoteError>>>,
        downloads: Mutex<VecDeque<Result<Vec<u8>, RemoteError>>>,
        status_calls: AtomicUsize,
        download_calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new() -> Self {
            Self {
                create: Mutex::new(VecDeque::new()),
                statuses: Mutex::new(VecDeque::new()),
                downloads: Mutex::new(VecDeque::new()),
                status_calls: AtomicUsize::new(0),
                download_calls: AtomicUsize::new(0),
            }
        }

        fn push_create(&self, result: Result<CreatedTask, RemoteError>) {
            self.create.lock().unwrap().push_back(result);
        }

        fn push_status(&self, result: Result<RemoteStatus, RemoteError>) {
            self.statuses.lock().unwrap().push_back(result);
        }

        fn push_download(&self, result: Result<Vec<u8>, RemoteError>) {
            self.downloads.lock().unwrap().push_back(result);
        }
    }

    #[async_trait]
    impl RemoteBackend for ScriptedBackend {
        async fn create_task(
            &self,
            _requirements: &str,
            _template_style: &str,
            _language: &str,
            _images: &[ImagePayload],
        ) -> Result<CreatedTask, RemoteError> {
            self.create
                .lock()
                .unwrap()
                .pop_front()
                .expect("unscripted create_task call")
        }

        async fn task_status(&self, _task_id: &str) -> Result<RemoteStatus, RemoteError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            self.statuses
                .lock()
                .unwrap()
                .pop_front()
                .expect("unscripted task_status call")
        }

        async fn download_document(&self, _task_id: &str) -> Result<Vec<u8>, RemoteError> {
            self.download_calls.fetch_add(1, Ordering::SeqCst);
            self.downloads
                .lock()
                .unwrap()
                .pop_front()
                .expect("unscripted download_document call")
        }

        async fn check_health(&self) -> bool {
            true
        }
    }

    struct CountingGenerator {
        calls: AtomicUsize,
    }

    impl CountingGenerator {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl BiographyGenerator for CountingGenerator {
        fn generate(
            &self,
            _title: &str,
            requirements: &str,
            _images: &[ImagePayload],
            _annotations: &[Annotation],
            _generated_at: DateTime<Utc>,
        ) -> Result<GeneratedArtifact, GeneratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(GeneratedArtifact {
                narrative: format!("offline story from: {}", requirements),
                document: b"%PDF-1.5 offline".to_vec(),
                thumbnail: vec![0x89, b'P', b'N', b'G'],
            })
        }
    }

    struct FailingGenerator;

    impl BiographyGenerator for FailingGenerator {
        fn generate(
            &self,
            _title: &str,
            _requirements: &str,
            _images: &[ImagePayload],
            _annotations: &[Annotation],
            _generated_at: DateTime<Utc>,
        ) -> Result<GeneratedArtifact, GeneratorError> {
            Err(GeneratorError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )))
        }
    }

    struct Harness {
        orchestrator: TaskOrchestrator,
        backend: Arc<ScriptedBackend>,
        generator: Arc<CountingGenerator>,
        store: Arc<ContentStore>,
        _dir: TempDir,
    }

    fn harness() -> Harness {
        let dir = tempdir().unwrap();
        let settings = Settings::with_data_dir(dir.path().to_path_buf());
        let backend = Arc::new(ScriptedBackend::new());
        let generator = Arc::new(CountingGenerator::new());
        let store = Arc::new(ContentStore::new(&settings));
        let orchestrator =
            TaskOrchestrator::new(backend.clone(), generator.clone(), store.clone());
        Harness {
            orchestrator,
            backend,
            generator,
            store,
            _dir: dir,
        }
    }

    fn payloads(count: usize) -> Vec<ImagePayload> {
        (0..count)
            .map(|i| {
                let canvas = RgbaImage::from_pixel(3, 4, Rgba([(i * 20) as u8, 80, 160, 255]));
                let mut bytes = Vec::new();
                DynamicImage::ImageRgba8(canvas)
                    .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
                    .unwrap();
                ImagePayload {
                    id: format!("img-{:02}", i),
                    path: PathBuf::from(format!("/photos/{:02}.png", i)),
                    bytes,
                    mime_type: "image/png".to_string(),
                    width: 3,
                    height: 4,
                }
            })
            .collect()
    }

    fn processing(progress: f64, message: &str) -> RemoteStatus {
        RemoteStatus {
            status: TaskStatus::Processing,
            progress: Some(progress),
            message: Some(message.to_string()),
            artifact_url: None,
            error_detail: None,
        }
    }

    fn completed() -> RemoteStatus {
        RemoteStatus {
            status: TaskStatus::Completed,
            progress: Some(1.0),
            message: Some("done".to_string()),
            artifact_url: Some("/biography/download/t-1".to_string()),
            error_detail: None,
        }
    }

    fn connection_error() -> RemoteError {
        RemoteError::Connection("connection refused".to_string())
    }

    async fn next_event(events: &mut mpsc::UnboundedReceiver<GenerationTask>) -> GenerationTask {
        tokio::time::timeout(Duration::from_secs(60), events.recv())
            .await
            .expect("no task event within the timeout")
            .expect("event channel closed")
    }

    /// Collect snapshots until a terminal one arrives.
    async fn wait_terminal(
        events: &mut mpsc::UnboundedReceiver<GenerationTask>,
    ) -> (GenerationTask, Vec<GenerationTask>) {
        let mut seen = Vec::new();
        loop {
            let event = next_event(events).await;
            seen.push(event.clone());
            if event.is_terminal() {
                return (seen.last().unwrap().clone(), seen);
            }
        }
    }

    fn rank(status: TaskStatus) -> u8 {
        match status {
            TaskStatus::Submitted => 0,
            TaskStatus::Processing => 1,
            TaskStatus::Completed | TaskStatus::Failed => 2,
        }
    }

    #[tokio::test]
    async fn test_submit_rejects_too_few_images() {
        let h = harness();
        let err = h
            .orchestrator
            .submit(payloads(8), "a life story", GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::TooFewImages {
                minimum: 9,
                actual: 8
            }
        ));
    }

    #[tokio::test]
    async fn test_submit_rejects_blank_requirements() {
        let h = harness();
        let err = h
            .orchestrator
            .submit(payloads(9), "  \n ", GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::EmptyRequirements));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_completion_persists_biography() {
        let h = harness();
        h.backend.push_create(Ok(CreatedTask {
            task_id: "t-1".to_string(),
            message: Some("accepted".to_string()),
        }));
        h.backend.push_status(Ok(processing(0.3, "analyzing images")));
        h.backend.push_status(Ok(processing(0.7, "writing chapters")));
        h.backend.push_status(Ok(completed()));
        h.backend.push_download(Ok(b"%PDF-1.7 remote".to_vec()));

        let started = Instant::now();
        let mut events = h.orchestrator.subscribe();
        let task_id = h
            .orchestrator
            .submit(payloads(9), "my life", GenerationOptions::default())
            .await
            .unwrap();
        assert_eq!(task_id, "t-1");

        let (terminal, seen) = wait_terminal(&mut events).await;
        assert_eq!(terminal.status, TaskStatus::Completed);
        assert_eq!(terminal.progress, 1.0);
        assert!(terminal.artifact_ref.is_some());

        // Status and progress never regress across snapshots.
        for pair in seen.windows(2) {
            assert!(rank(pair[1].status) >= rank(pair[0].status));
            assert!(pair[1].progress >= pair[0].progress);
        }

        // Two normal poll intervals elapsed between the three polls.
        assert!(started.elapsed() >= Duration::from_secs(6));
        assert_eq!(h.backend.status_calls.load(Ordering::SeqCst), 3);
        assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);

        let listed = h.store.list_biographies().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "t-1");
        assert!(listed[0].title.starts_with("Personal Biography - "));
        assert_eq!(std::fs::read(&listed[0].pdf_path).unwrap(), b"%PDF-1.7 remote");
        assert!(listed[0].thumbnail_path.as_ref().unwrap().exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_first_poll_short_circuits() {
        let h = harness();
        h.backend.push_create(Ok(CreatedTask {
            task_id: "t-2".to_string(),
            message: None,
        }));
        h.backend.push_status(Ok(completed()));
        h.backend.push_download(Ok(b"%PDF-1.7 fast".to_vec()));

        let started = Instant::now();
        let mut events = h.orchestrator.subscribe();
        h.orchestrator
            .submit(payloads(9), "my life", GenerationOptions::default())
            .await
            .unwrap();
        let (terminal, _) = wait_terminal(&mut events).await;

        assert_eq!(terminal.status, TaskStatus::Completed);
        assert!(started.elapsed() < POLL_INTERVAL);
        assert_eq!(h.backend.status_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_after_three_consecutive_poll_failures() {
        let h = harness();
        h.backend.push_create(Ok(CreatedTask {
            task_id: "t-3".to_string(),
            message: None,
        }));
        h.backend.push_status(Err(connection_error()));
        h.backend
            .push_status(Err(RemoteError::Timeout("deadline elapsed".to_string())));
        h.backend.push_status(Err(RemoteError::Protocol(
            "unknown task status \"paused\"".to_string(),
        )));

        let started = Instant::now();
        let mut events = h.orchestrator.subscribe();
        h.orchestrator
            .submit(payloads(9), "my life", GenerationOptions::default())
            .await
            .unwrap();
        let (terminal, _) = wait_terminal(&mut events).await;

        assert_eq!(terminal.status, TaskStatus::Completed);
        assert!(terminal.message.unwrap().contains("locally"));
        assert_eq!(h.generator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.backend.status_calls.load(Ordering::SeqCst), 3);
        assert_eq!(h.backend.download_calls.load(Ordering::SeqCst), 0);
        // Two failure intervals elapsed; the third failure falls back at once.
        assert!(started.elapsed() >= Duration::from_secs(10));

        let listed = h.store.list_biographies().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "Personal Biography (offline)");
        assert!(listed[0].id.starts_with("local_"));
        assert!(listed[0].content.starts_with("offline story"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_failure_generates_locally() {
        let h = harness();
        h.backend.push_create(Err(connection_error()));

        let mut events = h.orchestrator.subscribe();
        let task_id = h
            .orchestrator
            .submit(payloads(9), "my life", GenerationOptions::default())
            .await
            .unwrap();
        assert!(task_id.starts_with("local_"));

        let (terminal, _) = wait_terminal(&mut events).await;
        assert_eq!(terminal.status, TaskStatus::Completed);
        assert_eq!(h.generator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.backend.status_calls.load(Ordering::SeqCst), 0);

        let listed = h.store.list_biographies().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "Personal Biography (offline)");
        assert!(listed[0].thumbnail_path.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_failure_fails_without_fallback() {
        let h = harness();
        h.backend.push_create(Ok(CreatedTask {
            task_id: "t-9".to_string(),
            message: None,
        }));
        h.backend.push_status(Ok(completed()));
        h.backend.push_download(Err(RemoteError::Status {
            status: 500,
            detail: "artifact missing".to_string(),
        }));

        let mut events = h.orchestrator.subscribe();
        h.orchestrator
            .submit(payloads(9), "my life", GenerationOptions::default())
            .await
            .unwrap();
        let (terminal, _) = wait_terminal(&mut events).await;

        assert_eq!(terminal.status, TaskStatus::Failed);
        assert!(terminal.error_message.unwrap().contains("download"));
        assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
        assert!(h.store.list_biographies().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_failure_report_fails_task() {
        let h = harness();
        h.backend.push_create(Ok(CreatedTask {
            task_id: "t-4".to_string(),
            message: None,
        }));
        h.backend.push_status(Ok(RemoteStatus {
            status: TaskStatus::Failed,
            progress: None,
            message: None,
            artifact_url: None,
            error_detail: Some("images could not be processed".to_string()),
        }));

        let mut events = h.orchestrator.subscribe();
        h.orchestrator
            .submit(payloads(9), "my life", GenerationOptions::default())
            .await
            .unwrap();
        let (terminal, _) = wait_terminal(&mut events).await;

        assert_eq!(terminal.status, TaskStatus::Failed);
        assert_eq!(
            terminal.error_message.as_deref(),
            Some("images could not be processed")
        );
        assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_submission_supersedes_polling() {
        let h = harness();
        h.backend.push_create(Ok(CreatedTask {
            task_id: "t-first".to_string(),
            message: None,
        }));
        h.backend.push_create(Ok(CreatedTask {
            task_id: "t-second".to_string(),
            message: None,
        }));
        h.backend.push_status(Ok(processing(0.2, "first underway")));
        h.backend.push_status(Ok(completed()));
        h.backend.push_download(Ok(b"%PDF-1.7 second".to_vec()));

        let mut events = h.orchestrator.subscribe();
        h.orchestrator
            .submit(payloads(9), "first story", GenerationOptions::default())
            .await
            .unwrap();

        // The first loop polls once, then parks until its next interval.
        let submitted = next_event(&mut events).await;
        assert_eq!(submitted.id, "t-first");
        let polled = next_event(&mut events).await;
        assert_eq!(polled.id, "t-first");
        assert_eq!(polled.status, TaskStatus::Processing);

        h.orchestrator
            .submit(payloads(9), "second story", GenerationOptions::default())
            .await
            .unwrap();

        let (terminal, seen) = wait_terminal(&mut events).await;
        assert_eq!(terminal.id, "t-second");
        assert_eq!(terminal.status, TaskStatus::Completed);
        // Nothing from the first task leaks past the second submission.
        assert!(seen.iter().all(|t| t.id == "t-second"));
        assert_eq!(h.orchestrator.current_task().unwrap().id, "t-second");
        assert_eq!(h.backend.status_calls.load(Ordering::SeqCst), 2);

        let listed = h.store.list_biographies().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "t-second");
    }

    #[test]
    fn test_stale_epoch_mutation_rejected() {
        let h = harness();
        let inner = &h.orchestrator.inner;

        let stale = inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        inner.install_task(
            stale,
            GenerationTask::new("t-old".to_string(), "req".to_string(), vec![]),
        );
        let fresh = inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        inner.install_task(
            fresh,
            GenerationTask::new("t-new".to_string(), "req".to_string(), vec![]),
        );

        assert!(!inner.mutate_task(stale, |task| {
            task.apply_status(TaskStatus::Processing);
        }));
        assert!(inner.mutate_task(fresh, |task| {
            task.apply_status(TaskStatus::Processing);
        }));

        let current = h.orchestrator.current_task().unwrap();
        assert_eq!(current.id, "t-new");
        assert_eq!(current.status, TaskStatus::Processing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_generation_failure_is_terminal() {
        let dir = tempdir().unwrap();
        let settings = Settings::with_data_dir(dir.path().to_path_buf());
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_create(Err(connection_error()));
        let store = Arc::new(ContentStore::new(&settings));
        let orchestrator =
            TaskOrchestrator::new(backend.clone(), Arc::new(FailingGenerator), store.clone());

        let mut events = orchestrator.subscribe();
        orchestrator
            .submit(payloads(9), "my life", GenerationOptions::default())
            .await
            .unwrap();

        let (terminal, _) = wait_terminal(&mut events).await;
        assert_eq!(terminal.status, TaskStatus::Failed);
        assert!(terminal
            .error_message
            .unwrap()
            .contains("local generation failed"));
        assert!(store.list_biographies().unwrap().is_empty());
    }

    #[test]
    fn test_enrich_requirements_folds_completed_annotations() {
        let annotations = vec![
            Annotation {
                image_id: "a".to_string(),
                image_path: "/photos/a.jpg".into(),
                time_period: "Summer 1998".to_string(),
                activity: "Learning to ride a bike".to_string(),
                is_completed: true,
            },
            Annotation::skipped("b".to_string(), "/photos/b.jpg".into()),
            Annotation {
                image_id: "c".to_string(),
                image_path: "/photos/c.jpg".into(),
                time_period: "   ".to_string(),
                activity: "Something".to_string(),
                is_completed: true,
            },
        ];

        let enriched = enrich_requirements("Tell my story", &annotations);
        assert!(enriched.starts_with("Tell my story"));
        assert!(enriched.contains("[Life fragment 1]"));
        assert!(enriched.contains("Period: Summer 1998"));
        assert!(enriched.contains("Experience: Learning to ride a bike"));
        // The skipped and blank annotations contribute nothing.
        assert!(!enriched.contains("[Life fragment 2]"));
        assert!(enriched.contains("Important writing guidance"));
    }

    #[test]
    fn test_enrich_requirements_unchanged_without_fragments() {
        let annotations = vec![Annotation::skipped("a".to_string(), "/photos/a.jpg".into())];
        assert_eq!(
            enrich_requirements("Just the text", &annotations),
            "Just the text"
        );
    }
}
