//! One download job from registration to its terminal outcome.
//!
//! ```text
//! Starting -> Running -> Completing -> Terminal(Completed | Failed)
//!                     \-> Cancelling -> Terminal(Cancelled)
//! ```
//!
//! Whether a job was cancelled is decided by whether its signal fired
//! before the process exit was observed, never by looking at the exit
//! error. Exactly one terminal event is emitted per job (completion or
//! cancellation; failures are returned to the caller), and the job is
//! deregistered before the outcome is returned.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tilefetch_core::{
    JobFamily, JobId, JobKind, NotificationSink, ProgressSample, TransferError, TransferEvent,
    TransferOutcome,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::postprocess::PostProcessor;
use crate::process::{self, CommandSpec, RunningProcess};
use crate::progress::{DirectorySizeProbe, PROBE_INTERVAL};
use crate::registry::{CancellationRegistry, Registration};

/// How long output readers get to finish after the process exited.
pub const READER_GRACE: Duration = Duration::from_secs(5);

// ============================================================================
// Request
// ============================================================================

/// Fixed status updates emitted at phase boundaries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Milestones {
    /// After registration, before launch.
    pub starting: Option<ProgressSample>,
    /// Right after the process started.
    pub running: Option<ProgressSample>,
    /// Before post-processing.
    pub completing: Option<ProgressSample>,
}

/// Everything a session needs to run one job.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub job_id: JobId,
    pub kind: JobKind,
    pub command: CommandSpec,
    /// Directory the tool writes into; created before launch.
    pub destination: PathBuf,
    /// Reported on completion when there is no post-processing step.
    pub result_path: PathBuf,
    pub post_process: Option<PostProcessor>,
    /// Removed once the job reaches a terminal state, whatever the outcome.
    pub cleanup_dir: Option<PathBuf>,
    pub milestones: Milestones,
}

impl TransferRequest {
    pub fn new(
        job_id: JobId,
        kind: JobKind,
        command: CommandSpec,
        destination: impl Into<PathBuf>,
    ) -> Self {
        let destination = destination.into();
        Self {
            job_id,
            kind,
            command,
            result_path: destination.clone(),
            destination,
            post_process: None,
            cleanup_dir: None,
            milestones: Milestones::default(),
        }
    }

    #[must_use]
    pub fn with_post_process(mut self, step: PostProcessor) -> Self {
        self.post_process = Some(step);
        self
    }

    #[must_use]
    pub fn with_cleanup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cleanup_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_milestones(mut self, milestones: Milestones) -> Self {
        self.milestones = milestones;
        self
    }
}

// ============================================================================
// State tracking
// ============================================================================

/// Session lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    Running,
    Completing,
    Cancelling,
    Terminal,
}

struct StateLog<'a> {
    job_id: &'a JobId,
    state: SessionState,
}

impl<'a> StateLog<'a> {
    const fn new(job_id: &'a JobId) -> Self {
        Self {
            job_id,
            state: SessionState::Starting,
        }
    }

    fn enter(&mut self, next: SessionState) {
        debug!(job_id = %self.job_id, from = ?self.state, to = ?next, "Session state change");
        self.state = next;
    }
}

/// Forwards samples of one job to the sink.
#[derive(Clone)]
struct SampleForwarder {
    sink: Arc<dyn NotificationSink>,
    job_id: JobId,
    family: JobFamily,
}

impl SampleForwarder {
    fn forward(&self, sample: ProgressSample) {
        self.sink.emit(TransferEvent::from_sample(
            self.job_id.clone(),
            self.family,
            sample,
        ));
    }

    fn forward_opt(&self, sample: Option<&ProgressSample>) {
        if let Some(sample) = sample {
            self.forward(sample.clone());
        }
    }
}

// ============================================================================
// Background readers
// ============================================================================

type ReaderHandle = JoinHandle<io::Result<String>>;

struct Readers {
    stderr: Option<ReaderHandle>,
    others: Vec<(&'static str, ReaderHandle)>,
}

#[derive(Default)]
struct ReaderReport {
    stderr: String,
    /// A reader task panicked; its output (and progress) was lost.
    fault: Option<TransferError>,
}

async fn join_reader(
    job_id: &JobId,
    name: &'static str,
    handle: ReaderHandle,
    report: &mut ReaderReport,
) -> Option<String> {
    let abort = handle.abort_handle();
    match tokio::time::timeout(READER_GRACE, handle).await {
        Ok(Ok(Ok(text))) => Some(text),
        Ok(Ok(Err(e))) => {
            warn!(%job_id, reader = name, error = %e, "Output reader failed");
            None
        }
        Ok(Err(e)) => {
            warn!(%job_id, reader = name, error = %e, "Output reader task failed");
            if report.fault.is_none() && e.is_panic() {
                report.fault = Some(TransferError::Io {
                    context: format!("reading {name}"),
                    kind: "Other".to_string(),
                    message: e.to_string(),
                });
            }
            None
        }
        Err(_) => {
            // A grandchild can keep the pipe open after the tool exited.
            debug!(%job_id, reader = name, "Output reader did not finish in time, aborting");
            abort.abort();
            None
        }
    }
}

async fn join_readers(job_id: &JobId, readers: Readers) -> ReaderReport {
    let mut report = ReaderReport::default();
    if let Some(handle) = readers.stderr {
        if let Some(text) = join_reader(job_id, "stderr", handle, &mut report).await {
            report.stderr = text;
        }
    }
    for (name, handle) in readers.others {
        join_reader(job_id, name, handle, &mut report).await;
    }
    report
}

// ============================================================================
// Session
// ============================================================================

/// Runs download jobs against a shared registry and sink.
#[derive(Clone)]
pub struct TransferSession {
    registry: CancellationRegistry,
    sink: Arc<dyn NotificationSink>,
    probe_interval: Duration,
}

impl TransferSession {
    pub fn new(registry: CancellationRegistry, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            registry,
            sink,
            probe_interval: PROBE_INTERVAL,
        }
    }

    /// Override the size probe interval.
    #[must_use]
    pub const fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    /// The registry jobs are registered in.
    #[must_use]
    pub const fn registry(&self) -> &CancellationRegistry {
        &self.registry
    }

    /// Run one job to its terminal outcome.
    pub async fn run(&self, request: TransferRequest) -> TransferOutcome {
        let job_id = request.job_id.clone();
        let family = request.kind.family();
        let mut state = StateLog::new(&job_id);

        let registration = match self.registry.register(job_id.clone()) {
            Ok(registration) => registration,
            Err(error) => {
                warn!(%job_id, %error, "Rejected transfer");
                return TransferOutcome::Failed { error };
            }
        };

        let outcome = self.drive(&request, &registration, &mut state).await;

        if let Some(dir) = &request.cleanup_dir {
            remove_dir_logged(dir).await;
        }
        registration.release();
        state.enter(SessionState::Terminal);

        match &outcome {
            TransferOutcome::Completed { result_path } => {
                info!(%job_id, path = %result_path.display(), "Transfer completed");
                self.sink
                    .emit(TransferEvent::completed(job_id, family, result_path.clone()));
            }
            TransferOutcome::Cancelled => {
                info!(%job_id, "Transfer cancelled");
                self.sink.emit(TransferEvent::cancelled(job_id, family));
            }
            TransferOutcome::Failed { error } => {
                warn!(%job_id, %error, "Transfer failed");
            }
        }

        outcome
    }

    async fn drive(
        &self,
        request: &TransferRequest,
        registration: &Registration,
        state: &mut StateLog<'_>,
    ) -> TransferOutcome {
        let cancel = registration.signal();
        let forwarder = SampleForwarder {
            sink: Arc::clone(&self.sink),
            job_id: request.job_id.clone(),
            family: request.kind.family(),
        };
        forwarder.forward_opt(request.milestones.starting.as_ref());

        if let Err(e) = tokio::fs::create_dir_all(&request.destination).await {
            let context = format!("creating {}", request.destination.display());
            return TransferOutcome::Failed {
                error: TransferError::from_io(context, &e),
            };
        }
        if cancel.is_cancelled() {
            state.enter(SessionState::Cancelling);
            return TransferOutcome::Cancelled;
        }

        let mut process = match process::spawn(&request.command) {
            Ok(process) => process,
            Err(error) => return TransferOutcome::Failed { error },
        };
        if let Err(error) = registration.attach_process(process.kill_switch()) {
            process.kill();
            if let Err(e) = process.wait().await {
                debug!(job_id = %request.job_id, error = %e, "Ignoring exit error of killed process");
            }
            return TransferOutcome::Failed { error };
        }
        state.enter(SessionState::Running);
        forwarder.forward_opt(request.milestones.running.as_ref());

        let done = CancellationToken::new();
        let readers = self.spawn_readers(request, &mut process, &cancel, &done, &forwarder);

        let kill = process.kill_switch();
        let exit = process.wait();
        tokio::pin!(exit);

        let exited = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                state.enter(SessionState::Cancelling);
                kill.kill();
                if let Err(error) = exit.await {
                    debug!(job_id = %request.job_id, %error, "Ignoring exit error of killed process");
                }
                None
            }
            result = &mut exit => Some(result),
        };

        done.cancel();
        let report = join_readers(&request.job_id, readers).await;

        let status = match exited {
            None => return TransferOutcome::Cancelled,
            // Signaled after the exit was already on its way in.
            Some(_) if cancel.is_cancelled() => {
                state.enter(SessionState::Cancelling);
                return TransferOutcome::Cancelled;
            }
            Some(Err(error)) => return TransferOutcome::Failed { error },
            Some(Ok(status)) => status,
        };

        if !status.success() {
            return TransferOutcome::Failed {
                error: TransferError::ProcessFailure {
                    status: status.to_string(),
                    stderr: report.stderr.trim().to_string(),
                },
            };
        }
        if let Some(error) = report.fault {
            return TransferOutcome::Failed { error };
        }

        state.enter(SessionState::Completing);
        let Some(step) = &request.post_process else {
            return TransferOutcome::Completed {
                result_path: request.result_path.clone(),
            };
        };

        forwarder.forward_opt(request.milestones.completing.as_ref());
        let progress = forwarder.clone();
        match step
            .run(
                &request.destination,
                cancel,
                Box::new(move |sample| progress.forward(sample)),
            )
            .await
        {
            Ok(result_path) => TransferOutcome::Completed { result_path },
            Err(e) => match e.into_transfer_error() {
                None => {
                    state.enter(SessionState::Cancelling);
                    TransferOutcome::Cancelled
                }
                Some(error) => TransferOutcome::Failed { error },
            },
        }
    }

    fn spawn_readers(
        &self,
        request: &TransferRequest,
        process: &mut RunningProcess,
        cancel: &CancellationToken,
        done: &CancellationToken,
        forwarder: &SampleForwarder,
    ) -> Readers {
        let mut readers = Readers {
            stderr: None,
            others: Vec::new(),
        };

        if let Some(stdout) = process.take_stdout() {
            readers
                .others
                .push(("stdout", process::spawn_drain(stdout, "stdout")));
        }

        if request.kind.uses_size_probe() {
            readers.stderr = process
                .take_stderr()
                .map(|stderr| process::spawn_capture(stderr, "stderr"));

            let probe_forwarder = forwarder.clone();
            let probe = DirectorySizeProbe::new(&request.destination)
                .with_interval(self.probe_interval)
                .spawn(cancel.clone(), done.clone(), move |sample| {
                    probe_forwarder.forward(sample);
                });
            readers.others.push(("size probe", probe));
        } else {
            let parse_forwarder = forwarder.clone();
            readers.stderr = process.take_stderr().map(|stderr| {
                process::spawn_progress_reader(stderr, "stderr", move |sample| {
                    parse_forwarder.forward(sample);
                })
            });
        }

        readers
    }
}

async fn remove_dir_logged(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => debug!(path = %dir.display(), "Removed temporary directory"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %dir.display(), error = %e, "Failed to remove temporary directory"),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct RecordingSink {
        events: Arc<Mutex<Vec<TransferEvent>>>,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<TransferEvent> {
            self.events.lock().unwrap().clone()
        }

        fn terminal_count(&self) -> usize {
            self.events().iter().filter(|e| e.is_terminal()).count()
        }
    }

    impl NotificationSink for RecordingSink {
        fn emit(&self, event: TransferEvent) {
            self.events.lock().unwrap().push(event);
        }

        fn clone_box(&self) -> Box<dyn NotificationSink> {
            Box::new(self.clone())
        }
    }

    fn session(sink: &RecordingSink) -> TransferSession {
        TransferSession::new(CancellationRegistry::new(), Arc::new(sink.clone()))
            .with_probe_interval(Duration::from_millis(20))
    }

    fn shell(script: &str) -> CommandSpec {
        CommandSpec::new("sh").args(["-c", script])
    }

    #[tokio::test]
    async fn successful_single_file_reports_progress_and_completion() {
        let temp = tempfile::tempdir().unwrap();
        let sink = RecordingSink::default();
        let request = TransferRequest::new(
            JobId::from(12_i64),
            JobKind::SingleFile,
            shell("printf ' 1 MiB / 2 GiB [=>--] 50.00%%\\r' >&2"),
            temp.path(),
        );

        let outcome = session(&sink).run(request).await;

        assert_eq!(
            outcome,
            TransferOutcome::Completed {
                result_path: temp.path().to_path_buf()
            }
        );
        let events = sink.events();
        assert!(events.iter().any(|e| matches!(
            e,
            TransferEvent::Status { percentage: Some(p), total_bytes: Some(b), .. }
                if (*p - 50.0).abs() < f64::EPSILON && *b == 2 << 30
        )));
        assert_eq!(sink.terminal_count(), 1);
        assert!(matches!(events.last(), Some(TransferEvent::Completed { .. })));
    }

    #[tokio::test]
    async fn non_zero_exit_fails_with_stderr_and_emits_nothing_terminal() {
        let temp = tempfile::tempdir().unwrap();
        let sink = RecordingSink::default();
        let registry = CancellationRegistry::new();
        let session = TransferSession::new(registry.clone(), Arc::new(sink.clone()));
        let request = TransferRequest::new(
            JobId::new("bad"),
            JobKind::SingleFile,
            shell("echo 'could not authenticate' >&2; exit 2"),
            temp.path(),
        );

        let outcome = session.run(request).await;

        match outcome {
            TransferOutcome::Failed {
                error: TransferError::ProcessFailure { stderr, .. },
            } => assert_eq!(stderr, "could not authenticate"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(sink.terminal_count(), 0);
        assert!(registry.active_jobs().is_empty());
    }

    #[tokio::test]
    async fn missing_program_fails_and_deregisters() {
        let temp = tempfile::tempdir().unwrap();
        let sink = RecordingSink::default();
        let registry = CancellationRegistry::new();
        let session = TransferSession::new(registry.clone(), Arc::new(sink.clone()));
        let request = TransferRequest::new(
            JobId::new("missing"),
            JobKind::SingleFile,
            CommandSpec::new("tilefetch-no-such-tool"),
            temp.path(),
        );

        let outcome = session.run(request).await;

        assert!(matches!(
            outcome,
            TransferOutcome::Failed {
                error: TransferError::Launch { .. }
            }
        ));
        assert!(registry.active_jobs().is_empty());
        assert_eq!(sink.terminal_count(), 0);
    }

    #[tokio::test]
    async fn duplicate_job_is_rejected_without_touching_the_active_one() {
        let temp = tempfile::tempdir().unwrap();
        let sink = RecordingSink::default();
        let registry = CancellationRegistry::new();
        let _active = registry.register(JobId::new("dup")).unwrap();
        let session = TransferSession::new(registry.clone(), Arc::new(sink.clone()));

        let outcome = session
            .run(TransferRequest::new(
                JobId::new("dup"),
                JobKind::SingleFile,
                shell("exit 0"),
                temp.path(),
            ))
            .await;

        assert_eq!(
            outcome,
            TransferOutcome::Failed {
                error: TransferError::DuplicateJob {
                    id: JobId::new("dup")
                }
            }
        );
        assert!(registry.is_active(&JobId::new("dup")));
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn cancel_kills_process_and_suppresses_failure() {
        let temp = tempfile::tempdir().unwrap();
        let sink = RecordingSink::default();
        let session = session(&sink);
        let registry = session.registry().clone();
        let request = TransferRequest::new(
            JobId::new("slow"),
            JobKind::SingleFile,
            CommandSpec::new("sleep").arg("30"),
            temp.path(),
        );

        let runner = tokio::spawn({
            let session = session.clone();
            async move { session.run(request).await }
        });
        while !registry.is_active(&JobId::new("slow")) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        registry.signal(&JobId::new("slow")).unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(5), runner)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome, TransferOutcome::Cancelled);
        let events = sink.events();
        assert_eq!(sink.terminal_count(), 1);
        assert!(matches!(events.last(), Some(TransferEvent::Cancelled { .. })));
        assert!(!events.iter().any(|e| matches!(e, TransferEvent::Completed { .. })));
        assert!(registry.active_jobs().is_empty());
    }

    #[tokio::test]
    async fn multi_part_model_is_merged_and_milestones_are_emitted() {
        let temp = tempfile::tempdir().unwrap();
        let dest = temp.path().join("llama");
        let sink = RecordingSink::default();
        let script = format!(
            "mkdir -p '{d}/Q4' && printf AA > '{d}/Q4/m-1.gguf' && printf BB > '{d}/Q4/m-2.gguf'",
            d = dest.display()
        );
        let request = TransferRequest::new(
            JobId::new("llama"),
            JobKind::MultiPartModel,
            shell(&script),
            &dest,
        )
        .with_post_process(PostProcessor::concatenate("llama"))
        .with_milestones(Milestones {
            starting: Some(ProgressSample::percent(10.0, "Starting download...")),
            running: None,
            completing: Some(ProgressSample::percent(90.0, "Concatenating GGUF files...")),
        });

        let outcome = session(&sink).run(request).await;

        let merged = dest.join("llama.gguf");
        assert_eq!(
            outcome,
            TransferOutcome::Completed {
                result_path: merged.clone()
            }
        );
        assert_eq!(std::fs::read(&merged).unwrap(), b"AABB");
        let statuses: Vec<_> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                TransferEvent::Status { status, .. } => status,
                _ => None,
            })
            .collect();
        assert_eq!(statuses.first().map(String::as_str), Some("Starting download..."));
        assert!(statuses.iter().any(|s| s == "Concatenating file 2 of 2..."));
    }

    #[tokio::test]
    async fn cancel_during_packaging_discards_the_partial_archive() {
        let temp = tempfile::tempdir().unwrap();
        let scratch = temp.path().join("big_temp");
        let archive = temp.path().join("big.tar.gz");
        let partial = temp.path().join("big.tar.gz.partial");
        let sink = RecordingSink::default();
        let session = session(&sink);
        let registry = session.registry().clone();
        let script = format!(
            "mkdir -p '{d}' && head -c 33554432 /dev/urandom > '{d}/weights.safetensors'",
            d = scratch.display()
        );
        let request = TransferRequest::new(
            JobId::new("big"),
            JobKind::DirectoryModel,
            shell(&script),
            &scratch,
        )
        .with_post_process(PostProcessor::FlattenArchive {
            output: archive.clone(),
            check_interval: 64 * 1024,
        })
        .with_cleanup_dir(&scratch)
        .with_milestones(Milestones {
            starting: None,
            running: None,
            completing: Some(ProgressSample::percent(80.0, "Packaging model...")),
        });

        let runner = tokio::spawn({
            let session = session.clone();
            async move { session.run(request).await }
        });
        tokio::time::timeout(Duration::from_secs(20), async {
            while !partial.exists() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("archiving should start");
        registry.signal(&JobId::new("big")).unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(20), runner)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome, TransferOutcome::Cancelled);
        assert_eq!(sink.terminal_count(), 1);
        assert!(matches!(sink.events().last(), Some(TransferEvent::Cancelled { .. })));
        assert!(!archive.exists());
        assert!(!partial.exists());
        assert!(!scratch.exists());
        assert!(registry.active_jobs().is_empty());
    }

    #[tokio::test]
    async fn cleanup_dir_is_removed_on_failure() {
        let temp = tempfile::tempdir().unwrap();
        let scratch = temp.path().join("model_temp");
        let sink = RecordingSink::default();
        let request = TransferRequest::new(
            JobId::new("tmp"),
            JobKind::DirectoryModel,
            shell("exit 1"),
            &scratch,
        )
        .with_cleanup_dir(&scratch);

        let outcome = session(&sink).run(request).await;

        assert!(matches!(outcome, TransferOutcome::Failed { .. }));
        assert!(!scratch.exists());
    }
}
