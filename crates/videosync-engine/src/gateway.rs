use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Serialize;
use tokio::sync::mpsc;
use videosync_observability::{debug_log, safe_eprintln};

use crate::{
    cache::{CacheEntry, ContentCache},
    codec::{ProtocolEvent, TerminalResult},
    config::EngineConfig,
    deps::{DependencyReport, DependencyRepairService, RepairOutcome},
    error::{CacheIoError, JobError},
    job::{
        self, Action, AlignOptions, AsrOptions, BatchTtsOptions, DubVideoOptions, JobRequest,
        MergeVideoOptions, SingleTtsOptions, TranslateOptions,
    },
    resolver::{EnvironmentResolver, ResolvedRuntime, RuntimeProvider},
    supervisor::{ActiveJob, ProcessSupervisor},
};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JobEvent {
    pub job_id: String,
    pub action: Action,
    pub event: ProtocolEvent,
}

pub trait EventSink: Send + Sync + 'static {
    fn emit(&self, event: JobEvent);
}

pub struct Gateway {
    runtime: Arc<dyn RuntimeProvider>,
    supervisor: ProcessSupervisor,
    deps: DependencyRepairService,
    cache: ContentCache,
    logs_dir: PathBuf,
    sink: Arc<dyn EventSink>,
}

impl Gateway {
    pub fn new(config: EngineConfig, sink: Arc<dyn EventSink>) -> Self {
        let logs_dir = config.logs_dir();
        let cache_dir = config.cache_dir();
        let runtime: Arc<dyn RuntimeProvider> = Arc::new(EnvironmentResolver::new(config));
        Self::with_parts(runtime, logs_dir, cache_dir, sink)
    }

    pub fn with_parts(
        runtime: Arc<dyn RuntimeProvider>,
        logs_dir: PathBuf,
        cache_dir: PathBuf,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            supervisor: ProcessSupervisor::new(runtime.clone(), &logs_dir),
            deps: DependencyRepairService::new(runtime.clone(), &logs_dir),
            cache: ContentCache::new(cache_dir),
            runtime,
            logs_dir,
            sink,
        }
    }

    pub async fn run(&self, request: JobRequest) -> Result<TerminalResult, JobError> {
        let action = request.action();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pending = self.supervisor.begin(request, tx)?;
        let job_id = pending.job_id().to_string();
        debug_log::append_best_effort(
            &self.logs_dir,
            "gateway",
            &format!("start {job_id} {}", action.worker_name()),
        );

        let sink = self.sink.clone();
        let forward_id = job_id.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                sink.emit(JobEvent {
                    job_id: forward_id.clone(),
                    action,
                    event,
                });
            }
        });

        let res = pending.wait().await;
        if let Err(e) = forwarder.await {
            safe_eprintln!("job {job_id}: event forwarder failed: {e}");
        }
        res
    }

    pub async fn asr(&self, opts: AsrOptions) -> Result<TerminalResult, JobError> {
        self.run(opts.into_request()).await
    }

    pub async fn translate(&self, opts: TranslateOptions) -> Result<TerminalResult, JobError> {
        self.run(opts.into_request()).await
    }

    pub async fn single_tts(&self, opts: SingleTtsOptions) -> Result<TerminalResult, JobError> {
        self.run(opts.into_request()).await
    }

    pub async fn batch_tts(&self, opts: BatchTtsOptions) -> Result<TerminalResult, JobError> {
        self.run(opts.into_request()).await
    }

    pub async fn align(&self, opts: AlignOptions) -> Result<TerminalResult, JobError> {
        self.run(opts.into_request()).await
    }

    pub async fn merge_video(&self, opts: MergeVideoOptions) -> Result<TerminalResult, JobError> {
        self.run(opts.into_request()).await
    }

    pub async fn dub_video(&self, opts: DubVideoOptions) -> Result<TerminalResult, JobError> {
        self.run(opts.into_request()).await
    }

    pub async fn analyze_video(&self, input: &Path) -> Result<TerminalResult, JobError> {
        self.run(job::analyze_video(input)).await
    }

    pub async fn transcode_video(
        &self,
        input: &Path,
        output: &Path,
    ) -> Result<TerminalResult, JobError> {
        self.run(job::transcode_video(input, output)).await
    }

    pub async fn check_audio_files(&self, paths: &[PathBuf]) -> Result<TerminalResult, JobError> {
        self.run(job::check_audio_files(paths)).await
    }

    pub fn kill(&self) -> bool {
        self.supervisor.kill()
    }

    pub fn active(&self) -> Option<ActiveJob> {
        self.supervisor.active()
    }

    pub async fn check_dependencies(&self) -> Result<DependencyReport, JobError> {
        self.deps.check().await
    }

    pub async fn repair_dependencies(&self) -> Result<RepairOutcome, JobError> {
        self.deps.repair().await
    }

    pub async fn cache_input(&self, source: &Path) -> Result<CacheEntry, CacheIoError> {
        let cache = self.cache.clone();
        let src = source.to_path_buf();
        match tokio::task::spawn_blocking(move || cache.ensure_cached(&src)).await {
            Ok(res) => res,
            Err(e) => Err(CacheIoError {
                op: "copy",
                path: source.to_path_buf(),
                source: std::io::Error::other(e.to_string()),
            }),
        }
    }

    pub fn resolve_runtime(&self) -> Result<ResolvedRuntime, JobError> {
        self.runtime.resolve()
    }

    pub fn debug_log_path(&self) -> PathBuf {
        debug_log::debug_log_path(&self.logs_dir)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::{resolver::FixedRuntime, supervisor::tests::sh_runtime};
    use serde_json::json;
    use std::{sync::Mutex, time::Duration};

    #[derive(Default)]
    struct Collect(Mutex<Vec<JobEvent>>);

    impl Collect {
        fn take(&self) -> Vec<JobEvent> {
            std::mem::take(&mut *self.0.lock().expect("lock"))
        }
    }

    impl EventSink for Collect {
        fn emit(&self, event: JobEvent) {
            self.0.lock().expect("lock").push(event);
        }
    }

    fn gateway(dir: &Path, body: &str, sink: Arc<Collect>) -> Gateway {
        Gateway::with_parts(
            Arc::new(FixedRuntime(sh_runtime(dir, body))),
            dir.join("logs"),
            dir.join("cache"),
            sink,
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn events_arrive_in_order_before_outcome() {
        let td = tempfile::tempdir().expect("tempdir");
        let sink = Arc::new(Collect::default());
        let mut body = String::new();
        for i in 0..50 {
            body.push_str(&format!("echo '[PROGRESS] {i}'\n"));
        }
        body.push_str("echo '[PARTIAL] {\"index\":7}'\n");
        body.push_str("printf '__JSON_START__{\"done\":true}__JSON_END__'\n");
        let gw = gateway(td.path(), &body, sink.clone());

        let result = gw
            .asr(AsrOptions {
                input: PathBuf::from("/media/a.mp4"),
                ..Default::default()
            })
            .await
            .expect("asr");
        assert_eq!(result.value(), Some(&json!({"done": true})));

        let events = sink.take();
        assert_eq!(events.len(), 51);
        let progress: Vec<i64> = events
            .iter()
            .filter_map(|e| match e.event {
                ProtocolEvent::Progress(p) => Some(p),
                _ => None,
            })
            .collect();
        assert_eq!(progress, (0..50).collect::<Vec<_>>());
        assert_eq!(
            events.last().map(|e| &e.event),
            Some(&ProtocolEvent::Partial(json!({"index": 7})))
        );
        assert!(events.iter().all(|e| e.action == Action::Asr));
        let ids: std::collections::HashSet<_> = events.iter().map(|e| e.job_id.clone()).collect();
        assert_eq!(ids.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failed_job_still_delivers_its_events() {
        let td = tempfile::tempdir().expect("tempdir");
        let sink = Arc::new(Collect::default());
        let gw = gateway(
            td.path(),
            "echo '[PROGRESS] 5'\necho 'bad model' >&2\nexit 3\n",
            sink.clone(),
        );
        let err = gw
            .analyze_video(Path::new("/media/a.mp4"))
            .await
            .unwrap_err();
        assert_eq!(err.to_payload().exit_code, Some(3));
        assert_eq!(
            sink.take().into_iter().map(|e| e.event).collect::<Vec<_>>(),
            vec![ProtocolEvent::Progress(5)]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn kill_through_gateway_rejects_pending_call() {
        let td = tempfile::tempdir().expect("tempdir");
        let sink = Arc::new(Collect::default());
        let gw = Arc::new(gateway(td.path(), "sleep 30\n", sink));
        let runner = {
            let gw = gw.clone();
            tokio::spawn(async move { gw.dub_video(DubVideoOptions::default()).await })
        };
        for _ in 0..500 {
            if gw.active().and_then(|a| a.pid).is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(gw.kill());
        let res = tokio::time::timeout(Duration::from_secs(10), runner)
            .await
            .expect("settles")
            .expect("join");
        assert!(matches!(res, Err(JobError::Killed)));
        assert!(gw.active().is_none());
    }

    #[tokio::test]
    async fn cache_input_copies_once() {
        let td = tempfile::tempdir().expect("tempdir");
        let gw = gateway(td.path(), "true\n", Arc::new(Collect::default()));
        let src = td.path().join("in.wav");
        std::fs::write(&src, b"pcm").expect("write");
        let a = gw.cache_input(&src).await.expect("a");
        let b = gw.cache_input(&src).await.expect("b");
        assert!(!a.hit);
        assert!(b.hit);
        assert!(a.destination.starts_with(td.path().join("cache")));
        assert_eq!(gw.debug_log_path(), td.path().join("logs").join("debug.log"));
    }
}
