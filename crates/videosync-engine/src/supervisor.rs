use std::{
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use serde::Serialize;
use serde_json::json;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::{Child, Command},
    sync::mpsc,
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use videosync_observability::{debug_log, now_ms, safe_eprintln, trace, trace::Span};

use crate::{
    codec::{decode_terminal, Decoded, ProtocolEvent, StreamDecoder, TerminalResult},
    error::JobError,
    job::{Action, JobRequest},
    resolver::{ResolvedRuntime, RuntimeProvider},
    terminate::{self, TerminateTree},
};

const READ_CHUNK: usize = 8 * 1024;
const DRAIN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ActiveJob {
    pub job_id: String,
    pub action: Action,
    pub pid: Option<u32>,
    pub started_at_ms: i64,
}

struct Slot {
    job: ActiveJob,
    token: CancellationToken,
}

struct Inner {
    slot: Mutex<Option<Slot>>,
    runtime: Arc<dyn RuntimeProvider>,
    terminator: Box<dyn TerminateTree>,
    logs_dir: PathBuf,
}

impl Inner {
    fn slot(&self) -> MutexGuard<'_, Option<Slot>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn release(&self, job_id: &str) {
        let mut g = self.slot();
        if g.as_ref().map(|s| s.job.job_id.as_str()) == Some(job_id) {
            *g = None;
        }
    }

    fn record_pid(&self, job_id: &str, pid: Option<u32>) {
        let mut g = self.slot();
        if let Some(slot) = g.as_mut() {
            if slot.job.job_id == job_id {
                slot.job.pid = pid;
            }
        }
    }
}

#[derive(Clone)]
pub struct ProcessSupervisor {
    inner: Arc<Inner>,
}

impl ProcessSupervisor {
    pub fn new(runtime: Arc<dyn RuntimeProvider>, logs_dir: &Path) -> Self {
        Self::with_terminator(runtime, terminate::platform_default(), logs_dir)
    }

    pub fn with_terminator(
        runtime: Arc<dyn RuntimeProvider>,
        terminator: Box<dyn TerminateTree>,
        logs_dir: &Path,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                slot: Mutex::new(None),
                runtime,
                terminator,
                logs_dir: logs_dir.to_path_buf(),
            }),
        }
    }

    pub fn active(&self) -> Option<ActiveJob> {
        self.inner.slot().as_ref().map(|s| s.job.clone())
    }

    pub fn begin(
        &self,
        request: JobRequest,
        events: mpsc::UnboundedSender<ProtocolEvent>,
    ) -> Result<PendingJob, JobError> {
        let job_id = Uuid::new_v4().to_string();
        let token = CancellationToken::new();
        {
            let mut g = self.inner.slot();
            if let Some(active) = g.as_ref() {
                return Err(JobError::Busy {
                    active_job_id: active.job.job_id.clone(),
                });
            }
            *g = Some(Slot {
                job: ActiveJob {
                    job_id: job_id.clone(),
                    action: request.action(),
                    pid: None,
                    started_at_ms: now_ms(),
                },
                token: token.clone(),
            });
        }
        Ok(PendingJob {
            reservation: Reservation {
                inner: self.inner.clone(),
                job_id,
            },
            token,
            request,
            events,
        })
    }

    pub fn start(
        &self,
        request: JobRequest,
        events: mpsc::UnboundedSender<ProtocolEvent>,
    ) -> impl std::future::Future<Output = Result<TerminalResult, JobError>> + Send + 'static {
        let begun = self.begin(request, events);
        async move { begun?.wait().await }
    }

    pub fn kill(&self) -> bool {
        let Some(slot) = self.inner.slot().take() else {
            return true;
        };
        slot.token.cancel();
        let logs_dir = &self.inner.logs_dir;
        let job_id = slot.job.job_id.as_str();
        let Some(pid) = slot.job.pid else {
            trace::event(
                logs_dir,
                Some(job_id),
                "Job",
                "job.kill",
                "ok",
                Some(json!({"pid": null, "note": "killed before spawn"})),
            );
            return true;
        };
        match self.inner.terminator.terminate_tree(pid) {
            Ok(()) => {
                trace::event(
                    logs_dir,
                    Some(job_id),
                    "Job",
                    "job.kill",
                    "ok",
                    Some(json!({"pid": pid, "strategy": self.inner.terminator.name()})),
                );
                debug_log::append_best_effort(logs_dir, "job", &format!("killed {job_id} pid={pid}"));
                true
            }
            Err(e) => {
                trace::event(
                    logs_dir,
                    Some(job_id),
                    "Job",
                    "job.kill",
                    "err",
                    Some(json!({
                        "pid": pid,
                        "strategy": self.inner.terminator.name(),
                        "error": format!("{e:#}"),
                    })),
                );
                safe_eprintln!("kill job {job_id} (pid {pid}) failed: {e:#}");
                false
            }
        }
    }
}

// Releases the slot if it still belongs to this job.
struct Reservation {
    inner: Arc<Inner>,
    job_id: String,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.inner.release(&self.job_id);
    }
}

pub struct PendingJob {
    reservation: Reservation,
    token: CancellationToken,
    request: JobRequest,
    events: mpsc::UnboundedSender<ProtocolEvent>,
}

impl PendingJob {
    pub fn job_id(&self) -> &str {
        &self.reservation.job_id
    }

    pub async fn wait(self) -> Result<TerminalResult, JobError> {
        let PendingJob {
            reservation,
            token,
            request,
            events,
        } = self;
        let inner = reservation.inner.clone();
        let job_id = reservation.job_id.clone();
        let span = Span::start(
            &inner.logs_dir,
            Some(&job_id),
            "Job",
            &format!("job.{}", request.action().worker_name()),
            Some(json!({"args": redacted_args(request.args())})),
        );

        let res = execute(&inner, &job_id, &token, &request, events).await;
        match &res {
            Ok(result) => {
                debug_log::append_best_effort(
                    &inner.logs_dir,
                    "job",
                    &format!(
                        "{job_id} {} exited 0 structured={} success={}",
                        request.action().worker_name(),
                        result.is_structured(),
                        result.success
                    ),
                );
                span.ok(Some(json!({
                    "structured": result.is_structured(),
                    "success": result.success,
                })));
            }
            Err(e) => {
                debug_log::append_best_effort(&inner.logs_dir, "job", &format!("{job_id} {e}"));
                span.err("Job", e.code(), &e.to_string(), None);
            }
        }
        drop(reservation);
        res
    }
}

fn redacted_args(args: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len());
    let mut hide_next = false;
    for a in args {
        if hide_next {
            out.push("***".to_string());
            hide_next = false;
            continue;
        }
        hide_next = a == "--api_key";
        out.push(a.clone());
    }
    out
}

fn worker_command(rt: &ResolvedRuntime, request: &JobRequest) -> Command {
    let mut cmd = Command::new(&rt.interpreter);
    cmd.arg(&rt.entry_script)
        .arg("--json")
        .arg("--model_dir")
        .arg(&rt.model_dir)
        .args(request.args())
        .current_dir(&rt.backend_dir)
        .env("PYTHONUNBUFFERED", "1")
        .env("PYTHONIOENCODING", "utf-8")
        .env("HF_HOME", &rt.model_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);
    #[cfg(windows)]
    cmd.creation_flags(windows_sys::Win32::System::Threading::CREATE_NO_WINDOW);
    cmd
}

async fn execute(
    inner: &Arc<Inner>,
    job_id: &str,
    token: &CancellationToken,
    request: &JobRequest,
    events: mpsc::UnboundedSender<ProtocolEvent>,
) -> Result<TerminalResult, JobError> {
    if token.is_cancelled() {
        return Err(JobError::Killed);
    }
    let rt = inner.runtime.resolve()?;
    let mut child = worker_command(&rt, request)
        .spawn()
        .map_err(|source| JobError::Spawn {
            program: rt.interpreter.clone(),
            source,
        })?;
    let pid = child.id();
    inner.record_pid(job_id, pid);
    trace::event(
        &inner.logs_dir,
        Some(job_id),
        "Job",
        "job.spawn",
        "ok",
        Some(json!({
            "pid": pid,
            "interpreter": rt.interpreter.display().to_string(),
            "cwd": rt.backend_dir.display().to_string(),
        })),
    );

    let stop_reading = CancellationToken::new();
    let mut stdout_task = match child.stdout.take() {
        Some(out) => spawn_stdout_reader(
            out,
            events,
            stop_reading.clone(),
            inner.logs_dir.clone(),
            job_id.to_string(),
        ),
        None => tokio::spawn(async { Vec::new() }),
    };
    let mut stderr_task = match child.stderr.take() {
        Some(err) => spawn_stderr_reader(err, stop_reading.clone()),
        None => tokio::spawn(async { Vec::new() }),
    };

    let status = tokio::select! {
        st = child.wait() => st,
        _ = token.cancelled() => {
            force_stop(inner, &mut child, pid).await;
            stdout_task.abort();
            stderr_task.abort();
            return Err(JobError::Killed);
        }
    };
    let status = match status {
        Ok(st) => st,
        Err(e) => {
            stdout_task.abort();
            stderr_task.abort();
            return Err(JobError::io("wait for worker failed", e));
        }
    };

    // Descendants may still hold the pipes open after the worker exits.
    let drained = tokio::select! {
        drained = tokio::time::timeout(
            DRAIN_GRACE,
            async { tokio::join!(&mut stdout_task, &mut stderr_task) },
        ) => drained.ok(),
        _ = token.cancelled() => {
            if let Some(pid) = pid {
                let _ = inner.terminator.terminate_tree(pid);
            }
            stdout_task.abort();
            stderr_task.abort();
            return Err(JobError::Killed);
        }
    };
    let (stdout, stderr) = match drained {
        Some(drained) => drained,
        None => {
            trace::event(
                &inner.logs_dir,
                Some(job_id),
                "Job",
                "job.drain",
                "timeout",
                Some(json!({"pid": pid, "grace_ms": DRAIN_GRACE.as_millis() as u64})),
            );
            if let Some(pid) = pid {
                if let Err(e) = inner.terminator.terminate_tree(pid) {
                    safe_eprintln!("terminate leftover tree pid={pid} failed: {e:#}");
                }
            }
            stop_reading.cancel();
            tokio::join!(&mut stdout_task, &mut stderr_task)
        }
    };
    let stdout = stdout.unwrap_or_default();
    let stderr = stderr.unwrap_or_default();

    // kill() may have won the race against a natural exit.
    if token.is_cancelled() {
        return Err(JobError::Killed);
    }
    resolve_exit(status, &stdout, &stderr)
}

fn resolve_exit(status: ExitStatus, stdout: &[u8], stderr: &[u8]) -> Result<TerminalResult, JobError> {
    if status.success() {
        Ok(decode_terminal(stdout, stderr))
    } else {
        Err(JobError::ProcessExit {
            code: status.code(),
            stderr: String::from_utf8_lossy(stderr).into_owned(),
        })
    }
}

async fn force_stop(inner: &Inner, child: &mut Child, pid: Option<u32>) {
    if let Some(pid) = pid {
        if let Err(e) = inner.terminator.terminate_tree(pid) {
            safe_eprintln!("terminate tree pid={pid} failed: {e:#}");
        }
    }
    let _ = child.start_kill();
    let _ = child.wait().await;
}

fn spawn_stdout_reader<R>(
    mut out: R,
    events: mpsc::UnboundedSender<ProtocolEvent>,
    stop: CancellationToken,
    logs_dir: PathBuf,
    job_id: String,
) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut dec = StreamDecoder::new();
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            let read = tokio::select! {
                read = out.read(&mut buf) => read,
                _ = stop.cancelled() => break,
            };
            match read {
                Ok(0) => break,
                Ok(n) => {
                    let decoded = dec.feed(&buf[..n]);
                    forward(decoded, &events, &logs_dir, &job_id);
                }
                Err(e) => {
                    safe_eprintln!("job {job_id}: stdout read failed: {e}");
                    break;
                }
            }
        }
        let decoded = dec.finish();
        forward(decoded, &events, &logs_dir, &job_id);
        dec.into_stdout()
    })
}

fn spawn_stderr_reader<R>(mut err: R, stop: CancellationToken) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut out = Vec::new();
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            let read = tokio::select! {
                read = err.read(&mut buf) => read,
                _ = stop.cancelled() => break,
            };
            match read {
                Ok(0) | Err(_) => break,
                Ok(n) => out.extend_from_slice(&buf[..n]),
            }
        }
        out
    })
}

fn forward(
    decoded: Decoded,
    events: &mpsc::UnboundedSender<ProtocolEvent>,
    logs_dir: &Path,
    job_id: &str,
) {
    for a in decoded.anomalies {
        trace::event(
            logs_dir,
            Some(job_id),
            "Job",
            "protocol.anomaly",
            "skipped",
            Some(json!({"tag": a.tag, "line": a.line, "reason": a.reason})),
        );
    }
    for ev in decoded.events {
        // A gone receiver only means nobody is listening anymore.
        let _ = events.send(ev);
    }
}

#[cfg(all(test, unix))]
pub(crate) mod tests {
    use super::*;
    use crate::{codec::TerminalPayload, resolver::FixedRuntime};
    use std::time::Duration;

    // A fake runtime whose "interpreter" is `/bin/sh` and whose entry
    // script is the given shell body. The worker flags land in `$@`.
    pub(crate) fn sh_runtime(dir: &Path, body: &str) -> ResolvedRuntime {
        let backend_dir = dir.join("backend");
        std::fs::create_dir_all(&backend_dir).expect("mkdir");
        let entry = backend_dir.join("main.sh");
        std::fs::write(&entry, body).expect("write script");
        ResolvedRuntime {
            interpreter: PathBuf::from("/bin/sh"),
            entry_script: entry,
            model_dir: dir.join("models"),
            manifest: backend_dir.join("requirements.txt"),
            diagnostic_script: backend_dir.join("check_requirements.sh"),
            backend_dir,
        }
    }

    fn supervisor(dir: &Path, body: &str) -> ProcessSupervisor {
        ProcessSupervisor::new(
            Arc::new(FixedRuntime(sh_runtime(dir, body))),
            &dir.join("logs"),
        )
    }

    async fn wait_for_pid(sup: &ProcessSupervisor) -> u32 {
        for _ in 0..500 {
            if let Some(pid) = sup.active().and_then(|a| a.pid) {
                return pid;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("worker never reported a pid");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn progress_events_then_structured_result() {
        let td = tempfile::tempdir().expect("tempdir");
        let sup = supervisor(
            td.path(),
            "printf '[PROGRESS] 10\\n[PROGRESS] 55\\n'\n\
             printf '__JSON_START__{\"ok\":true}__JSON_END__\\n'\n",
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = sup
            .start(JobRequest::new(Action::Asr), tx)
            .await
            .expect("job ok");
        assert_eq!(result.value(), Some(&json!({"ok": true})));
        assert!(result.success);

        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        assert_eq!(
            events,
            vec![ProtocolEvent::Progress(10), ProtocolEvent::Progress(55)]
        );
        assert!(sup.active().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn worker_sees_fixed_prefix_env_and_cwd() {
        let td = tempfile::tempdir().expect("tempdir");
        let sup = supervisor(
            td.path(),
            "printf '__JSON_START__{\"argv\":\"%s\",\"cwd\":\"%s\",\"unbuf\":\"%s\"}__JSON_END__' \
             \"$*\" \"$(pwd -P)\" \"$PYTHONUNBUFFERED\"\n",
        );
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = sup
            .start(JobRequest::new(Action::Align).flag("duration", 1.5), tx)
            .await
            .expect("job ok");
        let v = result.value().expect("structured");
        let models = td.path().join("models");
        assert_eq!(
            v["argv"],
            json!(format!(
                "--json --model_dir {} --action test_align --duration 1.5",
                models.display()
            ))
        );
        let backend = std::fs::canonicalize(td.path().join("backend")).expect("canon");
        assert_eq!(v["cwd"], json!(backend.display().to_string()));
        assert_eq!(v["unbuf"], json!("1"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn nonzero_exit_rejects_with_stderr() {
        let td = tempfile::tempdir().expect("tempdir");
        let sup = supervisor(td.path(), "echo boom >&2\nexit 1\n");
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = sup
            .start(JobRequest::new(Action::Asr), tx)
            .await
            .unwrap_err();
        match err {
            JobError::ProcessExit { code, stderr } => {
                assert_eq!(code, Some(1));
                assert!(stderr.contains("boom"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn missing_sentinel_on_clean_exit_is_flagged_raw() {
        let td = tempfile::tempdir().expect("tempdir");
        let sup = supervisor(td.path(), "echo plain output\n");
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = sup
            .start(JobRequest::new(Action::Asr), tx)
            .await
            .expect("job ok");
        assert!(!result.success);
        assert!(matches!(
            result.payload,
            TerminalPayload::Raw { ref stdout, .. } if stdout.contains("plain output")
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn second_start_is_rejected_while_busy() {
        let td = tempfile::tempdir().expect("tempdir");
        let sup = supervisor(td.path(), "sleep 30\n");
        let (tx, _rx) = mpsc::unbounded_channel();
        let first = sup.begin(JobRequest::new(Action::Asr), tx).expect("first");
        let first_id = first.job_id().to_string();
        let running = tokio::spawn(first.wait());

        let (tx2, _rx2) = mpsc::unbounded_channel();
        match sup.start(JobRequest::new(Action::Asr), tx2).await {
            Err(JobError::Busy { active_job_id }) => assert_eq!(active_job_id, first_id),
            other => panic!("expected busy, got {other:?}"),
        }
        assert_eq!(sup.active().map(|a| a.job_id), Some(first_id));

        assert!(sup.kill());
        let res = running.await.expect("join");
        assert!(matches!(res, Err(JobError::Killed)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn kill_settles_job_and_frees_the_slot() {
        let td = tempfile::tempdir().expect("tempdir");
        // The grandchild keeps stdout open; only a tree kill ends the drain.
        let sup = supervisor(td.path(), "echo '[PROGRESS] 1'\nsleep 30 &\nsleep 30\n");
        let (tx, _rx) = mpsc::unbounded_channel();
        let pending = sup.begin(JobRequest::new(Action::DubVideo), tx).expect("begin");
        let running = tokio::spawn(pending.wait());
        let pid = wait_for_pid(&sup).await;
        assert!(pid > 0);

        assert!(sup.kill());
        assert!(sup.active().is_none());
        let res = tokio::time::timeout(Duration::from_secs(10), running)
            .await
            .expect("kill settles promptly")
            .expect("join");
        assert!(matches!(res, Err(JobError::Killed)));

        let sup2 = supervisor(td.path(), "printf '__JSON_START__1__JSON_END__'\n");
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(sup2.start(JobRequest::new(Action::Asr), tx).await.is_ok());

        // The original supervisor accepts work again too.
        let (tx, _rx) = mpsc::unbounded_channel();
        let again = sup.begin(JobRequest::new(Action::Asr), tx).expect("slot free");
        drop(again);
        assert!(sup.active().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn background_child_holding_stdout_does_not_stall_the_result() {
        let td = tempfile::tempdir().expect("tempdir");
        let sup = supervisor(
            td.path(),
            "echo '[PROGRESS] 90'\n\
             sleep 30 &\n\
             printf '__JSON_START__{\"ok\":true}__JSON_END__'\n\
             exit 0\n",
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = tokio::time::timeout(
            Duration::from_secs(8),
            sup.start(JobRequest::new(Action::Asr), tx),
        )
        .await
        .expect("settles after the drain grace")
        .expect("job ok");
        assert_eq!(result.value(), Some(&json!({"ok": true})));
        assert_eq!(rx.recv().await, Some(ProtocolEvent::Progress(90)));
        assert!(sup.active().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn kill_goes_through_the_configured_strategy() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct Counting(Arc<AtomicUsize>);
        impl TerminateTree for Counting {
            fn name(&self) -> &'static str {
                "counting"
            }
            fn terminate_tree(&self, pid: u32) -> anyhow::Result<()> {
                self.0.fetch_add(1, Ordering::SeqCst);
                terminate::ProcessGroupKill.terminate_tree(pid)
            }
        }

        let td = tempfile::tempdir().expect("tempdir");
        let calls = Arc::new(AtomicUsize::new(0));
        let sup = ProcessSupervisor::with_terminator(
            Arc::new(FixedRuntime(sh_runtime(td.path(), "sleep 30\n"))),
            Box::new(Counting(calls.clone())),
            td.path(),
        );
        let (tx, _rx) = mpsc::unbounded_channel();
        let running = tokio::spawn(sup.start(JobRequest::new(Action::Asr), tx));
        wait_for_pid(&sup).await;
        assert!(sup.kill());
        let res = running.await.expect("join");
        assert!(matches!(res, Err(JobError::Killed)));
        assert!(calls.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn kill_without_job_is_a_successful_noop() {
        let td = tempfile::tempdir().expect("tempdir");
        let sup = supervisor(td.path(), "true\n");
        assert!(sup.kill());
        assert!(sup.active().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn unresolvable_runtime_rejects_and_frees_slot() {
        struct Missing;
        impl RuntimeProvider for Missing {
            fn resolve(&self) -> Result<ResolvedRuntime, JobError> {
                Err(JobError::RuntimeNotFound {
                    component: "python interpreter",
                    searched: vec![PathBuf::from("/nowhere/python3")],
                })
            }
        }
        let td = tempfile::tempdir().expect("tempdir");
        let sup = ProcessSupervisor::new(Arc::new(Missing), td.path());
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = sup.start(JobRequest::new(Action::Asr), tx).await.unwrap_err();
        assert_eq!(err.code(), "E_RUNTIME_NOT_FOUND");
        assert!(sup.active().is_none());
    }

    #[test]
    fn api_key_is_redacted_in_traces() {
        let args: Vec<String> = ["--action", "translate_text", "--api_key", "sk-1", "--lang", "en"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            redacted_args(&args),
            ["--action", "translate_text", "--api_key", "***", "--lang", "en"]
        );
    }
}
