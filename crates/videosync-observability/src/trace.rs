use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, OnceLock},
    time::Instant,
};

use anyhow::Error as AnyhowError;
use serde::Serialize;
use serde_json::Value;

use crate::{env_bool_default_true, now_ms};

const DEFAULT_MAX_BYTES: u64 = 8_000_000;
const DEFAULT_MAX_FILES: usize = 4;
const TRACE_FILE: &str = "trace.jsonl";

pub fn enabled() -> bool {
    env_bool_default_true("VIDEOSYNC_TRACE_ENABLED")
}

fn max_bytes() -> u64 {
    std::env::var("VIDEOSYNC_TRACE_MAX_BYTES")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_MAX_BYTES)
}

fn max_files() -> usize {
    std::env::var("VIDEOSYNC_TRACE_MAX_FILES")
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(DEFAULT_MAX_FILES)
}

pub fn trace_path(logs_dir: &Path) -> PathBuf {
    logs_dir.join(TRACE_FILE)
}

fn rotated_path(logs_dir: &Path, n: usize) -> PathBuf {
    logs_dir.join(format!("{TRACE_FILE}.{n}"))
}

fn rotate_best_effort(logs_dir: &Path) {
    let keep = max_files();
    if keep == 0 {
        return;
    }
    let current = trace_path(logs_dir);
    let Ok(meta) = std::fs::metadata(&current) else {
        return;
    };
    if meta.len() <= max_bytes() {
        return;
    }

    // Oldest goes first, otherwise the rename below fails on Windows.
    let _ = std::fs::remove_file(rotated_path(logs_dir, keep));
    for i in (1..keep).rev() {
        let src = rotated_path(logs_dir, i);
        if src.exists() {
            let _ = std::fs::rename(&src, rotated_path(logs_dir, i + 1));
        }
    }
    let _ = std::fs::rename(&current, rotated_path(logs_dir, 1));
}

fn write_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceError {
    pub kind: String,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent {
    pub ts_ms: i64,
    pub job_id: Option<String>,
    pub stage: String,
    pub step_id: String,
    pub op: String,     // start|end|event
    pub status: String, // ok|err|skipped|aborted
    pub duration_ms: Option<u128>,
    pub error: Option<TraceError>,
    pub ctx: Option<Value>,
}

pub fn emit_best_effort(logs_dir: &Path, ev: &TraceEvent) {
    if !enabled() {
        return;
    }
    let line = match serde_json::to_string(ev) {
        Ok(mut s) => {
            s.push('\n');
            s
        }
        Err(e) => {
            crate::safe_eprintln!("trace: serialize failed: {e}");
            return;
        }
    };

    let _guard = write_lock().lock().unwrap_or_else(|p| p.into_inner());
    let _ = std::fs::create_dir_all(logs_dir);
    rotate_best_effort(logs_dir);

    let path = trace_path(logs_dir);
    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(mut f) => {
            if let Err(e) = f.write_all(line.as_bytes()) {
                crate::safe_eprintln!("trace: write failed: {}: {e}", path.display());
            }
        }
        Err(e) => crate::safe_eprintln!("trace: open failed: {}: {e}", path.display()),
    }
}

pub fn event(
    logs_dir: &Path,
    job_id: Option<&str>,
    stage: &str,
    step_id: &str,
    status: &str,
    ctx: Option<Value>,
) {
    emit_best_effort(
        logs_dir,
        &TraceEvent {
            ts_ms: now_ms(),
            job_id: job_id.map(str::to_string),
            stage: stage.to_string(),
            step_id: step_id.to_string(),
            op: "event".to_string(),
            status: status.to_string(),
            duration_ms: None,
            error: None,
            ctx,
        },
    );
}

fn with_err_chain(err: &AnyhowError, extra: Option<Value>) -> Value {
    let chain: Vec<String> = err.chain().map(|e| e.to_string()).collect();
    let mut m = serde_json::Map::new();
    m.insert("err_chain".to_string(), serde_json::json!(chain));
    match extra {
        Some(Value::Object(extra)) => m.extend(extra),
        Some(other) => {
            m.insert("extra".to_string(), other);
        }
        None => {}
    }
    Value::Object(m)
}

pub struct Span {
    logs_dir: PathBuf,
    job_id: Option<String>,
    stage: String,
    step_id: String,
    t0: Instant,
    finished: bool,
}

impl Span {
    pub fn start(
        logs_dir: &Path,
        job_id: Option<&str>,
        stage: &str,
        step_id: &str,
        ctx: Option<Value>,
    ) -> Self {
        let span = Self {
            logs_dir: logs_dir.to_path_buf(),
            job_id: job_id.map(str::to_string),
            stage: stage.to_string(),
            step_id: step_id.to_string(),
            t0: Instant::now(),
            finished: false,
        };
        span.emit("start", "ok", None, None, ctx);
        span
    }

    fn emit(
        &self,
        op: &str,
        status: &str,
        duration_ms: Option<u128>,
        error: Option<TraceError>,
        ctx: Option<Value>,
    ) {
        emit_best_effort(
            &self.logs_dir,
            &TraceEvent {
                ts_ms: now_ms(),
                job_id: self.job_id.clone(),
                stage: self.stage.clone(),
                step_id: self.step_id.clone(),
                op: op.to_string(),
                status: status.to_string(),
                duration_ms,
                error,
                ctx,
            },
        );
    }

    fn end(mut self, status: &str, error: Option<TraceError>, ctx: Option<Value>) {
        self.finished = true;
        let elapsed = self.t0.elapsed().as_millis();
        self.emit("end", status, Some(elapsed), error, ctx);
    }

    pub fn ok(self, ctx: Option<Value>) {
        self.end("ok", None, ctx);
    }

    pub fn err(self, kind: &str, code: &str, message: &str, ctx: Option<Value>) {
        let error = TraceError {
            kind: kind.to_string(),
            code: code.to_string(),
            message: message.to_string(),
        };
        self.end("err", Some(error), ctx);
    }

    pub fn err_anyhow(self, kind: &str, code: &str, err: &AnyhowError, ctx: Option<Value>) {
        let error = TraceError {
            kind: kind.to_string(),
            code: code.to_string(),
            message: err.to_string(),
        };
        self.end("err", Some(error), Some(with_err_chain(err, ctx)));
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.emit(
            "end",
            "aborted",
            Some(self.t0.elapsed().as_millis()),
            Some(TraceError {
                kind: "logic".to_string(),
                code: "ABORTED".to_string(),
                message: "span dropped before ok/err".to_string(),
            }),
            None,
        );
    }
}
