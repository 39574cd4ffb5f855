use std::{
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
};

use serde::Serialize;
use serde_json::{json, Value};
use tokio::process::Command;
use videosync_observability::{debug_log, trace::Span};

use crate::{
    codec::extract_payload,
    error::JobError,
    resolver::{ResolvedRuntime, RuntimeProvider},
};

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct DependencyReport {
    pub missing: Vec<String>,
    // False when `missing` came from the diagnostic's log lines.
    pub structured: bool,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
}

impl DependencyReport {
    pub fn all_present(&self) -> bool {
        self.error.is_none()
            && self.missing.is_empty()
            && (self.structured || self.exit_code == Some(0))
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RepairOutcome {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub log: String,
}

pub fn parse_missing(stdout: &str) -> Option<Vec<String>> {
    let v = extract_payload(stdout).ok()?;
    let list = match &v {
        Value::Array(items) => items,
        Value::Object(m) => m.get("missing")?.as_array()?,
        _ => return None,
    };
    Some(
        list.iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

const MISSING_MARKER: &str = "发现缺失的包";

// Reads the `[Info] 发现缺失的包: a, b` line `check_requirements.py` prints.
pub fn parse_missing_text(stdout: &str) -> Option<Vec<String>> {
    stdout.lines().find_map(|line| {
        let (_, rest) = line.split_once(MISSING_MARKER)?;
        let list = rest
            .strip_prefix(':')
            .or_else(|| rest.strip_prefix('：'))?;
        Some(
            list.split([',', '，'])
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    })
}

fn command(program: &Path, cwd: &Path) -> Command {
    let mut cmd = Command::new(program);
    cmd.current_dir(cwd)
        .env("PYTHONUNBUFFERED", "1")
        .env("PYTHONIOENCODING", "utf-8")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(windows)]
    cmd.creation_flags(windows_sys::Win32::System::Threading::CREATE_NO_WINDOW);
    cmd
}

pub fn repair_args(rt: &ResolvedRuntime) -> Vec<String> {
    vec![
        "-m".to_string(),
        "pip".to_string(),
        "install".to_string(),
        "-r".to_string(),
        rt.manifest.display().to_string(),
    ]
}

pub struct DependencyRepairService {
    runtime: Arc<dyn RuntimeProvider>,
    logs_dir: PathBuf,
}

impl DependencyRepairService {
    pub fn new(runtime: Arc<dyn RuntimeProvider>, logs_dir: &Path) -> Self {
        Self {
            runtime,
            logs_dir: logs_dir.to_path_buf(),
        }
    }

    pub async fn check(&self) -> Result<DependencyReport, JobError> {
        let rt = self.runtime.resolve()?;
        let span = Span::start(
            &self.logs_dir,
            None,
            "Deps",
            "deps.check",
            Some(json!({"manifest": rt.manifest.display().to_string()})),
        );
        let output = command(&rt.interpreter, &rt.backend_dir)
            .arg(&rt.diagnostic_script)
            .arg(&rt.manifest)
            .output()
            .await;
        let output = match output {
            Ok(o) => o,
            Err(e) => {
                let msg = format!("failed to run {}: {e}", rt.diagnostic_script.display());
                span.err("Deps", "E_SPAWN_FAILED", &msg, None);
                return Ok(DependencyReport {
                    error: Some(msg),
                    ..Default::default()
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let report = match parse_missing(&stdout) {
            Some(missing) => DependencyReport {
                missing,
                structured: true,
                exit_code: output.status.code(),
                error: None,
            },
            None => DependencyReport {
                missing: parse_missing_text(&stdout).unwrap_or_default(),
                structured: false,
                exit_code: output.status.code(),
                error: None,
            },
        };
        debug_log::append_best_effort(
            &self.logs_dir,
            "deps",
            &format!(
                "check exit={:?} structured={} missing={:?}\n{}",
                report.exit_code,
                report.structured,
                report.missing,
                stdout.trim_end()
            ),
        );
        span.ok(Some(json!({
            "exit_code": report.exit_code,
            "structured": report.structured,
            "missing": report.missing,
        })));
        Ok(report)
    }

    pub async fn repair(&self) -> Result<RepairOutcome, JobError> {
        let rt = self.runtime.resolve()?;
        let args = repair_args(&rt);
        let span = Span::start(
            &self.logs_dir,
            None,
            "Deps",
            "deps.repair",
            Some(json!({"args": args})),
        );
        let output = command(&rt.interpreter, &rt.backend_dir)
            .args(&args)
            .output()
            .await;
        let outcome = match output {
            Ok(o) => {
                let mut log = String::from_utf8_lossy(&o.stdout).into_owned();
                log.push_str(&String::from_utf8_lossy(&o.stderr));
                RepairOutcome {
                    success: o.status.success(),
                    exit_code: o.status.code(),
                    log,
                }
            }
            Err(e) => RepairOutcome {
                success: false,
                exit_code: None,
                log: format!("failed to run {}: {e}", rt.interpreter.display()),
            },
        };
        debug_log::append_best_effort(
            &self.logs_dir,
            "deps",
            &format!("repair exit={:?}\n{}", outcome.exit_code, outcome.log.trim_end()),
        );
        if outcome.success {
            span.ok(Some(json!({"exit_code": outcome.exit_code})));
        } else {
            span.err(
                "Deps",
                "E_PROCESS_EXIT",
                "dependency install failed",
                Some(json!({"exit_code": outcome.exit_code})),
            );
        }
        Ok(outcome)
    }
}
