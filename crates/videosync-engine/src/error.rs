use std::path::PathBuf;

use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("E_RUNTIME_NOT_FOUND: no usable {component} found (searched: {})", join_paths(.searched))]
    RuntimeNotFound {
        component: &'static str,
        searched: Vec<PathBuf>,
    },

    #[error("E_RUNTIME_NOT_FOUND: {var} points to missing path: {}", .path.display())]
    OverrideMissing { var: String, path: PathBuf },

    #[error("E_PROCESS_EXIT: worker exited with {}: {}", exit_label(.code), .stderr.trim())]
    ProcessExit { code: Option<i32>, stderr: String },

    #[error("E_JOB_BUSY: job {active_job_id} is still running")]
    Busy { active_job_id: String },

    #[error("E_JOB_KILLED: job was terminated")]
    Killed,

    #[error("E_SPAWN_FAILED: failed to spawn {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("E_IO: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("code {c}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl JobError {
    pub fn code(&self) -> &'static str {
        match self {
            JobError::RuntimeNotFound { .. } | JobError::OverrideMissing { .. } => {
                "E_RUNTIME_NOT_FOUND"
            }
            JobError::ProcessExit { .. } => "E_PROCESS_EXIT",
            JobError::Busy { .. } => "E_JOB_BUSY",
            JobError::Killed => "E_JOB_KILLED",
            JobError::Spawn { .. } => "E_SPAWN_FAILED",
            JobError::Io { .. } => "E_IO",
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        JobError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        let (exit_code, stderr) = match self {
            JobError::ProcessExit { code, stderr } => (*code, Some(stderr.clone())),
            _ => (None, None),
        };
        ErrorPayload {
            code: self.code().to_string(),
            message: self.to_string(),
            exit_code,
            stderr,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("E_CACHE_IO: {op} {}: {source}", .path.display())]
pub struct CacheIoError {
    pub op: &'static str,
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl CacheIoError {
    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            code: "E_CACHE_IO".to_string(),
            message: self.to_string(),
            exit_code: None,
            stderr: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub exit_code: Option<i32>,
    pub stderr: Option<String>,
}
