use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{
    config::{env_path, DeploymentMode, EngineConfig},
    error::JobError,
    settings::{self, Settings},
};

pub const PYTHON_ENV: &str = "VIDEOSYNC_PYTHON";
pub const MODELS_ENV: &str = "VIDEOSYNC_MODELS_DIR";

const ENTRY_SCRIPT: &str = "main.py";
const DIAGNOSTIC_SCRIPT: &str = "check_requirements.py";
const MANIFEST: &str = "requirements.txt";

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedRuntime {
    pub interpreter: PathBuf,
    pub entry_script: PathBuf,
    pub backend_dir: PathBuf,
    pub model_dir: PathBuf,
    pub manifest: PathBuf,
    pub diagnostic_script: PathBuf,
}

pub trait RuntimeProvider: Send + Sync {
    fn resolve(&self) -> Result<ResolvedRuntime, JobError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Explicit(String),
    Bundled,
    Sibling,
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub origin: Origin,
    pub path: PathBuf,
}

impl Candidate {
    fn explicit(name: &str, path: PathBuf) -> Self {
        Self {
            origin: Origin::Explicit(name.to_string()),
            path,
        }
    }

    fn bundled(path: PathBuf) -> Self {
        Self {
            origin: Origin::Bundled,
            path,
        }
    }

    fn sibling(path: PathBuf) -> Self {
        Self {
            origin: Origin::Sibling,
            path,
        }
    }
}

// First existing candidate wins. An explicit candidate that does not
// exist stops the search: a typo in an override should not silently fall
// back to another interpreter.
pub fn first_existing(
    component: &'static str,
    candidates: &[Candidate],
) -> Result<Candidate, JobError> {
    for c in candidates {
        if c.path.exists() {
            return Ok(c.clone());
        }
        if let Origin::Explicit(name) = &c.origin {
            return Err(JobError::OverrideMissing {
                var: name.clone(),
                path: c.path.clone(),
            });
        }
    }
    Err(JobError::RuntimeNotFound {
        component,
        searched: candidates.iter().map(|c| c.path.clone()).collect(),
    })
}

pub fn interpreter_paths_in(dir: &Path) -> Vec<PathBuf> {
    if cfg!(windows) {
        vec![
            dir.join("python.exe"),
            dir.join("Scripts").join("python.exe"),
        ]
    } else {
        vec![
            dir.join("bin").join("python3"),
            dir.join("bin").join("python"),
            dir.join("python3"),
        ]
    }
}

pub struct EnvironmentResolver {
    config: EngineConfig,
}

impl EnvironmentResolver {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn base_dir(&self, mode: DeploymentMode) -> PathBuf {
        match mode {
            DeploymentMode::Development => self.config.app_root.clone(),
            DeploymentMode::Packaged => self.config.resources_dir(),
        }
    }

    pub fn backend_dir(&self, mode: DeploymentMode) -> PathBuf {
        self.base_dir(mode).join("backend")
    }

    // Read-only: a corrupt settings file is left for the UI to recover.
    fn overrides(&self) -> Settings {
        settings::load_settings(&self.config.data_dir).unwrap_or_default()
    }

    pub fn interpreter_candidates(
        &self,
        mode: DeploymentMode,
        overrides: &Settings,
    ) -> Vec<Candidate> {
        let mut out = Vec::new();
        if let Some(p) = env_path(PYTHON_ENV) {
            out.push(Candidate::explicit(PYTHON_ENV, p));
        } else if let Some(p) = overrides
            .python_path
            .as_deref()
            .filter(|s| !s.trim().is_empty())
        {
            out.push(Candidate::explicit("settings.python_path", PathBuf::from(p)));
        }

        let bundled_dirs = match mode {
            DeploymentMode::Development => vec![
                self.config.app_root.join(".venv"),
                self.config.app_root.join("python"),
            ],
            DeploymentMode::Packaged => vec![self.config.resources_dir().join("python")],
        };
        for dir in bundled_dirs {
            out.extend(interpreter_paths_in(&dir).into_iter().map(Candidate::bundled));
        }
        out.extend(
            interpreter_paths_in(&self.config.install_dir.join("python"))
                .into_iter()
                .map(Candidate::sibling),
        );
        out
    }

    pub fn model_candidates(&self, mode: DeploymentMode, overrides: &Settings) -> Vec<Candidate> {
        let mut out = Vec::new();
        if let Some(p) = env_path(MODELS_ENV) {
            out.push(Candidate::explicit(MODELS_ENV, p));
        } else if let Some(p) = overrides
            .model_dir
            .as_deref()
            .filter(|s| !s.trim().is_empty())
        {
            out.push(Candidate::explicit("settings.model_dir", PathBuf::from(p)));
        }
        out.push(Candidate::bundled(self.base_dir(mode).join("models")));
        out.push(Candidate::sibling(self.config.install_dir.join("models")));
        out
    }

    // Model dir is never fatal: the worker downloads into it on first use.
    fn resolve_model_dir(&self, mode: DeploymentMode, overrides: &Settings) -> PathBuf {
        let candidates = self.model_candidates(mode, overrides);
        if let Some(c) = candidates
            .iter()
            .find(|c| matches!(c.origin, Origin::Explicit(_)))
        {
            return c.path.clone();
        }
        match first_existing("model directory", &candidates) {
            Ok(c) => c.path,
            Err(_) => self.base_dir(mode).join("models"),
        }
    }

    pub fn resolve_runtime(&self, mode: DeploymentMode) -> Result<ResolvedRuntime, JobError> {
        let overrides = self.overrides();
        let interpreter = first_existing(
            "python interpreter",
            &self.interpreter_candidates(mode, &overrides),
        )?
        .path;

        let backend_dir = self.backend_dir(mode);
        let entry_script = first_existing(
            "worker entry script",
            &[Candidate::bundled(backend_dir.join(ENTRY_SCRIPT))],
        )?
        .path;

        Ok(ResolvedRuntime {
            interpreter,
            entry_script,
            model_dir: self.resolve_model_dir(mode, &overrides),
            manifest: backend_dir.join(MANIFEST),
            diagnostic_script: backend_dir.join(DIAGNOSTIC_SCRIPT),
            backend_dir,
        })
    }
}

impl RuntimeProvider for EnvironmentResolver {
    fn resolve(&self) -> Result<ResolvedRuntime, JobError> {
        self.resolve_runtime(self.config.mode)
    }
}

pub struct FixedRuntime(pub ResolvedRuntime);

impl RuntimeProvider for FixedRuntime {
    fn resolve(&self) -> Result<ResolvedRuntime, JobError> {
        Ok(self.0.clone())
    }
}
