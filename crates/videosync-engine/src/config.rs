use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentMode {
    Development,
    Packaged,
}

impl DeploymentMode {
    pub fn detect() -> Self {
        match std::env::var("VIDEOSYNC_MODE")
            .map(|v| v.trim().to_ascii_lowercase())
            .as_deref()
        {
            Ok("dev") | Ok("development") => DeploymentMode::Development,
            Ok("packaged") | Ok("release") => DeploymentMode::Packaged,
            _ if cfg!(debug_assertions) => DeploymentMode::Development,
            _ => DeploymentMode::Packaged,
        }
    }
}

pub fn install_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("resolve current exe failed")?;
    exe.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow!("current exe has no parent dir: {}", exe.display()))
}

pub fn app_root(mode: DeploymentMode) -> Result<PathBuf> {
    if let Some(p) = env_path("VIDEOSYNC_APP_ROOT") {
        return Ok(p);
    }
    match mode {
        DeploymentMode::Development => {
            // CARGO_MANIFEST_DIR = <root>/crates/videosync-engine
            let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
            dir.ancestors()
                .nth(2)
                .map(Path::to_path_buf)
                .ok_or_else(|| anyhow!("failed to locate app root from CARGO_MANIFEST_DIR"))
        }
        DeploymentMode::Packaged => install_dir(),
    }
}

pub fn data_dir(mode: DeploymentMode) -> Result<PathBuf> {
    if let Some(p) = env_path("VIDEOSYNC_DATA_DIR") {
        return Ok(p);
    }
    Ok(app_root(mode)?.join("tmp").join("videosync-data"))
}

pub(crate) fn env_path(key: &str) -> Option<PathBuf> {
    let raw = std::env::var(key).ok()?;
    let t = raw.trim();
    if t.is_empty() {
        return None;
    }
    Some(PathBuf::from(t))
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub mode: DeploymentMode,
    pub app_root: PathBuf,
    pub install_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        let mode = DeploymentMode::detect();
        Ok(Self {
            mode,
            app_root: app_root(mode)?,
            install_dir: install_dir()?,
            data_dir: data_dir(mode)?,
        })
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    pub fn resources_dir(&self) -> PathBuf {
        self.install_dir.join("resources")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::env_lock;

    #[test]
    fn mode_env_overrides_build_profile() {
        let _g = env_lock();
        std::env::set_var("VIDEOSYNC_MODE", "packaged");
        assert_eq!(DeploymentMode::detect(), DeploymentMode::Packaged);
        std::env::set_var("VIDEOSYNC_MODE", "dev");
        assert_eq!(DeploymentMode::detect(), DeploymentMode::Development);
        std::env::remove_var("VIDEOSYNC_MODE");
    }

    #[test]
    fn data_dir_prefers_env() {
        let _g = env_lock();
        let td = tempfile::tempdir().expect("tempdir");
        std::env::set_var("VIDEOSYNC_DATA_DIR", td.path());
        let got = data_dir(DeploymentMode::Development).expect("data dir");
        assert_eq!(got, td.path());
        std::env::remove_var("VIDEOSYNC_DATA_DIR");
    }

    #[test]
    fn dev_app_root_is_workspace_root() {
        let _g = env_lock();
        std::env::remove_var("VIDEOSYNC_APP_ROOT");
        let root = app_root(DeploymentMode::Development).expect("root");
        assert!(root.join("crates").join("videosync-engine").exists());
    }
}
