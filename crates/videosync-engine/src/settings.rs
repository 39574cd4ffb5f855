use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub python_path: Option<String>,
    pub model_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SettingsPatch {
    pub python_path: Option<Option<String>>,
    pub model_dir: Option<Option<String>>,
}

pub fn settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join("settings.json")
}

pub fn load_settings(data_dir: &Path) -> Result<Settings> {
    let p = settings_path(data_dir);
    if !p.exists() {
        return Ok(Settings::default());
    }
    let s = fs::read_to_string(&p).context("read settings.json failed")?;
    serde_json::from_str(&s).context("parse settings.json failed")
}

// A corrupt settings file must not block job execution; it is moved aside
// and defaults are used.
pub fn load_settings_or_recover(data_dir: &Path) -> Settings {
    match load_settings(data_dir) {
        Ok(s) => s,
        Err(e) => {
            let p = settings_path(data_dir);
            let bak = data_dir.join("settings.json.corrupt");
            let _ = fs::rename(&p, &bak);
            videosync_observability::safe_eprintln!(
                "settings: {e:#}; moved to {} and using defaults",
                bak.display()
            );
            Settings::default()
        }
    }
}

pub fn save_settings(data_dir: &Path, settings: &Settings) -> Result<()> {
    fs::create_dir_all(data_dir).context("create data dir failed")?;
    let s = serde_json::to_string_pretty(settings).context("serialize settings failed")?;
    fs::write(settings_path(data_dir), s).context("write settings.json failed")?;
    Ok(())
}

fn normalize_opt(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub fn apply_patch(mut cur: Settings, patch: SettingsPatch) -> Settings {
    if let Some(v) = patch.python_path {
        cur.python_path = normalize_opt(v);
    }
    if let Some(v) = patch.model_dir {
        cur.model_dir = normalize_opt(v);
    }
    cur
}
