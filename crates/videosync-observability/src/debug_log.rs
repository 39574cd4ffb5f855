use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, OnceLock},
};

use anyhow::{Context, Result};

use crate::now_ms;

const DEBUG_LOG_FILE: &str = "debug.log";
const DEFAULT_MAX_BYTES: u64 = 4_000_000;

pub fn debug_log_path(logs_dir: &Path) -> PathBuf {
    logs_dir.join(DEBUG_LOG_FILE)
}

fn max_bytes() -> u64 {
    std::env::var("VIDEOSYNC_DEBUG_LOG_MAX_BYTES")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_MAX_BYTES)
}

fn lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn format_entry(ts_ms: i64, tag: &str, message: &str) -> String {
    let mut out = String::with_capacity(message.len() + 32);
    let mut lines = message.lines();
    let first = lines.next().unwrap_or("");
    out.push_str(&format!("[{ts_ms}] [{tag}] {first}\n"));
    for rest in lines {
        out.push_str("    ");
        out.push_str(rest);
        out.push('\n');
    }
    out
}

pub fn append(logs_dir: &Path, tag: &str, message: &str) -> Result<()> {
    let _guard = lock().lock().unwrap_or_else(|p| p.into_inner());
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("create logs dir failed: {}", logs_dir.display()))?;
    let path = debug_log_path(logs_dir);

    // Single generation: the log is for eyeballing the latest session.
    if let Ok(m) = std::fs::metadata(&path) {
        if m.len() > max_bytes() {
            let _ = std::fs::rename(&path, logs_dir.join(format!("{DEBUG_LOG_FILE}.old")));
        }
    }

    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open debug log failed: {}", path.display()))?;
    f.write_all(format_entry(now_ms(), tag, message).as_bytes())
        .context("write debug log failed")?;
    Ok(())
}

pub fn append_best_effort(logs_dir: &Path, tag: &str, message: &str) {
    if let Err(e) = append(logs_dir, tag, message) {
        crate::safe_eprintln!("debug_log: {e:#}");
    }
}
