use std::path::PathBuf;

use tauri::{AppHandle, Emitter, Manager, State};
use tauri_plugin_opener::OpenerExt;
use videosync_observability::trace::Span;

use crate::{
    cache::CacheEntry,
    codec::{ProtocolEvent, TerminalResult},
    config::EngineConfig,
    deps::{DependencyReport, RepairOutcome},
    error::{ErrorPayload, JobError},
    gateway::{EventSink, Gateway, JobEvent},
    job::{
        Action, AlignOptions, AsrOptions, BatchTtsOptions, DubVideoOptions, JobRequest,
        MergeVideoOptions, SingleTtsOptions, TranslateOptions,
    },
    resolver::ResolvedRuntime,
    settings::{self, Settings, SettingsPatch},
    supervisor::ActiveJob,
};

pub const EVENT_PROGRESS: &str = "job_progress";
pub const EVENT_PARTIAL: &str = "job_partial";

impl EventSink for AppHandle {
    fn emit(&self, event: JobEvent) {
        let name = match event.event {
            ProtocolEvent::Progress(_) => EVENT_PROGRESS,
            ProtocolEvent::Partial(_) => EVENT_PARTIAL,
        };
        let _ = Emitter::emit(self, name, event);
    }
}

pub struct DesktopState {
    gateway: Gateway,
    config: EngineConfig,
}

pub fn manage_state(app: &AppHandle) -> anyhow::Result<()> {
    let config = EngineConfig::from_env()?;
    std::fs::create_dir_all(config.logs_dir())?;
    let gateway = Gateway::new(config.clone(), std::sync::Arc::new(app.clone()));
    app.manage(DesktopState { gateway, config });
    Ok(())
}

// Hosts call this on their builder and `manage_state` from `setup`.
pub fn register(builder: tauri::Builder<tauri::Wry>) -> tauri::Builder<tauri::Wry> {
    builder
        .plugin(tauri_plugin_opener::init())
        .invoke_handler(tauri::generate_handler![
            job_run,
            job_asr,
            job_translate,
            job_single_tts,
            job_batch_tts,
            job_align,
            job_merge_video,
            job_dub_video,
            job_analyze_video,
            job_transcode_video,
            job_check_audio_files,
            job_kill,
            job_active,
            deps_check,
            deps_repair,
            cache_input,
            runtime_resolve,
            open_debug_log,
            get_settings,
            update_settings
        ])
}

fn cmd_span(state: &DesktopState, step_id: &str, ctx: Option<serde_json::Value>) -> Span {
    Span::start(&state.config.logs_dir(), None, "Cmd", step_id, ctx)
}

async fn finish_job(
    state: &DesktopState,
    step_id: &str,
    req: JobRequest,
) -> Result<TerminalResult, ErrorPayload> {
    let span = cmd_span(state, step_id, None);
    match state.gateway.run(req).await {
        Ok(r) => {
            span.ok(None);
            Ok(r)
        }
        Err(e) => {
            span.err("Cmd", e.code(), &e.to_string(), None);
            Err(e.to_payload())
        }
    }
}

#[tauri::command]
async fn job_run(
    state: State<'_, DesktopState>,
    action: String,
    args: Vec<String>,
) -> Result<TerminalResult, ErrorPayload> {
    let Some(action) = Action::from_worker_name(&action) else {
        return Err(ErrorPayload {
            code: "E_BAD_ACTION".to_string(),
            message: format!("unknown action: {action}"),
            exit_code: None,
            stderr: None,
        });
    };
    finish_job(&state, "CMD.job_run", JobRequest::new(action).raw_args(args)).await
}

#[tauri::command]
async fn job_asr(state: State<'_, DesktopState>, opts: AsrOptions) -> Result<TerminalResult, ErrorPayload> {
    finish_job(&state, "CMD.job_asr", opts.into_request()).await
}

#[tauri::command]
async fn job_translate(
    state: State<'_, DesktopState>,
    opts: TranslateOptions,
) -> Result<TerminalResult, ErrorPayload> {
    finish_job(&state, "CMD.job_translate", opts.into_request()).await
}

#[tauri::command]
async fn job_single_tts(
    state: State<'_, DesktopState>,
    opts: SingleTtsOptions,
) -> Result<TerminalResult, ErrorPayload> {
    finish_job(&state, "CMD.job_single_tts", opts.into_request()).await
}

#[tauri::command]
async fn job_batch_tts(
    state: State<'_, DesktopState>,
    opts: BatchTtsOptions,
) -> Result<TerminalResult, ErrorPayload> {
    finish_job(&state, "CMD.job_batch_tts", opts.into_request()).await
}

#[tauri::command]
async fn job_align(state: State<'_, DesktopState>, opts: AlignOptions) -> Result<TerminalResult, ErrorPayload> {
    finish_job(&state, "CMD.job_align", opts.into_request()).await
}

#[tauri::command]
async fn job_merge_video(
    state: State<'_, DesktopState>,
    opts: MergeVideoOptions,
) -> Result<TerminalResult, ErrorPayload> {
    finish_job(&state, "CMD.job_merge_video", opts.into_request()).await
}

#[tauri::command]
async fn job_dub_video(
    state: State<'_, DesktopState>,
    opts: DubVideoOptions,
) -> Result<TerminalResult, ErrorPayload> {
    finish_job(&state, "CMD.job_dub_video", opts.into_request()).await
}

#[tauri::command]
async fn job_analyze_video(
    state: State<'_, DesktopState>,
    input: PathBuf,
) -> Result<TerminalResult, ErrorPayload> {
    finish_job(&state, "CMD.job_analyze_video", crate::job::analyze_video(&input)).await
}

#[tauri::command]
async fn job_transcode_video(
    state: State<'_, DesktopState>,
    input: PathBuf,
    output: PathBuf,
) -> Result<TerminalResult, ErrorPayload> {
    let req = crate::job::transcode_video(&input, &output);
    finish_job(&state, "CMD.job_transcode_video", req).await
}

#[tauri::command]
async fn job_check_audio_files(
    state: State<'_, DesktopState>,
    paths: Vec<PathBuf>,
) -> Result<TerminalResult, ErrorPayload> {
    let req = crate::job::check_audio_files(&paths);
    finish_job(&state, "CMD.job_check_audio_files", req).await
}

#[tauri::command]
fn job_kill(state: State<'_, DesktopState>) -> bool {
    let span = cmd_span(&state, "CMD.job_kill", None);
    let ok = state.gateway.kill();
    span.ok(Some(serde_json::json!({"delivered": ok})));
    ok
}

#[tauri::command]
fn job_active(state: State<'_, DesktopState>) -> Option<ActiveJob> {
    state.gateway.active()
}

#[tauri::command]
async fn deps_check(state: State<'_, DesktopState>) -> Result<DependencyReport, ErrorPayload> {
    state
        .gateway
        .check_dependencies()
        .await
        .map_err(|e: JobError| e.to_payload())
}

#[tauri::command]
async fn deps_repair(state: State<'_, DesktopState>) -> Result<RepairOutcome, ErrorPayload> {
    state
        .gateway
        .repair_dependencies()
        .await
        .map_err(|e: JobError| e.to_payload())
}

#[tauri::command]
async fn cache_input(state: State<'_, DesktopState>, path: PathBuf) -> Result<CacheEntry, ErrorPayload> {
    let span = cmd_span(&state, "CMD.cache_input", None);
    match state.gateway.cache_input(&path).await {
        Ok(entry) => {
            span.ok(Some(serde_json::json!({"hit": entry.hit})));
            Ok(entry)
        }
        Err(e) => {
            span.err("Cmd", "E_CACHE_IO", &e.to_string(), None);
            Err(e.to_payload())
        }
    }
}

#[tauri::command]
fn runtime_resolve(state: State<'_, DesktopState>) -> Result<ResolvedRuntime, ErrorPayload> {
    state.gateway.resolve_runtime().map_err(|e| e.to_payload())
}

#[tauri::command]
fn open_debug_log(app: AppHandle, state: State<'_, DesktopState>) -> Result<(), String> {
    let path = state.gateway.debug_log_path();
    if !path.exists() {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| e.to_string())?;
        }
        std::fs::write(&path, b"").map_err(|e| e.to_string())?;
    }
    app.opener()
        .open_path(path.display().to_string(), None::<&str>)
        .map_err(|e| e.to_string())
}

#[tauri::command]
fn get_settings(state: State<'_, DesktopState>) -> Settings {
    settings::load_settings_or_recover(&state.config.data_dir)
}

#[tauri::command]
fn update_settings(state: State<'_, DesktopState>, patch: SettingsPatch) -> Result<Settings, String> {
    let span = cmd_span(&state, "CMD.update_settings", None);
    let cur = settings::load_settings_or_recover(&state.config.data_dir);
    let next = settings::apply_patch(cur, patch);
    if let Err(e) = settings::save_settings(&state.config.data_dir, &next) {
        span.err_anyhow("settings", "E_SETTINGS_SAVE", &e, None);
        return Err(e.to_string());
    }
    span.ok(None);
    Ok(next)
}
