use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Asr,
    TranslateText,
    TestTts,
    SingleTts,
    BatchTts,
    Align,
    MergeVideo,
    AnalyzeVideo,
    TranscodeVideo,
    DubVideo,
    CheckAudioFiles,
}

impl Action {
    pub const ALL: [Action; 11] = [
        Action::Asr,
        Action::TranslateText,
        Action::TestTts,
        Action::SingleTts,
        Action::BatchTts,
        Action::Align,
        Action::MergeVideo,
        Action::AnalyzeVideo,
        Action::TranscodeVideo,
        Action::DubVideo,
        Action::CheckAudioFiles,
    ];

    pub fn worker_name(self) -> &'static str {
        match self {
            Action::Asr => "test_asr",
            Action::TranslateText => "translate_text",
            Action::TestTts => "test_tts",
            Action::SingleTts => "generate_single_tts",
            Action::BatchTts => "generate_batch_tts",
            Action::Align => "test_align",
            Action::MergeVideo => "merge_video",
            Action::AnalyzeVideo => "analyze_video",
            Action::TranscodeVideo => "transcode_video",
            Action::DubVideo => "dub_video",
            Action::CheckAudioFiles => "check_audio_files",
        }
    }

    pub fn from_worker_name(name: &str) -> Option<Action> {
        Action::ALL.into_iter().find(|a| a.worker_name() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    action: Action,
    args: Vec<String>,
}

impl JobRequest {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            args: vec!["--action".to_string(), action.worker_name().to_string()],
        }
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn flag(mut self, name: &str, value: impl Display) -> Self {
        self.args.push(format!("--{name}"));
        self.args.push(value.to_string());
        self
    }

    pub fn opt_flag<T: Display>(self, name: &str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.flag(name, v),
            None => self,
        }
    }

    pub fn path_flag(self, name: &str, path: &Path) -> Self {
        self.flag(name, path.display())
    }

    pub fn opt_path_flag(self, name: &str, path: Option<&Path>) -> Self {
        self.opt_flag(name, path.map(|p| p.display()))
    }

    pub fn raw_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AsrOptions {
    pub input: PathBuf,
    pub service: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub vad_onset: Option<f64>,
    pub vad_offset: Option<f64>,
}

impl AsrOptions {
    pub fn into_request(self) -> JobRequest {
        JobRequest::new(Action::Asr)
            .path_flag("input", &self.input)
            .opt_flag("asr", self.service)
            .opt_path_flag("output_dir", self.output_dir.as_deref())
            .opt_flag("vad_onset", self.vad_onset)
            .opt_flag("vad_offset", self.vad_offset)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslateOptions {
    pub input: String,
    pub lang: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

impl TranslateOptions {
    pub fn into_request(self) -> JobRequest {
        let req = JobRequest::new(Action::TranslateText)
            .flag("input", &self.input)
            .flag("lang", &self.lang);
        match self.api_key.filter(|k| !k.trim().is_empty()) {
            Some(key) => req
                .flag("api_key", key)
                .opt_flag("base_url", self.base_url)
                .opt_flag("model", self.model),
            None => req,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TtsParams {
    pub tts_service: Option<String>,
    pub lang: Option<String>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub top_k: Option<i64>,
    pub repetition_penalty: Option<f64>,
    pub cfg_scale: Option<f64>,
    pub num_beams: Option<i64>,
    pub length_penalty: Option<f64>,
    pub max_new_tokens: Option<i64>,
    pub qwen_mode: Option<String>,
    pub voice_instruct: Option<String>,
    pub preset_voice: Option<String>,
    pub qwen_model_size: Option<String>,
    pub qwen_ref_text: Option<String>,
}

impl TtsParams {
    fn apply(self, req: JobRequest) -> JobRequest {
        req.opt_flag("tts_service", self.tts_service)
            .opt_flag("lang", self.lang)
            .opt_flag("temperature", self.temperature)
            .opt_flag("top_p", self.top_p)
            .opt_flag("top_k", self.top_k)
            .opt_flag("repetition_penalty", self.repetition_penalty)
            .opt_flag("cfg_scale", self.cfg_scale)
            .opt_flag("num_beams", self.num_beams)
            .opt_flag("length_penalty", self.length_penalty)
            .opt_flag("max_new_tokens", self.max_new_tokens)
            .opt_flag("qwen_mode", self.qwen_mode)
            .opt_flag("voice_instruct", self.voice_instruct)
            .opt_flag("preset_voice", self.preset_voice)
            .opt_flag("qwen_model_size", self.qwen_model_size)
            .opt_flag("qwen_ref_text", self.qwen_ref_text)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SingleTtsOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub text: String,
    pub start: Option<f64>,
    pub duration: Option<f64>,
    pub ref_audio: Option<PathBuf>,
    #[serde(flatten)]
    pub tts: TtsParams,
}

impl SingleTtsOptions {
    pub fn into_request(self) -> JobRequest {
        let req = JobRequest::new(Action::SingleTts)
            .path_flag("input", &self.input)
            .path_flag("output", &self.output)
            .flag("text", &self.text)
            .opt_flag("start", self.start)
            .opt_flag("duration", self.duration)
            .opt_path_flag("ref_audio", self.ref_audio.as_deref());
        self.tts.apply(req)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchTtsOptions {
    pub input: PathBuf,
    pub segments_json: PathBuf,
    pub batch_size: Option<i64>,
    #[serde(flatten)]
    pub tts: TtsParams,
}

impl BatchTtsOptions {
    pub fn into_request(self) -> JobRequest {
        let req = JobRequest::new(Action::BatchTts)
            .path_flag("input", &self.input)
            .path_flag("ref", &self.segments_json)
            .opt_flag("batch_size", self.batch_size);
        self.tts.apply(req)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AlignOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub duration: f64,
}

impl AlignOptions {
    pub fn into_request(self) -> JobRequest {
        JobRequest::new(Action::Align)
            .path_flag("input", &self.input)
            .path_flag("output", &self.output)
            .flag("duration", self.duration)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MergeVideoOptions {
    pub input: PathBuf,
    pub segments_json: PathBuf,
    pub output: PathBuf,
    pub strategy: Option<String>,
}

impl MergeVideoOptions {
    pub fn into_request(self) -> JobRequest {
        JobRequest::new(Action::MergeVideo)
            .path_flag("input", &self.input)
            .path_flag("ref", &self.segments_json)
            .path_flag("output", &self.output)
            .opt_flag("strategy", self.strategy)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DubVideoOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub lang: Option<String>,
    pub asr_service: Option<String>,
    pub strategy: Option<String>,
    #[serde(flatten)]
    pub tts: TtsParams,
}

impl DubVideoOptions {
    pub fn into_request(self) -> JobRequest {
        let mut tts = self.tts;
        if tts.lang.is_none() {
            tts.lang = self.lang;
        }
        let req = JobRequest::new(Action::DubVideo)
            .path_flag("input", &self.input)
            .path_flag("output", &self.output)
            .opt_flag("asr", self.asr_service)
            .opt_flag("strategy", self.strategy);
        tts.apply(req)
    }
}

pub fn analyze_video(input: &Path) -> JobRequest {
    JobRequest::new(Action::AnalyzeVideo).path_flag("input", input)
}

pub fn transcode_video(input: &Path, output: &Path) -> JobRequest {
    JobRequest::new(Action::TranscodeVideo)
        .path_flag("input", input)
        .path_flag("output", output)
}

pub fn check_audio_files(paths: &[PathBuf]) -> JobRequest {
    let list: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    let json = serde_json::to_string(&list).unwrap_or_else(|_| "[]".to_string());
    JobRequest::new(Action::CheckAudioFiles).flag("input", json)
}
