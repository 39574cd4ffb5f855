// Lines are `[PROGRESS] <integer>` or `[PARTIAL] <json>`; anything else is
// ignored. The `__JSON_START__ <json> __JSON_END__` pair is not line bound
// and is only searched for once the process has exited.

use serde::Serialize;
use serde_json::Value;

pub const PROGRESS_TAG: &str = "[PROGRESS]";
pub const PARTIAL_TAG: &str = "[PARTIAL]";
pub const JSON_START: &str = "__JSON_START__";
pub const JSON_END: &str = "__JSON_END__";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ProtocolEvent {
    Progress(i64),
    Partial(Value),
}

// A protocol line that looked like an event but did not decode. Traced by
// the supervisor, never surfaced as an event or an error.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeAnomaly {
    pub tag: &'static str,
    pub line: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct Decoded {
    pub events: Vec<ProtocolEvent>,
    pub anomalies: Vec<DecodeAnomaly>,
}

#[derive(Debug, Default)]
pub struct StreamDecoder {
    line: Vec<u8>,
    full: Vec<u8>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Decoded {
        self.full.extend_from_slice(chunk);
        let mut out = Decoded::default();
        let mut rest = chunk;
        while let Some(pos) = rest.iter().position(|b| *b == b'\n') {
            self.line.extend_from_slice(&rest[..pos]);
            let line = std::mem::take(&mut self.line);
            decode_line(&line, &mut out);
            rest = &rest[pos + 1..];
        }
        self.line.extend_from_slice(rest);
        out
    }

    pub fn finish(&mut self) -> Decoded {
        let mut out = Decoded::default();
        if !self.line.is_empty() {
            let line = std::mem::take(&mut self.line);
            decode_line(&line, &mut out);
        }
        out
    }

    pub fn stdout_bytes(&self) -> &[u8] {
        &self.full
    }

    pub fn into_stdout(self) -> Vec<u8> {
        self.full
    }
}

fn decode_line(raw: &[u8], out: &mut Decoded) {
    let text = String::from_utf8_lossy(raw);
    let line = text.trim_end_matches('\r').trim_start();

    if let Some(rest) = line.strip_prefix(PROGRESS_TAG) {
        match rest.trim().parse::<i64>() {
            Ok(v) => out.events.push(ProtocolEvent::Progress(v)),
            Err(e) => out.anomalies.push(DecodeAnomaly {
                tag: PROGRESS_TAG,
                line: line.to_string(),
                reason: e.to_string(),
            }),
        }
    } else if let Some(rest) = line.strip_prefix(PARTIAL_TAG) {
        match serde_json::from_str::<Value>(rest.trim()) {
            Ok(v) => out.events.push(ProtocolEvent::Partial(v)),
            Err(e) => out.anomalies.push(DecodeAnomaly {
                tag: PARTIAL_TAG,
                line: line.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    MissingStartSentinel,
    MissingEndSentinel,
    InvalidJson,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerminalPayload {
    Structured { value: Value },
    Raw {
        stdout: String,
        reason: FallbackReason,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerminalResult {
    pub success: bool,
    pub payload: TerminalPayload,
    pub stderr: String,
}

impl TerminalResult {
    pub fn is_structured(&self) -> bool {
        matches!(self.payload, TerminalPayload::Structured { .. })
    }

    pub fn value(&self) -> Option<&Value> {
        match &self.payload {
            TerminalPayload::Structured { value } => Some(value),
            TerminalPayload::Raw { .. } => None,
        }
    }
}

pub fn extract_payload(stdout: &str) -> Result<Value, FallbackReason> {
    let start = stdout
        .find(JSON_START)
        .ok_or(FallbackReason::MissingStartSentinel)?
        + JSON_START.len();
    let len = stdout[start..]
        .find(JSON_END)
        .ok_or(FallbackReason::MissingEndSentinel)?;
    serde_json::from_str(stdout[start..start + len].trim()).map_err(|_| FallbackReason::InvalidJson)
}

pub fn decode_terminal(stdout: &[u8], stderr: &[u8]) -> TerminalResult {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr).into_owned();
    match extract_payload(&stdout) {
        Ok(value) => {
            let success = value.get("success").and_then(Value::as_bool) != Some(false);
            TerminalResult {
                success,
                payload: TerminalPayload::Structured { value },
                stderr,
            }
        }
        Err(reason) => TerminalResult {
            success: false,
            payload: TerminalPayload::Raw {
                stdout: stdout.into_owned(),
                reason,
            },
            stderr,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const STREAM: &str = "loading model…\n\
        [PROGRESS] 10\n\
        [PARTIAL] {\"index\":0,\"text\":\"héllo 世界\"}\r\n\
        [PROGRESS] 55\n\
        [PARTIAL] {\"index\":1,\"text\":\"ok\"}\n\
        \n__JSON_START__\n{\"segments\":[{\"text\":\"é\\n世\"}],\"note\":\"a\\nb\"}\n__JSON_END__\n";

    fn decode_in_chunks(bytes: &[u8], cuts: &[usize]) -> (Vec<ProtocolEvent>, TerminalResult) {
        let mut dec = StreamDecoder::new();
        let mut events = Vec::new();
        let mut prev = 0;
        for &cut in cuts.iter().chain(std::iter::once(&bytes.len())) {
            events.extend(dec.feed(&bytes[prev..cut]).events);
            prev = cut;
        }
        events.extend(dec.finish().events);
        let terminal = decode_terminal(dec.stdout_bytes(), b"");
        (events, terminal)
    }

    #[test]
    fn example_scenario_progress_then_payload() {
        let raw = b"[PROGRESS] 10\n[PROGRESS] 55\n__JSON_START__{\"ok\":true}__JSON_END__\n";
        let (events, terminal) = decode_in_chunks(raw, &[]);
        assert_eq!(
            events,
            vec![ProtocolEvent::Progress(10), ProtocolEvent::Progress(55)]
        );
        assert_eq!(terminal.value(), Some(&json!({"ok": true})));
        assert!(terminal.success);
    }

    #[test]
    fn any_single_split_point_gives_same_result() {
        let bytes = STREAM.as_bytes();
        let whole = decode_in_chunks(bytes, &[]);
        assert_eq!(whole.0.len(), 4);
        assert!(whole.1.is_structured());
        for cut in 0..=bytes.len() {
            assert_eq!(decode_in_chunks(bytes, &[cut]), whole, "cut at {cut}");
        }
    }

    #[test]
    fn byte_at_a_time_gives_same_result() {
        let bytes = STREAM.as_bytes();
        let cuts: Vec<usize> = (1..bytes.len()).collect();
        assert_eq!(decode_in_chunks(bytes, &cuts), decode_in_chunks(bytes, &[]));
    }

    #[test]
    fn malformed_partial_between_valid_ones_is_skipped() {
        let mut dec = StreamDecoder::new();
        let d = dec.feed(b"[PARTIAL] {\"a\":1}\n[PARTIAL] {oops\n[PARTIAL] {\"b\":2}\n");
        assert_eq!(
            d.events,
            vec![
                ProtocolEvent::Partial(json!({"a": 1})),
                ProtocolEvent::Partial(json!({"b": 2})),
            ]
        );
        assert_eq!(d.anomalies.len(), 1);
        assert_eq!(d.anomalies[0].tag, PARTIAL_TAG);
        assert_eq!(d.anomalies[0].line, "[PARTIAL] {oops");
    }

    #[test]
    fn progress_is_not_clamped_and_garbage_is_an_anomaly() {
        let mut dec = StreamDecoder::new();
        let d = dec.feed(b"[PROGRESS] 150\n[PROGRESS] -3\n[PROGRESS] half\n");
        assert_eq!(
            d.events,
            vec![ProtocolEvent::Progress(150), ProtocolEvent::Progress(-3)]
        );
        assert_eq!(d.anomalies.len(), 1);
    }

    #[test]
    fn unterminated_last_line_is_flushed_on_finish() {
        let mut dec = StreamDecoder::new();
        assert!(dec.feed(b"[PROGRESS] 99").events.is_empty());
        assert_eq!(dec.finish().events, vec![ProtocolEvent::Progress(99)]);
        assert!(dec.finish().events.is_empty());
    }

    #[test]
    fn sentinel_payload_survives_surrounding_noise() {
        for v in [
            json!(null),
            json!([1, "two", {"three": 3.5}]),
            json!({"text": "nested __JSON_START__ marker", "n": -1}),
            json!({"multi": "line\nvalue", "unicode": "日本語"}),
        ] {
            let s = serde_json::to_string(&v).expect("serialize");
            if s.contains(JSON_END) {
                continue;
            }
            let raw = format!("noise [PROGRESS] 1\n{JSON_START}{s}{JSON_END}\ntrailer");
            assert_eq!(extract_payload(&raw), Ok(v));
        }
    }

    #[test]
    fn missing_sentinels_fall_back_to_flagged_raw_output() {
        let t = decode_terminal(b"just text\n", b"warn");
        assert!(!t.is_structured());
        assert!(!t.success);
        assert_eq!(t.stderr, "warn");
        match t.payload {
            TerminalPayload::Raw { stdout, reason } => {
                assert_eq!(stdout, "just text\n");
                assert_eq!(reason, FallbackReason::MissingStartSentinel);
            }
            other => panic!("unexpected payload: {other:?}"),
        }

        let t = decode_terminal(b"__JSON_START__{\"a\":1}", b"");
        assert!(matches!(
            t.payload,
            TerminalPayload::Raw { reason: FallbackReason::MissingEndSentinel, .. }
        ));

        let t = decode_terminal(b"__JSON_START__{bad}__JSON_END__", b"");
        assert!(matches!(
            t.payload,
            TerminalPayload::Raw { reason: FallbackReason::InvalidJson, .. }
        ));
    }

    #[test]
    fn worker_reported_failure_is_structured_but_not_success() {
        let t = decode_terminal(
            b"__JSON_START__{\"success\":false,\"error\":\"no audio\"}__JSON_END__",
            b"",
        );
        assert!(t.is_structured());
        assert!(!t.success);
    }
}
