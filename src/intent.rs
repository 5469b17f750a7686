//! Turns a free-form request into a candidate command by asking the model.
//!
//! The model is untrusted. Its completion is scrubbed and parsed; a malformed
//! answer earns exactly one corrective retry, and if that fails too the fixed
//! fallback candidate is used. Nothing in here returns an error to the caller.

use crate::command::ToolKind;
use crate::error::{FiletalkError, Result};
use crate::models::{GenerationParams, LLMBackend};
use regex::Regex;
use serde_json::{Map, Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Completion attempts per request: the first try plus one corrective retry.
pub const MAX_ATTEMPTS: usize = 2;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const SYSTEM_TEMPLATE: &str = r#"너는 Filetalk 파일관리 도우미다.
사용자 요청을 읽고 JSON 객체 딱 1개만 출력한다.

형식:
{"tool": "<{tool_names}>", "arguments": { ... }}

규칙:
- tool은 위 5개 이름 중 하나만 쓴다. 다른 이름은 금지.
- 경로를 쓰지 말고 파일명/폴더명만 쓴다.
- 설명, 말줄임표(...), 코드블록(```) 없이 JSON만 출력한다.
- "찾아줘", "어디", "검색", "목록", "확장자" → search_files
- "요약" → summarize_file
- "폴더" → create_folder
- "파일 만들어", "txt", "생성" → create_file
- "옮겨", "이동", "보내" → move_file

arguments:
- create_folder: {"name": "폴더이름"}
- create_file: {"path": "파일이름", "content": "내용"}
- move_file: {"file": "파일이름", "folder": "폴더이름"}
- search_files: {"keywords": ["단어"], "ext": [".txt"], "top_k": 100}
- summarize_file: {"path": "파일이름"}

예시)
사용자: down 폴더 만들어줘
{"tool": "create_folder", "arguments": {"name": "down"}}
/no_think"#;

const RETRY_INSTRUCTION: &str = "방금 답은 JSON이 아니었다. 설명 없이 JSON 형식으로만 다시 답해.";

const STOP_SEQUENCES: [&str; 2] = ["<|im_end|>", "사용자:"];

/// Raw, unvalidated structure extracted from a completion.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate(Value);

impl Candidate {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Used when the model never produced anything parseable.
    pub fn fallback() -> Self {
        Self(json!({
            "tool": "create_file",
            "arguments": {"path": "new.txt", "content": ""}
        }))
    }

    pub fn tool(&self) -> Option<&str> {
        self.0.get("tool").and_then(Value::as_str)
    }

    pub fn arguments(&self) -> Option<&Map<String, Value>> {
        self.0.get("arguments").and_then(Value::as_object)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ParseOutcome {
    Parsed(Candidate),
    Malformed,
}

/// What the resolver settled on, and how it got there.
#[derive(Clone, Debug)]
pub struct Resolution {
    pub candidate: Candidate,
    /// Completion requests actually issued.
    pub attempts: usize,
    pub fell_back: bool,
    /// The caller's token fired; `candidate` must not be acted on.
    pub cancelled: bool,
}

#[derive(Clone, Copy)]
enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

pub struct IntentResolver {
    model: Arc<Mutex<Box<dyn LLMBackend>>>,
    timeout: Duration,
}

impl IntentResolver {
    pub fn new(model: Box<dyn LLMBackend>) -> Self {
        Self {
            model: Arc::new(Mutex::new(model)),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn system_prompt() -> String {
        let names = ToolKind::ALL
            .iter()
            .map(ToolKind::as_str)
            .collect::<Vec<_>>()
            .join("|");
        SYSTEM_TEMPLATE.replace("{tool_names}", &names)
    }

    /// Resolves `utterance` into a candidate. Always returns one; if `cancel`
    /// fires the resolution is marked `cancelled` rather than `fell_back`.
    pub async fn resolve(&self, utterance: &str, cancel: &CancellationToken) -> Resolution {
        let mut turns: Vec<(Role, String)> = vec![
            (Role::System, Self::system_prompt()),
            (Role::User, utterance.to_string()),
        ];
        let mut attempts = 0;

        while attempts < MAX_ATTEMPTS && !cancel.is_cancelled() {
            attempts += 1;
            let prompt = render_chatml(&turns);
            debug!(attempt = attempts, %prompt, "requesting completion");

            match self.complete(prompt, cancel).await {
                Ok(text) => match parse_completion(&text) {
                    ParseOutcome::Parsed(candidate) => {
                        info!(attempt = attempts, tool = ?candidate.tool(), "model produced a candidate");
                        debug!(candidate = %candidate.as_value(), "parsed completion");
                        return Resolution {
                            candidate,
                            attempts,
                            fell_back: false,
                            cancelled: false,
                        };
                    }
                    ParseOutcome::Malformed => {
                        warn!(attempt = attempts, completion = %text, "completion is not a command object");
                        turns.push((Role::Assistant, text));
                    }
                },
                Err(FiletalkError::Cancelled) => {
                    warn!(attempt = attempts, "model call cancelled");
                    break;
                }
                Err(e) => {
                    warn!(attempt = attempts, error = %e, "model call failed");
                }
            }
            turns.push((Role::User, RETRY_INSTRUCTION.to_string()));
        }

        let cancelled = cancel.is_cancelled();
        if !cancelled {
            warn!(attempts, "falling back to the default command");
        }
        Resolution {
            candidate: Candidate::fallback(),
            attempts,
            fell_back: !cancelled,
            cancelled,
        }
    }

    /// One completion on the blocking pool, bounded by the timeout and the
    /// caller's cancellation token.
    async fn complete(&self, prompt: String, cancel: &CancellationToken) -> Result<String> {
        let call_token = cancel.child_token();
        let params = GenerationParams {
            max_tokens: 256,
            temperature: 0.1,
            stop: STOP_SEQUENCES.iter().map(|s| s.to_string()).collect(),
            cancel: call_token.clone(),
        };

        let model = Arc::clone(&self.model);
        let handle = tokio::task::spawn_blocking(move || {
            let mut backend = model
                .lock()
                .map_err(|_| FiletalkError::Backend("model lock poisoned".to_string()))?;
            backend.generate(&prompt, &params)
        });

        tokio::select! {
            joined = timeout(self.timeout, handle) => match joined {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => Err(FiletalkError::Backend(e.to_string())),
                Err(_) => {
                    // 백엔드가 다음 토큰에서 멈추도록
                    call_token.cancel();
                    Err(FiletalkError::Timeout {
                        secs: self.timeout.as_secs(),
                    })
                }
            },
            _ = cancel.cancelled() => {
                call_token.cancel();
                Err(FiletalkError::Cancelled)
            }
        }
    }
}

fn render_chatml(turns: &[(Role, String)]) -> String {
    let mut prompt = String::new();
    for (role, content) in turns {
        prompt.push_str(&format!(
            "<|im_start|>{}\n{}<|im_end|>\n",
            role.as_str(),
            content
        ));
    }
    prompt.push_str("<|im_start|>assistant\n");
    prompt
}

/// Extracts a command object from a raw completion.
///
/// Reasoning blocks and code fences are removed first. The remainder is tried
/// as strict JSON, then as JSON5, then scanned for the first balanced `{...}`
/// that parses. Only objects carrying `tool` or `arguments` count.
pub fn parse_completion(text: &str) -> ParseOutcome {
    let mut cleaned = text.to_string();
    if let Ok(re) = Regex::new(r"(?s)<think>.*?</think>") {
        cleaned = re.replace_all(&cleaned, "").into_owned();
    }
    if let Ok(re) = Regex::new(r"```[A-Za-z0-9_+-]*") {
        cleaned = re.replace_all(&cleaned, "").into_owned();
    }
    let cleaned = cleaned.trim();

    if let Some(value) = parse_object(cleaned) {
        return ParseOutcome::Parsed(Candidate::new(value));
    }

    for block in balanced_objects(cleaned) {
        if let Some(value) = parse_object(block) {
            return ParseOutcome::Parsed(Candidate::new(value));
        }
    }

    ParseOutcome::Malformed
}

fn parse_object(text: &str) -> Option<Value> {
    let value = serde_json::from_str::<Value>(text)
        .ok()
        .or_else(|| json5::from_str::<Value>(text).ok())?;
    let obj = value.as_object()?;
    if obj.contains_key("tool") || obj.contains_key("arguments") {
        Some(value)
    } else {
        None
    }
}

/// Every balanced `{...}` span, in order of its opening brace.
/// Braces inside string literals are ignored.
fn balanced_objects(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();

    for start in 0..bytes.len() {
        if bytes[start] != b'{' {
            continue;
        }
        let mut depth = 0usize;
        let mut quote: Option<u8> = None;
        let mut escaped = false;

        for (offset, &b) in bytes[start..].iter().enumerate() {
            if let Some(q) = quote {
                if escaped {
                    escaped = false;
                } else if b == b'\\' {
                    escaped = true;
                } else if b == q {
                    quote = None;
                }
                continue;
            }
            match b {
                b'"' | b'\'' => quote = Some(b),
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        spans.push(&text[start..=start + offset]);
                        break;
                    }
                }
                _ => {}
            }
        }
    }

    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parsed(text: &str) -> Value {
        match parse_completion(text) {
            ParseOutcome::Parsed(c) => c.as_value().clone(),
            ParseOutcome::Malformed => panic!("expected a candidate from {text:?}"),
        }
    }

    #[test]
    fn plain_json_is_returned_unchanged() {
        let text = r#"{"tool": "create_folder", "arguments": {"name": "down"}}"#;
        assert_eq!(
            parsed(text),
            json!({"tool": "create_folder", "arguments": {"name": "down"}})
        );
    }

    #[test]
    fn code_fences_and_think_blocks_are_stripped() {
        let text = "<think>\n폴더를 만들자\n</think>\n```json\n{\"tool\": \"create_folder\", \"arguments\": {\"name\": \"down\"}}\n```";
        assert_eq!(parsed(text)["arguments"]["name"], "down");
    }

    #[test]
    fn lenient_json5_is_accepted() {
        let text = "{tool: 'move_file', arguments: {file: 'a.txt', folder: 'down',},}";
        assert_eq!(parsed(text)["tool"], "move_file");
    }

    #[test]
    fn object_embedded_in_prose_is_found() {
        let text = "알겠습니다. {\"tool\": \"search_files\", \"arguments\": {\"keywords\": [\"}\"]}} 입니다";
        assert_eq!(parsed(text)["tool"], "search_files");
    }

    #[test]
    fn unknown_tool_names_still_parse() {
        // 검증은 normalizer 몫
        assert_eq!(parsed(r#"{"tool": "delete_everything"}"#)["tool"], "delete_everything");
    }

    #[test]
    fn prose_and_unrelated_objects_are_malformed() {
        assert_eq!(parse_completion("폴더를 만들었습니다..."), ParseOutcome::Malformed);
        assert_eq!(parse_completion("[1, 2, 3]"), ParseOutcome::Malformed);
        assert_eq!(parse_completion(r#"{"name": "down"}"#), ParseOutcome::Malformed);
        assert_eq!(parse_completion(""), ParseOutcome::Malformed);
    }

    #[test]
    fn system_prompt_lists_every_tool() {
        let prompt = IntentResolver::system_prompt();
        for kind in ToolKind::ALL {
            assert!(prompt.contains(kind.as_str()));
        }
        assert!(!prompt.contains("{tool_names}"));
    }

    #[test]
    fn fallback_candidate_is_fixed() {
        assert_eq!(
            Candidate::fallback().as_value(),
            &json!({"tool": "create_file", "arguments": {"path": "new.txt", "content": ""}})
        );
    }

    #[test]
    fn chatml_ends_with_open_assistant_turn() {
        let prompt = render_chatml(&[(Role::User, "hi".to_string())]);
        assert_eq!(prompt, "<|im_start|>user\nhi<|im_end|>\n<|im_start|>assistant\n");
    }
}
