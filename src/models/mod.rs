use crate::error::Result;
use tokio_util::sync::CancellationToken;

pub mod qwen3;

/// Sampling knobs passed along with every completion request.
#[derive(Clone, Debug)]
pub struct GenerationParams {
    pub max_tokens: usize,
    pub temperature: f64,
    /// 생성된 텍스트에 이 문자열이 나타나면 그 앞에서 잘라냄
    pub stop: Vec<String>,
    /// 백엔드는 토큰마다 이 토큰을 확인하고 취소되면 즉시 중단해야 함
    pub cancel: CancellationToken,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 256,
            temperature: 0.1,
            stop: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }
}

impl GenerationParams {
    /// Cuts `text` at the earliest stop sequence, if any occurs.
    pub fn apply_stop(&self, text: &str) -> String {
        let cut = self
            .stop
            .iter()
            .filter(|s| !s.is_empty())
            .filter_map(|s| text.find(s.as_str()))
            .min();
        match cut {
            Some(idx) => text[..idx].to_string(),
            None => text.to_string(),
        }
    }
}

/// The core trait that any Model backend must implement.
///
/// The pipeline treats the backend as an untrusted text-completion function:
/// whatever comes back goes through the intent parser before it is trusted.
pub trait LLMBackend: Send {
    /// Generate a completion for the provided prompt string.
    fn generate(&mut self, prompt: &str, params: &GenerationParams) -> Result<String>;
}
