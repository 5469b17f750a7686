use thiserror::Error;

/// Filetalk crate-specific Result type alias
pub type Result<T> = std::result::Result<T, FiletalkError>;

#[derive(Error, Debug)]
pub enum FiletalkError {
    #[error("Candle operation error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // 로컬 경로를 지정하면 허브를 쓰지 않음
    #[error("HF Hub API error: {0}")]
    HfHub(#[from] hf_hub::api::sync::ApiError),

    #[error("Tokenization error: {0}")]
    Tokenizer(String),

    #[error("Context length exceeded: limit {limit}, current {current}")]
    ContextLimitExceeded { limit: usize, current: usize },

    #[error("Model call timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Model call was cancelled")]
    Cancelled,

    #[error("Model backend error: {0}")]
    Backend(String),

    #[error("Path '{path}' resolves outside the sandbox root")]
    SandboxEscape { path: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Another request is still in progress")]
    Busy,

    #[error("No interpreted command is waiting; interpret a request first")]
    NoPendingCommand,

    #[error("Empty request")]
    EmptyUtterance,
}
