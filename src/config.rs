use crate::error::{FiletalkError, Result};
use crate::intent::DEFAULT_TIMEOUT;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ROOT: &str = "./filetalk_root";
pub const DEFAULT_MODEL_REPO: &str = "unsloth/Qwen3-1.7B-GGUF";
pub const DEFAULT_MODEL_FILE: &str = "Qwen3-1.7B-Q4_K_M.gguf";
pub const DEFAULT_TOKENIZER_REPO: &str = "Qwen/Qwen3-1.7B";

/// Where the model weights come from.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelSource {
    /// 로컬 GGUF + tokenizer.json
    Local { model: PathBuf, tokenizer: PathBuf },
    Hub {
        repo: String,
        file: String,
        tokenizer_repo: String,
    },
}

/// Runtime settings, all taken from `FILETALK_*` environment variables.
#[derive(Clone, Debug)]
pub struct Config {
    pub root: PathBuf,
    pub model: ModelSource,
    pub timeout: Duration,
    pub seed: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let root = PathBuf::from(get("FILETALK_ROOT").unwrap_or_else(|| DEFAULT_ROOT.to_string()));

        let model = match (get("FILETALK_MODEL_PATH"), get("FILETALK_TOKENIZER_PATH")) {
            (Some(model), Some(tokenizer)) => ModelSource::Local {
                model: model.into(),
                tokenizer: tokenizer.into(),
            },
            (Some(_), None) | (None, Some(_)) => {
                return Err(FiletalkError::Config(
                    "FILETALK_MODEL_PATH and FILETALK_TOKENIZER_PATH must be set together"
                        .to_string(),
                ));
            }
            (None, None) => ModelSource::Hub {
                repo: get("FILETALK_MODEL_REPO").unwrap_or_else(|| DEFAULT_MODEL_REPO.to_string()),
                file: get("FILETALK_MODEL_FILE").unwrap_or_else(|| DEFAULT_MODEL_FILE.to_string()),
                tokenizer_repo: get("FILETALK_TOKENIZER_REPO")
                    .unwrap_or_else(|| DEFAULT_TOKENIZER_REPO.to_string()),
            },
        };

        let timeout = match get("FILETALK_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(FiletalkError::Config(format!(
                        "FILETALK_TIMEOUT_SECS must be a positive integer, got '{}'",
                        raw
                    )));
                }
            },
            None => DEFAULT_TIMEOUT,
        };

        let seed = match get("FILETALK_SEED") {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                FiletalkError::Config(format!("FILETALK_SEED must be an integer, got '{}'", raw))
            })?,
            None => rand::random(),
        };

        Ok(Self {
            root,
            model,
            timeout,
            seed,
        })
    }
}
