use super::{GenerationParams, LLMBackend};
use crate::error::{FiletalkError, Result};

use candle_core::quantized::gguf_file;
use candle_core::{Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::quantized_qwen3::ModelWeights as Qwen3;
use hf_hub::api::sync::Api;
use std::path::Path;
use tokenizers::Tokenizer;
use tracing::{debug, info};

const CONTEXT_LIMIT: usize = 32000;
const EOS_TOKENS: [&str; 2] = ["<|endoftext|>", "<|im_end|>"];

/// 로컬 GGUF Qwen3 모델을 candle로 돌리는 백엔드
pub struct CandleQwen {
    model: Qwen3,
    tokenizer: Tokenizer,
    device: Device,
    eos_ids: Vec<u32>,
    seed: u64,
}

impl CandleQwen {
    /// HF Hub에서 모델과 토크나이저를 받아서 로드
    pub fn from_hub(repo: &str, model_file: &str, tokenizer_repo: &str, seed: u64) -> Result<Self> {
        let api = Api::new()?;

        let tokenizer_path = api
            .model(tokenizer_repo.to_string())
            .get("tokenizer.json")?;
        let model_path = api.model(repo.to_string()).get(model_file)?;

        Self::from_files(&model_path, &tokenizer_path, seed)
    }

    /// 이미 받아 둔 GGUF 파일과 tokenizer.json으로 로드
    pub fn from_files(model_path: &Path, tokenizer_path: &Path, seed: u64) -> Result<Self> {
        let device = Device::cuda_if_available(0)?;
        info!(model = %model_path.display(), ?device, "loading GGUF model");

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| FiletalkError::Tokenizer(e.to_string()))?;

        let mut file = std::fs::File::open(model_path)?;
        let content = gguf_file::Content::read(&mut file)?;
        let model = Qwen3::from_gguf(content, &mut file, &device)?;

        let eos_ids = EOS_TOKENS
            .iter()
            .filter_map(|t| tokenizer.token_to_id(t))
            .collect();

        Ok(Self {
            model,
            tokenizer,
            device,
            eos_ids,
            seed,
        })
    }

    fn decode(&self, tokens: &[u32]) -> Result<String> {
        self.tokenizer
            .decode(tokens, true)
            .map_err(|e| FiletalkError::Tokenizer(e.to_string()))
    }
}

impl LLMBackend for CandleQwen {
    fn generate(&mut self, prompt: &str, params: &GenerationParams) -> Result<String> {
        self.model.clear_kv_cache();

        let tokens = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| FiletalkError::Tokenizer(e.to_string()))?;
        let tokens = tokens.get_ids().to_vec();

        if tokens.len() > CONTEXT_LIMIT {
            return Err(FiletalkError::ContextLimitExceeded {
                limit: CONTEXT_LIMIT,
                current: tokens.len(),
            });
        }

        // temperature 0 이하면 greedy
        let temperature = (params.temperature > 0.0).then_some(params.temperature);
        let mut logits_processor = LogitsProcessor::new(self.seed, temperature, Some(0.95));

        let mut generated: Vec<u32> = Vec::new();
        let mut input = Tensor::new(tokens.as_slice(), &self.device)?.unsqueeze(0)?;
        let mut pos = 0;

        for _ in 0..params.max_tokens {
            if params.cancel.is_cancelled() {
                debug!(generated = generated.len(), "generation cancelled");
                return Err(FiletalkError::Cancelled);
            }

            let logits = self.model.forward(&input, pos)?;
            let logits = logits.squeeze(0)?;
            let next_token = logits_processor.sample(&logits)?;

            if self.eos_ids.contains(&next_token) {
                break;
            }
            generated.push(next_token);

            // stop 시퀀스가 나오면 더 돌릴 필요 없음
            if !params.stop.is_empty() {
                let text = self.decode(&generated)?;
                if params.stop.iter().any(|s| !s.is_empty() && text.contains(s.as_str())) {
                    return Ok(params.apply_stop(&text));
                }
            }

            let (_b, seq_len) = input.dims2()?;
            pos += seq_len;
            input = Tensor::new(&[next_token], &self.device)?.unsqueeze(0)?;
        }

        let text = self.decode(&generated)?;
        debug!(tokens = generated.len(), "generation finished");
        Ok(params.apply_stop(&text))
    }
}
