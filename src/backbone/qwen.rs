use anyhow::{Context, Result};
use candle::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::qwen2::{Config as Qwen2Config, ModelForCausalLM};
use tokenizers::Tokenizer;

use super::prompt::{self, PromptVocab, SPEECH_GENERATION_END};
use super::sampling::TopKSampler;
use super::{generate_tokens, CausalLm, GenerationLimits, SpeechBackbone};
use crate::codec::ReferenceCodes;
use crate::config::{BackboneConfig, DeviceSpec};
use crate::download::ModelRepo;
use crate::perf::{self, Metric};

/// Map a configured device onto a candle device.
pub fn candle_device(device: DeviceSpec) -> Result<Device> {
    device.ensure_supported()?;
    match device {
        DeviceSpec::Cpu => Ok(Device::Cpu),
        DeviceSpec::Cuda(ordinal) => Ok(Device::new_cuda(ordinal)?),
    }
}

struct Qwen2Lm {
    model: ModelForCausalLM,
    device: Device,
}

impl CausalLm for Qwen2Lm {
    fn forward(&mut self, ids: &[u32], offset: usize) -> Result<Vec<f32>> {
        let input = Tensor::new(ids, &self.device)?.unsqueeze(0)?;
        let logits = self.model.forward(&input, offset)?;
        let logits = logits.squeeze(0)?.squeeze(0)?.to_dtype(DType::F32)?;
        Ok(logits.to_vec1::<f32>()?)
    }

    fn reset(&mut self) {
        self.model.clear_kv_cache();
    }
}

/// VieNeu backbone: a Qwen2 causal LM whose vocabulary includes the
/// `<|speech_N|>` codec tokens.
pub struct QwenBackbone {
    lm: Qwen2Lm,
    tokenizer: Tokenizer,
    sampler: TopKSampler,
    limits: GenerationLimits,
}

impl QwenBackbone {
    /// Fetch `config.json`, `tokenizer.json` and the safetensors weights of the
    /// configured repository and load them on the configured device.
    pub fn from_config(config: &BackboneConfig) -> Result<Self> {
        let device = candle_device(config.device)?;
        let repo = ModelRepo::resolve(&config.repo, &config.revision)?;

        let tokenizer_path = repo.get("tokenizer.json")?;
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("Failed to load tokenizer {}", tokenizer_path.display()))?;

        let config_path = repo.get("config.json")?;
        let model_config: Qwen2Config = serde_json::from_reader(std::fs::File::open(&config_path)?)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        let weights = repo.safetensors()?;
        // SAFETY: the weight files are not modified while mapped.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&weights, config.dtype.to_candle(), &device)?
        };
        let model = ModelForCausalLM::new(&model_config, vb)
            .with_context(|| format!("Failed to load backbone from {}", repo.id()))?;

        let eos = tokenizer.token_id(SPEECH_GENERATION_END)?;
        tracing::info!(
            repo = %repo.id(),
            device = %config.device,
            layers = model_config.num_hidden_layers,
            vocab = model_config.vocab_size,
            "loaded qwen2 backbone"
        );
        Ok(Self {
            lm: Qwen2Lm { model, device },
            tokenizer,
            sampler: TopKSampler::new(&config.sampling),
            limits: GenerationLimits {
                max_context: config.max_context,
                min_new_tokens: config.min_new_tokens,
                eos,
            },
        })
    }
}

impl SpeechBackbone for QwenBackbone {
    fn generate(
        &mut self,
        ref_codes: &ReferenceCodes,
        ref_text: &str,
        text: &str,
        interrupt: &dyn Fn() -> bool,
    ) -> Result<Vec<u32>> {
        let prompt = prompt::build_prompt(&self.tokenizer, ref_codes.as_slice(), ref_text, text)?;
        perf::add_count(Metric::PromptTokens, prompt.len() as u64);
        tracing::debug!(prompt_tokens = prompt.len(), "built backbone prompt");

        let ids = generate_tokens(
            &mut self.lm,
            &prompt,
            &mut self.sampler,
            self.limits,
            interrupt,
        )?;
        let codes = prompt::extract_speech_codes(&self.tokenizer, &ids);
        perf::add_count(Metric::SpeechTokens, codes.len() as u64);
        Ok(codes)
    }
}
