//! Speech backbone: text plus reference codes in, codec codes out.
//!
//! [`SpeechBackbone`] is the seam the runtime uses. [`QwenBackbone`] runs the
//! VieNeu checkpoint as a Qwen2 causal LM through `candle-transformers`; its
//! decode loop is [`generate_tokens`], written against [`CausalLm`] so it can be
//! exercised without weights.

pub mod prompt;
pub mod qwen;
pub mod sampling;

use anyhow::Result;

use crate::codec::ReferenceCodes;
use crate::perf::{self, Metric};
use sampling::TopKSampler;

pub use qwen::QwenBackbone;

/// Generates codec codes for `text` in the voice of the reference.
pub trait SpeechBackbone {
    /// `ref_text` and `text` must already be normalized. `interrupt` is polled
    /// between generated tokens.
    fn generate(
        &mut self,
        ref_codes: &ReferenceCodes,
        ref_text: &str,
        text: &str,
        interrupt: &dyn Fn() -> bool,
    ) -> Result<Vec<u32>>;
}

/// A causal LM holding its own KV cache.
pub trait CausalLm {
    /// Feed `ids` starting at position `offset`; returns last-position logits.
    fn forward(&mut self, ids: &[u32], offset: usize) -> Result<Vec<f32>>;

    /// Drop the KV cache before a new prompt.
    fn reset(&mut self);
}

/// Limits of one decode loop.
#[derive(Debug, Clone, Copy)]
pub struct GenerationLimits {
    /// Prompt plus generated tokens never exceed this.
    pub max_context: usize,
    /// End-of-speech is masked until this many tokens were produced.
    pub min_new_tokens: usize,
    /// Token id that ends generation.
    pub eos: u32,
}

/// Autoregressive decode of `prompt`; returns the new token ids without the
/// end-of-speech token.
pub fn generate_tokens<M: CausalLm + ?Sized>(
    model: &mut M,
    prompt: &[u32],
    sampler: &mut TopKSampler,
    limits: GenerationLimits,
    interrupt: &dyn Fn() -> bool,
) -> Result<Vec<u32>> {
    if prompt.is_empty() {
        anyhow::bail!("Empty prompt");
    }
    if prompt.len() >= limits.max_context {
        anyhow::bail!(
            "Prompt of {} tokens fills the {}-token context; use a shorter reference or text",
            prompt.len(),
            limits.max_context
        );
    }

    model.reset();
    let mut logits = {
        let _span = perf::span(Metric::BackbonePrefill);
        model.forward(prompt, 0)?
    };
    let mut generated = Vec::new();
    loop {
        if interrupt() {
            anyhow::bail!("Interrupted");
        }
        let banned = (generated.len() < limits.min_new_tokens).then_some(limits.eos);
        let next = {
            let _span = perf::span(Metric::BackboneSample);
            sampler.sample(&logits, banned)?
        };
        if next == limits.eos {
            break;
        }
        generated.push(next);
        let position = prompt.len() + generated.len();
        if position >= limits.max_context {
            tracing::warn!(
                max_context = limits.max_context,
                "context full before end of speech; output may be cut off"
            );
            break;
        }
        let _span = perf::span(Metric::BackboneStep);
        logits = model.forward(&[next], position - 1)?;
    }
    perf::add_count(Metric::GeneratedTokens, generated.len() as u64);
    tracing::debug!(tokens = generated.len(), "generation finished");
    Ok(generated)
}
