use anyhow::Result;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::config::SamplingConfig;

/// Seeded temperature + top-k sampler over a logits row.
#[derive(Debug, Clone)]
pub struct TopKSampler {
    rng: ChaCha20Rng,
    temperature: f64,
    top_k: usize,
}

impl TopKSampler {
    pub fn new(config: &SamplingConfig) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(config.seed),
            temperature: config.temperature,
            top_k: config.top_k,
        }
    }

    /// Pick the next token id; `banned` is never returned.
    pub fn sample(&mut self, logits: &[f32], banned: Option<u32>) -> Result<u32> {
        if logits.is_empty() {
            anyhow::bail!("Cannot sample from empty logits");
        }
        let allowed = |idx: usize| banned != Some(idx as u32) && logits[idx].is_finite();

        let mut candidates = (0..logits.len()).filter(|&idx| allowed(idx)).collect::<Vec<_>>();
        if candidates.is_empty() {
            anyhow::bail!("All logits are masked or non-finite");
        }
        // Highest first; ties keep the lower index.
        let order = |a: &usize, b: &usize| logits[*b].total_cmp(&logits[*a]).then(a.cmp(b));
        let keep = match self.top_k {
            _ if self.temperature <= 0.0 => 1,
            0 => candidates.len(),
            k => k.min(candidates.len()),
        };
        if keep < candidates.len() {
            candidates.select_nth_unstable_by(keep - 1, order);
            candidates.truncate(keep);
        }
        candidates.sort_by(order);
        if keep == 1 {
            return Ok(candidates[0] as u32);
        }

        let max = logits[candidates[0]] as f64;
        let weights = candidates
            .iter()
            .map(|&idx| ((logits[idx] as f64 - max) / self.temperature).exp())
            .collect::<Vec<_>>();
        let total: f64 = weights.iter().sum();
        let mut threshold = self.rng.gen::<f64>() * total;
        for (&idx, weight) in candidates.iter().zip(&weights) {
            if threshold < *weight {
                return Ok(idx as u32);
            }
            threshold -= weight;
        }
        Ok(candidates[candidates.len() - 1] as u32)
    }
}
