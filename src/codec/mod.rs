//! Neural audio codec seam: waveform ↔ discrete speech codes.
//!
//! [`SpeechCodec`] is what the runtime depends on; [`OnnxCodec`] runs exported
//! codec graphs through ONNX Runtime.

pub mod onnx;

use anyhow::{Context, Result};
use safetensors::Dtype;
use std::collections::HashMap;
use std::path::Path;

use crate::audio::io::WavIo;
use crate::audio::resample::AudioResampler;
use crate::perf::{self, Metric};

pub use onnx::OnnxCodec;

/// Name of the tensor holding codes in a reference `.safetensors` file.
pub const CODES_TENSOR: &str = "codes";

/// Encodes reference audio to codes and decodes generated codes to audio.
pub trait SpeechCodec {
    /// Rate of the decoded waveform in Hz.
    fn sample_rate(&self) -> u32;

    /// Rate the encoder expects its mono input at.
    fn encoder_sample_rate(&self) -> u32;

    /// Encode mono samples at [`Self::encoder_sample_rate`].
    fn encode(&mut self, samples: &[f32]) -> Result<ReferenceCodes>;

    /// Decode codes into mono samples at [`Self::sample_rate`].
    fn decode(&mut self, codes: &[u32]) -> Result<Vec<f32>>;
}

/// Codec token ids of a reference voice sample, one per codec frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceCodes {
    codes: Vec<u32>,
}

impl ReferenceCodes {
    pub fn new(codes: Vec<u32>) -> Self {
        Self { codes }
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.codes
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Save as a safetensors file holding one `I64` tensor of shape `[1, 1, T]`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut bytes = Vec::with_capacity(self.codes.len() * 8);
        for code in &self.codes {
            bytes.extend_from_slice(&(*code as i64).to_le_bytes());
        }
        let view =
            safetensors::tensor::TensorView::new(Dtype::I64, vec![1, 1, self.codes.len()], &bytes)?;
        let mut tensors = HashMap::new();
        tensors.insert(CODES_TENSOR.to_string(), view);
        let serialized = safetensors::serialize(&tensors, &None)?;
        std::fs::write(path, serialized)
            .with_context(|| format!("Failed to write reference codes to {}", path.display()))?;
        Ok(())
    }

    /// Load codes saved by [`Self::save`]. Shapes `[T]`, `[1, T]` and
    /// `[1, 1, T]` are accepted, with `I64` or `I32` elements.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read reference codes {}", path.display()))?;
        let tensors = safetensors::SafeTensors::deserialize(&data)?;
        let view = tensors
            .tensor(CODES_TENSOR)
            .map_err(|e| anyhow::anyhow!("No '{CODES_TENSOR}' tensor in {}: {e}", path.display()))?;

        let shape = view.shape();
        if shape.is_empty() || shape.len() > 3 || shape[..shape.len() - 1].iter().any(|&d| d != 1)
        {
            anyhow::bail!("Expected codes of shape [1, 1, T], got {:?}", shape);
        }

        let raw = view.data();
        let values: Vec<i64> = match view.dtype() {
            Dtype::I64 => raw
                .chunks_exact(8)
                .map(|chunk| {
                    let mut buf = [0u8; 8];
                    buf.copy_from_slice(chunk);
                    i64::from_le_bytes(buf)
                })
                .collect(),
            Dtype::I32 => raw
                .chunks_exact(4)
                .map(|chunk| {
                    let mut buf = [0u8; 4];
                    buf.copy_from_slice(chunk);
                    i32::from_le_bytes(buf) as i64
                })
                .collect(),
            other => anyhow::bail!("Unsupported codes dtype {:?}", other),
        };
        let codes = values
            .into_iter()
            .map(|value| {
                u32::try_from(value).map_err(|_| anyhow::anyhow!("Invalid codec code {value}"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { codes })
    }
}

impl From<Vec<u32>> for ReferenceCodes {
    fn from(codes: Vec<u32>) -> Self {
        Self::new(codes)
    }
}

/// Read a reference recording and encode it with `codec`.
///
/// The audio is mixed to mono, resampled to the encoder rate and truncated to
/// `max_seconds` when given.
pub fn encode_reference<C: SpeechCodec + ?Sized>(
    codec: &mut C,
    path: impl AsRef<Path>,
    max_seconds: Option<f32>,
) -> Result<ReferenceCodes> {
    let path = path.as_ref();
    let _span = perf::span(Metric::CodecEncode);
    let (channels, sample_rate) = WavIo::read_audio(path)?;
    let target_rate = codec.encoder_sample_rate();
    let mut samples = AudioResampler::to_mono(channels, sample_rate, target_rate)?;
    if let Some(max_seconds) = max_seconds {
        let limit = (max_seconds.max(0.0) * target_rate as f32) as usize;
        if samples.len() > limit {
            tracing::info!(
                from = samples.len(),
                to = limit,
                "truncating reference audio"
            );
            samples.truncate(limit);
        }
    }
    if samples.is_empty() {
        anyhow::bail!("Reference audio {} contains no samples", path.display());
    }
    let codes = codec
        .encode(&samples)
        .with_context(|| format!("Codec encode failed for {}", path.display()))?;
    if codes.is_empty() {
        anyhow::bail!("Codec produced no codes for {}", path.display());
    }
    tracing::debug!(codes = codes.len(), "encoded reference audio");
    Ok(codes)
}
