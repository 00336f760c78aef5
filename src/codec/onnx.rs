//! ONNX Runtime codec: exported decoder (and optionally encoder) graphs.

use anyhow::{Context, Result};
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;

use super::{ReferenceCodes, SpeechCodec};
use crate::config::{CodecConfig, DeviceSpec};
use crate::download::ModelRepo;
use crate::perf::{self, Metric};

/// Codec backed by ONNX graphs.
///
/// The decoder takes int32 codes `[1, 1, T]` and returns float audio
/// `[1, 1, samples]`. The encoder, when present, takes float audio
/// `[1, 1, samples]` and returns integer codes `[1, 1, T]`.
pub struct OnnxCodec {
    decoder: Session,
    encoder: Option<Session>,
    sample_rate: u32,
    encoder_sample_rate: u32,
    decoder_input: String,
    encoder_input: String,
}

impl std::fmt::Debug for OnnxCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxCodec")
            .field("sample_rate", &self.sample_rate)
            .field("encoder_sample_rate", &self.encoder_sample_rate)
            .field("has_encoder", &self.encoder.is_some())
            .finish()
    }
}

impl OnnxCodec {
    /// Fetch the configured graphs and open them on the configured device.
    pub fn from_config(config: &CodecConfig) -> Result<Self> {
        config.device.ensure_supported()?;
        let repo = ModelRepo::resolve(&config.repo, &config.revision)?;
        let decoder = repo.get(&config.decoder_file)?;
        let encoder = config
            .encoder_file
            .as_deref()
            .map(|file| repo.get(file))
            .transpose()?;
        Self::load(&decoder, encoder.as_deref(), config)
    }

    /// Open graphs from local paths.
    pub fn load(decoder: &Path, encoder: Option<&Path>, config: &CodecConfig) -> Result<Self> {
        let decoder = open_session(decoder, config.device)?;
        let encoder = encoder
            .map(|path| open_session(path, config.device))
            .transpose()?;
        tracing::info!(
            device = %config.device,
            encoder = encoder.is_some(),
            "loaded onnx codec"
        );
        Ok(Self {
            decoder,
            encoder,
            sample_rate: config.sample_rate,
            encoder_sample_rate: config.encoder_sample_rate,
            decoder_input: config.decoder_input.clone(),
            encoder_input: config.encoder_input.clone(),
        })
    }

    /// True when reference audio can be encoded directly.
    pub fn has_encoder(&self) -> bool {
        self.encoder.is_some()
    }
}

impl SpeechCodec for OnnxCodec {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn encoder_sample_rate(&self) -> u32 {
        self.encoder_sample_rate
    }

    fn encode(&mut self, samples: &[f32]) -> Result<ReferenceCodes> {
        let Some(encoder) = self.encoder.as_mut() else {
            anyhow::bail!(
                "This codec has no encoder graph; set codec.encoder_file in the config \
                 or pass pre-encoded reference codes (.safetensors)"
            );
        };
        let input = Tensor::<f32>::from_array((
            vec![1usize, 1, samples.len()],
            samples.to_vec().into_boxed_slice(),
        ))
        .map_err(|e| anyhow::anyhow!("ort: create audio tensor failed: {e}"))?;
        let outputs = encoder
            .run(ort::inputs![self.encoder_input.as_str() => input])
            .map_err(|e| anyhow::anyhow!("ort: encoder run failed: {e}"))?;

        let output = &outputs[0];
        let values: Vec<i64> = if let Ok((_, data)) = output.try_extract_tensor::<i64>() {
            data.to_vec()
        } else if let Ok((_, data)) = output.try_extract_tensor::<i32>() {
            data.iter().map(|&v| v as i64).collect()
        } else {
            anyhow::bail!("ort: encoder output is not an integer tensor");
        };
        let codes = values
            .into_iter()
            .map(|v| u32::try_from(v).map_err(|_| anyhow::anyhow!("Invalid codec code {v}")))
            .collect::<Result<Vec<_>>>()?;
        Ok(ReferenceCodes::new(codes))
    }

    fn decode(&mut self, codes: &[u32]) -> Result<Vec<f32>> {
        if codes.is_empty() {
            anyhow::bail!("No valid speech tokens to decode");
        }
        let _span = perf::span(Metric::CodecDecode);
        let data = codes_to_input(codes)?;
        let input = Tensor::<i32>::from_array((vec![1usize, 1, codes.len()], data.into_boxed_slice()))
            .map_err(|e| anyhow::anyhow!("ort: create codes tensor failed: {e}"))?;
        let outputs = self
            .decoder
            .run(ort::inputs![self.decoder_input.as_str() => input])
            .map_err(|e| anyhow::anyhow!("ort: decoder run failed: {e}"))?;
        let (_, samples) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| anyhow::anyhow!("ort: decoder output is not f32: {e}"))?;
        if samples.is_empty() {
            anyhow::bail!("Codec decoder returned no samples");
        }
        perf::add_count(Metric::CodecSamples, samples.len() as u64);
        Ok(samples.to_vec())
    }
}

fn codes_to_input(codes: &[u32]) -> Result<Vec<i32>> {
    codes
        .iter()
        .map(|&code| {
            i32::try_from(code).map_err(|_| anyhow::anyhow!("Codec code {code} out of range"))
        })
        .collect()
}

fn open_session(path: &Path, device: DeviceSpec) -> Result<Session> {
    let builder = Session::builder()
        .map_err(|e| anyhow::anyhow!("ort: create session builder failed: {e}"))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| anyhow::anyhow!("ort: set graph optimization level failed: {e}"))?;
    let builder = with_device(builder, device)?;
    builder
        .commit_from_file(path)
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("Failed to load onnx graph {}", path.display()))
}

#[cfg(feature = "cuda")]
fn with_device(builder: SessionBuilder, device: DeviceSpec) -> Result<SessionBuilder> {
    use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};

    match device {
        DeviceSpec::Cpu => Ok(builder),
        DeviceSpec::Cuda(ordinal) => builder
            .with_execution_providers([
                CUDAExecutionProvider::default()
                    .with_device_id(ordinal as i32)
                    .build(),
                CPUExecutionProvider::default().build(),
            ])
            .map_err(|e| anyhow::anyhow!("ort: enable CUDA execution provider failed: {e}")),
    }
}

#[cfg(not(feature = "cuda"))]
fn with_device(builder: SessionBuilder, device: DeviceSpec) -> Result<SessionBuilder> {
    device.ensure_supported()?;
    Ok(builder)
}
