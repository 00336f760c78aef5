//! High-level synthesis pipeline.
//!
//! [`TtsRuntime`] owns the three collaborators (backbone, codec, normalizer)
//! and runs the fixed sequence: normalize reference text, normalize target
//! text, encode the reference, generate speech codes, decode to a waveform.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::audio::Waveform;
use crate::backbone::{QwenBackbone, SpeechBackbone};
use crate::codec::{self, OnnxCodec, ReferenceCodes, SpeechCodec};
use crate::config::{load_config, CodecConfig, Config, SynthesisConfig};
use crate::normalize::{split_into_chunks, TextNormalizer, VietnameseNormalizer};
use crate::perf::{self, Metric};

/// Raw (unnormalized) texts for one synthesis run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    /// Text to speak.
    pub text: String,
    /// Transcript of the reference audio.
    pub ref_text: String,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>, ref_text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ref_text: ref_text.into(),
        }
    }
}

/// Result of [`TtsRuntime::synthesize`].
#[derive(Debug, Clone)]
pub struct SynthesisOutput {
    /// Audio at the codec sample rate.
    pub waveform: Waveform,
    /// Target text as seen by the backbone.
    pub normalized_text: String,
    /// Reference transcript as seen by the backbone.
    pub normalized_ref_text: String,
    /// Number of speech tokens decoded across all chunks.
    pub speech_tokens: usize,
}

/// The pipeline with the concrete VieNeu collaborators.
pub type VieNeuRuntime = TtsRuntime<QwenBackbone, OnnxCodec, VietnameseNormalizer>;

/// Synthesis pipeline over a backbone, a codec and a normalizer.
pub struct TtsRuntime<B, C, N> {
    backbone: B,
    codec: C,
    normalizer: N,
    synthesis: SynthesisConfig,
    interrupt: Option<Arc<AtomicBool>>,
}

/// True when `path` holds saved reference codes rather than audio.
pub fn is_reference_codes(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("safetensors"))
}

/// Fail early when a reference recording would need an encoder graph the codec lacks.
///
/// Run this before loading any model so a bad reference does not cost a download.
pub fn check_reference_source(codec: &CodecConfig, path: &Path) -> Result<()> {
    if codec.encoder_file.is_none() && !is_reference_codes(path) {
        anyhow::bail!(
            "Reference {} is audio but codec.encoder_file is not configured; \
             pass codes saved by `vieneu reference encode` (.safetensors) or set codec.encoder_file",
            path.display()
        );
    }
    Ok(())
}

impl VieNeuRuntime {
    /// Create a runtime from a config path.
    pub fn from_config_path(path: impl AsRef<Path>) -> Result<Self> {
        let config = load_config(path)?;
        Self::from_config(&config)
    }

    /// Download (if needed) and load the backbone and codec named by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let _span = perf::span(Metric::RuntimeFromConfig);
        config.validate()?;
        let backbone = QwenBackbone::from_config(&config.backbone).with_context(|| {
            format!("Failed to load backbone {}", config.backbone.repo)
        })?;
        let codec = OnnxCodec::from_config(&config.codec)
            .with_context(|| format!("Failed to load codec {}", config.codec.repo))?;
        Ok(Self::new(
            backbone,
            codec,
            VietnameseNormalizer::new(),
            config.synthesis.clone(),
        ))
    }
}

impl<B, C, N> TtsRuntime<B, C, N>
where
    B: SpeechBackbone,
    C: SpeechCodec,
    N: TextNormalizer,
{
    pub fn new(backbone: B, codec: C, normalizer: N, synthesis: SynthesisConfig) -> Self {
        Self {
            backbone,
            codec,
            normalizer,
            synthesis,
            interrupt: None,
        }
    }

    /// Abort generation once `flag` is set (e.g. by a Ctrl-C handler).
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    /// Output sample rate of the pipeline.
    pub fn sample_rate(&self) -> u32 {
        self.codec.sample_rate()
    }

    pub fn synthesis_config(&self) -> &SynthesisConfig {
        &self.synthesis
    }

    pub fn normalize(&self, text: &str) -> String {
        let _span = perf::span(Metric::RuntimeNormalize);
        self.normalizer.normalize(text)
    }

    /// Encode a reference recording into codec codes.
    pub fn encode_reference(&mut self, path: impl AsRef<Path>) -> Result<ReferenceCodes> {
        let _span = perf::span(Metric::RuntimeEncodeReference);
        let max_seconds = self.synthesis.max_reference_seconds;
        codec::encode_reference(
            &mut self.codec,
            path,
            (max_seconds > 0.0).then_some(max_seconds),
        )
    }

    /// Load pre-encoded codes from `.safetensors`, or encode any other file as audio.
    pub fn load_reference(&mut self, path: impl AsRef<Path>) -> Result<ReferenceCodes> {
        let path = path.as_ref();
        if is_reference_codes(path) {
            ReferenceCodes::load(path)
        } else {
            self.encode_reference(path)
        }
    }

    /// Speak already-normalized `text` in the voice of the reference.
    pub fn infer(
        &mut self,
        text: &str,
        ref_codes: &ReferenceCodes,
        ref_text: &str,
    ) -> Result<Waveform> {
        self.infer_chunk(text, ref_codes, ref_text)
            .map(|(waveform, _)| waveform)
    }

    /// Normalize both texts, then speak the target text chunk by chunk.
    pub fn synthesize(
        &mut self,
        request: &SynthesisRequest,
        ref_codes: &ReferenceCodes,
    ) -> Result<SynthesisOutput> {
        let _span = perf::span(Metric::RuntimeSynthesize);
        let normalized_ref_text = self.normalize(&request.ref_text);
        let normalized_text = self.normalize(&request.text);

        let chunks = split_into_chunks(&normalized_text, self.synthesis.max_chunk_chars);
        if chunks.is_empty() {
            anyhow::bail!("Nothing to synthesize: text is empty after normalization");
        }
        perf::add_count(Metric::SynthesisChunks, chunks.len() as u64);

        let mut waveform = Waveform::new(Vec::new(), self.codec.sample_rate());
        let mut speech_tokens = 0;
        for (idx, chunk) in chunks.iter().enumerate() {
            tracing::info!(
                chunk = idx + 1,
                of = chunks.len(),
                chars = chunk.chars().count(),
                "synthesizing"
            );
            let (part, tokens) = self
                .infer_chunk(chunk, ref_codes, &normalized_ref_text)
                .with_context(|| format!("Synthesis failed for chunk {}", idx + 1))?;
            if idx > 0 {
                waveform.append_silence(self.synthesis.chunk_silence_ms);
            }
            waveform.append(&part)?;
            speech_tokens += tokens;
        }

        Ok(SynthesisOutput {
            waveform,
            normalized_text,
            normalized_ref_text,
            speech_tokens,
        })
    }

    fn infer_chunk(
        &mut self,
        text: &str,
        ref_codes: &ReferenceCodes,
        ref_text: &str,
    ) -> Result<(Waveform, usize)> {
        let _span = perf::span(Metric::RuntimeInfer);
        let flag = self.interrupt.clone();
        let interrupted = move || flag.as_ref().is_some_and(|f| f.load(Ordering::SeqCst));
        if interrupted() {
            anyhow::bail!("Interrupted");
        }

        let codes = self
            .backbone
            .generate(ref_codes, ref_text, text, &interrupted)?;
        if codes.is_empty() {
            anyhow::bail!("No valid speech tokens generated");
        }
        let samples = self.codec.decode(&codes).context("Codec decode failed")?;
        Ok((
            Waveform::new(samples, self.codec.sample_rate()),
            codes.len(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Emits one code per character of the target text.
    #[derive(Default)]
    struct EchoBackbone {
        seen: Vec<(String, String, usize)>,
    }

    impl SpeechBackbone for EchoBackbone {
        fn generate(
            &mut self,
            ref_codes: &ReferenceCodes,
            ref_text: &str,
            text: &str,
            interrupt: &dyn Fn() -> bool,
        ) -> Result<Vec<u32>> {
            if interrupt() {
                anyhow::bail!("Interrupted");
            }
            self.seen
                .push((ref_text.to_string(), text.to_string(), ref_codes.len()));
            Ok(text.chars().map(|c| c as u32 % 1024).collect())
        }
    }

    /// 480 samples (20 ms at 24 kHz) per code.
    struct ToneCodec;

    impl SpeechCodec for ToneCodec {
        fn sample_rate(&self) -> u32 {
            24_000
        }

        fn encoder_sample_rate(&self) -> u32 {
            16_000
        }

        fn encode(&mut self, samples: &[f32]) -> Result<ReferenceCodes> {
            Ok(ReferenceCodes::new(vec![1; samples.len() / 320]))
        }

        fn decode(&mut self, codes: &[u32]) -> Result<Vec<f32>> {
            if codes.is_empty() {
                anyhow::bail!("No valid speech tokens to decode");
            }
            Ok(vec![0.1; codes.len() * 480])
        }
    }

    fn runtime() -> TtsRuntime<EchoBackbone, ToneCodec, VietnameseNormalizer> {
        TtsRuntime::new(
            EchoBackbone::default(),
            ToneCodec,
            VietnameseNormalizer::new(),
            SynthesisConfig::default(),
        )
    }

    #[test]
    fn backbone_sees_normalized_texts() {
        let mut runtime = runtime();
        let request = SynthesisRequest::new("Tôi có 2 con mèo.", "Năm 2024 thật vui");
        let output = runtime
            .synthesize(&request, &ReferenceCodes::new(vec![5, 6, 7]))
            .unwrap();

        assert_eq!(output.normalized_text, "tôi có hai con mèo.");
        assert_eq!(
            output.normalized_ref_text,
            "năm hai nghìn không trăm hai mươi bốn thật vui"
        );
        assert_eq!(
            runtime.backbone.seen,
            vec![(
                output.normalized_ref_text.clone(),
                output.normalized_text.clone(),
                3
            )]
        );
        assert_eq!(output.waveform.sample_rate, 24_000);
        assert_eq!(output.waveform.len(), output.speech_tokens * 480);
    }

    #[test]
    fn long_text_is_chunked_with_silence() {
        let mut runtime = TtsRuntime::new(
            EchoBackbone::default(),
            ToneCodec,
            VietnameseNormalizer::new(),
            SynthesisConfig {
                max_chunk_chars: 10,
                chunk_silence_ms: 100,
                ..SynthesisConfig::default()
            },
        );
        let output = runtime
            .synthesize(
                &SynthesisRequest::new("một hai. ba bốn.", "mẫu"),
                &ReferenceCodes::new(vec![1]),
            )
            .unwrap();
        assert_eq!(runtime.backbone.seen.len(), 2);
        assert_eq!(output.waveform.len(), output.speech_tokens * 480 + 2_400);
    }

    #[test]
    fn empty_text_is_rejected() {
        let mut runtime = runtime();
        let err = runtime
            .synthesize(&SynthesisRequest::new(" \"\" ", "x"), &ReferenceCodes::default())
            .unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn interrupt_flag_aborts_before_generation() {
        let flag = Arc::new(AtomicBool::new(true));
        let mut runtime = runtime().with_interrupt(flag);
        let err = runtime
            .infer("xin chào", &ReferenceCodes::new(vec![1]), "a")
            .unwrap_err();
        assert_eq!(err.to_string(), "Interrupted");
        assert!(runtime.backbone.seen.is_empty());
    }

    #[test]
    fn safetensors_reference_is_loaded_not_encoded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("voice.safetensors");
        ReferenceCodes::new(vec![9, 8, 7]).save(&path).unwrap();
        let mut runtime = runtime();
        assert_eq!(runtime.load_reference(&path).unwrap().as_slice(), &[9, 8, 7]);
    }

    #[test]
    fn audio_reference_needs_an_encoder_graph() {
        let mut codec = CodecConfig::default();
        assert!(codec.encoder_file.is_none());
        let err = check_reference_source(&codec, Path::new("voice.wav")).unwrap_err();
        assert!(err.to_string().contains("codec.encoder_file"), "{err}");
        check_reference_source(&codec, Path::new("voice.SAFETENSORS")).unwrap();

        codec.encoder_file = Some("encoder.onnx".to_string());
        check_reference_source(&codec, Path::new("voice.wav")).unwrap();
    }

    #[test]
    fn wav_reference_goes_through_the_codec() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("voice.wav");
        Waveform::new(vec![0.2; 16_000], 16_000).write_wav(&path).unwrap();
        let mut runtime = runtime();
        assert_eq!(runtime.load_reference(&path).unwrap().len(), 50);
    }
}
