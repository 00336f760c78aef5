//! # vieneu - Vietnamese voice-cloning text-to-speech
//!
//! Runs the VieNeu-TTS pipeline: a Qwen2 speech backbone (via
//! `candle-transformers`) and a neural audio codec (via ONNX Runtime),
//! glued together by a Vietnamese text normalizer.
//!
//! ## Architecture Overview
//!
//! The pipeline is a fixed sequence of four steps:
//!
//! 1. **Normalization** ([`VietnameseNormalizer`]): numerals, dates, units and
//!    abbreviations are spelled out so the backbone only sees speakable text.
//!
//! 2. **Reference encoding** ([`SpeechCodec::encode`]): a short recording of the
//!    target voice becomes a sequence of codec codes. Codes can also be saved
//!    once and reloaded ([`ReferenceCodes::save`]).
//!
//! 3. **Synthesis** ([`SpeechBackbone`] + [`SpeechCodec::decode`]): the backbone
//!    continues the reference codes with codes for the new text; the codec turns
//!    them into a 24 kHz waveform.
//!
//! 4. **Output** ([`Waveform::write_wav`]): 16-bit PCM WAV.
//!
//! ## Quick Start
//!
//! ```no_run
//! use vieneu::{Config, SynthesisRequest, VieNeuRuntime};
//!
//! let mut runtime = VieNeuRuntime::from_config(&Config::default())?;
//! let reference = runtime.load_reference("sample/voice.safetensors")?;
//! let request = SynthesisRequest::new(
//!     "Công nghệ giọng nói đang phát triển rất nhanh.",
//!     "Transcript of the reference recording.",
//! );
//! let output = runtime.synthesize(&request, &reference)?;
//! output.waveform.write_wav("output.wav")?;
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Configuration
//!
//! Models are named by HuggingFace repository id or local directory in a YAML
//! file; see [`Config`]. Every field has a default.

pub mod audio;
pub mod backbone;
pub mod codec;
pub mod config;
pub mod download;
pub mod normalize;
pub mod perf;
pub mod runtime;

pub use audio::Waveform;
pub use backbone::{QwenBackbone, SpeechBackbone};
pub use codec::{OnnxCodec, ReferenceCodes, SpeechCodec};
pub use config::{load_config, Config};
pub use download::download_if_necessary;
pub use normalize::{TextNormalizer, VietnameseNormalizer};
pub use runtime::{SynthesisOutput, SynthesisRequest, TtsRuntime, VieNeuRuntime};
