//! Configuration for the synthesis pipeline: model repositories, devices and
//! generation settings.
//!
//! Configurations are loaded from YAML files using [`load_config`]. Every field
//! has a default, so a file only needs to name what it overrides.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Backbone repository used when none is configured.
pub const DEFAULT_BACKBONE_REPO: &str = "pnnbao-ump/VieNeu-TTS";
/// Codec repository used when none is configured.
pub const DEFAULT_CODEC_REPO: &str = "neuphonic/neucodec-onnx-decoder";

/// Compute device requested for a collaborator model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DeviceSpec {
    /// Run on the host CPU.
    Cpu,
    /// Run on the CUDA device with the given ordinal.
    Cuda(usize),
}

impl DeviceSpec {
    /// True for any CUDA device.
    pub fn is_cuda(&self) -> bool {
        matches!(self, DeviceSpec::Cuda(_))
    }

    /// Fail early when CUDA is requested but the crate was built without it.
    pub fn ensure_supported(&self) -> Result<()> {
        if self.is_cuda() && !cfg!(feature = "cuda") {
            anyhow::bail!(
                "Device '{self}' requested but CUDA support is not enabled; \
                 build with --features cuda or use --backbone-device cpu --codec-device cpu"
            );
        }
        Ok(())
    }
}

impl FromStr for DeviceSpec {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim().to_ascii_lowercase();
        match value.as_str() {
            "cpu" => Ok(DeviceSpec::Cpu),
            "cuda" | "gpu" => Ok(DeviceSpec::Cuda(0)),
            other => {
                let ordinal = other
                    .strip_prefix("cuda:")
                    .ok_or_else(|| anyhow::anyhow!("Unknown device '{other}' (expected cpu, cuda or cuda:N)"))?;
                let ordinal = ordinal
                    .parse::<usize>()
                    .map_err(|_| anyhow::anyhow!("Invalid CUDA ordinal in device '{other}'"))?;
                Ok(DeviceSpec::Cuda(ordinal))
            }
        }
    }
}

impl TryFrom<String> for DeviceSpec {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DeviceSpec> for String {
    fn from(device: DeviceSpec) -> Self {
        device.to_string()
    }
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSpec::Cpu => write!(f, "cpu"),
            DeviceSpec::Cuda(0) => write!(f, "cuda"),
            DeviceSpec::Cuda(ordinal) => write!(f, "cuda:{ordinal}"),
        }
    }
}

/// Floating point precision used for backbone weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelDtype {
    /// 32-bit float.
    F32,
    /// bfloat16.
    Bf16,
    /// IEEE half precision.
    F16,
}

impl ModelDtype {
    /// Matching candle dtype.
    pub fn to_candle(self) -> candle::DType {
        match self {
            ModelDtype::F32 => candle::DType::F32,
            ModelDtype::Bf16 => candle::DType::BF16,
            ModelDtype::F16 => candle::DType::F16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
/// Token sampling settings for the backbone.
pub struct SamplingConfig {
    /// Softmax temperature (0.0 = greedy).
    pub temperature: f64,
    /// Number of candidates kept before sampling.
    pub top_k: usize,
    /// RNG seed for reproducible runs.
    pub seed: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_k: 50,
            seed: 299_792_458,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
/// Speech backbone (causal language model) settings.
pub struct BackboneConfig {
    /// HuggingFace repository id or local directory.
    pub repo: String,
    /// Repository revision.
    pub revision: String,
    /// Device the backbone runs on.
    pub device: DeviceSpec,
    /// Weight precision.
    pub dtype: ModelDtype,
    /// Maximum prompt + generated length in tokens.
    pub max_context: usize,
    /// End-of-speech is suppressed until this many tokens were generated.
    pub min_new_tokens: usize,
    /// Sampling parameters.
    pub sampling: SamplingConfig,
}

impl Default for BackboneConfig {
    fn default() -> Self {
        Self {
            repo: DEFAULT_BACKBONE_REPO.to_string(),
            revision: "main".to_string(),
            device: DeviceSpec::Cuda(0),
            dtype: ModelDtype::F32,
            max_context: 2048,
            min_new_tokens: 50,
            sampling: SamplingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
/// Neural audio codec settings.
pub struct CodecConfig {
    /// HuggingFace repository id or local directory.
    pub repo: String,
    /// Repository revision.
    pub revision: String,
    /// Device the codec runs on.
    pub device: DeviceSpec,
    /// ONNX graph decoding codes into audio.
    pub decoder_file: String,
    /// Optional ONNX graph encoding audio into codes.
    pub encoder_file: Option<String>,
    /// Decoder output sample rate in Hz.
    pub sample_rate: u32,
    /// Encoder input sample rate in Hz.
    pub encoder_sample_rate: u32,
    /// Decoder input tensor name.
    pub decoder_input: String,
    /// Encoder input tensor name.
    pub encoder_input: String,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            repo: DEFAULT_CODEC_REPO.to_string(),
            revision: "main".to_string(),
            device: DeviceSpec::Cuda(0),
            decoder_file: "model.onnx".to_string(),
            encoder_file: None,
            sample_rate: 24_000,
            encoder_sample_rate: 16_000,
            decoder_input: "codes".to_string(),
            encoder_input: "audio".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
/// Pipeline-level synthesis settings.
pub struct SynthesisConfig {
    /// Longest text chunk handed to the backbone at once.
    pub max_chunk_chars: usize,
    /// Silence inserted between synthesized chunks.
    pub chunk_silence_ms: u32,
    /// Reference audio longer than this is truncated before encoding (0 = never).
    pub max_reference_seconds: f32,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: 256,
            chunk_silence_ms: 150,
            max_reference_seconds: 15.0,
        }
    }
}

/// Top-level pipeline configuration.
///
/// # Example YAML
///
/// ```yaml
/// backbone:
///   repo: pnnbao-ump/VieNeu-TTS
///   device: cpu
///   sampling: { temperature: 1.0, top_k: 50 }
/// codec:
///   repo: neuphonic/neucodec-onnx-decoder
///   device: cpu
/// synthesis:
///   max_chunk_chars: 256
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Speech backbone settings.
    pub backbone: BackboneConfig,
    /// Audio codec settings.
    pub codec: CodecConfig,
    /// Synthesis settings.
    pub synthesis: SynthesisConfig,
}

impl Config {
    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let sampling = &self.backbone.sampling;
        if sampling.top_k == 0 {
            anyhow::bail!("backbone.sampling.top_k must be > 0");
        }
        if !(sampling.temperature >= 0.0) {
            anyhow::bail!("backbone.sampling.temperature must be >= 0");
        }
        if self.backbone.max_context <= self.backbone.min_new_tokens {
            anyhow::bail!(
                "backbone.max_context ({}) must exceed backbone.min_new_tokens ({})",
                self.backbone.max_context,
                self.backbone.min_new_tokens
            );
        }
        if self.codec.sample_rate == 0 || self.codec.encoder_sample_rate == 0 {
            anyhow::bail!("codec sample rates must be > 0");
        }
        if self.synthesis.max_chunk_chars == 0 {
            anyhow::bail!("synthesis.max_chunk_chars must be > 0");
        }
        if self.synthesis.max_reference_seconds < 0.0 {
            anyhow::bail!("synthesis.max_reference_seconds must be >= 0");
        }
        Ok(())
    }

    /// Rewrite `./` and `../` repository paths relative to the config file.
    pub fn resolve_local_repos(&mut self, config_path: &Path) {
        for repo in [&mut self.backbone.repo, &mut self.codec.repo] {
            if repo.starts_with("./") || repo.starts_with("../") {
                *repo = resolve_relative_path(config_path, repo)
                    .to_string_lossy()
                    .into_owned();
            }
        }
    }
}

/// Load a pipeline configuration from a YAML file.
///
/// # Errors
///
/// Returns an error if the file doesn't exist, contains invalid YAML or
/// out-of-range values.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        anyhow::bail!("Config file not found: {}", path.display());
    }

    let data = fs::read_to_string(path)?;
    let mut config: Config = serde_yaml::from_str(&data)?;
    config.resolve_local_repos(path);
    config.validate()?;
    Ok(config)
}

/// Resolve a possibly relative path against a config file location.
pub fn resolve_relative_path(config_path: &Path, maybe_relative: &str) -> PathBuf {
    let candidate = Path::new(maybe_relative);
    if candidate.is_absolute() {
        return candidate.to_path_buf();
    }
    config_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_spec_parses_common_spellings() {
        assert_eq!("cpu".parse::<DeviceSpec>().unwrap(), DeviceSpec::Cpu);
        assert_eq!("CUDA".parse::<DeviceSpec>().unwrap(), DeviceSpec::Cuda(0));
        assert_eq!("cuda:2".parse::<DeviceSpec>().unwrap(), DeviceSpec::Cuda(2));
        assert!("tpu".parse::<DeviceSpec>().is_err());
        assert!("cuda:x".parse::<DeviceSpec>().is_err());
        assert_eq!(DeviceSpec::Cuda(1).to_string(), "cuda:1");
    }

    #[test]
    fn empty_yaml_yields_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.backbone.repo, DEFAULT_BACKBONE_REPO);
        assert_eq!(config.codec.sample_rate, 24_000);
        assert_eq!(config.backbone.max_context, 2048);
        assert_eq!(config.backbone.sampling.top_k, 50);
    }

    #[test]
    fn partial_yaml_overrides_only_named_fields() {
        let yaml = "backbone:\n  device: cpu\n  sampling:\n    top_k: 10\ncodec:\n  device: cuda:1\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.backbone.device, DeviceSpec::Cpu);
        assert_eq!(config.backbone.sampling.top_k, 10);
        assert_eq!(config.backbone.sampling.temperature, 1.0);
        assert_eq!(config.codec.device, DeviceSpec::Cuda(1));
        assert_eq!(config.codec.decoder_file, "model.onnx");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = serde_yaml::from_str::<Config>("backbone:\n  temprature: 0.5\n").unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let mut config = Config::default();
        config.backbone.sampling.top_k = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.backbone.max_context = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_config_reports_missing_file() {
        let err = load_config("tests/fixtures/does_not_exist.yaml").unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn local_repos_resolve_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vieneu.yaml");
        std::fs::write(&path, "backbone:\n  repo: ./models/backbone\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(
            PathBuf::from(&config.backbone.repo),
            dir.path().join("./models/backbone")
        );
        assert_eq!(config.codec.repo, DEFAULT_CODEC_REPO);
    }
}
