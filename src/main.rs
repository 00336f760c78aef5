//! Command-line interface for the VieNeu-TTS pipeline.
//!
//! The CLI wraps the runtime to provide speech synthesis, reference encoding,
//! text normalization, model downloads, and basic audio conversion utilities.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vieneu::audio::io::WavIo;
use vieneu::audio::resample::AudioResampler;
use vieneu::config::{
    load_config, Config, DeviceSpec, DEFAULT_BACKBONE_REPO, DEFAULT_CODEC_REPO,
};
use vieneu::download::ModelRepo;
use vieneu::perf;
use vieneu::runtime::{check_reference_source, SynthesisRequest, VieNeuRuntime};
use vieneu::{OnnxCodec, TextNormalizer, VietnameseNormalizer};

const DEFAULT_CONFIG: &str = "vieneu.yaml";

/// Top-level CLI options.
#[derive(Parser)]
#[command(name = "vieneu")]
#[command(about = "Vietnamese voice-cloning text-to-speech", long_about = None)]
struct Cli {
    /// Log progress and print a performance summary at the end of the run.
    #[arg(long, short, global = true)]
    verbose: bool,
    /// Pipeline configuration YAML. Defaults apply when the file is absent.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// CLI subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Generate speech from text in the voice of a reference recording.
    Say(SayArgs),
    /// Print the normalized form of a text.
    Normalize {
        /// Text to normalize.
        text: String,
    },
    /// Reference-voice subcommands.
    Reference {
        /// Reference subcommand to execute.
        #[command(subcommand)]
        command: ReferenceCommands,
    },
    /// List known model repositories.
    Models,
    /// Download every artifact referenced by the config.
    Download,
    /// Audio utility subcommands.
    Audio {
        /// Audio subcommand to execute.
        #[command(subcommand)]
        command: AudioCommands,
    },
}

#[derive(Args, Debug, Clone)]
struct SayArgs {
    /// Text to synthesize.
    text: String,
    /// Reference audio file, or reference codes saved as safetensors.
    #[arg(long)]
    ref_audio: PathBuf,
    /// Transcript of the reference audio.
    #[arg(long, conflicts_with = "ref_text_file")]
    ref_text: Option<String>,
    /// File containing the transcript of the reference audio.
    #[arg(long)]
    ref_text_file: Option<PathBuf>,
    /// Output WAV file path.
    #[arg(long, default_value = "output.wav")]
    output: PathBuf,
    /// Backbone repository id or local directory.
    #[arg(long)]
    backbone_repo: Option<String>,
    /// Backbone device (cpu, cuda, cuda:N).
    #[arg(long)]
    backbone_device: Option<DeviceSpec>,
    /// Codec repository id or local directory.
    #[arg(long)]
    codec_repo: Option<String>,
    /// Codec device (cpu, cuda, cuda:N).
    #[arg(long)]
    codec_device: Option<DeviceSpec>,
    /// Sampling temperature.
    #[arg(long)]
    temperature: Option<f64>,
    /// Number of candidates kept when sampling.
    #[arg(long)]
    top_k: Option<usize>,
    /// Sampling seed.
    #[arg(long)]
    seed: Option<u64>,
    /// Maximum prompt plus generated tokens.
    #[arg(long)]
    max_context: Option<usize>,
    /// Minimum generated tokens before end of speech is allowed.
    #[arg(long)]
    min_new_tokens: Option<usize>,
}

impl SayArgs {
    /// Apply command-line overrides on top of the loaded config.
    fn apply(&self, config: &mut Config) {
        if let Some(repo) = &self.backbone_repo {
            config.backbone.repo = repo.clone();
        }
        if let Some(device) = self.backbone_device {
            config.backbone.device = device;
        }
        if let Some(repo) = &self.codec_repo {
            config.codec.repo = repo.clone();
        }
        if let Some(device) = self.codec_device {
            config.codec.device = device;
        }
        let sampling = &mut config.backbone.sampling;
        if let Some(temperature) = self.temperature {
            sampling.temperature = temperature;
        }
        if let Some(top_k) = self.top_k {
            sampling.top_k = top_k;
        }
        if let Some(seed) = self.seed {
            sampling.seed = seed;
        }
        if let Some(max_context) = self.max_context {
            config.backbone.max_context = max_context;
        }
        if let Some(min_new_tokens) = self.min_new_tokens {
            config.backbone.min_new_tokens = min_new_tokens;
        }
    }

    fn reference_text(&self) -> Result<String> {
        match (&self.ref_text, &self.ref_text_file) {
            (Some(text), _) => Ok(text.clone()),
            (None, Some(path)) => std::fs::read_to_string(path)
                .map(|text| text.trim().to_string())
                .with_context(|| format!("Failed to read reference text {}", path.display())),
            (None, None) => anyhow::bail!("Either --ref-text or --ref-text-file is required"),
        }
    }
}

/// Reference-voice commands.
#[derive(Subcommand)]
enum ReferenceCommands {
    /// Encode a reference recording into codec codes.
    Encode {
        /// Input audio file.
        #[arg(long)]
        input: PathBuf,
        /// Output safetensors path.
        #[arg(long)]
        output: PathBuf,
        /// Truncate the recording to this many seconds (0 = keep all).
        #[arg(long)]
        truncate_seconds: Option<f32>,
        /// Codec device (cpu, cuda, cuda:N).
        #[arg(long)]
        codec_device: Option<DeviceSpec>,
    },
}

/// Audio utility commands.
#[derive(Subcommand)]
enum AudioCommands {
    /// Convert sample rate and channel count.
    Convert {
        /// Input audio file path.
        #[arg(long)]
        input: PathBuf,
        /// Output WAV path.
        #[arg(long)]
        output: PathBuf,
        /// Target sample rate in Hz.
        #[arg(long)]
        to_rate: u32,
        /// Target channel count.
        #[arg(long)]
        to_channels: usize,
    },
}

/// Entry point for the CLI.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Say(args) => {
            let interrupted = Arc::new(AtomicBool::new(false));
            let interrupt_flag = Arc::clone(&interrupted);
            ctrlc::set_handler(move || {
                interrupt_flag.store(true, Ordering::SeqCst);
            })?;
            let mut config = config_or_default(&cli.config)?;
            args.apply(&mut config);
            run_say(&args, &config, interrupted)?;
        }
        Commands::Normalize { text } => {
            println!("{}", VietnameseNormalizer::new().normalize(&text));
        }
        Commands::Reference { command } => match command {
            ReferenceCommands::Encode {
                input,
                output,
                truncate_seconds,
                codec_device,
            } => {
                let mut config = config_or_default(&cli.config)?;
                if let Some(seconds) = truncate_seconds {
                    config.synthesis.max_reference_seconds = seconds;
                }
                if let Some(device) = codec_device {
                    config.codec.device = device;
                }
                run_reference_encode(&input, &output, &config)?;
            }
        },
        Commands::Models => {
            println!("backbone: {DEFAULT_BACKBONE_REPO}");
            println!("codec: {DEFAULT_CODEC_REPO}");
        }
        Commands::Download => {
            download_models(&config_or_default(&cli.config)?)?;
        }
        Commands::Audio { command } => match command {
            AudioCommands::Convert {
                input,
                output,
                to_rate,
                to_channels,
            } => {
                let (samples, sample_rate) = WavIo::read_audio(input)?;
                let converted =
                    AudioResampler::convert_audio(samples, sample_rate, to_rate, to_channels)?;
                WavIo::write_wav(output, &converted, to_rate)?;
            }
        },
    }

    if cli.verbose {
        eprintln!("{}", perf::report());
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise `warn`, or `info` with `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

fn run_say(args: &SayArgs, config: &Config, interrupted: Arc<AtomicBool>) -> Result<()> {
    let ref_text = args.reference_text()?;
    check_reference_source(&config.codec, &args.ref_audio)?;
    let mut runtime = VieNeuRuntime::from_config(config)?.with_interrupt(Arc::clone(&interrupted));
    if interrupted.load(Ordering::SeqCst) {
        anyhow::bail!("Interrupted");
    }

    let ref_codes = runtime
        .load_reference(&args.ref_audio)
        .with_context(|| format!("Failed to prepare reference {}", args.ref_audio.display()))?;
    let request = SynthesisRequest::new(args.text.clone(), ref_text);
    println!("Reference text: {}", request.ref_text);
    println!("Text: {}", request.text);

    let output = runtime.synthesize(&request, &ref_codes)?;
    if interrupted.load(Ordering::SeqCst) {
        anyhow::bail!("Interrupted");
    }
    println!("Normalized reference text: {}", output.normalized_ref_text);
    println!("Normalized text: {}", output.normalized_text);
    output.waveform.write_wav(&args.output)?;
    println!(
        "Wrote {:.2}s of audio to {}",
        output.waveform.duration_secs(),
        args.output.display()
    );
    Ok(())
}

fn run_reference_encode(input: &Path, output: &Path, config: &Config) -> Result<()> {
    let mut codec = OnnxCodec::from_config(&config.codec)
        .with_context(|| format!("Failed to load codec {}", config.codec.repo))?;
    if !codec.has_encoder() {
        anyhow::bail!(
            "codec.encoder_file is not configured; reference encoding needs an ONNX encoder graph"
        );
    }
    let max_seconds = config.synthesis.max_reference_seconds;
    let codes = vieneu::codec::encode_reference(
        &mut codec,
        input,
        (max_seconds > 0.0).then_some(max_seconds),
    )?;
    codes.save(output)?;
    println!("Encoded {} reference codes to {}", codes.len(), output.display());
    Ok(())
}

/// Fetch the backbone and codec artifacts named by the config.
fn download_models(config: &Config) -> Result<()> {
    let backbone = ModelRepo::resolve(&config.backbone.repo, &config.backbone.revision)?;
    backbone.get("config.json")?;
    backbone.get("tokenizer.json")?;
    let weights = backbone.safetensors()?;
    println!("backbone {}: {} weight file(s)", backbone.id(), weights.len());

    let codec = ModelRepo::resolve(&config.codec.repo, &config.codec.revision)?;
    codec.get(&config.codec.decoder_file)?;
    if let Some(encoder) = &config.codec.encoder_file {
        codec.get(encoder)?;
    }
    println!("codec {}: ok", codec.id());
    Ok(())
}

/// Load the config if the file exists; otherwise use defaults.
fn config_or_default(path: &Path) -> Result<Config> {
    let path = resolve_config_path(path.to_path_buf());
    if path.exists() {
        return load_config(&path);
    }
    if path != Path::new(DEFAULT_CONFIG) {
        anyhow::bail!("Config file not found: {}", path.display());
    }
    tracing::debug!("no {DEFAULT_CONFIG} found; using built-in defaults");
    Ok(Config::default())
}

/// Resolve a config path, falling back to parent directory if needed.
fn resolve_config_path(path: PathBuf) -> PathBuf {
    if path.exists() {
        return path;
    }
    let candidate = PathBuf::from("..").join(&path);
    if candidate.exists() {
        return candidate;
    }
    path
}
