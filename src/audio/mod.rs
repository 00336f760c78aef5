//! Audio I/O and resampling utilities for the pipeline, the CLI and tests.
//!
//! These helpers keep audio handling separate from the models, focusing on
//! reading/writing waveforms and converting sample rates or channel counts.

pub mod io;
pub mod resample;

/// A mono waveform together with its sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    /// Float samples, nominally in `[-1, 1]`.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl Waveform {
    /// Wrap samples produced at `sample_rate`.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when no samples were produced.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Append `millis` of silence.
    pub fn append_silence(&mut self, millis: u32) {
        let count = (self.sample_rate as u64 * millis as u64 / 1000) as usize;
        self.samples.resize(self.samples.len() + count, 0.0);
    }

    /// Append another waveform recorded at the same rate.
    pub fn append(&mut self, other: &Waveform) -> anyhow::Result<()> {
        if other.sample_rate != self.sample_rate {
            anyhow::bail!(
                "Cannot join waveforms at {} Hz and {} Hz",
                self.sample_rate,
                other.sample_rate
            );
        }
        self.samples.extend_from_slice(&other.samples);
        Ok(())
    }

    /// Write the waveform as a mono 16-bit WAV file.
    pub fn write_wav(&self, path: impl AsRef<std::path::Path>) -> anyhow::Result<()> {
        let _span = crate::perf::span(crate::perf::Metric::AudioWrite);
        io::WavIo::write_wav(path, std::slice::from_ref(&self.samples), self.sample_rate)
    }
}
