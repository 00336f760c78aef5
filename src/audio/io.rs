//! WAV reading/writing plus a symphonia fallback for other containers.

use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::conv::FromSample;

#[derive(Debug, Default)]
pub struct WavIo;

impl WavIo {
    /// Read any supported audio file into per-channel samples.
    ///
    /// `.wav` files go through hound; everything else (flac, mp3, ogg...) is
    /// decoded with symphonia.
    pub fn read_audio(path: impl AsRef<Path>) -> Result<(Vec<Vec<f32>>, u32)> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("No such file or directory: {}", path.display());
        }
        let is_wav = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
        if is_wav {
            Self::read_wav(path)
        } else {
            Self::read_with_symphonia(path)
                .with_context(|| format!("Failed to decode audio file {}", path.display()))
        }
    }

    pub fn read_wav(path: impl AsRef<Path>) -> Result<(Vec<Vec<f32>>, u32)> {
        let mut reader = WavReader::open(path)?;
        let spec = reader.spec();
        let channels = spec.channels as usize;
        let sample_rate = spec.sample_rate;
        let mut samples = vec![Vec::new(); channels];

        match spec.sample_format {
            SampleFormat::Float => {
                for (idx, sample) in reader.samples::<f32>().enumerate() {
                    let value = sample?;
                    samples[idx % channels].push(value);
                }
            }
            SampleFormat::Int => {
                let max = (1_i64 << (spec.bits_per_sample - 1)) as f32;
                for (idx, sample) in reader.samples::<i32>().enumerate() {
                    let value = sample? as f32 / max;
                    samples[idx % channels].push(value);
                }
            }
        }

        Ok((samples, sample_rate))
    }

    pub fn write_wav(path: impl AsRef<Path>, samples: &[Vec<f32>], sample_rate: u32) -> Result<()> {
        if samples.is_empty() {
            anyhow::bail!("No audio channels provided");
        }
        let channels = samples.len() as u16;
        let len = samples[0].len();
        for channel in samples.iter().skip(1) {
            if channel.len() != len {
                anyhow::bail!("Channel length mismatch in WAV write");
            }
        }

        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec)?;

        for idx in 0..len {
            for channel in samples {
                let value = channel[idx].clamp(-1.0, 1.0);
                let scaled = (value * i16::MAX as f32).round() as i16;
                writer.write_sample(scaled)?;
            }
        }

        writer.finalize()?;
        Ok(())
    }

    fn read_with_symphonia(path: &Path) -> Result<(Vec<Vec<f32>>, u32)> {
        let src = std::fs::File::open(path)?;
        let mss = symphonia::core::io::MediaSourceStream::new(Box::new(src), Default::default());
        let mut hint = symphonia::core::probe::Hint::new();
        if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(ext);
        }
        let detected = symphonia::default::get_probe().format(
            &hint,
            mss,
            &Default::default(),
            &Default::default(),
        )?;
        let mut format = detected.format;
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| anyhow::anyhow!("No supported audio tracks"))?;
        let mut decoder =
            symphonia::default::get_codecs().make(&track.codec_params, &Default::default())?;
        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| anyhow::anyhow!("Audio track has no sample rate"))?;
        let mut channels: Vec<Vec<f32>> = Vec::new();

        while let Ok(packet) = format.next_packet() {
            while !format.metadata().is_latest() {
                format.metadata().pop();
            }
            if packet.track_id() != track_id {
                continue;
            }
            match decoder.decode(&packet)? {
                AudioBufferRef::F32(buf) => append_planes(&mut channels, &buf),
                AudioBufferRef::U8(buf) => append_planes(&mut channels, &buf),
                AudioBufferRef::U16(buf) => append_planes(&mut channels, &buf),
                AudioBufferRef::U24(buf) => append_planes(&mut channels, &buf),
                AudioBufferRef::U32(buf) => append_planes(&mut channels, &buf),
                AudioBufferRef::S8(buf) => append_planes(&mut channels, &buf),
                AudioBufferRef::S16(buf) => append_planes(&mut channels, &buf),
                AudioBufferRef::S24(buf) => append_planes(&mut channels, &buf),
                AudioBufferRef::S32(buf) => append_planes(&mut channels, &buf),
                AudioBufferRef::F64(buf) => append_planes(&mut channels, &buf),
            }
        }

        if channels.is_empty() {
            anyhow::bail!("Decoded audio contains no samples");
        }
        Ok((channels, sample_rate))
    }
}

fn append_planes<T>(channels: &mut Vec<Vec<f32>>, buf: &symphonia::core::audio::AudioBuffer<T>)
where
    T: symphonia::core::sample::Sample,
    f32: FromSample<T>,
{
    let count = buf.spec().channels.count();
    if channels.len() < count {
        channels.resize(count, Vec::new());
    }
    for (idx, channel) in channels.iter_mut().enumerate().take(count) {
        channel.extend(buf.chan(idx).iter().map(|v| f32::from_sample(*v)));
    }
}
