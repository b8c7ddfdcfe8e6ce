//! Waveform decoding, transcoding and resampling.
//!
//! Compressed formats are decoded with symphonia and written to a 16-bit
//! mono WAV; WAV files are read with hound. All waveforms are handled as mono
//! `f32` samples in `[-1.0, 1.0]`.

use std::fs::File;
use std::io::{self, Cursor};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::{debug, warn};
use rubato::{FftFixedIn, Resampler};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::AudioError;

/// Input chunk size for the FFT resampler
const RESAMPLE_CHUNK: usize = 1024;

/// Mono waveform at a known sample rate
#[derive(Debug, Clone)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Average interleaved frames down to one channel
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Decode any container symphonia can probe into a mono waveform
pub fn decode_file(path: &Path) -> Result<Waveform, AudioError> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::Transcoding("no audio track found".to_string()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder =
        symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default())?;

    let mut sample_rate = codec_params.sample_rate.unwrap_or(0);
    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping undecodable packet in {}: {}", path.display(), e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        if sample_rate == 0 {
            sample_rate = spec.rate;
        }
        let channels = spec.channels.count();

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        samples.extend(downmix(buffer.samples(), channels));
    }

    if sample_rate == 0 {
        return Err(AudioError::Transcoding(
            "sample rate not specified".to_string(),
        ));
    }

    debug!(
        "Decoded {} samples at {} Hz from {}",
        samples.len(),
        sample_rate,
        path.display()
    );

    Ok(Waveform {
        samples,
        sample_rate,
    })
}

fn wav_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Write a mono waveform as a 16-bit PCM WAV file
pub fn write_wav_file(path: &Path, waveform: &Waveform) -> Result<(), AudioError> {
    let mut writer = WavWriter::create(path, wav_spec(waveform.sample_rate))?;
    for &sample in &waveform.samples {
        writer.write_sample(to_i16(sample))?;
    }
    writer.finalize()?;
    Ok(())
}

/// Encode a mono waveform as an in-memory 16-bit PCM WAV
pub fn encode_wav_bytes(waveform: &Waveform) -> Result<Vec<u8>, AudioError> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, wav_spec(waveform.sample_rate))?;
        for &sample in &waveform.samples {
            writer.write_sample(to_i16(sample))?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Decode `source` and write it to `target` as a 16-bit mono WAV
pub fn transcode_to_wav(source: &Path, target: &Path) -> Result<(), AudioError> {
    let waveform = decode_file(source)?;
    write_wav_file(target, &waveform)?;
    debug!(
        "Transcoded {} to {} ({:.2}s)",
        source.display(),
        target.display(),
        waveform.duration_seconds()
    );
    Ok(())
}

/// Read a WAV file as mono, optionally stopping after `max_seconds`
pub fn read_wav(path: &Path, max_seconds: Option<u32>) -> Result<Waveform, AudioError> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let limit = max_seconds
        .map(|secs| spec.sample_rate as usize * secs as usize * channels)
        .unwrap_or(usize::MAX);

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .take(limit)
            .collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .samples::<i32>()
                .take(limit)
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()?
        }
    };

    Ok(Waveform {
        samples: downmix(&interleaved, channels),
        sample_rate: spec.sample_rate,
    })
}

/// Resample a mono waveform to `target_rate`
pub fn resample(waveform: Waveform, target_rate: u32) -> Result<Waveform, AudioError> {
    if waveform.sample_rate == target_rate || waveform.is_empty() {
        return Ok(Waveform {
            samples: waveform.samples,
            sample_rate: target_rate,
        });
    }

    let mut resampler = FftFixedIn::<f32>::new(
        waveform.sample_rate as usize,
        target_rate as usize,
        RESAMPLE_CHUNK,
        2,
        1,
    )
    .map_err(|e| AudioError::Transcoding(format!("failed to create resampler: {}", e)))?;

    let input = &waveform.samples;
    let expected =
        (input.len() as u64 * target_rate as u64 / waveform.sample_rate as u64) as usize;
    let delay = resampler.output_delay();
    let chunk = resampler.input_frames_next();

    let mut output = Vec::with_capacity(expected + delay);
    let mut position = 0;

    // Keep feeding zero-padded chunks until the delayed tail is flushed
    while output.len() < expected + delay {
        let mut block = vec![0.0f32; chunk];
        if position < input.len() {
            let end = (position + chunk).min(input.len());
            block[..end - position].copy_from_slice(&input[position..end]);
        }
        position += chunk;

        let wave_in = vec![block];
        let processed = resampler
            .process(&wave_in, None)
            .map_err(|e| AudioError::Transcoding(format!("resampling failed: {}", e)))?;
        if processed[0].is_empty() {
            break;
        }
        output.extend_from_slice(&processed[0]);
    }

    let samples = output.into_iter().skip(delay).take(expected).collect();
    Ok(Waveform {
        samples,
        sample_rate: target_rate,
    })
}
