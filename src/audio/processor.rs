// Audio processor for Emotion API
//
// Converts an uploaded file into a transcript. Non-WAV input is transcoded to a
// temporary WAV next to the upload; that file is removed on every path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use uuid::Uuid;

use super::decode::{self, Waveform};
use super::{file_extension, is_supported_format, AudioError, TARGET_SAMPLE_RATE};
use crate::file_utils::TempFileGuard;
use crate::metrics::Metrics;
use crate::speech::SpeechRecognizer;

/// Audio-to-text front-end shared by the audio handler
pub struct AudioProcessor {
    recognizer: Arc<dyn SpeechRecognizer>,
    language: String,
    metrics: Metrics,
}

impl AudioProcessor {
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>, language: String, metrics: Metrics) -> Self {
        Self {
            recognizer,
            language,
            metrics,
        }
    }

    /// Locale passed to the recognizer
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Transcribe a supported audio file
    ///
    /// # Errors
    ///
    /// * `UnsupportedFormat` when the extension is not WAV, MP3, OGG or M4A
    /// * `Transcoding` when decoding or resampling fails
    /// * `EmptyAudio` when the file holds no samples
    /// * `Speech` when recognition finds nothing or the backend fails
    pub async fn to_text(&self, file_path: &Path) -> Result<String, AudioError> {
        if !is_supported_format(file_path) {
            return Err(AudioError::UnsupportedFormat(
                file_extension(file_path).unwrap_or_default(),
            ));
        }

        let path = file_path.to_path_buf();
        let waveform = tokio::task::spawn_blocking(move || -> Result<Waveform, AudioError> {
            let waveform = load_waveform(&path, None)?;
            decode::resample(waveform, TARGET_SAMPLE_RATE)
        })
        .await
        .map_err(|e| AudioError::Transcoding(format!("decoding task failed: {}", e)))??;

        if waveform.is_empty() {
            return Err(AudioError::EmptyAudio);
        }

        debug!(
            "Prepared {:.2}s of audio for recognition",
            waveform.duration_seconds()
        );
        let wav = decode::encode_wav_bytes(&waveform)?;

        let backend = self.recognizer.name();
        let start = Instant::now();
        let result = self
            .recognizer
            .recognize(wav, waveform.sample_rate, &self.language)
            .await;
        let duration = start.elapsed().as_secs_f64();

        let status = match &result {
            Ok(_) => "success",
            Err(crate::speech::SpeechError::NoSpeech) => "no_speech",
            Err(_) => "error",
        };
        self.metrics
            .record_transcription(backend, status, duration)
            .await;

        let text = result?;
        info!(
            "Transcribed {} with {} in {:.2}s",
            file_path.display(),
            backend,
            duration
        );
        Ok(text)
    }

    /// Best-effort check that a file is decodable audio
    ///
    /// Loads at most one second of audio. Any failure yields `false`.
    pub async fn validate_audio_file(&self, file_path: &Path) -> bool {
        let path = file_path.to_path_buf();
        match tokio::task::spawn_blocking(move || probe_audio(&path)).await {
            Ok(valid) => valid,
            Err(e) => {
                warn!("Audio validation task failed: {}", e);
                false
            }
        }
    }
}

fn probe_audio(path: &Path) -> bool {
    if !is_supported_format(path) {
        debug!("Rejected {}: unsupported extension", path.display());
        return false;
    }

    match load_waveform(path, Some(1)) {
        Ok(waveform) => !waveform.is_empty(),
        Err(e) => {
            debug!("Rejected {}: {}", path.display(), e);
            false
        }
    }
}

/// Path of the temporary WAV produced for a non-WAV upload
fn converted_wav_path(source: &Path) -> PathBuf {
    source.with_file_name(format!("converted_{}.wav", Uuid::new_v4()))
}

/// Load a file as mono, transcoding through a temporary WAV when needed
fn load_waveform(path: &Path, max_seconds: Option<u32>) -> Result<Waveform, AudioError> {
    if file_extension(path).as_deref() == Some("wav") {
        return decode::read_wav(path, max_seconds);
    }

    let temp = TempFileGuard::new(converted_wav_path(path));
    decode::transcode_to_wav(path, temp.path())?;
    decode::read_wav(temp.path(), max_seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{create_null_exporter, Metrics};
    use crate::speech::SpeechError;
    use async_trait::async_trait;
    use std::io::Cursor;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records the last request and answers with a fixed transcript
    struct FakeRecognizer {
        transcript: Option<String>,
        last_request: Mutex<Option<(u32, String, usize)>>,
    }

    impl FakeRecognizer {
        fn new(transcript: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                transcript: transcript.map(String::from),
                last_request: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl SpeechRecognizer for FakeRecognizer {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn recognize(
            &self,
            wav: Vec<u8>,
            sample_rate: u32,
            language: &str,
        ) -> Result<String, SpeechError> {
            let frames = hound::WavReader::new(Cursor::new(wav))
                .map(|r| r.len() as usize)
                .unwrap_or(0);
            *self.last_request.lock().unwrap() = Some((sample_rate, language.to_string(), frames));
            self.transcript.clone().ok_or(SpeechError::NoSpeech)
        }
    }

    fn processor(recognizer: Arc<FakeRecognizer>) -> AudioProcessor {
        AudioProcessor::new(
            recognizer,
            "ar-AR".to_string(),
            Metrics::new(create_null_exporter()),
        )
    }

    fn write_tone(path: &Path, sample_rate: u32, frames: usize) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let sample = (t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 0.5;
            writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[tokio::test]
    async fn test_wav_is_resampled_before_recognition() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.wav");
        write_tone(&path, 8_000, 4_000);

        let recognizer = FakeRecognizer::new(Some("أنا سعيد جدا"));
        let processor = processor(recognizer.clone());

        let text = processor.to_text(&path).await.unwrap();
        assert_eq!(text, "أنا سعيد جدا");

        let (rate, language, frames) = recognizer.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(rate, TARGET_SAMPLE_RATE);
        assert_eq!(language, "ar-AR");
        assert_eq!(frames, 8_000);
    }

    #[tokio::test]
    async fn test_non_wav_is_transcoded_and_temp_file_removed() {
        let dir = TempDir::new().unwrap();
        // WAV content under an .ogg name: symphonia probes by content
        let path = dir.path().join("clip.ogg");
        write_tone(&path, 16_000, 1_600);

        let processor = processor(FakeRecognizer::new(Some("مرحبا")));
        assert!(processor.validate_audio_file(&path).await);
        assert_eq!(processor.to_text(&path).await.unwrap(), "مرحبا");

        let remaining: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(remaining, vec![std::ffi::OsString::from("clip.ogg")]);
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();

        let processor = processor(FakeRecognizer::new(Some("x")));
        assert!(!processor.validate_audio_file(&path).await);
        assert!(matches!(
            processor.to_text(&path).await,
            Err(AudioError::UnsupportedFormat(ext)) if ext == "txt"
        ));
    }

    #[tokio::test]
    async fn test_zero_byte_wav_is_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.wav");
        std::fs::write(&path, b"").unwrap();

        let processor = processor(FakeRecognizer::new(Some("x")));
        assert!(!processor.validate_audio_file(&path).await);
        assert!(matches!(
            processor.to_text(&path).await,
            Err(AudioError::Transcoding(_))
        ));
    }

    #[tokio::test]
    async fn test_header_only_wav_is_empty_audio() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("silent.wav");
        write_tone(&path, 16_000, 0);

        let processor = processor(FakeRecognizer::new(Some("x")));
        assert!(!processor.validate_audio_file(&path).await);
        assert!(matches!(
            processor.to_text(&path).await,
            Err(AudioError::EmptyAudio)
        ));
    }

    #[tokio::test]
    async fn test_no_speech_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.WAV");
        write_tone(&path, 16_000, 1_600);

        let processor = processor(FakeRecognizer::new(None));
        assert!(matches!(
            processor.to_text(&path).await,
            Err(AudioError::Speech(SpeechError::NoSpeech))
        ));
    }
}
