//! End-to-end tests of the HTTP API with a deterministic classifier and a
//! scripted speech recognizer.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use actix_web::http::{header, Method, StatusCode};
use actix_web::{test, web, App};
use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;

use emotion_api::config::{defaults, LabelLocale, ModelConfig, ModelResidency, ModelSource};
use emotion_api::emotion::{
    ClassifierError, EmotionDistribution, ModelLoader, SequenceClassifier, NUM_EMOTIONS,
};
use emotion_api::error::messages;
use emotion_api::metrics::create_prometheus_exporter;
use emotion_api::retry::RetryPolicy;
use emotion_api::speech::{SpeechError, SpeechRecognizer};
use emotion_api::{configure, AudioProcessor, Cors, EmotionService, HandlerConfig, Metrics};

/// Logits derived from the characters of the input
struct CharacterClassifier;

impl SequenceClassifier for CharacterClassifier {
    fn predict(&self, text: &str) -> Result<EmotionDistribution, ClassifierError> {
        let mut logits = [0.0f32; NUM_EMOTIONS];
        for (i, c) in text.chars().enumerate() {
            logits[(c as usize + i) % NUM_EMOTIONS] += 0.25;
        }
        EmotionDistribution::from_logits(&logits)
            .ok_or_else(|| ClassifierError::Inference("bad logits".to_string()))
    }
}

struct CountingLoader {
    loads: Arc<AtomicUsize>,
}

impl ModelLoader for CountingLoader {
    fn load(&self) -> Result<Arc<dyn SequenceClassifier>, ClassifierError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(CharacterClassifier))
    }
}

/// Returns a fixed transcript, or "no speech" when none is set
struct ScriptedRecognizer {
    transcript: Option<String>,
}

#[async_trait]
impl SpeechRecognizer for ScriptedRecognizer {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn recognize(
        &self,
        _wav: Vec<u8>,
        _sample_rate: u32,
        _language: &str,
    ) -> Result<String, SpeechError> {
        self.transcript.clone().ok_or(SpeechError::NoSpeech)
    }
}

struct TestContext {
    service: web::Data<EmotionService>,
    processor: web::Data<AudioProcessor>,
    handler: HandlerConfig,
    metrics: Metrics,
    loads: Arc<AtomicUsize>,
    _temp: TempDir,
}

impl TestContext {
    async fn new(transcript: Option<&str>, residency: ModelResidency) -> Self {
        Self::with_limits(transcript, residency, 1024 * 1024).await
    }

    async fn with_limits(
        transcript: Option<&str>,
        residency: ModelResidency,
        max_file_size: usize,
    ) -> Self {
        let temp = TempDir::new().expect("temp dir");
        let metrics = Metrics::new(create_prometheus_exporter());
        let loads = Arc::new(AtomicUsize::new(0));

        let model_config = ModelConfig {
            source: ModelSource::Directory(PathBuf::from("unused")),
            model_file: "model.onnx".to_string(),
            tokenizer_file: "tokenizer.json".to_string(),
            max_sequence_length: 512,
            intra_threads: 1,
            residency,
            label_locale: LabelLocale::English,
            load_retry: RetryPolicy::fixed(1, Duration::ZERO),
        };
        let loader = Arc::new(CountingLoader {
            loads: Arc::clone(&loads),
        });
        let service = EmotionService::start(loader, &model_config, metrics.clone())
            .await
            .expect("service starts");

        let recognizer = Arc::new(ScriptedRecognizer {
            transcript: transcript.map(String::from),
        });
        let processor = AudioProcessor::new(recognizer, "ar-AR".to_string(), metrics.clone());

        Self {
            service: web::Data::new(service),
            processor: web::Data::new(processor),
            handler: HandlerConfig {
                temp_dir: temp.path().join("uploads"),
                max_file_size,
                max_text_length: 512,
            },
            metrics,
            loads,
            _temp: temp,
        }
    }

    /// Number of entries left in the upload directory
    fn leftover_uploads(&self) -> usize {
        std::fs::read_dir(&self.handler.temp_dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

macro_rules! init_app {
    ($ctx:expr) => {
        test::init_service(
            App::new()
                .wrap(Cors::new(defaults::CORS_ORIGINS))
                .app_data($ctx.service.clone())
                .app_data($ctx.processor.clone())
                .app_data(web::Data::new($ctx.handler.clone()))
                .app_data(web::Data::new($ctx.metrics.clone()))
                .configure(configure),
        )
        .await
    };
}

const BOUNDARY: &str = "emotion-api-test-boundary";

fn multipart_request(field: &str, filename: &str, content: &[u8]) -> test::TestRequest {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n",
            BOUNDARY, field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    test::TestRequest::post()
        .uri("/predict/audio")
        .insert_header((
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(body)
}

fn wav_clip(sample_rate: u32, seconds: f32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("wav writer");
        let frames = (sample_rate as f32 * seconds) as usize;
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let sample = (t * 300.0 * 2.0 * std::f32::consts::PI).sin() * 0.4;
            writer
                .write_sample((sample * i16::MAX as f32) as i16)
                .expect("sample");
        }
        writer.finalize().expect("finalize");
    }
    cursor.into_inner()
}

fn assert_distribution(body: &Value) {
    let emotions = body["emotions"].as_object().expect("emotions object");
    assert_eq!(emotions.len(), NUM_EMOTIONS);

    let values: Vec<f64> = emotions.values().map(|v| v.as_f64().expect("number")).collect();
    assert!(values.iter().all(|p| (0.0..=1.0).contains(p)));
    let sum: f64 = values.iter().sum();
    assert!((sum - 1.0).abs() < 1e-5, "probabilities sum to {}", sum);

    let dominant = body["dominant_emotion"].as_str().expect("dominant label");
    let confidence = body["confidence"].as_f64().expect("confidence");
    assert_eq!(emotions[dominant].as_f64(), Some(confidence));
    assert!(values.iter().all(|p| *p <= confidence));
}

fn assert_no_uploads_left(path: &Path) {
    let count = std::fs::read_dir(path).map(|e| e.count()).unwrap_or(0);
    assert_eq!(count, 0, "uploads left behind in {}", path.display());
}

#[actix_web::test]
async fn test_root_reports_service_info() {
    let ctx = TestContext::new(None, ModelResidency::Resident).await;
    let app = init_app!(ctx);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "Emotion Detection API is running");
    assert_eq!(body["designer"], "Abdullah Alawiss");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[actix_web::test]
async fn test_text_prediction() {
    let ctx = TestContext::new(None, ModelResidency::Resident).await;
    let app = init_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/predict/text")
        .set_json(json!({ "text": "  أنا سعيد جدا اليوم  " }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["text"], "أنا سعيد جدا اليوم");
    assert_distribution(&body);
}

#[actix_web::test]
async fn test_text_prediction_is_repeatable() {
    let ctx = TestContext::new(None, ModelResidency::Resident).await;
    let app = init_app!(ctx);

    let mut answers = Vec::new();
    for _ in 0..2 {
        let req = test::TestRequest::post()
            .uri("/predict/text")
            .set_json(json!({ "text": "لماذا تأخرت؟" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        answers.push((body["dominant_emotion"].clone(), body["confidence"].clone()));
    }
    assert_eq!(answers[0], answers[1]);
    assert_eq!(ctx.loads.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn test_empty_text_is_rejected() {
    let ctx = TestContext::new(None, ModelResidency::Resident).await;
    let app = init_app!(ctx);

    for text in ["", "   \n\t "] {
        let req = test::TestRequest::post()
            .uri("/predict/text")
            .set_json(json!({ "text": text }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["detail"], messages::TEXT_EMPTY);
    }
}

#[actix_web::test]
async fn test_text_length_limit_counts_characters() {
    let ctx = TestContext::new(None, ModelResidency::Resident).await;
    let app = init_app!(ctx);

    // Arabic letters are two bytes each; the limit is in characters
    let at_limit = "ب".repeat(512);
    let req = test::TestRequest::post()
        .uri("/predict/text")
        .set_json(json!({ "text": at_limit }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let too_long = "ب".repeat(513);
    let req = test::TestRequest::post()
        .uri("/predict/text")
        .set_json(json!({ "text": too_long }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], messages::TEXT_TOO_LONG);
}

#[actix_web::test]
async fn test_malformed_body_gets_detail() {
    let ctx = TestContext::new(None, ModelResidency::Resident).await;
    let app = init_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/predict/text")
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload("{\"message\": 1}")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], messages::INVALID_REQUEST);

    let req = test::TestRequest::post()
        .uri("/predict/text")
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload("{\"text\": ")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], messages::INVALID_REQUEST);
}

#[actix_web::test]
async fn test_on_demand_model_loads_per_request() {
    let ctx = TestContext::new(None, ModelResidency::OnDemand).await;
    assert_eq!(ctx.service.residency(), ModelResidency::OnDemand);
    assert_eq!(ctx.loads.load(Ordering::SeqCst), 0);
    let app = init_app!(ctx);

    for _ in 0..3 {
        let req = test::TestRequest::post()
            .uri("/predict/text")
            .set_json(json!({ "text": "مرحبا" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }
    assert_eq!(ctx.loads.load(Ordering::SeqCst), 3);
}

#[actix_web::test]
async fn test_audio_prediction() {
    let ctx = TestContext::new(Some("أشعر بالخوف"), ModelResidency::Resident).await;
    assert_eq!(ctx.processor.language(), "ar-AR");
    let app = init_app!(ctx);

    let req = multipart_request("file", "voice.wav", &wav_clip(8_000, 0.5)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["text"], "أشعر بالخوف");
    assert_distribution(&body);
    assert_eq!(ctx.leftover_uploads(), 0);
}

#[actix_web::test]
async fn test_text_file_upload_is_invalid() {
    let ctx = TestContext::new(Some("x"), ModelResidency::Resident).await;
    let app = init_app!(ctx);

    let req = multipart_request("file", "notes.txt", b"just some text").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], messages::FILE_INVALID);
    assert_no_uploads_left(&ctx.handler.temp_dir);
}

#[actix_web::test]
async fn test_zero_byte_wav_is_rejected() {
    let ctx = TestContext::new(Some("x"), ModelResidency::Resident).await;
    let app = init_app!(ctx);

    let req = multipart_request("file", "empty.wav", b"").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], messages::FILE_INVALID);
    assert_no_uploads_left(&ctx.handler.temp_dir);
}

#[actix_web::test]
async fn test_corrupt_wav_is_invalid() {
    let ctx = TestContext::new(Some("x"), ModelResidency::Resident).await;
    let app = init_app!(ctx);

    let req = multipart_request("file", "broken.wav", b"RIFF....WAVEjunk").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], messages::FILE_INVALID);
    assert_no_uploads_left(&ctx.handler.temp_dir);
}

#[actix_web::test]
async fn test_no_speech_is_reported() {
    let ctx = TestContext::new(None, ModelResidency::Resident).await;
    let app = init_app!(ctx);

    let req = multipart_request("file", "silence.wav", &wav_clip(16_000, 0.5)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], messages::SPEECH_RECOGNITION);
    assert_no_uploads_left(&ctx.handler.temp_dir);
}

#[actix_web::test]
async fn test_unselected_file_field() {
    let ctx = TestContext::new(Some("x"), ModelResidency::Resident).await;
    let app = init_app!(ctx);

    let req = multipart_request("file", "", b"").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], messages::FILE_EMPTY);
    assert_no_uploads_left(&ctx.handler.temp_dir);
}

#[actix_web::test]
async fn test_missing_file_field() {
    let ctx = TestContext::new(Some("x"), ModelResidency::Resident).await;
    let app = init_app!(ctx);

    let req = multipart_request("attachment", "voice.wav", &wav_clip(16_000, 0.1)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], messages::FILE_EMPTY);
}

#[actix_web::test]
async fn test_oversized_upload() {
    let ctx = TestContext::with_limits(Some("x"), ModelResidency::Resident, 1024).await;
    let app = init_app!(ctx);

    let req = multipart_request("file", "long.wav", &wav_clip(16_000, 1.0)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], messages::FILE_TOO_LARGE);
    assert_no_uploads_left(&ctx.handler.temp_dir);
}

#[actix_web::test]
async fn test_cors_preflight_for_preview_deployment() {
    let ctx = TestContext::new(None, ModelResidency::Resident).await;
    let app = init_app!(ctx);

    let origin = "https://emotion-pr-42.vercel.app";
    let req = test::TestRequest::default()
        .method(Method::OPTIONS)
        .uri("/predict/text")
        .insert_header((header::ORIGIN, origin))
        .insert_header((header::ACCESS_CONTROL_REQUEST_METHOD, "POST"))
        .insert_header((header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let headers = resp.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        origin
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
        "true"
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_HEADERS).unwrap(),
        "content-type"
    );
}

#[actix_web::test]
async fn test_cors_ignores_unknown_origins() {
    let ctx = TestContext::new(None, ModelResidency::Resident).await;
    let app = init_app!(ctx);

    let req = test::TestRequest::get()
        .uri("/")
        .insert_header((header::ORIGIN, "https://attacker.example"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());

    let req = test::TestRequest::get()
        .uri("/")
        .insert_header((header::ORIGIN, "http://localhost:3000"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(
        resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:3000"
    );
}

#[actix_web::test]
async fn test_metrics_endpoint_exports_requests() {
    let ctx = TestContext::new(None, ModelResidency::Resident).await;
    let app = init_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/predict/text")
        .set_json(json!({ "text": "" }))
        .to_request();
    test::call_service(&app, req).await;

    let resp =
        test::call_service(&app, test::TestRequest::get().uri("/metrics").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = String::from_utf8(test::read_body(resp).await.to_vec()).expect("utf8");
    assert!(body.contains("http_requests_total"));
    assert!(body.contains("status=\"400\""));
}
