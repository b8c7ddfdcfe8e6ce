// API route handlers for Emotion API
//
// This module contains the route handlers for the Emotion API.
// It implements the actual HTTP endpoints for the API.

use actix_multipart::Multipart;
use actix_web::{error::JsonPayloadError, get, post, web, HttpRequest, HttpResponse, ResponseError};
use log::{debug, error, info};
use std::time::Instant;

use crate::audio::AudioProcessor;
use crate::config::{defaults, HandlerConfig};
use crate::emotion::EmotionService;
use crate::error::HandlerError;
use crate::handlers::form::extract_audio_upload;
use crate::metrics::Metrics;
use crate::models::{PredictionResponse, ServiceInfo, TextRequest};

/// Register every route and the JSON error handler
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .service(root)
        .service(predict_text)
        .service(predict_audio)
        .service(metrics_endpoint);
}

/// Malformed JSON bodies get the same `{detail}` shape as other errors
fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    HandlerError::InvalidBody(err.to_string()).into()
}

/// Record the outcome of a request against its endpoint
async fn record_request<T>(
    metrics: &Metrics,
    endpoint: &str,
    result: &Result<T, HandlerError>,
    start_time: Instant,
) {
    let status = match result {
        Ok(_) => "200".to_string(),
        Err(e) => e.status_code().as_u16().to_string(),
    };
    metrics
        .record_http_request(endpoint, "POST", &status, start_time.elapsed().as_secs_f64())
        .await;
}

/// Liveness and service information
#[get("/")]
pub async fn root() -> HttpResponse {
    HttpResponse::Ok().json(ServiceInfo {
        status: defaults::SERVICE_STATUS,
        version: env!("CARGO_PKG_VERSION"),
        designer: defaults::DESIGNER,
    })
}

/// Classify the emotions of a text
///
/// The text is trimmed, then rejected if empty or longer than the configured
/// limit (counted in characters).
#[post("/predict/text")]
pub async fn predict_text(
    body: web::Json<TextRequest>,
    service: web::Data<EmotionService>,
    config: web::Data<HandlerConfig>,
    metrics: web::Data<Metrics>,
) -> Result<HttpResponse, HandlerError> {
    let start_time = Instant::now();
    let result = analyze_text(&body.text, &service, &config).await;
    record_request(&metrics, "/predict/text", &result, start_time).await;

    Ok(HttpResponse::Ok().json(result?))
}

async fn analyze_text(
    text: &str,
    service: &EmotionService,
    config: &HandlerConfig,
) -> Result<PredictionResponse, HandlerError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(HandlerError::EmptyText);
    }

    let length = text.chars().count();
    if length > config.max_text_length {
        return Err(HandlerError::TextTooLong(length, config.max_text_length));
    }

    let result = service.analyze(text).await.map_err(|e| {
        error!("Text analysis failed: {}", e);
        HandlerError::from(e)
    })?;

    debug!(
        "Text classified as {} ({:.3})",
        result.dominant_emotion.name(),
        result.confidence
    );
    Ok(PredictionResponse::new(result, service.label_locale()))
}

/// Transcribe an uploaded audio file and classify the transcript
///
/// The upload is stored in a temporary folder that is removed once the
/// request completes, whatever the outcome.
#[post("/predict/audio")]
pub async fn predict_audio(
    form: Multipart,
    service: web::Data<EmotionService>,
    processor: web::Data<AudioProcessor>,
    config: web::Data<HandlerConfig>,
    metrics: web::Data<Metrics>,
) -> Result<HttpResponse, HandlerError> {
    let start_time = Instant::now();
    let result = analyze_audio(form, &service, &processor, &config, &metrics).await;
    record_request(&metrics, "/predict/audio", &result, start_time).await;

    Ok(HttpResponse::Ok().json(result?))
}

async fn analyze_audio(
    form: Multipart,
    service: &EmotionService,
    processor: &AudioProcessor,
    config: &HandlerConfig,
    metrics: &Metrics,
) -> Result<PredictionResponse, HandlerError> {
    let upload = extract_audio_upload(form, config, metrics).await?;
    let audio_file = upload.audio_file();

    if !processor.validate_audio_file(audio_file).await {
        return Err(HandlerError::InvalidAudioFile);
    }

    let text = processor.to_text(audio_file).await?;
    info!("Upload {} transcribed ({} characters)", upload.paths().id, text.chars().count());

    let result = service.analyze(&text).await?;
    Ok(PredictionResponse::new(result, service.label_locale()))
}

/// Metrics endpoint handler
#[get("/metrics")]
pub async fn metrics_endpoint(metrics: web::Data<Metrics>) -> HttpResponse {
    match metrics.export().await {
        Ok(data) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4; charset=utf-8")
            .body(data),
        Err(e) => {
            error!("Failed to export metrics: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}
