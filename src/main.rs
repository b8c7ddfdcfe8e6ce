use actix_web::{middleware::Logger, web, App, HttpServer};
use env_logger::Env;
use log::{error, info, warn};
use std::sync::Arc;

use emotion_api::config_validator::EmotionConfigValidator;
use emotion_api::config::ModelSource;
use emotion_api::metrics::create_metrics_exporter;
use emotion_api::speech::create_recognizer;
use emotion_api::{
    config_loader, configure, AudioProcessor, Cors, EmotionService, Metrics, OnnxModelLoader,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if std::env::args().any(|arg| arg == "--generate-config") {
        print!("{}", EmotionConfigValidator::generate_sample_config());
        return Ok(());
    }

    // Initialize logger
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    // Configuration file values fill in unset environment variables
    config_loader::load_config();

    let config = match EmotionConfigValidator::validate_and_load() {
        Ok(config) => config,
        Err(_) => {
            error!("Invalid configuration, refusing to start");
            std::process::exit(1);
        }
    };

    // Initialize metrics
    let metrics = Metrics::new(create_metrics_exporter(&config.metrics.exporter_type));

    // Create tmp directory if it doesn't exist
    if let Err(e) = config.handler.ensure_temp_dir() {
        warn!(
            "Failed to create temp directory {}: {}",
            config.handler.temp_dir.display(),
            e
        );
    }

    match &config.model.source {
        ModelSource::Directory(dir) => info!("Emotion model directory: {}", dir.display()),
        ModelSource::Hub { repo, .. } => info!("Emotion model repository: {}", repo),
    }

    let loader = Arc::new(OnnxModelLoader::new(config.model.clone()));
    let service = match EmotionService::start(loader, &config.model, metrics.clone()).await {
        Ok(service) => web::Data::new(service),
        Err(e) => {
            error!("Failed to load emotion model: {}", e);
            std::process::exit(1);
        }
    };

    let recognizer = match create_recognizer(&config.speech) {
        Ok(recognizer) => recognizer,
        Err(e) => {
            error!("Failed to initialize speech recognition: {}", e);
            std::process::exit(1);
        }
    };
    let processor = web::Data::new(AudioProcessor::new(
        recognizer,
        config.speech.language.clone(),
        metrics.clone(),
    ));

    let server = config.server.clone();
    let handler_config = config.handler.clone();
    let origins = server.allowed_origins();
    let workers = server.worker_count();

    info!(
        "Starting Emotion API server on http://{}:{}",
        server.host, server.port
    );
    info!("Using temp directory: {}", handler_config.temp_dir.display());
    info!("Model residency: {:?}", service.residency());
    info!(
        "Speech backend: {:?} ({})",
        config.speech.backend,
        processor.language()
    );
    info!("Metrics exporter: {}", config.metrics.exporter_type);
    info!("HTTP workers: {}", workers);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(Cors::new(&origins))
            .app_data(service.clone())
            .app_data(processor.clone())
            .app_data(web::Data::new(handler_config.clone()))
            .app_data(web::Data::new(metrics.clone()))
            .configure(configure)
    })
    .workers(workers)
    .bind((server.host.as_str(), server.port))?
    .client_disconnect_timeout(server.timeout)
    .keep_alive(server.keep_alive)
    .run()
    .await
}
