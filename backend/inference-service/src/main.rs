/// Inference Service - HTTP Server
///
/// Buffers camera frames, classifies one frame per prediction interval with
/// a CNN ensemble and exposes its state plus API docs over HTTP.
use actix_web::{middleware as actix_middleware, web, App, HttpServer};
use inference_service::config::Config;
use inference_service::metrics::MetricsMiddleware;
use inference_service::services::{
    FrameClassifier, InferenceState, OnnxEnsemble, PredictionHistory, PredictionLoop,
    PredictionLoopConfig,
};
use inference_service::swagger::SwaggerResources;
use inference_service::{configure_api, configure_docs, logging, openapi};
use std::io;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

#[actix_web::main]
async fn main() -> io::Result<()> {
    logging::init_tracing();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Configuration loading failed: {}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting inference-service v{}", env!("CARGO_PKG_VERSION"));
    info!("Environment: {}", config.app.env);

    let swagger_resources = match &config.swagger.res_path {
        Some(path) => match SwaggerResources::load(path) {
            Ok(resources) => Some(resources),
            Err(e) => {
                error!("Swagger resources unavailable: {}", e);
                eprintln!("ERROR: Failed to load swagger resources: {}", e);
                std::process::exit(1);
            }
        },
        None => {
            info!("SWAGGER_RES_PATH not set, serving bundled Swagger UI");
            None
        }
    };

    let input_size = (
        config.inference.target_width,
        config.inference.target_height,
    );
    let model_paths = config.inference.model_paths.clone();
    let ensemble =
        match tokio::task::spawn_blocking(move || OnnxEnsemble::load(&model_paths, input_size))
            .await
        {
            Ok(Ok(ensemble)) => ensemble,
            Ok(Err(e)) => {
                error!("Model ensemble loading failed: {}", e);
                eprintln!("ERROR: Failed to load models: {}", e);
                std::process::exit(1);
            }
            Err(e) => {
                error!("Model loading task failed: {}", e);
                std::process::exit(1);
            }
        };
    info!(models = %ensemble.model_ids_joined(), "model ensemble ready");

    let history = match PredictionHistory::connect(&config.history.database_url).await {
        Ok(history) => history,
        Err(e) => {
            error!("Prediction history database unavailable: {}", e);
            eprintln!("ERROR: Failed to open {}: {}", config.history.database_url, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = history.prepare(config.history.retention).await {
        error!("Prediction history preparation failed: {}", e);
        std::process::exit(1);
    }

    let classifier: Arc<dyn FrameClassifier> = Arc::new(ensemble);
    let state = Arc::new(InferenceState::new(&config.inference, classifier).with_history(history));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let prediction_loop = PredictionLoop::new(
        Arc::clone(&state),
        PredictionLoopConfig::new(&config.inference, &config.detection),
        shutdown_rx,
    );
    let loop_handle = tokio::spawn(prediction_loop.run());

    let doc = openapi::doc(&config.app.advertised_host);
    let state_data = web::Data::new(Arc::clone(&state));
    let max_frame_bytes = config.app.max_frame_bytes;
    let bind_address = config.bind_address();

    info!(
        "HTTP server listening on {} (docs at {}/swagger/ui)",
        bind_address, config.app.advertised_host
    );

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state_data.clone())
            .app_data(web::PayloadConfig::new(max_frame_bytes))
            .wrap(MetricsMiddleware)
            .wrap(actix_middleware::Logger::default())
            .configure(configure_api)
            .configure(configure_docs(doc.clone(), swagger_resources.clone()))
    })
    .bind(&bind_address)?
    .run();

    let result = server.await;

    info!("HTTP server stopped, shutting down prediction loop");
    let _ = shutdown_tx.send(true);
    if let Err(e) = loop_handle.await {
        error!("Prediction loop task error: {}", e);
    }

    info!("inference-service shutting down");
    result
}
