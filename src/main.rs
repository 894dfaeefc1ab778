use actix_multipart::form::bytes::Bytes;
use actix_multipart::form::MultipartForm;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpResponse, HttpServer};
use anyhow::Context;
use clap::Parser;
use log::{error, info};
use serde_json::json;
use std::env;
use std::panic;
use std::path::PathBuf;
use std::sync::Arc;

use crate::classifier::OnnxEmotionClassifier;
use crate::error::PipelineError;
use crate::localizer::RustfaceLocalizer;
use crate::pipeline::InferencePipeline;

mod classifier;
mod error;
mod localizer;
mod pipeline;
mod preprocess;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value_t = 8000)]
    port: u16,

    /// Path to the emotion classifier ONNX model.
    #[arg(long, default_value = "models/emotion_model.onnx")]
    model: PathBuf,

    /// Path to the SeetaFace frontal face detection model.
    #[arg(long, default_value = "models/seeta_fd_frontal_v1.0.bin")]
    face_model: PathBuf,
}

#[derive(Debug, MultipartForm)]
struct PredictForm {
    file: Bytes,
}

struct AppState {
    pipeline: Arc<InferencePipeline>,
}

async fn predict_emotion(
    state: web::Data<AppState>,
    MultipartForm(form): MultipartForm<PredictForm>,
) -> HttpResponse {
    let pipeline = state.pipeline.clone();
    let image_bytes = form.file.data;

    // The whole pipeline is CPU-bound; keep it off the event loop.
    let result = web::block(move || pipeline.predict(&image_bytes)).await;

    match result {
        Ok(Ok(prediction)) => HttpResponse::Ok().json(prediction),
        Ok(Err(err)) => error_response(&err),
        Err(err) => {
            error!("worker pool failure: {err}");
            HttpResponse::InternalServerError().json(json!({"error": "internal error"}))
        }
    }
}

/// Maps pipeline failures to the wire format.
///
/// The no-face case stays HTTP 200 with an error body; the existing frontend
/// depends on that shape. Undecodable uploads are the client's fault;
/// everything else is ours.
fn error_response(err: &PipelineError) -> HttpResponse {
    match err {
        PipelineError::NoFaceDetected => {
            HttpResponse::Ok().json(json!({"error": "No face detected"}))
        }
        PipelineError::Decode(_) => {
            HttpResponse::BadRequest().json(json!({"error": err.to_string()}))
        }
        _ => {
            error!("inference failed: {err}");
            HttpResponse::InternalServerError().json(json!({"error": err.to_string()}))
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    panic::set_hook(Box::new(|panic_info| {
        error!("CRASH: Application panicked: {:?}", panic_info);
    }));

    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info,actix_web=info");
    }
    env_logger::init();

    let args = Args::parse();

    ort::init()
        .commit()
        .context("failed to initialize ONNX Runtime")?;

    // Both models load exactly once, before the server binds. A missing or
    // corrupt artifact aborts startup; serving without a model is never an
    // option.
    let classifier = OnnxEmotionClassifier::load(&args.model)
        .context("emotion classifier unavailable, refusing to start")?;
    let detector = RustfaceLocalizer::load(&args.face_model)
        .context("face localizer unavailable, refusing to start")?;

    let pipeline = Arc::new(InferencePipeline::new(
        Arc::new(detector),
        Arc::new(classifier),
    ));
    let state = web::Data::new(AppState { pipeline });

    info!("Starting server on port {}...", args.port);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(state.clone())
            .route(
                "/",
                web::get().to(|| async {
                    HttpResponse::Ok().json(json!({"message": "Emotion inference server"}))
                }),
            )
            .route(
                "/ping",
                web::get().to(|| async { HttpResponse::Ok().body("pong") }),
            )
            .route("/predict_emotion/", web::post().to(predict_emotion))
    })
    .bind(("0.0.0.0", args.port))?
    .run()
    .await?;

    Ok(())
}
