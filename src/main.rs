mod config;
mod docx;
mod ocr;
mod pages;
mod pdf;
mod processor;
mod render;
mod spreadsheet;

use std::{io, time::Instant};

use actix_cors::Cors;
use actix_multipart::{Field, Multipart};
use actix_web::{
    error::{BlockingError, ResponseError},
    get,
    http::{
        header::{self, ContentDisposition, ContentType, DispositionParam, DispositionType},
        StatusCode,
    },
    post, web, App, HttpResponse, HttpServer, Result as ActixResult,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use futures_util::TryStreamExt;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::{fs::File as AsyncFile, io::AsyncWriteExt};
use tracing::{debug, error, info, instrument, warn};
use tracing_actix_web::TracingLogger;
use uuid::Uuid;

use config::{Config, LogFormat};
use ocr::OcrError;
use processor::{is_allowed_file, DocumentKind, ExtractError};

/// Multipart field that carries the uploaded document.
const DOCUMENT_FIELD: &str = "document";
const TEXT_FILE_NAME: &str = "extracted_text.txt";

/// Camera capture posted by the upload page.
#[derive(Debug, Deserialize)]
struct CameraCapture {
    /// `data:image/<fmt>;base64,<payload>`
    image: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct OcrResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct DownloadForm {
    text: String,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_ms: u64,
    timestamp: String,
    ocr_engine: String,
}

#[derive(Error, Debug)]
enum UserError {
    #[error("Internal server error: {0}")]
    InternalError(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractError),
}

impl ResponseError for UserError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), "Request failed: {}", self);
        } else {
            warn!(status = status.as_u16(), "Request rejected: {}", self);
        }
        HttpResponse::build(status)
            .insert_header(ContentType::json())
            .json(serde_json::json!({ "error": self.to_string() }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            UserError::BadRequest(_) => StatusCode::BAD_REQUEST,
            UserError::Extraction(ExtractError::Unsupported(_)) => StatusCode::NOT_IMPLEMENTED,
            UserError::Extraction(ExtractError::Ocr(OcrError::EngineUnavailable { .. })) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            UserError::Extraction(_) | UserError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<io::Error> for UserError {
    fn from(err: io::Error) -> Self {
        UserError::InternalError(format!("IO error: {}", err))
    }
}

impl From<BlockingError> for UserError {
    fn from(err: BlockingError) -> Self {
        UserError::InternalError(format!("Blocking task failed: {}", err))
    }
}

/// Upload form with file and camera capture.
#[get("/")]
async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(pages::index_page())
}

/// Health check endpoint
#[get("/health")]
#[instrument(skip(start_time, config))]
async fn health_check(
    start_time: web::Data<Instant>,
    config: web::Data<Config>,
) -> ActixResult<HttpResponse> {
    let uptime = start_time.elapsed().as_millis() as u64;
    let response = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_ms: uptime,
        timestamp: chrono::Utc::now().to_rfc3339(),
        ocr_engine: config.ocr.command.display().to_string(),
    };

    info!("Health check requested, uptime: {}ms", uptime);
    Ok(HttpResponse::Ok().json(response))
}

/// Extracts the text of the file posted in the `document` field and renders
/// it in the result page.
#[post("/upload")]
#[instrument(skip(config, payload))]
async fn upload_handler(
    config: web::Data<Config>,
    mut payload: Multipart,
) -> Result<HttpResponse, UserError> {
    let request_id = Uuid::new_v4();
    let start_time = Instant::now();

    info!(request_id = %request_id, "Starting document upload request");

    let mut upload = None;
    loop {
        // A body that is not multipart, or ends before a document part,
        // simply carries no file.
        let mut field = match payload.try_next().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                debug!(request_id = %request_id, error = %e, "Multipart body ended early");
                break;
            }
        };
        if field.name() != Some(DOCUMENT_FIELD) {
            debug!(request_id = %request_id, field = ?field.name(), "Skipping multipart field");
            continue;
        }

        let Some(file_name) = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string)
        else {
            debug!(request_id = %request_id, "Document part has no filename");
            break;
        };
        if file_name.is_empty() || !is_allowed_file(&file_name) {
            return Err(UserError::BadRequest("File type not supported".to_string()));
        }

        let kind = DocumentKind::from_file_name(&file_name)?;
        let (stored, file_size) = store_upload(&config, request_id, &file_name, &mut field).await?;
        upload = Some((file_name, kind, stored, file_size));
        break;
    }

    let Some((file_name, kind, stored, file_size)) = upload else {
        return Err(UserError::BadRequest("No file uploaded".to_string()));
    };

    debug!(
        request_id = %request_id,
        file_name = %file_name,
        kind = ?kind,
        file_size = file_size,
        "Stored upload, extracting"
    );

    let path = stored.path().to_path_buf();
    let ocr = config.ocr.clone();
    let extracted = web::block(move || processor::extract_file(kind, &path, &ocr)).await?;
    // Drop the stored upload before reporting either outcome.
    drop(stored);

    let text = extracted?;
    info!(
        request_id = %request_id,
        file_name = %file_name,
        kind = ?kind,
        file_size = file_size,
        processing_time_ms = start_time.elapsed().as_millis() as u64,
        text_length = text.len(),
        "Successfully extracted text from file"
    );

    Ok(HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(pages::result_page(&file_name, &text)))
}

/// Streams a multipart field into a uniquely named file in the upload
/// directory. The file is deleted when the returned guard drops.
async fn store_upload(
    config: &Config,
    request_id: Uuid,
    file_name: &str,
    field: &mut Field,
) -> Result<(NamedTempFile, usize), UserError> {
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .map_err(|e| UserError::InternalError(format!("Failed to create upload directory: {}", e)))?;

    let extension = processor::extension(file_name).unwrap_or_default();
    let upload = tempfile::Builder::new()
        .prefix(&format!("{}-", request_id))
        .suffix(&format!(".{}", extension))
        .tempfile_in(&config.upload_dir)
        .map_err(|e| UserError::InternalError(format!("Failed to create upload file: {}", e)))?;
    let mut file = AsyncFile::from_std(upload.reopen()?);

    let mut file_size = 0;
    while let Some(chunk) = field.try_next().await.map_err(|e| {
        UserError::BadRequest(format!("Failed to read chunk from multipart field: {}", e))
    })? {
        file_size += chunk.len();
        if file_size > config.max_upload_bytes {
            return Err(UserError::BadRequest(format!(
                "File too large (max {} bytes)",
                config.max_upload_bytes
            )));
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    Ok((upload, file_size))
}

/// OCR for a base64 camera snapshot. Nothing is kept on disk.
#[post("/upload_camera")]
#[instrument(skip(config, capture))]
async fn upload_camera_handler(
    config: web::Data<Config>,
    capture: web::Json<CameraCapture>,
) -> Result<HttpResponse, UserError> {
    let request_id = Uuid::new_v4();
    let start_time = Instant::now();

    let bytes = decode_data_uri(&capture.image)?;
    info!(
        request_id = %request_id,
        image_size = bytes.len(),
        "Starting camera OCR request"
    );

    let ocr = config.ocr.clone();
    let text = web::block(move || processor::recognize_image_bytes(&bytes, &ocr)).await??;

    info!(
        request_id = %request_id,
        processing_time_ms = start_time.elapsed().as_millis() as u64,
        text_length = text.len(),
        "Successfully recognized camera image"
    );
    Ok(HttpResponse::Ok().json(OcrResponse { text }))
}

/// Payload of a `data:<mime>;base64,<payload>` URI.
fn decode_data_uri(data_uri: &str) -> Result<Vec<u8>, UserError> {
    let (_, payload) = data_uri.split_once(',').ok_or_else(|| {
        UserError::BadRequest("Image must be a data URI (data:image/<fmt>;base64,...)".to_string())
    })?;
    STANDARD
        .decode(payload.trim())
        .map_err(|e| UserError::BadRequest(format!("Invalid base64 image payload: {}", e)))
}

#[post("/download_txt")]
#[instrument(skip(form))]
async fn download_txt_handler(form: web::Form<DownloadForm>) -> ActixResult<HttpResponse> {
    let text = form.into_inner().text;
    debug!(text_length = text.len(), "Serving text download");
    Ok(attachment(
        TEXT_FILE_NAME,
        "text/plain; charset=utf-8",
        text.into_bytes(),
    ))
}

/// Renders the submitted text into a per-request PDF and returns it as
/// `result.pdf`. The rendered file is removed once its bytes are read.
#[post("/download_pdf")]
#[instrument(skip(config, form))]
async fn download_pdf_handler(
    config: web::Data<Config>,
    form: web::Form<DownloadForm>,
) -> Result<HttpResponse, UserError> {
    let request_id = Uuid::new_v4();
    let start_time = Instant::now();

    tokio::fs::create_dir_all(&config.artifact_dir).await?;
    let artifact = tempfile::Builder::new()
        .prefix(&format!("{}-", request_id))
        .suffix(&format!("-{}", render::DEFAULT_FILE_NAME))
        .tempfile_in(&config.artifact_dir)?;

    let path = artifact.path().to_path_buf();
    let text = form.into_inner().text;
    web::block(move || render::render_text_to_pdf(&text, &path))
        .await?
        .map_err(|e| UserError::InternalError(format!("Failed to render PDF: {}", e)))?;

    let body = tokio::fs::read(artifact.path()).await?;
    drop(artifact);

    info!(
        request_id = %request_id,
        pdf_size = body.len(),
        processing_time_ms = start_time.elapsed().as_millis() as u64,
        "Rendered PDF download"
    );
    Ok(attachment(render::DEFAULT_FILE_NAME, "application/pdf", body))
}

fn attachment(file_name: &str, content_type: &str, body: Vec<u8>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(content_type)
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(file_name.to_string())],
        })
        .body(body)
}

/// Routes plus body-size limits for the JSON and form extractors.
fn configure_routes(cfg: &mut web::ServiceConfig, config: &Config) {
    // Base64 inflates the camera image by a third.
    let json_limit = config.max_upload_bytes / 3 * 4 + 1024;

    cfg.app_data(
        web::JsonConfig::default()
            .limit(json_limit)
            .error_handler(|err, _req| {
                UserError::BadRequest(format!("Invalid JSON body: {}", err)).into()
            }),
    )
    .app_data(
        web::FormConfig::default()
            .limit(config.max_upload_bytes)
            .error_handler(|err, _req| {
                UserError::BadRequest(format!("Invalid form body: {}", err)).into()
            }),
    )
    .service(index)
    .service(health_check)
    .service(upload_handler)
    .service(upload_camera_handler)
    .service(download_txt_handler)
    .service(download_pdf_handler);
}

fn init_tracing(format: LogFormat) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info,actix_server=info".into()),
        )
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Pretty => subscriber.pretty().init(),
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();
    let config =
        Config::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    init_tracing(config.log_format);

    let start_time = Instant::now();

    std::fs::create_dir_all(&config.upload_dir)?;
    std::fs::create_dir_all(&config.artifact_dir)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "🚀 Document Text Extraction API Started"
    );
    info!("🔤 OCR engine: {} (lang {})", config.ocr.command.display(), config.ocr.language);
    info!("📂 Uploads: {}", config.upload_dir.display());
    info!("🌐 Web API listening on http://{}:{}", config.host, config.port);
    info!("📋 Available endpoints:");
    info!("  GET  / - Upload form");
    info!("  GET  /health - Health check");
    info!("  POST /upload - Extract text from an uploaded document");
    info!("  POST /upload_camera - OCR a base64 camera snapshot");
    info!("  POST /download_txt - Download text as extracted_text.txt");
    info!("  POST /download_pdf - Download text as result.pdf");
    info!("---");

    let bind_address = (config.host.clone(), config.port);
    let workers = config.workers;
    let config = web::Data::new(config);

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(config.clone())
            .app_data(web::Data::new(start_time))
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_header(header::CONTENT_TYPE)
                    .max_age(3600),
            )
            .wrap(TracingLogger::default())
            .configure(|cfg| configure_routes(cfg, &config))
    });
    if let Some(workers) = workers {
        server = server.workers(workers);
    }

    server.bind(bind_address)?.run().await
}
