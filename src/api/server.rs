use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use reqwest::Client;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use super::types::{
    cors_header_values, RelayResponse, METHOD_NOT_ALLOWED_MESSAGE, NOT_FOUND_MESSAGE,
};
use crate::tools::pdf_text_tool::{PdfTextTool, PdfUpload};
use crate::utils::kome::{KomeService, DEFAULT_EXTRACT_ENDPOINT};
use crate::utils::tmpfiles::{TmpfilesService, DEFAULT_DOWNLOAD_BASE, DEFAULT_UPLOAD_ENDPOINT};

const PDF_FIELD: &str = "pdf";

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    pub upload_endpoint: String,
    pub download_base: String,
    pub extract_endpoint: String,
    pub timeout: Duration,
    pub max_upload_bytes: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            upload_endpoint: DEFAULT_UPLOAD_ENDPOINT.to_string(),
            download_base: DEFAULT_DOWNLOAD_BASE.to_string(),
            extract_endpoint: DEFAULT_EXTRACT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(60),
            max_upload_bytes: 100 * 1024 * 1024,
        }
    }
}

impl RelayConfig {
    /// Rejects endpoints that are not absolute URLs before anything is bound.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("upload endpoint", &self.upload_endpoint),
            ("download base", &self.download_base),
            ("extract endpoint", &self.extract_endpoint),
        ] {
            url::Url::parse(value).with_context(|| format!("invalid {}: {}", name, value))?;
        }
        if self.timeout.is_zero() {
            warn!("Upstream timeout is zero; every relay call will fail");
        }
        Ok(())
    }

    pub fn build_tool(&self) -> Result<PdfTextTool> {
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .context("failed to create HTTP client")?;

        Ok(PdfTextTool::new(
            TmpfilesService::new(
                client.clone(),
                self.upload_endpoint.clone(),
                self.download_base.clone(),
            ),
            KomeService::new(client, self.extract_endpoint.clone()),
        ))
    }
}

pub fn router(tool: Arc<PdfTextTool>, max_upload_bytes: usize) -> Router {
    let mut router = Router::new()
        .route(
            "/pdf",
            post(handle_pdf)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .fallback(fallback)
        .with_state(tool)
        .layer(DefaultBodyLimit::max(max_upload_bytes));

    for (name, value) in cors_header_values() {
        router = router.layer(SetResponseHeaderLayer::overriding(name, value));
    }

    router.layer(TraceLayer::new_for_http())
}

async fn handle_pdf(
    State(tool): State<Arc<PdfTextTool>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> RelayResponse {
    let multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            debug!("Request body is not multipart: {}", rejection);
            return RelayResponse::missing_file();
        }
    };

    match read_pdf_field(multipart).await {
        Ok(pdf) => tool.execute(pdf).await,
        Err(message) => RelayResponse::bad_request(message),
    }
}

async fn read_pdf_field(mut multipart: Multipart) -> Result<Option<PdfUpload>, String> {
    while let Some(field) = multipart.next_field().await.map_err(|e| e.body_text())? {
        if field.name() != Some(PDF_FIELD) {
            continue;
        }

        let content_type = field.content_type().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| e.body_text())?;

        return Ok(Some(PdfUpload {
            bytes: bytes.to_vec(),
            content_type,
            file_name,
        }));
    }

    Ok(None)
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn method_not_allowed() -> RelayResponse {
    RelayResponse::failure(StatusCode::METHOD_NOT_ALLOWED, METHOD_NOT_ALLOWED_MESSAGE)
}

async fn fallback(method: Method) -> Response {
    if method == Method::OPTIONS {
        return preflight().await.into_response();
    }
    RelayResponse::failure(StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE).into_response()
}

pub struct RelayServer {
    config: RelayConfig,
}

impl RelayServer {
    pub fn new(config: RelayConfig) -> Self {
        Self { config }
    }

    pub async fn start(&self) -> Result<()> {
        self.config.validate()?;
        let tool = Arc::new(self.config.build_tool()?);
        let app = router(tool, self.config.max_upload_bytes);

        let listener = tokio::net::TcpListener::bind((self.config.host.as_str(), self.config.port))
            .await
            .with_context(|| format!("failed to bind {}:{}", self.config.host, self.config.port))?;
        let addr = listener.local_addr().context("listener has no local address")?;

        info!("PDF relay listening on http://{}", addr);
        info!("Uploading to {}", self.config.upload_endpoint);
        info!("Extracting via {}", self.config.extract_endpoint);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("server error")?;

        info!("PDF relay stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining in-flight requests");
}
