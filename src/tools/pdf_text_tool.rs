use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::{error, info};

use crate::api::types::{RelayResponse, FALLBACK_ERROR_MESSAGE};
use crate::utils::kome::{ExtractionError, KomeService};
use crate::utils::tmpfiles::{TmpfilesService, UploadError};

#[derive(Error, Debug)]
pub enum PdfTextError {
    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

impl PdfTextError {
    /// Status returned by whichever upstream refused the request, if any.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            PdfTextError::Upload(e) => e.upstream_status(),
            PdfTextError::Extraction(e) => e.upstream_status(),
        }
        .map(|status| status.as_u16())
    }
}

/// A file received in the `pdf` form field.
#[derive(Debug, Clone)]
pub struct PdfUpload {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

/// Names the re-uploaded file after the current unix time in milliseconds.
pub fn timestamped_filename(millis: u128) -> String {
    format!("pdf_{}.pdf", millis)
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default()
}

fn message_or_fallback(message: String) -> String {
    if message.is_empty() {
        FALLBACK_ERROR_MESSAGE.to_string()
    } else {
        message
    }
}

pub struct PdfTextTool {
    upload: TmpfilesService,
    extract: KomeService,
}

impl PdfTextTool {
    pub fn new(upload: TmpfilesService, extract: KomeService) -> Self {
        Self { upload, extract }
    }

    pub async fn execute(&self, pdf: Option<PdfUpload>) -> RelayResponse {
        let pdf = match pdf {
            Some(pdf) => pdf,
            None => return RelayResponse::missing_file(),
        };

        let filename = timestamped_filename(now_millis());
        info!(
            "Relaying {} ({} bytes, client name: {}, type: {})",
            filename,
            pdf.bytes.len(),
            pdf.file_name.as_deref().unwrap_or("-"),
            pdf.content_type.as_deref().unwrap_or("-")
        );

        match self.relay(pdf.bytes, &filename).await {
            Ok(text) => {
                info!("Extracted {} characters from {}", text.chars().count(), filename);
                RelayResponse::success(text)
            }
            Err(e) => {
                error!(
                    upstream_status = ?e.upstream_status(),
                    "Error processing {}: {}",
                    filename,
                    e
                );
                RelayResponse::bad_request(message_or_fallback(e.to_string()))
            }
        }
    }

    async fn relay(&self, bytes: Vec<u8>, filename: &str) -> Result<String, PdfTextError> {
        let download_url = self.upload.upload(bytes, filename).await?;
        info!("Uploaded {} to {}", filename, download_url);
        Ok(self.extract.extract_text(&download_url).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use reqwest::Client;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tool_for(server: &MockServer) -> PdfTextTool {
        let client = Client::new();
        PdfTextTool::new(
            TmpfilesService::new(
                client.clone(),
                format!("{}/api/v1/upload", server.uri()),
                "https://tmpfiles.org".to_string(),
            ),
            KomeService::new(client, format!("{}/pdf-to-text", server.uri())),
        )
    }

    fn sample_pdf() -> PdfUpload {
        PdfUpload {
            bytes: b"%PDF-1.7".to_vec(),
            content_type: Some("application/pdf".to_string()),
            file_name: Some("report.pdf".to_string()),
        }
    }

    #[test]
    fn filename_uses_millisecond_suffix() {
        assert_eq!(timestamped_filename(1_700_000_000_000), "pdf_1700000000000.pdf");
    }

    #[test]
    fn empty_error_text_falls_back() {
        assert_eq!(message_or_fallback(String::new()), "Error processing PDF");
        assert_eq!(message_or_fallback("boom".to_string()), "boom");
    }

    #[tokio::test]
    async fn missing_file_skips_both_relays() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let response = tool_for(&server).execute(None).await;
        assert_eq!(response, RelayResponse::missing_file());
    }

    #[tokio::test]
    async fn upload_failure_stops_before_extraction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/upload"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/pdf-to-text"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "x"})))
            .expect(0)
            .mount(&server)
            .await;

        let response = tool_for(&server).execute(Some(sample_pdf())).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.envelope.message.as_deref(), Some("Failed to upload PDF"));
    }

    #[tokio::test]
    async fn identical_upstreams_give_identical_envelopes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/upload"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": {"url": "https://tmpfiles.org/555/a.pdf"}})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/pdf-to-text"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "same"})))
            .mount(&server)
            .await;

        let tool = tool_for(&server);
        let first = tool.execute(Some(sample_pdf())).await;
        let second = tool.execute(Some(sample_pdf())).await;

        assert_eq!(first, RelayResponse::success("same"));
        assert_eq!(first, second);
    }
}
