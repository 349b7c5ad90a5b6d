use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

pub const DEFAULT_EXTRACT_ENDPOINT: &str = "https://api.kome.ai/api/tools/pdf-to-text";

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("{0}")]
    Request(#[from] reqwest::Error),

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to extract text from PDF")]
    Status(StatusCode),

    #[error("No text extracted from PDF")]
    MissingText,
}

impl ExtractionError {
    pub fn upstream_status(&self) -> Option<StatusCode> {
        match self {
            ExtractionError::Status(status) => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ExtractRequest<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    text: Option<String>,
}

pub struct KomeService {
    client: Client,
    endpoint: String,
}

impl KomeService {
    pub fn new(client: Client, endpoint: String) -> Self {
        Self { client, endpoint }
    }

    /// Asks kome.ai to fetch the PDF at `pdf_url` and returns its text untouched.
    pub async fn extract_text(&self, pdf_url: &str) -> Result<String, ExtractionError> {
        debug!("Requesting text extraction for {}", pdf_url);

        let response = self
            .client
            .post(&self.endpoint)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&ExtractRequest { url: pdf_url })
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            error!("kome.ai extraction error: Status {}", status);
            return Err(ExtractionError::Status(status));
        }

        let response_text = response.text().await?;
        debug!("Received {} bytes from kome.ai", response_text.len());

        serde_json::from_str::<ExtractResponse>(&response_text)?
            .text
            .ok_or(ExtractionError::MissingText)
    }
}
