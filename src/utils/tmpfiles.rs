use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{multipart, Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, warn};

pub const DEFAULT_UPLOAD_ENDPOINT: &str = "https://tmpfiles.org/api/v1/upload";
pub const DEFAULT_DOWNLOAD_BASE: &str = "https://tmpfiles.org";

const UPLOAD_FIELD: &str = "file";
const PDF_MIME: &str = "application/pdf";

// tmpfiles.org view URLs look like https://tmpfiles.org/<id>/<name>
static FILE_ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(\d+)/").expect("valid file id regex"));

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("{0}")]
    Request(#[from] reqwest::Error),

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to upload PDF")]
    Status(StatusCode),

    #[error("No upload URL received")]
    MissingUrl,

    #[error("Invalid upload URL format")]
    InvalidUrlFormat,
}

impl UploadError {
    pub fn upstream_status(&self) -> Option<StatusCode> {
        match self {
            UploadError::Status(status) => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    data: Option<UploadData>,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    url: Option<String>,
}

/// Identifies a hosted file well enough to rebuild its direct-download URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadDescriptor {
    pub file_id: String,
    pub filename: String,
}

impl UploadDescriptor {
    /// Pulls the numeric file id out of a tmpfiles.org view URL.
    pub fn from_view_url(view_url: &str, filename: &str) -> Result<Self, UploadError> {
        let file_id = FILE_ID_REGEX
            .captures(view_url)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| {
                warn!("No numeric file id in upload URL: {}", view_url);
                UploadError::InvalidUrlFormat
            })?;

        Ok(Self {
            file_id,
            filename: filename.to_string(),
        })
    }

    /// The `/dl/` form of the URL serves raw bytes instead of the HTML view page.
    pub fn download_url(&self, download_base: &str) -> String {
        format!(
            "{}/dl/{}/{}",
            download_base.trim_end_matches('/'),
            self.file_id,
            self.filename
        )
    }
}

pub struct TmpfilesService {
    client: Client,
    endpoint: String,
    download_base: String,
}

impl TmpfilesService {
    pub fn new(client: Client, endpoint: String, download_base: String) -> Self {
        Self {
            client,
            endpoint,
            download_base,
        }
    }

    /// Uploads the PDF once and returns its direct-download URL.
    pub async fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<String, UploadError> {
        let part = multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(PDF_MIME)?;
        let form = multipart::Form::new().part(UPLOAD_FIELD, part);

        debug!("Uploading {} to {}", filename, self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            error!("tmpfiles upload error: Status {}", status);
            return Err(UploadError::Status(status));
        }

        let response_text = response.text().await?;
        debug!("Received response from tmpfiles: {}", response_text);

        let parsed = serde_json::from_str::<UploadResponse>(&response_text)?;
        let view_url = parsed
            .data
            .and_then(|data| data.url)
            .ok_or(UploadError::MissingUrl)?;

        let descriptor = UploadDescriptor::from_view_url(&view_url, filename)?;
        Ok(descriptor.download_url(&self.download_base))
    }
}
