//! Object-storage collaborator for driver and vehicle photos. The host is an
//! external imgbb-style API; this side only knows how to hand a file over and
//! get the hosted URL back.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::error::{AppError, AppResult};

const IMGBB_ENDPOINT: &str = "https://api.imgbb.com/1/upload";

#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Upload an image, returning the publicly hosted URL.
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> AppResult<String>;
}

pub struct ImgbbClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    success: bool,
    data: Option<UploadData>,
    error: Option<UploadError>,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    url: String,
}

#[derive(Debug, Deserialize)]
struct UploadError {
    message: Option<String>,
}

impl ImgbbClient {
    pub fn new(api_key: String) -> Self {
        Self::with_endpoint(api_key, IMGBB_ENDPOINT)
    }

    pub fn with_endpoint(api_key: String, endpoint: &str) -> Self {
        Self { http: reqwest::Client::new(), api_key, endpoint: endpoint.to_string() }
    }
}

#[async_trait]
impl ImageHost for ImgbbClient {
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> AppResult<String> {
        let part = Part::bytes(bytes).file_name(filename.to_string());
        let form = Form::new().part("image", part);
        let resp = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::upstream("image_host_error".into(), format!("upload request failed: {e}")))?;

        let status = resp.status();
        let body: UploadResponse = resp
            .json()
            .await
            .map_err(|e| AppError::upstream("image_host_error".into(), format!("malformed upload response: {e}")))?;

        if !status.is_success() || !body.success {
            let detail = body
                .error
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("upload rejected with status {status}"));
            return Err(AppError::upstream("image_host_error".into(), detail));
        }
        body.data
            .map(|d| d.url)
            .ok_or_else(|| AppError::upstream("image_host_error", "upload response missing url"))
    }
}
