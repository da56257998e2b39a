//! reqwest implementation of the remote backend.

use std::time::Duration;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use reqwest::multipart;
use tracing::debug;
use url::Url;

use super::{CreateTaskResponse, CreatedTask, RemoteBackend, RemoteError, RemoteStatus, TaskStatusResponse};
use crate::config::Settings;
use crate::images::ImagePayload;

/// Liveness probes answer fast or not at all.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Upload quality for images transcoded to JPEG.
const UPLOAD_JPEG_QUALITY: u8 = 80;

pub struct RemoteClient {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteClient {
    pub fn new(settings: &Settings) -> Result<Self, RemoteError> {
        Url::parse(&settings.remote_base_url)
            .map_err(|e| RemoteError::Protocol(format!("invalid base URL: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout))
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| RemoteError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            base_url: settings.remote_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn require_success(resp: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let detail: String = resp
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(200)
            .collect();
        Err(RemoteError::Status {
            status: status.as_u16(),
            detail,
        })
    }
}

#[async_trait]
impl RemoteBackend for RemoteClient {
    async fn create_task(
        &self,
        requirements: &str,
        template_style: &str,
        language: &str,
        images: &[ImagePayload],
    ) -> Result<CreatedTask, RemoteError> {
        let mut form = multipart::Form::new()
            .text("user_requirements", requirements.to_string())
            .text("template_style", template_style.to_string())
            .text("language", language.to_string());

        for (index, image) in images.iter().enumerate() {
            let part = multipart::Part::bytes(jpeg_bytes(image)?)
                .file_name(format!("image_{}.jpg", index))
                .mime_str("image/jpeg")
                .map_err(|e| RemoteError::Protocol(e.to_string()))?;
            form = form.part("files", part);
        }

        debug!(image_count = images.len(), "submitting generation task");
        let resp = self
            .client
            .post(self.url("biography/create"))
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;
        let resp = Self::require_success(resp).await?;

        let payload: CreateTaskResponse = resp
            .json()
            .await
            .map_err(|e| RemoteError::Protocol(e.to_string()))?;
        Ok(CreatedTask {
            task_id: payload.task_id,
            message: payload.message,
        })
    }

    async fn task_status(&self, task_id: &str) -> Result<RemoteStatus, RemoteError> {
        let resp = self
            .client
            .get(self.url(&format!("biography/status/{}", task_id)))
            .send()
            .await
            .map_err(transport_error)?;
        let resp = Self::require_success(resp).await?;

        let payload: TaskStatusResponse = resp
            .json()
            .await
            .map_err(|e| RemoteError::Protocol(e.to_string()))?;
        payload.into_status()
    }

    async fn download_document(&self, task_id: &str) -> Result<Vec<u8>, RemoteError> {
        let resp = self
            .client
            .get(self.url(&format!("biography/download/{}", task_id)))
            .send()
            .await
            .map_err(transport_error)?;
        let resp = Self::require_success(resp).await?;

        let bytes = resp.bytes().await.map_err(transport_error)?;
        if bytes.is_empty() {
            return Err(RemoteError::Protocol("empty document payload".to_string()));
        }
        Ok(bytes.to_vec())
    }

    async fn check_health(&self) -> bool {
        match self
            .client
            .get(self.url("health"))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

fn transport_error(err: reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        RemoteError::Timeout(err.to_string())
    } else {
        RemoteError::Connection(err.to_string())
    }
}

/// The service expects JPEG uploads; anything else is transcoded.
fn jpeg_bytes(image: &ImagePayload) -> Result<Vec<u8>, RemoteError> {
    if image.mime_type == "image/jpeg" {
        return Ok(image.bytes.clone());
    }

    let decoded = image::load_from_memory(&image.bytes)
        .map_err(|e| RemoteError::Protocol(format!("cannot transcode {}: {}", image.path.display(), e)))?;
    let rgb = decoded.to_rgb8();
    let mut jpeg = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut jpeg, UPLOAD_JPEG_QUALITY))
        .map_err(|e| RemoteError::Protocol(format!("cannot transcode {}: {}", image.path.display(), e)))?;
    Ok(jpeg)
}
