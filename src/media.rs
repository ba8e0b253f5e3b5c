use reqwest::{
    StatusCode,
    multipart,
};
use serde::Deserialize;
use tracing::debug;

/// Endpoints for the three external media services: track upload, theme
/// text generation and audio generation. All opaque HTTP; no retry, no
/// backoff — a failure surfaces straight to the caller.
#[derive(Clone, Debug)]
pub struct MediaConfig {
    pub upload_url: String,
    pub upload_preset: String,
    pub theme_url: String,
    pub theme_api_key: String,
    pub audio_url: String,
    pub audio_api_key: String,
}

impl MediaConfig {
    /// Reads the service endpoints from the environment; `None` when the
    /// media pipeline is not configured (submission by URL still works).
    pub fn from_env() -> Option<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Some(Self {
            upload_url: var("MURAL_UPLOAD_URL")?,
            upload_preset: var("MURAL_UPLOAD_PRESET")?,
            theme_url: var("MURAL_THEME_URL")?,
            theme_api_key: var("MURAL_THEME_API_KEY")?,
            audio_url: var("MURAL_AUDIO_URL")?,
            audio_api_key: var("MURAL_AUDIO_API_KEY")?,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("media request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("media service responded with {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("invalid media service payload: {0}")]
    Decode(String),
}

#[derive(Clone)]
pub struct MediaClient {
    config: MediaConfig,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct UploadResponseDto {
    secure_url: String,
}

#[derive(Deserialize)]
struct ThemeResponseDto {
    theme: String,
}

impl MediaClient {
    pub fn new(config: MediaConfig) -> Result<Self, MediaError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self { config, http })
    }

    /// Uploads generated audio as multipart form data; returns the public
    /// URL the host assigns.
    pub async fn upload_track(
        &self,
        audio: Vec<u8>,
        file_name: &str,
    ) -> Result<String, MediaError> {
        let part = multipart::Part::bytes(audio)
            .file_name(file_name.to_owned())
            .mime_str("audio/mpeg")?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("upload_preset", self.config.upload_preset.clone());
        let res = self
            .http
            .post(&self.config.upload_url)
            .multipart(form)
            .send()
            .await?;
        let res = error_for_status(res).await?;
        let dto: UploadResponseDto = res
            .json()
            .await
            .map_err(|e| MediaError::Decode(format!("upload response: {e}")))?;
        debug!(url = %dto.secure_url, "track uploaded");
        Ok(dto.secure_url)
    }

    /// Asks the generative-text endpoint for a short theme matching the
    /// prompt.
    pub async fn generate_theme(&self, prompt: &str) -> Result<String, MediaError> {
        let res = self
            .http
            .post(&self.config.theme_url)
            .bearer_auth(&self.config.theme_api_key)
            .json(&serde_json::json!({ "prompt": prompt }))
            .send()
            .await?;
        let res = error_for_status(res).await?;
        let dto: ThemeResponseDto = res
            .json()
            .await
            .map_err(|e| MediaError::Decode(format!("theme response: {e}")))?;
        Ok(dto.theme.trim().to_owned())
    }

    /// Generates a track for the prompt; returns the raw audio bytes.
    pub async fn generate_audio(&self, prompt: &str) -> Result<Vec<u8>, MediaError> {
        let res = self
            .http
            .post(&self.config.audio_url)
            .bearer_auth(&self.config.audio_api_key)
            .json(&serde_json::json!({ "inputs": prompt }))
            .send()
            .await?;
        let res = error_for_status(res).await?;
        let bytes = res.bytes().await?;
        Ok(bytes.to_vec())
    }
}

async fn error_for_status(res: reqwest::Response) -> Result<reqwest::Response, MediaError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res
        .text()
        .await
        .unwrap_or_else(|_| "<unavailable body>".to_owned());
    Err(MediaError::Status { status, body })
}
