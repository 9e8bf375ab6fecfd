//! HTTP アップロード（multipart/form-data、`image` フィールド）

use super::{Recognizer, UploadFailure};
use crate::config::Config;
use crate::error::Result;
use async_trait::async_trait;
use label_ocr_common::{ImageFile, Recognition, UploadResponse};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// 診断ログ用の失敗原因（呼び出し側には出さない）
#[derive(Error, Debug)]
enum UploadError {
    #[error("画像読み込みエラー: {0}")]
    Read(#[from] std::io::Error),

    #[error("通信エラー: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTPステータス異常: {0}")]
    Status(StatusCode),

    #[error("レスポンスのパースに失敗: {0}")]
    Parse(#[from] label_ocr_common::Error),

    #[error("サーバーが認識失敗を返却: {0}")]
    Rejected(String),
}

#[derive(Clone)]
pub struct HttpUploadClient {
    endpoint: String,
    client: Client,
}

impl HttpUploadClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: Client::new(),
        }
    }

    /// 設定からクライアントを構築（timeout_seconds = 0 はタイムアウトなし）
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut builder = Client::builder();
        if config.timeout_seconds > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_seconds));
        }

        Ok(Self {
            endpoint: config.resolved_endpoint(),
            client: builder.build()?,
        })
    }

    /// エンドポイントを差し替え
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn upload(&self, image: &ImageFile) -> std::result::Result<Recognition, UploadError> {
        let bytes = tokio::fs::read(&image.path).await?;

        let part = Part::bytes(bytes)
            .file_name(image.file_name.clone())
            .mime_str(mime_for(&image.file_name))?;
        let form = Form::new().part("image", part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Status(status));
        }

        let body = response.text().await?;
        let parsed = UploadResponse::parse(&body)?;
        let reason = parsed.error.clone();

        parsed
            .into_recognition()
            .ok_or_else(|| UploadError::Rejected(reason.unwrap_or_else(|| "serial_number missing".into())))
    }
}

#[async_trait]
impl Recognizer for HttpUploadClient {
    async fn recognize(&self, image: Option<&ImageFile>) -> std::result::Result<Recognition, UploadFailure> {
        let image = image.ok_or(UploadFailure::MissingFile)?;

        match self.upload(image).await {
            Ok(recognition) => {
                tracing::debug!(
                    file = %image.file_name,
                    serial = %recognition.serial_number,
                    confidence = recognition.confidence,
                    "recognition succeeded"
                );
                Ok(recognition)
            }
            Err(e) => {
                tracing::info!(file = %image.file_name, endpoint = %self.endpoint, "upload failed: {}", e);
                Err(UploadFailure::Service)
            }
        }
    }
}

fn mime_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}
