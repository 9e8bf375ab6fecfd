//! 認識ジョブの型定義
//!
//! CLIとライブラリで共有される型:
//! - Row: 1枚の画像に対応する認識ジョブ（行）
//! - RowStatus: 行のステータス（idle → processing → success / failed）
//! - Recognition: OCRサービスの成功レスポンス

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// 行ID（作成時に採番され、行の生存期間中は不変）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(pub u64);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 行ステータス
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    #[default]
    Idle,
    Processing,
    Success,
    Failed,
}

impl RowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowStatus::Idle => "idle",
            RowStatus::Processing => "processing",
            RowStatus::Success => "success",
            RowStatus::Failed => "failed",
        }
    }

    /// 認識が完了しているか（成功・失敗のどちらか）
    pub fn is_settled(&self) -> bool {
        matches!(self, RowStatus::Success | RowStatus::Failed)
    }
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ローカルで選択された画像ファイル
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFile {
    pub path: PathBuf,
    pub file_name: String,
    #[serde(default)]
    pub size: u64,
}

impl ImageFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Self {
            path,
            file_name,
            size: 0,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }
}

/// プレビュー表示用ハンドル
///
/// 画像がセットされている間だけ存在し、画像の解除・差し替え時に解放される。
/// ハンドルの発行と解放はストア側のレジストリが管理する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub token: u64,
    pub label: String,
}

/// 1件の認識ジョブ（テーブルの1行）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub id: RowId,

    #[serde(default)]
    pub image: Option<ImageFile>,

    /// プレビューは実行時リソースのため保存しない
    #[serde(skip)]
    pub preview: Option<Preview>,

    #[serde(default)]
    pub status: RowStatus,

    /// 成功時はシリアル番号、失敗時はエラーメッセージ
    #[serde(default)]
    pub result: String,

    #[serde(default)]
    pub confidence: Option<f64>,

    /// 開始からの経過秒数
    #[serde(default)]
    pub processing_time: u64,

    #[serde(default)]
    pub checked: bool,
}

impl Row {
    /// 空の行（idle、画像なし）
    pub fn empty(id: RowId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    /// エクスポート・印刷対象か（画像あり、または結果あり）
    pub fn has_content(&self) -> bool {
        self.image.is_some() || !self.result.is_empty()
    }
}

/// サーバーが返す中間画像（表示用、検証しない）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognitionImages {
    #[serde(default)]
    pub origin_image: Option<String>,
    #[serde(default)]
    pub cropped_image: Option<String>,
    #[serde(default)]
    pub stretched_image: Option<String>,
    #[serde(default)]
    pub processed_image: Option<String>,
    #[serde(default)]
    pub ocr_image: Option<String>,
}

/// アップロードAPIのレスポンスボディ
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadResponse {
    /// 省略時は成功扱い
    #[serde(default)]
    pub success: Option<bool>,

    #[serde(default)]
    pub serial_number: Option<String>,

    #[serde(default)]
    pub confidence: Option<f64>,

    #[serde(default)]
    pub processing_time: Option<f64>,

    #[serde(default)]
    pub error: Option<String>,

    #[serde(flatten)]
    pub images: RecognitionImages,
}

/// 認識成功時の結果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recognition {
    pub serial_number: String,
    pub confidence: f64,
    #[serde(default)]
    pub images: RecognitionImages,
    /// サーバー側の処理時間（秒）
    #[serde(default)]
    pub server_time: Option<f64>,
}

impl Recognition {
    /// 信頼度をパーセント表示用に丸める
    pub fn confidence_percent(&self) -> i64 {
        (self.confidence * 100.0).round() as i64
    }
}

impl UploadResponse {
    /// レスポンスボディ（JSON）をパース
    pub fn parse(body: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(body)?)
    }

    /// 成功レスポンスを Recognition に変換
    ///
    /// `success: false`、シリアル番号の欠落・空文字の場合は None
    pub fn into_recognition(self) -> Option<Recognition> {
        if self.success == Some(false) {
            return None;
        }

        let serial_number = self.serial_number.filter(|s| !s.trim().is_empty())?;

        Some(Recognition {
            serial_number,
            confidence: self.confidence.unwrap_or(0.0),
            images: self.images,
            server_time: self.processing_time,
        })
    }
}
