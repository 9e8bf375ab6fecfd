//! アップロードクライアント
//!
//! 画像1枚を OCR サービスへ送信し、シリアル番号と信頼度を受け取る。
//! 失敗はすべてこの境界でユーザー向けメッセージに変換し、原因はログにのみ残す。

mod http;

pub use http::HttpUploadClient;

use async_trait::async_trait;
use label_ocr_common::{ImageFile, Recognition};
use thiserror::Error;

/// 認識失敗（ユーザー向けメッセージ）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadFailure {
    /// 通信前に検出
    #[error("Please select an image file first")]
    MissingFile,

    /// 通信エラー・HTTPエラー・レスポンス不正を区別しない
    #[error("An error occurred during recognition. Please try again.")]
    Service,
}

impl UploadFailure {
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// 画像認識の呼び出し口
///
/// 1回の呼び出しにつき通信は最大1回。リトライしない。
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(&self, image: Option<&ImageFile>) -> Result<Recognition, UploadFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_messages() {
        assert_eq!(
            UploadFailure::MissingFile.message(),
            "Please select an image file first"
        );
        assert_eq!(
            UploadFailure::Service.message(),
            "An error occurred during recognition. Please try again."
        );
    }
}
