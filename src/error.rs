use label_ocr_common::RowId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabelOcrError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("画像が見つかりません: {0}")]
    NoImagesFound(String),

    #[error("行が見つかりません: {0}")]
    RowNotFound(RowId),

    #[error("HTTPクライアントエラー: {0}")]
    Http(#[from] reqwest::Error),

    #[error("セッションファイルが不正: {0}")]
    InvalidSession(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] label_ocr_common::Error),
}

pub type Result<T> = std::result::Result<T, LabelOcrError>;
