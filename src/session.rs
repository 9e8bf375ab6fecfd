//! セッションファイル
//!
//! 行のスナップショットとユーザー名・日付をJSONで保存し、
//! 後から再認識やエクスポートに使う。

use crate::error::{LabelOcrError, Result};
use crate::store::RowStore;
use label_ocr_common::{ExportHeader, Row};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// 既定のセッションファイル名
pub const SESSION_FILE_NAME: &str = "label-ocr-session.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// バージョン（互換性チェック用）
    version: u32,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub rows: Vec<Row>,
}

impl Session {
    const CURRENT_VERSION: u32 = 1;

    pub fn new(header: &ExportHeader, rows: Vec<Row>) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            user: header.user.clone(),
            date: header.date.clone(),
            rows,
        }
    }

    pub fn from_store(store: &RowStore, header: &ExportHeader) -> Self {
        Self::new(header, store.snapshot())
    }

    pub fn header(&self) -> ExportHeader {
        ExportHeader::new(self.user.clone(), self.date.clone())
    }

    /// 行ストアとして復元
    pub fn into_store(self) -> RowStore {
        RowStore::from_rows(self.rows)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LabelOcrError::FileNotFound(path.display().to_string()));
        }

        let reader = BufReader::new(File::open(path)?);
        let session: Session = serde_json::from_reader(reader)?;

        // バージョンチェック
        if session.version != Self::CURRENT_VERSION {
            return Err(LabelOcrError::InvalidSession(format!(
                "未対応のバージョン {} (対応: {})",
                session.version,
                Self::CURRENT_VERSION
            )));
        }

        Ok(session)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}
