//! エクスポート用の射影（CSV・印刷テーブル）
//!
//! 行のスナップショットから純粋に生成する。処理中のジョブは待たない。

pub mod csv;
pub mod print;

use crate::types::Row;

/// 値が空のときの表示
pub const NOT_AVAILABLE: &str = "N/A";

/// 対象行が1件もないときのシリアル番号表示
pub const NO_DATA: &str = "NO DATA";

/// 出力ヘッダ（ユーザー名と日付）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportHeader {
    pub user: String,
    pub date: String,
}

impl ExportHeader {
    pub fn new(user: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            date: date.into(),
        }
    }

    pub fn user_or_na(&self) -> &str {
        or_na(&self.user)
    }

    pub fn date_or_na(&self) -> &str {
        or_na(&self.date)
    }
}

/// シリアル番号を持つレコードのトレイト（Row以外の型にも対応）
pub trait SerialRecord {
    fn serial(&self) -> &str;
    fn has_content(&self) -> bool;
}

impl SerialRecord for Row {
    fn serial(&self) -> &str {
        &self.result
    }

    fn has_content(&self) -> bool {
        Row::has_content(self)
    }
}

/// エクスポート対象の行を抽出（画像あり、または結果あり）
pub fn exportable<T: SerialRecord>(records: &[T]) -> Vec<&T> {
    records.iter().filter(|r| r.has_content()).collect()
}

/// シリアル番号の表示値（空なら N/A）
pub fn serial_or_na<T: SerialRecord>(record: &T) -> &str {
    or_na(record.serial())
}

fn or_na(value: &str) -> &str {
    if value.is_empty() {
        NOT_AVAILABLE
    } else {
        value
    }
}
