//! CSV出力（シリアル番号一覧）
//!
//! 形式:
//! ```text
//! ,User name: alice,Date: 2024-01-01
//! Serial Number: SN123,,
//! Serial Number: N/A,,
//! ```

use super::{exportable, serial_or_na, ExportHeader, SerialRecord, NO_DATA};
use crate::error::{Error, Result};
use crate::types::{Row, RowId};
use std::io::Write;

/// 日付が空のときのファイル名
const UNKNOWN_DATE: &str = "unknown_date";

/// CSVファイル名（ocr_serial_numbers_<date>.csv）
pub fn csv_file_name(date: &str) -> String {
    let date = if date.is_empty() { UNKNOWN_DATE } else { date };
    format!("ocr_serial_numbers_{}.csv", date)
}

/// 与えられたレコードをそのままCSVに整形（フィルタしない）
pub fn render_csv<T: SerialRecord>(records: &[&T], header: &ExportHeader) -> String {
    let mut content = format!(
        ",User name: {},Date: {}\n",
        header.user_or_na(),
        header.date_or_na()
    );

    if records.is_empty() {
        content.push_str(&format!("Serial Number: {},,\n", NO_DATA));
    } else {
        for record in records {
            content.push_str(&format!("Serial Number: {},,\n", serial_or_na(*record)));
        }
    }

    content
}

/// 全行のCSV（画像または結果を持つ行のみ）
pub fn csv_for_all<T: SerialRecord>(records: &[T], header: &ExportHeader) -> String {
    render_csv(&exportable(records), header)
}

/// 1行だけのCSV
pub fn csv_for_row(rows: &[Row], id: RowId, header: &ExportHeader) -> Result<String> {
    let row = rows
        .iter()
        .find(|r| r.id == id)
        .ok_or(Error::RowNotFound(id))?;

    Ok(render_csv(&[row], header))
}

/// CSVを書き込み先へ出力
pub fn write_csv<W: Write>(writer: &mut W, content: &str) -> Result<()> {
    writer.write_all(content.as_bytes())?;
    writer.flush()?;
    Ok(())
}
