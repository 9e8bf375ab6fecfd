//! CSV・印刷出力（CLI版）

use crate::error::Result;
use label_ocr_common::export::csv::write_csv;
use label_ocr_common::{csv_file_name, csv_for_all, csv_for_row, ExportHeader, PrintTable, Row, RowId};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// 出力先がディレクトリなら既定のファイル名を付ける
fn output_path_for_csv(output: &Path, date: &str) -> PathBuf {
    if output.is_dir() || output.extension().is_none() {
        output.join(csv_file_name(date))
    } else {
        output.to_path_buf()
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut writer = BufWriter::new(File::create(path)?);
    write_csv(&mut writer, content)?;
    Ok(())
}

/// 全行のCSVを出力
pub fn export_csv(rows: &[Row], header: &ExportHeader, output: &Path) -> Result<PathBuf> {
    let path = output_path_for_csv(output, &header.date);
    write_file(&path, &csv_for_all(rows, header))?;
    Ok(path)
}

/// 1行分のCSVを出力
pub fn export_row_csv(rows: &[Row], id: RowId, header: &ExportHeader, output: &Path) -> Result<PathBuf> {
    let content = csv_for_row(rows, id, header)?;
    let path = output_path_for_csv(output, &header.date);
    write_file(&path, &content)?;
    Ok(path)
}

/// 印刷用テーブルのテキスト
pub fn print_view(rows: &[Row], header: &ExportHeader) -> String {
    PrintTable::build(rows, header).render()
}
