//! 印刷用テーブル
//!
//! ヘッダ行にユーザー名と日付、本文は1行につきシリアル番号1件の3列テーブル。

use super::{exportable, serial_or_na, ExportHeader, SerialRecord, NO_DATA};

const COLUMNS: usize = 3;

/// 印刷テーブルのセル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintTable {
    pub header: [String; COLUMNS],
    pub body: Vec<[String; COLUMNS]>,
}

impl PrintTable {
    /// 画像または結果を持つ行からテーブルを構築
    pub fn build<T: SerialRecord>(records: &[T], header: &ExportHeader) -> Self {
        let selected = exportable(records);

        let body = if selected.is_empty() {
            vec![body_row(NO_DATA)]
        } else {
            selected.iter().map(|r| body_row(serial_or_na(*r))).collect()
        };

        Self {
            header: [
                String::new(),
                format!("User name: {}", header.user_or_na()),
                format!("Date: {}", header.date_or_na()),
            ],
            body,
        }
    }

    fn column_widths(&self) -> [usize; COLUMNS] {
        let mut widths = [0usize; COLUMNS];
        for cells in std::iter::once(&self.header).chain(self.body.iter()) {
            for (i, cell) in cells.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
        widths
    }

    /// 罫線付きテキストに整形
    pub fn render(&self) -> String {
        let widths = self.column_widths();
        let border = {
            let parts: Vec<String> = widths.iter().map(|w| "-".repeat(w + 2)).collect();
            format!("+{}+\n", parts.join("+"))
        };

        let mut out = String::new();
        out.push_str(&border);
        out.push_str(&render_cells(&self.header, &widths));
        out.push_str(&border);
        for cells in &self.body {
            out.push_str(&render_cells(cells, &widths));
        }
        out.push_str(&border);
        out
    }
}

fn body_row(serial: &str) -> [String; COLUMNS] {
    [format!("Serial Number: {}", serial), String::new(), String::new()]
}

fn render_cells(cells: &[String; COLUMNS], widths: &[usize; COLUMNS]) -> String {
    let parts: Vec<String> = cells
        .iter()
        .zip(widths.iter())
        .map(|(cell, &w)| {
            let pad = w - cell.chars().count();
            format!(" {}{} ", cell, " ".repeat(pad))
        })
        .collect();
    format!("|{}|\n", parts.join("|"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ImageFile, Row, RowId};

    #[test]
    fn test_print_table_cells() {
        let rows = vec![
            Row {
                id: RowId(1),
                result: "SN123".to_string(),
                ..Default::default()
            },
            Row {
                id: RowId(2),
                image: Some(ImageFile::new("b.jpg")),
                ..Default::default()
            },
            Row::empty(RowId(3)),
        ];

        let table = PrintTable::build(&rows, &ExportHeader::new("alice", "2024-01-01"));

        assert_eq!(table.header[1], "User name: alice");
        assert_eq!(table.header[2], "Date: 2024-01-01");
        assert_eq!(table.body.len(), 2);
        assert_eq!(table.body[0][0], "Serial Number: SN123");
        assert_eq!(table.body[1][0], "Serial Number: N/A");
    }

    #[test]
    fn test_print_table_no_data() {
        let table = PrintTable::build::<Row>(&[], &ExportHeader::default());
        assert_eq!(table.body, vec![body_row("NO DATA")]);
        assert_eq!(table.header[1], "User name: N/A");
    }

    #[test]
    fn test_render_aligned() {
        let rows = vec![Row {
            id: RowId(1),
            result: "X".to_string(),
            ..Default::default()
        }];
        let rendered = PrintTable::build(&rows, &ExportHeader::new("u", "d")).render();
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines.len(), 5);
        let width = lines[0].chars().count();
        assert!(lines.iter().all(|l| l.chars().count() == width));
        assert!(lines[3].contains("Serial Number: X"));
    }
}
