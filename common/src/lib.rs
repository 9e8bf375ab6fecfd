//! Label OCR Common Library
//!
//! CLIと認識ジョブ管理で共有される型とエクスポート射影

pub mod types;
pub mod error;
pub mod export;

pub use types::{ImageFile, Preview, Recognition, RecognitionImages, Row, RowId, RowStatus, UploadResponse};
pub use error::{Error, Result};
pub use export::{ExportHeader, SerialRecord};
pub use export::csv::{csv_file_name, csv_for_all, csv_for_row, render_csv};
pub use export::print::PrintTable;
