//! label-ocr
//!
//! 部品ラベル画像を OCR サービスへ送信し、認識されたシリアル番号を行単位で管理する。

pub mod batch;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod progress;
pub mod runner;
pub mod scanner;
pub mod session;
pub mod store;

pub use batch::{start_batch, BatchRun, Selection};
pub use client::{HttpUploadClient, Recognizer, UploadFailure};
pub use runner::{JobOutcome, JobRunner, RunnerError};
pub use store::{RowPatch, RowStore, SharedStore};
