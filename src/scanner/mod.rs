use crate::error::{LabelOcrError, Result};
use label_ocr_common::ImageFile;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "JPG", "JPEG", "PNG", "BMP"];

fn is_image_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&ext)
}

fn is_image_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| is_image_extension(&ext.to_string_lossy()))
        .unwrap_or(false)
}

fn image_file(path: &Path) -> ImageFile {
    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    ImageFile::new(path).with_size(size)
}

pub fn scan_folder(folder: &Path) -> Result<Vec<ImageFile>> {
    if !folder.exists() {
        return Err(LabelOcrError::FolderNotFound(folder.display().to_string()));
    }

    let mut images = Vec::new();

    for entry in WalkDir::new(folder)
        .max_depth(1)  // 直下のみ（再帰しない）
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if path.is_file() && is_image_path(path) {
            images.push(image_file(path));
        }
    }

    // ファイル名でソート
    images.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    Ok(images)
}

/// コマンドラインで渡されたパスから画像を集める
///
/// - フォルダは直下の画像をスキャン
/// - ファイルは拡張子に関係なくそのまま採用（ドロップされたファイルと同じ扱い）
pub fn collect_images(paths: &[PathBuf]) -> Result<Vec<ImageFile>> {
    let mut images = Vec::new();

    for path in paths {
        if path.is_dir() {
            images.extend(scan_folder(path)?);
        } else if path.is_file() {
            images.push(image_file(path));
        } else {
            return Err(LabelOcrError::FileNotFound(path.display().to_string()));
        }
    }

    Ok(images)
}
