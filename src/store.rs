//! 行ストア
//!
//! 行IDをキーにした順序付きマップ。更新は行単位のパッチを丸ごと適用する
//! （`apply_patch` は純粋関数、`RowStore::apply` はその結果で行を置き換える）。
//! 非同期ジョブからは `SharedStore`（tokio の RwLock）経由で更新する。

use crate::error::{LabelOcrError, Result};
use label_ocr_common::{ImageFile, Preview, Recognition, Row, RowId, RowStatus};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

pub type SharedStore = Arc<RwLock<RowStore>>;

/// プレビューハンドルの発行・解放を管理
#[derive(Debug, Default)]
pub struct PreviewRegistry {
    next_token: AtomicU64,
    live: Mutex<HashSet<u64>>,
}

impl PreviewRegistry {
    pub fn create(&self, image: &ImageFile) -> Preview {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed) + 1;
        if let Ok(mut live) = self.live.lock() {
            live.insert(token);
        }
        Preview {
            token,
            label: format!("{} ({} bytes)", image.file_name, image.size),
        }
    }

    /// 解放済みなら false
    pub fn revoke(&self, preview: &Preview) -> bool {
        self.live
            .lock()
            .map(|mut live| live.remove(&preview.token))
            .unwrap_or(false)
    }

    pub fn is_live(&self, preview: &Preview) -> bool {
        self.live
            .lock()
            .map(|live| live.contains(&preview.token))
            .unwrap_or(false)
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().map(|live| live.len()).unwrap_or(0)
    }
}

/// 行への部分更新
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowPatch {
    pub status: Option<RowStatus>,
    pub result: Option<String>,
    pub confidence: Option<Option<f64>>,
    pub processing_time: Option<u64>,
}

impl RowPatch {
    /// 認識開始: processing、経過時間0、前回結果をクリア
    pub fn processing() -> Self {
        Self {
            status: Some(RowStatus::Processing),
            result: Some(String::new()),
            confidence: Some(None),
            processing_time: Some(0),
        }
    }

    /// 経過時間の更新のみ
    pub fn tick(elapsed_secs: u64) -> Self {
        Self {
            processing_time: Some(elapsed_secs),
            ..Default::default()
        }
    }

    pub fn success(recognition: &Recognition) -> Self {
        Self {
            status: Some(RowStatus::Success),
            result: Some(recognition.serial_number.clone()),
            confidence: Some(Some(recognition.confidence)),
            processing_time: None,
        }
    }

    /// 失敗: メッセージを結果欄に入れ、経過時間を0に戻す
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(RowStatus::Failed),
            result: Some(message.into()),
            confidence: Some(None),
            processing_time: Some(0),
        }
    }

    /// 中断: idle に戻す
    pub fn reset() -> Self {
        Self {
            status: Some(RowStatus::Idle),
            result: Some(String::new()),
            confidence: Some(None),
            processing_time: Some(0),
        }
    }
}

/// パッチを適用した新しい行を返す
pub fn apply_patch(row: &Row, patch: &RowPatch) -> Row {
    let mut next = row.clone();
    if let Some(status) = patch.status {
        next.status = status;
    }
    if let Some(result) = &patch.result {
        next.result = result.clone();
    }
    if let Some(confidence) = patch.confidence {
        next.confidence = confidence;
    }
    if let Some(time) = patch.processing_time {
        next.processing_time = time;
    }
    next
}

#[derive(Debug)]
pub struct RowStore {
    rows: BTreeMap<RowId, Row>,
    next_id: u64,
    previews: Arc<PreviewRegistry>,
}

impl Default for RowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RowStore {
    /// 初期状態（空の行が1つ）
    pub fn new() -> Self {
        let mut store = Self::empty();
        store.add_row();
        store
    }

    /// 行なし
    pub fn empty() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 0,
            previews: Arc::new(PreviewRegistry::default()),
        }
    }

    /// 保存済みの行から復元
    ///
    /// 処理中のまま保存された行は idle に戻す。画像のある行にはプレビューを再発行する。
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let mut store = Self::empty();
        for mut row in rows {
            if row.status == RowStatus::Processing {
                row = apply_patch(&row, &RowPatch::reset());
            }
            row.preview = row.image.as_ref().map(|image| store.previews.create(image));
            store.next_id = store.next_id.max(row.id.0);
            store.rows.insert(row.id, row);
        }
        store
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(RwLock::new(self))
    }

    pub fn previews(&self) -> &Arc<PreviewRegistry> {
        &self.previews
    }

    fn allocate_id(&mut self) -> RowId {
        self.next_id += 1;
        RowId(self.next_id)
    }

    /// 空の行を末尾に追加
    pub fn add_row(&mut self) -> RowId {
        let id = self.allocate_id();
        self.rows.insert(id, Row::empty(id));
        id
    }

    /// ドロップされたファイルごとに行を追加
    ///
    /// 追加後、画像も結果も持たない行は取り除く。
    pub fn add_files(&mut self, files: Vec<ImageFile>) -> Vec<RowId> {
        let mut added = Vec::with_capacity(files.len());
        for image in files {
            let id = self.allocate_id();
            let preview = self.previews.create(&image);
            self.rows.insert(
                id,
                Row {
                    id,
                    image: Some(image),
                    preview: Some(preview),
                    ..Default::default()
                },
            );
            added.push(id);
        }

        self.rows.retain(|_, row| row.has_content());
        added
    }

    /// 行を削除（プレビューも解放）
    pub fn remove_row(&mut self, id: RowId) -> Option<Row> {
        let row = self.rows.remove(&id)?;
        if let Some(preview) = &row.preview {
            self.previews.revoke(preview);
        }
        Some(row)
    }

    /// 行に画像をセット（既存のプレビューは解放）
    pub fn attach_image(&mut self, id: RowId, image: ImageFile) -> Result<()> {
        let row = self.rows.get_mut(&id).ok_or(LabelOcrError::RowNotFound(id))?;
        if let Some(old) = row.preview.take() {
            self.previews.revoke(&old);
        }
        row.preview = Some(self.previews.create(&image));
        row.image = Some(image);
        Ok(())
    }

    /// 行から画像を外す
    pub fn remove_image(&mut self, id: RowId) -> Result<()> {
        let row = self.rows.get_mut(&id).ok_or(LabelOcrError::RowNotFound(id))?;
        if let Some(old) = row.preview.take() {
            self.previews.revoke(&old);
        }
        row.image = None;
        Ok(())
    }

    pub fn set_checked(&mut self, id: RowId, checked: bool) -> Result<()> {
        let row = self.rows.get_mut(&id).ok_or(LabelOcrError::RowNotFound(id))?;
        row.checked = checked;
        Ok(())
    }

    /// パッチを適用して行を置き換える。存在しない行（削除済み）は無視して false
    pub fn apply(&mut self, id: RowId, patch: &RowPatch) -> bool {
        match self.rows.get(&id) {
            Some(row) => {
                let next = apply_patch(row, patch);
                self.rows.insert(id, next);
                true
            }
            None => false,
        }
    }

    /// 全行を破棄して初期状態に戻す
    pub fn refresh(&mut self) {
        for row in self.rows.values() {
            if let Some(preview) = &row.preview {
                self.previews.revoke(preview);
            }
        }
        self.rows.clear();
        self.add_row();
    }

    pub fn get(&self, id: RowId) -> Option<&Row> {
        self.rows.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.values()
    }

    pub fn ids(&self) -> Vec<RowId> {
        self.rows.keys().copied().collect()
    }

    pub fn snapshot(&self) -> Vec<Row> {
        self.rows.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 処理中の行数と最大経過秒数
    pub fn processing_summary(&self) -> (usize, u64) {
        self.rows
            .values()
            .filter(|r| r.status == RowStatus::Processing)
            .fold((0, 0), |(count, max), r| (count + 1, max.max(r.processing_time)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(name: &str) -> ImageFile {
        ImageFile::new(format!("/labels/{}", name)).with_size(10)
    }

    #[test]
    fn test_new_store_has_one_idle_row() {
        let store = RowStore::new();
        assert_eq!(store.len(), 1);
        let row = store.iter().next().unwrap();
        assert_eq!(row.status, RowStatus::Idle);
        assert!(row.image.is_none());
    }

    #[test]
    fn test_add_files_appends_rows_with_images() {
        let mut store = RowStore::empty();
        let first = store.add_files(vec![image("a.jpg")]);

        let added = store.add_files(vec![image("b.jpg"), image("c.jpg"), image("d.jpg")]);
        assert_eq!(added.len(), 3);
        assert_eq!(store.len(), 4);

        for id in &added {
            let row = store.get(*id).unwrap();
            assert_eq!(row.status, RowStatus::Idle);
            assert!(row.image.is_some());
            assert!(row.preview.is_some());
            assert!(row.result.is_empty());
        }

        // 既存の行と順序は維持される
        let mut expected = first.clone();
        expected.extend(added);
        assert_eq!(store.ids(), expected);
    }

    #[test]
    fn test_add_files_drops_blank_rows() {
        let mut store = RowStore::new();
        assert_eq!(store.len(), 1);

        store.add_files(vec![image("a.jpg")]);
        assert_eq!(store.len(), 1);
        assert!(store.iter().all(|r| r.image.is_some()));
    }

    #[test]
    fn test_remove_row_keeps_others() {
        let mut store = RowStore::empty();
        let ids = store.add_files(vec![image("a.jpg"), image("b.jpg"), image("c.jpg")]);

        let removed = store.remove_row(ids[1]).expect("削除対象が存在しない");
        assert_eq!(removed.id, ids[1]);
        assert_eq!(store.ids(), vec![ids[0], ids[2]]);
        assert!(store.remove_row(ids[1]).is_none());
    }

    #[test]
    fn test_preview_released_on_replace_and_clear() {
        let mut store = RowStore::new();
        let id = store.ids()[0];

        store.attach_image(id, image("first.jpg")).unwrap();
        let first = store.get(id).unwrap().preview.clone().unwrap();
        assert!(store.previews().is_live(&first));

        store.attach_image(id, image("second.jpg")).unwrap();
        let second = store.get(id).unwrap().preview.clone().unwrap();
        assert!(!store.previews().is_live(&first));
        assert!(store.previews().is_live(&second));
        assert_eq!(store.previews().live_count(), 1);

        store.remove_image(id).unwrap();
        let row = store.get(id).unwrap();
        assert!(row.image.is_none());
        assert!(row.preview.is_none());
        assert_eq!(store.previews().live_count(), 0);
    }

    #[test]
    fn test_preview_released_on_remove_and_refresh() {
        let mut store = RowStore::empty();
        let ids = store.add_files(vec![image("a.jpg"), image("b.jpg")]);
        assert_eq!(store.previews().live_count(), 2);

        store.remove_row(ids[0]);
        assert_eq!(store.previews().live_count(), 1);

        store.refresh();
        assert_eq!(store.previews().live_count(), 0);
        assert_eq!(store.len(), 1);
        // 新しい行は新しいIDを持つ
        assert!(!ids.contains(&store.ids()[0]));
    }

    #[test]
    fn test_missing_row_errors() {
        let mut store = RowStore::empty();
        let result = store.attach_image(RowId(99), image("a.jpg"));
        assert!(matches!(result, Err(LabelOcrError::RowNotFound(RowId(99)))));
        assert!(store.set_checked(RowId(99), true).is_err());
        assert!(!store.apply(RowId(99), &RowPatch::tick(3)));
    }

    #[test]
    fn test_apply_patch_is_pure() {
        let row = Row {
            id: RowId(1),
            result: "old".to_string(),
            checked: true,
            ..Default::default()
        };

        let next = apply_patch(&row, &RowPatch::processing());
        assert_eq!(row.result, "old");
        assert_eq!(next.status, RowStatus::Processing);
        assert!(next.result.is_empty());
        assert!(next.checked);

        let failed = apply_patch(&apply_patch(&next, &RowPatch::tick(4)), &RowPatch::failed("boom"));
        assert_eq!(failed.status, RowStatus::Failed);
        assert_eq!(failed.result, "boom");
        assert_eq!(failed.processing_time, 0);
    }

    #[test]
    fn test_success_keeps_elapsed_time() {
        let recognition = Recognition {
            serial_number: "SN1".to_string(),
            confidence: 0.9,
            ..Default::default()
        };
        let row = apply_patch(&Row::empty(RowId(1)), &RowPatch::tick(3));
        let done = apply_patch(&row, &RowPatch::success(&recognition));
        assert_eq!(done.status, RowStatus::Success);
        assert_eq!(done.result, "SN1");
        assert_eq!(done.confidence, Some(0.9));
        assert_eq!(done.processing_time, 3);
    }

    #[test]
    fn test_from_rows_resets_processing() {
        let rows = vec![
            Row {
                id: RowId(5),
                image: Some(image("a.jpg")),
                status: RowStatus::Processing,
                processing_time: 7,
                ..Default::default()
            },
            Row {
                id: RowId(9),
                status: RowStatus::Success,
                result: "SN".to_string(),
                ..Default::default()
            },
        ];

        let mut store = RowStore::from_rows(rows);
        let restored = store.get(RowId(5)).unwrap();
        assert_eq!(restored.status, RowStatus::Idle);
        assert_eq!(restored.processing_time, 0);
        assert!(restored.preview.is_some());
        assert_eq!(store.get(RowId(9)).unwrap().result, "SN");

        // 採番は最大IDの続きから
        assert_eq!(store.add_row(), RowId(10));
    }

    #[test]
    fn test_processing_summary() {
        let mut store = RowStore::empty();
        let ids = store.add_files(vec![image("a.jpg"), image("b.jpg"), image("c.jpg")]);
        store.apply(ids[0], &RowPatch::processing());
        store.apply(ids[0], &RowPatch::tick(2));
        store.apply(ids[2], &RowPatch::processing());
        store.apply(ids[2], &RowPatch::tick(5));

        assert_eq!(store.processing_summary(), (2, 5));
    }
}
