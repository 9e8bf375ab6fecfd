//! ジョブランナー（行ごとの認識処理）
//!
//! 状態遷移: idle → processing → success / failed
//!
//! - 開始時に行が画像を持っていなければ拒否し、状態は変えない
//! - 処理中は1秒ごとに経過時間を行へ書き込む（表示用、通信には影響しない）
//! - 行ごとに進行中のジョブは最大1つ。処理中の行で再開始した場合は
//!   前のジョブをキャンセルしてやり直す（前のジョブの結果は捨てる）
//! - 行の削除は進行中のジョブをキャンセルしてから行う
//!
//! ロック順序は常に ストア → ジョブ表。

use crate::client::{Recognizer, UploadFailure};
use crate::store::{RowPatch, SharedStore};
use label_ocr_common::{ImageFile, Recognition, Row, RowId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// 経過時間の更新間隔
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// 入力エラー（通知のみで状態は変えない）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunnerError {
    #[error("Please add an image first")]
    NoImage(RowId),
}

/// ジョブの終了結果
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Succeeded(Recognition),
    Failed(UploadFailure),
    /// キャンセルまたは行の削除
    Cancelled,
    /// 同じ行で新しいジョブが開始された
    Superseded,
}

struct JobHandle {
    token: CancellationToken,
    generation: u64,
}

type JobTable = Arc<Mutex<HashMap<RowId, JobHandle>>>;

#[derive(Clone)]
pub struct JobRunner {
    store: SharedStore,
    recognizer: Arc<dyn Recognizer>,
    jobs: JobTable,
    generation: Arc<AtomicU64>,
    tick_period: Duration,
}

impl JobRunner {
    pub fn new(store: SharedStore, recognizer: Arc<dyn Recognizer>) -> Self {
        Self {
            store,
            recognizer,
            jobs: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
            tick_period: TICK_PERIOD,
        }
    }

    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// 行の認識を開始
    pub async fn start(&self, row_id: RowId) -> Result<JoinHandle<JobOutcome>, RunnerError> {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let token = CancellationToken::new();

        let image = {
            let mut store = self.store.write().await;
            let image = match store.get(row_id).and_then(|r| r.image.clone()) {
                Some(image) => image,
                None => return Err(RunnerError::NoImage(row_id)),
            };

            if let Some(previous) = self.register(row_id, generation, token.clone()) {
                tracing::info!(row = %row_id, "restarting recognition, previous job cancelled");
                previous.token.cancel();
            }
            store.apply(row_id, &RowPatch::processing());
            image
        };

        tracing::info!(row = %row_id, file = %image.file_name, "recognition started");

        let runner = self.clone();
        Ok(tokio::spawn(async move {
            runner.run_job(row_id, generation, image, token).await
        }))
    }

    /// 進行中のジョブをキャンセルして行を idle に戻す
    pub async fn cancel(&self, row_id: RowId) -> bool {
        let mut store = self.store.write().await;
        match self.unregister(row_id) {
            Some(handle) => {
                handle.token.cancel();
                store.apply(row_id, &RowPatch::reset());
                tracing::info!(row = %row_id, "recognition cancelled");
                true
            }
            None => false,
        }
    }

    /// 行を削除（進行中のジョブは先にキャンセル）
    pub async fn remove_row(&self, row_id: RowId) -> Option<Row> {
        let mut store = self.store.write().await;
        if let Some(handle) = self.unregister(row_id) {
            handle.token.cancel();
        }
        store.remove_row(row_id)
    }

    /// 全ジョブをキャンセルしてストアを初期化
    pub async fn refresh(&self) {
        let mut store = self.store.write().await;
        if let Ok(mut jobs) = self.jobs.lock() {
            for (_, handle) in jobs.drain() {
                handle.token.cancel();
            }
        }
        store.refresh();
    }

    pub fn in_flight(&self) -> usize {
        self.jobs.lock().map(|jobs| jobs.len()).unwrap_or(0)
    }

    pub fn is_running(&self, row_id: RowId) -> bool {
        self.jobs
            .lock()
            .map(|jobs| jobs.contains_key(&row_id))
            .unwrap_or(false)
    }

    fn register(&self, row_id: RowId, generation: u64, token: CancellationToken) -> Option<JobHandle> {
        let mut jobs = self.jobs.lock().ok()?;
        jobs.insert(row_id, JobHandle { token, generation })
    }

    fn unregister(&self, row_id: RowId) -> Option<JobHandle> {
        self.jobs.lock().ok()?.remove(&row_id)
    }

    fn is_current(&self, row_id: RowId, generation: u64) -> bool {
        self.jobs
            .lock()
            .map(|jobs| jobs.get(&row_id).map(|h| h.generation) == Some(generation))
            .unwrap_or(false)
    }

    /// 同じ行でより新しいジョブが登録済みか
    fn has_newer(&self, row_id: RowId, generation: u64) -> bool {
        self.jobs
            .lock()
            .map(|jobs| jobs.get(&row_id).is_some_and(|h| h.generation > generation))
            .unwrap_or(false)
    }

    async fn run_job(
        self,
        row_id: RowId,
        generation: u64,
        image: ImageFile,
        token: CancellationToken,
    ) -> JobOutcome {
        let ticker_token = token.child_token();
        let ticker = tokio::spawn(self.clone().tick_elapsed(
            row_id,
            generation,
            Instant::now(),
            ticker_token.clone(),
        ));

        let result = tokio::select! {
            _ = token.cancelled() => None,
            result = self.recognizer.recognize(Some(&image)) => Some(result),
        };

        ticker_token.cancel();
        if let Err(e) = ticker.await {
            tracing::warn!(row = %row_id, "ticker task failed: {}", e);
        }

        match result {
            Some(result) => self.settle(row_id, generation, result).await,
            None => {
                tracing::debug!(row = %row_id, generation, "job cancelled before settlement");
                JobOutcome::Cancelled
            }
        }
    }

    /// 経過時間を周期的に書き込む
    async fn tick_elapsed(self, row_id: RowId, generation: u64, started: Instant, cancel: CancellationToken) {
        let mut interval = tokio::time::interval_at(started + self.tick_period, self.tick_period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let elapsed = started.elapsed().as_secs();
                    let mut store = self.store.write().await;
                    if !self.is_current(row_id, generation) {
                        break;
                    }
                    store.apply(row_id, &RowPatch::tick(elapsed));
                }
            }
        }
    }

    /// 結果を行へ反映（世代が古ければ捨てる）
    async fn settle(
        &self,
        row_id: RowId,
        generation: u64,
        result: Result<Recognition, UploadFailure>,
    ) -> JobOutcome {
        let mut store = self.store.write().await;

        if !self.is_current(row_id, generation) {
            tracing::debug!(row = %row_id, generation, "discarding stale settlement");
            return if store.get(row_id).is_some() && self.has_newer(row_id, generation) {
                JobOutcome::Superseded
            } else {
                JobOutcome::Cancelled
            };
        }
        self.unregister(row_id);

        match result {
            Ok(recognition) => {
                tracing::info!(
                    row = %row_id,
                    serial = %recognition.serial_number,
                    confidence = recognition.confidence,
                    "recognition succeeded"
                );
                store.apply(row_id, &RowPatch::success(&recognition));
                JobOutcome::Succeeded(recognition)
            }
            Err(failure) => {
                tracing::info!(row = %row_id, "recognition failed: {}", failure);
                store.apply(row_id, &RowPatch::failed(failure.message()));
                JobOutcome::Failed(failure)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RowStore;
    use async_trait::async_trait;
    use label_ocr_common::RowStatus;

    struct Fixed(Result<Recognition, UploadFailure>);

    #[async_trait]
    impl Recognizer for Fixed {
        async fn recognize(&self, _image: Option<&ImageFile>) -> Result<Recognition, UploadFailure> {
            self.0.clone()
        }
    }

    /// 一定時間後に成功する
    struct Delayed(Duration);

    #[async_trait]
    impl Recognizer for Delayed {
        async fn recognize(&self, _image: Option<&ImageFile>) -> Result<Recognition, UploadFailure> {
            tokio::time::sleep(self.0).await;
            Ok(recognition("LATE"))
        }
    }

    fn recognition(serial: &str) -> Recognition {
        Recognition {
            serial_number: serial.to_string(),
            confidence: 0.95,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_start_without_image_is_rejected() {
        let store = RowStore::new().into_shared();
        let id = store.read().await.ids()[0];
        let before = store.read().await.snapshot();

        let runner = JobRunner::new(store.clone(), Arc::new(Fixed(Ok(recognition("X")))));
        let result = runner.start(id).await;

        assert_eq!(result.err(), Some(RunnerError::NoImage(id)));
        assert_eq!(store.read().await.snapshot(), before);
        assert_eq!(runner.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_start_unknown_row_is_rejected() {
        let store = RowStore::empty().into_shared();
        let runner = JobRunner::new(store, Arc::new(Fixed(Ok(recognition("X")))));
        let result = runner.start(RowId(3)).await;
        assert_eq!(result.err(), Some(RunnerError::NoImage(RowId(3))));
    }

    #[tokio::test]
    async fn test_success_settles_row() {
        let mut store = RowStore::empty();
        let id = store.add_files(vec![ImageFile::new("a.jpg")])[0];
        let store = store.into_shared();

        let runner = JobRunner::new(store.clone(), Arc::new(Fixed(Ok(recognition("SN77")))));
        let outcome = runner.start(id).await.unwrap().await.unwrap();

        assert_eq!(outcome, JobOutcome::Succeeded(recognition("SN77")));
        let row = store.read().await.get(id).cloned().unwrap();
        assert_eq!(row.status, RowStatus::Success);
        assert_eq!(row.result, "SN77");
        assert_eq!(row.confidence, Some(0.95));
        assert_eq!(runner.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_failure_stores_message() {
        let mut store = RowStore::empty();
        let id = store.add_files(vec![ImageFile::new("a.jpg")])[0];
        let store = store.into_shared();

        let runner = JobRunner::new(store.clone(), Arc::new(Fixed(Err(UploadFailure::Service))));
        let outcome = runner.start(id).await.unwrap().await.unwrap();

        assert_eq!(outcome, JobOutcome::Failed(UploadFailure::Service));
        let row = store.read().await.get(id).cloned().unwrap();
        assert_eq!(row.status, RowStatus::Failed);
        assert_eq!(row.result, "An error occurred during recognition. Please try again.");
        assert_eq!(row.processing_time, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_settlement_waits_is_cancelled() {
        let mut store = RowStore::empty();
        let id = store.add_files(vec![ImageFile::new("a.jpg")])[0];
        let store = store.into_shared();

        let runner = JobRunner::new(store.clone(), Arc::new(Delayed(Duration::from_millis(1500))));
        let handle = runner.start(id).await.unwrap();

        // 認識が終わっても結果の反映はストアのロック待ちになる
        let guard = store.write().await;
        tokio::time::sleep(Duration::from_secs(2)).await;

        // cancel と同じ手順（ロック保持中に登録解除）
        let job = runner.unregister(id).expect("ジョブが登録されていない");
        job.token.cancel();
        drop(guard);

        assert_eq!(handle.await.unwrap(), JobOutcome::Cancelled);
        let row = store.read().await.get(id).cloned().unwrap();
        assert_eq!(row.status, RowStatus::Processing);
        assert!(row.result.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_reports_superseded_for_stale_settlement() {
        let mut store = RowStore::empty();
        let id = store.add_files(vec![ImageFile::new("a.jpg")])[0];
        let store = store.into_shared();

        let runner = JobRunner::new(store.clone(), Arc::new(Delayed(Duration::from_millis(1500))));
        let first = runner.start(id).await.unwrap();

        let guard = store.write().await;
        tokio::time::sleep(Duration::from_secs(2)).await;

        // 反映待ちの間に新しい世代を登録
        let token = CancellationToken::new();
        let newer = runner.generation.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(previous) = runner.register(id, newer, token) {
            previous.token.cancel();
        }
        drop(guard);

        assert_eq!(first.await.unwrap(), JobOutcome::Superseded);
        assert!(runner.is_running(id));
    }

    /// ログ出力の取り込み先
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    async fn run_failing_job(level: tracing::Level) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut store = RowStore::empty();
        let id = store.add_files(vec![ImageFile::new("a.jpg")])[0];
        let runner = JobRunner::new(store.into_shared(), Arc::new(Fixed(Err(UploadFailure::Service))));
        runner.start(id).await.unwrap().await.unwrap();

        captured.text()
    }

    #[tokio::test]
    async fn test_failure_stays_below_default_log_level() {
        // 既定の warn では出力しない（進捗バーと混ざらない）
        assert!(run_failing_job(tracing::Level::WARN).await.is_empty());
        assert!(run_failing_job(tracing::Level::INFO).await.contains("recognition failed"));
    }
}
