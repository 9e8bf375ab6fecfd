//! 一括認識
//!
//! 条件に合う行をすべて即座に開始する。順序保証・同時実行数の上限はない。

use crate::runner::{JobOutcome, JobRunner};
use label_ocr_common::{Row, RowId, RowStatus};
use tokio::task::{JoinHandle, JoinSet};

/// 対象行の選び方
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Selection {
    /// 画像のある全行
    All,
    /// 画像があり、まだ成功していない行
    WithoutResult,
}

impl Selection {
    pub fn includes(&self, row: &Row) -> bool {
        match self {
            Selection::All => row.has_image(),
            Selection::WithoutResult => row.has_image() && row.status != RowStatus::Success,
        }
    }
}

/// 開始済みジョブの集合
pub struct BatchRun {
    handles: Vec<(RowId, JoinHandle<JobOutcome>)>,
}

impl BatchRun {
    pub fn started(&self) -> Vec<RowId> {
        self.handles.iter().map(|(id, _)| *id).collect()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// 全ジョブの終了を待つ（終了順にコールバック）
    pub async fn wait_with<F>(self, mut on_settled: F) -> Vec<(RowId, JobOutcome)>
    where
        F: FnMut(RowId, &JobOutcome),
    {
        let mut set = JoinSet::new();
        for (id, handle) in self.handles {
            set.spawn(async move {
                let outcome = match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::error!(row = %id, "job task failed: {}", e);
                        JobOutcome::Cancelled
                    }
                };
                (id, outcome)
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((id, outcome)) => {
                    on_settled(id, &outcome);
                    outcomes.push((id, outcome));
                }
                Err(e) => tracing::error!("batch wait task failed: {}", e),
            }
        }
        outcomes
    }

    pub async fn wait(self) -> Vec<(RowId, JobOutcome)> {
        self.wait_with(|_, _| {}).await
    }
}

/// 条件に合う行の認識を一斉に開始
pub async fn start_batch(runner: &JobRunner, selection: Selection) -> BatchRun {
    let targets: Vec<RowId> = {
        let store = runner.store().read().await;
        store
            .iter()
            .filter(|row| selection.includes(row))
            .map(|row| row.id)
            .collect()
    };

    let mut handles = Vec::with_capacity(targets.len());
    for id in targets {
        match runner.start(id).await {
            Ok(handle) => handles.push((id, handle)),
            // 選択後に画像が外された行
            Err(e) => tracing::warn!(row = %id, "skipped: {}", e),
        }
    }

    tracing::info!(?selection, count = handles.len(), "batch started");
    BatchRun { handles }
}
