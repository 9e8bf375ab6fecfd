//! 一括認識の進捗表示（indicatif）
//!
//! 行ストアの経過時間を定期的に読み、処理中の件数と最長経過秒数を表示する。

use crate::runner::JobOutcome;
use crate::store::SharedStore;
use indicatif::{ProgressBar, ProgressStyle};
use label_ocr_common::RowId;
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const REFRESH_PERIOD: Duration = Duration::from_millis(500);

pub struct BatchProgress {
    bar: ProgressBar,
    names: HashMap<RowId, String>,
    stop: CancellationToken,
}

impl BatchProgress {
    pub fn start(store: SharedStore, names: HashMap<RowId, String>) -> Self {
        let bar = ProgressBar::new(names.len() as u64);
        let style = ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));

        let stop = CancellationToken::new();
        tokio::spawn(watch_store(store, bar.clone(), stop.clone()));

        Self { bar, names, stop }
    }

    /// 1件終了
    pub fn settled(&self, id: RowId, outcome: &JobOutcome) {
        let name = self.names.get(&id).map(String::as_str).unwrap_or("-");
        let line = match outcome {
            JobOutcome::Succeeded(r) => format!(
                "✔ #{} {}: {} ({}%)",
                id,
                name,
                r.serial_number,
                r.confidence_percent()
            ),
            JobOutcome::Failed(f) => format!("✘ #{} {}: {}", id, name, f),
            JobOutcome::Cancelled | JobOutcome::Superseded => format!("- #{} {}: 中断", id, name),
        };
        self.bar.println(line);
        self.bar.inc(1);
    }

    pub fn finish(self) {
        self.stop.cancel();
        self.bar.finish_and_clear();
    }
}

async fn watch_store(store: SharedStore, bar: ProgressBar, stop: CancellationToken) {
    let mut interval = tokio::time::interval(REFRESH_PERIOD);
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = interval.tick() => {
                let (count, longest) = store.read().await.processing_summary();
                if count > 0 {
                    bar.set_message(format!("処理中 {}件 (最長 {}秒)", count, longest));
                } else {
                    bar.set_message(String::new());
                }
            }
        }
    }
}
