use anyhow::Context;
use clap::Parser;
use label_ocr::{cli, config, error, export, logging, scanner, session};
use label_ocr::batch::{start_batch, Selection};
use label_ocr::client::{HttpUploadClient, Recognizer};
use label_ocr::progress::BatchProgress;
use label_ocr::runner::{JobOutcome, JobRunner};
use label_ocr::store::RowStore;
use label_ocr_common::{ExportHeader, ImageFile, RowId};
use cli::{Cli, Commands};
use config::Config;
use session::Session;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let config = Config::load()?;

    match cli.command {
        Commands::Recognize { image } => {
            println!("🔍 label-ocr - シリアル番号認識\n");

            if !image.is_file() {
                return Err(error::LabelOcrError::FileNotFound(image.display().to_string()).into());
            }
            let size = std::fs::metadata(&image).map(|m| m.len()).unwrap_or(0);
            let image = ImageFile::new(&image).with_size(size);

            let client = build_client(&config, cli.endpoint.as_deref())?;
            println!("- 認識中... ({})", client.endpoint());

            match client.recognize(Some(&image)).await {
                Ok(recognition) => {
                    println!("\n✅ 認識結果");
                    println!("  Serial Number: {}", recognition.serial_number);
                    println!("  Confidence: {}%", recognition.confidence_percent());
                }
                Err(failure) => anyhow::bail!("{}", failure),
            }
        }

        Commands::Batch { paths, user, date, session, csv, print } => {
            println!("🚀 label-ocr - 一括認識\n");

            let images = scanner::collect_images(&paths)?;
            if images.is_empty() {
                let joined = paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ");
                return Err(error::LabelOcrError::NoImagesFound(joined).into());
            }
            println!("✔ {}枚の画像を検出\n", images.len());

            let header = ExportHeader::new(
                user.or_else(|| config.user_name.clone()).unwrap_or_default(),
                date.unwrap_or_else(today),
            );

            let mut store = RowStore::empty();
            store.add_files(images);

            let client = build_client(&config, cli.endpoint.as_deref())?;
            run_recognition(store, client, Selection::All, &header, &session, csv.as_deref(), print).await?;
        }

        Commands::Retry { session, all, csv, print } => {
            println!("🔁 label-ocr - 再認識\n");

            let loaded = Session::load(&session)
                .with_context(|| format!("read {}", session.display()))?;
            let header = loaded.header();
            let selection = if all { Selection::All } else { Selection::WithoutResult };

            let client = build_client(&config, cli.endpoint.as_deref())?;
            run_recognition(loaded.into_store(), client, selection, &header, &session, csv.as_deref(), print).await?;
        }

        Commands::Export { session, row, output, print } => {
            println!("📄 label-ocr - エクスポート\n");

            let loaded = Session::load(&session)
                .with_context(|| format!("read {}", session.display()))?;
            let header = loaded.header();
            let output = output.unwrap_or_else(|| PathBuf::from("."));

            let path = match row {
                Some(id) => export::export_row_csv(&loaded.rows, RowId(id), &header, &output)?,
                None => export::export_csv(&loaded.rows, &header, &output)?,
            };
            println!("✔ CSV出力: {}", path.display());

            if print {
                println!("\n{}", export::print_view(&loaded.rows, &header));
            }
        }

        Commands::Config { set_endpoint, set_user, show } => {
            let mut config = config;

            if let Some(endpoint) = set_endpoint {
                config.set_endpoint(endpoint)?;
                println!("✔ アップロード先を設定しました");
            }

            if let Some(user) = set_user {
                config.set_user_name(user)?;
                println!("✔ ユーザー名を設定しました");
            }

            if show {
                println!("設定:");
                println!("  アップロード先: {}", config.resolved_endpoint());
                println!(
                    "  タイムアウト: {}",
                    if config.timeout_seconds > 0 { format!("{}秒", config.timeout_seconds) } else { "なし".into() }
                );
                println!("  ユーザー名: {}", config.user_name.as_deref().unwrap_or("未設定"));
            }
        }
    }

    Ok(())
}

fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

fn build_client(config: &Config, endpoint: Option<&str>) -> error::Result<HttpUploadClient> {
    let client = HttpUploadClient::from_config(config)?;
    Ok(match endpoint {
        Some(url) => client.with_endpoint(url),
        None => client,
    })
}

async fn run_recognition(
    store: RowStore,
    client: HttpUploadClient,
    selection: Selection,
    header: &ExportHeader,
    session_path: &Path,
    csv: Option<&Path>,
    print: bool,
) -> anyhow::Result<()> {
    let store = store.into_shared();
    let runner = JobRunner::new(store.clone(), Arc::new(client));

    let names: HashMap<RowId, String> = store
        .read()
        .await
        .iter()
        .filter(|row| selection.includes(row))
        .filter_map(|row| row.image.as_ref().map(|image| (row.id, image.file_name.clone())))
        .collect();

    // 1. 認識
    println!("[1/3] 認識中... ({}件)", names.len());
    let run = start_batch(&runner, selection).await;
    let progress = BatchProgress::start(store.clone(), names);
    let outcomes = run.wait_with(|id, outcome| progress.settled(id, outcome)).await;
    progress.finish();

    let succeeded = outcomes
        .iter()
        .filter(|(_, o)| matches!(o, JobOutcome::Succeeded(_)))
        .count();
    println!("✔ 認識完了: 成功 {}件 / 失敗 {}件\n", succeeded, outcomes.len() - succeeded);

    // 2. セッション保存
    println!("[2/3] セッションを保存中...");
    let rows = {
        let store = store.read().await;
        Session::from_store(&store, header)
            .save(session_path)
            .with_context(|| format!("write {}", session_path.display()))?;
        store.snapshot()
    };
    println!("✔ セッション保存: {}\n", session_path.display());

    // 3. 出力
    println!("[3/3] 出力中...");
    if let Some(dir) = csv {
        let path = export::export_csv(&rows, header, dir)?;
        println!("✔ CSV出力: {}", path.display());
    }
    if print {
        println!("\n{}", export::print_view(&rows, header));
    }

    println!("\n✅ 完了");
    Ok(())
}
