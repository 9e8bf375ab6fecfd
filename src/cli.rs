use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "label-ocr")]
#[command(about = "部品ラベル画像のシリアル番号OCRクライアント", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// アップロード先URL（設定ファイル・環境変数より優先）
    #[arg(long, global = true)]
    pub endpoint: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 画像1枚を認識してシリアル番号と信頼度を表示
    Recognize {
        /// 画像ファイル
        #[arg(required = true)]
        image: PathBuf,
    },

    /// 複数画像を一括認識してセッションを保存
    Batch {
        /// 画像ファイルまたはフォルダ（複数可）
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// ユーザー名（省略時は設定ファイルの値）
        #[arg(short, long)]
        user: Option<String>,

        /// 日付（デフォルト: 今日 YYYY-MM-DD）
        #[arg(short, long)]
        date: Option<String>,

        /// セッションファイルの保存先
        #[arg(short, long, default_value = "label-ocr-session.json")]
        session: PathBuf,

        /// CSV出力先ディレクトリ
        #[arg(long)]
        csv: Option<PathBuf>,

        /// 印刷用テーブルを表示
        #[arg(long)]
        print: bool,
    },

    /// セッションを読み込んで未成功の行を再認識
    Retry {
        /// セッションファイル
        #[arg(required = true)]
        session: PathBuf,

        /// 成功済みの行も含めて全行を再認識
        #[arg(long)]
        all: bool,

        /// CSV出力先ディレクトリ
        #[arg(long)]
        csv: Option<PathBuf>,

        /// 印刷用テーブルを表示
        #[arg(long)]
        print: bool,
    },

    /// セッションからCSV・印刷用テーブルを出力
    Export {
        /// セッションファイル
        #[arg(required = true)]
        session: PathBuf,

        /// 1行だけ出力する行ID
        #[arg(long)]
        row: Option<u64>,

        /// 出力ファイル/ディレクトリ
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 印刷用テーブルを表示
        #[arg(long)]
        print: bool,
    },

    /// 設定を表示/編集
    Config {
        /// アップロード先URLを設定
        #[arg(long)]
        set_endpoint: Option<String>,

        /// 既定のユーザー名を設定
        #[arg(long)]
        set_user: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}
