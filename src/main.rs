use clap::{CommandFactory, Parser, Subcommand};
use env_logger::Env;
use log::LevelFilter;
use std::path::{Path, PathBuf};
use vdub::backend::{build_synthesizer, build_transcriber, build_translator};
use vdub::config::Config;
use vdub::dubbing::{DubOptions, Dubber};
use vdub::error::DubError;
use vdub::media::Ffmpeg;
use vdub::subtitle::{SubtitleGenerator, SubtitleOptions};
use vdub::types::{RunReport, Stage};
use vdub::workspace::TempWorkspace;

#[derive(Parser, Debug)]
#[command(
    name = "vdub",
    version,
    about = "字幕から声質を真似た吹き替え動画を作成し、動画から字幕を生成する"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// 中間ファイルを置くディレクトリ
    #[arg(long, global = true, default_value = "temp")]
    temp_dir: PathBuf,

    /// 設定ファイル
    #[arg(short, long, global = true, default_value = "vdub.toml")]
    config: PathBuf,

    /// デフォルト設定ファイルを生成して終了
    #[arg(long, value_name = "PATH", num_args = 0..=1, default_missing_value = "vdub.toml")]
    generate_config: Option<PathBuf>,

    /// 成功時に出力パスの代わりに実行結果をJSONで出力
    #[arg(long, global = true, default_value_t = false)]
    report_json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 動画を文字起こしして字幕ファイルを作成
    Subtitle {
        /// 入力動画
        video: PathBuf,

        /// 出力SRT (省略時は <動画名>.srt / <動画名>_<言語>.srt)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 字幕を翻訳する
        #[arg(long, default_value_t = false)]
        translate: bool,

        /// 音声の言語 (省略時は自動判定)
        #[arg(short, long)]
        source_language: Option<String>,

        /// 翻訳先の言語
        #[arg(short, long, default_value = "en")]
        target_language: String,
    },

    /// 字幕に沿って吹き替え動画を作成
    Dub {
        /// 入力動画
        video: PathBuf,

        /// 話者タグ付きSRT
        srt: PathBuf,

        /// 出力動画 (省略時は <動画名>_dubbed.mp4)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 字幕の言語 (翻訳元)
        #[arg(short, long)]
        source_language: Option<String>,

        /// 吹き替えの言語
        #[arg(short, long, default_value = "en")]
        target_language: String,

        /// 字幕を翻訳せずにそのまま読み上げる
        #[arg(long, default_value_t = false)]
        no_translate: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // ロガーを初期化（設定ファイルを読む前に行う）
    let level_from_env = init_logger();

    // 設定ファイル生成モード
    if let Some(path) = &cli.generate_config {
        if let Err(e) = Config::write_default(path) {
            eprintln!("設定ファイルを生成できません: {:#}", e);
            std::process::exit(1);
        }
        println!("設定ファイルを生成しました: {}", path.display());
        return;
    }

    let config = match Config::load_or_default(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("設定ファイルの読み込みに失敗: {:#}", e);
            std::process::exit(1);
        }
    };

    // RUST_LOG が優先
    if !level_from_env {
        match parse_level(&config.output.log_level) {
            Some(level) => log::set_max_level(level),
            None => log::warn!(
                "不明なログレベル {:?} のため info で出力します",
                config.output.log_level
            ),
        }
    }

    let Some(command) = cli.command else {
        let _ = Cli::command().print_help();
        std::process::exit(2);
    };

    log::info!("vdub を起動します");
    log::debug!("設定: {:?}", config);

    match run(command, &config, &cli.temp_dir).await {
        Ok(report) => {
            if !report.warnings.is_empty() {
                log::warn!("{} 件の警告がありました", report.warnings.len());
            }
            log::info!("{} セグメントを処理しました", report.segments);
            if cli.report_json {
                match report.to_json() {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("実行結果をJSONにできません: {}", e);
                        std::process::exit(1);
                    }
                }
            } else {
                println!("{}", report.output.display());
            }
        }
        Err(e) => {
            log::error!("{}", e);
            eprintln!("エラー ({}): {}", e.stage(), e);
            std::process::exit(1);
        }
    }
}

/// ロガーを初期化し、RUST_LOG でレベルが指定されたかを返す
///
/// 指定が無い場合は設定ファイルを読むまで info で出力する。
fn init_logger() -> bool {
    let from_env = std::env::var_os("RUST_LOG").is_some();
    env_logger::Builder::from_env(Env::default().default_filter_or("trace"))
        .format_timestamp(None)
        .filter_module("reqwest", LevelFilter::Warn)
        .filter_module("hyper", LevelFilter::Warn)
        .init();
    if !from_env {
        log::set_max_level(LevelFilter::Info);
    }
    from_env
}

fn parse_level(name: &str) -> Option<LevelFilter> {
    name.trim().parse().ok()
}

async fn run(command: Command, config: &Config, temp_dir: &Path) -> Result<RunReport, DubError> {
    let media = Ffmpeg::new();
    media
        .check_available()
        .await
        .map_err(|e| DubError::Configuration(format!("{:#}", e)))?;

    match command {
        Command::Subtitle {
            video,
            output,
            translate,
            source_language,
            target_language,
        } => {
            let transcriber = build_transcriber(&config.transcribe)?;
            let translator = if translate {
                build_translator(&config.translate)
            } else {
                None
            };
            let options = SubtitleOptions {
                output,
                source_language,
                target_language,
                translate,
            };

            let mut workspace = open_workspace(temp_dir)?;
            let generator = SubtitleGenerator::new(
                &media,
                &*transcriber,
                translator.as_deref(),
                config.audio.sample_rate,
            );
            let result = generator.generate(&video, &options, &mut workspace).await;
            finish(workspace, result)
        }
        Command::Dub {
            video,
            srt,
            output,
            source_language,
            target_language,
            no_translate,
        } => {
            let synthesizer = build_synthesizer(&config.synthesis)?;
            let translator = if no_translate {
                None
            } else {
                build_translator(&config.translate)
            };
            let options = DubOptions {
                output,
                source_language,
                target_language,
                translate: !no_translate,
            };

            let mut workspace = open_workspace(temp_dir)?;
            let dubber = Dubber::new(config, &media, &*synthesizer, translator.as_deref());
            let result = dubber
                .process_video(&video, &srt, &options, &mut workspace)
                .await;
            finish(workspace, result)
        }
    }
}

fn open_workspace(temp_dir: &Path) -> Result<TempWorkspace, DubError> {
    TempWorkspace::create(temp_dir).map_err(|e| DubError::at(Stage::Setup, e))
}

/// 作業ディレクトリを片付けて結果を返す
fn finish(
    workspace: TempWorkspace,
    result: Result<RunReport, DubError>,
) -> Result<RunReport, DubError> {
    let failures = workspace.cleanup();
    let mut report = result?;
    if failures > 0 {
        report.warn(
            Stage::Cleanup,
            format!("{} 個の一時ファイルを削除できませんでした", failures),
        );
    }
    Ok(report)
}
