use anyhow::{Context, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// 動画コンテナの分離・結合を行う外部ツール
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// 動画からモノラル16bit PCM WAVを取り出す
    async fn extract_audio(&self, video: &Path, wav_out: &Path, sample_rate: u32) -> Result<()>;

    /// 元動画の映像と新しい音声を1つの動画にまとめる
    async fn mux_audio(&self, video: &Path, audio: &Path, output: &Path) -> Result<()>;
}

/// ffmpeg コマンドによる実装
pub struct Ffmpeg {
    program: OsString,
}

impl Ffmpeg {
    pub fn new() -> Self {
        Self::with_program("ffmpeg")
    }

    /// 実行ファイルを指定して作成
    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// ffmpeg が実行できるか確認
    pub async fn check_available(&self) -> Result<()> {
        let status = Command::new(&self.program)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .context("ffmpeg が見つかりません (PATH を確認してください)")?;
        if !status.success() {
            anyhow::bail!("ffmpeg を実行できません: {}", status);
        }
        Ok(())
    }

    async fn run(&self, args: Vec<OsString>, what: &str) -> Result<()> {
        log::debug!("ffmpeg {:?}", args);
        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("ffmpeg の起動に失敗 ({})", what))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            anyhow::bail!(
                "ffmpeg {} に失敗 ({}): {}",
                what,
                output.status,
                tail.into_iter().rev().collect::<Vec<_>>().join(" / ")
            );
        }
        Ok(())
    }
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaTool for Ffmpeg {
    async fn extract_audio(&self, video: &Path, wav_out: &Path, sample_rate: u32) -> Result<()> {
        log::info!("音声を抽出中: {:?}", video);
        let args = vec![
            "-y".into(),
            "-i".into(),
            video.as_os_str().to_owned(),
            "-vn".into(),
            "-acodec".into(),
            "pcm_s16le".into(),
            "-ar".into(),
            sample_rate.to_string().into(),
            "-ac".into(),
            "1".into(),
            wav_out.as_os_str().to_owned(),
        ];
        self.run(args, "音声抽出").await
    }

    async fn mux_audio(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        log::info!("吹き替え動画を作成中: {:?}", output);
        let args = vec![
            "-y".into(),
            "-i".into(),
            video.as_os_str().to_owned(),
            "-i".into(),
            audio.as_os_str().to_owned(),
            "-map".into(),
            "0:v:0".into(),
            "-map".into(),
            "1:a:0".into(),
            "-c:v".into(),
            "copy".into(),
            "-c:a".into(),
            "aac".into(),
            "-shortest".into(),
            output.as_os_str().to_owned(),
        ];
        self.run(args, "動画結合").await
    }
}
