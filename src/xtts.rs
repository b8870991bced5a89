use crate::audio::AudioTrack;
use crate::backend::Synthesizer;
use crate::config::SynthesisConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart;
use std::time::Duration;

/// XTTSの出力サンプルレート
pub const XTTS_SAMPLE_RATE: u32 = 22050;

/// XTTS互換HTTPサーバーによる声質クローン合成
///
/// `text`、`language`、`speaker_wav`（参照音声WAV）をmultipartで送信し、
/// レスポンス本文のWAVを合成結果として受け取る。
pub struct XttsSynthesizer {
    endpoint: String,
    client: reqwest::Client,
}

impl XttsSynthesizer {
    pub fn new(config: &SynthesisConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("XTTS HTTPクライアント作成失敗")?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            client,
        })
    }
}

#[async_trait]
impl Synthesizer for XttsSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        reference: &AudioTrack,
        language: &str,
    ) -> Result<AudioTrack> {
        let speaker_wav = reference.to_wav_bytes().context("参照音声のWAV変換失敗")?;

        let part = multipart::Part::bytes(speaker_wav)
            .file_name("speaker.wav")
            .mime_str("audio/wav")?;

        let form = multipart::Form::new()
            .text("text", text.to_string())
            .text("language", language.to_string())
            .part("speaker_wav", part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .context("XTTS リクエスト失敗")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("XTTS エラー: {} - {}", status, error_text);
        }

        let body = response.bytes().await.context("XTTS レスポンス受信失敗")?;
        let track = AudioTrack::from_wav_bytes(&body).context("XTTS レスポンスのWAV解析失敗")?;

        log::debug!(
            "XTTS: {} 文字 → {} ms ({} Hz)",
            text.chars().count(),
            track.duration_ms(),
            track.sample_rate()
        );
        Ok(track)
    }

    fn name(&self) -> &str {
        "xtts"
    }
}

/// 無音を返す合成器
///
/// 合成サーバー無しでタイミング処理だけを確認するためのもの。
/// 長さは文字数に比例する。
pub struct SilentSynthesizer {
    ms_per_char: u64,
}

impl SilentSynthesizer {
    pub fn new() -> Self {
        Self { ms_per_char: 60 }
    }
}

impl Default for SilentSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Synthesizer for SilentSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        _reference: &AudioTrack,
        _language: &str,
    ) -> Result<AudioTrack> {
        let duration_ms = text.chars().count() as u64 * self.ms_per_char;
        Ok(AudioTrack::silent(duration_ms, XTTS_SAMPLE_RATE))
    }

    fn name(&self) -> &str {
        "silent"
    }
}
