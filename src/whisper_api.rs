use crate::audio::AudioTrack;
use crate::backend::Transcriber;
use crate::config::TranscribeConfig;
use crate::types::TranscriptSegment;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use std::time::Duration;

/// OpenAI Whisper API レスポンス (`verbose_json`)
#[derive(Debug, Deserialize)]
struct WhisperVerboseResponse {
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    segments: Vec<TranscriptSegment>,
}

/// OpenAI Whisper API バックエンド
///
/// 音声を `chunk_duration_secs` ごとのWAVに分けて送信し、セグメント単位の
/// タイムスタンプを受け取る。各チャンクの時刻は元音声の時刻に直して
/// 入力順に連結する。
pub struct WhisperTranscriber {
    api_key: String,
    model: String,
    endpoint: String,
    chunk_ms: u64,
    client: reqwest::Client,
}

impl WhisperTranscriber {
    pub fn new(config: &TranscribeConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Whisper API HTTPクライアント作成失敗")?;

        Ok(Self {
            api_key,
            model: config.model.clone(),
            endpoint: config.endpoint.clone(),
            chunk_ms: config.chunk_duration_secs.saturating_mul(1000),
            client,
        })
    }
}

/// APIが返すテキストの前後空白を落とし、空のセグメントを除く
fn clean_segments(segments: Vec<TranscriptSegment>) -> Vec<TranscriptSegment> {
    segments
        .into_iter()
        .filter_map(|mut segment| {
            segment.text = segment.text.trim().to_string();
            (!segment.text.is_empty()).then_some(segment)
        })
        .collect()
}

impl WhisperTranscriber {
    /// 1チャンク分の音声を送信してセグメントを受け取る
    async fn transcribe_chunk(
        &self,
        audio: &AudioTrack,
        source_language: Option<&str>,
    ) -> Result<Vec<TranscriptSegment>> {
        let wav_data = audio.to_wav_bytes().context("WAV変換失敗")?;
        log::debug!("Whisper API: WAVデータサイズ {} バイト", wav_data.len());

        let part = multipart::Part::bytes(wav_data)
            .file_name("audio.wav")
            .mime_str("audio/wav")?;

        let mut form = multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment");

        if let Some(language) = source_language {
            form = form.text("language", language.to_string());
        }

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .context("Whisper API リクエスト失敗")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Whisper API エラー: {} - {}", status, error_text);
        }

        let whisper_response: WhisperVerboseResponse = response
            .json()
            .await
            .context("Whisper API レスポンスパース失敗")?;

        if let Some(language) = &whisper_response.language {
            log::debug!("Whisper API: 判定言語 {}", language);
        }

        Ok(clean_segments(whisper_response.segments))
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(
        &self,
        audio: &AudioTrack,
        source_language: Option<&str>,
    ) -> Result<Vec<TranscriptSegment>> {
        match source_language {
            Some(language) => log::info!("ソース言語: {}", language),
            None => log::info!("言語はWhisperが自動判定します"),
        }

        let ranges = chunk_ranges(audio.duration_ms(), self.chunk_ms);
        let mut segments = Vec::new();

        for (i, &(start_ms, end_ms)) in ranges.iter().enumerate() {
            let chunk = audio
                .slice_ms(start_ms, end_ms)
                .context("音声チャンクの切り出し失敗")?;
            log::info!(
                "Whisper API: チャンク {}/{} ({} - {} ms) を文字起こし中",
                i + 1,
                ranges.len(),
                start_ms,
                end_ms
            );
            let chunk_segments = self
                .transcribe_chunk(&chunk, source_language)
                .await
                .with_context(|| format!("チャンク {}/{} の文字起こし失敗", i + 1, ranges.len()))?;
            append_with_offset(&mut segments, chunk_segments, start_ms);
        }

        log::info!("Whisper API: {} セグメントを取得", segments.len());
        Ok(segments)
    }

    fn name(&self) -> &str {
        "whisper"
    }
}

/// 音声をチャンクに分ける区間 `[start, end)` の一覧
///
/// `chunk_ms` が 0 の場合は全体を1チャンクにする。
fn chunk_ranges(duration_ms: u64, chunk_ms: u64) -> Vec<(u64, u64)> {
    if chunk_ms == 0 || duration_ms <= chunk_ms {
        return vec![(0, duration_ms)];
    }
    (0..duration_ms)
        .step_by(chunk_ms as usize)
        .map(|start| (start, (start + chunk_ms).min(duration_ms)))
        .collect()
}

/// チャンク内の時刻を元音声の時刻に直して追加する
fn append_with_offset(
    all: &mut Vec<TranscriptSegment>,
    chunk: Vec<TranscriptSegment>,
    offset_ms: u64,
) {
    let offset = offset_ms as f64 / 1000.0;
    all.extend(chunk.into_iter().map(|mut segment| {
        segment.start += offset;
        segment.end += offset;
        segment
    }));
}
