use crate::audio::AudioTrack;
use crate::config::{
    SynthesisBackendType, SynthesisConfig, TranscribeBackendType, TranscribeConfig,
    TranslateBackendType, TranslateConfig,
};
use crate::deepl::DeeplTranslator;
use crate::error::DubError;
use crate::types::{RunReport, Stage, TranscriptSegment};
use crate::whisper_api::WhisperTranscriber;
use crate::xtts::{SilentSynthesizer, XttsSynthesizer};
use anyhow::Result;
use async_trait::async_trait;

/// 音声合成バックエンドの共通トレイト
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// テキストを話者サンプルの声質で合成
    ///
    /// # Arguments
    /// * `text` - 読み上げるテキスト
    /// * `reference` - 声質の参照音声
    /// * `language` - 出力言語コード ("en", "ja" など)
    async fn synthesize(
        &self,
        text: &str,
        reference: &AudioTrack,
        language: &str,
    ) -> Result<AudioTrack>;

    /// ログ用のバックエンド名
    fn name(&self) -> &str;
}

/// 文字起こしバックエンドの共通トレイト
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// 音声を文字起こしして時間付きセグメントを返す
    ///
    /// `source_language` が `None` の場合は言語を自動判定する。
    async fn transcribe(
        &self,
        audio: &AudioTrack,
        source_language: Option<&str>,
    ) -> Result<Vec<TranscriptSegment>>;

    fn name(&self) -> &str;
}

/// 翻訳バックエンドの共通トレイト
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source_language: Option<&str>,
        target_language: &str,
    ) -> Result<String>;

    fn name(&self) -> &str;
}

/// 翻訳を試み、失敗時は原文を返す
///
/// 翻訳器が無い（利用不可）場合や翻訳に失敗した場合でも呼び出し元には
/// エラーを返さず、入力テキストをそのまま返して警告を記録する。
pub async fn translate_or_original(
    translator: Option<&dyn Translator>,
    text: &str,
    source_language: Option<&str>,
    target_language: &str,
    report: &mut RunReport,
) -> String {
    let Some(translator) = translator else {
        report.warn(
            Stage::Translate,
            "翻訳器が利用できません。原文を使用します",
        );
        return text.to_string();
    };

    match translator
        .translate(text, source_language, target_language)
        .await
    {
        Ok(translated) => translated,
        Err(e) => {
            let err = DubError::Translation(format!("{:#}", e));
            report.warn(Stage::Translate, format!("{} (原文を使用)", err));
            text.to_string()
        }
    }
}

/// 設定に従って音声合成バックエンドを作成
///
/// 作成できない場合は処理開始前に `DubError::Configuration` で中断する。
pub fn build_synthesizer(config: &SynthesisConfig) -> Result<Box<dyn Synthesizer>, DubError> {
    let synthesizer: Box<dyn Synthesizer> = match config.backend {
        SynthesisBackendType::Xtts => {
            log::info!("XTTS 合成バックエンドを使用: {}", config.endpoint);
            Box::new(XttsSynthesizer::new(config).map_err(|e| {
                DubError::Configuration(format!("XTTS バックエンド作成失敗: {:#}", e))
            })?)
        }
        SynthesisBackendType::Silent => {
            log::warn!("無音合成バックエンドを使用します（動作確認用）");
            Box::new(SilentSynthesizer::new())
        }
    };
    Ok(synthesizer)
}

/// 設定に従って文字起こしバックエンドを作成
///
/// APIキーが無い場合は `DubError::Configuration`。
pub fn build_transcriber(config: &TranscribeConfig) -> Result<Box<dyn Transcriber>, DubError> {
    match config.backend {
        TranscribeBackendType::Whisper => {
            let api_key = config.resolved_api_key().ok_or_else(|| {
                DubError::Configuration(
                    "Whisper APIキーがありません (transcribe.api_key または OPENAI_API_KEY)"
                        .to_string(),
                )
            })?;
            log::info!("OpenAI Whisper API バックエンドを使用: {}", config.model);
            let transcriber = WhisperTranscriber::new(config, api_key).map_err(|e| {
                DubError::Configuration(format!("Whisper API バックエンド作成失敗: {:#}", e))
            })?;
            Ok(Box::new(transcriber))
        }
    }
}

/// 設定に従って翻訳バックエンドを作成
///
/// 翻訳は失敗しても致命的ではないため、作成できない場合は警告を出して
/// `None`（利用不可）を返す。
pub fn build_translator(config: &TranslateConfig) -> Option<Box<dyn Translator>> {
    match config.backend {
        TranslateBackendType::None => None,
        TranslateBackendType::Deepl => {
            let Some(api_key) = config.resolved_api_key() else {
                log::warn!("DeepL APIキーがありません。翻訳は行われません");
                return None;
            };
            match DeeplTranslator::new(config, api_key) {
                Ok(translator) => Some(Box::new(translator)),
                Err(e) => {
                    log::warn!("DeepL 翻訳器を初期化できません: {:#}", e);
                    None
                }
            }
        }
    }
}
