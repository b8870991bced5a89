use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub silence: SilenceConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub transcribe: TranscribeConfig,
    #[serde(default)]
    pub translate: TranslateConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// 音声抽出設定
///
/// # デフォルト値
///
/// - `sample_rate`: 16000 Hz (Whisperの推奨値)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

/// 合成音声の無音除去設定
///
/// # デフォルト値
///
/// - `enabled`: true
/// - `threshold_db`: -40.0 dB
/// - `frame_ms`: 10 ms
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SilenceConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_threshold_db")]
    pub threshold_db: f32,
    #[serde(default = "default_frame_ms")]
    pub frame_ms: u32,
}

/// 音声合成バックエンドの種類
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisBackendType {
    /// XTTS互換HTTPサーバー（声質クローン）
    Xtts,
    /// 無音を返すダミー（動作確認用）
    Silent,
}

/// 合成失敗時の扱い
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisFailurePolicy {
    /// 実行全体を中断する
    Abort,
    /// そのセグメントを無音にして続行する
    Silence,
}

/// 音声合成設定
///
/// # デフォルト値
///
/// - `backend`: "xtts"
/// - `endpoint`: "http://localhost:8020/tts_to_audio"
/// - `timeout_seconds`: 120 秒
/// - `on_failure`: "silence"
/// - `workers`: 1 (セグメントを1つずつ合成)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SynthesisConfig {
    #[serde(default = "default_synthesis_backend")]
    pub backend: SynthesisBackendType,
    #[serde(default = "default_synthesis_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_synthesis_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_on_failure")]
    pub on_failure: SynthesisFailurePolicy,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

/// 文字起こしバックエンドの種類
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TranscribeBackendType {
    /// OpenAI Whisper API
    Whisper,
}

/// 文字起こし設定
///
/// `api_key` が空の場合は環境変数 `OPENAI_API_KEY` を使う。
///
/// # デフォルト値
///
/// - `backend`: "whisper"
/// - `model`: "whisper-1"
/// - `endpoint`: "https://api.openai.com/v1/audio/transcriptions"
/// - `timeout_seconds`: 300 秒
/// - `chunk_duration_secs`: 600 秒 (16kHz で約19MB。APIのアップロード上限25MB未満)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscribeConfig {
    #[serde(default = "default_transcribe_backend")]
    pub backend: TranscribeBackendType,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_whisper_model")]
    pub model: String,
    #[serde(default = "default_whisper_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_transcribe_timeout_seconds")]
    pub timeout_seconds: u64,
    /// 1回のリクエストで送る音声の長さ（秒）。0 なら分割しない
    #[serde(default = "default_chunk_duration_secs")]
    pub chunk_duration_secs: u64,
}

/// 翻訳バックエンドの種類
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TranslateBackendType {
    /// DeepL API
    Deepl,
    /// 翻訳しない
    None,
}

/// 翻訳設定
///
/// `api_key` が空の場合は環境変数 `DEEPL_API_KEY` を使う。
/// どちらも無い場合、翻訳は「利用不可」となり原文がそのまま使われる。
///
/// # デフォルト値
///
/// - `backend`: "deepl"
/// - `endpoint`: "https://api-free.deepl.com/v2/translate"
/// - `timeout_seconds`: 30 秒
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranslateConfig {
    #[serde(default = "default_translate_backend")]
    pub backend: TranslateBackendType,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_deepl_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_translate_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// 出力設定
///
/// # デフォルト値
///
/// - `log_level`: "info"
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default functions
fn default_sample_rate() -> u32 {
    16000
}

fn default_enabled() -> bool {
    true
}

fn default_threshold_db() -> f32 {
    -40.0
}

fn default_frame_ms() -> u32 {
    10
}

fn default_synthesis_backend() -> SynthesisBackendType {
    SynthesisBackendType::Xtts
}

fn default_synthesis_endpoint() -> String {
    "http://localhost:8020/tts_to_audio".to_string()
}

fn default_synthesis_timeout_seconds() -> u64 {
    120
}

fn default_on_failure() -> SynthesisFailurePolicy {
    SynthesisFailurePolicy::Silence
}

fn default_workers() -> usize {
    1
}

fn default_transcribe_backend() -> TranscribeBackendType {
    TranscribeBackendType::Whisper
}

fn default_whisper_model() -> String {
    "whisper-1".to_string()
}

fn default_whisper_endpoint() -> String {
    "https://api.openai.com/v1/audio/transcriptions".to_string()
}

fn default_transcribe_timeout_seconds() -> u64 {
    300
}

fn default_chunk_duration_secs() -> u64 {
    600 // 10分ごとにWhisper APIに送信
}

fn default_translate_backend() -> TranslateBackendType {
    TranslateBackendType::Deepl
}

fn default_deepl_endpoint() -> String {
    "https://api-free.deepl.com/v2/translate".to_string()
}

fn default_translate_timeout_seconds() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
        }
    }
}

impl Default for SilenceConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            threshold_db: default_threshold_db(),
            frame_ms: default_frame_ms(),
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            backend: default_synthesis_backend(),
            endpoint: default_synthesis_endpoint(),
            timeout_seconds: default_synthesis_timeout_seconds(),
            on_failure: default_on_failure(),
            workers: default_workers(),
        }
    }
}

impl Default for TranscribeConfig {
    fn default() -> Self {
        Self {
            backend: default_transcribe_backend(),
            api_key: String::new(),
            model: default_whisper_model(),
            endpoint: default_whisper_endpoint(),
            timeout_seconds: default_transcribe_timeout_seconds(),
            chunk_duration_secs: default_chunk_duration_secs(),
        }
    }
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            backend: default_translate_backend(),
            api_key: String::new(),
            endpoint: default_deepl_endpoint(),
            timeout_seconds: default_translate_timeout_seconds(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl TranscribeConfig {
    /// 設定ファイル、無ければ環境変数 `OPENAI_API_KEY` からAPIキーを取得
    pub fn resolved_api_key(&self) -> Option<String> {
        non_empty(&self.api_key).or_else(|| {
            std::env::var("OPENAI_API_KEY")
                .ok()
                .and_then(|key| non_empty(&key))
        })
    }
}

impl TranslateConfig {
    /// 設定ファイル、無ければ環境変数 `DEEPL_API_KEY` からAPIキーを取得
    pub fn resolved_api_key(&self) -> Option<String> {
        non_empty(&self.api_key).or_else(|| {
            std::env::var("DEEPL_API_KEY")
                .ok()
                .and_then(|key| non_empty(&key))
        })
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl Config {
    /// 設定ファイルから読み込み
    ///
    /// TOML形式の設定ファイルをパースしてConfig構造体を生成する。
    ///
    /// # Errors
    ///
    /// ファイルの読み込みまたはパースに失敗した場合にエラーを返す。
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use vdub::config::Config;
    /// let config = Config::from_file("vdub.toml").unwrap();
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("設定ファイルの読み込みに失敗: {:?}", path.as_ref()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "設定ファイルのパースに失敗")?;
        Ok(config)
    }

    /// デフォルト設定をファイルに書き出し
    ///
    /// 既存のファイルは上書きされる。
    pub fn write_default<P: AsRef<Path>>(path: P) -> Result<()> {
        let config = Config::default();
        let content =
            toml::to_string_pretty(&config).with_context(|| "設定のシリアライズに失敗")?;
        fs::write(path.as_ref(), content)
            .with_context(|| format!("設定ファイルの書き込みに失敗: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// 設定ファイルがあれば読み込み、なければデフォルトを使用
    ///
    /// ファイルが存在するがパースに失敗した場合はエラーを返す。
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            log::warn!(
                "設定ファイルが見つかりません。デフォルト設定を使用します: {:?}",
                path.as_ref()
            );
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.silence.threshold_db, -40.0);
        assert_eq!(config.synthesis.backend, SynthesisBackendType::Xtts);
        assert_eq!(config.synthesis.on_failure, SynthesisFailurePolicy::Silence);
        assert_eq!(config.synthesis.workers, 1);
        assert_eq!(config.transcribe.model, "whisper-1");
        assert_eq!(config.transcribe.chunk_duration_secs, 600);
        assert_eq!(config.translate.backend, TranslateBackendType::Deepl);
        assert_eq!(config.output.log_level, "info");
    }

    #[test]
    fn test_write_and_read_config() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        Config::write_default(path).unwrap();

        let config = Config::from_file(path).unwrap();
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(
            config.synthesis.endpoint,
            "http://localhost:8020/tts_to_audio"
        );
    }

    #[test]
    fn test_custom_config() {
        let toml_content = r#"
[audio]
sample_rate = 22050

[silence]
enabled = false
threshold_db = -50.0
frame_ms = 20

[synthesis]
backend = "silent"
on_failure = "abort"
workers = 4

[transcribe]
api_key = "sk-test"
model = "whisper-large"
chunk_duration_secs = 120

[translate]
backend = "none"

[output]
log_level = "debug"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();

        assert_eq!(config.audio.sample_rate, 22050);
        assert!(!config.silence.enabled);
        assert_eq!(config.silence.frame_ms, 20);
        assert_eq!(config.synthesis.backend, SynthesisBackendType::Silent);
        assert_eq!(config.synthesis.on_failure, SynthesisFailurePolicy::Abort);
        assert_eq!(config.synthesis.workers, 4);
        assert_eq!(config.transcribe.resolved_api_key().as_deref(), Some("sk-test"));
        assert_eq!(config.transcribe.model, "whisper-large");
        assert_eq!(config.transcribe.chunk_duration_secs, 120);
        assert_eq!(config.translate.backend, TranslateBackendType::None);
        assert_eq!(config.output.log_level, "debug");
    }

    #[test]
    fn test_load_or_default_nonexistent() {
        let config = Config::load_or_default("nonexistent_file.toml").unwrap();
        assert_eq!(config.audio.sample_rate, 16000);
    }

    #[test]
    fn test_partial_config() {
        // 一部の設定のみ記述した場合、残りはデフォルト値が使われる
        let toml_content = r#"
[synthesis]
workers = 2
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();

        assert_eq!(config.synthesis.workers, 2);
        assert_eq!(config.synthesis.backend, SynthesisBackendType::Xtts);
        assert_eq!(config.audio.sample_rate, 16000);
        assert!(config.silence.enabled);
    }

    #[test]
    fn test_invalid_enum_is_error() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[synthesis]\non_failure = \"retry\"\n")
            .unwrap();
        temp_file.flush().unwrap();

        assert!(Config::from_file(temp_file.path()).is_err());
    }
}
