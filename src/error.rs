use crate::types::Stage;
use thiserror::Error;

/// タイムコード変換エラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimecodeError {
    /// 表現可能な範囲 (99:59:59,999) を超えた
    #[error("タイムコードの範囲外です: {0} ms (最大 {max} ms)", max = crate::timecode::MAX_TIMECODE_MS)]
    Range(u64),

    /// `HH:MM:SS,mmm` として解釈できない
    #[error("タイムコードの形式が不正です: {0:?}")]
    Format(String),
}

/// 字幕ファイルの解析エラー
#[derive(Debug, Error)]
pub enum SubtitleError {
    /// ブロックが存在するのに1つも解釈できなかった
    #[error("字幕ファイルに有効なブロックがありません ({skipped} ブロックをスキップ)")]
    NoValidBlocks { skipped: usize },
}

/// 音声バッファ操作のエラー
#[derive(Debug, Error)]
pub enum AudioError {
    /// 切り出し範囲がバッファ外
    #[error("切り出し範囲がバッファ外です: [{start_ms}, {end_ms}) ms (長さ {duration_ms} ms)")]
    OutOfRange {
        start_ms: u64,
        end_ms: u64,
        duration_ms: u64,
    },

    #[error("WAV処理に失敗: {0}")]
    Wav(#[from] hound::Error),

    #[error("サンプルレートが不正です: {0} Hz")]
    InvalidSampleRate(u32),
}

/// パイプライン全体のエラー分類
///
/// `Configuration` と `OutputWrite` は致命的。それ以外は
/// セグメント単位で回復され、警告として記録される。
#[derive(Debug, Error)]
pub enum DubError {
    /// 合成・文字起こしバックエンドが利用できない（起動時に中断）
    #[error("設定エラー: {0}")]
    Configuration(String),

    /// 翻訳に失敗（原文を使用して続行）
    #[error("翻訳エラー: {0}")]
    Translation(String),

    /// セグメントの時間範囲が元音声の外にある
    #[error("セグメント {index} の範囲エラー: {source}")]
    SegmentRange {
        index: usize,
        #[source]
        source: AudioError,
    },

    /// 音声合成に失敗
    #[error("セグメント {index} の音声合成に失敗: {message}")]
    Synthesis { index: usize, message: String },

    /// 最終成果物を書き込めなかった
    #[error("出力の書き込みに失敗: {0}")]
    OutputWrite(String),

    /// 段階名付きのエラー
    #[error("{stage} に失敗: {source:#}")]
    Stage {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },
}

impl DubError {
    /// 段階名を付けてエラーを包む
    pub fn at(stage: Stage, source: impl Into<anyhow::Error>) -> Self {
        DubError::Stage {
            stage,
            source: source.into(),
        }
    }

    /// このエラーが発生した段階
    pub fn stage(&self) -> Stage {
        match self {
            DubError::Configuration(_) => Stage::Setup,
            DubError::Translation(_) => Stage::Translate,
            DubError::SegmentRange { .. } => Stage::BuildReference,
            DubError::Synthesis { .. } => Stage::Synthesize,
            DubError::OutputWrite(_) => Stage::WriteOutput,
            DubError::Stage { stage, .. } => *stage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_of_errors() {
        assert_eq!(DubError::Configuration("x".into()).stage(), Stage::Setup);
        assert_eq!(DubError::OutputWrite("x".into()).stage(), Stage::WriteOutput);
        assert_eq!(
            DubError::at(Stage::Mux, anyhow::anyhow!("ffmpeg failed")).stage(),
            Stage::Mux
        );
    }

    #[test]
    fn test_stage_error_message_names_stage() {
        let err = DubError::at(Stage::ExtractAudio, anyhow::anyhow!("ffmpeg failed"));
        let message = err.to_string();
        assert!(message.contains("音声抽出"));
        assert!(message.contains("ffmpeg failed"));
    }
}
