use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// 16ビット整数型のオーディオサンプル
///
/// PCM形式の音声データを表現するための型エイリアス。
/// -32768 から 32767 の範囲の値を取る。
pub type SampleI16 = i16;

/// 話者タグが無いセグメントに割り当てる話者ID
pub const DEFAULT_SPEAKER: &str = "unknown";

/// 字幕セグメント
///
/// 話者に紐づいた時間付きテキストの1単位。
/// `end_time_ms > start_time_ms` を常に満たす。
///
/// # Examples
///
/// ```
/// # use vdub::types::Segment;
/// let segment = Segment::new(0, 2000, "hi", "A").unwrap();
/// assert_eq!(segment.duration_ms(), 2000);
/// assert_eq!(segment.speaker, "A");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// 開始時刻 (ミリ秒)
    pub start_time_ms: u64,

    /// 終了時刻 (ミリ秒)
    pub end_time_ms: u64,

    /// 字幕テキスト（話者タグは除去済み）
    pub text: String,

    /// 話者ID
    #[serde(default = "default_speaker")]
    pub speaker: String,
}

fn default_speaker() -> String {
    DEFAULT_SPEAKER.to_string()
}

impl Segment {
    /// 新しいセグメントを作成
    ///
    /// 終了時刻が開始時刻以下の場合は `None` を返す。
    pub fn new(
        start_time_ms: u64,
        end_time_ms: u64,
        text: impl Into<String>,
        speaker: impl Into<String>,
    ) -> Option<Self> {
        if end_time_ms <= start_time_ms {
            return None;
        }
        Some(Self {
            start_time_ms,
            end_time_ms,
            text: text.into(),
            speaker: speaker.into(),
        })
    }

    /// セグメントに割り当てられた時間幅 (ミリ秒)
    pub fn duration_ms(&self) -> u64 {
        self.end_time_ms - self.start_time_ms
    }
}

/// 字幕ファイルに書き出す1ブロック
///
/// `index` は1始まり。時刻はミリ秒で保持し、書き出し時に
/// タイムコード形式へ変換する。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimedText {
    pub index: usize,
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
}

/// 文字起こしエンジンが返すセグメント（秒単位の浮動小数）
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// パイプラインの処理段階
///
/// 警告やエラーメッセージでどの段階で問題が起きたかを示す。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Setup,
    ExtractAudio,
    ParseSubtitles,
    BuildReference,
    Transcribe,
    Translate,
    Synthesize,
    Compose,
    WriteOutput,
    Mux,
    Cleanup,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Setup => "初期化",
            Stage::ExtractAudio => "音声抽出",
            Stage::ParseSubtitles => "字幕解析",
            Stage::BuildReference => "話者サンプル作成",
            Stage::Transcribe => "文字起こし",
            Stage::Translate => "翻訳",
            Stage::Synthesize => "音声合成",
            Stage::Compose => "トラック合成",
            Stage::WriteOutput => "出力書き込み",
            Stage::Mux => "動画結合",
            Stage::Cleanup => "後片付け",
        };
        f.write_str(name)
    }
}

/// 処理を止めずに回復した問題の記録
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunWarning {
    pub stage: Stage,
    pub message: String,
}

/// 1回の実行結果
///
/// 出力パス、処理したセグメント数、回復済みの警告一覧を保持する。
#[derive(Clone, Debug, Default, Serialize)]
pub struct RunReport {
    pub output: PathBuf,
    pub segments: usize,
    pub warnings: Vec<RunWarning>,
}

impl RunReport {
    /// 警告を記録し、同時にログにも出力する
    pub fn warn(&mut self, stage: Stage, message: impl Into<String>) {
        let message = message.into();
        log::warn!("[{}] {}", stage, message);
        self.warnings.push(RunWarning { stage, message });
    }

    /// 1行のJSONにする (`--report-json`)
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_rejects_empty_window() {
        assert!(Segment::new(1000, 1000, "x", "A").is_none());
        assert!(Segment::new(2000, 1000, "x", "A").is_none());
        assert!(Segment::new(1000, 1001, "x", "A").is_some());
    }

    #[test]
    fn test_segment_default_speaker_deserialization() {
        let json = r#"{"start_time_ms": 0, "end_time_ms": 500, "text": "hello"}"#;
        let segment: Segment = serde_json::from_str(json).unwrap();
        assert_eq!(segment.speaker, DEFAULT_SPEAKER);
        assert_eq!(segment.duration_ms(), 500);
    }

    #[test]
    fn test_stage_serialization() {
        let json = serde_json::to_string(&Stage::ParseSubtitles).unwrap();
        assert_eq!(json, r#""parse_subtitles""#);
    }

    #[test]
    fn test_run_report_collects_warnings() {
        let mut report = RunReport::default();
        report.warn(Stage::Translate, "翻訳に失敗");
        report.warn(Stage::Synthesize, "合成に失敗");

        assert_eq!(report.warnings.len(), 2);
        assert_eq!(report.warnings[0].stage, Stage::Translate);
        assert_eq!(report.warnings[1].message, "合成に失敗");
    }

    #[test]
    fn test_run_report_json() {
        let mut report = RunReport {
            output: PathBuf::from("out/video_dubbed.mp4"),
            segments: 3,
            warnings: Vec::new(),
        };
        report.warn(Stage::BuildReference, "話者 A のサンプルを保存できません");

        let json = report.to_json().unwrap();
        assert!(!json.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["output"], "out/video_dubbed.mp4");
        assert_eq!(value["segments"], 3);
        assert_eq!(value["warnings"][0]["stage"], "build_reference");
        assert_eq!(
            value["warnings"][0]["message"],
            "話者 A のサンプルを保存できません"
        );
    }
}
