use crate::audio::AudioTrack;
use crate::backend::{translate_or_original, Transcriber, Translator};
use crate::error::DubError;
use crate::media::MediaTool;
use crate::srt::write_srt_file;
use crate::timecode::seconds_to_ms;
use crate::types::{RunReport, Stage, TimedText, TranscriptSegment};
use crate::workspace::TempWorkspace;
use std::path::{Path, PathBuf};

/// 翻訳の指定
pub struct TranslationRequest<'a> {
    /// 翻訳器（`None` は利用不可）
    pub translator: Option<&'a dyn Translator>,
    pub source_language: Option<&'a str>,
    pub target_language: &'a str,
}

/// 文字起こし結果を字幕ブロックに変換する
///
/// 秒単位の時刻をミリ秒に丸め、入力順に1始まりの番号を振る。
/// `translation` が指定されていれば各テキストを翻訳する。翻訳に
/// 失敗したセグメントは原文のまま残り、警告が `report` に記録される。
pub async fn transcript_to_timed_text(
    segments: &[TranscriptSegment],
    translation: Option<&TranslationRequest<'_>>,
    report: &mut RunReport,
) -> Vec<TimedText> {
    let mut entries = Vec::with_capacity(segments.len());

    for (i, segment) in segments.iter().enumerate() {
        let text = match translation {
            Some(request) => {
                translate_or_original(
                    request.translator,
                    &segment.text,
                    request.source_language,
                    request.target_language,
                    report,
                )
                .await
            }
            None => segment.text.clone(),
        };

        entries.push(TimedText {
            index: i + 1,
            start_ms: seconds_to_ms(segment.start),
            end_ms: seconds_to_ms(segment.end),
            text,
        });
    }

    entries
}

/// 字幕生成のオプション
#[derive(Clone, Debug)]
pub struct SubtitleOptions {
    /// 出力先（省略時は動画名から決める）
    pub output: Option<PathBuf>,
    /// 文字起こしの言語（省略時は自動判定）
    pub source_language: Option<String>,
    pub target_language: String,
    /// 字幕テキストを翻訳するか
    pub translate: bool,
}

impl Default for SubtitleOptions {
    fn default() -> Self {
        Self {
            output: None,
            source_language: None,
            target_language: "en".to_string(),
            translate: false,
        }
    }
}

/// 字幕の既定の出力パス
///
/// 翻訳する場合は `<動画名>_<言語>.srt`、しない場合は `<動画名>.srt`。
pub fn default_subtitle_path(video: &Path, target_language: Option<&str>) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    match target_language {
        Some(language) => PathBuf::from(format!("{}_{}.srt", stem, language)),
        None => PathBuf::from(format!("{}.srt", stem)),
    }
}

/// 字幕生成パイプライン
///
/// ```text
/// [動画] → [音声抽出] → [文字起こし] → [時刻変換 (+翻訳)] → [SRT書き出し]
/// ```
pub struct SubtitleGenerator<'a> {
    media: &'a dyn MediaTool,
    transcriber: &'a dyn Transcriber,
    translator: Option<&'a dyn Translator>,
    sample_rate: u32,
}

impl<'a> SubtitleGenerator<'a> {
    pub fn new(
        media: &'a dyn MediaTool,
        transcriber: &'a dyn Transcriber,
        translator: Option<&'a dyn Translator>,
        sample_rate: u32,
    ) -> Self {
        Self {
            media,
            transcriber,
            translator,
            sample_rate,
        }
    }

    /// 動画から字幕ファイルを作成
    pub async fn generate(
        &self,
        video: &Path,
        options: &SubtitleOptions,
        workspace: &mut TempWorkspace,
    ) -> Result<RunReport, DubError> {
        let mut report = RunReport::default();

        let wav_path = workspace.artifact("extracted_audio.wav");
        self.media
            .extract_audio(video, &wav_path, self.sample_rate)
            .await
            .map_err(|e| DubError::at(Stage::ExtractAudio, e))?;
        let audio =
            AudioTrack::read_wav(&wav_path).map_err(|e| DubError::at(Stage::ExtractAudio, e))?;
        log::info!("音声の長さ: {} ms", audio.duration_ms());

        log::info!("文字起こし中 ({})...", self.transcriber.name());
        let segments = self
            .transcriber
            .transcribe(&audio, options.source_language.as_deref())
            .await
            .map_err(|e| DubError::at(Stage::Transcribe, e))?;
        log::info!("{} セグメントを認識", segments.len());

        let request = options.translate.then(|| TranslationRequest {
            translator: self.translator,
            source_language: options.source_language.as_deref(),
            target_language: &options.target_language,
        });
        if request.is_some() {
            log::info!("字幕を {} に翻訳します", options.target_language);
        }
        let entries = transcript_to_timed_text(&segments, request.as_ref(), &mut report).await;

        let output = options.output.clone().unwrap_or_else(|| {
            default_subtitle_path(
                video,
                options.translate.then_some(options.target_language.as_str()),
            )
        });
        write_srt_file(&output, &entries)
            .map_err(|e| DubError::OutputWrite(format!("{:?}: {:#}", output, e)))?;
        log::info!("字幕ファイルを保存しました: {:?}", output);

        report.output = output;
        report.segments = entries.len();
        Ok(report)
    }
}
