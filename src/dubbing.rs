use crate::audio::AudioTrack;
use crate::backend::{translate_or_original, Synthesizer, Translator};
use crate::compositor::TrackCompositor;
use crate::config::{Config, SynthesisFailurePolicy};
use crate::error::DubError;
use crate::fitter::{fit_to_window, FitAction};
use crate::media::MediaTool;
use crate::silence::SilenceTrimmer;
use crate::speaker::{SpeakerGroups, SpeakerReferences};
use crate::srt::load_srt_file;
use crate::types::{RunReport, RunWarning, Segment, Stage};
use crate::workspace::TempWorkspace;
use futures_util::stream::{self, StreamExt};
use std::path::{Path, PathBuf};

/// 吹き替えのオプション
#[derive(Clone, Debug)]
pub struct DubOptions {
    /// 出力先（省略時は `<動画名>_dubbed.mp4`）
    pub output: Option<PathBuf>,
    pub source_language: Option<String>,
    pub target_language: String,
    /// 字幕テキストを合成前に翻訳するか
    pub translate: bool,
}

impl Default for DubOptions {
    fn default() -> Self {
        Self {
            output: None,
            source_language: None,
            target_language: "en".to_string(),
            translate: true,
        }
    }
}

/// 吹き替え動画の既定の出力パス
pub fn default_dub_path(video: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    PathBuf::from(format!("{}_dubbed.mp4", stem))
}

/// 話者サンプルの中間ファイル名
///
/// 話者IDはファイル名用に置き換えると衝突しうるため、初出順の番号を付ける。
fn reference_file_name(order: usize, speaker: &str) -> String {
    format!("ref_{}_{}.wav", order, speaker)
}

/// 長さ合わせ済みの1セグメント分の音声
struct RenderedSegment {
    clip: AudioTrack,
    action: FitAction,
    report: RunReport,
}

/// 吹き替えパイプライン
///
/// ```text
/// [動画] → [音声抽出] ─────────────┐
/// [SRT]  → [字幕解析] → [話者分類] → [話者サンプル]
///                                      ↓
///            (セグメント毎) [翻訳] → [音声合成] → [無音除去] → [長さ合わせ]
///                                      ↓
///                              [トラック合成] → [動画結合]
/// ```
///
/// 合成は `workers` 件まで同時に実行するが、トラックへの書き込みは
/// 常に入力順に1か所で行う。重なった区間は後のセグメントが勝つ。
pub struct Dubber<'a> {
    media: &'a dyn MediaTool,
    synthesizer: &'a dyn Synthesizer,
    translator: Option<&'a dyn Translator>,
    trimmer: SilenceTrimmer,
    sample_rate: u32,
    on_failure: SynthesisFailurePolicy,
    workers: usize,
}

impl<'a> Dubber<'a> {
    pub fn new(
        config: &Config,
        media: &'a dyn MediaTool,
        synthesizer: &'a dyn Synthesizer,
        translator: Option<&'a dyn Translator>,
    ) -> Self {
        Self {
            media,
            synthesizer,
            translator,
            trimmer: SilenceTrimmer::new(&config.silence),
            sample_rate: config.audio.sample_rate,
            on_failure: config.synthesis.on_failure,
            workers: config.synthesis.workers.max(1),
        }
    }

    /// 動画と字幕から吹き替え動画を作成
    pub async fn process_video(
        &self,
        video: &Path,
        subtitles: &Path,
        options: &DubOptions,
        workspace: &mut TempWorkspace,
    ) -> Result<RunReport, DubError> {
        let mut report = RunReport::default();

        // 1. 元音声
        let source_path = workspace.artifact("extracted_audio.wav");
        self.media
            .extract_audio(video, &source_path, self.sample_rate)
            .await
            .map_err(|e| DubError::at(Stage::ExtractAudio, e))?;
        let source = AudioTrack::read_wav(&source_path)
            .map_err(|e| DubError::at(Stage::ExtractAudio, e))?;
        log::info!(
            "元音声: {} ms ({} Hz)",
            source.duration_ms(),
            source.sample_rate()
        );

        // 2. 字幕
        let parsed =
            load_srt_file(subtitles).map_err(|e| DubError::at(Stage::ParseSubtitles, e))?;
        // スキップしたブロックは解析時にログ出力済み
        report
            .warnings
            .extend(parsed.skipped.iter().map(|skipped| RunWarning {
                stage: Stage::ParseSubtitles,
                message: format!("ブロック {}: {}", skipped.position, skipped.reason),
            }));
        let segments = parsed.segments;
        log::info!("{} セグメントを読み込みました", segments.len());

        // 3. 話者サンプル
        let groups = SpeakerGroups::build(&segments);
        let references = SpeakerReferences::build(&source, &groups, &mut report);
        log::info!(
            "話者 {} 人 (サンプルあり {} 人)",
            groups.len(),
            references.len()
        );
        if groups.is_empty() {
            report.warn(
                Stage::ParseSubtitles,
                "字幕にセグメントがありません。無音のトラックを作成します",
            );
        }
        for (order, speaker) in groups.speakers().iter().enumerate() {
            let Some(sample) = references.get(speaker) else {
                continue;
            };
            let path = workspace.artifact(&reference_file_name(order + 1, speaker));
            if let Err(e) = sample.write_wav(&path) {
                report.warn(
                    Stage::BuildReference,
                    format!("話者 {} のサンプルを保存できません: {:#}", speaker, e),
                );
            }
        }

        // 4. 合成とトラック作成
        let track = self
            .compose(&source, &segments, &references, options, &mut report)
            .await?;

        // 5. 出力
        let dubbed_path = workspace.artifact("dubbed_audio.wav");
        track
            .write_wav(&dubbed_path)
            .map_err(|e| DubError::OutputWrite(format!("{:?}: {:#}", dubbed_path, e)))?;

        let output = options
            .output
            .clone()
            .unwrap_or_else(|| default_dub_path(video));
        self.media
            .mux_audio(video, &dubbed_path, &output)
            .await
            .map_err(|e| DubError::at(Stage::Mux, e))?;
        if !output.exists() {
            return Err(DubError::OutputWrite(format!(
                "出力ファイルが作成されていません: {:?}",
                output
            )));
        }
        log::info!("吹き替え動画を保存しました: {:?}", output);

        report.output = output;
        report.segments = segments.len();
        Ok(report)
    }

    /// 全セグメントを合成して元音声と同じ長さのトラックを作る
    ///
    /// 警告は入力順に `report` へ追加される。
    pub async fn compose(
        &self,
        source: &AudioTrack,
        segments: &[Segment],
        references: &SpeakerReferences,
        options: &DubOptions,
        report: &mut RunReport,
    ) -> Result<AudioTrack, DubError> {
        let mut compositor = TrackCompositor::new(source.duration_ms(), source.sample_rate());
        let sample_rate = source.sample_rate();

        let mut pending = stream::iter(segments.iter().enumerate().map(|(position, segment)| {
            self.render_segment(position + 1, segment, references, options, sample_rate)
        }))
        .buffered(self.workers);

        let mut position = 0;
        while let Some(result) = pending.next().await {
            let segment = &segments[position];
            position += 1;
            let rendered = result?;

            report.warnings.extend(rendered.report.warnings);
            if let FitAction::Truncated { dropped_ms } = rendered.action {
                log::debug!("セグメント {}: 末尾 {} ms を切り捨て", position, dropped_ms);
            }

            let written = compositor.overlay(&rendered.clip, segment.start_time_ms);
            if written == 0 && !rendered.clip.is_empty() {
                report.warn(
                    Stage::Compose,
                    format!(
                        "セグメント {} の開始位置 {} ms が元音声の外です",
                        position, segment.start_time_ms
                    ),
                );
            }
        }

        log::info!("{} セグメントをトラックに配置しました", compositor.clips_applied());
        Ok(compositor.finalize())
    }

    async fn render_segment(
        &self,
        index: usize,
        segment: &Segment,
        references: &SpeakerReferences,
        options: &DubOptions,
        sample_rate: u32,
    ) -> Result<RenderedSegment, DubError> {
        let mut report = RunReport::default();

        let text = if options.translate {
            translate_or_original(
                self.translator,
                &segment.text,
                options.source_language.as_deref(),
                &options.target_language,
                &mut report,
            )
            .await
        } else {
            segment.text.clone()
        };

        let clip = if text.trim().is_empty() {
            log::debug!("セグメント {}: テキストが空のため無音", index);
            AudioTrack::new(Vec::new(), sample_rate)
        } else {
            let reference = references.resolve(&segment.speaker);
            if reference.is_fallback() {
                log::info!(
                    "セグメント {}: 話者 {} のサンプルが無いため元音声全体を使用",
                    index,
                    segment.speaker
                );
            }

            match self
                .synthesizer
                .synthesize(&text, reference.track(), &options.target_language)
                .await
            {
                Ok(clip) => self.trimmer.trim(&clip).resample(sample_rate),
                Err(e) => {
                    let err = DubError::Synthesis {
                        index,
                        message: format!("{:#}", e),
                    };
                    match self.on_failure {
                        SynthesisFailurePolicy::Abort => return Err(err),
                        SynthesisFailurePolicy::Silence => {
                            report.warn(Stage::Synthesize, format!("{} (無音で代替)", err));
                            AudioTrack::new(Vec::new(), sample_rate)
                        }
                    }
                }
            }
        };

        let (clip, action) = fit_to_window(clip, segment.duration_ms());
        log::debug!(
            "セグメント {} [{}] {} ms: {:?}",
            index,
            segment.speaker,
            segment.duration_ms(),
            action
        );

        Ok(RenderedSegment {
            clip,
            action,
            report,
        })
    }
}
