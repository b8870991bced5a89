use crate::audio::AudioTrack;
use crate::error::DubError;
use crate::types::{RunReport, Segment, Stage};
use std::collections::HashMap;

/// 話者ごとのセグメント一覧
///
/// 各話者のセグメントは入力順のまま保持する（時刻順には並べ替えない）。
/// 話者の並びは初出順。1回の実行の中で一度だけ作られ、以後は読み取り専用。
#[derive(Clone, Debug, Default)]
pub struct SpeakerGroups {
    order: Vec<String>,
    groups: HashMap<String, Vec<(usize, Segment)>>,
}

impl SpeakerGroups {
    /// セグメント列を話者ごとにまとめる
    ///
    /// 重複除去や並べ替えは行わない。
    ///
    /// # Examples
    ///
    /// ```
    /// # use vdub::speaker::SpeakerGroups;
    /// # use vdub::types::Segment;
    /// let segments = vec![
    ///     Segment::new(0, 1000, "a", "A").unwrap(),
    ///     Segment::new(1000, 2000, "b", "B").unwrap(),
    ///     Segment::new(2000, 3000, "c", "A").unwrap(),
    /// ];
    /// let groups = SpeakerGroups::build(&segments);
    /// assert_eq!(groups.speakers(), ["A", "B"]);
    /// assert_eq!(groups.segments("A").count(), 2);
    /// ```
    pub fn build(segments: &[Segment]) -> Self {
        let mut order = Vec::new();
        let mut groups: HashMap<String, Vec<(usize, Segment)>> = HashMap::new();

        for (position, segment) in segments.iter().enumerate() {
            groups
                .entry(segment.speaker.clone())
                .or_insert_with(|| {
                    order.push(segment.speaker.clone());
                    Vec::new()
                })
                .push((position, segment.clone()));
        }

        Self { order, groups }
    }

    /// 話者ID一覧（初出順）
    pub fn speakers(&self) -> &[String] {
        &self.order
    }

    /// 話者のセグメントを入力順で返す
    pub fn segments<'a>(&'a self, speaker: &str) -> impl Iterator<Item = &'a Segment> + 'a {
        self.groups
            .get(speaker)
            .into_iter()
            .flat_map(|group| group.iter().map(|(_, segment)| segment))
    }

    /// 話者のセグメントを入力位置付きで返す
    pub fn indexed_segments(&self, speaker: &str) -> &[(usize, Segment)] {
        self.groups
            .get(speaker)
            .map(|group| group.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// 合成時に使う話者サンプルの選択結果
#[derive(Debug)]
pub enum ReferenceChoice<'a> {
    /// 話者自身の発話から作ったサンプル
    Speaker(&'a AudioTrack),
    /// 話者サンプルが無いため元音声全体を使う
    Fallback(&'a AudioTrack),
}

impl<'a> ReferenceChoice<'a> {
    pub fn track(&self) -> &'a AudioTrack {
        match self {
            ReferenceChoice::Speaker(track) | ReferenceChoice::Fallback(track) => track,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ReferenceChoice::Fallback(_))
    }
}

/// 話者ごとの声質サンプル
///
/// 元音声から各話者の発話区間を切り出し、入力順に連結したもの。
/// 発話区間が1つも取れなかった話者はサンプルを持たず、
/// `resolve` で元音声全体へのフォールバックになる。
pub struct SpeakerReferences {
    samples: HashMap<String, AudioTrack>,
    fallback: AudioTrack,
}

impl SpeakerReferences {
    /// 元音声と話者グループから話者サンプルを作成
    ///
    /// 元音声の範囲外にある区間は `SegmentRange` として警告を記録し、
    /// その区間だけ空の音声として扱う（話者全体は中断しない）。
    pub fn build(source: &AudioTrack, groups: &SpeakerGroups, report: &mut RunReport) -> Self {
        let mut samples = HashMap::new();

        for speaker in groups.speakers() {
            let mut combined = AudioTrack::new(Vec::new(), source.sample_rate());

            for (position, segment) in groups.indexed_segments(speaker) {
                match source.slice_ms(segment.start_time_ms, segment.end_time_ms) {
                    Ok(slice) => combined.append(&slice),
                    Err(source_err) => {
                        let err = DubError::SegmentRange {
                            index: position + 1,
                            source: source_err,
                        };
                        report.warn(Stage::BuildReference, err.to_string());
                    }
                }
            }

            if combined.is_empty() {
                report.warn(
                    Stage::BuildReference,
                    format!(
                        "話者 {} のサンプルが空です。元音声全体を代わりに使用します",
                        speaker
                    ),
                );
                continue;
            }

            log::info!(
                "話者 {}: サンプル {:.2}秒",
                speaker,
                combined.duration_ms() as f64 / 1000.0
            );
            samples.insert(speaker.clone(), combined);
        }

        Self {
            samples,
            fallback: source.clone(),
        }
    }

    /// 話者のサンプルを返す。無ければ元音声全体（フォールバック）
    pub fn resolve(&self, speaker: &str) -> ReferenceChoice<'_> {
        match self.samples.get(speaker) {
            Some(track) => ReferenceChoice::Speaker(track),
            None => ReferenceChoice::Fallback(&self.fallback),
        }
    }

    /// 話者自身のサンプル（フォールバックは含まない）
    pub fn get(&self, speaker: &str) -> Option<&AudioTrack> {
        self.samples.get(speaker)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
