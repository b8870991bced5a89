use crate::audio::{ms_to_samples, AudioTrack};
use crate::config::SilenceConfig;
use crate::types::SampleI16;

/// 合成音声の前後の無音を取り除くフィルタ
///
/// RMS (Root Mean Square) ベースの判定をフレーム単位で行い、
/// 最初に閾値を超えたフレームから最後に閾値を超えたフレームまでを残す。
/// 状態を持たないため、同じ入力には常に同じ結果を返す。
///
/// # アルゴリズム
///
/// 1. トラックを `frame_ms` ごとのフレームに分割
/// 2. 各フレームのRMSを計算し、デシベル (dB) に変換: `20 * log10(rms)`
/// 3. 閾値を超えたフレームを音声とみなす
/// 4. 先頭・末尾の無音フレームを切り落とす
///
/// # Examples
///
/// ```
/// # use vdub::silence::SilenceTrimmer;
/// # use vdub::config::SilenceConfig;
/// # use vdub::audio::AudioTrack;
/// let trimmer = SilenceTrimmer::new(&SilenceConfig::default());
///
/// // 全て無音なら空になる
/// let silence = AudioTrack::silent(500, 16000);
/// assert!(trimmer.trim(&silence).is_empty());
/// ```
pub struct SilenceTrimmer {
    /// 音声判定の閾値 (dB)
    threshold_db: f32,

    /// 判定に使うフレーム長 (ミリ秒)
    frame_ms: u32,

    /// 無効化されている場合は入力をそのまま返す
    enabled: bool,
}

impl SilenceTrimmer {
    pub fn new(config: &SilenceConfig) -> Self {
        Self {
            threshold_db: config.threshold_db,
            frame_ms: config.frame_ms.max(1),
            enabled: config.enabled,
        }
    }

    /// 前後の無音を取り除いたトラックを返す
    pub fn trim(&self, track: &AudioTrack) -> AudioTrack {
        if !self.enabled || track.is_empty() {
            return track.clone();
        }

        let frame_len = ms_to_samples(self.frame_ms as u64, track.sample_rate()).max(1);
        let samples = track.samples();

        let voiced: Vec<bool> = samples
            .chunks(frame_len)
            .map(|frame| self.rms_to_db(self.calculate_rms(frame)) > self.threshold_db)
            .collect();

        let first = voiced.iter().position(|&v| v);
        let last = voiced.iter().rposition(|&v| v);

        match (first, last) {
            (Some(first), Some(last)) => {
                let start = first * frame_len;
                let end = ((last + 1) * frame_len).min(samples.len());
                if start > 0 || end < samples.len() {
                    log::debug!(
                        "無音除去: {} → {} サンプル",
                        samples.len(),
                        end - start
                    );
                }
                AudioTrack::new(samples[start..end].to_vec(), track.sample_rate())
            }
            _ => {
                log::debug!("無音除去: 全区間が無音 ({} サンプル)", samples.len());
                AudioTrack::new(Vec::new(), track.sample_rate())
            }
        }
    }

    /// RMS (Root Mean Square) を計算
    fn calculate_rms(&self, samples: &[SampleI16]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }

        let sum_of_squares: f64 = samples
            .iter()
            .map(|&s| {
                let normalized = s as f64 / i16::MAX as f64;
                normalized * normalized
            })
            .sum();

        let mean_square = sum_of_squares / samples.len() as f64;
        mean_square.sqrt() as f32
    }

    /// RMSをデシベル (dB) に変換
    fn rms_to_db(&self, rms: f32) -> f32 {
        if rms <= 0.0 {
            return -100.0; // 無音の場合の最小値
        }
        20.0 * rms.log10()
    }
}
