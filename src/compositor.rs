use crate::audio::AudioTrack;

/// 吹き替えトラックの合成器
///
/// 元音声と同じ長さの無音トラックを持ち、長さを合わせた各クリップを
/// 元の開始位置に重ねる。合成規則は「置き換え」: クリップが覆う区間の
/// サンプルはクリップの値で上書きされる。したがって区間が重なった場合は
/// 後から重ねたクリップが勝つ。
///
/// トラックへの書き込みはこの構造体だけが行う（単一の所有者）。
///
/// # Examples
///
/// ```
/// # use vdub::audio::AudioTrack;
/// # use vdub::compositor::TrackCompositor;
/// let compositor = TrackCompositor::new(10_000, 16000);
/// let track = compositor.finalize();
/// assert_eq!(track.duration_ms(), 10_000);
/// assert!(track.is_silent());
/// ```
pub struct TrackCompositor {
    track: AudioTrack,
    clips_applied: usize,
}

impl TrackCompositor {
    /// 指定長の無音トラックで初期化
    pub fn new(duration_ms: u64, sample_rate: u32) -> Self {
        Self {
            track: AudioTrack::silent(duration_ms, sample_rate),
            clips_applied: 0,
        }
    }

    /// クリップを `start_ms` の位置に重ねる
    ///
    /// トラック末尾をはみ出した部分は捨てる。サンプルレートが異なる
    /// クリップは先にトラックのレートへ変換する。
    /// 実際に書き込んだサンプル数を返す。
    pub fn overlay(&mut self, clip: &AudioTrack, start_ms: u64) -> usize {
        let converted;
        let clip = if clip.sample_rate() == self.track.sample_rate() {
            clip
        } else {
            converted = clip.resample(self.track.sample_rate());
            &converted
        };

        let start = self.track.sample_index(start_ms);
        let track_len = self.track.len();
        self.clips_applied += 1;

        if start >= track_len {
            log::warn!(
                "クリップ開始位置 {} ms がトラック長 {} ms を超えています",
                start_ms,
                self.track.duration_ms()
            );
            return 0;
        }

        let end = (start + clip.len()).min(track_len);
        let written = end - start;
        if written < clip.len() {
            log::debug!(
                "クリップ末尾 {} サンプルがトラック外のため切り捨て",
                clip.len() - written
            );
        }

        self.track.samples_mut()[start..end].copy_from_slice(&clip.samples()[..written]);
        written
    }

    /// これまでに重ねたクリップ数
    pub fn clips_applied(&self) -> usize {
        self.clips_applied
    }

    /// トラック長 (ミリ秒)
    pub fn duration_ms(&self) -> u64 {
        self.track.duration_ms()
    }

    /// 合成を終了してトラックを取り出す
    pub fn finalize(self) -> AudioTrack {
        log::debug!(
            "トラック合成完了: {} クリップ, {} ms",
            self.clips_applied,
            self.track.duration_ms()
        );
        self.track
    }
}
