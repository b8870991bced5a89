use crate::audio::AudioTrack;

/// 長さ合わせの結果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FitAction {
    /// 長すぎたため末尾を切り捨てた
    Truncated { dropped_ms: u64 },
    /// 短かったため末尾に無音を足した
    Padded { added_ms: u64 },
    /// そのまま
    Unchanged,
}

/// 合成音声をセグメントの時間幅にぴったり合わせる
///
/// - 長い場合: 目標長で末尾を切り捨てる（フェードや速度変更はしない）
/// - 短い場合: 末尾に無音を足す
/// - 同じ場合: そのまま
///
/// 切り捨ては単語の途中で音声が切れることがある。これは
/// タイムラインの一致を優先した既知の音質上のトレードオフで、
/// 時間伸縮は行わない。
///
/// 戻り値のトラックは常に `target_ms` ちょうどの長さになる。
///
/// # Examples
///
/// ```
/// # use vdub::audio::AudioTrack;
/// # use vdub::fitter::{fit_to_window, FitAction};
/// let clip = AudioTrack::silent(3000, 22050);
/// let (fitted, action) = fit_to_window(clip, 2000);
/// assert_eq!(fitted.duration_ms(), 2000);
/// assert_eq!(action, FitAction::Truncated { dropped_ms: 1000 });
/// ```
pub fn fit_to_window(mut clip: AudioTrack, target_ms: u64) -> (AudioTrack, FitAction) {
    let target_len = clip.sample_index(target_ms);
    let clip_ms = clip.duration_ms();

    let action = if clip.len() > target_len {
        clip.truncate_ms(target_ms);
        FitAction::Truncated {
            dropped_ms: clip_ms.saturating_sub(target_ms),
        }
    } else if clip.len() < target_len {
        clip.pad_to_ms(target_ms);
        FitAction::Padded {
            added_ms: target_ms.saturating_sub(clip_ms),
        }
    } else {
        FitAction::Unchanged
    };

    (clip, action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ms_to_samples;

    fn tone(duration_ms: u64, sample_rate: u32) -> AudioTrack {
        let len = ms_to_samples(duration_ms, sample_rate);
        AudioTrack::new((0..len).map(|i| (i % 1000) as i16 + 1).collect(), sample_rate)
    }

    #[test]
    fn test_truncate_keeps_head() {
        let clip = tone(3000, 16000);
        let original = clip.clone();
        let (fitted, action) = fit_to_window(clip, 2000);

        assert_eq!(fitted.duration_ms(), 2000);
        assert_eq!(fitted.samples(), &original.samples()[..32000]);
        assert_eq!(action, FitAction::Truncated { dropped_ms: 1000 });
    }

    #[test]
    fn test_pad_with_trailing_silence() {
        let clip = tone(500, 16000);
        let (fitted, action) = fit_to_window(clip, 1200);

        assert_eq!(fitted.duration_ms(), 1200);
        assert!(fitted.samples()[..8000].iter().all(|&s| s != 0));
        assert!(fitted.samples()[8000..].iter().all(|&s| s == 0));
        assert_eq!(action, FitAction::Padded { added_ms: 700 });
    }

    #[test]
    fn test_equal_length_unchanged() {
        let clip = tone(1000, 16000);
        let (fitted, action) = fit_to_window(clip.clone(), 1000);
        assert_eq!(fitted, clip);
        assert_eq!(action, FitAction::Unchanged);
    }

    #[test]
    fn test_empty_clip_becomes_silence() {
        let clip = AudioTrack::new(Vec::new(), 24000);
        let (fitted, _) = fit_to_window(clip, 750);
        assert_eq!(fitted.duration_ms(), 750);
        assert!(fitted.is_silent());
    }

    #[test]
    fn test_length_is_always_exact() {
        for rate in [8000, 16000, 22050, 24000, 44100] {
            for clip_ms in [0, 1, 333, 1000, 4321] {
                for target in [1, 10, 999, 1000, 2500] {
                    let (fitted, _) = fit_to_window(tone(clip_ms, rate), target);
                    assert_eq!(
                        fitted.duration_ms(),
                        target,
                        "rate={} clip={} target={}",
                        rate,
                        clip_ms,
                        target
                    );
                    assert_eq!(fitted.len(), ms_to_samples(target, rate));
                }
            }
        }
    }
}
