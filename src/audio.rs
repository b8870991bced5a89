use crate::error::AudioError;
use crate::types::SampleI16;
use anyhow::{Context, Result};
use std::fs;
use std::io::{BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;

/// モノラル16bit PCMの音声バッファ
///
/// 時間はミリ秒で扱い、サンプル数との変換は四捨五入で行う。
/// そのため `silent(ms, rate).duration_ms() == ms` が常に成り立つ。
///
/// # Examples
///
/// ```
/// # use vdub::audio::AudioTrack;
/// let track = AudioTrack::silent(10_000, 16000);
/// assert_eq!(track.duration_ms(), 10_000);
/// assert!(track.is_silent());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioTrack {
    samples: Vec<SampleI16>,
    sample_rate: u32,
}

impl AudioTrack {
    pub fn new(samples: Vec<SampleI16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate: sample_rate.max(1),
        }
    }

    /// 指定時間の無音トラックを作成
    pub fn silent(duration_ms: u64, sample_rate: u32) -> Self {
        let sample_rate = sample_rate.max(1);
        let len = ms_to_samples(duration_ms, sample_rate);
        Self::new(vec![0; len], sample_rate)
    }

    pub fn samples(&self) -> &[SampleI16] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [SampleI16] {
        &mut self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// 長さ (ミリ秒)
    pub fn duration_ms(&self) -> u64 {
        samples_to_ms(self.samples.len(), self.sample_rate)
    }

    /// 全サンプルが0かどうか
    pub fn is_silent(&self) -> bool {
        self.samples.iter().all(|&s| s == 0)
    }

    /// ミリ秒をこのトラックのサンプル位置に変換
    pub fn sample_index(&self, ms: u64) -> usize {
        ms_to_samples(ms, self.sample_rate)
    }

    /// `[start_ms, end_ms)` を切り出す
    ///
    /// 終了位置がバッファ長を超える場合は `AudioError::OutOfRange`。
    /// 1サンプル未満の丸め誤差は末尾に合わせて吸収する。
    pub fn slice_ms(&self, start_ms: u64, end_ms: u64) -> Result<AudioTrack, AudioError> {
        let duration_ms = self.duration_ms();
        if start_ms > end_ms || end_ms > duration_ms {
            return Err(AudioError::OutOfRange {
                start_ms,
                end_ms,
                duration_ms,
            });
        }

        let start = self.sample_index(start_ms).min(self.samples.len());
        let end = self.sample_index(end_ms).min(self.samples.len());
        Ok(AudioTrack::new(
            self.samples[start..end].to_vec(),
            self.sample_rate,
        ))
    }

    /// 別トラックを末尾に連結（サンプルレートが異なれば変換してから）
    pub fn append(&mut self, other: &AudioTrack) {
        if other.sample_rate == self.sample_rate {
            self.samples.extend_from_slice(&other.samples);
        } else {
            let converted = other.resample(self.sample_rate);
            self.samples.extend_from_slice(&converted.samples);
        }
    }

    /// 先頭から指定時間だけ残して切り詰める
    pub fn truncate_ms(&mut self, duration_ms: u64) {
        let len = self.sample_index(duration_ms);
        self.samples.truncate(len);
    }

    /// 末尾に無音を足して指定時間にする（既に長ければ何もしない）
    pub fn pad_to_ms(&mut self, duration_ms: u64) {
        let len = self.sample_index(duration_ms);
        if self.samples.len() < len {
            self.samples.resize(len, 0);
        }
    }

    /// 線形補間でサンプルレートを変換
    pub fn resample(&self, to_rate: u32) -> AudioTrack {
        let to_rate = to_rate.max(1);
        if to_rate == self.sample_rate {
            return self.clone();
        }

        let ratio = to_rate as f64 / self.sample_rate as f64;
        let new_len = (self.samples.len() as f64 * ratio).round() as usize;
        let mut output = Vec::with_capacity(new_len);

        for i in 0..new_len {
            let src_idx = i as f64 / ratio;
            let idx = src_idx.floor() as usize;
            let frac = src_idx.fract();
            let sample = if idx + 1 < self.samples.len() {
                self.samples[idx] as f64 * (1.0 - frac) + self.samples[idx + 1] as f64 * frac
            } else if idx < self.samples.len() {
                self.samples[idx] as f64
            } else {
                0.0
            };
            output.push(sample.round().clamp(i16::MIN as f64, i16::MAX as f64) as SampleI16);
        }

        AudioTrack::new(output, to_rate)
    }

    /// WAVデータを読み込む
    ///
    /// 多チャンネルはモノラルに平均化し、float/24bit/32bit は16bitに変換する。
    pub fn from_wav_reader<R: Read>(reader: R) -> Result<AudioTrack, AudioError> {
        let mut reader = hound::WavReader::new(reader)?;
        let spec = reader.spec();
        if spec.sample_rate == 0 {
            return Err(AudioError::InvalidSampleRate(spec.sample_rate));
        }
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f64> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .map(|s| s.map(|v| v as f64 * i16::MAX as f64))
                .collect::<Result<_, _>>()?,
            hound::SampleFormat::Int => {
                let shift = spec.bits_per_sample.saturating_sub(16) as u32;
                let scale = if spec.bits_per_sample < 16 {
                    (1i64 << (16 - spec.bits_per_sample)) as f64
                } else {
                    1.0
                };
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| (v >> shift) as f64 * scale))
                    .collect::<Result<_, _>>()?
            }
        };

        let samples = interleaved
            .chunks(channels)
            .map(|frame| {
                let mean = frame.iter().sum::<f64>() / frame.len() as f64;
                mean.round().clamp(i16::MIN as f64, i16::MAX as f64) as SampleI16
            })
            .collect();

        Ok(AudioTrack::new(samples, spec.sample_rate))
    }

    /// WAVバイト列から読み込む
    pub fn from_wav_bytes(bytes: &[u8]) -> Result<AudioTrack, AudioError> {
        Self::from_wav_reader(Cursor::new(bytes))
    }

    /// WAVファイルから読み込む
    pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<AudioTrack> {
        let file = fs::File::open(path.as_ref())
            .with_context(|| format!("WAVファイルを開けません: {:?}", path.as_ref()))?;
        let track = Self::from_wav_reader(std::io::BufReader::new(file))
            .with_context(|| format!("WAVファイルの読み込みに失敗: {:?}", path.as_ref()))?;
        Ok(track)
    }

    fn wav_spec(&self) -> hound::WavSpec {
        hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }

    fn write_wav_to<W: Write + Seek>(&self, writer: W) -> Result<(), AudioError> {
        let mut writer = hound::WavWriter::new(writer, self.wav_spec())?;
        for &sample in &self.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        Ok(())
    }

    /// WAV形式のバイト列に変換
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>, AudioError> {
        let mut cursor = Cursor::new(Vec::new());
        self.write_wav_to(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    /// WAVファイルとして書き出し
    pub fn write_wav<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = fs::File::create(path.as_ref())
            .with_context(|| format!("WAVファイルの作成に失敗: {:?}", path.as_ref()))?;
        self.write_wav_to(BufWriter::new(file))
            .with_context(|| format!("WAVファイルの書き込みに失敗: {:?}", path.as_ref()))?;
        log::debug!(
            "WAVファイル書き込み完了: {:?}, {}サンプル ({:.2}秒)",
            path.as_ref(),
            self.samples.len(),
            self.samples.len() as f64 / self.sample_rate as f64
        );
        Ok(())
    }
}

/// ミリ秒をサンプル数に変換（四捨五入）
pub fn ms_to_samples(ms: u64, sample_rate: u32) -> usize {
    ((ms as u128 * sample_rate as u128 + 500) / 1000) as usize
}

/// サンプル数をミリ秒に変換（四捨五入）
pub fn samples_to_ms(samples: usize, sample_rate: u32) -> u64 {
    let rate = sample_rate.max(1) as u128;
    ((samples as u128 * 1000 + rate / 2) / rate) as u64
}
