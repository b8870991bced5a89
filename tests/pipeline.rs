use anyhow::Result;
use async_trait::async_trait;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use vdub::audio::{ms_to_samples, AudioTrack};
use vdub::backend::{Synthesizer, Transcriber, Translator};
use vdub::config::{Config, SynthesisFailurePolicy};
use vdub::dubbing::{DubOptions, Dubber};
use vdub::error::DubError;
use vdub::media::MediaTool;
use vdub::subtitle::{SubtitleGenerator, SubtitleOptions};
use vdub::types::{Stage, TranscriptSegment};
use vdub::workspace::TempWorkspace;

const RATE: u32 = 16000;

/// 決まった長さの元音声を書き出し、結合時は音声をそのまま出力にコピーする
struct FakeMedia {
    source_ms: u64,
}

#[async_trait]
impl MediaTool for FakeMedia {
    async fn extract_audio(&self, _video: &Path, wav_out: &Path, sample_rate: u32) -> Result<()> {
        let len = ms_to_samples(self.source_ms, sample_rate);
        AudioTrack::new(vec![500; len], sample_rate).write_wav(wav_out)
    }

    async fn mux_audio(&self, _video: &Path, audio: &Path, output: &Path) -> Result<()> {
        fs::copy(audio, output)?;
        Ok(())
    }
}

/// 結合しても何も書き出さない
struct SilentMux;

#[async_trait]
impl MediaTool for SilentMux {
    async fn extract_audio(&self, _video: &Path, wav_out: &Path, sample_rate: u32) -> Result<()> {
        AudioTrack::silent(1000, sample_rate).write_wav(wav_out)
    }

    async fn mux_audio(&self, _: &Path, _: &Path, _: &Path) -> Result<()> {
        Ok(())
    }
}

/// 3秒の一定値の音声を返す
struct FixedSynthesizer;

#[async_trait]
impl Synthesizer for FixedSynthesizer {
    async fn synthesize(&self, _: &str, reference: &AudioTrack, _: &str) -> Result<AudioTrack> {
        assert!(!reference.is_empty());
        let len = ms_to_samples(3000, 22050);
        Ok(AudioTrack::new(vec![4000; len], 22050))
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

struct FailingSynthesizer;

#[async_trait]
impl Synthesizer for FailingSynthesizer {
    async fn synthesize(&self, _: &str, _: &AudioTrack, _: &str) -> Result<AudioTrack> {
        anyhow::bail!("connection refused")
    }

    fn name(&self) -> &str {
        "failing"
    }
}

struct FakeTranscriber;

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _: &AudioTrack, _: Option<&str>) -> Result<Vec<TranscriptSegment>> {
        Ok(vec![TranscriptSegment {
            start: 1.5,
            end: 3.25,
            text: "hello".to_string(),
        }])
    }

    fn name(&self) -> &str {
        "fake"
    }
}

struct BrokenTranslator;

#[async_trait]
impl Translator for BrokenTranslator {
    async fn translate(&self, _: &str, _: Option<&str>, _: &str) -> Result<String> {
        anyhow::bail!("service unavailable")
    }

    fn name(&self) -> &str {
        "broken"
    }
}

fn write_subtitles(dir: &Path, content: &str) -> Result<std::path::PathBuf> {
    let path = dir.join("input.srt");
    fs::write(&path, content)?;
    Ok(path)
}

#[tokio::test]
async fn test_dub_truncates_long_clip_and_keeps_source_length() -> Result<()> {
    let root = TempDir::new()?;
    let srt = write_subtitles(root.path(), "1\n00:00:00,000 --> 00:00:02,000\n[A] hi\n")?;
    let output = root.path().join("out.wav");

    let config = Config::default();
    let media = FakeMedia { source_ms: 10_000 };
    let dubber = Dubber::new(&config, &media, &FixedSynthesizer, None);
    let options = DubOptions {
        output: Some(output.clone()),
        translate: false,
        ..DubOptions::default()
    };

    let mut workspace = TempWorkspace::create(root.path().join("temp"))?;
    let report = dubber
        .process_video(Path::new("video.mp4"), &srt, &options, &mut workspace)
        .await?;
    assert_eq!(workspace.cleanup(), 0);
    assert!(!root.path().join("temp").exists());

    assert_eq!(report.output, output);
    assert_eq!(report.segments, 1);
    assert!(report.warnings.is_empty());

    let track = AudioTrack::read_wav(&output)?;
    assert_eq!(track.duration_ms(), 10_000);
    assert_eq!(track.sample_rate(), RATE);

    let window = ms_to_samples(2000, RATE);
    assert!(track.samples()[..window].iter().all(|&s| s == 4000));
    assert!(track.samples()[window..].iter().all(|&s| s == 0));
    Ok(())
}

#[tokio::test]
async fn test_dub_reference_write_failure_is_reported() -> Result<()> {
    let root = TempDir::new()?;
    let speaker = "a".repeat(300);
    let srt = write_subtitles(
        root.path(),
        &format!("1\n00:00:00,000 --> 00:00:01,000\n[{}] hi\n", speaker),
    )?;
    let output = root.path().join("out.wav");

    let config = Config::default();
    let media = FakeMedia { source_ms: 2000 };
    let dubber = Dubber::new(&config, &media, &FixedSynthesizer, None);
    let options = DubOptions {
        output: Some(output.clone()),
        translate: false,
        ..DubOptions::default()
    };

    let mut workspace = TempWorkspace::create(root.path().join("temp"))?;
    let report = dubber
        .process_video(Path::new("video.mp4"), &srt, &options, &mut workspace)
        .await?;
    workspace.cleanup();

    assert!(report
        .warnings
        .iter()
        .any(|w| w.stage == Stage::BuildReference && w.message.contains("aaaa")));
    assert_eq!(AudioTrack::read_wav(&output)?.duration_ms(), 2000);
    Ok(())
}

#[tokio::test]
async fn test_dub_empty_subtitles_give_silent_track() -> Result<()> {
    let root = TempDir::new()?;
    let srt = write_subtitles(root.path(), "")?;
    let output = root.path().join("out.wav");

    let config = Config::default();
    let media = FakeMedia { source_ms: 1500 };
    let dubber = Dubber::new(&config, &media, &FixedSynthesizer, None);
    let options = DubOptions {
        output: Some(output.clone()),
        ..DubOptions::default()
    };

    let mut workspace = TempWorkspace::create(root.path().join("temp"))?;
    let report = dubber
        .process_video(Path::new("video.mp4"), &srt, &options, &mut workspace)
        .await?;
    workspace.cleanup();

    assert_eq!(report.segments, 0);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].stage, Stage::ParseSubtitles);
    let track = AudioTrack::read_wav(&output)?;
    assert_eq!(track.duration_ms(), 1500);
    assert!(track.is_silent());
    Ok(())
}

#[tokio::test]
async fn test_dub_failed_synthesis_is_silent_and_reported() -> Result<()> {
    let root = TempDir::new()?;
    let srt = write_subtitles(
        root.path(),
        "1\n00:00:00,000 --> 00:00:01,000\n[A] one\n\n2\n00:00:02,000 --> 00:00:03,000\n[B] two\n",
    )?;
    let output = root.path().join("out.wav");

    let config = Config::default();
    let media = FakeMedia { source_ms: 5000 };
    let dubber = Dubber::new(&config, &media, &FailingSynthesizer, None);
    let options = DubOptions {
        output: Some(output.clone()),
        translate: false,
        ..DubOptions::default()
    };

    let mut workspace = TempWorkspace::create(root.path().join("temp"))?;
    let report = dubber
        .process_video(Path::new("video.mp4"), &srt, &options, &mut workspace)
        .await?;
    workspace.cleanup();

    let synthesis_warnings = report
        .warnings
        .iter()
        .filter(|w| w.stage == Stage::Synthesize)
        .count();
    assert_eq!(synthesis_warnings, 2);

    let track = AudioTrack::read_wav(&output)?;
    assert_eq!(track.duration_ms(), 5000);
    assert!(track.is_silent());
    Ok(())
}

#[tokio::test]
async fn test_dub_abort_policy_names_synthesis_stage() -> Result<()> {
    let root = TempDir::new()?;
    let srt = write_subtitles(root.path(), "1\n00:00:00,000 --> 00:00:01,000\nhi\n")?;

    let mut config = Config::default();
    config.synthesis.on_failure = SynthesisFailurePolicy::Abort;
    let media = FakeMedia { source_ms: 2000 };
    let dubber = Dubber::new(&config, &media, &FailingSynthesizer, None);
    let options = DubOptions {
        output: Some(root.path().join("out.wav")),
        ..DubOptions::default()
    };

    let mut workspace = TempWorkspace::create(root.path().join("temp"))?;
    let result = dubber
        .process_video(Path::new("video.mp4"), &srt, &options, &mut workspace)
        .await;
    workspace.cleanup();

    let err = result.expect_err("synthesis failure must abort");
    assert_eq!(err.stage(), Stage::Synthesize);
    assert!(!root.path().join("out.wav").exists());
    Ok(())
}

#[tokio::test]
async fn test_dub_missing_output_is_write_error() -> Result<()> {
    let root = TempDir::new()?;
    let srt = write_subtitles(root.path(), "1\n00:00:00,000 --> 00:00:00,500\nhi\n")?;

    let config = Config::default();
    let dubber = Dubber::new(&config, &SilentMux, &FixedSynthesizer, None);
    let options = DubOptions {
        output: Some(root.path().join("never.mp4")),
        translate: false,
        ..DubOptions::default()
    };

    let mut workspace = TempWorkspace::create(root.path().join("temp"))?;
    let result = dubber
        .process_video(Path::new("video.mp4"), &srt, &options, &mut workspace)
        .await;
    workspace.cleanup();

    assert!(matches!(result, Err(DubError::OutputWrite(_))));
    Ok(())
}

#[tokio::test]
async fn test_dub_invalid_subtitles_fail_parse_stage() -> Result<()> {
    let root = TempDir::new()?;
    let srt = write_subtitles(root.path(), "1\nnot a time range\nhi\n")?;

    let config = Config::default();
    let media = FakeMedia { source_ms: 2000 };
    let dubber = Dubber::new(&config, &media, &FixedSynthesizer, None);

    let mut workspace = TempWorkspace::create(root.path().join("temp"))?;
    let result = dubber
        .process_video(
            Path::new("video.mp4"),
            &srt,
            &DubOptions::default(),
            &mut workspace,
        )
        .await;
    workspace.cleanup();

    assert_eq!(result.map(|r| r.segments).unwrap_err().stage(), Stage::ParseSubtitles);
    Ok(())
}

#[tokio::test]
async fn test_subtitle_literal_block() -> Result<()> {
    let root = TempDir::new()?;
    let output = root.path().join("talk.srt");

    let media = FakeMedia { source_ms: 4000 };
    let generator = SubtitleGenerator::new(&media, &FakeTranscriber, None, RATE);
    let options = SubtitleOptions {
        output: Some(output.clone()),
        ..SubtitleOptions::default()
    };

    let mut workspace = TempWorkspace::create(root.path().join("temp"))?;
    let report = generator
        .generate(Path::new("talk.mp4"), &options, &mut workspace)
        .await?;
    workspace.cleanup();

    assert_eq!(report.segments, 1);
    let content = fs::read_to_string(&output)?;
    assert!(content.starts_with("1\n00:00:01,500 --> 00:00:03,250\nhello\n"));
    Ok(())
}

#[tokio::test]
async fn test_subtitle_translation_failure_keeps_text() -> Result<()> {
    let root = TempDir::new()?;
    let output = root.path().join("talk_ja.srt");

    let media = FakeMedia { source_ms: 4000 };
    let generator = SubtitleGenerator::new(&media, &FakeTranscriber, Some(&BrokenTranslator), RATE);
    let options = SubtitleOptions {
        output: Some(output.clone()),
        translate: true,
        target_language: "ja".to_string(),
        ..SubtitleOptions::default()
    };

    let mut workspace = TempWorkspace::create(root.path().join("temp"))?;
    let report = generator
        .generate(Path::new("talk.mp4"), &options, &mut workspace)
        .await?;
    workspace.cleanup();

    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].stage, Stage::Translate);
    assert!(fs::read_to_string(&output)?.contains("hello"));
    Ok(())
}
