use crate::error::{SubtitleError, TimecodeError};
use crate::timecode::{format_ms, parse_timecode};
use crate::types::{Segment, TimedText, DEFAULT_SPEAKER};
use anyhow::{Context, Result};
use regex_lite::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

/// 解釈できずに読み飛ばした字幕ブロック
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedBlock {
    /// ファイル内でのブロック番号（1始まり、空行区切りで数えたもの）
    pub position: usize,
    pub reason: String,
}

/// 字幕ファイルの解析結果
///
/// 不正なブロックは読み飛ばし、その理由を `skipped` に残す。
#[derive(Clone, Debug, Default)]
pub struct ParsedSubtitles {
    pub segments: Vec<Segment>,
    pub skipped: Vec<SkippedBlock>,
}

/// 話者タグ `[speaker-id]` にマッチする正規表現
fn speaker_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[([^\[\]]+)\]\s*").expect("static regex"))
}

/// SRT形式のテキストを解析してセグメント列を返す
///
/// 1ブロックは「番号行」「`start --> end` 行」「1行以上のテキスト」からなる。
/// テキスト先頭の `[話者ID]` は話者タグとして取り出し、無ければ
/// `"unknown"` とする。
///
/// 番号行・時刻行が不正なブロック、終了時刻が開始時刻以下のブロック、
/// テキストの無いブロックは警告を出して読み飛ばす。ブロックが1つ以上
/// あるのに全て不正な場合はエラーとする。
///
/// # Examples
///
/// ```
/// # use vdub::srt::parse_srt;
/// let text = "1\n00:00:00,000 --> 00:00:02,000\n[A] hi\n";
/// let parsed = parse_srt(text).unwrap();
/// assert_eq!(parsed.segments[0].speaker, "A");
/// assert_eq!(parsed.segments[0].text, "hi");
/// ```
pub fn parse_srt(content: &str) -> Result<ParsedSubtitles, SubtitleError> {
    let content = content.trim_start_matches('\u{feff}');
    let mut parsed = ParsedSubtitles::default();
    let mut block: Vec<&str> = Vec::new();
    let mut position = 0;

    // 末尾に空行を足して最後のブロックも同じ経路で処理する
    for line in content.lines().chain(std::iter::once("")) {
        let line = line.trim_end_matches('\r');
        if !line.trim().is_empty() {
            block.push(line);
            continue;
        }
        if block.is_empty() {
            continue;
        }

        position += 1;
        match parse_block(&block) {
            Ok(segment) => parsed.segments.push(segment),
            Err(reason) => {
                log::warn!("字幕ブロック {} をスキップ: {}", position, reason);
                parsed.skipped.push(SkippedBlock { position, reason });
            }
        }
        block.clear();
    }

    if position > 0 && parsed.segments.is_empty() {
        return Err(SubtitleError::NoValidBlocks {
            skipped: parsed.skipped.len(),
        });
    }

    log::debug!(
        "字幕解析完了: {} セグメント, {} ブロックをスキップ",
        parsed.segments.len(),
        parsed.skipped.len()
    );

    Ok(parsed)
}

/// 1ブロックを解釈する。失敗時は理由を返す
fn parse_block(lines: &[&str]) -> std::result::Result<Segment, String> {
    let index_line = lines[0].trim();
    if index_line.parse::<usize>().is_err() {
        return Err(format!("番号行が不正です: {:?}", index_line));
    }

    let time_line = lines
        .get(1)
        .ok_or_else(|| "時刻行がありません".to_string())?;
    let (start, end) = time_line
        .split_once("-->")
        .ok_or_else(|| format!("時刻行に --> がありません: {:?}", time_line))?;
    // 終了時刻の後ろに座標指定 (X1:40 ...) が続くことがある
    let end = end.split_whitespace().next().unwrap_or_default();
    let start_ms = parse_timecode(start).map_err(|e| e.to_string())?;
    let end_ms = parse_timecode(end).map_err(|e| e.to_string())?;

    let text_lines = &lines[2..];
    if text_lines.is_empty() {
        return Err("テキストがありません".to_string());
    }

    let raw_text = text_lines
        .iter()
        .map(|l| l.trim())
        .collect::<Vec<_>>()
        .join("\n");
    let (speaker, text) = split_speaker_tag(&raw_text);

    Segment::new(start_ms, end_ms, text, speaker).ok_or_else(|| {
        format!(
            "終了時刻が開始時刻以下です: {} --> {}",
            start.trim(),
            end.trim()
        )
    })
}

/// テキスト先頭の `[話者ID]` を取り出す
///
/// タグが無ければ `("unknown", 元のテキスト)` を返す。
pub fn split_speaker_tag(text: &str) -> (String, String) {
    match speaker_tag_regex().captures(text) {
        Some(caps) => {
            let speaker = caps[1].trim();
            if speaker.is_empty() {
                return (DEFAULT_SPEAKER.to_string(), text.to_string());
            }
            let rest = &text[caps[0].len()..];
            (speaker.to_string(), rest.to_string())
        }
        None => (DEFAULT_SPEAKER.to_string(), text.to_string()),
    }
}

/// SRTファイルを読み込んで解析
pub fn load_srt_file<P: AsRef<Path>>(path: P) -> Result<ParsedSubtitles> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("字幕ファイルの読み込みに失敗: {:?}", path.as_ref()))?;
    let parsed = parse_srt(&content)
        .with_context(|| format!("字幕ファイルの解析に失敗: {:?}", path.as_ref()))?;
    Ok(parsed)
}

/// エントリ列をSRT形式の文字列に変換
///
/// 番号は入力の `index` に関わらず1から振り直す。テキスト中の空行は
/// ブロック区切りと誤認されるため取り除く。
///
/// # Examples
///
/// ```
/// # use vdub::srt::write_srt;
/// # use vdub::types::TimedText;
/// let entries = vec![TimedText { index: 7, start_ms: 1500, end_ms: 3250, text: "hello".into() }];
/// let srt = write_srt(&entries).unwrap();
/// assert_eq!(srt, "1\n00:00:01,500 --> 00:00:03,250\nhello\n\n");
/// ```
pub fn write_srt(entries: &[TimedText]) -> Result<String, TimecodeError> {
    let mut out = String::new();

    for (i, entry) in entries.iter().enumerate() {
        let text = entry
            .text
            .lines()
            .map(|l| l.trim_end_matches('\r'))
            .filter(|l| !l.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        out.push_str(&format!("{}\n", i + 1));
        out.push_str(&format!(
            "{} --> {}\n",
            format_ms(entry.start_ms)?,
            format_ms(entry.end_ms)?
        ));
        out.push_str(&text);
        out.push_str("\n\n");
    }

    Ok(out)
}

/// SRTファイルとして書き出し
pub fn write_srt_file<P: AsRef<Path>>(path: P, entries: &[TimedText]) -> Result<()> {
    let content = write_srt(entries).context("タイムコードの変換に失敗")?;
    fs::write(path.as_ref(), content)
        .with_context(|| format!("字幕ファイルの書き込みに失敗: {:?}", path.as_ref()))?;
    Ok(())
}
