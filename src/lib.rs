//! vdub - 動画の吹き替え・字幕生成ツール
//!
//! このクレートは、話者タグ付きの字幕と元動画から声質を真似た吹き替え
//! 音声を作成し、元の映像と結合する機能を提供します。文字起こしによる
//! 字幕ファイルの生成も行います。
//!
//! # 主な機能
//!
//! - **タイムコード変換**: ミリ秒と `HH:MM:SS,mmm` 形式の相互変換
//! - **SRT読み書き**: 話者タグ `[話者ID]` 付き字幕の解析と書き出し
//! - **話者サンプル作成**: 話者ごとの発話区間を元音声から切り出して連結
//! - **長さ合わせ**: 合成音声をセグメントの時間幅にぴったり合わせる
//! - **トラック合成**: 元音声と同じ長さのトラックに各クリップを配置
//! - **外部サービス連携**: XTTS (音声合成)、Whisper API (文字起こし)、DeepL (翻訳)、ffmpeg
//!
//! # アーキテクチャ
//!
//! ```text
//! 吹き替え:
//! [動画] → [ffmpeg] → [元音声] ──────────────┐
//! [SRT]  → [SrtParser] → [SpeakerGroups] → [SpeakerReferences]
//!                                             ↓
//!                 (セグメント毎) [Translator] → [Synthesizer]
//!                                             ↓
//!                          [SilenceTrimmer] → [fit_to_window]
//!                                             ↓
//!                                    [TrackCompositor] → [ffmpeg] → [吹き替え動画]
//!
//! 字幕:
//! [動画] → [ffmpeg] → [Transcriber] → [Translator (任意)] → [SRT]
//! ```
//!
//! # 使用例
//!
//! ```no_run
//! use vdub::config::Config;
//!
//! // 設定ファイルを読み込み
//! let config = Config::load_or_default("vdub.toml").unwrap();
//!
//! // またはデフォルト設定を生成
//! Config::write_default("vdub.toml").unwrap();
//! ```

pub mod audio;
pub mod backend;
pub mod compositor;
pub mod config;
pub mod deepl;
pub mod dubbing;
pub mod error;
pub mod fitter;
pub mod media;
pub mod silence;
pub mod speaker;
pub mod srt;
pub mod subtitle;
pub mod timecode;
pub mod types;
pub mod whisper_api;
pub mod workspace;
pub mod xtts;
