use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// 中間ファイル用の作業ディレクトリ
///
/// 起動時に `<base>/run_<日時>_<pid>` を作成し、払い出したファイルを
/// 記録しておく。`cleanup` は記録したファイルと作成したディレクトリだけを
/// 削除する。削除の失敗はログに残すだけで呼び出し元には伝えない。
pub struct TempWorkspace {
    dir: PathBuf,
    created_dirs: Vec<PathBuf>,
    artifacts: Vec<PathBuf>,
}

impl TempWorkspace {
    /// 作業ディレクトリを用意
    pub fn create<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        let mut created_dirs = Vec::new();
        if !base.exists() {
            created_dirs.push(base.clone());
        }

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let dir = base.join(format!("run_{}_{}", timestamp, std::process::id()));
        fs::create_dir_all(&dir)
            .with_context(|| format!("作業ディレクトリの作成に失敗: {:?}", dir))?;
        created_dirs.push(dir.clone());
        log::debug!("作業ディレクトリ: {:?}", dir);

        Ok(Self {
            dir,
            created_dirs,
            artifacts: Vec::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 中間ファイルのパスを払い出して記録する
    ///
    /// ファイル名に使えない文字は `_` に置き換える。
    pub fn artifact(&mut self, name: &str) -> PathBuf {
        let path = self.dir.join(sanitize_file_name(name));
        if !self.artifacts.contains(&path) {
            self.artifacts.push(path.clone());
        }
        path
    }

    /// 記録したファイルを削除し、削除できなかった数を返す
    pub fn cleanup(self) -> usize {
        log::info!("一時ファイルを削除中...");
        let mut failures = 0;

        for path in &self.artifacts {
            if !path.exists() {
                continue;
            }
            if let Err(e) = fs::remove_file(path) {
                log::warn!("一時ファイルを削除できません: {:?}: {}", path, e);
                failures += 1;
            }
        }

        // 他のファイルが残っているディレクトリはそのまま
        for dir in self.created_dirs.iter().rev() {
            if let Err(e) = fs::remove_dir(dir) {
                log::debug!("ディレクトリを残します: {:?}: {}", dir, e);
            }
        }

        failures
    }
}

/// ファイル名として安全な文字列にする
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}
