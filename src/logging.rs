use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// stderr + ログファイルへの二重出力
///
/// ファイル名は `{dir}/{prefix}_YYYYmmdd_HHMMSS.log`。各行に時刻を付ける。
pub struct Logger {
    file: Option<Mutex<BufWriter<File>>>,
    path: Option<PathBuf>,
}

pub type SharedLogger = Arc<Logger>;

impl Logger {
    pub fn open<P: AsRef<Path>>(dir: P, prefix: &str) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log dir {}", dir.display()))?;
        let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = dir.join(format!("{}_{}.log", prefix, ts));
        let file = File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        eprintln!("Log: {}", path.display());
        Ok(Self {
            file: Some(Mutex::new(BufWriter::new(file))),
            path: Some(path),
        })
    }

    /// ファイル無し（テスト・ファイル作成失敗時）
    pub fn stderr_only() -> Self {
        Self { file: None, path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn line(&self, msg: &str) {
        eprintln!("{}", msg);
        if let Some(file) = &self.file {
            if let Ok(mut f) = file.lock() {
                let ts = chrono::Local::now().format("%H:%M:%S%.3f");
                let _ = writeln!(f, "{} {}", ts, msg);
                let _ = f.flush();
            }
        }
    }
}

#[macro_export]
macro_rules! log {
    ($logger:expr, $($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $logger.line(&msg);
    }};
}
