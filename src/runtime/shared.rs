//! ワーカーと外部（ポーズ推定・表示・送信）をつなぐ単一スロットの共有セル
//!
//! どれも「最新値が勝つ」。キューではない。

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::command::CommandPair;
use crate::engine::EngineStatus;
use crate::pose::PoseFrame;

/// ポーズ推定側が書き込む最新フレーム
///
/// 書き込むたびに frame_id が増える。`None` は人物未検出。
#[derive(Default)]
pub struct PoseFeed {
    latest: Mutex<Option<PoseFrame>>,
    frame_id: AtomicU64,
}

impl PoseFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, frame: Option<PoseFrame>) {
        if let Ok(mut guard) = self.latest.lock() {
            *guard = frame;
        }
        self.frame_id.fetch_add(1, Ordering::Release);
    }

    /// 新フレームが届くたびにインクリメント。初回到着前は 0
    pub fn frame_id(&self) -> u64 {
        self.frame_id.load(Ordering::Acquire)
    }

    /// 最新フレームと、その時点の frame_id
    pub fn latest(&self) -> (u64, Option<PoseFrame>) {
        let guard = match self.latest.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        (self.frame_id(), guard.clone())
    }
}

/// 外部から切り替えるフラグ群
pub struct Controls {
    manual: AtomicBool,
    lean_enabled: AtomicBool,
    recalibrate: Arc<AtomicBool>,
}

impl Controls {
    pub fn new(manual: bool, lean_enabled: bool) -> Self {
        Self {
            manual: AtomicBool::new(manual),
            lean_enabled: AtomicBool::new(lean_enabled),
            recalibrate: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn manual_mode(&self) -> bool {
        self.manual.load(Ordering::Relaxed)
    }

    /// 以前の値を返す
    pub fn set_manual_mode(&self, manual: bool) -> bool {
        self.manual.swap(manual, Ordering::Relaxed)
    }

    pub fn lean_enabled(&self) -> bool {
        self.lean_enabled.load(Ordering::Relaxed)
    }

    pub fn set_lean_enabled(&self, enabled: bool) {
        self.lean_enabled.store(enabled, Ordering::Relaxed);
    }

    /// 反転後の値を返す
    pub fn toggle_lean(&self) -> bool {
        !self.lean_enabled.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn request_calibration(&self) {
        self.recalibrate.store(true, Ordering::Relaxed);
    }

    /// 要求を読み取ってクリア。複数回の要求は1回にまとまる
    pub fn take_calibration_request(&self) -> bool {
        self.recalibrate.swap(false, Ordering::AcqRel)
    }

    /// シグナルハンドラ登録用
    pub fn calibration_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.recalibrate)
    }
}

/// 送信側・表示側が読む最新コマンド
pub struct CommandBoard {
    inner: Mutex<(CommandPair, EngineStatus)>,
}

impl CommandBoard {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new((CommandPair::neutral(), EngineStatus::default())),
        }
    }

    pub fn publish(&self, command: CommandPair, status: EngineStatus) {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = (command, status);
        }
    }

    /// ステータスは保ったままコマンドだけ中立に
    pub fn force_neutral(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.0 = CommandPair::neutral();
        }
    }

    pub fn command(&self) -> CommandPair {
        self.snapshot().0
    }

    pub fn status(&self) -> EngineStatus {
        self.snapshot().1
    }

    pub fn snapshot(&self) -> (CommandPair, EngineStatus) {
        match self.inner.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl Default for CommandBoard {
    fn default() -> Self {
        Self::new()
    }
}
