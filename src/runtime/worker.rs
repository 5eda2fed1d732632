use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::command::CommandPair;
use crate::config::Config;
use crate::engine::{Engine, EngineStatus, FrameInput};
use crate::logging::SharedLogger;
use crate::runtime::shared::{CommandBoard, Controls, PoseFeed};

/// エンジンを所有し、1ポーリング分ずつ進める
///
/// スレッドからは `tick` を一定周期で呼ぶだけ。
pub struct Worker {
    engine: Engine,
    feed: Arc<PoseFeed>,
    controls: Arc<Controls>,
    board: Arc<CommandBoard>,
    logger: SharedLogger,
    verbose: bool,
    last_frame_id: u64,
    last_command: CommandPair,
}

impl Worker {
    pub fn new(
        config: &Config,
        feed: Arc<PoseFeed>,
        controls: Arc<Controls>,
        board: Arc<CommandBoard>,
        logger: SharedLogger,
    ) -> Self {
        Self {
            engine: Engine::new(config),
            feed,
            controls,
            board,
            logger,
            verbose: config.log.verbose,
            last_frame_id: 0,
            last_command: CommandPair::neutral(),
        }
    }

    /// 起動直後のキャリブレーション
    pub fn start(&mut self, now: f64) {
        self.begin_calibration(now);
    }

    pub fn tick(&mut self, now: f64) {
        if self.controls.take_calibration_request() && !self.begin_calibration(now) {
            crate::log!(self.logger, "[calibration] already running, trigger ignored");
        }
        self.engine.set_lean_enabled(self.controls.lean_enabled());

        let was_calibrating = self.engine.is_calibrating();
        let (frame_id, frame) = self.feed.latest();
        let input = if self.controls.manual_mode() {
            FrameInput::Manual
        } else if frame_id == self.last_frame_id {
            FrameInput::Stale
        } else {
            match &frame {
                Some(f) => FrameInput::Pose(f),
                None => FrameInput::NoPose,
            }
        };
        self.last_frame_id = frame_id;

        if let Some(command) = self.engine.step(input, now) {
            self.publish(command);
        }

        if was_calibrating && !self.engine.is_calibrating() {
            let b = self.engine.baseline();
            crate::log!(
                self.logger,
                "[calibration] done yaw0={:.4} lean0={:.4} roll0={:.4}",
                b.yaw, b.lean, b.roll
            );
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    fn begin_calibration(&mut self, now: f64) -> bool {
        if !self.engine.begin_calibration(now) {
            return false;
        }
        crate::log!(self.logger, "[calibration] started, hold a neutral pose");
        // 手動モード中は出力を中立のまま触らない
        if !self.controls.manual_mode() {
            self.publish(CommandPair::calibrating());
        }
        true
    }

    fn publish(&mut self, command: CommandPair) {
        let status = self.engine.status();
        if self.verbose && !command.same_codes(&self.last_command) {
            crate::log!(
                self.logger,
                "[command] {} ({} / {})",
                command.to_wire().trim_end(),
                command.right.label,
                command.left.label
            );
        }
        self.last_command = command;
        self.board.publish(command, status);
    }
}

/// 操作側の窓口。複製して入力スレッドへ渡せる
#[derive(Clone)]
pub struct Remote {
    controls: Arc<Controls>,
    board: Arc<CommandBoard>,
    logger: SharedLogger,
}

impl Remote {
    pub fn new(controls: Arc<Controls>, board: Arc<CommandBoard>, logger: SharedLogger) -> Self {
        Self { controls, board, logger }
    }

    pub fn controls(&self) -> Arc<Controls> {
        Arc::clone(&self.controls)
    }

    pub fn request_calibration(&self) {
        crate::log!(self.logger, "[input] calibration requested");
        self.controls.request_calibration();
    }

    pub fn set_lean_enabled(&self, enabled: bool) {
        self.controls.set_lean_enabled(enabled);
        crate::log!(self.logger, "[input] lean {}", if enabled { "on" } else { "off" });
    }

    pub fn toggle_lean(&self) -> bool {
        let enabled = self.controls.toggle_lean();
        crate::log!(self.logger, "[input] lean {}", if enabled { "on" } else { "off" });
        enabled
    }

    /// 手動モードへの切り替えで出力は即中立になる
    pub fn set_manual_mode(&self, manual: bool) {
        let previous = self.controls.set_manual_mode(manual);
        if manual && !previous {
            self.board.force_neutral();
        }
        if manual != previous {
            crate::log!(self.logger, "[input] manual mode {}", if manual { "on" } else { "off" });
        }
    }

    /// 反転後の値を返す
    pub fn toggle_manual_mode(&self) -> bool {
        let manual = !self.controls.manual_mode();
        self.set_manual_mode(manual);
        manual
    }

    pub fn command(&self) -> CommandPair {
        self.board.command()
    }

    pub fn status(&self) -> EngineStatus {
        self.board.status()
    }
}

/// ワーカースレッドのハンドル
pub struct EngineHandle {
    remote: Remote,
    feed: Arc<PoseFeed>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl EngineHandle {
    /// ワーカーを起動する。起動と同時にキャリブレーションが始まる
    pub fn spawn(config: &Config, logger: SharedLogger) -> Result<Self> {
        let interval = Duration::try_from_secs_f64(1.0 / config.engine.poll_hz as f64)
            .with_context(|| format!("invalid engine.poll_hz {}", config.engine.poll_hz))?;

        let feed = Arc::new(PoseFeed::new());
        let controls = Arc::new(Controls::new(false, config.engine.lean_enabled));
        let board = Arc::new(CommandBoard::new());
        let running = Arc::new(AtomicBool::new(true));

        let mut worker = Worker::new(
            config,
            Arc::clone(&feed),
            Arc::clone(&controls),
            Arc::clone(&board),
            Arc::clone(&logger),
        );
        let flag = Arc::clone(&running);

        let thread = std::thread::Builder::new()
            .name("pose-engine".to_string())
            .spawn(move || {
                let origin = Instant::now();
                worker.start(0.0);
                while flag.load(Ordering::Relaxed) {
                    let tick_start = Instant::now();
                    worker.tick(origin.elapsed().as_secs_f64());
                    let elapsed = tick_start.elapsed();
                    if elapsed < interval {
                        std::thread::sleep(interval - elapsed);
                    }
                }
            })
            .context("failed to spawn engine thread")?;

        crate::log!(logger, "[engine] worker started at {:.0} Hz", config.engine.poll_hz);

        Ok(Self {
            remote: Remote::new(controls, board, logger),
            feed,
            running,
            thread: Some(thread),
        })
    }

    /// ポーズ推定側の書き込み口
    pub fn feed(&self) -> Arc<PoseFeed> {
        Arc::clone(&self.feed)
    }

    pub fn remote(&self) -> Remote {
        self.remote.clone()
    }

    pub fn controls(&self) -> Arc<Controls> {
        self.remote.controls()
    }

    pub fn request_calibration(&self) {
        self.remote.request_calibration();
    }

    pub fn set_lean_enabled(&self, enabled: bool) {
        self.remote.set_lean_enabled(enabled);
    }

    pub fn toggle_lean(&self) -> bool {
        self.remote.toggle_lean()
    }

    pub fn set_manual_mode(&self, manual: bool) {
        self.remote.set_manual_mode(manual);
    }

    pub fn command(&self) -> CommandPair {
        self.remote.command()
    }

    pub fn status(&self) -> EngineStatus {
        self.remote.status()
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                crate::log!(self.remote.logger, "[engine] worker thread panicked");
            }
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandCode;
    use crate::logging::Logger;
    use crate::pose::{Landmark, LandmarkIndex, PoseFrame};
    use crate::tracker::LocomotionState;

    const DT: f64 = 1.0 / 50.0;

    struct Rig {
        worker: Worker,
        feed: Arc<PoseFeed>,
        controls: Arc<Controls>,
        board: Arc<CommandBoard>,
        t: f64,
    }

    impl Rig {
        fn new() -> Self {
            let config = Config::default();
            let feed = Arc::new(PoseFeed::new());
            let controls = Arc::new(Controls::new(false, false));
            let board = Arc::new(CommandBoard::new());
            let worker = Worker::new(
                &config,
                Arc::clone(&feed),
                Arc::clone(&controls),
                Arc::clone(&board),
                Arc::new(Logger::stderr_only()),
            );
            Self { worker, feed, controls, board, t: 0.0 }
        }

        /// 毎ポーリング新フレームを流す
        fn run(&mut self, frame: Option<&PoseFrame>, ticks: usize) {
            for _ in 0..ticks {
                self.feed.publish(frame.cloned());
                self.worker.tick(self.t);
                self.t += DT;
            }
        }

        fn idle(&mut self, ticks: usize) {
            for _ in 0..ticks {
                self.worker.tick(self.t);
                self.t += DT;
            }
        }
    }

    fn body(shoulder_depth: (f32, f32)) -> PoseFrame {
        let mut f = PoseFrame::default();
        let mut put = |i, p: [f32; 3]| f.set(i, Landmark::new(p[0], p[1], p[2], 1.0));
        put(LandmarkIndex::LeftShoulder, [0.6, 0.3, shoulder_depth.0]);
        put(LandmarkIndex::RightShoulder, [0.4, 0.3, shoulder_depth.1]);
        put(LandmarkIndex::LeftHip, [0.55, 0.6, 0.0]);
        put(LandmarkIndex::RightHip, [0.45, 0.6, 0.0]);
        put(LandmarkIndex::RightElbow, [0.4, 0.45, 0.0]);
        put(LandmarkIndex::RightWrist, [0.4, 0.6, 0.0]);
        put(LandmarkIndex::LeftAnkle, [0.55, 0.9, 0.0]);
        put(LandmarkIndex::RightAnkle, [0.45, 0.9, 0.0]);
        f
    }

    fn calibrated_rig() -> Rig {
        let mut rig = Rig::new();
        rig.worker.start(rig.t);
        rig.run(Some(&body((0.0, 0.0))), 60);
        assert!(!rig.worker.engine().is_calibrating());
        rig
    }

    #[test]
    fn test_start_publishes_calibrating() {
        let mut rig = Rig::new();
        rig.worker.start(0.0);
        assert_eq!(rig.board.command(), CommandPair::calibrating());
        assert!(rig.board.status().calibrating);
    }

    #[test]
    fn test_turn_reaches_board() {
        let mut rig = calibrated_rig();
        rig.run(Some(&body((-0.1, 0.1))), 10);
        let cmd = rig.board.command();
        assert_eq!((cmd.right.code, cmd.left.code), (CommandCode::Four, CommandCode::One));
        assert_eq!(rig.board.status().state, LocomotionState::TurnRight);
    }

    #[test]
    fn test_stale_feed_holds_output() {
        let mut rig = calibrated_rig();
        rig.run(Some(&body((-0.1, 0.1))), 10);
        let before = rig.board.command();
        // 新フレーム無し: 判定も出力更新もしない
        rig.idle(20);
        assert_eq!(rig.board.command(), before);
    }

    #[test]
    fn test_no_pose_gives_neutral() {
        let mut rig = calibrated_rig();
        rig.run(Some(&body((-0.1, 0.1))), 10);
        rig.run(None, 1);
        assert_eq!(rig.board.command(), CommandPair::neutral());
    }

    #[test]
    fn test_recalibration_request() {
        let mut rig = calibrated_rig();
        rig.run(Some(&body((-0.1, 0.1))), 10);
        rig.controls.request_calibration();
        rig.run(Some(&body((-0.1, 0.1))), 1);
        assert_eq!(rig.board.command(), CommandPair::calibrating());
        assert!(rig.worker.engine().is_calibrating());

        // 回した姿勢を新しい中立として覚える
        rig.run(Some(&body((-0.1, 0.1))), 60);
        assert!(!rig.worker.engine().is_calibrating());
        assert_eq!(rig.board.command(), CommandPair::neutral());
        assert!((rig.worker.engine().baseline().yaw - 0.2).abs() < 1e-5);
    }

    #[test]
    fn test_manual_mode_freezes_engine() {
        let mut rig = calibrated_rig();
        rig.controls.set_manual_mode(true);
        rig.board.force_neutral();
        rig.run(Some(&body((-0.1, 0.1))), 20);
        assert_eq!(rig.board.command(), CommandPair::neutral());
        assert_eq!(rig.worker.engine().status().state, LocomotionState::Neutral);

        rig.controls.set_manual_mode(false);
        rig.run(Some(&body((-0.1, 0.1))), 10);
        assert_eq!(rig.board.status().state, LocomotionState::TurnRight);
    }

    #[test]
    fn test_calibration_in_manual_mode_keeps_board_neutral() {
        let mut rig = calibrated_rig();
        let remote = Remote::new(
            Arc::clone(&rig.controls),
            Arc::clone(&rig.board),
            Arc::new(Logger::stderr_only()),
        );
        rig.run(Some(&body((-0.1, 0.1))), 10);
        remote.set_manual_mode(true);
        remote.request_calibration();
        rig.run(Some(&body((-0.1, 0.1))), 5);
        assert!(rig.worker.engine().is_calibrating());
        assert_eq!(rig.board.command(), CommandPair::neutral());
        assert!(!rig.board.status().calibrating);
    }

    #[test]
    fn test_remote_clone_shares_controls() {
        let rig = Rig::new();
        let remote = Remote::new(
            Arc::clone(&rig.controls),
            Arc::clone(&rig.board),
            Arc::new(Logger::stderr_only()),
        );
        let other = remote.clone();
        assert!(other.toggle_manual_mode());
        assert!(rig.controls.manual_mode());
        assert!(!remote.toggle_manual_mode());
        assert!(other.toggle_lean());
        assert!(rig.controls.lean_enabled());
    }

    #[test]
    fn test_lean_toggle_is_picked_up() {
        let mut rig = calibrated_rig();
        rig.controls.set_lean_enabled(true);
        rig.idle(1);
        assert!(rig.worker.engine().lean_enabled());
    }

    #[test]
    fn test_handle_lifecycle() {
        let handle = EngineHandle::spawn(&Config::default(), Arc::new(Logger::stderr_only())).unwrap();
        handle.set_manual_mode(true);
        assert_eq!(handle.command(), CommandPair::neutral());
        handle.set_manual_mode(false);
        handle.feed().publish(None);
        handle.request_calibration();
        // 操作窓口が残っていても停止できる
        let remote = handle.remote();
        handle.stop();
        assert_eq!(remote.command().to_wire(), "R1,L1\n");
    }

    #[test]
    fn test_spawn_rejects_unusable_rate() {
        let mut config = Config::default();
        config.engine.poll_hz = 1e-20;
        assert!(EngineHandle::spawn(&config, Arc::new(Logger::stderr_only())).is_err());
    }
}
