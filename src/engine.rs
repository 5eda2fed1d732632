//! ポーズ→コマンド判定エンジン
//!
//! 判定に関わる可変状態（ベースライン、平滑化、足踏みウィンドウ、
//! ジェスチャーのデバウンス、移動状態）をすべて1つの `Engine` が所有する。
//! ワーカースレッドはこれを1つだけ持ち、ポーリングごとに `step` を呼ぶ。

use crate::command::CommandPair;
use crate::config::Config;
use crate::pose::PoseFrame;
use crate::tracker::signal::torso_anchors;
use crate::tracker::{
    Baseline, CalibrationSession, Gesture, GestureDetector, LocomotionInput, LocomotionMachine,
    LocomotionState, SignalProcessor, WalkInPlaceDetector,
};

/// 1ポーリング分の入力
#[derive(Debug, Clone, Copy)]
pub enum FrameInput<'a> {
    /// 手動モード: エンジン停止
    Manual,
    /// 前回から新しいフレームが無い
    Stale,
    /// フレームはあるが人物未検出
    NoPose,
    Pose(&'a PoseFrame),
}

/// 表示用の状態スナップショット
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EngineStatus {
    pub state: LocomotionState,
    pub gesture: Option<Gesture>,
    pub walking: bool,
    pub calibrating: bool,
    pub baseline: Baseline,
}

pub struct Engine {
    calibration_secs: f64,
    lean_enabled: bool,
    baseline: Baseline,
    calibration: Option<CalibrationSession>,
    signal: SignalProcessor,
    walk: WalkInPlaceDetector,
    locomotion: LocomotionMachine,
    gesture: GestureDetector,
    walking: bool,
}

impl Engine {
    pub fn new(config: &Config) -> Self {
        Self {
            calibration_secs: config.calibration.duration_secs,
            lean_enabled: config.engine.lean_enabled,
            baseline: Baseline::default(),
            calibration: None,
            signal: SignalProcessor::new(&config.signal),
            walk: WalkInPlaceDetector::new(&config.walk),
            locomotion: LocomotionMachine::new(&config.locomotion),
            gesture: GestureDetector::new(&config.gesture),
            walking: false,
        }
    }

    /// キャリブレーション開始。進行中なら何もせず false
    ///
    /// 平滑化・足踏み・ジェスチャー・移動状態をまとめてリセットする。
    pub fn begin_calibration(&mut self, now: f64) -> bool {
        if self.calibration.is_some() {
            return false;
        }
        self.reset_tracking();
        self.calibration = Some(CalibrationSession::start(now, self.calibration_secs));
        true
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibration.is_some()
    }

    pub fn baseline(&self) -> Baseline {
        self.baseline
    }

    pub fn set_lean_enabled(&mut self, enabled: bool) {
        self.lean_enabled = enabled;
    }

    pub fn lean_enabled(&self) -> bool {
        self.lean_enabled
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            state: self.locomotion.state(),
            gesture: self.gesture.active(),
            walking: self.walking,
            calibrating: self.is_calibrating(),
            baseline: self.baseline,
        }
    }

    /// 1ポーリング分の処理。None のときは出力を更新しない
    pub fn step(&mut self, input: FrameInput<'_>, now: f64) -> Option<CommandPair> {
        if let Some(session) = self.calibration.as_mut() {
            if !session.is_due(now) {
                return match input {
                    FrameInput::Manual | FrameInput::Stale => None,
                    FrameInput::NoPose => Some(CommandPair::calibrating()),
                    FrameInput::Pose(frame) => {
                        session.add(self.signal.measure(frame));
                        Some(CommandPair::calibrating())
                    }
                };
            }
            self.baseline = session.finish(self.baseline);
            self.calibration = None;
        }

        match input {
            FrameInput::Manual | FrameInput::Stale => None,
            FrameInput::NoPose => Some(CommandPair::neutral()),
            FrameInput::Pose(frame) => Some(self.classify(frame, now)),
        }
    }

    /// 検出済みフレームの判定。ジェスチャー有効中は移動判定を飛ばす
    pub fn classify(&mut self, frame: &PoseFrame, now: f64) -> CommandPair {
        if let Some(gesture) = self.gesture.update(frame, now) {
            return CommandPair::for_gesture(gesture);
        }

        let raw = self.signal.measure(frame);
        let signals = self.signal.process(raw, &self.baseline);
        let anchors = torso_anchors(frame);
        self.walking = self.walk.update(frame, &anchors, now);

        let state = self.locomotion.update(&LocomotionInput {
            signals,
            walking: self.walking,
            lean_enabled: self.lean_enabled,
        });
        CommandPair::for_state(state)
    }

    fn reset_tracking(&mut self) {
        self.signal.reset();
        self.walk.reset();
        self.gesture.reset();
        self.locomotion.reset();
        self.walking = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandCode;
    use crate::pose::{Landmark, LandmarkIndex};

    const DT: f64 = 1.0 / 50.0;

    struct Body {
        shoulder_depth: (f32, f32),
        wrist: [f32; 3],
        elbow: [f32; 3],
        ankles_y: (f32, f32),
    }

    impl Default for Body {
        fn default() -> Self {
            Self {
                shoulder_depth: (0.0, 0.0),
                // 腕を下ろした姿勢
                elbow: [0.4, 0.45, 0.0],
                wrist: [0.4, 0.6, 0.0],
                ankles_y: (0.9, 0.9),
            }
        }
    }

    impl Body {
        fn frame(&self) -> PoseFrame {
            let mut f = PoseFrame::default();
            let mut put = |i, p: [f32; 3]| f.set(i, Landmark::new(p[0], p[1], p[2], 1.0));
            put(LandmarkIndex::LeftShoulder, [0.6, 0.3, self.shoulder_depth.0]);
            put(LandmarkIndex::RightShoulder, [0.4, 0.3, self.shoulder_depth.1]);
            put(LandmarkIndex::LeftHip, [0.55, 0.6, 0.0]);
            put(LandmarkIndex::RightHip, [0.45, 0.6, 0.0]);
            put(LandmarkIndex::RightElbow, self.elbow);
            put(LandmarkIndex::RightWrist, self.wrist);
            put(LandmarkIndex::LeftAnkle, [0.55, self.ankles_y.0, 0.0]);
            put(LandmarkIndex::RightAnkle, [0.45, self.ankles_y.1, 0.0]);
            f
        }

        fn neutral() -> Self {
            Self::default()
        }

        /// 右手を前上方へ（肩-肘-手首一直線、仰角約34°、前方約56°）
        fn raised() -> Self {
            Self {
                elbow: [0.4, 0.2, -0.15],
                wrist: [0.4, 0.1, -0.3],
                ..Self::default()
            }
        }

        /// 右手を前下方へ（仰角約-27°、前方約63°）
        fn pushed() -> Self {
            Self {
                elbow: [0.4, 0.375, -0.15],
                wrist: [0.4, 0.45, -0.3],
                ..Self::default()
            }
        }

        /// 右肩が奥に引かれる → yaw正 → 右旋回
        fn turned_right() -> Self {
            Self {
                shoulder_depth: (-0.1, 0.1),
                ..Self::default()
            }
        }
    }

    fn codes(pair: CommandPair) -> (CommandCode, CommandCode) {
        (pair.right.code, pair.left.code)
    }

    fn run(engine: &mut Engine, body: &Body, frames: usize, t: &mut f64) -> Option<CommandPair> {
        let frame = body.frame();
        let mut last = None;
        for _ in 0..frames {
            last = engine.step(FrameInput::Pose(&frame), *t);
            *t += DT;
        }
        last
    }

    fn calibrated_engine(t: &mut f64) -> Engine {
        let mut engine = Engine::new(&Config::default());
        assert!(engine.begin_calibration(*t));
        run(&mut engine, &Body::neutral(), 60, t);
        assert!(!engine.is_calibrating());
        engine
    }

    #[test]
    fn test_calibration_outputs_safe_pair() {
        let mut engine = Engine::new(&Config::default());
        assert!(engine.begin_calibration(0.0));
        let frame = Body::turned_right().frame();
        let out = engine.step(FrameInput::Pose(&frame), 0.1).unwrap();
        assert_eq!(out, CommandPair::calibrating());
        assert_eq!(engine.step(FrameInput::NoPose, 0.2), Some(CommandPair::calibrating()));
        assert_eq!(engine.step(FrameInput::Stale, 0.3), None);
        assert!(engine.status().calibrating);
    }

    #[test]
    fn test_baseline_is_sample_mean() {
        let mut engine = Engine::new(&Config::default());
        engine.begin_calibration(0.0);
        let frame = Body::turned_right().frame();
        for i in 0..10 {
            engine.step(FrameInput::Pose(&frame), 0.05 * i as f64);
        }
        // 期限後の最初のポーリングで確定
        engine.step(FrameInput::NoPose, 1.0);
        assert!(!engine.is_calibrating());
        assert!((engine.baseline().yaw - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_calibration_without_samples_keeps_baseline() {
        let mut engine = Engine::new(&Config::default());
        engine.begin_calibration(0.0);
        let frame = Body::turned_right().frame();
        engine.step(FrameInput::Pose(&frame), 0.5);
        engine.step(FrameInput::Stale, 1.0);
        let first = engine.baseline();

        engine.begin_calibration(2.0);
        // 手動モード・未検出のフレームはサンプルにならない
        engine.step(FrameInput::Manual, 2.2);
        engine.step(FrameInput::NoPose, 2.4);
        engine.step(FrameInput::Stale, 3.0);
        assert_eq!(engine.baseline(), first);
    }

    #[test]
    fn test_trigger_during_calibration_is_noop() {
        let mut engine = Engine::new(&Config::default());
        assert!(engine.begin_calibration(0.0));
        assert!(!engine.begin_calibration(0.5));
        // 期限は最初の開始時刻から
        engine.step(FrameInput::Stale, 1.0);
        assert!(!engine.is_calibrating());
    }

    #[test]
    fn test_neutral_converges_after_calibration() {
        let mut t = 0.0;
        let mut engine = calibrated_engine(&mut t);
        let out = run(&mut engine, &Body::neutral(), 30, &mut t).unwrap();
        assert_eq!(codes(out), (CommandCode::One, CommandCode::One));
        let s = engine.signal.current().unwrap();
        assert!(s.yaw.abs() < 1e-6 && s.lean.abs() < 1e-6 && s.roll.abs() < 1e-6);
    }

    #[test]
    fn test_turn_right() {
        let mut t = 0.0;
        let mut engine = calibrated_engine(&mut t);
        let out = run(&mut engine, &Body::turned_right(), 10, &mut t).unwrap();
        assert_eq!(codes(out), (CommandCode::Four, CommandCode::One));
        assert_eq!(engine.status().state, LocomotionState::TurnRight);
    }

    #[test]
    fn test_gesture_a_after_sixteen_frames() {
        let mut t = 0.0;
        let mut engine = calibrated_engine(&mut t);
        let out = run(&mut engine, &Body::raised(), 16, &mut t).unwrap();
        assert_eq!(codes(out), (CommandCode::A, CommandCode::A));
        assert_eq!(out.to_wire(), "A,A\n");
        assert_eq!(engine.status().gesture, Some(Gesture::A));
    }

    #[test]
    fn test_short_raise_keeps_locomotion() {
        let mut t = 0.0;
        let mut engine = calibrated_engine(&mut t);
        let out = run(&mut engine, &Body::raised(), 10, &mut t).unwrap();
        assert_eq!(codes(out), (CommandCode::One, CommandCode::One));
        assert_eq!(engine.status().gesture, None);
    }

    #[test]
    fn test_turn_continues_while_raise_debounces() {
        let mut t = 0.0;
        let mut engine = calibrated_engine(&mut t);
        let body = Body { elbow: Body::raised().elbow, wrist: Body::raised().wrist, ..Body::turned_right() };
        let out = run(&mut engine, &body, 10, &mut t).unwrap();
        assert_eq!(codes(out), (CommandCode::Four, CommandCode::One));
        assert_eq!(engine.status().gesture, None);
    }

    #[test]
    fn test_gesture_b_after_sixteen_frames() {
        let mut t = 0.0;
        let mut engine = calibrated_engine(&mut t);
        let out = run(&mut engine, &Body::pushed(), 15, &mut t).unwrap();
        assert_eq!(codes(out), (CommandCode::One, CommandCode::One));
        let out = run(&mut engine, &Body::pushed(), 1, &mut t).unwrap();
        assert_eq!(out.to_wire(), "B,B\n");
        assert_eq!(engine.status().gesture, Some(Gesture::B));
    }

    #[test]
    fn test_no_pose_emits_neutral_and_keeps_state() {
        let mut t = 0.0;
        let mut engine = calibrated_engine(&mut t);
        run(&mut engine, &Body::turned_right(), 10, &mut t);
        assert_eq!(engine.step(FrameInput::NoPose, t), Some(CommandPair::neutral()));
        t += DT;
        assert_eq!(engine.status().state, LocomotionState::TurnRight);
        let out = run(&mut engine, &Body::turned_right(), 1, &mut t).unwrap();
        assert_eq!(codes(out), (CommandCode::Four, CommandCode::One));
    }

    #[test]
    fn test_dropped_frame_keeps_gesture_debounce() {
        let mut t = 0.0;
        let mut engine = calibrated_engine(&mut t);
        run(&mut engine, &Body::raised(), 10, &mut t);
        engine.step(FrameInput::NoPose, t);
        t += DT;
        let out = run(&mut engine, &Body::raised(), 6, &mut t).unwrap();
        assert_eq!(codes(out), (CommandCode::A, CommandCode::A));
    }

    #[test]
    fn test_recalibration_releases_turn() {
        let mut t = 0.0;
        let mut engine = calibrated_engine(&mut t);
        run(&mut engine, &Body::turned_right(), 10, &mut t);
        assert_eq!(engine.status().state, LocomotionState::TurnRight);

        assert!(engine.begin_calibration(t));
        assert_eq!(engine.status().state, LocomotionState::Neutral);
        run(&mut engine, &Body::neutral(), 60, &mut t);
        assert!(!engine.is_calibrating());
        let out = run(&mut engine, &Body::neutral(), 5, &mut t).unwrap();
        assert_eq!(engine.status().state, LocomotionState::Neutral);
        assert_eq!(codes(out), (CommandCode::One, CommandCode::One));
    }

    #[test]
    fn test_recalibration_clears_active_gesture() {
        let mut t = 0.0;
        let mut engine = calibrated_engine(&mut t);
        run(&mut engine, &Body::raised(), 20, &mut t);
        assert_eq!(engine.status().gesture, Some(Gesture::A));
        engine.begin_calibration(t);
        assert_eq!(engine.status().gesture, None);
    }

    #[test]
    fn test_manual_mode_suspends_output() {
        let mut t = 0.0;
        let mut engine = calibrated_engine(&mut t);
        assert_eq!(engine.step(FrameInput::Manual, t), None);
        assert_eq!(engine.step(FrameInput::Stale, t), None);
    }

    #[test]
    fn test_walking_forward() {
        let mut t = 0.0;
        let mut engine = calibrated_engine(&mut t);
        let mut out = None;
        for i in 0..60 {
            let ankles_y = if (i / 8) % 2 == 0 { (0.8, 0.9) } else { (0.9, 0.8) };
            let body = Body { ankles_y, ..Body::default() };
            out = run(&mut engine, &body, 1, &mut t);
        }
        assert!(engine.status().walking);
        assert_eq!(codes(out.unwrap()), (CommandCode::One, CommandCode::Two));
    }
}
