use crate::config::SignalConfig;
use crate::geometry::{midpoint, Vec3};
use crate::pose::{LandmarkIndex, PoseFrame};
use crate::tracker::calibration::Baseline;
use crate::tracker::smooth::Ema;

/// 1フレームから得た生の姿勢指標（ベースライン補正前）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawMetrics {
    pub yaw: f32,
    pub lean: f32,
    pub roll: f32,
}

/// 肩中点・腰中点（足踏み検出でも使う）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TorsoAnchors {
    pub shoulder_center: Vec3,
    pub hip_center: Vec3,
}

/// ベースライン補正・平滑化済みの信号
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Signals {
    pub yaw: f32,
    pub lean: f32,
    pub roll: f32,
}

/// 軸ごとの符号（カメラのミラーリング補正）
#[derive(Debug, Clone, Copy)]
pub struct AxisSigns {
    pub yaw: f32,
    pub lean: f32,
    pub roll: f32,
}

pub fn torso_anchors(frame: &PoseFrame) -> TorsoAnchors {
    TorsoAnchors {
        shoulder_center: midpoint(
            frame.get(LandmarkIndex::LeftShoulder).position(),
            frame.get(LandmarkIndex::RightShoulder).position(),
        ),
        hip_center: midpoint(
            frame.get(LandmarkIndex::LeftHip).position(),
            frame.get(LandmarkIndex::RightHip).position(),
        ),
    }
}

/// yaw: 左右肩の奥行き差
/// lean: 腰中点と肩中点の奥行き差
/// roll: 肩の傾き − 腰の傾き（肩幅で正規化）
pub fn raw_metrics(frame: &PoseFrame, signs: AxisSigns, min_shoulder_width: f32) -> RawMetrics {
    let sh_l = frame.get(LandmarkIndex::LeftShoulder);
    let sh_r = frame.get(LandmarkIndex::RightShoulder);
    let hip_l = frame.get(LandmarkIndex::LeftHip);
    let hip_r = frame.get(LandmarkIndex::RightHip);
    let anchors = torso_anchors(frame);

    let yaw = (sh_r.z - sh_l.z) * signs.yaw;
    let lean = (anchors.hip_center[2] - anchors.shoulder_center[2]) * signs.lean;

    let shoulder_width = (sh_r.x - sh_l.x).abs();
    let roll = if shoulder_width < min_shoulder_width {
        0.0
    } else {
        let shoulder_tilt = sh_l.y - sh_r.y;
        let hip_tilt = hip_l.y - hip_r.y;
        (shoulder_tilt - hip_tilt) / shoulder_width * signs.roll
    };

    RawMetrics { yaw, lean, roll }
}

pub struct SignalProcessor {
    signs: AxisSigns,
    min_shoulder_width: f32,
    yaw: Ema,
    lean: Ema,
    roll: Ema,
}

impl SignalProcessor {
    pub fn new(config: &SignalConfig) -> Self {
        Self {
            signs: AxisSigns {
                yaw: config.yaw_sign,
                lean: config.lean_sign,
                roll: config.roll_sign,
            },
            min_shoulder_width: config.min_shoulder_width,
            yaw: Ema::new(config.alpha),
            lean: Ema::new(config.alpha),
            roll: Ema::new(config.alpha),
        }
    }

    pub fn measure(&self, frame: &PoseFrame) -> RawMetrics {
        raw_metrics(frame, self.signs, self.min_shoulder_width)
    }

    pub fn process(&mut self, raw: RawMetrics, baseline: &Baseline) -> Signals {
        Signals {
            yaw: self.yaw.apply(raw.yaw - baseline.yaw),
            lean: self.lean.apply(raw.lean - baseline.lean),
            roll: self.roll.apply(raw.roll - baseline.roll),
        }
    }

    /// 直近の平滑化値（未初期化の軸は None）
    pub fn current(&self) -> Option<Signals> {
        Some(Signals {
            yaw: self.yaw.value()?,
            lean: self.lean.value()?,
            roll: self.roll.value()?,
        })
    }

    pub fn reset(&mut self) {
        self.yaw.reset();
        self.lean.reset();
        self.roll.reset();
    }
}
