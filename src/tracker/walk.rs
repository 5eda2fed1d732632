use std::collections::VecDeque;

use crate::config::WalkConfig;
use crate::geometry::planar_distance;
use crate::pose::{LandmarkIndex, PoseFrame};
use crate::tracker::signal::TorsoAnchors;
use crate::tracker::smooth::Ema;

/// 足踏み（その場歩き）検出
///
/// 左右足首の持ち上がり差 `d = liftL - liftR` を平滑化し、ウィンドウ内の
/// 符号反転回数とピーク振幅で判定する。開始と終了で閾値が異なる。
pub struct WalkInPlaceDetector {
    window_secs: f64,
    min_flips: usize,
    release_flips: usize,
    amp_on: f32,
    amp_off: f32,
    min_scale: f32,
    diff: Ema,
    last_sign: i8,
    flip_times: VecDeque<f64>,
    /// (時刻, |平滑化d|)
    amplitudes: VecDeque<(f64, f32)>,
    active: bool,
}

impl WalkInPlaceDetector {
    pub fn new(config: &WalkConfig) -> Self {
        Self {
            window_secs: config.window_secs,
            min_flips: config.min_flips,
            release_flips: config.release_flips,
            amp_on: config.amp_on,
            amp_off: config.amp_off,
            min_scale: config.min_scale,
            diff: Ema::new(config.alpha),
            last_sign: 0,
            flip_times: VecDeque::new(),
            amplitudes: VecDeque::new(),
            active: false,
        }
    }

    /// 胴体長が小さすぎるフレームは状態を変えずに false
    pub fn update(&mut self, frame: &PoseFrame, anchors: &TorsoAnchors, now: f64) -> bool {
        let scale = planar_distance(anchors.shoulder_center, anchors.hip_center);
        if scale < self.min_scale {
            return false;
        }

        let hip_y = anchors.hip_center[1];
        let lift_l = (hip_y - frame.get(LandmarkIndex::LeftAnkle).y) / scale;
        let lift_r = (hip_y - frame.get(LandmarkIndex::RightAnkle).y) / scale;

        let smoothed = self.diff.apply(lift_l - lift_r);
        self.amplitudes.push_back((now, smoothed.abs()));

        let sign = if smoothed > 0.0 {
            1
        } else if smoothed < 0.0 {
            -1
        } else {
            0
        };
        if sign != 0 && self.last_sign != 0 && sign != self.last_sign {
            self.flip_times.push_back(now);
        }
        if sign != 0 {
            self.last_sign = sign;
        }

        while self.flip_times.front().is_some_and(|&t| now - t > self.window_secs) {
            self.flip_times.pop_front();
        }
        while self.amplitudes.front().is_some_and(|&(t, _)| now - t > self.window_secs) {
            self.amplitudes.pop_front();
        }

        let flips = self.flip_times.len();
        let peak = self.peak_amplitude();

        if self.active {
            if flips < self.release_flips || peak < self.amp_off {
                self.active = false;
            }
        } else if flips >= self.min_flips && peak >= self.amp_on {
            self.active = true;
        }

        self.active
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn flip_count(&self) -> usize {
        self.flip_times.len()
    }

    pub fn peak_amplitude(&self) -> f32 {
        self.amplitudes.iter().map(|&(_, a)| a).fold(0.0, f32::max)
    }

    pub fn reset(&mut self) {
        self.diff.reset();
        self.last_sign = 0;
        self.flip_times.clear();
        self.amplitudes.clear();
        self.active = false;
    }
}
