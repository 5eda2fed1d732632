use crate::config::GestureConfig;
use crate::geometry::{angle_at, elevation_deg, forward_deg};
use crate::pose::{LandmarkIndex, PoseFrame};

/// 右手のオーバーライドジェスチャー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gesture {
    /// 挙手
    A,
    /// 前方への突き出し
    B,
}

impl Gesture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}

/// 右腕の角度（度）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmAngles {
    pub elevation: f32,
    pub forward: f32,
    pub elbow: f32,
}

impl ArmAngles {
    pub fn from_frame(frame: &PoseFrame) -> Self {
        let shoulder = frame.get(LandmarkIndex::RightShoulder).position();
        let elbow = frame.get(LandmarkIndex::RightElbow).position();
        let wrist = frame.get(LandmarkIndex::RightWrist).position();
        Self {
            elevation: elevation_deg(shoulder, wrist),
            forward: forward_deg(shoulder, wrist),
            elbow: angle_at(shoulder, elbow, wrist),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Counter {
    on: u32,
    off: u32,
}

impl Counter {
    fn observe(&mut self, hit: bool) {
        if hit {
            self.on = self.on.saturating_add(1);
            self.off = 0;
        } else {
            self.off = self.off.saturating_add(1);
            self.on = 0;
        }
    }
}

/// 右手ジェスチャー検出（デバウンス・解除・挙手後ロックアウト付き）
pub struct GestureDetector {
    config: GestureConfig,
    last_raise: Option<f64>,
    a: Counter,
    b: Counter,
    active: Option<Gesture>,
}

impl GestureDetector {
    pub fn new(config: &GestureConfig) -> Self {
        Self {
            config: config.clone(),
            last_raise: None,
            a: Counter::default(),
            b: Counter::default(),
            active: None,
        }
    }

    /// 1フレーム分の生判定
    ///
    /// 挙手候補は時刻を記録して即 A。挙手から `raise_lockout_secs` 以内は
    /// 突き出し候補を無視する。
    pub fn classify(&mut self, angles: &ArmAngles, now: f64) -> Option<Gesture> {
        let g = &self.config;
        let straight = g.min_elbow_deg <= 0.0 || angles.elbow >= g.min_elbow_deg;

        if straight && angles.elevation > g.raise_elevation_deg && angles.forward > g.raise_forward_deg {
            self.last_raise = Some(now);
            return Some(Gesture::A);
        }

        if self.last_raise.is_some_and(|t| now - t < g.raise_lockout_secs) {
            return None;
        }

        if straight && angles.elevation < g.push_elevation_deg && angles.forward > g.push_forward_deg {
            return Some(Gesture::B);
        }

        None
    }

    /// 生判定をデバウンスし、現在有効なジェスチャーを返す
    pub fn update(&mut self, frame: &PoseFrame, now: f64) -> Option<Gesture> {
        let angles = ArmAngles::from_frame(frame);
        let candidate = self.classify(&angles, now);
        self.observe(candidate)
    }

    pub fn observe(&mut self, candidate: Option<Gesture>) -> Option<Gesture> {
        self.a.observe(candidate == Some(Gesture::A));
        self.b.observe(candidate == Some(Gesture::B));

        let debounce = self.config.debounce_frames;
        let release = self.config.release_frames;
        self.active = match self.active {
            None if self.a.on >= debounce => Some(Gesture::A),
            None if self.b.on >= debounce => Some(Gesture::B),
            Some(Gesture::A) if self.a.off >= release => None,
            Some(Gesture::B) if self.b.off >= release => None,
            other => other,
        };
        self.active
    }

    pub fn active(&self) -> Option<Gesture> {
        self.active
    }

    pub fn reset(&mut self) {
        self.last_raise = None;
        self.a = Counter::default();
        self.b = Counter::default();
        self.active = None;
    }
}
