use anyhow::{bail, Error};
use serde::Deserialize;

/// BlazePose の 33 ランドマークインデックス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum LandmarkIndex {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl LandmarkIndex {
    pub const COUNT: usize = 33;
}

/// 単一ランドマーク
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Landmark {
    /// 正規化X座標 (画像幅基準)
    pub x: f32,
    /// 正規化Y座標 (画像高さ基準、下が正)
    pub y: f32,
    /// 腰中心基準の奥行き (カメラに近いほど負)
    pub z: f32,
    /// 可視度 (0.0〜1.0)
    #[serde(default = "default_visibility")]
    pub visibility: f32,
}

fn default_visibility() -> f32 { 1.0 }

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self { x, y, z, visibility }
    }

    pub fn position(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl Default for Landmark {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            visibility: 0.0,
        }
    }
}

/// 1フレーム分の姿勢 (33ランドマーク)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Vec<Landmark>")]
pub struct PoseFrame {
    landmarks: [Landmark; LandmarkIndex::COUNT],
}

impl PoseFrame {
    pub fn new(landmarks: [Landmark; LandmarkIndex::COUNT]) -> Self {
        Self { landmarks }
    }

    pub fn get(&self, index: LandmarkIndex) -> &Landmark {
        &self.landmarks[index as usize]
    }

    pub fn set(&mut self, index: LandmarkIndex, landmark: Landmark) {
        self.landmarks[index as usize] = landmark;
    }

    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }

    /// JSON 1 行をデコード。`null` は未検出
    pub fn from_json_line(line: &str) -> anyhow::Result<Option<Self>> {
        Ok(serde_json::from_str(line)?)
    }
}

impl Default for PoseFrame {
    fn default() -> Self {
        Self {
            landmarks: [Landmark::default(); LandmarkIndex::COUNT],
        }
    }
}

impl TryFrom<Vec<Landmark>> for PoseFrame {
    type Error = Error;

    fn try_from(landmarks: Vec<Landmark>) -> Result<Self, Self::Error> {
        let count = landmarks.len();
        let landmarks: [Landmark; LandmarkIndex::COUNT] = match landmarks.try_into() {
            Ok(array) => array,
            Err(_) => bail!("expected {} landmarks, got {}", LandmarkIndex::COUNT, count),
        };
        if landmarks
            .iter()
            .any(|l| !(l.x.is_finite() && l.y.is_finite() && l.z.is_finite()))
        {
            bail!("landmark coordinates must be finite");
        }
        Ok(Self { landmarks })
    }
}
