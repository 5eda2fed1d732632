use crate::config::LocomotionConfig;
use crate::tracker::signal::Signals;

/// 移動状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LocomotionState {
    #[default]
    Neutral,
    TurnLeft,
    TurnRight,
    LeanLeft,
    LeanRight,
    Forward,
    Back,
}

impl LocomotionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Neutral => "NEUTRAL",
            Self::TurnLeft => "TURN_L",
            Self::TurnRight => "TURN_R",
            Self::LeanLeft => "LEAN_L",
            Self::LeanRight => "LEAN_R",
            Self::Forward => "FWD",
            Self::Back => "BACK",
        }
    }

    fn is_turn(&self) -> bool {
        matches!(self, Self::TurnLeft | Self::TurnRight)
    }

    fn is_side_lean(&self) -> bool {
        matches!(self, Self::LeanLeft | Self::LeanRight)
    }

    fn is_front_back(&self) -> bool {
        matches!(self, Self::Forward | Self::Back)
    }
}

/// ON/OFF 二閾値（シュミットトリガ）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub on: f32,
    pub off: f32,
}

impl Band {
    pub fn new(on: f32, off: f32) -> Self {
        Self { on, off }
    }

    /// 保持中は OFF 未満で解除、非保持中は ON 超で成立
    pub fn engaged(&self, held: bool, value: f32) -> bool {
        if held {
            value.abs() >= self.off
        } else {
            value.abs() > self.on
        }
    }
}

/// 1ティック分の判定入力
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LocomotionInput {
    pub signals: Signals,
    pub walking: bool,
    pub lean_enabled: bool,
}

/// 優先度付きヒステリシス判定: yaw > roll > 足踏み > 前後傾き
pub struct LocomotionMachine {
    yaw: Band,
    roll: Band,
    lean: Band,
    state: LocomotionState,
}

impl LocomotionMachine {
    pub fn new(config: &LocomotionConfig) -> Self {
        Self {
            yaw: Band::new(config.yaw_on, config.yaw_off),
            roll: Band::new(config.roll_on, config.roll_off),
            lean: Band::new(config.lean_on, config.lean_off),
            state: LocomotionState::Neutral,
        }
    }

    pub fn state(&self) -> LocomotionState {
        self.state
    }

    pub fn update(&mut self, input: &LocomotionInput) -> LocomotionState {
        self.state = self.next(self.state, input);
        self.state
    }

    /// 現在状態と入力から次状態を決める（状態は変更しない）
    ///
    /// 保持中の軸が OFF 未満に落ちたフレームは下位の軸を見ずに NEUTRAL。
    pub fn next(&self, current: LocomotionState, input: &LocomotionInput) -> LocomotionState {
        use LocomotionState::*;
        let s = &input.signals;

        if current.is_turn() {
            return if self.yaw.engaged(true, s.yaw) {
                turn_for(s.yaw)
            } else {
                Neutral
            };
        }
        if self.yaw.engaged(false, s.yaw) {
            return turn_for(s.yaw);
        }

        if current.is_side_lean() {
            return if self.roll.engaged(true, s.roll) {
                side_lean_for(s.roll)
            } else {
                Neutral
            };
        }
        if self.roll.engaged(false, s.roll) {
            return side_lean_for(s.roll);
        }

        if input.walking {
            return Forward;
        }

        if !input.lean_enabled {
            return Neutral;
        }
        if self.lean.engaged(current.is_front_back(), s.lean) {
            front_back_for(s.lean)
        } else {
            Neutral
        }
    }

    pub fn reset(&mut self) {
        self.state = LocomotionState::Neutral;
    }
}

fn turn_for(yaw: f32) -> LocomotionState {
    if yaw > 0.0 {
        LocomotionState::TurnRight
    } else {
        LocomotionState::TurnLeft
    }
}

fn side_lean_for(roll: f32) -> LocomotionState {
    if roll > 0.0 {
        LocomotionState::LeanRight
    } else {
        LocomotionState::LeanLeft
    }
}

// lean は腰-肩の奥行き差に符号を掛けたもの: 正が後傾
fn front_back_for(lean: f32) -> LocomotionState {
    if lean > 0.0 {
        LocomotionState::Back
    } else {
        LocomotionState::Forward
    }
}
