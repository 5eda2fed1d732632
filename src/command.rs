use crate::tracker::{Gesture, LocomotionState};

/// リモート機器が解釈するコマンド記号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandCode {
    /// 停止
    One,
    Two,
    Three,
    Four,
    Five,
    A,
    B,
}

impl CommandCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::One => "1",
            Self::Two => "2",
            Self::Three => "3",
            Self::Four => "4",
            Self::Five => "5",
            Self::A => "A",
            Self::B => "B",
        }
    }
}

/// 1チャンネル分のコマンド（記号 + 表示用ラベル）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub code: CommandCode,
    pub label: &'static str,
}

impl Command {
    pub const fn new(code: CommandCode, label: &'static str) -> Self {
        Self { code, label }
    }
}

const NEUTRAL: Command = Command::new(CommandCode::One, "Neutral");

/// 右・左チャンネルのコマンド対
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPair {
    pub right: Command,
    pub left: Command,
}

impl CommandPair {
    pub const fn new(right: Command, left: Command) -> Self {
        Self { right, left }
    }

    pub const fn neutral() -> Self {
        Self::new(NEUTRAL, NEUTRAL)
    }

    /// キャリブレーション中の安全出力
    pub const fn calibrating() -> Self {
        let c = Command::new(CommandCode::One, "Calibrating...");
        Self::new(c, c)
    }

    /// ジェスチャーは両チャンネル同一記号
    pub fn for_gesture(gesture: Gesture) -> Self {
        let c = match gesture {
            Gesture::A => Command::new(CommandCode::A, "Gesture A"),
            Gesture::B => Command::new(CommandCode::B, "Gesture B"),
        };
        Self::new(c, c)
    }

    pub fn for_state(state: LocomotionState) -> Self {
        use CommandCode::*;
        use LocomotionState::*;
        match state {
            Neutral => Self::neutral(),
            Forward => Self::new(NEUTRAL, Command::new(Two, "Forward")),
            Back => Self::new(NEUTRAL, Command::new(Five, "Back")),
            TurnRight => Self::new(Command::new(Four, "Turn Right"), NEUTRAL),
            TurnLeft => Self::new(Command::new(Three, "Turn Left"), NEUTRAL),
            LeanRight => Self::new(NEUTRAL, Command::new(Four, "Lean Right")),
            LeanLeft => Self::new(NEUTRAL, Command::new(Three, "Lean Left")),
        }
    }

    /// 送信行: ジェスチャーは `A,A` / `B,B`、それ以外は `R{右},L{左}`
    pub fn to_wire(&self) -> String {
        match (self.right.code, self.left.code) {
            (CommandCode::A, CommandCode::A) => "A,A\n".to_string(),
            (CommandCode::B, CommandCode::B) => "B,B\n".to_string(),
            (r, l) => format!("R{},L{}\n", r.as_str(), l.as_str()),
        }
    }

    /// 記号だけを比較（ラベル違いは同一コマンド）
    pub fn same_codes(&self, other: &CommandPair) -> bool {
        self.right.code == other.right.code && self.left.code == other.left.code
    }
}

impl Default for CommandPair {
    fn default() -> Self {
        Self::neutral()
    }
}
