//! ワーカースレッドと共有セル
pub mod shared;
pub mod worker;

pub use shared::{CommandBoard, Controls, PoseFeed};
pub use worker::{EngineHandle, Remote, Worker};
