pub mod calibration;
pub mod gesture;
pub mod locomotion;
pub mod signal;
pub mod smooth;
pub mod walk;

pub use calibration::{Baseline, CalibrationSession};
pub use gesture::{ArmAngles, Gesture, GestureDetector};
pub use locomotion::{Band, LocomotionInput, LocomotionMachine, LocomotionState};
pub use signal::{RawMetrics, SignalProcessor, Signals, TorsoAnchors};
pub use smooth::Ema;
pub use walk::WalkInPlaceDetector;
