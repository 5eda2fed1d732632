use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub locomotion: LocomotionConfig,
    #[serde(default)]
    pub walk: WalkConfig,
    #[serde(default)]
    pub gesture: GestureConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// ワーカーのポーリング周波数 (Hz)
    #[serde(default = "default_poll_hz")]
    pub poll_hz: f32,
    /// 起動時の前後傾き判定の有効/無効
    #[serde(default)]
    pub lean_enabled: bool,
}

fn default_poll_hz() -> f32 { 50.0 }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_hz: default_poll_hz(),
            lean_enabled: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CalibrationConfig {
    /// ニュートラル姿勢の収集時間（秒）
    #[serde(default = "default_calibration_duration")]
    pub duration_secs: f64,
}

fn default_calibration_duration() -> f64 { 1.0 }

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            duration_secs: default_calibration_duration(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SignalConfig {
    /// yaw/lean/roll のEMA係数
    #[serde(default = "default_signal_alpha")]
    pub alpha: f32,
    #[serde(default = "default_yaw_sign")]
    pub yaw_sign: f32,
    /// カメラのミラーリングで反転する場合は符号を変える
    #[serde(default = "default_lean_sign")]
    pub lean_sign: f32,
    #[serde(default = "default_roll_sign")]
    pub roll_sign: f32,
    /// 肩幅がこれ未満ならroll=0
    #[serde(default = "default_min_shoulder_width")]
    pub min_shoulder_width: f32,
}

fn default_signal_alpha() -> f32 { 0.35 }
fn default_yaw_sign() -> f32 { 1.0 }
fn default_lean_sign() -> f32 { -1.0 }
fn default_roll_sign() -> f32 { -1.0 }
fn default_min_shoulder_width() -> f32 { 1e-6 }

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            alpha: default_signal_alpha(),
            yaw_sign: default_yaw_sign(),
            lean_sign: default_lean_sign(),
            roll_sign: default_roll_sign(),
            min_shoulder_width: default_min_shoulder_width(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LocomotionConfig {
    #[serde(default = "default_yaw_on")]
    pub yaw_on: f32,
    #[serde(default = "default_yaw_off")]
    pub yaw_off: f32,
    #[serde(default = "default_roll_on")]
    pub roll_on: f32,
    #[serde(default = "default_roll_off")]
    pub roll_off: f32,
    #[serde(default = "default_lean_on")]
    pub lean_on: f32,
    #[serde(default = "default_lean_off")]
    pub lean_off: f32,
}

fn default_yaw_on() -> f32 { 0.08 }
fn default_yaw_off() -> f32 { 0.05 }
fn default_roll_on() -> f32 { 0.35 }
fn default_roll_off() -> f32 { 0.25 }
fn default_lean_on() -> f32 { 0.12 }
fn default_lean_off() -> f32 { 0.08 }

impl Default for LocomotionConfig {
    fn default() -> Self {
        Self {
            yaw_on: default_yaw_on(),
            yaw_off: default_yaw_off(),
            roll_on: default_roll_on(),
            roll_off: default_roll_off(),
            lean_on: default_lean_on(),
            lean_off: default_lean_off(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WalkConfig {
    /// 判定ウィンドウ（秒）
    #[serde(default = "default_walk_window")]
    pub window_secs: f64,
    /// 足踏み開始に必要な符号反転回数
    #[serde(default = "default_walk_min_flips")]
    pub min_flips: usize,
    /// 反転回数がこれ未満になったら足踏み終了
    #[serde(default = "default_walk_release_flips")]
    pub release_flips: usize,
    #[serde(default = "default_walk_amp_on")]
    pub amp_on: f32,
    #[serde(default = "default_walk_amp_off")]
    pub amp_off: f32,
    #[serde(default = "default_walk_alpha")]
    pub alpha: f32,
    /// 胴体長がこれ未満のフレームは無視
    #[serde(default = "default_walk_min_scale")]
    pub min_scale: f32,
}

fn default_walk_window() -> f64 { 1.2 }
fn default_walk_min_flips() -> usize { 3 }
fn default_walk_release_flips() -> usize { 2 }
fn default_walk_amp_on() -> f32 { 0.18 }
fn default_walk_amp_off() -> f32 { 0.12 }
fn default_walk_alpha() -> f32 { 0.30 }
fn default_walk_min_scale() -> f32 { 1e-6 }

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            window_secs: default_walk_window(),
            min_flips: default_walk_min_flips(),
            release_flips: default_walk_release_flips(),
            amp_on: default_walk_amp_on(),
            amp_off: default_walk_amp_off(),
            alpha: default_walk_alpha(),
            min_scale: default_walk_min_scale(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GestureConfig {
    /// ジェスチャー確定までの連続フレーム数
    #[serde(default = "default_debounce_frames")]
    pub debounce_frames: u32,
    /// ジェスチャー解除までの連続フレーム数
    #[serde(default = "default_release_frames")]
    pub release_frames: u32,
    /// 挙手判定: 肩ラインからの手首仰角（度）
    #[serde(default = "default_raise_elevation")]
    pub raise_elevation_deg: f32,
    /// 突き出し判定: 肩ラインからの手首仰角（度、負=下）
    #[serde(default = "default_push_elevation")]
    pub push_elevation_deg: f32,
    #[serde(default = "default_forward_min")]
    pub raise_forward_deg: f32,
    #[serde(default = "default_forward_min")]
    pub push_forward_deg: f32,
    /// 挙手後に突き出し候補を無視する時間（秒）
    #[serde(default = "default_raise_lockout")]
    pub raise_lockout_secs: f64,
    /// 肘の伸展角の下限（度）。0で無効
    #[serde(default)]
    pub min_elbow_deg: f32,
}

fn default_debounce_frames() -> u32 { 16 }
fn default_release_frames() -> u32 { 8 }
fn default_raise_elevation() -> f32 { 10.0 }
fn default_push_elevation() -> f32 { -15.0 }
fn default_forward_min() -> f32 { 25.0 }
fn default_raise_lockout() -> f64 { 0.35 }

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            debounce_frames: default_debounce_frames(),
            release_frames: default_release_frames(),
            raise_elevation_deg: default_raise_elevation(),
            push_elevation_deg: default_push_elevation(),
            raise_forward_deg: default_forward_min(),
            push_forward_deg: default_forward_min(),
            raise_lockout_secs: default_raise_lockout(),
            min_elbow_deg: 0.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// 状態遷移もすべてログに出す
    #[serde(default)]
    pub verbose: bool,
}

fn default_log_dir() -> String { "logs".to_string() }

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            verbose: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReplayConfig {
    /// 記録済みフレームの再生レート (fps)
    #[serde(default = "default_replay_fps")]
    pub fps: f32,
}

fn default_replay_fps() -> f32 { 30.0 }

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            fps: default_replay_fps(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// 設定ファイルが無ければデフォルト値
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            eprintln!("[config] {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn validate(&self) -> Result<()> {
        check_rate("engine.poll_hz", self.engine.poll_hz)?;
        check_positive_secs("calibration.duration_secs", self.calibration.duration_secs)?;

        check_alpha("signal.alpha", self.signal.alpha)?;
        for (name, sign) in [
            ("signal.yaw_sign", self.signal.yaw_sign),
            ("signal.lean_sign", self.signal.lean_sign),
            ("signal.roll_sign", self.signal.roll_sign),
        ] {
            if !sign.is_finite() || sign == 0.0 {
                bail!("{} must be a non-zero number, got {}", name, sign);
            }
        }
        check_non_negative("signal.min_shoulder_width", self.signal.min_shoulder_width)?;

        let l = &self.locomotion;
        check_band("locomotion.yaw", l.yaw_on, l.yaw_off)?;
        check_band("locomotion.roll", l.roll_on, l.roll_off)?;
        check_band("locomotion.lean", l.lean_on, l.lean_off)?;

        let w = &self.walk;
        check_positive_secs("walk.window_secs", w.window_secs)?;
        check_band("walk.amp", w.amp_on, w.amp_off)?;
        check_alpha("walk.alpha", w.alpha)?;
        check_non_negative("walk.min_scale", w.min_scale)?;
        if w.min_flips == 0 {
            bail!("walk.min_flips must be at least 1");
        }
        if w.release_flips > w.min_flips {
            bail!(
                "walk.release_flips ({}) must not exceed walk.min_flips ({})",
                w.release_flips, w.min_flips
            );
        }

        let g = &self.gesture;
        if g.debounce_frames == 0 {
            bail!("gesture.debounce_frames must be at least 1");
        }
        if g.release_frames == 0 {
            bail!("gesture.release_frames must be at least 1");
        }
        for (name, deg) in [
            ("gesture.raise_elevation_deg", g.raise_elevation_deg),
            ("gesture.push_elevation_deg", g.push_elevation_deg),
            ("gesture.raise_forward_deg", g.raise_forward_deg),
            ("gesture.push_forward_deg", g.push_forward_deg),
        ] {
            if !deg.is_finite() || !(-90.0..=90.0).contains(&deg) {
                bail!("{} must lie within [-90, 90] degrees, got {}", name, deg);
            }
        }
        if g.raise_elevation_deg <= g.push_elevation_deg {
            bail!(
                "gesture.raise_elevation_deg ({}) must be above gesture.push_elevation_deg ({})",
                g.raise_elevation_deg, g.push_elevation_deg
            );
        }
        if !g.min_elbow_deg.is_finite() || !(0.0..=180.0).contains(&g.min_elbow_deg) {
            bail!("gesture.min_elbow_deg must lie within [0, 180], got {}", g.min_elbow_deg);
        }
        if !g.raise_lockout_secs.is_finite() || g.raise_lockout_secs < 0.0 {
            bail!("gesture.raise_lockout_secs must be >= 0, got {}", g.raise_lockout_secs);
        }

        check_rate("replay.fps", self.replay.fps)?;
        Ok(())
    }
}

fn check_band(name: &str, on: f32, off: f32) -> Result<()> {
    if !on.is_finite() || !off.is_finite() || off < 0.0 {
        bail!("{}: thresholds must be finite and non-negative (on={}, off={})", name, on, off);
    }
    if off > on {
        bail!("{}: off threshold {} is above on threshold {}", name, off, on);
    }
    Ok(())
}

fn check_alpha(name: &str, alpha: f32) -> Result<()> {
    if !(alpha > 0.0 && alpha <= 1.0) {
        bail!("{} must lie in (0, 1], got {}", name, alpha);
    }
    Ok(())
}

const MIN_RATE_HZ: f32 = 0.1;
const MAX_RATE_HZ: f32 = 1000.0;

fn check_rate(name: &str, hz: f32) -> Result<()> {
    if !hz.is_finite() || !(MIN_RATE_HZ..=MAX_RATE_HZ).contains(&hz) {
        bail!("{} must be within {}..={} Hz, got {}", name, MIN_RATE_HZ, MAX_RATE_HZ, hz);
    }
    Ok(())
}

fn check_positive_secs(name: &str, secs: f64) -> Result<()> {
    if !secs.is_finite() || secs <= 0.0 {
        bail!("{} must be positive, got {}", name, secs);
    }
    Ok(())
}

fn check_non_negative(name: &str, value: f32) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        bail!("{} must be >= 0, got {}", name, value);
    }
    Ok(())
}
