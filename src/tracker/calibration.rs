use crate::tracker::signal::RawMetrics;

/// ニュートラル姿勢の基準値
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Baseline {
    pub yaw: f32,
    pub lean: f32,
    pub roll: f32,
}

/// 進行中のキャリブレーション
///
/// 期限までに集めた生指標の平均を新しいベースラインにする。
/// 1サンプルも無ければ前回のベースラインを維持。
#[derive(Debug, Clone)]
pub struct CalibrationSession {
    deadline: f64,
    sum_yaw: f64,
    sum_lean: f64,
    sum_roll: f64,
    count: usize,
}

impl CalibrationSession {
    pub fn start(now: f64, duration_secs: f64) -> Self {
        Self {
            deadline: now + duration_secs,
            sum_yaw: 0.0,
            sum_lean: 0.0,
            sum_roll: 0.0,
            count: 0,
        }
    }

    pub fn is_due(&self, now: f64) -> bool {
        now >= self.deadline
    }

    pub fn add(&mut self, raw: RawMetrics) {
        self.sum_yaw += raw.yaw as f64;
        self.sum_lean += raw.lean as f64;
        self.sum_roll += raw.roll as f64;
        self.count += 1;
    }

    pub fn sample_count(&self) -> usize {
        self.count
    }

    pub fn finish(&self, previous: Baseline) -> Baseline {
        if self.count == 0 {
            return previous;
        }
        let n = self.count as f64;
        Baseline {
            yaw: (self.sum_yaw / n) as f32,
            lean: (self.sum_lean / n) as f32,
            roll: (self.sum_roll / n) as f32,
        }
    }
}
