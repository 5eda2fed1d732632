/// スカラー値のEMA平滑化フィルタ
///
/// 初回サンプルはそのまま通し、以降は `alpha * new + (1 - alpha) * prev`。
#[derive(Debug, Clone)]
pub struct Ema {
    alpha: f32,
    prev: Option<f32>,
}

impl Ema {
    pub fn new(alpha: f32) -> Self {
        Self { alpha, prev: None }
    }

    pub fn apply(&mut self, value: f32) -> f32 {
        let result = match self.prev {
            Some(prev) => self.alpha * value + (1.0 - self.alpha) * prev,
            None => value,
        };
        self.prev = Some(result);
        result
    }

    pub fn value(&self) -> Option<f32> {
        self.prev
    }

    pub fn reset(&mut self) {
        self.prev = None;
    }
}
