//! 3D点に対する純粋関数群

pub type Vec3 = [f32; 3];

const EPS: f32 = 1e-9;

pub fn midpoint(a: Vec3, b: Vec3) -> Vec3 {
    [
        (a[0] + b[0]) * 0.5,
        (a[1] + b[1]) * 0.5,
        (a[2] + b[2]) * 0.5,
    ]
}

/// `to - from`
pub fn sub(to: Vec3, from: Vec3) -> Vec3 {
    [to[0] - from[0], to[1] - from[1], to[2] - from[2]]
}

pub fn norm(v: Vec3) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

/// 画像平面 (x, y) 上の距離
pub fn planar_distance(a: Vec3, b: Vec3) -> f32 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    (dx * dx + dy * dy).sqrt()
}

/// 点bを頂点とする角 a-b-c（度）
pub fn angle_at(a: Vec3, b: Vec3, c: Vec3) -> f32 {
    let ab = sub(a, b);
    let cb = sub(c, b);
    let dot = ab[0] * cb[0] + ab[1] * cb[1] + ab[2] * cb[2];
    let cos = dot / ((norm(ab) + EPS) * (norm(cb) + EPS));
    cos.clamp(-1.0, 1.0).acos().to_degrees()
}

/// from→to が上（画像Y負方向）を向く角度（度）
pub fn elevation_deg(from: Vec3, to: Vec3) -> f32 {
    let [dx, dy, dz] = sub(to, from);
    f32::atan2(-dy, (dx * dx + dz * dz).sqrt() + EPS).to_degrees()
}

/// from→to がカメラ方向（Z負方向）を向く角度（度）
pub fn forward_deg(from: Vec3, to: Vec3) -> f32 {
    let [dx, dy, dz] = sub(to, from);
    f32::atan2(-dz, (dx * dx + dy * dy).sqrt() + EPS).to_degrees()
}
