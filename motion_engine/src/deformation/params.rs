//! 变形参数（锐度与各部位幅度）

use crate::skeleton::SegmentRole;

/// 各部位的幅度（按 `SegmentRole` 顺序）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Amplitude(pub [f32; SegmentRole::COUNT]);

impl Default for Amplitude {
    fn default() -> Self {
        Self::uniform(5.0)
    }
}

impl Amplitude {
    /// 所有部位为 0（不变形）
    pub fn zero() -> Self {
        Self([0.0; SegmentRole::COUNT])
    }

    /// 所有部位使用相同幅度
    pub fn uniform(value: f32) -> Self {
        Self([value; SegmentRole::COUNT])
    }

    pub fn get(&self, role: SegmentRole) -> f32 {
        self.0[role.index()]
    }

    pub fn set(&mut self, role: SegmentRole, value: f32) {
        self.0[role.index()] = value;
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&v| v == 0.0)
    }

    /// 两腿幅度的平均值（用于根位移）
    pub fn leg_mean(&self) -> f32 {
        0.5 * (self.get(SegmentRole::RightFoot) + self.get(SegmentRole::LeftFoot))
    }

    /// 与另一组幅度的最大差值
    pub fn max_abs_diff(&self, other: &Amplitude) -> f32 {
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f32::max)
    }
}

/// 变形参数
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeformParams {
    /// 时间扭曲的锐度倍率（1.0 为不变）
    pub sharpness: f32,
    pub amplitude: Amplitude,
}

impl Default for DeformParams {
    fn default() -> Self {
        Self {
            sharpness: sharpness_from_kire(5.0),
            amplitude: Amplitude::default(),
        }
    }
}

impl DeformParams {
    /// 不产生任何变形的参数
    pub fn neutral() -> Self {
        Self {
            sharpness: 1.0,
            amplitude: Amplitude::zero(),
        }
    }
}

/// 编辑等级转换为锐度倍率：1 + level / 100
pub fn sharpness_from_kire(level: f32) -> f32 {
    1.0 + level / 100.0
}
