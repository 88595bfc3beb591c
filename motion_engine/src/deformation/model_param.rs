//! 动作统计量
//!
//! 供外部参数估计器使用的特征向量。

use std::f32::consts::PI;

use glam::Quat;
use rayon::prelude::*;

use crate::animation::Motion;
use crate::skeleton::{BodyPartLocator, ForwardKinematics, SegmentRole};

use super::Segmentation;

/// 每个动作的统计量
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ModelParam {
    /// 各末端部位的平均逐帧移动距离
    pub right_foot_dist: f32,
    pub left_foot_dist: f32,
    pub right_hand_dist: f32,
    pub left_hand_dist: f32,
    pub head_dist: f32,
    /// 胸部相对骨盆绕竖直轴扭转角的方差
    pub chest_torsion: f32,
    /// 运动帧比例
    pub moving_ratio: f32,
}

impl ModelParam {
    pub const FEATURE_COUNT: usize = 7;

    /// 计算动作的统计量
    pub fn from_motion(motion: &Motion, segmentation: &Segmentation, locator: &BodyPartLocator) -> Self {
        let stats = segmentation.stats();
        let mean = |role: SegmentRole| stats.mean_displacement[role.index()];

        Self {
            right_foot_dist: mean(SegmentRole::RightFoot),
            left_foot_dist: mean(SegmentRole::LeftFoot),
            right_hand_dist: mean(SegmentRole::RightHand),
            left_hand_dist: mean(SegmentRole::LeftHand),
            head_dist: mean(SegmentRole::Head),
            chest_torsion: chest_torsion(motion, locator),
            moving_ratio: stats.moving_ratio,
        }
    }

    /// 按固定顺序输出特征向量
    pub fn features(&self) -> [f32; Self::FEATURE_COUNT] {
        [
            self.right_foot_dist,
            self.left_foot_dist,
            self.right_hand_dist,
            self.left_hand_dist,
            self.head_dist,
            self.chest_torsion,
            self.moving_ratio,
        ]
    }
}

/// 绕 Y 轴的扭转角（-π, π]
fn twist_angle(q: Quat) -> f32 {
    let angle = 2.0 * q.y.atan2(q.w);
    if angle > PI {
        angle - 2.0 * PI
    } else if angle <= -PI {
        angle + 2.0 * PI
    } else {
        angle
    }
}

/// 胸部相对骨盆扭转角的总体方差；任一部位未解析时为 0
fn chest_torsion(motion: &Motion, locator: &BodyPartLocator) -> f32 {
    let (Some(pelvis), Some(chest)) = (locator.segment(SegmentRole::Pelvis), locator.segment(SegmentRole::Chest)) else {
        return 0.0;
    };
    if motion.is_empty() {
        return 0.0;
    }

    let angles: Vec<f32> = motion
        .frames()
        .par_iter()
        .map_init(ForwardKinematics::new, |fk, posture| {
            fk.compute(posture);
            let relative = fk.segment_rotation(pelvis).inverse() * fk.segment_rotation(chest);
            twist_angle(relative)
        })
        .collect();

    let count = angles.len() as f32;
    let mean = angles.iter().sum::<f32>() / count;
    angles.iter().map(|a| (a - mean) * (a - mean)).sum::<f32>() / count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeformConfig;
    use crate::test_util::{ramp_motion, still_motion, swing_motion};

    fn model_param(motion: &Motion) -> ModelParam {
        let locator = BodyPartLocator::new(motion.skeleton());
        let segmentation = Segmentation::analyze(motion, &locator, &DeformConfig::default());
        ModelParam::from_motion(motion, &segmentation, &locator)
    }

    #[test]
    fn test_still_motion_has_zero_features() {
        assert_eq!(model_param(&still_motion(40)).features(), [0.0; ModelParam::FEATURE_COUNT]);
    }

    #[test]
    fn test_swing_features() {
        let param = model_param(&swing_motion());
        assert!(param.right_hand_dist > 0.0);
        assert!(param.left_foot_dist > 0.0);
        assert!(param.chest_torsion > 1e-3);
        assert!(param.moving_ratio > 0.0 && param.moving_ratio < 1.0);

        let features = param.features();
        assert_eq!(features[2], param.right_hand_dist);
        assert_eq!(features[5], param.chest_torsion);
        assert_eq!(features[6], param.moving_ratio);
    }

    #[test]
    fn test_unresolved_chest_gives_zero_torsion() {
        let param = model_param(&ramp_motion());
        assert_eq!(param.chest_torsion, 0.0);
        assert!((param.moving_ratio - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_twist_angle_ignores_quaternion_sign() {
        let q = Quat::from_rotation_y(0.4);
        assert!((twist_angle(q) - 0.4).abs() < 1e-5);
        assert!((twist_angle(-q) - 0.4).abs() < 1e-5);
    }
}
