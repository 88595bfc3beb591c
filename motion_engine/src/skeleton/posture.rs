//! 姿势（某一时刻的骨骼状态）

use std::sync::Arc;

use glam::{Quat, Vec3};

use super::Skeleton;

/// 姿势
///
/// 根位置、根朝向与每个关节的局部旋转。
#[derive(Clone, Debug)]
pub struct Posture {
    pub skeleton: Arc<Skeleton>,
    pub root_pos: Vec3,
    pub root_ori: Quat,
    pub joint_rotations: Vec<Quat>,
}

impl Posture {
    /// 创建初始姿势（所有旋转为单位四元数）
    pub fn new(skeleton: Arc<Skeleton>) -> Self {
        let joint_count = skeleton.joint_count();
        Self {
            skeleton,
            root_pos: Vec3::ZERO,
            root_ori: Quat::IDENTITY,
            joint_rotations: vec![Quat::IDENTITY; joint_count],
        }
    }

    /// 是否与另一个姿势共享同一骨骼
    pub fn same_skeleton(&self, other: &Posture) -> bool {
        Arc::ptr_eq(&self.skeleton, &other.skeleton)
    }

    /// 两个姿势之间插值（根位置线性，旋转球面线性）
    pub fn interpolate(a: &Posture, b: &Posture, t: f32) -> Posture {
        if !a.same_skeleton(b) {
            return a.clone();
        }

        let joint_rotations = a
            .joint_rotations
            .iter()
            .zip(&b.joint_rotations)
            .map(|(qa, qb)| slerp_shortest(*qa, *qb, t))
            .collect();

        Posture {
            skeleton: Arc::clone(&a.skeleton),
            root_pos: a.root_pos.lerp(b.root_pos, t),
            root_ori: slerp_shortest(a.root_ori, b.root_ori, t),
            joint_rotations,
        }
    }
}

impl PartialEq for Posture {
    fn eq(&self, other: &Self) -> bool {
        self.same_skeleton(other)
            && self.root_pos == other.root_pos
            && self.root_ori == other.root_ori
            && self.joint_rotations == other.joint_rotations
    }
}

/// 最短路径球面插值
///
/// 两个四元数点积为负时先翻转第二个，保证沿较短的弧插值。
pub fn slerp_shortest(q0: Quat, q1: Quat, t: f32) -> Quat {
    let q1 = if q0.dot(q1) < 0.0 { -q1 } else { q1 };
    q0.slerp(q1, t)
}
