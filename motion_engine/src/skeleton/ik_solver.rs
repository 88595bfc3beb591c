//! IK 求解器（CCD）

use glam::{Quat, Vec3};

use super::{ForwardKinematics, Posture};

/// CCD IK 求解器
#[derive(Clone, Copy, Debug)]
pub struct IkSolver {
    pub iterations: u32,
    /// 末端与目标的距离小于此值即视为收敛
    pub tolerance: f32,
}

impl Default for IkSolver {
    fn default() -> Self {
        Self {
            iterations: 16,
            tolerance: 1e-4,
        }
    }
}

impl IkSolver {
    pub fn new(iterations: u32, tolerance: f32) -> Self {
        Self { iterations, tolerance }
    }

    /// 求解 IK，使 `effector_segment` 的原点靠近 `target`
    ///
    /// 只修改 `base_joint` 以下（不含）的关节旋转；`base_joint` 为 None 时一直上溯到根。
    /// 根位置与根朝向保持不变。返回求解后末端与目标的距离。
    pub fn solve(
        &self,
        posture: &mut Posture,
        base_joint: Option<usize>,
        effector_segment: usize,
        target: Vec3,
        fk: &mut ForwardKinematics,
    ) -> f32 {
        let skeleton = posture.skeleton.clone();

        fk.compute(posture);
        let mut best_dist = (fk.segment_position(effector_segment) - target).length();

        // 体节原点位于自身的父关节上，旋转该关节不会移动它，
        // 因此链从父体节的父关节开始
        let chain = match skeleton.parent_segment(effector_segment) {
            Some(parent) => skeleton.joint_chain(parent, base_joint),
            None => return best_dist,
        };
        if chain.is_empty() || best_dist < self.tolerance {
            return best_dist;
        }

        let mut saved_rotations: Vec<Quat> = chain.iter().map(|&j| posture.joint_rotations[j]).collect();

        for _iteration in 0..self.iterations {
            self.solve_core(posture, &chain, effector_segment, target, fk);

            fk.compute(posture);
            let dist = (fk.segment_position(effector_segment) - target).length();

            if dist < best_dist {
                best_dist = dist;
                // 保存最佳结果
                for (saved, &joint) in saved_rotations.iter_mut().zip(&chain) {
                    *saved = posture.joint_rotations[joint];
                }
                if dist < self.tolerance {
                    break;
                }
            } else {
                // 恢复最佳结果
                for (saved, &joint) in saved_rotations.iter().zip(&chain) {
                    posture.joint_rotations[joint] = *saved;
                }
                fk.compute(posture);
                break;
            }
        }

        best_dist
    }

    /// 单次 CCD 迭代：从靠近末端的关节到靠近根的关节依次旋转
    fn solve_core(
        &self,
        posture: &mut Posture,
        chain: &[usize],
        effector_segment: usize,
        target: Vec3,
        fk: &mut ForwardKinematics,
    ) {
        let skeleton = posture.skeleton.clone();

        for &joint_index in chain {
            let Some(joint) = skeleton.joint(joint_index) else {
                continue;
            };

            let joint_pos = fk.joint_position(joint_index);
            let effector_pos = fk.segment_position(effector_segment);

            let to_effector = (effector_pos - joint_pos).normalize_or_zero();
            let to_target = (target - joint_pos).normalize_or_zero();
            if to_effector.length_squared() < 1e-6 || to_target.length_squared() < 1e-6 {
                continue;
            }

            let dot = to_effector.dot(to_target).clamp(-1.0, 1.0);
            if dot.acos() < 1e-3_f32.to_radians() {
                continue;
            }

            // 世界空间旋转转换到关节局部：r' = Rp⁻¹ · rot · Rp · r
            let world_rot = Quat::from_rotation_arc(to_effector, to_target);
            let parent_rot = fk.segment_rotation(joint.parent_segment);
            let local = posture.joint_rotations[joint_index];
            posture.joint_rotations[joint_index] =
                (parent_rot.inverse() * world_rot * parent_rot * local).normalize();

            fk.compute(posture);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::arm_skeleton;

    #[test]
    fn test_reaches_target_within_reach() {
        let skeleton = arm_skeleton();
        let mut posture = Posture::new(skeleton.clone());
        let hand = skeleton.find_segment("RightHand").unwrap();
        let target = Vec3::new(1.0, 1.0, 0.0);

        let solver = IkSolver::new(32, 1e-4);
        let mut fk = ForwardKinematics::new();
        let dist = solver.solve(&mut posture, None, hand, target, &mut fk);

        assert!(dist < 1e-2, "dist = {dist}");
        fk.compute(&posture);
        assert!((fk.segment_position(hand) - target).length() < 1e-2);
        // 根不动
        assert_eq!(posture.root_pos, Vec3::ZERO);
        assert_eq!(posture.root_ori, Quat::IDENTITY);
    }

    #[test]
    fn test_unreachable_target_does_not_get_worse() {
        let skeleton = arm_skeleton();
        let mut posture = Posture::new(skeleton.clone());
        let hand = skeleton.find_segment("RightHand").unwrap();
        let target = Vec3::new(0.0, 10.0, 0.0);

        let mut fk = ForwardKinematics::new();
        fk.compute(&posture);
        let before = (fk.segment_position(hand) - target).length();

        let dist = IkSolver::default().solve(&mut posture, None, hand, target, &mut fk);
        assert!(dist <= before);
    }

    #[test]
    fn test_base_joint_limits_chain() {
        let skeleton = arm_skeleton();
        let mut posture = Posture::new(skeleton.clone());
        let hand = skeleton.find_segment("RightHand").unwrap();
        let shoulder = skeleton.find_joint("RightArm").unwrap();

        let mut fk = ForwardKinematics::new();
        IkSolver::default().solve(&mut posture, Some(shoulder), hand, Vec3::new(1.0, 1.0, 0.0), &mut fk);
        assert_eq!(posture.joint_rotations[shoulder], Quat::IDENTITY);
    }
}
