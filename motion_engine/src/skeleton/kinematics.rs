//! 正向运动学
//!
//! 结果缓冲区由调用方持有并在多次计算间复用。

use glam::{Mat4, Quat, Vec3};

use super::Posture;

/// 正向运动学计算器
#[derive(Clone, Debug, Default)]
pub struct ForwardKinematics {
    /// 各体节的世界变换（体节原点 + 朝向）
    segment_frames: Vec<Mat4>,
    /// 各关节的世界位置
    joint_positions: Vec<Vec3>,
}

impl ForwardKinematics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 计算姿势的体节世界变换与关节世界位置
    pub fn compute(&mut self, posture: &Posture) {
        let skeleton = &posture.skeleton;
        let segment_count = skeleton.segment_count();

        self.segment_frames.clear();
        self.segment_frames.resize(segment_count, Mat4::IDENTITY);
        self.joint_positions.clear();
        self.joint_positions.resize(skeleton.joint_count(), Vec3::ZERO);

        if segment_count == 0 {
            return;
        }

        self.segment_frames[0] = Mat4::from_rotation_translation(posture.root_ori, posture.root_pos);

        // 子体节总在父体节之后，按关节顺序即可逐级累积
        for (joint_index, joint) in skeleton.joints().iter().enumerate() {
            let parent_frame = self.segment_frames[joint.parent_segment];
            let rotation = posture
                .joint_rotations
                .get(joint_index)
                .copied()
                .unwrap_or(Quat::IDENTITY);

            let local = Mat4::from_rotation_translation(rotation, joint.offset);
            self.segment_frames[joint.child_segment] = parent_frame * local;
            self.joint_positions[joint_index] = parent_frame.transform_point3(joint.offset);
        }
    }

    /// 获取体节世界变换数组
    pub fn segment_frames(&self) -> &[Mat4] {
        &self.segment_frames
    }

    /// 获取关节世界位置数组
    pub fn joint_positions(&self) -> &[Vec3] {
        &self.joint_positions
    }

    /// 体节原点的世界位置
    pub fn segment_position(&self, segment: usize) -> Vec3 {
        self.segment_frames
            .get(segment)
            .map(|m| m.w_axis.truncate())
            .unwrap_or(Vec3::ZERO)
    }

    /// 体节的世界朝向
    pub fn segment_rotation(&self, segment: usize) -> Quat {
        self.segment_frames
            .get(segment)
            .map(|m| m.to_scale_rotation_translation().1)
            .unwrap_or(Quat::IDENTITY)
    }

    /// 关节的世界位置
    pub fn joint_position(&self, joint: usize) -> Vec3 {
        self.joint_positions.get(joint).copied().unwrap_or(Vec3::ZERO)
    }
}
