//! 动作扭曲参数
//!
//! 对每段动作的关键姿势施加变形，变形结果再由 `blend` 混合到前后各帧。

use glam::{Quat, Vec3};

use crate::animation::{BezierCurve, Motion};
use crate::config::{DeformConfig, DeformStrategy};
use crate::skeleton::{
    slerp_shortest, BodyPartLocator, ForwardKinematics, IkSolver, JointRole, Posture, SegmentRole,
};

use super::{Amplitude, Segmentation, TimeWarpingParam};

/// 角速度外推的关节及其使用的幅度
const VELOCITY_JOINTS: [(JointRole, SegmentRole); 10] = [
    (JointRole::RightHip, SegmentRole::RightFoot),
    (JointRole::RightKnee, SegmentRole::RightFoot),
    (JointRole::LeftHip, SegmentRole::LeftFoot),
    (JointRole::LeftKnee, SegmentRole::LeftFoot),
    (JointRole::RightShoulder, SegmentRole::RightHand),
    (JointRole::RightElbow, SegmentRole::RightHand),
    (JointRole::LeftShoulder, SegmentRole::LeftHand),
    (JointRole::LeftElbow, SegmentRole::LeftHand),
    (JointRole::Spine, SegmentRole::Chest),
    (JointRole::Neck, SegmentRole::Head),
];

/// 关键时刻前后的混合时长（秒）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlendDurations {
    pub blend_in: f32,
    pub blend_out: f32,
}

/// 关键姿势上的末端移动：把 `effector_joint` 平移 `translation`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectorEdit {
    /// IK 链的基关节（不含），None 表示上溯到根
    pub base_joint: Option<usize>,
    pub effector_joint: usize,
    pub translation: Vec3,
}

/// 动作扭曲参数
#[derive(Clone, Debug, PartialEq)]
pub struct MotionWarpingParam {
    /// 施加变形的关键时刻
    pub key_time: f32,
    /// 变形前的关键姿势
    pub org_pose: Posture,
    /// 变形后的关键姿势
    pub key_pose: Posture,
    /// None 表示不混合
    pub blend: Option<BlendDurations>,
}

impl MotionWarpingParam {
    /// 不产生变形的参数
    pub fn inactive(time: f32, pose: Posture) -> Self {
        Self {
            key_time: time,
            org_pose: pose.clone(),
            key_pose: pose,
            blend: None,
        }
    }

    /// 手动指定关键时刻与混合时长
    ///
    /// 关键姿势取自动作；给出 `edit` 时再用 IK 移动指定关节。
    pub fn manual(
        motion: &Motion,
        key_time: f32,
        blend: BlendDurations,
        edit: Option<&EffectorEdit>,
        solver: &IkSolver,
        fk: &mut ForwardKinematics,
    ) -> Self {
        let org_pose = motion.posture_at(key_time);
        let mut param = Self {
            key_time,
            key_pose: org_pose.clone(),
            org_pose,
            blend: Some(BlendDurations {
                blend_in: blend.blend_in.max(0.0),
                blend_out: blend.blend_out.max(0.0),
            }),
        };
        if let Some(edit) = edit {
            if param.move_effector(edit, solver, fk).is_none() {
                log::debug!("末端关节 {} 不存在，关键姿势保持不变", edit.effector_joint);
            }
        }
        param
    }

    /// 在当前关键姿势上移动末端关节，返回 IK 求解后的剩余距离
    ///
    /// 关节不存在时返回 None 且不修改姿势。
    pub fn move_effector(&mut self, edit: &EffectorEdit, solver: &IkSolver, fk: &mut ForwardKinematics) -> Option<f32> {
        let effector_segment = self.key_pose.skeleton.joint(edit.effector_joint)?.child_segment;
        fk.compute(&self.key_pose);
        let target = fk.joint_position(edit.effector_joint) + edit.translation;
        Some(solver.solve(&mut self.key_pose, edit.base_joint, effector_segment, target, fk))
    }

    /// 从动作重新取关键姿势，撤销所有编辑
    pub fn reset_key_pose(&mut self, motion: &Motion) {
        self.key_pose = motion.posture_at(self.key_time);
    }

    /// 变形前后的关键姿势是否相同
    pub fn is_identity(&self) -> bool {
        self.key_pose == self.org_pose
    }

    /// 混合窗口 [key - blend_in, key + blend_out]
    pub fn window(&self) -> Option<(f32, f32)> {
        self.blend
            .map(|b| (self.key_time - b.blend_in, self.key_time + b.blend_out))
    }
}

/// 求解动作扭曲所需的只读数据
#[derive(Clone, Copy)]
pub struct DeformContext<'a> {
    pub motion: &'a Motion,
    pub segmentation: &'a Segmentation,
    pub locator: &'a BodyPartLocator,
    pub config: &'a DeformConfig,
}

/// 求当前时刻的动作扭曲参数
///
/// 所在帧由时间扭曲后的时刻决定；动作尚未开始时返回不混合的参数。
pub fn resolve_motion_warp(
    now: f32,
    time_warp: Option<&TimeWarpingParam>,
    ctx: &DeformContext<'_>,
    amplitude: &Amplitude,
    curve: &BezierCurve,
    fk: &mut ForwardKinematics,
) -> MotionWarpingParam {
    let warped_time = match time_warp {
        Some(param) if param.contains(now) => param.warp(now, curve),
        _ => now,
    };

    let frame = ctx.segmentation.frame_at(warped_time);
    let Some(interval) = ctx.segmentation.locate(frame) else {
        return MotionWarpingParam::inactive(now, ctx.motion.posture_at(now));
    };

    let key_time = interval.effective_key(ctx.segmentation.interval());
    MotionWarpingParam {
        key_time,
        org_pose: ctx.motion.posture_at(key_time),
        key_pose: deform_key_pose(ctx, key_time, amplitude, fk),
        blend: Some(BlendDurations {
            blend_in: (key_time - interval.start).max(0.0),
            blend_out: (interval.end - key_time).max(0.0),
        }),
    }
}

/// 变形关键时刻的姿势
///
/// 幅度全为 0 时返回原姿势。
pub fn deform_key_pose(
    ctx: &DeformContext<'_>,
    key_time: f32,
    amplitude: &Amplitude,
    fk: &mut ForwardKinematics,
) -> Posture {
    let current = ctx.motion.posture_at(key_time);
    if amplitude.is_zero() {
        return current;
    }
    let previous = ctx.motion.posture_at(key_time - ctx.motion.interval());

    match ctx.config.strategy {
        DeformStrategy::Velocity => deform_by_velocity(&current, &previous, amplitude, ctx.locator),
        DeformStrategy::Position => {
            let solver = IkSolver::new(ctx.config.ik_iterations, ctx.config.ik_tolerance);
            deform_by_position(&current, &previous, amplitude, ctx.locator, &solver, fk)
        }
    }
}

/// 按一帧的旋转增量外推：new = slerp(I, cur·prev⁻¹, amplitude) · cur
fn extrapolate_rotation(current: Quat, previous: Quat, amplitude: f32) -> Quat {
    let delta = current * previous.inverse();
    let scaled = slerp_shortest(Quat::IDENTITY, delta, amplitude);
    (scaled * current).normalize()
}

/// 角速度外推
pub fn deform_by_velocity(
    current: &Posture,
    previous: &Posture,
    amplitude: &Amplitude,
    locator: &BodyPartLocator,
) -> Posture {
    let mut pose = current.clone();
    if !current.same_skeleton(previous) {
        return pose;
    }

    for (joint_role, segment_role) in VELOCITY_JOINTS {
        let Some(joint) = locator.joint(joint_role) else {
            continue;
        };
        let amount = amplitude.get(segment_role);
        if amount == 0.0 || joint >= pose.joint_rotations.len() {
            continue;
        }
        pose.joint_rotations[joint] = extrapolate_rotation(
            current.joint_rotations[joint],
            previous.joint_rotations[joint],
            amount,
        );
    }

    let pelvis = amplitude.get(SegmentRole::Pelvis);
    if pelvis != 0.0 {
        pose.root_ori = extrapolate_rotation(current.root_ori, previous.root_ori, pelvis);
    }

    let legs = amplitude.leg_mean();
    if legs != 0.0 {
        pose.root_pos = current.root_pos + legs * (current.root_pos - previous.root_pos);
    }

    pose
}

/// 末端位移外推 + CCD IK
pub fn deform_by_position(
    current: &Posture,
    previous: &Posture,
    amplitude: &Amplitude,
    locator: &BodyPartLocator,
    solver: &IkSolver,
    fk: &mut ForwardKinematics,
) -> Posture {
    let mut pose = current.clone();
    if !current.same_skeleton(previous) {
        return pose;
    }

    let segments: Vec<Option<usize>> = SegmentRole::ALL.iter().map(|&r| locator.segment(r)).collect();

    fk.compute(previous);
    let previous_positions: Vec<Option<Vec3>> =
        segments.iter().map(|s| s.map(|s| fk.segment_position(s))).collect();
    fk.compute(current);
    let current_positions: Vec<Option<Vec3>> =
        segments.iter().map(|s| s.map(|s| fk.segment_position(s))).collect();

    let displacement = |role: SegmentRole| -> Option<Vec3> {
        let r = role.index();
        Some(current_positions[r]? - previous_positions[r]?)
    };

    // 骨盆直接移动根位置，其余部位在此基础上求 IK
    let pelvis = amplitude.get(SegmentRole::Pelvis);
    if pelvis != 0.0 {
        if let Some(d) = displacement(SegmentRole::Pelvis) {
            pose.root_pos += pelvis * d;
        }
    }

    for role in SegmentRole::ALL {
        if role == SegmentRole::Pelvis {
            continue;
        }
        let amount = amplitude.get(role);
        let (Some(segment), Some(position), Some(d)) =
            (segments[role.index()], current_positions[role.index()], displacement(role))
        else {
            continue;
        };
        if amount == 0.0 {
            continue;
        }

        let target = position + amount * d;
        solver.solve(&mut pose, None, segment, target, fk);
    }

    pose
}
