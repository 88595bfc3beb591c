//! 测试用的合成骨骼与动作

use std::f32::consts::PI;
use std::sync::Arc;

use glam::{Quat, Vec3};

use crate::animation::Motion;
use crate::skeleton::{Posture, Skeleton};

pub const FRAME_INTERVAL: f32 = 1.0 / 30.0;

/// 单臂：Root → RightArm → RightForeArm → RightHand，手在 (2,0,0)
pub fn arm_skeleton() -> Arc<Skeleton> {
    let mut skeleton = Skeleton::new("arm", "Root");
    let arm = skeleton.add_segment("RightArm", 0, Vec3::ZERO);
    let forearm = skeleton.add_segment("RightForeArm", arm, Vec3::X);
    let hand = skeleton.add_segment("RightHand", forearm, Vec3::X);
    skeleton.set_site(hand, Vec3::new(0.2, 0.0, 0.0));
    Arc::new(skeleton)
}

/// 标准人形骨骼（按深度优先顺序构建）
pub fn humanoid_skeleton() -> Arc<Skeleton> {
    let mut s = Skeleton::new("humanoid", "Hips");

    let spine = s.add_segment("Spine", 0, Vec3::new(0.0, 0.1, 0.0));
    let chest = s.add_segment("Spine3", spine, Vec3::new(0.0, 0.3, 0.0));
    let neck = s.add_segment("Neck", chest, Vec3::new(0.0, 0.2, 0.0));
    let head = s.add_segment("Head", neck, Vec3::new(0.0, 0.1, 0.0));
    s.set_site(head, Vec3::new(0.0, 0.2, 0.0));

    for (side, sign) in [("Right", -1.0_f32), ("Left", 1.0)] {
        let shoulder = s.add_segment(format!("{side}Shoulder"), chest, Vec3::new(sign * 0.1, 0.15, 0.0));
        let arm = s.add_segment(format!("{side}Arm"), shoulder, Vec3::new(sign * 0.1, 0.0, 0.0));
        let forearm = s.add_segment(format!("{side}ForeArm"), arm, Vec3::new(sign * 0.3, 0.0, 0.0));
        let hand = s.add_segment(format!("{side}Hand"), forearm, Vec3::new(sign * 0.25, 0.0, 0.0));
        s.set_site(hand, Vec3::new(sign * 0.1, 0.0, 0.0));
    }

    for (side, sign) in [("Right", -1.0_f32), ("Left", 1.0)] {
        let thigh = s.add_segment(format!("{side}UpLeg"), 0, Vec3::new(sign * 0.1, 0.0, 0.0));
        let shin = s.add_segment(format!("{side}Leg"), thigh, Vec3::new(0.0, -0.45, 0.0));
        let foot = s.add_segment(format!("{side}Foot"), shin, Vec3::new(0.0, -0.45, 0.0));
        s.set_site(foot, Vec3::new(0.0, -0.05, 0.15));
    }

    Arc::new(s)
}

/// 100 帧：右手随根在第 29~59 帧之间匀速移动 1 个单位，其余静止
pub fn ramp_motion() -> Motion {
    let mut skeleton = Skeleton::new("ramp", "Hips");
    skeleton.add_segment("RightHand", 0, Vec3::new(0.5, 0.0, 0.0));
    let skeleton = Arc::new(skeleton);

    let frames = (0..100)
        .map(|i| {
            let mut posture = Posture::new(Arc::clone(&skeleton));
            let progress = ((i as f32 - 29.0) / 30.0).clamp(0.0, 1.0);
            posture.root_pos = Vec3::new(progress, 0.0, 0.0);
            posture
        })
        .collect();

    Motion::new("ramp", skeleton, frames, FRAME_INTERVAL).unwrap()
}

/// 150 帧的人形动作：两段摆动（约第 15~52 帧与第 90~127 帧），
/// 其余时间保持很小的匀速漂移，因此任何帧的速度都不为零
pub fn swing_motion() -> Motion {
    let skeleton = humanoid_skeleton();
    let find = |name: &str| skeleton.find_joint(name).unwrap();
    let right_arm = find("RightArm");
    let left_arm = find("LeftArm");
    let right_forearm = find("RightForeArm");
    let right_hip = find("RightUpLeg");
    let left_knee = find("LeftLeg");
    let spine = find("Spine");
    let neck = find("Neck");

    let mut angle = 0.0_f32;
    let frames = (0..150)
        .map(|i| {
            let phase = 2.0 * PI * (i as f32 - 15.0) / 75.0;
            if i > 0 {
                angle += 0.002 + 0.05 * phase.sin().max(0.0);
            }

            let mut posture = Posture::new(Arc::clone(&skeleton));
            posture.root_pos = Vec3::new(0.5 * angle, 1.0, 0.0);
            posture.root_ori = Quat::from_rotation_y(0.1 * angle);
            posture.joint_rotations[right_arm] = Quat::from_rotation_z(angle);
            posture.joint_rotations[left_arm] = Quat::from_rotation_z(-angle);
            posture.joint_rotations[right_forearm] = Quat::from_rotation_y(0.3 * angle);
            posture.joint_rotations[right_hip] = Quat::from_rotation_x(0.5 * angle);
            posture.joint_rotations[left_knee] = Quat::from_rotation_x(0.3 * angle);
            posture.joint_rotations[spine] = Quat::from_rotation_y(0.2 * angle);
            posture.joint_rotations[neck] = Quat::from_rotation_x(0.1 * angle);
            posture
        })
        .collect();

    Motion::new("swing", skeleton, frames, FRAME_INTERVAL).unwrap()
}

/// 完全静止的动作
pub fn still_motion(frame_count: usize) -> Motion {
    let skeleton = humanoid_skeleton();
    let frames = (0..frame_count).map(|_| Posture::new(Arc::clone(&skeleton))).collect();
    Motion::new("still", skeleton, frames, FRAME_INTERVAL).unwrap()
}
