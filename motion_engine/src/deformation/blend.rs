//! 姿势混合

use glam::Quat;

use crate::skeleton::{slerp_shortest, Posture};

use super::MotionWarpingParam;

/// 把 (dest - src) 的差分按 ratio 加到 org 上，结果写入 out
///
/// 四个姿势必须共享同一骨骼，否则返回 false 且不修改 out。
pub fn posture_warping(org: &Posture, src: &Posture, dest: &Posture, ratio: f32, out: &mut Posture) -> bool {
    if !org.same_skeleton(src) || !src.same_skeleton(dest) || !dest.same_skeleton(out) {
        log::debug!("姿势混合跳过：骨骼不一致");
        return false;
    }

    let warp_rotation = |o: Quat, s: Quat, d: Quat| {
        let target = d * s.inverse() * o;
        slerp_shortest(o, target, ratio)
    };

    out.joint_rotations.clear();
    out.joint_rotations.extend(
        org.joint_rotations
            .iter()
            .zip(&src.joint_rotations)
            .zip(&dest.joint_rotations)
            .map(|((&o, &s), &d)| warp_rotation(o, s, d)),
    );
    out.root_ori = warp_rotation(org.root_ori, src.root_ori, dest.root_ori);
    out.root_pos = org.root_pos + ratio * (dest.root_pos - src.root_pos);

    true
}

/// 把动作扭曲混合到当前姿势上，返回结果姿势与混合权重
///
/// 权重在 [key - blend_in, key] 内从 0 线性升到 1，之后到 key + blend_out 保持 1。
/// 窗口外、没有混合窗口或关键姿势未变形时原样返回输入姿势，权重为 0。
pub fn apply_motion_deformation(warping_time: f32, input_pose: &Posture, deform: &MotionWarpingParam) -> (Posture, f32) {
    let Some((window_start, window_end)) = deform.window() else {
        return (input_pose.clone(), 0.0);
    };
    if warping_time < window_start || warping_time > window_end || deform.is_identity() {
        return (input_pose.clone(), 0.0);
    }

    let ratio = if warping_time < deform.key_time {
        let span = deform.key_time - window_start;
        if span > 0.0 {
            ((warping_time - window_start) / span).clamp(0.0, 1.0)
        } else {
            1.0
        }
    } else {
        1.0
    };

    let mut output = input_pose.clone();
    if posture_warping(input_pose, &deform.org_pose, &deform.key_pose, ratio, &mut output) {
        (output, ratio)
    } else {
        (input_pose.clone(), 0.0)
    }
}
