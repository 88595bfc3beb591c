//! Motion 核心数据结构
//!
//! 固定帧间隔的姿势序列，所有帧共享同一骨骼。

use std::sync::Arc;

use crate::skeleton::{Posture, Skeleton};
use crate::{MotionError, Result};

/// 动作数据
#[derive(Debug, Clone)]
pub struct Motion {
    pub name: String,
    skeleton: Arc<Skeleton>,
    frames: Vec<Posture>,
    /// 帧间隔（秒）
    interval: f32,
}

impl Motion {
    /// 创建动作，检查帧间隔与每一帧的骨骼
    pub fn new(
        name: impl Into<String>,
        skeleton: Arc<Skeleton>,
        frames: Vec<Posture>,
        interval: f32,
    ) -> Result<Self> {
        if !interval.is_finite() || interval <= 0.0 {
            return Err(MotionError::InvalidMotion(format!("帧间隔无效: {}", interval)));
        }

        let joint_count = skeleton.joint_count();
        for (index, frame) in frames.iter().enumerate() {
            if !Arc::ptr_eq(&frame.skeleton, &skeleton) {
                return Err(MotionError::InvalidMotion(format!("第 {} 帧的骨骼不一致", index)));
            }
            if frame.joint_rotations.len() != joint_count {
                return Err(MotionError::InvalidMotion(format!(
                    "第 {} 帧的关节数 {} 与骨骼的 {} 不一致",
                    index,
                    frame.joint_rotations.len(),
                    joint_count
                )));
            }
        }

        Ok(Self {
            name: name.into(),
            skeleton,
            frames,
            interval,
        })
    }

    /// 获取骨骼
    pub fn skeleton(&self) -> &Arc<Skeleton> {
        &self.skeleton
    }

    /// 获取所有帧
    pub fn frames(&self) -> &[Posture] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&Posture> {
        self.frames.get(index)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// 帧间隔（秒）
    pub fn interval(&self) -> f32 {
        self.interval
    }

    /// 动画持续时间 = 帧间隔 × 帧数
    pub fn duration(&self) -> f32 {
        self.interval * self.frames.len() as f32
    }

    /// 第 index 帧的时间
    pub fn frame_time(&self, index: usize) -> f32 {
        self.interval * index as f32
    }

    /// 时间对应的帧号（向下取整，限制在 [0, 最后一帧]）
    pub fn frame_index(&self, time: f32) -> usize {
        let last = self.frames.len().saturating_sub(1);
        if !time.is_finite() || time <= 0.0 {
            return 0;
        }
        ((time / self.interval).floor() as usize).min(last)
    }

    /// 获取指定时间的姿势（相邻两帧插值，超出范围时取端点）
    pub fn posture_at(&self, time: f32) -> Posture {
        let Some(last_frame) = self.frames.last() else {
            return Posture::new(Arc::clone(&self.skeleton));
        };

        let last = self.frames.len() - 1;
        let position = if time.is_finite() { time / self.interval } else { 0.0 };
        if position <= 0.0 {
            return self.frames[0].clone();
        }
        if position >= last as f32 {
            return last_frame.clone();
        }

        let index = position.floor() as usize;
        let amount = position - index as f32;
        if amount <= 0.0 {
            return self.frames[index].clone();
        }
        Posture::interpolate(&self.frames[index], &self.frames[index + 1], amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{arm_skeleton, ramp_motion};
    use glam::Vec3;

    #[test]
    fn test_duration_and_frame_index() {
        let motion = ramp_motion();
        assert_eq!(motion.frame_count(), 100);
        assert!((motion.duration() - 100.0 / 30.0).abs() < 1e-5);
        assert_eq!(motion.frame_index(-1.0), 0);
        assert_eq!(motion.frame_index(motion.frame_time(42) + 1e-4), 42);
        assert_eq!(motion.frame_index(1000.0), 99);
    }

    #[test]
    fn test_posture_at_interpolates_and_clamps() {
        let skeleton = arm_skeleton();
        let mut a = Posture::new(Arc::clone(&skeleton));
        let mut b = Posture::new(Arc::clone(&skeleton));
        a.root_pos = Vec3::ZERO;
        b.root_pos = Vec3::new(1.0, 0.0, 0.0);
        let motion = Motion::new("two", skeleton, vec![a, b.clone()], 0.5).unwrap();

        assert!((motion.posture_at(0.25).root_pos.x - 0.5).abs() < 1e-6);
        assert_eq!(motion.posture_at(10.0), b);
        assert_eq!(motion.posture_at(-3.0).root_pos, Vec3::ZERO);
    }

    #[test]
    fn test_rejects_mismatched_skeleton() {
        let skeleton = arm_skeleton();
        let other = Posture::new(arm_skeleton());
        assert!(Motion::new("bad", skeleton.clone(), vec![other], 1.0 / 30.0).is_err());
        assert!(Motion::new("bad", skeleton, Vec::new(), 0.0).is_err());
    }

    #[test]
    fn test_empty_motion_returns_rest_pose() {
        let skeleton = arm_skeleton();
        let motion = Motion::new("empty", skeleton.clone(), Vec::new(), 1.0 / 30.0).unwrap();
        assert!(motion.is_empty());
        assert_eq!(motion.duration(), 0.0);
        let rest = motion.posture_at(1.0);
        assert!(Arc::ptr_eq(&rest.skeleton, &skeleton));
        assert_eq!(rest, Posture::new(Arc::clone(&rest.skeleton)));
    }
}
