//! 根偏移累积
//!
//! 已完成的每段动作在关键时刻产生的根位移与根旋转差分会累积到之后的所有帧上。

use glam::{Quat, Vec3};

use crate::skeleton::{ForwardKinematics, Posture};

use super::motion_warp::{deform_key_pose, DeformContext};
use super::Amplitude;

/// 累积的根偏移
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CumulativeOffset {
    pub position: Vec3,
    pub rotation: Quat,
    /// 参与累积的已完成动作段数
    pub segment_count: usize,
}

impl Default for CumulativeOffset {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            segment_count: 0,
        }
    }
}

impl CumulativeOffset {
    /// 先旋转再平移
    pub fn apply(&self, pose: &mut Posture) {
        pose.root_ori = (self.rotation * pose.root_ori).normalize();
        pose.root_pos += self.position;
    }

    /// 不移动也不旋转
    pub fn is_identity(&self) -> bool {
        self.position == Vec3::ZERO && self.rotation == Quat::IDENTITY
    }
}

/// 每段已完成动作的偏移缓存
#[derive(Clone, Debug, Default)]
pub struct CumulativeOffsetCache {
    deltas: Vec<(Vec3, Quat)>,
    /// 生成缓存时使用的幅度
    amplitude: Option<Amplitude>,
}

impl CumulativeOffsetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已缓存的动作段数
    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    pub fn clear(&mut self) {
        self.deltas.clear();
        self.amplitude = None;
    }

    /// 计算时刻 `time` 的累积偏移
    ///
    /// 第 k 段动作的混合窗口（到第 k+1 段开始前的最后一帧）一结束即视为已完成，
    /// 使混合与累积偏移在帧之间首尾相接。
    pub fn compute(
        &mut self,
        time: f32,
        ctx: &DeformContext<'_>,
        amplitude: &Amplitude,
        fk: &mut ForwardKinematics,
    ) -> CumulativeOffset {
        if let Some(previous) = &self.amplitude {
            if previous.max_abs_diff(amplitude) > ctx.config.amplitude_epsilon {
                log::debug!("幅度参数已变化，清空 {} 段累积偏移缓存", self.deltas.len());
                self.deltas.clear();
            }
        }
        self.amplitude = Some(*amplitude);

        let interval = ctx.segmentation.interval();
        let runs = ctx.segmentation.movement_runs();
        let completed = runs
            .windows(2)
            .take_while(|pair| (pair[1].start - 1) as f32 * interval < time)
            .count();

        if completed < self.deltas.len() {
            log::debug!("时间回退，累积偏移缓存截断为 {} 段", completed);
            self.deltas.truncate(completed);
        }

        for run in &runs[self.deltas.len()..completed] {
            let key_time = run.key_frame() as f32 * interval;
            let org = ctx.motion.posture_at(key_time);
            let key = deform_key_pose(ctx, key_time, amplitude, fk);
            let delta = if key == org {
                (Vec3::ZERO, Quat::IDENTITY)
            } else {
                (key.root_pos - org.root_pos, (key.root_ori * org.root_ori.inverse()).normalize())
            };
            self.deltas.push(delta);
        }

        let (position, rotation) = self
            .deltas
            .iter()
            .fold((Vec3::ZERO, Quat::IDENTITY), |(p, r), (dp, dr)| (p + *dp, r * *dr));

        CumulativeOffset {
            position,
            rotation: rotation.normalize(),
            segment_count: completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::Motion;
    use crate::config::DeformConfig;
    use crate::deformation::Segmentation;
    use crate::skeleton::{BodyPartLocator, SegmentRole};
    use crate::test_util::{swing_motion, FRAME_INTERVAL};

    struct Fixture {
        motion: Motion,
        segmentation: Segmentation,
        locator: BodyPartLocator,
        config: DeformConfig,
    }

    fn fixture() -> Fixture {
        let motion = swing_motion();
        let config = DeformConfig::default();
        let locator = BodyPartLocator::new(motion.skeleton());
        let segmentation = Segmentation::analyze(&motion, &locator, &config);
        Fixture {
            motion,
            segmentation,
            locator,
            config,
        }
    }

    fn ctx(f: &Fixture) -> DeformContext<'_> {
        DeformContext {
            motion: &f.motion,
            segmentation: &f.segmentation,
            locator: &f.locator,
            config: &f.config,
        }
    }

    fn legs(value: f32) -> Amplitude {
        let mut amplitude = Amplitude::zero();
        amplitude.set(SegmentRole::RightFoot, value);
        amplitude.set(SegmentRole::LeftFoot, value);
        amplitude.set(SegmentRole::Pelvis, value);
        amplitude
    }

    #[test]
    fn test_offset_starts_after_blend_window() {
        let f = fixture();
        let runs = f.segmentation.movement_runs();
        let mut cache = CumulativeOffsetCache::new();
        let mut fk = ForwardKinematics::new();

        let time = (runs[1].start as f32 - 1.0) * FRAME_INTERVAL;
        let offset = cache.compute(time, &ctx(&f), &legs(2.0), &mut fk);
        assert!(offset.is_identity());
        assert_eq!(offset.segment_count, 0);
        assert!(cache.is_empty());

        // 混合窗口结束后、下一段开始前的帧间时刻已计入
        let offset = cache.compute(time + 0.5 * FRAME_INTERVAL, &ctx(&f), &legs(2.0), &mut fk);
        assert_eq!(offset.segment_count, 1);
    }

    #[test]
    fn test_completed_movement_contributes_root_delta() {
        let f = fixture();
        let runs = f.segmentation.movement_runs();
        let mut cache = CumulativeOffsetCache::new();
        let mut fk = ForwardKinematics::new();

        let time = runs[1].start as f32 * FRAME_INTERVAL + 0.01;
        let offset = cache.compute(time, &ctx(&f), &legs(2.0), &mut fk);
        assert_eq!(offset.segment_count, 1);

        let key_time = runs[0].end as f32 * FRAME_INTERVAL;
        let current = f.motion.posture_at(key_time);
        let previous = f.motion.posture_at(key_time - FRAME_INTERVAL);
        let expected = 2.0 * (current.root_pos - previous.root_pos);
        assert!((offset.position - expected).length() < 1e-5);
        // 根朝向随动作绕 Y 轴转动，骨盆幅度使其差分不为单位旋转
        assert!(offset.rotation.y.abs() > 1e-6);
    }

    #[test]
    fn test_warm_cache_matches_cold_cache() {
        let f = fixture();
        let amplitude = legs(1.5);
        let end = f.motion.duration();
        let mut fk = ForwardKinematics::new();

        let mut warm = CumulativeOffsetCache::new();
        let mut time = 0.0;
        while time < end {
            warm.compute(time, &ctx(&f), &amplitude, &mut fk);
            time += FRAME_INTERVAL;
        }
        let warm_offset = warm.compute(end, &ctx(&f), &amplitude, &mut fk);

        let mut cold = CumulativeOffsetCache::new();
        let cold_offset = cold.compute(end, &ctx(&f), &amplitude, &mut fk);
        assert_eq!(warm_offset, cold_offset);
    }

    #[test]
    fn test_amplitude_change_invalidates_cache() {
        let f = fixture();
        let end = f.motion.duration();
        let mut fk = ForwardKinematics::new();

        let mut cache = CumulativeOffsetCache::new();
        cache.compute(end, &ctx(&f), &legs(1.0), &mut fk);
        let changed = cache.compute(end, &ctx(&f), &legs(3.0), &mut fk);

        let mut fresh = CumulativeOffsetCache::new();
        assert_eq!(changed, fresh.compute(end, &ctx(&f), &legs(3.0), &mut fk));

        // 变化小于阈值时沿用缓存
        let nudged = cache.compute(end, &ctx(&f), &legs(3.0005), &mut fk);
        assert_eq!(nudged, changed);
    }

    #[test]
    fn test_time_going_back_truncates() {
        let f = fixture();
        let mut fk = ForwardKinematics::new();
        let mut cache = CumulativeOffsetCache::new();

        cache.compute(f.motion.duration(), &ctx(&f), &legs(1.0), &mut fk);
        assert_eq!(cache.len(), 1);
        let offset = cache.compute(0.0, &ctx(&f), &legs(1.0), &mut fk);
        assert_eq!(cache.len(), 0);
        assert_eq!(offset, CumulativeOffset::default());
    }

    #[test]
    fn test_zero_amplitude_accumulates_identity() {
        let f = fixture();
        let mut fk = ForwardKinematics::new();
        let mut cache = CumulativeOffsetCache::new();

        let offset = cache.compute(f.motion.duration(), &ctx(&f), &Amplitude::zero(), &mut fk);
        assert_eq!(offset.segment_count, 1);
        assert!(offset.is_identity());
    }

    #[test]
    fn test_apply_rotates_then_translates() {
        let skeleton = crate::test_util::arm_skeleton();
        let mut pose = Posture::new(skeleton);
        pose.root_pos = Vec3::new(1.0, 0.0, 0.0);
        pose.root_ori = Quat::from_rotation_y(0.2);

        let offset = CumulativeOffset {
            position: Vec3::new(0.0, 0.0, 2.0),
            rotation: Quat::from_rotation_y(0.3),
            segment_count: 1,
        };
        offset.apply(&mut pose);
        assert!((pose.root_pos - Vec3::new(1.0, 0.0, 2.0)).length() < 1e-6);
        assert!(pose.root_ori.dot(Quat::from_rotation_y(0.5)).abs() > 1.0 - 1e-6);
    }
}
