//! 时间扭曲
//!
//! 在一个动作区间 (start, end) 内，把原关键时刻 key 映射到扭曲后的
//! 关键时刻 warped_key，两侧子区间分别用缓动曲线重新分配时间。

use crate::animation::{BezierCurve, Motion};
use crate::skeleton::Posture;

use super::Segmentation;

/// 关键时刻与扭曲后关键时刻之差小于此值时视为不扭曲
const IDENTITY_EPSILON: f32 = 1e-5;

/// 时间扭曲参数
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeWarpingParam {
    /// 扭曲区间开始（秒）
    pub start_time: f32,
    /// 扭曲前的关键时刻
    pub key_time: f32,
    /// 扭曲区间结束
    pub end_time: f32,
    /// 扭曲后的关键时刻
    pub warped_key_time: f32,
    pub frame_interval: f32,
}

impl TimeWarpingParam {
    /// 时间是否落在扭曲区间内（不含两端）
    pub fn contains(&self, time: f32) -> bool {
        time > self.start_time && time < self.end_time
    }

    /// 扭曲前后的关键时刻是否重合
    pub fn is_identity(&self) -> bool {
        (self.key_time - self.warped_key_time).abs() < IDENTITY_EPSILON
    }

    /// 计算扭曲后的采样时刻
    ///
    /// 区间外或扭曲前后关键时刻重合时原样返回。
    pub fn warp(&self, now: f32, curve: &BezierCurve) -> f32 {
        if !self.contains(now) || self.is_identity() {
            return now;
        }

        let warped = if now <= self.warped_key_time {
            let span = self.warped_key_time - self.start_time;
            if span <= 0.0 {
                return now;
            }
            let y = curve.evaluate((now - self.start_time) / span);
            self.start_time + y * (self.key_time - self.start_time)
        } else {
            let span = self.end_time - self.warped_key_time;
            if span <= 0.0 {
                return now;
            }
            let y = curve.evaluate((now - self.warped_key_time) / span);
            self.key_time + y * (self.end_time - self.key_time)
        };

        warped.clamp(self.start_time, self.end_time)
    }
}

/// 求当前时刻的时间扭曲参数；动作尚未开始时返回 None
pub fn resolve_time_warp(now: f32, segmentation: &Segmentation, sharpness: f32) -> Option<TimeWarpingParam> {
    let frame = segmentation.frame_at(now);
    let interval = segmentation.locate(frame)?;
    let frame_interval = segmentation.interval();

    let start_time = interval.start;
    let end_time = interval.end;
    let span = end_time - start_time;
    if span <= 0.0 {
        return None;
    }

    let key_time = interval.effective_key(frame_interval);

    let native_key = (key_time - start_time) / span;
    let warped_native = (native_key * sharpness).clamp(0.0, 1.0);

    Some(TimeWarpingParam {
        start_time,
        key_time,
        end_time,
        warped_key_time: start_time + span * warped_native,
        frame_interval,
    })
}

/// 应用时间扭曲，返回扭曲后的采样时刻与该时刻的姿势
pub fn apply_time_warping(
    now: f32,
    param: Option<&TimeWarpingParam>,
    motion: &Motion,
    curve: &BezierCurve,
) -> (f32, Posture) {
    match param {
        Some(param) if param.contains(now) => {
            let warped = param.warp(now, curve);
            (warped, motion.posture_at(warped))
        }
        _ => (now, motion.posture_at(now)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeformConfig;
    use crate::skeleton::{BodyPartLocator, SegmentRole};
    use crate::test_util::{ramp_motion, FRAME_INTERVAL};

    fn ramp_segmentation(motion: &Motion) -> Segmentation {
        let locator = BodyPartLocator::new(motion.skeleton());
        Segmentation::analyze(motion, &locator, &DeformConfig::default())
    }

    #[test]
    fn test_no_warp_before_movement() {
        let motion = ramp_motion();
        let segmentation = ramp_segmentation(&motion);
        let now = 10.0 * FRAME_INTERVAL;

        let param = resolve_time_warp(now, &segmentation, 1.5);
        assert_eq!(param, None);

        let (time, posture) = apply_time_warping(now, param.as_ref(), &motion, &BezierCurve::ease());
        assert_eq!(time, now);
        assert_eq!(posture, motion.posture_at(now));
    }

    #[test]
    fn test_unit_sharpness_is_identity() {
        let motion = ramp_motion();
        let segmentation = ramp_segmentation(&motion);
        let curve = BezierCurve::ease();

        for frame in [35, 45, 61, 70, 90] {
            let now = frame as f32 * FRAME_INTERVAL + 0.01;
            let param = resolve_time_warp(now, &segmentation, 1.0).unwrap();
            assert!(param.is_identity());
            assert_eq!(param.warp(now, &curve), now);
        }
    }

    #[test]
    fn test_sharpness_delays_key() {
        let motion = ramp_motion();
        let segmentation = ramp_segmentation(&motion);
        let curve = BezierCurve::ease();
        let now = 40.0 * FRAME_INTERVAL;

        let param = resolve_time_warp(now, &segmentation, 1.5).unwrap();
        assert!((param.start_time - 32.0 * FRAME_INTERVAL).abs() < 1e-5);
        assert!((param.key_time - 61.0 * FRAME_INTERVAL).abs() < 1e-5);
        assert!((param.end_time - 100.0 * FRAME_INTERVAL).abs() < 1e-5);
        assert!(param.warped_key_time > param.key_time);

        // 扭曲后的关键时刻采样到原关键时刻
        assert!((param.warp(param.warped_key_time, &curve) - param.key_time).abs() < 1e-4);

        // 端点与区间外不变
        assert_eq!(param.warp(param.start_time, &curve), param.start_time);
        assert_eq!(param.warp(param.end_time, &curve), param.end_time);
        assert_eq!(param.warp(0.1, &curve), 0.1);

        // 区间内单调
        let mut previous = param.start_time;
        let steps = 200;
        for i in 1..steps {
            let t = param.start_time + (param.end_time - param.start_time) * i as f32 / steps as f32;
            let warped = param.warp(t, &curve);
            assert!(warped >= previous - 1e-5);
            assert!(warped >= param.start_time && warped <= param.end_time);
            previous = warped;
        }
    }

    #[test]
    fn test_sharpness_clamped_to_window_end() {
        let motion = ramp_motion();
        let segmentation = ramp_segmentation(&motion);
        let param = resolve_time_warp(40.0 * FRAME_INTERVAL, &segmentation, 10.0).unwrap();
        assert!((param.warped_key_time - param.end_time).abs() < 1e-5);

        let curve = BezierCurve::ease();
        let warped = param.warp(param.end_time - 1e-3, &curve);
        assert!(warped <= param.key_time + 1e-4);
    }

    #[test]
    fn test_key_at_start_moves_inside() {
        let config = DeformConfig {
            smoothing_radius: 0,
            gap_close_frames: 0,
            min_run_frames: 1,
            ..DeformConfig::default()
        };
        let mut raw = vec![0.0; 40];
        raw[20] = 1.0;
        let segmentation = Segmentation::from_activity(raw, [0.0; SegmentRole::COUNT], FRAME_INTERVAL, &config);

        let param = resolve_time_warp(20.0 * FRAME_INTERVAL + 1e-4, &segmentation, 1.2).unwrap();
        assert!((param.start_time - 20.0 * FRAME_INTERVAL).abs() < 1e-6);
        assert!((param.key_time - 21.0 * FRAME_INTERVAL).abs() < 1e-6);
        assert!(param.warped_key_time > param.key_time);
    }
}
