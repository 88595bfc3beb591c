//! 变形会话
//!
//! 持有一条动作及其分段结果，按播放时间逐帧运行变形流水线：
//! 时间扭曲 → 动作扭曲 → 姿势混合 → 根偏移累积。

use std::sync::Arc;

use crate::animation::{BezierCurve, Motion};
use crate::config::DeformConfig;
use crate::skeleton::{BodyPartLocator, ForwardKinematics, Posture, SegmentRole};
use crate::Result;

use super::blend::apply_motion_deformation;
use super::cumulative::{CumulativeOffset, CumulativeOffsetCache};
use super::model_param::ModelParam;
use super::motion_warp::{resolve_motion_warp, DeformContext, MotionWarpingParam};
use super::time_warp::{apply_time_warping, resolve_time_warp, TimeWarpingParam};
use super::{Amplitude, DeformParams, Segmentation};

/// 单帧的变形结果
#[derive(Clone, Debug)]
pub struct DeformedFrame {
    /// 播放时间（秒）
    pub time: f32,
    pub frame_no: usize,
    /// 时间扭曲后的采样时刻
    pub warped_time: f32,
    pub time_warp: Option<TimeWarpingParam>,
    pub motion_warp: MotionWarpingParam,
    /// 未变形的姿势
    pub original: Posture,
    /// 仅时间扭曲后的姿势
    pub time_warped: Posture,
    /// 最终姿势
    pub deformed: Posture,
    /// 动作扭曲的混合权重
    pub weight: f32,
    pub offset: CumulativeOffset,
}

/// 变形会话
pub struct DeformationSession {
    motion: Arc<Motion>,
    segmentation: Segmentation,
    locator: BodyPartLocator,
    params: DeformParams,
    config: DeformConfig,
    curve: BezierCurve,
    fk: ForwardKinematics,
    offsets: CumulativeOffsetCache,
    /// 当前播放时间（秒）
    time: f32,
    playing: bool,
    speed: f32,
    looping: bool,
}

impl DeformationSession {
    /// 创建会话并对动作分段
    pub fn new(motion: Arc<Motion>, config: DeformConfig) -> Self {
        let locator = BodyPartLocator::new(motion.skeleton());
        let segmentation = Segmentation::analyze(&motion, &locator, &config);
        Self {
            curve: BezierCurve::from_config(&config),
            motion,
            segmentation,
            locator,
            params: DeformParams::default(),
            config,
            fk: ForwardKinematics::new(),
            offsets: CumulativeOffsetCache::new(),
            time: 0.0,
            playing: false,
            speed: 1.0,
            looping: true,
        }
    }

    pub fn motion(&self) -> &Arc<Motion> {
        &self.motion
    }

    pub fn segmentation(&self) -> &Segmentation {
        &self.segmentation
    }

    pub fn locator(&self) -> &BodyPartLocator {
        &self.locator
    }

    /// 替换部位映射并重新分段
    pub fn set_locator(&mut self, locator: BodyPartLocator) {
        self.locator = locator;
        self.segmentation = Segmentation::analyze(&self.motion, &self.locator, &self.config);
        self.offsets.clear();
    }

    pub fn config(&self) -> &DeformConfig {
        &self.config
    }

    pub fn params(&self) -> &DeformParams {
        &self.params
    }

    pub fn set_params(&mut self, params: DeformParams) {
        self.params = params;
    }

    /// 设置时间扭曲的锐度倍率
    pub fn set_sharpness(&mut self, sharpness: f32) {
        self.params.sharpness = sharpness.max(0.0);
    }

    /// 设置单个部位的幅度
    pub fn set_amplitude(&mut self, role: SegmentRole, value: f32) {
        self.params.amplitude.set(role, value);
    }

    pub fn set_amplitudes(&mut self, amplitude: Amplitude) {
        self.params.amplitude = amplitude;
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn play(&mut self) {
        if !self.motion.is_empty() {
            self.playing = true;
        }
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// 切换播放/暂停
    pub fn toggle(&mut self) {
        if self.playing {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed.max(0.0);
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// 跳转到指定时间（限制在 [0, 动作时长]）
    pub fn seek(&mut self, time: f32) {
        let time = if time.is_finite() { time } else { 0.0 };
        self.time = time.clamp(0.0, self.motion.duration());
    }

    /// 回到开头并停止，清空累积偏移
    pub fn reset(&mut self) {
        self.time = 0.0;
        self.playing = false;
        self.offsets.clear();
    }

    /// 推进播放时间并计算当前帧
    ///
    /// 暂停或没有动作时返回 None。
    pub fn tick(&mut self, delta: f32) -> Option<DeformedFrame> {
        if !self.playing || self.motion.is_empty() {
            return None;
        }

        let duration = self.motion.duration();
        let time = self.time + delta * self.speed;
        self.time = if self.looping {
            time.rem_euclid(duration)
        } else if time >= duration {
            log::debug!("动作 {} 播放结束", self.motion.name);
            self.playing = false;
            duration
        } else {
            time.max(0.0)
        };

        Some(self.evaluate(self.time))
    }

    /// 计算指定时间的变形结果
    pub fn evaluate(&mut self, time: f32) -> DeformedFrame {
        let ctx = DeformContext {
            motion: self.motion.as_ref(),
            segmentation: &self.segmentation,
            locator: &self.locator,
            config: &self.config,
        };
        let amplitude = self.params.amplitude;

        let original = ctx.motion.posture_at(time);
        let time_warp = resolve_time_warp(time, ctx.segmentation, self.params.sharpness);
        let (warped_time, time_warped) =
            apply_time_warping(time, time_warp.as_ref(), ctx.motion, &self.curve);

        let motion_warp = resolve_motion_warp(
            time,
            time_warp.as_ref(),
            &ctx,
            &amplitude,
            &self.curve,
            &mut self.fk,
        );
        let (mut deformed, weight) = apply_motion_deformation(warped_time, &time_warped, &motion_warp);

        let offset = self.offsets.compute(time, &ctx, &amplitude, &mut self.fk);
        if !offset.is_identity() {
            offset.apply(&mut deformed);
        }

        let frame_no = ctx.motion.frame_index(time);
        if ctx.config.debug_log {
            log::debug!(
                "帧 {}: 时间 {:.3} → {:.3}, 关键时刻 {:.3}, 混合权重 {:.2}, 累积 {} 段",
                frame_no,
                time,
                warped_time,
                motion_warp.key_time,
                weight,
                offset.segment_count
            );
        }

        DeformedFrame {
            time,
            frame_no,
            warped_time,
            time_warp,
            motion_warp,
            original,
            time_warped,
            deformed,
            weight,
            offset,
        }
    }

    /// 逐帧计算变形结果并生成新的动作
    pub fn bake(&mut self) -> Result<Motion> {
        let motion = Arc::clone(&self.motion);
        let frames: Vec<Posture> = (0..motion.frame_count())
            .map(|index| self.evaluate(motion.frame_time(index)).deformed)
            .collect();

        log::info!("生成变形动作: {}_deformed ({} 帧)", motion.name, frames.len());
        Motion::new(
            format!("{}_deformed", motion.name),
            Arc::clone(motion.skeleton()),
            frames,
            motion.interval(),
        )
    }

    /// 整条动作上互不相同的时间扭曲区间
    pub fn warp_timeline(&self) -> Vec<TimeWarpingParam> {
        let mut timeline: Vec<TimeWarpingParam> = Vec::new();
        for index in 0..self.motion.frame_count() {
            let time = self.motion.frame_time(index);
            let Some(param) = resolve_time_warp(time, &self.segmentation, self.params.sharpness) else {
                continue;
            };
            if timeline.last().map_or(true, |last| last.start_time != param.start_time) {
                timeline.push(param);
            }
        }
        timeline
    }

    /// 当前动作的统计量
    pub fn model_param(&self) -> ModelParam {
        ModelParam::from_motion(&self.motion, &self.segmentation, &self.locator)
    }
}
