//! 动作分段
//!
//! 以四肢末端的逐帧位移之和作为活动量，平滑后用阈值把每一帧
//! 标记为"运动"或"静止"，再合并短间隙、去掉过短的运动区间。

use glam::Vec3;
use rayon::prelude::*;

use crate::animation::Motion;
use crate::config::{DeformConfig, ThresholdMode, ThresholdReference};
use crate::skeleton::{BodyPartLocator, ForwardKinematics, SegmentRole};

/// 导数绝对值低于此值视为 0
const FLAT_DERIVATIVE: f32 = 1e-7;

/// 每帧的活动量信息
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistanceParam {
    /// 平滑后的活动量
    pub distance_sum: f32,
    /// 该帧是否处于运动中
    pub is_moving: bool,
    /// 该帧或之前是否已经开始运动
    pub move_start: bool,
    /// 该帧使用的阈值
    pub move_amount: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtremumKind {
    Peak,
    Valley,
}

/// 平滑活动量的极值
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Extremum {
    pub frame: usize,
    pub kind: ExtremumKind,
    pub value: f32,
}

/// 连续的运动帧区间（含两端）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MovementRun {
    pub start: usize,
    pub end: usize,
}

impl MovementRun {
    /// 区间帧数
    pub fn frame_count(&self) -> usize {
        self.end + 1 - self.start
    }

    /// 关键帧为区间的最后一帧
    pub fn key_frame(&self) -> usize {
        self.end
    }
}

/// 某一帧所在动作的时间区间（秒）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MovementInterval {
    pub start: f32,
    pub key: f32,
    pub end: f32,
}

impl MovementInterval {
    /// 实际使用的关键时刻
    ///
    /// 限制在区间内；与开始重合时向区间内部移动一帧。时间扭曲与动作扭曲共用。
    pub fn effective_key(&self, frame_interval: f32) -> f32 {
        let key = self.key.clamp(self.start, self.end);
        if key - self.start <= 0.0 {
            (self.start + frame_interval).min(self.end)
        } else {
            key
        }
    }
}

/// 分段统计
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SegmentationStats {
    /// 各体节角色的平均逐帧位移
    pub mean_displacement: [f32; SegmentRole::COUNT],
    /// 运动帧所占比例
    pub moving_ratio: f32,
    /// 运动区间数
    pub movement_count: usize,
}

/// 动作分段结果
#[derive(Clone, Debug, PartialEq)]
pub struct Segmentation {
    params: Vec<DistanceParam>,
    raw_activity: Vec<f32>,
    extrema: Vec<Extremum>,
    stats: SegmentationStats,
    interval: f32,
}

impl Segmentation {
    /// 分析动作
    pub fn analyze(motion: &Motion, locator: &BodyPartLocator, config: &DeformConfig) -> Self {
        let roles: Vec<Option<usize>> = SegmentRole::ALL.iter().map(|&r| locator.segment(r)).collect();

        // 逐帧正向运动学互不依赖，并行计算后按帧顺序收集
        let positions: Vec<Vec<Option<Vec3>>> = motion
            .frames()
            .par_iter()
            .map_init(ForwardKinematics::new, |fk, posture| {
                fk.compute(posture);
                roles
                    .iter()
                    .map(|seg| seg.map(|s| fk.segment_position(s)))
                    .collect()
            })
            .collect();

        let mut raw = Vec::with_capacity(positions.len());
        let mut role_totals = [0.0_f32; SegmentRole::COUNT];

        for (index, current) in positions.iter().enumerate() {
            let previous = if index > 0 { &positions[index - 1] } else { current };
            let mut activity = 0.0;
            for role in SegmentRole::ALL {
                let r = role.index();
                let displacement = match (current[r], previous[r]) {
                    (Some(c), Some(p)) => (c - p).length(),
                    _ => 0.0,
                };
                role_totals[r] += displacement;
                if SegmentRole::LIMB_ENDS.contains(&role) {
                    activity += displacement;
                }
            }
            raw.push(activity);
        }

        let segmentation = Self::from_activity(raw, role_totals, motion.interval(), config);
        log::info!(
            "动作分段完成: {} ({} 帧, {} 段动作, 运动比例 {:.2})",
            motion.name,
            segmentation.len(),
            segmentation.stats.movement_count,
            segmentation.stats.moving_ratio
        );
        segmentation
    }

    /// 对给定的逐帧活动量进行分段
    ///
    /// `role_totals` 为各体节角色的位移总和，仅用于统计。
    pub fn from_activity(
        raw: Vec<f32>,
        role_totals: [f32; SegmentRole::COUNT],
        interval: f32,
        config: &DeformConfig,
    ) -> Self {
        let frame_count = raw.len();
        if frame_count == 0 {
            return Self {
                params: Vec::new(),
                raw_activity: raw,
                extrema: Vec::new(),
                stats: SegmentationStats::default(),
                interval,
            };
        }

        let smoothed = smooth(&raw, config.smoothing_radius);
        let diff = derivative(&smoothed);
        let extrema = detect_extrema(
            &diff,
            &smoothed,
            config.extrema_neighborhood,
            config.extrema_min_spacing,
        );

        let (mut moving, thresholds) = match config.threshold_mode {
            ThresholdMode::Hysteresis => {
                let threshold = activity_threshold(&raw, config);
                let moving = hysteresis(
                    &smoothed,
                    threshold,
                    config.hysteresis_enter,
                    config.hysteresis_exit,
                );
                (moving, vec![threshold; frame_count])
            }
            ThresholdMode::Extrema => match extrema_thresholds(&smoothed, &extrema, config.extrema_threshold_fraction) {
                Some(thresholds) => {
                    let moving = smoothed.iter().zip(&thresholds).map(|(s, t)| s >= t).collect();
                    (moving, thresholds)
                }
                None => (vec![false; frame_count], vec![f32::INFINITY; frame_count]),
            },
        };

        close_gaps(&mut moving, config.gap_close_frames);
        remove_short_runs(&mut moving, config.min_run_frames);

        let mut started = false;
        let params = (0..frame_count)
            .map(|i| {
                started |= moving[i];
                DistanceParam {
                    distance_sum: smoothed[i],
                    is_moving: moving[i],
                    move_start: started,
                    move_amount: thresholds[i],
                }
            })
            .collect();

        let moving_frames = moving.iter().filter(|&&m| m).count();
        let mut mean_displacement = role_totals;
        for value in &mut mean_displacement {
            *value /= frame_count as f32;
        }
        let stats = SegmentationStats {
            mean_displacement,
            moving_ratio: moving_frames as f32 / frame_count as f32,
            movement_count: movement_runs(&moving).len(),
        };

        Self {
            params,
            raw_activity: raw,
            extrema,
            stats,
            interval,
        }
    }

    pub fn params(&self) -> &[DistanceParam] {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// 帧间隔（秒）
    pub fn interval(&self) -> f32 {
        self.interval
    }

    /// 未平滑的逐帧活动量
    pub fn raw_activity(&self) -> &[f32] {
        &self.raw_activity
    }

    pub fn extrema(&self) -> &[Extremum] {
        &self.extrema
    }

    pub fn stats(&self) -> &SegmentationStats {
        &self.stats
    }

    /// 时间对应的帧号（限制在最后一帧）
    pub fn frame_at(&self, time: f32) -> usize {
        let last = self.params.len().saturating_sub(1);
        if !time.is_finite() || time <= 0.0 || self.interval <= 0.0 {
            return 0;
        }
        ((time / self.interval).floor() as usize).min(last)
    }

    pub fn is_moving(&self, frame: usize) -> bool {
        self.params.get(frame).is_some_and(|p| p.is_moving)
    }

    pub fn has_started(&self, frame: usize) -> bool {
        self.params.get(frame).is_some_and(|p| p.move_start)
    }

    /// 所有连续的运动区间
    pub fn movement_runs(&self) -> Vec<MovementRun> {
        let moving: Vec<bool> = self.params.iter().map(|p| p.is_moving).collect();
        movement_runs(&moving)
    }

    /// 查找某一帧所在动作的开始、关键、结束时间
    ///
    /// 动作尚未开始时返回 None。
    pub fn locate(&self, frame: usize) -> Option<MovementInterval> {
        let count = self.params.len();
        if count == 0 {
            return None;
        }
        let frame = frame.min(count - 1);
        if !self.has_started(frame) {
            return None;
        }

        let moving = |i: usize| self.params[i].is_moving;

        // 当前动作的开始：最近一次 静止→运动 的切换
        let start = (1..=frame).rev().find(|&i| moving(i) && !moving(i - 1)).unwrap_or(0);

        // 当前动作的结束：下一次 静止→运动 切换的前一帧
        let end = (frame..count - 1)
            .find(|&i| !moving(i) && moving(i + 1))
            .map(|i| i as f32 * self.interval)
            .unwrap_or(count as f32 * self.interval);

        // 关键帧：运动区间的最后一帧
        let key = if moving(frame) {
            (frame..count - 1).find(|&i| !moving(i + 1)).unwrap_or(count - 1)
        } else {
            (0..=frame).rev().find(|&i| moving(i)).unwrap_or(frame)
        };

        Some(MovementInterval {
            start: start as f32 * self.interval,
            key: key as f32 * self.interval,
            end,
        })
    }
}

/// 前后 radius 帧的滑动平均；窗口不完整的边界帧保持原值
pub fn smooth(raw: &[f32], radius: usize) -> Vec<f32> {
    let mut smoothed = raw.to_vec();
    let width = (2 * radius + 1) as f32;
    for i in radius..raw.len().saturating_sub(radius) {
        smoothed[i] = raw[i - radius..=i + radius].iter().sum::<f32>() / width;
    }
    smoothed
}

/// 前向差分：diff[i] = s[i+1] - s[i]
pub fn derivative(values: &[f32]) -> Vec<f32> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

fn sign(value: f32) -> i8 {
    if value.abs() < FLAT_DERIVATIVE {
        0
    } else if value > 0.0 {
        1
    } else {
        -1
    }
}

/// 由导数符号变化检测极值
///
/// 之后 `neighborhood` 个导数样本不得回到原来的符号，
/// 且与上一个极值至少相隔 `min_spacing` 帧。
pub fn detect_extrema(diff: &[f32], values: &[f32], neighborhood: usize, min_spacing: usize) -> Vec<Extremum> {
    let mut extrema: Vec<Extremum> = Vec::new();
    let mut previous_sign = 0_i8;

    for i in 0..diff.len() {
        let current = sign(diff[i]);
        if current == 0 {
            continue;
        }

        if previous_sign != 0 && current != previous_sign {
            let consistent = diff
                .iter()
                .skip(i + 1)
                .take(neighborhood)
                .all(|&d| sign(d) != previous_sign);
            let spaced = extrema.last().map_or(true, |e| i - e.frame >= min_spacing);

            if consistent && spaced {
                extrema.push(Extremum {
                    frame: i,
                    kind: if previous_sign > 0 {
                        ExtremumKind::Peak
                    } else {
                        ExtremumKind::Valley
                    },
                    value: values.get(i).copied().unwrap_or(0.0),
                });
            }
        }

        previous_sign = current;
    }

    extrema
}

/// 全局阈值：基线 + mix × (参考均值 - 基线)
pub fn activity_threshold(raw: &[f32], config: &DeformConfig) -> f32 {
    if raw.is_empty() {
        return config.min_activity_threshold;
    }

    let mut sorted = raw.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let index = ((sorted.len() - 1) as f32 * config.baseline_percentile.clamp(0.0, 1.0)).round() as usize;
    let baseline = sorted[index.min(sorted.len() - 1)];

    let reference = match config.threshold_reference {
        ThresholdReference::AllFrames => raw.iter().sum::<f32>() / raw.len() as f32,
        ThresholdReference::AboveBaseline => {
            let above: Vec<f32> = raw.iter().copied().filter(|&v| v > baseline).collect();
            if above.is_empty() {
                baseline
            } else {
                above.iter().sum::<f32>() / above.len() as f32
            }
        }
    };

    (baseline + config.threshold_mix * (reference - baseline)).max(config.min_activity_threshold)
}

/// 滞回判定：高于 enter × T 进入运动，低于 exit × T 退出
pub fn hysteresis(smoothed: &[f32], threshold: f32, enter: f32, exit: f32) -> Vec<bool> {
    let mut moving = false;
    smoothed
        .iter()
        .map(|&value| {
            if !moving && value > enter * threshold {
                moving = true;
            } else if moving && value < exit * threshold {
                moving = false;
            }
            moving
        })
        .collect()
}

/// 由极值得到逐帧阈值；没有可用的 (极小值, 极大值) 对时返回 None
pub fn extrema_thresholds(smoothed: &[f32], extrema: &[Extremum], fraction: f32) -> Option<Vec<f32>> {
    // 每个极大值与其前面最近的极小值配对
    let mut pairs: Vec<(usize, f32)> = Vec::new();
    let mut last_valley: Option<f32> = None;
    for extremum in extrema {
        match extremum.kind {
            ExtremumKind::Valley => last_valley = Some(extremum.value),
            ExtremumKind::Peak => {
                if let Some(valley) = last_valley {
                    pairs.push((extremum.frame, valley + (extremum.value - valley) * fraction));
                }
            }
        }
    }

    let first = pairs.first()?.1;
    let thresholds = (0..smoothed.len())
        .map(|i| {
            pairs
                .iter()
                .rev()
                .find(|(peak_frame, _)| *peak_frame <= i)
                .map_or(first, |(_, threshold)| *threshold)
        })
        .collect();
    Some(thresholds)
}

/// 连续运动帧区间
pub fn movement_runs(moving: &[bool]) -> Vec<MovementRun> {
    let mut runs = Vec::new();
    let mut start = None;
    for (i, &m) in moving.iter().enumerate() {
        match (m, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                runs.push(MovementRun { start: s, end: i - 1 });
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push(MovementRun {
            start: s,
            end: moving.len() - 1,
        });
    }
    runs
}

/// 合并两段运动之间短于 max_gap 帧的静止间隙
pub fn close_gaps(moving: &mut [bool], max_gap: usize) {
    let runs = movement_runs(moving);
    for pair in runs.windows(2) {
        let gap = pair[1].start - pair[0].end - 1;
        if gap < max_gap {
            moving[pair[0].end + 1..pair[1].start].fill(true);
        }
    }
}

/// 去掉短于 min_len 帧的运动区间
pub fn remove_short_runs(moving: &mut [bool], min_len: usize) {
    for run in movement_runs(moving) {
        if run.frame_count() < min_len {
            moving[run.start..=run.end].fill(false);
        }
    }
}
