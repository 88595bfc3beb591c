//! 动作变形配置
//!
//! 所有参数扁平化，默认值即为分段结果可复现所依赖的常量。
//! 配置由调用方持有并显式传入，不使用全局状态。

/// 动作阈值的计算方式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThresholdMode {
    /// 全局基线 + 滞回（默认）
    Hysteresis,
    /// 由前一组极大值/极小值插值得到逐帧阈值
    Extrema,
}

/// 滞回阈值中参考均值的取法
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThresholdReference {
    /// 高于基线的活动量的均值（默认）
    AboveBaseline,
    /// 全部帧活动量的均值
    AllFrames,
}

/// 关键姿势的变形方式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeformStrategy {
    /// 按关节角速度外推（默认）
    Velocity,
    /// 按末端位移外推并用 CCD IK 求解
    Position,
}

/// 动作变形配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct DeformConfig {
    // ========== 动作分段 ==========
    /// 平滑窗口半径（帧），默认 10（前后各 10 帧）
    pub smoothing_radius: usize,
    /// 极值判定时要求导数符号一致的邻域（帧），默认 2
    pub extrema_neighborhood: usize,
    /// 相邻极值的最小间隔（帧），默认 5
    pub extrema_min_spacing: usize,
    /// 极值模式下阈值位于极小值到极大值之间的比例，默认 0.2
    pub extrema_threshold_fraction: f32,
    /// 阈值计算方式，默认滞回
    pub threshold_mode: ThresholdMode,
    /// 基线所用的百分位，默认 0.2
    pub baseline_percentile: f32,
    /// 阈值 = 基线 + 此值 × (参考均值 - 基线)，默认 0.5
    pub threshold_mix: f32,
    /// 参考均值的取法，默认只统计高于基线的帧
    pub threshold_reference: ThresholdReference,
    /// 进入"运动"状态的倍率，默认 1.2
    pub hysteresis_enter: f32,
    /// 退出"运动"状态的倍率，默认 0.8
    pub hysteresis_exit: f32,
    /// 阈值下限，默认 1e-5
    pub min_activity_threshold: f32,
    /// 短于此帧数的静止间隙会被合并，默认 5
    pub gap_close_frames: usize,
    /// 短于此帧数的运动区间会被丢弃，默认 5
    pub min_run_frames: usize,

    // ========== 时间扭曲 ==========
    /// 缓动曲线控制点 1 (x1, y1)
    pub bezier_x1: f32,
    pub bezier_y1: f32,
    /// 缓动曲线控制点 2 (x2, y2)
    pub bezier_x2: f32,
    pub bezier_y2: f32,
    /// 二分法最大迭代次数，默认 20
    pub bisection_iterations: u32,
    /// 二分法容差，默认 1e-6
    pub bisection_tolerance: f32,

    // ========== 动作扭曲 ==========
    /// 关键姿势变形方式，默认角速度
    pub strategy: DeformStrategy,
    /// CCD 最大迭代次数，默认 16
    pub ik_iterations: u32,
    /// CCD 收敛距离，默认 1e-4
    pub ik_tolerance: f32,
    /// 幅度参数变化超过此值时清空累积偏移缓存，默认 0.001
    pub amplitude_epsilon: f32,

    // ========== 调试 ==========
    /// 是否逐帧输出调试日志，默认 false
    pub debug_log: bool,
}

impl Default for DeformConfig {
    fn default() -> Self {
        Self {
            // ====== 动作分段 ======
            // 平滑窗口越大，噪声越少，但区间边界延迟越大
            smoothing_radius: 10,
            extrema_neighborhood: 2,
            extrema_min_spacing: 5,
            extrema_threshold_fraction: 0.2,
            threshold_mode: ThresholdMode::Hysteresis,
            baseline_percentile: 0.2,
            threshold_mix: 0.5,
            // 静止帧占多数时全体均值会贴近基线，阈值过低
            threshold_reference: ThresholdReference::AboveBaseline,
            // 进入/退出使用不同倍率，避免在阈值附近来回抖动
            hysteresis_enter: 1.2,
            hysteresis_exit: 0.8,
            min_activity_threshold: 1e-5,
            gap_close_frames: 5,
            min_run_frames: 5,

            // ====== 时间扭曲 ======
            // (0,0)-(0.05,0)-(0.95,1)-(1,1)：两端缓入缓出
            bezier_x1: 0.05,
            bezier_y1: 0.0,
            bezier_x2: 0.95,
            bezier_y2: 1.0,
            bisection_iterations: 20,
            bisection_tolerance: 1e-6,

            // ====== 动作扭曲 ======
            strategy: DeformStrategy::Velocity,
            ik_iterations: 16,
            ik_tolerance: 1e-4,
            amplitude_epsilon: 0.001,

            // ====== 调试 ======
            debug_log: false,
        }
    }
}
