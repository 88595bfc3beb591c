//! 动作变形模块
//!
//! 分段、时间扭曲、动作扭曲、混合与根偏移累积，由 `DeformationSession` 串联。

mod blend;
mod cumulative;
mod model_param;
mod motion_warp;
mod params;
mod segmentation;
mod session;
mod time_warp;

pub use blend::{apply_motion_deformation, posture_warping};
pub use cumulative::{CumulativeOffset, CumulativeOffsetCache};
pub use model_param::ModelParam;
pub use motion_warp::{
    deform_by_position, deform_by_velocity, deform_key_pose, resolve_motion_warp, BlendDurations,
    DeformContext, EffectorEdit, MotionWarpingParam,
};
pub use params::{sharpness_from_kire, Amplitude, DeformParams};
pub use segmentation::{
    DistanceParam, Extremum, ExtremumKind, MovementInterval, MovementRun, Segmentation,
    SegmentationStats,
};
pub use session::{DeformationSession, DeformedFrame};
pub use time_warp::{apply_time_warping, resolve_time_warp, TimeWarpingParam};
