//! Motion Engine - BVH 动作变形引擎
//!
//! 根据少量表现参数（kire/锐度 与各部位的 furi/幅度）
//! 对捕获的骨骼动作进行时间与姿势上的变形：
//! - 骨骼、姿势、正向运动学与 CCD IK
//! - BVH 动作的读取与保存
//! - 末端部位活动量的动作分段
//! - 时间扭曲（贝塞尔缓动）
//! - 动作扭曲（关键姿势变形 + 四元数混合）
//! - 多段动作的根偏移累积

pub mod animation;
pub mod config;
pub mod deformation;
pub mod skeleton;

#[cfg(test)]
mod test_util;

pub use animation::{BezierCurve, BvhFile, Motion};
pub use config::{DeformConfig, DeformStrategy, ThresholdMode, ThresholdReference};
pub use deformation::{
    Amplitude, CumulativeOffset, CumulativeOffsetCache, DeformParams, DeformationSession,
    DeformedFrame, DistanceParam, ModelParam, MotionWarpingParam, Segmentation,
    TimeWarpingParam,
};
pub use skeleton::{
    BodyPartLocator, ForwardKinematics, IkSolver, JointRole, Posture, SegmentRole, Skeleton,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MotionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("BVH parse error: {0}")]
    BvhParse(String),

    #[error("Invalid motion: {0}")]
    InvalidMotion(String),
}

pub type Result<T> = std::result::Result<T, MotionError>;
