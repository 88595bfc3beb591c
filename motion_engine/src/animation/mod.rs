//! 动作数据、BVH 读写与缓动曲线

mod bezier;
mod bvh;
mod motion;

pub use bezier::BezierCurve;
pub use bvh::BvhFile;
pub use motion::Motion;
