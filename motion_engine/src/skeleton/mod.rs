//! 骨骼、姿势、正向运动学与 IK 求解器

mod body;
mod human_body;
mod ik_solver;
mod kinematics;
mod posture;
mod segment;

pub use body::Skeleton;
pub use human_body::{BodyPartLocator, JointRole, SegmentRole};
pub use ik_solver::IkSolver;
pub use kinematics::ForwardKinematics;
pub use posture::{slerp_shortest, Posture};
pub use segment::{Joint, Segment};
