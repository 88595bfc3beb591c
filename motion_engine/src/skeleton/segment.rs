//! 体节与关节

use glam::Vec3;

/// 体节（刚体部分，BVH 中的一个节点）
#[derive(Clone, Debug)]
pub struct Segment {
    pub name: String,
    /// 连接父体节的关节（根体节为 None）
    pub parent_joint: Option<usize>,
    /// 连接子体节的关节
    pub child_joints: Vec<usize>,
    /// 末端位置（BVH 的 End Site，相对本体节原点）
    pub site: Option<Vec3>,
}

impl Segment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_joint: None,
            child_joints: Vec::new(),
            site: None,
        }
    }

    /// 是否为根体节
    pub fn is_root(&self) -> bool {
        self.parent_joint.is_none()
    }
}

/// 关节（连接两个体节）
#[derive(Clone, Debug)]
pub struct Joint {
    pub name: String,
    pub parent_segment: usize,
    pub child_segment: usize,
    /// 关节在父体节坐标系中的位置
    pub offset: Vec3,
}

impl Joint {
    pub fn new(name: impl Into<String>, parent_segment: usize, child_segment: usize, offset: Vec3) -> Self {
        Self {
            name: name.into(),
            parent_segment,
            child_segment,
            offset,
        }
    }
}
