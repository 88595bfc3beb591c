//! 骨骼结构

use std::collections::HashMap;

use glam::Vec3;

use super::segment::{Joint, Segment};

/// 骨骼（体节 + 关节的层级结构）
///
/// 体节 0 为根体节；子节点总是排在父节点之后，
/// 因此按索引顺序遍历即可完成正向运动学。
#[derive(Clone, Debug)]
pub struct Skeleton {
    pub name: String,
    segments: Vec<Segment>,
    joints: Vec<Joint>,
    segment_name_to_index: HashMap<String, usize>,
    joint_name_to_index: HashMap<String, usize>,
}

impl Skeleton {
    /// 创建只有根体节的骨骼
    pub fn new(name: impl Into<String>, root_name: impl Into<String>) -> Self {
        let root = Segment::new(root_name);
        let mut segment_name_to_index = HashMap::new();
        segment_name_to_index.insert(root.name.clone(), 0);

        Self {
            name: name.into(),
            segments: vec![root],
            joints: Vec::new(),
            segment_name_to_index,
            joint_name_to_index: HashMap::new(),
        }
    }

    /// 添加子体节及连接它的关节，返回新体节的索引
    ///
    /// 关节与子体节同名。父体节索引越界时挂到根体节上。
    pub fn add_segment(&mut self, name: impl Into<String>, parent_segment: usize, offset: Vec3) -> usize {
        let name = name.into();
        let parent_segment = if parent_segment < self.segments.len() {
            parent_segment
        } else {
            0
        };

        let segment_index = self.segments.len();
        let joint_index = self.joints.len();

        let mut segment = Segment::new(name.clone());
        segment.parent_joint = Some(joint_index);
        self.segments.push(segment);
        self.segments[parent_segment].child_joints.push(joint_index);

        self.joints.push(Joint::new(name.clone(), parent_segment, segment_index, offset));

        self.segment_name_to_index.entry(name.clone()).or_insert(segment_index);
        self.joint_name_to_index.entry(name).or_insert(joint_index);

        segment_index
    }

    /// 设置末端位置
    pub fn set_site(&mut self, segment: usize, site: Vec3) {
        if let Some(seg) = self.segments.get_mut(segment) {
            seg.site = Some(site);
        }
    }

    /// 设置连接体节与其父体节的关节偏移
    pub fn set_joint_offset(&mut self, segment: usize, offset: Vec3) {
        let joint = self.segments.get(segment).and_then(|s| s.parent_joint);
        if let Some(joint) = joint.and_then(|j| self.joints.get_mut(j)) {
            joint.offset = offset;
        }
    }

    /// 获取体节数量
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// 获取关节数量
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn segment(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn joint(&self, index: usize) -> Option<&Joint> {
        self.joints.get(index)
    }

    /// 通过名称查找体节
    pub fn find_segment(&self, name: &str) -> Option<usize> {
        self.segment_name_to_index.get(name).copied()
    }

    /// 通过名称查找关节
    pub fn find_joint(&self, name: &str) -> Option<usize> {
        self.joint_name_to_index.get(name).copied()
    }

    /// 体节的父体节
    pub fn parent_segment(&self, segment: usize) -> Option<usize> {
        let joint = self.segments.get(segment)?.parent_joint?;
        self.joints.get(joint).map(|j| j.parent_segment)
    }

    /// 从体节向根方向依次经过的关节（不含 base 关节及其上方）
    ///
    /// 返回顺序为从靠近体节的关节到靠近根的关节。
    pub fn joint_chain(&self, segment: usize, base_joint: Option<usize>) -> Vec<usize> {
        let mut chain = Vec::new();
        let mut current = self.segments.get(segment).and_then(|s| s.parent_joint);

        while let Some(joint) = current {
            if Some(joint) == base_joint {
                break;
            }
            chain.push(joint);
            let parent = self.joints[joint].parent_segment;
            current = self.segments[parent].parent_joint;
        }

        chain
    }
}
