//! 人体部位定位
//!
//! 按名称把骨骼中的体节/关节映射到固定的人体部位角色上。

use super::Skeleton;

/// 体节角色（顺序即幅度向量的下标顺序）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SegmentRole {
    RightFoot = 0,
    LeftFoot,
    RightHand,
    LeftHand,
    Pelvis,
    Chest,
    Head,
}

impl SegmentRole {
    pub const COUNT: usize = 7;

    pub const ALL: [SegmentRole; Self::COUNT] = [
        SegmentRole::RightFoot,
        SegmentRole::LeftFoot,
        SegmentRole::RightHand,
        SegmentRole::LeftHand,
        SegmentRole::Pelvis,
        SegmentRole::Chest,
        SegmentRole::Head,
    ];

    /// 四肢末端（参与活动量计算）
    pub const LIMB_ENDS: [SegmentRole; 4] = [
        SegmentRole::RightFoot,
        SegmentRole::LeftFoot,
        SegmentRole::RightHand,
        SegmentRole::LeftHand,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// 候选名称（首个为主名称，其余为别名）
    fn candidates(self) -> &'static [&'static str] {
        match self {
            SegmentRole::RightFoot => &["RightFoot", "RightAnkle", "RightToe"],
            SegmentRole::LeftFoot => &["LeftFoot", "LeftAnkle", "LeftToe"],
            SegmentRole::RightHand => &["RightHand", "RightWrist"],
            SegmentRole::LeftHand => &["LeftHand", "LeftWrist"],
            SegmentRole::Pelvis => &["Hips", "Pelvis", "Root"],
            SegmentRole::Chest => &["Spine3", "Chest", "Spine2", "Spine1", "Spine"],
            // 两者都存在时跟踪 Head；需要跟踪 Neck 时用 set_segment_by_name 覆盖
            SegmentRole::Head => &["Head", "Neck"],
        }
    }
}

/// 关节角色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JointRole {
    RightShoulder = 0,
    LeftShoulder,
    RightElbow,
    LeftElbow,
    RightWrist,
    LeftWrist,
    RightHip,
    LeftHip,
    RightKnee,
    LeftKnee,
    RightAnkle,
    LeftAnkle,
    Spine,
    Neck,
}

impl JointRole {
    pub const COUNT: usize = 14;

    pub const ALL: [JointRole; Self::COUNT] = [
        JointRole::RightShoulder,
        JointRole::LeftShoulder,
        JointRole::RightElbow,
        JointRole::LeftElbow,
        JointRole::RightWrist,
        JointRole::LeftWrist,
        JointRole::RightHip,
        JointRole::LeftHip,
        JointRole::RightKnee,
        JointRole::LeftKnee,
        JointRole::RightAnkle,
        JointRole::LeftAnkle,
        JointRole::Spine,
        JointRole::Neck,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    fn candidates(self) -> &'static [&'static str] {
        match self {
            JointRole::RightShoulder => &["RightArm", "RightShoulder", "RightUpArm"],
            JointRole::LeftShoulder => &["LeftArm", "LeftShoulder", "LeftUpArm"],
            JointRole::RightElbow => &["RightForeArm", "RightElbow", "RightLowArm"],
            JointRole::LeftElbow => &["LeftForeArm", "LeftElbow", "LeftLowArm"],
            JointRole::RightWrist => &["RightHand", "RightWrist"],
            JointRole::LeftWrist => &["LeftHand", "LeftWrist"],
            JointRole::RightHip => &["RightUpLeg", "RightHip", "RightThigh"],
            JointRole::LeftHip => &["LeftUpLeg", "LeftHip", "LeftThigh"],
            JointRole::RightKnee => &["RightLeg", "RightKnee", "RightShin"],
            JointRole::LeftKnee => &["LeftLeg", "LeftKnee", "LeftShin"],
            JointRole::RightAnkle => &["RightFoot", "RightAnkle"],
            JointRole::LeftAnkle => &["LeftFoot", "LeftAnkle"],
            JointRole::Spine => &["Spine", "Chest", "Back"],
            JointRole::Neck => &["Neck"],
        }
    }
}

/// 人体部位定位器
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BodyPartLocator {
    segments: [Option<usize>; SegmentRole::COUNT],
    joints: [Option<usize>; JointRole::COUNT],
}

impl BodyPartLocator {
    /// 按名称解析所有角色
    pub fn new(skeleton: &Skeleton) -> Self {
        let segment_names: Vec<&str> = skeleton.segments().iter().map(|s| s.name.as_str()).collect();
        let joint_names: Vec<&str> = skeleton.joints().iter().map(|j| j.name.as_str()).collect();

        let mut segments = [None; SegmentRole::COUNT];
        for role in SegmentRole::ALL {
            segments[role.index()] = resolve(&segment_names, role.candidates());
        }

        let mut joints = [None; JointRole::COUNT];
        for role in JointRole::ALL {
            joints[role.index()] = resolve(&joint_names, role.candidates());
        }

        // 骨盆找不到时使用根体节
        if segments[SegmentRole::Pelvis.index()].is_none() && skeleton.segment_count() > 0 {
            segments[SegmentRole::Pelvis.index()] = Some(0);
        }
        // 胸部找不到时使用头部的父体节
        if segments[SegmentRole::Chest.index()].is_none() {
            segments[SegmentRole::Chest.index()] = segments[SegmentRole::Head.index()]
                .and_then(|head| skeleton.parent_segment(head));
        }

        let unresolved = SegmentRole::ALL
            .iter()
            .filter(|r| segments[r.index()].is_none())
            .count()
            + JointRole::ALL.iter().filter(|r| joints[r.index()].is_none()).count();
        if unresolved > 0 {
            log::debug!("骨骼 {} 有 {} 个部位角色未解析", skeleton.name, unresolved);
        }

        Self { segments, joints }
    }

    /// 获取体节角色对应的体节索引
    pub fn segment(&self, role: SegmentRole) -> Option<usize> {
        self.segments[role.index()]
    }

    /// 获取关节角色对应的关节索引
    pub fn joint(&self, role: JointRole) -> Option<usize> {
        self.joints[role.index()]
    }

    /// 手动指定体节角色
    pub fn set_segment(&mut self, role: SegmentRole, segment: Option<usize>) {
        self.segments[role.index()] = segment;
    }

    /// 手动指定关节角色
    pub fn set_joint(&mut self, role: JointRole, joint: Option<usize>) {
        self.joints[role.index()] = joint;
    }

    /// 按名称指定体节角色，名称不存在时返回 false
    pub fn set_segment_by_name(&mut self, skeleton: &Skeleton, role: SegmentRole, name: &str) -> bool {
        match skeleton.find_segment(name) {
            Some(index) => {
                self.segments[role.index()] = Some(index);
                true
            }
            None => false,
        }
    }

    /// 按名称指定关节角色，名称不存在时返回 false
    pub fn set_joint_by_name(&mut self, skeleton: &Skeleton, role: JointRole, name: &str) -> bool {
        match skeleton.find_joint(name) {
            Some(index) => {
                self.joints[role.index()] = Some(index);
                true
            }
            None => false,
        }
    }
}

/// 依次尝试候选名称做子串匹配：先区分大小写，再忽略大小写
fn resolve(names: &[&str], candidates: &[&str]) -> Option<usize> {
    for candidate in candidates {
        if let Some(index) = names.iter().position(|n| n.contains(candidate)) {
            return Some(index);
        }
    }

    let lowered: Vec<String> = names.iter().map(|n| n.to_lowercase()).collect();
    for candidate in candidates {
        let candidate = candidate.to_lowercase();
        if let Some(index) = lowered.iter().position(|n| n.contains(&candidate)) {
            return Some(index);
        }
    }

    None
}
