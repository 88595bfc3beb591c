//! BVH (Biovision Hierarchy) 文件读写
//!
//! 读取时接受任意通道顺序；写出时根节点使用
//! `Xposition Yposition Zposition Zrotation Xrotation Yrotation`，
//! 其余关节使用 `Zrotation Xrotation Yrotation`。

use std::fs;
use std::path::Path;
use std::sync::Arc;

use glam::{EulerRot, Quat, Vec3};

use super::Motion;
use crate::skeleton::{Posture, Skeleton};
use crate::{MotionError, Result};

/// BVH 通道
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Channel {
    Xposition,
    Yposition,
    Zposition,
    Xrotation,
    Yrotation,
    Zrotation,
}

impl Channel {
    /// 每个节点最多 6 个通道（3 位移 + 3 旋转）
    const MAX_PER_NODE: usize = 6;

    fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "xposition" => Some(Channel::Xposition),
            "yposition" => Some(Channel::Yposition),
            "zposition" => Some(Channel::Zposition),
            "xrotation" => Some(Channel::Xrotation),
            "yrotation" => Some(Channel::Yrotation),
            "zrotation" => Some(Channel::Zrotation),
            _ => None,
        }
    }

    fn is_position(self) -> bool {
        matches!(self, Channel::Xposition | Channel::Yposition | Channel::Zposition)
    }
}

/// 层级中的一个节点及其通道
#[derive(Clone, Debug)]
struct NodeChannels {
    segment: usize,
    channels: Vec<Channel>,
}

/// BVH 文件数据
#[derive(Clone, Debug)]
pub struct BvhFile {
    pub skeleton: Arc<Skeleton>,
    pub frames: Vec<Posture>,
    /// 帧间隔（秒）
    pub frame_time: f32,
}

impl BvhFile {
    /// 从文件加载 BVH
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "bvh".to_string());

        let bvh = Self::parse_named(&text, &name)?;
        log::info!(
            "BVH 加载完成: {} ({} 个体节, {} 帧, 帧间隔 {:.4}s)",
            path.display(),
            bvh.skeleton.segment_count(),
            bvh.frames.len(),
            bvh.frame_time
        );
        Ok(bvh)
    }

    /// 解析 BVH 文本
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_named(text, "bvh")
    }

    fn parse_named(text: &str, name: &str) -> Result<Self> {
        let mut tokens = Tokens::new(text);

        tokens.expect("HIERARCHY")?;
        tokens.expect("ROOT")?;
        let root_name = tokens.next()?;

        let mut skeleton = Skeleton::new(name, root_name);
        let mut nodes = Vec::new();
        let root_offset = parse_node(&mut tokens, &mut skeleton, 0, &mut nodes)?;

        tokens.expect("MOTION")?;
        tokens.expect("Frames:")?;
        let frame_count = tokens.next_usize()?;
        tokens.expect("Frame")?;
        tokens.expect("Time:")?;
        let frame_time = tokens.next_f32()?;
        if !frame_time.is_finite() || frame_time <= 0.0 {
            return Err(MotionError::BvhParse(format!("帧间隔无效: {}", frame_time)));
        }

        // 帧数来自文件头，先与剩余数据量核对再分配
        let values_per_frame: usize = nodes.iter().map(|n| n.channels.len()).sum();
        let remaining = tokens.remaining();
        let enough = frame_count
            .checked_mul(values_per_frame)
            .is_some_and(|needed| needed <= remaining);
        if !enough {
            return Err(MotionError::BvhParse(format!(
                "帧数 {} 与数据量不符（每帧 {} 个值，剩余 {} 个）",
                frame_count, values_per_frame, remaining
            )));
        }

        let skeleton = Arc::new(skeleton);
        let mut frames = Vec::with_capacity(frame_count);
        let mut ignored_translation = false;

        for frame_index in 0..frame_count {
            let mut posture = Posture::new(Arc::clone(&skeleton));

            for node in &nodes {
                let mut rotation = Quat::IDENTITY;
                let mut position = Vec3::ZERO;

                for &channel in &node.channels {
                    let value = tokens.next_f32().map_err(|_| {
                        MotionError::BvhParse(format!("第 {} 帧数据不足", frame_index))
                    })?;
                    match channel {
                        Channel::Xposition => position.x = value,
                        Channel::Yposition => position.y = value,
                        Channel::Zposition => position.z = value,
                        Channel::Xrotation => rotation *= Quat::from_rotation_x(value.to_radians()),
                        Channel::Yrotation => rotation *= Quat::from_rotation_y(value.to_radians()),
                        Channel::Zrotation => rotation *= Quat::from_rotation_z(value.to_radians()),
                    }
                }

                match skeleton.segment(node.segment).and_then(|s| s.parent_joint) {
                    None => {
                        posture.root_pos = root_offset + position;
                        posture.root_ori = rotation;
                    }
                    Some(joint) => {
                        if node.channels.iter().any(|c| c.is_position()) {
                            ignored_translation = true;
                        }
                        posture.joint_rotations[joint] = rotation;
                    }
                }
            }

            frames.push(posture);
        }

        if ignored_translation {
            log::warn!("BVH {} 中非根关节的位移通道已忽略", name);
        }

        Ok(Self {
            skeleton,
            frames,
            frame_time,
        })
    }

    /// 转换为动作
    pub fn into_motion(self, name: impl Into<String>) -> Result<Motion> {
        Motion::new(name, self.skeleton, self.frames, self.frame_time)
    }

    /// 从动作创建
    pub fn from_motion(motion: &Motion) -> Self {
        Self {
            skeleton: Arc::clone(motion.skeleton()),
            frames: motion.frames().to_vec(),
            frame_time: motion.interval(),
        }
    }

    /// 生成 BVH 文本
    pub fn to_bvh_string(&self) -> String {
        let mut out = String::new();
        let mut order = Vec::with_capacity(self.skeleton.segment_count());

        out.push_str("HIERARCHY\n");
        write_node(&mut out, &self.skeleton, 0, 0, &mut order);

        out.push_str("MOTION\n");
        out.push_str(&format!("Frames: {}\n", self.frames.len()));
        out.push_str(&format!("Frame Time: {:.6}\n", self.frame_time));

        for posture in &self.frames {
            let mut values: Vec<String> = Vec::with_capacity(order.len() * 3 + 3);
            for &segment in &order {
                let rotation = match self.skeleton.segment(segment).and_then(|s| s.parent_joint) {
                    None => {
                        let p = posture.root_pos;
                        values.extend([p.x, p.y, p.z].iter().map(|v| format!("{:.6}", v)));
                        posture.root_ori
                    }
                    Some(joint) => posture
                        .joint_rotations
                        .get(joint)
                        .copied()
                        .unwrap_or(Quat::IDENTITY),
                };
                let (z, x, y) = rotation.to_euler(EulerRot::ZXY);
                values.extend(
                    [z, x, y]
                        .iter()
                        .map(|v| format!("{:.6}", v.to_degrees())),
                );
            }
            out.push_str(&values.join(" "));
            out.push('\n');
        }

        out
    }

    /// 保存为 BVH 文件
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_bvh_string())?;
        log::info!("BVH 保存完成: {} ({} 帧)", path.display(), self.frames.len());
        Ok(())
    }
}

/// 解析 `{ OFFSET ... CHANNELS ... JOINT ... End Site ... }`，返回节点的 OFFSET
fn parse_node(
    tokens: &mut Tokens<'_>,
    skeleton: &mut Skeleton,
    segment: usize,
    nodes: &mut Vec<NodeChannels>,
) -> Result<Vec3> {
    tokens.expect("{")?;
    tokens.expect("OFFSET")?;
    let offset = tokens.next_vec3()?;

    tokens.expect("CHANNELS")?;
    let channel_count = tokens.next_usize()?;
    if channel_count > Channel::MAX_PER_NODE {
        return Err(MotionError::BvhParse(format!("通道数过多: {}", channel_count)));
    }
    let mut channels = Vec::with_capacity(channel_count);
    for _ in 0..channel_count {
        let token = tokens.next()?;
        let channel = Channel::parse(token)
            .ok_or_else(|| MotionError::BvhParse(format!("未知通道: {}", token)))?;
        channels.push(channel);
    }
    nodes.push(NodeChannels { segment, channels });

    loop {
        let token = tokens.next()?;
        match token {
            "JOINT" => {
                let name = tokens.next()?;
                // 先占位再递归，子节点的 OFFSET 在递归中读出
                let child = skeleton.add_segment(name, segment, Vec3::ZERO);
                let child_offset = parse_node(tokens, skeleton, child, nodes)?;
                skeleton.set_joint_offset(child, child_offset);
            }
            "End" => {
                tokens.expect("Site")?;
                tokens.expect("{")?;
                tokens.expect("OFFSET")?;
                let site = tokens.next_vec3()?;
                tokens.expect("}")?;
                skeleton.set_site(segment, site);
            }
            "}" => return Ok(offset),
            other => {
                return Err(MotionError::BvhParse(format!("意外的标记: {}", other)));
            }
        }
    }
}

/// 按深度优先顺序写出层级，并记录节点顺序
fn write_node(out: &mut String, skeleton: &Skeleton, segment: usize, depth: usize, order: &mut Vec<usize>) {
    let Some(seg) = skeleton.segment(segment) else {
        return;
    };
    let indent = "\t".repeat(depth);
    order.push(segment);

    match seg.parent_joint.and_then(|j| skeleton.joint(j)) {
        None => {
            out.push_str(&format!("ROOT {}\n{}{{\n", seg.name, indent));
            out.push_str(&format!("{}\tOFFSET 0.000000 0.000000 0.000000\n", indent));
            out.push_str(&format!(
                "{}\tCHANNELS 6 Xposition Yposition Zposition Zrotation Xrotation Yrotation\n",
                indent
            ));
        }
        Some(joint) => {
            out.push_str(&format!("{}JOINT {}\n{}{{\n", indent, seg.name, indent));
            out.push_str(&format!(
                "{}\tOFFSET {:.6} {:.6} {:.6}\n",
                indent, joint.offset.x, joint.offset.y, joint.offset.z
            ));
            out.push_str(&format!("{}\tCHANNELS 3 Zrotation Xrotation Yrotation\n", indent));
        }
    }

    for &child_joint in &seg.child_joints {
        if let Some(joint) = skeleton.joint(child_joint) {
            write_node(out, skeleton, joint.child_segment, depth + 1, order);
        }
    }

    if seg.child_joints.is_empty() || seg.site.is_some() {
        let site = seg.site.unwrap_or(Vec3::ZERO);
        out.push_str(&format!("{}\tEnd Site\n{}\t{{\n", indent, indent));
        out.push_str(&format!(
            "{}\t\tOFFSET {:.6} {:.6} {:.6}\n",
            indent, site.x, site.y, site.z
        ));
        out.push_str(&format!("{}\t}}\n", indent));
    }

    out.push_str(&format!("{}}}\n", indent));
}

/// 空白分隔的标记流
struct Tokens<'a> {
    inner: std::str::SplitWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            inner: text.split_whitespace(),
        }
    }

    fn next(&mut self) -> Result<&'a str> {
        self.inner
            .next()
            .ok_or_else(|| MotionError::BvhParse("文件意外结束".to_string()))
    }

    fn expect(&mut self, keyword: &str) -> Result<()> {
        let token = self.next()?;
        if token == keyword {
            Ok(())
        } else {
            Err(MotionError::BvhParse(format!("期望 {}，实际为 {}", keyword, token)))
        }
    }

    fn next_f32(&mut self) -> Result<f32> {
        let token = self.next()?;
        token
            .parse()
            .map_err(|_| MotionError::BvhParse(format!("无效的数值: {}", token)))
    }

    /// 剩余的词数
    fn remaining(&self) -> usize {
        self.inner.clone().count()
    }

    fn next_usize(&mut self) -> Result<usize> {
        let token = self.next()?;
        token
            .parse()
            .map_err(|_| MotionError::BvhParse(format!("无效的整数: {}", token)))
    }

    fn next_vec3(&mut self) -> Result<Vec3> {
        Ok(Vec3::new(self.next_f32()?, self.next_f32()?, self.next_f32()?))
    }
}
