//! Rig geometry as configuration data
//!
//! Segment sizes, masses and the joint table are plain data. The default
//! [`RigSpec::humanoid`] is a small 14-segment figure laid out around the
//! torso; any other layout (or a rig variant missing limbs) can be loaded
//! from RON.

use std::path::Path;

use anyhow::{Context, Result};
use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::{Part, Pose};
use crate::physics::Shape;

/// Geometry and material of one segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSpec {
    pub part: Part,
    pub shape: Shape,
    /// Spawn position relative to the torso
    pub offset: Vec2,
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
    /// Fraction of velocity lost per step while free falling
    pub linear_damping: f32,
}

/// Joint binding two segments at a shared pivot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointSpec {
    pub parent: Part,
    pub child: Part,
    /// Pivot in torso-relative spawn space; body anchors are derived from it
    pub pivot: Vec2,
    pub stiffness: f32,
    pub damping: f32,
    #[serde(default)]
    pub rest_length: f32,
}

/// Complete rig description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigSpec {
    pub segments: Vec<SegmentSpec>,
    pub joints: Vec<JointSpec>,
    /// Canonical standing pose used for settling
    pub upright: Pose,
}

const DENSITY: f32 = 1.0;
const FRICTION: f32 = 0.6;
const RESTITUTION: f32 = 0.1;
const AIR_DRAG: f32 = 0.02;
const JOINT_STIFFNESS: f32 = 0.9;
const JOINT_DAMPING: f32 = 0.1;

fn rect(part: Part, offset: (f32, f32), half: (f32, f32)) -> SegmentSpec {
    SegmentSpec {
        part,
        shape: Shape::Rect {
            half_extents: Vec2::new(half.0, half.1),
        },
        offset: Vec2::new(offset.0, offset.1),
        density: DENSITY,
        friction: FRICTION,
        restitution: RESTITUTION,
        linear_damping: AIR_DRAG,
    }
}

fn joint(parent: Part, child: Part, pivot: (f32, f32)) -> JointSpec {
    JointSpec {
        parent,
        child,
        pivot: Vec2::new(pivot.0, pivot.1),
        stiffness: JOINT_STIFFNESS,
        damping: JOINT_DAMPING,
        rest_length: 0.0,
    }
}

impl RigSpec {
    /// Default 14-segment humanoid, roughly 45 px tall, feet 31 px below the torso
    pub fn humanoid() -> Self {
        let mut head = rect(Part::Head, (0.0, -8.0), (3.0, 3.0));
        head.shape = Shape::Circle { radius: 3.0 };

        let segments = vec![
            head,
            rect(Part::Torso, (0.0, 0.0), (4.0, 6.0)),
            rect(Part::LeftUpperArm, (-8.0, -2.0), (1.5, 4.0)),
            rect(Part::RightUpperArm, (8.0, -2.0), (1.5, 4.0)),
            rect(Part::LeftForearm, (-8.0, 6.0), (1.5, 3.5)),
            rect(Part::RightForearm, (8.0, 6.0), (1.5, 3.5)),
            rect(Part::LeftHand, (-8.0, 12.0), (1.5, 2.0)),
            rect(Part::RightHand, (8.0, 12.0), (1.5, 2.0)),
            rect(Part::LeftThigh, (-3.0, 14.0), (2.0, 4.5)),
            rect(Part::RightThigh, (3.0, 14.0), (2.0, 4.5)),
            rect(Part::LeftShin, (-3.0, 24.0), (1.5, 4.5)),
            rect(Part::RightShin, (3.0, 24.0), (1.5, 4.5)),
            rect(Part::LeftFoot, (-3.0, 31.0), (3.0, 1.5)),
            rect(Part::RightFoot, (3.0, 31.0), (3.0, 1.5)),
        ];

        let joints = vec![
            joint(Part::Torso, Part::Head, (0.0, -5.0)),
            joint(Part::Torso, Part::LeftUpperArm, (-8.0, -6.0)),
            joint(Part::Torso, Part::RightUpperArm, (8.0, -6.0)),
            joint(Part::LeftUpperArm, Part::LeftForearm, (-8.0, 2.0)),
            joint(Part::RightUpperArm, Part::RightForearm, (8.0, 2.0)),
            joint(Part::LeftForearm, Part::LeftHand, (-8.0, 10.0)),
            joint(Part::RightForearm, Part::RightHand, (8.0, 10.0)),
            joint(Part::Torso, Part::LeftThigh, (-3.0, 9.5)),
            joint(Part::Torso, Part::RightThigh, (3.0, 9.5)),
            joint(Part::LeftThigh, Part::LeftShin, (-3.0, 19.0)),
            joint(Part::RightThigh, Part::RightShin, (3.0, 19.0)),
            joint(Part::LeftShin, Part::LeftFoot, (-3.0, 29.5)),
            joint(Part::RightShin, Part::RightFoot, (3.0, 29.5)),
        ];

        Self {
            segments,
            joints,
            upright: Pose::upright(),
        }
    }

    /// Copy of this spec without the given parts (and the joints touching them)
    pub fn without(&self, parts: &[Part]) -> Self {
        Self {
            segments: self
                .segments
                .iter()
                .filter(|s| !parts.contains(&s.part))
                .cloned()
                .collect(),
            joints: self
                .joints
                .iter()
                .filter(|j| !parts.contains(&j.parent) && !parts.contains(&j.child))
                .cloned()
                .collect(),
            upright: self.upright.clone(),
        }
    }

    pub fn segment(&self, part: Part) -> Option<&SegmentSpec> {
        self.segments.iter().find(|s| s.part == part)
    }

    /// Load a rig from a RON file
    pub fn from_ron_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read rig file {}", path.display()))?;
        ron::from_str(&text).with_context(|| format!("Failed to parse rig file {}", path.display()))
    }
}

impl Default for RigSpec {
    fn default() -> Self {
        Self::humanoid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_humanoid_has_all_parts_once() {
        let spec = RigSpec::humanoid();
        assert_eq!(spec.segments.len(), 14);
        for part in Part::ALL {
            assert_eq!(
                spec.segments.iter().filter(|s| s.part == part).count(),
                1,
                "{} should appear once",
                part
            );
        }
    }

    #[test]
    fn test_humanoid_matches_upright_offsets() {
        let spec = RigSpec::humanoid();
        for segment in &spec.segments {
            let target = spec.upright.target(segment.part).expect("upright covers every part");
            assert_eq!(target.offset, Some(segment.offset), "{}", segment.part);
        }
    }

    #[test]
    fn test_without_drops_joints() {
        let spec = RigSpec::humanoid().without(&[Part::LeftHand]);
        assert_eq!(spec.segments.len(), 13);
        assert!(spec
            .joints
            .iter()
            .all(|j| j.parent != Part::LeftHand && j.child != Part::LeftHand));
    }

    #[test]
    fn test_ron_round_trip() {
        let spec = RigSpec::humanoid();
        let text = ron::to_string(&spec).unwrap();
        let restored: RigSpec = ron::from_str(&text).unwrap();
        assert_eq!(restored, spec);
    }
}
