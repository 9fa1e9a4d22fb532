//! Pose presets: per-segment angle and torso-relative offset targets

use std::collections::BTreeMap;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::{Part, Rig};

/// Target for a single segment. Either field may be absent, in which case
/// the segment keeps its prior value for that channel.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PoseTarget {
    #[serde(default)]
    pub angle: Option<f32>,
    #[serde(default)]
    pub offset: Option<Vec2>,
}

impl PoseTarget {
    pub fn angle(angle: f32) -> Self {
        Self {
            angle: Some(angle),
            offset: None,
        }
    }

    pub fn full(angle: f32, offset: Vec2) -> Self {
        Self {
            angle: Some(angle),
            offset: Some(offset),
        }
    }
}

/// Immutable mapping from segment to target.
///
/// Unlisted segments keep their prior target. Segments the rig lacks are
/// skipped by every consumer; [`Pose::validate`] reports them up front.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pose {
    targets: BTreeMap<Part, PoseTarget>,
}

impl Pose {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, part: Part, target: PoseTarget) -> Self {
        self.targets.insert(part, target);
        self
    }

    /// Pose that only sets angles
    pub fn from_angles<I>(angles: I) -> Self
    where
        I: IntoIterator<Item = (Part, f32)>,
    {
        Self {
            targets: angles
                .into_iter()
                .map(|(part, angle)| (part, PoseTarget::angle(angle)))
                .collect(),
        }
    }

    /// Canonical standing pose of the humanoid
    pub fn upright() -> Self {
        let table: [(Part, f32, (f32, f32)); 14] = [
            (Part::Torso, 0.0, (0.0, 0.0)),
            (Part::Head, 0.0, (0.0, -8.0)),
            (Part::LeftUpperArm, 0.05, (-8.0, -2.0)),
            (Part::RightUpperArm, -0.05, (8.0, -2.0)),
            (Part::LeftForearm, 0.0, (-8.0, 6.0)),
            (Part::RightForearm, 0.0, (8.0, 6.0)),
            (Part::LeftHand, 0.0, (-8.0, 12.0)),
            (Part::RightHand, 0.0, (8.0, 12.0)),
            (Part::LeftThigh, 0.06, (-3.0, 14.0)),
            (Part::RightThigh, -0.06, (3.0, 14.0)),
            (Part::LeftShin, -0.03, (-3.0, 24.0)),
            (Part::RightShin, 0.03, (3.0, 24.0)),
            (Part::LeftFoot, 0.0, (-3.0, 31.0)),
            (Part::RightFoot, 0.0, (3.0, 31.0)),
        ];

        Self {
            targets: table
                .into_iter()
                .map(|(part, angle, (x, y))| (part, PoseTarget::full(angle, Vec2::new(x, y))))
                .collect(),
        }
    }

    pub fn target(&self, part: Part) -> Option<&PoseTarget> {
        self.targets.get(&part)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Part, &PoseTarget)> + '_ {
        self.targets.iter().map(|(part, target)| (*part, target))
    }

    /// Parts with an angle target
    pub fn angles(&self) -> impl Iterator<Item = (Part, f32)> + '_ {
        self.iter()
            .filter_map(|(part, target)| target.angle.map(|angle| (part, angle)))
    }

    /// Parts with an offset target
    pub fn offsets(&self) -> impl Iterator<Item = (Part, Vec2)> + '_ {
        self.iter()
            .filter_map(|(part, target)| target.offset.map(|offset| (part, offset)))
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Parts named by this pose that the rig does not have
    pub fn validate(&self, rig: &Rig) -> Vec<Part> {
        let missing: Vec<Part> = self
            .targets
            .keys()
            .copied()
            .filter(|part| rig.segment(*part).is_none())
            .collect();
        for part in &missing {
            log::warn!("Pose targets {} which this rig does not have, skipping", part);
        }
        missing
    }
}

impl FromIterator<(Part, PoseTarget)> for Pose {
    fn from_iter<T: IntoIterator<Item = (Part, PoseTarget)>>(iter: T) -> Self {
        Self {
            targets: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upright_covers_every_part() {
        let pose = Pose::upright();
        assert_eq!(pose.len(), Part::ALL.len());
        assert_eq!(pose.angles().count(), 14);
        assert_eq!(pose.offsets().count(), 14);
        assert_eq!(
            pose.target(Part::Torso).and_then(|t| t.offset),
            Some(Vec2::ZERO)
        );
    }

    #[test]
    fn test_upright_is_mirror_symmetric() {
        let pose = Pose::upright();
        for (part, target) in pose.iter() {
            let mirror = pose.target(part.mirrored()).unwrap();
            let (offset, mirror_offset) = (target.offset.unwrap(), mirror.offset.unwrap());
            assert_eq!(offset.x, -mirror_offset.x, "{}", part);
            assert_eq!(offset.y, mirror_offset.y, "{}", part);
        }
    }

    #[test]
    fn test_angle_only_pose() {
        let pose = Pose::from_angles([(Part::LeftThigh, 0.2), (Part::RightThigh, -0.2)]);
        assert_eq!(pose.offsets().count(), 0);
        assert_eq!(pose.target(Part::LeftThigh), Some(&PoseTarget::angle(0.2)));
        assert!(pose.target(Part::Head).is_none());
    }
}
