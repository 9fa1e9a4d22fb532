//! Ragdoll rig: segments, joints and derived shape data
//!
//! The rig owns the body and constraint handles of one character. Animators
//! never own segments; they borrow the rig and mutate bodies through the
//! physics engine.

mod part;
mod pose;
mod spec;

use std::collections::BTreeMap;

use glam::Vec2;
use thiserror::Error;

use crate::physics::{
    BodyDesc, BodyId, BodyMode, CollisionMask, ConstraintDesc, ConstraintId, PhysicsEngine, Shape,
};

pub use part::Part;
pub use pose::{Pose, PoseTarget};
pub use spec::{JointSpec, RigSpec, SegmentSpec};

/// Torso-relative offsets keyed by part
pub type Offsets = BTreeMap<Part, Vec2>;

#[derive(Debug, Error, PartialEq)]
pub enum RigError {
    #[error("rig has no {0} segment to use as reference")]
    MissingReference(Part),

    #[error("segment {0} is defined more than once")]
    DuplicateSegment(Part),

    #[error("joint {parent} -> {child} names missing segment {missing}")]
    UnknownJointSegment {
        parent: Part,
        child: Part,
        missing: Part,
    },
}

/// One rigid body of the ragdoll
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub part: Part,
    pub body: BodyId,
    pub shape: Shape,
    /// Torso-relative offset in the spawn layout
    pub spawn_offset: Vec2,
    /// Air drag the segment was created with
    pub linear_damping: f32,
}

impl Segment {
    pub fn half_extents(&self) -> Vec2 {
        self.shape.half_extents()
    }
}

/// Persistent constraint between two segments
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Joint {
    pub parent: Part,
    pub child: Part,
    pub constraint: ConstraintId,
}

/// World transform of a segment, for renderers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentTransform {
    pub part: Part,
    pub position: Vec2,
    pub angle: f32,
}

#[derive(Debug, Clone)]
pub struct Rig {
    segments: BTreeMap<Part, Segment>,
    joints: Vec<Joint>,
    collision: CollisionMask,
}

impl Rig {
    /// Segment every offset is measured from
    pub const REFERENCE: Part = Part::Torso;

    /// Create bodies and joints for `spec` with the torso at `origin`
    pub fn spawn(
        physics: &mut dyn PhysicsEngine,
        spec: &RigSpec,
        origin: Vec2,
    ) -> Result<Self, RigError> {
        let mut seen = BTreeMap::new();
        for segment in &spec.segments {
            if seen.insert(segment.part, segment).is_some() {
                return Err(RigError::DuplicateSegment(segment.part));
            }
        }
        if !seen.contains_key(&Self::REFERENCE) {
            return Err(RigError::MissingReference(Self::REFERENCE));
        }
        for joint in &spec.joints {
            for end in [joint.parent, joint.child] {
                if !seen.contains_key(&end) {
                    return Err(RigError::UnknownJointSegment {
                        parent: joint.parent,
                        child: joint.child,
                        missing: end,
                    });
                }
            }
        }

        let collision = CollisionMask::ragdoll();
        let mut segments = BTreeMap::new();
        for (part, def) in seen.iter() {
            let desc = BodyDesc::new(origin + def.offset, BodyMode::Dynamic)
                .with_shape(def.shape)
                .with_material(def.density, def.friction, def.restitution)
                .with_damping(def.linear_damping)
                .with_collision(collision);
            let body = physics.create_body(&desc);
            segments.insert(
                *part,
                Segment {
                    part: *part,
                    body,
                    shape: def.shape,
                    spawn_offset: def.offset,
                    linear_damping: def.linear_damping,
                },
            );
        }

        let mut joints = Vec::with_capacity(spec.joints.len());
        for def in &spec.joints {
            let (parent, child) = (&segments[&def.parent], &segments[&def.child]);
            let constraint = physics.create_constraint(&ConstraintDesc {
                body_a: parent.body,
                body_b: child.body,
                anchor_a: def.pivot - parent.spawn_offset,
                anchor_b: def.pivot - child.spawn_offset,
                stiffness: def.stiffness,
                damping: def.damping,
                rest_length: def.rest_length,
            });
            joints.push(Joint {
                parent: def.parent,
                child: def.child,
                constraint,
            });
        }

        log::debug!(
            "Spawned rig with {} segments and {} joints at ({:.1}, {:.1})",
            segments.len(),
            joints.len(),
            origin.x,
            origin.y
        );

        Ok(Self {
            segments,
            joints,
            collision,
        })
    }

    /// Put every segment back into the spawn layout around `origin`, at rest
    /// and under physics control. Joints are kept.
    pub fn respawn(&self, physics: &mut dyn PhysicsEngine, origin: Vec2) {
        for segment in self.segments.values() {
            physics.set_body_mode(segment.body, BodyMode::Dynamic);
            physics.set_position(segment.body, origin + segment.spawn_offset);
            physics.set_angle(segment.body, 0.0);
            physics.halt(segment.body);
            physics.set_collision_mask(segment.body, self.collision);
            physics.set_linear_damping(segment.body, segment.linear_damping);
        }
    }

    /// Remove joints, then bodies
    pub fn despawn(self, physics: &mut dyn PhysicsEngine) {
        for joint in &self.joints {
            physics.destroy_constraint(joint.constraint);
        }
        for segment in self.segments.values() {
            physics.destroy_body(segment.body);
        }
    }

    pub fn segment(&self, part: Part) -> Option<&Segment> {
        self.segments.get(&part)
    }

    pub fn segments(&self) -> impl Iterator<Item = &Segment> + '_ {
        self.segments.values()
    }

    pub fn parts(&self) -> impl Iterator<Item = Part> + '_ {
        self.segments.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    /// Collision mask segments use under normal physics
    pub fn collision(&self) -> CollisionMask {
        self.collision
    }

    /// Which part owns `body`, if any
    pub fn part_of(&self, body: BodyId) -> Option<Part> {
        self.segments
            .values()
            .find(|segment| segment.body == body)
            .map(|segment| segment.part)
    }

    /// Body handle of a part
    pub fn body(&self, part: Part) -> Option<BodyId> {
        self.segments.get(&part).map(|segment| segment.body)
    }

    /// Current world position of the reference segment
    pub fn reference_position(&self, physics: &dyn PhysicsEngine) -> Option<Vec2> {
        self.body(Self::REFERENCE)
            .and_then(|body| physics.position(body))
    }

    /// Every segment's world position minus the torso's world position
    pub fn compute_local_offsets(&self, physics: &dyn PhysicsEngine) -> Offsets {
        let Some(base) = self.reference_position(physics) else {
            return Offsets::new();
        };
        self.segments
            .values()
            .filter_map(|segment| {
                physics
                    .position(segment.body)
                    .map(|position| (segment.part, position - base))
            })
            .collect()
    }

    /// Move every segment listed in `offsets` to `base + offset`.
    /// Segments without an offset are left alone.
    pub fn place(&self, physics: &mut dyn PhysicsEngine, base: Vec2, offsets: &Offsets) {
        for segment in self.segments.values() {
            if let Some(offset) = offsets.get(&segment.part) {
                physics.set_position(segment.body, base + *offset);
            }
        }
    }

    /// Shift every segment by `delta`
    pub fn translate(&self, physics: &mut dyn PhysicsEngine, delta: Vec2) {
        for segment in self.segments.values() {
            if let Some(position) = physics.position(segment.body) {
                physics.set_position(segment.body, position + delta);
            }
        }
    }

    /// Write angles for the listed parts, skipping parts the rig lacks
    pub fn set_angles<I>(&self, physics: &mut dyn PhysicsEngine, angles: I)
    where
        I: IntoIterator<Item = (Part, f32)>,
    {
        for (part, angle) in angles {
            if let Some(segment) = self.segments.get(&part) {
                physics.set_angle(segment.body, angle);
                physics.set_angular_velocity(segment.body, 0.0);
            }
        }
    }

    pub fn zero_velocities(&self, physics: &mut dyn PhysicsEngine) {
        for segment in self.segments.values() {
            physics.halt(segment.body);
        }
    }

    /// Switch every segment to `mode`. Partial switches tear joints, so this
    /// always applies to the whole rig.
    pub fn set_mode(&self, physics: &mut dyn PhysicsEngine, mode: BodyMode) {
        for segment in self.segments.values() {
            physics.set_body_mode(segment.body, mode);
        }
    }

    pub fn set_collision(&self, physics: &mut dyn PhysicsEngine, mask: CollisionMask) {
        for segment in self.segments.values() {
            physics.set_collision_mask(segment.body, mask);
        }
    }

    /// Segment hanging lowest below the base: largest `offset.y + half height`
    pub fn lowest(&self, offsets: &Offsets) -> Option<(Part, f32)> {
        self.segments
            .values()
            .filter_map(|segment| {
                offsets
                    .get(&segment.part)
                    .map(|offset| (segment.part, offset.y + segment.half_extents().y))
            })
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Base y at which the lowest segment's bottom rests on `ground_y`
    pub fn ground_base_y(&self, offsets: &Offsets, ground_y: f32) -> Option<f32> {
        self.lowest(offsets).map(|(_, reach)| ground_y - reach)
    }

    /// Position and angle of every segment
    pub fn transforms(&self, physics: &dyn PhysicsEngine) -> Vec<SegmentTransform> {
        self.segments
            .values()
            .filter_map(|segment| {
                Some(SegmentTransform {
                    part: segment.part,
                    position: physics.position(segment.body)?,
                    angle: physics.angle(segment.body)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::SandboxWorld;

    fn spawn(world: &mut SandboxWorld) -> Rig {
        Rig::spawn(world, &RigSpec::humanoid(), Vec2::new(400.0, 50.0)).unwrap()
    }

    #[test]
    fn test_spawn_creates_bodies_and_joints() {
        let mut world = SandboxWorld::weightless();
        let rig = spawn(&mut world);

        assert_eq!(rig.len(), 14);
        assert_eq!(rig.joints().len(), 13);
        assert_eq!(world.body_count(), 14);
        assert_eq!(world.constraint_count(), 13);
        assert_eq!(
            rig.reference_position(&world),
            Some(Vec2::new(400.0, 50.0))
        );
    }

    #[test]
    fn test_spawn_rejects_bad_specs() {
        let mut world = SandboxWorld::weightless();
        let origin = Vec2::ZERO;

        let mut duplicate = RigSpec::humanoid();
        duplicate.segments.push(duplicate.segments[0].clone());
        assert_eq!(
            Rig::spawn(&mut world, &duplicate, origin).unwrap_err(),
            RigError::DuplicateSegment(Part::Head)
        );

        let mut headless = RigSpec::humanoid();
        headless.segments.retain(|s| s.part != Part::Head);
        assert!(matches!(
            Rig::spawn(&mut world, &headless, origin),
            Err(RigError::UnknownJointSegment {
                missing: Part::Head,
                ..
            })
        ));

        let no_torso = RigSpec::humanoid().without(&[Part::Torso]);
        assert_eq!(
            Rig::spawn(&mut world, &no_torso, origin).unwrap_err(),
            RigError::MissingReference(Part::Torso)
        );
    }

    #[test]
    fn test_local_offsets_match_spawn_layout() {
        let mut world = SandboxWorld::weightless();
        let rig = spawn(&mut world);
        let offsets = rig.compute_local_offsets(&world);

        for segment in rig.segments() {
            assert!((offsets[&segment.part] - segment.spawn_offset).length() < 1e-4);
        }
    }

    #[test]
    fn test_offsets_round_trip() {
        let mut world = SandboxWorld::weightless();
        let rig = spawn(&mut world);
        // Scramble the layout a little
        rig.translate(&mut world, Vec2::new(13.0, -7.0));
        if let Some(hand) = rig.body(Part::LeftHand) {
            world.set_position(hand, Vec2::new(300.0, 90.0));
        }

        let before: Vec<_> = rig.transforms(&world);
        let offsets = rig.compute_local_offsets(&world);
        let base = rig.reference_position(&world).unwrap();
        rig.place(&mut world, base, &offsets);

        for (a, b) in before.iter().zip(rig.transforms(&world)) {
            assert!((a.position - b.position).length() < 1e-4, "{}", a.part);
        }
    }

    #[test]
    fn test_ground_base_uses_lowest_segment() {
        let mut world = SandboxWorld::weightless();
        let rig = spawn(&mut world);
        let offsets = rig.compute_local_offsets(&world);

        let (part, reach) = rig.lowest(&offsets).unwrap();
        assert!(matches!(part, Part::LeftFoot | Part::RightFoot));
        assert!((reach - 32.5).abs() < 1e-4);
        assert!((rig.ground_base_y(&offsets, 560.0).unwrap() - 527.5).abs() < 1e-4);
    }

    #[test]
    fn test_respawn_restores_layout_and_mode() {
        let mut world = SandboxWorld::weightless();
        let rig = spawn(&mut world);
        rig.set_mode(&mut world, BodyMode::Kinematic);
        rig.set_collision(&mut world, rig.collision().disabled());
        rig.translate(&mut world, Vec2::new(-200.0, 300.0));

        rig.respawn(&mut world, Vec2::new(400.0, 50.0));

        for segment in rig.segments() {
            assert_eq!(world.body_mode(segment.body), Some(BodyMode::Dynamic));
            assert_eq!(world.collision_mask(segment.body), Some(CollisionMask::ragdoll()));
            assert_eq!(
                world.position(segment.body),
                Some(Vec2::new(400.0, 50.0) + segment.spawn_offset)
            );
        }
    }

    #[test]
    fn test_partial_rig_skips_missing_parts() {
        let mut world = SandboxWorld::weightless();
        let spec = RigSpec::humanoid().without(&[Part::LeftHand, Part::RightHand]);
        let rig = Rig::spawn(&mut world, &spec, Vec2::ZERO).unwrap();

        rig.set_angles(&mut world, [(Part::LeftHand, 1.0), (Part::Head, 0.5)]);
        assert_eq!(rig.body(Part::Head).and_then(|b| world.angle(b)), Some(0.5));
        assert_eq!(Pose::upright().validate(&rig), vec![Part::LeftHand, Part::RightHand]);
    }

    #[test]
    fn test_despawn_removes_everything() {
        let mut world = SandboxWorld::weightless();
        let rig = spawn(&mut world);
        rig.despawn(&mut world);
        assert_eq!(world.body_count(), 0);
        assert_eq!(world.constraint_count(), 0);
    }
}
