//! Physics engine capability interface
//!
//! The animation layer never talks to a concrete engine. It consumes the
//! [`PhysicsEngine`] capability set: bodies, constraints, transform and
//! velocity access, body mode switching, collision masks and contact events.
//!
//! Two engines implement it:
//! - [`RapierWorld`] - rapier2d-backed production engine
//! - [`SandboxWorld`] - small deterministic position-based engine for headless
//!   playback and tests

pub mod rapier;
pub mod sandbox;

use bitflags::bitflags;
use glam::Vec2;
use serde::{Deserialize, Serialize};

pub use rapier::RapierWorld;
pub use sandbox::SandboxWorld;

/// Opaque handle of a rigid body inside an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u64);

/// Opaque handle of a constraint inside an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintId(pub u64);

/// How the engine treats a body during integration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BodyMode {
    /// Integrated under forces, gravity and constraints
    #[default]
    Dynamic,
    /// Moved only by explicit transform writes (frozen for animation)
    Kinematic,
    /// Never moves (ground, walls)
    Fixed,
}

/// Collision shape, centered on the body origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    /// Axis-aligned (in body space) rectangle
    Rect { half_extents: Vec2 },
    /// Circle
    Circle { radius: f32 },
}

impl Shape {
    /// Half extents of the shape in body space
    pub fn half_extents(&self) -> Vec2 {
        match *self {
            Shape::Rect { half_extents } => half_extents,
            Shape::Circle { radius } => Vec2::splat(radius),
        }
    }

    /// Area used for mass computation
    pub fn area(&self) -> f32 {
        match *self {
            Shape::Rect { half_extents } => 4.0 * half_extents.x * half_extents.y,
            Shape::Circle { radius } => std::f32::consts::PI * radius * radius,
        }
    }
}

bitflags! {
    /// Collision categories
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CollisionGroups: u32 {
        const WORLD = 0b0001;
        const RAGDOLL = 0b0010;
        const LADDER = 0b0100;
        const PROXY = 0b1000;
    }
}

/// Membership + filter pair. Two bodies interact when each one's membership
/// intersects the other's filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionMask {
    pub memberships: CollisionGroups,
    pub filter: CollisionGroups,
}

impl CollisionMask {
    pub const fn new(memberships: CollisionGroups, filter: CollisionGroups) -> Self {
        Self {
            memberships,
            filter,
        }
    }

    /// Static scenery: collides with the ragdoll
    pub const fn world() -> Self {
        Self::new(CollisionGroups::WORLD, CollisionGroups::RAGDOLL)
    }

    /// Ragdoll segment: collides with scenery and the ladder, not with itself
    pub const fn ragdoll() -> Self {
        Self::new(
            CollisionGroups::RAGDOLL,
            CollisionGroups::WORLD.union(CollisionGroups::LADDER),
        )
    }

    /// Ladder: reports touches with the ragdoll
    pub const fn ladder() -> Self {
        Self::new(CollisionGroups::LADDER, CollisionGroups::RAGDOLL)
    }

    /// Keeps membership, collides with nothing
    pub const fn disabled(self) -> Self {
        Self::new(self.memberships, CollisionGroups::empty())
    }

    pub fn interacts_with(&self, other: &CollisionMask) -> bool {
        self.memberships.intersects(other.filter) && other.memberships.intersects(self.filter)
    }
}

/// Everything needed to create a rigid body
#[derive(Debug, Clone, PartialEq)]
pub struct BodyDesc {
    pub position: Vec2,
    pub angle: f32,
    pub mode: BodyMode,
    /// `None` creates a body without a collider
    pub shape: Option<Shape>,
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
    /// Fraction of linear velocity removed per step (air drag)
    pub linear_damping: f32,
    pub collision: CollisionMask,
    /// Colliders flagged as sensors report contacts but never push back
    pub sensor: bool,
}

impl BodyDesc {
    pub fn new(position: Vec2, mode: BodyMode) -> Self {
        Self {
            position,
            angle: 0.0,
            mode,
            shape: None,
            density: 1.0,
            friction: 0.5,
            restitution: 0.0,
            linear_damping: 0.0,
            collision: CollisionMask::world(),
            sensor: false,
        }
    }

    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = Some(shape);
        self
    }

    pub fn with_angle(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }

    pub fn with_material(mut self, density: f32, friction: f32, restitution: f32) -> Self {
        self.density = density;
        self.friction = friction;
        self.restitution = restitution;
        self
    }

    pub fn with_damping(mut self, linear_damping: f32) -> Self {
        self.linear_damping = linear_damping;
        self
    }

    pub fn with_collision(mut self, collision: CollisionMask) -> Self {
        self.collision = collision;
        self
    }

    pub fn as_sensor(mut self) -> Self {
        self.sensor = true;
        self
    }
}

/// Spring constraint between two bodies.
///
/// `stiffness` and `damping` are normalized per-step fractions in `[0, 1]`:
/// a stiffness of 1 removes the whole positional error in a single step.
/// Engines translate them into their own units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintDesc {
    pub body_a: BodyId,
    pub body_b: BodyId,
    /// Anchor on body A in its local frame
    pub anchor_a: Vec2,
    /// Anchor on body B in its local frame
    pub anchor_b: Vec2,
    pub stiffness: f32,
    pub damping: f32,
    pub rest_length: f32,
}

/// Contact notification carrying the pair of involved bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactEvent {
    Started(BodyId, BodyId),
    Ended(BodyId, BodyId),
}

impl ContactEvent {
    pub fn bodies(&self) -> (BodyId, BodyId) {
        match *self {
            ContactEvent::Started(a, b) | ContactEvent::Ended(a, b) => (a, b),
        }
    }

    pub fn is_start(&self) -> bool {
        matches!(self, ContactEvent::Started(..))
    }

    /// Returns the other body if `body` is part of this contact
    pub fn other(&self, body: BodyId) -> Option<BodyId> {
        let (a, b) = self.bodies();
        if a == body {
            Some(b)
        } else if b == body {
            Some(a)
        } else {
            None
        }
    }
}

/// Capability set the animation layer requires from a rigid-body engine.
///
/// Getters return `None` for unknown handles. Setters on unknown handles are
/// precondition violations: engines log them and leave the world untouched.
pub trait PhysicsEngine {
    fn create_body(&mut self, desc: &BodyDesc) -> BodyId;
    fn destroy_body(&mut self, body: BodyId);

    fn create_constraint(&mut self, desc: &ConstraintDesc) -> ConstraintId;
    fn destroy_constraint(&mut self, constraint: ConstraintId);

    fn position(&self, body: BodyId) -> Option<Vec2>;
    fn angle(&self, body: BodyId) -> Option<f32>;
    fn linear_velocity(&self, body: BodyId) -> Option<Vec2>;
    fn angular_velocity(&self, body: BodyId) -> Option<f32>;

    fn set_position(&mut self, body: BodyId, position: Vec2);
    fn set_angle(&mut self, body: BodyId, angle: f32);
    fn set_linear_velocity(&mut self, body: BodyId, velocity: Vec2);
    fn set_angular_velocity(&mut self, body: BodyId, velocity: f32);

    fn body_mode(&self, body: BodyId) -> Option<BodyMode>;
    fn set_body_mode(&mut self, body: BodyId, mode: BodyMode);

    fn collision_mask(&self, body: BodyId) -> Option<CollisionMask>;
    fn set_collision_mask(&mut self, body: BodyId, mask: CollisionMask);

    fn linear_damping(&self, body: BodyId) -> Option<f32>;
    fn set_linear_damping(&mut self, body: BodyId, damping: f32);

    /// Advance the simulation by `dt` seconds
    fn step(&mut self, dt: f32);

    /// Contact starts/ends produced since the last call, in emission order
    fn drain_contact_events(&mut self) -> Vec<ContactEvent>;

    /// Zero both linear and angular velocity
    fn halt(&mut self, body: BodyId) {
        self.set_linear_velocity(body, Vec2::ZERO);
        self.set_angular_velocity(body, 0.0);
    }
}
