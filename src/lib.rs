//! # Tumble - a scripted ragdoll life cycle on 2D rigid-body physics
//!
//! A jointed ragdoll falls, lands, stands up, says its line, walks to a
//! ladder, climbs it and jumps off, forever. Posing is done by one of two
//! interchangeable animators: one that freezes the rig and writes transforms
//! directly, and one that drags spring-attached proxy targets around.

pub mod animation;
pub mod character;
pub mod config;
pub mod physics;
pub mod rig;
pub mod scheduler;
pub mod stage;

pub use config::StageConfig;
pub use stage::{Stage, StageError};

/// Common imports for internal use
pub mod prelude {
    pub use crate::animation::{AnimationEvent, AnimatorKind, PoseAnimator};
    pub use crate::character::{CharacterState, CharacterStateMachine, Notification};
    pub use crate::config::StageConfig;
    pub use crate::physics::{PhysicsEngine, RapierWorld, SandboxWorld};
    pub use crate::rig::{Part, Pose, Rig, RigSpec};
    pub use crate::stage::{Arena, Stage, StageError};
    pub use glam::Vec2;
}
