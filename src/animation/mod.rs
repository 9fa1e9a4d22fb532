//! Procedural posing of the ragdoll
//!
//! Two strategies share the [`PoseAnimator`] contract:
//! - [`DirectPoseAnimator`] freezes the rig and writes transforms itself
//! - [`TargetPoseAnimator`] keeps the rig dynamic and moves spring-attached
//!   proxy targets, letting the engine pull the segments along
//!
//! Animators never call back into their owner. Every procedure runs on the
//! animator's own [`Timers`](crate::scheduler::Timers) and reports completion
//! through the events returned by [`PoseAnimator::advance`].

pub mod direct;
pub mod gait;
pub mod target;
pub mod tween;

use std::fmt;
use std::str::FromStr;

use glam::Vec2;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::config::{DirectConfig, TargetConfig};
use crate::physics::PhysicsEngine;
use crate::rig::{Pose, Rig};

pub use direct::DirectPoseAnimator;
pub use gait::{ClimbReach, GaitCycle, StrideGait, StrollGait};
pub use target::TargetPoseAnimator;
pub use tween::{EaseType, SteppedTween};

/// Which posing strategy an animator implements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimatorKind {
    #[default]
    Direct,
    Target,
}

impl AnimatorKind {
    pub fn other(&self) -> Self {
        match self {
            AnimatorKind::Direct => AnimatorKind::Target,
            AnimatorKind::Target => AnimatorKind::Direct,
        }
    }
}

impl fmt::Display for AnimatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnimatorKind::Direct => write!(f, "direct"),
            AnimatorKind::Target => write!(f, "target"),
        }
    }
}

impl FromStr for AnimatorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "direct" => Ok(AnimatorKind::Direct),
            "target" | "spring" => Ok(AnimatorKind::Target),
            _ => Err(format!("Unknown animator: {} (expected direct or target)", s)),
        }
    }
}

/// Completion reported by [`PoseAnimator::advance`]. Each fires exactly
/// once per procedure, after its final tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationEvent {
    /// Upright (or any pose) tween reached its target
    TweenFinished,
    /// Gait playback crossed the marker
    MarkerReached,
    /// Climb reached the top of the ladder
    TopReached,
}

/// Stand up into the rig's upright pose, feet on the ground line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UprightPlan {
    pub duration_ms: u64,
    pub ground_y: f32,
    pub ease: EaseType,
}

/// Walk along the ground until the base crosses `marker_x`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkPlan {
    /// Pixels per second
    pub speed: f32,
    pub marker_x: f32,
    pub ground_y: f32,
}

/// Move onto the ladder, then climb until the torso is at or above `top_y`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimbPlan {
    pub ladder_x: f32,
    pub top_y: f32,
    pub rung_spacing: f32,
}

impl ClimbPlan {
    /// Vertical travel of one climb step
    pub fn step_height(&self) -> f32 {
        self.rung_spacing / 2.0
    }
}

/// Kick applied to every segment when jumping off the ladder
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaunchPlan {
    /// Instant displacement
    pub nudge: Vec2,
    /// Pixels per second
    pub velocity: Vec2,
    /// Angular velocity is drawn from `[-spin, spin]` per segment
    pub spin: f32,
}

/// Timer kinds shared by both animators. Starting a procedure cancels the
/// running one of the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Track {
    Tween,
    Gait,
    Approach,
    Climb,
}

/// Common contract of the posing strategies
pub trait PoseAnimator {
    fn kind(&self) -> AnimatorKind;

    /// Take the rig away from free physics (freeze, or attach proxies)
    fn take_control(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine);

    /// Stop everything and hand the rig back to physics. No-op when idle.
    fn release_control(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine);

    fn has_control(&self) -> bool;

    fn start_upright(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine, plan: &UprightPlan);

    fn start_walk(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine, plan: &WalkPlan);

    fn start_climb(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine, plan: &ClimbPlan);

    /// Cancel every running procedure without releasing control
    fn stop_all(&mut self);

    /// True while any procedure has a live timer
    fn is_animating(&self) -> bool;

    /// Run every tick due within the next `dt_ms`
    fn advance(
        &mut self,
        rig: &Rig,
        physics: &mut dyn PhysicsEngine,
        dt_ms: u64,
    ) -> Vec<AnimationEvent>;

    /// Throw the rig. Callers release control first.
    fn launch(
        &mut self,
        rig: &Rig,
        physics: &mut dyn PhysicsEngine,
        plan: &LaunchPlan,
        rng: &mut dyn RngCore,
    ) {
        launch_rig(rig, physics, plan, rng);
    }
}

/// Nudge every segment, give it the launch velocity and a random spin
pub fn launch_rig(
    rig: &Rig,
    physics: &mut dyn PhysicsEngine,
    plan: &LaunchPlan,
    rng: &mut dyn RngCore,
) {
    let spin = plan.spin.abs();
    for segment in rig.segments() {
        if let Some(position) = physics.position(segment.body) {
            physics.set_position(segment.body, position + plan.nudge);
        }
        physics.set_linear_velocity(segment.body, plan.velocity);
        let angular = if spin > 0.0 {
            rng.random_range(-spin..=spin)
        } else {
            0.0
        };
        physics.set_angular_velocity(segment.body, angular);
    }
}

/// Build an animator of the requested kind
pub fn build_animator(
    kind: AnimatorKind,
    direct: &DirectConfig,
    target: &TargetConfig,
    upright: &Pose,
) -> Box<dyn PoseAnimator> {
    match kind {
        AnimatorKind::Direct => Box::new(DirectPoseAnimator::new(direct.clone(), upright.clone())),
        AnimatorKind::Target => Box::new(TargetPoseAnimator::new(target.clone(), upright.clone())),
    }
}

/// Sign of travel from `from_x` toward `marker_x`
pub(crate) fn heading(from_x: f32, marker_x: f32) -> f32 {
    if marker_x < from_x {
        -1.0
    } else {
        1.0
    }
}

/// Whether `x` is at or past `marker_x` when travelling along `heading`
pub(crate) fn crossed(x: f32, marker_x: f32, heading: f32) -> bool {
    (x - marker_x) * heading >= 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::SandboxWorld;
    use crate::rig::RigSpec;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("Direct".parse::<AnimatorKind>(), Ok(AnimatorKind::Direct));
        assert_eq!("target".parse::<AnimatorKind>(), Ok(AnimatorKind::Target));
        assert!("ik".parse::<AnimatorKind>().is_err());
        assert_eq!(AnimatorKind::Direct.other(), AnimatorKind::Target);
    }

    #[test]
    fn test_crossing_in_both_directions() {
        let left = heading(400.0, 120.0);
        assert!(!crossed(121.0, 120.0, left));
        assert!(crossed(120.0, 120.0, left));

        let right = heading(10.0, 120.0);
        assert!(!crossed(119.0, 120.0, right));
        assert!(crossed(130.0, 120.0, right));
    }

    #[test]
    fn test_launch_is_seeded() {
        let run = |seed: u64| {
            let mut world = SandboxWorld::weightless();
            let rig = Rig::spawn(&mut world, &RigSpec::humanoid(), Vec2::new(50.0, 90.0)).unwrap();
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
            let plan = LaunchPlan {
                nudge: Vec2::new(6.0, -6.0),
                velocity: Vec2::new(240.0, -360.0),
                spin: 12.0,
            };
            launch_rig(&rig, &mut world, &plan, &mut rng);
            rig.segments()
                .map(|s| world.angular_velocity(s.body).unwrap())
                .collect::<Vec<_>>()
        };

        let first = run(7);
        assert_eq!(first, run(7));
        assert!(first.iter().all(|w| w.abs() <= 12.0));
        assert!(first.iter().any(|w| *w != 0.0));
    }
}
