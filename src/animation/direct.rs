//! Direct kinematic posing
//!
//! The rig is frozen (kinematic, at rest) and every tick writes positions
//! and angles straight onto the bodies. Nothing physical happens to the
//! segments while a procedure runs, so joints can never be torn by the
//! solver; they simply follow the scripted layout.

use glam::Vec2;

use super::gait::{ClimbReach, GaitCycle, StrollGait};
use super::tween::{lerp, EaseType, SteppedTween};
use super::{
    crossed, heading, AnimationEvent, AnimatorKind, ClimbPlan, PoseAnimator, Track, UprightPlan,
    WalkPlan,
};
use crate::config::DirectConfig;
use crate::physics::{BodyMode, PhysicsEngine};
use crate::rig::{Offsets, Part, Pose, Rig};
use crate::scheduler::Timers;

#[derive(Debug, Clone)]
struct TweenRun {
    progress: SteppedTween,
    angles: Vec<(Part, f32, f32)>,
    offsets: Vec<(Part, Vec2, Vec2)>,
    base_from: Vec2,
    base_to: Vec2,
}

#[derive(Debug, Clone)]
struct WalkRun {
    elapsed_ms: u64,
    base: Vec2,
    offsets: Offsets,
    /// Signed x travel per tick
    step_x: f32,
    heading: f32,
    plan: WalkPlan,
}

#[derive(Debug, Clone)]
struct ClimbRun {
    plan: ClimbPlan,
    step: usize,
}

/// Animator that freezes the rig and writes transforms directly
#[derive(Debug)]
pub struct DirectPoseAnimator {
    config: DirectConfig,
    upright: Pose,
    gait: StrollGait,
    climb: ClimbReach,
    timers: Timers<Track>,
    frozen: bool,
    tween: Option<TweenRun>,
    walk: Option<WalkRun>,
    approach: Option<ClimbPlan>,
    climbing: Option<ClimbRun>,
}

impl DirectPoseAnimator {
    pub fn new(config: DirectConfig, upright: Pose) -> Self {
        let gait = StrollGait {
            period_ms: config.gait_period_ms,
            ..StrollGait::default()
        };
        Self {
            config,
            upright,
            gait,
            climb: ClimbReach::direct(),
            timers: Timers::new(),
            frozen: false,
            tween: None,
            walk: None,
            approach: None,
            climbing: None,
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Zero every velocity, then make every segment kinematic. Idempotent.
    pub fn freeze(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine) {
        rig.zero_velocities(physics);
        rig.set_mode(physics, BodyMode::Kinematic);
        if !self.frozen {
            log::debug!("Direct animator froze {} segments", rig.len());
        }
        self.frozen = true;
    }

    /// Hand every segment back to dynamics where it currently stands
    pub fn unfreeze(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine) {
        rig.set_mode(physics, BodyMode::Dynamic);
        if self.frozen {
            log::debug!("Direct animator released {} segments", rig.len());
        }
        self.frozen = false;
    }

    /// Interpolate angles of the listed segments to `targets`
    pub fn tween_angles(
        &mut self,
        rig: &Rig,
        physics: &mut dyn PhysicsEngine,
        targets: &Pose,
        duration_ms: u64,
        ease: EaseType,
    ) {
        let angles = Self::angle_tracks(rig, physics, targets);
        let base = rig.reference_position(physics).unwrap_or(Vec2::ZERO);
        self.start_tween(
            TweenRun {
                progress: SteppedTween::new(duration_ms, ease),
                angles,
                offsets: Vec::new(),
                base_from: base,
                base_to: base,
            },
            duration_ms,
        );
    }

    /// Interpolate angles and torso-relative offsets to `pose`.
    ///
    /// Offsets start from the current layout, so the tween begins from
    /// whatever shape the rig settled into. With `ground_y` set, the base
    /// also moves vertically until the lowest segment rests on the ground.
    pub fn tween_pose(
        &mut self,
        rig: &Rig,
        physics: &mut dyn PhysicsEngine,
        pose: &Pose,
        duration_ms: u64,
        ground_y: Option<f32>,
        ease: EaseType,
    ) {
        let Some(base) = rig.reference_position(physics) else {
            log::warn!("Direct tween_pose: rig has no reference position");
            return;
        };
        let baseline = rig.compute_local_offsets(physics);
        let mut final_offsets = baseline.clone();
        let mut offsets = Vec::new();
        for (part, target) in pose.offsets() {
            if let Some(from) = baseline.get(&part) {
                offsets.push((part, *from, target));
                final_offsets.insert(part, target);
            }
        }

        let base_to = match ground_y.and_then(|g| rig.ground_base_y(&final_offsets, g)) {
            Some(y) => Vec2::new(base.x, y),
            None => base,
        };

        self.start_tween(
            TweenRun {
                progress: SteppedTween::new(duration_ms, ease),
                angles: Self::angle_tracks(rig, physics, pose),
                offsets,
                base_from: base,
                base_to,
            },
            duration_ms,
        );
    }

    fn angle_tracks(rig: &Rig, physics: &dyn PhysicsEngine, pose: &Pose) -> Vec<(Part, f32, f32)> {
        pose.angles()
            .filter_map(|(part, to)| {
                let body = rig.body(part)?;
                Some((part, physics.angle(body)?, to))
            })
            .collect()
    }

    fn start_tween(&mut self, run: TweenRun, duration_ms: u64) {
        if self.timers.cancel_kind(Track::Tween) > 0 {
            log::debug!("Direct animator: replacing running tween");
        }
        let interval = run.progress.interval_ms(duration_ms);
        self.tween = Some(run);
        self.timers.every(interval, Track::Tween);
    }

    /// Loop the stroll gait, sliding the rig along the ground toward the marker
    pub fn play_gait(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine, plan: &WalkPlan) {
        self.timers.cancel_kind(Track::Gait);
        let Some(base) = rig.reference_position(physics) else {
            log::warn!("Direct play_gait: rig has no reference position");
            return;
        };
        let heading = heading(base.x, plan.marker_x);
        let step_x = heading * plan.speed * self.config.tick_ms as f32 / 1000.0;
        log::debug!(
            "Direct gait from x={:.1} toward marker x={:.1} ({:.3} px/tick)",
            base.x,
            plan.marker_x,
            step_x
        );

        self.walk = Some(WalkRun {
            elapsed_ms: 0,
            base,
            offsets: rig.compute_local_offsets(physics),
            step_x,
            heading,
            plan: *plan,
        });
        self.timers.every(self.config.tick_ms, Track::Gait);
    }

    /// Approach the ladder, then climb it in alternating reaches
    pub fn play_climb(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine, plan: &ClimbPlan) {
        self.timers.cancel_kind(Track::Approach);
        self.timers.cancel_kind(Track::Climb);
        self.climbing = None;

        let at_ladder = rig
            .reference_position(physics)
            .is_some_and(|p| (p.x - plan.ladder_x).abs() <= f32::EPSILON);
        if at_ladder {
            self.begin_climb(rig, physics, plan);
        } else {
            self.approach = Some(*plan);
            self.timers.every(self.config.tick_ms, Track::Approach);
        }
    }

    fn begin_climb(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine, plan: &ClimbPlan) {
        // Snap onto the ladder line, keeping the current shape
        if let Some(base) = rig.reference_position(physics) {
            rig.translate(physics, Vec2::new(plan.ladder_x - base.x, 0.0));
        }
        log::debug!("Direct climb started at ladder x={:.1}", plan.ladder_x);
        self.approach = None;
        self.climbing = Some(ClimbRun {
            plan: *plan,
            step: 0,
        });
        self.timers.every(self.config.climb_interval_ms, Track::Climb);
    }

    fn step_tween(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine, events: &mut Vec<AnimationEvent>) {
        let Some(run) = self.tween.as_mut() else {
            self.timers.cancel_kind(Track::Tween);
            return;
        };
        let t = run.progress.advance();
        let finished = run.progress.is_finished();

        for &(part, from, to) in &run.angles {
            if let Some(body) = rig.body(part) {
                let angle = if finished { to } else { lerp(from, to, t) };
                physics.set_angle(body, angle);
                physics.halt(body);
            }
        }

        if !run.offsets.is_empty() {
            let base = if finished {
                run.base_to
            } else {
                run.base_from.lerp(run.base_to, t)
            };
            // The reference segment travels with the base even when the
            // pose leaves its offset alone
            if let Some(body) = rig.body(Rig::REFERENCE) {
                if !run.offsets.iter().any(|(part, _, _)| *part == Rig::REFERENCE) {
                    physics.set_position(body, base);
                }
            }
            for &(part, from, to) in &run.offsets {
                if let Some(body) = rig.body(part) {
                    let offset = if finished { to } else { from.lerp(to, t) };
                    physics.set_position(body, base + offset);
                    physics.halt(body);
                }
            }
        }

        if finished {
            self.timers.cancel_kind(Track::Tween);
            self.tween = None;
            events.push(AnimationEvent::TweenFinished);
        }
    }

    fn step_gait(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine, events: &mut Vec<AnimationEvent>) {
        let Some(walk) = self.walk.as_mut() else {
            self.timers.cancel_kind(Track::Gait);
            return;
        };
        walk.elapsed_ms += self.config.tick_ms;
        let t = self.gait.phase_at(walk.elapsed_ms);
        rig.set_angles(physics, self.gait.angles(t).angles());

        walk.base.x += walk.step_x;
        if let Some(y) = rig.ground_base_y(&walk.offsets, walk.plan.ground_y) {
            walk.base.y = y;
        }
        rig.place(physics, walk.base, &walk.offsets);
        rig.zero_velocities(physics);

        if crossed(walk.base.x, walk.plan.marker_x, walk.heading) {
            log::debug!("Direct gait reached marker at x={:.1}", walk.base.x);
            self.timers.cancel_kind(Track::Gait);
            self.walk = None;
            events.push(AnimationEvent::MarkerReached);
        }
    }

    fn step_approach(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine) {
        let (Some(plan), Some(base)) = (self.approach, rig.reference_position(physics)) else {
            self.timers.cancel_kind(Track::Approach);
            self.approach = None;
            return;
        };
        let remaining = plan.ladder_x - base.x;
        let step = self.config.approach_step;
        if remaining.abs() <= step {
            self.timers.cancel_kind(Track::Approach);
            self.begin_climb(rig, physics, &plan);
        } else {
            rig.translate(physics, Vec2::new(step * remaining.signum(), 0.0));
            rig.zero_velocities(physics);
        }
    }

    fn step_climb(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine, events: &mut Vec<AnimationEvent>) {
        let Some(run) = self.climbing.as_mut() else {
            self.timers.cancel_kind(Track::Climb);
            return;
        };
        let at_top = |physics: &dyn PhysicsEngine, top_y: f32| {
            rig.reference_position(physics).map_or(true, |p| p.y <= top_y)
        };
        if !at_top(&*physics, run.plan.top_y) {
            rig.set_angles(physics, self.climb.pose(run.step).angles());
            rig.translate(physics, Vec2::new(0.0, -run.plan.step_height()));
            rig.zero_velocities(physics);
            run.step += 1;
        }

        if at_top(&*physics, run.plan.top_y) {
            log::debug!("Direct climb reached the top after {} steps", run.step);
            self.timers.cancel_kind(Track::Climb);
            self.climbing = None;
            events.push(AnimationEvent::TopReached);
        }
    }
}

impl PoseAnimator for DirectPoseAnimator {
    fn kind(&self) -> AnimatorKind {
        AnimatorKind::Direct
    }

    fn take_control(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine) {
        self.freeze(rig, physics);
    }

    fn release_control(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine) {
        self.stop_all();
        if self.frozen {
            self.unfreeze(rig, physics);
        }
    }

    fn has_control(&self) -> bool {
        self.frozen
    }

    fn start_upright(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine, plan: &UprightPlan) {
        self.freeze(rig, physics);
        let upright = self.upright.clone();
        self.tween_pose(
            rig,
            physics,
            &upright,
            plan.duration_ms,
            Some(plan.ground_y),
            plan.ease,
        );
    }

    fn start_walk(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine, plan: &WalkPlan) {
        self.freeze(rig, physics);
        self.play_gait(rig, physics, plan);
    }

    fn start_climb(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine, plan: &ClimbPlan) {
        self.freeze(rig, physics);
        self.play_climb(rig, physics, plan);
    }

    fn stop_all(&mut self) {
        self.timers.cancel_all();
        self.tween = None;
        self.walk = None;
        self.approach = None;
        self.climbing = None;
    }

    fn is_animating(&self) -> bool {
        self.timers.pending() > 0
    }

    fn advance(
        &mut self,
        rig: &Rig,
        physics: &mut dyn PhysicsEngine,
        dt_ms: u64,
    ) -> Vec<AnimationEvent> {
        let until = self.timers.now_ms() + dt_ms;
        let mut events = Vec::new();
        while let Some(fired) = self.timers.pop_due(until) {
            match fired.kind {
                Track::Tween => self.step_tween(rig, physics, &mut events),
                Track::Gait => self.step_gait(rig, physics, &mut events),
                Track::Approach => self.step_approach(rig, physics),
                Track::Climb => self.step_climb(rig, physics, &mut events),
            }
        }
        self.timers.catch_up(until);
        events
    }
}
