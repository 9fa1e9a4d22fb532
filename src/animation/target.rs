//! Spring-target posing
//!
//! Segments stay dynamic. Each one is tied by a stiff damped spring to an
//! invisible kinematic proxy; animation moves the proxies and the engine
//! pulls the real bodies after them, so collisions and the rig's own joints
//! stay live throughout. Orientation is not mediated by the springs: angles
//! are written straight onto the segments.

use std::collections::BTreeMap;

use glam::Vec2;

use super::gait::{ClimbReach, GaitCycle, StrideGait};
use super::tween::{EaseType, SteppedTween};
use super::{
    crossed, heading, AnimationEvent, AnimatorKind, ClimbPlan, PoseAnimator, Track, UprightPlan,
    WalkPlan,
};
use crate::config::TargetConfig;
use crate::physics::{
    BodyDesc, BodyId, BodyMode, CollisionGroups, CollisionMask, ConstraintDesc, ConstraintId,
    PhysicsEngine, Shape,
};
use crate::rig::{Offsets, Part, Pose, Rig};
use crate::scheduler::Timers;

const PROXY_RADIUS: f32 = 1.0;

#[derive(Debug, Clone, Copy)]
struct Proxy {
    body: BodyId,
    spring: ConstraintId,
    saved_damping: f32,
}

#[derive(Debug, Clone)]
struct ProxySet {
    proxies: BTreeMap<Part, Proxy>,
    /// Torso-relative layout the proxies hold around the base
    baseline: Offsets,
    base: Vec2,
}

#[derive(Debug, Clone)]
struct UprightRun {
    progress: SteppedTween,
    from: Offsets,
    to: Offsets,
    base_from: Vec2,
    base_to: Vec2,
}

#[derive(Debug, Clone)]
struct WalkRun {
    elapsed_ms: u64,
    step_x: f32,
    heading: f32,
    plan: WalkPlan,
}

#[derive(Debug, Clone)]
struct ClimbRun {
    plan: ClimbPlan,
    step: usize,
}

/// Animator that drives proxy targets instead of the bodies themselves
#[derive(Debug)]
pub struct TargetPoseAnimator {
    config: TargetConfig,
    upright: Pose,
    gait: StrideGait,
    climb: ClimbReach,
    timers: Timers<Track>,
    active: Option<ProxySet>,
    tween: Option<UprightRun>,
    walk: Option<WalkRun>,
    approach: Option<ClimbPlan>,
    climbing: Option<ClimbRun>,
}

impl TargetPoseAnimator {
    pub fn new(config: TargetConfig, upright: Pose) -> Self {
        let gait = StrideGait {
            period_ms: config.gait_period_ms,
            ..StrideGait::default()
        };
        Self {
            config,
            upright,
            gait,
            climb: ClimbReach::braced(),
            timers: Timers::new(),
            active: None,
            tween: None,
            walk: None,
            approach: None,
            climbing: None,
        }
    }

    pub fn is_entered(&self) -> bool {
        self.active.is_some()
    }

    /// Current rig base, if entered
    pub fn base(&self) -> Option<Vec2> {
        self.active.as_ref().map(|set| set.base)
    }

    /// Where the proxy of `part` currently sits
    pub fn proxy_position(&self, physics: &dyn PhysicsEngine, part: Part) -> Option<Vec2> {
        let proxy = self.active.as_ref()?.proxies.get(&part)?;
        physics.position(proxy.body)
    }

    /// Number of live proxies
    pub fn proxy_count(&self) -> usize {
        self.active.as_ref().map_or(0, |set| set.proxies.len())
    }

    /// Snapshot the layout, raise air drag and tie every segment to a proxy.
    /// No-op while already entered.
    pub fn enter(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine) {
        if self.active.is_some() {
            log::trace!("Target animator already entered");
            return;
        }
        let Some(base) = rig.reference_position(physics) else {
            log::warn!("Target enter: rig has no reference position");
            return;
        };
        let baseline = rig.compute_local_offsets(physics);
        let proxy_mask = CollisionMask::new(CollisionGroups::PROXY, CollisionGroups::empty());

        let mut proxies = BTreeMap::new();
        for segment in rig.segments() {
            let (Some(position), Some(angle)) =
                (physics.position(segment.body), physics.angle(segment.body))
            else {
                continue;
            };
            let saved_damping = physics
                .linear_damping(segment.body)
                .unwrap_or(segment.linear_damping);
            physics.set_linear_damping(segment.body, self.config.air_damping);

            let body = physics.create_body(
                &BodyDesc::new(position, BodyMode::Kinematic)
                    .with_angle(angle)
                    .with_shape(Shape::Circle {
                        radius: PROXY_RADIUS,
                    })
                    .with_collision(proxy_mask)
                    .as_sensor(),
            );
            let spring = physics.create_constraint(&ConstraintDesc {
                body_a: body,
                body_b: segment.body,
                anchor_a: Vec2::ZERO,
                anchor_b: Vec2::ZERO,
                stiffness: self.config.spring_stiffness,
                damping: self.config.spring_damping,
                rest_length: 0.0,
            });
            proxies.insert(
                segment.part,
                Proxy {
                    body,
                    spring,
                    saved_damping,
                },
            );
        }

        log::debug!("Target animator entered with {} proxies", proxies.len());
        self.active = Some(ProxySet {
            proxies,
            baseline,
            base,
        });
    }

    /// Stop all procedures, remove every proxy and restore damping.
    /// No-op when not entered.
    pub fn leave(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine) {
        self.stop_all();
        let Some(set) = self.active.take() else {
            return;
        };
        for (part, proxy) in &set.proxies {
            physics.destroy_constraint(proxy.spring);
            physics.destroy_body(proxy.body);
            if let Some(body) = rig.body(*part) {
                physics.set_linear_damping(body, proxy.saved_damping);
            }
        }
        log::debug!("Target animator left, removed {} proxies", set.proxies.len());
    }

    /// Move every proxy to `base + baseline offset`
    pub fn set_rig_base(&mut self, physics: &mut dyn PhysicsEngine, base: Vec2) {
        let Some(set) = self.active.as_mut() else {
            return;
        };
        set.base = base;
        for (part, proxy) in &set.proxies {
            let offset = set.baseline.get(part).copied().unwrap_or(Vec2::ZERO);
            physics.set_position(proxy.body, base + offset);
        }
    }

    /// Write angles straight onto the segments. No-op when not entered.
    pub fn set_angles(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine, pose: &Pose) {
        if self.active.is_none() {
            return;
        }
        rig.set_angles(physics, pose.angles());
    }

    /// Pull the proxies into the upright layout with the feet on the ground.
    /// Angles snap to the upright set on every step. When finished the
    /// upright layout becomes the baseline for later procedures.
    pub fn tween_upright(
        &mut self,
        rig: &Rig,
        duration_ms: u64,
        ground_y: f32,
        ease: EaseType,
    ) {
        let Some(set) = self.active.as_ref() else {
            log::debug!("Target tween_upright before enter, ignoring");
            return;
        };
        let from = set.baseline.clone();
        let mut to = from.clone();
        for (part, offset) in self.upright.offsets() {
            if to.contains_key(&part) {
                to.insert(part, offset);
            }
        }
        let base_to = match rig.ground_base_y(&to, ground_y) {
            Some(y) => Vec2::new(set.base.x, y),
            None => set.base,
        };

        self.timers.cancel_kind(Track::Tween);
        let progress = SteppedTween::new(duration_ms, ease);
        let interval = progress.interval_ms(duration_ms);
        self.tween = Some(UprightRun {
            progress,
            from,
            to,
            base_from: set.base,
            base_to,
        });
        self.timers.every(interval, Track::Tween);
    }

    /// Run the stride gait, sliding the base toward the marker with the feet
    /// clamped to the ground
    pub fn play_gait(&mut self, plan: &WalkPlan) {
        self.timers.cancel_kind(Track::Gait);
        let Some(set) = self.active.as_ref() else {
            log::debug!("Target play_gait before enter, ignoring");
            return;
        };
        let heading = heading(set.base.x, plan.marker_x);
        self.walk = Some(WalkRun {
            elapsed_ms: 0,
            step_x: heading * plan.speed * self.config.tick_ms as f32 / 1000.0,
            heading,
            plan: *plan,
        });
        self.timers.every(self.config.tick_ms, Track::Gait);
    }

    /// Slide the proxies onto the ladder, then climb
    pub fn play_climb(&mut self, plan: &ClimbPlan) {
        self.timers.cancel_kind(Track::Approach);
        self.timers.cancel_kind(Track::Climb);
        self.climbing = None;
        let Some(set) = self.active.as_ref() else {
            log::debug!("Target play_climb before enter, ignoring");
            return;
        };
        if (set.base.x - plan.ladder_x).abs() <= self.config.arrival_tolerance {
            self.begin_climb(plan);
        } else {
            self.approach = Some(*plan);
            self.timers.every(self.config.tick_ms, Track::Approach);
        }
    }

    fn begin_climb(&mut self, plan: &ClimbPlan) {
        if let Some(set) = self.active.as_mut() {
            set.base.x = plan.ladder_x;
        }
        log::debug!("Target climb started at ladder x={:.1}", plan.ladder_x);
        self.approach = None;
        self.climbing = Some(ClimbRun {
            plan: *plan,
            step: 0,
        });
        self.timers.every(self.config.climb_interval_ms, Track::Climb);
    }

    fn step_tween(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine, events: &mut Vec<AnimationEvent>) {
        let (Some(run), Some(set)) = (self.tween.as_mut(), self.active.as_mut()) else {
            self.timers.cancel_kind(Track::Tween);
            self.tween = None;
            return;
        };
        let t = run.progress.advance();
        let finished = run.progress.is_finished();
        let base = if finished {
            run.base_to
        } else {
            run.base_from.lerp(run.base_to, t)
        };

        for (part, proxy) in &set.proxies {
            let (Some(from), Some(to)) = (run.from.get(part), run.to.get(part)) else {
                continue;
            };
            let offset = if finished { *to } else { from.lerp(*to, t) };
            physics.set_position(proxy.body, base + offset);
        }
        set.base = base;
        rig.set_angles(physics, self.upright.angles());

        if finished {
            set.baseline = run.to.clone();
            self.timers.cancel_kind(Track::Tween);
            self.tween = None;
            events.push(AnimationEvent::TweenFinished);
        }
    }

    fn step_gait(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine, events: &mut Vec<AnimationEvent>) {
        let (Some(walk), Some(set)) = (self.walk.as_mut(), self.active.as_ref()) else {
            self.timers.cancel_kind(Track::Gait);
            self.walk = None;
            return;
        };
        walk.elapsed_ms += self.config.tick_ms;
        let t = self.gait.phase_at(walk.elapsed_ms);
        rig.set_angles(physics, self.gait.angles(t).angles());

        let mut base = set.base;
        base.x += walk.step_x;
        if let Some(y) = rig.ground_base_y(&set.baseline, walk.plan.ground_y) {
            base.y = y;
        }
        let reached = crossed(base.x, walk.plan.marker_x, walk.heading);
        self.set_rig_base(physics, base);

        if reached {
            log::debug!("Target gait reached marker at x={:.1}", base.x);
            self.timers.cancel_kind(Track::Gait);
            self.walk = None;
            events.push(AnimationEvent::MarkerReached);
        }
    }

    fn step_approach(&mut self, physics: &mut dyn PhysicsEngine) {
        let (Some(plan), Some(set)) = (self.approach, self.active.as_ref()) else {
            self.timers.cancel_kind(Track::Approach);
            self.approach = None;
            return;
        };
        // Every proxy slides toward its own spot on the ladder line
        let step = self.config.approach_step;
        for (part, proxy) in &set.proxies {
            let Some(position) = physics.position(proxy.body) else {
                continue;
            };
            let offset_x = set.baseline.get(part).map_or(0.0, |o| o.x);
            let dx = (plan.ladder_x + offset_x - position.x).clamp(-step, step);
            physics.set_position(proxy.body, Vec2::new(position.x + dx, position.y));
        }

        let torso_x = set
            .proxies
            .get(&Rig::REFERENCE)
            .and_then(|proxy| physics.position(proxy.body))
            .map_or(plan.ladder_x, |p| p.x);
        if (torso_x - plan.ladder_x).abs() <= self.config.arrival_tolerance {
            self.timers.cancel_kind(Track::Approach);
            self.begin_climb(&plan);
        }
    }

    fn step_climb(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine, events: &mut Vec<AnimationEvent>) {
        let (Some(run), Some(set)) = (self.climbing.as_mut(), self.active.as_mut()) else {
            self.timers.cancel_kind(Track::Climb);
            self.climbing = None;
            return;
        };
        if set.base.y > run.plan.top_y {
            rig.set_angles(physics, self.climb.pose(run.step).angles());

            let lift = run.plan.step_height();
            for proxy in set.proxies.values() {
                if let Some(position) = physics.position(proxy.body) {
                    physics.set_position(proxy.body, position - Vec2::new(0.0, lift));
                }
            }
            set.base.y -= lift;
            run.step += 1;
        }

        if set.base.y <= run.plan.top_y {
            log::debug!("Target climb reached the top after {} steps", run.step);
            self.timers.cancel_kind(Track::Climb);
            self.climbing = None;
            events.push(AnimationEvent::TopReached);
        }
    }
}

impl PoseAnimator for TargetPoseAnimator {
    fn kind(&self) -> AnimatorKind {
        AnimatorKind::Target
    }

    fn take_control(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine) {
        rig.zero_velocities(physics);
        self.enter(rig, physics);
    }

    fn release_control(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine) {
        self.leave(rig, physics);
    }

    fn has_control(&self) -> bool {
        self.is_entered()
    }

    fn start_upright(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine, plan: &UprightPlan) {
        self.take_control(rig, physics);
        self.tween_upright(rig, plan.duration_ms, plan.ground_y, plan.ease);
    }

    fn start_walk(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine, plan: &WalkPlan) {
        self.take_control(rig, physics);
        self.play_gait(plan);
    }

    fn start_climb(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine, plan: &ClimbPlan) {
        self.take_control(rig, physics);
        self.play_climb(plan);
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
                Track::Approach => self.step_approach(physics),
                Track::Climb => self.step_climb(rig, physics, &mut events),
            }
        }
        self.timers.catch_up(until);
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::SandboxWorld;
    use crate::rig::RigSpec;

    const TICK: u64 = 16;
    const DT: f32 = 0.016;

    fn setup(origin: Vec2) -> (SandboxWorld, Rig, TargetPoseAnimator) {
        let mut world = SandboxWorld::default();
        let rig = Rig::spawn(&mut world, &RigSpec::humanoid(), origin).unwrap();
        let animator = TargetPoseAnimator::new(TargetConfig::default(), Pose::upright());
        (world, rig, animator)
    }

    #[test]
    fn test_operations_before_enter_are_noops() {
        let (mut world, rig, mut animator) = setup(Vec2::new(200.0, 100.0));
        let before = rig.transforms(&world);

        animator.set_rig_base(&mut world, Vec2::new(0.0, 0.0));
        animator.set_angles(&rig, &mut world, &Pose::from_angles([(Part::Head, 1.0)]));
        animator.tween_upright(&rig, 700, 560.0, EaseType::Linear);
        animator.play_gait(&WalkPlan {
            speed: 28.0,
            marker_x: 120.0,
            ground_y: 560.0,
        });
        animator.play_climb(&ClimbPlan {
            ladder_x: 50.0,
            top_y: 90.0,
            rung_spacing: 60.0,
        });
        animator.leave(&rig, &mut world);

        assert_eq!(before, rig.transforms(&world));
        assert!(animator.advance(&rig, &mut world, 1000).is_empty());
        assert_eq!(world.body_count(), 14);
    }

    #[test]
    fn test_enter_and_leave_manage_proxies_and_damping() {
        let (mut world, rig, mut animator) = setup(Vec2::new(200.0, 100.0));
        let torso = rig.body(Part::Torso).unwrap();

        animator.enter(&rig, &mut world);
        animator.enter(&rig, &mut world);
        assert_eq!(animator.proxy_count(), 14);
        assert_eq!(world.body_count(), 28);
        assert_eq!(world.constraint_count(), 13 + 14);
        assert_eq!(world.linear_damping(torso), Some(0.08));
        assert_eq!(
            animator.proxy_position(&world, Part::Torso),
            Some(Vec2::new(200.0, 100.0))
        );
        // Segments stay dynamic under spring control
        assert_eq!(world.body_mode(torso), Some(BodyMode::Dynamic));

        animator.leave(&rig, &mut world);
        animator.leave(&rig, &mut world);
        assert_eq!(world.body_count(), 14);
        assert_eq!(world.constraint_count(), 13);
        assert_eq!(world.linear_damping(torso), Some(0.02));
    }

    #[test]
    fn test_springs_pull_segments_to_moved_base() {
        let mut world = SandboxWorld::weightless();
        let rig = Rig::spawn(&mut world, &RigSpec::humanoid(), Vec2::new(200.0, 100.0)).unwrap();
        let mut animator = TargetPoseAnimator::new(TargetConfig::default(), Pose::upright());
        animator.enter(&rig, &mut world);

        animator.set_rig_base(&mut world, Vec2::new(210.0, 100.0));
        for _ in 0..60 {
            world.step(DT);
        }

        let torso = rig.reference_position(&world).unwrap();
        assert!(torso.distance(Vec2::new(210.0, 100.0)) < 0.5, "torso at {:?}", torso);
    }

    #[test]
    fn test_upright_tween_snaps_baseline() {
        let (mut world, rig, mut animator) = setup(Vec2::new(300.0, 500.0));
        animator.start_upright(
            &rig,
            &mut world,
            &UprightPlan {
                duration_ms: 700,
                ground_y: 560.0,
                ease: EaseType::Linear,
            },
        );

        let mut finished = false;
        for _ in 0..100 {
            world.step(DT);
            if animator
                .advance(&rig, &mut world, TICK)
                .contains(&AnimationEvent::TweenFinished)
            {
                finished = true;
                break;
            }
        }
        assert!(finished);

        let base = animator.base().unwrap();
        assert!((base.y - 527.5).abs() < 1e-4);
        for (part, offset) in Pose::upright().offsets() {
            let proxy = animator.proxy_position(&world, part).unwrap();
            assert!((proxy - (base + offset)).length() < 1e-4, "{}", part);
        }
        assert_eq!(world.angle(rig.body(Part::LeftThigh).unwrap()), Some(0.06));
    }

    #[test]
    fn test_gait_clamps_proxy_feet_and_terminates() {
        let (mut world, rig, mut animator) = setup(Vec2::new(130.0, 527.5));
        animator.take_control(&rig, &mut world);
        animator.play_gait(&WalkPlan {
            speed: 28.0,
            marker_x: 120.0,
            ground_y: 560.0,
        });

        let mut ticks = 0;
        loop {
            ticks += 1;
            world.step(DT);
            let events = animator.advance(&rig, &mut world, TICK);
            let foot = animator.proxy_position(&world, Part::RightFoot).unwrap();
            assert!((foot.y + 1.5 - 560.0).abs() < 1e-3);
            if events.contains(&AnimationEvent::MarkerReached) {
                break;
            }
            assert!(ticks < 100, "gait never reached the marker");
        }
        assert!((22..=24).contains(&ticks), "took {} ticks", ticks);
    }

    #[test]
    fn test_climb_counts_steps_from_ladder() {
        let (mut world, rig, mut animator) = setup(Vec2::new(50.0, 400.0));
        animator.take_control(&rig, &mut world);
        animator.play_climb(&ClimbPlan {
            ladder_x: 50.0,
            top_y: 90.0,
            rung_spacing: 60.0,
        });

        let mut heights = vec![animator.base().unwrap().y];
        for _ in 0..400 {
            world.step(DT);
            let events = animator.advance(&rig, &mut world, TICK);
            let y = animator.base().unwrap().y;
            if y != *heights.last().unwrap() {
                heights.push(y);
            }
            if events.contains(&AnimationEvent::TopReached) {
                break;
            }
        }
        assert_eq!(heights.len() - 1, 11);
        assert!(heights.windows(2).all(|w| w[1] < w[0]));
        assert!(!animator.is_animating());
    }

    #[test]
    fn test_climb_from_top_does_not_move() {
        let (mut world, rig, mut animator) = setup(Vec2::new(50.0, 80.0));
        animator.take_control(&rig, &mut world);
        let torso_proxy = animator.proxy_position(&world, Part::Torso);
        animator.play_climb(&ClimbPlan {
            ladder_x: 50.0,
            top_y: 90.0,
            rung_spacing: 60.0,
        });

        let mut reached = false;
        for _ in 0..100 {
            if animator
                .advance(&rig, &mut world, TICK)
                .contains(&AnimationEvent::TopReached)
            {
                reached = true;
                break;
            }
        }
        assert!(reached);
        assert_eq!(animator.base(), Some(Vec2::new(50.0, 80.0)));
        assert_eq!(animator.proxy_position(&world, Part::Torso), torso_proxy);
        assert!(!animator.is_animating());
    }

    #[test]
    fn test_partial_rig_gets_proxies_only_for_present_parts() {
        let mut world = SandboxWorld::default();
        let spec = RigSpec::humanoid().without(&[Part::LeftHand, Part::LeftForearm]);
        let rig = Rig::spawn(&mut world, &spec, Vec2::new(130.0, 500.0)).unwrap();
        let mut animator = TargetPoseAnimator::new(TargetConfig::default(), Pose::upright());

        animator.start_upright(
            &rig,
            &mut world,
            &UprightPlan {
                duration_ms: 200,
                ground_y: 560.0,
                ease: EaseType::Linear,
            },
        );
        assert_eq!(animator.proxy_count(), rig.len());
        assert_eq!(world.body_count(), 2 * rig.len());
        assert!(animator.proxy_position(&world, Part::LeftHand).is_none());

        let mut finished = false;
        for _ in 0..100 {
            world.step(DT);
            if animator
                .advance(&rig, &mut world, TICK)
                .contains(&AnimationEvent::TweenFinished)
            {
                finished = true;
                break;
            }
        }
        assert!(finished);
        assert!(animator.base().is_some_and(|b| (b.y - 527.5).abs() < 1e-4));

        animator.play_gait(&WalkPlan {
            speed: 28.0,
            marker_x: 120.0,
            ground_y: 560.0,
        });
        let mut marker = false;
        for _ in 0..100 {
            world.step(DT);
            if animator
                .advance(&rig, &mut world, TICK)
                .contains(&AnimationEvent::MarkerReached)
            {
                marker = true;
                break;
            }
        }
        assert!(marker);

        animator.play_climb(&ClimbPlan {
            ladder_x: 50.0,
            top_y: 390.0,
            rung_spacing: 60.0,
        });
        let mut top = false;
        for _ in 0..2000 {
            world.step(DT);
            if animator
                .advance(&rig, &mut world, TICK)
                .contains(&AnimationEvent::TopReached)
            {
                top = true;
                break;
            }
        }
        assert!(top);
        assert_eq!(animator.proxy_count(), rig.len());

        animator.leave(&rig, &mut world);
        assert_eq!(world.body_count(), rig.len());
    }

    #[test]
    fn test_approach_slides_each_proxy() {
        let (mut world, rig, mut animator) = setup(Vec2::new(62.0, 400.0));
        animator.take_control(&rig, &mut world);
        let hand_before = animator.proxy_position(&world, Part::LeftHand).unwrap();
        animator.play_climb(&ClimbPlan {
            ladder_x: 50.0,
            top_y: 90.0,
            rung_spacing: 60.0,
        });

        animator.advance(&rig, &mut world, TICK);
        let hand = animator.proxy_position(&world, Part::LeftHand).unwrap();
        assert_eq!(hand, hand_before - Vec2::new(3.0, 0.0));

        for _ in 0..3 {
            animator.advance(&rig, &mut world, TICK);
        }
        let torso = animator.proxy_position(&world, Part::Torso).unwrap();
        assert!((torso.x - 50.0).abs() < 1e-4);
        assert_eq!(animator.base().map(|b| b.x), Some(50.0));
    }
}
