//! Character orchestration
//!
//! [`CharacterStateMachine`] owns the life-cycle state, filters contact
//! events, keeps the hold/dialogue/collision timers and is the only caller
//! of the active animator's phase entry points. It never writes segment
//! transforms itself.

use std::collections::{BTreeMap, BTreeSet};

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use super::state::{CharacterState, Lifecycle, LifecycleInput};
use crate::animation::{
    build_animator, AnimationEvent, AnimatorKind, ClimbPlan, LaunchPlan, PoseAnimator,
    UprightPlan, WalkPlan,
};
use crate::config::{DirectConfig, StageConfig, TargetConfig};
use crate::physics::{BodyId, CollisionMask, ContactEvent, PhysicsEngine};
use crate::rig::{Pose, Rig};
use crate::scheduler::Timers;

/// Message for the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    StateChanged(CharacterState),
    /// Subtitle text; empty clears it
    Dialogue(String),
    ContactCount(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    Hold,
    DialogueEnd,
    RestoreCollisions,
}

/// Phase parameters taken from the stage configuration
#[derive(Debug, Clone)]
struct Script {
    upright: UprightPlan,
    walk: WalkPlan,
    climb: ClimbPlan,
    launch: LaunchPlan,
    hold_ms: u64,
    dialogue: String,
    dialogue_ms: u64,
    collision_pause_ms: u64,
}

pub struct CharacterStateMachine {
    lifecycle: Lifecycle,
    contacts: u32,
    settlements: u64,
    dialogue: String,
    timers: Timers<Task>,
    animator: Box<dyn PoseAnimator>,
    direct: DirectConfig,
    target: TargetConfig,
    upright: Pose,
    script: Script,
    ground: BTreeSet<BodyId>,
    suspended: BTreeMap<BodyId, CollisionMask>,
    rng: Xoshiro256PlusPlus,
    outbox: Vec<Notification>,
}

impl CharacterStateMachine {
    pub fn new(config: &StageConfig, upright: Pose) -> Self {
        let animator = build_animator(
            config.lifecycle.animator,
            &config.direct,
            &config.target,
            &upright,
        );
        Self {
            lifecycle: Lifecycle::new(),
            contacts: 0,
            settlements: 0,
            dialogue: String::new(),
            timers: Timers::new(),
            animator,
            direct: config.direct.clone(),
            target: config.target.clone(),
            upright,
            script: Script {
                upright: config.upright_plan(),
                walk: config.walk_plan(),
                climb: config.climb_plan(),
                launch: config.launch_plan(),
                hold_ms: config.lifecycle.hold_ms,
                dialogue: config.lifecycle.dialogue.clone(),
                dialogue_ms: config.lifecycle.dialogue_ms,
                collision_pause_ms: config.lifecycle.collision_pause_ms,
            },
            ground: BTreeSet::new(),
            suspended: BTreeMap::new(),
            rng: Xoshiro256PlusPlus::seed_from_u64(config.lifecycle.seed),
            outbox: Vec::new(),
        }
    }

    /// Bodies whose contact with the rig counts as landing
    pub fn set_ground<I: IntoIterator<Item = BodyId>>(&mut self, bodies: I) {
        self.ground = bodies.into_iter().collect();
    }

    pub fn state(&self) -> CharacterState {
        self.lifecycle.current()
    }

    /// Ground contacts seen while falling since the last reset or jump
    pub fn contact_count(&self) -> u32 {
        self.contacts
    }

    /// How many settling phases have started
    pub fn settlements(&self) -> u64 {
        self.settlements
    }

    /// Completed life-cycle transitions
    pub fn transitions(&self) -> u64 {
        self.lifecycle.transitions()
    }

    pub fn dialogue(&self) -> &str {
        &self.dialogue
    }

    pub fn animator(&self) -> &dyn PoseAnimator {
        self.animator.as_ref()
    }

    pub fn animator_kind(&self) -> AnimatorKind {
        self.animator.kind()
    }

    /// Outstanding machine timers (hold, dialogue, collision restore)
    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }

    /// Whether collisions are currently suspended after a jump
    pub fn collisions_suspended(&self) -> bool {
        !self.suspended.is_empty()
    }

    /// Past Falling with nothing left to drive the next transition
    pub fn is_stalled(&self) -> bool {
        !self.state().is_physical() && self.timers.pending() == 0 && !self.animator.is_animating()
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.outbox)
    }

    fn notify(&mut self, notification: Notification) {
        self.outbox.push(notification);
    }

    fn set_dialogue(&mut self, text: &str) {
        self.dialogue = text.to_string();
        self.notify(Notification::Dialogue(self.dialogue.clone()));
    }

    fn apply(&mut self, input: LifecycleInput) -> bool {
        let from = self.state();
        if !self.lifecycle.apply(input) {
            return false;
        }
        log::info!("Character {} -> {}", from, self.state());
        self.notify(Notification::StateChanged(self.state()));
        true
    }

    /// Contact gate. Only contact starts between the rig and the ground
    /// count, and only while falling. Returns true if settling began.
    pub fn handle_contact(
        &mut self,
        rig: &Rig,
        physics: &mut dyn PhysicsEngine,
        event: &ContactEvent,
    ) -> bool {
        if !self.state().is_physical() {
            log::trace!("Ignoring {:?} while {}", event, self.state());
            return false;
        }
        let (a, b) = event.bodies();
        let grounded = (self.ground.contains(&a) && rig.part_of(b).is_some())
            || (self.ground.contains(&b) && rig.part_of(a).is_some());
        if !grounded || !event.is_start() {
            return false;
        }

        self.contacts += 1;
        self.notify(Notification::ContactCount(self.contacts));
        self.settle(rig, physics)
    }

    /// Begin settling. Ignored unless falling, so a repeated trigger never
    /// stacks a second upright tween.
    pub fn settle(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine) -> bool {
        if !self.apply(LifecycleInput::Landed) {
            log::debug!("Settle requested while {}, ignoring", self.state());
            return false;
        }
        self.settlements += 1;
        let plan = self.script.upright;
        self.animator.start_upright(rig, physics, &plan);
        true
    }

    /// Advance animator and machine timers by `dt_ms`
    pub fn advance(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine, dt_ms: u64) {
        let until = self.timers.now_ms() + dt_ms;
        while let Some(fired) = self.timers.pop_due(until) {
            match fired.kind {
                Task::Hold => self.finish_hold(rig, physics),
                Task::DialogueEnd => self.finish_dialogue(rig, physics),
                Task::RestoreCollisions => self.restore_collisions(physics),
            }
        }
        self.timers.catch_up(until);

        for event in self.animator.advance(rig, physics, dt_ms) {
            self.handle_animation(rig, physics, event);
        }
    }

    fn handle_animation(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine, event: AnimationEvent) {
        match (self.state(), event) {
            (CharacterState::Standing, AnimationEvent::TweenFinished) => {
                log::debug!("Upright, holding for {} ms", self.script.hold_ms);
                self.timers.cancel_kind(Task::Hold);
                self.timers.after(self.script.hold_ms, Task::Hold);
            }
            (CharacterState::Walking, AnimationEvent::MarkerReached) => {
                if self.apply(LifecycleInput::ReachedLadder) {
                    let plan = self.script.climb;
                    self.animator.start_climb(rig, physics, &plan);
                }
            }
            (CharacterState::Climbing, AnimationEvent::TopReached) => {
                if self.apply(LifecycleInput::ReachedTop) {
                    self.jump(rig, physics);
                }
            }
            (state, event) => {
                log::trace!("Ignoring {:?} while {}", event, state);
            }
        }
    }

    fn finish_hold(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine) {
        if !self.apply(LifecycleInput::HoldElapsed) {
            return;
        }
        self.start_speaking(rig, physics);
    }

    fn start_speaking(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine) {
        self.animator.take_control(rig, physics);
        let line = self.script.dialogue.clone();
        self.set_dialogue(&line);
        self.timers.cancel_kind(Task::DialogueEnd);
        self.timers.after(self.script.dialogue_ms, Task::DialogueEnd);
    }

    fn finish_dialogue(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine) {
        if !self.apply(LifecycleInput::DialogueElapsed) {
            return;
        }
        self.set_dialogue("");
        let plan = self.script.walk;
        self.animator.start_walk(rig, physics, &plan);
    }

    /// Hand the rig back to physics, throw it off the ladder and pause
    /// collisions for a moment so it does not snag
    fn jump(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine) {
        self.animator.release_control(rig, physics);
        let plan = self.script.launch;
        self.animator.launch(rig, physics, &plan, &mut self.rng);
        self.suspend_collisions(rig, physics);

        self.contacts = 0;
        self.notify(Notification::ContactCount(0));
        log::debug!(
            "Jumped, collisions off for {} ms",
            self.script.collision_pause_ms
        );
    }

    fn suspend_collisions(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine) {
        for segment in rig.segments() {
            let Some(mask) = physics.collision_mask(segment.body) else {
                continue;
            };
            self.suspended.entry(segment.body).or_insert(mask);
            physics.set_collision_mask(segment.body, mask.disabled());
        }
        self.timers.cancel_kind(Task::RestoreCollisions);
        self.timers
            .after(self.script.collision_pause_ms, Task::RestoreCollisions);
    }

    fn restore_collisions(&mut self, physics: &mut dyn PhysicsEngine) {
        if self.suspended.is_empty() {
            return;
        }
        log::debug!("Restoring collisions on {} segments", self.suspended.len());
        for (body, mask) in std::mem::take(&mut self.suspended) {
            physics.set_collision_mask(body, mask);
        }
    }

    /// Cancel every timer the machine or its animator scheduled
    pub fn cleanup(&mut self) {
        self.timers.cancel_all();
        self.animator.stop_all();
    }

    /// Back to Falling with counters and dialogue cleared. The caller
    /// respawns the rig afterwards.
    pub fn reset(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine) {
        self.cleanup();
        self.animator.release_control(rig, physics);
        self.restore_collisions(physics);

        self.lifecycle.reset();
        self.contacts = 0;
        self.dialogue.clear();
        log::info!("Character reset to {}", self.state());
        self.notify(Notification::StateChanged(self.state()));
        self.notify(Notification::Dialogue(String::new()));
        self.notify(Notification::ContactCount(0));
    }

    /// Jump to `state` and start its phase from scratch
    pub fn enter_phase(&mut self, state: CharacterState, rig: &Rig, physics: &mut dyn PhysicsEngine) {
        self.cleanup();
        self.lifecycle.force(state);
        self.notify(Notification::StateChanged(state));
        self.resume_phase(rig, physics);
    }

    /// Restart whatever the current phase needs from the active animator
    fn resume_phase(&mut self, rig: &Rig, physics: &mut dyn PhysicsEngine) {
        match self.state() {
            CharacterState::Falling => self.animator.release_control(rig, physics),
            CharacterState::Standing => {
                if self.timers.is_scheduled(Task::Hold) {
                    self.animator.take_control(rig, physics);
                } else {
                    let plan = self.script.upright;
                    self.animator.start_upright(rig, physics, &plan);
                }
            }
            CharacterState::Speaking => {
                if self.timers.is_scheduled(Task::DialogueEnd) {
                    self.animator.take_control(rig, physics);
                } else {
                    self.start_speaking(rig, physics);
                }
            }
            CharacterState::Walking => {
                let plan = self.script.walk;
                self.animator.start_walk(rig, physics, &plan);
            }
            CharacterState::Climbing => {
                let plan = self.script.climb;
                self.animator.start_climb(rig, physics, &plan);
            }
        }
    }

    /// Replace the active animator. The old one is stopped and releases the
    /// rig before the new one touches it; the current phase then restarts on
    /// the new animator. Returns the replaced animator, or `None` if `kind`
    /// is already active.
    pub fn swap_animator(
        &mut self,
        kind: AnimatorKind,
        rig: &Rig,
        physics: &mut dyn PhysicsEngine,
    ) -> Option<Box<dyn PoseAnimator>> {
        if self.animator.kind() == kind {
            return None;
        }
        self.animator.stop_all();
        self.animator.release_control(rig, physics);

        let replacement = build_animator(kind, &self.direct, &self.target, &self.upright);
        let previous = std::mem::replace(&mut self.animator, replacement);
        log::info!("Animator {} -> {}", previous.kind(), kind);

        self.resume_phase(rig, physics);
        Some(previous)
    }
}

impl std::fmt::Debug for CharacterStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CharacterStateMachine")
            .field("state", &self.state())
            .field("contacts", &self.contacts)
            .field("dialogue", &self.dialogue)
            .field("animator", &self.animator.kind())
            .field("pending_timers", &self.timers.pending())
            .finish()
    }
}
