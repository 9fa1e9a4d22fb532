//! Stage: arena, rig and character driven on a fixed timestep
//!
//! The stage owns the physics engine and is the only place that steps it.
//! Each tick steps physics, routes contact events through the character's
//! contact gate, then advances the character (machine timers and the active
//! animator) by the same amount of time.

use glam::Vec2;
use thiserror::Error;

use crate::animation::AnimatorKind;
use crate::character::{CharacterState, CharacterStateMachine, Notification};
use crate::config::{ArenaConfig, ConfigError, StageConfig};
use crate::physics::{
    BodyDesc, BodyId, BodyMode, CollisionMask, PhysicsEngine, RapierWorld, SandboxWorld, Shape,
};
use crate::rig::{Rig, RigError, RigSpec, SegmentTransform};

#[derive(Debug, Error)]
pub enum StageError {
    #[error("invalid rig: {0}")]
    Rig(#[from] RigError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Static scenery: ground slab, side walls and the ladder sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arena {
    pub ground: BodyId,
    pub walls: [BodyId; 2],
    pub ladder: BodyId,
}

impl Arena {
    pub fn spawn(physics: &mut dyn PhysicsEngine, config: &ArenaConfig) -> Self {
        let half_width = config.width / 2.0;
        let ground = physics.create_body(
            &BodyDesc::new(
                Vec2::new(half_width, config.ground_y + config.ground_thickness / 2.0),
                BodyMode::Fixed,
            )
            .with_shape(Shape::Rect {
                half_extents: Vec2::new(half_width, config.ground_thickness / 2.0),
            })
            .with_material(1.0, 0.8, 0.0)
            .with_collision(CollisionMask::world()),
        );

        let wall_half = Vec2::new(config.wall_thickness / 2.0, config.ground_y / 2.0);
        let walls = [wall_half.x, config.width - wall_half.x].map(|x| {
            physics.create_body(
                &BodyDesc::new(Vec2::new(x, wall_half.y), BodyMode::Fixed)
                    .with_shape(Shape::Rect {
                        half_extents: wall_half,
                    })
                    .with_collision(CollisionMask::world()),
            )
        });

        let ladder_height = config.ground_y - config.ladder_top_y;
        let ladder = physics.create_body(
            &BodyDesc::new(
                Vec2::new(config.ladder_x, config.ladder_top_y + ladder_height / 2.0),
                BodyMode::Fixed,
            )
            .with_shape(Shape::Rect {
                half_extents: Vec2::new(config.ladder_width / 2.0, ladder_height / 2.0),
            })
            .with_collision(CollisionMask::ladder())
            .as_sensor(),
        );

        log::debug!(
            "Arena: ground at y={:.1}, ladder at x={:.1} (top y={:.1})",
            config.ground_y,
            config.ladder_x,
            config.ladder_top_y
        );

        Self {
            ground,
            walls,
            ladder,
        }
    }

    pub fn is_ground(&self, body: BodyId) -> bool {
        body == self.ground
    }
}

/// Everything one simulated character needs
pub struct Stage<P: PhysicsEngine> {
    physics: P,
    config: StageConfig,
    arena: Arena,
    rig: Rig,
    machine: CharacterStateMachine,
    now_ms: u64,
    ticks: u64,
    cycles: u64,
    /// When the current stall was first seen
    stalled_since: Option<u64>,
}

impl Stage<SandboxWorld> {
    /// Stage on the deterministic sandbox engine
    pub fn sandbox(config: StageConfig, spec: &RigSpec) -> Result<Self, StageError> {
        let mut physics = SandboxWorld::new(Vec2::new(0.0, config.physics.gravity));
        physics.set_iterations(config.physics.iterations);
        Self::new(physics, config, spec)
    }
}

impl Stage<RapierWorld> {
    /// Stage on rapier2d
    pub fn rapier(config: StageConfig, spec: &RigSpec) -> Result<Self, StageError> {
        let physics = RapierWorld::new(Vec2::new(0.0, config.physics.gravity));
        Self::new(physics, config, spec)
    }
}

impl<P: PhysicsEngine> Stage<P> {
    pub fn new(mut physics: P, config: StageConfig, spec: &RigSpec) -> Result<Self, StageError> {
        config.validate()?;

        let arena = Arena::spawn(&mut physics, &config.arena);
        let rig = Rig::spawn(&mut physics, spec, config.rig.spawn)?;
        let skipped = spec.upright.validate(&rig);
        if !skipped.is_empty() {
            log::info!("Upright pose skips {} parts this rig lacks", skipped.len());
        }
        let mut machine = CharacterStateMachine::new(&config, spec.upright.clone());
        machine.set_ground([arena.ground]);

        log::info!(
            "Stage ready: {} segments, {} animator",
            rig.len(),
            machine.animator_kind()
        );

        Ok(Self {
            physics,
            config,
            arena,
            rig,
            machine,
            now_ms: 0,
            ticks: 0,
            cycles: 0,
            stalled_since: None,
        })
    }

    /// One fixed step: physics, contact routing, then the character
    pub fn tick(&mut self) {
        let step_ms = self.config.physics.step_ms;
        let state_before = self.machine.state();

        self.physics.step(step_ms as f32 / 1000.0);
        for event in self.physics.drain_contact_events() {
            self.machine
                .handle_contact(&self.rig, &mut self.physics, &event);
        }
        self.machine.advance(&self.rig, &mut self.physics, step_ms);

        self.now_ms += step_ms;
        self.ticks += 1;

        if state_before == CharacterState::Climbing && self.machine.state() == CharacterState::Falling {
            self.cycles += 1;
            log::info!("Cycle {} complete at {} ms", self.cycles, self.now_ms);
        }

        if !self.machine.is_stalled() {
            self.stalled_since = None;
            return;
        }
        let Some(since) = self.stalled_since else {
            log::warn!(
                "Character stalled in {} with nothing scheduled",
                self.machine.state()
            );
            self.stalled_since = Some(self.now_ms);
            return;
        };
        if let Some(limit) = self.config.lifecycle.stall_reset_ms {
            if self.now_ms - since >= limit {
                log::warn!("Stalled for {} ms, resetting", self.now_ms - since);
                self.reset();
            }
        }
    }

    /// Tick until at least `duration_ms` has passed
    pub fn run_for(&mut self, duration_ms: u64) {
        let until = self.now_ms + duration_ms;
        while self.now_ms < until {
            self.tick();
        }
    }

    /// Tick until `done` holds or `max_ms` has passed. Returns whether
    /// `done` was met.
    pub fn run_until<F>(&mut self, max_ms: u64, mut done: F) -> bool
    where
        F: FnMut(&Self) -> bool,
    {
        let until = self.now_ms + max_ms;
        while self.now_ms < until {
            if done(self) {
                return true;
            }
            self.tick();
        }
        done(self)
    }

    /// Cancel everything and drop the rig back at the spawn point
    pub fn reset(&mut self) {
        self.machine.reset(&self.rig, &mut self.physics);
        self.rig.respawn(&mut self.physics, self.config.rig.spawn);
        // Contacts from before the respawn are stale
        self.physics.drain_contact_events();
        self.stalled_since = None;
    }

    /// Switch posing strategy at runtime. Returns false if `kind` was
    /// already active.
    pub fn swap_animator(&mut self, kind: AnimatorKind) -> bool {
        self.machine
            .swap_animator(kind, &self.rig, &mut self.physics)
            .is_some()
    }

    /// Move the whole rig so the torso lands on `position`, keeping its shape
    pub fn teleport(&mut self, position: Vec2) {
        if let Some(current) = self.rig.reference_position(&self.physics) {
            self.rig.translate(&mut self.physics, position - current);
        }
    }

    /// Force the character into `state` and start that phase
    pub fn enter_phase(&mut self, state: CharacterState) {
        self.machine.enter_phase(state, &self.rig, &mut self.physics);
    }

    pub fn segment_transforms(&self) -> Vec<SegmentTransform> {
        self.rig.transforms(&self.physics)
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.machine.drain_notifications()
    }

    pub fn state(&self) -> CharacterState {
        self.machine.state()
    }

    pub fn machine(&self) -> &CharacterStateMachine {
        &self.machine
    }

    pub fn rig(&self) -> &Rig {
        &self.rig
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    pub fn physics(&self) -> &P {
        &self.physics
    }

    pub fn physics_mut(&mut self) -> &mut P {
        &mut self.physics
    }

    /// Torso position
    pub fn position(&self) -> Option<Vec2> {
        self.rig.reference_position(&self.physics)
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Completed jumps off the ladder
    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::ContactEvent;
    use crate::rig::Part;

    fn stage() -> Stage<SandboxWorld> {
        Stage::sandbox(StageConfig::default(), &RigSpec::humanoid()).unwrap()
    }

    #[test]
    fn test_arena_layout() {
        let stage = stage();
        let physics = stage.physics();
        let arena = stage.arena();

        let ground = physics.position(arena.ground).unwrap();
        assert_eq!(ground, Vec2::new(400.0, 580.0));
        let ladder = physics.position(arena.ladder).unwrap();
        assert_eq!(ladder, Vec2::new(50.0, 325.0));
        assert_eq!(physics.collision_mask(arena.ladder), Some(CollisionMask::ladder()));
        assert!(arena.is_ground(arena.ground));
        assert!(!arena.is_ground(arena.ladder));
        assert_eq!(physics.body_count(), 4 + 14);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = StageConfig::default();
        config.arena.rung_spacing = 0.0;
        let result = Stage::sandbox(config, &RigSpec::humanoid());
        assert!(matches!(result, Err(StageError::Config(_))));

        let spec = RigSpec::humanoid().without(&[Part::Torso]);
        let result = Stage::sandbox(StageConfig::default(), &spec);
        assert!(matches!(result, Err(StageError::Rig(RigError::MissingReference(_)))));
    }

    #[test]
    fn test_ladder_contact_does_not_settle() {
        let mut stage = stage();
        let torso = stage.rig().body(Part::Torso).unwrap();
        let ladder = stage.arena().ladder;
        stage
            .physics_mut()
            .inject_contact(ContactEvent::Started(ladder, torso));
        stage.tick();
        assert_eq!(stage.state(), CharacterState::Falling);

        let ground = stage.arena().ground;
        stage
            .physics_mut()
            .inject_contact(ContactEvent::Started(torso, ground));
        stage.tick();
        assert_eq!(stage.state(), CharacterState::Standing);
    }

    #[test]
    fn test_reset_respawns_rig() {
        let mut stage = stage();
        stage.run_for(480);
        let ground = stage.arena().ground;
        let torso = stage.rig().body(Part::Torso).unwrap();
        stage
            .physics_mut()
            .inject_contact(ContactEvent::Started(ground, torso));
        stage.tick();
        assert_eq!(stage.state(), CharacterState::Standing);

        stage.reset();
        assert_eq!(stage.state(), CharacterState::Falling);
        assert_eq!(stage.position(), Some(Vec2::new(400.0, 50.0)));
        assert!(!stage.machine().animator().is_animating());
    }

    #[test]
    fn test_stall_resets_after_limit() {
        let mut stage = stage();
        stage.teleport(Vec2::new(300.0, 527.5));
        stage.enter_phase(CharacterState::Walking);
        stage.tick();
        // Drop every timer so nothing can drive the next transition
        stage.machine.cleanup();
        assert!(stage.machine().is_stalled());

        stage.run_for(2000);
        assert_eq!(stage.state(), CharacterState::Walking);
        stage.drain_notifications();
        stage.run_for(1100);
        assert_eq!(stage.state(), CharacterState::Falling);
        assert!(!stage.machine().is_stalled());
        assert!(stage
            .drain_notifications()
            .contains(&Notification::StateChanged(CharacterState::Falling)));
        assert!(stage.position().is_some_and(|p| p.x == 400.0 && p.y < 200.0));
    }

    #[test]
    fn test_stall_without_limit_only_warns() {
        let mut config = StageConfig::default();
        config.lifecycle.stall_reset_ms = None;
        let mut stage = Stage::sandbox(config, &RigSpec::humanoid()).unwrap();
        stage.teleport(Vec2::new(300.0, 527.5));
        stage.enter_phase(CharacterState::Walking);
        stage.machine.cleanup();

        stage.run_for(5000);
        assert_eq!(stage.state(), CharacterState::Walking);
        assert!(stage.machine().is_stalled());
    }

    #[test]
    fn test_swap_animator_reports_change() {
        let mut stage = stage();
        assert!(stage.swap_animator(AnimatorKind::Target));
        assert!(!stage.swap_animator(AnimatorKind::Target));
        assert_eq!(stage.machine().animator_kind(), AnimatorKind::Target);
    }
}
