//! Stage configuration with layered loading
//!
//! Configuration is loaded from multiple sources (lowest to highest priority):
//! 1. Compiled defaults
//! 2. `tumble.ron` file (if exists)
//! 3. Environment variables prefixed with `TUMBLE_`
//!
//! Example environment variable: `TUMBLE_LIFECYCLE__WALK_SPEED=40`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::animation::{AnimatorKind, ClimbPlan, EaseType, LaunchPlan, UprightPlan, WalkPlan};

/// Configuration file looked up when no explicit path is given
pub const DEFAULT_CONFIG_FILE: &str = "tumble";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("ladder top y ({top_y}) must lie above the ground line ({ground_y})")]
    LadderBelowGround { top_y: f32, ground_y: f32 },

    #[error("{field} must be within [0, 1], got {value}")]
    OutOfUnitRange { field: &'static str, value: f32 },
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StageConfig {
    #[serde(default)]
    pub physics: PhysicsConfig,

    #[serde(default)]
    pub arena: ArenaConfig,

    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    #[serde(default)]
    pub direct: DirectConfig,

    #[serde(default)]
    pub target: TargetConfig,

    #[serde(default)]
    pub rig: RigConfig,
}

/// Physics stepping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Fixed timestep in milliseconds
    pub step_ms: u64,
    /// Downward acceleration in pixels/sec^2
    pub gravity: f32,
    /// Constraint passes per step (sandbox engine)
    pub iterations: usize,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            step_ms: 16,
            gravity: 980.0,
            iterations: 4,
        }
    }
}

/// Ground, walls and ladder placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub width: f32,
    /// Top edge of the ground
    pub ground_y: f32,
    pub ground_thickness: f32,
    pub wall_thickness: f32,
    pub ladder_x: f32,
    pub ladder_width: f32,
    /// Climb stops once the torso is at or above this line
    pub ladder_top_y: f32,
    pub rung_spacing: f32,
    /// Walking stops once the torso crosses this x
    pub marker_x: f32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            ground_y: 560.0,
            ground_thickness: 40.0,
            wall_thickness: 20.0,
            ladder_x: 50.0,
            ladder_width: 40.0,
            ladder_top_y: 90.0,
            rung_spacing: 60.0,
            marker_x: 120.0,
        }
    }
}

/// Life-cycle timing and jump parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Animator used on start
    pub animator: AnimatorKind,
    pub upright_ms: u64,
    pub upright_ease: EaseType,
    /// Pause after standing up
    pub hold_ms: u64,
    pub dialogue: String,
    pub dialogue_ms: u64,
    /// Walk speed in pixels/sec
    pub walk_speed: f32,
    /// How long collisions stay off after the jump
    pub collision_pause_ms: u64,
    pub jump_nudge: Vec2,
    /// Pixels/sec
    pub jump_velocity: Vec2,
    /// Max angular velocity (rad/sec) given to each segment
    pub jump_spin: f32,
    /// Seed of the jump RNG
    pub seed: u64,
    /// Reset the stage after it has been stalled this long. `None` only warns.
    pub stall_reset_ms: Option<u64>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            animator: AnimatorKind::Direct,
            upright_ms: 700,
            upright_ease: EaseType::Linear,
            hold_ms: 2000,
            dialogue: "Uh oh, I'm not dead!".to_string(),
            dialogue_ms: 2000,
            walk_speed: 28.0,
            collision_pause_ms: 500,
            jump_nudge: Vec2::new(6.0, -6.0),
            jump_velocity: Vec2::new(240.0, -360.0),
            jump_spin: 12.0,
            seed: 0x7475_6d62_6c65,
            stall_reset_ms: Some(3000),
        }
    }
}

/// Direct animator tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectConfig {
    pub tick_ms: u64,
    pub gait_period_ms: u64,
    /// Horizontal travel per tick while approaching the ladder
    pub approach_step: f32,
    pub climb_interval_ms: u64,
}

impl Default for DirectConfig {
    fn default() -> Self {
        Self {
            tick_ms: 16,
            gait_period_ms: 800,
            approach_step: 3.0,
            climb_interval_ms: 250,
        }
    }
}

/// Spring-target animator tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub tick_ms: u64,
    pub gait_period_ms: u64,
    pub approach_step: f32,
    pub climb_interval_ms: u64,
    /// Air drag applied to segments while under spring control
    pub air_damping: f32,
    pub spring_stiffness: f32,
    pub spring_damping: f32,
    /// Distance at which the torso proxy counts as on the ladder
    pub arrival_tolerance: f32,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            tick_ms: 16,
            gait_period_ms: 480,
            approach_step: 3.0,
            climb_interval_ms: 220,
            air_damping: 0.08,
            spring_stiffness: 0.98,
            spring_damping: 0.4,
            arrival_tolerance: 0.5,
        }
    }
}

/// Where the rig spawns and which geometry it uses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    pub spawn: Vec2,
    /// RON rig description; the built-in humanoid when unset
    pub file: Option<PathBuf>,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            spawn: Vec2::new(400.0, 50.0),
            file: None,
        }
    }
}

impl StageConfig {
    /// Load configuration with layered priority:
    /// 1. Compiled defaults (lowest priority)
    /// 2. `path`, or `tumble.ron` in the working directory (if exists)
    /// 3. Environment variables prefixed with `TUMBLE_` (highest priority)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).format(FileFormat::Ron).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE)
                .format(FileFormat::Ron)
                .required(false),
        };

        let config = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("TUMBLE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .context("Failed to build configuration")?;

        let loaded: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        loaded.validate().context("Invalid configuration")?;
        Ok(loaded)
    }

    /// Parse a RON document on top of the defaults
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(text, FileFormat::Ron))
            .build()
            .context("Failed to parse configuration")?;
        let loaded: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        loaded.validate().context("Invalid configuration")?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("physics.step_ms", self.physics.step_ms as f64)?;
        positive("arena.rung_spacing", self.arena.rung_spacing as f64)?;
        positive("arena.width", self.arena.width as f64)?;
        positive("lifecycle.upright_ms", self.lifecycle.upright_ms as f64)?;
        positive("lifecycle.hold_ms", self.lifecycle.hold_ms as f64)?;
        positive("lifecycle.dialogue_ms", self.lifecycle.dialogue_ms as f64)?;
        positive("lifecycle.walk_speed", self.lifecycle.walk_speed as f64)?;
        positive("direct.tick_ms", self.direct.tick_ms as f64)?;
        positive("direct.gait_period_ms", self.direct.gait_period_ms as f64)?;
        positive("direct.approach_step", self.direct.approach_step as f64)?;
        positive("direct.climb_interval_ms", self.direct.climb_interval_ms as f64)?;
        positive("target.tick_ms", self.target.tick_ms as f64)?;
        positive("target.gait_period_ms", self.target.gait_period_ms as f64)?;
        positive("target.approach_step", self.target.approach_step as f64)?;
        positive("target.climb_interval_ms", self.target.climb_interval_ms as f64)?;

        if self.arena.ladder_top_y >= self.arena.ground_y {
            return Err(ConfigError::LadderBelowGround {
                top_y: self.arena.ladder_top_y,
                ground_y: self.arena.ground_y,
            });
        }

        unit("target.air_damping", self.target.air_damping)?;
        unit("target.spring_stiffness", self.target.spring_stiffness)?;
        unit("target.spring_damping", self.target.spring_damping)?;
        Ok(())
    }

    /// Stand-up parameters
    pub fn upright_plan(&self) -> UprightPlan {
        UprightPlan {
            duration_ms: self.lifecycle.upright_ms,
            ground_y: self.arena.ground_y,
            ease: self.lifecycle.upright_ease,
        }
    }

    /// Walk toward the ladder marker
    pub fn walk_plan(&self) -> WalkPlan {
        WalkPlan {
            speed: self.lifecycle.walk_speed,
            marker_x: self.arena.marker_x,
            ground_y: self.arena.ground_y,
        }
    }

    pub fn climb_plan(&self) -> ClimbPlan {
        ClimbPlan {
            ladder_x: self.arena.ladder_x,
            top_y: self.arena.ladder_top_y,
            rung_spacing: self.arena.rung_spacing,
        }
    }

    pub fn launch_plan(&self) -> LaunchPlan {
        LaunchPlan {
            nudge: self.lifecycle.jump_nudge,
            velocity: self.lifecycle.jump_velocity,
            spin: self.lifecycle.jump_spin,
        }
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

fn unit(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfUnitRange { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StageConfig::default();
        assert_eq!(config.arena.ground_y, 560.0);
        assert_eq!(config.arena.ladder_x, 50.0);
        assert_eq!(config.lifecycle.hold_ms, 2000);
        assert_eq!(config.lifecycle.walk_speed, 28.0);
        assert_eq!(config.direct.climb_interval_ms, 250);
        assert_eq!(config.target.climb_interval_ms, 220);
        assert_eq!(config.lifecycle.animator, AnimatorKind::Direct);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config = StageConfig::from_ron_str(
            r#"(
                arena: (ladder_x: 80.0, marker_x: 150.0),
                lifecycle: (animator: "target", dialogue: "Hello"),
            )"#,
        )
        .expect("Failed to parse config");

        assert_eq!(config.arena.ladder_x, 80.0);
        assert_eq!(config.arena.marker_x, 150.0);
        assert_eq!(config.arena.ground_y, 560.0);
        assert_eq!(config.lifecycle.animator, AnimatorKind::Target);
        assert_eq!(config.lifecycle.dialogue, "Hello");
        assert_eq!(config.lifecycle.hold_ms, 2000);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = StageConfig::default();
        config.lifecycle.walk_speed = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NotPositive {
                field: "lifecycle.walk_speed",
                ..
            })
        ));

        let mut config = StageConfig::default();
        config.arena.ladder_top_y = 600.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::LadderBelowGround { .. })
        ));

        let mut config = StageConfig::default();
        config.arena.rung_spacing = -60.0;
        assert!(config.validate().is_err());

        let mut config = StageConfig::default();
        config.target.spring_stiffness = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfUnitRange { .. })
        ));
    }

    #[test]
    fn test_invalid_file_is_reported() {
        let result = StageConfig::from_ron_str("(arena: (rung_spacing: 0.0))");
        assert!(result.is_err());
    }

    #[test]
    fn test_plans_follow_config() {
        let config = StageConfig::default();
        let climb = config.climb_plan();
        assert_eq!(climb.step_height(), 30.0);
        assert_eq!(config.walk_plan().marker_x, 120.0);
        assert_eq!(config.upright_plan().duration_ms, 700);
        assert_eq!(config.launch_plan().velocity, Vec2::new(240.0, -360.0));
    }
}
