//! Stepped tweening with keyframe easing

use keyframe::{ease, functions};
use serde::{Deserialize, Serialize};

/// Fewest steps any tween is split into
pub const MIN_TWEEN_STEPS: u32 = 8;

/// Shortest interval between tween steps (about 60 Hz)
pub const MIN_STEP_MS: u64 = 16;

/// Easing curve applied to tween progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EaseType {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
}

impl EaseType {
    /// Map normalized time (0..=1) onto eased progress
    pub fn apply(&self, t: f32) -> f32 {
        let t = (t as f64).clamp(0.0, 1.0);
        let result = match self {
            EaseType::Linear => ease(functions::Linear, 0.0, 1.0, t),
            EaseType::EaseIn => ease(functions::EaseIn, 0.0, 1.0, t),
            EaseType::EaseOut => ease(functions::EaseOut, 0.0, 1.0, t),
            EaseType::EaseInOut => ease(functions::EaseInOut, 0.0, 1.0, t),
        };
        result as f32
    }
}

/// Number of steps a tween of `duration_ms` is sampled at
pub fn tween_steps(duration_ms: u64) -> u32 {
    let steps = (duration_ms / MIN_STEP_MS).min(u32::MAX as u64) as u32;
    steps.max(MIN_TWEEN_STEPS)
}

/// Delay between two steps
pub fn tween_interval(duration_ms: u64, steps: u32) -> u64 {
    (duration_ms / steps.max(1) as u64).max(MIN_STEP_MS)
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Progress counter of a tween sampled at fixed steps
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteppedTween {
    steps: u32,
    step: u32,
    ease: EaseType,
}

impl SteppedTween {
    pub fn new(duration_ms: u64, ease: EaseType) -> Self {
        Self {
            steps: tween_steps(duration_ms),
            step: 0,
            ease,
        }
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Interval the owner should schedule steps at
    pub fn interval_ms(&self, duration_ms: u64) -> u64 {
        tween_interval(duration_ms, self.steps)
    }

    /// Take one step and return eased progress. The final step yields exactly 1.
    pub fn advance(&mut self) -> f32 {
        self.step = (self.step + 1).min(self.steps);
        if self.is_finished() {
            1.0
        } else {
            self.ease.apply(self.step as f32 / self.steps as f32)
        }
    }

    pub fn is_finished(&self) -> bool {
        self.step >= self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_count_and_interval() {
        assert_eq!(tween_steps(700), 43);
        assert_eq!(tween_interval(700, 43), 16);
        // Short tweens are floored to 8 steps of at least 16 ms
        assert_eq!(tween_steps(40), 8);
        assert_eq!(tween_interval(40, 8), 16);
        assert_eq!(tween_steps(0), 8);
    }

    #[test]
    fn test_last_step_is_exact() {
        let mut tween = SteppedTween::new(700, EaseType::EaseInOut);
        let mut last = 0.0;
        let mut count = 0;
        while !tween.is_finished() {
            let progress = tween.advance();
            assert!(progress >= last);
            last = progress;
            count += 1;
        }
        assert_eq!(count, tween.steps());
        assert_eq!(last, 1.0);
    }

    #[test]
    fn test_linear_midpoint() {
        assert!((EaseType::Linear.apply(0.5) - 0.5).abs() < 1e-6);
        assert_eq!(EaseType::EaseIn.apply(-1.0), 0.0);
        assert!((EaseType::EaseOut.apply(2.0) - 1.0).abs() < 1e-6);
    }
}
