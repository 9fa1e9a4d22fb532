//! Hand-authored gait and climb cycles

use std::f32::consts::{FRAC_PI_2, TAU};

use crate::rig::{Part, Pose};

/// Periodic joint-angle function of phase `t` in `[0, 2π)`.
///
/// Every part gets an angle so joints never keep a target from the
/// previous phase. Implementations must be continuous and return to their start value as
/// `t` wraps, so repeated evaluation loops without a seam.
pub trait GaitCycle {
    /// Duration of one full cycle
    fn period_ms(&self) -> u64;

    /// Joint angles at phase `t`
    fn angles(&self, t: f32) -> Pose;

    /// Phase reached after `elapsed_ms` of playback
    fn phase_at(&self, elapsed_ms: u64) -> f32 {
        let period = self.period_ms().max(1);
        (elapsed_ms % period) as f32 / period as f32 * TAU
    }
}

/// Relaxed walk used by the direct animator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrollGait {
    pub period_ms: u64,
    pub thigh: f32,
    pub shin: f32,
    pub foot: f32,
    pub arm: f32,
}

impl Default for StrollGait {
    fn default() -> Self {
        Self {
            period_ms: 800,
            thigh: 0.12,
            shin: 0.06,
            foot: 0.015,
            arm: 0.08,
        }
    }
}

impl GaitCycle for StrollGait {
    fn period_ms(&self) -> u64 {
        self.period_ms
    }

    fn angles(&self, t: f32) -> Pose {
        let s = t.sin();
        Pose::from_angles([
            (Part::LeftThigh, self.thigh * s),
            (Part::RightThigh, -self.thigh * s),
            (Part::LeftShin, -self.shin * s),
            (Part::RightShin, self.shin * s),
            (Part::LeftFoot, self.foot * s),
            (Part::RightFoot, -self.foot * s),
            (Part::LeftUpperArm, -self.arm * s),
            (Part::RightUpperArm, self.arm * s),
            (Part::Head, 0.0),
            (Part::Torso, 0.0),
            (Part::LeftForearm, 0.0),
            (Part::RightForearm, 0.0),
            (Part::LeftHand, 0.0),
            (Part::RightHand, 0.0),
        ])
    }
}

/// Long forward-leaning stride used by the target animator.
/// Shins and feet run a quarter cycle ahead of the thighs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrideGait {
    pub period_ms: u64,
    pub thigh: f32,
    pub shin: f32,
    pub foot: f32,
    pub arm: f32,
    /// Knee bend held on top of the swing
    pub knee_bias: f32,
    pub lean: f32,
    pub lean_sway: f32,
}

impl Default for StrideGait {
    fn default() -> Self {
        Self {
            period_ms: 480,
            thigh: 0.32,
            shin: 0.18,
            foot: 0.05,
            arm: 0.22,
            knee_bias: 0.04,
            lean: -0.12,
            lean_sway: 0.03,
        }
    }
}

impl GaitCycle for StrideGait {
    fn period_ms(&self) -> u64 {
        self.period_ms
    }

    fn angles(&self, t: f32) -> Pose {
        let s = t.sin();
        let lead = (t + FRAC_PI_2).sin();
        Pose::from_angles([
            (Part::LeftThigh, self.thigh * s),
            (Part::RightThigh, -self.thigh * s),
            (Part::LeftShin, -self.shin * lead - self.knee_bias),
            (Part::RightShin, self.shin * lead + self.knee_bias),
            (Part::LeftFoot, self.foot * lead),
            (Part::RightFoot, -self.foot * lead),
            (Part::LeftUpperArm, -self.arm * s),
            (Part::RightUpperArm, self.arm * s),
            (Part::Torso, self.lean + self.lean_sway * s),
            (Part::Head, 0.0),
            (Part::LeftForearm, 0.0),
            (Part::RightForearm, 0.0),
            (Part::LeftHand, 0.0),
            (Part::RightHand, 0.0),
        ])
    }
}

/// Two-phase left-reach / right-reach climbing cycle
#[derive(Debug, Clone, PartialEq)]
pub struct ClimbReach {
    phases: [Pose; 2],
}

impl ClimbReach {
    /// Limb swing for direct posing
    pub fn direct() -> Self {
        Self {
            phases: [
                Pose::from_angles([
                    (Part::LeftUpperArm, -0.4),
                    (Part::RightUpperArm, 0.1),
                    (Part::LeftThigh, -0.2),
                    (Part::RightThigh, 0.05),
                ]),
                Pose::from_angles([
                    (Part::LeftUpperArm, 0.1),
                    (Part::RightUpperArm, -0.4),
                    (Part::LeftThigh, 0.05),
                    (Part::RightThigh, -0.2),
                ]),
            ],
        }
    }

    /// Braced variant for spring posing, torso tipped toward the ladder
    pub fn braced() -> Self {
        Self {
            phases: [
                Pose::from_angles([
                    (Part::LeftUpperArm, -0.4),
                    (Part::RightUpperArm, -0.1),
                    (Part::LeftThigh, -0.2),
                    (Part::RightThigh, -0.05),
                    (Part::Torso, -0.05),
                ]),
                Pose::from_angles([
                    (Part::LeftUpperArm, 0.1),
                    (Part::RightUpperArm, -0.4),
                    (Part::LeftThigh, 0.05),
                    (Part::RightThigh, -0.2),
                    (Part::Torso, -0.05),
                ]),
            ],
        }
    }

    /// Pose for climb step `step` (phases alternate)
    pub fn pose(&self, step: usize) -> &Pose {
        &self.phases[step % 2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_loops<G: GaitCycle>(gait: &G) {
        let start = gait.angles(0.0);
        let end = gait.angles(TAU - 1e-4);
        for (part, angle) in start.angles() {
            let wrapped = end.target(part).and_then(|t| t.angle).unwrap();
            assert!((angle - wrapped).abs() < 1e-3, "{} jumps at wrap", part);
        }
    }

    #[test]
    fn test_gaits_loop_seamlessly() {
        assert_loops(&StrollGait::default());
        assert_loops(&StrideGait::default());
    }

    #[test]
    fn test_gaits_are_continuous() {
        let gait = StrideGait::default();
        let steps = 360;
        for i in 0..steps {
            let a = gait.angles(i as f32 / steps as f32 * TAU);
            let b = gait.angles((i + 1) as f32 / steps as f32 * TAU);
            for (part, angle) in a.angles() {
                let next = b.target(part).and_then(|t| t.angle).unwrap();
                assert!((angle - next).abs() < 0.01, "{} at step {}", part, i);
            }
        }
    }

    #[test]
    fn test_legs_swing_in_opposition() {
        let pose = StrollGait::default().angles(FRAC_PI_2);
        let left = pose.target(Part::LeftThigh).and_then(|t| t.angle).unwrap();
        let right = pose.target(Part::RightThigh).and_then(|t| t.angle).unwrap();
        assert!((left - 0.12).abs() < 1e-6);
        assert!((left + right).abs() < 1e-6);
    }

    #[test]
    fn test_gaits_pose_every_part() {
        for pose in [
            StrollGait::default().angles(1.0),
            StrideGait::default().angles(1.0),
        ] {
            assert_eq!(pose.angles().count(), Part::ALL.len());
            for part in [Part::Head, Part::LeftForearm, Part::RightHand] {
                assert_eq!(pose.target(part).and_then(|t| t.angle), Some(0.0));
            }
        }
        let stroll = StrollGait::default().angles(2.0);
        assert_eq!(stroll.target(Part::Torso).and_then(|t| t.angle), Some(0.0));
    }

    #[test]
    fn test_phase_wraps_with_period() {
        let gait = StrollGait::default();
        assert_eq!(gait.phase_at(0), 0.0);
        assert!((gait.phase_at(400) - std::f32::consts::PI).abs() < 1e-5);
        assert_eq!(gait.phase_at(800), 0.0);
    }

    #[test]
    fn test_climb_phases_alternate() {
        let climb = ClimbReach::direct();
        assert_eq!(climb.pose(0), climb.pose(2));
        assert_ne!(climb.pose(0), climb.pose(1));
        assert_eq!(ClimbReach::braced().pose(1).len(), 5);
    }
}
