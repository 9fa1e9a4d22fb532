//! Life-cycle state machine.
//!
//! The cycle is strictly forward:
//! Falling -> Standing -> Speaking -> Walking -> Climbing -> Falling.
//! Anything else is rejected, which is what makes duplicate triggers
//! (a second ground contact, a late timer) harmless.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Life-cycle state of the character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CharacterState {
    /// Ragdoll under physics only
    #[default]
    Falling,
    /// Settling into the upright pose, then holding it
    Standing,
    /// Dialogue line on screen
    Speaking,
    /// Gait toward the ladder
    Walking,
    /// On the ladder
    Climbing,
}

impl CharacterState {
    /// Order of the cycle, starting from the initial state
    pub const CYCLE: [CharacterState; 5] = [
        CharacterState::Falling,
        CharacterState::Standing,
        CharacterState::Speaking,
        CharacterState::Walking,
        CharacterState::Climbing,
    ];

    /// Whether physics alone drives the ragdoll in this state
    pub fn is_physical(&self) -> bool {
        matches!(self, CharacterState::Falling)
    }

    /// State that follows this one in the cycle
    pub fn next(&self) -> CharacterState {
        match self {
            CharacterState::Falling => CharacterState::Standing,
            CharacterState::Standing => CharacterState::Speaking,
            CharacterState::Speaking => CharacterState::Walking,
            CharacterState::Walking => CharacterState::Climbing,
            CharacterState::Climbing => CharacterState::Falling,
        }
    }
}

impl fmt::Display for CharacterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CharacterState::Falling => "falling",
            CharacterState::Standing => "standing",
            CharacterState::Speaking => "speaking",
            CharacterState::Walking => "walking",
            CharacterState::Climbing => "climbing",
        };
        f.write_str(name)
    }
}

/// Input events for state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleInput {
    /// Qualifying ground contact while falling
    Landed,
    /// Upright hold after the stand-up tween is over
    HoldElapsed,
    /// Dialogue display time is over
    DialogueElapsed,
    /// Gait reached the ladder marker
    ReachedLadder,
    /// Climb reached the top; the jump follows
    ReachedTop,
}

/// Transition table. Returns `None` for every pair outside the cycle.
pub fn transition(current: CharacterState, input: LifecycleInput) -> Option<CharacterState> {
    use CharacterState::*;
    use LifecycleInput::*;

    match (current, input) {
        (Falling, Landed) => Some(Standing),
        (Standing, HoldElapsed) => Some(Speaking),
        (Speaking, DialogueElapsed) => Some(Walking),
        (Walking, ReachedLadder) => Some(Climbing),
        (Climbing, ReachedTop) => Some(Falling),
        _ => None,
    }
}

/// Current state plus the number of transitions taken
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    state: CharacterState,
    transitions: u64,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> CharacterState {
        self.state
    }

    /// Completed transitions since creation
    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    /// Attempt a transition.
    ///
    /// Returns `true` if the transition was valid and occurred,
    /// `false` if it was rejected from the current state.
    pub fn apply(&mut self, input: LifecycleInput) -> bool {
        match transition(self.state, input) {
            Some(next) => {
                self.state = next;
                self.transitions += 1;
                true
            }
            None => {
                log::trace!("Invalid transition: {:?} + {:?} -> rejected", self.state, input);
                false
            }
        }
    }

    /// Back to Falling, outside the normal cycle
    pub fn reset(&mut self) {
        self.force(CharacterState::Falling);
    }

    /// Jump straight to `state`, bypassing the table
    pub fn force(&mut self, state: CharacterState) {
        if state != self.state {
            log::debug!("Forcing state {:?} -> {:?}", self.state, state);
        }
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INPUTS: [LifecycleInput; 5] = [
        LifecycleInput::Landed,
        LifecycleInput::HoldElapsed,
        LifecycleInput::DialogueElapsed,
        LifecycleInput::ReachedLadder,
        LifecycleInput::ReachedTop,
    ];

    #[test]
    fn test_full_cycle() {
        let mut lifecycle = Lifecycle::new();
        let mut visited = vec![lifecycle.current()];
        for input in INPUTS {
            assert!(lifecycle.apply(input));
            visited.push(lifecycle.current());
        }
        assert_eq!(
            visited,
            vec![
                CharacterState::Falling,
                CharacterState::Standing,
                CharacterState::Speaking,
                CharacterState::Walking,
                CharacterState::Climbing,
                CharacterState::Falling,
            ]
        );
        assert_eq!(lifecycle.transitions(), 5);
    }

    #[test]
    fn test_exactly_one_input_per_state() {
        for state in CharacterState::CYCLE {
            let accepted: Vec<_> = INPUTS
                .iter()
                .filter_map(|input| transition(state, *input))
                .collect();
            assert_eq!(accepted, vec![state.next()], "from {}", state);
        }
    }

    #[test]
    fn test_duplicate_landing_rejected() {
        let mut lifecycle = Lifecycle::new();
        assert!(lifecycle.apply(LifecycleInput::Landed));
        assert!(!lifecycle.apply(LifecycleInput::Landed));
        assert_eq!(lifecycle.current(), CharacterState::Standing);
        assert_eq!(lifecycle.transitions(), 1);
    }

    #[test]
    fn test_reset_returns_to_falling() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.apply(LifecycleInput::Landed);
        lifecycle.apply(LifecycleInput::HoldElapsed);
        lifecycle.reset();
        assert_eq!(lifecycle.current(), CharacterState::Falling);
        assert!(lifecycle.current().is_physical());
    }
}
