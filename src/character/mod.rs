//! Character life cycle: the state table and the machine that drives the
//! active animator through it

mod machine;
mod state;

pub use machine::{CharacterStateMachine, Notification};
pub use state::{transition, CharacterState, Lifecycle, LifecycleInput};
