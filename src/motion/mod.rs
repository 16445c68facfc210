// Motion control for the BOXZ robot
//
// Provides:
// - Differential drive dispatch (keywords, speed vectors, RAW words)
// - Lockstep servo interpolation, sweeps and step nudges for the two hands

pub mod drive;
pub mod servo;

pub use drive::{Direction, DriveAction, DriveKeyword, plan_keyword, plan_vector};
pub use servo::{Gesture, ServoTargets, Trajectory, plan_interpolation};
