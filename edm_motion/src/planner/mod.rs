//! Scalar trajectory planning.
//!
//! - [`jerk`] - Discrete S-curve planner producing one increment per cycle
//! - [`wrapper`] - Pause/resume/stop/speed-change on top of the planner

pub mod jerk;
pub mod wrapper;

pub use jerk::JerkLimitedPlanner;
pub use wrapper::PlannerWrapper;
