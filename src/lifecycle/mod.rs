//! The module-change protocol: interface resolution, the per-transition
//! state machine, install planning, and the three-phase orchestrator.

pub mod change;
pub mod interfaces;
pub mod orchestrator;
pub mod planner;

pub use change::ChangeEngine;
pub use orchestrator::InstallOrchestrator;
pub use planner::{InstallPlanner, PlannedInstall};
