//! Bounded agent orchestration over the MCP runtime.
//!
//! This crate turns a goal into a sequence of tool calls: an external
//! [`Planner`] decides each step, the [`Orchestrator`] enforces the step
//! budget and records the per-run trace, and failed tool calls flow back to
//! the planner as data rather than aborting the run.
//!
//! # Main types
//!
//! - [`Planner`] — The decision seam; implement this to drive the loop.
//! - [`PlannerAction`] — One tool call or the final answer.
//! - [`Orchestrator`] — The bounded loop itself.
//! - [`CancelToken`] — Cooperative cancellation between steps.

/// The bounded orchestration loop.
pub mod orchestrator;
/// The planner trait and its context types.
pub mod planner;

pub use orchestrator::{CancelToken, Orchestrator, RunError, RunReport};
pub use planner::{PlanContext, Planner, PlannerAction, StepRecord};
