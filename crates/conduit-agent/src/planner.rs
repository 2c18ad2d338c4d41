//! The planning seam.
//!
//! The orchestrator owns the loop; a [`Planner`] owns the decisions. The
//! runtime ships no planner of its own beyond test helpers, so any decision
//! source (an LLM backend, a rule engine, a script) plugs in behind this
//! trait without touching loop mechanics.

use async_trait::async_trait;
use conduit_core::{ConduitResult, InvocationResult, ToolDescriptor};

/// What the planner wants next: one tool call or the final answer.
#[derive(Debug, Clone)]
pub enum PlannerAction {
    /// Invoke `tool` with `arguments` and report back.
    CallTool {
        /// Tool name from the merged catalog.
        tool: String,
        /// Arguments matching the tool's input schema.
        arguments: serde_json::Value,
    },
    /// Stop the loop and return `answer` to the caller.
    Finish {
        /// The final answer for this run.
        answer: String,
    },
}

/// One completed step: the call the planner requested and what came back.
/// Failed calls appear here as data, so the planner can react to them.
#[derive(Debug, Clone)]
pub struct StepRecord {
    /// The tool that was invoked.
    pub tool: String,
    /// The arguments it was invoked with.
    pub arguments: serde_json::Value,
    /// The normalized outcome.
    pub result: InvocationResult,
}

/// Everything the planner may consult when deciding the next action.
#[derive(Debug)]
pub struct PlanContext<'a> {
    /// The goal given to the orchestrator for this run.
    pub goal: &'a str,
    /// The merged tool catalog at the start of the run.
    pub catalog: &'a [ToolDescriptor],
    /// All completed steps so far, in order.
    pub history: &'a [StepRecord],
}

/// Decision source for the orchestration loop.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Decide the next action given the goal, catalog, and history.
    async fn decide(&self, context: PlanContext<'_>) -> ConduitResult<PlannerAction>;
}
