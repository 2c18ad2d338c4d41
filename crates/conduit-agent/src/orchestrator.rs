//! The bounded orchestration loop.
//!
//! Goal in, planner decision, at most one tool call per step, repeat until
//! the planner finishes or the step budget runs out. The orchestrator never
//! tears sessions down on its own; cancellation and step exhaustion end the
//! run and leave every session exactly as it was.

use crate::planner::{PlanContext, Planner, PlannerAction, StepRecord};
use conduit_core::{ConduitError, TraceEntry, TraceRecorder};
use conduit_mcp::Dispatcher;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Cooperative cancellation handle. Cloned freely; cancelling any clone
/// cancels the run before its next step.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// A completed run: the planner's answer plus everything that happened.
#[derive(Debug)]
pub struct RunReport {
    /// Identifier correlating this run's log lines and trace.
    pub run_id: Uuid,
    /// The planner's final answer.
    pub answer: String,
    /// Number of tool calls issued.
    pub steps: u32,
    /// Every completed step, in order.
    pub history: Vec<StepRecord>,
    /// The full protocol trace for the run.
    pub trace: Vec<TraceEntry>,
}

/// A failed run. The partial trace survives so the caller can see how far
/// the run got.
#[derive(Debug)]
pub struct RunError {
    /// Identifier correlating this run's log lines and trace.
    pub run_id: Uuid,
    /// Why the run ended.
    pub error: ConduitError,
    /// Tool calls issued before the run ended.
    pub steps: u32,
    /// The partial protocol trace.
    pub trace: Vec<TraceEntry>,
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run failed after {} steps: {}", self.steps, self.error)
    }
}

impl std::error::Error for RunError {}

/// Drives the planner against the dispatcher under a hard step budget.
pub struct Orchestrator {
    dispatcher: Dispatcher,
    planner: Arc<dyn Planner>,
    max_steps: u32,
}

impl Orchestrator {
    /// An orchestrator that allows at most `max_steps` tool calls per run.
    pub fn new(dispatcher: Dispatcher, planner: Arc<dyn Planner>, max_steps: u32) -> Self {
        Self {
            dispatcher,
            planner,
            max_steps,
        }
    }

    /// Run the loop for `goal`. A fresh trace is recorded for this run only.
    ///
    /// The run ends with the planner's answer, [`ConduitError::StepLimitExceeded`]
    /// after exactly `max_steps` tool calls without one, or
    /// [`ConduitError::Cancelled`] if `cancel` fires between steps. Sessions
    /// stay open on every path.
    pub async fn run(&self, goal: &str, cancel: &CancelToken) -> Result<RunReport, RunError> {
        let run_id = Uuid::new_v4();
        let trace = TraceRecorder::new();
        let mut history: Vec<StepRecord> = Vec::new();

        let catalog = match self.dispatcher.registry().tool_catalog().await {
            Ok(catalog) => catalog,
            Err(e) => {
                return Err(RunError {
                    run_id,
                    error: e,
                    steps: 0,
                    trace: trace.snapshot().await,
                });
            }
        };

        info!(run = %run_id, goal = %goal, tools = catalog.len(), max_steps = self.max_steps, "run started");

        for step in 0..self.max_steps {
            if cancel.is_cancelled() {
                warn!(run = %run_id, steps = step, "run cancelled");
                return Err(RunError {
                    run_id,
                    error: ConduitError::Cancelled,
                    steps: step,
                    trace: trace.snapshot().await,
                });
            }

            let action = match self
                .planner
                .decide(PlanContext {
                    goal,
                    catalog: &catalog,
                    history: &history,
                })
                .await
            {
                Ok(action) => action,
                Err(e) => {
                    return Err(RunError {
                        run_id,
                        error: e,
                        steps: step,
                        trace: trace.snapshot().await,
                    });
                }
            };

            match action {
                PlannerAction::Finish { answer } => {
                    info!(run = %run_id, steps = step, "run finished");
                    return Ok(RunReport {
                        run_id,
                        answer,
                        steps: step,
                        history,
                        trace: trace.snapshot().await,
                    });
                }
                PlannerAction::CallTool { tool, arguments } => {
                    // The decision may have taken a while; honor a
                    // cancellation that arrived during it before issuing
                    // the call.
                    if cancel.is_cancelled() {
                        warn!(run = %run_id, steps = step, "run cancelled");
                        return Err(RunError {
                            run_id,
                            error: ConduitError::Cancelled,
                            steps: step,
                            trace: trace.snapshot().await,
                        });
                    }
                    let result = self.dispatcher.call(&trace, &tool, arguments.clone()).await;
                    history.push(StepRecord {
                        tool,
                        arguments,
                        result,
                    });
                }
            }
        }

        warn!(run = %run_id, max_steps = self.max_steps, "step limit exceeded");
        Err(RunError {
            run_id,
            error: ConduitError::StepLimitExceeded {
                max_steps: self.max_steps,
            },
            steps: self.max_steps,
            trace: trace.snapshot().await,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }
}
