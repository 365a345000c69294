//! Lazy iteration over a flow's unfinished steps.

use std::sync::Arc;

use crate::action::DynSagaAction;
use crate::aggregate::Saga;
use crate::error::SagaError;
use crate::flow::SagaFlow;
use crate::registry::SagaRegistry;

/// One runnable flow position: the resolved action and the identifier it
/// was declared under.
pub struct FlowStep {
    /// The identifier the action was registered under.
    pub label: String,
    /// The resolved action.
    pub action: Arc<dyn DynSagaAction>,
}

/// Produces the lazy sequence of steps still to execute for a flow.
///
/// A pure view over saga state: declared actions are walked in order, and
/// positions whose required command already carries a completion marker
/// are skipped. The cursor borrows the saga per call so the orchestrator
/// can keep reloading fresh state between steps.
pub struct SagaFlowIterator {
    steps: Vec<(String, Arc<dyn DynSagaAction>)>,
    index: usize,
}

impl SagaFlowIterator {
    /// Resolves the flow's actions through the registry.
    ///
    /// Resolution is eager so an unknown action identifier fails the whole
    /// flow before any step runs.
    pub fn new(flow: &SagaFlow, registry: &SagaRegistry) -> Result<Self, SagaError> {
        let steps = flow
            .actions()
            .iter()
            .map(|label| Ok((label.clone(), registry.action(label)?)))
            .collect::<Result<Vec<_>, SagaError>>()?;

        Ok(Self { steps, index: 0 })
    }

    /// Returns the next flow position not yet satisfied, or None when the
    /// flow is exhausted.
    pub fn next_step(&mut self, saga: &Saga) -> Option<FlowStep> {
        while self.index < self.steps.len() {
            let (label, action) = &self.steps[self.index];
            self.index += 1;
            if saga.completed_command(action.required_command()) {
                continue;
            }
            return Some(FlowStep {
                label: label.clone(),
                action: Arc::clone(action),
            });
        }
        None
    }

    /// Returns true if any position after the current one is not yet
    /// satisfied. Used to detect a flow that an action believes finished
    /// while steps remain.
    pub fn has_more_steps(&self, saga: &Saga) -> bool {
        self.steps[self.index..]
            .iter()
            .any(|(_, action)| !saga.completed_command(action.required_command()))
    }
}
